//! Plan command - read the appliance and show the pending invocations

use anyhow::Result;
use converge::{Plan, ResourceKind, preview};
use log::debug;

use crate::Context as AppContext;
use crate::cli::DesiredArgs;
use crate::progress::Spinner;
use crate::{resource, ui};

/// Resolve, read and diff one descriptor against the appliance
pub fn compute(ctx: &AppContext, kind: &ResourceKind, args: &DesiredArgs) -> Result<Plan> {
    let desired = super::load_desired(args)?;
    debug!("Desired {}: {:?}", kind.name, desired);

    let mut executor = super::connect(ctx)?;
    let mut spinner = Spinner::new(&format!("Planning {}", kind.name), ctx.quiet || args.json);
    let plan = converge::plan(kind, &desired, &mut executor, &mut spinner)?;
    spinner.clear();
    Ok(plan)
}

/// Print a plan; a settled plan prints its final result
///
/// Returns whether the plan is a failure.
pub fn show(kind: &ResourceKind, plan: &Plan, json: bool) -> Result<bool> {
    if let Plan::Settled(result) = plan {
        ui::report(&kind.name, result, json)?;
        return Ok(result.failed);
    }

    let steps = preview(kind, plan)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&steps)?);
    } else {
        ui::print_plan(&kind.name, plan.action(), &steps);
    }
    Ok(false)
}

pub fn run(ctx: &AppContext, args: DesiredArgs) -> Result<bool> {
    let kind = resource::lookup(&args.kind)?;
    let plan = compute(ctx, &kind, &args)?;
    show(&kind, &plan, args.json)
}
