//! Apply command - reconcile one resource with its declared state

use anyhow::Result;
use converge::{AutoConfirm, ConfirmCallback, ExecuteOptions, Plan, execute_plan};

use crate::Context as AppContext;
use crate::cli::ApplyArgs;
use crate::progress::Spinner;
use crate::ui::PromptConfirm;
use crate::{resource, ui};

/// Returns whether the run failed
pub fn run(ctx: &AppContext, args: ApplyArgs) -> Result<bool> {
    let kind = resource::lookup(&args.desired.kind)?;
    let json = args.desired.json;
    let plan = super::plan::compute(ctx, &kind, &args.desired)?;

    if args.dry_run || matches!(plan, Plan::Settled(_)) {
        return super::plan::show(&kind, &plan, json);
    }

    let count = plan.change_count();
    if count > 0 && !args.yes {
        super::plan::show(&kind, &plan, false)?;
        println!();
        if !PromptConfirm.confirm(&format!("Apply {count} change(s) to {}?", kind.name))? {
            ui::warn("Declined, nothing applied");
            return Ok(false);
        }
    }

    // A fresh session: the planning one may have idled through the prompt
    let mut executor = super::connect(ctx)?;
    let mut spinner = Spinner::new(&format!("Applying {}", kind.name), ctx.quiet || json);
    let result = execute_plan(
        &kind,
        plan,
        &mut executor,
        ExecuteOptions::default(),
        &mut spinner,
        &mut AutoConfirm,
    )?;
    spinner.clear();

    ui::report(&kind.name, &result, json)?;
    Ok(result.failed)
}
