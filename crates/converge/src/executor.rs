//! Reconciliation orchestrator - resolve, read, diff, then apply in order

use crate::context::{AutoConfirm, ConfirmCallback, ProgressCallback, RemoteExecutor};
use crate::diff::{diff, diff_options, diff_switches, diff_toggle};
use crate::error::Error;
use crate::kind::{Profile, ResourceKind};
use crate::normalize::{from_json, normalize};
use crate::observe::Observed;
use crate::resolver::Resolution;
use crate::synth::{synthesize, synthesize_action, synthesize_query};
use crate::types::{
    Body, Descriptor, Invocation, Outcome, Parsed, ReconcileResult, Record, Response, Step,
    SubAction, Verb,
};
use anyhow::Result;
use log::{debug, info, warn};
use serde::Serialize;

/// Reported when an absent target is already absent
pub const ALREADY_ABSENT: &str = "Configuration item does not exist, no action needed";

/// Options for applying a plan
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecuteOptions {
    /// Report the invocations instead of running them
    pub dry_run: bool,
}

/// What reconciling one descriptor will do
#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    /// Nothing left to run; the result is final
    Settled(ReconcileResult),
    /// Ordered sub-actions computed from the observed state
    Changes {
        action: String,
        args: Descriptor,
        actual: Observed,
        sub_actions: Vec<SubAction>,
    },
    /// An imperative action run as-is
    Run {
        action: String,
        args: Descriptor,
        columns: Option<Vec<String>>,
        mutates: bool,
    },
}

impl Plan {
    pub fn action(&self) -> Option<&str> {
        match self {
            Self::Settled(_) => None,
            Self::Changes { action, .. } | Self::Run { action, .. } => Some(action),
        }
    }

    /// Number of state-changing units the plan would run
    pub fn change_count(&self) -> usize {
        match self {
            Self::Settled(_) => 0,
            Self::Changes { sub_actions, .. } => sub_actions.len(),
            Self::Run { mutates, .. } => usize::from(*mutates),
        }
    }
}

/// A sub-action with the invocations it synthesizes to
#[derive(Debug, Clone, Serialize)]
pub struct PlannedStep {
    pub verb: Verb,
    pub summary: String,
    pub invocations: Vec<String>,
}

fn to_step(verb: Verb, summary: String, invocations: &[Invocation]) -> PlannedStep {
    PlannedStep {
        verb,
        summary,
        invocations: invocations.iter().map(Invocation::redacted).collect(),
    }
}

// ============================================================================
// Planning
// ============================================================================

fn changes(profile: &Profile, desired: &Descriptor, observed: &Observed) -> Vec<SubAction> {
    let empty = Record::new();
    match profile {
        Profile::Declarative { schema, .. } => diff(desired, observed.record(), schema),
        Profile::Toggle { .. } => match observed {
            Observed::Switches { key, states } => diff_switches(desired, key, states),
            other => diff_toggle(desired, matches!(other, Observed::Toggle(true))),
        },
        Profile::Options { schema, .. } => {
            diff_options(desired, observed.record().unwrap_or(&empty), schema)
        }
        Profile::Imperative => Vec::new(),
    }
}

fn settled_output(observed: &Observed) -> Outcome {
    match observed {
        Observed::Present(record) => Outcome::Parsed(Parsed::One(record.clone())),
        Observed::Toggle(on) => {
            Outcome::Message(if *on { "enabled" } else { "disabled" }.to_string())
        }
        Observed::Switches { key, states } => Outcome::Message(
            states
                .iter()
                .map(|(instance, on)| {
                    format!("{key} {instance} {}", if *on { "enabled" } else { "disabled" })
                })
                .collect::<Vec<_>>()
                .join(", "),
        ),
        Observed::Absent => Outcome::Message(ALREADY_ABSENT.to_string()),
    }
}

/// Resolve the descriptor, read the resource and compute its sub-actions
///
/// Only the read-only query runs here. A descriptor no rule matches, or
/// a query the appliance rejects, yields a settled failed result.
pub fn plan<P: ProgressCallback>(
    kind: &ResourceKind,
    desired: &Descriptor,
    executor: &mut dyn RemoteExecutor,
    progress: &mut P,
) -> Result<Plan> {
    let desired = desired.clone().normalize()?;

    let rule = match kind.rules.resolve(&desired) {
        Resolution::Matched(rule) => rule,
        Resolution::Unmatched { partial } => {
            let err = Error::NoMatchingAction {
                kind: kind.name.clone(),
                partial: partial.iter().map(|r| r.id.clone()).collect(),
            };
            warn!("{err}");
            return Ok(Plan::Settled(ReconcileResult::failure(err.to_string())));
        }
    };
    debug!("Resolved {} to action '{}'", kind.name, rule.id);

    let profile = kind.profile_for(&rule.id)?;
    let Some(observation) = profile.observation() else {
        return Ok(Plan::Run {
            action: rule.id.clone(),
            args: desired,
            columns: rule.output_schema.clone(),
            mutates: rule.mutates,
        });
    };

    let query = synthesize_query(&kind.templates, &rule.id, &desired)?;
    progress.on_query(&query);
    let response = executor
        .execute(&query)
        .unwrap_or_else(|e| Response::failed(format!("{e:#}")));

    let observed = match observation.observe(&response, &desired) {
        Ok(observed) => observed,
        Err(err) if err.is_remote() => {
            warn!("Query failed: {err}");
            return Ok(Plan::Settled(ReconcileResult::failure(
                response.body.text().trim().to_string(),
            )));
        }
        Err(err) => return Err(err.into()),
    };

    let sub_actions = changes(profile, &desired, &observed);
    if sub_actions.is_empty() {
        debug!("{} '{}' already reconciled", kind.name, rule.id);
        return Ok(Plan::Settled(ReconcileResult::unchanged(settled_output(
            &observed,
        ))));
    }

    Ok(Plan::Changes {
        action: rule.id.clone(),
        args: desired,
        actual: observed,
        sub_actions,
    })
}

/// Synthesize every invocation of a plan without running anything
pub fn preview(kind: &ResourceKind, plan: &Plan) -> Result<Vec<PlannedStep>> {
    match plan {
        Plan::Settled(_) => Ok(Vec::new()),
        Plan::Changes {
            action,
            args,
            sub_actions,
            ..
        } => sub_actions
            .iter()
            .map(|sub| -> Result<PlannedStep> {
                let invocations = synthesize(&kind.templates, action, sub, args)?;
                Ok(to_step(sub.verb, sub.to_string(), &invocations))
            })
            .collect(),
        Plan::Run { action, args, .. } => {
            let invocations = synthesize_action(&kind.templates, action, args)?;
            Ok(vec![to_step(Verb::Run, action.clone(), &invocations)])
        }
    }
}

// ============================================================================
// Execution
// ============================================================================

fn run_one<P: ProgressCallback>(
    verb: Verb,
    invocation: &Invocation,
    executor: &mut dyn RemoteExecutor,
    progress: &mut P,
) -> (Step, Response) {
    let line = invocation.redacted();
    progress.on_step_start(&line);
    info!("Executing: {line}");

    let response = executor
        .execute(invocation)
        .unwrap_or_else(|e| Response::failed(format!("{e:#}")));
    let step = Step {
        verb,
        invocation: line,
        success: response.success,
        output: response.body.text().trim().to_string(),
    };
    if !step.success {
        warn!("Step failed: {} ({})", step.invocation, step.output);
    }
    progress.on_step_complete(&step);
    (step, response)
}

fn run_changes<P: ProgressCallback>(
    kind: &ResourceKind,
    action: &str,
    args: &Descriptor,
    sub_actions: &[SubAction],
    executor: &mut dyn RemoteExecutor,
    progress: &mut P,
) -> ReconcileResult {
    let mut result = ReconcileResult::unchanged(Outcome::Message(String::new()));

    for sub in sub_actions {
        // Synthesized only once everything before it has succeeded
        let invocations = match synthesize(&kind.templates, action, sub, args) {
            Ok(invocations) => invocations,
            Err(err) => {
                warn!("Cannot build '{sub}': {err}");
                result.failed = true;
                result.output = Outcome::Message(err.to_string());
                return result;
            }
        };
        for invocation in &invocations {
            let (step, _) = run_one(sub.verb, invocation, executor, progress);
            let success = step.success;
            let output = step.output.clone();
            result.steps.push(step);
            if !success {
                result.failed = true;
                result.output = Outcome::Message(output);
                return result;
            }
            result.changed |= sub.verb.mutates();
        }
    }

    let applied: Vec<String> = sub_actions.iter().map(ToString::to_string).collect();
    result.output = Outcome::Message(applied.join("; "));
    result
}

fn parse_output(response: &Response, columns: Option<&[String]>) -> Outcome {
    match &response.body {
        Body::Json(value) => Outcome::Parsed(from_json(value)),
        Body::Text(text) => Outcome::Parsed(normalize(text, columns)),
    }
}

fn run_action<P: ProgressCallback>(
    kind: &ResourceKind,
    action: &str,
    args: &Descriptor,
    columns: Option<&[String]>,
    mutates: bool,
    executor: &mut dyn RemoteExecutor,
    progress: &mut P,
) -> Result<ReconcileResult> {
    let invocations = synthesize_action(&kind.templates, action, args)?;
    let mut result = ReconcileResult::unchanged(Outcome::Message(String::new()));

    for invocation in &invocations {
        let (step, response) = run_one(Verb::Run, invocation, executor, progress);
        let success = step.success;
        result.steps.push(step);
        if !success {
            result.failed = true;
            result.output = Outcome::Message(response.body.text().trim().to_string());
            return Ok(result);
        }
        result.changed |= mutates;
        result.output = parse_output(&response, columns);
    }
    Ok(result)
}

/// Apply a plan: run its invocations strictly in order, stopping at the first failure
///
/// Nothing is rolled back. `changed` is set once any state-changing
/// invocation succeeded, so a failed result still reports what applied.
pub fn execute_plan<P, C>(
    kind: &ResourceKind,
    plan: Plan,
    executor: &mut dyn RemoteExecutor,
    opts: ExecuteOptions,
    progress: &mut P,
    confirm: &mut C,
) -> Result<ReconcileResult>
where
    P: ProgressCallback,
    C: ConfirmCallback,
{
    let plan = match plan {
        Plan::Settled(result) => return Ok(result),
        other => other,
    };

    if opts.dry_run {
        let steps = preview(kind, &plan)?;
        return Ok(ReconcileResult::unchanged(Outcome::Json(
            serde_json::to_value(steps)?,
        )));
    }

    let count = plan.change_count();
    if count > 0 && !confirm.confirm(&format!("Apply {count} change(s)?"))? {
        return Ok(ReconcileResult::unchanged(Outcome::Message(
            "Declined, nothing applied".to_string(),
        )));
    }

    match plan {
        Plan::Settled(result) => Ok(result),
        Plan::Changes {
            action,
            args,
            sub_actions,
            ..
        } => Ok(run_changes(
            kind,
            &action,
            &args,
            &sub_actions,
            executor,
            progress,
        )),
        Plan::Run {
            action,
            args,
            columns,
            mutates,
        } => run_action(
            kind,
            &action,
            &args,
            columns.as_deref(),
            mutates,
            executor,
            progress,
        ),
    }
}

/// Plan and apply one descriptor without confirmation
pub fn reconcile<P: ProgressCallback>(
    kind: &ResourceKind,
    desired: &Descriptor,
    executor: &mut dyn RemoteExecutor,
    progress: &mut P,
) -> Result<ReconcileResult> {
    let plan = plan(kind, desired, executor, progress)?;
    execute_plan(
        kind,
        plan,
        executor,
        ExecuteOptions::default(),
        progress,
        &mut AutoConfirm,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NoProgress;
    use crate::diff::{DiffSchema, ListAttr};
    use crate::observe::Observation;
    use crate::resolver::{ActionRule, Catalog};
    use crate::template::{CommandSpec, TemplateCatalog};
    use crate::types::Method;
    use std::collections::VecDeque;

    /// Replays scripted responses and records what it was asked to run
    #[derive(Default)]
    struct Scripted {
        responses: VecDeque<Response>,
        seen: Vec<String>,
    }

    impl Scripted {
        fn new(responses: Vec<Response>) -> Self {
            Self {
                responses: responses.into(),
                seen: Vec::new(),
            }
        }
    }

    impl RemoteExecutor for Scripted {
        fn execute(&mut self, invocation: &Invocation) -> Result<Response> {
            self.seen.push(invocation.redacted());
            self.responses
                .pop_front()
                .ok_or_else(|| anyhow::anyhow!("unexpected call: {invocation}"))
        }
    }

    const EXPORT: &str = "\
NFS Export: backup
Path: /data/col1/backup

Client            Options
---------------   ------------------
*                 (sec=sys,rw)
---------------   ------------------
";

    fn nfs_kind() -> ResourceKind {
        let rules = Catalog::new("nfs")
            .rule(ActionRule::new("export").requires(&["name"]).mutating())
            .rule(
                ActionRule::new("service")
                    .when("service", true)
                    .mutating(),
            );
        let templates = TemplateCatalog::new()
            .with(
                "export",
                Verb::Show,
                CommandSpec::shell("nfs export show detailed $name").unwrap(),
            )
            .routed_with(
                "export",
                Verb::Create,
                CommandSpec::shell("nfs export create $name").unwrap(),
            )
            .with(
                "export",
                Verb::Add,
                CommandSpec::shell("nfs export add $name")
                    .unwrap()
                    .per_member(),
            )
            .with(
                "export",
                Verb::Undelete,
                CommandSpec::shell("nfs export undelete $name").unwrap(),
            )
            .with(
                "export",
                Verb::Del,
                CommandSpec::shell("nfs export del $name").unwrap(),
            )
            .routed("export", Verb::Mod)
            .with(
                "export",
                Verb::Rename,
                CommandSpec::shell("nfs export rename $name $new-export-name").unwrap(),
            )
            .with(
                "service",
                Verb::Show,
                CommandSpec::rest(Method::Get, "/api/v2/dd-systems/0/protocols/nfs").unwrap(),
            )
            .with("service", Verb::Enable, CommandSpec::shell("nfs enable").unwrap())
            .with("service", Verb::Disable, CommandSpec::shell("nfs disable").unwrap());
        let schema = DiffSchema::new(&["name"])
            .list(ListAttr::new("clients").id("clientid").wildcard("*"))
            .create_only(&["path"])
            .rename("new-export-name")
            .tombstone("status", "D");
        ResourceKind::new("nfs", rules, templates)
            .declarative(
                "export",
                Observation::export_detail().absent_marker("was not found"),
                schema,
            )
            .toggle("service", Observation::json().toggle("status"))
    }

    fn desired(json: serde_json::Value) -> Descriptor {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_wildcard_replacement_runs_delete_then_add() {
        let kind = nfs_kind();
        let mut exec = Scripted::new(vec![
            Response::ok_text(EXPORT),
            Response::ok_text(""),
            Response::ok_text(""),
        ]);
        let d = desired(serde_json::json!({"name": "backup", "clients": ["10.0.0.5"]}));
        let result = reconcile(&kind, &d, &mut exec, &mut NoProgress).unwrap();

        assert!(result.changed);
        assert!(!result.failed);
        assert_eq!(
            exec.seen,
            vec![
                "nfs export show detailed backup",
                "nfs export del backup clients *",
                "nfs export add backup clients 10.0.0.5",
            ]
        );
    }

    #[test]
    fn test_create_then_add_members() {
        let kind = nfs_kind();
        let mut exec = Scripted::new(vec![
            Response::failed("**** NFS export \"backup\" was not found."),
            Response::ok_text(""),
            Response::ok_text(""),
        ]);
        let d = desired(serde_json::json!({
            "name": "backup", "path": "/data/col1/backup", "clients": ["10.0.0.5"]
        }));
        let result = reconcile(&kind, &d, &mut exec, &mut NoProgress).unwrap();
        assert!(result.changed);
        assert_eq!(
            exec.seen[1..],
            [
                "nfs export create backup path /data/col1/backup",
                "nfs export add backup clients 10.0.0.5",
            ]
        );
    }

    #[test]
    fn test_already_reconciled_is_unchanged() {
        let kind = nfs_kind();
        let mut exec = Scripted::new(vec![Response::ok_text(EXPORT)]);
        let d = desired(serde_json::json!({"name": "backup", "clients": ["*"]}));
        let result = reconcile(&kind, &d, &mut exec, &mut NoProgress).unwrap();
        assert!(!result.changed);
        assert!(!result.failed);
        assert_eq!(exec.seen.len(), 1);
    }

    #[test]
    fn test_absent_and_missing_reports_no_action() {
        let kind = nfs_kind();
        let mut exec = Scripted::new(vec![Response::failed("NFS export was not found")]);
        let d = desired(serde_json::json!({"name": "backup", "state": "absent"}));
        let result = reconcile(&kind, &d, &mut exec, &mut NoProgress).unwrap();
        assert!(!result.changed);
        assert!(!result.failed);
        assert_eq!(result.output, Outcome::Message(ALREADY_ABSENT.to_string()));
    }

    #[test]
    fn test_fail_fast_stops_before_third_sub_action() {
        let kind = nfs_kind();
        let tombstoned = "NFS Export: backup\nStatus: D\n";
        let mut exec = Scripted::new(vec![
            Response::ok_text(tombstoned),
            Response::ok_text("undeleted"),
            Response::failed("**** Invalid client"),
        ]);
        let d = desired(serde_json::json!({
            "name": "backup", "clients": ["10.0.0.5"], "new-export-name": "backup2"
        }));
        let result = reconcile(&kind, &d, &mut exec, &mut NoProgress).unwrap();

        assert!(result.failed);
        assert!(result.changed);
        assert_eq!(result.applied(), 1);
        assert_eq!(result.steps.len(), 2);
        assert_eq!(result.output, Outcome::Message("**** Invalid client".to_string()));
        assert_eq!(exec.seen.len(), 3);
        assert!(!exec.seen.iter().any(|line| line.contains("rename")));
    }

    #[test]
    fn test_no_matching_action_fails_without_remote_calls() {
        let kind = nfs_kind();
        let mut exec = Scripted::default();
        let d = desired(serde_json::json!({"path": "/data/col1/x"}));
        let result = reconcile(&kind, &d, &mut exec, &mut NoProgress).unwrap();
        assert!(result.failed);
        assert!(!result.changed);
        assert!(exec.seen.is_empty());
        let Outcome::Message(message) = result.output else {
            panic!("expected message");
        };
        assert!(message.starts_with("no action matched"));
    }

    #[test]
    fn test_query_failure_is_reported() {
        let kind = nfs_kind();
        let mut exec = Scripted::new(vec![Response::failed("**** Permission denied")]);
        let d = desired(serde_json::json!({"name": "backup"}));
        let result = reconcile(&kind, &d, &mut exec, &mut NoProgress).unwrap();
        assert!(result.failed);
        assert_eq!(result.output, Outcome::Message("**** Permission denied".to_string()));
    }

    #[test]
    fn test_executor_error_counts_as_failure() {
        let kind = nfs_kind();
        // Only the query is scripted; the write call errors out
        let mut exec = Scripted::new(vec![Response::ok(Body::Json(
            serde_json::json!({"status": "disabled"}),
        ))]);
        let d = desired(serde_json::json!({"service": true}));
        let result = reconcile(&kind, &d, &mut exec, &mut NoProgress).unwrap();
        assert!(result.failed);
        assert!(!result.changed);
        assert_eq!(exec.seen[1], "nfs enable");
    }

    #[test]
    fn test_dry_run_previews_without_writing() {
        let kind = nfs_kind();
        let mut exec = Scripted::new(vec![Response::ok_text(EXPORT)]);
        let d = desired(serde_json::json!({"name": "backup", "clients": ["10.0.0.5"]}));
        let plan = plan(&kind, &d, &mut exec, &mut NoProgress).unwrap();
        assert_eq!(plan.action(), Some("export"));
        assert_eq!(plan.change_count(), 1);

        let result = execute_plan(
            &kind,
            plan,
            &mut exec,
            ExecuteOptions { dry_run: true },
            &mut NoProgress,
            &mut AutoConfirm,
        )
        .unwrap();
        assert!(!result.changed);
        assert_eq!(exec.seen.len(), 1);
        let Outcome::Json(steps) = result.output else {
            panic!("expected json preview");
        };
        assert_eq!(steps[0]["verb"], "mod");
        assert_eq!(steps[0]["invocations"][0], "nfs export del backup clients *");
    }

    struct Decline;

    impl ConfirmCallback for Decline {
        fn confirm(&mut self, _prompt: &str) -> Result<bool> {
            Ok(false)
        }
    }

    #[test]
    fn test_declined_plan_applies_nothing() {
        let kind = nfs_kind();
        let mut exec = Scripted::new(vec![Response::ok_text(EXPORT)]);
        let d = desired(serde_json::json!({"name": "backup", "clients": ["10.0.0.5"]}));
        let plan = plan(&kind, &d, &mut exec, &mut NoProgress).unwrap();
        let result = execute_plan(
            &kind,
            plan,
            &mut exec,
            ExecuteOptions::default(),
            &mut NoProgress,
            &mut Decline,
        )
        .unwrap();
        assert!(!result.changed);
        assert_eq!(exec.seen.len(), 1);
    }

    #[test]
    fn test_imperative_action_parses_output() {
        let rules = Catalog::new("net").rule(
            ActionRule::new("route-show")
                .when("state", "show")
                .when("option", "route")
                .columns(&["destination", "gateway"]),
        );
        let templates = TemplateCatalog::new().with(
            "route-show",
            Verb::Run,
            CommandSpec::shell("route show table").unwrap(),
        );
        let kind = ResourceKind::new("net", rules, templates).imperative();
        let output = "\
Destination   Gateway
-----------   --------
10.0.0.0      10.0.0.1
-----------   --------
";
        let mut exec = Scripted::new(vec![Response::ok_text(output)]);
        let d = desired(serde_json::json!({"state": "show", "option": "route"}));
        let result = reconcile(&kind, &d, &mut exec, &mut NoProgress).unwrap();
        assert!(!result.changed);
        let Outcome::Parsed(Parsed::Many(rows)) = result.output else {
            panic!("expected rows");
        };
        assert_eq!(rows[0]["gateway"], crate::types::Field::from("10.0.0.1"));
    }
}
