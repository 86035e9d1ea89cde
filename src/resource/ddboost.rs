//! DD Boost storage units, user assignment and the DD Boost service

use converge::{
    ActionRule, Catalog, CommandSpec, DiffSchema, Method, Observation, ResourceKind, Result,
    TemplateCatalog, Verb,
};

const STORAGE_UNIT_COLUMNS: &[&str] = &[
    "storage-unit",
    "pre-comp-gib",
    "status",
    "user",
    "report-physical",
];

const NOT_FOUND: &str = "does not exist";

fn storage_unit_templates(catalog: TemplateCatalog) -> Result<TemplateCatalog> {
    Ok(catalog
        .with(
            "storage-unit",
            Verb::Show,
            CommandSpec::shell("ddboost storage-unit show")?,
        )
        .with(
            "storage-unit",
            Verb::Create,
            CommandSpec::shell("ddboost storage-unit create $storage-unit")?,
        )
        .with(
            "storage-unit",
            Verb::Mod,
            CommandSpec::rest(
                Method::Put,
                "/rest/v2.0/dd-systems/0/protocols/ddboost/storage-units/$storage-unit",
            )?,
        )
        .with(
            "storage-unit",
            Verb::Del,
            CommandSpec::shell("ddboost storage-unit delete $storage-unit")?,
        )
        .with(
            "storage-unit",
            Verb::Undelete,
            CommandSpec::shell("ddboost storage-unit undelete $storage-unit")?,
        )
        .with(
            "storage-unit",
            Verb::Rename,
            CommandSpec::shell("ddboost storage-unit rename $storage-unit $new-storage-unit")?,
        ))
}

pub fn kind() -> Result<ResourceKind> {
    let rules = Catalog::new("ddboost")
        .rule(ActionRule::new("storage-unit").requires(&["storage-unit"]).mutating())
        .rule(ActionRule::new("user").requires(&["user"]).mutating())
        .rule(ActionRule::new("service").when("service", true).mutating());

    let templates = storage_unit_templates(TemplateCatalog::new())?
        .with("user", Verb::Show, CommandSpec::shell("ddboost user show")?)
        .with("user", Verb::Create, CommandSpec::shell("ddboost user assign $user")?)
        .with("user", Verb::Del, CommandSpec::shell("ddboost user unassign $user")?)
        .with("service", Verb::Show, CommandSpec::shell("ddboost status")?)
        .with("service", Verb::Enable, CommandSpec::shell("ddboost enable")?)
        .with("service", Verb::Disable, CommandSpec::shell("ddboost disable")?);

    let storage_unit = DiffSchema::new(&["storage-unit"])
        .drift(Verb::Mod)
        .absent_verb(Verb::Del)
        .rename("new-storage-unit")
        .tombstone("status", "D");
    let user = DiffSchema::new(&["user"]).absent_verb(Verb::Del);

    Ok(ResourceKind::new("ddboost", rules, templates)
        .declarative(
            "storage-unit",
            Observation::table(STORAGE_UNIT_COLUMNS)
                .row("storage-unit", "storage-unit")
                .absent_marker(NOT_FOUND),
            storage_unit,
        )
        .declarative(
            "user",
            Observation::table(&["user", "token-access"])
                .row("user", "user")
                .absent_marker(NOT_FOUND),
            user,
        )
        .toggle("service", Observation::auto().toggle("dd-boost-status")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::testing::{Scripted, desired};
    use converge::{NoProgress, Response, reconcile};

    const UNITS: &str = "\
Name     Pre-Comp (GiB)   Status   User       Report Physical Size (MiB)
------   --------------   ------   --------   --------------------------
su1                 0.0   RW       ddbuser    -
------   --------------   ------   --------   --------------------------
 D    : Deleted
 RW   : Read Write
";

    const USERS: &str = "\
User       Token Access
--------   ------------
ddbuser    Allowed
--------   ------------
";

    #[test]
    fn test_create_storage_unit_with_user() {
        let kind = kind().unwrap();
        let mut exec = Scripted::new(vec![Response::ok_text(UNITS), Response::ok_text("")]);
        let d = desired(serde_json::json!({"storage_unit": "su2", "user": "ddbuser"}));
        let result = reconcile(&kind, &d, &mut exec, &mut NoProgress).unwrap();
        assert!(result.changed);
        assert_eq!(exec.seen[1], "ddboost storage-unit create su2 user ddbuser");
    }

    #[test]
    fn test_user_change_goes_over_rest() {
        let kind = kind().unwrap();
        let mut exec = Scripted::new(vec![Response::ok_text(UNITS), Response::ok_text("")]);
        let d = desired(serde_json::json!({"storage-unit": "su1", "user": "alice"}));
        reconcile(&kind, &d, &mut exec, &mut NoProgress).unwrap();
        assert_eq!(
            exec.seen[1],
            r#"PUT /rest/v2.0/dd-systems/0/protocols/ddboost/storage-units/su1 {"user":"alice"}"#
        );
    }

    #[test]
    fn test_delete_and_rename_storage_unit() {
        let kind = kind().unwrap();
        let mut exec = Scripted::new(vec![Response::ok_text(UNITS), Response::ok_text("")]);
        let d = desired(serde_json::json!({"storage-unit": "su1", "state": "absent"}));
        reconcile(&kind, &d, &mut exec, &mut NoProgress).unwrap();
        assert_eq!(exec.seen[1], "ddboost storage-unit delete su1");

        let mut exec = Scripted::new(vec![Response::ok_text(UNITS), Response::ok_text("")]);
        let d = desired(serde_json::json!({"storage-unit": "su1", "new-storage-unit": "su9"}));
        reconcile(&kind, &d, &mut exec, &mut NoProgress).unwrap();
        assert_eq!(exec.seen[1], "ddboost storage-unit rename su1 su9");
    }

    #[test]
    fn test_user_assignment() {
        let kind = kind().unwrap();
        let mut exec = Scripted::new(vec![Response::ok_text(USERS), Response::ok_text("")]);
        let d = desired(serde_json::json!({"user": "backup"}));
        reconcile(&kind, &d, &mut exec, &mut NoProgress).unwrap();
        assert_eq!(exec.seen, ["ddboost user show", "ddboost user assign backup"]);

        let mut exec = Scripted::new(vec![Response::ok_text(USERS), Response::ok_text("")]);
        let d = desired(serde_json::json!({"user": "ddbuser", "state": "absent"}));
        reconcile(&kind, &d, &mut exec, &mut NoProgress).unwrap();
        assert_eq!(exec.seen[1], "ddboost user unassign ddbuser");
    }

    #[test]
    fn test_service_enable() {
        let kind = kind().unwrap();
        let mut exec = Scripted::new(vec![
            Response::ok_text("DD Boost status: disabled\n"),
            Response::ok_text(""),
        ]);
        let d = desired(serde_json::json!({"service": true}));
        reconcile(&kind, &d, &mut exec, &mut NoProgress).unwrap();
        assert_eq!(exec.seen[1], "ddboost enable");
    }

    #[test]
    fn test_service_reads_only_the_status_line() {
        let kind = kind().unwrap();
        let shown = "\
DD Boost status: disabled
Distributed segment processing: enabled
";
        let mut exec = Scripted::new(vec![Response::ok_text(shown), Response::ok_text("")]);
        let d = desired(serde_json::json!({"service": true}));
        let result = reconcile(&kind, &d, &mut exec, &mut NoProgress).unwrap();
        assert!(result.changed);
        assert_eq!(exec.seen, ["ddboost status", "ddboost enable"]);
    }

    #[test]
    fn test_missing_storage_unit_already_absent() {
        let kind = kind().unwrap();
        let mut exec = Scripted::new(vec![Response::failed(
            "**** Storage unit \"su9\" does not exist.",
        )]);
        let d = desired(serde_json::json!({"storage-unit": "su9", "state": "absent"}));
        let result = reconcile(&kind, &d, &mut exec, &mut NoProgress).unwrap();
        assert!(!result.failed);
        assert!(!result.changed);
    }
}
