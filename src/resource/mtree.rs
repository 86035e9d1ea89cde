//! MTrees and their per-MTree options

use converge::{
    ActionRule, Catalog, CommandSpec, DiffSchema, Method, Observation, ResourceKind, Result,
    TemplateCatalog, Verb,
};

pub fn kind() -> Result<ResourceKind> {
    let rules = Catalog::new("mtree")
        .rule(
            ActionRule::new("option")
                .requires(&["mtree-path"])
                .when("option", true)
                .mutating(),
        )
        .rule(ActionRule::new("mtree").requires(&["mtree-path"]).mutating());

    let templates = TemplateCatalog::new()
        .with(
            "option",
            Verb::Show,
            CommandSpec::shell("mtree option show mtree $mtree-path")?,
        )
        .with(
            "option",
            Verb::Set,
            CommandSpec::shell("mtree option set")?
                .optional(&["mtree-path"])
                .rename("mtree-path", "mtree"),
        )
        .with(
            "option",
            Verb::Reset,
            CommandSpec::shell("mtree option reset")?
                .optional(&["mtree-path"])
                .rename("mtree-path", "mtree"),
        )
        .with("mtree", Verb::Show, CommandSpec::shell("mtree list $mtree-path")?)
        .with("mtree", Verb::Create, CommandSpec::shell("mtree create $mtree-path")?)
        .with("mtree", Verb::Mod, CommandSpec::shell("mtree modify $mtree-path")?)
        .with(
            "mtree",
            Verb::Undelete,
            CommandSpec::shell("mtree undelete $mtree-path")?,
        )
        .with(
            "mtree",
            Verb::Rename,
            CommandSpec::shell("mtree rename $mtree-path $new-mtree-path")?,
        )
        .with(
            "mtree",
            Verb::Del,
            CommandSpec::rest(Method::Delete, "/rest/v1.0/dd-systems/0/mtrees/$mtree-path")?,
        );

    let mtree = DiffSchema::new(&["mtree-path"])
        .create_only(&["tenant-unit", "quota-soft-limit", "quota-hard-limit"])
        .drift(Verb::Mod)
        .absent_verb(Verb::Del)
        .rename("new-mtree-path")
        .tombstone("status", "D");

    Ok(ResourceKind::new("mtree", rules, templates)
        .options(
            "option",
            Observation::auto().pivot(Some(("mtree", "mtree-path")), "option", "value"),
            DiffSchema::new(&["mtree-path", "option"]),
        )
        .declarative(
            "mtree",
            Observation::table(&["name", "pre-comp", "status"])
                .row("name", "mtree-path")
                .absent_marker("No MTrees")
                .absent_marker("no MTrees configured"),
            mtree,
        ))
}
