//! NTP time servers and the NTP service

use converge::{
    ActionRule, Catalog, CommandSpec, DiffSchema, ListAttr, Observation, ResourceKind, Result,
    TemplateCatalog, Verb,
};

pub fn kind() -> Result<ResourceKind> {
    let rules = Catalog::new("ntp")
        .rule(ActionRule::new("timeserver").requires(&["timeserver"]).mutating())
        .rule(ActionRule::new("service").when("service", true).mutating());

    let templates = TemplateCatalog::new()
        .with("timeserver", Verb::Show, CommandSpec::shell("ntp show config")?)
        .with("timeserver", Verb::Add, CommandSpec::shell("ntp add")?.per_member())
        .with("timeserver", Verb::Del, CommandSpec::shell("ntp del")?.per_member())
        .with("service", Verb::Show, CommandSpec::shell("ntp status")?)
        .with("service", Verb::Enable, CommandSpec::shell("ntp enable")?)
        .with("service", Verb::Disable, CommandSpec::shell("ntp disable")?);

    let timeserver = DiffSchema::new(&[])
        .list(ListAttr::new("timeserver"))
        .alias("timeserver", "timeservers");

    Ok(ResourceKind::new("ntp", rules, templates)
        .declarative("timeserver", Observation::auto(), timeserver)
        .toggle("service", Observation::auto().toggle("ntp-status")))
}
