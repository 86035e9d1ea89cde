//! CIFS shares and the CIFS service, managed over REST

use converge::{
    ActionRule, Catalog, CommandSpec, DiffSchema, ListAttr, Method, Observation, ResourceKind,
    Result, TemplateCatalog, Unit, Verb,
};

const SHARES: &str = "/rest/v1.0/dd-systems/0/protocols/cifs/shares";
const SHARE: &str = "/rest/v1.0/dd-systems/0/protocols/cifs/shares/$share";

fn share_update(method: Method) -> Result<CommandSpec> {
    Ok(CommandSpec::rest(method, SHARE)?.rename("share", "name"))
}

pub fn kind() -> Result<ResourceKind> {
    let rules = Catalog::new("cifs")
        .rule(ActionRule::new("share").requires(&["share"]).mutating())
        .rule(ActionRule::new("service").when("service", true).mutating());

    let templates = TemplateCatalog::new()
        .with("share", Verb::Show, CommandSpec::rest(Method::Get, SHARE)?)
        .with(
            "share",
            Verb::Create,
            CommandSpec::rest(Method::Post, SHARES)?.rename("share", "name"),
        )
        .with("share", Verb::Mod, share_update(Method::Put)?)
        .with("share", Verb::Add, share_update(Method::Put)?)
        .with("share", Verb::Del, share_update(Method::Put)?)
        .with(
            "share",
            Verb::Disable,
            share_update(Method::Put)?.body_literal("disable", serde_json::Value::Bool(true)),
        )
        .with("share", Verb::Destroy, CommandSpec::rest(Method::Delete, SHARE)?)
        .with(
            "service",
            Verb::Show,
            CommandSpec::rest(Method::Get, "/api/v1/dd-systems/0/protocols/cifs/status")?,
        )
        .with(
            "service",
            Verb::Enable,
            CommandSpec::rest(Method::Post, "/api/v1/dd-systems/0/protocols/cifs/enable")?,
        )
        .with(
            "service",
            Verb::Disable,
            CommandSpec::rest(Method::Post, "/api/v1/dd-systems/0/protocols/cifs/disable")?,
        );

    let share = DiffSchema::new(&["share"])
        .list(ListAttr::new("clients").wildcard("*"))
        .list(ListAttr::new("users"))
        .list(ListAttr::new("groups"))
        .numeric("max-connections", Unit::Count)
        .create_only(&["path", "comment"])
        .drift(Verb::Mod)
        .absent_verb(Verb::Disable);

    Ok(ResourceKind::new("cifs", rules, templates)
        .declarative(
            "share",
            Observation::json_options("option", "key", "value").absent_on_failure(),
            share,
        )
        .toggle("service", Observation::json().toggle("status")))
}
