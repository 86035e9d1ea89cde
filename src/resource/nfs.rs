//! NFS exports, server options and the NFS service

use converge::{
    ActionRule, Catalog, CommandSpec, DiffSchema, ListAttr, Method, Observation, ResourceKind,
    Result, TemplateCatalog, Verb,
};

const STATUS_ENDPOINT: &str = "/api/v2/dd-systems/0/protocols/nfs";

/// Printed for an export the appliance does not know
const NOT_FOUND: &str = "was not found";

/// Protocol version addressed when the descriptor names none
const DEFAULT_VERSION: &str = "3";

fn rules() -> Catalog {
    Catalog::new("nfs")
        .rule(ActionRule::new("export").requires(&["name"]).mutating())
        .rule(ActionRule::new("option").when("option", true).mutating())
        .rule(ActionRule::new("service").when("service", true).mutating())
}

fn export_templates(catalog: TemplateCatalog) -> Result<TemplateCatalog> {
    Ok(catalog
        .with(
            "export",
            Verb::Show,
            CommandSpec::shell("nfs export show detailed $name")?,
        )
        .routed_with(
            "export",
            Verb::Create,
            CommandSpec::shell("nfs export create $name")?,
        )
        .with(
            "export",
            Verb::Add,
            CommandSpec::shell("nfs export add $name")?
                .rename("referrals", "referral")
                .per_member(),
        )
        .with(
            "export",
            Verb::Del,
            CommandSpec::shell("nfs export del $name")?
                .rename("referrals", "referral")
                .per_member(),
        )
        .routed_with(
            "export",
            Verb::Mod,
            CommandSpec::shell("nfs export modify $name")?.rename("referrals", "referral"),
        )
        .with(
            "export",
            Verb::Rename,
            CommandSpec::shell("nfs export rename $name $new-export-name")?,
        )
        .with(
            "export",
            Verb::Destroy,
            CommandSpec::shell("nfs export destroy $name")?,
        ))
}

fn option_templates(catalog: TemplateCatalog) -> Result<TemplateCatalog> {
    Ok(catalog
        .with("option", Verb::Show, CommandSpec::shell("nfs option show")?)
        .with("option", Verb::Set, CommandSpec::shell("nfs option set")?)
        .with("option", Verb::Reset, CommandSpec::shell("nfs option reset")?))
}

fn service_templates(catalog: TemplateCatalog) -> Result<TemplateCatalog> {
    Ok(catalog
        .with(
            "service",
            Verb::Show,
            CommandSpec::rest(Method::Get, STATUS_ENDPOINT)?,
        )
        .with(
            "service",
            Verb::Enable,
            CommandSpec::shell("nfs enable version $version")?,
        )
        .with(
            "service",
            Verb::Disable,
            CommandSpec::shell("nfs disable version $version")?,
        )
        .with(
            "service",
            Verb::Restart,
            CommandSpec::shell("nfs restart version $version")?,
        ))
}

pub fn kind() -> Result<ResourceKind> {
    let templates = service_templates(option_templates(export_templates(
        TemplateCatalog::new(),
    )?)?)?;

    let export = DiffSchema::new(&["name"])
        .list(ListAttr::new("clients").id("clientid").wildcard("*"))
        .list(ListAttr::new("referrals").id("referral"))
        .create_only(&["path"])
        .drift(Verb::Mod)
        .rename("new-export-name");
    let option = DiffSchema::new(&["option"]);

    Ok(ResourceKind::new("nfs", rules(), templates)
        .declarative(
            "export",
            Observation::export_detail().absent_marker(NOT_FOUND),
            export,
        )
        .options("option", Observation::auto().absent_marker(NOT_FOUND), option)
        .toggle(
            "service",
            Observation::json().per_instance("version", DEFAULT_VERSION, "v{}Status"),
        ))
}
