//! Capacity and stream quotas

use converge::{
    ActionRule, Catalog, CommandSpec, DiffSchema, Observation, ResourceKind, Result,
    TemplateCatalog, Unit, Verb,
};

const CAPACITY_COLUMNS: &[&str] = &["mtree", "pre-comp-gib", "soft-limit", "hard-limit"];

const STREAM_LIMITS: &[&str] = &[
    "write-stream-soft-limit",
    "read-stream-soft-limit",
    "repl-stream-soft-limit",
    "combined-stream-soft-limit",
    "combined-stream-hard-limit",
];

/// Quota reads name a missing mtree or storage unit this way
fn missing(observation: Observation) -> Observation {
    observation
        .absent_marker("No such file or directory")
        .absent_marker("not found")
}

pub fn kind() -> Result<ResourceKind> {
    let rules = Catalog::new("quota")
        .rule(ActionRule::new("capacity").requires(&["mtrees"]).mutating())
        .rule(ActionRule::new("streams").requires(&["storage-unit"]).mutating())
        .rule(ActionRule::new("service").when("service", true).mutating());

    let templates = TemplateCatalog::new()
        .with(
            "capacity",
            Verb::Show,
            CommandSpec::shell("quota capacity show mtrees $mtrees")?,
        )
        .with(
            "capacity",
            Verb::Set,
            CommandSpec::shell("quota capacity set mtrees $mtrees")?,
        )
        .with(
            "capacity",
            Verb::Reset,
            CommandSpec::shell("quota capacity reset mtrees $mtrees")?,
        )
        .with(
            "streams",
            Verb::Show,
            CommandSpec::shell("quota streams show storage-unit $storage-unit")?,
        )
        .with(
            "streams",
            Verb::Set,
            CommandSpec::shell("quota streams set storage-unit $storage-unit")?,
        )
        .with(
            "streams",
            Verb::Reset,
            CommandSpec::shell("quota streams reset storage-unit $storage-unit")?,
        )
        .with("service", Verb::Show, CommandSpec::shell("quota capacity status")?)
        .with("service", Verb::Enable, CommandSpec::shell("quota capacity enable")?)
        .with("service", Verb::Disable, CommandSpec::shell("quota capacity disable")?);

    let capacity = DiffSchema::new(&["mtrees"])
        .numeric("soft-limit", Unit::Mebibytes)
        .numeric("hard-limit", Unit::Mebibytes);
    let streams = STREAM_LIMITS
        .iter()
        .fold(DiffSchema::new(&["storage-unit"]), |schema, key| {
            schema.numeric(key, Unit::Count)
        });

    let mut stream_columns = vec!["storage-unit"];
    stream_columns.extend(STREAM_LIMITS);

    Ok(ResourceKind::new("quota", rules, templates)
        .options(
            "capacity",
            missing(Observation::table(CAPACITY_COLUMNS).row("mtree", "mtrees")),
            capacity,
        )
        .options(
            "streams",
            missing(Observation::table(&stream_columns).row("storage-unit", "storage-unit")),
            streams,
        )
        .toggle("service", Observation::auto().toggle("quota-capacity")))
}
