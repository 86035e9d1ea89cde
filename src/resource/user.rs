//! Local user accounts and password policies

use converge::{
    ActionRule, Catalog, CommandSpec, DiffSchema, Method, Observation, ResourceKind, Result,
    TemplateCatalog, Unit, Verb,
};

const AGING_KEYS: &[&str] = &[
    "min-days-between-change",
    "max-days-between-change",
    "warn-days-before-expire",
    "disable-days-after-expire",
];

/// Labels printed by `user password aging option show`
const AGING_LABELS: &[(&str, &str)] = &[
    ("min-days-between-change", "minimum-days-between-password-change"),
    ("max-days-between-change", "maximum-days-between-password-change"),
    ("warn-days-before-expire", "warning-days-between-password-change"),
];

/// Labels printed by `user password strength show`
const STRENGTH_LABELS: &[(&str, &str)] = &[
    ("min-length", "minimum-password-length"),
    ("min-character-classes", "minimum-character-classes"),
    ("one-lowercase-char", "at-least-one-lowercase-character"),
    ("one-uppercase-char", "at-least-one-uppercase-character"),
    ("one-digit", "at-least-one-digit"),
    ("one-special-character", "at-least-one-special-character"),
    ("max-three-repeat", "at-most-three-consecutive-repeated-characters"),
    ("min-positions-changed", "minimum-positions-changed"),
    ("dictionary-match", "check-password-against-common-words"),
];

const STRENGTH_NUMERIC: &[&str] = &[
    "min-length",
    "min-character-classes",
    "passwords-remembered",
    "min-positions-changed",
];

fn aging_schema(identity: &[&str]) -> DiffSchema {
    AGING_KEYS
        .iter()
        .fold(DiffSchema::new(identity), |schema, key| {
            schema.numeric(key, Unit::Count)
        })
}

fn rules() -> Catalog {
    Catalog::new("user")
        .rule(
            ActionRule::new("password")
                .requires(&["name", "new-password"])
                .mutating(),
        )
        .rule(
            ActionRule::new("enable")
                .requires(&["name"])
                .when("state", "enabled")
                .mutating(),
        )
        .rule(
            ActionRule::new("disable")
                .requires(&["name"])
                .when("state", "disabled")
                .mutating(),
        )
        .rule(
            ActionRule::new("user-aging")
                .requires(&["name"])
                .when("aging", true)
                .mutating(),
        )
        .rule(ActionRule::new("aging").when("aging", true).mutating())
        .rule(ActionRule::new("strength").when("strength", true).mutating())
        .rule(ActionRule::new("account").requires(&["name"]).mutating())
}

fn policy_templates(catalog: TemplateCatalog) -> Result<TemplateCatalog> {
    Ok(catalog
        .with(
            "user-aging",
            Verb::Show,
            CommandSpec::shell("user password aging show $name")?,
        )
        .with(
            "user-aging",
            Verb::Set,
            CommandSpec::shell("user password aging set $name")?,
        )
        .with(
            "user-aging",
            Verb::Reset,
            CommandSpec::shell("user password aging reset $name")?,
        )
        .with(
            "aging",
            Verb::Show,
            CommandSpec::shell("user password aging option show")?,
        )
        .with(
            "aging",
            Verb::Set,
            CommandSpec::shell("user password aging option set")?,
        )
        .with(
            "aging",
            Verb::Reset,
            CommandSpec::shell("user password aging option reset")?,
        )
        .with(
            "strength",
            Verb::Show,
            CommandSpec::shell("user password strength show")?,
        )
        .with(
            "strength",
            Verb::Set,
            CommandSpec::shell("user password strength set")?,
        )
        .with(
            "strength",
            Verb::Reset,
            CommandSpec::shell("user password strength reset")?,
        ))
}

fn account_templates(catalog: TemplateCatalog) -> Result<TemplateCatalog> {
    Ok(catalog
        .with(
            "account",
            Verb::Show,
            CommandSpec::rest(Method::Get, "/api/v2/dd-systems/0/users/$name")?,
        )
        .with(
            "account",
            Verb::Create,
            CommandSpec::rest(Method::Post, "/api/v2/dd-systems/0/users")?
                .rename("user-password", "password"),
        )
        .with(
            "account",
            Verb::Mod,
            CommandSpec::shell("user change role $name $role")?,
        )
        .with("account", Verb::Disable, CommandSpec::shell("user disable $name")?)
        .with(
            "account",
            Verb::Destroy,
            CommandSpec::rest(Method::Delete, "/rest/v1.0/dd-systems/0/users/$name")?,
        )
        .with(
            "password",
            Verb::Run,
            CommandSpec::rest(Method::Put, "/rest/v1.0/dd-systems/0/users/$name")?
                .optional(&["user-password", "new-password"])
                .rename("user-password", "current-password"),
        )
        .with("enable", Verb::Run, CommandSpec::shell("user enable $name")?)
        .with("disable", Verb::Run, CommandSpec::shell("user disable $name")?))
}

pub fn kind() -> Result<ResourceKind> {
    let templates = policy_templates(account_templates(TemplateCatalog::new())?)?;

    let aging = AGING_LABELS
        .iter()
        .fold(aging_schema(&["aging"]), |schema, (key, label)| {
            schema.alias(key, label)
        });
    let strength = STRENGTH_LABELS.iter().fold(
        STRENGTH_NUMERIC
            .iter()
            .fold(DiffSchema::new(&["strength"]), |schema, key| {
                schema.numeric(key, Unit::Count)
            }),
        |schema, (key, label)| schema.alias(key, label),
    );
    let account = DiffSchema::new(&["name"])
        .create_only(&["user-password"])
        .drift(Verb::Mod)
        .absent_verb(Verb::Disable);

    let mut user_aging_columns = vec!["name", "last-pass-changed"];
    user_aging_columns.extend(AGING_KEYS);
    user_aging_columns.push("status");

    Ok(ResourceKind::new("user", rules(), templates)
        .options(
            "user-aging",
            Observation::table(&user_aging_columns).row("name", "name"),
            aging_schema(&["name", "aging"]),
        )
        .options("aging", Observation::auto(), aging)
        .options("strength", Observation::auto(), strength)
        .declarative(
            "account",
            Observation::json().absent_on_failure(),
            account,
        )
        .imperative())
}
