//! Diff engine: current vs desired state to ordered sub-actions
//!
//! One generic procedure serves every keyed resource; a [`DiffSchema`]
//! names which attributes identify the resource, which are lists, which
//! compare numerically, and which verbs express drift and absence.
//! Global resources use [`diff_toggle`] and [`diff_options`].

use crate::types::{
    Descriptor, Edit, Field, Member, Record, SubAction, TRANSPORT_KEYS, Value, Verb,
};
use log::debug;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

// ============================================================================
// Numeric Comparison
// ============================================================================

/// How a numeric attribute is read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    /// Plain integer (days, counts, stream limits)
    Count,
    /// Capacity, compared in MiB (`10 GiB` == `10240`)
    Mebibytes,
}

const SENTINELS: &[&str] = &["", "never", "none", "(none)", "unlimited"];

static CAPACITY: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)^(\d+(?:\.\d+)?)\s*(mib|gib|tib|pib)?$").ok()
});

/// Integer value of an appliance number, with "never"/"none" read as 0
pub fn numeric(raw: &str, unit: Unit) -> Option<i64> {
    let value = raw.trim();
    if SENTINELS.iter().any(|s| value.eq_ignore_ascii_case(s)) {
        return Some(0);
    }
    match unit {
        Unit::Count => value
            .parse::<i64>()
            .ok()
            .or_else(|| value.parse::<f64>().ok().map(|f| f as i64)),
        Unit::Mebibytes => {
            let caps = CAPACITY.as_ref()?.captures(value)?;
            let amount: f64 = caps.get(1)?.as_str().parse().ok()?;
            let scale = match caps.get(2).map(|m| m.as_str().to_ascii_lowercase()).as_deref() {
                None | Some("mib") => 1.0,
                Some("gib") => 1024.0,
                Some("tib") => 1024.0 * 1024.0,
                Some("pib") => 1024.0 * 1024.0 * 1024.0,
                Some(_) => return None,
            };
            Some((amount * scale).round() as i64)
        }
    }
}

const TRUTHY: &[&str] = &["true", "yes", "enabled", "on", "1"];

fn text_of(field: &Field) -> String {
    match field {
        Field::Text(s) => s.trim().to_string(),
        Field::List(items) => items.join(","),
        Field::Table(_) | Field::Nested(_) => String::new(),
    }
}

/// Whether an observed field holds a setting; numeric sentinels count as unset
fn is_set(field: &Field, unit: Option<Unit>) -> bool {
    let text = text_of(field);
    match unit {
        _ if text.is_empty() => false,
        Some(unit) => numeric(&text, unit) != Some(0),
        None => true,
    }
}

/// Whether a desired scalar already holds in the observed field
pub fn scalar_eq(desired: &Value, actual: &Field, unit: Option<Unit>) -> bool {
    if let Value::List(items) = desired {
        let mut want: Vec<String> = items.iter().map(Value::render).collect();
        let mut have = actual.values();
        want.sort();
        have.sort();
        return want == have;
    }

    let have = text_of(actual);
    if let Some(unit) = unit {
        if let (Some(a), Some(b)) = (numeric(&desired.render(), unit), numeric(&have, unit)) {
            return a == b;
        }
    }
    match desired {
        Value::Bool(b) => *b == TRUTHY.iter().any(|t| have.eq_ignore_ascii_case(t)),
        other => other.render() == have,
    }
}

// ============================================================================
// Schema
// ============================================================================

/// A list-valued attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListAttr {
    /// Descriptor key
    pub key: String,
    /// Field of a record element that identifies it (e.g. `clientid`)
    pub member_id: Option<String>,
    /// "Allow all" marker, exclusive with specific members
    pub wildcard: Option<String>,
}

impl ListAttr {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            member_id: None,
            wildcard: None,
        }
    }

    pub fn id(mut self, field: &str) -> Self {
        self.member_id = Some(field.to_string());
        self
    }

    pub fn wildcard(mut self, marker: &str) -> Self {
        self.wildcard = Some(marker.to_string());
        self
    }

    fn id_field(&self) -> &str {
        self.member_id.as_deref().unwrap_or("name")
    }

    /// Members named by a desired value
    fn desired_members(&self, value: &Value) -> Vec<Member> {
        value
            .items()
            .into_iter()
            .filter_map(|item| match item {
                Value::Map(map) => {
                    let id = map.text(self.id_field())?;
                    Some(Member::with_attrs(id, map.without(&[self.id_field()])))
                }
                scalar => Some(Member::new(scalar.render())),
            })
            .collect()
    }

    /// Members currently present in an observed field
    fn actual_members(&self, field: &Field) -> Vec<Member> {
        match field {
            Field::Table(rows) => rows
                .iter()
                .filter_map(|row| {
                    let id = row.get(self.id_field())?.as_text()?.to_string();
                    let attrs = row
                        .iter()
                        .filter(|(k, _)| k.as_str() != self.id_field())
                        .filter_map(|(k, v)| Some((k.clone(), Value::text(v.as_text()?))))
                        .collect();
                    Some(Member::with_attrs(id, attrs))
                })
                .collect(),
            Field::Text(s) => s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(Member::new)
                .collect(),
            Field::List(items) => items.iter().map(Member::new).collect(),
            Field::Nested(_) => Vec::new(),
        }
    }
}

/// Per-resource parameters of the generic diff
#[derive(Debug, Clone)]
pub struct DiffSchema {
    /// Keys that identify the resource
    pub identity: Vec<String>,
    pub lists: Vec<ListAttr>,
    pub numeric: BTreeMap<String, Unit>,
    /// Desired key to observed field name
    pub aliases: BTreeMap<String, String>,
    /// Attributes only used when creating (never compared)
    pub create_only: Vec<String>,
    /// Verb for scalar drift
    pub drift_verb: Verb,
    /// Verb for `absent` with nothing more specific to remove
    pub bare_absent: Option<Verb>,
    /// Reset scalar attributes when absent
    pub reset_on_absent: bool,
    /// Attribute naming the resource's new identity
    pub rename_key: Option<String>,
    /// Observed field/value marking a soft-deleted resource
    pub tombstone: Option<(String, String)>,
}

const FLAG_KEYS: &[&str] = &["destroy", "restart"];

impl DiffSchema {
    pub fn new(identity: &[&str]) -> Self {
        Self {
            identity: identity.iter().map(|k| (*k).to_string()).collect(),
            lists: Vec::new(),
            numeric: BTreeMap::new(),
            aliases: BTreeMap::new(),
            create_only: Vec::new(),
            drift_verb: Verb::Set,
            bare_absent: None,
            reset_on_absent: false,
            rename_key: None,
            tombstone: None,
        }
    }

    pub fn list(mut self, list: ListAttr) -> Self {
        self.lists.push(list);
        self
    }

    pub fn numeric(mut self, key: &str, unit: Unit) -> Self {
        self.numeric.insert(key.to_string(), unit);
        self
    }

    pub fn alias(mut self, key: &str, field: &str) -> Self {
        self.aliases.insert(key.to_string(), field.to_string());
        self
    }

    pub fn create_only(mut self, keys: &[&str]) -> Self {
        self.create_only
            .extend(keys.iter().map(|k| (*k).to_string()));
        self
    }

    pub fn drift(mut self, verb: Verb) -> Self {
        self.drift_verb = verb;
        self
    }

    pub fn absent_verb(mut self, verb: Verb) -> Self {
        self.bare_absent = Some(verb);
        self
    }

    pub fn reset_on_absent(mut self) -> Self {
        self.reset_on_absent = true;
        self
    }

    pub fn rename(mut self, key: &str) -> Self {
        self.rename_key = Some(key.to_string());
        self
    }

    pub fn tombstone(mut self, field: &str, value: &str) -> Self {
        self.tombstone = Some((field.to_string(), value.to_string()));
        self
    }

    fn list_attr(&self, key: &str) -> Option<&ListAttr> {
        self.lists.iter().find(|l| l.key == key)
    }

    fn field_name<'a>(&'a self, key: &'a str) -> &'a str {
        self.aliases.get(key).map_or(key, String::as_str)
    }

    /// Attributes that describe the resource (no transport, flag or rename keys)
    fn attributes(&self, desired: &Descriptor) -> Descriptor {
        let mut skip: Vec<&str> = TRANSPORT_KEYS.to_vec();
        skip.extend(FLAG_KEYS);
        if let Some(rename) = &self.rename_key {
            skip.push(rename);
        }
        desired.without(&skip)
    }

    fn is_tombstoned(&self, actual: &Record) -> bool {
        self.tombstone.as_ref().is_some_and(|(field, value)| {
            actual
                .get(field)
                .and_then(Field::as_text)
                .is_some_and(|v| v == value)
        })
    }
}

// ============================================================================
// Diff
// ============================================================================

fn create(desired: &Descriptor, schema: &DiffSchema) -> SubAction {
    let mut sub = SubAction::new(Verb::Create);
    let attrs = schema.attributes(desired);
    for (key, value) in attrs.iter() {
        if schema.list_attr(key).is_none() {
            sub.push(Edit::assign(key, value.clone()));
        }
    }
    for list in &schema.lists {
        if let Some(value) = attrs.get(&list.key) {
            for member in list.desired_members(value) {
                sub.push(Edit::insert(&list.key, member));
            }
        }
    }
    sub
}

fn sorted(mut members: Vec<Member>) -> Vec<Member> {
    members.sort_by(|a, b| a.id.cmp(&b.id));
    members.dedup_by(|a, b| a.id == b.id);
    members
}

/// Whether an observed member already carries every desired attribute
fn attrs_hold(desired: &Member, actual: &Member) -> bool {
    desired.attrs.iter().all(|(k, v)| {
        actual
            .attrs
            .get(k)
            .is_some_and(|have| scalar_eq(v, &Field::Text(have.render()), None))
    })
}

fn reconcile_present(
    desired: &Descriptor,
    actual: &Record,
    schema: &DiffSchema,
    out: &mut Vec<SubAction>,
) {
    let attrs = schema.attributes(desired);
    let mut modify = SubAction::new(Verb::Mod);
    let mut add = SubAction::new(Verb::Add);
    let mut drift = SubAction::new(schema.drift_verb);

    for (key, value) in attrs.iter() {
        if schema.identity.contains(key)
            || schema.create_only.contains(key)
            || schema.list_attr(key).is_some()
        {
            continue;
        }
        match actual.get(schema.field_name(key)) {
            Some(field) => {
                let unit = schema.numeric.get(key).copied();
                if !scalar_eq(value, field, unit) {
                    drift.push(Edit::assign(key, value.clone()));
                }
            }
            None => debug!("Attribute '{key}' is not reported by the appliance, skipping"),
        }
    }

    for list in &schema.lists {
        let Some(value) = attrs.get(&list.key) else {
            continue;
        };
        let want = sorted(list.desired_members(value));
        let have = sorted(
            actual
                .get(schema.field_name(&list.key))
                .map(|f| list.actual_members(f))
                .unwrap_or_default(),
        );

        let inserts: Vec<&Member> = want
            .iter()
            .filter(|w| !have.iter().any(|h| h.id == w.id))
            .collect();
        let updates: Vec<&Member> = want
            .iter()
            .filter(|w| !w.attrs.is_empty())
            .filter(|w| have.iter().any(|h| h.id == w.id && !attrs_hold(w, h)))
            .collect();

        let displaced = list.wildcard.as_ref().filter(|marker| {
            !inserts.is_empty()
                && have.iter().any(|h| &h.id == *marker)
                && !want.iter().any(|w| &w.id == *marker)
        });

        if let Some(marker) = displaced {
            modify.push(Edit::remove(&list.key, Member::new(marker.as_str())));
            for member in &inserts {
                modify.push(Edit::insert(&list.key, (*member).clone()));
            }
        } else {
            for member in &inserts {
                add.push(Edit::insert(&list.key, (*member).clone()));
            }
        }
        for member in updates {
            modify.push(Edit::update(&list.key, member.clone()));
        }
    }

    for sub in [modify, add, drift] {
        if !sub.edits.is_empty() {
            out.push(sub);
        }
    }

    if let Some(rename) = &schema.rename_key {
        if let Some(target) = desired.get(rename) {
            let current = schema
                .identity
                .first()
                .and_then(|id| desired.text(id))
                .unwrap_or_default();
            if target.render() != current {
                out.push(SubAction::new(Verb::Rename).with(Edit::assign(rename, target.clone())));
            }
        }
    }
}

fn reconcile_absent(
    desired: &Descriptor,
    actual: &Record,
    schema: &DiffSchema,
    out: &mut Vec<SubAction>,
) {
    if desired.flag("destroy") {
        out.push(SubAction::new(Verb::Destroy));
        return;
    }

    let attrs = schema.attributes(desired);
    let mut removal = SubAction::new(Verb::Del);
    let mut named_lists = false;

    for list in &schema.lists {
        let Some(value) = attrs.get(&list.key) else {
            continue;
        };
        named_lists = true;
        let have = list.actual_members(
            actual
                .get(schema.field_name(&list.key))
                .unwrap_or(&Field::List(Vec::new())),
        );
        for member in sorted(list.desired_members(value)) {
            if have.iter().any(|h| h.id == member.id) {
                removal.push(Edit::remove(&list.key, member));
            }
        }
    }

    if named_lists {
        if !removal.edits.is_empty() {
            out.push(removal);
        }
        return;
    }

    if schema.reset_on_absent {
        let mut reset = SubAction::new(Verb::Reset);
        for (key, value) in attrs.iter() {
            if schema.identity.contains(key) {
                continue;
            }
            let unit = schema.numeric.get(key).copied();
            let set = actual
                .get(schema.field_name(key))
                .is_some_and(|f| is_set(f, unit));
            if set {
                reset.push(Edit::assign(key, value.clone()));
            }
        }
        if !reset.edits.is_empty() {
            out.push(reset);
            return;
        }
    }

    if let Some(verb) = schema.bare_absent {
        out.push(SubAction::new(verb));
    }
}

/// Compute the ordered sub-actions reconciling `actual` with `desired`
///
/// `actual` is `None` when the resource does not exist. The result is
/// sorted by verb so `undelete` and `create` always come first and
/// `rename` last.
pub fn diff(desired: &Descriptor, actual: Option<&Record>, schema: &DiffSchema) -> Vec<SubAction> {
    let present = desired.wants_present();
    let mut out = Vec::new();

    match actual {
        None if present => out.push(create(desired, schema)),
        None => {}
        Some(record) if schema.is_tombstoned(record) => {
            if present {
                out.push(SubAction::new(Verb::Undelete));
                reconcile_present(desired, record, schema, &mut out);
            }
        }
        Some(record) if present => reconcile_present(desired, record, schema, &mut out),
        Some(record) => reconcile_absent(desired, record, schema, &mut out),
    }

    out.sort_by_key(|sub| sub.verb);
    out
}

/// Reconcile an on/off switch
///
/// A `restart: true` attribute restarts the service once it is enabled.
pub fn diff_toggle(desired: &Descriptor, enabled: bool) -> Vec<SubAction> {
    let mut out = Vec::new();
    match (desired.wants_present(), enabled) {
        (true, false) => out.push(SubAction::new(Verb::Enable)),
        (false, true) => out.push(SubAction::new(Verb::Disable)),
        _ => {}
    }
    if desired.wants_present() && desired.flag("restart") {
        out.push(SubAction::new(Verb::Restart));
    }
    out
}

/// Reconcile a switch kept per instance
///
/// Each addressed instance gets its own sub-action carrying `key`, so
/// enabling two versions runs two commands.
pub fn diff_switches(
    desired: &Descriptor,
    key: &str,
    states: &BTreeMap<String, bool>,
) -> Vec<SubAction> {
    let present = desired.wants_present();
    let restart = present && desired.flag("restart");
    let mut out: Vec<SubAction> = states
        .iter()
        .filter_map(|(instance, on)| {
            let verb = match (present, *on) {
                (true, false) => Verb::Enable,
                (false, true) => Verb::Disable,
                (true, true) if restart => Verb::Restart,
                _ => return None,
            };
            Some(SubAction::new(verb).with(Edit::assign(key, Value::text(instance.as_str()))))
        })
        .collect();
    out.sort_by_key(|sub| sub.verb);
    out
}

/// Reconcile a flat option map
///
/// `present` sets every mismatched option in one `set`; `absent` resets
/// the named options that currently hold a value.
pub fn diff_options(desired: &Descriptor, actual: &Record, schema: &DiffSchema) -> Vec<SubAction> {
    let attrs = schema.attributes(desired);
    let present = desired.wants_present();
    let mut sub = SubAction::new(if present { Verb::Set } else { Verb::Reset });

    for (key, value) in attrs.iter() {
        if schema.identity.contains(key) {
            continue;
        }
        let field = actual.get(schema.field_name(key));
        if present {
            let unit = schema.numeric.get(key).copied();
            let holds = field.is_some_and(|f| scalar_eq(value, f, unit));
            if !holds {
                sub.push(Edit::assign(key, value.clone()));
            }
        } else if field.is_some_and(|f| is_set(f, schema.numeric.get(key).copied())) {
            sub.push(Edit::assign(key, value.clone()));
        }
    }

    if sub.edits.is_empty() {
        Vec::new()
    } else {
        vec![sub]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn export_schema() -> DiffSchema {
        DiffSchema::new(&["name"])
            .list(ListAttr::new("clients").id("clientid").wildcard("*"))
            .list(ListAttr::new("referrals").id("referral"))
            .create_only(&["path"])
            .rename("new-export-name")
    }

    fn desired(json: serde_json::Value) -> Descriptor {
        serde_json::from_value::<Descriptor>(json)
            .unwrap()
            .normalize()
            .unwrap()
    }

    fn client_table(ids: &[&str]) -> Record {
        let rows = ids
            .iter()
            .map(|id| {
                let mut row = Record::new();
                row.insert("clientid".into(), Field::from(*id));
                row.insert("options".into(), Field::from("sec=sys,rw"));
                row
            })
            .collect();
        let mut record = Record::new();
        record.insert("name".into(), Field::from("backup"));
        record.insert("path".into(), Field::from("/data/col1/backup"));
        record.insert("clients".into(), Field::Table(rows));
        record
    }

    #[test]
    fn test_list_add_only_missing_members() {
        let d = desired(serde_json::json!({
            "name": "backup", "state": "present", "clients": ["10.0.0.2", "10.0.0.3"]
        }));
        let subs = diff(&d, Some(&client_table(&["10.0.0.3"])), &export_schema());
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].verb, Verb::Add);
        let mut expected = Descriptor::new();
        expected.insert("clients", Value::list(["10.0.0.2"]));
        assert_eq!(subs[0].fragment(), expected);
    }

    #[test]
    fn test_wildcard_replaced_within_one_mod() {
        let d = desired(serde_json::json!({
            "name": "backup", "state": "present", "clients": ["10.0.0.5"]
        }));
        let subs = diff(&d, Some(&client_table(&["*"])), &export_schema());
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].verb, Verb::Mod);
        assert_eq!(
            subs[0].edits,
            vec![
                Edit::remove("clients", Member::new("*")),
                Edit::insert("clients", Member::new("10.0.0.5")),
            ]
        );
    }

    #[test]
    fn test_absent_member_not_present_is_noop() {
        let d = desired(serde_json::json!({
            "name": "backup", "state": "absent", "clients": ["10.0.0.9"]
        }));
        assert!(diff(&d, Some(&client_table(&["10.0.0.3"])), &export_schema()).is_empty());
    }

    #[test]
    fn test_absent_removes_present_members() {
        let d = desired(serde_json::json!({
            "name": "backup", "state": "absent", "clients": ["10.0.0.3", "10.0.0.9"]
        }));
        let subs = diff(&d, Some(&client_table(&["10.0.0.3"])), &export_schema());
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].verb, Verb::Del);
        assert_eq!(
            subs[0].edits,
            vec![Edit::remove("clients", Member::new("10.0.0.3"))]
        );
    }

    #[test]
    fn test_destroy_flag_wins_when_absent() {
        let d = desired(serde_json::json!({
            "name": "backup", "state": "absent", "destroy": true, "clients": ["10.0.0.3"]
        }));
        let subs = diff(&d, Some(&client_table(&["10.0.0.3"])), &export_schema());
        assert_eq!(subs, vec![SubAction::new(Verb::Destroy)]);
    }

    #[test]
    fn test_missing_resource_present_creates() {
        let d = desired(serde_json::json!({
            "name": "backup", "state": "present", "path": "/data/col1/backup",
            "clients": [{"clientid": "10.0.0.5", "options": "sec=sys"}],
            "port": 22
        }));
        let subs = diff(&d, None, &export_schema());
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].verb, Verb::Create);
        let keys: Vec<&str> = subs[0].edits.iter().map(Edit::key).collect();
        assert_eq!(keys, vec!["name", "path", "clients"]);
        assert!(matches!(&subs[0].edits[2], Edit::Insert { member, .. } if member.attrs.contains("options")));
    }

    #[test]
    fn test_missing_resource_absent_is_noop() {
        let d = desired(serde_json::json!({"name": "backup", "state": "absent"}));
        assert!(diff(&d, None, &export_schema()).is_empty());
    }

    #[test]
    fn test_member_attribute_change_updates() {
        let d = desired(serde_json::json!({
            "name": "backup", "state": "present",
            "clients": [{"clientid": "10.0.0.3", "options": "sec=sys,ro"}]
        }));
        let subs = diff(&d, Some(&client_table(&["10.0.0.3"])), &export_schema());
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].verb, Verb::Mod);
        assert!(matches!(&subs[0].edits[0], Edit::Update { member, .. } if member.id == "10.0.0.3"));
    }

    #[test]
    fn test_rename_comes_last() {
        let d = desired(serde_json::json!({
            "name": "backup", "state": "present", "clients": ["10.0.0.2"],
            "new_export_name": "backup2"
        }));
        let subs = diff(&d, Some(&client_table(&["10.0.0.3"])), &export_schema());
        let verbs: Vec<Verb> = subs.iter().map(|s| s.verb).collect();
        assert_eq!(verbs, vec![Verb::Add, Verb::Rename]);
    }

    #[test]
    fn test_idempotent_after_noop() {
        let d = desired(serde_json::json!({
            "name": "backup", "state": "present", "clients": ["10.0.0.3"], "path": "/x"
        }));
        let actual = client_table(&["10.0.0.3"]);
        assert!(diff(&d, Some(&actual), &export_schema()).is_empty());
        assert!(diff(&d, Some(&actual), &export_schema()).is_empty());
    }

    #[test]
    fn test_scalar_drift_and_numeric_sentinels() {
        let schema = DiffSchema::new(&["name"])
            .numeric("max-days-between-change", Unit::Count)
            .drift(Verb::Set);
        let mut actual = Record::new();
        actual.insert("max-days-between-change".into(), Field::from("never"));
        actual.insert("warn-days-before-expire".into(), Field::from("7"));

        let d = desired(serde_json::json!({
            "name": "bob", "max-days-between-change": 0, "warn-days-before-expire": "7"
        }));
        assert!(diff(&d, Some(&actual), &schema).is_empty());

        let d = desired(serde_json::json!({"name": "bob", "max-days-between-change": 90}));
        let subs = diff(&d, Some(&actual), &schema);
        assert_eq!(subs[0].verb, Verb::Set);
        assert_eq!(subs[0].edits, vec![Edit::assign("max-days-between-change", Value::Int(90))]);
    }

    #[test]
    fn test_tombstone_undeletes_first() {
        let schema = DiffSchema::new(&["mtree-path"]).tombstone("status", "D");
        let mut actual = Record::new();
        actual.insert("status".into(), Field::from("D"));
        let d = desired(serde_json::json!({"mtree-path": "/data/col1/a"}));
        assert_eq!(diff(&d, Some(&actual), &schema), vec![SubAction::new(Verb::Undelete)]);

        let d = desired(serde_json::json!({"mtree-path": "/data/col1/a", "state": "absent"}));
        assert!(diff(&d, Some(&actual), &schema).is_empty());
    }

    #[test]
    fn test_bare_absent_verb() {
        let schema = DiffSchema::new(&["share"]).absent_verb(Verb::Disable);
        let d = desired(serde_json::json!({"share": "s1", "state": "absent"}));
        assert_eq!(
            diff(&d, Some(&Record::new()), &schema),
            vec![SubAction::new(Verb::Disable)]
        );
    }

    #[test]
    fn test_reset_on_absent_only_set_values() {
        let schema = DiffSchema::new(&["mtree"])
            .reset_on_absent()
            .absent_verb(Verb::Del);
        let mut actual = Record::new();
        actual.insert("soft-limit".into(), Field::from("10240"));
        actual.insert("hard-limit".into(), Field::from(""));
        let d = desired(serde_json::json!({
            "mtree": "/data/col1/a", "state": "absent", "soft-limit": "10 GiB", "hard-limit": "20 GiB"
        }));
        let subs = diff(&d, Some(&actual), &schema);
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].verb, Verb::Reset);
        assert_eq!(subs[0].edits.len(), 1);
        assert_eq!(subs[0].edits[0].key(), "soft-limit");
    }

    #[test]
    fn test_numeric_capacity_units() {
        assert_eq!(numeric("10 GiB", Unit::Mebibytes), Some(10240));
        assert_eq!(numeric("1 TiB", Unit::Mebibytes), Some(1_048_576));
        assert_eq!(numeric("512", Unit::Mebibytes), Some(512));
        assert_eq!(numeric("none", Unit::Mebibytes), Some(0));
        assert_eq!(numeric("(none)", Unit::Count), Some(0));
        assert_eq!(numeric("abc", Unit::Count), None);
    }

    #[test]
    fn test_scalar_eq_bool_and_lists() {
        assert!(scalar_eq(&Value::Bool(true), &Field::from("enabled"), None));
        assert!(!scalar_eq(&Value::Bool(true), &Field::from("disabled"), None));
        assert!(scalar_eq(
            &Value::list(["b", "a"]),
            &Field::List(vec!["a".into(), "b".into()]),
            None
        ));
    }

    #[test]
    fn test_switches_per_instance() {
        let states = BTreeMap::from([("3".to_string(), true), ("4".to_string(), false)]);
        let on = desired(serde_json::json!({"service": true}));
        assert_eq!(
            diff_switches(&on, "version", &states),
            vec![SubAction::new(Verb::Enable).with(Edit::assign("version", "4"))]
        );

        let off = desired(serde_json::json!({"service": true, "state": "absent"}));
        assert_eq!(
            diff_switches(&off, "version", &states),
            vec![SubAction::new(Verb::Disable).with(Edit::assign("version", "3"))]
        );

        let restart = desired(serde_json::json!({"service": true, "restart": true}));
        assert_eq!(
            diff_switches(&restart, "version", &states),
            vec![
                SubAction::new(Verb::Enable).with(Edit::assign("version", "4")),
                SubAction::new(Verb::Restart).with(Edit::assign("version", "3")),
            ]
        );
    }

    #[test]
    fn test_toggle() {
        let on = desired(serde_json::json!({"state": "present"}));
        let off = desired(serde_json::json!({"state": "absent"}));
        assert_eq!(diff_toggle(&on, false), vec![SubAction::new(Verb::Enable)]);
        assert!(diff_toggle(&on, true).is_empty());
        assert_eq!(diff_toggle(&off, true), vec![SubAction::new(Verb::Disable)]);
        assert!(diff_toggle(&off, false).is_empty());

        let restart = desired(serde_json::json!({"state": "present", "restart": true}));
        assert_eq!(diff_toggle(&restart, true), vec![SubAction::new(Verb::Restart)]);
    }

    #[test]
    fn test_options_set_and_reset() {
        let schema = DiffSchema::new(&[]);
        let mut actual = Record::new();
        actual.insert("min-length".into(), Field::from("6"));
        actual.insert("min-one-digit".into(), Field::from("0"));

        let d = desired(serde_json::json!({"min-length": "8", "min-one-digit": "0"}));
        let subs = diff_options(&d, &actual, &schema);
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].verb, Verb::Set);
        assert_eq!(subs[0].edits, vec![Edit::assign("min-length", "8")]);

        let d = desired(serde_json::json!({"min-length": "8", "state": "absent"}));
        let subs = diff_options(&d, &actual, &schema);
        assert_eq!(subs[0].verb, Verb::Reset);
    }

    #[test]
    fn test_options_reset_skips_numeric_sentinels() {
        let schema = DiffSchema::new(&["mtrees"])
            .numeric("soft-limit", Unit::Mebibytes)
            .numeric("hard-limit", Unit::Mebibytes);
        let mut actual = Record::new();
        actual.insert("soft-limit".into(), Field::from("none"));
        actual.insert("hard-limit".into(), Field::from("20480"));

        let d = desired(serde_json::json!({
            "mtrees": "/data/col1/a", "soft-limit": "1 GiB", "hard-limit": "1 GiB", "state": "absent"
        }));
        let subs = diff_options(&d, &actual, &schema);
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].edits.len(), 1);
        assert_eq!(subs[0].edits[0].key(), "hard-limit");
    }
}
