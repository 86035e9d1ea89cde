//! Reading actual state out of a query response
//!
//! An [`Observation`] says how to parse the response body (a [`Reader`])
//! and which part of it describes the resource (a [`Locator`]). A kind's
//! absent markers turn a rejected read, or an unstructured reply, into
//! [`Observed::Absent`].

use crate::error::{Error, Result};
use crate::normalize::{canonical_label, export_detail, from_json, normalize};
use crate::types::{Body, Descriptor, Field, Parsed, Record, Response};
use log::debug;
use std::collections::BTreeMap;

/// Descriptor value addressing every instance of a per-instance switch
pub const ALL_INSTANCES: &str = "all";

/// Field holding the raw lines of output no layout matched
const RAW_FIELD: &str = "output";

/// Actual state of the addressed resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observed {
    Absent,
    Present(Record),
    /// A service switch and whether it is on
    Toggle(bool),
    /// A switch kept per instance: each addressed instance and whether it is on
    Switches {
        key: String,
        states: BTreeMap<String, bool>,
    },
}

impl Observed {
    pub fn record(&self) -> Option<&Record> {
        match self {
            Self::Present(record) => Some(record),
            _ => None,
        }
    }
}

/// How the response body is parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reader {
    /// The five-shape shell normalizer, optionally with fixed column names
    Auto { columns: Option<Vec<String>> },
    /// `nfs export show detailed` layout
    ExportDetail,
    /// A REST JSON body
    Json,
    /// A JSON object whose `{key, value}` array is flattened into its
    /// top-level fields; a key seen twice becomes a list
    JsonOptions {
        array: String,
        key: String,
        value: String,
    },
}

/// Which part of the parsed output is the resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// The whole (single) record
    Whole,
    /// The row whose `column` equals the descriptor's `key`
    Row { column: String, key: String },
    /// Rows matching the descriptor turned into one `option -> value` record
    Pivot {
        filter: Option<(String, String)>,
        option: String,
        value: String,
    },
    /// Every row's `column` gathered into one list field named `into`
    Collect { column: String, into: String },
}

/// A switch the appliance keeps separately per instance, e.g. per protocol version
///
/// Each instance has its own status field, named by `prefix`, the
/// instance and `suffix` (`v3Status`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instances {
    /// Descriptor key naming the instance
    pub key: String,
    /// Instance addressed when the descriptor names none
    pub default: String,
    pub prefix: String,
    pub suffix: String,
}

impl Instances {
    fn instance_of<'a>(&self, field: &'a str) -> Option<&'a str> {
        field
            .strip_prefix(self.prefix.as_str())?
            .strip_suffix(self.suffix.as_str())
            .filter(|i| !i.is_empty())
    }

    fn states(&self, record: Option<&Record>, desired: &Descriptor) -> Observed {
        let wanted = desired.text(&self.key).unwrap_or_else(|| self.default.clone());
        let states = record
            .into_iter()
            .flat_map(|r| r.iter())
            .filter_map(|(name, field)| Some((self.instance_of(name)?, field)))
            .filter(|(instance, _)| wanted == ALL_INSTANCES || wanted == *instance)
            .map(|(instance, field)| (instance.to_string(), field_is_on(field)))
            .collect();
        Observed::Switches {
            key: self.key.clone(),
            states,
        }
    }
}

/// Read recipe for one action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub reader: Reader,
    pub locator: Locator,
    /// Response text meaning "no such resource"
    pub absent_markers: Vec<String>,
    /// A failed read means the resource does not exist
    pub absent_on_failure: bool,
    /// Read as an on/off switch from the named status field
    pub toggle: Option<String>,
    /// Read as one switch per instance
    pub instances: Option<Instances>,
}

impl Observation {
    pub fn new(reader: Reader, locator: Locator) -> Self {
        Self {
            reader,
            locator,
            absent_markers: Vec::new(),
            absent_on_failure: false,
            toggle: None,
            instances: None,
        }
    }

    /// Five-shape parse of the whole output
    pub fn auto() -> Self {
        Self::new(Reader::Auto { columns: None }, Locator::Whole)
    }

    /// Dashed table with fixed column names
    pub fn table(columns: &[&str]) -> Self {
        Self::new(
            Reader::Auto {
                columns: Some(columns.iter().map(|c| (*c).to_string()).collect()),
            },
            Locator::Whole,
        )
    }

    pub fn json() -> Self {
        Self::new(Reader::Json, Locator::Whole)
    }

    pub fn json_options(array: &str, key: &str, value: &str) -> Self {
        Self::new(
            Reader::JsonOptions {
                array: array.to_string(),
                key: key.to_string(),
                value: value.to_string(),
            },
            Locator::Whole,
        )
    }

    pub fn export_detail() -> Self {
        Self::new(Reader::ExportDetail, Locator::Whole)
    }

    pub fn row(mut self, column: &str, key: &str) -> Self {
        self.locator = Locator::Row {
            column: column.to_string(),
            key: key.to_string(),
        };
        self
    }

    pub fn pivot(mut self, filter: Option<(&str, &str)>, option: &str, value: &str) -> Self {
        self.locator = Locator::Pivot {
            filter: filter.map(|(c, k)| (c.to_string(), k.to_string())),
            option: option.to_string(),
            value: value.to_string(),
        };
        self
    }

    pub fn collect(mut self, column: &str, into: &str) -> Self {
        self.locator = Locator::Collect {
            column: column.to_string(),
            into: into.to_string(),
        };
        self
    }

    pub fn absent_marker(mut self, marker: &str) -> Self {
        self.absent_markers.push(marker.to_string());
        self
    }

    pub fn absent_on_failure(mut self) -> Self {
        self.absent_on_failure = true;
        self
    }

    /// Read the located record as a switch
    ///
    /// The first switch word of `field` decides; output with no fields
    /// at all is read from its raw lines.
    pub fn toggle(mut self, field: &str) -> Self {
        self.toggle = Some(field.to_string());
        self
    }

    /// Read one switch per instance from fields named by `pattern`, `{}`
    /// standing for the instance
    pub fn per_instance(mut self, key: &str, default: &str, pattern: &str) -> Self {
        let (prefix, suffix) = pattern.split_once("{}").unwrap_or((pattern, ""));
        self.instances = Some(Instances {
            key: key.to_string(),
            default: default.to_string(),
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
        });
        self
    }

    fn marks_absent(&self, text: &str) -> bool {
        self.absent_markers.iter().any(|m| text.contains(m.as_str()))
    }

    fn read(&self, body: &Body) -> Result<Parsed> {
        match &self.reader {
            Reader::Auto { columns } => Ok(normalize(&body.text(), columns.as_deref())),
            Reader::ExportDetail => {
                let record = export_detail(&body.text());
                let named = record
                    .get("name")
                    .and_then(Field::as_text)
                    .is_some_and(|n| !n.is_empty());
                Ok(if named {
                    Parsed::One(record)
                } else {
                    Parsed::Many(Vec::new())
                })
            }
            Reader::Json => Ok(from_json(&json_body(body)?)),
            Reader::JsonOptions { array, key, value } => {
                let json = json_body(body)?;
                let mut record = match from_json(&json) {
                    Parsed::One(top) => top,
                    Parsed::Many(_) => Record::new(),
                };
                record.remove(&array.replace('_', "-"));
                if let Some(items) = json.get(array).and_then(serde_json::Value::as_array) {
                    for item in items {
                        let Some(name) = item.get(key).and_then(serde_json::Value::as_str) else {
                            continue;
                        };
                        let text = match item.get(value) {
                            Some(serde_json::Value::String(s)) => s.clone(),
                            Some(serde_json::Value::Null) | None => String::new(),
                            Some(other) => other.to_string(),
                        };
                        // repeated keys accumulate into a list
                        let label = canonical_label(name);
                        let field = match record.remove(&label) {
                            Some(Field::Text(first)) => Field::List(vec![first, text]),
                            Some(Field::List(mut values)) => {
                                values.push(text);
                                Field::List(values)
                            }
                            _ => Field::Text(text),
                        };
                        record.insert(label, field);
                    }
                }
                Ok(Parsed::One(record))
            }
        }
    }

    fn locate(&self, parsed: Parsed, desired: &Descriptor) -> Option<Record> {
        match &self.locator {
            Locator::Whole => match parsed {
                Parsed::One(record) => Some(record),
                Parsed::Many(mut rows) => {
                    if rows.is_empty() {
                        None
                    } else {
                        Some(rows.remove(0))
                    }
                }
            },
            Locator::Row { column, key } => {
                let wanted = desired.text(key)?;
                parsed
                    .rows()
                    .into_iter()
                    .find(|row| cell(row, column) == Some(wanted.as_str()))
                    .cloned()
            }
            Locator::Pivot {
                filter,
                option,
                value,
            } => {
                let wanted = match filter {
                    Some((column, key)) => Some((column, desired.text(key)?)),
                    None => None,
                };
                let record: Record = parsed
                    .rows()
                    .into_iter()
                    .filter(|row| {
                        wanted
                            .as_ref()
                            .is_none_or(|(column, v)| cell(row, column) == Some(v.as_str()))
                    })
                    .filter_map(|row| {
                        let name = cell(row, option)?;
                        let field = row.get(value).cloned().unwrap_or(Field::Text(String::new()));
                        Some((canonical_label(name), field))
                    })
                    .collect();
                (!record.is_empty()).then_some(record)
            }
            Locator::Collect { column, into } => {
                let values = parsed
                    .rows()
                    .into_iter()
                    .filter_map(|row| cell(row, column))
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
                    .collect();
                let mut record = Record::new();
                record.insert(into.clone(), Field::List(values));
                Some(record)
            }
        }
    }

    /// Turn a query response into the resource's actual state
    ///
    /// A failed read is a remote error unless its text carries an absent
    /// marker or the observation treats failed reads as absence. On a
    /// successful read the markers only count when the output held no
    /// structured record.
    pub fn observe(&self, response: &Response, desired: &Descriptor) -> Result<Observed> {
        let text = response.body.text();
        if !response.success {
            if self.marks_absent(&text) {
                debug!("Query failed with an absent marker");
                return Ok(self.absent(desired));
            }
            if self.absent_on_failure {
                debug!("Query failed, treating the resource as absent");
                return Ok(self.absent(desired));
            }
            return Err(Error::Remote { message: text });
        }

        let located = self.locate(self.read(&response.body)?, desired);
        let structured = located.as_ref().is_some_and(|r| !is_raw(r));
        if !structured && self.marks_absent(&text) {
            debug!("Query output carries an absent marker");
            return Ok(self.absent(desired));
        }

        if let Some(instances) = &self.instances {
            return Ok(instances.states(located.as_ref(), desired));
        }
        Ok(match (&self.toggle, located) {
            (Some(field), record) => Observed::Toggle(
                record
                    .as_ref()
                    .is_some_and(|r| switch_is_on(r, field)),
            ),
            (None, Some(record)) => Observed::Present(record),
            (None, None) => Observed::Absent,
        })
    }

    fn absent(&self, desired: &Descriptor) -> Observed {
        match (&self.instances, &self.toggle) {
            (Some(instances), _) => instances.states(None, desired),
            (None, Some(_)) => Observed::Toggle(false),
            (None, None) => Observed::Absent,
        }
    }
}

/// Output kept as raw lines only
fn is_raw(record: &Record) -> bool {
    record.len() == 1 && record.contains_key(RAW_FIELD)
}

fn cell<'a>(row: &'a Record, column: &str) -> Option<&'a str> {
    row.get(column).and_then(Field::as_text).map(str::trim)
}

fn json_body(body: &Body) -> Result<serde_json::Value> {
    match body {
        Body::Json(value) => Ok(value.clone()),
        Body::Text(text) if text.trim().is_empty() => Ok(serde_json::Value::Null),
        Body::Text(text) => Ok(serde_json::from_str(text)?),
    }
}

const ON_WORDS: &[&str] = &["enabled", "running", "yes", "true", "on", "active"];
const OFF_WORDS: &[&str] = &["disabled", "not", "no", "false", "off", "inactive"];

/// The first switch word in a status phrase, if any
///
/// `enabled, not synchronized` reads as on; `is not running` as off.
fn switch_word(text: &str) -> Option<bool> {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_ascii_lowercase)
        .find_map(|w| {
            if ON_WORDS.contains(&w.as_str()) {
                Some(true)
            } else if OFF_WORDS.contains(&w.as_str()) {
                Some(false)
            } else {
                None
            }
        })
}

fn field_is_on(field: &Field) -> bool {
    match field {
        Field::Text(s) => switch_word(s).unwrap_or(false),
        Field::List(lines) => lines.iter().find_map(|l| switch_word(l)).unwrap_or(false),
        Field::Nested(inner) => switch_is_on(inner, "status"),
        Field::Table(_) => false,
    }
}

/// Whether a status record reads as switched on
fn switch_is_on(record: &Record, field: &str) -> bool {
    match record.get(field) {
        Some(f) => field_is_on(f),
        None if is_raw(record) => record.get(RAW_FIELD).is_some_and(field_is_on),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;

    fn desired(pairs: &[(&str, &str)]) -> Descriptor {
        Descriptor::from_pairs(pairs.iter().map(|(k, v)| (*k, Value::text(*v)))).unwrap()
    }

    const QUOTA: &str = "\
Mtree                 Pre-Comp (GiB)   Soft-Limit (MiB)   Hard-Limit (MiB)
-------------------   --------------   ----------------   ----------------
/data/col1/backup              120.0              10240              20480
/data/col1/archive               3.5               none               none
-------------------   --------------   ----------------   ----------------
";

    fn quota_observation() -> Observation {
        Observation::table(&["mtree", "pre-comp-gib", "soft-limit", "hard-limit"]).row("mtree", "mtree")
    }

    #[test]
    fn test_row_locator_finds_matching_row() {
        let obs = quota_observation();
        let observed = obs
            .observe(&Response::ok_text(QUOTA), &desired(&[("mtree", "/data/col1/backup")]))
            .unwrap();
        let record = observed.record().unwrap();
        assert_eq!(record["soft-limit"], Field::from("10240"));
    }

    #[test]
    fn test_row_locator_missing_row_is_absent() {
        let obs = quota_observation();
        let observed = obs
            .observe(&Response::ok_text(QUOTA), &desired(&[("mtree", "/data/col1/other")]))
            .unwrap();
        assert_eq!(observed, Observed::Absent);
    }

    #[test]
    fn test_absent_marker_wins_over_failure() {
        let obs = Observation::export_detail().absent_marker("was not found");
        let response = Response::failed("**** NFS export \"backup\" was not found.");
        assert_eq!(obs.observe(&response, &Descriptor::new()).unwrap(), Observed::Absent);
    }

    #[test]
    fn test_marker_in_structured_output_is_ignored() {
        let obs = Observation::export_detail()
            .absent_marker("not found")
            .absent_marker("does not exist");
        let text = "\
NFS Export: /data/col1
Path: /data/col1
Comment: path not found on old system
";
        let observed = obs.observe(&Response::ok_text(text), &Descriptor::new()).unwrap();
        assert_eq!(observed.record().unwrap()["path"], Field::from("/data/col1"));
    }

    #[test]
    fn test_marker_in_raw_success_is_absent() {
        let obs = Observation::auto().absent_marker("does not exist");
        let response = Response::ok_text("**** Storage unit \"su1\" does not exist.");
        assert_eq!(obs.observe(&response, &Descriptor::new()).unwrap(), Observed::Absent);
    }

    #[test]
    fn test_unmarked_failure_without_markers_is_error() {
        let obs = Observation::auto();
        let response = Response::failed("**** NFS export \"backup\" was not found.");
        assert!(obs.observe(&response, &Descriptor::new()).unwrap_err().is_remote());
    }

    #[test]
    fn test_failed_read_is_remote_error() {
        let obs = Observation::auto();
        let err = obs
            .observe(&Response::failed("**** Permission denied"), &Descriptor::new())
            .unwrap_err();
        assert!(err.is_remote());
    }

    #[test]
    fn test_absent_on_failure() {
        let obs = Observation::json().absent_on_failure();
        let observed = obs
            .observe(&Response::failed("HTTP 404"), &Descriptor::new())
            .unwrap();
        assert_eq!(observed, Observed::Absent);
    }

    #[test]
    fn test_collect_gathers_column() {
        let text = "\
Sr   Timeserver
--   -----------
1    10.0.0.1
2    pool.ntp.org
--   -----------
";
        let obs = Observation::table(&["sr", "timeserver"]).collect("timeserver", "timeservers");
        let observed = obs.observe(&Response::ok_text(text), &Descriptor::new()).unwrap();
        assert_eq!(
            observed.record().unwrap()["timeservers"],
            Field::List(vec!["10.0.0.1".into(), "pool.ntp.org".into()])
        );
    }

    #[test]
    fn test_pivot_filters_rows() {
        let text = "\
Mtree Path           Setting            Value
------------------   ----------------   -------
/data/col1/a         anchoring          enabled
/data/col1/a         randomization      disabled
/data/col1/b         anchoring          disabled
------------------   ----------------   -------
";
        let obs = Observation::table(&["mtree-path", "setting", "value"]).pivot(
            Some(("mtree-path", "mtree-path")),
            "setting",
            "value",
        );
        let observed = obs
            .observe(&Response::ok_text(text), &desired(&[("mtree-path", "/data/col1/a")]))
            .unwrap();
        let record = observed.record().unwrap();
        assert_eq!(record.len(), 2);
        assert_eq!(record["anchoring"], Field::from("enabled"));
    }

    #[test]
    fn test_json_options_flatten() {
        let body = Body::Json(serde_json::json!({
            "options": [
                {"name": "min_length", "value": 8},
                {"name": "min_one_digit", "value": "1"}
            ]
        }));
        let obs = Observation::json_options("options", "name", "value");
        let observed = obs.observe(&Response::ok(body), &Descriptor::new()).unwrap();
        let record = observed.record().unwrap();
        assert_eq!(record["min-length"], Field::from("8"));
        assert_eq!(record["min-one-digit"], Field::from("1"));
    }

    #[test]
    fn test_json_options_repeated_keys_collect() {
        let body = Body::Json(serde_json::json!({
            "name": "share1",
            "option": [
                {"key": "clients", "value": "10.0.0.2"},
                {"key": "clients", "value": "10.0.0.3"},
                {"key": "browsing", "value": "yes"}
            ]
        }));
        let obs = Observation::json_options("option", "key", "value");
        let observed = obs.observe(&Response::ok(body), &Descriptor::new()).unwrap();
        let record = observed.record().unwrap();
        assert_eq!(
            record["clients"],
            Field::List(vec!["10.0.0.2".into(), "10.0.0.3".into()])
        );
        assert_eq!(record["browsing"], Field::from("yes"));
        assert_eq!(record["name"], Field::from("share1"));
        assert!(!record.contains_key("option"));
    }

    #[test]
    fn test_toggle_reads_raw_status() {
        let obs = Observation::auto().toggle("nfs-status");
        let on = obs
            .observe(&Response::ok_text("The NFS server is running."), &Descriptor::new())
            .unwrap();
        assert_eq!(on, Observed::Toggle(true));
        let off = obs
            .observe(&Response::ok_text("The NFS server is not running."), &Descriptor::new())
            .unwrap();
        assert_eq!(off, Observed::Toggle(false));
    }

    #[test]
    fn test_toggle_reads_json_field() {
        let obs = Observation::json().toggle("status");
        let body = Body::Json(serde_json::json!({"status": "enabled"}));
        assert_eq!(
            obs.observe(&Response::ok(body), &Descriptor::new()).unwrap(),
            Observed::Toggle(true)
        );
    }

    #[test]
    fn test_toggle_first_switch_word_decides() {
        let obs = Observation::auto().toggle("ntp-status");
        let on = obs
            .observe(
                &Response::ok_text("NTP status: enabled, not synchronized\n"),
                &Descriptor::new(),
            )
            .unwrap();
        assert_eq!(on, Observed::Toggle(true));
    }

    #[test]
    fn test_toggle_ignores_other_fields() {
        let obs = Observation::auto().toggle("dd-boost-status");
        let text = "DD Boost status: disabled\nDistributed segment processing: enabled\n";
        assert_eq!(
            obs.observe(&Response::ok_text(text), &Descriptor::new()).unwrap(),
            Observed::Toggle(false)
        );
    }

    fn nfs_versions() -> Observation {
        Observation::json().per_instance("version", "3", "v{}Status")
    }

    fn nfs_status() -> Response {
        Response::ok(Body::Json(serde_json::json!({
            "v3Status": true,
            "v4Status": false,
            "v4Domain": "corp.example.com"
        })))
    }

    #[test]
    fn test_per_instance_defaults() {
        let observed = nfs_versions().observe(&nfs_status(), &Descriptor::new()).unwrap();
        assert_eq!(
            observed,
            Observed::Switches {
                key: "version".into(),
                states: BTreeMap::from([("3".to_string(), true)]),
            }
        );
    }

    #[test]
    fn test_per_instance_all() {
        let observed = nfs_versions()
            .observe(&nfs_status(), &desired(&[("version", "all")]))
            .unwrap();
        let Observed::Switches { states, .. } = observed else {
            panic!("expected switches");
        };
        assert_eq!(
            states,
            BTreeMap::from([("3".to_string(), true), ("4".to_string(), false)])
        );
    }

    #[test]
    fn test_export_without_name_is_absent() {
        let obs = Observation::export_detail();
        assert_eq!(
            obs.observe(&Response::ok_text(""), &Descriptor::new()).unwrap(),
            Observed::Absent
        );
    }
}
