//! Output normalizer
//!
//! Turns the appliance shell's free text (or a REST JSON body) into
//! [`Parsed`] records. The shell produces a fixed set of layouts; each one
//! is an explicit strategy picked by [`classify`] from structural cues
//! scanned once:
//!
//! 1. dashed-header tables
//! 2. "Option ... Value" blocks
//! 3. colon-delimited `key: value` paragraphs
//! 4. raw lines, when nothing else matches
//!
//! Commands that print several stacked tables (export details, route
//! tables) go through [`stacked_tables`] and [`export_detail`] directly.

mod blocks;
mod export;
mod table;

use crate::types::{Field, Parsed, Record};
use log::debug;
use regex::Regex;
use std::sync::LazyLock;

pub use blocks::{key_value, option_value};
pub use export::export_detail;
pub use table::{Table, dashed_table, is_rule, stacked_tables};

static WIDE_GAP: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\s{3,}").ok());
static NARROW_GAP: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\s{2,}").ok());

fn split_on(gap: &LazyLock<Option<Regex>>, line: &str) -> Vec<String> {
    let line = line.trim();
    if line.is_empty() {
        return Vec::new();
    }
    match gap.as_ref() {
        Some(re) => re.split(line).map(|s| s.trim().to_string()).collect(),
        None => vec![line.to_string()],
    }
}

/// Split a table row on runs of three or more spaces
pub fn split_columns(line: &str) -> Vec<String> {
    split_on(&WIDE_GAP, line)
}

/// Split a header or option line on runs of two or more spaces
pub fn split_pairs(line: &str) -> Vec<String> {
    split_on(&NARROW_GAP, line)
}

/// Canonical attribute form of an appliance label
///
/// `Pre-Comp (GiB)` becomes `pre-comp-(gib)`, `Last Login From` becomes
/// `last-login-from`.
pub fn canonical_label(label: &str) -> String {
    label
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .replace('_', "-")
}

/// Strip "not applicable" and "default" placeholders
///
/// `n/a`, `-` and `(none)` become empty; `6 (default)` becomes `6`.
pub fn normalize_value(raw: &str) -> String {
    let value = raw.trim();
    match value {
        "(none)" | "n/a" | "N/A" | "-" => String::new(),
        _ if value.contains("(default)") || value.contains("(none)") => value
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_string(),
        _ => value.to_string(),
    }
}

/// Layout recognized in shell output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    DashedTable,
    OptionValue,
    KeyValue,
    Raw,
}

/// Parsed output tagged with the layout it was read as
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedShape {
    DashedTable(Vec<Record>),
    OptionValue(Vec<Record>),
    KeyValue(Vec<Record>),
    Raw(Record),
}

impl ParsedShape {
    pub fn kind(&self) -> ShapeKind {
        match self {
            Self::DashedTable(_) => ShapeKind::DashedTable,
            Self::OptionValue(_) => ShapeKind::OptionValue,
            Self::KeyValue(_) => ShapeKind::KeyValue,
            Self::Raw(_) => ShapeKind::Raw,
        }
    }

    /// Collapse into the engine's record form
    ///
    /// Tables always stay a list of rows; block shapes holding a single
    /// section become one record.
    pub fn into_parsed(self) -> Parsed {
        match self {
            Self::DashedTable(rows) => Parsed::Many(rows),
            Self::OptionValue(mut sections) | Self::KeyValue(mut sections) => {
                if sections.len() == 1 {
                    Parsed::One(sections.remove(0))
                } else {
                    Parsed::Many(sections)
                }
            }
            Self::Raw(record) => Parsed::One(record),
        }
    }
}

/// Structural cues, scanned once per response
#[derive(Debug, Default, Clone, Copy)]
struct Cues {
    dash_rule: bool,
    option_header: bool,
    value_header: bool,
    colon_pair: bool,
}

impl Cues {
    fn scan(text: &str) -> Self {
        let mut cues = Self::default();
        for line in text.lines() {
            if is_rule(line) {
                cues.dash_rule = true;
                continue;
            }
            let columns = split_pairs(line);
            if columns.iter().any(|c| c == "Option") {
                cues.option_header = true;
            }
            if columns.iter().any(|c| c == "Value") {
                cues.value_header = true;
            }
            if line.contains(": ") || line.trim_end().ends_with(':') {
                cues.colon_pair = true;
            }
        }
        cues
    }

    fn classify(self) -> ShapeKind {
        if self.dash_rule && !self.option_header {
            ShapeKind::DashedTable
        } else if self.option_header && self.value_header {
            ShapeKind::OptionValue
        } else if self.colon_pair {
            ShapeKind::KeyValue
        } else {
            ShapeKind::Raw
        }
    }
}

/// Decide which layout a response uses
pub fn classify(text: &str) -> ShapeKind {
    Cues::scan(text).classify()
}

/// Raw-line fallback: `{"output": [non-empty lines]}`
pub fn raw_lines(text: &str) -> Record {
    let lines = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();
    let mut record = Record::new();
    record.insert("output".into(), Field::List(lines));
    record
}

/// Parse text with the strategy its cues select
pub fn parse_shape(text: &str, columns: Option<&[String]>) -> ParsedShape {
    let kind = classify(text);
    debug!("Classified output as {kind:?}");
    match kind {
        ShapeKind::DashedTable => ParsedShape::DashedTable(dashed_table(text, columns)),
        ShapeKind::OptionValue => ParsedShape::OptionValue(option_value(text)),
        ShapeKind::KeyValue => ParsedShape::KeyValue(key_value(text)),
        ShapeKind::Raw => {
            if !text.trim().is_empty() {
                debug!("No structural cues matched, keeping raw lines");
            }
            ParsedShape::Raw(raw_lines(text))
        }
    }
}

/// Normalize shell output into records
pub fn normalize(text: &str, columns: Option<&[String]>) -> Parsed {
    parse_shape(text, columns).into_parsed()
}

/// Normalize a REST JSON body into records
pub fn from_json(value: &serde_json::Value) -> Parsed {
    match value {
        serde_json::Value::Array(items) => {
            Parsed::Many(items.iter().map(json_record).collect())
        }
        other => Parsed::One(json_record(other)),
    }
}

fn json_record(value: &serde_json::Value) -> Record {
    match value {
        serde_json::Value::Object(map) => map
            .iter()
            .map(|(k, v)| (k.replace('_', "-"), json_field(v)))
            .collect(),
        other => {
            let mut record = Record::new();
            record.insert("output".into(), json_field(other));
            record
        }
    }
}

fn json_scalar(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn json_field(value: &serde_json::Value) -> Field {
    match value {
        serde_json::Value::Array(items) if items.iter().all(|i| i.is_object()) && !items.is_empty() => {
            Field::Table(items.iter().map(json_record).collect())
        }
        serde_json::Value::Array(items) => Field::List(items.iter().map(json_scalar).collect()),
        serde_json::Value::Object(_) => Field::Nested(json_record(value)),
        other => Field::Text(json_scalar(other)),
    }
}
