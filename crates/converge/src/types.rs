//! Core types for declarative reconciliation

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Keys that address the appliance rather than describe the resource
pub const TRANSPORT_KEYS: &[&str] = &[
    "state",
    "port",
    "host",
    "username",
    "password",
    "private-key",
];

/// Normalize an attribute name to its canonical hyphen form
pub fn canonical_key(key: &str) -> String {
    key.trim().replace('_', "-")
}

// ============================================================================
// Desired State
// ============================================================================

/// Attribute value in a desired-state descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Text(String),
    List(Vec<Value>),
    Map(Descriptor),
}

impl Value {
    /// Create a text value
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Create a list of text values
    pub fn list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(items.into_iter().map(|s| Self::Text(s.into())).collect())
    }

    /// Render the value the way the appliance shell spells it
    pub fn render(&self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::Int(n) => n.to_string(),
            Self::Text(s) => s.clone(),
            Self::List(items) => items
                .iter()
                .map(Self::render)
                .collect::<Vec<_>>()
                .join(","),
            Self::Map(map) => map
                .iter()
                .map(|(k, v)| format!("{k}={}", v.render()))
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    /// Borrow the text of a `Text` value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow the inner descriptor of a `Map` value
    pub fn as_map(&self) -> Option<&Descriptor> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Whether the value reads as an affirmative flag
    pub fn is_true(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Int(n) => *n != 0,
            Self::Text(s) => matches!(s.to_ascii_lowercase().as_str(), "true" | "yes" | "on"),
            _ => false,
        }
    }

    /// Whether this is a list value
    pub fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }

    /// Elements of a list, or the value itself as a single element
    pub fn items(&self) -> Vec<Value> {
        match self {
            Self::List(items) => items.clone(),
            other => vec![other.clone()],
        }
    }

    /// Convert into a JSON value for REST payloads
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(n) => serde_json::Value::from(*n),
            Self::Text(s) => serde_json::Value::String(s.clone()),
            Self::List(items) => serde_json::Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(map) => map.to_json(),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

/// Desired-state descriptor: attribute name to value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Descriptor(BTreeMap<String, Value>);

impl Descriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a descriptor from key/value pairs, canonicalizing keys
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut out = Self::new();
        for (key, value) in pairs {
            out.merge_entry(key.as_ref(), value.into())?;
        }
        Ok(out)
    }

    /// Canonicalize every key, reconciling duplicate spellings
    ///
    /// `new_export_name` and `new-export-name` are one attribute; equal
    /// values merge, different values are a `DuplicateKey` error.
    pub fn normalize(self) -> Result<Self> {
        let mut out = Self::new();
        for (key, value) in self.0 {
            let value = match value {
                Value::Map(inner) => Value::Map(inner.normalize()?),
                Value::List(items) => Value::List(
                    items
                        .into_iter()
                        .map(|item| match item {
                            Value::Map(inner) => inner.normalize().map(Value::Map),
                            other => Ok(other),
                        })
                        .collect::<Result<Vec<_>>>()?,
                ),
                other => other,
            };
            out.merge_entry(&key, value)?;
        }
        Ok(out)
    }

    fn merge_entry(&mut self, key: &str, value: Value) -> Result<()> {
        let key = canonical_key(key);
        match self.0.get(&key) {
            Some(existing) if *existing != value => Err(Error::DuplicateKey { key }),
            _ => {
                self.0.insert(key, value);
                Ok(())
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Insert a value under the canonical form of `key`
    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(canonical_key(key), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The intent carried in `state`
    pub fn state(&self) -> Option<&str> {
        self.0.get("state").and_then(Value::as_str)
    }

    /// Whether the intent is `present` (the default when omitted)
    pub fn wants_present(&self) -> bool {
        self.state().is_none_or(|s| s == "present")
    }

    /// Rendered scalar value of `key`
    pub fn text(&self, key: &str) -> Option<String> {
        self.0.get(key).map(Value::render)
    }

    /// Whether `key` is set to an affirmative flag
    pub fn flag(&self, key: &str) -> bool {
        self.0.get(key).is_some_and(Value::is_true)
    }

    /// Copy without the given keys
    pub fn without(&self, keys: &[&str]) -> Self {
        Self(
            self.0
                .iter()
                .filter(|(k, _)| !keys.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// Convert into a JSON object
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

impl FromIterator<(String, Value)> for Descriptor {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (canonical_key(&k), v))
                .collect(),
        )
    }
}

// ============================================================================
// Sub-Actions
// ============================================================================

/// Verb tag of a sub-action
///
/// Declaration order is the order sub-actions are emitted in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    Show,
    Undelete,
    Create,
    Mod,
    Add,
    Set,
    Del,
    Reset,
    Enable,
    Disable,
    Restart,
    Destroy,
    Rename,
    Run,
}

impl Verb {
    pub const ALL: [Verb; 14] = [
        Verb::Show,
        Verb::Undelete,
        Verb::Create,
        Verb::Mod,
        Verb::Add,
        Verb::Set,
        Verb::Del,
        Verb::Reset,
        Verb::Enable,
        Verb::Disable,
        Verb::Restart,
        Verb::Destroy,
        Verb::Rename,
        Verb::Run,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Show => "show",
            Self::Undelete => "undelete",
            Self::Create => "create",
            Self::Mod => "mod",
            Self::Add => "add",
            Self::Set => "set",
            Self::Del => "del",
            Self::Reset => "reset",
            Self::Enable => "enable",
            Self::Disable => "disable",
            Self::Restart => "restart",
            Self::Destroy => "destroy",
            Self::Rename => "rename",
            Self::Run => "run",
        }
    }

    /// Destructive or disabling verbs carry only identifying keys
    pub fn is_destructive(&self) -> bool {
        matches!(self, Self::Del | Self::Destroy | Self::Disable)
    }

    /// Whether executing the verb changes appliance state
    pub fn mutates(&self) -> bool {
        !matches!(self, Self::Show)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Verb {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| format!("unknown verb '{s}'"))
    }
}

/// One element of a list attribute, named by its identifying value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    #[serde(default, skip_serializing_if = "Descriptor::is_empty")]
    pub attrs: Descriptor,
}

impl Member {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attrs: Descriptor::new(),
        }
    }

    pub fn with_attrs(id: impl Into<String>, attrs: Descriptor) -> Self {
        Self {
            id: id.into(),
            attrs,
        }
    }

    fn as_value(&self) -> Value {
        if self.attrs.is_empty() {
            Value::Text(self.id.clone())
        } else {
            let mut map = self.attrs.clone();
            map.insert("id", self.id.clone());
            Value::Map(map)
        }
    }
}

/// A single change carried by a sub-action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "edit", rename_all = "lowercase")]
pub enum Edit {
    /// Scalar attribute takes a value
    Assign { key: String, value: Value },
    /// List member is added
    Insert { key: String, member: Member },
    /// Existing list member changes its attributes
    Update { key: String, member: Member },
    /// List member is removed
    Remove { key: String, member: Member },
}

impl Edit {
    pub fn assign(key: &str, value: impl Into<Value>) -> Self {
        Self::Assign {
            key: key.to_string(),
            value: value.into(),
        }
    }

    pub fn insert(key: &str, member: Member) -> Self {
        Self::Insert {
            key: key.to_string(),
            member,
        }
    }

    pub fn update(key: &str, member: Member) -> Self {
        Self::Update {
            key: key.to_string(),
            member,
        }
    }

    pub fn remove(key: &str, member: Member) -> Self {
        Self::Remove {
            key: key.to_string(),
            member,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Self::Assign { key, .. }
            | Self::Insert { key, .. }
            | Self::Update { key, .. }
            | Self::Remove { key, .. } => key,
        }
    }

    pub fn member(&self) -> Option<&Member> {
        match self {
            Self::Assign { .. } => None,
            Self::Insert { member, .. }
            | Self::Update { member, .. }
            | Self::Remove { member, .. } => Some(member),
        }
    }
}

/// Verb plus the ordered edits it needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubAction {
    pub verb: Verb,
    pub edits: Vec<Edit>,
}

impl SubAction {
    pub fn new(verb: Verb) -> Self {
        Self {
            verb,
            edits: Vec::new(),
        }
    }

    pub fn with(mut self, edit: Edit) -> Self {
        self.edits.push(edit);
        self
    }

    pub fn push(&mut self, edit: Edit) {
        self.edits.push(edit);
    }

    /// Argument fragment: assigned values plus list members grouped by key
    pub fn fragment(&self) -> Descriptor {
        let mut out = BTreeMap::<String, Value>::new();
        for edit in &self.edits {
            match edit {
                Edit::Assign { key, value } => {
                    out.insert(key.clone(), value.clone());
                }
                Edit::Insert { key, member }
                | Edit::Update { key, member }
                | Edit::Remove { key, member } => {
                    let slot = out
                        .entry(key.clone())
                        .or_insert_with(|| Value::List(Vec::new()));
                    if let Value::List(items) = slot {
                        items.push(member.as_value());
                    }
                }
            }
        }
        Descriptor(out)
    }
}

impl fmt::Display for SubAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.verb)?;
        for edit in &self.edits {
            match edit {
                Edit::Assign { key, value } => write!(f, " {key}={}", value.render())?,
                Edit::Insert { key, member } => write!(f, " +{key}:{}", member.id)?,
                Edit::Update { key, member } => write!(f, " ~{key}:{}", member.id)?,
                Edit::Remove { key, member } => write!(f, " -{key}:{}", member.id)?,
            }
        }
        Ok(())
    }
}

// ============================================================================
// Parsed Output
// ============================================================================

/// A parsed attribute value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Field {
    Text(String),
    List(Vec<String>),
    Table(Vec<Record>),
    Nested(Record),
}

impl Field {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Values of a list field; a non-empty text field is a one-element list
    pub fn values(&self) -> Vec<String> {
        match self {
            Self::Text(s) if s.is_empty() => Vec::new(),
            Self::Text(s) => vec![s.clone()],
            Self::List(items) => items.clone(),
            _ => Vec::new(),
        }
    }

    pub fn as_table(&self) -> Option<&[Record]> {
        match self {
            Self::Table(rows) => Some(rows),
            _ => None,
        }
    }
}

impl From<&str> for Field {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

/// One structured record of appliance output
pub type Record = BTreeMap<String, Field>;

/// Normalizer output: a single record or an ordered list of rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Parsed {
    One(Record),
    Many(Vec<Record>),
}

impl Parsed {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::One(record) => record.is_empty(),
            Self::Many(rows) => rows.is_empty(),
        }
    }

    /// All records, a single record counting as one row
    pub fn rows(&self) -> Vec<&Record> {
        match self {
            Self::One(record) => vec![record],
            Self::Many(rows) => rows.iter().collect(),
        }
    }
}

// ============================================================================
// Remote Invocations
// ============================================================================

/// HTTP verb of a REST invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shell command as an argument vector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellCommand {
    pub argv: Vec<String>,
}

impl ShellCommand {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }

    /// Command line as sent to the appliance shell
    pub fn line(&self) -> String {
        self.argv
            .iter()
            .map(|arg| {
                if arg.is_empty() || arg.contains(char::is_whitespace) {
                    format!("\"{}\"", arg.replace('"', "\\\""))
                } else {
                    arg.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// REST call: verb, endpoint path and optional payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestCall {
    pub method: Method,
    pub path: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub query: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

/// Concrete remote invocation, never executed by the engine itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "surface", rename_all = "lowercase")]
pub enum Invocation {
    Shell(ShellCommand),
    Rest(RestCall),
}

const SECRET_MARKERS: &[&str] = &["password", "passphrase", "secret"];

fn is_secret(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SECRET_MARKERS.iter().any(|m| key.contains(m))
}

fn redact_json(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| {
                    if is_secret(k) && !v.is_object() {
                        (k.clone(), serde_json::Value::String("********".into()))
                    } else {
                        (k.clone(), redact_json(v))
                    }
                })
                .collect(),
        ),
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(redact_json).collect())
        }
        other => other.clone(),
    }
}

impl Invocation {
    pub fn is_shell(&self) -> bool {
        matches!(self, Self::Shell(_))
    }

    /// Display form with secret values masked
    pub fn redacted(&self) -> String {
        match self {
            Self::Shell(cmd) => {
                let mut argv = cmd.argv.clone();
                for i in 1..argv.len() {
                    if is_secret(&argv[i - 1]) {
                        argv[i] = "********".into();
                    }
                }
                ShellCommand::new(argv).line()
            }
            Self::Rest(call) => {
                let mut line = format!("{} {}", call.method, call.path);
                if let Some(body) = &call.body {
                    line.push(' ');
                    line.push_str(&redact_json(body).to_string());
                }
                line
            }
        }
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

/// Body returned by a remote call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Body {
    Json(serde_json::Value),
    Text(String),
}

impl Body {
    /// Text view of the body
    pub fn text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Json(v) => v.to_string(),
        }
    }
}

/// What the remote executor reports back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    pub body: Body,
}

impl Response {
    pub fn ok(body: Body) -> Self {
        Self {
            success: true,
            body,
        }
    }

    pub fn ok_text(text: impl Into<String>) -> Self {
        Self::ok(Body::Text(text.into()))
    }

    pub fn failed(text: impl Into<String>) -> Self {
        Self {
            success: false,
            body: Body::Text(text.into()),
        }
    }
}

// ============================================================================
// Results
// ============================================================================

/// Output carried in a reconciliation result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Outcome {
    Parsed(Parsed),
    Json(serde_json::Value),
    Message(String),
}

/// One executed invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub verb: Verb,
    pub invocation: String,
    pub success: bool,
    pub output: String,
}

/// Result handed back to the caller for reporting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileResult {
    pub changed: bool,
    pub failed: bool,
    pub output: Outcome,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<Step>,
}

impl ReconcileResult {
    /// Nothing to do
    pub fn unchanged(output: Outcome) -> Self {
        Self {
            changed: false,
            failed: false,
            output,
            steps: Vec::new(),
        }
    }

    /// Failure before anything executed
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            changed: false,
            failed: true,
            output: Outcome::Message(message.into()),
            steps: Vec::new(),
        }
    }

    /// Number of steps that executed successfully
    pub fn applied(&self) -> usize {
        self.steps.iter().filter(|s| s.success).count()
    }
}
