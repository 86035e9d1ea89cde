//! Rule-based action resolver
//!
//! A [`Catalog`] is an ordered table of immutable [`ActionRule`]s. The
//! first rule whose required keys are all present and whose predicate
//! fully matches the descriptor wins, so catalogs list specific rules
//! before general ones.

use crate::error::{Error, Result};
use crate::types::{Descriptor, Value};
use log::debug;
use serde::Serialize;

/// A rule mapping a descriptor shape to an action id
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionRule {
    pub id: String,
    /// Attributes that must be present for the rule to be eligible
    pub required_keys: Vec<String>,
    /// Attribute values that must all match exactly
    pub predicate: Vec<(String, Value)>,
    /// Whether executing the action changes appliance state
    pub mutates: bool,
    /// Column names for columnar output
    pub output_schema: Option<Vec<String>>,
}

impl ActionRule {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            required_keys: Vec::new(),
            predicate: Vec::new(),
            mutates: false,
            output_schema: None,
        }
    }

    pub fn requires(mut self, keys: &[&str]) -> Self {
        self.required_keys
            .extend(keys.iter().map(|k| (*k).to_string()));
        self
    }

    pub fn when(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.predicate.push((key.to_string(), value.into()));
        self
    }

    pub fn mutating(mut self) -> Self {
        self.mutates = true;
        self
    }

    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.output_schema = Some(columns.iter().map(|c| (*c).to_string()).collect());
        self
    }

    /// All required keys are present
    pub fn is_eligible(&self, desired: &Descriptor) -> bool {
        self.required_keys.iter().all(|k| desired.contains(k))
    }

    fn predicate_hits(&self, desired: &Descriptor) -> usize {
        self.predicate
            .iter()
            .filter(|(k, v)| desired.get(k).is_some_and(|d| value_eq(d, v)))
            .count()
    }

    /// Eligible and every predicate entry matches
    pub fn matches(&self, desired: &Descriptor) -> bool {
        self.is_eligible(desired) && self.predicate_hits(desired) == self.predicate.len()
    }
}

/// Exact equality, treating `true` and `"true"` as the same literal
fn value_eq(desired: &Value, expected: &Value) -> bool {
    if desired == expected {
        return true;
    }
    match (desired, expected) {
        (Value::List(_) | Value::Map(_), _) | (_, Value::List(_) | Value::Map(_)) => false,
        _ => desired.render() == expected.render(),
    }
}

/// Outcome of resolving a descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<'a> {
    Matched(&'a ActionRule),
    /// No rule matched; rules that came close are kept as a diagnostic
    Unmatched { partial: Vec<&'a ActionRule> },
}

impl<'a> Resolution<'a> {
    pub fn rule(&self) -> Option<&'a ActionRule> {
        match self {
            Self::Matched(rule) => Some(rule),
            Self::Unmatched { .. } => None,
        }
    }
}

/// Select the first matching rule in catalog order
pub fn resolve<'a>(rules: &'a [ActionRule], desired: &Descriptor) -> Resolution<'a> {
    if let Some(rule) = rules.iter().find(|r| r.matches(desired)) {
        return Resolution::Matched(rule);
    }

    let mut partial: Vec<&ActionRule> = rules
        .iter()
        .filter(|r| r.predicate_hits(desired) > 0)
        .collect();
    if partial.is_empty() {
        partial = rules.iter().filter(|r| r.is_eligible(desired)).collect();
    }
    Resolution::Unmatched { partial }
}

/// Ordered rule table for one resource kind
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    kind: String,
    rules: Vec<ActionRule>,
}

impl Catalog {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            rules: Vec::new(),
        }
    }

    pub fn rule(mut self, rule: ActionRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn rules(&self) -> &[ActionRule] {
        &self.rules
    }

    pub fn get(&self, id: &str) -> Option<&ActionRule> {
        self.rules.iter().find(|r| r.id == id)
    }

    pub fn resolve(&self, desired: &Descriptor) -> Resolution<'_> {
        resolve(&self.rules, desired)
    }

    /// Resolve, turning "none" into a `NoMatchingAction` error
    pub fn resolve_rule(&self, desired: &Descriptor) -> Result<&ActionRule> {
        match self.resolve(desired) {
            Resolution::Matched(rule) => {
                debug!("Resolved {} to action '{}'", self.kind, rule.id);
                Ok(rule)
            }
            Resolution::Unmatched { partial } => Err(Error::NoMatchingAction {
                kind: self.kind.clone(),
                partial: partial.iter().map(|r| r.id.clone()).collect(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desired(pairs: &[(&str, &str)]) -> Descriptor {
        Descriptor::from_pairs(pairs.iter().map(|(k, v)| (*k, Value::text(*v)))).unwrap()
    }

    #[test]
    fn test_first_match_wins() {
        let specific = ActionRule::new("specific")
            .requires(&["name"])
            .when("state", "present");
        let general = ActionRule::new("general").requires(&["name"]);
        let d = desired(&[("name", "x"), ("state", "present")]);

        let ordered = [specific.clone(), general.clone()];
        assert_eq!(resolve(&ordered, &d).rule().unwrap().id, "specific");

        let reversed = [general, specific];
        assert_eq!(resolve(&reversed, &d).rule().unwrap().id, "general");
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let catalog = Catalog::new("nfs")
            .rule(ActionRule::new("a").requires(&["name"]).when("state", "absent"))
            .rule(ActionRule::new("b").requires(&["name"]));
        let d = desired(&[("name", "x"), ("state", "present")]);
        let first = catalog.resolve_rule(&d).unwrap().id.clone();
        for _ in 0..10 {
            assert_eq!(catalog.resolve_rule(&d).unwrap().id, first);
        }
    }

    #[test]
    fn test_missing_required_key_skips_rule() {
        let rules = [
            ActionRule::new("needs-path").requires(&["path"]),
            ActionRule::new("fallback"),
        ];
        let d = desired(&[("name", "x")]);
        assert_eq!(resolve(&rules, &d).rule().unwrap().id, "fallback");
    }

    #[test]
    fn test_missing_predicate_key_is_non_match() {
        let rules = [ActionRule::new("r").when("option", "route")];
        let d = desired(&[("state", "add")]);
        assert!(resolve(&rules, &d).rule().is_none());
    }

    #[test]
    fn test_empty_predicate_matches_when_eligible() {
        let rules = [ActionRule::new("any").requires(&["name"])];
        assert!(resolve(&rules, &desired(&[("name", "x")])).rule().is_some());
    }

    #[test]
    fn test_unmatched_reports_partial_candidates() {
        let catalog = Catalog::new("net")
            .rule(
                ActionRule::new("route-add")
                    .when("state", "add")
                    .when("option", "route"),
            )
            .rule(ActionRule::new("show").when("state", "show"));
        let d = desired(&[("state", "add"), ("option", "hosts")]);
        let err = catalog.resolve_rule(&d).unwrap_err();
        match err {
            Error::NoMatchingAction { kind, partial } => {
                assert_eq!(kind, "net");
                assert_eq!(partial, vec!["route-add".to_string()]);
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_bool_and_text_literals_compare_equal() {
        let rules = [ActionRule::new("destroy").when("destroy", true)];
        let d = desired(&[("destroy", "true")]);
        assert!(resolve(&rules, &d).rule().is_some());
    }
}
