//! Resource kinds: the per-resource tables the engine is parameterized by

use crate::diff::DiffSchema;
use crate::error::{Error, Result};
use crate::observe::Observation;
use crate::resolver::Catalog;
use crate::template::TemplateCatalog;
use std::collections::BTreeMap;

/// How an action reads and reconciles its resource
#[derive(Debug, Clone)]
pub enum Profile {
    /// Keyed resource: query, locate, [`crate::diff::diff`]
    Declarative {
        observe: Observation,
        schema: DiffSchema,
    },
    /// On/off service switch
    Toggle { observe: Observation },
    /// Flat option map
    Options {
        observe: Observation,
        schema: DiffSchema,
    },
    /// Run the action's own template; output parsed with the rule's columns
    Imperative,
}

impl Profile {
    /// Read recipe, for profiles that observe before acting
    pub fn observation(&self) -> Option<&Observation> {
        match self {
            Self::Declarative { observe, .. }
            | Self::Toggle { observe }
            | Self::Options { observe, .. } => Some(observe),
            Self::Imperative => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Declarative { .. } => "declarative",
            Self::Toggle { .. } => "toggle",
            Self::Options { .. } => "options",
            Self::Imperative => "imperative",
        }
    }
}

/// Rules, templates and profiles of one resource kind
#[derive(Debug, Clone)]
pub struct ResourceKind {
    pub name: String,
    pub rules: Catalog,
    pub templates: TemplateCatalog,
    profiles: BTreeMap<String, Profile>,
}

impl ResourceKind {
    pub fn new(name: &str, rules: Catalog, templates: TemplateCatalog) -> Self {
        Self {
            name: name.to_string(),
            rules,
            templates,
            profiles: BTreeMap::new(),
        }
    }

    pub fn profile(mut self, action: &str, profile: Profile) -> Self {
        self.profiles.insert(action.to_string(), profile);
        self
    }

    pub fn declarative(self, action: &str, observe: Observation, schema: DiffSchema) -> Self {
        self.profile(action, Profile::Declarative { observe, schema })
    }

    pub fn toggle(self, action: &str, observe: Observation) -> Self {
        self.profile(action, Profile::Toggle { observe })
    }

    pub fn options(self, action: &str, observe: Observation, schema: DiffSchema) -> Self {
        self.profile(action, Profile::Options { observe, schema })
    }

    /// Mark every rule without a profile as imperative
    pub fn imperative(mut self) -> Self {
        for rule in self.rules.rules() {
            self.profiles
                .entry(rule.id.clone())
                .or_insert(Profile::Imperative);
        }
        self
    }

    /// Profile of an action
    pub fn profile_for(&self, action: &str) -> Result<&Profile> {
        self.profiles.get(action).ok_or_else(|| Error::UnknownAction {
            action: action.to_string(),
        })
    }

    /// Actions whose rules have no profile or no template; empty for a sound kind
    pub fn defects(&self) -> Vec<String> {
        let mut out = Vec::new();
        for rule in self.rules.rules() {
            match self.profiles.get(&rule.id) {
                None => out.push(format!("{}: no profile", rule.id)),
                Some(Profile::Imperative) => {
                    if self.templates.verbs(&rule.id).is_empty() {
                        out.push(format!("{}: no template", rule.id));
                    }
                }
                Some(_) => {
                    if self.templates.get(&rule.id, crate::types::Verb::Show).is_none() {
                        out.push(format!("{}: no query template", rule.id));
                    }
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::ActionRule;
    use crate::template::CommandSpec;
    use crate::types::Verb;

    #[test]
    fn test_unknown_action_is_catalog_defect() {
        let kind = ResourceKind::new("ntp", Catalog::new("ntp"), TemplateCatalog::new());
        let err = kind.profile_for("service").unwrap_err();
        assert!(err.is_catalog_defect());
    }

    #[test]
    fn test_defects_report_missing_pieces() {
        let rules = Catalog::new("ntp")
            .rule(ActionRule::new("service"))
            .rule(ActionRule::new("timeserver"))
            .rule(ActionRule::new("show"));
        let templates = TemplateCatalog::new()
            .with("service", Verb::Show, CommandSpec::shell("ntp status").unwrap())
            .with("show", Verb::Run, CommandSpec::shell("ntp show config").unwrap());
        let kind = ResourceKind::new("ntp", rules, templates)
            .toggle("service", Observation::auto().toggle("status"))
            .imperative();
        assert_eq!(kind.defects(), vec!["timeserver: no template".to_string()]);
        assert_eq!(kind.profile_for("service").unwrap().name(), "toggle");
    }
}
