//! Typed command and endpoint templates
//!
//! A template is parsed once into tokens made of literal and placeholder
//! segments. Rendering substitutes arguments structurally into an argument
//! vector (shell) or a path (REST); nothing is ever evaluated as code.

use crate::error::{Error, Result};
use crate::types::{Descriptor, Method, Verb, canonical_key};
use std::collections::{BTreeMap, BTreeSet};

/// Piece of a template token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Placeholder(String),
}

/// Parsed template: whitespace-separated tokens of segments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    tokens: Vec<Vec<Segment>>,
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn invalid(source: &str, reason: &str) -> Error {
    Error::InvalidTemplate {
        template: source.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_token(source: &str, word: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = word.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            literal.push(c);
            continue;
        }

        let name = match chars.peek().copied() {
            Some('$') => {
                chars.next();
                literal.push('$');
                continue;
            }
            Some('{') => {
                chars.next();
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(c) if is_name_char(c) => name.push(c),
                        Some(_) => return Err(invalid(source, "bad character in placeholder")),
                        None => return Err(invalid(source, "unclosed '${'")),
                    }
                }
                name
            }
            Some(c) if is_name_char(c) => {
                let mut name = String::new();
                while let Some(c) = chars.peek().copied().filter(|c| is_name_char(*c)) {
                    name.push(c);
                    chars.next();
                }
                name
            }
            _ => return Err(invalid(source, "'$' without a placeholder name")),
        };

        if name.is_empty() {
            return Err(invalid(source, "empty placeholder"));
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }
        segments.push(Segment::Placeholder(canonical_key(&name)));
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

/// Escape path separators in a value placed inside an endpoint path
pub fn escape_path_value(value: &str) -> String {
    value.replace('%', "%25").replace('/', "%2F")
}

impl Template {
    /// Parse `nfs export add $name` / `/rest/v1.0/mtrees/${mtree-path}`
    pub fn parse(source: &str) -> Result<Self> {
        let tokens = source
            .split_whitespace()
            .map(|word| parse_token(source, word))
            .collect::<Result<Vec<_>>>()?;
        if tokens.is_empty() {
            return Err(invalid(source, "empty template"));
        }
        Ok(Self {
            source: source.to_string(),
            tokens,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Placeholder names in order of appearance
    pub fn placeholders(&self) -> Vec<&str> {
        self.tokens
            .iter()
            .flatten()
            .filter_map(|s| match s {
                Segment::Placeholder(name) => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    fn render_token(
        &self,
        token: &[Segment],
        args: &Descriptor,
        action: &str,
        escape: bool,
    ) -> Result<String> {
        let mut out = String::new();
        for segment in token {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    let value = args.get(name).ok_or_else(|| Error::MissingArgument {
                        action: action.to_string(),
                        placeholder: name.clone(),
                    })?;
                    let rendered = value.render();
                    if escape {
                        out.push_str(&escape_path_value(&rendered));
                    } else {
                        out.push_str(&rendered);
                    }
                }
            }
        }
        Ok(out)
    }

    /// Substitute into an argument vector, one element per token
    pub fn render_words(&self, args: &Descriptor, action: &str) -> Result<Vec<String>> {
        self.tokens
            .iter()
            .map(|t| self.render_token(t, args, action, false))
            .collect()
    }

    /// Substitute into an endpoint path, percent-escaping placeholder values
    pub fn render_path(&self, args: &Descriptor, action: &str) -> Result<String> {
        let parts = self
            .tokens
            .iter()
            .map(|t| self.render_token(t, args, action, true))
            .collect::<Result<Vec<_>>>()?;
        Ok(parts.concat())
    }

    /// Substitute into a single string value
    pub fn render_text(&self, args: &Descriptor, action: &str) -> Result<String> {
        Ok(self.render_words(args, action)?.join(" "))
    }
}

// ============================================================================
// Command Specs
// ============================================================================

/// Which control surface an invocation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Shell,
    Rest(Method),
}

/// Fixed field of a REST payload
#[derive(Debug, Clone, PartialEq)]
pub enum BodyField {
    Literal(serde_json::Value),
    Template(Template),
}

/// How one action/verb pair becomes remote invocations
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSpec {
    pub surface: Surface,
    pub template: Template,
    /// Descriptor keys appended (shell) or merged (REST) when present
    pub optional_keys: Vec<String>,
    /// Wire spelling of attribute keys
    pub renames: BTreeMap<String, String>,
    /// Fixed REST payload fields
    pub body: Vec<(String, BodyField)>,
    /// Emit one shell invocation per list member
    pub per_member: bool,
}

impl CommandSpec {
    fn with_surface(surface: Surface, template: &str) -> Result<Self> {
        Ok(Self {
            surface,
            template: Template::parse(template)?,
            optional_keys: Vec::new(),
            renames: BTreeMap::new(),
            body: Vec::new(),
            per_member: false,
        })
    }

    /// Shell command template
    pub fn shell(template: &str) -> Result<Self> {
        Self::with_surface(Surface::Shell, template)
    }

    /// REST endpoint template
    pub fn rest(method: Method, path: &str) -> Result<Self> {
        Self::with_surface(Surface::Rest(method), path)
    }

    pub fn optional(mut self, keys: &[&str]) -> Self {
        self.optional_keys
            .extend(keys.iter().map(|k| canonical_key(k)));
        self
    }

    pub fn rename(mut self, from: &str, to: &str) -> Self {
        self.renames.insert(canonical_key(from), to.to_string());
        self
    }

    pub fn body_literal(mut self, field: &str, value: serde_json::Value) -> Self {
        self.body.push((field.to_string(), BodyField::Literal(value)));
        self
    }

    pub fn body_field(mut self, field: &str, template: &str) -> Result<Self> {
        self.body
            .push((field.to_string(), BodyField::Template(Template::parse(template)?)));
        Ok(self)
    }

    pub fn per_member(mut self) -> Self {
        self.per_member = true;
        self
    }

    /// Wire spelling of `key`
    pub fn wire_key(&self, key: &str) -> String {
        let key = self.renames.get(key).map_or(key, String::as_str);
        match self.surface {
            Surface::Shell => key.to_string(),
            Surface::Rest(_) => key.replace('-', "_"),
        }
    }

    /// Placeholders consumed by the template and body
    pub fn used_keys(&self) -> BTreeSet<&str> {
        let mut used: BTreeSet<&str> = self.template.placeholders().into_iter().collect();
        for (_, field) in &self.body {
            if let BodyField::Template(t) = field {
                used.extend(t.placeholders());
            }
        }
        used
    }
}

/// Template entry for one action/verb pair
#[derive(Debug, Clone, PartialEq)]
pub enum VerbSpec {
    Single(CommandSpec),
    /// Removals go to the `del` spec and insertions to the `add` spec;
    /// updates and assignments use the embedded spec
    Routed(Option<CommandSpec>),
}

/// Templates for every action of a resource kind
#[derive(Debug, Clone, Default)]
pub struct TemplateCatalog {
    entries: BTreeMap<(String, Verb), VerbSpec>,
}

impl TemplateCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, action: &str, verb: Verb, spec: CommandSpec) -> Self {
        self.entries
            .insert((action.to_string(), verb), VerbSpec::Single(spec));
        self
    }

    pub fn routed(mut self, action: &str, verb: Verb) -> Self {
        self.entries
            .insert((action.to_string(), verb), VerbSpec::Routed(None));
        self
    }

    pub fn routed_with(mut self, action: &str, verb: Verb, spec: CommandSpec) -> Self {
        self.entries
            .insert((action.to_string(), verb), VerbSpec::Routed(Some(spec)));
        self
    }

    pub fn get(&self, action: &str, verb: Verb) -> Option<&VerbSpec> {
        self.entries.get(&(action.to_string(), verb))
    }

    /// Look up a single spec, failing when missing or routed
    pub fn spec(&self, action: &str, verb: Verb) -> Result<&CommandSpec> {
        match self.get(action, verb) {
            Some(VerbSpec::Single(spec)) => Ok(spec),
            _ => Err(Error::UnknownTemplate {
                action: action.to_string(),
                verb: verb.to_string(),
            }),
        }
    }

    /// Verbs registered for an action
    pub fn verbs(&self, action: &str) -> Vec<Verb> {
        self.entries
            .keys()
            .filter(|(a, _)| a == action)
            .map(|(_, v)| *v)
            .collect()
    }
}
