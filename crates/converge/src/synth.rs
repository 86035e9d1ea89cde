//! Command/payload synthesizer
//!
//! Builds [`Invocation`]s from a [`TemplateCatalog`]; never executes them.

use crate::error::{Error, Result};
use crate::template::{BodyField, CommandSpec, Surface, TemplateCatalog, VerbSpec};
use crate::types::{
    Descriptor, Edit, Invocation, Member, Method, RestCall, ShellCommand, SubAction, Value, Verb,
};
use serde_json::{Map, Value as Json};

fn push_pairs(out: &mut Vec<String>, key: &str, value: &Value) {
    match value {
        Value::List(items) => {
            for item in items {
                push_pairs(out, key, item);
            }
        }
        Value::Map(inner) => {
            for (k, v) in inner.iter() {
                push_pairs(out, k, v);
            }
        }
        scalar => {
            out.push(key.to_string());
            out.push(scalar.render());
        }
    }
}

fn push_member(out: &mut Vec<String>, spec: &CommandSpec, key: &str, member: &Member, ids_only: bool) {
    out.push(spec.wire_key(key));
    out.push(member.id.clone());
    if !ids_only {
        for (k, v) in member.attrs.iter() {
            push_pairs(out, &spec.wire_key(k), v);
        }
    }
}

/// Trailing `key value` pairs for optional descriptor keys
fn optional_words(spec: &CommandSpec, verb: Verb, args: &Descriptor) -> Vec<String> {
    let mut out = Vec::new();
    if verb.is_destructive() {
        return out;
    }
    let used = spec.used_keys();
    for key in &spec.optional_keys {
        if used.contains(key.as_str()) {
            continue;
        }
        if let Some(value) = args.get(key) {
            push_pairs(&mut out, &spec.wire_key(key), value);
        }
    }
    out
}

fn edit_words(spec: &CommandSpec, verb: Verb, edit: &Edit, out: &mut Vec<String>) {
    let ids_only = verb.is_destructive();
    match edit {
        Edit::Assign { key, .. } if spec.used_keys().contains(key.as_str()) => {}
        Edit::Assign { key, value } => {
            if verb == Verb::Reset {
                out.push(spec.wire_key(key));
            } else if !ids_only {
                push_pairs(out, &spec.wire_key(key), value);
            }
        }
        Edit::Insert { key, member } | Edit::Update { key, member } => {
            push_member(out, spec, key, member, ids_only);
        }
        Edit::Remove { key, member } => push_member(out, spec, key, member, true),
    }
}

fn render_shell(
    spec: &CommandSpec,
    action: &str,
    verb: Verb,
    args: &Descriptor,
    edits: &[Edit],
) -> Result<Vec<Invocation>> {
    let base = spec.template.render_words(args, action)?;
    let optional = optional_words(spec, verb, args);

    let mut common = Vec::new();
    let mut members = Vec::new();
    for edit in edits {
        if spec.per_member && edit.member().is_some() {
            members.push(edit);
        } else {
            edit_words(spec, verb, edit, &mut common);
        }
    }

    let build = |extra: Vec<String>| {
        let mut argv = base.clone();
        argv.extend(extra);
        argv.extend(common.iter().cloned());
        argv.extend(optional.iter().cloned());
        Invocation::Shell(ShellCommand::new(argv))
    };

    if members.is_empty() {
        return Ok(vec![build(Vec::new())]);
    }
    Ok(members
        .into_iter()
        .map(|edit| {
            let mut words = Vec::new();
            edit_words(spec, verb, edit, &mut words);
            build(words)
        })
        .collect())
}

/// REST form of a value: lists become arrays of `{"name": ..}` objects
fn rest_value(value: &Value) -> Json {
    match value {
        Value::List(items) => Json::Array(
            items
                .iter()
                .map(|item| match item {
                    Value::Map(map) => map.to_json(),
                    scalar => {
                        let mut obj = Map::new();
                        obj.insert("name".into(), Json::String(scalar.render()));
                        Json::Object(obj)
                    }
                })
                .collect(),
        ),
        other => other.to_json(),
    }
}

fn member_object(spec: &CommandSpec, member: &Member, delete: bool) -> Json {
    let mut obj = Map::new();
    obj.insert("name".into(), Json::String(member.id.clone()));
    if !delete {
        for (k, v) in member.attrs.iter() {
            obj.insert(spec.wire_key(k), v.to_json());
        }
    } else {
        obj.insert("delete".into(), Json::Bool(true));
    }
    Json::Object(obj)
}

fn push_array(body: &mut Map<String, Json>, key: String, item: Json) {
    let slot = body.entry(key).or_insert_with(|| Json::Array(Vec::new()));
    if let Json::Array(items) = slot {
        items.push(item);
    }
}

fn render_rest(
    spec: &CommandSpec,
    method: Method,
    action: &str,
    verb: Verb,
    args: &Descriptor,
    edits: &[Edit],
) -> Result<Invocation> {
    let path = spec.template.render_path(args, action)?;
    let used = spec.used_keys();
    let mut body = Map::new();

    for (field, value) in &spec.body {
        let json = match value {
            BodyField::Literal(v) => v.clone(),
            BodyField::Template(t) => Json::String(t.render_text(args, action)?),
        };
        body.insert(field.clone(), json);
    }

    if !verb.is_destructive() {
        for key in &spec.optional_keys {
            if used.contains(key.as_str()) {
                continue;
            }
            if let Some(value) = args.get(key) {
                body.insert(spec.wire_key(key), rest_value(value));
            }
        }
    }

    for edit in edits {
        match edit {
            Edit::Assign { key, value } => {
                if !verb.is_destructive() && !used.contains(key.as_str()) {
                    body.insert(spec.wire_key(key), rest_value(value));
                }
            }
            Edit::Insert { key, member } | Edit::Update { key, member } => {
                push_array(&mut body, spec.wire_key(key), member_object(spec, member, false));
            }
            Edit::Remove { key, member } => {
                push_array(&mut body, spec.wire_key(key), member_object(spec, member, true));
            }
        }
    }

    let body = if body.is_empty() && matches!(method, Method::Get | Method::Delete) {
        None
    } else {
        Some(Json::Object(body))
    };

    Ok(Invocation::Rest(RestCall {
        method,
        path,
        query: Vec::new(),
        body,
    }))
}

/// Placeholder values: the descriptor, with assigned edits to template keys on top
fn placeholders(spec: &CommandSpec, args: &Descriptor, edits: &[Edit]) -> Descriptor {
    let used = spec.used_keys();
    let mut out = args.clone();
    for edit in edits {
        if let Edit::Assign { key, value } = edit
            && used.contains(key.as_str())
        {
            out.insert(key, value.clone());
        }
    }
    out
}

/// Render one spec with explicit edits
pub fn render(
    spec: &CommandSpec,
    action: &str,
    verb: Verb,
    args: &Descriptor,
    edits: &[Edit],
) -> Result<Vec<Invocation>> {
    let args = &placeholders(spec, args, edits);
    match spec.surface {
        Surface::Shell => render_shell(spec, action, verb, args, edits),
        Surface::Rest(method) => Ok(vec![render_rest(spec, method, action, verb, args, edits)?]),
    }
}

/// Where a routed edit is rendered: a sibling verb's spec, or the routed entry's own
fn route(edit: &Edit) -> Option<Verb> {
    match edit {
        Edit::Insert { .. } => Some(Verb::Add),
        Edit::Remove { .. } => Some(Verb::Del),
        Edit::Assign { .. } | Edit::Update { .. } => None,
    }
}

fn unknown(action: &str, verb: Verb) -> Error {
    Error::UnknownTemplate {
        action: action.to_string(),
        verb: verb.to_string(),
    }
}

/// Build the invocations for one sub-action
///
/// `args` supplies placeholder values (the identifying keys at least).
/// Routed verbs split their edits into consecutive runs that keep the
/// edit order, so a wildcard removal always precedes the additions.
pub fn synthesize(
    catalog: &TemplateCatalog,
    action: &str,
    sub: &SubAction,
    args: &Descriptor,
) -> Result<Vec<Invocation>> {
    match catalog.get(action, sub.verb) {
        Some(VerbSpec::Single(spec)) => render(spec, action, sub.verb, args, &sub.edits),
        Some(VerbSpec::Routed(own)) => {
            let mut out = Vec::new();
            let mut start = 0;
            while start < sub.edits.len() {
                let target = route(&sub.edits[start]);
                let end = sub.edits[start..]
                    .iter()
                    .position(|e| route(e) != target)
                    .map_or(sub.edits.len(), |p| start + p);
                let run = &sub.edits[start..end];
                match target {
                    Some(verb) => {
                        out.extend(render(catalog.spec(action, verb)?, action, verb, args, run)?);
                    }
                    None => {
                        let spec = own.as_ref().ok_or_else(|| unknown(action, sub.verb))?;
                        out.extend(render(spec, action, sub.verb, args, run)?);
                    }
                }
                start = end;
            }
            Ok(out)
        }
        None => Err(unknown(action, sub.verb)),
    }
}

/// Build the read-only query for an action
pub fn synthesize_query(
    catalog: &TemplateCatalog,
    action: &str,
    args: &Descriptor,
) -> Result<Invocation> {
    let spec = catalog.spec(action, Verb::Show)?;
    render(spec, action, Verb::Show, args, &[])?
        .into_iter()
        .next()
        .ok_or_else(|| unknown(action, Verb::Show))
}

/// Build the invocation of an imperative action from its full descriptor
pub fn synthesize_action(
    catalog: &TemplateCatalog,
    action: &str,
    args: &Descriptor,
) -> Result<Vec<Invocation>> {
    let spec = catalog.spec(action, Verb::Run)?;
    render(spec, action, Verb::Run, args, &[])
}
