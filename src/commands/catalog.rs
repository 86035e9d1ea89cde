//! Catalog command - show how descriptors map to actions

use anyhow::Result;
use colored::Colorize;
use converge::{ActionRule, ResourceKind};

use crate::{resource, ui};

/// One-line description of a rule
pub fn describe(rule: &ActionRule) -> String {
    let mut parts = Vec::new();
    if !rule.required_keys.is_empty() {
        parts.push(format!("requires {}", rule.required_keys.join(", ")));
    }
    for (key, value) in &rule.predicate {
        parts.push(format!("{key}={}", value.render()));
    }
    if let Some(columns) = &rule.output_schema {
        parts.push(format!("columns {}", columns.join(", ")));
    }
    if parts.is_empty() {
        parts.push("always".to_string());
    }
    parts.join("; ")
}

fn print_kind(kind: &ResourceKind) {
    ui::header(&format!("Kind: {}", kind.name));
    for (i, rule) in kind.rules.rules().iter().enumerate() {
        let verbs: Vec<&str> = kind
            .templates
            .verbs(&rule.id)
            .iter()
            .map(|v| v.as_str())
            .collect();
        let marker = if rule.mutates { "●".yellow() } else { "○".dimmed() };
        println!(
            "{:>3}. {} {}  {}",
            i + 1,
            marker,
            rule.id.bold(),
            describe(rule).dimmed()
        );
        println!("       {}", verbs.join(" ").cyan());
    }
    for defect in kind.defects() {
        ui::warn(&defect);
    }
}

pub fn run(kind: Option<&str>) -> Result<()> {
    match kind {
        Some(name) => print_kind(&resource::lookup(name)?),
        None => {
            ui::header("Resource kinds");
            for name in resource::KINDS {
                let kind = resource::lookup(name)?;
                ui::kv(name, &format!("{} action(s)", kind.rules.rules().len()));
            }
            println!();
            ui::info("Run 'ddctl catalog <kind>' for its rules");
        }
    }
    Ok(())
}
