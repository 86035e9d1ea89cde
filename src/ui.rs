use anyhow::Result;
use colored::Colorize;
use converge::{ConfirmCallback, Outcome, PlannedStep, ReconcileResult};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

// ============================================================================
// Confirmation
// ============================================================================

/// Asks on the terminal before anything is written
pub struct PromptConfirm;

impl ConfirmCallback for PromptConfirm {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()?;
        Ok(confirmed)
    }
}

// ============================================================================
// Reporting
// ============================================================================

/// One-word summary of a result
pub fn status_label(result: &ReconcileResult) -> &'static str {
    match (result.failed, result.changed) {
        (true, true) => "partially applied",
        (true, false) => "failed",
        (false, true) => "changed",
        (false, false) => "ok",
    }
}

fn print_outcome(output: &Outcome) -> Result<()> {
    match output {
        Outcome::Message(msg) if msg.is_empty() => {}
        Outcome::Message(msg) => dim(msg),
        Outcome::Parsed(parsed) => println!("{}", serde_json::to_string_pretty(parsed)?),
        Outcome::Json(value) => println!("{}", serde_json::to_string_pretty(value)?),
    }
    Ok(())
}

/// Print a reconciliation result, as JSON when asked
pub fn report(kind: &str, result: &ReconcileResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    let label = status_label(result);
    let line = format!("{kind}: {label}");
    match label {
        "ok" => success(&line),
        "changed" => println!("{} {}", "●".yellow(), line.yellow()),
        _ => error(&line),
    }
    if !result.steps.is_empty() {
        kv(
            "Applied",
            &format!("{}/{} invocation(s)", result.applied(), result.steps.len()),
        );
    }
    print_outcome(&result.output)
}

/// Print the invocations a plan would run
pub fn print_plan(kind: &str, action: Option<&str>, steps: &[PlannedStep]) {
    header(&format!("Plan: {kind}"));
    if let Some(action) = action {
        kv("Action", action);
    }
    if steps.is_empty() {
        success("Nothing to change");
        return;
    }
    for (i, step) in steps.iter().enumerate() {
        println!(
            "{} {}",
            format!("[{}/{}]", i + 1, steps.len()).blue().bold(),
            step.summary
        );
        for invocation in &step.invocations {
            println!("    {} {}", "→".dimmed(), invocation);
        }
    }
}
