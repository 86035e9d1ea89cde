//! Spinner shown while the appliance is being queried and changed

use colored::Colorize;
use converge::{Invocation, ProgressCallback, Step};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
}

/// Progress reporter that keeps one spinner alive across the run
pub struct Spinner {
    bar: ProgressBar,
    quiet: bool,
}

impl Spinner {
    pub fn new(message: &str, quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::new_spinner();
            bar.set_style(spinner_style());
            bar.enable_steady_tick(Duration::from_millis(80));
            bar
        };
        bar.set_message(message.to_string());
        Self { bar, quiet }
    }

    /// Stop spinning before anything else is printed
    pub fn clear(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressCallback for Spinner {
    fn on_query(&mut self, invocation: &Invocation) {
        self.bar
            .set_message(format!("Reading {}", invocation.redacted()));
    }

    fn on_step_start(&mut self, description: &str) {
        self.bar.set_message(format!("Running {description}"));
    }

    fn on_step_complete(&mut self, step: &Step) {
        if self.quiet {
            return;
        }
        let mark = if step.success { "✓".green() } else { "✗".red() };
        self.bar
            .println(format!("  {} {}", mark, step.invocation.dimmed()));
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}
