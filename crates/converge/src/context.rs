//! Collaborator traits
//!
//! These traits let the engine run without depending on a particular
//! transport or terminal UI.

use crate::types::{Invocation, Response, Step};
use anyhow::Result;

/// Executes remote invocations against the appliance
///
/// Implementations decide how a shell command or REST call reaches the
/// appliance. An `Err` (connection refused, timeout) is reported by the
/// engine as a failed step, exactly like a non-zero exit status.
pub trait RemoteExecutor {
    fn execute(&mut self, invocation: &Invocation) -> Result<Response>;
}

/// Progress callback for reconciliation
pub trait ProgressCallback {
    /// Called before the read-only query
    fn on_query(&mut self, invocation: &Invocation);

    /// Called before each write invocation
    fn on_step_start(&mut self, description: &str);

    /// Called when an invocation returns
    fn on_step_complete(&mut self, step: &Step);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_query(&mut self, _invocation: &Invocation) {}
    fn on_step_start(&mut self, _description: &str) {}
    fn on_step_complete(&mut self, _step: &Step) {}
}

/// Confirmation callback for user interaction
pub trait ConfirmCallback {
    /// Ask the user to confirm an action
    fn confirm(&mut self, prompt: &str) -> Result<bool>;
}

/// Auto-confirm callback (always returns true)
pub struct AutoConfirm;

impl ConfirmCallback for AutoConfirm {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(true)
    }
}
