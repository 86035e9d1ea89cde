//! # Converge
//!
//! A declarative reconciliation engine for appliances that expose both an
//! interactive command shell and a REST API.
//!
//! Callers describe the desired state of one resource as a [`Descriptor`].
//! The engine picks the action that descriptor maps to, reads the
//! resource's current state with a read-only query, computes the ordered
//! sub-actions that close the gap, and synthesizes the remote invocations
//! for them. It never talks to the appliance itself: a
//! [`RemoteExecutor`] runs every invocation.
//!
//! ## Core Concepts
//!
//! - **ActionRule / Catalog**: ordered rules mapping descriptor shapes to action ids
//! - **Output Normalizer**: shell text to records, via five explicit layouts
//! - **TemplateCatalog**: typed command and payload templates per action and verb
//! - **DiffSchema**: per-resource parameters of the generic diff
//! - **ResourceKind**: rules, templates and read/diff profiles of one resource
//!
//! ## Example
//!
//! ```ignore
//! use converge::{reconcile, Descriptor, NoProgress};
//!
//! let desired: Descriptor = serde_json::from_str(
//!     r#"{"name": "backup", "clients": ["10.0.0.5"], "state": "present"}"#,
//! )?;
//! let result = reconcile(&nfs_kind, &desired, &mut ssh_executor, &mut NoProgress)?;
//! println!("changed={} failed={}", result.changed, result.failed);
//! ```

pub mod context;
pub mod diff;
pub mod error;
pub mod executor;
pub mod kind;
pub mod normalize;
pub mod observe;
pub mod resolver;
pub mod synth;
pub mod template;
pub mod types;

// Re-export main types at crate root
pub use context::{AutoConfirm, ConfirmCallback, NoProgress, ProgressCallback, RemoteExecutor};
pub use diff::{DiffSchema, ListAttr, Unit, diff, diff_options, diff_switches, diff_toggle};
pub use error::{Error, Result};
pub use executor::{
    ALREADY_ABSENT, ExecuteOptions, Plan, PlannedStep, execute_plan, plan, preview, reconcile,
};
pub use kind::{Profile, ResourceKind};
pub use observe::{Observation, Observed};
pub use resolver::{ActionRule, Catalog, Resolution, resolve};
pub use synth::{synthesize, synthesize_action, synthesize_query};
pub use template::{CommandSpec, Template, TemplateCatalog};
pub use types::{
    Body, Descriptor, Edit, Field, Invocation, Member, Method, Outcome, Parsed, ReconcileResult,
    Record, Response, RestCall, ShellCommand, Step, SubAction, Value, Verb,
};
