//! Error types for the reconciliation engine

use thiserror::Error;

/// Errors raised while resolving, synthesizing or reconciling
#[derive(Debug, Error)]
pub enum Error {
    /// No action rule matched the descriptor
    #[error("no action matched for {kind}{}", format_partial(.partial))]
    NoMatchingAction { kind: String, partial: Vec<String> },

    /// A template placeholder had no argument
    #[error("missing argument '{placeholder}' for action '{action}'")]
    MissingArgument { action: String, placeholder: String },

    /// No template registered for an action/verb pair
    #[error("no template for action '{action}' verb '{verb}'")]
    UnknownTemplate { action: String, verb: String },

    /// No profile registered for an action
    #[error("no profile for action '{action}'")]
    UnknownAction { action: String },

    /// Two spellings of one attribute carried different values
    #[error("conflicting values for attribute '{key}'")]
    DuplicateKey { key: String },

    /// A template string could not be parsed
    #[error("invalid template '{template}': {reason}")]
    InvalidTemplate { template: String, reason: String },

    /// Remote invocation failed
    #[error("remote execution failed: {message}")]
    Remote { message: String },

    /// JSON encoding or decoding failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn format_partial(partial: &[String]) -> String {
    if partial.is_empty() {
        String::new()
    } else {
        format!(" (partial matches: {})", partial.join(", "))
    }
}

impl Error {
    /// Errors caused by the caller's input rather than the appliance
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::NoMatchingAction { .. } | Self::DuplicateKey { .. }
        )
    }

    /// Catalog defects: a template or profile does not line up with its rules
    pub fn is_catalog_defect(&self) -> bool {
        matches!(
            self,
            Self::MissingArgument { .. }
                | Self::UnknownTemplate { .. }
                | Self::UnknownAction { .. }
                | Self::InvalidTemplate { .. }
        )
    }

    /// Errors reported by the remote side
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_match_lists_partial_candidates() {
        let err = Error::NoMatchingAction {
            kind: "nfs".into(),
            partial: vec!["export".into(), "option".into()],
        };
        assert_eq!(
            err.to_string(),
            "no action matched for nfs (partial matches: export, option)"
        );
        assert!(err.is_user_error());
    }

    #[test]
    fn test_classification() {
        let err = Error::MissingArgument {
            action: "export".into(),
            placeholder: "name".into(),
        };
        assert!(err.is_catalog_defect());
        assert!(!err.is_remote());
        assert!(Error::Remote { message: "x".into() }.is_remote());
        assert!(Error::DuplicateKey { key: "path".into() }.is_user_error());
    }
}
