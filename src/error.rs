//! Error types for lathe.
//!
//! Uses thiserror for derive macros and provides user-actionable error messages.
//!
//! The taxonomy splits along the structural/auxiliary line the pipeline
//! enforces: `PathInvalid`, `SecurityViolation`, and `StructuralFailure` are
//! always fatal during staging and trigger rollback; `VcsError` and `EnvError`
//! are always recoverable and are accumulated on the outcome instead of
//! aborting a generation.

use crate::exit_codes;
use thiserror::Error;

/// Main error type for lathe operations.
///
/// Each variant maps to a specific exit code via [`LatheError::exit_code`].
#[derive(Error, Debug)]
pub enum LatheError {
    /// User provided invalid arguments or the system is in an invalid state.
    #[error("{0}")]
    UserError(String),

    /// A path failed normalization or a name failed filename validation.
    #[error("Invalid path: {0}")]
    PathInvalid(String),

    /// Path traversal, absolute-path injection, or a disallowed command.
    #[error("Security violation: {0}")]
    SecurityViolation(String),

    /// The requested template does not exist in the template store.
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    /// A template source failed to render.
    #[error("Template syntax error: {0}")]
    TemplateSyntax(String),

    /// A version-control operation failed (auxiliary, never fatal).
    #[error("VCS operation failed: {0}")]
    VcsError(String),

    /// Environment provisioning failed (auxiliary, never fatal).
    #[error("Environment creation failed: {0}")]
    EnvError(String),

    /// Duplicate task id, unknown task, or result-wait timeout.
    #[error("Concurrency error: {0}")]
    ConcurrencyError(String),

    /// Catch-all for failures during the structural staging stages.
    #[error("Generation failed: {0}")]
    StructuralFailure(String),

    /// Cooperative cancellation was observed at a checkpoint.
    #[error("Generation cancelled")]
    Cancelled,
}

impl LatheError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LatheError::UserError(_) => exit_codes::USER_ERROR,
            LatheError::PathInvalid(_) => exit_codes::VALIDATION_FAILURE,
            LatheError::StructuralFailure(_) => exit_codes::VALIDATION_FAILURE,
            LatheError::SecurityViolation(_) => exit_codes::SECURITY_FAILURE,
            LatheError::TemplateNotFound(_) => exit_codes::TEMPLATE_FAILURE,
            LatheError::TemplateSyntax(_) => exit_codes::TEMPLATE_FAILURE,
            // Auxiliary failures normally never surface as a process exit;
            // when they do (direct tool subcommands), treat them as user-level.
            LatheError::VcsError(_) => exit_codes::USER_ERROR,
            LatheError::EnvError(_) => exit_codes::USER_ERROR,
            LatheError::ConcurrencyError(_) => exit_codes::CONCURRENCY_FAILURE,
            LatheError::Cancelled => exit_codes::USER_ERROR,
        }
    }

    /// True for errors that invalidate the whole generation when raised
    /// during a staging stage.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            LatheError::PathInvalid(_)
                | LatheError::SecurityViolation(_)
                | LatheError::TemplateNotFound(_)
                | LatheError::TemplateSyntax(_)
                | LatheError::StructuralFailure(_)
        )
    }
}

/// Result type alias for lathe operations.
pub type Result<T> = std::result::Result<T, LatheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_invalid_has_validation_exit_code() {
        let err = LatheError::PathInvalid("empty name".to_string());
        assert_eq!(err.exit_code(), exit_codes::VALIDATION_FAILURE);
    }

    #[test]
    fn security_violation_has_security_exit_code() {
        let err = LatheError::SecurityViolation("parent traversal".to_string());
        assert_eq!(err.exit_code(), exit_codes::SECURITY_FAILURE);
    }

    #[test]
    fn template_errors_share_template_exit_code() {
        let not_found = LatheError::TemplateNotFound("python-lib".to_string());
        let syntax = LatheError::TemplateSyntax("unmatched brace".to_string());
        assert_eq!(not_found.exit_code(), exit_codes::TEMPLATE_FAILURE);
        assert_eq!(syntax.exit_code(), exit_codes::TEMPLATE_FAILURE);
    }

    #[test]
    fn concurrency_error_has_concurrency_exit_code() {
        let err = LatheError::ConcurrencyError("task not found".to_string());
        assert_eq!(err.exit_code(), exit_codes::CONCURRENCY_FAILURE);
    }

    #[test]
    fn structural_classification() {
        assert!(LatheError::PathInvalid("x".into()).is_structural());
        assert!(LatheError::SecurityViolation("x".into()).is_structural());
        assert!(LatheError::StructuralFailure("x".into()).is_structural());
        assert!(LatheError::TemplateSyntax("x".into()).is_structural());
        assert!(!LatheError::VcsError("x".into()).is_structural());
        assert!(!LatheError::EnvError("x".into()).is_structural());
        assert!(!LatheError::ConcurrencyError("x".into()).is_structural());
    }

    #[test]
    fn error_messages_are_descriptive() {
        let err = LatheError::SecurityViolation("segment '..' escapes base".to_string());
        assert_eq!(
            err.to_string(),
            "Security violation: segment '..' escapes base"
        );

        let err = LatheError::TemplateNotFound("rust-cli".to_string());
        assert_eq!(err.to_string(), "Template not found: rust-cli");
    }
}
