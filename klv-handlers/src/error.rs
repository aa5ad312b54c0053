//! Error types for handler configuration.

use klv_protocol::KlvError;
use thiserror::Error;

/// Errors raised when handlers or sessions are misconfigured.
///
/// Decode failures on individual elements never surface here; they are
/// logged and dropped by the session.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HandlerError {
    /// The same field name is bound to more than one role of a handler.
    #[error("Field '{field}' is configured more than once for '{attribute}'")]
    DuplicateField { attribute: String, field: String },

    /// A handler was configured with the wrong number of fields.
    #[error("Handler '{attribute}' expects {expected} fields, got {actual}")]
    FieldCount {
        attribute: String,
        expected: usize,
        actual: usize,
    },

    /// A packet could not be framed or split into items.
    #[error(transparent)]
    Klv(#[from] KlvError),
}

/// Result type for handler operations.
pub type Result<T> = std::result::Result<T, HandlerError>;
