//! Value-level errors.

/// Error raised when a value does not fit the field it is assigned to.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Field '{field}' expects {expected}, got {found}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Field '{field}' does not accept non-finite number {value}")]
    NonFiniteNumber { field: String, value: f64 },

    #[error("Field '{field}' rejected value: {message}")]
    Rejected { field: String, message: String },
}

/// Stored wire value that cannot be read as the declared kind.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("cannot read {found} as {expected}: {detail}")]
pub struct DecodeError {
    pub expected: &'static str,
    pub found: &'static str,
    pub detail: String,
}

impl ValidationError {
    /// Name of the field that failed validation.
    pub fn field(&self) -> &str {
        match self {
            Self::TypeMismatch { field, .. }
            | Self::NonFiniteNumber { field, .. }
            | Self::Rejected { field, .. } => field,
        }
    }
}
