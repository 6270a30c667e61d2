use thiserror::Error;

/// Main error type for the application.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found error.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User input failed validation (recoverable by correcting the input).
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Lookup on a column outside the entity's allow-list.
    #[error("Disallowed lookup field '{field}' for {entity}")]
    DisallowedField {
        /// Entity the lookup targeted.
        entity: &'static str,
        /// Rejected field name.
        field: String,
    },

    /// A unique business key is already taken.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Login failed. The message never says which half was wrong.
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// Password reset token failed verification.
    #[error("Reset link is invalid or has expired")]
    InvalidResetToken,

    /// Caller lacks the role required for the operation.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A row did not have the shape its entity requires.
    #[error("Malformed row: {0}")]
    MalformedRow(String),

    /// Storage error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether the error must be shown to end users only as its generic text.
    pub fn is_security_sensitive(&self) -> bool {
        matches!(
            self,
            AppError::InvalidCredentials | AppError::InvalidResetToken
        )
    }

    /// Whether the user can fix the problem by changing their input.
    pub fn is_user_correctable(&self) -> bool {
        matches!(
            self,
            AppError::Validation(_) | AppError::Conflict(_) | AppError::DisallowedField { .. }
        )
    }
}

/// Result type alias for the application.
pub type Result<T> = std::result::Result<T, AppError>;
