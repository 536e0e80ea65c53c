/// Domain-level error shared by every layer.
///
/// Engine errors are deterministic and raised before anything is persisted.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{entity} {key} not found")]
    NotFound { entity: &'static str, key: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Sequence violation: {message}")]
    SequenceViolation {
        message: String,
        /// The day the learner must complete next, when one applies.
        next_available_day: Option<i32>,
    },

    #[error("Not unlocked: {0}")]
    NotUnlocked(String),

    #[error("Already completed: {0}")]
    AlreadyCompleted(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Shorthand for [`CoreError::NotFound`].
    pub fn not_found(entity: &'static str, key: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }
}
