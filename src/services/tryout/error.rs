use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum TryoutError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    InvalidState(String),
    #[error("{0}")]
    InvalidTransition(String),
    #[error("Maximum number of attempts ({max_attempts}) reached for this test")]
    AttemptLimitExceeded { max_attempts: i32 },
    #[error("An attempt for this test is already in progress")]
    AlreadyOngoing { participant_test_id: String },
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
