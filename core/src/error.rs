use thiserror::Error;

#[derive(Error, Debug)]
pub enum StageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Stage '{stage_id}' not found in configuration")]
    StageNotFound { stage_id: String },

    #[error("Saved state for stage '{stage_id}' is invalid: {reason}")]
    InvalidSavedState { stage_id: String, reason: String },

    #[error("Session not initialized")]
    SessionNotInitialized,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StageResult<T> = Result<T, StageError>;
