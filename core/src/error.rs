use thiserror::Error;

/// Infrastructure failures. Gameplay rule violations are never errors;
/// they come back as `ActionResult` values.
#[derive(Error, Debug)]
pub enum SimError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid map: {reason}")]
    InvalidMap { reason: String },

    #[error("Invalid state: {reason}")]
    InvalidState { reason: String },

    #[error("Invalid config: {reason}")]
    InvalidConfig { reason: String },

    #[error("Clock overflow: now={now_ms} delta={delta_ms}")]
    ClockOverflow { now_ms: u64, delta_ms: u64 },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type SimResult<T> = Result<T, SimError>;

impl SimError {
    pub fn invalid_state(reason: impl Into<String>) -> Self {
        Self::InvalidState { reason: reason.into() }
    }

    pub fn invalid_map(reason: impl Into<String>) -> Self {
        Self::InvalidMap { reason: reason.into() }
    }

    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig { reason: reason.into() }
    }
}
