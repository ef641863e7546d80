use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StatArbError {
    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Invalid configuration: {field} — {reason}")]
    InvalidConfiguration { field: String, reason: String },

    #[error("Empty window: no observations between {start} and {end}")]
    EmptyWindow { start: NaiveDate, end: NaiveDate },

    #[error("Data gap: pair {pair} has {missing} missing observations")]
    DataGap { pair: String, missing: usize },

    #[error("Fit failure in {context}: {reason}")]
    FitFailure { context: String, reason: String },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl StatArbError {
    pub(crate) fn fit(context: &str, reason: impl Into<String>) -> Self {
        StatArbError::FitFailure {
            context: context.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for StatArbError {
    fn from(e: serde_json::Error) -> Self {
        StatArbError::SerializationError(e.to_string())
    }
}
