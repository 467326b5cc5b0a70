use thiserror::Error;

/// Raised when a series or candle window is shorter than an indicator needs.
/// Always recoverable: the caller may skip the cycle or widen the window.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("not enough data for {indicator}: required {required}, available {available}")]
pub struct InsufficientDataError {
    pub indicator: String,
    pub required: usize,
    pub available: usize,
}

impl InsufficientDataError {
    pub fn new(indicator: impl Into<String>, required: usize, available: usize) -> Self {
        Self {
            indicator: indicator.into(),
            required,
            available,
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Exchange API error: {0}")]
    Exchange(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Agent error: {0}")]
    Agent(String),

    #[error(transparent)]
    InsufficientData(#[from] InsufficientDataError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_data_message_names_indicator_and_counts() {
        let err = InsufficientDataError::new("MACD", 26, 20);
        assert_eq!(
            err.to_string(),
            "not enough data for MACD: required 26, available 20"
        );
    }

    #[test]
    fn insufficient_data_converts_without_losing_payload() {
        let err: Error = InsufficientDataError::new("EMA(20)", 20, 3).into();
        match err {
            Error::InsufficientData(inner) => {
                assert_eq!(inner.indicator, "EMA(20)");
                assert_eq!(inner.required, 20);
                assert_eq!(inner.available, 3);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
