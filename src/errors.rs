use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatchlistError {
    /// The addressed (user, entity) pair has no row where one is required
    #[error("Not found: {0}")]
    NotFound(String),

    /// Input rejected before any mutation
    #[error("Invalid input: {0}")]
    Validation(String),

    /// The metadata source failed or timed out
    #[error("Metadata source unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The schema could not be brought to the multi-user shape
    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("SQLite error : {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error : {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error : {0}")]
    Config(String),

    #[error("Parse error : {0}")]
    Parse(String),
}

impl From<reqwest::Error> for WatchlistError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            Self::UpstreamUnavailable(format!("request timed out : {value}"))
        } else {
            Self::UpstreamUnavailable(value.to_string())
        }
    }
}

#[cfg(test)]
impl WatchlistError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
