use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Failure of a single scrape request. Consumed per page, never fatal to a job.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("scrape endpoint returned HTTP {status}")]
    HttpStatus { status: u16 },

    #[error("malformed scrape response: {0}")]
    Decode(String),
}

/// Failure of any store operation, tagged with the operation that failed.
#[derive(Debug, Error)]
#[error("store {op} failed: {message}")]
pub struct StoreError {
    pub op: &'static str,
    pub message: String,
}

impl StoreError {
    pub fn new(op: &'static str, err: impl std::fmt::Display) -> Self {
        Self {
            op,
            message: err.to_string(),
        }
    }
}

/// Listener-level failure. These are the only errors that drive control flow (reconnects).
#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("channel error: {0}")]
    ChannelError(String),

    #[error("timed out waiting for subscription")]
    Timeout,
}

impl From<tokio_tungstenite::tungstenite::Error> for SubscriptionError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        SubscriptionError::ChannelError(e.to_string())
    }
}
