use thiserror::Error;

#[derive(Debug, Error)]
pub enum RealtimeError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Connection failed: {0}")]
    Connect(String),
}
