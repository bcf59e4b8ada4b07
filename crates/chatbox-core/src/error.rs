use reqwest::StatusCode;
use thiserror::Error;

/// Failures of one request/response cycle.
///
/// None of these are shown to the user verbatim; the session collapses them
/// into a single fallback reply and logs the detail.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("backend returned status {0}")]
    Status(StatusCode),
    #[error("could not decode reply: {0}")]
    Decode(String),
    #[error("response has no readable body")]
    MissingBody,
    #[error("stream read failed: {0}")]
    Stream(String),
    #[error("cancelled")]
    Cancelled,
}
