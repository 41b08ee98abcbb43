use reqwest::Error as ReqwestError;
use std::io;
use thiserror::Error;

/// A failed enrichment fetch. These are logged and dropped by the queue; the
/// statistics stay valid without the data.
#[derive(Debug, Error)]
pub enum EnrichmentFetchError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Last.fm API error ({code}): {message}")]
    Api { code: i64, message: String },

    #[error("request error: {0}")]
    Request(#[from] ReqwestError),

    #[error("response is missing `{0}`")]
    MissingField(&'static str),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("{0}")]
    Other(String),
}
