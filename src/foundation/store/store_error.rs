use openssl::error::ErrorStack;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Wrong passphrase, or the ciphertext was truncated or tampered with.
    #[error("the store could not be authenticated (wrong passphrase or damaged file)")]
    Authentication,

    /// The ciphertext authenticated but the plaintext is not a statistics document.
    #[error("the store decrypted but its contents are not a statistics document: {0}")]
    Corrupt(#[source] serde_json::Error),

    #[error("invalid store header: {0}")]
    InvalidHeader(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("crypto error: {0}")]
    Crypto(#[from] ErrorStack),

    #[error("could not encode the statistics document: {0}")]
    Encode(#[source] serde_json::Error),
}

impl StoreError {
    pub fn is_authentication(&self) -> bool {
        matches!(self, StoreError::Authentication)
    }
}
