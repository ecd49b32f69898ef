//! Error types for the artifact retrieval client

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("server returned {status} for {url}")]
    Server { status: u16, url: String },

    #[error("payload for {artifact} exceeds {limit} bytes")]
    PayloadTooLarge { artifact: String, limit: u64 },

    #[error(transparent)]
    Core(#[from] redeem_core::Error),
}
