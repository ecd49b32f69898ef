//! redeem-client: artifact retrieval with digest pinning
//!
//! Fetches the published tree/faucet/bucket/mapping files over HTTP and
//! keeps a local disk cache. The core's contract is the only contract
//! here too: hand back bytes whose digest equals the pinned value, or
//! fail. A cached file that no longer matches its digest is discarded
//! and re-fetched. Remote reads are bounded by a timeout and a maximum
//! payload size; an untrusted or slow mirror cannot pin us down.

mod client;
mod error;

pub use client::{ArtifactClient, ClientBuilder};
pub use error::ClientError;

pub type Result<T> = std::result::Result<T, ClientError>;
