//! Digest-pinned artifact client with a local disk cache

use std::path::PathBuf;
use std::time::Duration;

use redeem_core::{verify_artifact, ArtifactKind, NetworkParams};
use reqwest::Client;

use crate::error::ClientError;
use crate::Result;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// 64 MiB: comfortably above any published artifact, far below trouble
const DEFAULT_MAX_BYTES: u64 = 64 * 1024 * 1024;

/// Fetches published artifacts and verifies them against pinned digests
pub struct ArtifactClient {
    params: NetworkParams,
    http: Client,
    base_url: String,
    cache_dir: PathBuf,
    max_bytes: u64,
}

impl ArtifactClient {
    /// Return verified bytes for an artifact, from cache when possible.
    ///
    /// A cache entry that fails its digest check is deleted and the
    /// artifact re-fetched; a fetched payload that fails the check is an
    /// integrity error surfaced to the caller.
    pub async fn fetch(&self, kind: ArtifactKind) -> Result<Vec<u8>> {
        let path = self.cache_path(kind);
        if path.exists() {
            let bytes = std::fs::read(&path)?;
            match verify_artifact(&self.params, kind, &bytes) {
                Ok(()) => {
                    tracing::debug!(artifact = %kind, bytes = bytes.len(), "cache hit");
                    return Ok(bytes);
                }
                Err(err) => {
                    tracing::warn!(artifact = %kind, %err, "stale cache entry, re-fetching");
                    std::fs::remove_file(&path)?;
                }
            }
        }

        let bytes = self.download(kind).await?;
        verify_artifact(&self.params, kind, &bytes)?;

        std::fs::create_dir_all(&self.cache_dir)?;
        std::fs::write(&path, &bytes)?;
        tracing::info!(artifact = %kind, bytes = bytes.len(), "artifact fetched and verified");
        Ok(bytes)
    }

    /// Local cache path for an artifact
    pub fn cache_path(&self, kind: ArtifactKind) -> PathBuf {
        self.cache_dir.join(kind.file_name())
    }

    pub fn params(&self) -> &NetworkParams {
        &self.params
    }

    async fn download(&self, kind: ArtifactKind) -> Result<Vec<u8>> {
        let url = format!("{}/{}", self.base_url, kind.file_name());
        let resp = self.http.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(ClientError::Server {
                status: resp.status().as_u16(),
                url,
            });
        }
        if let Some(len) = resp.content_length() {
            if len > self.max_bytes {
                return Err(ClientError::PayloadTooLarge {
                    artifact: kind.to_string(),
                    limit: self.max_bytes,
                });
            }
        }

        // enforce the cap even when the server lies about length
        let mut bytes = Vec::new();
        let mut resp = resp;
        while let Some(chunk) = resp.chunk().await? {
            if bytes.len() as u64 + chunk.len() as u64 > self.max_bytes {
                return Err(ClientError::PayloadTooLarge {
                    artifact: kind.to_string(),
                    limit: self.max_bytes,
                });
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok(bytes)
    }
}

/// Builder for [`ArtifactClient`]
pub struct ClientBuilder {
    params: NetworkParams,
    base_url: String,
    cache_dir: PathBuf,
    timeout: Duration,
    max_bytes: u64,
}

impl ClientBuilder {
    pub fn new(params: NetworkParams, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            params,
            base_url,
            cache_dir: PathBuf::from("./redeem-data"),
            timeout: DEFAULT_TIMEOUT,
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }

    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn max_bytes(mut self, max: u64) -> Self {
        self.max_bytes = max;
        self
    }

    pub fn build(self) -> Result<ArtifactClient> {
        let http = Client::builder().timeout(self.timeout).build()?;
        Ok(ArtifactClient {
            params: self.params,
            http,
            base_url: self.base_url,
            cache_dir: self.cache_dir,
            max_bytes: self.max_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::{Digest, Sha256};

    fn client_for(cache: &std::path::Path) -> ArtifactClient {
        ClientBuilder::new(NetworkParams::testnet(), "http://localhost:9/")
            .cache_dir(cache)
            .build()
            .unwrap()
    }

    #[test]
    fn cache_paths_follow_artifact_names() {
        let dir = std::env::temp_dir().join("redeem-client-paths");
        let client = client_for(&dir);
        assert_eq!(
            client.cache_path(ArtifactKind::MainTree),
            dir.join("tree.bin")
        );
        assert_eq!(
            client.cache_path(ArtifactKind::NonceBucket(12)),
            dir.join("nonce-012.bin")
        );
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = client_for(std::path::Path::new("/tmp"));
        assert_eq!(client.base_url, "http://localhost:9");
    }

    #[tokio::test]
    async fn verified_cache_entry_is_served_without_network() {
        let dir = std::env::temp_dir().join("redeem-client-cache-hit");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();

        // pin a tiny synthetic mapping artifact
        let mut params = NetworkParams::testnet();
        let payload = br#"[["tr1qexample",100000000,false]]"#.to_vec();
        params.mapping_digest = Sha256::digest(&payload).into();
        std::fs::write(dir.join("proof.json"), &payload).unwrap();

        // base URL is unroutable, so success proves the cache was used
        let client = ClientBuilder::new(params, "http://127.0.0.1:9")
            .cache_dir(&dir)
            .build()
            .unwrap();
        let bytes = client.fetch(ArtifactKind::ProofMapping).await.unwrap();
        assert_eq!(bytes, payload);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
