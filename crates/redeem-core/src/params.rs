//! Network parameters: tree shape, pinned digests, address rules
//!
//! Everything environment-specific is carried in an explicit immutable
//! [`NetworkParams`] value handed to each component at construction.
//! Nothing in the core reads ambient process state.

use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactKind;
use crate::constants::BUCKET_COUNT;
use crate::{Error, Hash32, Result};

/// Proof encoding version
///
/// Bump this when changing:
/// - the canonical byte layout signed by key-origin proofs
/// - the branch hash construction
pub const PROOF_VERSION: u16 = 1;

/// Which published dataset a parameter set describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Main,
    Test,
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Network::Main => write!(f, "main"),
            Network::Test => write!(f, "test"),
        }
    }
}

/// Immutable parameters for one published allocation dataset
///
/// These must match the data the generation process actually published;
/// any disagreement (record counts, digests, roots) is a fatal integrity
/// error at load time, never tolerated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkParams {
    /// Which network this parameter set belongs to
    pub network: Network,
    /// Number of top-level entries (subtrees) in the main tree
    pub main_leaves: usize,
    /// Number of 32-byte hashes per subtree
    pub subtree_size: usize,
    /// Number of hashes in the flat faucet list
    pub faucet_leaves: usize,
    /// Published main-tree root (over the subtree roots)
    #[serde(with = "hex_hash")]
    pub main_root: Hash32,
    /// Published faucet-list root
    #[serde(with = "hex_hash")]
    pub faucet_root: Hash32,
    /// Pinned digest of the main-tree file
    #[serde(with = "hex_hash")]
    pub main_tree_digest: Hash32,
    /// Pinned digest of the faucet file
    #[serde(with = "hex_hash")]
    pub faucet_digest: Hash32,
    /// Pinned digest of the proof-mapping file
    #[serde(with = "hex_hash")]
    pub mapping_digest: Hash32,
    /// Pinned digest per nonce bucket, indexed by bucket number
    #[serde(with = "hex_hash_vec")]
    pub bucket_digests: Vec<Hash32>,
    /// Accepted human-readable prefixes for target addresses
    pub address_hrps: Vec<String>,
}

impl NetworkParams {
    /// Pinned parameters for the production dataset
    pub fn mainnet() -> Self {
        serde_json::from_str(include_str!("../data/mainnet.json"))
            .expect("embedded mainnet params are well-formed")
    }

    /// Pinned parameters for the development dataset
    pub fn testnet() -> Self {
        serde_json::from_str(include_str!("../data/testnet.json"))
            .expect("embedded testnet params are well-formed")
    }

    /// Load parameters from a JSON file
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let params: Self = serde_json::from_str(&content)?;
        params.validate()?;
        Ok(params)
    }

    /// Save parameters to a JSON file
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Check internal consistency of the parameter set
    pub fn validate(&self) -> Result<()> {
        if self.bucket_digests.len() != BUCKET_COUNT {
            return Err(Error::CountMismatch {
                kind: ArtifactKind::NonceBucket(0),
                expected: BUCKET_COUNT,
                actual: self.bucket_digests.len(),
            });
        }
        if self.subtree_size == 0 || self.main_leaves == 0 {
            return Err(Error::MalformedArtifact {
                kind: ArtifactKind::MainTree,
                reason: "zero tree dimension".into(),
            });
        }
        if self.address_hrps.is_empty() {
            return Err(Error::InvalidAddress("empty HRP allow-list".into()));
        }
        Ok(())
    }

    /// Pinned digest for a given artifact
    pub fn digest_for(&self, kind: ArtifactKind) -> Hash32 {
        match kind {
            ArtifactKind::MainTree => self.main_tree_digest,
            ArtifactKind::FaucetList => self.faucet_digest,
            ArtifactKind::ProofMapping => self.mapping_digest,
            ArtifactKind::NonceBucket(i) => self.bucket_digests[i as usize],
        }
    }

    /// Whether an address HRP is accepted on this network
    pub fn allows_hrp(&self, hrp: &str) -> bool {
        self.address_hrps.iter().any(|h| h == hrp)
    }
}

mod hex_hash {
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(hash: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(hash))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 32-byte hex digest"))
    }
}

mod hex_hash_vec {
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(hashes: &[[u8; 32]], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(hashes.iter().map(hex::encode))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<[u8; 32]>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let strings = Vec::<String>::deserialize(deserializer)?;
        strings
            .into_iter()
            .map(|s| {
                hex::decode(&s)
                    .map_err(serde::de::Error::custom)?
                    .try_into()
                    .map_err(|_| serde::de::Error::custom("expected 32-byte hex digest"))
            })
            .collect()
    }
}
