//! Published artifact loading: digest pinning and binary layouts
//!
//! Four artifact families are published by the (off-line) generation
//! process: the main tree, the flat faucet list, 256 nonce-ciphertext
//! buckets, and a JSON proof mapping. Every one is verified against its
//! pinned digest before a single byte is interpreted. Layouts are rigid:
//! a count prefix that must equal the network parameter exactly, and no
//! trailing bytes.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Error, Hash32, NetworkParams, Result};

/// One of the published, digest-pinned artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    MainTree,
    FaucetList,
    NonceBucket(u8),
    ProofMapping,
}

impl ArtifactKind {
    /// File name the artifact is published (and cached) under
    pub fn file_name(&self) -> String {
        match self {
            ArtifactKind::MainTree => "tree.bin".into(),
            ArtifactKind::FaucetList => "faucet.bin".into(),
            ArtifactKind::NonceBucket(i) => format!("nonce-{i:03}.bin"),
            ArtifactKind::ProofMapping => "proof.json".into(),
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactKind::MainTree => write!(f, "main tree"),
            ArtifactKind::FaucetList => write!(f, "faucet list"),
            ArtifactKind::NonceBucket(i) => write!(f, "nonce bucket {i}"),
            ArtifactKind::ProofMapping => write!(f, "proof mapping"),
        }
    }
}

/// Verify artifact bytes against the digest pinned for this network.
///
/// This is the whole contract of the store: bytes whose SHA-256 equals
/// the pinned value, or a checksum error naming the artifact.
pub fn verify(params: &NetworkParams, kind: ArtifactKind, bytes: &[u8]) -> Result<()> {
    let actual: Hash32 = Sha256::digest(bytes).into();
    let expected = params.digest_for(kind);
    if actual != expected {
        return Err(Error::ChecksumMismatch {
            kind,
            expected: hex::encode(expected),
            actual: hex::encode(actual),
        });
    }
    Ok(())
}

/// The published main tree: N subtrees of M leaf hashes each
#[derive(Debug, Clone)]
pub struct MainTree {
    subtrees: Vec<Vec<Hash32>>,
}

impl MainTree {
    /// Parse and validate the main-tree file.
    ///
    /// Layout: `u32be count` then `count` records of `M * 32` bytes.
    pub fn parse(params: &NetworkParams, bytes: &[u8]) -> Result<Self> {
        verify(params, ArtifactKind::MainTree, bytes)?;
        let kind = ArtifactKind::MainTree;
        let record_size = params.subtree_size * 32;
        let (count, body) = read_count(kind, bytes)?;
        if count != params.main_leaves {
            return Err(Error::CountMismatch {
                kind,
                expected: params.main_leaves,
                actual: count,
            });
        }
        if body.len() != count * record_size {
            return Err(Error::MalformedArtifact {
                kind,
                reason: format!(
                    "expected {} record bytes, got {}",
                    count * record_size,
                    body.len()
                ),
            });
        }
        let subtrees = body
            .chunks_exact(record_size)
            .map(|record| {
                record
                    .chunks_exact(32)
                    .map(|h| h.try_into().expect("chunk is 32 bytes"))
                    .collect()
            })
            .collect();
        Ok(Self { subtrees })
    }

    pub fn subtrees(&self) -> &[Vec<Hash32>] {
        &self.subtrees
    }

    pub fn subtree(&self, i: usize) -> Option<&[Hash32]> {
        self.subtrees.get(i).map(|s| s.as_slice())
    }

    pub fn len(&self) -> usize {
        self.subtrees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subtrees.is_empty()
    }
}

/// The published flat faucet list of address identity hashes
#[derive(Debug, Clone)]
pub struct FaucetList {
    leaves: Vec<Hash32>,
}

impl FaucetList {
    /// Parse and validate the faucet file: `u32be count` then `count * 32` bytes.
    pub fn parse(params: &NetworkParams, bytes: &[u8]) -> Result<Self> {
        verify(params, ArtifactKind::FaucetList, bytes)?;
        let kind = ArtifactKind::FaucetList;
        let (count, body) = read_count(kind, bytes)?;
        if count != params.faucet_leaves {
            return Err(Error::CountMismatch {
                kind,
                expected: params.faucet_leaves,
                actual: count,
            });
        }
        if body.len() != count * 32 {
            return Err(Error::MalformedArtifact {
                kind,
                reason: format!("expected {} leaf bytes, got {}", count * 32, body.len()),
            });
        }
        let leaves = body
            .chunks_exact(32)
            .map(|h| h.try_into().expect("chunk is 32 bytes"))
            .collect();
        Ok(Self { leaves })
    }

    pub fn leaves(&self) -> &[Hash32] {
        &self.leaves
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }
}

/// One nonce bucket: ordered opaque ciphertext records
#[derive(Debug, Clone)]
pub struct CiphertextBucket {
    index: u8,
    records: Vec<Vec<u8>>,
}

impl CiphertextBucket {
    /// Parse bucket file `index`: a sequence of `{u16be len, len bytes}` records.
    pub fn parse(params: &NetworkParams, index: u8, bytes: &[u8]) -> Result<Self> {
        let kind = ArtifactKind::NonceBucket(index);
        verify(params, kind, bytes)?;
        let mut records = Vec::new();
        let mut rest = bytes;
        while !rest.is_empty() {
            if rest.len() < 2 {
                return Err(Error::MalformedArtifact {
                    kind,
                    reason: "truncated record length".into(),
                });
            }
            let len = u16::from_be_bytes([rest[0], rest[1]]) as usize;
            rest = &rest[2..];
            if rest.len() < len {
                return Err(Error::MalformedArtifact {
                    kind,
                    reason: format!("record claims {} bytes, {} remain", len, rest.len()),
                });
            }
            records.push(rest[..len].to_vec());
            rest = &rest[len..];
        }
        Ok(Self { index, records })
    }

    pub fn index(&self) -> u8 {
        self.index
    }

    /// Records in file order
    pub fn records(&self) -> &[Vec<u8>] {
        &self.records
    }
}

/// One row of the proof mapping: address-origin redemption metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingEntry(pub String, pub u64, pub bool);

impl MappingEntry {
    pub fn address(&self) -> &str {
        &self.0
    }

    pub fn value(&self) -> u64 {
        self.1
    }

    pub fn sponsor(&self) -> bool {
        self.2
    }
}

/// The proof mapping file: `[address, value, sponsorFlag]` tuples
#[derive(Debug, Clone)]
pub struct ProofMapping {
    entries: Vec<MappingEntry>,
}

impl ProofMapping {
    pub fn parse(params: &NetworkParams, bytes: &[u8]) -> Result<Self> {
        verify(params, ArtifactKind::ProofMapping, bytes)?;
        let entries: Vec<MappingEntry> = serde_json::from_slice(bytes)?;
        Ok(Self { entries })
    }

    /// Metadata for an address, if it was registered
    pub fn get(&self, address: &str) -> Option<&MappingEntry> {
        self.entries.iter().find(|e| e.address() == address)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Read the u32 big-endian count prefix
fn read_count(kind: ArtifactKind, bytes: &[u8]) -> Result<(usize, &[u8])> {
    if bytes.len() < 4 {
        return Err(Error::MalformedArtifact {
            kind,
            reason: "missing count prefix".into(),
        });
    }
    let count = u32::from_be_bytes(bytes[..4].try_into().expect("4 bytes")) as usize;
    Ok((count, &bytes[4..]))
}
