//! redeem-core: allocation-tree engine for one-time reward redemption
//!
//! A holder of a pre-registered key (or address) proves eligibility to
//! redeem a reward from a fixed, published allocation tree without
//! revealing — beyond a bounded anonymity set — which entry they control
//! until the proof is used.
//!
//! # Privacy & Threat Model
//!
//! - **Published data**: main tree (N subtrees of M leaf hashes each),
//!   flat faucet list, 256 nonce-ciphertext buckets, proof mapping.
//!   All artifacts are digest-pinned; a mismatch aborts before any work.
//! - **Anonymity set**: a key-origin redemption is hidden within its
//!   subtree of M leaves. The tweak (default mode) blinds the redeemed
//!   public key so its leaf hash is unlinkable to the registered key
//!   without the discovered nonce.
//! - **Bare mode** trades that unlinkability for simplicity: the nonce is
//!   published as an auxiliary field and the key stays linkable.
//! - **Non-goals**: tree generation and chain submission are out of scope;
//!   so is hiding *that* a redemption happened.
//!
//! Pipeline: artifact store -> leaf index -> nonce resolver -> key
//! transform -> subtree differ -> proof assembler. Address-origin (faucet)
//! redemptions skip straight from the leaf index to the assembler.

mod address;
mod artifact;
mod error;
mod event;
mod index;
mod key;
mod merkle;
mod nonce;
mod params;
mod proof;
mod redeemer;
mod subtree;

pub use address::TargetAddress;
pub use artifact::{
    verify as verify_artifact, ArtifactKind, CiphertextBucket, FaucetList, MainTree, MappingEntry,
    ProofMapping,
};
pub use error::Error;
pub use event::{Event, EventSink, NullSink, TracingSink};
pub use index::MainIndex;
pub use key::{AllocationKey, KeyOrigin, RedeemSecret, TransformMode, TransformedKey};
pub use merkle::{branch, root_from_branch, tree_root};
pub use nonce::{resolve, seal_pair, NonceSeedPair};
pub use params::{Network, NetworkParams, PROOF_VERSION};
pub use proof::{ProofBuilder, RedemptionProof};
pub use redeemer::{RedeemOutcome, Redeemer};
pub use subtree::{derive_fillers, diff, SubtreeDiff};

pub type Result<T> = std::result::Result<T, Error>;

/// 32-byte leaf/node hash
pub type Hash32 = [u8; 32];

/// 32-byte discovered nonce
pub type Nonce32 = [u8; 32];

/// 32-byte subtree filler seed
pub type Seed32 = [u8; 32];

/// Constants shared across the redemption pipeline
pub mod constants {
    /// Number of nonce-ciphertext buckets
    pub const BUCKET_COUNT: usize = 256;

    /// Reward value for an ordinary entry, in 1e-6 units
    pub const REWARD_VALUE: u64 = 100_000_000;

    /// Reward value for a sponsor entry, in 1e-6 units
    pub const SPONSOR_VALUE: u64 = 500_000_000;

    /// Decrypted bucket record size: nonce(32) || seed(32)
    pub const NONCE_SEED_LEN: usize = 64;
}
