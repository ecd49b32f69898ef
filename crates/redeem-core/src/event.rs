//! Structured progress events
//!
//! The core never prints. Each pipeline stage reports a discrete event
//! through an [`EventSink`] and the presentation layer decides how to
//! render it. [`TracingSink`] forwards to `tracing` and is the default.

use crate::artifact::ArtifactKind;
use crate::Hash32;

/// A discrete pipeline progress event
#[derive(Debug, Clone)]
pub enum Event {
    /// An artifact passed its pinned-digest check
    ArtifactVerified { kind: ArtifactKind, bytes: usize },
    /// The transformed (or address) leaf was located in the tree
    LeafLocated {
        index: usize,
        subindex: Option<usize>,
    },
    /// The bucket scan finished with at least one decryptable record
    NoncesFound { bucket: u8, count: usize },
    /// A matched subtree was partitioned into genuine and filler leaves
    SubtreeDiffed {
        index: usize,
        genuine: Vec<Hash32>,
        own_slot: Option<usize>,
    },
    /// A proof was assembled and passed self-verification
    ProofAssembled { index: usize, fee: u64 },
}

/// Receiver for pipeline progress
pub trait EventSink {
    fn emit(&self, event: Event);
}

/// Default sink: structured `tracing` records
#[derive(Debug, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: Event) {
        match event {
            Event::ArtifactVerified { kind, bytes } => {
                tracing::info!(artifact = %kind, bytes, "artifact verified");
            }
            Event::LeafLocated { index, subindex } => {
                tracing::info!(index, ?subindex, "leaf located");
            }
            Event::NoncesFound { bucket, count } => {
                tracing::info!(bucket, count, "nonce found");
            }
            Event::SubtreeDiffed {
                index,
                genuine,
                own_slot,
            } => {
                tracing::info!(index, genuine = genuine.len(), ?own_slot, "subtree diffed");
            }
            Event::ProofAssembled { index, fee } => {
                tracing::info!(index, fee, "proof assembled");
            }
        }
    }
}

/// Sink that drops everything; for callers that only want the result
#[derive(Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: Event) {}
}
