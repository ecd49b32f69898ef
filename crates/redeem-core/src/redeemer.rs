//! Pipeline orchestration for one redemption run
//!
//! Key-origin: bucket scan -> key transform -> leaf lookup -> subtree
//! diff -> proof assembly, one entry at a time in bucket file order.
//! Address-origin: faucet lookup -> proof assembly. Loaded artifacts are
//! read-only once validated; the run is strictly sequential.

use crate::artifact::{CiphertextBucket, FaucetList, MainTree};
use crate::event::{Event, EventSink};
use crate::index::{find_in_main, MainIndex};
use crate::key::{AllocationKey, RedeemSecret, TransformMode};
use crate::nonce;
use crate::proof::{ProofBuilder, RedemptionProof};
use crate::subtree::{self, SubtreeDiff};
use crate::{Error, NetworkParams, Result, TargetAddress};

/// Result of a key-origin run: one proof (and one subtree partition) per
/// discovered reward entry, in bucket file order
#[derive(Debug)]
pub struct RedeemOutcome {
    pub proofs: Vec<RedemptionProof>,
    pub diffs: Vec<SubtreeDiff>,
}

/// Drives the redemption pipeline over validated artifacts
pub struct Redeemer<'a, S: EventSink> {
    params: &'a NetworkParams,
    sink: &'a S,
}

impl<'a, S: EventSink> Redeemer<'a, S> {
    pub fn new(params: &'a NetworkParams, sink: &'a S) -> Self {
        Self { params, sink }
    }

    /// Redeem every reward registered to a pgp/ssh key.
    #[allow(clippy::too_many_arguments)]
    pub fn redeem_key(
        &self,
        tree: &MainTree,
        bucket: &CiphertextBucket,
        key: &AllocationKey,
        secret: &RedeemSecret,
        mode: TransformMode,
        target: &TargetAddress,
        fee: u64,
    ) -> Result<RedeemOutcome> {
        if bucket.index() != key.bucket() {
            return Err(Error::InvalidKey(format!(
                "bucket {} does not match key bucket {}",
                bucket.index(),
                key.bucket()
            )));
        }

        let index = MainIndex::build(tree);
        let builder = ProofBuilder::new(self.params);

        let pairs = nonce::resolve(bucket, secret)?;
        self.sink.emit(Event::NoncesFound {
            bucket: bucket.index(),
            count: pairs.len(),
        });

        let mut proofs = Vec::with_capacity(pairs.len());
        let mut diffs = Vec::with_capacity(pairs.len());
        for pair in &pairs {
            let transformed = key.transform(mode, &pair.nonce)?;
            let leaf = transformed.leaf_hash();
            let (i, j) = find_in_main(tree, &leaf).ok_or(Error::LeafNotFound {
                lookup: "main tree",
            })?;
            self.sink.emit(Event::LeafLocated {
                index: i,
                subindex: Some(j),
            });

            let subtree_leaves = tree.subtree(i).expect("located subtree exists");
            let diff = subtree::diff(subtree_leaves, &pair.seed, Some(&leaf));
            self.sink.emit(Event::SubtreeDiffed {
                index: i,
                genuine: diff.genuine.iter().map(|(_, h)| *h).collect(),
                own_slot: diff.own_slot,
            });

            let proof =
                builder.key_origin(tree, &index, key, secret, mode, pair, target, fee)?;
            self.sink.emit(Event::ProofAssembled {
                index: i,
                fee: proof.fee,
            });

            proofs.push(proof);
            diffs.push(diff);
        }

        Ok(RedeemOutcome { proofs, diffs })
    }

    /// Redeem a pre-registered address entry from the faucet list.
    pub fn redeem_address(
        &self,
        faucet: &FaucetList,
        key: &AllocationKey,
        fee: u64,
    ) -> Result<RedemptionProof> {
        let builder = ProofBuilder::new(self.params);
        let proof = builder.address_origin_with_fee(faucet, key, fee)?;
        self.sink.emit(Event::LeafLocated {
            index: proof.index as usize,
            subindex: None,
        });
        self.sink.emit(Event::ProofAssembled {
            index: proof.index as usize,
            fee: proof.fee,
        });
        Ok(proof)
    }
}
