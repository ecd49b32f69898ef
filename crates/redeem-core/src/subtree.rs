//! Subtree differ: separate genuine registrations from synthetic padding
//!
//! Published subtrees always hold M hashes regardless of true occupancy.
//! The filler slots are derived from the seed that came back with the
//! nonce, so any true key holder can reproduce them from public data and
//! check that the padding hides no real entries. This is a transparency
//! check, not a security boundary.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{Hash32, Seed32};

type HmacSha256 = Hmac<Sha256>;

/// Partition of one matched subtree
#[derive(Debug, Clone)]
pub struct SubtreeDiff {
    /// (slot, hash) for every non-filler leaf, in subtree order
    pub genuine: Vec<(usize, Hash32)>,
    /// Slots occupied by reproducible filler
    pub synthetic: Vec<usize>,
    /// Which genuine slot is the caller's own transformed key, if any
    pub own_slot: Option<usize>,
}

/// Derive the M synthetic filler hashes for a subtree from its seed.
///
/// Keyed derivation in counter mode: block i is HMAC-SHA256(seed, i as
/// u32be), giving a fixed M*32-byte output sliced into 32-byte chunks.
pub fn derive_fillers(seed: &Seed32, m: usize) -> Vec<Hash32> {
    (0..m as u32)
        .map(|i| {
            let mut mac =
                HmacSha256::new_from_slice(seed).expect("HMAC accepts any key length");
            mac.update(&i.to_be_bytes());
            mac.finalize().into_bytes().into()
        })
        .collect()
}

/// Partition `subtree` into genuine and synthetic leaves using `seed`,
/// marking the caller's own leaf when given.
pub fn diff(subtree: &[Hash32], seed: &Seed32, own_leaf: Option<&Hash32>) -> SubtreeDiff {
    let fillers = derive_fillers(seed, subtree.len());
    let mut genuine = Vec::new();
    let mut synthetic = Vec::new();
    let mut own_slot = None;
    for (slot, leaf) in subtree.iter().enumerate() {
        if fillers.contains(leaf) {
            synthetic.push(slot);
        } else {
            if own_leaf == Some(leaf) {
                own_slot = Some(slot);
            }
            genuine.push((slot, *leaf));
        }
    }
    SubtreeDiff {
        genuine,
        synthetic,
        own_slot,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::Digest;

    fn genuine_leaf(i: u8) -> Hash32 {
        sha2::Sha256::digest([0xa0, i]).into()
    }

    #[test]
    fn fillers_are_deterministic_and_seed_sensitive() {
        let a = derive_fillers(&[1u8; 32], 4);
        let b = derive_fillers(&[1u8; 32], 4);
        let c = derive_fillers(&[2u8; 32], 4);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 4);
    }

    #[test]
    fn partition_recovers_exactly_k_genuine_for_all_k() {
        let m = 6usize;
        let seed = [7u8; 32];
        let fillers = derive_fillers(&seed, m);
        for k in 0..=m {
            let mut subtree: Vec<Hash32> = (0..k as u8).map(genuine_leaf).collect();
            subtree.extend_from_slice(&fillers[..m - k]);

            let result = diff(&subtree, &seed, None);
            assert_eq!(result.genuine.len(), k, "k={k}");
            assert_eq!(result.synthetic.len(), m - k, "k={k}");
            for (slot, hash) in &result.genuine {
                assert_eq!(subtree[*slot], *hash);
            }
        }
    }

    #[test]
    fn own_leaf_is_marked() {
        let seed = [9u8; 32];
        let fillers = derive_fillers(&seed, 4);
        let own = genuine_leaf(1);
        let subtree = vec![genuine_leaf(0), own, fillers[0], fillers[1]];

        let result = diff(&subtree, &seed, Some(&own));
        assert_eq!(result.own_slot, Some(1));
        assert_eq!(result.genuine.len(), 2);
        assert_eq!(result.synthetic, vec![2, 3]);
    }

    #[test]
    fn foreign_own_leaf_is_not_marked() {
        let seed = [9u8; 32];
        let fillers = derive_fillers(&seed, 2);
        let subtree = vec![genuine_leaf(0), fillers[0]];
        let result = diff(&subtree, &seed, Some(&genuine_leaf(5)));
        assert_eq!(result.own_slot, None);
    }
}
