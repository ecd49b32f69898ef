//! Leaf index: subtree roots and target-hash lookup
//!
//! Lookup is a linear scan. The generation process probably emits sorted
//! leaves, but nothing validates that against the published data, so
//! binary search is deliberately not assumed here; exactness of match is
//! the contract, not speed.

use crate::artifact::{FaucetList, MainTree};
use crate::{merkle, Hash32};

/// Top-level leaves: one merkle root per published subtree
#[derive(Debug, Clone)]
pub struct MainIndex {
    roots: Vec<Hash32>,
}

impl MainIndex {
    /// Compute the root of each subtree; these are the leaves the
    /// published main root commits to.
    pub fn build(tree: &MainTree) -> Self {
        let roots = tree
            .subtrees()
            .iter()
            .map(|subtree| merkle::tree_root(subtree))
            .collect();
        Self { roots }
    }

    /// Subtree roots in tree order
    pub fn roots(&self) -> &[Hash32] {
        &self.roots
    }

    /// Root of the whole main tree
    pub fn root(&self) -> Hash32 {
        merkle::tree_root(&self.roots)
    }
}

/// First exact match of `target` in the main tree: (subtree, slot)
pub fn find_in_main(tree: &MainTree, target: &Hash32) -> Option<(usize, usize)> {
    for (i, subtree) in tree.subtrees().iter().enumerate() {
        for (j, leaf) in subtree.iter().enumerate() {
            if leaf == target {
                return Some((i, j));
            }
        }
    }
    None
}

/// First exact match of `target` in the flat faucet list
pub fn find_in_faucet(list: &FaucetList, target: &Hash32) -> Option<usize> {
    list.leaves().iter().position(|leaf| leaf == target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ArtifactKind;
    use crate::{Error, NetworkParams};
    use sha2::{Digest, Sha256};

    fn leaf(i: u8) -> Hash32 {
        Sha256::digest([i]).into()
    }

    /// N=4 subtrees of M=2 leaves, pinned into a testnet-shaped params value
    fn synthetic_tree() -> (NetworkParams, MainTree) {
        let mut params = NetworkParams::testnet();
        params.main_leaves = 4;
        params.subtree_size = 2;

        let mut bytes = (4u32).to_be_bytes().to_vec();
        for i in 0..8u8 {
            bytes.extend_from_slice(&leaf(i));
        }
        params.main_tree_digest = Sha256::digest(&bytes).into();
        let tree = MainTree::parse(&params, &bytes).unwrap();
        (params, tree)
    }

    #[test]
    fn find_in_main_returns_exact_position() {
        let (_params, tree) = synthetic_tree();
        // top-leaf 2, subtree-slot 1 holds leaf(5)
        assert_eq!(find_in_main(&tree, &leaf(5)), Some((2, 1)));
        assert_eq!(find_in_main(&tree, &leaf(0)), Some((0, 0)));
        assert_eq!(find_in_main(&tree, &leaf(99)), None);
    }

    #[test]
    fn branch_from_found_position_reproduces_root() {
        let (_params, tree) = synthetic_tree();
        let target = leaf(5);
        let (i, j) = find_in_main(&tree, &target).unwrap();
        let index = MainIndex::build(&tree);

        let subtree = tree.subtree(i).unwrap();
        let sub_branch = merkle::branch(subtree, j).unwrap();
        let subtree_root = merkle::root_from_branch(&target, j, &sub_branch);
        assert_eq!(subtree_root, index.roots()[i]);

        let top_branch = merkle::branch(index.roots(), i).unwrap();
        assert_eq!(
            merkle::root_from_branch(&subtree_root, i, &top_branch),
            index.root()
        );
    }

    #[test]
    fn find_in_faucet_positions_and_missing() {
        let mut params = NetworkParams::testnet();
        params.faucet_leaves = 3;
        let mut bytes = (3u32).to_be_bytes().to_vec();
        for i in 10..13u8 {
            bytes.extend_from_slice(&leaf(i));
        }
        params.faucet_digest = Sha256::digest(&bytes).into();
        let list = FaucetList::parse(&params, &bytes).unwrap();

        assert_eq!(find_in_faucet(&list, &leaf(11)), Some(1));
        assert_eq!(find_in_faucet(&list, &leaf(42)), None);
    }

    #[test]
    fn leaf_count_mismatch_is_fatal() {
        let (mut params, _tree) = synthetic_tree();
        params.main_leaves = 5;
        let mut bytes = (4u32).to_be_bytes().to_vec();
        for i in 0..8u8 {
            bytes.extend_from_slice(&leaf(i));
        }
        assert!(matches!(
            MainTree::parse(&params, &bytes),
            Err(Error::CountMismatch {
                kind: ArtifactKind::MainTree,
                expected: 5,
                actual: 4
            })
        ));
    }

    #[test]
    fn trailing_bytes_are_fatal() {
        let (mut params, _tree) = synthetic_tree();
        let mut bytes = (4u32).to_be_bytes().to_vec();
        for i in 0..8u8 {
            bytes.extend_from_slice(&leaf(i));
        }
        bytes.push(0);
        params.main_tree_digest = Sha256::digest(&bytes).into();
        assert!(matches!(
            MainTree::parse(&params, &bytes),
            Err(Error::MalformedArtifact { .. })
        ));
    }
}
