//! Merkle hash-tree construction and inclusion branches
//!
//! SHA-256 over left || right for internal nodes; an odd level duplicates
//! its last node. The same construction covers both the per-subtree trees
//! and the top-level tree over subtree roots, so a two-branch proof is
//! just two applications of [`root_from_branch`].

use sha2::{Digest, Sha256};

use crate::Hash32;

fn parent(left: &Hash32, right: &Hash32) -> Hash32 {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

fn levels(leaves: &[Hash32]) -> Vec<Vec<Hash32>> {
    let mut all = vec![leaves.to_vec()];
    while all.last().map(|l| l.len()).unwrap_or(0) > 1 {
        let current = all.last().expect("at least one level");
        let mut next = Vec::with_capacity(current.len().div_ceil(2));
        for chunk in current.chunks(2) {
            let left = &chunk[0];
            let right = if chunk.len() == 2 { &chunk[1] } else { &chunk[0] };
            next.push(parent(left, right));
        }
        all.push(next);
    }
    all
}

/// Compute the root of a list of leaf hashes.
///
/// Empty input returns all zeros; a single leaf is its own root.
pub fn tree_root(leaves: &[Hash32]) -> Hash32 {
    if leaves.is_empty() {
        return [0u8; 32];
    }
    levels(leaves)
        .last()
        .and_then(|l| l.first())
        .copied()
        .expect("non-empty tree has a root")
}

/// Sibling path from `leaf_index` up to (not including) the root.
///
/// A missing sibling on an odd level is the node itself, matching the
/// duplicate-last rule in [`tree_root`].
pub fn branch(leaves: &[Hash32], leaf_index: usize) -> Option<Vec<Hash32>> {
    if leaf_index >= leaves.len() {
        return None;
    }
    let all = levels(leaves);
    let mut path = Vec::new();
    let mut index = leaf_index;
    for level in &all[..all.len().saturating_sub(1)] {
        let sibling = index ^ 1;
        let node = level.get(sibling).or_else(|| level.get(index));
        path.push(*node.expect("index is within level"));
        index /= 2;
    }
    Some(path)
}

/// Hash a leaf up a sibling path, reproducing the committed root.
pub fn root_from_branch(leaf: &Hash32, leaf_index: usize, path: &[Hash32]) -> Hash32 {
    let mut node = *leaf;
    let mut index = leaf_index;
    for sibling in path {
        node = if index % 2 == 0 {
            parent(&node, sibling)
        } else {
            parent(sibling, &node)
        };
        index /= 2;
    }
    node
}
