//! # Citizen Registry Merkle Tree
//!
//! Fixed-depth binary Poseidon tree over citizen leaves
//! `Poseidon(hashed_id, district)`. Empty slots hold the zero element. An
//! issuer publishes the root; a holder receives their leaf's authentication
//! path and proves membership with [`CitizenshipCircuit`](super::citizenship::CitizenshipCircuit).
//!
//! Path index bit `i` is `true` when the node at level `i` is a right child.

use ark_bn254::Fr;
use ark_ff::Zero;

use super::poseidon::hash2;

/// Depth of the registry tree (256 leaves).
pub const MERKLE_DEPTH: usize = 8;

/// Leaf value for a citizen.
pub fn citizen_leaf(hashed_id: &Fr, district: u64) -> Fr {
    hash2(hashed_id, &Fr::from(district))
}

/// Authentication path for one leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerklePath {
    pub siblings: Vec<Fr>,
    pub indices: Vec<bool>,
}

impl MerklePath {
    /// Recompute the root from `leaf`.
    pub fn root_from(&self, leaf: &Fr) -> Fr {
        self.siblings
            .iter()
            .zip(&self.indices)
            .fold(*leaf, |node, (sibling, is_right)| {
                if *is_right {
                    hash2(sibling, &node)
                } else {
                    hash2(&node, sibling)
                }
            })
    }
}

/// A fully materialized tree of `2^MERKLE_DEPTH` leaves.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    /// `levels[0]` are the leaves; `levels[MERKLE_DEPTH]` is `[root]`.
    levels: Vec<Vec<Fr>>,
}

impl MerkleTree {
    /// Build from up to `2^MERKLE_DEPTH` leaves, padding with zero.
    ///
    /// Returns `None` if there are too many leaves.
    pub fn new(leaves: &[Fr]) -> Option<Self> {
        let capacity = 1usize << MERKLE_DEPTH;
        if leaves.len() > capacity {
            return None;
        }
        let mut level = leaves.to_vec();
        level.resize(capacity, Fr::zero());
        let mut levels = vec![level];
        for _ in 0..MERKLE_DEPTH {
            let prev = levels.last()?;
            let next = prev.chunks(2).map(|pair| hash2(&pair[0], &pair[1])).collect();
            levels.push(next);
        }
        Some(Self { levels })
    }

    pub fn root(&self) -> Fr {
        self.levels[MERKLE_DEPTH][0]
    }

    pub fn leaf(&self, index: usize) -> Option<Fr> {
        self.levels[0].get(index).copied()
    }

    /// Authentication path for the leaf at `index`.
    pub fn path(&self, index: usize) -> Option<MerklePath> {
        if index >= self.levels[0].len() {
            return None;
        }
        let mut siblings = Vec::with_capacity(MERKLE_DEPTH);
        let mut indices = Vec::with_capacity(MERKLE_DEPTH);
        let mut i = index;
        for level in &self.levels[..MERKLE_DEPTH] {
            siblings.push(level[i ^ 1]);
            indices.push(i & 1 == 1);
            i >>= 1;
        }
        Some(MerklePath { siblings, indices })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> (MerkleTree, Vec<Fr>) {
        let leaves: Vec<Fr> = (0..5u64).map(|i| citizen_leaf(&Fr::from(1000 + i), i % 3)).collect();
        (MerkleTree::new(&leaves).unwrap(), leaves)
    }

    #[test]
    fn every_path_recomputes_root() {
        let (tree, leaves) = tree();
        for (i, leaf) in leaves.iter().enumerate() {
            let path = tree.path(i).unwrap();
            assert_eq!(path.siblings.len(), MERKLE_DEPTH);
            assert_eq!(path.root_from(leaf), tree.root());
        }
    }

    #[test]
    fn wrong_leaf_gives_other_root() {
        let (tree, _) = tree();
        let path = tree.path(2).unwrap();
        assert_ne!(path.root_from(&Fr::from(7u64)), tree.root());
    }

    #[test]
    fn index_bits_are_little_endian() {
        let (tree, _) = tree();
        let path = tree.path(5).unwrap();
        assert_eq!(&path.indices[..3], &[true, false, true]);
        assert!(path.indices[3..].iter().all(|b| !b));
    }

    #[test]
    fn capacity_is_enforced() {
        assert!(MerkleTree::new(&vec![Fr::zero(); 257]).is_none());
        assert!(tree().0.path(256).is_none());
    }
}
