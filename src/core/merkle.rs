use crate::error::{BlockchainError, Result};
use crate::utils::sha256_hex;
use serde::{Deserialize, Serialize};

/// Merkle tree over hex-encoded transaction ids.
///
/// Reduction policy: nodes are paired `(0,1), (2,3), ...` and an odd trailing
/// node is paired with itself. The leaf level is always reduced at least once,
/// so a single leaf `h` has root `sha256(h ‖ h)`. An empty tree has the empty
/// string as its root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerkleTree {
    /// `levels[0]` holds the leaves, the last level holds the root
    levels: Vec<Vec<String>>,
}

/// Merkle proof for transaction inclusion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    /// Leaf being proven
    pub leaf: String,
    /// Root the proof resolves to
    pub merkle_root: String,
    /// Sibling hashes from the leaf up to the root
    pub proof_path: Vec<ProofElement>,
    /// Index of the leaf in the block
    pub leaf_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofElement {
    /// Sibling hash
    pub hash: String,
    /// Direction: true if sibling is on the right, false if on the left
    pub is_right: bool,
}

impl MerkleTree {
    pub fn from_leaves(leaves: &[String]) -> MerkleTree {
        if leaves.is_empty() {
            return MerkleTree { levels: Vec::new() };
        }

        let mut levels = vec![leaves.to_vec()];
        loop {
            let current = &levels[levels.len() - 1];
            if current.len() == 1 && levels.len() > 1 {
                break;
            }
            let next: Vec<String> = current
                .chunks(2)
                .map(|pair| {
                    let left = &pair[0];
                    let right = pair.get(1).unwrap_or(left);
                    hash_pair(left, right)
                })
                .collect();
            levels.push(next);
        }

        MerkleTree { levels }
    }

    /// Root hash, or the empty string for an empty tree
    pub fn root(&self) -> String {
        self.levels
            .last()
            .and_then(|level| level.first())
            .cloned()
            .unwrap_or_default()
    }

    pub fn leaf_count(&self) -> usize {
        self.levels.first().map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Build an inclusion proof for the leaf at `leaf_index`
    pub fn proof(&self, leaf_index: usize) -> Result<MerkleProof> {
        if leaf_index >= self.leaf_count() {
            return Err(BlockchainError::InvalidBlock(format!(
                "Leaf index {} out of bounds (leaf count: {})",
                leaf_index,
                self.leaf_count()
            )));
        }

        let mut proof_path = Vec::with_capacity(self.levels.len() - 1);
        let mut index = leaf_index;
        for level in &self.levels[..self.levels.len() - 1] {
            let element = if index % 2 == 0 {
                // odd trailing node pairs with itself
                let sibling = level.get(index + 1).unwrap_or(&level[index]);
                ProofElement {
                    hash: sibling.clone(),
                    is_right: true,
                }
            } else {
                ProofElement {
                    hash: level[index - 1].clone(),
                    is_right: false,
                }
            };
            proof_path.push(element);
            index /= 2;
        }

        Ok(MerkleProof {
            leaf: self.levels[0][leaf_index].clone(),
            merkle_root: self.root(),
            proof_path,
            leaf_index,
        })
    }

    /// Verify a Merkle proof
    pub fn verify_proof(proof: &MerkleProof) -> bool {
        let computed = proof
            .proof_path
            .iter()
            .fold(proof.leaf.clone(), |current, element| {
                if element.is_right {
                    hash_pair(&current, &element.hash)
                } else {
                    hash_pair(&element.hash, &current)
                }
            });
        !proof.merkle_root.is_empty() && computed == proof.merkle_root
    }
}

/// Merkle root of `leaf_hashes` under the policy documented on [`MerkleTree`]
pub fn merkle_root(leaf_hashes: &[String]) -> String {
    MerkleTree::from_leaves(leaf_hashes).root()
}

fn hash_pair(left: &str, right: &str) -> String {
    let mut combined = String::with_capacity(left.len() + right.len());
    combined.push_str(left);
    combined.push_str(right);
    sha256_hex(combined.as_bytes())
}
