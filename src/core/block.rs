use crate::core::{merkle_root, MerkleProof, MerkleTree, ProofOfWork, Transaction};
use crate::error::{BlockchainError, Result};
use crate::utils::{current_timestamp, deserialize, serialize, sha256_hex};
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::atomic::AtomicBool;

/// Previous-hash placeholder of the genesis block
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Digest of the block header fields
pub fn compute_block_hash(
    previous_hash: &str,
    timestamp: i64,
    merkle_root: &str,
    nonce: u64,
) -> String {
    sha256_hex(format!("{previous_hash}{timestamp}{merkle_root}{nonce}").as_bytes())
}

#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct Block {
    previous_hash: String,
    timestamp: i64,
    merkle_root: String,
    nonce: u64,
    difficulty: u32,
    hash: String,
    transactions: Vec<Transaction>,
}

impl Block {
    /// Empty, unsealed block on top of `previous_hash`
    pub fn new(previous_hash: &str) -> Result<Block> {
        let mut block = Block {
            previous_hash: previous_hash.to_string(),
            timestamp: current_timestamp()?,
            merkle_root: String::new(),
            nonce: 0,
            difficulty: 0,
            hash: String::new(),
            transactions: vec![],
        };
        block.hash = block.calculate_hash();
        Ok(block)
    }

    /// Sealed genesis block holding only `transaction`
    pub fn genesis(transaction: Transaction, difficulty: u32) -> Result<Block> {
        let mut block = Block::new(GENESIS_PREVIOUS_HASH)?;
        block.add_transaction(transaction);
        block.seal(difficulty)?;
        Ok(block)
    }

    /// Append a transaction the ledger has already validated and applied.
    pub fn add_transaction(&mut self, transaction: Transaction) {
        self.transactions.push(transaction);
        self.hash = self.calculate_hash();
    }

    /// Put `transactions` back in front of anything accumulated since.
    pub fn prepend_transactions(&mut self, transactions: Vec<Transaction>) {
        let newer = std::mem::replace(&mut self.transactions, transactions);
        self.transactions.extend(newer);
        self.hash = self.calculate_hash();
    }

    /// Point an unsealed block at a new parent.
    pub fn relink(&mut self, previous_hash: &str) {
        self.previous_hash = previous_hash.to_string();
        self.hash = self.calculate_hash();
    }

    pub fn seal(&mut self, difficulty: u32) -> Result<()> {
        self.seal_with_cancel(difficulty, &AtomicBool::new(false))
    }

    /// Compute the Merkle root once, then search nonces until the hash has
    /// `difficulty` leading hex zeros. On cancellation the block is unchanged.
    pub fn seal_with_cancel(&mut self, difficulty: u32, cancel: &AtomicBool) -> Result<()> {
        let leaves: Vec<String> = self
            .transactions
            .iter()
            .map(|tx| tx.get_id().to_string())
            .collect();
        let root = merkle_root(&leaves);

        info!(
            "Starting proof-of-work for block with {} transactions at difficulty {difficulty}",
            self.transactions.len()
        );
        let pow =
            ProofOfWork::new_proof_of_work(&self.previous_hash, self.timestamp, &root, difficulty)?;
        let solution = pow.run(cancel)?;

        self.merkle_root = root;
        self.nonce = solution.nonce;
        self.difficulty = difficulty;
        self.hash = solution.hash;
        info!(
            "Proof-of-work completed for block {} after {} attempts",
            self.hash, solution.attempts
        );
        Ok(())
    }

    pub fn calculate_hash(&self) -> String {
        compute_block_hash(
            &self.previous_hash,
            self.timestamp,
            &self.merkle_root,
            self.nonce,
        )
    }

    fn transaction_ids(&self) -> Vec<String> {
        self.transactions
            .iter()
            .map(|tx| tx.get_id().to_string())
            .collect()
    }

    /// Verify that the block's Merkle root matches its transactions
    pub fn verify_merkle_root(&self) -> bool {
        merkle_root(&self.transaction_ids()) == self.merkle_root
    }

    /// Generate a Merkle proof for a transaction in this block
    pub fn merkle_proof(&self, transaction_index: usize) -> Result<MerkleProof> {
        if transaction_index >= self.transactions.len() {
            return Err(BlockchainError::InvalidBlock(format!(
                "Transaction index {} out of bounds ({} transactions)",
                transaction_index,
                self.transactions.len()
            )));
        }
        MerkleTree::from_leaves(&self.transaction_ids()).proof(transaction_index)
    }

    /// Verify a Merkle proof against this block's Merkle root
    pub fn verify_merkle_proof(&self, proof: &MerkleProof) -> bool {
        proof.merkle_root == self.merkle_root && MerkleTree::verify_proof(proof)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Block> {
        deserialize::<Block>(bytes)
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn into_transactions(self) -> Vec<Transaction> {
        self.transactions
    }

    pub fn get_transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    pub fn get_previous_hash(&self) -> &str {
        self.previous_hash.as_str()
    }

    pub fn get_hash(&self) -> &str {
        self.hash.as_str()
    }

    pub fn get_timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn get_difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn get_merkle_root(&self) -> &str {
        self.merkle_root.as_str()
    }

    pub fn get_nonce(&self) -> u64 {
        self.nonce
    }
}
