//! The ledger coordinator
//!
//! A [`Ledger`] owns the sealed chain, the block accumulating new
//! transactions, the unspent-output pool and the signatures and transaction
//! ids already spent. It is shared between threads behind an `Arc`.
//!
//! Locking: `state` guards the accumulating block, the pool and both replay
//! sets together, so a transaction is validated and applied in one
//! critical section. `chain` is only written while `state` is held, and the
//! order is always `state` then `chain`. Proof-of-work runs with neither lock
//! held, on a block that has already been swapped out of `state`.

use crate::config::LedgerConfig;
use crate::core::{
    Block, MerkleProof, ProofOfWork, SignedPayload, SignedRequest,
    Transaction, TransactionRules, GENESIS_PREVIOUS_HASH,
};
use crate::error::{BlockchainError, Result};
use crate::storage::{LedgerSnapshot, UtxoPool};
use crate::utils::{
    base64_decode, ecdsa_p256_sha256_sign_verify, signature_replay_key, to_json,
};
use crate::wallet::{address_matches_key, validate_address};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};

/// Accepted transfer, as reported back to the submitter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub transaction_id: String,
    pub sender_address: String,
    pub recipient_address: String,
    pub amount: u64,
    pub memo: String,
    /// Transactions waiting in the accumulating block, this one included
    pub pending_transactions: usize,
}

/// Result of a signed request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RequestOutcome {
    Accepted(Receipt),
    Mined(Block),
}

// Everything a submission reads and writes, so I can check and apply a
// transaction under one lock
struct LedgerState {
    current_block: Block,
    pool: UtxoPool,
    // Low-S replay keys, see signature_replay_key
    consumed_signatures: BTreeSet<String>,
    // Ids of every transaction on the chain or in the pending block. The id
    // does not cover the signature, so this still catches a re-encoded one
    consumed_transactions: BTreeSet<String>,
}

impl LedgerState {
    // I check both sets before touching the pool; the caller holds the lock
    fn check_not_replayed(&self, transaction: &Transaction) -> Result<()> {
        if self
            .consumed_signatures
            .contains(&signature_replay_key(transaction.get_signature()))
            || self.consumed_transactions.contains(transaction.get_id())
        {
            return Err(BlockchainError::SignatureAlreadyConsumed);
        }
        Ok(())
    }

    fn consume(&mut self, transaction: &Transaction) {
        if !transaction.is_genesis() {
            self.consumed_signatures
                .insert(signature_replay_key(transaction.get_signature()));
        }
        self.consumed_transactions
            .insert(transaction.get_id().to_string());
    }
}

pub struct Ledger {
    rules: TransactionRules,
    difficulty: u32,
    state: Mutex<LedgerState>,
    chain: RwLock<Vec<Block>>,
    /// Serializes calls to [`Ledger::mine`]
    mining: Mutex<()>,
    mining_active: AtomicBool,
    cancel: AtomicBool,
}

impl Ledger {
    /// Fresh ledger whose genesis block pays `genesis_amount` units to
    /// `genesis_address`.
    pub fn new(config: &LedgerConfig, genesis_address: &str, genesis_amount: u64) -> Result<Ledger> {
        config.validate()?;
        if !validate_address(genesis_address) {
            return Err(BlockchainError::InvalidAddress(format!(
                "Invalid genesis address: {genesis_address}"
            )));
        }
        if genesis_amount == 0 {
            return Err(BlockchainError::AmountNotPositive);
        }
        let rules = config.rules()?;

        info!("Creating genesis block for address: {genesis_address}");
        let mut pool = UtxoPool::new();
        let mut genesis_tx = Transaction::genesis(genesis_address, genesis_amount);
        genesis_tx.apply(&mut pool, &rules)?;
        let genesis = Block::genesis(genesis_tx, config.difficulty)?;
        let current_block = Block::new(genesis.get_hash())?;

        let mut state = LedgerState {
            current_block,
            pool,
            consumed_signatures: BTreeSet::new(),
            consumed_transactions: BTreeSet::new(),
        };
        for transaction in genesis.get_transactions() {
            state.consume(transaction);
        }

        Ok(Ledger {
            rules,
            difficulty: config.difficulty,
            state: Mutex::new(state),
            chain: RwLock::new(vec![genesis]),
            mining: Mutex::new(()),
            mining_active: AtomicBool::new(false),
            cancel: AtomicBool::new(false),
        })
    }

    pub fn rules(&self) -> &TransactionRules {
        &self.rules
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    /// Validate a signed transfer and, if it passes, apply it to the pool and
    /// append it to the accumulating block.
    ///
    /// Checks run in this order: amount, replay, address/key consistency,
    /// signature, balance. A rejected transaction changes nothing.
    pub fn submit_transaction(&self, mut transaction: Transaction) -> Result<Receipt> {
        if transaction.is_genesis() {
            return Err(BlockchainError::Transaction(
                "Genesis transactions cannot be submitted".to_string(),
            ));
        }
        if !validate_address(transaction.get_recipient_address()) {
            return Err(BlockchainError::InvalidAddress(format!(
                "Invalid recipient address: {}",
                transaction.get_recipient_address()
            )));
        }
        self.rules.check_amount(transaction.get_amount())?;

        // Signature checks are pure, so I run them before taking the lock and
        // keep the critical section down to the replay sets and the pool
        let key_matches = transaction.sender_matches_key();
        let signature_valid = transaction.verify_signature();

        let mut state = self.state.lock()?;
        // Replay comes first: a spent signature with edited fields should be
        // reported as a replay rather than as a bad signature
        state.check_not_replayed(&transaction)?;
        if !key_matches {
            return Err(BlockchainError::AddressKeyMismatch {
                address: transaction.get_sender_address().to_string(),
            });
        }
        if !signature_valid {
            return Err(BlockchainError::InvalidSignature);
        }

        let state = &mut *state;
        // apply() leaves the pool untouched on error, so a rejected
        // transaction consumes nothing and can be resubmitted later
        transaction.apply(&mut state.pool, &self.rules)?;
        state.consume(&transaction);

        let receipt = Receipt {
            transaction_id: transaction.get_id().to_string(),
            sender_address: transaction.get_sender_address().to_string(),
            recipient_address: transaction.get_recipient_address().to_string(),
            amount: transaction.get_amount(),
            memo: transaction.get_memo().to_string(),
            pending_transactions: state.current_block.get_transactions().len() + 1,
        };
        state.current_block.add_transaction(transaction);
        debug!(
            "Accepted transaction {} ({} pending)",
            receipt.transaction_id, receipt.pending_transactions
        );
        Ok(receipt)
    }

    /// Certify a signed request and act on it.
    pub fn submit_request(&self, request: SignedRequest) -> Result<RequestOutcome> {
        request.require_fields()?;
        debug!("Handling {} request", request.kind());
        match request {
            SignedRequest::Transaction(request) => {
                let amount = self.rules.parse_amount(&request.amount)?;
                let receipt = self.submit_transaction(request.to_transaction(amount))?;
                Ok(RequestOutcome::Accepted(receipt))
            }
            SignedRequest::Purchase(request) => {
                let amount = self.rules.parse_amount(&request.amount)?;
                let receipt = self.submit_transaction(request.to_transaction(amount))?;
                info!(
                    "Purchase of {:?} by {} accepted",
                    request.item, request.buyer_address
                );
                Ok(RequestOutcome::Accepted(receipt))
            }
            SignedRequest::Mining(request) => {
                self.certify(&request)?;
                info!("Mining requested by {}", request.miner_address);
                Ok(RequestOutcome::Mined(self.mine()?))
            }
        }
    }

    /// Replay, key and signature checks for a request that does not move
    /// value. The signature is consumed on success.
    fn certify(&self, request: &dyn SignedPayload) -> Result<()> {
        let public_key = base64_decode(request.signer_public_key())?;
        let key_matches = address_matches_key(request.signer_address(), &public_key);
        let signature_valid = match base64_decode(request.signature()) {
            Ok(signature) => ecdsa_p256_sha256_sign_verify(
                &public_key,
                &signature,
                &request.signing_payload(self.rules.scale)?,
            ),
            Err(_) => false,
        };

        let replay_key = signature_replay_key(request.signature());
        let mut state = self.state.lock()?;
        if state.consumed_signatures.contains(&replay_key) {
            return Err(BlockchainError::SignatureAlreadyConsumed);
        }
        if !key_matches {
            return Err(BlockchainError::AddressKeyMismatch {
                address: request.signer_address().to_string(),
            });
        }
        if !signature_valid {
            return Err(BlockchainError::InvalidSignature);
        }
        state.consumed_signatures.insert(replay_key);
        Ok(())
    }

    /// Seal the accumulating block and append it to the chain.
    ///
    /// Submissions keep flowing into a fresh block while the nonce search
    /// runs. If the search is cancelled the frozen transactions go back to
    /// the front of the accumulating block.
    pub fn mine(&self) -> Result<Block> {
        let _mining = self.mining.lock()?;
        self.cancel.store(false, Ordering::SeqCst);

        // I swap the accumulating block out for an empty one pointing at the
        // same parent, so submissions keep landing while I search for a nonce
        let mut frozen = {
            let mut state = self.state.lock()?;
            if state.current_block.is_empty() {
                return Err(BlockchainError::MiningPoolEmpty);
            }
            let fresh = Block::new(state.current_block.get_previous_hash())?;
            self.mining_active.store(true, Ordering::SeqCst);
            std::mem::replace(&mut state.current_block, fresh)
        };

        info!(
            "Mining block with {} transactions",
            frozen.get_transactions().len()
        );
        // No lock is held during the search; only cancel_mining talks to me
        // here, through the atomic flag
        let sealed = frozen.seal_with_cancel(self.difficulty, &self.cancel);
        self.mining_active.store(false, Ordering::SeqCst);

        let mut state = self.state.lock()?;
        match sealed {
            Ok(()) => {
                // Lock order is always state then chain. The block that
                // collected submissions meanwhile now builds on the new tip
                let mut chain = self.chain.write()?;
                state.current_block.relink(frozen.get_hash());
                chain.push(frozen.clone());
                info!(
                    "Successfully mined block {} (height {}, difficulty {})",
                    frozen.get_hash(),
                    chain.len() - 1,
                    self.difficulty
                );
                Ok(frozen)
            }
            Err(err) => {
                // The frozen transactions were applied before anything that
                // arrived during the search, so they go back in front
                warn!("Mining stopped: {err}; returning transactions to the pending block");
                state
                    .current_block
                    .prepend_transactions(frozen.into_transactions());
                Err(err)
            }
        }
    }

    /// Ask a running [`Ledger::mine`] to stop. No effect when idle.
    pub fn cancel_mining(&self) {
        if self.is_mining() {
            self.cancel.store(true, Ordering::SeqCst);
        }
    }

    pub fn is_mining(&self) -> bool {
        self.mining_active.load(Ordering::SeqCst)
    }

    pub fn validate_chain(&self) -> Result<()> {
        let chain = self.chain.read()?;
        validate_chain(&chain, self.difficulty)
    }

    pub fn is_chain_valid(&self) -> bool {
        match self.validate_chain() {
            Ok(()) => true,
            Err(err) => {
                warn!("Chain validation failed: {err}");
                false
            }
        }
    }

    /// Spendable units of `address`, pending transactions included
    pub fn balance(&self, address: &str) -> Result<u64> {
        Ok(self.state.lock()?.pool.balance_of(address))
    }

    pub fn total_supply(&self) -> Result<u64> {
        Ok(self.state.lock()?.pool.total_value())
    }

    pub fn chain_len(&self) -> Result<usize> {
        Ok(self.chain.read()?.len())
    }

    pub fn pending_len(&self) -> Result<usize> {
        Ok(self.state.lock()?.current_block.get_transactions().len())
    }

    pub fn pending_transactions(&self) -> Result<Vec<Transaction>> {
        Ok(self.state.lock()?.current_block.get_transactions().to_vec())
    }

    pub fn blocks(&self) -> Result<Vec<Block>> {
        Ok(self.chain.read()?.clone())
    }

    pub fn tip_hash(&self) -> Result<String> {
        let chain = self.chain.read()?;
        chain
            .last()
            .map(|block| block.get_hash().to_string())
            .ok_or_else(|| BlockchainError::InvalidBlock("Chain is empty".to_string()))
    }

    /// Look a transaction up in the sealed chain, then in the pending block
    pub fn find_transaction(&self, id: &str) -> Result<Option<Transaction>> {
        let state = self.state.lock()?;
        let chain = self.chain.read()?;
        Ok(chain
            .iter()
            .chain(std::iter::once(&state.current_block))
            .flat_map(|block| block.get_transactions())
            .find(|tx| tx.get_id() == id)
            .cloned())
    }

    /// Merkle inclusion proof for a sealed transaction
    pub fn transaction_proof(&self, id: &str) -> Result<Option<MerkleProof>> {
        let chain = self.chain.read()?;
        for block in chain.iter() {
            if let Some(index) = block
                .get_transactions()
                .iter()
                .position(|tx| tx.get_id() == id)
            {
                return block.merkle_proof(index).map(Some);
            }
        }
        Ok(None)
    }

    pub fn export_chain_json(&self) -> Result<String> {
        let chain = self.chain.read()?;
        to_json(&*chain)
    }

    pub fn snapshot(&self) -> Result<LedgerSnapshot> {
        let state = self.state.lock()?;
        let chain = self.chain.read()?;
        Ok(LedgerSnapshot {
            chain: chain.clone(),
            current_block: state.current_block.clone(),
            pool: state.pool.clone(),
            consumed_signatures: state.consumed_signatures.clone(),
        })
    }

    pub fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<()> {
        self.snapshot()?.save(path)
    }

    pub fn load_snapshot(config: &LedgerConfig, path: impl AsRef<Path>) -> Result<Ledger> {
        Self::from_snapshot(config, LedgerSnapshot::load(path)?)
    }

    /// Rebuild a ledger from a snapshot after checking the chain, the pending
    /// block and the pool all agree with each other.
    pub fn from_snapshot(config: &LedgerConfig, snapshot: LedgerSnapshot) -> Result<Ledger> {
        config.validate()?;
        validate_chain(&snapshot.chain, config.difficulty)?;

        let tip = snapshot
            .chain
            .last()
            .map(|block| block.get_hash())
            .unwrap_or_default();
        if snapshot.current_block.get_previous_hash() != tip {
            return Err(BlockchainError::InvalidBlock(
                "Pending block does not extend the chain tip".to_string(),
            ));
        }
        for transaction in snapshot.current_block.get_transactions() {
            if transaction.is_genesis() {
                return Err(BlockchainError::InvalidBlock(
                    "Pending block holds a genesis transaction".to_string(),
                ));
            }
            transaction.verify_integrity()?;
        }

        let replayed = UtxoPool::replay(
            snapshot
                .chain
                .iter()
                .chain(std::iter::once(&snapshot.current_block))
                .flat_map(|block| block.get_transactions()),
        )?;
        if replayed != snapshot.pool {
            return Err(BlockchainError::InvalidBlock(
                "Snapshot pool does not match its transactions".to_string(),
            ));
        }

        // The stored set only has to add what the blocks cannot tell me
        // (certified mining requests). Every transaction signature and id is
        // rebuilt from the blocks themselves, so a trimmed set cannot reopen
        // a replay
        let mut state = LedgerState {
            current_block: snapshot.current_block,
            pool: snapshot.pool,
            consumed_signatures: snapshot
                .consumed_signatures
                .iter()
                .map(|signature| signature_replay_key(signature))
                .collect(),
            consumed_transactions: BTreeSet::new(),
        };
        let pending = state.current_block.get_transactions().to_vec();
        for transaction in snapshot
            .chain
            .iter()
            .flat_map(|block| block.get_transactions())
            .chain(pending.iter())
        {
            if state
                .consumed_transactions
                .contains(transaction.get_id())
            {
                return Err(BlockchainError::InvalidBlock(format!(
                    "Transaction {} appears more than once",
                    transaction.get_id()
                )));
            }
            state.consume(transaction);
        }

        info!(
            "Restored ledger with {} blocks and {} pending transactions",
            snapshot.chain.len(),
            state.current_block.get_transactions().len()
        );
        Ok(Ledger {
            rules: config.rules()?,
            difficulty: config.difficulty,
            state: Mutex::new(state),
            chain: RwLock::new(snapshot.chain),
            mining: Mutex::new(()),
            mining_active: AtomicBool::new(false),
            cancel: AtomicBool::new(false),
        })
    }
}

/// Check a sealed chain end to end: linkage, header hashes, Merkle roots,
/// proof-of-work, every transaction's id and signature, that no transaction
/// or signature appears twice, and that no output is spent twice.
pub fn validate_chain(blocks: &[Block], minimum_difficulty: u32) -> Result<()> {
    let invalid = |index: usize, reason: &str| {
        Err(BlockchainError::InvalidBlock(format!("Block {index}: {reason}")))
    };

    let genesis = blocks
        .first()
        .ok_or_else(|| BlockchainError::InvalidBlock("Chain is empty".to_string()))?;
    if genesis.get_previous_hash() != GENESIS_PREVIOUS_HASH {
        return invalid(0, "genesis block does not start the chain");
    }
    match genesis.get_transactions() {
        [only] if only.is_genesis() => {}
        _ => return invalid(0, "genesis block must hold exactly the genesis transaction"),
    }

    // A re-encoded signature passes verify_integrity, so I also track ids and
    // low-S signature keys across the whole chain
    let mut seen_ids = BTreeSet::new();
    let mut seen_signatures = BTreeSet::new();

    for (index, block) in blocks.iter().enumerate() {
        if index > 0 {
            if block.get_previous_hash() != blocks[index - 1].get_hash() {
                return invalid(index, "previous hash does not match");
            }
            if block.is_empty() {
                return invalid(index, "block has no transactions");
            }
            if block.get_transactions().iter().any(Transaction::is_genesis) {
                return invalid(index, "genesis transaction outside the genesis block");
            }
        }
        if block.get_hash() != block.calculate_hash() {
            return invalid(index, "hash does not match block contents");
        }
        if !block.verify_merkle_root() {
            return invalid(index, "Merkle root does not match transactions");
        }
        if block.get_difficulty() < minimum_difficulty || !ProofOfWork::validate(block) {
            return invalid(index, "proof-of-work does not meet the difficulty");
        }
        for transaction in block.get_transactions() {
            transaction.verify_integrity()?;
            if !seen_ids.insert(transaction.get_id()) {
                return invalid(index, "transaction id appears twice in the chain");
            }
            if !transaction.is_genesis()
                && !seen_signatures.insert(signature_replay_key(transaction.get_signature()))
            {
                return invalid(index, "signature appears twice in the chain");
            }
        }
    }

    UtxoPool::replay(blocks.iter().flat_map(|block| block.get_transactions()))?;
    Ok(())
}

pub fn is_chain_valid(blocks: &[Block], minimum_difficulty: u32) -> bool {
    validate_chain(blocks, minimum_difficulty).is_ok()
}
