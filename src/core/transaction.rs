// Value moves through discrete unspent outputs. A transaction consumes some of
// the sender's outputs and creates one output for the recipient plus one
// change output back to the sender, so nothing is created or destroyed.

use crate::core::TransactionRules;
use crate::error::{BlockchainError, Result};
use crate::storage::UtxoPool;
use crate::utils::{
    base64_decode, base64_encode, current_sequence, ecdsa_p256_sha256_sign_verify, sha256_hex,
};
use crate::wallet::{address_matches_key, validate_address, Wallet};
use serde::{Deserialize, Serialize};

/// Reserved id of the transaction that funds the genesis block
pub const GENESIS_TRANSACTION_ID: &str = "genesis";

/// An output waiting to be spent.
///
/// `id = sha256(owner_address : amount : parent_transaction_id)`
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct UnspentOutput {
    id: String,
    owner_address: String,
    amount: u64,
    parent_transaction_id: String,
}

impl UnspentOutput {
    pub fn new(owner_address: &str, amount: u64, parent_transaction_id: &str) -> UnspentOutput {
        UnspentOutput {
            id: Self::compute_id(owner_address, amount, parent_transaction_id),
            owner_address: owner_address.to_string(),
            amount,
            parent_transaction_id: parent_transaction_id.to_string(),
        }
    }

    pub fn compute_id(owner_address: &str, amount: u64, parent_transaction_id: &str) -> String {
        sha256_hex(format!("{owner_address}:{amount}:{parent_transaction_id}").as_bytes())
    }

    pub fn get_id(&self) -> &str {
        self.id.as_str()
    }

    pub fn get_owner_address(&self) -> &str {
        self.owner_address.as_str()
    }

    pub fn get_amount(&self) -> u64 {
        self.amount
    }

    pub fn get_parent_transaction_id(&self) -> &str {
        self.parent_transaction_id.as_str()
    }

    pub fn is_owned_by(&self, address: &str) -> bool {
        self.owner_address == address
    }

    /// The stored id still matches the output's fields
    pub fn is_consistent(&self) -> bool {
        self.id == Self::compute_id(&self.owner_address, self.amount, &self.parent_transaction_id)
    }
}

/// A signed transfer of `amount` from `sender_address` to `recipient_address`.
///
/// Keys and signatures are stored Base64 encoded so the JSON form of a block
/// stays readable. Inputs and outputs are filled in when the ledger applies
/// the transaction against its unspent-output pool.
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct Transaction {
    id: String,
    sender_address: String,
    sender_public_key: String,
    recipient_address: String,
    amount: u64,
    sequence: u64,
    memo: String,
    signature: String,
    inputs: Vec<UnspentOutput>,
    outputs: Vec<UnspentOutput>,
}

impl Transaction {
    /// The exact bytes a sender signs. The id is the SHA-256 of the same bytes.
    /// An empty memo is left out entirely.
    pub fn signing_payload(
        sender_address: &str,
        recipient_address: &str,
        amount: u64,
        sequence: u64,
        memo: &str,
    ) -> Vec<u8> {
        // I separate the fields with ':' so "12" + "3" and "1" + "23" can never
        // produce the same bytes to sign
        let mut payload = format!("{sender_address}:{recipient_address}:{amount}:{sequence}");
        if !memo.is_empty() {
            payload.push(':');
            payload.push_str(memo);
        }
        payload.into_bytes()
    }

    pub fn compute_id(
        sender_address: &str,
        recipient_address: &str,
        amount: u64,
        sequence: u64,
        memo: &str,
    ) -> String {
        sha256_hex(&Self::signing_payload(
            sender_address,
            recipient_address,
            amount,
            sequence,
            memo,
        ))
    }

    /// Build and sign a transfer with a caller-chosen sequence number.
    pub fn build(
        sender: &Wallet,
        recipient_address: &str,
        amount: u64,
        sequence: u64,
    ) -> Result<Transaction> {
        Self::build_with_memo(sender, recipient_address, amount, sequence, "")
    }

    /// Build and sign a transfer whose memo is covered by the signature.
    pub fn build_with_memo(
        sender: &Wallet,
        recipient_address: &str,
        amount: u64,
        sequence: u64,
        memo: &str,
    ) -> Result<Transaction> {
        if amount == 0 {
            return Err(BlockchainError::AmountNotPositive);
        }
        if !validate_address(recipient_address) {
            return Err(BlockchainError::InvalidAddress(format!(
                "Invalid recipient address: {recipient_address}"
            )));
        }

        // The id is the hash of exactly what I sign, so it never depends on the
        // signature bytes themselves
        let sender_address = sender.get_address();
        let payload =
            Self::signing_payload(&sender_address, recipient_address, amount, sequence, memo);
        let signature = sender.sign(&payload)?;

        Ok(Transaction {
            id: sha256_hex(&payload),
            sender_address,
            sender_public_key: base64_encode(sender.get_public_key()),
            recipient_address: recipient_address.to_string(),
            amount,
            sequence,
            memo: memo.to_string(),
            signature: base64_encode(&signature),
            inputs: vec![],
            outputs: vec![],
        })
    }

    /// Build and sign a transfer sequenced by the nanosecond clock.
    pub fn build_now(sender: &Wallet, recipient_address: &str, amount: u64) -> Result<Transaction> {
        Self::build(sender, recipient_address, amount, current_sequence()?)
    }

    /// Wrap an already-signed transfer received from a remote wallet.
    /// Nothing is verified here; the ledger does that on submission.
    pub fn from_signed_parts(
        sender_public_key: &str,
        sender_address: &str,
        recipient_address: &str,
        amount: u64,
        sequence: u64,
        memo: &str,
        signature: &str,
    ) -> Transaction {
        Transaction {
            id: Self::compute_id(sender_address, recipient_address, amount, sequence, memo),
            sender_address: sender_address.to_string(),
            sender_public_key: sender_public_key.to_string(),
            recipient_address: recipient_address.to_string(),
            amount,
            sequence,
            memo: memo.to_string(),
            signature: signature.to_string(),
            inputs: vec![],
            outputs: vec![],
        }
    }

    /// The transaction that mints the initial supply. It has no sender, no
    /// inputs and no signature.
    pub fn genesis(recipient_address: &str, amount: u64) -> Transaction {
        Transaction {
            id: GENESIS_TRANSACTION_ID.to_string(),
            sender_address: String::new(),
            sender_public_key: String::new(),
            recipient_address: recipient_address.to_string(),
            amount,
            sequence: 0,
            memo: String::new(),
            signature: String::new(),
            inputs: vec![],
            outputs: vec![],
        }
    }

    pub fn is_genesis(&self) -> bool {
        self.id == GENESIS_TRANSACTION_ID
    }

    /// Recompute the signed message from the current fields and check it
    /// against the stored signature. Genesis transactions carry no signature
    /// and never verify.
    pub fn verify_signature(&self) -> bool {
        if self.is_genesis() {
            return false;
        }
        let public_key = match base64_decode(&self.sender_public_key) {
            Ok(key) => key,
            Err(_) => return false,
        };
        let signature = match base64_decode(&self.signature) {
            Ok(signature) => signature,
            Err(_) => return false,
        };
        let payload = Self::signing_payload(
            &self.sender_address,
            &self.recipient_address,
            self.amount,
            self.sequence,
            &self.memo,
        );
        ecdsa_p256_sha256_sign_verify(&public_key, &signature, &payload)
    }

    /// Sender address derives from the embedded public key
    pub fn sender_matches_key(&self) -> bool {
        match base64_decode(&self.sender_public_key) {
            Ok(public_key) => address_matches_key(&self.sender_address, &public_key),
            Err(_) => false,
        }
    }

    /// Apply this transaction to `pool`.
    ///
    /// Every check runs before the first mutation, so a rejected transaction
    /// leaves the pool untouched. The caller holds the ledger lock.
    pub fn apply(&mut self, pool: &mut UtxoPool, rules: &TransactionRules) -> Result<()> {
        if self.is_genesis() {
            let output = UnspentOutput::new(&self.recipient_address, self.amount, &self.id);
            pool.insert_all(std::slice::from_ref(&output));
            self.outputs = vec![output];
            return Ok(());
        }

        // Paying myself would give the recipient output and the change output
        // the same id, and one of them would silently vanish from the pool
        if self.sender_address == self.recipient_address {
            return Err(BlockchainError::Transaction(
                "Sender and recipient must differ".to_string(),
            ));
        }

        // I pick inputs here, against the live pool, rather than when the
        // transaction was signed; the wallet never needs to know which outputs
        // it owns
        let sender = self.sender_address.clone();
        let inputs = pool
            .select(|output| output.is_owned_by(&sender))
            .select_covering(self.amount);
        let covering = inputs
            .iter()
            .try_fold(0u64, |total, output| total.checked_add(output.get_amount()))
            .ok_or_else(|| BlockchainError::Transaction("Input value overflow".to_string()))?;

        if covering < self.amount {
            return Err(BlockchainError::InsufficientFunds {
                required: self.amount,
                available: covering,
            });
        }
        if covering < rules.minimum_transaction_value {
            return Err(BlockchainError::BelowMinimumTransactionValue {
                value: covering,
                minimum: rules.minimum_transaction_value,
            });
        }

        let mut outputs = vec![UnspentOutput::new(
            &self.recipient_address,
            self.amount,
            &self.id,
        )];
        // Whatever the inputs cover beyond the amount comes back as change,
        // and I skip the change output entirely when there is none
        let change = covering - self.amount;
        if change > 0 {
            outputs.push(UnspentOutput::new(&self.sender_address, change, &self.id));
        }

        // Output ids only depend on owner, amount and this transaction's id, so
        // if they are already in the pool this exact transfer went through
        if outputs.iter().any(|output| pool.contains(output.get_id())) {
            return Err(BlockchainError::Transaction(format!(
                "Transaction {} was already applied",
                self.id
            )));
        }

        pool.remove_all(&inputs);
        pool.insert_all(&outputs);
        self.inputs = inputs;
        self.outputs = outputs;
        Ok(())
    }

    /// Structural check used when validating a stored chain: ids recompute,
    /// the signature verifies and value is conserved.
    pub fn verify_integrity(&self) -> Result<()> {
        let invalid = |reason: &str| {
            Err(BlockchainError::InvalidBlock(format!(
                "Transaction {}: {reason}",
                self.id
            )))
        };

        if !self.outputs.iter().all(UnspentOutput::is_consistent)
            || !self.inputs.iter().all(UnspentOutput::is_consistent)
        {
            return invalid("output id does not match its fields");
        }
        if self
            .outputs
            .iter()
            .any(|output| output.get_parent_transaction_id() != self.id)
        {
            return invalid("output does not reference its transaction");
        }
        let pays_recipient = self.outputs.first().is_some_and(|output| {
            output.is_owned_by(&self.recipient_address) && output.get_amount() == self.amount
        });
        if !pays_recipient {
            return invalid("first output does not pay the recipient");
        }

        if self.is_genesis() {
            if !self.inputs.is_empty() || self.outputs.len() != 1 {
                return invalid("genesis transaction must have no inputs and one output");
            }
            return Ok(());
        }

        if self.id
            != Self::compute_id(
                &self.sender_address,
                &self.recipient_address,
                self.amount,
                self.sequence,
                &self.memo,
            )
        {
            return invalid("id does not match its fields");
        }
        if !self.sender_matches_key() || !self.verify_signature() {
            return invalid("signature does not verify");
        }
        // Nothing but genesis may create value
        if self.get_input_value()? != self.get_output_value()? {
            return invalid("inputs and outputs do not balance");
        }
        Ok(())
    }

    pub fn get_input_value(&self) -> Result<u64> {
        sum_amounts(&self.inputs)
    }

    pub fn get_output_value(&self) -> Result<u64> {
        sum_amounts(&self.outputs)
    }

    pub fn get_id(&self) -> &str {
        self.id.as_str()
    }

    pub fn get_sender_address(&self) -> &str {
        self.sender_address.as_str()
    }

    pub fn get_sender_public_key(&self) -> &str {
        self.sender_public_key.as_str()
    }

    pub fn get_recipient_address(&self) -> &str {
        self.recipient_address.as_str()
    }

    pub fn get_amount(&self) -> u64 {
        self.amount
    }

    pub fn get_sequence(&self) -> u64 {
        self.sequence
    }

    pub fn get_memo(&self) -> &str {
        self.memo.as_str()
    }

    pub fn get_signature(&self) -> &str {
        self.signature.as_str()
    }

    pub fn get_inputs(&self) -> &[UnspentOutput] {
        self.inputs.as_slice()
    }

    pub fn get_outputs(&self) -> &[UnspentOutput] {
        self.outputs.as_slice()
    }
}

fn sum_amounts(outputs: &[UnspentOutput]) -> Result<u64> {
    outputs
        .iter()
        .try_fold(0u64, |total, output| total.checked_add(output.get_amount()))
        .ok_or_else(|| BlockchainError::Transaction("Value overflow".to_string()))
}
