//! Ledger integration tests
//!
//! Drives the public API end to end: transfers, mining, replay protection,
//! tamper detection, snapshots and concurrent submission while mining.

use architect_ledger::core::{
    Block, Ledger, RequestOutcome, SignedRequest, Transaction, TransactionRequest,
};
use architect_ledger::storage::{LedgerSnapshot, UtxoPool};
use architect_ledger::utils::{from_json, to_json};
use architect_ledger::{
    base64_decode, base64_encode, validate_chain, BlockchainError, LedgerConfig, UnspentOutput,
    Wallet,
};
use num_bigint::BigUint;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use tempfile::tempdir;

fn config(difficulty: u32) -> LedgerConfig {
    LedgerConfig {
        difficulty,
        minimum_transaction_value: "1".to_string(),
        max_transaction_amount: "1000000".to_string(),
        amount_scale: 0,
        genesis_amount: "1000".to_string(),
        ..LedgerConfig::default()
    }
}

fn funded_ledger(difficulty: u32) -> (Ledger, Wallet, Wallet) {
    let alice = Wallet::new().unwrap();
    let bob = Wallet::new().unwrap();
    let ledger = Ledger::new(&config(difficulty), &alice.get_address(), 1000).unwrap();
    (ledger, alice, bob)
}

fn send(ledger: &Ledger, from: &Wallet, to: &Wallet, amount: u64, sequence: u64) {
    let tx = Transaction::build(from, &to.get_address(), amount, sequence).unwrap();
    ledger.submit_transaction(tx).unwrap();
}

/// Same transfer, signature rewritten from (r, s) to (r, n - s). Still a valid
/// P-256 signature over the same payload.
fn re_encoded(tx: &Transaction) -> Transaction {
    let order = BigUint::parse_bytes(
        b"ffffffff00000000ffffffffffffffffbce6faada7179e84f3b9cac2fc632551",
        16,
    )
    .unwrap();
    let raw = base64_decode(tx.get_signature()).unwrap();
    let s = BigUint::from_bytes_be(&raw[32..]);
    let flipped = (&order - &s).to_bytes_be();
    let mut signature = raw[..32].to_vec();
    signature.resize(64 - flipped.len(), 0);
    signature.extend_from_slice(&flipped);

    let copy = Transaction::from_signed_parts(
        tx.get_sender_public_key(),
        tx.get_sender_address(),
        tx.get_recipient_address(),
        tx.get_amount(),
        tx.get_sequence(),
        tx.get_memo(),
        &base64_encode(&signature),
    );
    assert_ne!(copy.get_signature(), tx.get_signature());
    assert!(copy.verify_signature());
    copy
}

#[test]
fn test_two_wallet_scenario() {
    let (ledger, alice, bob) = funded_ledger(2);
    let a = alice.get_address();
    let b = bob.get_address();

    let tx = Transaction::build(&alice, &b, 80, 1).unwrap();
    ledger.submit_transaction(tx).unwrap();
    assert_eq!(ledger.balance(&a).unwrap(), 920);
    assert_eq!(ledger.balance(&b).unwrap(), 80);

    let block = ledger.mine().unwrap();
    assert!(block.get_hash().starts_with("00"));
    assert_eq!(ledger.chain_len().unwrap(), 2);
    assert_eq!(ledger.pending_len().unwrap(), 0);

    let too_much = Transaction::build(&alice, &b, 9999, 2).unwrap();
    assert_eq!(
        ledger.submit_transaction(too_much),
        Err(BlockchainError::InsufficientFunds {
            required: 9999,
            available: 920
        })
    );
    assert_eq!(ledger.balance(&a).unwrap(), 920);
    assert_eq!(ledger.balance(&b).unwrap(), 80);
    assert!(ledger.is_chain_valid());
}

#[test]
fn test_value_is_conserved_across_many_transfers() {
    let (ledger, alice, bob) = funded_ledger(1);
    let carol = Wallet::new().unwrap();

    send(&ledger, &alice, &bob, 300, 1);
    send(&ledger, &bob, &carol, 120, 2);
    ledger.mine().unwrap();
    send(&ledger, &carol, &alice, 20, 3);
    send(&ledger, &alice, &carol, 700, 4);
    ledger.mine().unwrap();

    let balances: Vec<u64> = [&alice, &bob, &carol]
        .iter()
        .map(|w| ledger.balance(&w.get_address()).unwrap())
        .collect();
    assert_eq!(balances, vec![20, 180, 800]);
    assert_eq!(ledger.total_supply().unwrap(), 1000);
    assert!(ledger.is_chain_valid());
}

#[test]
fn test_replay_is_rejected_even_with_edited_fields() {
    let (ledger, alice, bob) = funded_ledger(1);
    let mallory = Wallet::new().unwrap();
    let tx = Transaction::build(&alice, &bob.get_address(), 50, 1).unwrap();
    ledger.submit_transaction(tx.clone()).unwrap();

    assert_eq!(
        ledger.submit_transaction(tx.clone()),
        Err(BlockchainError::SignatureAlreadyConsumed)
    );

    // same signature pointed at a different recipient
    let redirected = Transaction::from_signed_parts(
        tx.get_sender_public_key(),
        tx.get_sender_address(),
        &mallory.get_address(),
        tx.get_amount(),
        tx.get_sequence(),
        tx.get_memo(),
        tx.get_signature(),
    );
    assert_eq!(
        ledger.submit_transaction(redirected),
        Err(BlockchainError::SignatureAlreadyConsumed)
    );
    assert_eq!(ledger.balance(&mallory.get_address()).unwrap(), 0);
    assert_eq!(ledger.balance(&bob.get_address()).unwrap(), 50);
}

#[test]
fn test_re_encoded_signature_rejected_after_outputs_are_spent() {
    let (ledger, alice, bob) = funded_ledger(1);
    let carol = Wallet::new().unwrap();
    let first = Transaction::build(&alice, &bob.get_address(), 80, 1).unwrap();
    ledger.submit_transaction(first.clone()).unwrap();

    // spend every output the first transfer created, so its output ids are
    // free again and only the replay sets stand in the way
    send(&ledger, &bob, &carol, 80, 2);
    send(&ledger, &alice, &carol, 920, 3);
    send(&ledger, &carol, &alice, 500, 4);
    ledger.mine().unwrap();

    assert_eq!(
        ledger.submit_transaction(re_encoded(&first)),
        Err(BlockchainError::SignatureAlreadyConsumed)
    );
    assert_eq!(ledger.balance(&alice.get_address()).unwrap(), 500);
    assert_eq!(ledger.balance(&bob.get_address()).unwrap(), 0);
    assert_eq!(ledger.pending_len().unwrap(), 0);
}

#[test]
fn test_re_encoded_signature_rejected_while_pending() {
    let (ledger, alice, bob) = funded_ledger(1);
    let tx = Transaction::build(&alice, &bob.get_address(), 50, 1).unwrap();
    ledger.submit_transaction(tx.clone()).unwrap();
    assert_eq!(
        ledger.submit_transaction(re_encoded(&tx)),
        Err(BlockchainError::SignatureAlreadyConsumed)
    );
    assert_eq!(ledger.pending_len().unwrap(), 1);
}

#[test]
fn test_chain_with_repeated_transaction_is_invalid() {
    let (ledger, alice, bob) = funded_ledger(1);
    let carol = Wallet::new().unwrap();
    let first = Transaction::build(&alice, &bob.get_address(), 80, 1).unwrap();
    ledger.submit_transaction(first.clone()).unwrap();
    send(&ledger, &bob, &carol, 80, 2);
    ledger.mine().unwrap();

    // build the block a miner would produce if it let the copy through
    let mut blocks = ledger.blocks().unwrap();
    let mut pool =
        UtxoPool::replay(blocks.iter().flat_map(|block| block.get_transactions())).unwrap();
    let mut copy = re_encoded(&first);
    copy.apply(&mut pool, ledger.rules()).unwrap();
    let mut block = Block::new(&ledger.tip_hash().unwrap()).unwrap();
    block.add_transaction(copy);
    block.seal(1).unwrap();
    blocks.push(block);

    // every block is well formed and no output is spent twice
    assert!(UtxoPool::replay(blocks.iter().flat_map(|block| block.get_transactions())).is_ok());
    assert!(matches!(
        validate_chain(&blocks, 1),
        Err(BlockchainError::InvalidBlock(reason)) if reason.contains("transaction id")
    ));
}

#[test]
fn test_forged_signature_rejected() {
    let (ledger, alice, bob) = funded_ledger(1);
    let tx = Transaction::build(&alice, &bob.get_address(), 50, 1).unwrap();
    let inflated = Transaction::from_signed_parts(
        tx.get_sender_public_key(),
        tx.get_sender_address(),
        tx.get_recipient_address(),
        500,
        tx.get_sequence(),
        "",
        tx.get_signature(),
    );
    assert_eq!(
        ledger.submit_transaction(inflated),
        Err(BlockchainError::InvalidSignature)
    );
    assert_eq!(ledger.pending_len().unwrap(), 0);
}

#[test]
fn test_signed_request_over_json() {
    let (ledger, alice, bob) = funded_ledger(1);
    let request = TransactionRequest::sign(&alice, &bob.get_address(), "75", 1, 0).unwrap();
    let wire = to_json(&SignedRequest::Transaction(request)).unwrap();

    let received: SignedRequest = from_json(&wire).unwrap();
    match ledger.submit_request(received).unwrap() {
        RequestOutcome::Accepted(receipt) => assert_eq!(receipt.amount, 75),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(ledger.balance(&bob.get_address()).unwrap(), 75);

    let fractional = TransactionRequest::sign(&alice, &bob.get_address(), "1.5", 2, 1).unwrap();
    assert_eq!(
        ledger.submit_request(SignedRequest::Transaction(fractional)),
        Err(BlockchainError::AmountScaleOverflow { scale: 0 })
    );
}

#[test]
fn test_tampered_chain_detected() {
    let (ledger, alice, bob) = funded_ledger(1);
    send(&ledger, &alice, &bob, 80, 1);
    ledger.mine().unwrap();
    send(&ledger, &alice, &bob, 20, 2);
    ledger.mine().unwrap();

    let json = ledger.export_chain_json().unwrap();
    let blocks: Vec<Block> = from_json(&json).unwrap();
    assert!(validate_chain(&blocks, 1).is_ok());

    // edit an amount inside a sealed block
    let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();
    value[1]["transactions"][0]["amount"] = serde_json::json!(800);
    let edited: Vec<Block> = serde_json::from_value(value).unwrap();
    assert!(matches!(
        validate_chain(&edited, 1),
        Err(BlockchainError::InvalidBlock(_))
    ));

    // break the link between blocks
    let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();
    value[2]["previous_hash"] = serde_json::json!("00ff");
    let relinked: Vec<Block> = serde_json::from_value(value).unwrap();
    assert!(validate_chain(&relinked, 1).is_err());

    // drop a block from the middle
    let mut shortened = blocks.clone();
    shortened.remove(1);
    assert!(validate_chain(&shortened, 1).is_err());
}

#[test]
fn test_recipient_edit_invalidates_signature_in_json() {
    let (ledger, alice, bob) = funded_ledger(1);
    let mallory = Wallet::new().unwrap();
    send(&ledger, &alice, &bob, 80, 1);
    ledger.mine().unwrap();

    let json = ledger
        .export_chain_json()
        .unwrap()
        .replace(&bob.get_address(), &mallory.get_address());
    let blocks: Vec<Block> = from_json(&json).unwrap();
    let tx = &blocks[1].get_transactions()[0];
    assert_eq!(tx.get_recipient_address(), mallory.get_address());
    assert!(!tx.verify_signature());
    assert!(validate_chain(&blocks, 1).is_err());
}

#[test]
fn test_snapshot_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ledger.dat");
    let (ledger, alice, bob) = funded_ledger(1);
    send(&ledger, &alice, &bob, 80, 1);
    ledger.mine().unwrap();
    send(&ledger, &alice, &bob, 5, 2);
    ledger.save_snapshot(&path).unwrap();

    let restored = Ledger::load_snapshot(&config(1), &path).unwrap();
    assert_eq!(restored.balance(&alice.get_address()).unwrap(), 915);
    assert_eq!(restored.balance(&bob.get_address()).unwrap(), 85);
    assert_eq!(restored.chain_len().unwrap(), 2);
    assert_eq!(restored.pending_len().unwrap(), 1);
    assert_eq!(restored.tip_hash().unwrap(), ledger.tip_hash().unwrap());
    assert!(restored.is_chain_valid());

    // consumed signatures survive the restart
    let tx = Transaction::build(&alice, &bob.get_address(), 80, 1).unwrap();
    let replay = Transaction::from_signed_parts(
        tx.get_sender_public_key(),
        tx.get_sender_address(),
        tx.get_recipient_address(),
        tx.get_amount(),
        tx.get_sequence(),
        "",
        restored.blocks().unwrap()[1].get_transactions()[0].get_signature(),
    );
    assert_eq!(
        restored.submit_transaction(replay),
        Err(BlockchainError::SignatureAlreadyConsumed)
    );

    restored.mine().unwrap();
    assert_eq!(restored.chain_len().unwrap(), 3);
}

#[test]
fn test_snapshot_with_trimmed_signatures_still_blocks_replay() {
    let (ledger, alice, bob) = funded_ledger(1);
    let tx = Transaction::build(&alice, &bob.get_address(), 80, 1).unwrap();
    ledger.submit_transaction(tx.clone()).unwrap();
    ledger.mine().unwrap();
    let pending = Transaction::build(&alice, &bob.get_address(), 5, 2).unwrap();
    ledger.submit_transaction(pending.clone()).unwrap();

    let mut snapshot = ledger.snapshot().unwrap();
    snapshot.consumed_signatures.clear();
    let restored = Ledger::from_snapshot(&config(1), snapshot).unwrap();

    for replay in [re_encoded(&tx), tx, pending] {
        assert_eq!(
            restored.submit_transaction(replay),
            Err(BlockchainError::SignatureAlreadyConsumed)
        );
    }
    assert_eq!(restored.balance(&bob.get_address()).unwrap(), 85);
}

#[test]
fn test_snapshot_with_repeated_pending_transaction_rejected() {
    let (ledger, alice, bob) = funded_ledger(1);
    let carol = Wallet::new().unwrap();
    let first = Transaction::build(&alice, &bob.get_address(), 80, 1).unwrap();
    ledger.submit_transaction(first.clone()).unwrap();
    send(&ledger, &bob, &carol, 80, 2);
    ledger.mine().unwrap();

    // a pending block and pool that agree with each other but repeat a
    // sealed transaction under a re-encoded signature
    let mut snapshot = ledger.snapshot().unwrap();
    let mut copy = re_encoded(&first);
    copy.apply(&mut snapshot.pool, ledger.rules()).unwrap();
    snapshot.current_block.add_transaction(copy);

    assert!(matches!(
        Ledger::from_snapshot(&config(1), snapshot),
        Err(BlockchainError::InvalidBlock(reason)) if reason.contains("more than once")
    ));
}

#[test]
fn test_snapshot_with_forged_pool_rejected() {
    let (ledger, alice, _bob) = funded_ledger(1);
    let mut snapshot: LedgerSnapshot = ledger.snapshot().unwrap();
    snapshot
        .pool
        .insert_all(&[UnspentOutput::new(&alice.get_address(), 1_000_000, "forged")]);
    assert!(matches!(
        Ledger::from_snapshot(&config(1), snapshot),
        Err(BlockchainError::InvalidBlock(_))
    ));
}

#[test]
fn test_submission_while_mining_and_cancel() {
    let (ledger, alice, bob) = funded_ledger(4);
    let ledger = Arc::new(ledger);
    let first = Transaction::build(&alice, &bob.get_address(), 10, 1).unwrap();
    let second = Transaction::build(&alice, &bob.get_address(), 20, 2).unwrap();
    ledger.submit_transaction(first.clone()).unwrap();

    let miner = {
        let ledger = Arc::clone(&ledger);
        thread::spawn(move || ledger.mine())
    };
    while !ledger.is_mining() && !miner.is_finished() {
        thread::yield_now();
    }
    ledger.submit_transaction(second.clone()).unwrap();
    ledger.cancel_mining();

    let pending: Vec<String> = ledger
        .pending_transactions()
        .unwrap()
        .iter()
        .map(|tx| tx.get_id().to_string())
        .collect();
    match miner.join().unwrap() {
        Err(BlockchainError::MiningCancelled) => {
            // the frozen block went back in front of the newer submission
            let pending: Vec<String> = ledger
                .pending_transactions()
                .unwrap()
                .iter()
                .map(|tx| tx.get_id().to_string())
                .collect();
            assert_eq!(pending, vec![first.get_id(), second.get_id()]);
            assert_eq!(ledger.chain_len().unwrap(), 1);
        }
        Ok(block) => {
            // the search finished before the cancel landed
            assert_eq!(block.get_transactions()[0].get_id(), first.get_id());
            assert_eq!(pending, vec![second.get_id().to_string()]);
            assert_eq!(ledger.chain_len().unwrap(), 2);
        }
        Err(other) => panic!("unexpected error {other}"),
    }

    assert_eq!(ledger.balance(&bob.get_address()).unwrap(), 30);
    assert_eq!(ledger.total_supply().unwrap(), 1000);
    ledger.mine().unwrap();
    assert_eq!(ledger.pending_len().unwrap(), 0);
    assert!(ledger.is_chain_valid());
}

#[test]
fn test_concurrent_submission_and_mining() {
    const THREADS: u64 = 4;
    const PER_THREAD: u64 = 10;

    let (ledger, alice, bob) = funded_ledger(2);
    let ledger = Arc::new(ledger);
    let alice = Arc::new(alice);
    let bob_address = bob.get_address();

    let submitters: Vec<_> = (0..THREADS)
        .map(|t| {
            let ledger = Arc::clone(&ledger);
            let alice = Arc::clone(&alice);
            let bob_address = bob_address.clone();
            thread::spawn(move || {
                let mut ids = vec![];
                for i in 0..PER_THREAD {
                    let sequence = t * PER_THREAD + i + 1;
                    let tx = Transaction::build(&alice, &bob_address, 1, sequence).unwrap();
                    ids.push(ledger.submit_transaction(tx).unwrap().transaction_id);
                }
                ids
            })
        })
        .collect();

    let miner = {
        let ledger = Arc::clone(&ledger);
        thread::spawn(move || {
            let mut mined = 0;
            for _ in 0..20 {
                match ledger.mine() {
                    Ok(_) => mined += 1,
                    Err(BlockchainError::MiningPoolEmpty) => thread::yield_now(),
                    Err(e) => panic!("mining failed: {e}"),
                }
            }
            mined
        })
    };

    let mut accepted: Vec<String> = submitters
        .into_iter()
        .flat_map(|handle| handle.join().unwrap())
        .collect();
    miner.join().unwrap();
    if ledger.pending_len().unwrap() > 0 {
        ledger.mine().unwrap();
    }

    let recorded: Vec<String> = ledger
        .blocks()
        .unwrap()
        .iter()
        .skip(1)
        .flat_map(|block| block.get_transactions().iter().map(|tx| tx.get_id().to_string()))
        .collect();
    let unique: HashSet<&String> = recorded.iter().collect();
    assert_eq!(unique.len(), recorded.len(), "a transaction was recorded twice");

    accepted.sort();
    let mut recorded_sorted = recorded.clone();
    recorded_sorted.sort();
    assert_eq!(recorded_sorted, accepted, "a transaction was lost");

    assert_eq!(
        ledger.balance(&bob_address).unwrap(),
        THREADS * PER_THREAD
    );
    assert_eq!(ledger.total_supply().unwrap(), 1000);
    assert!(ledger.is_chain_valid());

    let blocks = ledger.blocks().unwrap();
    let pool =
        UtxoPool::replay(blocks.iter().flat_map(|block| block.get_transactions())).unwrap();
    assert_eq!(pool.balance_of(&bob_address), THREADS * PER_THREAD);
}
