//! Test utilities for ledger testing

use crate::config::LedgerConfig;
use crate::core::Ledger;
use crate::error::{BlockchainError, Result};
use crate::wallet::{Wallet, Wallets};
use tempfile::TempDir;

/// Whole-unit amounts, a one-digit difficulty and a low floor keep tests fast
/// and their numbers readable.
pub fn test_config() -> LedgerConfig {
    LedgerConfig {
        difficulty: 1,
        minimum_transaction_value: "1".to_string(),
        max_transaction_amount: "1000000".to_string(),
        amount_scale: 0,
        genesis_amount: "1000".to_string(),
        ..LedgerConfig::default()
    }
}

/// A ledger whose genesis output belongs to `alice`
pub struct TestLedger {
    pub ledger: Ledger,
    pub alice: Wallet,
    pub bob: Wallet,
}

impl TestLedger {
    pub fn new(genesis_amount: u64) -> TestLedger {
        let alice = Wallet::new().expect("wallet");
        let bob = Wallet::new().expect("wallet");
        Self::with_wallets(genesis_amount, alice, bob)
    }

    pub fn with_wallets(genesis_amount: u64, alice: Wallet, bob: Wallet) -> TestLedger {
        let ledger =
            Ledger::new(&test_config(), &alice.get_address(), genesis_amount).expect("ledger");
        TestLedger { ledger, alice, bob }
    }
}

/// Create a temporary directory for testing
pub fn create_temp_dir() -> Result<TempDir> {
    tempfile::tempdir().map_err(|e| BlockchainError::Io(e.to_string()))
}

/// Create a wallet store with `count` wallets in a temporary directory
pub fn create_test_wallets(count: usize) -> Result<(Wallets, Vec<String>, TempDir)> {
    let dir = create_temp_dir()?;
    let mut wallets = Wallets::open(dir.path().join("wallet.dat"))?;
    let mut addresses = Vec::new();
    for _ in 0..count {
        addresses.push(wallets.create_wallet()?);
    }
    Ok((wallets, addresses, dir))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_test_ledger_starts_funded() {
        let fixture = TestLedger::new(500);
        assert_eq!(
            fixture
                .ledger
                .balance(&fixture.alice.get_address())
                .unwrap(),
            500
        );
        assert_eq!(
            fixture.ledger.balance(&fixture.bob.get_address()).unwrap(),
            0
        );
    }

    #[test]
    fn test_create_test_wallets() {
        let (wallets, addresses, _dir) = create_test_wallets(5).unwrap();
        assert_eq!(wallets.len(), 5);

        // All addresses should be unique
        for i in 0..addresses.len() {
            for j in i + 1..addresses.len() {
                assert_ne!(addresses[i], addresses[j]);
            }
        }
    }
}
