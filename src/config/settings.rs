use crate::core::{parse_units, TransactionRules, MAX_AMOUNT_SCALE, MAX_DIFFICULTY};
use crate::error::{BlockchainError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// File read by the binary when no `--config` is given
pub const DEFAULT_CONFIG_FILE: &str = "ledger.toml";

const DIFFICULTY_KEY: &str = "LEDGER_DIFFICULTY";
const STATE_FILE_KEY: &str = "LEDGER_STATE_FILE";
const WALLET_FILE_KEY: &str = "LEDGER_WALLET_FILE";

/// Ledger settings. Every field has a default, so a partial TOML file is
/// enough. Monetary values are decimal strings read at `amount_scale`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Leading hex zeros a block hash must have
    pub difficulty: u32,
    /// Floor on the covering inputs of a transfer
    pub minimum_transaction_value: String,
    /// Ceiling on a single transfer
    pub max_transaction_amount: String,
    /// Fractional digits in a decimal amount
    pub amount_scale: u32,
    /// Supply minted by the genesis transaction
    pub genesis_amount: String,
    /// Binary snapshot of the ledger
    pub state_file: PathBuf,
    /// Wallet store
    pub wallet_file: PathBuf,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: 4,
            minimum_transaction_value: "0.1".to_string(),
            max_transaction_amount: "21000000".to_string(),
            amount_scale: 8,
            genesis_amount: "1000".to_string(),
            state_file: PathBuf::from("ledger.dat"),
            wallet_file: PathBuf::from(crate::wallet::WALLET_FILE),
        }
    }
}

impl LedgerConfig {
    pub fn from_toml_str(text: &str) -> Result<LedgerConfig> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<LedgerConfig> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            BlockchainError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Read `path` if it exists (defaults otherwise), apply environment
    /// overrides and validate.
    pub fn load(path: impl AsRef<Path>) -> Result<LedgerConfig> {
        let path = path.as_ref();
        let config = if path.exists() {
            log::info!("Loading configuration from {}", path.display());
            Self::from_toml_file(path)?
        } else {
            log::debug!("No configuration at {}, using defaults", path.display());
            LedgerConfig::default()
        };
        let config = config.with_overrides(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `LEDGER_DIFFICULTY`, `LEDGER_STATE_FILE` and `LEDGER_WALLET_FILE`
    /// as resolved by `lookup`.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<LedgerConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(DIFFICULTY_KEY) {
            self.difficulty = value.trim().parse().map_err(|_| {
                BlockchainError::Config(format!("{DIFFICULTY_KEY} is not a number: {value}"))
            })?;
        }
        if let Some(value) = lookup(STATE_FILE_KEY) {
            self.state_file = PathBuf::from(value);
        }
        if let Some(value) = lookup(WALLET_FILE_KEY) {
            self.wallet_file = PathBuf::from(value);
        }
        Ok(self)
    }

    /// Reject settings the ledger cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.amount_scale > MAX_AMOUNT_SCALE {
            return Err(BlockchainError::Config(format!(
                "amount_scale {} exceeds the maximum of {MAX_AMOUNT_SCALE}",
                self.amount_scale
            )));
        }
        if self.difficulty > MAX_DIFFICULTY {
            return Err(BlockchainError::Config(format!(
                "difficulty {} exceeds the maximum of {MAX_DIFFICULTY}",
                self.difficulty
            )));
        }

        let rules = self.rules()?;
        if rules.max_transaction_amount == 0 {
            return Err(BlockchainError::Config(
                "max_transaction_amount must be positive".to_string(),
            ));
        }
        if self.genesis_units()? == 0 {
            return Err(BlockchainError::Config(
                "genesis_amount must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Transfer limits in units
    pub fn rules(&self) -> Result<TransactionRules> {
        Ok(TransactionRules {
            scale: self.amount_scale,
            minimum_transaction_value: self.config_units(
                "minimum_transaction_value",
                &self.minimum_transaction_value,
            )?,
            max_transaction_amount: self
                .config_units("max_transaction_amount", &self.max_transaction_amount)?,
        })
    }

    pub fn genesis_units(&self) -> Result<u64> {
        self.config_units("genesis_amount", &self.genesis_amount)
    }

    fn config_units(&self, name: &str, value: &str) -> Result<u64> {
        parse_units(value, self.amount_scale)
            .map_err(|e| BlockchainError::Config(format!("{name} = {value:?}: {e}")))
    }
}
