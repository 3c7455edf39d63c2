use crate::error::{BlockchainError, Result};
use crate::utils::{deserialize, serialize};
use crate::wallet::Wallet;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

pub const WALLET_FILE: &str = "wallet.dat";

/// File-backed collection of wallets keyed by address.
pub struct Wallets {
    wallets: BTreeMap<String, Wallet>,
    path: PathBuf,
}

impl Wallets {
    /// Open the wallet file at `path`, starting empty if it does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Wallets> {
        let mut wallets = Wallets {
            wallets: BTreeMap::new(),
            path: path.as_ref().to_path_buf(),
        };
        wallets.load_from_file()?;
        Ok(wallets)
    }

    pub fn create_wallet(&mut self) -> Result<String> {
        let wallet = Wallet::new()?;
        let address = wallet.get_address();
        self.wallets.insert(address.clone(), wallet);
        self.save_to_file()?;
        log::info!("Created wallet {address}");
        Ok(address)
    }

    pub fn get_addresses(&self) -> Vec<String> {
        self.wallets.keys().cloned().collect()
    }

    pub fn get_wallet(&self, address: &str) -> Option<&Wallet> {
        self.wallets.get(address)
    }

    pub fn require_wallet(&self, address: &str) -> Result<&Wallet> {
        self.get_wallet(address).ok_or_else(|| {
            BlockchainError::Wallet(format!("Wallet not found for address: {address}"))
        })
    }

    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }

    fn load_from_file(&mut self) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }

        let mut file = File::open(&self.path)?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        self.wallets = deserialize(&buf[..])?;
        log::debug!(
            "Loaded {} wallets from {}",
            self.wallets.len(),
            self.path.display()
        );
        Ok(())
    }

    fn save_to_file(&self) -> Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&self.path)?;
        let mut writer = BufWriter::new(file);
        let wallets_bytes = serialize(&self.wallets)?;
        writer.write_all(wallets_bytes.as_slice())?;
        writer.flush()?;
        Ok(())
    }
}
