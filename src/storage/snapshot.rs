use crate::core::Block;
use crate::error::Result;
use crate::storage::UtxoPool;
use crate::utils::{deserialize, serialize};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::Path;

/// Everything needed to bring a ledger back after a restart.
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct LedgerSnapshot {
    pub chain: Vec<Block>,
    pub current_block: Block,
    pub pool: UtxoPool,
    pub consumed_signatures: BTreeSet<String>,
}

impl LedgerSnapshot {
    /// Write the snapshot next to `path` and rename it into place, so a crash
    /// mid-write never leaves a truncated file behind.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let staging = path.with_extension("tmp");
        {
            let file = OpenOptions::new()
                .create(true)
                .truncate(true)
                .write(true)
                .open(&staging)?;
            let mut writer = BufWriter::new(file);
            writer.write_all(&serialize(self)?)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&staging, path)?;
        log::debug!(
            "Saved snapshot of {} blocks to {}",
            self.chain.len(),
            path.display()
        );
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<LedgerSnapshot> {
        let path = path.as_ref();
        let mut buf = Vec::new();
        File::open(path)?.read_to_end(&mut buf)?;
        let snapshot: LedgerSnapshot = deserialize(&buf)?;
        log::debug!(
            "Loaded snapshot of {} blocks from {}",
            snapshot.chain.len(),
            path.display()
        );
        Ok(snapshot)
    }
}
