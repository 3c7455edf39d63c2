//! Configuration management
//!
//! Ledger settings come from an optional TOML file, then `LEDGER_*`
//! environment variables, and are validated once at startup.

pub mod settings;

pub use settings::{LedgerConfig, DEFAULT_CONFIG_FILE};
