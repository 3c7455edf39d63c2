//! Command-line interface
//!
//! Argument parsing for the `architect-ledger` binary.

pub mod commands;

pub use commands::{Command, Opt};
