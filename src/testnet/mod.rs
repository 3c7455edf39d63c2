//! Test fixtures
//!
//! Small, fast ledgers with throwaway wallets for unit tests.

pub mod test_utils;

pub use test_utils::*;
