//! Bitcoin chain support for the wallet core.
//!
//! Provides P2WPKH address derivation and validation, largest-first UTXO
//! selection, and building, signing and decoding of native SegWit
//! transactions.

pub mod address;
pub mod error;
pub mod network;
pub mod transaction;
pub mod utxo;
