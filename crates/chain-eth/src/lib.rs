//! Ethereum/EVM chain support for the wallet core.
//!
//! This crate provides:
//! - Ethereum address derivation from secp256k1 public keys (with EIP-55 checksums)
//! - Legacy (EIP-155) and EIP-1559 transfer building and signing
//! - Decoding of signed transactions with sender recovery
//! - Known EVM network definitions

pub mod address;
pub mod chains;
pub mod error;
pub mod transaction;
