//! Multi-chain HD wallet core.
//!
//! One BIP-39 seed deterministically yields per-chain key records; each record
//! becomes a signing [`account::Account`]; the [`builder::TransactionBuilder`]
//! turns (account, recipient, amount) into an unsigned transaction from live
//! chain state; the [`dispatcher::BroadcastDispatcher`] signs and submits it.
//! Sends for the same sender are serialized so nonces and inputs are never
//! handed out twice.
//!
//! Chain specifics live behind [`registry::ChainPlugin`]. Network access is
//! behind [`client::ChainClient`], implemented outside this crate.

pub mod account;
pub mod builder;
pub mod chains;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod hd_derivation;
pub mod ledger;
pub mod mnemonic;
pub mod registry;
pub mod seed;
pub mod session;
pub mod telemetry;
pub mod transaction;
pub mod types;

pub use account::{to_account, Account};
pub use builder::{BuildOptions, TransactionBuilder};
pub use client::{ChainClient, ChainClients, ClientError, FeeEstimate, SpendableOutput};
pub use config::WalletConfig;
pub use dispatcher::{BroadcastDispatcher, SendOptions};
pub use error::{ErrorKind, WalletError, WalletResult};
pub use hd_derivation::{derive, derive_at};
pub use ledger::Reservation;
pub use registry::{ChainPlugin, ChainRegistry};
pub use seed::{EnvSeedProvider, SecretProvider, Seed, StaticSeedProvider};
pub use session::WalletSession;
pub use transaction::{DecodedTransaction, SignedTransaction, UnsignedTransaction};
pub use types::{Amount, BroadcastReceipt, ChainId, KeyRecord, LedgerModel};
