use thiserror::Error;

use crate::ledger::Reservation;
use crate::types::ChainId;

pub type WalletResult<T> = Result<T, WalletError>;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("Key derivation failed: {0}")]
    Derivation(String),

    #[error("Unsupported chain: {0}")]
    UnsupportedChain(String),

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: u128, available: u128 },

    #[error("{chain} client error: {reason}")]
    ChainClient { chain: ChainId, reason: String },

    #[error("{chain} rejected transaction: {reason}")]
    Broadcast { chain: ChainId, reason: String },

    /// The transaction may or may not be live. When the dispatcher built it,
    /// `reservation` is what it still holds; pass it to
    /// [`crate::dispatcher::BroadcastDispatcher::resolve`] once the outcome
    /// is known.
    #[error("{chain} broadcast outcome unknown for {tx_id}: {reason}")]
    Indeterminate {
        chain: ChainId,
        tx_id: String,
        reason: String,
        reservation: Option<Box<Reservation>>,
    },

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse classification of a [`WalletError`], stable across messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Derivation,
    UnsupportedChain,
    InvalidRecipient,
    InvalidAmount,
    InsufficientFunds,
    ChainClient,
    Broadcast,
    Indeterminate,
    Signing,
    InvalidMnemonic,
    Config,
}

impl WalletError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WalletError::Derivation(_) => ErrorKind::Derivation,
            WalletError::UnsupportedChain(_) => ErrorKind::UnsupportedChain,
            WalletError::InvalidRecipient(_) => ErrorKind::InvalidRecipient,
            WalletError::InvalidAmount(_) => ErrorKind::InvalidAmount,
            WalletError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            WalletError::ChainClient { .. } => ErrorKind::ChainClient,
            WalletError::Broadcast { .. } => ErrorKind::Broadcast,
            WalletError::Indeterminate { .. } => ErrorKind::Indeterminate,
            WalletError::Signing(_) => ErrorKind::Signing,
            WalletError::InvalidMnemonic(_) => ErrorKind::InvalidMnemonic,
            WalletError::Config(_) => ErrorKind::Config,
        }
    }

    /// True when the failure happened before anything reached the network,
    /// so repeating the call cannot produce a duplicate transaction.
    ///
    /// `Broadcast` is excluded: a node may have relayed the transaction before
    /// another rejected it. `Indeterminate` must be resolved against chain
    /// state first.
    pub fn reservation(&self) -> Option<&Reservation> {
        match self {
            WalletError::Indeterminate { reservation, .. } => reservation.as_deref(),
            _ => None,
        }
    }

    pub fn is_retry_safe(&self) -> bool {
        !matches!(
            self,
            WalletError::Broadcast { .. } | WalletError::Indeterminate { .. }
        )
    }
}

impl From<chain_eth::error::EthError> for WalletError {
    fn from(e: chain_eth::error::EthError) -> Self {
        use chain_eth::error::EthError;
        match e {
            EthError::InvalidAddress(msg) => WalletError::InvalidRecipient(msg),
            EthError::InvalidPrivateKey(msg) | EthError::InvalidPublicKey(msg) => {
                WalletError::Derivation(format!("ETH: {msg}"))
            }
            other => WalletError::Signing(format!("ETH: {other}")),
        }
    }
}

impl From<chain_btc::error::BtcError> for WalletError {
    fn from(e: chain_btc::error::BtcError) -> Self {
        use chain_btc::error::BtcError;
        match e {
            BtcError::InvalidAddress(msg) => WalletError::InvalidRecipient(msg),
            BtcError::InsufficientFunds { needed, available } => WalletError::InsufficientFunds {
                needed: needed.into(),
                available: available.into(),
            },
            BtcError::BelowDust(value) => {
                WalletError::InvalidAmount(format!("{value} sat is below the dust limit"))
            }
            BtcError::InvalidPrivateKey(msg) | BtcError::InvalidPublicKey(msg) => {
                WalletError::Derivation(format!("BTC: {msg}"))
            }
            other => WalletError::Signing(format!("BTC: {other}")),
        }
    }
}
