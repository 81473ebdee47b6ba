use thiserror::Error;

/// Bitcoin chain operation errors.
#[derive(Debug, Error)]
pub enum BtcError {
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("insufficient funds: have {available} sat, need {needed} sat")]
    InsufficientFunds { needed: u64, available: u64 },

    #[error("output of {0} sat is below the dust limit")]
    BelowDust(u64),

    #[error("transaction build error: {0}")]
    TransactionBuildError(String),

    #[error("signing error: {0}")]
    SigningError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),
}
