use thiserror::Error;

/// Ethereum chain operation errors.
#[derive(Debug, Error)]
pub enum EthError {
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("signing error: {0}")]
    SigningError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),

    #[error("unsupported transaction type: 0x{0:02x}")]
    UnsupportedTxType(u8),
}
