use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::WalletError;

/// Amount in the chain's smallest unit (wei, satoshi).
pub type Amount = u128;

/// Chains the wallet can derive keys for and transact on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ChainId {
    #[serde(rename = "eth")]
    Eth,
    #[serde(rename = "btc")]
    Btc,
    #[serde(rename = "btc-test")]
    BtcTestnet,
}

impl ChainId {
    pub const ALL: [ChainId; 3] = [ChainId::Eth, ChainId::Btc, ChainId::BtcTestnet];

    /// Short lowercase name, identical to the serde form.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainId::Eth => "eth",
            ChainId::Btc => "btc",
            ChainId::BtcTestnet => "btc-test",
        }
    }

    /// Native token symbol
    pub fn symbol(&self) -> &'static str {
        match self {
            ChainId::Eth => "ETH",
            ChainId::Btc | ChainId::BtcTestnet => "BTC",
        }
    }

    pub fn is_testnet(&self) -> bool {
        matches!(self, ChainId::BtcTestnet)
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChainId {
    type Err = WalletError;

    /// Case-insensitive; also accepts the legacy coin names `BTCTEST` and
    /// `BTC_TESTNET`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "eth" => Ok(ChainId::Eth),
            "btc" => Ok(ChainId::Btc),
            "btc-test" | "btctest" | "btc_testnet" => Ok(ChainId::BtcTestnet),
            other => Err(WalletError::UnsupportedChain(other.to_string())),
        }
    }
}

/// How a chain tracks balances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerModel {
    /// Balance plus per-sender sequence counter (nonce).
    AccountModel,
    /// Discrete unspent outputs.
    Utxo,
}

/// One derived keypair.
///
/// A pure function of (seed, chain, derivation_index). The private key is
/// wiped on drop and never shown by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyRecord {
    pub chain: ChainId,
    pub derivation_index: u32,
    pub derivation_path: String,
    pub address: String,
    /// SEC1 compressed public key (33 bytes).
    pub public_key: Vec<u8>,
    pub private_key: Zeroizing<Vec<u8>>,
}

impl fmt::Debug for KeyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRecord")
            .field("chain", &self.chain)
            .field("derivation_index", &self.derivation_index)
            .field("derivation_path", &self.derivation_path)
            .field("address", &self.address)
            .field("public_key", &hex::encode(&self.public_key))
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Successful broadcast acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BroadcastReceipt {
    pub chain: ChainId,
    /// Canonical transaction id as reported by the chain client.
    pub tx_id: String,
}
