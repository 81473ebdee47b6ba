//! The narrow interface to a chain's network node.
//!
//! Implementations live outside this crate (JSON-RPC, Electrum, REST
//! indexers...). The core only asks for fee data, account state and
//! broadcast.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

pub use chain_btc::utxo::SpendableOutput;

use crate::error::{WalletError, WalletResult};
use crate::types::{Amount, ChainId};

/// Fee quote returned by [`ChainClient::estimate_fee`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeEstimate {
    /// Single gas price (pre-London EVM chains, local dev nodes).
    Legacy { gas_limit: u64, gas_price: u128 },
    /// EIP-1559 fee caps.
    Eip1559 {
        gas_limit: u64,
        max_fee_per_gas: u128,
        max_priority_fee_per_gas: u128,
    },
    /// Satoshis per virtual byte.
    FeeRate { sat_per_vbyte: u64 },
}

impl FeeEstimate {
    /// Worst-case gas cost. `None` for per-byte rates, whose total depends
    /// on input selection.
    pub fn max_fee(&self) -> Option<Amount> {
        match *self {
            FeeEstimate::Legacy {
                gas_limit,
                gas_price,
            } => Some(u128::from(gas_limit).saturating_mul(gas_price)),
            FeeEstimate::Eip1559 {
                gas_limit,
                max_fee_per_gas,
                ..
            } => Some(u128::from(gas_limit).saturating_mul(max_fee_per_gas)),
            FeeEstimate::FeeRate { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The node answered and refused the request.
    #[error("rejected: {0}")]
    Rejected(String),

    /// No usable answer: connection failure, timeout, malformed response.
    #[error("transport: {0}")]
    Transport(String),

    #[error("operation not supported: {0}")]
    Unsupported(&'static str),
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn estimate_fee(
        &self,
        from: &str,
        to: &str,
        amount: Amount,
    ) -> Result<FeeEstimate, ClientError>;

    /// Spendable balance (account-model chains).
    async fn get_balance(&self, _address: &str) -> Result<Amount, ClientError> {
        Err(ClientError::Unsupported("get_balance"))
    }

    /// Transaction count including pending (account-model chains).
    async fn get_sequence_counter(&self, _address: &str) -> Result<u64, ClientError> {
        Err(ClientError::Unsupported("get_sequence_counter"))
    }

    /// Unspent outputs locked to `address` (UTXO chains).
    async fn get_spendable_outputs(
        &self,
        _address: &str,
    ) -> Result<Vec<SpendableOutput>, ClientError> {
        Err(ClientError::Unsupported("get_spendable_outputs"))
    }

    /// Submit a signed transaction and return the id the node reports.
    async fn broadcast_raw(&self, raw_tx: &[u8]) -> Result<String, ClientError>;
}

/// One client per chain, fixed at session construction.
#[derive(Clone, Default)]
pub struct ChainClients {
    clients: HashMap<ChainId, Arc<dyn ChainClient>>,
}

impl ChainClients {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, chain: ChainId, client: Arc<dyn ChainClient>) -> Self {
        self.insert(chain, client);
        self
    }

    pub fn insert(&mut self, chain: ChainId, client: Arc<dyn ChainClient>) {
        self.clients.insert(chain, client);
    }

    pub fn get(&self, chain: ChainId) -> WalletResult<Arc<dyn ChainClient>> {
        self.clients
            .get(&chain)
            .cloned()
            .ok_or_else(|| WalletError::UnsupportedChain(format!("no chain client for {chain}")))
    }
}

impl std::fmt::Debug for ChainClients {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut chains: Vec<_> = self.clients.keys().collect();
        chains.sort();
        f.debug_struct("ChainClients").field("chains", &chains).finish()
    }
}
