//! Chain plugins and the registry that maps chain ids to them.
//!
//! Everything chain-specific sits behind [`ChainPlugin`]: derivation path,
//! address codec, signer construction, transaction assembly and decoding.
//! Adding a chain means registering another plugin; the derivation engine,
//! builder and dispatcher do not change.

use std::collections::BTreeMap;
use std::sync::Arc;

use chain_btc::network::BtcNetwork;

use crate::account::Account;
use crate::chains::{BitcoinPlugin, EvmPlugin};
use crate::config::WalletConfig;
use crate::error::{WalletError, WalletResult};
use crate::hd_derivation::DerivationBackend;
use crate::transaction::{ChainState, DecodedTransaction, TransferRequest, UnsignedTransaction};
use crate::types::{ChainId, KeyRecord, LedgerModel};

/// Default EIP-155 chain id when the configuration names none.
pub const DEFAULT_EVM_CHAIN_ID: u64 = 1;

pub trait ChainPlugin: Send + Sync {
    fn chain(&self) -> ChainId;

    fn model(&self) -> LedgerModel;

    /// Derivation path with an `{index}` placeholder for the address index.
    fn path_template(&self) -> &str;

    fn backend(&self) -> &dyn DerivationBackend;

    /// Address for a SEC1 compressed public key.
    fn encode_address(&self, public_key: &[u8]) -> WalletResult<String>;

    /// `InvalidRecipient` unless `address` is well formed for this chain.
    fn validate_recipient(&self, address: &str) -> WalletResult<()>;

    /// Wrap a key record in a signing account.
    fn account(&self, record: &KeyRecord) -> WalletResult<Account>;

    /// Build the unsigned transfer from already fetched chain state. Pure.
    fn assemble(
        &self,
        request: &TransferRequest<'_>,
        state: ChainState,
    ) -> WalletResult<UnsignedTransaction>;

    /// Decode a signed transaction produced by this chain's signer.
    fn decode(&self, raw: &[u8]) -> WalletResult<DecodedTransaction>;
}

#[derive(Clone, Default)]
pub struct ChainRegistry {
    plugins: BTreeMap<ChainId, Arc<dyn ChainPlugin>>,
}

impl ChainRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// ETH (mainnet chain id), BTC and BTC testnet.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(EvmPlugin::new(DEFAULT_EVM_CHAIN_ID)));
        registry.register(Arc::new(BitcoinPlugin::new(ChainId::Btc, BtcNetwork::Mainnet)));
        registry.register(Arc::new(BitcoinPlugin::new(
            ChainId::BtcTestnet,
            BtcNetwork::Testnet,
        )));
        registry
    }

    /// One plugin per `[[chains]]` entry.
    pub fn from_config(config: &WalletConfig) -> Self {
        let mut registry = Self::new();
        for entry in &config.chains {
            let plugin: Arc<dyn ChainPlugin> = match entry.chain {
                ChainId::Eth => {
                    let evm = EvmPlugin::new(entry.evm_chain_id.unwrap_or(DEFAULT_EVM_CHAIN_ID));
                    match evm.network() {
                        Some(network) => tracing::info!(network = network.name, "EVM network"),
                        None => tracing::warn!(
                            evm_chain_id = evm.evm_chain_id(),
                            "unrecognised EVM chain id"
                        ),
                    }
                    Arc::new(evm)
                }
                ChainId::Btc => Arc::new(BitcoinPlugin::new(ChainId::Btc, BtcNetwork::Mainnet)),
                ChainId::BtcTestnet => {
                    Arc::new(BitcoinPlugin::new(ChainId::BtcTestnet, BtcNetwork::Testnet))
                }
            };
            registry.register(plugin);
        }
        registry
    }

    /// Register `plugin`, replacing any plugin for the same chain.
    pub fn register(&mut self, plugin: Arc<dyn ChainPlugin>) {
        tracing::debug!(chain = %plugin.chain(), "registered chain plugin");
        self.plugins.insert(plugin.chain(), plugin);
    }

    pub fn get(&self, chain: ChainId) -> WalletResult<Arc<dyn ChainPlugin>> {
        self.plugins
            .get(&chain)
            .cloned()
            .ok_or_else(|| WalletError::UnsupportedChain(chain.to_string()))
    }

    pub fn contains(&self, chain: ChainId) -> bool {
        self.plugins.contains_key(&chain)
    }

    /// Registered chains in `ChainId` order.
    pub fn chains(&self) -> Vec<ChainId> {
        self.plugins.keys().copied().collect()
    }
}

impl std::fmt::Debug for ChainRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainRegistry")
            .field("chains", &self.chains())
            .finish()
    }
}
