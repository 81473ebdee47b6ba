use std::sync::Arc;

use crate::account::{to_account, Account};
use crate::builder::{BuildOptions, TransactionBuilder};
use crate::client::ChainClients;
use crate::config::WalletConfig;
use crate::dispatcher::{BroadcastDispatcher, SendOptions};
use crate::error::WalletResult;
use crate::hd_derivation::{derive, derive_at};
use crate::ledger::{Reservation, SenderLedger};
use crate::registry::ChainRegistry;
use crate::seed::{SecretProvider, Seed};
use crate::transaction::{DecodedTransaction, SignedTransaction, UnsignedTransaction};
use crate::types::{Amount, BroadcastReceipt, ChainId, KeyRecord};

/// Everything one wallet needs, passed explicitly instead of held in globals.
///
/// Sessions are independent: two sessions never share a seed, clients or
/// sender ledger.
#[derive(Debug)]
pub struct WalletSession {
    seed: Seed,
    registry: Arc<ChainRegistry>,
    builder: Arc<TransactionBuilder>,
    dispatcher: BroadcastDispatcher,
}

impl WalletSession {
    /// Read the seed once from `provider` and wire up the pipeline.
    pub fn new(
        provider: &dyn SecretProvider,
        registry: ChainRegistry,
        clients: ChainClients,
        config: &WalletConfig,
    ) -> WalletResult<Self> {
        let seed = provider.get_seed()?;
        let registry = Arc::new(registry);
        let builder = Arc::new(TransactionBuilder::new(
            Arc::clone(&registry),
            Arc::new(clients),
            Arc::new(SenderLedger::new()),
        ));
        let dispatcher = BroadcastDispatcher::new(Arc::clone(&builder), config.broadcast_timeout());

        tracing::info!(chains = ?registry.chains(), "wallet session ready");
        Ok(Self {
            seed,
            registry,
            builder,
            dispatcher,
        })
    }

    /// Registry built from `config.chains`.
    pub fn from_config(
        config: &WalletConfig,
        provider: &dyn SecretProvider,
        clients: ChainClients,
    ) -> WalletResult<Self> {
        Self::new(provider, ChainRegistry::from_config(config), clients, config)
    }

    pub fn registry(&self) -> &ChainRegistry {
        &self.registry
    }

    pub fn builder(&self) -> &TransactionBuilder {
        &self.builder
    }

    pub fn dispatcher(&self) -> &BroadcastDispatcher {
        &self.dispatcher
    }

    pub fn derive_keys(&self, chain: ChainId, count: u32) -> WalletResult<Vec<KeyRecord>> {
        derive(&self.registry, &self.seed, chain, count)
    }

    /// Account for the key at `index` on `chain`.
    pub fn account(&self, chain: ChainId, index: u32) -> WalletResult<Account> {
        let record = derive_at(&self.registry, &self.seed, chain, index)?;
        to_account(&self.registry, chain, &record)
    }

    pub async fn build_transaction(
        &self,
        chain: ChainId,
        account: &Account,
        recipient: &str,
        amount: Amount,
        options: &BuildOptions,
    ) -> WalletResult<UnsignedTransaction> {
        self.builder
            .build_with(chain, account, recipient, amount, options)
            .await
    }

    pub async fn sign_and_broadcast(
        &self,
        chain: ChainId,
        account: &Account,
        recipient: &str,
        amount: Amount,
        options: &SendOptions,
    ) -> WalletResult<BroadcastReceipt> {
        self.dispatcher
            .send_with(chain, account, recipient, amount, options)
            .await
    }

    /// See [`BroadcastDispatcher::resolve`].
    pub async fn resolve(&self, reservation: &Reservation, landed: bool) {
        self.dispatcher.resolve(reservation, landed).await
    }

    /// Decode a signed transaction with the chain's plugin.
    pub fn decode(&self, signed: &SignedTransaction) -> WalletResult<DecodedTransaction> {
        self.registry.get(signed.chain)?.decode(&signed.raw)
    }
}
