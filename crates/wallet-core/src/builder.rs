use std::sync::Arc;

use tracing::instrument;

use crate::account::Account;
use crate::client::{ChainClient, ChainClients, ClientError};
use crate::error::{WalletError, WalletResult};
use crate::ledger::{Reservation, SenderLedger, SenderState};
use crate::registry::{ChainPlugin, ChainRegistry};
use crate::transaction::{ChainState, TransferRequest, UnsignedTransaction};
use crate::types::{Amount, ChainId, LedgerModel};

/// Per-build knobs.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Change destination on UTXO chains. The sender's address when unset.
    pub change_address: Option<String>,
}

/// Turns (chain, account, recipient, amount) into an unsigned transaction
/// using live chain state.
///
/// Successful builds reserve their nonce or inputs in the sender ledger so a
/// concurrent build for the same sender cannot reuse them.
#[derive(Debug)]
pub struct TransactionBuilder {
    registry: Arc<ChainRegistry>,
    clients: Arc<ChainClients>,
    ledger: Arc<SenderLedger>,
}

impl TransactionBuilder {
    pub fn new(
        registry: Arc<ChainRegistry>,
        clients: Arc<ChainClients>,
        ledger: Arc<SenderLedger>,
    ) -> Self {
        Self {
            registry,
            clients,
            ledger,
        }
    }

    pub fn registry(&self) -> &ChainRegistry {
        &self.registry
    }

    pub fn clients(&self) -> &ChainClients {
        &self.clients
    }

    pub fn ledger(&self) -> &SenderLedger {
        &self.ledger
    }

    pub async fn build(
        &self,
        chain: ChainId,
        account: &Account,
        recipient: &str,
        amount: Amount,
    ) -> WalletResult<UnsignedTransaction> {
        self.build_with(chain, account, recipient, amount, &BuildOptions::default())
            .await
    }

    pub async fn build_with(
        &self,
        chain: ChainId,
        account: &Account,
        recipient: &str,
        amount: Amount,
        options: &BuildOptions,
    ) -> WalletResult<UnsignedTransaction> {
        let plugin = self.check_request(chain, account, recipient, amount)?;
        let client = self.clients.get(chain)?;
        let mut state = self.ledger.lock(chain, account.address()).await;
        self.build_locked(
            &mut state,
            plugin.as_ref(),
            client.as_ref(),
            account,
            recipient,
            amount,
            options,
        )
        .await
    }

    /// Return the nonce or inputs of a transaction that will not be sent.
    pub async fn release(&self, unsigned: &UnsignedTransaction) {
        self.release_reservation(&Reservation::from(unsigned)).await;
    }

    pub async fn release_reservation(&self, reservation: &Reservation) {
        let mut state = self.ledger.lock(reservation.chain, &reservation.sender).await;
        state.release(reservation);
        tracing::debug!(
            chain = %reservation.chain,
            sender = %reservation.sender,
            nonce = ?reservation.nonce,
            inputs = reservation.outputs.len(),
            "released reservation"
        );
    }

    /// Validation that needs no network access.
    pub(crate) fn check_request(
        &self,
        chain: ChainId,
        account: &Account,
        recipient: &str,
        amount: Amount,
    ) -> WalletResult<Arc<dyn ChainPlugin>> {
        let plugin = self.registry.get(chain)?;
        if account.chain() != chain {
            return Err(WalletError::UnsupportedChain(format!(
                "{} account used on {chain}",
                account.chain()
            )));
        }
        plugin.validate_recipient(recipient)?;
        if amount == 0 {
            return Err(WalletError::InvalidAmount("amount must be positive".into()));
        }
        Ok(plugin)
    }

    /// Fetch chain state, assemble and reserve. Caller holds the sender lock.
    #[allow(clippy::too_many_arguments)]
    #[instrument(
        skip_all,
        fields(chain = %plugin.chain(), sender = %account.address(), amount = %amount)
    )]
    pub(crate) async fn build_locked(
        &self,
        state: &mut SenderState,
        plugin: &dyn ChainPlugin,
        client: &dyn ChainClient,
        account: &Account,
        recipient: &str,
        amount: Amount,
        options: &BuildOptions,
    ) -> WalletResult<UnsignedTransaction> {
        let chain = plugin.chain();
        let sender = account.address();
        let request = TransferRequest {
            sender,
            recipient,
            amount,
            change_address: options.change_address.as_deref(),
        };

        let fee = client
            .estimate_fee(sender, recipient, amount)
            .await
            .map_err(|e| client_error(chain, e))?;

        let unsigned = match plugin.model() {
            LedgerModel::AccountModel => {
                let max_fee = fee.max_fee().ok_or_else(|| WalletError::ChainClient {
                    chain,
                    reason: "fee estimate is a byte rate, expected gas pricing".into(),
                })?;
                let needed = amount.saturating_add(max_fee);
                match client.get_balance(sender).await {
                    Ok(available) if available < needed => {
                        return Err(WalletError::InsufficientFunds { needed, available });
                    }
                    Ok(_) => {}
                    Err(ClientError::Unsupported(_)) => {
                        tracing::debug!("client has no balance lookup, skipping funds check");
                    }
                    Err(e) => return Err(client_error(chain, e)),
                }

                let counter = client
                    .get_sequence_counter(sender)
                    .await
                    .map_err(|e| client_error(chain, e))?;
                let nonce = state.next_nonce(counter);
                tracing::debug!(counter, nonce, "allocated nonce");

                plugin.assemble(&request, ChainState::Account { fee, nonce })?
            }
            LedgerModel::Utxo => {
                let outputs = client
                    .get_spendable_outputs(sender)
                    .await
                    .map_err(|e| client_error(chain, e))?;
                let reported = outputs.len();
                let outputs = state.unreserved_outputs(outputs);
                tracing::debug!(reported, free = outputs.len(), "fetched spendable outputs");

                plugin.assemble(&request, ChainState::Utxo { fee, outputs })?
            }
        };

        state.reserve(&Reservation::from(&unsigned));
        tracing::info!(
            nonce = ?unsigned.nonce(),
            inputs = unsigned.spent_outputs().len(),
            fee = %unsigned.fee(),
            "built transaction"
        );
        Ok(unsigned)
    }
}

fn client_error(chain: ChainId, err: ClientError) -> WalletError {
    WalletError::ChainClient {
        chain,
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::client::FeeEstimate;
    use crate::hd_derivation::derive_at;
    use crate::seed::Seed;

    const TEST_MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
    const TO: &str = "0x000000000000000000000000000000000000dEaD";

    /// Reports nonce 7 and has no balance lookup; `balance_down` turns that
    /// into a transport failure.
    struct Node {
        balance_down: AtomicBool,
    }

    #[async_trait]
    impl ChainClient for Node {
        async fn estimate_fee(&self, _: &str, _: &str, _: Amount) -> Result<FeeEstimate, ClientError> {
            Ok(FeeEstimate::Legacy {
                gas_limit: 21_000,
                gas_price: 1,
            })
        }

        async fn get_balance(&self, _: &str) -> Result<Amount, ClientError> {
            if self.balance_down.load(Ordering::SeqCst) {
                Err(ClientError::Transport("timed out".into()))
            } else {
                Err(ClientError::Unsupported("get_balance"))
            }
        }

        async fn get_sequence_counter(&self, _: &str) -> Result<u64, ClientError> {
            Ok(7)
        }

        async fn broadcast_raw(&self, _: &[u8]) -> Result<String, ClientError> {
            Err(ClientError::Unsupported("broadcast_raw"))
        }
    }

    fn setup() -> (TransactionBuilder, Arc<Node>, ChainRegistry) {
        let registry = ChainRegistry::with_defaults();
        let node = Arc::new(Node {
            balance_down: AtomicBool::new(false),
        });
        let builder = TransactionBuilder::new(
            Arc::new(registry.clone()),
            Arc::new(ChainClients::new().with(ChainId::Eth, node.clone())),
            Arc::new(SenderLedger::new()),
        );
        (builder, node, registry)
    }

    fn account(registry: &ChainRegistry, chain: ChainId) -> Account {
        let seed = Seed::from_mnemonic(TEST_MNEMONIC, "").unwrap();
        let record = derive_at(registry, &seed, chain, 0).unwrap();
        crate::account::to_account(registry, chain, &record).unwrap()
    }

    #[tokio::test]
    async fn missing_balance_lookup_skips_funds_check() {
        let (builder, _, registry) = setup();
        let sender = account(&registry, ChainId::Eth);
        let unsigned = builder.build(ChainId::Eth, &sender, TO, 1).await.unwrap();
        assert_eq!(unsigned.nonce(), Some(7));
        assert_eq!(unsigned.max_cost(), 1 + 21_000);
    }

    #[tokio::test]
    async fn failed_build_reserves_nothing() {
        let (builder, node, registry) = setup();
        let sender = account(&registry, ChainId::Eth);

        node.balance_down.store(true, Ordering::SeqCst);
        let err = builder.build(ChainId::Eth, &sender, TO, 1).await.unwrap_err();
        assert!(matches!(err, WalletError::ChainClient { .. }));

        node.balance_down.store(false, Ordering::SeqCst);
        let unsigned = builder.build(ChainId::Eth, &sender, TO, 1).await.unwrap();
        assert_eq!(unsigned.nonce(), Some(7));
    }

    #[tokio::test]
    async fn account_must_match_chain() {
        let (builder, _, registry) = setup();
        let btc = account(&registry, ChainId::Btc);
        let err = builder.build(ChainId::Eth, &btc, TO, 1).await.unwrap_err();
        assert!(matches!(err, WalletError::UnsupportedChain(_)));
    }

    #[test]
    fn client_errors_keep_their_message() {
        let err = client_error(ChainId::Btc, ClientError::Transport("connection refused".into()));
        assert!(err.to_string().contains("connection refused"));
        assert!(err.is_retry_safe());
    }
}
