use std::sync::Arc;
use std::time::Duration;

use tracing::instrument;

use crate::account::Account;
use crate::builder::{BuildOptions, TransactionBuilder};
use crate::client::{ChainClient, ClientError};
use crate::error::{WalletError, WalletResult};
use crate::ledger::Reservation;
use crate::transaction::SignedTransaction;
use crate::types::{Amount, BroadcastReceipt, ChainId};

/// Per-send knobs.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    pub build: BuildOptions,
    /// Overrides the dispatcher's broadcast timeout for this call.
    pub timeout: Option<Duration>,
}

/// Build, sign and broadcast as one step under the sender's lock.
///
/// Not idempotent: every call produces a new transaction. Nothing is
/// retried.
#[derive(Debug)]
pub struct BroadcastDispatcher {
    builder: Arc<TransactionBuilder>,
    timeout: Duration,
}

impl BroadcastDispatcher {
    pub fn new(builder: Arc<TransactionBuilder>, timeout: Duration) -> Self {
        Self { builder, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn send(
        &self,
        chain: ChainId,
        account: &Account,
        recipient: &str,
        amount: Amount,
    ) -> WalletResult<BroadcastReceipt> {
        self.send_with(chain, account, recipient, amount, &SendOptions::default())
            .await
    }

    /// On rejection the nonce or inputs are released. On an indeterminate
    /// outcome they stay reserved and the error carries the [`Reservation`]
    /// for [`BroadcastDispatcher::resolve`].
    #[instrument(skip_all, fields(chain = %chain, sender = %account.address()))]
    pub async fn send_with(
        &self,
        chain: ChainId,
        account: &Account,
        recipient: &str,
        amount: Amount,
        options: &SendOptions,
    ) -> WalletResult<BroadcastReceipt> {
        let plugin = self.builder.check_request(chain, account, recipient, amount)?;
        let client = self.builder.clients().get(chain)?;
        let mut state = self.builder.ledger().lock(chain, account.address()).await;

        let unsigned = self
            .builder
            .build_locked(
                &mut state,
                plugin.as_ref(),
                client.as_ref(),
                account,
                recipient,
                amount,
                &options.build,
            )
            .await?;

        let reservation = Reservation::from(&unsigned);
        let signed = match account.sign(&unsigned) {
            Ok(signed) => signed,
            Err(e) => {
                state.release(&reservation);
                return Err(e);
            }
        };

        let timeout = options.timeout.unwrap_or(self.timeout);
        match submit(client.as_ref(), &signed, timeout).await {
            Err(e @ WalletError::Broadcast { .. }) | Err(e @ WalletError::ChainClient { .. }) => {
                state.release(&reservation);
                Err(e)
            }
            Err(WalletError::Indeterminate {
                chain,
                tx_id,
                reason,
                ..
            }) => Err(WalletError::Indeterminate {
                chain,
                tx_id,
                reason,
                reservation: Some(Box::new(reservation)),
            }),
            other => other,
        }
    }

    /// Settle an indeterminate send once its fate is known. A transaction
    /// that never landed gives its nonce or inputs back; the next send fills
    /// the nonce before newer ones. A landed one keeps them, and spent inputs
    /// drop out once the client stops reporting them.
    #[instrument(skip_all, fields(chain = %reservation.chain, sender = %reservation.sender))]
    pub async fn resolve(&self, reservation: &Reservation, landed: bool) {
        if landed {
            tracing::info!(nonce = ?reservation.nonce, "indeterminate send landed");
        } else {
            self.builder.release_reservation(reservation).await;
        }
    }

    /// Broadcast a transaction that was built and signed separately.
    ///
    /// Reservations are not touched; use [`TransactionBuilder::release`] after
    /// a rejection. An `Indeterminate` error from here carries no
    /// reservation.
    #[instrument(skip_all, fields(chain = %signed.chain, tx_id = %signed.tx_id))]
    pub async fn broadcast(
        &self,
        signed: &SignedTransaction,
        timeout: Option<Duration>,
    ) -> WalletResult<BroadcastReceipt> {
        let client = self.builder.clients().get(signed.chain)?;
        submit(client.as_ref(), signed, timeout.unwrap_or(self.timeout)).await
    }
}

async fn submit(
    client: &dyn ChainClient,
    signed: &SignedTransaction,
    timeout: Duration,
) -> WalletResult<BroadcastReceipt> {
    let chain = signed.chain;
    match tokio::time::timeout(timeout, client.broadcast_raw(&signed.raw)).await {
        Ok(Ok(tx_id)) => {
            if !same_tx_id(&tx_id, &signed.tx_id) {
                tracing::warn!(local = %signed.tx_id, reported = %tx_id, "client reported a different transaction id");
            }
            tracing::info!(tx_id = %tx_id, "broadcast accepted");
            Ok(BroadcastReceipt { chain, tx_id })
        }
        Ok(Err(ClientError::Rejected(reason))) => {
            tracing::warn!(tx_id = %signed.tx_id, %reason, "broadcast rejected");
            Err(WalletError::Broadcast { chain, reason })
        }
        Ok(Err(ClientError::Unsupported(op))) => Err(WalletError::ChainClient {
            chain,
            reason: format!("operation not supported: {op}"),
        }),
        Ok(Err(ClientError::Transport(reason))) => {
            tracing::warn!(tx_id = %signed.tx_id, %reason, "broadcast outcome unknown");
            Err(WalletError::Indeterminate {
                chain,
                tx_id: signed.tx_id.clone(),
                reason,
                reservation: None,
            })
        }
        Err(_) => {
            tracing::warn!(tx_id = %signed.tx_id, ?timeout, "broadcast timed out");
            Err(WalletError::Indeterminate {
                chain,
                tx_id: signed.tx_id.clone(),
                reason: format!("no response within {timeout:?}"),
                reservation: None,
            })
        }
    }
}

fn same_tx_id(a: &str, b: &str) -> bool {
    let strip = |s: &str| s.trim_start_matches("0x").to_ascii_lowercase();
    strip(a) == strip(b)
}
