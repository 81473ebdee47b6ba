//! Chain-neutral transaction records passed between builder, account and
//! dispatcher.

use chain_btc::transaction::UnsignedBtcTx;
use chain_btc::utxo::SpendableOutput;
use chain_eth::transaction::EthTransaction;

use crate::client::FeeEstimate;
use crate::types::{Amount, ChainId};

/// Encoding family of an unsigned transaction.
#[derive(Debug, Clone)]
pub enum TxPayload {
    Evm(EthTransaction),
    Bitcoin(UnsignedBtcTx),
}

/// A transfer ready to be signed by the sender's account.
///
/// Built once per send request and never reused.
#[derive(Debug, Clone)]
pub struct UnsignedTransaction {
    pub chain: ChainId,
    pub sender: String,
    pub recipient: String,
    pub amount: Amount,
    pub payload: TxPayload,
}

impl UnsignedTransaction {
    /// Sequence counter for account-model chains.
    pub fn nonce(&self) -> Option<u64> {
        match &self.payload {
            TxPayload::Evm(tx) => Some(tx.nonce),
            TxPayload::Bitcoin(_) => None,
        }
    }

    /// `txid:vout` of every input consumed (empty for account-model chains).
    pub fn spent_outputs(&self) -> &[String] {
        match &self.payload {
            TxPayload::Evm(_) => &[],
            TxPayload::Bitcoin(tx) => &tx.spent,
        }
    }

    /// Fee paid. For EVM chains this is the upper bound `gas_limit * max price`.
    pub fn fee(&self) -> Amount {
        match &self.payload {
            TxPayload::Evm(tx) => {
                u128::from(tx.gas_limit).saturating_mul(tx.pricing.max_price_per_gas())
            }
            TxPayload::Bitcoin(tx) => tx.fee_sat.into(),
        }
    }

    /// Amount plus fee, the most the sender can be debited.
    pub fn max_cost(&self) -> Amount {
        self.amount.saturating_add(self.fee())
    }
}

/// Signed payload plus its locally computed canonical id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub chain: ChainId,
    pub raw: Vec<u8>,
    /// Keccak hash (0x-prefixed) for EVM, txid for Bitcoin.
    pub tx_id: String,
}

impl SignedTransaction {
    pub fn raw_hex(&self) -> String {
        hex::encode(&self.raw)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedOutput {
    /// `None` when the output script has no address form.
    pub address: Option<String>,
    pub amount: Amount,
}

/// A signed transaction read back from its raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTransaction {
    pub chain: ChainId,
    pub tx_id: String,
    /// Recovered from the signature (EVM) or the first input's witness
    /// (Bitcoin).
    pub sender: Option<String>,
    /// Payment first, then change if any.
    pub outputs: Vec<DecodedOutput>,
    pub nonce: Option<u64>,
    /// Fee cap for EVM transactions. Bitcoin fees need the spent outputs
    /// and are not recoverable from the raw bytes alone.
    pub max_fee: Option<Amount>,
}

impl DecodedTransaction {
    pub fn recipient(&self) -> Option<&str> {
        self.outputs.first().and_then(|o| o.address.as_deref())
    }

    pub fn amount(&self) -> Option<Amount> {
        self.outputs.first().map(|o| o.amount)
    }
}

/// What a chain plugin needs to assemble a transfer.
#[derive(Debug, Clone)]
pub struct TransferRequest<'a> {
    pub sender: &'a str,
    pub recipient: &'a str,
    pub amount: Amount,
    /// Overrides the change destination on UTXO chains. Defaults to `sender`.
    pub change_address: Option<&'a str>,
}

/// Chain state fetched by the builder, consumed by [`ChainPlugin::assemble`].
///
/// [`ChainPlugin::assemble`]: crate::registry::ChainPlugin::assemble
#[derive(Debug, Clone)]
pub enum ChainState {
    Account { fee: FeeEstimate, nonce: u64 },
    Utxo {
        fee: FeeEstimate,
        /// Spendable outputs not reserved by another in-flight build.
        outputs: Vec<SpendableOutput>,
    },
}
