use chain_eth::address::{parse_address, pubkey_to_eth_address};
use chain_eth::chains::{network_by_chain_id, EvmNetwork};
use chain_eth::transaction::{build_transfer, decode_signed_transaction, GasPricing};

use crate::account::{Account, EvmSigner};
use crate::client::FeeEstimate;
use crate::error::{WalletError, WalletResult};
use crate::hd_derivation::{Bip32Secp256k1, DerivationBackend};
use crate::registry::ChainPlugin;
use crate::transaction::{
    ChainState, DecodedOutput, DecodedTransaction, TransferRequest, TxPayload,
    UnsignedTransaction,
};
use crate::types::{ChainId, KeyRecord, LedgerModel};

/// Ethereum and EVM-compatible chains (BIP-44 coin type 60).
#[derive(Debug, Clone)]
pub struct EvmPlugin {
    evm_chain_id: u64,
    backend: Bip32Secp256k1,
}

impl EvmPlugin {
    pub fn new(evm_chain_id: u64) -> Self {
        Self {
            evm_chain_id,
            backend: Bip32Secp256k1,
        }
    }

    /// EIP-155 chain id signed into every transaction.
    pub fn evm_chain_id(&self) -> u64 {
        self.evm_chain_id
    }

    /// Network metadata, when the chain id is a known one.
    pub fn network(&self) -> Option<&'static EvmNetwork> {
        network_by_chain_id(self.evm_chain_id)
    }
}

impl ChainPlugin for EvmPlugin {
    fn chain(&self) -> ChainId {
        ChainId::Eth
    }

    fn model(&self) -> LedgerModel {
        LedgerModel::AccountModel
    }

    fn path_template(&self) -> &str {
        "m/44'/60'/0'/0/{index}"
    }

    fn backend(&self) -> &dyn DerivationBackend {
        &self.backend
    }

    fn encode_address(&self, public_key: &[u8]) -> WalletResult<String> {
        Ok(pubkey_to_eth_address(public_key)?)
    }

    fn validate_recipient(&self, address: &str) -> WalletResult<()> {
        parse_address(address)?;
        Ok(())
    }

    fn account(&self, record: &KeyRecord) -> WalletResult<Account> {
        let signer = EvmSigner::new(&record.private_key)?;
        Ok(Account::new(
            ChainId::Eth,
            record.address.clone(),
            record.public_key.clone(),
            Box::new(signer),
        ))
    }

    fn assemble(
        &self,
        request: &TransferRequest<'_>,
        state: ChainState,
    ) -> WalletResult<UnsignedTransaction> {
        let ChainState::Account { fee, nonce } = state else {
            return Err(WalletError::ChainClient {
                chain: ChainId::Eth,
                reason: "expected account state".into(),
            });
        };

        let (pricing, gas_limit) = match fee {
            FeeEstimate::Legacy {
                gas_limit,
                gas_price,
            } => (GasPricing::Legacy { gas_price }, gas_limit),
            FeeEstimate::Eip1559 {
                gas_limit,
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => (
                GasPricing::Eip1559 {
                    max_fee_per_gas,
                    max_priority_fee_per_gas,
                },
                gas_limit,
            ),
            FeeEstimate::FeeRate { .. } => {
                return Err(WalletError::ChainClient {
                    chain: ChainId::Eth,
                    reason: "fee estimate is a byte rate, expected gas pricing".into(),
                })
            }
        };

        let tx = build_transfer(
            self.evm_chain_id,
            nonce,
            request.recipient,
            request.amount,
            pricing,
            gas_limit,
        )?;

        Ok(UnsignedTransaction {
            chain: ChainId::Eth,
            sender: request.sender.to_string(),
            recipient: tx.to.to_checksum(None),
            amount: request.amount,
            payload: TxPayload::Evm(tx),
        })
    }

    fn decode(&self, raw: &[u8]) -> WalletResult<DecodedTransaction> {
        let decoded = decode_signed_transaction(raw)?;
        if decoded.tx.chain_id != self.evm_chain_id {
            return Err(WalletError::Signing(format!(
                "transaction is for chain id {}, expected {}",
                decoded.tx.chain_id, self.evm_chain_id
            )));
        }

        Ok(DecodedTransaction {
            chain: ChainId::Eth,
            tx_id: decoded.tx_hash,
            sender: Some(decoded.from.to_checksum(None)),
            outputs: vec![DecodedOutput {
                address: Some(decoded.tx.to.to_checksum(None)),
                amount: decoded.tx.value,
            }],
            nonce: Some(decoded.tx.nonce),
            max_fee: Some(
                u128::from(decoded.tx.gas_limit)
                    .saturating_mul(decoded.tx.pricing.max_price_per_gas()),
            ),
        })
    }
}
