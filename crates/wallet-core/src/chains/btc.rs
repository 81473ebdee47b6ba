use chain_btc::address::{parse_address, pubkey_to_p2wpkh_address};
use chain_btc::network::BtcNetwork;
use chain_btc::transaction::{build_p2wpkh_transaction, decode_transaction};

use crate::account::{Account, P2wpkhSigner};
use crate::client::FeeEstimate;
use crate::error::{WalletError, WalletResult};
use crate::hd_derivation::{Bip32Secp256k1, DerivationBackend};
use crate::registry::ChainPlugin;
use crate::transaction::{
    ChainState, DecodedOutput, DecodedTransaction, TransferRequest, TxPayload,
    UnsignedTransaction,
};
use crate::types::{ChainId, KeyRecord, LedgerModel};

/// Bitcoin with native SegWit (BIP-84) P2WPKH addresses.
#[derive(Debug, Clone)]
pub struct BitcoinPlugin {
    chain: ChainId,
    network: BtcNetwork,
    path_template: String,
    backend: Bip32Secp256k1,
}

impl BitcoinPlugin {
    pub fn new(chain: ChainId, network: BtcNetwork) -> Self {
        Self {
            chain,
            network,
            path_template: format!("m/84'/{}'/0'/0/{{index}}", network.coin_type()),
            backend: Bip32Secp256k1,
        }
    }

    pub fn network(&self) -> BtcNetwork {
        self.network
    }
}

impl ChainPlugin for BitcoinPlugin {
    fn chain(&self) -> ChainId {
        self.chain
    }

    fn model(&self) -> LedgerModel {
        LedgerModel::Utxo
    }

    fn path_template(&self) -> &str {
        &self.path_template
    }

    fn backend(&self) -> &dyn DerivationBackend {
        &self.backend
    }

    fn encode_address(&self, public_key: &[u8]) -> WalletResult<String> {
        Ok(pubkey_to_p2wpkh_address(public_key, self.network)?)
    }

    fn validate_recipient(&self, address: &str) -> WalletResult<()> {
        parse_address(address, self.network)?;
        Ok(())
    }

    fn account(&self, record: &KeyRecord) -> WalletResult<Account> {
        let signer = P2wpkhSigner::new(&record.private_key)?;
        Ok(Account::new(
            self.chain,
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
        let ChainState::Utxo { fee, outputs } = state else {
            return Err(WalletError::ChainClient {
                chain: self.chain,
                reason: "expected spendable outputs".into(),
            });
        };
        let FeeEstimate::FeeRate { sat_per_vbyte } = fee else {
            return Err(WalletError::ChainClient {
                chain: self.chain,
                reason: "fee estimate is gas pricing, expected sat/vbyte".into(),
            });
        };

        let amount_sat = u64::try_from(request.amount).map_err(|_| {
            WalletError::InvalidAmount(format!("{} sat does not fit in 64 bits", request.amount))
        })?;
        let change_address = request.change_address.unwrap_or(request.sender);

        let tx = build_p2wpkh_transaction(
            &outputs,
            request.sender,
            request.recipient,
            amount_sat,
            change_address,
            sat_per_vbyte,
            self.network,
        )?;

        Ok(UnsignedTransaction {
            chain: self.chain,
            sender: request.sender.to_string(),
            recipient: request.recipient.to_string(),
            amount: request.amount,
            payload: TxPayload::Bitcoin(tx),
        })
    }

    fn decode(&self, raw: &[u8]) -> WalletResult<DecodedTransaction> {
        let decoded = decode_transaction(raw, self.network)?;
        Ok(DecodedTransaction {
            chain: self.chain,
            tx_id: decoded.txid,
            sender: decoded.sender,
            outputs: decoded
                .outputs
                .into_iter()
                .map(|o| DecodedOutput {
                    address: o.address,
                    amount: o.value_sat.into(),
                })
                .collect(),
            nonce: None,
            max_fee: None,
        })
    }
}
