use zeroize::Zeroizing;

use crate::error::{WalletError, WalletResult};
use crate::registry::ChainRegistry;
use crate::transaction::{SignedTransaction, TxPayload, UnsignedTransaction};
use crate::types::{ChainId, KeyRecord};

/// Chain-specific signing strategy. Owns the private key.
pub trait TransactionSigner: Send + Sync {
    fn sign(&self, chain: ChainId, payload: &TxPayload) -> WalletResult<SignedTransaction>;

    /// Sign an off-chain message, if the chain has a convention for it.
    fn sign_message(&self, _message: &[u8]) -> WalletResult<Vec<u8>> {
        Err(WalletError::Signing(
            "message signing is not supported on this chain".into(),
        ))
    }
}

/// secp256k1 + keccak signer for EVM transactions (legacy EIP-155 or EIP-1559).
pub struct EvmSigner {
    key: Zeroizing<[u8; 32]>,
}

impl EvmSigner {
    pub fn new(private_key: &[u8]) -> WalletResult<Self> {
        Ok(Self {
            key: key_array(private_key)?,
        })
    }
}

impl TransactionSigner for EvmSigner {
    fn sign(&self, chain: ChainId, payload: &TxPayload) -> WalletResult<SignedTransaction> {
        let TxPayload::Evm(tx) = payload else {
            return Err(WalletError::Signing("EVM signer given a non-EVM payload".into()));
        };
        let signed = chain_eth::transaction::sign_transaction(tx, &self.key)?;
        Ok(SignedTransaction {
            chain,
            raw: signed.raw_tx,
            tx_id: signed.tx_hash,
        })
    }

    fn sign_message(&self, message: &[u8]) -> WalletResult<Vec<u8>> {
        Ok(chain_eth::transaction::sign_message(message, &self.key)?)
    }
}

/// BIP-143 signer for native SegWit (P2WPKH) inputs.
pub struct P2wpkhSigner {
    key: Zeroizing<[u8; 32]>,
}

impl P2wpkhSigner {
    pub fn new(private_key: &[u8]) -> WalletResult<Self> {
        Ok(Self {
            key: key_array(private_key)?,
        })
    }
}

impl TransactionSigner for P2wpkhSigner {
    fn sign(&self, chain: ChainId, payload: &TxPayload) -> WalletResult<SignedTransaction> {
        let TxPayload::Bitcoin(tx) = payload else {
            return Err(WalletError::Signing("P2WPKH signer given a non-Bitcoin payload".into()));
        };
        let signed = chain_btc::transaction::sign_transaction(tx, &self.key)?;
        Ok(SignedTransaction {
            chain,
            raw: signed.raw_tx,
            tx_id: signed.txid,
        })
    }
}

fn key_array(private_key: &[u8]) -> WalletResult<Zeroizing<[u8; 32]>> {
    let mut key = Zeroizing::new([0u8; 32]);
    if private_key.len() != key.len() {
        return Err(WalletError::Derivation(format!(
            "expected a 32-byte private key, got {} bytes",
            private_key.len()
        )));
    }
    key.copy_from_slice(private_key);
    Ok(key)
}

/// A signing capability bound to one address on one chain.
///
/// Built from exactly one [`KeyRecord`]. The private key stays inside the
/// signer; nothing on `Account` returns it.
pub struct Account {
    chain: ChainId,
    address: String,
    public_key: Vec<u8>,
    signer: Box<dyn TransactionSigner>,
}

impl Account {
    pub fn new(
        chain: ChainId,
        address: String,
        public_key: Vec<u8>,
        signer: Box<dyn TransactionSigner>,
    ) -> Self {
        Self {
            chain,
            address,
            public_key,
            signer,
        }
    }

    pub fn chain(&self) -> ChainId {
        self.chain
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// Sign a transaction built for this account.
    ///
    /// Deterministic (RFC 6979 nonces): the same unsigned transaction always
    /// yields the same bytes and id.
    pub fn sign(&self, unsigned: &UnsignedTransaction) -> WalletResult<SignedTransaction> {
        if unsigned.chain != self.chain {
            return Err(WalletError::Signing(format!(
                "{} account cannot sign a {} transaction",
                self.chain, unsigned.chain
            )));
        }
        if unsigned.sender != self.address {
            return Err(WalletError::Signing(format!(
                "transaction sender {} is not {}",
                unsigned.sender, self.address
            )));
        }
        self.signer.sign(self.chain, &unsigned.payload)
    }

    pub fn sign_message(&self, message: &[u8]) -> WalletResult<Vec<u8>> {
        self.signer.sign_message(message)
    }
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("chain", &self.chain)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Turn a key record into an account through the plugin registered for
/// `chain`.
pub fn to_account(
    registry: &ChainRegistry,
    chain: ChainId,
    record: &KeyRecord,
) -> WalletResult<Account> {
    let plugin = registry.get(chain)?;
    if record.chain != chain {
        return Err(WalletError::UnsupportedChain(format!(
            "key record for {} cannot back a {chain} account",
            record.chain
        )));
    }
    plugin.account(record)
}
