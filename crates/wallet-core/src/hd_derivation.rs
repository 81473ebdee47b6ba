use std::collections::HashSet;

use bip32::{DerivationPath, XPrv};
use k256::ecdsa::SigningKey;
use tracing::instrument;
use zeroize::{Zeroize, Zeroizing};

use crate::error::{WalletError, WalletResult};
use crate::registry::{ChainPlugin, ChainRegistry};
use crate::seed::Seed;
use crate::types::{ChainId, KeyRecord};

/// First hardened child index. Address indices must stay below it.
const HARDENED_OFFSET: u32 = 0x8000_0000;

/// Largest batch [`derive`] accepts in one call.
pub const MAX_DERIVE_COUNT: u32 = 10_000;

/// Placeholder substituted with the address index in path templates.
pub const INDEX_PLACEHOLDER: &str = "{index}";

/// Raw key material produced for one derivation path.
pub struct DerivedKey {
    pub private_key: Zeroizing<Vec<u8>>,
    /// SEC1 compressed public key.
    pub public_key: Vec<u8>,
}

/// Computes one child key from a seed and a concrete derivation path.
pub trait DerivationBackend: Send + Sync {
    fn derive_one(&self, seed: &Seed, path: &str) -> WalletResult<DerivedKey>;
}

/// In-process BIP-32 derivation over secp256k1.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bip32Secp256k1;

impl DerivationBackend for Bip32Secp256k1 {
    fn derive_one(&self, seed: &Seed, path: &str) -> WalletResult<DerivedKey> {
        let path: DerivationPath = path
            .parse()
            .map_err(|e: bip32::Error| WalletError::Derivation(format!("bad path {path}: {e}")))?;

        let xprv = XPrv::derive_from_path(seed.expose_secret(), &path)
            .map_err(|e| WalletError::Derivation(e.to_string()))?;

        let mut private_key_bytes: [u8; 32] = xprv.to_bytes().into();
        let signing_key = SigningKey::from_bytes(&private_key_bytes.into())
            .map_err(|e| WalletError::Derivation(e.to_string()));
        let private_key = Zeroizing::new(private_key_bytes.to_vec());
        private_key_bytes.zeroize();

        let public_key = signing_key?
            .verifying_key()
            .to_encoded_point(true)
            .as_bytes()
            .to_vec();

        Ok(DerivedKey {
            private_key,
            public_key,
        })
    }
}

/// Expand a path template for one address index.
pub fn path_for_index(template: &str, index: u32) -> WalletResult<String> {
    if index >= HARDENED_OFFSET {
        return Err(WalletError::Derivation(format!(
            "index {index} is outside the non-hardened range"
        )));
    }
    if !template.contains(INDEX_PLACEHOLDER) {
        return Err(WalletError::Derivation(format!(
            "path template {template} has no {INDEX_PLACEHOLDER} placeholder"
        )));
    }
    Ok(template.replace(INDEX_PLACEHOLDER, &index.to_string()))
}

/// Derive key records for indices `0..count` on `chain`, in index order.
///
/// Fails if `count` is zero or above [`MAX_DERIVE_COUNT`], if the chain is
/// not registered, or if two indices produce the same address.
#[instrument(skip(registry, seed, chain), fields(chain = %chain))]
pub fn derive(
    registry: &ChainRegistry,
    seed: &Seed,
    chain: ChainId,
    count: u32,
) -> WalletResult<Vec<KeyRecord>> {
    if count < 1 {
        return Err(WalletError::Derivation("count must be at least 1".into()));
    }
    if count > MAX_DERIVE_COUNT {
        return Err(WalletError::Derivation(format!(
            "count {count} exceeds the batch limit of {MAX_DERIVE_COUNT}"
        )));
    }
    let plugin = registered_plugin(registry, chain)?;

    let mut records = Vec::new();
    let mut seen = HashSet::new();
    for index in 0..count {
        let record = derive_with(plugin.as_ref(), seed, index)?;
        if !seen.insert(record.address.clone()) {
            return Err(WalletError::Derivation(format!(
                "duplicate address {} at index {index}",
                record.address
            )));
        }
        records.push(record);
    }

    tracing::debug!(derived = records.len(), "derived key records");
    Ok(records)
}

/// Derive the single key record at `index`.
#[instrument(skip(registry, seed, chain), fields(chain = %chain))]
pub fn derive_at(
    registry: &ChainRegistry,
    seed: &Seed,
    chain: ChainId,
    index: u32,
) -> WalletResult<KeyRecord> {
    let plugin = registered_plugin(registry, chain)?;
    derive_with(plugin.as_ref(), seed, index)
}

fn registered_plugin(
    registry: &ChainRegistry,
    chain: ChainId,
) -> WalletResult<std::sync::Arc<dyn ChainPlugin>> {
    registry
        .get(chain)
        .map_err(|_| WalletError::Derivation(format!("chain {chain} is not registered")))
}

fn derive_with(plugin: &dyn ChainPlugin, seed: &Seed, index: u32) -> WalletResult<KeyRecord> {
    let derivation_path = path_for_index(plugin.path_template(), index)?;
    let key = plugin.backend().derive_one(seed, &derivation_path)?;
    let address = plugin
        .encode_address(&key.public_key)
        .map_err(|e| WalletError::Derivation(format!("address encoding failed: {e}")))?;

    Ok(KeyRecord {
        chain: plugin.chain(),
        derivation_index: index,
        derivation_path,
        address,
        public_key: key.public_key,
        private_key: key.private_key,
    })
}
