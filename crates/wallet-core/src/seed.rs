//! Seed material and where it comes from.
//!
//! The seed is the single root of trust: every key the wallet uses is derived
//! from it. It lives in process memory only, is wiped on drop and never
//! appears in `Debug` output or logs.

use secrecy::{ExposeSecret, SecretBox, SecretString};

use crate::error::{WalletError, WalletResult};
use crate::mnemonic::mnemonic_to_seed;

/// BIP-32 bounds on master seed length.
const MIN_SEED_LEN: usize = 16;
const MAX_SEED_LEN: usize = 64;

/// BIP-39 seed bytes.
pub struct Seed(SecretBox<Vec<u8>>);

impl Seed {
    /// Seed from a BIP-39 mnemonic and optional passphrase.
    pub fn from_mnemonic(phrase: &str, passphrase: &str) -> WalletResult<Self> {
        if phrase.trim().is_empty() {
            return Err(WalletError::Derivation("empty mnemonic".into()));
        }
        let bytes = mnemonic_to_seed(phrase, passphrase)
            .map_err(|e| WalletError::Derivation(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Seed from raw bytes (16..=64 bytes).
    pub fn from_bytes(bytes: &[u8]) -> WalletResult<Self> {
        if !(MIN_SEED_LEN..=MAX_SEED_LEN).contains(&bytes.len()) {
            return Err(WalletError::Derivation(format!(
                "seed must be {MIN_SEED_LEN}..={MAX_SEED_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self(SecretBox::new(Box::new(bytes.to_vec()))))
    }

    /// Raw seed bytes, for derivation backends only.
    pub fn expose_secret(&self) -> &[u8] {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for Seed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Seed(<redacted>)")
    }
}

/// Source of the wallet seed, read once per session.
pub trait SecretProvider: Send + Sync {
    fn get_seed(&self) -> WalletResult<Seed>;
}

/// Mnemonic held in memory.
pub struct StaticSeedProvider {
    mnemonic: SecretString,
    passphrase: SecretString,
}

impl StaticSeedProvider {
    pub fn new(mnemonic: impl Into<String>, passphrase: impl Into<String>) -> Self {
        Self {
            mnemonic: SecretString::from(mnemonic.into()),
            passphrase: SecretString::from(passphrase.into()),
        }
    }
}

impl SecretProvider for StaticSeedProvider {
    fn get_seed(&self) -> WalletResult<Seed> {
        Seed::from_mnemonic(
            self.mnemonic.expose_secret(),
            self.passphrase.expose_secret(),
        )
    }
}

/// Reads the mnemonic from the process environment.
///
/// A `.env` file in the working directory (or a parent) is loaded first if
/// present; variables already set in the environment take precedence.
pub struct EnvSeedProvider {
    mnemonic_var: String,
    passphrase_var: String,
}

impl EnvSeedProvider {
    pub const DEFAULT_MNEMONIC_VAR: &'static str = "MNEMONIC";
    pub const DEFAULT_PASSPHRASE_VAR: &'static str = "MNEMONIC_PASSPHRASE";

    pub fn new() -> Self {
        Self::with_vars(Self::DEFAULT_MNEMONIC_VAR, Self::DEFAULT_PASSPHRASE_VAR)
    }

    pub fn with_vars(mnemonic_var: impl Into<String>, passphrase_var: impl Into<String>) -> Self {
        Self {
            mnemonic_var: mnemonic_var.into(),
            passphrase_var: passphrase_var.into(),
        }
    }
}

impl Default for EnvSeedProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretProvider for EnvSeedProvider {
    fn get_seed(&self) -> WalletResult<Seed> {
        dotenvy::dotenv().ok();

        let mnemonic = SecretString::from(std::env::var(&self.mnemonic_var).map_err(|_| {
            WalletError::Derivation(format!("{} is not set", self.mnemonic_var))
        })?);
        let passphrase =
            SecretString::from(std::env::var(&self.passphrase_var).unwrap_or_default());

        tracing::debug!(var = %self.mnemonic_var, "loaded mnemonic from environment");
        Seed::from_mnemonic(mnemonic.expose_secret(), passphrase.expose_secret())
    }
}
