use bip39::{Language, Mnemonic};
use rand::RngCore;
use zeroize::{Zeroize, Zeroizing};

use crate::error::WalletError;

/// Generate a new English BIP-39 mnemonic.
///
/// `word_count` must be one of 12, 15, 18, 21 or 24.
pub fn generate_mnemonic(word_count: usize) -> Result<Zeroizing<String>, WalletError> {
    if !matches!(word_count, 12 | 15 | 18 | 21 | 24) {
        return Err(WalletError::InvalidMnemonic(format!(
            "unsupported word count {word_count}"
        )));
    }

    // 3 words per 32 bits of entropy
    let mut entropy = [0u8; 32];
    let len = word_count / 3 * 4;
    rand::rngs::OsRng.fill_bytes(&mut entropy[..len]);
    let mnemonic = Mnemonic::from_entropy_in(Language::English, &entropy[..len])
        .map_err(|e| WalletError::InvalidMnemonic(e.to_string()));
    entropy.zeroize();

    Ok(Zeroizing::new(mnemonic?.to_string()))
}

/// Validate a mnemonic phrase (word list and checksum).
pub fn validate_mnemonic(phrase: &str) -> bool {
    Mnemonic::parse_in_normalized(Language::English, phrase).is_ok()
}

/// Derive the 64-byte BIP-39 seed from a mnemonic and optional passphrase.
pub fn mnemonic_to_seed(phrase: &str, passphrase: &str) -> Result<Zeroizing<Vec<u8>>, WalletError> {
    let mnemonic = Mnemonic::parse_in_normalized(Language::English, phrase)
        .map_err(|e| WalletError::InvalidMnemonic(e.to_string()))?;

    let mut seed = mnemonic.to_seed(passphrase);
    let out = Zeroizing::new(seed.to_vec());
    seed.zeroize();
    Ok(out)
}
