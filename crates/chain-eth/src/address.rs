use alloy_primitives::Address;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::PublicKey;

use crate::error::EthError;

/// Derives an EIP-55 checksummed address from a SEC1-encoded secp256k1 public
/// key. Both compressed (33 bytes) and uncompressed (65 bytes) forms are
/// accepted.
///
/// The address is the last 20 bytes of `keccak256(x || y)`.
pub fn pubkey_to_eth_address(sec1_pubkey: &[u8]) -> Result<String, EthError> {
    Ok(pubkey_to_address(sec1_pubkey)?.to_checksum(None))
}

/// Same as [`pubkey_to_eth_address`] but returns the raw 20-byte address.
pub fn pubkey_to_address(sec1_pubkey: &[u8]) -> Result<Address, EthError> {
    let pubkey = PublicKey::from_sec1_bytes(sec1_pubkey)
        .map_err(|e| EthError::InvalidPublicKey(format!("invalid SEC1 encoding: {e}")))?;

    let uncompressed = pubkey.to_encoded_point(false);
    // Skip the 0x04 tag; from_raw_public_key expects the 64-byte x || y body.
    Ok(Address::from_raw_public_key(&uncompressed.as_bytes()[1..]))
}

/// Parses a `0x`-prefixed address string.
///
/// All-lowercase and all-uppercase hex are accepted as is. Mixed case must
/// carry a valid EIP-55 checksum.
pub fn parse_address(address: &str) -> Result<Address, EthError> {
    let hex_part = strip_hex_prefix(address)?;

    if hex_part.len() != 40 {
        return Err(EthError::InvalidAddress(format!(
            "expected 40 hex characters, got {}",
            hex_part.len()
        )));
    }

    if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(EthError::InvalidAddress(
            "address contains non-hex characters".into(),
        ));
    }

    let bytes = hex::decode(hex_part)
        .map_err(|e| EthError::InvalidAddress(format!("invalid hex: {e}")))?;
    let parsed = Address::from_slice(&bytes);

    if is_mixed_case(hex_part) && &parsed.to_checksum(None)[2..] != hex_part {
        return Err(EthError::InvalidAddress("EIP-55 checksum mismatch".into()));
    }

    Ok(parsed)
}

fn strip_hex_prefix(address: &str) -> Result<&str, EthError> {
    address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .ok_or_else(|| EthError::InvalidAddress("address must start with 0x".into()))
}

fn is_mixed_case(hex_part: &str) -> bool {
    let has_lower = hex_part.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = hex_part.chars().any(|c| c.is_ascii_uppercase());
    has_lower && has_upper
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::SecretKey;

    fn pubkey_for_scalar_one(compressed: bool) -> Vec<u8> {
        let mut privkey = [0u8; 32];
        privkey[31] = 1;
        let secret = SecretKey::from_bytes((&privkey).into()).expect("valid private key");
        secret
            .public_key()
            .to_encoded_point(compressed)
            .as_bytes()
            .to_vec()
    }

    #[test]
    fn eip55_checksum_known_addresses() {
        let cases = [
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
            "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
            "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb",
        ];

        for expected in &cases {
            let lower = format!("0x{}", expected[2..].to_lowercase());
            assert_eq!(&parse_address(&lower).unwrap().to_checksum(None), expected);
        }
    }

    #[test]
    fn scalar_one_maps_to_known_address() {
        let uncompressed = pubkey_for_scalar_one(false);
        assert_eq!(
            pubkey_to_eth_address(&uncompressed).unwrap(),
            "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf"
        );
    }

    #[test]
    fn compressed_and_uncompressed_agree() {
        let a = pubkey_to_eth_address(&pubkey_for_scalar_one(true)).unwrap();
        let b = pubkey_to_eth_address(&pubkey_for_scalar_one(false)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn garbage_pubkey_errors() {
        assert!(pubkey_to_eth_address(&[0x03; 33]).is_err());
        assert!(pubkey_to_eth_address(&[0x04; 12]).is_err());
    }

    #[test]
    fn single_case_and_checksummed_addresses_parse() {
        let expected = parse_address("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed").unwrap();
        assert_eq!(parse_address("0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed").unwrap(), expected);
        assert_eq!(parse_address("0X5AAEB6053F3E94C9B9A09F33669435E7EF1BEAED").unwrap(), expected);
    }

    #[test]
    fn bad_checksum_is_rejected() {
        let err = parse_address("0x5AAEB6053F3E94C9b9A09f33669435E7Ef1BeAed").unwrap_err();
        assert!(err.to_string().contains("checksum"));
    }

    #[test]
    fn malformed_addresses_error() {
        assert!(parse_address("0x5aAeb6053F").is_err());
        assert!(parse_address("5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed").is_err());
        assert!(parse_address("0xGGGGb6053F3E94C9b9A09f33669435E7Ef1BeAed").is_err());
    }
}
