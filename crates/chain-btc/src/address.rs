use bitcoin::address::{Address, NetworkUnchecked};
use bitcoin::CompressedPublicKey;

use crate::error::BtcError;
use crate::network::BtcNetwork;

/// Derive a P2WPKH (native SegWit bech32) address from a compressed public key.
///
/// Returns `bc1...` on mainnet and `tb1...` on testnet.
pub fn pubkey_to_p2wpkh_address(pubkey_bytes: &[u8], network: BtcNetwork) -> Result<String, BtcError> {
    let compressed_pk = CompressedPublicKey::from_slice(pubkey_bytes).map_err(|e| {
        BtcError::InvalidPublicKey(format!("failed to parse compressed public key: {e}"))
    })?;

    Ok(Address::p2wpkh(&compressed_pk, network.to_bitcoin_network()).to_string())
}

/// Parse an address and require it to belong to `network`.
pub fn parse_address(address: &str, network: BtcNetwork) -> Result<Address, BtcError> {
    address
        .parse::<Address<NetworkUnchecked>>()
        .map_err(|e| BtcError::InvalidAddress(format!("failed to parse address: {e}")))?
        .require_network(network.to_bitcoin_network())
        .map_err(|e| BtcError::InvalidAddress(format!("address is for another network: {e}")))
}
