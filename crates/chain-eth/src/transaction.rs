use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_rlp::{Decodable, Encodable, RlpDecodable, RlpEncodable};
use k256::ecdsa::signature::hazmat::PrehashSigner;
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use zeroize::Zeroize;

use crate::address::parse_address;
use crate::error::EthError;

/// EIP-2718 type byte for EIP-1559 transactions.
const EIP1559_TX_TYPE: u8 = 0x02;

/// How the sender pays for gas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GasPricing {
    /// Pre-London single gas price, signed with EIP-155 replay protection.
    Legacy { gas_price: u128 },
    /// EIP-1559 fee caps.
    Eip1559 {
        max_fee_per_gas: u128,
        max_priority_fee_per_gas: u128,
    },
}

impl GasPricing {
    /// Highest price per unit of gas this pricing can charge.
    pub fn max_price_per_gas(&self) -> u128 {
        match self {
            GasPricing::Legacy { gas_price } => *gas_price,
            GasPricing::Eip1559 {
                max_fee_per_gas, ..
            } => *max_fee_per_gas,
        }
    }
}

/// An unsigned value transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EthTransaction {
    pub chain_id: u64,
    pub nonce: u64,
    pub gas_limit: u64,
    pub pricing: GasPricing,
    pub to: Address,
    /// Transfer value in wei.
    pub value: u128,
    /// Calldata (empty for plain transfers).
    pub data: Vec<u8>,
}

impl EthTransaction {
    /// Worst-case debit from the sender: `value + gas_limit * max price`.
    /// `None` on overflow.
    pub fn max_cost(&self) -> Option<u128> {
        u128::from(self.gas_limit)
            .checked_mul(self.pricing.max_price_per_gas())?
            .checked_add(self.value)
    }
}

/// A signed transaction ready for `eth_sendRawTransaction`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedEthTransaction {
    /// Network encoding (RLP list for legacy, `0x02 || rlp` for EIP-1559).
    pub raw_tx: Vec<u8>,
    /// Transaction hash as a 0x-prefixed hex string.
    pub tx_hash: String,
}

/// A signed transaction decoded back into its fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedEthTransaction {
    pub tx: EthTransaction,
    /// Sender recovered from the signature.
    pub from: Address,
    pub tx_hash: String,
}

/// Builds an unsigned transfer of `value_wei` to `to`.
pub fn build_transfer(
    chain_id: u64,
    nonce: u64,
    to: &str,
    value_wei: u128,
    pricing: GasPricing,
    gas_limit: u64,
) -> Result<EthTransaction, EthError> {
    let to = parse_address(to)?;

    Ok(EthTransaction {
        chain_id,
        nonce,
        gas_limit,
        pricing,
        to,
        value: value_wei,
        data: Vec::new(),
    })
}

/// Encodes the payload whose keccak256 is signed.
///
/// Legacy: `rlp([nonce, gas_price, gas, to, value, data, chain_id, 0, 0])`.
/// EIP-1559: `0x02 || rlp([chain_id, nonce, tip, max_fee, gas, to, value, data, access_list])`.
pub fn encode_unsigned_tx(tx: &EthTransaction) -> Vec<u8> {
    let mut out = Vec::new();
    match tx.pricing {
        GasPricing::Legacy { gas_price } => {
            LegacySigningFields {
                nonce: tx.nonce,
                gas_price,
                gas_limit: tx.gas_limit,
                to: tx.to,
                value: tx.value,
                data: Bytes::from(tx.data.clone()),
                chain_id: tx.chain_id,
                empty_r: 0,
                empty_s: 0,
            }
            .encode(&mut out);
        }
        GasPricing::Eip1559 {
            max_fee_per_gas,
            max_priority_fee_per_gas,
        } => {
            out.push(EIP1559_TX_TYPE);
            Eip1559SigningFields {
                chain_id: tx.chain_id,
                nonce: tx.nonce,
                max_priority_fee_per_gas,
                max_fee_per_gas,
                gas_limit: tx.gas_limit,
                to: tx.to,
                value: tx.value,
                data: Bytes::from(tx.data.clone()),
                access_list: Vec::new(),
            }
            .encode(&mut out);
        }
    }
    out
}

/// Hash that the sender's key signs.
pub fn signing_hash(tx: &EthTransaction) -> B256 {
    keccak256(encode_unsigned_tx(tx))
}

/// Signs `tx` with a secp256k1 private key.
///
/// Signatures are RFC 6979 deterministic, so identical inputs always produce
/// identical raw bytes and hash.
pub fn sign_transaction(
    tx: &EthTransaction,
    private_key: &[u8; 32],
) -> Result<SignedEthTransaction, EthError> {
    let msg_hash = signing_hash(tx);
    let (r, s, parity) = sign_prehash(msg_hash.as_slice(), private_key)?;

    let mut raw_tx = Vec::new();
    match tx.pricing {
        GasPricing::Legacy { gas_price } => {
            let v = tx
                .chain_id
                .checked_mul(2)
                .and_then(|v| v.checked_add(35 + u64::from(parity)))
                .ok_or_else(|| {
                    EthError::SigningError(format!("chain id {} too large for EIP-155", tx.chain_id))
                })?;
            LegacySignedFields {
                nonce: tx.nonce,
                gas_price,
                gas_limit: tx.gas_limit,
                to: tx.to,
                value: tx.value,
                data: Bytes::from(tx.data.clone()),
                v,
                r,
                s,
            }
            .encode(&mut raw_tx);
        }
        GasPricing::Eip1559 {
            max_fee_per_gas,
            max_priority_fee_per_gas,
        } => {
            raw_tx.push(EIP1559_TX_TYPE);
            Eip1559SignedFields {
                chain_id: tx.chain_id,
                nonce: tx.nonce,
                max_priority_fee_per_gas,
                max_fee_per_gas,
                gas_limit: tx.gas_limit,
                to: tx.to,
                value: tx.value,
                data: Bytes::from(tx.data.clone()),
                access_list: Vec::new(),
                y_parity: parity,
                r,
                s,
            }
            .encode(&mut raw_tx);
        }
    }

    let tx_hash = format!("0x{}", hex::encode(keccak256(&raw_tx)));
    Ok(SignedEthTransaction { raw_tx, tx_hash })
}

/// Decodes a signed transaction and recovers its sender.
pub fn decode_signed_transaction(raw: &[u8]) -> Result<DecodedEthTransaction, EthError> {
    let first = *raw
        .first()
        .ok_or_else(|| EthError::DecodingError("empty transaction".into()))?;

    let (tx, r, s, parity) = if first >= 0xc0 {
        let fields: LegacySignedFields = decode_exact(raw)?;
        if fields.v < 35 {
            return Err(EthError::DecodingError(format!(
                "pre-EIP-155 signature (v = {})",
                fields.v
            )));
        }
        let chain_id = (fields.v - 35) / 2;
        let parity = ((fields.v - 35) % 2) as u8;
        let tx = EthTransaction {
            chain_id,
            nonce: fields.nonce,
            gas_limit: fields.gas_limit,
            pricing: GasPricing::Legacy {
                gas_price: fields.gas_price,
            },
            to: fields.to,
            value: fields.value,
            data: fields.data.to_vec(),
        };
        (tx, fields.r, fields.s, parity)
    } else if first == EIP1559_TX_TYPE {
        let fields: Eip1559SignedFields = decode_exact(&raw[1..])?;
        if !fields.access_list.is_empty() {
            return Err(EthError::DecodingError("access lists are not supported".into()));
        }
        let tx = EthTransaction {
            chain_id: fields.chain_id,
            nonce: fields.nonce,
            gas_limit: fields.gas_limit,
            pricing: GasPricing::Eip1559 {
                max_fee_per_gas: fields.max_fee_per_gas,
                max_priority_fee_per_gas: fields.max_priority_fee_per_gas,
            },
            to: fields.to,
            value: fields.value,
            data: fields.data.to_vec(),
        };
        (tx, fields.r, fields.s, fields.y_parity)
    } else {
        return Err(EthError::UnsupportedTxType(first));
    };

    let from = recover_signer(&signing_hash(&tx), r, s, parity)?;
    let tx_hash = format!("0x{}", hex::encode(keccak256(raw)));

    Ok(DecodedEthTransaction { tx, from, tx_hash })
}

/// Signs an arbitrary message using EIP-191 `personal_sign`.
///
/// Returns the 65-byte signature `r || s || v` with `v` in {27, 28}.
pub fn sign_message(message: &[u8], private_key: &[u8; 32]) -> Result<Vec<u8>, EthError> {
    let prefix = format!("\x19Ethereum Signed Message:\n{}", message.len());
    let mut payload = Vec::with_capacity(prefix.len() + message.len());
    payload.extend_from_slice(prefix.as_bytes());
    payload.extend_from_slice(message);
    let msg_hash = keccak256(&payload);

    let (r, s, parity) = sign_prehash(msg_hash.as_slice(), private_key)?;

    let mut sig = Vec::with_capacity(65);
    sig.extend_from_slice(&r.to_be_bytes::<32>());
    sig.extend_from_slice(&s.to_be_bytes::<32>());
    sig.push(parity + 27);
    Ok(sig)
}

// ---------------------------------------------------------------------------
// RLP field layouts
// ---------------------------------------------------------------------------

#[derive(RlpEncodable)]
struct LegacySigningFields {
    nonce: u64,
    gas_price: u128,
    gas_limit: u64,
    to: Address,
    value: u128,
    data: Bytes,
    chain_id: u64,
    empty_r: u8,
    empty_s: u8,
}

#[derive(RlpEncodable, RlpDecodable)]
struct LegacySignedFields {
    nonce: u64,
    gas_price: u128,
    gas_limit: u64,
    to: Address,
    value: u128,
    data: Bytes,
    v: u64,
    r: U256,
    s: U256,
}

#[derive(RlpEncodable)]
struct Eip1559SigningFields {
    chain_id: u64,
    nonce: u64,
    max_priority_fee_per_gas: u128,
    max_fee_per_gas: u128,
    gas_limit: u64,
    to: Address,
    value: u128,
    data: Bytes,
    access_list: Vec<AccessListItem>,
}

#[derive(RlpEncodable, RlpDecodable)]
struct Eip1559SignedFields {
    chain_id: u64,
    nonce: u64,
    max_priority_fee_per_gas: u128,
    max_fee_per_gas: u128,
    gas_limit: u64,
    to: Address,
    value: u128,
    data: Bytes,
    access_list: Vec<AccessListItem>,
    y_parity: u8,
    r: U256,
    s: U256,
}

/// EIP-2930 access list entry. Always empty on transfers built here.
#[derive(Debug, Clone, RlpEncodable, RlpDecodable)]
struct AccessListItem {
    address: Address,
    storage_keys: Vec<B256>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn decode_exact<T: Decodable>(bytes: &[u8]) -> Result<T, EthError> {
    let mut buf = bytes;
    let value = T::decode(&mut buf).map_err(|e| EthError::DecodingError(e.to_string()))?;
    if !buf.is_empty() {
        return Err(EthError::DecodingError(format!(
            "{} trailing bytes after transaction",
            buf.len()
        )));
    }
    Ok(value)
}

fn sign_prehash(prehash: &[u8], private_key: &[u8; 32]) -> Result<(U256, U256, u8), EthError> {
    let mut key_bytes = *private_key;
    let signing_key = SigningKey::from_bytes((&key_bytes).into())
        .map_err(|e| EthError::InvalidPrivateKey(e.to_string()));
    key_bytes.zeroize();
    let signing_key = signing_key?;

    let (signature, recovery_id): (Signature, RecoveryId) = signing_key
        .sign_prehash(prehash)
        .map_err(|e| EthError::SigningError(e.to_string()))?;

    let r = U256::from_be_slice(&signature.r().to_bytes());
    let s = U256::from_be_slice(&signature.s().to_bytes());
    Ok((r, s, recovery_id.is_y_odd() as u8))
}

fn recover_signer(prehash: &B256, r: U256, s: U256, parity: u8) -> Result<Address, EthError> {
    let signature = Signature::from_scalars(r.to_be_bytes::<32>(), s.to_be_bytes::<32>())
        .map_err(|e| EthError::DecodingError(format!("invalid signature scalars: {e}")))?;
    let recovery_id = RecoveryId::from_byte(parity)
        .ok_or_else(|| EthError::DecodingError(format!("invalid y parity {parity}")))?;

    let key = VerifyingKey::recover_from_prehash(prehash.as_slice(), &signature, recovery_id)
        .map_err(|e| EthError::DecodingError(format!("signer recovery failed: {e}")))?;

    let point = key.to_encoded_point(false);
    Ok(Address::from_raw_public_key(&point.as_bytes()[1..]))
}
