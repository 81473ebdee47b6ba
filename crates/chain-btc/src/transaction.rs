use bitcoin::absolute::LockTime;
use bitcoin::address::Address;
use bitcoin::hashes::Hash;
use bitcoin::script::ScriptBuf;
use bitcoin::secp256k1::{Message, Secp256k1, SecretKey};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::transaction::Version;
use bitcoin::{
    Amount, CompressedPublicKey, OutPoint, Sequence, Transaction, TxIn, TxOut, Txid, Witness,
};
use zeroize::Zeroize;

use crate::address::parse_address;
use crate::error::BtcError;
use crate::network::BtcNetwork;
use crate::utxo::{select_utxos, SpendableOutput};

/// Estimated virtual size of a P2WPKH input (in vbytes).
/// 41 bytes non-witness + ~107 witness bytes / 4.
const P2WPKH_INPUT_VBYTES: u64 = 68;

/// Estimated virtual size of any output (in vbytes).
const OUTPUT_VBYTES: u64 = 31;

/// Fixed transaction overhead (in vbytes): version + locktime + segwit marker/flag + counts.
const TX_OVERHEAD_VBYTES: u64 = 11;

/// Outputs below this value are non-standard for P2WPKH relay.
pub const DUST_THRESHOLD_SAT: u64 = 546;

/// An unsigned P2WPKH transaction ready for signing.
#[derive(Debug, Clone)]
pub struct UnsignedBtcTx {
    /// The transaction with empty witnesses.
    pub tx: Transaction,
    /// Outputs being spent, in input order. Needed for BIP-143 sighashes.
    pub prevouts: Vec<TxOut>,
    /// `txid:vout` of every spent output, in input order.
    pub spent: Vec<String>,
    /// Absolute fee paid (inputs minus outputs).
    pub fee_sat: u64,
}

/// A signed transaction and its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedBtcTx {
    pub raw_tx: Vec<u8>,
    pub txid: String,
}

/// One output of a decoded transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedOutput {
    /// `None` for scripts without an address form (e.g. OP_RETURN).
    pub address: Option<String>,
    pub value_sat: u64,
}

/// A signed transaction decoded back into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedBtcTx {
    pub txid: String,
    /// `txid:vout` of every input.
    pub inputs: Vec<String>,
    pub outputs: Vec<DecodedOutput>,
    /// P2WPKH address of the key that signed the first input, when the
    /// witness has the `[signature, pubkey]` shape.
    pub sender: Option<String>,
}

/// Estimate the fee for a P2WPKH transaction.
///
/// `estimated_vsize * fee_rate_sat_vbyte`, saturating on overflow.
pub fn estimate_fee(num_inputs: usize, num_outputs: usize, fee_rate_sat_vbyte: u64) -> u64 {
    let vsize = TX_OVERHEAD_VBYTES
        + (num_inputs as u64 * P2WPKH_INPUT_VBYTES)
        + (num_outputs as u64 * OUTPUT_VBYTES);
    vsize.saturating_mul(fee_rate_sat_vbyte)
}

/// Build an unsigned P2WPKH payment from `sender` to `recipient`.
///
/// All `utxos` must be locked to `sender`. Outputs are `[recipient, change]`;
/// the change output is dropped and its value left to the fee when it would
/// fall below the dust threshold.
pub fn build_p2wpkh_transaction(
    utxos: &[SpendableOutput],
    sender: &str,
    recipient: &str,
    amount_sat: u64,
    change_address: &str,
    fee_rate_sat_vbyte: u64,
    network: BtcNetwork,
) -> Result<UnsignedBtcTx, BtcError> {
    let recipient_addr = parse_address(recipient, network)?;
    let change_addr = parse_address(change_address, network)?;
    let sender_addr = parse_address(sender, network)?;

    if amount_sat < DUST_THRESHOLD_SAT {
        return Err(BtcError::BelowDust(amount_sat));
    }

    let selection = select_utxos(utxos, amount_sat, fee_rate_sat_vbyte)?;
    let sender_script = sender_addr.script_pubkey();

    let mut inputs = Vec::with_capacity(selection.selected.len());
    let mut prevouts = Vec::with_capacity(selection.selected.len());
    let mut spent = Vec::with_capacity(selection.selected.len());

    for utxo in &selection.selected {
        let txid: Txid = utxo
            .txid
            .parse()
            .map_err(|e| BtcError::TransactionBuildError(format!("invalid txid {}: {e}", utxo.txid)))?;

        inputs.push(TxIn {
            previous_output: OutPoint::new(txid, utxo.vout),
            script_sig: ScriptBuf::new(),
            sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
            witness: Witness::default(),
        });
        prevouts.push(TxOut {
            value: Amount::from_sat(utxo.value_sat),
            script_pubkey: sender_script.clone(),
        });
        spent.push(utxo.outpoint_id());
    }

    let fee_2_outputs = estimate_fee(selection.selected.len(), 2, fee_rate_sat_vbyte);
    let change_sat = selection
        .total_sat
        .saturating_sub(amount_sat.saturating_add(fee_2_outputs));

    let mut outputs = vec![TxOut {
        value: Amount::from_sat(amount_sat),
        script_pubkey: recipient_addr.script_pubkey(),
    }];
    if change_sat >= DUST_THRESHOLD_SAT {
        outputs.push(TxOut {
            value: Amount::from_sat(change_sat),
            script_pubkey: change_addr.script_pubkey(),
        });
    }

    let output_total: u64 = outputs.iter().map(|o| o.value.to_sat()).sum();
    let fee_sat = selection.total_sat - output_total;

    let tx = Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: inputs,
        output: outputs,
    };

    Ok(UnsignedBtcTx {
        tx,
        prevouts,
        spent,
        fee_sat,
    })
}

/// Sign every input of `unsigned_tx` with one P2WPKH key.
///
/// Fails if any prevout is not locked to the key's P2WPKH script. ECDSA
/// nonces are RFC 6979, so signing is deterministic.
pub fn sign_transaction(
    unsigned_tx: &UnsignedBtcTx,
    private_key: &[u8; 32],
) -> Result<SignedBtcTx, BtcError> {
    let secp = Secp256k1::new();
    let mut key_bytes = *private_key;
    let secret_key = SecretKey::from_slice(&key_bytes)
        .map_err(|e| BtcError::InvalidPrivateKey(format!("invalid secret key: {e}")));
    key_bytes.zeroize();
    let secret_key = secret_key?;

    let public_key = bitcoin::secp256k1::PublicKey::from_secret_key(&secp, &secret_key);
    let compressed_pk = CompressedPublicKey(public_key);
    let own_script = ScriptBuf::new_p2wpkh(&compressed_pk.wpubkey_hash());

    if unsigned_tx.prevouts.len() != unsigned_tx.tx.input.len() {
        return Err(BtcError::SigningError(format!(
            "{} prevouts for {} inputs",
            unsigned_tx.prevouts.len(),
            unsigned_tx.tx.input.len()
        )));
    }

    let mut signed_tx = unsigned_tx.tx.clone();
    let mut sighash_cache = SighashCache::new(&unsigned_tx.tx);

    for (input_index, prevout) in unsigned_tx.prevouts.iter().enumerate() {
        if prevout.script_pubkey != own_script {
            return Err(BtcError::SigningError(format!(
                "input {input_index} is not controlled by this key"
            )));
        }

        let sighash = sighash_cache
            .p2wpkh_signature_hash(input_index, &own_script, prevout.value, EcdsaSighashType::All)
            .map_err(|e| BtcError::SigningError(format!("sighash computation failed: {e}")))?;

        let msg = Message::from_digest(sighash.to_byte_array());
        let signature = secp.sign_ecdsa(&msg, &secret_key);

        // DER signature followed by the sighash type byte.
        let mut sig_bytes = signature.serialize_der().to_vec();
        sig_bytes.push(EcdsaSighashType::All as u8);

        let mut witness = Witness::new();
        witness.push(&sig_bytes);
        witness.push(public_key.serialize());
        signed_tx.input[input_index].witness = witness;
    }

    Ok(SignedBtcTx {
        raw_tx: bitcoin::consensus::serialize(&signed_tx),
        txid: signed_tx.compute_txid().to_string(),
    })
}

/// Decode a serialized transaction for inspection.
pub fn decode_transaction(raw: &[u8], network: BtcNetwork) -> Result<DecodedBtcTx, BtcError> {
    let tx: Transaction = bitcoin::consensus::deserialize(raw)
        .map_err(|e| BtcError::DecodingError(e.to_string()))?;
    let net = network.to_bitcoin_network();

    let inputs = tx
        .input
        .iter()
        .map(|i| format!("{}:{}", i.previous_output.txid, i.previous_output.vout))
        .collect();

    let outputs = tx
        .output
        .iter()
        .map(|o| DecodedOutput {
            address: Address::from_script(&o.script_pubkey, net)
                .ok()
                .map(|a| a.to_string()),
            value_sat: o.value.to_sat(),
        })
        .collect();

    let sender = tx
        .input
        .first()
        .filter(|i| i.witness.len() == 2)
        .and_then(|i| i.witness.nth(1))
        .and_then(|pk| CompressedPublicKey::from_slice(pk).ok())
        .map(|pk| Address::p2wpkh(&pk, net).to_string());

    Ok(DecodedBtcTx {
        txid: tx.compute_txid().to_string(),
        inputs,
        outputs,
        sender,
    })
}
