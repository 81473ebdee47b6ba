use crate::error::BtcError;
use crate::transaction::estimate_fee;

/// An unspent output owned by the sending address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SpendableOutput {
    /// Transaction ID as a hex string (display order).
    pub txid: String,
    /// Output index within the transaction.
    pub vout: u32,
    /// Value in satoshis.
    pub value_sat: u64,
}

impl SpendableOutput {
    /// `txid:vout`, the identifier used to track reservations.
    pub fn outpoint_id(&self) -> String {
        format!("{}:{}", self.txid, self.vout)
    }
}

/// Result of coin selection.
#[derive(Debug, Clone)]
pub struct UtxoSelection {
    pub selected: Vec<SpendableOutput>,
    /// Total value of `selected` in satoshis.
    pub total_sat: u64,
}

/// Select outputs covering `target_sat` plus the fee of a two-output
/// (recipient + change) transaction.
///
/// Largest-first: outputs are taken in descending value order until the
/// running total covers the target and the fee for the inputs taken so far.
/// Ties keep the order the client reported them in.
pub fn select_utxos(
    utxos: &[SpendableOutput],
    target_sat: u64,
    fee_rate_sat_vbyte: u64,
) -> Result<UtxoSelection, BtcError> {
    let mut sorted: Vec<&SpendableOutput> = utxos.iter().collect();
    sorted.sort_by(|a, b| b.value_sat.cmp(&a.value_sat));

    let mut selected = Vec::new();
    let mut total_sat: u64 = 0;
    let mut needed = target_sat.saturating_add(estimate_fee(1, 2, fee_rate_sat_vbyte));

    for utxo in sorted {
        selected.push(utxo.clone());
        total_sat = total_sat.saturating_add(utxo.value_sat);

        needed = target_sat.saturating_add(estimate_fee(selected.len(), 2, fee_rate_sat_vbyte));
        if total_sat >= needed {
            return Ok(UtxoSelection { selected, total_sat });
        }
    }

    Err(BtcError::InsufficientFunds {
        needed,
        available: total_sat,
    })
}
