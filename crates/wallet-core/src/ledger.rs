//! Per-sender serialization of nonce and input allocation.
//!
//! Fetching a nonce or a set of spendable outputs and then using it is a
//! read-then-write against chain state. Every build and send for a sender
//! runs while holding that sender's lock, and what it hands out is recorded
//! here until the transaction is either broadcast or abandoned. A broadcast
//! with an unknown outcome keeps its [`Reservation`] until the caller learns
//! whether it landed.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::client::SpendableOutput;
use crate::transaction::UnsignedTransaction;
use crate::types::ChainId;

/// What one built transaction holds in its sender's ledger entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub chain: ChainId,
    pub sender: String,
    /// Account-model nonce.
    pub nonce: Option<u64>,
    /// `txid:vout` of every input on UTXO chains.
    pub outputs: Vec<String>,
}

impl From<&UnsignedTransaction> for Reservation {
    fn from(unsigned: &UnsignedTransaction) -> Self {
        Self {
            chain: unsigned.chain,
            sender: unsigned.sender.clone(),
            nonce: unsigned.nonce(),
            outputs: unsigned.spent_outputs().to_vec(),
        }
    }
}

/// Allocation state for one (chain, address) pair.
#[derive(Debug, Default)]
pub struct SenderState {
    next_nonce: Option<u64>,
    /// Released nonces below `next_nonce`, handed out again before it.
    nonce_gaps: BTreeSet<u64>,
    reserved_outputs: HashSet<String>,
}

impl SenderState {
    /// Nonce for the next transaction: the lowest released gap the chain has
    /// not passed, otherwise the chain's counter or one past the last nonce
    /// handed out locally, whichever is higher.
    pub fn next_nonce(&mut self, chain_counter: u64) -> u64 {
        self.nonce_gaps = self.nonce_gaps.split_off(&chain_counter);
        match self.nonce_gaps.first() {
            Some(&gap) => gap,
            None => chain_counter.max(self.next_nonce.unwrap_or(0)),
        }
    }

    pub fn reserve_nonce(&mut self, nonce: u64) {
        self.nonce_gaps.remove(&nonce);
        let next = nonce.saturating_add(1);
        if self.next_nonce.map_or(true, |current| next > current) {
            self.next_nonce = Some(next);
        }
    }

    /// Give `nonce` back. The most recent nonce rewinds the counter; an
    /// older one becomes a gap that the next allocation fills first.
    pub fn release_nonce(&mut self, nonce: u64) {
        let Some(next) = self.next_nonce else {
            return;
        };
        if nonce >= next {
            return;
        }
        self.nonce_gaps.insert(nonce);
        // collapse gaps that now sit at the top
        let mut top = next;
        while top > 0 && self.nonce_gaps.remove(&(top - 1)) {
            top -= 1;
        }
        self.next_nonce = Some(top);
    }

    /// Drop reservations the client no longer reports (spent or reorged
    /// away), then return the outputs nobody has reserved.
    pub fn unreserved_outputs(&mut self, outputs: Vec<SpendableOutput>) -> Vec<SpendableOutput> {
        let reported: HashSet<String> = outputs.iter().map(SpendableOutput::outpoint_id).collect();
        self.reserved_outputs.retain(|id| reported.contains(id));

        outputs
            .into_iter()
            .filter(|o| !self.reserved_outputs.contains(&o.outpoint_id()))
            .collect()
    }

    pub fn reserve_outputs(&mut self, ids: &[String]) {
        self.reserved_outputs.extend(ids.iter().cloned());
    }

    pub fn release_outputs(&mut self, ids: &[String]) {
        for id in ids {
            self.reserved_outputs.remove(id);
        }
    }

    pub fn is_reserved(&self, outpoint_id: &str) -> bool {
        self.reserved_outputs.contains(outpoint_id)
    }

    /// Record what a built transaction consumes.
    pub fn reserve(&mut self, reservation: &Reservation) {
        if let Some(nonce) = reservation.nonce {
            self.reserve_nonce(nonce);
        }
        self.reserve_outputs(&reservation.outputs);
    }

    /// Undo [`SenderState::reserve`] for a transaction that will not be
    /// sent, or that was sent and is known not to have landed.
    pub fn release(&mut self, reservation: &Reservation) {
        if let Some(nonce) = reservation.nonce {
            self.release_nonce(nonce);
        }
        self.release_outputs(&reservation.outputs);
    }

    /// Nothing reserved and no local nonce lead over the chain.
    pub fn is_idle(&self) -> bool {
        self.next_nonce.is_none() && self.reserved_outputs.is_empty()
    }
}

/// Exclusive access to one sender's state.
pub type SenderGuard = OwnedMutexGuard<SenderState>;

#[derive(Debug, Default)]
pub struct SenderLedger {
    senders: DashMap<(ChainId, String), Arc<Mutex<SenderState>>>,
}

impl SenderLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for and take the lock for `address` on `chain`.
    ///
    /// Different senders never contend.
    pub async fn lock(&self, chain: ChainId, address: &str) -> SenderGuard {
        let cell = Arc::clone(
            &self
                .senders
                .entry((chain, address.to_string()))
                .or_default(),
        );
        cell.lock_owned().await
    }

    /// Number of (chain, address) entries. Grows by one per distinct sender
    /// and shrinks only through [`SenderLedger::prune_idle`].
    pub fn tracked_senders(&self) -> usize {
        self.senders.len()
    }

    /// Drop entries nobody holds that carry no reservation and no nonce
    /// lead. Returns how many were removed.
    pub fn prune_idle(&self) -> usize {
        let before = self.senders.len();
        self.senders.retain(|_, cell| {
            Arc::strong_count(cell) > 1 || !cell.try_lock().map_or(false, |state| state.is_idle())
        });
        before - self.senders.len()
    }
}
