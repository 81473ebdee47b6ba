//! In-memory chain client shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use wallet_core::{
    Amount, ChainClient, ChainClients, ClientError, FeeEstimate, SpendableOutput,
    StaticSeedProvider, WalletConfig, WalletSession,
};

pub const TEST_MNEMONIC: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

pub const GWEI: u128 = 1_000_000_000;
pub const ETHER: u128 = chain_eth::chains::WEI_PER_ETH;
pub const BTC: u64 = 100_000_000;

#[derive(Debug, Clone)]
pub enum BroadcastMode {
    Accept,
    Reject(&'static str),
    Transport(&'static str),
    /// Never answers.
    Hang,
}

pub struct MockClient {
    fee: FeeEstimate,
    fail_fee: bool,
    balance: Option<Amount>,
    sequence: u64,
    outputs: Vec<SpendableOutput>,
    mode: Mutex<BroadcastMode>,
    id_fn: fn(&[u8]) -> String,
    calls: AtomicUsize,
    broadcasts: Mutex<Vec<Vec<u8>>>,
}

impl MockClient {
    /// EVM node quoting 20 gwei legacy pricing, reporting `sequence` as the
    /// account nonce regardless of pending transactions.
    pub fn evm(sequence: u64) -> Self {
        Self::new(FeeEstimate::Legacy {
            gas_limit: chain_eth::chains::TRANSFER_GAS,
            gas_price: 20 * GWEI,
        })
        .with_sequence(sequence)
        .with_id_fn(eth_tx_hash)
    }

    /// Bitcoin testnet backend at 1 sat/vbyte.
    pub fn utxo(outputs: Vec<SpendableOutput>) -> Self {
        let mut client = Self::new(FeeEstimate::FeeRate { sat_per_vbyte: 1 }).with_id_fn(btc_txid);
        client.outputs = outputs;
        client
    }

    fn new(fee: FeeEstimate) -> Self {
        Self {
            fee,
            fail_fee: false,
            balance: None,
            sequence: 0,
            outputs: Vec::new(),
            mode: Mutex::new(BroadcastMode::Accept),
            id_fn: |_| "unknown".to_string(),
            calls: AtomicUsize::new(0),
            broadcasts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_fee(mut self, fee: FeeEstimate) -> Self {
        self.fee = fee;
        self
    }

    pub fn with_balance(mut self, balance: Amount) -> Self {
        self.balance = Some(balance);
        self
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn with_id_fn(mut self, id_fn: fn(&[u8]) -> String) -> Self {
        self.id_fn = id_fn;
        self
    }

    pub fn failing_fee(mut self) -> Self {
        self.fail_fee = true;
        self
    }

    pub fn set_mode(&self, mode: BroadcastMode) {
        *self.mode.lock().unwrap() = mode;
    }

    /// Number of client calls of any kind.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Raw transactions received by `broadcast_raw`, in arrival order.
    pub fn broadcasts(&self) -> Vec<Vec<u8>> {
        self.broadcasts.lock().unwrap().clone()
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChainClient for MockClient {
    async fn estimate_fee(
        &self,
        _from: &str,
        _to: &str,
        _amount: Amount,
    ) -> Result<FeeEstimate, ClientError> {
        self.hit();
        if self.fail_fee {
            return Err(ClientError::Transport("connection refused".into()));
        }
        Ok(self.fee)
    }

    async fn get_balance(&self, _address: &str) -> Result<Amount, ClientError> {
        self.hit();
        self.balance.ok_or(ClientError::Unsupported("get_balance"))
    }

    async fn get_sequence_counter(&self, _address: &str) -> Result<u64, ClientError> {
        self.hit();
        tokio::task::yield_now().await;
        Ok(self.sequence)
    }

    async fn get_spendable_outputs(
        &self,
        _address: &str,
    ) -> Result<Vec<SpendableOutput>, ClientError> {
        self.hit();
        Ok(self.outputs.clone())
    }

    async fn broadcast_raw(&self, raw_tx: &[u8]) -> Result<String, ClientError> {
        self.hit();
        self.broadcasts.lock().unwrap().push(raw_tx.to_vec());
        let mode = self.mode.lock().unwrap().clone();
        match mode {
            BroadcastMode::Accept => Ok((self.id_fn)(raw_tx)),
            BroadcastMode::Reject(reason) => Err(ClientError::Rejected(reason.into())),
            BroadcastMode::Transport(reason) => Err(ClientError::Transport(reason.into())),
            BroadcastMode::Hang => std::future::pending().await,
        }
    }
}

pub fn eth_tx_hash(raw: &[u8]) -> String {
    chain_eth::transaction::decode_signed_transaction(raw)
        .unwrap()
        .tx_hash
}

pub fn btc_txid(raw: &[u8]) -> String {
    chain_btc::transaction::decode_transaction(raw, chain_btc::network::BtcNetwork::Testnet)
        .unwrap()
        .txid
}

pub fn eth_nonce(raw: &[u8]) -> u64 {
    chain_eth::transaction::decode_signed_transaction(raw)
        .unwrap()
        .tx
        .nonce
}

pub fn output(tag: u8, vout: u32, value_sat: u64) -> SpendableOutput {
    SpendableOutput {
        txid: format!("{tag:02x}").repeat(32),
        vout,
        value_sat,
    }
}

pub fn session(clients: ChainClients) -> WalletSession {
    let config = WalletConfig {
        broadcast_timeout_secs: 5,
        ..WalletConfig::default()
    };
    WalletSession::from_config(&config, &StaticSeedProvider::new(TEST_MNEMONIC, ""), clients)
        .unwrap()
}
