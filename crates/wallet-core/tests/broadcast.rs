mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use common::{btc_txid, eth_nonce, eth_tx_hash, output, session, BroadcastMode, MockClient, BTC};
use wallet_core::{BuildOptions, ChainClients, ChainId, ErrorKind, SendOptions, WalletError};

const DEAD: &str = "0x000000000000000000000000000000000000dEaD";

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sends_get_distinct_increasing_nonces() {
    let client = Arc::new(MockClient::evm(5));
    let session = Arc::new(session(ChainClients::new().with(ChainId::Eth, client.clone())));
    let account = Arc::new(session.account(ChainId::Eth, 0).unwrap());

    let handles: Vec<_> = (0..8u128)
        .map(|i| {
            let session = Arc::clone(&session);
            let account = Arc::clone(&account);
            tokio::spawn(async move {
                session
                    .dispatcher()
                    .send(ChainId::Eth, &account, DEAD, 1_000 + i)
                    .await
            })
        })
        .collect();

    let mut tx_ids = HashSet::new();
    for handle in handles {
        let receipt = handle.await.unwrap().unwrap();
        assert!(tx_ids.insert(receipt.tx_id));
    }

    let nonces: Vec<u64> = client.broadcasts().iter().map(|raw| eth_nonce(raw)).collect();
    assert_eq!(nonces, (5..13).collect::<Vec<_>>());
}

#[tokio::test]
async fn identical_sends_are_distinct_transactions() {
    let client = Arc::new(MockClient::evm(0));
    let session = session(ChainClients::new().with(ChainId::Eth, client.clone()));
    let account = session.account(ChainId::Eth, 0).unwrap();

    let a = session.dispatcher().send(ChainId::Eth, &account, DEAD, 7).await.unwrap();
    let b = session.dispatcher().send(ChainId::Eth, &account, DEAD, 7).await.unwrap();
    assert_ne!(a.tx_id, b.tx_id);
    assert_eq!(client.broadcasts().len(), 2);
}

#[tokio::test]
async fn receipt_carries_the_client_id() {
    let client = Arc::new(MockClient::evm(2));
    let session = session(ChainClients::new().with(ChainId::Eth, client.clone()));
    let account = session.account(ChainId::Eth, 0).unwrap();

    let receipt = session
        .sign_and_broadcast(ChainId::Eth, &account, DEAD, 1, &SendOptions::default())
        .await
        .unwrap();
    assert_eq!(receipt.chain, ChainId::Eth);
    assert_eq!(receipt.tx_id, eth_tx_hash(&client.broadcasts()[0]));
}

#[tokio::test]
async fn timeout_is_indeterminate_and_keeps_the_nonce() {
    let client = Arc::new(MockClient::evm(0));
    client.set_mode(BroadcastMode::Hang);
    let session = session(ChainClients::new().with(ChainId::Eth, client.clone()));
    let account = session.account(ChainId::Eth, 0).unwrap();

    let options = SendOptions {
        timeout: Some(Duration::from_millis(50)),
        ..SendOptions::default()
    };
    let err = session
        .sign_and_broadcast(ChainId::Eth, &account, DEAD, 1, &options)
        .await
        .unwrap_err();

    let sent = client.broadcasts();
    match &err {
        WalletError::Indeterminate { chain, tx_id, .. } => {
            assert_eq!(*chain, ChainId::Eth);
            assert_eq!(*tx_id, eth_tx_hash(&sent[0]));
        }
        other => panic!("expected Indeterminate, got {other:?}"),
    }
    assert!(!err.is_retry_safe());

    // the first transaction may still land, so its nonce is not reused
    client.set_mode(BroadcastMode::Accept);
    session.dispatcher().send(ChainId::Eth, &account, DEAD, 1).await.unwrap();
    assert_eq!(eth_nonce(&client.broadcasts()[1]), 1);
}

#[tokio::test]
async fn unlanded_utxo_send_returns_its_inputs() {
    let client = Arc::new(MockClient::utxo(vec![output(0x0c, 1, BTC / 10)]));
    client.set_mode(BroadcastMode::Hang);
    let session = session(ChainClients::new().with(ChainId::BtcTestnet, client.clone()));
    let sender = session.account(ChainId::BtcTestnet, 0).unwrap();
    let recipient = session.account(ChainId::BtcTestnet, 1).unwrap();
    let options = SendOptions {
        timeout: Some(Duration::from_millis(50)),
        ..SendOptions::default()
    };

    let err = session
        .sign_and_broadcast(ChainId::BtcTestnet, &sender, recipient.address(), 1_000_000, &options)
        .await
        .unwrap_err();
    let reservation = err.reservation().cloned().unwrap();
    assert_eq!(reservation.sender, sender.address());
    assert_eq!(reservation.outputs, vec![format!("{}:1", "0c".repeat(32))]);

    client.set_mode(BroadcastMode::Accept);
    let held = session
        .dispatcher()
        .send(ChainId::BtcTestnet, &sender, recipient.address(), 1_000_000)
        .await
        .unwrap_err();
    assert_eq!(held.kind(), ErrorKind::InsufficientFunds);

    session.resolve(&reservation, false).await;
    session
        .dispatcher()
        .send(ChainId::BtcTestnet, &sender, recipient.address(), 1_000_000)
        .await
        .unwrap();
    let sent = client.broadcasts();
    assert_eq!(sent.len(), 2);
    let decoded =
        chain_btc::transaction::decode_transaction(&sent[1], chain_btc::network::BtcNetwork::Testnet)
            .unwrap();
    assert_eq!(decoded.inputs, reservation.outputs);
}

#[tokio::test]
async fn unlanded_nonce_is_refilled_before_new_ones() {
    let client = Arc::new(MockClient::evm(0));
    client.set_mode(BroadcastMode::Transport("connection reset"));
    let session = session(ChainClients::new().with(ChainId::Eth, client.clone()));
    let account = session.account(ChainId::Eth, 0).unwrap();

    let err = session.dispatcher().send(ChainId::Eth, &account, DEAD, 1).await.unwrap_err();
    let reservation = err.reservation().cloned().unwrap();
    assert_eq!(reservation.nonce, Some(0));

    client.set_mode(BroadcastMode::Accept);
    for _ in 0..2 {
        session.dispatcher().send(ChainId::Eth, &account, DEAD, 1).await.unwrap();
    }

    session.resolve(&reservation, false).await;
    for _ in 0..2 {
        session.dispatcher().send(ChainId::Eth, &account, DEAD, 1).await.unwrap();
    }

    let nonces: Vec<u64> = client.broadcasts().iter().map(|raw| eth_nonce(raw)).collect();
    assert_eq!(nonces, vec![0, 1, 2, 0, 3]);
}

#[tokio::test]
async fn landed_send_keeps_its_nonce() {
    let client = Arc::new(MockClient::evm(0));
    client.set_mode(BroadcastMode::Transport("connection reset"));
    let session = session(ChainClients::new().with(ChainId::Eth, client.clone()));
    let account = session.account(ChainId::Eth, 0).unwrap();

    let err = session.dispatcher().send(ChainId::Eth, &account, DEAD, 1).await.unwrap_err();
    session.resolve(err.reservation().unwrap(), true).await;

    client.set_mode(BroadcastMode::Accept);
    session.dispatcher().send(ChainId::Eth, &account, DEAD, 1).await.unwrap();
    assert_eq!(eth_nonce(&client.broadcasts()[1]), 1);
}

#[tokio::test]
async fn separate_broadcast_carries_no_reservation() {
    let client = Arc::new(MockClient::evm(0));
    let session = session(ChainClients::new().with(ChainId::Eth, client.clone()));
    let account = session.account(ChainId::Eth, 0).unwrap();

    let unsigned = session
        .build_transaction(ChainId::Eth, &account, DEAD, 5, &BuildOptions::default())
        .await
        .unwrap();
    let signed = account.sign(&unsigned).unwrap();
    client.set_mode(BroadcastMode::Transport("connection reset"));
    let err = session.dispatcher().broadcast(&signed, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Indeterminate);
    assert!(err.reservation().is_none());
}

#[tokio::test]
async fn transport_failure_is_indeterminate() {
    let client = Arc::new(MockClient::evm(0));
    client.set_mode(BroadcastMode::Transport("connection reset"));
    let session = session(ChainClients::new().with(ChainId::Eth, client.clone()));
    let account = session.account(ChainId::Eth, 0).unwrap();

    let err = session.dispatcher().send(ChainId::Eth, &account, DEAD, 1).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Indeterminate);
    assert!(err.to_string().contains("connection reset"));
}

#[tokio::test]
async fn rejection_keeps_reason_and_frees_the_nonce() {
    let client = Arc::new(MockClient::evm(3));
    client.set_mode(BroadcastMode::Reject("replacement transaction underpriced"));
    let session = session(ChainClients::new().with(ChainId::Eth, client.clone()));
    let account = session.account(ChainId::Eth, 0).unwrap();

    let err = session.dispatcher().send(ChainId::Eth, &account, DEAD, 1).await.unwrap_err();
    match &err {
        WalletError::Broadcast { chain, reason } => {
            assert_eq!(*chain, ChainId::Eth);
            assert_eq!(reason, "replacement transaction underpriced");
        }
        other => panic!("expected Broadcast, got {other:?}"),
    }
    assert!(!err.is_retry_safe());

    client.set_mode(BroadcastMode::Accept);
    session.dispatcher().send(ChainId::Eth, &account, DEAD, 1).await.unwrap();
    let nonces: Vec<u64> = client.broadcasts().iter().map(|raw| eth_nonce(raw)).collect();
    assert_eq!(nonces, vec![3, 3]);
}

#[tokio::test]
async fn sequential_utxo_sends_spend_different_inputs() {
    let client = Arc::new(MockClient::utxo(vec![
        output(0x0a, 0, BTC / 4),
        output(0x0b, 3, BTC / 5),
    ]));
    let session = session(ChainClients::new().with(ChainId::BtcTestnet, client.clone()));
    let sender = session.account(ChainId::BtcTestnet, 0).unwrap();
    let recipient = session.account(ChainId::BtcTestnet, 1).unwrap();

    for _ in 0..2 {
        session
            .dispatcher()
            .send(ChainId::BtcTestnet, &sender, recipient.address(), 20_000)
            .await
            .unwrap();
    }

    let sent = client.broadcasts();
    let inputs: Vec<Vec<String>> = sent
        .iter()
        .map(|raw| {
            chain_btc::transaction::decode_transaction(raw, chain_btc::network::BtcNetwork::Testnet)
                .unwrap()
                .inputs
        })
        .collect();
    assert_eq!(inputs[0], vec![format!("{}:0", "0a".repeat(32))]);
    assert_eq!(inputs[1], vec![format!("{}:3", "0b".repeat(32))]);
    assert_ne!(btc_txid(&sent[0]), btc_txid(&sent[1]));

    // both outputs are in flight until the client stops reporting them
    let err = session
        .dispatcher()
        .send(ChainId::BtcTestnet, &sender, recipient.address(), 20_000)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
}

#[tokio::test]
async fn separately_signed_transaction_can_be_broadcast() {
    let client = Arc::new(MockClient::evm(0));
    let session = session(ChainClients::new().with(ChainId::Eth, client.clone()));
    let account = session.account(ChainId::Eth, 0).unwrap();

    let unsigned = session
        .build_transaction(ChainId::Eth, &account, DEAD, 5, &BuildOptions::default())
        .await
        .unwrap();
    let signed = account.sign(&unsigned).unwrap();
    let receipt = session.dispatcher().broadcast(&signed, None).await.unwrap();
    assert_eq!(receipt.tx_id, signed.tx_id);
    assert_eq!(client.broadcasts(), vec![signed.raw.clone()]);
}

#[tokio::test]
async fn senders_progress_independently() {
    let client = Arc::new(MockClient::evm(0));
    let session = session(ChainClients::new().with(ChainId::Eth, client.clone()));
    let alice = session.account(ChainId::Eth, 0).unwrap();
    let bob = session.account(ChainId::Eth, 1).unwrap();

    let sends = (0..3).flat_map(|_| [&alice, &bob]).map(|account| {
        session.dispatcher().send(ChainId::Eth, account, DEAD, 1)
    });
    let results = futures::future::join_all(sends).await;
    assert!(results.iter().all(Result::is_ok));

    let mut by_sender: Vec<(String, u64)> = client
        .broadcasts()
        .iter()
        .map(|raw| {
            let decoded = chain_eth::transaction::decode_signed_transaction(raw).unwrap();
            (decoded.from.to_checksum(None), decoded.tx.nonce)
        })
        .collect();
    by_sender.sort();
    let mut expected: Vec<(String, u64)> = [alice.address(), bob.address()]
        .iter()
        .flat_map(|a| (0..3).map(move |n| (a.to_string(), n)))
        .collect();
    expected.sort();
    assert_eq!(by_sender, expected);
}
