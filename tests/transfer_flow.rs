use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;

use cypher_wallet::transfer::{ProtocolState, Session, TransferEngine, Trigger, VaultWalletAdapter};
use cypher_wallet::transport::transport_channel;
use cypher_wallet::vault::{InMemoryVault, VaultAuth};
use cypher_wallet::wallet::{
    TransactionKind, TransactionRecord, WalletService, calculate_change,
};

/// Helper to create a Send record
fn sent(amount: i64, version: u64) -> TransactionRecord {
    TransactionRecord::new(
        Decimal::from(amount),
        TransactionKind::Send,
        version,
        "s",
        format!("h{}", version),
    )
}

async fn funded_wallet(amounts: &[i64]) -> (Arc<WalletService>, VaultAuth) {
    let wallet = Arc::new(WalletService::new(Arc::new(InMemoryVault::new())));
    let auth = wallet.create_wallet().await.unwrap();
    for (i, amount) in amounts.iter().enumerate() {
        let record = TransactionRecord::new(
            Decimal::from(*amount),
            TransactionKind::Receive,
            i as u64 + 1,
            "mint",
            format!("mint-{}", i),
        );
        wallet.add_transaction(&auth, record).await.unwrap();
    }
    (wallet, auth)
}

#[test]
fn change_covers_exact_amount() {
    // Setup: -100, -50, -10 given out of version order
    let records = vec![sent(-10, 3), sent(-100, 1), sent(-50, 2)];

    let change = calculate_change(Decimal::from(160), &records);

    let amounts: Vec<_> = change.transactions.iter().map(|r| r.amount).collect();
    assert_eq!(
        amounts,
        vec![Decimal::from(-100), Decimal::from(-50), Decimal::from(-10)]
    );
    assert_eq!(change.residual, Decimal::ZERO);
    assert!(change.is_exact());
}

#[test]
fn change_degenerate_inputs() {
    let empty = calculate_change(Decimal::from(50), &[]);
    assert!(empty.transactions.is_empty());
    assert!(empty.closest.is_none());
    assert_eq!(empty.residual, Decimal::from(50));

    let zero = calculate_change(Decimal::ZERO, &[sent(-100, 1)]);
    assert!(zero.transactions.is_empty());
    assert_eq!(zero.residual, Decimal::ZERO);
}

#[tokio::test]
async fn transfer_runs_to_completion_and_reverifies() {
    let (wallet, sender) = funded_wallet(&[100, 50, 10]).await;
    let (transport, inbox) = transport_channel(8, Duration::from_secs(5));
    let _peer = inbox.spawn_auto_ack();

    let engine = TransferEngine::new(
        Arc::new(VaultWalletAdapter::new(wallet.clone())),
        Arc::new(transport),
    )
    .unwrap();

    let receiver = cypher_wallet::crypto::key_pair().public_key;
    let session = Session::new(Decimal::from(150), sender.clone(), receiver);
    let id = engine.open_session(session.clone()).unwrap();
    assert_eq!(engine.current_state(id).unwrap(), ProtocolState::New);

    assert_eq!(
        engine.transfer(session.clone()).await.unwrap(),
        ProtocolState::Completed
    );
    assert_eq!(
        wallet.available_balance(&sender).await.unwrap(),
        Decimal::from(10)
    );

    assert_eq!(
        engine.fire(id, Trigger::Verify).await.unwrap(),
        ProtocolState::Audited
    );
    assert_eq!(
        engine.transfer(session).await.unwrap(),
        ProtocolState::Completed
    );
    // Still one burn for the session
    assert_eq!(
        wallet.available_balance(&sender).await.unwrap(),
        Decimal::from(10)
    );
}

#[test]
fn graph_lists_every_state() {
    let dot = cypher_wallet::transfer::TransitionTable::shared().to_dot();
    for state in ProtocolState::ALL {
        assert!(dot.contains(&format!("\"{}\"", state)), "missing {}", state);
    }
}
