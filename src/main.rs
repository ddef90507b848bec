//! Cypher wallet client
//!
//! ```text
//! cypher [--env dev] [--graph] [--amount 160]
//! ```
//!
//! `--graph` prints the transfer protocol as Graphviz DOT and exits.
//! Otherwise a self-contained transfer runs between two local wallets over
//! the in-process transport.

use std::sync::Arc;

use anyhow::Context;
use rust_decimal::Decimal;

use cypher_wallet::config::AppConfig;
use cypher_wallet::transfer::{
    JanitorConfig, Session, SessionJanitor, TransferEngine, TransitionTable, VaultWalletAdapter,
};
use cypher_wallet::transport::{OnionServiceClient, transport_channel};
use cypher_wallet::vault::InMemoryVault;
use cypher_wallet::wallet::{PUBLIC_KEY, WalletService};

const DEMO_FUNDING: [i64; 3] = [100, 50, 10];

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

fn get_amount() -> Option<Decimal> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--amount" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

fn use_graph_mode() -> bool {
    std::env::args().any(|a| a == "--graph")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if use_graph_mode() {
        print!("{}", TransitionTable::shared().to_dot());
        return Ok(());
    }

    let env = get_env();
    let app_config = AppConfig::load(&env).with_context(|| format!("loading {} config", env))?;
    let _log_guard = cypher_wallet::logging::init_logging(&app_config);

    tracing::info!(git_hash = env!("GIT_HASH"), "Starting cypher in {} mode", env);

    let vault = Arc::new(InMemoryVault::new());
    let wallet = Arc::new(WalletService::new(vault));

    let sender = wallet.create_wallet().await?;
    for (i, amount) in DEMO_FUNDING.into_iter().enumerate() {
        wallet
            .deposit(&sender, Decimal::from(amount), "genesis", &format!("genesis-{}", i))
            .await?;
    }

    let receiver = wallet.create_wallet().await?;
    let receiver_public_key = wallet
        .store_key(&receiver, PUBLIC_KEY)
        .await?
        .expose(str::to_string);

    let (mut transport, inbox) = transport_channel(
        app_config.transfer.channel_buffer,
        app_config.transfer.dispatch_timeout(),
    );
    let onion = OnionServiceClient::new(&app_config.onion);
    if onion.enabled() {
        tracing::info!(socks = %onion.socks_addr(), running = onion.is_tor_running(), "Onion routing enabled");
        transport = transport.with_onion(Arc::new(onion));
    }
    let peer = inbox.spawn_auto_ack();

    let engine = Arc::new(TransferEngine::new(
        Arc::new(VaultWalletAdapter::new(wallet.clone())),
        Arc::new(transport),
    )?);

    let janitor = SessionJanitor::new(
        engine.clone(),
        JanitorConfig::from(&app_config.transfer),
    );
    let janitor_handle = tokio::spawn(async move {
        janitor.run().await;
    });

    let amount = get_amount().unwrap_or_else(|| Decimal::from(160));
    let session = Session::new(amount, sender.clone(), receiver_public_key);
    let session_id = session.session_id;

    match engine.transfer(session).await {
        Ok(state) => {
            let balance = wallet.available_balance(&sender).await?;
            tracing::info!(%session_id, state = %state, %balance, "Transfer completed");
            println!("session {} -> {} (balance {})", session_id, state, balance);
        }
        Err(e) => {
            let state = engine.current_state(session_id).ok();
            tracing::error!(%session_id, state = ?state, code = e.code(), error = %e, "Transfer failed");
            println!("session {} failed: {}", session_id, e);
        }
    }

    janitor_handle.abort();
    let _ = janitor_handle.await;
    drop(engine);
    let delivered = peer.await?;
    tracing::info!(delivered, "Peer inbox closed");

    Ok(())
}
