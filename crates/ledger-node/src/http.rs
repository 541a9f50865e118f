//! Read-only operator status API.

use crate::ledger::Ledger;
use axum::{extract::State, routing::get, Json, Router};
use ledger_core::{chain::tip_hash, cumulative_difficulty, Block, Transaction};
use serde::Serialize;
use std::{io, net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct Head {
    pub height: u64,
    pub tip_hash: String,
    pub cumulative_difficulty: u128,
}

pub fn router(ledger: Arc<Ledger>) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(Health { status: "ok" }) }))
        .route("/chain/head", get(head))
        .route("/chain", get(chain))
        .route("/mempool", get(mempool))
        .layer(TraceLayer::new_for_http())
        .with_state(ledger)
}

async fn head(State(ledger): State<Arc<Ledger>>) -> Json<Head> {
    let chain = ledger.snapshot().await;
    Json(Head {
        height: chain.len().saturating_sub(1) as u64,
        tip_hash: tip_hash(&chain).to_string(),
        cumulative_difficulty: cumulative_difficulty(&chain),
    })
}

async fn chain(State(ledger): State<Arc<Ledger>>) -> Json<Vec<Block>> {
    Json(ledger.snapshot().await)
}

async fn mempool(State(ledger): State<Arc<Ledger>>) -> Json<Vec<Transaction>> {
    Json(ledger.transactions().await)
}

pub async fn serve(listener: TcpListener, ledger: Arc<Ledger>) -> io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("status api listening on http://{addr}");
    }
    axum::serve(listener, router(ledger)).await
}

pub async fn bind(addr: SocketAddr) -> io::Result<TcpListener> {
    TcpListener::bind(addr).await
}
