mod api;
mod gossip;

use clap::Parser;
use ledger_core::Node;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn, Level};

use crate::{api::AppState, gossip::Gossip};

#[derive(Parser, Debug)]
#[command(name = "ledger-node")]
#[command(about = "Proof-of-work ledger node")]
struct Args {
    /// Address to listen on, e.g. 127.0.0.1:3000
    #[arg(long, default_value = "127.0.0.1:3000")]
    listen: String,

    /// Peer base URL to gossip chains and transactions to (repeatable)
    #[arg(long = "peer")]
    peers: Vec<String>,

    /// Root node to pull the chain and pool from at startup
    #[arg(long)]
    root: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let node = Node::new();
    info!("wallet address {}", node.wallet().address());

    let gossip = Gossip::new(args.peers);
    let state = AppState::new(node, gossip);

    if let Some(root) = &args.root {
        if let Err(err) = state.gossip().sync_with_root(root, state.node()).await {
            warn!("could not sync with root {root}: {err:#}");
        }
    }
    info!("gossiping to {} peer(s)", state.gossip().peers().len());

    let app = api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = args.listen.parse()?;
    info!("ledger-node listening on http://{addr}");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("could not listen for ctrl-c: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
