//! Peer transport: fire-and-forget POSTs of encoded chains and transactions,
//! plus the one-off pull from a root node at startup.

use anyhow::Result;
use ledger_core::{codec, Node};
use reqwest::header::CONTENT_TYPE;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const CHAIN_PATH: &str = "/gossip/chain";
pub const TRANSACTION_PATH: &str = "/gossip/transaction";

#[derive(Clone, Debug, Default)]
pub struct Gossip {
    client: reqwest::Client,
    peers: Arc<Vec<String>>,
}

impl Gossip {
    pub fn new(peers: Vec<String>) -> Self {
        let peers = peers
            .into_iter()
            .map(|peer| peer.trim_end_matches('/').to_owned())
            .collect();
        Self {
            client: reqwest::Client::new(),
            peers: Arc::new(peers),
        }
    }

    pub fn peers(&self) -> &[String] {
        &self.peers
    }

    pub fn broadcast_chain(&self, payload: Vec<u8>) {
        self.broadcast(CHAIN_PATH, payload);
    }

    pub fn broadcast_transaction(&self, payload: Vec<u8>) {
        self.broadcast(TRANSACTION_PATH, payload);
    }

    /// Each peer gets its own task; a slow or dead peer holds nobody up.
    fn broadcast(&self, path: &'static str, payload: Vec<u8>) {
        for peer in self.peers.iter() {
            let url = format!("{peer}{path}");
            let client = self.client.clone();
            let body = payload.clone();
            tokio::spawn(async move {
                let sent = client
                    .post(&url)
                    .header(CONTENT_TYPE, "application/json")
                    .body(body)
                    .send()
                    .await;
                match sent {
                    Ok(res) if res.status().is_success() => debug!("gossiped to {url}"),
                    Ok(res) => warn!("{url} answered {}", res.status()),
                    Err(err) => warn!("gossip to {url} failed: {err}"),
                }
            });
        }
    }

    /// Adopt the root node's chain and pool. The chain is taken without
    /// transaction checks since a fresh node has no history to check against.
    pub async fn sync_with_root(&self, root: &str, node: &Mutex<Node>) -> Result<()> {
        let root = root.trim_end_matches('/');
        let chain = self
            .client
            .get(format!("{root}/api/blocks"))
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        let pool = self
            .client
            .get(format!("{root}/api/transaction-pool-map"))
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        let pool_map = codec::decode_pool_map(&pool)?;

        let mut node = node.lock().await;
        if node.sync_chain(&chain)?.is_replaced() {
            info!("synced chain of length {} from {root}", node.blockchain().len());
        }
        node.sync_pool(pool_map);
        Ok(())
    }
}
