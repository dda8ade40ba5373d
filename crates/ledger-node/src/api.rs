use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ledger_core::{
    codec, Block, BlockPayload, CancelToken, CodecError, Miner, Node, Transaction,
    TransactionError, WalletInfo,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::gossip::{Gossip, CHAIN_PATH, TRANSACTION_PATH};

#[derive(Clone)]
pub struct AppState {
    node: Arc<Mutex<Node>>,
    gossip: Gossip,
    /// Held for the whole of a mining run so only one search is in flight.
    mining: Arc<Mutex<()>>,
    active_mine: Arc<Mutex<Option<CancelToken>>>,
}

impl AppState {
    pub fn new(node: Node, gossip: Gossip) -> Self {
        Self {
            node: Arc::new(Mutex::new(node)),
            gossip,
            mining: Arc::new(Mutex::new(())),
            active_mine: Arc::new(Mutex::new(None)),
        }
    }

    pub fn node(&self) -> &Mutex<Node> {
        &self.node
    }

    pub fn gossip(&self) -> &Gossip {
        &self.gossip
    }

    async fn cancel_active_mine(&self) {
        if let Some(token) = self.active_mine.lock().await.take() {
            info!("chain replaced, abandoning in-flight mining");
            token.cancel();
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/blocks", get(blocks))
        .route("/api/blocks/length", get(blocks_length))
        .route("/api/blocks/{page}", get(blocks_page))
        .route("/api/mine", post(mine))
        .route("/api/mine-transactions", get(mine_transactions))
        .route("/api/transact", post(transact))
        .route("/api/transaction-pool-map", get(transaction_pool_map))
        .route("/api/wallet-info", get(wallet_info))
        .route("/api/wallet-info/{address}", get(wallet_info_for))
        .route("/api/known-addresses", get(known_addresses))
        .route(CHAIN_PATH, post(receive_chain))
        .route(TRANSACTION_PATH, post(receive_transaction))
        .with_state(state)
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<TransactionError> for ApiError {
    fn from(err: TransactionError) -> Self {
        Self::new(StatusCode::BAD_REQUEST, err.to_string())
    }
}

impl From<CodecError> for ApiError {
    fn from(err: CodecError) -> Self {
        Self::new(StatusCode::BAD_REQUEST, err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    message: &'a str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            kind: "error",
            message: self.message(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Health {
    pub status: String,
}

#[derive(Deserialize, Debug)]
pub struct MineRequest {
    pub data: String,
}

#[derive(Deserialize, Debug)]
pub struct TransactRequest {
    pub recipient: String,
    pub amount: u64,
}

#[derive(Serialize, Debug)]
pub struct TransactResponse {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub transaction: Transaction,
}

#[derive(Serialize, Debug)]
pub struct ChainReceipt {
    pub replaced: bool,
}

pub async fn health() -> Json<Health> {
    Json(Health {
        status: "ok".into(),
    })
}

pub async fn blocks(State(state): State<AppState>) -> Json<Vec<Block>> {
    Json(state.node.lock().await.blockchain().blocks().to_vec())
}

pub async fn blocks_length(State(state): State<AppState>) -> Json<usize> {
    Json(state.node.lock().await.blockchain().len())
}

pub async fn blocks_page(
    State(state): State<AppState>,
    Path(page): Path<usize>,
) -> Json<Vec<Block>> {
    let node = state.node.lock().await;
    Json(
        node.blockchain()
            .blocks_page(page)
            .into_iter()
            .cloned()
            .collect(),
    )
}

pub async fn mine(
    State(state): State<AppState>,
    Json(req): Json<MineRequest>,
) -> Result<Json<Vec<Block>>, ApiError> {
    mine_and_submit(&state, |_| BlockPayload::Raw(req.data)).await?;
    Ok(blocks(State(state)).await)
}

pub async fn mine_transactions(
    State(state): State<AppState>,
) -> Result<Json<Vec<Block>>, ApiError> {
    mine_and_submit(&state, Node::pending_block_data).await?;
    Ok(blocks(State(state)).await)
}

/// Mine on top of the current tip without holding the node lock, then
/// append. A replacement that lands meanwhile cancels the search, and a
/// block that comes back stale is dropped.
async fn mine_and_submit(
    state: &AppState,
    payload: impl FnOnce(&Node) -> BlockPayload,
) -> Result<Block, ApiError> {
    let _running = state.mining.lock().await;

    let handle = {
        let node = state.node.lock().await;
        let handle = Miner::spawn(node.blockchain().last_block().clone(), payload(&node));
        *state.active_mine.lock().await = Some(handle.cancel_token());
        handle
    };

    let joined = tokio::task::spawn_blocking(move || handle.join()).await;
    state.active_mine.lock().await.take();

    let block = match joined {
        Ok(Some(block)) => block,
        Ok(None) => {
            return Err(ApiError::new(
                StatusCode::CONFLICT,
                "mining abandoned: the chain was replaced",
            ))
        }
        Err(err) => {
            return Err(ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("mining task failed: {err}"),
            ))
        }
    };

    let encoded = {
        let mut node = state.node.lock().await;
        if !node.submit_mined(block.clone()) {
            return Err(ApiError::new(
                StatusCode::CONFLICT,
                "mined block is stale: the tip moved",
            ));
        }
        node.encode_chain()?
    };
    state.gossip.broadcast_chain(encoded);
    Ok(block)
}

pub async fn transact(
    State(state): State<AppState>,
    Json(req): Json<TransactRequest>,
) -> Result<Json<TransactResponse>, ApiError> {
    let (transaction, encoded) = {
        let mut node = state.node.lock().await;
        let transaction = node.transact(&req.recipient, req.amount)?;
        let encoded = codec::encode_transaction(&transaction)?;
        (transaction, encoded)
    };
    state.gossip.broadcast_transaction(encoded);
    Ok(Json(TransactResponse {
        kind: "success",
        transaction,
    }))
}

pub async fn transaction_pool_map(
    State(state): State<AppState>,
) -> Json<HashMap<String, Transaction>> {
    Json(state.node.lock().await.pool().transaction_map().clone())
}

pub async fn wallet_info(State(state): State<AppState>) -> Json<WalletInfo> {
    Json(state.node.lock().await.wallet_info(None))
}

pub async fn wallet_info_for(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Json<WalletInfo> {
    Json(state.node.lock().await.wallet_info(Some(&address)))
}

pub async fn known_addresses(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.node.lock().await.blockchain().known_addresses())
}

pub async fn receive_chain(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ChainReceipt>, ApiError> {
    let outcome = state
        .node
        .lock()
        .await
        .receive_chain(&body)
        .inspect_err(|err| warn!("dropping chain payload: {err}"))?;
    let replaced = outcome.is_replaced();
    if replaced {
        state.cancel_active_mine().await;
    }
    Ok(Json(ChainReceipt { replaced }))
}

pub async fn receive_transaction(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    state
        .node
        .lock()
        .await
        .receive_transaction(&body)
        .inspect_err(|err| warn!("dropping transaction payload: {err}"))?;
    Ok(StatusCode::ACCEPTED)
}
