//! Read-only HTTP status API for the RelayChain coordinator
//!
//! Exposes the chain and live-peer count for dashboards. Transactions are
//! submitted over the WebSocket relay, not here.

use axum::{
    extract::{Path, Query, Request, State},
    http::{self, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::blockchain::Block;
use crate::coordinator::Coordinator;
use crate::error::ChainError;
use crate::node::NodeState;

const MAX_PAGE_LIMIT: u64 = 100;

/// Shared state behind every API handler.
#[derive(Clone)]
pub struct ApiNode {
    pub coordinator: Arc<Coordinator>,
    // Optional orchestrator state for health checks and request logs
    pub state: Option<Arc<RwLock<NodeState>>>,
    api_stats: Arc<RwLock<ApiStats>>,
}

#[derive(Debug)]
struct ApiStats {
    total_requests: u64,
    successful_requests: u64,
    failed_requests: u64,
    start_time: Instant,
}

impl ApiStats {
    fn new() -> Self {
        ApiStats {
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            start_time: Instant::now(),
        }
    }

    fn record_request(&mut self, success: bool) {
        self.total_requests += 1;
        if success {
            self.successful_requests += 1;
        } else {
            self.failed_requests += 1;
        }
    }
}

impl ApiNode {
    /// Observe a coordinator owned by the node orchestrator.
    pub fn new_shared(coordinator: Arc<Coordinator>, state: Option<Arc<RwLock<NodeState>>>) -> Self {
        Self {
            coordinator,
            state,
            api_stats: Arc::new(RwLock::new(ApiStats::new())),
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize)]
struct SnapshotResponse {
    blockchain: Vec<Block>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MinersResponse {
    miner_count: usize,
}

#[derive(Serialize)]
pub struct ApiStatsResponse {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub uptime_seconds: u64,
    pub chain_height: usize,
    pub miner_count: usize,
}

#[derive(Deserialize)]
struct PaginationQuery {
    #[serde(default)]
    page: u64,
    #[serde(default = "default_limit")]
    limit: u64,
}

fn default_limit() -> u64 {
    20
}

// ============================================================================
// Middleware
// ============================================================================

async fn stats_middleware(State(node): State<Arc<ApiNode>>, req: Request, next: Next) -> Response {
    let response = next.run(req).await;

    let success = response.status().is_success();
    node.api_stats.write().await.record_request(success);

    response
}

/// Logs method, path, status, duration and the current `NodeState`.
async fn logging_middleware(State(node): State<Arc<ApiNode>>, req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    let node_state = match &node.state {
        Some(s) => format!("{:?}", *s.read().await),
        None => "unknown".to_string(),
    };

    tracing::info!(
        method = %method,
        path = %path,
        status = %response.status().as_u16(),
        duration_ms = %start.elapsed().as_millis(),
        node_state = %node_state,
        "api.request"
    );

    response
}

// ============================================================================
// API Server
// ============================================================================

/// Build the API router with all endpoints.
pub fn build_api_router(node: Arc<ApiNode>) -> Router {
    // Wallet dashboards are served from other origins.
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(vec![http::Method::GET, http::Method::OPTIONS])
        .allow_headers(vec![http::header::CONTENT_TYPE]);

    let api_routes = Router::new()
        // Blockchain endpoints
        .route("/blockchain", get(get_blockchain))
        .route("/blockchain/height", get(get_blockchain_height))
        .route("/blockchain/blocks", get(get_blocks))
        .route("/blockchain/block/:index", get(get_block_by_index))
        // Network endpoints
        .route("/miners", get(get_miners))
        // System endpoints
        .route("/health", get(health_check))
        .route("/stats", get(get_api_stats))
        // stats wraps logging, so every logged request is also counted
        .layer(middleware::from_fn_with_state(node.clone(), logging_middleware))
        .layer(middleware::from_fn_with_state(node.clone(), stats_middleware))
        .with_state(node);

    Router::new().nest("/api", api_routes).layer(cors)
}

/// Serve the API on an already-bound listener.
pub async fn run_api_server(node: Arc<ApiNode>, listener: TcpListener) -> Result<(), ChainError> {
    let addr = listener.local_addr()?;
    let app = build_api_router(node);

    tracing::info!("Status API listening on http://{}/api", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

// ============================================================================
// Route Handlers
// ============================================================================

async fn health_check(State(node): State<Arc<ApiNode>>) -> impl IntoResponse {
    let Some(s) = &node.state else {
        // No orchestrator state available, assume healthy
        return (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "healthy",
                "timestamp": chrono::Utc::now().to_rfc3339()
            })),
        );
    };

    let state = *s.read().await;
    let (status, label) = match state {
        NodeState::Ready => (StatusCode::OK, "healthy"),
        NodeState::Booting => (StatusCode::SERVICE_UNAVAILABLE, "unhealthy"),
    };
    (
        status,
        Json(serde_json::json!({
            "status": label,
            "node_state": format!("{:?}", state),
            "timestamp": chrono::Utc::now().to_rfc3339()
        })),
    )
}

async fn get_blockchain(State(node): State<Arc<ApiNode>>) -> impl IntoResponse {
    Json(SnapshotResponse {
        blockchain: node.coordinator.snapshot(),
    })
}

async fn get_blockchain_height(State(node): State<Arc<ApiNode>>) -> impl IntoResponse {
    Json(node.coordinator.chain_len() as u64)
}

/// Newest first, `limit` per page.
async fn get_blocks(
    State(node): State<Arc<ApiNode>>,
    Query(params): Query<PaginationQuery>,
) -> impl IntoResponse {
    let blocks = node.coordinator.snapshot();
    let total = blocks.len();
    let limit = params.limit.min(MAX_PAGE_LIMIT);
    let offset = params.page.saturating_mul(limit);

    let page: Vec<Block> = blocks
        .into_iter()
        .rev()
        .skip(usize::try_from(offset).unwrap_or(usize::MAX))
        .take(limit as usize)
        .collect();

    Json(serde_json::json!({
        "blocks": page,
        "total": total,
        "page": params.page,
        "limit": limit
    }))
}

async fn get_block_by_index(
    State(node): State<Arc<ApiNode>>,
    Path(index): Path<u64>,
) -> Result<Json<Block>, ApiError> {
    node.coordinator
        .block(index)
        .ok_or_else(|| ApiError::NotFound(format!("Block at index {} not found", index)))
        .map(Json)
}

async fn get_miners(State(node): State<Arc<ApiNode>>) -> impl IntoResponse {
    Json(MinersResponse {
        miner_count: node.coordinator.miner_count(),
    })
}

async fn get_api_stats(State(node): State<Arc<ApiNode>>) -> impl IntoResponse {
    let stats = node.api_stats.read().await;
    Json(ApiStatsResponse {
        total_requests: stats.total_requests,
        successful_requests: stats.successful_requests,
        failed_requests: stats.failed_requests,
        uptime_seconds: stats.start_time.elapsed().as_secs(),
        chain_height: node.coordinator.chain_len(),
        miner_count: node.coordinator.miner_count(),
    })
}
