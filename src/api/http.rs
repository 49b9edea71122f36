//! HTTP Request Surface
//!
//! The small, verb-agnostic endpoint set exposed by every node: swarm
//! view exchange, heartbeat ingest, and find/get/set/delete record.

use std::sync::Arc;
use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::{RecordStore, RemoveOutcome, UpsertOutcome};
use crate::swarm::{PeerInfo, Swarm, SwarmView};
use crate::error::Result;

/// Shared application state handed to every handler.
pub struct AppState {
    pub store: Arc<RecordStore>,
    pub swarm: Arc<Swarm>,
}

/// HTTP API server: the node's request surface.
pub struct HttpServer {
    bind_address: String,
    state: Arc<AppState>,
}

impl HttpServer {
    pub fn new(bind_address: String, store: Arc<RecordStore>, swarm: Arc<Swarm>) -> Self {
        Self {
            bind_address,
            state: Arc::new(AppState { store, swarm }),
        }
    }

    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    fn create_router(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/view", post(handle_view))
            .route("/heartbeat", post(handle_heartbeat))
            .route("/find", post(handle_find))
            .route("/get", post(handle_find))
            .route("/set", post(handle_set))
            .route("/delete", post(handle_delete))
            .with_state(state)
    }

    /// Start the HTTP server; runs until the listener is dropped or errors.
    pub async fn start(&self) -> Result<()> {
        let app = Self::create_router(Arc::clone(&self.state));
        let listener = tokio::net::TcpListener::bind(&self.bind_address).await?;
        tracing::info!("Request surface listening on {}", self.bind_address);
        axum::serve(listener, app)
            .await
            .map_err(|e| crate::error::Error::Network(format!("HTTP server error: {e}")))?;
        Ok(())
    }
}

// ============ Request/Response types ============

/// Request body for `/view`: optionally carries the caller's identity so
/// the endpoint can implicitly ingest it (used by heartbeats and joins).
#[derive(Debug, Default, Deserialize)]
pub struct ViewRequest {
    pub node: Option<PeerInfo>,
}

/// Request body for `/heartbeat`.
#[derive(Debug, Deserialize)]
pub struct HeartbeatRequest {
    pub address: String,
    pub records_count: usize,
}

/// `{"command":"GET"|"SET"|"DELETE","args":[uuid, value?]}`
#[derive(Debug, Deserialize, Serialize)]
pub struct RecordCommand {
    pub command: String,
    pub args: Vec<String>,
}

/// `{"value":"…"}`
#[derive(Debug, Serialize)]
pub struct RecordValue {
    pub value: String,
}

// ============ Handlers ============

async fn handle_view(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ViewRequest>,
) -> impl IntoResponse {
    if let Some(node) = req.node {
        state.swarm.ingest(node).await;
    }
    state.swarm.set_own_records_count(state.store.records_count().await).await;
    let view: SwarmView = state.swarm.view().await;
    Json(view)
}

async fn handle_heartbeat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<HeartbeatRequest>,
) -> impl IntoResponse {
    state
        .swarm
        .ingest(PeerInfo {
            address: req.address,
            records_count: req.records_count,
        })
        .await;
    state.swarm.set_own_records_count(state.store.records_count().await).await;
    let view: SwarmView = state.swarm.view().await;
    Json(view)
}

fn parse_key(args: &[String]) -> std::result::Result<Uuid, axum::response::Response> {
    args.first()
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| StatusCode::BAD_REQUEST.into_response())
}

async fn handle_find(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RecordCommand>,
) -> impl IntoResponse {
    let key = match parse_key(&req.args) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    match state.store.lookup(&key).await {
        Some(value) => (StatusCode::OK, Json(RecordValue { value })).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn handle_set(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RecordCommand>,
) -> impl IntoResponse {
    let key = match parse_key(&req.args) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    let Some(value) = req.args.get(1) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    match state.store.upsert(key, value.clone()).await {
        UpsertOutcome::Created => tracing::debug!("created {key}"),
        UpsertOutcome::Replaced => tracing::debug!("replaced {key}"),
    }
    StatusCode::OK.into_response()
}

async fn handle_delete(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RecordCommand>,
) -> impl IntoResponse {
    let key = match parse_key(&req.args) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    match state.store.remove(&key).await {
        RemoveOutcome::Removed => tracing::debug!("removed {key}"),
        RemoveOutcome::Absent => {}
    }
    StatusCode::OK.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_state() -> Arc<AppState> {
        Arc::new(AppState {
            store: Arc::new(RecordStore::new()),
            swarm: Arc::new(Swarm::standalone("127.0.0.1:9000".into(), 2)),
        })
    }

    fn test_app() -> Router {
        HttpServer::create_router(test_state())
    }

    #[tokio::test]
    async fn set_then_find_round_trips() {
        let app = test_app();
        let key = "550e8400-e29b-41d4-a716-446655440000";

        let set_req = Request::post("/set")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::json!({"command": "SET", "args": [key, "hello"]}).to_string(),
            ))
            .unwrap();
        let resp = app.clone().oneshot(set_req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let find_req = Request::post("/find")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::json!({"command": "GET", "args": [key]}).to_string(),
            ))
            .unwrap();
        let resp = app.oneshot(find_req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn find_missing_key_is_404() {
        let app = test_app();
        let key = "550e8400-e29b-41d4-a716-446655440001";
        let req = Request::post("/find")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::json!({"command": "GET", "args": [key]}).to_string(),
            ))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_is_ok_regardless_of_presence() {
        let app = test_app();
        let key = "550e8400-e29b-41d4-a716-446655440002";
        let req = Request::post("/delete")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::json!({"command": "DELETE", "args": [key]}).to_string(),
            ))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn heartbeat_ingests_caller_and_returns_view() {
        let app = test_app();
        let req = Request::post("/heartbeat")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::json!({"address": "127.0.0.1:9001", "records_count": 0}).to_string(),
            ))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
