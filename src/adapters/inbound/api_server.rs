//! Edge API Server
//!
//! HTTP front end for a request handler (one node or a whole network):
//! a JSON request envelope plus read-only metrics and node listings.

use crate::domain::context::RequestContext;
use crate::domain::entities::{Metrics, NodeDescriptor, Params};
use crate::domain::errors::EdgeError;
use crate::domain::ports::RequestHandler;
use crate::infrastructure::shutdown::ShutdownController;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::Instrument;
use uuid::Uuid;

/// Request envelope for `POST /edge`.
#[derive(Debug, Clone, Deserialize)]
pub struct EdgeRequest {
    pub path: String,
    #[serde(default)]
    pub params: Params,
}

/// Success envelope for `POST /edge`.
#[derive(Debug, Serialize)]
pub struct EdgeResponse {
    pub data: serde_json::Value,
}

/// List of nodes response.
#[derive(Debug, Serialize)]
pub struct NodesListResponse {
    pub nodes: Vec<NodeDescriptor>,
    pub total: usize,
}

/// Health response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub nodes: usize,
    pub healthy_nodes: usize,
}

/// API Server state.
#[derive(Clone)]
pub struct ApiState {
    pub handler: Arc<dyn RequestHandler>,
    /// Deadline applied to every `POST /edge` request
    pub request_timeout: Duration,
    pub shutdown: ShutdownController,
}

impl ApiState {
    pub fn new(
        handler: Arc<dyn RequestHandler>,
        request_timeout: Duration,
        shutdown: ShutdownController,
    ) -> Self {
        Self {
            handler,
            request_timeout,
            shutdown,
        }
    }
}

/// Build the API router over `state`.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/edge", post(edge_handler))
        .route("/metrics", get(metrics_handler))
        .route("/metrics/:node_id", get(node_metrics_handler))
        .route("/nodes", get(nodes_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// HTTP server for edge requests.
pub struct ApiServer {
    listen_addr: String,
    state: ApiState,
}

impl ApiServer {
    pub fn new(
        handler: Arc<dyn RequestHandler>,
        listen_addr: impl Into<String>,
        request_timeout: Duration,
        shutdown: ShutdownController,
    ) -> Self {
        Self {
            listen_addr: listen_addr.into(),
            state: ApiState::new(handler, request_timeout, shutdown),
        }
    }

    pub fn state(&self) -> ApiState {
        self.state.clone()
    }

    pub fn router(&self) -> Router {
        router(self.state.clone())
    }

    /// Run the API server until shutdown is initiated.
    #[cfg_attr(coverage_nightly, coverage(off))]
    pub async fn run(&self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(&self.listen_addr).await?;
        tracing::info!("edge API listening on {}", self.listen_addr);

        let shutdown = self.state.shutdown.clone();
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await?;
        tracing::info!("edge API stopped accepting connections");
        Ok(())
    }
}

// Handler functions

async fn edge_handler(State(state): State<ApiState>, body: Bytes) -> Response {
    let _guard = state.shutdown.request_guard();

    let req: EdgeRequest = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(e) => {
            let err = EdgeError::InvalidPayload(e.to_string());
            tracing::debug!("rejected request: {}", err);
            return (StatusCode::BAD_REQUEST, err.to_string()).into_response();
        }
    };

    let span = tracing::info_span!("edge_request", request_id = %Uuid::new_v4(), path = %req.path);
    let ctx = RequestContext::with_timeout(state.request_timeout);

    match state
        .handler
        .process_request(&ctx, &req.path, req.params)
        .instrument(span)
        .await
    {
        Ok(data) => (StatusCode::OK, Json(EdgeResponse { data })).into_response(),
        Err(e) => {
            tracing::debug!("request for {} failed: {}", req.path, e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn metrics_handler(State(state): State<ApiState>) -> Json<Metrics> {
    Json(state.handler.metrics())
}

async fn node_metrics_handler(
    State(state): State<ApiState>,
    Path(node_id): Path<String>,
) -> Response {
    match state.handler.node_metrics(&node_id) {
        Some(metrics) => Json(metrics).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "id": node_id,
                "error": "node not found"
            })),
        )
            .into_response(),
    }
}

async fn nodes_handler(State(state): State<ApiState>) -> Json<NodesListResponse> {
    let nodes = state.handler.nodes();
    let total = nodes.len();
    Json(NodesListResponse { nodes, total })
}

async fn health_handler(State(state): State<ApiState>) -> Json<HealthResponse> {
    let nodes = state.handler.nodes();
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        nodes: nodes.len(),
        healthy_nodes: nodes.iter().filter(|n| n.is_healthy()).count(),
    })
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::adapters::outbound::InMemoryDataStore;
    use crate::application::{EdgeNetwork, EdgeNode};
    use crate::config::{NetworkConfig, NodeConfig};
    use axum::{body::Body, http::Request};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn edge_node(id: &str) -> Arc<EdgeNode> {
        let node = EdgeNode::new(NodeConfig::new(id, "eu"), Arc::new(InMemoryDataStore::new())).unwrap();
        node.register_handler("query:echo", |_ctx, params: Params| async move {
            Ok(json!(params))
        });
        node.register_handler("query:fail", |_ctx, _params| async {
            Err(anyhow::anyhow!("database unavailable"))
        });
        Arc::new(node)
    }

    fn network_app() -> (Router, ShutdownController) {
        let network = EdgeNetwork::new(NetworkConfig::default()).unwrap();
        network.add_node(edge_node("edge-1"));
        network.add_node(edge_node("edge-2"));
        let shutdown = ShutdownController::new();
        let state = ApiState::new(Arc::new(network), Duration::from_secs(5), shutdown.clone());
        (router(state), shutdown)
    }

    fn post_edge(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/edge")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_bytes(response: Response) -> Bytes {
        response.into_body().collect().await.unwrap().to_bytes()
    }

    async fn body_json(response: Response) -> Value {
        serde_json::from_slice(&body_bytes(response).await).unwrap()
    }

    #[tokio::test]
    async fn test_edge_success() {
        let (app, shutdown) = network_app();
        let response = app
            .oneshot(post_edge(r#"{"path":"query:echo","params":{"id":7}}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"data": {"id": 7}}));
        assert_eq!(shutdown.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_edge_params_default_to_empty() {
        let (app, _) = network_app();
        let response = app.oneshot(post_edge(r#"{"path":"query:echo"}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"data": {}}));
    }

    #[tokio::test]
    async fn test_edge_malformed_body() {
        let (app, _) = network_app();
        let response = app.oneshot(post_edge("{not json")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let text = String::from_utf8(body_bytes(response).await.to_vec()).unwrap();
        assert!(text.starts_with("invalid request payload"));
    }

    #[tokio::test]
    async fn test_edge_resolver_failure_is_plain_text() {
        let (app, _) = network_app();
        let response = app
            .oneshot(post_edge(r#"{"path":"query:fail","params":{}}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(&body_bytes(response).await[..], b"database unavailable");
    }

    #[tokio::test]
    async fn test_edge_unknown_path() {
        let (app, _) = network_app();
        let response = app
            .oneshot(post_edge(r#"{"path":"query:nope","params":{}}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(&body_bytes(response).await[..], b"no handler for path: query:nope");
    }

    #[tokio::test]
    async fn test_metrics_field_names() {
        let (app, _) = network_app();
        let response = app.oneshot(get_req("/metrics")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        for field in [
            "RequestCount",
            "AvgResponseTime",
            "ErrorRate",
            "CacheHitRate",
            "CPUUsage",
            "MemoryUsage",
            "NetworkIn",
            "NetworkOut",
        ] {
            assert!(body.get(field).is_some(), "missing {}", field);
        }
        assert_eq!(body["CPUUsage"], json!(0.0));
    }

    #[tokio::test]
    async fn test_node_metrics() {
        let (app, _) = network_app();
        let response = app.clone().oneshot(get_req("/metrics/edge-1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(get_req("/metrics/ghost")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_nodes_and_health() {
        let (app, _) = network_app();

        let body = body_json(app.clone().oneshot(get_req("/nodes")).await.unwrap()).await;
        assert_eq!(body["total"], json!(2));
        assert_eq!(body["nodes"][0]["id"], json!("edge-1"));

        let body = body_json(app.oneshot(get_req("/health")).await.unwrap()).await;
        assert_eq!(body["status"], json!("ok"));
        assert_eq!(body["healthy_nodes"], json!(2));
    }

    #[tokio::test]
    async fn test_router_over_single_node() {
        let node = edge_node("solo");
        let state = ApiState::new(node.clone(), Duration::from_secs(5), ShutdownController::new());
        let app = router(state);

        let response = app
            .clone()
            .oneshot(post_edge(r#"{"path":"query:echo","params":{"a":1}}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(node.metrics().request_count, 1);

        let body = body_json(app.oneshot(get_req("/nodes")).await.unwrap()).await;
        assert_eq!(body["total"], json!(0));
    }
}
