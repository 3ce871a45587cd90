//! Read-only HTTP query surface.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

use naka_core::{ChainRecord, Token};

use crate::node::Node;
use crate::scheduler::CycleReport;

/// One network as served to clients. A missing previous value reads as 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoefficientRow {
    pub chain_name: String,
    pub chain_token: String,
    pub naka_co_prev_val: i64,
    pub naka_co_curr_val: i64,
    pub naka_co_change_val: i64,
}

impl From<&ChainRecord> for CoefficientRow {
    fn from(record: &ChainRecord) -> Self {
        Self {
            chain_name: record.chain_name.clone(),
            chain_token: record.token.to_string(),
            naka_co_prev_val: i64::from(record.previous_coefficient.unwrap_or(0)),
            naka_co_curr_val: i64::from(record.current_coefficient),
            naka_co_change_val: record.change(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoefficientsResponse {
    pub coefficients: Vec<CoefficientRow>,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    version: &'static str,
    configured: usize,
    published: usize,
    last_cycle: Option<CycleReport>,
}

pub fn router(node: Arc<Node>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/naka-coeffs", get(all_coefficients))
        .route("/api/coefficients", get(all_coefficients))
        .route("/api/coefficients/:token", get(one_coefficient))
        .route("/api/status", get(status))
        .route("/health", get(health))
        .with_state(node)
        .layer(cors)
}

/// `GET /naka-coeffs` — every network, ascending by token.
async fn all_coefficients(State(node): State<Arc<Node>>) -> Json<CoefficientsResponse> {
    let snapshot = node.registry();
    Json(CoefficientsResponse {
        coefficients: snapshot.iter().map(CoefficientRow::from).collect(),
    })
}

/// `GET /api/coefficients/:token` — case-insensitive lookup.
async fn one_coefficient(State(node): State<Arc<Node>>, Path(token): Path<String>) -> Response {
    let token = Token::new(token);
    match node.registry().get(&token) {
        Some(record) => Json(CoefficientRow::from(record)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": format!("unknown token {token}")})),
        )
            .into_response(),
    }
}

async fn status(State(node): State<Arc<Node>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION"),
        configured: node.tokens().count(),
        published: node.registry().len(),
        last_cycle: node.last_report(),
    })
}

async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use chrono::Utc;
    use naka_core::error::CollectorError;
    use naka_core::traits::{Collected, Collector};
    use naka_core::{CoefficientResult, Comparison, Fraction, ThresholdPolicy};
    use naka_engine::ConcentrationEngine;
    use tokio::sync::watch;
    use tower::ServiceExt;

    use crate::config::NodeConfig;
    use crate::scheduler::Job;

    struct Sequence(std::sync::Mutex<Vec<u32>>);

    #[async_trait]
    impl Collector for Sequence {
        async fn fetch(&self, token: &Token) -> Result<Collected, CollectorError> {
            let next = self.0.lock().unwrap().remove(0);
            Ok(Collected::Precomputed(CoefficientResult::precomputed(token.clone(), next, Utc::now())))
        }
    }

    fn job(token: &str, name: &str, values: Vec<u32>) -> Job {
        Job {
            token: Token::new(token),
            chain_name: name.into(),
            policy: ThresholdPolicy::new(Fraction::new(1, 3).unwrap(), Comparison::StrictGreater),
            collector: Arc::new(Sequence(std::sync::Mutex::new(values))),
        }
    }

    async fn node_after_two_cycles() -> Arc<Node> {
        let node = Node::with_parts(
            NodeConfig::default(),
            vec![job("SOL", "Solana", vec![20, 19]), job("ATOM", "Cosmos", vec![7, 9])],
            Arc::new(ConcentrationEngine),
            None,
        );
        let (_tx, rx) = watch::channel(false);
        node.refresh(rx.clone()).await;
        node.refresh(rx).await;
        node
    }

    async fn get(node: Arc<Node>, uri: &str) -> (StatusCode, Vec<u8>) {
        let resp = router(node)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    #[test]
    fn first_sight_row_reads_previous_as_zero() {
        let record = ChainRecord::first(
            "Sui",
            &CoefficientResult::precomputed(Token::new("SUI"), 17, Utc::now()),
        );
        let row = CoefficientRow::from(&record);
        assert_eq!((row.naka_co_prev_val, row.naka_co_curr_val, row.naka_co_change_val), (0, 17, 17));
    }

    #[tokio::test]
    async fn lists_sorted_with_change() {
        let (status, body) = get(node_after_two_cycles().await, "/naka-coeffs").await;
        assert_eq!(status, StatusCode::OK);
        let resp: CoefficientsResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            resp.coefficients,
            vec![
                CoefficientRow {
                    chain_name: "Cosmos".into(),
                    chain_token: "ATOM".into(),
                    naka_co_prev_val: 7,
                    naka_co_curr_val: 9,
                    naka_co_change_val: 2,
                },
                CoefficientRow {
                    chain_name: "Solana".into(),
                    chain_token: "SOL".into(),
                    naka_co_prev_val: 20,
                    naka_co_curr_val: 19,
                    naka_co_change_val: -1,
                },
            ]
        );
    }

    #[tokio::test]
    async fn single_token_lookup_and_404() {
        let node = node_after_two_cycles().await;
        let (status, body) = get(Arc::clone(&node), "/api/coefficients/atom").await;
        assert_eq!(status, StatusCode::OK);
        let row: CoefficientRow = serde_json::from_slice(&body).unwrap();
        assert_eq!(row.naka_co_curr_val, 9);

        let (status, _) = get(node, "/api/coefficients/DOGE").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn status_reports_last_cycle() {
        let (status, body) = get(node_after_two_cycles().await, "/api/status").await;
        assert_eq!(status, StatusCode::OK);
        let v: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(v["configured"], 2);
        assert_eq!(v["published"], 2);
        assert_eq!(v["last_cycle"]["cycle"], 2);
        assert_eq!(v["last_cycle"]["succeeded"], json!(["ATOM", "SOL"]));
    }

    #[tokio::test]
    async fn health_is_ok() {
        let node = Node::with_parts(NodeConfig::default(), Vec::new(), Arc::new(ConcentrationEngine), None);
        let (status, body) = get(node, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"ok");
    }
}
