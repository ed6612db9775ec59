//! HTTP/WS surface: the listing views, transaction endpoints, and the live
//! countdown stream the browser UI consumes.

use std::sync::Arc;

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::contract::{ConfirmedTx, TxError};
use crate::countdown::{format_remaining, is_active, CountdownTicker};
use crate::filter::{counts, filter, FilterCounts, StatusFilter};
use crate::models::{Auction, SENTINEL_ADDRESS};
use crate::service::{AuctionService, ServiceError};
use crate::units::{format_address_short, format_bnb_label};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AuctionService>,
}

/// Create the API router
pub fn create_router(service: Arc<AuctionService>) -> Router {
    let state = AppState { service };

    Router::new()
        .route("/health", get(health_check))
        .route("/api/auctions", get(list_auctions).post(create_auction))
        .route("/api/auctions/counts", get(auction_counts))
        .route("/api/auctions/:id", get(get_auction))
        .route("/api/auctions/:id/winner", get(get_winner))
        .route("/api/auctions/:id/bid", post(place_bid))
        .route("/api/auctions/:id/refund", post(request_refund))
        .route("/api/auctions/:id/receipt", post(confirm_receipt))
        .route("/api/auctions/:id/withdraw", post(withdraw_proceeds))
        .route("/ws/auctions/:id/countdown", get(countdown_ws))
        .with_state(state)
}

// ===== Route Handlers =====

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Filtered listing. One `now` drives the whole response so the views and the
/// badge counts never mix instants.
async fn list_auctions(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> Result<Json<AuctionListResponse>, ApiError> {
    let selector: StatusFilter = params
        .filter
        .as_deref()
        .unwrap_or("all")
        .parse()
        .map_err(|e: crate::filter::UnrecognizedFilterError| ApiError::BadRequest(e.to_string()))?;

    let now = Utc::now().timestamp();
    let snapshot = state.service.store().all();
    let filtered = filter(&snapshot, selector, now);

    Ok(Json(AuctionListResponse {
        filter: selector.as_str(),
        count: filtered.len(),
        counts: counts(&snapshot, now),
        auctions: filtered.into_iter().map(|a| AuctionView::at(a, now)).collect(),
    }))
}

async fn auction_counts(State(state): State<AppState>) -> Json<FilterCounts> {
    let now = Utc::now().timestamp();
    Json(counts(&state.service.store().all(), now))
}

async fn get_auction(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<AuctionView>, ApiError> {
    let now = Utc::now().timestamp();
    state
        .service
        .store()
        .by_id(id)
        .map(|a| Json(AuctionView::at(a, now)))
        .ok_or(ApiError::NotFound(format!("Auction {id} not found")))
}

async fn get_winner(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<WinnerResponse>, ApiError> {
    let winner = state.service.get_winner(id).await?;
    let winner = (winner != SENTINEL_ADDRESS).then_some(winner);
    Ok(Json(WinnerResponse {
        auction_id: id,
        winner,
    }))
}

async fn create_auction(
    State(state): State<AppState>,
    Json(req): Json<CreateAuctionRequest>,
) -> Result<Json<TxResponse>, ApiError> {
    let confirmed = state
        .service
        .create_auction(&req.description, req.time_to_live_minutes)
        .await?;
    Ok(Json(confirmed.into()))
}

async fn place_bid(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(req): Json<BidRequest>,
) -> Result<Json<TxResponse>, ApiError> {
    let confirmed = state.service.bid(id, &req.amount).await?;
    Ok(Json(confirmed.into()))
}

async fn request_refund(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<TxResponse>, ApiError> {
    Ok(Json(state.service.refund(id).await?.into()))
}

async fn confirm_receipt(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<TxResponse>, ApiError> {
    Ok(Json(state.service.receipt(id).await?.into()))
}

async fn withdraw_proceeds(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<TxResponse>, ApiError> {
    Ok(Json(state.service.auction_withdraw(id).await?.into()))
}

/// Live countdown for one displayed auction. The ticker is dropped (and its
/// timer cancelled) as soon as the socket closes or the auction finishes.
async fn countdown_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Response {
    let Some(auction) = state.service.store().by_id(id) else {
        return ApiError::NotFound(format!("Auction {id} not found")).into_response();
    };
    ws.on_upgrade(move |socket| stream_countdown(socket, id, auction.deadline))
}

async fn stream_countdown(socket: WebSocket, auction_id: u64, deadline: i64) {
    let (mut sender, mut receiver) = socket.split();
    let ticker = CountdownTicker::spawn(deadline);
    let mut rx = ticker.subscribe();

    loop {
        let update = rx.borrow_and_update().clone();
        let finished = !update.is_active;
        let msg = json!({
            "auction_id": auction_id,
            "time_remaining": update.label,
            "is_active": update.is_active,
        });
        if sender.send(Message::Text(msg.to_string())).await.is_err() {
            break;
        }
        if finished {
            break;
        }
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {}
                }
            }
        }
    }

    debug!(auction_id, "countdown stream closed");
    let _ = sender.send(Message::Close(None)).await;
}

// ===== Request/Response Types =====

#[derive(Deserialize)]
struct ListQuery {
    /// One of all / active / finished / Completed / Withdraw.
    filter: Option<String>,
}

#[derive(Deserialize)]
struct CreateAuctionRequest {
    description: String,
    time_to_live_minutes: u64,
}

#[derive(Deserialize)]
struct BidRequest {
    /// Whole-coin decimal string, e.g. "0.01".
    amount: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

/// An auction plus its clock-derived state, evaluated at one instant.
#[derive(Serialize)]
pub struct AuctionView {
    #[serde(flatten)]
    auction: Auction,
    is_active: bool,
    time_remaining: String,
    highest_bid_label: String,
    highest_bidder_short: String,
}

impl AuctionView {
    fn at(auction: Auction, now: i64) -> Self {
        Self {
            is_active: is_active(auction.deadline, now),
            time_remaining: format_remaining(auction.deadline, now),
            highest_bid_label: format_bnb_label(&auction.highest_bid),
            highest_bidder_short: format_address_short(&auction.highest_bidder),
            auction,
        }
    }
}

#[derive(Serialize)]
struct AuctionListResponse {
    filter: &'static str,
    count: usize,
    counts: FilterCounts,
    auctions: Vec<AuctionView>,
}

#[derive(Serialize)]
struct WinnerResponse {
    auction_id: u64,
    /// `None` when the auction ended without bids.
    winner: Option<String>,
}

#[derive(Serialize)]
struct TxResponse {
    tx_hash: String,
    block_number: u64,
}

impl From<ConfirmedTx> for TxResponse {
    fn from(tx: ConfirmedTx) -> Self {
        Self {
            tx_hash: tx.tx_hash,
            block_number: tx.block_number,
        }
    }
}

// ===== Error Handling =====

#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    NotFound(String),
    /// Contract revert, reason passed through verbatim.
    Reverted(String),
    Upstream(anyhow::Error),
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Invalid(msg) => ApiError::BadRequest(msg),
            ServiceError::Tx(TxError::Reverted(reason)) => ApiError::Reverted(reason),
            ServiceError::Tx(err) => ApiError::Upstream(err.into()),
            ServiceError::Normalize(err) => ApiError::Upstream(err.into()),
            ServiceError::Upstream(err) => ApiError::Upstream(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Reverted(reason) => {
                (StatusCode::UNPROCESSABLE_ENTITY, format!("Revert operation: {reason}"))
            }
            ApiError::Upstream(err) => {
                tracing::error!("Upstream error: {}", err);
                (StatusCode::BAD_GATEWAY, "Upstream provider error".to_string())
            }
        };

        let body = Json(json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use num_bigint::BigUint;
    use tower::ServiceExt;

    use crate::abi::AbiValue;
    use crate::contract::{AuctionContract, TxHandle};
    use crate::store::AuctionStore;

    const CREATOR: &str = "0x49a9e72975ea74133abf1e0c2780689d368c7781";

    struct MockContract {
        records: Vec<Vec<AbiValue>>,
        winner: String,
    }

    #[async_trait]
    impl AuctionContract for MockContract {
        async fn get_auctions(&self) -> anyhow::Result<Vec<Vec<AbiValue>>> {
            Ok(self.records.clone())
        }
        async fn create_auction(&self, _: &str, _: u64) -> anyhow::Result<TxHandle> {
            Err(anyhow!("writes not wired in tests"))
        }
        async fn bid(&self, _: u64, _: BigUint) -> anyhow::Result<TxHandle> {
            Err(anyhow!("writes not wired in tests"))
        }
        async fn refund(&self, _: u64) -> anyhow::Result<TxHandle> {
            Err(anyhow!("writes not wired in tests"))
        }
        async fn get_winner(&self, _: u64) -> anyhow::Result<String> {
            Ok(self.winner.clone())
        }
        async fn receipt(&self, _: u64) -> anyhow::Result<TxHandle> {
            Err(anyhow!("writes not wired in tests"))
        }
        async fn auction_withdraw(&self, _: u64) -> anyhow::Result<TxHandle> {
            Err(anyhow!("writes not wired in tests"))
        }
    }

    fn record(id: u64, deadline: i64, status: u8) -> Vec<AbiValue> {
        vec![
            AbiValue::Uint(BigUint::from(id)),
            AbiValue::Address(CREATOR.to_string()),
            AbiValue::Str(format!("item {id}")),
            AbiValue::Uint(BigUint::from(deadline as u64)),
            AbiValue::Address(SENTINEL_ADDRESS.to_string()),
            AbiValue::Uint(BigUint::default()),
            AbiValue::Uint(BigUint::from(status)),
        ]
    }

    async fn app_with(records: Vec<Vec<AbiValue>>, winner: &str) -> Router {
        let contract = Arc::new(MockContract {
            records,
            winner: winner.to_string(),
        });
        let service = Arc::new(AuctionService::new(contract, AuctionStore::new()));
        service.refresh().await.unwrap();
        create_router(service)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let app = app_with(vec![], SENTINEL_ADDRESS).await;
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn listing_carries_consistent_counts() {
        let future = Utc::now().timestamp() + 3_600;
        let past = Utc::now().timestamp() - 3_600;
        let app = app_with(
            vec![record(1, future, 0), record(2, past, 1), record(3, past, 2)],
            SENTINEL_ADDRESS,
        )
        .await;

        let response = app
            .oneshot(Request::get("/api/auctions").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["count"], 3);
        assert_eq!(body["counts"]["all"], 3);
        assert_eq!(
            body["counts"]["active"].as_u64().unwrap() + body["counts"]["finished"].as_u64().unwrap(),
            3
        );
        assert_eq!(body["auctions"][0]["auction_id"], 1);
        assert_eq!(body["auctions"][0]["is_active"], true);
        assert_eq!(body["auctions"][1]["time_remaining"], "Finalizada");
    }

    #[tokio::test]
    async fn active_filter_narrows_the_listing() {
        let future = Utc::now().timestamp() + 3_600;
        let past = Utc::now().timestamp() - 3_600;
        let app = app_with(vec![record(1, future, 0), record(2, past, 0)], SENTINEL_ADDRESS).await;

        let response = app
            .oneshot(
                Request::get("/api/auctions?filter=active")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["auctions"][0]["auction_id"], 1);
    }

    #[tokio::test]
    async fn bogus_filter_is_a_bad_request() {
        let app = app_with(vec![], SENTINEL_ADDRESS).await;
        let response = app
            .oneshot(
                Request::get("/api/auctions?filter=bogus")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("bogus"));
    }

    #[tokio::test]
    async fn missing_auction_is_not_found() {
        let app = app_with(vec![], SENTINEL_ADDRESS).await;
        let response = app
            .oneshot(Request::get("/api/auctions/42").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn sentinel_winner_reads_as_none() {
        let future = Utc::now().timestamp() + 60;
        let app = app_with(vec![record(7, future, 0)], SENTINEL_ADDRESS).await;
        let response = app
            .oneshot(
                Request::get("/api/auctions/7/winner")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["winner"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn invalid_create_request_is_rejected() {
        let app = app_with(vec![], SENTINEL_ADDRESS).await;
        let response = app
            .oneshot(
                Request::post("/api/auctions")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        json!({"description": "", "time_to_live_minutes": 60}).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
