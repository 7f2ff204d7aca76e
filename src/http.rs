use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::error::AllocationError;
use crate::model::{CandidateRange, PoolSummary, SeatId};
use crate::observability;
use crate::service::{AllocationService, BookReport, CityCandidates, DEFAULT_MAX_RESULTS};

/// Standard response envelope:
/// `{"success": true, "data": {...}, "message": "..."}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: message.into(),
        }
    }
}

type ApiError = (StatusCode, Json<ApiResponse<()>>);

fn status_for(e: &AllocationError) -> StatusCode {
    match e {
        AllocationError::InvalidArgument(_) | AllocationError::LimitExceeded(_) => {
            StatusCode::BAD_REQUEST
        }
        AllocationError::NotFound(_)
        | AllocationError::NoCandidates
        | AllocationError::NothingBooked => StatusCode::NOT_FOUND,
        AllocationError::PoolExists(_) => StatusCode::CONFLICT,
        AllocationError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn fail(op: &'static str, started: Instant, e: AllocationError) -> ApiError {
    if matches!(e, AllocationError::Store(_)) {
        error!("{op} failed: {e}");
    }
    record(op, "error", started);
    (status_for(&e), Json(ApiResponse::error(e.to_string())))
}

fn record(op: &'static str, status: &'static str, started: Instant) {
    metrics::counter!(observability::REQUESTS_TOTAL, "op" => op, "status" => status).increment(1);
    metrics::histogram!(observability::REQUEST_DURATION_SECONDS, "op" => op)
        .record(started.elapsed().as_secs_f64());
}

// ── DTOs ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct FindCardsRequest {
    pub cities: Vec<String>,
    /// Requested block length: the number of consecutive card ids wanted.
    pub total_cards: u64,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn default_max_results() -> usize {
    DEFAULT_MAX_RESULTS
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RangeDto {
    pub start_id: SeatId,
    pub end_id: SeatId,
}

#[derive(Debug, Serialize)]
pub struct CityRangesDto {
    pub city: String,
    pub available_ranges: Vec<RangeDto>,
}

impl From<CityCandidates> for CityRangesDto {
    fn from(c: CityCandidates) -> Self {
        Self {
            city: c.city,
            available_ranges: c
                .ranges
                .into_iter()
                .map(|r| RangeDto {
                    start_id: r.start,
                    end_id: r.end,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BookRangeDto {
    pub city: String,
    pub start_id: SeatId,
    pub end_id: SeatId,
}

#[derive(Debug, Deserialize)]
pub struct BookCardsRequest {
    pub ranges: Vec<BookRangeDto>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePoolRequest {
    pub city: String,
    #[serde(default)]
    pub id_nos: Vec<SeatId>,
}

#[derive(Debug, Deserialize)]
pub struct AddSeatsRequest {
    pub id_nos: Vec<SeatId>,
}

#[derive(Debug, Deserialize)]
pub struct MarkBookedRequest {
    pub start_id: SeatId,
    pub end_id: SeatId,
}

#[derive(Debug, Serialize)]
pub struct ModifiedDto {
    pub modified_count: u64,
}

// ── Handlers ─────────────────────────────────────────────────────

async fn find_cards(
    State(service): State<Arc<AllocationService>>,
    Json(req): Json<FindCardsRequest>,
) -> Result<Json<ApiResponse<Vec<CityRangesDto>>>, ApiError> {
    let started = Instant::now();
    let candidates = service
        .find(&req.cities, req.total_cards, req.max_results)
        .await
        .map_err(|e| fail("find_cards", started, e))?;

    record("find_cards", "ok", started);
    Ok(Json(ApiResponse::ok(
        candidates.into_iter().map(CityRangesDto::from).collect(),
        "Data fetched successfully",
    )))
}

async fn book_cards(
    State(service): State<Arc<AllocationService>>,
    Json(req): Json<BookCardsRequest>,
) -> Result<Json<ApiResponse<BookReport>>, ApiError> {
    let started = Instant::now();
    let ranges: Vec<CandidateRange> = req
        .ranges
        .into_iter()
        .map(|r| CandidateRange {
            city: r.city,
            start: r.start_id,
            end: r.end_id,
        })
        .collect();

    let report = service
        .book(&ranges)
        .await
        .map_err(|e| fail("book_cards", started, e))?;

    record("book_cards", "ok", started);
    let message = if report.all_committed {
        "Booking status updated successfully"
    } else {
        "Booking partially applied; re-query available ranges"
    };
    Ok(Json(ApiResponse::ok(report, message)))
}

async fn create_pool(
    State(service): State<Arc<AllocationService>>,
    Json(req): Json<CreatePoolRequest>,
) -> Result<Json<ApiResponse<PoolSummary>>, ApiError> {
    let started = Instant::now();
    let city = service
        .create_pool(&req.city, &req.id_nos)
        .await
        .map_err(|e| fail("create_pool", started, e))?;

    let summary = service
        .list_pools()
        .await
        .map_err(|e| fail("create_pool", started, e))?
        .into_iter()
        .find(|s| s.city == city);

    record("create_pool", "ok", started);
    match summary {
        Some(summary) => Ok(Json(ApiResponse::ok(summary, "Pool created"))),
        None => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error("pool vanished after creation")),
        )),
    }
}

async fn add_seats(
    State(service): State<Arc<AllocationService>>,
    Path(city): Path<String>,
    Json(req): Json<AddSeatsRequest>,
) -> Result<Json<ApiResponse<ModifiedDto>>, ApiError> {
    let started = Instant::now();
    let added = service
        .add_seats(&city, &req.id_nos)
        .await
        .map_err(|e| fail("add_seats", started, e))?;

    record("add_seats", "ok", started);
    Ok(Json(ApiResponse::ok(
        ModifiedDto {
            modified_count: added,
        },
        "Seats added",
    )))
}

async fn mark_booked(
    State(service): State<Arc<AllocationService>>,
    Path(city): Path<String>,
    Json(req): Json<MarkBookedRequest>,
) -> Result<Json<ApiResponse<ModifiedDto>>, ApiError> {
    let started = Instant::now();
    let modified = service
        .seed_booked(&city, req.start_id, req.end_id)
        .await
        .map_err(|e| fail("mark_booked", started, e))?;

    record("mark_booked", "ok", started);
    Ok(Json(ApiResponse::ok(
        ModifiedDto {
            modified_count: modified,
        },
        format!("IDs from {} to {} marked as booked", req.start_id, req.end_id),
    )))
}

async fn list_pools(
    State(service): State<Arc<AllocationService>>,
) -> Result<Json<ApiResponse<Vec<PoolSummary>>>, ApiError> {
    let started = Instant::now();
    let pools = service
        .list_pools()
        .await
        .map_err(|e| fail("list_pools", started, e))?;

    record("list_pools", "ok", started);
    Ok(Json(ApiResponse::ok(pools, "Data fetched successfully")))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

pub fn router(service: Arc<AllocationService>) -> Router {
    Router::new()
        .route("/api/cards/find", post(find_cards))
        .route("/api/cards/book", post(book_cards))
        .route("/api/pools", post(create_pool).get(list_pools))
        .route("/api/pools/{city}/seats", post(add_seats))
        .route("/api/pools/{city}/mark-booked", post(mark_booked))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(service)
}
