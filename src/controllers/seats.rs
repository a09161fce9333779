//! Synchronous mirrors of the realtime seat intents, for clients without an
//! open socket. Every successful mutation still broadcasts to the showtime's
//! room so connected viewers stay in sync regardless of the entry path.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;
use validator::Validate;

use crate::controllers::{bad_request, seat_error};
use crate::middleware::HolderId;
use crate::models::SeatStatus;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/seats/hold", patch(hold_seat))
        .route("/seats/release", patch(release_seat))
        .route("/seats/confirm", patch(confirm_seat))
        .route("/seats/reserve", patch(reserve_seat))
        .route("/seats/confirm-bulk", post(confirm_bulk))
}

#[derive(Debug, Deserialize)]
struct SeatIntentRequest {
    showtime_id: Uuid,
    seat_id: Uuid,
}

async fn broadcast(state: &Arc<AppState>, showtime_id: Uuid) {
    if let Err(e) = crate::realtime::publish_snapshot(state, showtime_id).await {
        warn!(%showtime_id, "failed to broadcast snapshot after REST mutation: {e}");
    }
}

fn ok_seat(status: SeatStatus) -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({ "success": true, "seat": status })),
    )
}

// PATCH /api/seats/hold
async fn hold_seat(
    State(state): State<Arc<AppState>>,
    HolderId(holder): HolderId,
    Json(req): Json<SeatIntentRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<Value>)> {
    match state.seats.hold(req.showtime_id, req.seat_id, holder).await {
        Ok(status) => {
            broadcast(&state, req.showtime_id).await;
            Ok(ok_seat(status))
        }
        Err(e) => Err(seat_error(&e)),
    }
}

// PATCH /api/seats/release
async fn release_seat(
    State(state): State<Arc<AppState>>,
    HolderId(holder): HolderId,
    Json(req): Json<SeatIntentRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<Value>)> {
    match state
        .seats
        .release(req.showtime_id, req.seat_id, holder)
        .await
    {
        Ok(status) => {
            broadcast(&state, req.showtime_id).await;
            Ok(ok_seat(status))
        }
        Err(e) => Err(seat_error(&e)),
    }
}

// PATCH /api/seats/confirm
async fn confirm_seat(
    State(state): State<Arc<AppState>>,
    HolderId(holder): HolderId,
    Json(req): Json<SeatIntentRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<Value>)> {
    match state
        .seats
        .confirm(req.showtime_id, req.seat_id, holder)
        .await
    {
        Ok(status) => {
            broadcast(&state, req.showtime_id).await;
            Ok(ok_seat(status))
        }
        Err(e) => Err(seat_error(&e)),
    }
}

// PATCH /api/seats/reserve — fast path used by already-validated server-side
// booking flows; skips the intermediate hold.
async fn reserve_seat(
    State(state): State<Arc<AppState>>,
    HolderId(holder): HolderId,
    Json(req): Json<SeatIntentRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<Value>)> {
    match state
        .seats
        .reserve_direct(req.showtime_id, req.seat_id, holder)
        .await
    {
        Ok(status) => {
            broadcast(&state, req.showtime_id).await;
            Ok(ok_seat(status))
        }
        Err(e) => Err(seat_error(&e)),
    }
}

#[derive(Debug, Deserialize, Validate)]
struct BulkConfirmRequest {
    #[validate(length(min = 1, message = "at least one seat is required"))]
    seats: Vec<SeatRef>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SeatRef {
    showtime_id: Uuid,
    seat_id: Uuid,
}

#[derive(Debug, Serialize)]
struct SeatFailureReport {
    showtime_id: Uuid,
    seat_id: Uuid,
    code: &'static str,
    message: String,
}

// POST /api/seats/confirm-bulk — per-seat outcome report; one seat losing its
// precondition never rolls back the others.
async fn confirm_bulk(
    State(state): State<Arc<AppState>>,
    HolderId(holder): HolderId,
    Json(req): Json<BulkConfirmRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<Value>)> {
    req.validate()
        .map_err(|e| bad_request(e.to_string()))?;

    let pairs: Vec<(Uuid, Uuid)> = req
        .seats
        .iter()
        .map(|s| (s.showtime_id, s.seat_id))
        .collect();

    let outcome = state
        .seats
        .bulk_confirm(&pairs, holder)
        .await
        .map_err(|e| seat_error(&e))?;

    let touched: HashSet<Uuid> = outcome
        .confirmed
        .iter()
        .map(|status| status.showtime_id)
        .collect();
    for showtime_id in touched {
        broadcast(&state, showtime_id).await;
    }

    let failed: Vec<SeatFailureReport> = outcome
        .failed
        .iter()
        .map(|f| SeatFailureReport {
            showtime_id: f.showtime_id,
            seat_id: f.seat_id,
            code: f.error.code(),
            message: f.error.to_string(),
        })
        .collect();

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": failed.is_empty(),
            "confirmed": outcome.confirmed,
            "failed": failed,
        })),
    ))
}
