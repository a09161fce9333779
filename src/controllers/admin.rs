//! Administrative surface: forced cleanup for logout/cancellation flows and
//! seat reclassification. These paths still go through the state machine;
//! nothing here writes seat state directly.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::patch,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, warn};
use uuid::Uuid;

use crate::controllers::{internal_error, seat_error};
use crate::models::SeatClass;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/release-all", patch(release_all_for_holder))
        .route("/admin/seats/release", patch(release_reserved_seat))
        .route("/admin/seats/{seat_id}/class", patch(reclassify_seat))
}

async fn broadcast(state: &Arc<AppState>, showtime_id: Uuid) {
    if let Err(e) = crate::realtime::publish_snapshot(state, showtime_id).await {
        warn!(%showtime_id, "failed to broadcast snapshot after admin action: {e}");
    }
}

#[derive(Debug, Deserialize)]
struct ReleaseAllRequest {
    showtime_id: Uuid,
    holder_id: Uuid,
}

// PATCH /api/admin/release-all — logout/cancellation cleanup. Releases every
// hold the holder has in the showtime; reserved seats are untouched.
async fn release_all_for_holder(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ReleaseAllRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<Value>)> {
    match state
        .seats
        .release_all_for_holder(req.showtime_id, req.holder_id)
        .await
    {
        Ok(released) => {
            if !released.is_empty() {
                broadcast(&state, req.showtime_id).await;
            }
            Ok((
                StatusCode::OK,
                Json(json!({
                    "success": true,
                    "released_count": released.len(),
                    "released": released,
                })),
            ))
        }
        Err(e) => Err(seat_error(&e)),
    }
}

#[derive(Debug, Deserialize)]
struct AdminReleaseRequest {
    showtime_id: Uuid,
    seat_id: Uuid,
}

// PATCH /api/admin/seats/release — the only path out of `reserved`, used by
// ticket cancellation.
async fn release_reserved_seat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AdminReleaseRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<Value>)> {
    match state
        .seats
        .admin_release(req.showtime_id, req.seat_id)
        .await
    {
        Ok(status) => {
            broadcast(&state, req.showtime_id).await;
            Ok((
                StatusCode::OK,
                Json(json!({ "success": true, "seat": status })),
            ))
        }
        Err(e) => Err(seat_error(&e)),
    }
}

#[derive(Debug, Deserialize)]
struct ReclassifyRequest {
    class: SeatClass,
}

// PATCH /api/admin/seats/{seat_id}/class — affects the price annotation of
// future snapshots only, never current seat state.
async fn reclassify_seat(
    State(state): State<Arc<AppState>>,
    Path(seat_id): Path<Uuid>,
    Json(req): Json<ReclassifyRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<Value>)> {
    let theater_id: Option<Uuid> =
        sqlx::query_scalar("UPDATE seats SET class = $1 WHERE id = $2 RETURNING theater_id")
            .bind(req.class)
            .bind(seat_id)
            .fetch_optional(&state.db.pool)
            .await
            .map_err(|e| {
                error!(%seat_id, "failed to reclassify seat: {e}");
                internal_error("failed to reclassify seat")
            })?;

    let Some(theater_id) = theater_id else {
        return Err((
            StatusCode::NOT_FOUND,
            Json(json!({
                "success": false,
                "code": "not_found",
                "message": "seat not found",
            })),
        ));
    };

    // Cached snapshots for this theater's showtimes now carry a stale price.
    let showtimes: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM showtimes WHERE theater_id = $1")
        .bind(theater_id)
        .fetch_all(&state.db.pool)
        .await
        .unwrap_or_default();
    for showtime_id in showtimes {
        state.snapshots.invalidate(showtime_id).await;
    }

    Ok((StatusCode::OK, Json(json!({ "success": true }))))
}
