use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;
use validator::Validate;

use crate::controllers::{bad_request, internal_error};
use crate::models::Showtime;
use crate::services::snapshot::SnapshotError;
use crate::store::{SeatStore, StoreError};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/showtimes", post(create_showtime))
        .route("/showtimes/{showtime_id}/provision", post(provision_showtime))
        .route("/showtimes/{showtime_id}/seats", get(get_showtime_seats))
}

#[derive(Debug, Deserialize, Validate)]
struct CreateShowtimeRequest {
    theater_id: Uuid,
    movie_id: Uuid,
    starts_at: DateTime<Utc>,
    #[validate(range(min = 0, message = "base_price must not be negative"))]
    base_price: i64,
}

// POST /api/showtimes — scheduling a screening fans out one `available`
// SeatStatus per seat in the theater.
async fn create_showtime(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateShowtimeRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<Value>)> {
    req.validate().map_err(|e| bad_request(e.to_string()))?;

    let seat_ids: Vec<Uuid> =
        sqlx::query_scalar("SELECT id FROM seats WHERE theater_id = $1 ORDER BY \"row\", col")
            .bind(req.theater_id)
            .fetch_all(&state.db.pool)
            .await
            .map_err(|e| {
                error!("failed to load theater seat map: {e}");
                internal_error("failed to load theater seat map")
            })?;
    if seat_ids.is_empty() {
        return Err(bad_request("theater has no provisioned seat map"));
    }

    let showtime: Showtime = sqlx::query_as(
        "INSERT INTO showtimes (theater_id, movie_id, starts_at, base_price, capacity)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING id, theater_id, movie_id, starts_at, base_price, capacity, created_at",
    )
    .bind(req.theater_id)
    .bind(req.movie_id)
    .bind(req.starts_at)
    .bind(req.base_price)
    .bind(seat_ids.len() as i32)
    .fetch_one(&state.db.pool)
    .await
    .map_err(|e| {
        if e.as_database_error()
            .map(|db| db.is_unique_violation())
            .unwrap_or(false)
        {
            return (
                StatusCode::CONFLICT,
                Json(json!({
                    "success": false,
                    "code": "duplicate_showtime",
                    "message": "a showtime already exists in this theater at this time",
                })),
            );
        }
        error!("failed to create showtime: {e}");
        internal_error("failed to create showtime")
    })?;

    let provisioned = state
        .seats
        .store()
        .bulk_provision(showtime.id, &seat_ids)
        .await
        .map_err(|e| {
            error!(showtime_id = %showtime.id, "seat status fan-out failed: {e}");
            internal_error("failed to provision seat statuses")
        })?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "showtime": showtime,
            "seats_provisioned": provisioned,
        })),
    ))
}

#[derive(Debug, Deserialize, Validate)]
struct ProvisionRequest {
    #[validate(length(min = 1, message = "at least one seat is required"))]
    seat_ids: Vec<Uuid>,
}

// POST /api/showtimes/{id}/provision — for showtimes scheduled by an external
// system. Re-running it for the same showtime fails instead of silently
// skipping duplicates.
async fn provision_showtime(
    State(state): State<Arc<AppState>>,
    Path(showtime_id): Path<Uuid>,
    Json(req): Json<ProvisionRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<Value>)> {
    req.validate().map_err(|e| bad_request(e.to_string()))?;

    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM showtimes WHERE id = $1)")
        .bind(showtime_id)
        .fetch_one(&state.db.pool)
        .await
        .map_err(|e| {
            error!("failed to check showtime: {e}");
            internal_error("failed to check showtime")
        })?;
    if !exists {
        return Err((
            StatusCode::NOT_FOUND,
            Json(json!({
                "success": false,
                "code": "not_found",
                "message": "showtime not found",
            })),
        ));
    }

    let provisioned = state
        .seats
        .store()
        .bulk_provision(showtime_id, &req.seat_ids)
        .await
        .map_err(|e| match e {
            StoreError::AlreadyProvisioned => (
                StatusCode::CONFLICT,
                Json(json!({
                    "success": false,
                    "code": "already_provisioned",
                    "message": "seat statuses already exist for this showtime",
                })),
            ),
            other => {
                error!(%showtime_id, "provisioning failed: {other}");
                internal_error("failed to provision seat statuses")
            }
        })?;

    let _ = sqlx::query("UPDATE showtimes SET capacity = $1 WHERE id = $2")
        .bind(provisioned as i32)
        .bind(showtime_id)
        .execute(&state.db.pool)
        .await;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "seats_provisioned": provisioned })),
    ))
}

// GET /api/showtimes/{id}/seats — non-realtime fallback returning the same
// snapshot shape the socket pushes.
async fn get_showtime_seats(
    State(state): State<Arc<AppState>>,
    Path(showtime_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, Json<Value>)> {
    match state.snapshots.snapshot(showtime_id).await {
        Ok(snapshot) => Ok((
            StatusCode::OK,
            Json(json!({ "success": true, "seats": snapshot.seats })),
        )),
        Err(SnapshotError::NotFound) => Err((
            StatusCode::NOT_FOUND,
            Json(json!({
                "success": false,
                "code": "not_found",
                "message": "showtime not found",
            })),
        )),
        Err(e) => {
            error!(%showtime_id, "failed to build snapshot: {e}");
            Err(internal_error("failed to load seats"))
        }
    }
}
