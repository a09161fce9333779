use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;
use validator::Validate;

use crate::controllers::{bad_request, internal_error};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/theaters", post(create_theater))
        .route("/theaters/{theater_id}/seatmap", post(provision_seatmap))
}

#[derive(Debug, Deserialize, Validate)]
struct CreateTheaterRequest {
    #[validate(length(min = 1, message = "name must not be empty"))]
    name: String,
}

// POST /api/theaters — registers a theater so its seat map can be
// provisioned; theater management itself lives upstream.
async fn create_theater(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTheaterRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<Value>)> {
    req.validate().map_err(|e| bad_request(e.to_string()))?;

    let id: Uuid = sqlx::query_scalar("INSERT INTO theaters (name) VALUES ($1) RETURNING id")
        .bind(&req.name)
        .fetch_one(&state.db.pool)
        .await
        .map_err(|e| {
            error!("failed to create theater: {e}");
            internal_error("failed to create theater")
        })?;

    Ok((StatusCode::CREATED, Json(json!({ "success": true, "id": id }))))
}

#[derive(Debug, Deserialize, Validate)]
struct SeatmapRequest {
    #[validate(range(min = 1, max = 26, message = "rows must be between 1 and 26"))]
    rows: i32,
    #[validate(range(min = 1, max = 100, message = "cols must be between 1 and 100"))]
    cols: i32,
    /// Row labels (e.g. "A") whose seats are created as vip.
    #[serde(default)]
    vip_rows: Vec<String>,
}

// POST /api/theaters/{id}/seatmap — bulk-creates the row×column grid. Rows
// are lettered A.., seat numbers are "A1" style, matching how the seat map
// renders client-side.
async fn provision_seatmap(
    State(state): State<Arc<AppState>>,
    Path(theater_id): Path<Uuid>,
    Json(req): Json<SeatmapRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<Value>)> {
    req.validate().map_err(|e| bad_request(e.to_string()))?;

    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM theaters WHERE id = $1)")
        .bind(theater_id)
        .fetch_one(&state.db.pool)
        .await
        .map_err(|e| {
            error!("failed to check theater: {e}");
            internal_error("failed to check theater")
        })?;
    if !exists {
        return Err((
            StatusCode::NOT_FOUND,
            Json(json!({
                "success": false,
                "code": "not_found",
                "message": "theater not found",
            })),
        ));
    }

    let mut seat_numbers = Vec::new();
    let mut row_labels = Vec::new();
    let mut cols = Vec::new();
    let mut classes = Vec::new();
    for row_idx in 0..req.rows {
        let row = char::from(b'A' + row_idx as u8).to_string();
        let class = if req.vip_rows.contains(&row) {
            "vip"
        } else {
            "standard"
        };
        for col in 1..=req.cols {
            seat_numbers.push(format!("{row}{col}"));
            row_labels.push(row.clone());
            cols.push(col);
            classes.push(class.to_string());
        }
    }

    let result = sqlx::query(
        "INSERT INTO seats (theater_id, seat_number, \"row\", col, class)
         SELECT $1, t.seat_number, t.\"row\", t.col, t.class::seat_class
         FROM UNNEST($2::text[], $3::text[], $4::int[], $5::text[])
              AS t(seat_number, \"row\", col, class)",
    )
    .bind(theater_id)
    .bind(&seat_numbers)
    .bind(&row_labels)
    .bind(&cols)
    .bind(&classes)
    .execute(&state.db.pool)
    .await;

    match result {
        Ok(done) => Ok((
            StatusCode::CREATED,
            Json(json!({ "success": true, "seats_created": done.rows_affected() })),
        )),
        Err(e) => {
            if e.as_database_error()
                .map(|db| db.is_unique_violation())
                .unwrap_or(false)
            {
                return Err((
                    StatusCode::CONFLICT,
                    Json(json!({
                        "success": false,
                        "code": "seatmap_exists",
                        "message": "this theater already has overlapping seats",
                    })),
                ));
            }
            error!(%theater_id, "seat map provisioning failed: {e}");
            Err(internal_error("failed to provision seat map"))
        }
    }
}
