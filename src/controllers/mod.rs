pub mod admin;
pub mod seats;
pub mod showtimes;
pub mod theaters;

use axum::{http::StatusCode, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::services::state_machine::SeatError;

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(seats::routes())
        .merge(showtimes::routes())
        .merge(theaters::routes())
        .merge(admin::routes())
}

pub(crate) fn seat_error(e: &SeatError) -> (StatusCode, Json<Value>) {
    let status = match e {
        SeatError::SeatUnavailable | SeatError::InvalidState => StatusCode::CONFLICT,
        SeatError::NotHolder => StatusCode::FORBIDDEN,
        SeatError::NotFound => StatusCode::NOT_FOUND,
        SeatError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(json!({
            "success": false,
            "code": e.code(),
            "message": e.to_string(),
        })),
    )
}

pub(crate) fn bad_request(message: impl Into<String>) -> (StatusCode, Json<Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "success": false,
            "code": "bad_request",
            "message": message.into(),
        })),
    )
}

pub(crate) fn internal_error(message: impl Into<String>) -> (StatusCode, Json<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "success": false,
            "code": "internal",
            "message": message.into(),
        })),
    )
}
