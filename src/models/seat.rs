use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Physical seat position inside a theater. Immutable after the seat map is
/// provisioned, except for operator reclassification of `class`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Seat {
    pub id: Uuid,
    pub theater_id: Uuid,
    pub seat_number: String,
    pub row: String,
    pub col: i32,
    pub class: SeatClass,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "seat_class", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SeatClass {
    Standard,
    Vip,
    Couple,
    Accessible,
}
