use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Showtime {
    pub id: Uuid,
    pub theater_id: Uuid,
    pub movie_id: Uuid,
    pub starts_at: DateTime<Utc>,
    /// Base ticket price in the smallest currency unit.
    pub base_price: i64,
    /// Seat capacity snapshot taken at provisioning time.
    pub capacity: i32,
    pub created_at: DateTime<Utc>,
}
