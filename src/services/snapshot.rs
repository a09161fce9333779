//! Read model for seat broadcasts and the REST fallback: the full
//! price-annotated seat list for one showtime, ordered by row then column.
//! Snapshots are cached per showtime and invalidated on every mutation.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use uuid::Uuid;

use crate::cache::CacheService;
use crate::database::Database;
use crate::models::{SeatClass, SeatState, Showtime};
use crate::services::pricing::PricingClient;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatView {
    pub seat_id: Uuid,
    pub seat_status_id: Uuid,
    pub seat_number: String,
    pub row: String,
    pub col: i32,
    pub class: SeatClass,
    pub state: SeatState,
    pub holder_id: Option<Uuid>,
    pub price: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShowtimeSnapshot {
    pub showtime_id: Uuid,
    pub seats: Vec<SeatView>,
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("showtime not found")]
    NotFound,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(FromRow)]
struct SnapshotRow {
    seat_status_id: Uuid,
    seat_id: Uuid,
    seat_number: String,
    row: String,
    col: i32,
    class: SeatClass,
    state: SeatState,
    holder_id: Option<Uuid>,
}

#[derive(Clone)]
pub struct SnapshotService {
    db: Database,
    cache: CacheService,
    pricing: PricingClient,
}

impl SnapshotService {
    pub fn new(db: Database, cache: CacheService, pricing: PricingClient) -> Self {
        Self { db, cache, pricing }
    }

    /// Cached read; builds from the database on a miss.
    pub async fn snapshot(&self, showtime_id: Uuid) -> Result<ShowtimeSnapshot, SnapshotError> {
        if let Some(hit) = self.cache.get_snapshot(showtime_id).await {
            return Ok(hit);
        }
        let snapshot = self.build(showtime_id).await?;
        self.cache.save_snapshot(&snapshot).await;
        Ok(snapshot)
    }

    /// Post-mutation read: drops the cached copy first so the result always
    /// reflects the committed state.
    pub async fn rebuild(&self, showtime_id: Uuid) -> Result<ShowtimeSnapshot, SnapshotError> {
        self.cache.invalidate_seats(showtime_id).await;
        let snapshot = self.build(showtime_id).await?;
        self.cache.save_snapshot(&snapshot).await;
        Ok(snapshot)
    }

    pub async fn invalidate(&self, showtime_id: Uuid) {
        self.cache.invalidate_seats(showtime_id).await;
    }

    async fn build(&self, showtime_id: Uuid) -> Result<ShowtimeSnapshot, SnapshotError> {
        let showtime: Showtime = sqlx::query_as(
            "SELECT id, theater_id, movie_id, starts_at, base_price, capacity, created_at
             FROM showtimes WHERE id = $1",
        )
        .bind(showtime_id)
        .fetch_optional(&self.db.pool)
        .await?
        .ok_or(SnapshotError::NotFound)?;

        let sheet = self.pricing.sheet_for(&showtime).await;

        let rows = sqlx::query_as::<_, SnapshotRow>(
            "SELECT st.id AS seat_status_id, s.id AS seat_id, s.seat_number,
                    s.\"row\", s.col, s.class, st.state, st.holder_id
             FROM seat_statuses st
             JOIN seats s ON s.id = st.seat_id
             WHERE st.showtime_id = $1
             ORDER BY s.\"row\", s.col",
        )
        .bind(showtime_id)
        .fetch_all(&self.db.pool)
        .await?;

        let seats = rows
            .into_iter()
            .map(|r| SeatView {
                price: sheet.price_for(r.class),
                seat_id: r.seat_id,
                seat_status_id: r.seat_status_id,
                seat_number: r.seat_number,
                row: r.row,
                col: r.col,
                class: r.class,
                state: r.state,
                holder_id: r.holder_id,
            })
            .collect();

        Ok(ShowtimeSnapshot { showtime_id, seats })
    }
}
