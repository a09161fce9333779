pub mod memory;
pub mod postgres;

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{SeatState, SeatStatus};

/// One conditional update against a SeatStatus row. The update applies only
/// if every expectation matches the row's current value; otherwise the store
/// reports [`StoreError::Conflict`] and the row is untouched.
#[derive(Debug, Clone)]
pub struct Transition {
    pub expected_state: SeatState,
    /// When set, the row's holder must equal this id.
    pub expected_holder: Option<Uuid>,
    /// When set, the row's hold expiry must be at or before this instant.
    pub expired_before: Option<DateTime<Utc>>,
    pub new_state: SeatState,
    pub new_holder: Option<Uuid>,
    pub new_expiry: Option<DateTime<Utc>>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("seat status not found")]
    NotFound,
    #[error("conditional update did not match the current row")]
    Conflict,
    #[error("seat statuses already provisioned for this showtime")]
    AlreadyProvisioned,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Storage for SeatStatus rows. `cas_transition` is the single mutation
/// primitive: every state change in the system goes through it, so the store
/// is the only synchronization point between concurrent seat intents.
#[allow(async_fn_in_trait)]
pub trait SeatStore: Clone + Send + Sync {
    async fn get(&self, showtime_id: Uuid, seat_id: Uuid) -> Result<SeatStatus, StoreError>;

    async fn get_by_id(&self, status_id: Uuid) -> Result<SeatStatus, StoreError>;

    /// All statuses for one showtime, ordered by seat row then column.
    async fn list_by_showtime(&self, showtime_id: Uuid) -> Result<Vec<SeatStatus>, StoreError>;

    async fn cas_transition(
        &self,
        status_id: Uuid,
        transition: Transition,
    ) -> Result<SeatStatus, StoreError>;

    /// Inserts one `available` status per seat. Fails with
    /// [`StoreError::AlreadyProvisioned`] if any (showtime, seat) pair
    /// already exists; it never silently skips duplicates.
    async fn bulk_provision(&self, showtime_id: Uuid, seat_ids: &[Uuid])
        -> Result<u64, StoreError>;

    /// Releases every `holding` row owned by the holder in the showtime and
    /// returns the released rows. Reserved rows are never touched.
    async fn release_holds_for_holder(
        &self,
        showtime_id: Uuid,
        holder_id: Uuid,
    ) -> Result<Vec<SeatStatus>, StoreError>;

    /// Holding rows whose expiry is at or before `now`; reaper feed.
    async fn list_expired_holds(&self, now: DateTime<Utc>)
        -> Result<Vec<SeatStatus>, StoreError>;
}
