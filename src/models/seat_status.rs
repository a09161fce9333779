use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Current state of one (showtime, seat) pair. Exactly one row exists per
/// pair, enforced by a unique constraint in the schema.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SeatStatus {
    pub id: Uuid,
    pub showtime_id: Uuid,
    pub seat_id: Uuid,
    pub state: SeatState,
    /// Non-null iff state is `holding` or `reserved`.
    pub holder_id: Option<Uuid>,
    /// Set while `holding`, cleared on every other state.
    pub hold_expires_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl SeatStatus {
    /// Checks the holder invariant: a seat has an owner exactly when it is
    /// held or reserved.
    pub fn holder_invariant_holds(&self) -> bool {
        match self.state {
            SeatState::Available => self.holder_id.is_none(),
            SeatState::Holding | SeatState::Reserved => self.holder_id.is_some(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "seat_state", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SeatState {
    Available,
    Holding,
    Reserved,
}
