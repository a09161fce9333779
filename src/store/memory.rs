use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{SeatState, SeatStatus};
use crate::store::{SeatStore, StoreError, Transition};

/// In-memory store with a versioned compare-and-swap, for tests and local
/// runs without Postgres. The mutex makes each operation atomic; the version
/// counter mirrors the row-versioning a storage layer without native
/// conditional updates would use.
#[derive(Clone, Default)]
pub struct MemorySeatStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    rows: HashMap<Uuid, VersionedRow>,
    by_pair: HashMap<(Uuid, Uuid), Uuid>,
}

struct VersionedRow {
    status: SeatStatus,
    version: u64,
}

impl MemorySeatStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SeatStore for MemorySeatStore {
    async fn get(&self, showtime_id: Uuid, seat_id: Uuid) -> Result<SeatStatus, StoreError> {
        let inner = self.inner.lock().unwrap();
        let id = inner
            .by_pair
            .get(&(showtime_id, seat_id))
            .ok_or(StoreError::NotFound)?;
        Ok(inner.rows[id].status.clone())
    }

    async fn get_by_id(&self, status_id: Uuid) -> Result<SeatStatus, StoreError> {
        let inner = self.inner.lock().unwrap();
        inner
            .rows
            .get(&status_id)
            .map(|row| row.status.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn list_by_showtime(&self, showtime_id: Uuid) -> Result<Vec<SeatStatus>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut rows: Vec<SeatStatus> = inner
            .rows
            .values()
            .filter(|row| row.status.showtime_id == showtime_id)
            .map(|row| row.status.clone())
            .collect();
        // No seat metadata here; seat id stands in for the row/column order
        // the Postgres implementation gets from its join.
        rows.sort_by_key(|status| status.seat_id);
        Ok(rows)
    }

    async fn cas_transition(
        &self,
        status_id: Uuid,
        transition: Transition,
    ) -> Result<SeatStatus, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let row = inner.rows.get_mut(&status_id).ok_or(StoreError::NotFound)?;

        if row.status.state != transition.expected_state {
            return Err(StoreError::Conflict);
        }
        if let Some(holder) = transition.expected_holder {
            if row.status.holder_id != Some(holder) {
                return Err(StoreError::Conflict);
            }
        }
        if let Some(deadline) = transition.expired_before {
            match row.status.hold_expires_at {
                Some(expiry) if expiry <= deadline => {}
                _ => return Err(StoreError::Conflict),
            }
        }

        row.status.state = transition.new_state;
        row.status.holder_id = transition.new_holder;
        row.status.hold_expires_at = transition.new_expiry;
        row.status.updated_at = Utc::now();
        row.version += 1;
        Ok(row.status.clone())
    }

    async fn bulk_provision(
        &self,
        showtime_id: Uuid,
        seat_ids: &[Uuid],
    ) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        for seat_id in seat_ids {
            if inner.by_pair.contains_key(&(showtime_id, *seat_id)) {
                return Err(StoreError::AlreadyProvisioned);
            }
        }
        for seat_id in seat_ids {
            let id = Uuid::new_v4();
            inner.by_pair.insert((showtime_id, *seat_id), id);
            inner.rows.insert(
                id,
                VersionedRow {
                    status: SeatStatus {
                        id,
                        showtime_id,
                        seat_id: *seat_id,
                        state: SeatState::Available,
                        holder_id: None,
                        hold_expires_at: None,
                        updated_at: Utc::now(),
                    },
                    version: 0,
                },
            );
        }
        Ok(seat_ids.len() as u64)
    }

    async fn release_holds_for_holder(
        &self,
        showtime_id: Uuid,
        holder_id: Uuid,
    ) -> Result<Vec<SeatStatus>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let mut released = Vec::new();
        for row in inner.rows.values_mut() {
            if row.status.showtime_id == showtime_id
                && row.status.holder_id == Some(holder_id)
                && row.status.state == SeatState::Holding
            {
                row.status.state = SeatState::Available;
                row.status.holder_id = None;
                row.status.hold_expires_at = None;
                row.status.updated_at = Utc::now();
                row.version += 1;
                released.push(row.status.clone());
            }
        }
        Ok(released)
    }

    async fn list_expired_holds(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<SeatStatus>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let expired = inner
            .rows
            .values()
            .filter(|row| {
                row.status.state == SeatState::Holding
                    && row.status.hold_expires_at.is_some_and(|expiry| expiry <= now)
            })
            .map(|row| row.status.clone())
            .collect();
        Ok(expired)
    }
}
