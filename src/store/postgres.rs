use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::database::Database;
use crate::models::SeatStatus;
use crate::store::{SeatStore, StoreError, Transition};

const STATUS_COLUMNS: &str =
    "id, showtime_id, seat_id, state, holder_id, hold_expires_at, updated_at";

/// Postgres-backed store. The conditional update is a single `UPDATE … WHERE`
/// statement, so concurrent intents for the same seat are serialized by the
/// database row lock and exactly one of them matches.
#[derive(Clone)]
pub struct PgSeatStore {
    db: Database,
}

impl PgSeatStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

impl SeatStore for PgSeatStore {
    async fn get(&self, showtime_id: Uuid, seat_id: Uuid) -> Result<SeatStatus, StoreError> {
        let query = format!(
            "SELECT {STATUS_COLUMNS} FROM seat_statuses WHERE showtime_id = $1 AND seat_id = $2"
        );
        sqlx::query_as::<_, SeatStatus>(&query)
            .bind(showtime_id)
            .bind(seat_id)
            .fetch_optional(&self.db.pool)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn get_by_id(&self, status_id: Uuid) -> Result<SeatStatus, StoreError> {
        let query = format!("SELECT {STATUS_COLUMNS} FROM seat_statuses WHERE id = $1");
        sqlx::query_as::<_, SeatStatus>(&query)
            .bind(status_id)
            .fetch_optional(&self.db.pool)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn list_by_showtime(&self, showtime_id: Uuid) -> Result<Vec<SeatStatus>, StoreError> {
        let rows = sqlx::query_as::<_, SeatStatus>(
            "SELECT st.id, st.showtime_id, st.seat_id, st.state, st.holder_id,
                    st.hold_expires_at, st.updated_at
             FROM seat_statuses st
             JOIN seats s ON s.id = st.seat_id
             WHERE st.showtime_id = $1
             ORDER BY s.\"row\", s.col",
        )
        .bind(showtime_id)
        .fetch_all(&self.db.pool)
        .await?;
        Ok(rows)
    }

    async fn cas_transition(
        &self,
        status_id: Uuid,
        transition: Transition,
    ) -> Result<SeatStatus, StoreError> {
        let mut query = String::from(
            "UPDATE seat_statuses
             SET state = $1, holder_id = $2, hold_expires_at = $3, updated_at = NOW()
             WHERE id = $4 AND state = $5",
        );
        let mut bind_idx = 6;
        if transition.expected_holder.is_some() {
            query.push_str(&format!(" AND holder_id = ${bind_idx}"));
            bind_idx += 1;
        }
        if transition.expired_before.is_some() {
            query.push_str(&format!(
                " AND hold_expires_at IS NOT NULL AND hold_expires_at <= ${bind_idx}"
            ));
        }
        query.push_str(&format!(" RETURNING {STATUS_COLUMNS}"));

        let mut dbq = sqlx::query_as::<_, SeatStatus>(&query)
            .bind(transition.new_state)
            .bind(transition.new_holder)
            .bind(transition.new_expiry)
            .bind(status_id)
            .bind(transition.expected_state);
        if let Some(holder) = transition.expected_holder {
            dbq = dbq.bind(holder);
        }
        if let Some(deadline) = transition.expired_before {
            dbq = dbq.bind(deadline);
        }

        match dbq.fetch_optional(&self.db.pool).await? {
            Some(row) => Ok(row),
            None => {
                // Nothing matched: either the row is gone or someone else
                // already acted. The caller classifies the conflict.
                let exists: bool = sqlx::query_scalar(
                    "SELECT EXISTS(SELECT 1 FROM seat_statuses WHERE id = $1)",
                )
                .bind(status_id)
                .fetch_one(&self.db.pool)
                .await?;
                if exists {
                    Err(StoreError::Conflict)
                } else {
                    Err(StoreError::NotFound)
                }
            }
        }
    }

    async fn bulk_provision(
        &self,
        showtime_id: Uuid,
        seat_ids: &[Uuid],
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "INSERT INTO seat_statuses (showtime_id, seat_id, state)
             SELECT $1, seat_id, 'available'::seat_state
             FROM UNNEST($2::uuid[]) AS t(seat_id)",
        )
        .bind(showtime_id)
        .bind(seat_ids)
        .execute(&self.db.pool)
        .await;

        match result {
            Ok(done) => Ok(done.rows_affected()),
            Err(e) => {
                if e.as_database_error()
                    .map(|db| db.is_unique_violation())
                    .unwrap_or(false)
                {
                    Err(StoreError::AlreadyProvisioned)
                } else {
                    Err(e.into())
                }
            }
        }
    }

    async fn release_holds_for_holder(
        &self,
        showtime_id: Uuid,
        holder_id: Uuid,
    ) -> Result<Vec<SeatStatus>, StoreError> {
        let query = format!(
            "UPDATE seat_statuses
             SET state = 'available', holder_id = NULL, hold_expires_at = NULL, updated_at = NOW()
             WHERE showtime_id = $1 AND holder_id = $2 AND state = 'holding'
             RETURNING {STATUS_COLUMNS}"
        );
        let rows = sqlx::query_as::<_, SeatStatus>(&query)
            .bind(showtime_id)
            .bind(holder_id)
            .fetch_all(&self.db.pool)
            .await?;
        Ok(rows)
    }

    async fn list_expired_holds(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<SeatStatus>, StoreError> {
        let query = format!(
            "SELECT {STATUS_COLUMNS} FROM seat_statuses
             WHERE state = 'holding' AND hold_expires_at <= $1"
        );
        let rows = sqlx::query_as::<_, SeatStatus>(&query)
            .bind(now)
            .fetch_all(&self.db.pool)
            .await?;
        Ok(rows)
    }
}
