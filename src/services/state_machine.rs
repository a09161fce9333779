//! Seat transition rules. Every operation is one conditional update against
//! the store; when two intents race for the same seat, the first write to
//! land wins and the loser gets a domain error telling it to re-fetch. The
//! machine never retries on its own.

use chrono::{Duration, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{SeatState, SeatStatus};
use crate::store::{SeatStore, StoreError, Transition};

#[derive(Debug, Error)]
pub enum SeatError {
    /// Seat is not `available`; the caller should re-fetch the snapshot and
    /// pick another seat.
    #[error("seat is no longer available")]
    SeatUnavailable,
    /// Caller does not own the hold it tried to release or confirm.
    #[error("seat is held by another user")]
    NotHolder,
    /// The seat's current state does not support the requested transition.
    #[error("transition not allowed from the seat's current state")]
    InvalidState,
    #[error("showtime or seat not found")]
    NotFound,
    #[error("storage error: {0}")]
    Store(StoreError),
}

impl SeatError {
    /// Stable code surfaced to clients alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            SeatError::SeatUnavailable => "seat_unavailable",
            SeatError::NotHolder => "not_holder",
            SeatError::InvalidState => "invalid_state",
            SeatError::NotFound => "not_found",
            SeatError::Store(_) => "internal",
        }
    }
}

impl From<StoreError> for SeatError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => SeatError::NotFound,
            other => SeatError::Store(other),
        }
    }
}

/// Per-seat outcome report for a multi-seat confirmation. Each seat's
/// transition is independently atomic; the caller decides whether to
/// compensate the confirmed seats when some fail.
#[derive(Debug, Default)]
pub struct BulkConfirmOutcome {
    pub confirmed: Vec<SeatStatus>,
    pub failed: Vec<SeatFailure>,
}

#[derive(Debug)]
pub struct SeatFailure {
    pub showtime_id: Uuid,
    pub seat_id: Uuid,
    pub error: SeatError,
}

#[derive(Clone)]
pub struct SeatStateMachine<S: SeatStore> {
    store: S,
    hold_duration: Duration,
}

impl<S: SeatStore> SeatStateMachine<S> {
    pub fn new(store: S, hold_duration_secs: u64) -> Self {
        Self {
            store,
            hold_duration: Duration::seconds(hold_duration_secs as i64),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// `available` → `holding` with a server-side expiry.
    pub async fn hold(
        &self,
        showtime_id: Uuid,
        seat_id: Uuid,
        holder_id: Uuid,
    ) -> Result<SeatStatus, SeatError> {
        let status = self.store.get(showtime_id, seat_id).await?;
        let transition = Transition {
            expected_state: SeatState::Available,
            expected_holder: None,
            expired_before: None,
            new_state: SeatState::Holding,
            new_holder: Some(holder_id),
            new_expiry: Some(Utc::now() + self.hold_duration),
        };
        match self.store.cas_transition(status.id, transition).await {
            Ok(row) => Ok(row),
            Err(StoreError::Conflict) => Err(SeatError::SeatUnavailable),
            Err(e) => Err(e.into()),
        }
    }

    /// `holding` → `available`, owner only.
    pub async fn release(
        &self,
        showtime_id: Uuid,
        seat_id: Uuid,
        holder_id: Uuid,
    ) -> Result<SeatStatus, SeatError> {
        let status = self.store.get(showtime_id, seat_id).await?;
        let transition = Transition {
            expected_state: SeatState::Holding,
            expected_holder: Some(holder_id),
            expired_before: None,
            new_state: SeatState::Available,
            new_holder: None,
            new_expiry: None,
        };
        match self.store.cas_transition(status.id, transition).await {
            Ok(row) => Ok(row),
            Err(StoreError::Conflict) => {
                Err(self.classify_ownership_conflict(status.id, holder_id).await)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// `holding` → `reserved`, owner only. Terminal under normal flow.
    pub async fn confirm(
        &self,
        showtime_id: Uuid,
        seat_id: Uuid,
        holder_id: Uuid,
    ) -> Result<SeatStatus, SeatError> {
        let status = self.store.get(showtime_id, seat_id).await?;
        let transition = Transition {
            expected_state: SeatState::Holding,
            expected_holder: Some(holder_id),
            expired_before: None,
            new_state: SeatState::Reserved,
            new_holder: Some(holder_id),
            new_expiry: None,
        };
        match self.store.cas_transition(status.id, transition).await {
            Ok(row) => Ok(row),
            Err(StoreError::Conflict) => {
                Err(self.classify_ownership_conflict(status.id, holder_id).await)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// `available` → `reserved` fast path for already-validated server-side
    /// booking flows.
    pub async fn reserve_direct(
        &self,
        showtime_id: Uuid,
        seat_id: Uuid,
        holder_id: Uuid,
    ) -> Result<SeatStatus, SeatError> {
        let status = self.store.get(showtime_id, seat_id).await?;
        let transition = Transition {
            expected_state: SeatState::Available,
            expected_holder: None,
            expired_before: None,
            new_state: SeatState::Reserved,
            new_holder: Some(holder_id),
            new_expiry: None,
        };
        match self.store.cas_transition(status.id, transition).await {
            Ok(row) => Ok(row),
            Err(StoreError::Conflict) => Err(SeatError::SeatUnavailable),
            Err(e) => Err(e.into()),
        }
    }

    /// Reaper path: `holding` → `available` once the expiry has passed.
    /// Returns `Ok(None)` when the seat already moved on (released, confirmed
    /// or re-held) or the expiry is still in the future — a benign race, not
    /// an error.
    pub async fn expire(
        &self,
        showtime_id: Uuid,
        seat_id: Uuid,
    ) -> Result<Option<SeatStatus>, SeatError> {
        let status = self.store.get(showtime_id, seat_id).await?;
        if status.state != SeatState::Holding {
            return Ok(None);
        }
        let transition = Transition {
            expected_state: SeatState::Holding,
            expected_holder: status.holder_id,
            expired_before: Some(Utc::now()),
            new_state: SeatState::Available,
            new_holder: None,
            new_expiry: None,
        };
        match self.store.cas_transition(status.id, transition).await {
            Ok(row) => Ok(Some(row)),
            Err(StoreError::Conflict) | Err(StoreError::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Administrative release of a `reserved` seat, e.g. after a ticket
    /// cancellation. The only path out of `reserved`.
    pub async fn admin_release(
        &self,
        showtime_id: Uuid,
        seat_id: Uuid,
    ) -> Result<SeatStatus, SeatError> {
        let status = self.store.get(showtime_id, seat_id).await?;
        let transition = Transition {
            expected_state: SeatState::Reserved,
            expected_holder: None,
            expired_before: None,
            new_state: SeatState::Available,
            new_holder: None,
            new_expiry: None,
        };
        match self.store.cas_transition(status.id, transition).await {
            Ok(row) => Ok(row),
            Err(StoreError::Conflict) => Err(SeatError::InvalidState),
            Err(e) => Err(e.into()),
        }
    }

    /// Releases every hold the holder has in the showtime; used on
    /// disconnect and cancellation. Reserved seats are untouched.
    pub async fn release_all_for_holder(
        &self,
        showtime_id: Uuid,
        holder_id: Uuid,
    ) -> Result<Vec<SeatStatus>, SeatError> {
        Ok(self
            .store
            .release_holds_for_holder(showtime_id, holder_id)
            .await?)
    }

    /// Confirms each (showtime, seat) pair independently and reports which
    /// seats failed and why. One seat losing its precondition never rolls
    /// back the others.
    pub async fn bulk_confirm(
        &self,
        seats: &[(Uuid, Uuid)],
        holder_id: Uuid,
    ) -> Result<BulkConfirmOutcome, SeatError> {
        let mut outcome = BulkConfirmOutcome::default();
        for &(showtime_id, seat_id) in seats {
            match self.confirm(showtime_id, seat_id, holder_id).await {
                Ok(row) => outcome.confirmed.push(row),
                Err(SeatError::Store(e)) => return Err(SeatError::Store(e)),
                Err(error) => outcome.failed.push(SeatFailure {
                    showtime_id,
                    seat_id,
                    error,
                }),
            }
        }
        Ok(outcome)
    }

    /// Re-reads the row once after a lost owner-guarded CAS to tell a
    /// permission problem apart from a state problem.
    async fn classify_ownership_conflict(&self, status_id: Uuid, holder_id: Uuid) -> SeatError {
        match self.store.get_by_id(status_id).await {
            Ok(current) => {
                if current.state != SeatState::Holding {
                    SeatError::InvalidState
                } else if current.holder_id != Some(holder_id) {
                    SeatError::NotHolder
                } else {
                    // Matched on re-read: the CAS raced with a concurrent
                    // identical intent that already completed.
                    SeatError::InvalidState
                }
            }
            Err(StoreError::NotFound) => SeatError::NotFound,
            Err(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemorySeatStore;

    const HOLD_SECS: u64 = 300;

    async fn machine_with_seats(
        count: usize,
    ) -> (SeatStateMachine<MemorySeatStore>, Uuid, Vec<Uuid>) {
        let store = MemorySeatStore::new();
        let showtime = Uuid::new_v4();
        let seats: Vec<Uuid> = (0..count).map(|_| Uuid::new_v4()).collect();
        store.bulk_provision(showtime, &seats).await.unwrap();
        (SeatStateMachine::new(store, HOLD_SECS), showtime, seats)
    }

    #[tokio::test]
    async fn hold_then_release_round_trip() {
        let (machine, showtime, seats) = machine_with_seats(1).await;
        let holder = Uuid::new_v4();

        let held = machine.hold(showtime, seats[0], holder).await.unwrap();
        assert_eq!(held.state, SeatState::Holding);
        assert_eq!(held.holder_id, Some(holder));
        assert!(held.hold_expires_at.is_some());
        assert!(held.holder_invariant_holds());

        let released = machine.release(showtime, seats[0], holder).await.unwrap();
        assert_eq!(released.state, SeatState::Available);
        assert_eq!(released.holder_id, None);
        assert_eq!(released.hold_expires_at, None);
        assert!(released.holder_invariant_holds());
    }

    #[tokio::test]
    async fn concurrent_holds_exactly_one_wins() {
        let (machine, showtime, seats) = machine_with_seats(1).await;
        let u1 = Uuid::new_v4();
        let u2 = Uuid::new_v4();

        let (r1, r2) = tokio::join!(
            machine.hold(showtime, seats[0], u1),
            machine.hold(showtime, seats[0], u2),
        );

        let winners = [r1.is_ok(), r2.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(winners, 1, "exactly one hold must win");
        let loser = if r1.is_ok() { r2 } else { r1 };
        assert!(matches!(loser.unwrap_err(), SeatError::SeatUnavailable));

        let final_state = machine.store().get(showtime, seats[0]).await.unwrap();
        assert_eq!(final_state.state, SeatState::Holding);
        assert!(final_state.holder_id == Some(u1) || final_state.holder_id == Some(u2));
    }

    #[tokio::test]
    async fn expire_noops_before_deadline_and_fires_after() {
        let (machine, showtime, seats) = machine_with_seats(1).await;
        let holder = Uuid::new_v4();
        machine.hold(showtime, seats[0], holder).await.unwrap();

        // Expiry is five minutes out; the reaper firing early is a no-op.
        assert!(machine.expire(showtime, seats[0]).await.unwrap().is_none());
        let still_held = machine.store().get(showtime, seats[0]).await.unwrap();
        assert_eq!(still_held.state, SeatState::Holding);

        // A zero-duration machine over the same store produces an
        // already-expired hold.
        let instant = SeatStateMachine::new(machine.store().clone(), 0);
        machine.release(showtime, seats[0], holder).await.unwrap();
        instant.hold(showtime, seats[0], holder).await.unwrap();
        let expired = instant.expire(showtime, seats[0]).await.unwrap().unwrap();
        assert_eq!(expired.state, SeatState::Available);
        assert_eq!(expired.holder_id, None);
    }

    #[tokio::test]
    async fn expire_after_seat_moved_on_is_a_noop() {
        let (machine, showtime, seats) = machine_with_seats(1).await;
        let holder = Uuid::new_v4();
        machine.hold(showtime, seats[0], holder).await.unwrap();
        machine.confirm(showtime, seats[0], holder).await.unwrap();

        assert!(machine.expire(showtime, seats[0]).await.unwrap().is_none());
        let reserved = machine.store().get(showtime, seats[0]).await.unwrap();
        assert_eq!(reserved.state, SeatState::Reserved);
    }

    #[tokio::test]
    async fn confirm_by_non_holder_is_rejected_and_state_unchanged() {
        let (machine, showtime, seats) = machine_with_seats(1).await;
        let owner = Uuid::new_v4();
        let intruder = Uuid::new_v4();
        machine.hold(showtime, seats[0], owner).await.unwrap();

        let err = machine
            .confirm(showtime, seats[0], intruder)
            .await
            .unwrap_err();
        assert!(matches!(err, SeatError::NotHolder));

        let status = machine.store().get(showtime, seats[0]).await.unwrap();
        assert_eq!(status.state, SeatState::Holding);
        assert_eq!(status.holder_id, Some(owner));
    }

    #[tokio::test]
    async fn release_by_non_holder_is_rejected() {
        let (machine, showtime, seats) = machine_with_seats(1).await;
        let owner = Uuid::new_v4();
        machine.hold(showtime, seats[0], owner).await.unwrap();

        let err = machine
            .release(showtime, seats[0], Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, SeatError::NotHolder));
    }

    #[tokio::test]
    async fn full_booking_scenario() {
        // S with seat A101 available; U1 holds, U2 loses, U1 confirms, U1
        // cannot release the reserved seat via the holder path.
        let (machine, showtime, seats) = machine_with_seats(1).await;
        let u1 = Uuid::new_v4();
        let u2 = Uuid::new_v4();

        let held = machine.hold(showtime, seats[0], u1).await.unwrap();
        assert_eq!(held.state, SeatState::Holding);
        assert_eq!(held.holder_id, Some(u1));

        let err = machine.hold(showtime, seats[0], u2).await.unwrap_err();
        assert!(matches!(err, SeatError::SeatUnavailable));

        let reserved = machine.confirm(showtime, seats[0], u1).await.unwrap();
        assert_eq!(reserved.state, SeatState::Reserved);

        let err = machine.release(showtime, seats[0], u1).await.unwrap_err();
        assert!(matches!(err, SeatError::InvalidState));
    }

    #[tokio::test]
    async fn reserve_direct_takes_available_seats_only() {
        let (machine, showtime, seats) = machine_with_seats(2).await;
        let holder = Uuid::new_v4();

        let reserved = machine
            .reserve_direct(showtime, seats[0], holder)
            .await
            .unwrap();
        assert_eq!(reserved.state, SeatState::Reserved);
        assert_eq!(reserved.hold_expires_at, None);

        machine.hold(showtime, seats[1], Uuid::new_v4()).await.unwrap();
        let err = machine
            .reserve_direct(showtime, seats[1], holder)
            .await
            .unwrap_err();
        assert!(matches!(err, SeatError::SeatUnavailable));
    }

    #[tokio::test]
    async fn release_all_skips_reserved_seats() {
        let (machine, showtime, seats) = machine_with_seats(4).await;
        let holder = Uuid::new_v4();

        for seat in &seats[..3] {
            machine.hold(showtime, *seat, holder).await.unwrap();
        }
        machine.hold(showtime, seats[3], holder).await.unwrap();
        machine.confirm(showtime, seats[3], holder).await.unwrap();

        let released = machine
            .release_all_for_holder(showtime, holder)
            .await
            .unwrap();
        assert_eq!(released.len(), 3);
        assert!(released.iter().all(|s| s.state == SeatState::Available));

        let reserved = machine.store().get(showtime, seats[3]).await.unwrap();
        assert_eq!(reserved.state, SeatState::Reserved);
        assert_eq!(reserved.holder_id, Some(holder));
    }

    #[tokio::test]
    async fn bulk_confirm_reports_per_seat_failures() {
        let (machine, showtime, seats) = machine_with_seats(4).await;
        let buyer = Uuid::new_v4();
        let rival = Uuid::new_v4();

        machine.hold(showtime, seats[0], buyer).await.unwrap();
        machine.hold(showtime, seats[1], buyer).await.unwrap();
        machine.hold(showtime, seats[2], rival).await.unwrap();
        // seats[3] stays available: confirming it is an invalid transition.

        let request: Vec<(Uuid, Uuid)> = seats.iter().map(|s| (showtime, *s)).collect();
        let outcome = machine.bulk_confirm(&request, buyer).await.unwrap();

        assert_eq!(outcome.confirmed.len(), 2);
        assert_eq!(outcome.failed.len(), 2);

        let rival_failure = outcome
            .failed
            .iter()
            .find(|f| f.seat_id == seats[2])
            .unwrap();
        assert!(matches!(rival_failure.error, SeatError::NotHolder));

        let available_failure = outcome
            .failed
            .iter()
            .find(|f| f.seat_id == seats[3])
            .unwrap();
        assert!(matches!(available_failure.error, SeatError::InvalidState));

        // Confirmed seats stay confirmed; no cross-seat rollback.
        let first = machine.store().get(showtime, seats[0]).await.unwrap();
        assert_eq!(first.state, SeatState::Reserved);
    }

    #[tokio::test]
    async fn admin_release_frees_reserved_seats_only() {
        let (machine, showtime, seats) = machine_with_seats(2).await;
        let holder = Uuid::new_v4();
        machine.hold(showtime, seats[0], holder).await.unwrap();
        machine.confirm(showtime, seats[0], holder).await.unwrap();

        let freed = machine.admin_release(showtime, seats[0]).await.unwrap();
        assert_eq!(freed.state, SeatState::Available);
        assert_eq!(freed.holder_id, None);

        let err = machine.admin_release(showtime, seats[1]).await.unwrap_err();
        assert!(matches!(err, SeatError::InvalidState));
    }

    #[tokio::test]
    async fn unknown_seat_is_not_found() {
        let (machine, showtime, _) = machine_with_seats(1).await;
        let err = machine
            .hold(showtime, Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, SeatError::NotFound));
    }

    mod random_intents {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone, Copy)]
        enum Intent {
            Hold,
            Release,
            Confirm,
            AdminRelease,
            Expire,
        }

        fn intent() -> impl Strategy<Value = Intent> {
            prop_oneof![
                Just(Intent::Hold),
                Just(Intent::Release),
                Just(Intent::Confirm),
                Just(Intent::AdminRelease),
                Just(Intent::Expire),
            ]
        }

        proptest! {
            // Whatever two holders throw at one seat, every intermediate
            // state keeps the holder iff the seat is held or reserved.
            #[test]
            fn holder_invariant_holds_under_arbitrary_interleavings(
                ops in proptest::collection::vec((intent(), any::<bool>()), 1..40),
            ) {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .build()
                    .unwrap();
                rt.block_on(async {
                    let (machine, showtime, seats) = machine_with_seats(1).await;
                    let holders = [Uuid::new_v4(), Uuid::new_v4()];
                    let seat = seats[0];

                    for (op, pick_second) in ops {
                        let holder = holders[pick_second as usize];
                        // Rejected intents are expected here; only the
                        // invariant matters.
                        let _ = match op {
                            Intent::Hold => machine.hold(showtime, seat, holder).await.map(Some),
                            Intent::Release => {
                                machine.release(showtime, seat, holder).await.map(Some)
                            }
                            Intent::Confirm => {
                                machine.confirm(showtime, seat, holder).await.map(Some)
                            }
                            Intent::AdminRelease => {
                                machine.admin_release(showtime, seat).await.map(Some)
                            }
                            Intent::Expire => machine.expire(showtime, seat).await,
                        };
                        let status = machine.store().get(showtime, seat).await.unwrap();
                        prop_assert!(status.holder_invariant_holds());
                    }
                    Ok(())
                })?;
            }
        }
    }

    #[tokio::test]
    async fn holder_invariant_survives_every_transition() {
        let (machine, showtime, seats) = machine_with_seats(1).await;
        let holder = Uuid::new_v4();
        let seat = seats[0];

        machine.hold(showtime, seat, holder).await.unwrap();
        assert!(machine.store().get(showtime, seat).await.unwrap().holder_invariant_holds());
        machine.release(showtime, seat, holder).await.unwrap();
        assert!(machine.store().get(showtime, seat).await.unwrap().holder_invariant_holds());
        machine.hold(showtime, seat, holder).await.unwrap();
        machine.confirm(showtime, seat, holder).await.unwrap();
        assert!(machine.store().get(showtime, seat).await.unwrap().holder_invariant_holds());
        machine.admin_release(showtime, seat).await.unwrap();
        assert!(machine.store().get(showtime, seat).await.unwrap().holder_invariant_holds());
    }
}
