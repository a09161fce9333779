//! Background enforcement of hold expiry. Clients are never trusted to
//! release their own holds in time; this task revisits every `holding` seat
//! at or after its expiry timestamp and returns it to `available` through the
//! same state-machine path the realtime layer uses.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::store::SeatStore;
use crate::AppState;

pub struct HoldReaper {
    state: Arc<AppState>,
    interval: Duration,
}

impl HoldReaper {
    pub fn new(state: Arc<AppState>) -> Self {
        let interval = Duration::from_secs(state.config.hold.reaper_interval_secs);
        Self { state, interval }
    }

    /// Fixed-interval loop, spawned once from `main`. An interval sweep (as
    /// opposed to one timer per hold) survives restarts without re-arming
    /// anything: expired holds are found by querying the store.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            self.reap_once().await;
        }
    }

    /// One sweep. Returns the number of holds actually expired.
    pub async fn reap_once(&self) -> usize {
        let due = match self.state.seats.store().list_expired_holds(Utc::now()).await {
            Ok(rows) => rows,
            Err(e) => {
                error!("reaper failed to list expired holds: {e}");
                return 0;
            }
        };
        if due.is_empty() {
            return 0;
        }

        info!("Found {} expired holds to release", due.len());

        let mut expired = 0usize;
        let mut touched_showtimes: HashSet<Uuid> = HashSet::new();
        for status in due {
            match self
                .state
                .seats
                .expire(status.showtime_id, status.seat_id)
                .await
            {
                Ok(Some(_)) => {
                    expired += 1;
                    touched_showtimes.insert(status.showtime_id);
                }
                // The holder released or confirmed between the scan and the
                // expiry write. Benign.
                Ok(None) => {
                    debug!(seat_id = %status.seat_id, "hold moved on before expiry fired");
                }
                Err(e) => {
                    error!(seat_id = %status.seat_id, "failed to expire hold: {e}");
                }
            }
        }

        // Everyone watching an affected showtime gets a fresh snapshot.
        for showtime_id in touched_showtimes {
            if let Err(e) = crate::realtime::publish_snapshot(&self.state, showtime_id).await {
                warn!(%showtime_id, "failed to broadcast after expiry sweep: {e}");
            }
        }

        if expired > 0 {
            info!("Expiry sweep released {expired} holds");
        }
        expired
    }
}
