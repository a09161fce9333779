use redis::AsyncCommands;
use tracing::warn;
use uuid::Uuid;

use crate::cache::CacheService;
use crate::services::snapshot::ShowtimeSnapshot;

const SNAPSHOT_TTL_SECS: u64 = 60;

fn snapshot_key(showtime_id: Uuid) -> String {
    format!("seats:{showtime_id}")
}

impl CacheService {
    pub async fn get_snapshot(&self, showtime_id: Uuid) -> Option<ShowtimeSnapshot> {
        let mut conn = self.redis.conn.clone();
        let data: String = conn.get(snapshot_key(showtime_id)).await.ok()?;
        serde_json::from_str(&data).ok()
    }

    /// Cache failures are logged and swallowed; the database remains the
    /// source of truth.
    pub async fn save_snapshot(&self, snapshot: &ShowtimeSnapshot) {
        let Ok(data) = serde_json::to_string(snapshot) else {
            return;
        };
        let mut conn = self.redis.conn.clone();
        let result: Result<(), redis::RedisError> = conn
            .set_ex(snapshot_key(snapshot.showtime_id), data, SNAPSHOT_TTL_SECS)
            .await;
        if let Err(e) = result {
            warn!("failed to cache seat snapshot: {e}");
        }
    }

    pub async fn invalidate_seats(&self, showtime_id: Uuid) {
        let mut conn = self.redis.conn.clone();
        let result: Result<(), redis::RedisError> = conn.del(snapshot_key(showtime_id)).await;
        if let Err(e) = result {
            warn!("failed to invalidate seat snapshot: {e}");
        }
    }
}
