use crate::redis_client::RedisClient;

pub mod seats;

/// Redis-backed cache. Only snapshots live here; seat state itself is owned
/// by the store and never read back from the cache for mutations.
#[derive(Clone)]
pub struct CacheService {
    redis: RedisClient,
}

impl CacheService {
    pub fn new(redis: RedisClient) -> Self {
        Self { redis }
    }
}
