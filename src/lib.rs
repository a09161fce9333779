pub mod cache;
pub mod config;
pub mod controllers;
pub mod database;
pub mod middleware;
pub mod models;
pub mod realtime;
pub mod redis_client;
pub mod services;
pub mod store;

use std::sync::Arc;

use crate::cache::CacheService;
use crate::config::Config;
use crate::database::Database;
use crate::realtime::rooms::RoomRegistry;
use crate::redis_client::RedisClient;
use crate::services::pricing::PricingClient;
use crate::services::snapshot::SnapshotService;
use crate::services::state_machine::SeatStateMachine;
use crate::store::postgres::PgSeatStore;

/// The state machine over the production store.
pub type SeatService = SeatStateMachine<PgSeatStore>;

// Shared state for the whole application
pub struct AppState {
    pub db: Database,
    pub redis: RedisClient,
    pub cache: CacheService,
    pub config: Config,
    pub seats: SeatService,
    pub snapshots: SnapshotService,
    pub rooms: RoomRegistry,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Arc<Self>> {
        let db = Database::new(&config.database.url, config.database.pool_size).await?;

        db.run_migrations().await?;

        let redis = RedisClient::new(&config.redis.url).await?;
        let cache = CacheService::new(redis.clone());
        let pricing = PricingClient::from_config(&config.pricing);
        let seats = SeatStateMachine::new(PgSeatStore::new(db.clone()), config.hold.duration_secs);
        let snapshots = SnapshotService::new(db.clone(), cache.clone(), pricing);

        Ok(Arc::new(Self {
            db,
            redis,
            cache,
            config,
            seats,
            snapshots,
            rooms: RoomRegistry::new(),
        }))
    }
}
