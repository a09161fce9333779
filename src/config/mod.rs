use serde::Deserialize;
use std::env;

// Top-level configuration container, assembled from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub hold: HoldConfig,
    pub pricing: PricingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

// Hold lifetime and reaper cadence. The hold duration is the only timeout in
// the system and is enforced server-side only.
#[derive(Debug, Clone, Deserialize)]
pub struct HoldConfig {
    pub duration_secs: u64,
    pub reaper_interval_secs: u64,
}

// External pricing service. When no URL is configured, snapshots are priced
// from the showtime's base price plus these default surcharges.
#[derive(Debug, Clone, Deserialize)]
pub struct PricingConfig {
    pub base_url: Option<String>,
    pub request_timeout_secs: u64,
    pub vip_surcharge: i64,
    pub couple_surcharge: i64,
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            app: AppConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8000".to_string())
                    .parse()
                    .expect("PORT must be a valid number"),
                environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
                rust_log: env::var("RUST_LOG")
                    .unwrap_or_else(|_| "cinema_seats=debug,tower_http=debug".to_string()),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
                pool_size: env::var("DB_POOL_SIZE")
                    .unwrap_or_else(|_| "20".to_string())
                    .parse()
                    .expect("DB_POOL_SIZE must be a valid number"),
            },
            redis: RedisConfig {
                url: env::var("REDIS_URL").expect("REDIS_URL must be set"),
            },
            hold: HoldConfig {
                duration_secs: env::var("HOLD_DURATION_SECS")
                    .unwrap_or_else(|_| "300".to_string())
                    .parse()
                    .expect("HOLD_DURATION_SECS must be a valid number"),
                reaper_interval_secs: env::var("REAPER_INTERVAL_SECS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .expect("REAPER_INTERVAL_SECS must be a valid number"),
            },
            pricing: PricingConfig {
                base_url: env::var("PRICING_SERVICE_URL").ok(),
                request_timeout_secs: env::var("PRICING_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "2".to_string())
                    .parse()
                    .expect("PRICING_TIMEOUT_SECS must be a valid number"),
                vip_surcharge: env::var("VIP_SURCHARGE")
                    .unwrap_or_else(|_| "5000".to_string())
                    .parse()
                    .expect("VIP_SURCHARGE must be a valid number"),
                couple_surcharge: env::var("COUPLE_SURCHARGE")
                    .unwrap_or_else(|_| "8000".to_string())
                    .parse()
                    .expect("COUPLE_SURCHARGE must be a valid number"),
            },
        }
    }
}
