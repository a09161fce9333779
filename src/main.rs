use axum::{routing::get, Router};
use tokio::task;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cinema_seats::{config::Config, controllers, realtime, services::reaper::HoldReaper, AppState};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.app.rust_log))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Cinema Seats API");

    let app_state = AppState::new(config)
        .await
        .expect("Failed to initialize application state");
    info!("Database and Redis connected, migrations applied");

    // Background task enforcing hold expiry
    let reaper = HoldReaper::new(app_state.clone());
    task::spawn(async move {
        reaper.run().await;
    });

    let app = Router::new()
        .route("/", get(|| async { "Cinema Seats API v1.0" }))
        .route("/health", get(|| async { "OK" }))
        // REST surface
        .nest("/api", controllers::routes())
        // Realtime seat map socket
        .merge(realtime::routes())
        .with_state(app_state.clone())
        .layer(TraceLayer::new_for_http());

    let addr = format!(
        "{}:{}",
        app_state.config.app.host, app_state.config.app.port
    );
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app.into_make_service())
        .await
        .unwrap();
}
