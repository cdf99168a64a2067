pub mod appresult;
pub mod config;
pub mod db;
pub mod eventlog;
pub mod registry;
pub mod rooms;

use std::sync::Arc;

use axum::{
    extract::FromRef,
    http::HeaderValue,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

pub use appresult::{AppError, AppResult};
pub use config::Config;
pub use eventlog::EventLog;
pub use registry::RoomRegistry;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub registry: Arc<RoomRegistry>,
    pub event_log: EventLog,
    pub config: Arc<Config>,
}

impl AppState {
    /// Spawns the event log writer, so it must run inside a tokio runtime.
    pub fn new(db_pool: SqlitePool, config: Config) -> Self {
        let event_log = EventLog::spawn(db_pool.clone(), config.event_queue, config.event_retention);
        Self {
            db_pool,
            event_log,
            registry: Arc::new(RoomRegistry::new()),
            config: Arc::new(config),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .route("/api", get(api_root))
        .nest("/api", rooms::router())
        .merge(rooms::ws_router())

        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

async fn api_root() -> Json<Value> {
    Json(json!({ "message": "Collaborative Whiteboard API" }))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.iter().any(|origin| origin == "*") {
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(origin) => Some(origin),
            Err(_) => {
                tracing::warn!(%origin, "ignoring unparsable CORS origin");
                None
            }
        })
        .collect();
    cors.allow_origin(AllowOrigin::list(origins))
}
