// Library crate for the hide-and-seek game server
// This file exposes the public API for integration tests

pub mod broadcast;
pub mod cards;
pub mod catalog;
pub mod clock;
pub mod clues;
pub mod config;
pub mod game;
pub mod notify;
pub mod shared;
pub mod websockets;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

// Re-export commonly used types for easier access in tests
pub use broadcast::BroadcastHub;
pub use catalog::Catalog;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AppConfig, GameRules};
pub use game::{GameService, GameStatus, GameView, TeamRole, TeamSpec};
pub use shared::{AppError, AppState};

/// HTTP surface: health check plus the live game stream
pub fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/ws/:game_id", get(websockets::websocket_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}
