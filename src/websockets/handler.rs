use axum::{
    extract::{ws::WebSocket, Path, State, WebSocketUpgrade},
    response::Response,
};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::shared::{AppError, AppState};

use super::socket::Connection;

/// Per-connection buffer; a client that falls this far behind is dropped by the hub
const LISTENER_CAPACITY: usize = 32;

/// WebSocket endpoint streaming live snapshots of one game
/// GET /ws/{game_id}
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Path(game_id): Path<String>,
    State(app_state): State<AppState>,
) -> Result<Response, AppError> {
    info!(game_id = %game_id, "WebSocket connection requested");

    // Verify the game exists before upgrading
    if let Err(e) = app_state.game_service.get_game(&game_id).await {
        warn!(game_id = %game_id, "Game not found, rejecting WebSocket connection");
        return Err(e);
    }

    Ok(ws.on_upgrade(move |socket| handle_websocket_connection(socket, game_id, app_state)))
}

/// Handle the upgraded WebSocket connection
async fn handle_websocket_connection(socket: WebSocket, game_id: String, app_state: AppState) {
    let (listener, updates) = mpsc::channel(LISTENER_CAPACITY);
    let listener_id = app_state.hub.subscribe(&game_id, listener).await;

    info!(game_id = %game_id, listener_id, "WebSocket connection established");

    let connection = Connection::new(
        game_id.clone(),
        Box::new(socket),
        updates,
        app_state.game_service.clone(),
    );

    if let Err(e) = connection.run().await {
        warn!(game_id = %game_id, error = ?e, "WebSocket connection ended with error");
    }

    app_state.hub.unsubscribe(&game_id, listener_id).await;
    info!(game_id = %game_id, listener_id, "WebSocket connection closed");
}
