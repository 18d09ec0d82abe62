use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::messages::{ClientMessage, ServerMessage};
use crate::game::{GameService, GameView};

/// Simple WebSocket abstraction - all we care about is send/receive
#[async_trait]
pub trait SocketWrapper: Send {
    /// Send a text message to the client
    async fn send_message(&mut self, message: String) -> Result<(), SocketError>;

    /// Receive the next text message from the client (None if connection closed)
    async fn receive_message(&mut self) -> Result<Option<String>, SocketError>;

    /// Close the connection
    async fn close(&mut self) -> Result<(), SocketError>;
}

#[derive(Debug)]
pub enum SocketError {
    SendFailed(String),
    ReceiveFailed(String),
}

#[async_trait]
impl SocketWrapper for WebSocket {
    async fn send_message(&mut self, message: String) -> Result<(), SocketError> {
        self.send(Message::Text(message))
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }

    async fn receive_message(&mut self) -> Result<Option<String>, SocketError> {
        loop {
            match self.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                // Protocol pings are answered by axum; binary frames are not part of the protocol
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(SocketError::ReceiveFailed(e.to_string())),
            }
        }
    }

    async fn close(&mut self) -> Result<(), SocketError> {
        self.send(Message::Close(None))
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }
}

/// One client's live view of a game: forwards hub updates out and answers
/// client messages until either side goes away
pub struct Connection {
    pub game_id: String,
    socket: Box<dyn SocketWrapper>,
    updates: mpsc::Receiver<Arc<GameView>>,
    game_service: Arc<GameService>,
}

impl Connection {
    pub fn new(
        game_id: String,
        socket: Box<dyn SocketWrapper>,
        updates: mpsc::Receiver<Arc<GameView>>,
        game_service: Arc<GameService>,
    ) -> Self {
        Self {
            game_id,
            socket,
            updates,
            game_service,
        }
    }

    async fn send(&mut self, message: &ServerMessage<'_>) -> Result<(), SocketError> {
        match serde_json::to_string(message) {
            Ok(json) => self.socket.send_message(json).await,
            Err(e) => {
                warn!(game_id = %self.game_id, error = %e, "Failed to serialize outbound message");
                Ok(())
            }
        }
    }

    /// Push the current snapshot; a deleted game ends the connection
    async fn send_snapshot(&mut self) -> Result<bool, SocketError> {
        match self.game_service.get_game(&self.game_id).await {
            Ok(view) => {
                self.send(&ServerMessage::GameUpdate { game: &view }).await?;
                Ok(true)
            }
            Err(e) => {
                self.send(&ServerMessage::error(e.to_string())).await?;
                Ok(false)
            }
        }
    }

    async fn handle_client_message(&mut self, raw: &str) -> Result<bool, SocketError> {
        match serde_json::from_str::<ClientMessage>(raw) {
            Ok(ClientMessage::Ping) => {
                let t = self.game_service.now_ms();
                self.send(&ServerMessage::Pong { t }).await?;
                Ok(true)
            }
            Ok(ClientMessage::Sync) => self.send_snapshot().await,
            Err(e) => {
                debug!(game_id = %self.game_id, error = %e, "Unrecognised client message");
                self.send(&ServerMessage::error(format!("unrecognised message: {}", e)))
                    .await?;
                Ok(true)
            }
        }
    }

    /// Run until the client disconnects or the game's hub channel closes
    pub async fn run(mut self) -> Result<(), SocketError> {
        if !self.send_snapshot().await? {
            let _ = self.socket.close().await;
            return Ok(());
        }

        loop {
            tokio::select! {
                update = self.updates.recv() => {
                    match update {
                        Some(view) => {
                            self.send(&ServerMessage::GameUpdate { game: &view }).await?
                        }
                        None => break, // Game deleted or listener pruned
                    }
                }

                msg = self.socket.receive_message() => {
                    match msg {
                        Ok(Some(raw)) => {
                            if !self.handle_client_message(&raw).await? {
                                break;
                            }
                        }
                        Ok(None) => break, // Client disconnected
                        Err(e) => return Err(e),
                    }
                }
            }
        }

        let _ = self.socket.close().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::TeamSpec;
    use crate::shared::test_utils::{game_service_at, T0};
    use serde_json::Value;

    /// Socket driven by channels so tests can play the client
    struct ChannelSocket {
        inbound: mpsc::UnboundedReceiver<String>,
        outbound: mpsc::UnboundedSender<String>,
    }

    #[async_trait]
    impl SocketWrapper for ChannelSocket {
        async fn send_message(&mut self, message: String) -> Result<(), SocketError> {
            self.outbound
                .send(message)
                .map_err(|e| SocketError::SendFailed(e.to_string()))
        }

        async fn receive_message(&mut self) -> Result<Option<String>, SocketError> {
            Ok(self.inbound.recv().await)
        }

        async fn close(&mut self) -> Result<(), SocketError> {
            Ok(())
        }
    }

    async fn next_json(rx: &mut mpsc::UnboundedReceiver<String>) -> Value {
        serde_json::from_str(&rx.recv().await.unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_connection_snapshot_ping_and_updates() {
        let (service, clock) = game_service_at(T0);
        let game = service
            .create_game(vec![TeamSpec::named("Red"), TeamSpec::named("Blue")], None)
            .await
            .unwrap();
        let game_id = game.game.id.clone();

        let (client_tx, inbound) = mpsc::unbounded_channel();
        let (outbound, mut client_rx) = mpsc::unbounded_channel();
        let (listener, updates) = mpsc::channel(8);
        let listener_id = service.hub().subscribe(&game_id, listener).await;

        let connection = Connection::new(
            game_id.clone(),
            Box::new(ChannelSocket { inbound, outbound }),
            updates,
            service.clone(),
        );
        let handle = tokio::spawn(connection.run());

        let snapshot = next_json(&mut client_rx).await;
        assert_eq!(snapshot["type"], "gameUpdate");
        assert_eq!(snapshot["game"]["status"], "waiting");

        clock.advance(250);
        client_tx.send(r#"{"type":"ping"}"#.to_string()).unwrap();
        assert_eq!(
            next_json(&mut client_rx).await,
            serde_json::json!({"type": "pong", "t": T0 + 250})
        );

        client_tx.send("not json".to_string()).unwrap();
        assert_eq!(next_json(&mut client_rx).await["type"], "error");

        service.start_game(&game_id).await.unwrap();
        let update = next_json(&mut client_rx).await;
        assert_eq!(update["game"]["status"], "active");

        drop(client_tx);
        handle.await.unwrap().unwrap();
        assert!(service.hub().unsubscribe(&game_id, listener_id).await);
    }

    #[tokio::test]
    async fn test_connection_ends_when_game_deleted() {
        let (service, _) = game_service_at(T0);
        let game = service
            .create_game(vec![TeamSpec::named("Red")], None)
            .await
            .unwrap();
        let game_id = game.game.id.clone();

        let (_client_tx, inbound) = mpsc::unbounded_channel();
        let (outbound, mut client_rx) = mpsc::unbounded_channel();
        let (listener, updates) = mpsc::channel(8);
        service.hub().subscribe(&game_id, listener).await;

        let handle = tokio::spawn(
            Connection::new(
                game_id.clone(),
                Box::new(ChannelSocket { inbound, outbound }),
                updates,
                service.clone(),
            )
            .run(),
        );
        next_json(&mut client_rx).await;

        service.delete_game(&game_id).await.unwrap();

        handle.await.unwrap().unwrap();
    }
}
