use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tracing::debug;

use crate::game::GameView;

pub type ListenerId = u64;

/// Receiving end of a hub subscription; a full or closed channel gets pruned
pub type Listener = mpsc::Sender<Arc<GameView>>;

/// Fan-out of game snapshots to every listener subscribed to that game
#[derive(Debug, Default)]
pub struct BroadcastHub {
    /// game_id -> (listener id -> sender)
    listeners: RwLock<HashMap<String, HashMap<ListenerId, Listener>>>,
    next_id: AtomicU64,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(&self, game_id: &str, listener: Listener) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut listeners = self.listeners.write().await;
        listeners
            .entry(game_id.to_string())
            .or_default()
            .insert(id, listener);

        debug!(game_id = %game_id, listener_id = id, "Listener subscribed");
        id
    }

    /// Returns whether the listener was still registered
    pub async fn unsubscribe(&self, game_id: &str, listener_id: ListenerId) -> bool {
        let mut listeners = self.listeners.write().await;
        let Some(game_listeners) = listeners.get_mut(game_id) else {
            return false;
        };

        let removed = game_listeners.remove(&listener_id).is_some();
        if game_listeners.is_empty() {
            listeners.remove(game_id);
        }
        if removed {
            debug!(game_id = %game_id, listener_id, "Listener unsubscribed");
        }
        removed
    }

    /// Send the snapshot to every live listener of the game and return how many
    /// accepted it. Listeners that are full or gone are dropped, never awaited.
    pub async fn publish(&self, game_id: &str, snapshot: Arc<GameView>) -> usize {
        let mut failed = Vec::new();
        let mut delivered = 0;
        {
            let listeners = self.listeners.read().await;
            let Some(game_listeners) = listeners.get(game_id) else {
                debug!(game_id = %game_id, "No listeners for game update");
                return 0;
            };

            for (id, listener) in game_listeners {
                match listener.try_send(snapshot.clone()) {
                    Ok(()) => delivered += 1,
                    Err(err) => {
                        debug!(game_id = %game_id, listener_id = *id, error = %err, "Dropping listener");
                        failed.push(*id);
                    }
                }
            }
        }

        if !failed.is_empty() {
            let mut listeners = self.listeners.write().await;
            if let Some(game_listeners) = listeners.get_mut(game_id) {
                for id in &failed {
                    game_listeners.remove(id);
                }
                if game_listeners.is_empty() {
                    listeners.remove(game_id);
                }
            }
        }

        debug!(game_id = %game_id, delivered, pruned = failed.len(), "Game update published");
        delivered
    }

    /// Drop every listener of a game; their receivers see the channel close
    pub async fn close_game(&self, game_id: &str) -> usize {
        let mut listeners = self.listeners.write().await;
        let closed = listeners.remove(game_id).map(|l| l.len()).unwrap_or(0);
        if closed > 0 {
            debug!(game_id = %game_id, closed, "Closed game listeners");
        }
        closed
    }

    pub async fn listener_count(&self, game_id: &str) -> usize {
        let listeners = self.listeners.read().await;
        listeners.get(game_id).map(|l| l.len()).unwrap_or(0)
    }
}
