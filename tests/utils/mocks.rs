use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::RwLock;

use hideseek::notify::{Actor, EventRecorder, NotifyError, PushNotifier};

// ============================================================================
// Mock Infrastructure
// ============================================================================

/// Push notifier that keeps every delivered (game_id, title, body)
#[derive(Default)]
pub struct RecordingPushNotifier {
    sent: RwLock<Vec<(String, String, String)>>,
}

#[allow(dead_code)]
impl RecordingPushNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn titles_for(&self, game_id: &str) -> Vec<String> {
        self.sent
            .read()
            .await
            .iter()
            .filter(|(id, _, _)| id == game_id)
            .map(|(_, title, _)| title.clone())
            .collect()
    }

    /// Delivery runs on the dispatcher's worker, so poll until it shows up
    pub async fn wait_for_title(&self, game_id: &str, title: &str) -> bool {
        for _ in 0..50 {
            if self.titles_for(game_id).await.iter().any(|t| t == title) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }
}

#[async_trait]
impl PushNotifier for RecordingPushNotifier {
    async fn notify(&self, game_id: &str, title: &str, body: &str) -> Result<(), NotifyError> {
        self.sent
            .write()
            .await
            .push((game_id.to_string(), title.to_string(), body.to_string()));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "RecordingPushNotifier"
    }
}

#[derive(Debug, Clone)]
pub struct RecordedEvent {
    pub game_id: String,
    pub event_type: String,
    pub actor: Actor,
    pub payload: Value,
}

/// Event recorder that keeps events in memory for assertions
#[derive(Default)]
pub struct RecordingEventRecorder {
    events: Mutex<Vec<RecordedEvent>>,
}

#[allow(dead_code)]
impl RecordingEventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event_types(&self, game_id: &str) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.game_id == game_id)
            .map(|e| e.event_type.clone())
            .collect()
    }

    pub fn last_of(&self, event_type: &str) -> Option<RecordedEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|e| e.event_type == event_type)
            .cloned()
    }
}

impl EventRecorder for RecordingEventRecorder {
    fn record(&self, game_id: &str, event_type: &str, actor: &Actor, payload: Value) {
        self.events.lock().unwrap().push(RecordedEvent {
            game_id: game_id.to_string(),
            event_type: event_type.to_string(),
            actor: actor.clone(),
            payload,
        });
    }
}
