use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

/// Who triggered a recorded event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "actorType", rename_all = "camelCase")]
pub enum Actor {
    System,
    Admin,
    #[serde(rename_all = "camelCase")]
    Team { team_id: String, team_name: String },
}

impl Actor {
    pub fn team(team_id: &str, team_name: &str) -> Self {
        Actor::Team {
            team_id: team_id.to_string(),
            team_name: team_name.to_string(),
        }
    }
}

/// Observational sink for game events. Implementations must not fail the caller.
pub trait EventRecorder: Send + Sync {
    fn record(&self, game_id: &str, event_type: &str, actor: &Actor, payload: Value);
}

/// Writes each event as a structured record on the `game_events` target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventRecorder;

impl EventRecorder for TracingEventRecorder {
    fn record(&self, game_id: &str, event_type: &str, actor: &Actor, payload: Value) {
        let actor = serde_json::to_string(actor).unwrap_or_default();
        info!(
            target: "game_events",
            game_id = %game_id,
            event_type = %event_type,
            actor = %actor,
            payload = %payload,
            recorded_at = %Utc::now().to_rfc3339(),
            "game event"
        );
    }
}
