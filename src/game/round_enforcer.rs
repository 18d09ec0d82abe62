use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use super::service::GameService;

/// Configuration for the round time-limit enforcer
#[derive(Debug, Clone)]
pub struct EnforcerConfig {
    /// How often every live game is checked against its round limit
    pub tick_interval: Duration,
}

impl Default for EnforcerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(5),
        }
    }
}

/// Starts the background task that auto-pauses rounds once their time limit is up
#[instrument(skip(game_service))]
pub async fn start_round_enforcer(game_service: Arc<GameService>, config: EnforcerConfig) {
    info!(
        tick_interval_ms = config.tick_interval.as_millis() as u64,
        "Starting round enforcer background task"
    );

    let mut ticker = interval(config.tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let paused = enforce_round_limits(&game_service).await;
        if paused > 0 {
            info!(paused, "Round enforcer paused games");
        }
    }
}

/// One enforcement pass over every live game. Returns how many games were paused.
///
/// Games are checked concurrently, so one game held under a long write does not
/// hold up the rest of the pass.
pub async fn enforce_round_limits(game_service: &Arc<GameService>) -> usize {
    let game_ids = game_service.list_game_ids().await;

    let outcomes = join_all(game_ids.iter().map(|game_id| async move {
        (game_id, game_service.enforce_round_limit(game_id).await)
    }))
    .await;

    let mut paused = 0;
    for (game_id, outcome) in outcomes {
        match outcome {
            Ok(true) => paused += 1,
            Ok(false) => {}
            Err(e) => {
                // The game may have been deleted since the listing; keep going
                warn!(game_id = %game_id, error = %e, "Failed to enforce round limit");
            }
        }
    }

    debug!(checked = game_ids.len(), paused, "Round enforcement pass complete");
    paused
}
