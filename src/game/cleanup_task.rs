use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use strum::IntoEnumIterator;
use tokio::time::interval;
use tracing::{debug, info, instrument, warn};

use super::models::{GameStatus, GameView};
use super::service::GameService;

/// Configuration for the idle-game cleanup task
#[derive(Debug, Clone)]
pub struct CleanupConfig {
    /// How often to run the cleanup task
    pub cleanup_interval: Duration,
    /// How long a game must go without any mutation before deletion
    pub inactivity_threshold: Duration,
    /// How often game statistics are logged
    pub stats_interval: Duration,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            cleanup_interval: Duration::from_secs(60 * 60),           // 1 hour
            inactivity_threshold: Duration::from_secs(12 * 60 * 60), // 12 hours
            stats_interval: Duration::from_secs(30 * 60),            // 30 minutes
        }
    }
}

/// Snapshot counts logged on the `game_stats` target
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameStats {
    pub total_games: usize,
    pub total_teams: usize,
    pub by_status: HashMap<GameStatus, usize>,
}

impl GameStats {
    pub fn collect(games: &[GameView]) -> Self {
        let mut stats = Self {
            total_games: games.len(),
            total_teams: 0,
            by_status: GameStatus::iter().map(|status| (status, 0)).collect(),
        };
        for view in games {
            stats.total_teams += view.game.teams.len();
            *stats.by_status.entry(view.game.status).or_default() += 1;
        }
        stats
    }

    pub fn count(&self, status: GameStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }
}

/// Starts the background task that removes idle games and logs statistics
#[instrument(skip(game_service))]
pub async fn start_cleanup_task(game_service: Arc<GameService>, config: CleanupConfig) {
    info!(
        cleanup_interval_secs = config.cleanup_interval.as_secs(),
        inactivity_threshold_secs = config.inactivity_threshold.as_secs(),
        stats_interval_secs = config.stats_interval.as_secs(),
        "Starting game cleanup background task"
    );

    let mut cleanup_interval = interval(config.cleanup_interval);
    let mut stats_interval = interval(config.stats_interval);

    loop {
        tokio::select! {
            _ = cleanup_interval.tick() => {
                info!("Running game cleanup task");
                let deleted = cleanup_inactive_games(&game_service, config.inactivity_threshold).await;
                info!(deleted_count = deleted, "Game cleanup completed");
            }
            _ = stats_interval.tick() => {
                log_game_stats(&game_service).await;
            }
        }
    }
}

/// Deletes games idle for longer than the threshold and returns how many went.
/// Idleness is judged under each game's lock, so a game touched mid-sweep survives.
async fn cleanup_inactive_games(game_service: &Arc<GameService>, inactivity_threshold: Duration) -> usize {
    let game_ids = game_service.list_game_ids().await;
    if game_ids.is_empty() {
        info!("No games to clean up");
        return 0;
    }

    debug!(count = game_ids.len(), "Checking games for inactivity");

    let mut deleted_count = 0;
    for game_id in game_ids {
        match game_service.delete_if_idle(&game_id, inactivity_threshold).await {
            Ok(true) => {
                deleted_count += 1;
                info!(game_id = %game_id, "Deleted inactive game");
            }
            Ok(false) => {}
            Err(e) => {
                warn!(game_id = %game_id, error = %e, "Failed to delete inactive game");
            }
        }
    }

    deleted_count
}

async fn log_game_stats(game_service: &Arc<GameService>) -> GameStats {
    let stats = GameStats::collect(&game_service.list_games().await);
    info!(
        target: "game_stats",
        total_games = stats.total_games,
        total_teams = stats.total_teams,
        waiting = stats.count(GameStatus::Waiting),
        active = stats.count(GameStatus::Active),
        paused = stats.count(GameStatus::Paused),
        ended = stats.count(GameStatus::Ended),
        "Game statistics"
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::TeamSpec;
    use crate::shared::test_utils::{game_service_at, T0};
    use tokio::sync::mpsc;

    const HOUR_MS: i64 = 60 * 60 * 1000;

    fn red_blue() -> Vec<TeamSpec> {
        vec![TeamSpec::named("Red"), TeamSpec::named("Blue")]
    }

    #[tokio::test]
    async fn test_cleanup_removes_idle_games() {
        let (service, clock) = game_service_at(T0);
        let idle = service.create_game(red_blue(), None).await.unwrap();
        let (tx, mut rx) = mpsc::channel(4);
        service.hub().subscribe(&idle.game.id, tx).await;

        clock.advance(13 * HOUR_MS);
        let deleted = cleanup_inactive_games(&service, Duration::from_secs(12 * 60 * 60)).await;

        assert_eq!(deleted, 1);
        assert!(service.get_game(&idle.game.id).await.is_err());
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_cleanup_preserves_recently_mutated_games() {
        let (service, clock) = game_service_at(T0);
        let busy = service.create_game(red_blue(), None).await.unwrap();
        let idle = service.create_game(red_blue(), None).await.unwrap();

        clock.advance(11 * HOUR_MS);
        service.start_game(&busy.game.id).await.unwrap();
        clock.advance(2 * HOUR_MS);

        let deleted = cleanup_inactive_games(&service, Duration::from_secs(12 * 60 * 60)).await;

        assert_eq!(deleted, 1);
        assert!(service.get_game(&busy.game.id).await.is_ok());
        assert!(service.get_game(&idle.game.id).await.is_err());
    }

    #[tokio::test]
    async fn test_cleanup_spares_game_touched_mid_sweep() {
        let (service, clock) = game_service_at(T0);
        let game = service.create_game(red_blue(), None).await.unwrap();
        let id = game.game.id.clone();
        clock.advance(13 * HOUR_MS);

        let mut held = service.registry().lock(&id).await.unwrap();
        let sweep = tokio::spawn({
            let service = service.clone();
            async move { cleanup_inactive_games(&service, Duration::from_secs(12 * 60 * 60)).await }
        });
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        let draft = held.game().clone();
        held.commit(draft);
        drop(held);

        assert_eq!(sweep.await.unwrap(), 0);
        assert!(service.get_game(&id).await.is_ok());
    }

    #[tokio::test]
    async fn test_cleanup_with_no_games() {
        let (service, _) = game_service_at(T0);
        assert_eq!(
            cleanup_inactive_games(&service, Duration::from_millis(1)).await,
            0
        );
    }

    #[tokio::test]
    async fn test_stats_count_by_status() {
        let (service, _) = game_service_at(T0);
        let started = service.create_game(red_blue(), None).await.unwrap();
        service.create_game(red_blue(), None).await.unwrap();
        service.start_game(&started.game.id).await.unwrap();

        let stats = log_game_stats(&service).await;

        assert_eq!(stats.total_games, 2);
        assert_eq!(stats.total_teams, 4);
        assert_eq!(stats.count(GameStatus::Active), 1);
        assert_eq!(stats.count(GameStatus::Waiting), 1);
        assert_eq!(stats.count(GameStatus::Ended), 0);
    }
}
