use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, info, instrument};

use super::{
    lifecycle,
    models::{Game, GameView, Team, TeamLocation, TeamRole, TeamSpec},
    registry::{GameGuard, GameRegistry},
    timing,
};
use crate::{
    broadcast::BroadcastHub,
    clock::Clock,
    clues::ClueHistory,
    config::GameRules,
    notify::{Actor, EventRecorder, NotificationDispatcher},
    shared::AppError,
};

/// Result of flipping a found hider to the seeker side
#[derive(Debug, Clone)]
pub struct FoundOutcome {
    pub team: Team,
    pub game: GameView,
    /// No hiders were left, so the game paused for a new round
    pub round_over: bool,
}

/// Command surface for game lifecycle, roles, tokens and locations.
///
/// Every mutation runs under the game's write lock: the stored game is cloned,
/// the draft is validated and changed, and only a fully successful draft is
/// committed and published.
pub struct GameService {
    registry: GameRegistry,
    hub: Arc<BroadcastHub>,
    clue_history: Arc<ClueHistory>,
    clock: Arc<dyn Clock>,
    rules: GameRules,
    push: NotificationDispatcher,
    events: Arc<dyn EventRecorder>,
}

impl GameService {
    pub fn new(
        clock: Arc<dyn Clock>,
        hub: Arc<BroadcastHub>,
        rules: GameRules,
        push: NotificationDispatcher,
        events: Arc<dyn EventRecorder>,
    ) -> Self {
        Self {
            registry: GameRegistry::new(clock.clone()),
            hub,
            clue_history: Arc::new(ClueHistory::default()),
            clock,
            rules,
            push,
            events,
        }
    }

    pub fn hub(&self) -> Arc<BroadcastHub> {
        self.hub.clone()
    }

    pub fn rules(&self) -> &GameRules {
        &self.rules
    }

    pub fn clue_history(&self) -> Arc<ClueHistory> {
        self.clue_history.clone()
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    pub(crate) fn push(&self) -> &NotificationDispatcher {
        &self.push
    }

    pub(crate) fn record(&self, game_id: &str, event_type: &str, actor: Actor, payload: Value) {
        self.events.record(game_id, event_type, &actor, payload);
    }

    /// Run `apply` against a draft of the game under its write lock, then commit
    /// and publish. Nothing is stored when `apply` fails.
    pub(crate) async fn mutate<T, F>(&self, game_id: &str, apply: F) -> Result<(T, GameView), AppError>
    where
        F: FnOnce(&mut Game, i64) -> Result<T, AppError> + Send,
        T: Send,
    {
        let (outcome, view, _guard) = self.mutate_held(game_id, apply).await?;
        Ok((outcome, view))
    }

    /// Same as `mutate`, but hands back the still-held lock so follow-up
    /// bookkeeping lands before the next writer or a delete gets in
    pub(crate) async fn mutate_held<T, F>(
        &self,
        game_id: &str,
        apply: F,
    ) -> Result<(T, GameView, GameGuard), AppError>
    where
        F: FnOnce(&mut Game, i64) -> Result<T, AppError> + Send,
        T: Send,
    {
        let mut guard = self.registry.lock(game_id).await?;
        let now = self.clock.now_ms();
        let mut draft = guard.game().clone();

        let outcome = apply(&mut draft, now)?;

        let committed = guard.commit(draft);
        let view = GameView::at(committed, now);
        self.hub.publish(game_id, Arc::new(view.clone())).await;
        Ok((outcome, view, guard))
    }

    #[cfg(test)]
    pub(crate) fn registry(&self) -> &GameRegistry {
        &self.registry
    }

    pub async fn get_game(&self, game_id: &str) -> Result<GameView, AppError> {
        let game = self.registry.get(game_id).await?;
        Ok(GameView::at(game, self.clock.now_ms()))
    }

    #[instrument(skip(self))]
    pub async fn get_game_by_code(&self, code: &str) -> Result<GameView, AppError> {
        let game = self.registry.get_by_code(code).await?;
        Ok(GameView::at(game, self.clock.now_ms()))
    }

    pub async fn list_games(&self) -> Vec<GameView> {
        let now = self.clock.now_ms();
        self.registry
            .list_all()
            .await
            .into_iter()
            .map(|game| GameView::at(game, now))
            .collect()
    }

    pub async fn list_game_ids(&self) -> Vec<String> {
        self.registry.list_ids().await
    }

    /// Remove the game together with its clue history and subscriptions
    #[instrument(skip(self))]
    pub async fn delete_game(&self, game_id: &str) -> Result<(), AppError> {
        self.registry.delete(game_id).await?;
        self.tear_down(game_id, "game_deleted", Actor::Admin).await;
        Ok(())
    }

    /// Delete the game only if it has had no mutation for longer than
    /// `inactivity_threshold`, judged under the game's lock
    #[instrument(skip(self))]
    pub async fn delete_if_idle(
        &self,
        game_id: &str,
        inactivity_threshold: Duration,
    ) -> Result<bool, AppError> {
        let threshold_ms = inactivity_threshold.as_millis() as i64;
        let deleted = self
            .registry
            .delete_if(game_id, |game| {
                self.clock.now_ms() - game.last_activity_time > threshold_ms
            })
            .await?;

        if deleted {
            self.tear_down(game_id, "game_expired", Actor::System).await;
        }
        Ok(deleted)
    }

    async fn tear_down(&self, game_id: &str, event_type: &str, actor: Actor) {
        let clues = self.clue_history.purge(game_id).await;
        let listeners = self.hub.close_game(game_id).await;

        info!(game_id = %game_id, clues, listeners, "Game deleted");
        self.record(game_id, event_type, actor, Value::Null);
    }

    #[instrument(skip(self))]
    pub async fn start_game(&self, game_id: &str) -> Result<GameView, AppError> {
        let ((), view) = self
            .mutate(game_id, |game, now| Ok(lifecycle::start(game, now)?))
            .await?;

        info!(game_id = %game_id, "Game started");
        self.record(game_id, "game_started", Actor::Admin, json!({ "round": view.game.round }));
        self.push
            .notify(game_id, "Game started", "The hiders are on the move. Good luck!");
        Ok(view)
    }

    #[instrument(skip(self))]
    pub async fn pause_game(&self, game_id: &str) -> Result<GameView, AppError> {
        let ((), view) = self
            .mutate(game_id, |game, now| Ok(lifecycle::pause(game, now)?))
            .await?;

        info!(game_id = %game_id, "Game paused");
        self.record(game_id, "game_paused", Actor::Admin, json!({ "round": view.game.round }));
        self.push.notify(game_id, "Game paused", "The game has been paused.");
        Ok(view)
    }

    #[instrument(skip(self))]
    pub async fn resume_game(&self, game_id: &str) -> Result<GameView, AppError> {
        let ((), view) = self
            .mutate(game_id, |game, now| Ok(lifecycle::resume(game, now)?))
            .await?;

        info!(
            game_id = %game_id,
            total_paused_ms = view.game.total_paused_duration,
            "Game resumed"
        );
        self.record(game_id, "game_resumed", Actor::Admin, json!({ "round": view.game.round }));
        self.push.notify(game_id, "Game resumed", "The game is back on.");
        Ok(view)
    }

    #[instrument(skip(self))]
    pub async fn next_round(&self, game_id: &str) -> Result<GameView, AppError> {
        let ((), view) = self
            .mutate(game_id, |game, now| Ok(lifecycle::next_round(game, now)?))
            .await?;

        let round = view.game.round;
        info!(game_id = %game_id, round, "Next round started");
        self.record(game_id, "round_started", Actor::Admin, json!({ "round": round }));
        self.push
            .notify(game_id, format!("Round {} started", round), "Hiders, get going!");
        Ok(view)
    }

    #[instrument(skip(self))]
    pub async fn end_game(&self, game_id: &str) -> Result<GameView, AppError> {
        let ((), view) = self
            .mutate(game_id, |game, now| Ok(lifecycle::end(game, now)?))
            .await?;

        info!(game_id = %game_id, game_duration_ms = view.game_duration, "Game ended");
        let hider_times: Vec<Value> = view
            .game
            .teams
            .iter()
            .map(|team| json!({ "team": team.name, "hiderTime": team.total_hider_time }))
            .collect();
        self.record(game_id, "game_ended", Actor::Admin, json!({ "teams": hider_times }));
        self.push.notify(game_id, "Game over", "The game has ended.");
        Ok(view)
    }

    #[instrument(skip(self))]
    pub async fn restart_game(&self, game_id: &str) -> Result<GameView, AppError> {
        let starting_tokens = self.rules.starting_tokens;
        let ((), view) = self
            .mutate(game_id, |game, _| Ok(lifecycle::restart(game, starting_tokens)?))
            .await?;

        info!(game_id = %game_id, "Game restarted");
        self.record(game_id, "game_restarted", Actor::Admin, Value::Null);
        Ok(view)
    }

    #[instrument(skip(self))]
    pub async fn update_role(
        &self,
        game_id: &str,
        team_id: &str,
        role: TeamRole,
    ) -> Result<Team, AppError> {
        let (team, _) = self
            .mutate(game_id, |game, now| {
                lifecycle::change_role(game, team_id, role, now)?;
                team_snapshot(game, team_id)
            })
            .await?;

        info!(game_id = %game_id, team = %team.name, role = %role, "Team role updated");
        self.record(
            game_id,
            "role_changed",
            Actor::Admin,
            json!({ "teamId": team.id, "role": role }),
        );
        Ok(team)
    }

    /// Admin override; the balance may be set below zero
    #[instrument(skip(self))]
    pub async fn update_tokens(
        &self,
        game_id: &str,
        team_id: &str,
        tokens: i64,
    ) -> Result<Team, AppError> {
        let (team, _) = self
            .mutate(game_id, |game, _| {
                let team = game
                    .team_mut(team_id)
                    .ok_or_else(|| team_not_found(team_id))?;
                team.tokens = tokens;
                Ok(team.clone())
            })
            .await?;

        info!(game_id = %game_id, team = %team.name, tokens, "Team tokens updated");
        self.record(
            game_id,
            "tokens_updated",
            Actor::Admin,
            json!({ "teamId": team.id, "tokens": tokens }),
        );
        Ok(team)
    }

    #[instrument(skip(self))]
    pub async fn update_location(
        &self,
        game_id: &str,
        team_id: &str,
        latitude: f64,
        longitude: f64,
    ) -> Result<Team, AppError> {
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(AppError::BadRequest(format!(
                "coordinates out of range: {}, {}",
                latitude, longitude
            )));
        }

        let (team, _) = self
            .mutate(game_id, |game, now| {
                let team = game
                    .team_mut(team_id)
                    .ok_or_else(|| team_not_found(team_id))?;
                team.location = Some(TeamLocation {
                    latitude,
                    longitude,
                    timestamp: now,
                });
                Ok(team.clone())
            })
            .await?;

        debug!(game_id = %game_id, team = %team.name, "Team location updated");
        Ok(team)
    }

    #[instrument(skip(self))]
    pub async fn mark_found(&self, game_id: &str, team_id: &str) -> Result<FoundOutcome, AppError> {
        let ((team, round_over), view) = self
            .mutate(game_id, |game, now| {
                let round_over = lifecycle::mark_found(game, team_id, now)?;
                Ok((team_snapshot(game, team_id)?, round_over))
            })
            .await?;

        info!(game_id = %game_id, team = %team.name, round_over, "Hider found");
        self.record(
            game_id,
            "team_found",
            Actor::Admin,
            json!({ "teamId": team.id, "hiderTime": team.total_hider_time, "roundOver": round_over }),
        );
        self.push.notify(
            game_id,
            "Hider found",
            format!("{} has been found and joins the seekers.", team.name),
        );
        if round_over {
            self.push
                .notify(game_id, "All hiders found", "The round is over.");
        }

        Ok(FoundOutcome {
            team,
            game: view,
            round_over,
        })
    }

    /// Auto-pause the game if its round has run out. Returns whether it paused.
    #[instrument(skip(self))]
    pub async fn enforce_round_limit(&self, game_id: &str) -> Result<bool, AppError> {
        let mut guard = self.registry.lock(game_id).await?;
        let now = self.clock.now_ms();
        if !timing::round_limit_reached(guard.game(), now) {
            return Ok(false);
        }

        let mut draft = guard.game().clone();
        lifecycle::auto_pause(&mut draft, now)?;
        let committed = guard.commit(draft);
        let view = GameView::at(committed, now);
        self.hub.publish(game_id, Arc::new(view.clone())).await;
        drop(guard);

        let round = view.game.round;
        info!(game_id = %game_id, round, round_duration_ms = view.round_duration, "Round time limit reached; game paused");
        self.record(
            game_id,
            "round_time_limit",
            Actor::System,
            json!({ "round": round, "roundDuration": view.round_duration }),
        );
        self.push.notify(
            game_id,
            "Time's up!",
            format!("Round {} has reached its time limit.", round),
        );
        Ok(true)
    }
}

pub(crate) fn team_not_found(team_id: &str) -> AppError {
    AppError::NotFound(format!("team {} not found", team_id))
}

pub(crate) fn team_snapshot(game: &Game, team_id: &str) -> Result<Team, AppError> {
    game.team(team_id)
        .cloned()
        .ok_or_else(|| team_not_found(team_id))
}
