use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rand::Rng;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info, instrument, warn};

use super::models::{Game, Team, TeamRole, TeamSpec};
use crate::clock::Clock;
use crate::shared::AppError;

const CODE_LENGTH: usize = 6;
const MAX_ROUND_LENGTH_MINUTES: u32 = 999;

/// Stored game plus a tombstone set by delete, so writers queued on the lock
/// see the removal instead of committing into a detached slot
struct GameCell {
    game: Game,
    removed: bool,
}

struct GameSlot {
    code: String,
    cell: Arc<Mutex<GameCell>>,
}

#[derive(Default)]
struct RegistryInner {
    games: HashMap<String, GameSlot>,
    codes: HashMap<String, String>,
}

/// Exclusive handle on one game for a read-modify-write sequence.
///
/// Other writers on the same game wait until this guard is dropped; other
/// games are unaffected.
pub struct GameGuard {
    guard: OwnedMutexGuard<GameCell>,
    clock: Arc<dyn Clock>,
}

impl GameGuard {
    pub fn game(&self) -> &Game {
        &self.guard.game
    }

    /// Replace the stored game with `draft`, stamping the activity time
    pub fn commit(&mut self, mut draft: Game) -> Game {
        draft.last_activity_time = self.clock.now_ms();
        self.guard.game = draft;
        self.guard.game.clone()
    }

    fn retire(&mut self) {
        self.guard.removed = true;
    }
}

fn game_not_found(game_id: &str) -> AppError {
    AppError::NotFound(format!("game {} not found", game_id))
}

/// Authoritative in-memory store of live games, indexed by id and by join code
pub struct GameRegistry {
    inner: RwLock<RegistryInner>,
    clock: Arc<dyn Clock>,
}

impl GameRegistry {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
            clock,
        }
    }

    /// Validate the team specs and register a new waiting game
    #[instrument(skip(self, specs), fields(team_count = specs.len()))]
    pub async fn create(
        &self,
        specs: &[TeamSpec],
        round_length_minutes: Option<u32>,
        starting_tokens: i64,
    ) -> Result<Game, AppError> {
        let teams = build_teams(specs, starting_tokens)?;
        if let Some(minutes) = round_length_minutes {
            if minutes == 0 || minutes > MAX_ROUND_LENGTH_MINUTES {
                return Err(AppError::BadRequest(format!(
                    "round length must be between 1 and {} minutes",
                    MAX_ROUND_LENGTH_MINUTES
                )));
            }
        }

        let mut inner = self.inner.write().await;
        let code = generate_unique_code(&inner.codes);
        let game = Game::new(code.clone(), teams, round_length_minutes, self.clock.now_ms());

        inner.codes.insert(code.clone(), game.id.clone());
        inner.games.insert(
            game.id.clone(),
            GameSlot {
                code,
                cell: Arc::new(Mutex::new(GameCell {
                    game: game.clone(),
                    removed: false,
                })),
            },
        );

        info!(game_id = %game.id, code = %game.code, "Game registered");
        Ok(game)
    }

    async fn slot(&self, game_id: &str) -> Result<Arc<Mutex<GameCell>>, AppError> {
        let inner = self.inner.read().await;
        inner
            .games
            .get(game_id)
            .map(|slot| slot.cell.clone())
            .ok_or_else(|| game_not_found(game_id))
    }

    pub async fn get(&self, game_id: &str) -> Result<Game, AppError> {
        let slot = self.slot(game_id).await?;
        let cell = slot.lock().await;
        if cell.removed {
            return Err(game_not_found(game_id));
        }
        Ok(cell.game.clone())
    }

    /// Case-insensitive lookup by join code
    pub async fn get_by_code(&self, code: &str) -> Result<Game, AppError> {
        let normalized = code.trim().to_ascii_uppercase();
        let game_id = {
            let inner = self.inner.read().await;
            inner.codes.get(&normalized).cloned()
        };

        match game_id {
            Some(id) => self.get(&id).await,
            None => Err(AppError::NotFound(format!(
                "no game with code {}",
                normalized
            ))),
        }
    }

    /// Take the game's write lock for a read-modify-write sequence.
    /// Fails with `NotFound` if the game was deleted while waiting.
    pub async fn lock(&self, game_id: &str) -> Result<GameGuard, AppError> {
        let slot = self.slot(game_id).await?;
        let guard = slot.lock_owned().await;
        if guard.removed {
            debug!(game_id = %game_id, "Game deleted while waiting for its lock");
            return Err(game_not_found(game_id));
        }
        Ok(GameGuard {
            guard,
            clock: self.clock.clone(),
        })
    }

    /// Overwrite a stored game. Prefer `lock` + `GameGuard::commit` for read-modify-write.
    pub async fn update(&self, game: Game) -> Result<Game, AppError> {
        let mut guard = self.lock(&game.id).await?;
        Ok(guard.commit(game))
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, game_id: &str) -> Result<(), AppError> {
        self.delete_if(game_id, |_| true).await.map(|_| ())
    }

    /// Remove the game if `should_delete` holds for its state under the game's
    /// lock. Writers already queued on the lock get `NotFound` afterwards.
    pub async fn delete_if<F>(&self, game_id: &str, should_delete: F) -> Result<bool, AppError>
    where
        F: FnOnce(&Game) -> bool,
    {
        let mut guard = match self.lock(game_id).await {
            Ok(guard) => guard,
            Err(e) => {
                warn!(game_id = %game_id, "Attempted to delete unknown game");
                return Err(e);
            }
        };
        if !should_delete(guard.game()) {
            return Ok(false);
        }

        let mut inner = self.inner.write().await;
        if let Some(slot) = inner.games.remove(game_id) {
            inner.codes.remove(&slot.code);
            info!(game_id = %game_id, code = %slot.code, "Game removed from registry");
        }
        guard.retire();
        Ok(true)
    }

    pub async fn list_ids(&self) -> Vec<String> {
        let inner = self.inner.read().await;
        inner.games.keys().cloned().collect()
    }

    pub async fn list_all(&self) -> Vec<Game> {
        let slots: Vec<Arc<Mutex<GameCell>>> = {
            let inner = self.inner.read().await;
            inner.games.values().map(|slot| slot.cell.clone()).collect()
        };

        let mut games = Vec::with_capacity(slots.len());
        for slot in slots {
            let cell = slot.lock().await;
            if !cell.removed {
                games.push(cell.game.clone());
            }
        }
        games
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.games.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn build_teams(specs: &[TeamSpec], starting_tokens: i64) -> Result<Vec<Team>, AppError> {
    if specs.is_empty() {
        return Err(AppError::BadRequest(
            "a game needs at least one team".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    let mut teams = Vec::with_capacity(specs.len());
    for (index, spec) in specs.iter().enumerate() {
        let name = spec.name.trim();
        if name.is_empty() {
            return Err(AppError::BadRequest("team names cannot be empty".to_string()));
        }
        if !seen.insert(name.to_lowercase()) {
            return Err(AppError::BadRequest(format!(
                "team name {} is used more than once",
                name
            )));
        }

        let default_role = if index == 0 {
            TeamRole::Seeker
        } else {
            TeamRole::Hider
        };
        teams.push(Team::new(
            name.to_string(),
            spec.role.unwrap_or(default_role),
            starting_tokens,
        ));
    }
    Ok(teams)
}

fn generate_code<R: Rng>(rng: &mut R) -> String {
    (0..CODE_LENGTH)
        .map(|_| char::from(rng.random_range(b'A'..=b'Z')))
        .collect()
}

fn generate_unique_code(taken: &HashMap<String, String>) -> String {
    let mut rng = rand::rng();
    loop {
        let code = generate_code(&mut rng);
        if !taken.contains_key(&code) {
            return code;
        }
        debug!(code = %code, "Game code collision, regenerating");
    }
}
