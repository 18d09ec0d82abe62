use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};
use uuid::Uuid;

use super::timing;
use crate::catalog::{Challenge, Curse};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum GameStatus {
    Waiting,
    Active,
    Paused,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TeamRole {
    Seeker,
    Hider,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveChallenge {
    pub challenge: Challenge,
    pub start_time: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveCurse {
    pub curse: Curse,
    pub start_time: i64,
    pub end_time: i64,
    pub completed: bool,
    pub completed_at: Option<i64>,
}

impl ActiveCurse {
    pub fn is_live(&self, now: i64) -> bool {
        now < self.end_time
    }
}

/// Seeker-side record of a curse placed on another team
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedCurse {
    pub curse: Curse,
    pub target_team_id: String,
    pub target_team_name: String,
    pub start_time: i64,
    pub end_time: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: String,
    pub name: String,
    pub role: TeamRole,
    pub tokens: i64,
    pub location: Option<TeamLocation>,
    pub completed_challenge_ids: BTreeSet<String>,
    pub completed_curse_ids: BTreeSet<String>,
    pub active_challenge: Option<ActiveChallenge>,
    pub active_curses: Vec<ActiveCurse>,
    pub applied_curses: Vec<AppliedCurse>,
    pub veto_end_time: Option<i64>,
    pub hider_start_time: Option<i64>,
    pub total_hider_time: i64,
}

impl Team {
    pub fn new(name: String, role: TeamRole, tokens: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            role,
            tokens,
            location: None,
            completed_challenge_ids: BTreeSet::new(),
            completed_curse_ids: BTreeSet::new(),
            active_challenge: None,
            active_curses: Vec::new(),
            applied_curses: Vec::new(),
            veto_end_time: None,
            hider_start_time: None,
            total_hider_time: 0,
        }
    }

    pub fn is_hider(&self) -> bool {
        self.role == TeamRole::Hider
    }

    pub fn is_seeker(&self) -> bool {
        self.role == TeamRole::Seeker
    }

    /// Drop curses whose end time has passed
    pub fn prune_expired_curses(&mut self, now: i64) {
        self.active_curses.retain(|curse| curse.is_live(now));
    }

    pub fn prune_expired_applied_curses(&mut self, now: i64) {
        self.applied_curses.retain(|applied| now < applied.end_time);
    }

    pub fn live_curse(&self, now: i64) -> Option<&ActiveCurse> {
        self.active_curses.iter().find(|curse| curse.is_live(now))
    }

    /// Clear an elapsed veto and report whether one is still running
    pub fn veto_active(&mut self, now: i64) -> bool {
        match self.veto_end_time {
            Some(end) if now < end => true,
            Some(_) => {
                self.veto_end_time = None;
                false
            }
            None => false,
        }
    }

    /// Reset everything a restart wipes, keeping identity, name and role
    pub fn reset_for_restart(&mut self, starting_tokens: i64) {
        self.tokens = starting_tokens;
        self.location = None;
        self.completed_challenge_ids.clear();
        self.completed_curse_ids.clear();
        self.active_challenge = None;
        self.active_curses.clear();
        self.applied_curses.clear();
        self.veto_end_time = None;
        self.hider_start_time = None;
        self.total_hider_time = 0;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub id: String,
    pub code: String,
    pub status: GameStatus,
    pub round: u32,
    pub round_length_minutes: Option<u32>,
    /// First activation of the game
    pub game_start_time: Option<i64>,
    /// Start of the current round
    pub start_time: Option<i64>,
    pub pause_time: Option<i64>,
    pub total_paused_duration: i64,
    /// `total_paused_duration` as it stood when the current round began
    pub paused_duration_at_round_start: i64,
    pub end_time: Option<i64>,
    pub paused_by_time_limit: bool,
    pub created_at: i64,
    pub last_activity_time: i64,
    pub teams: Vec<Team>,
}

impl Game {
    pub fn new(code: String, teams: Vec<Team>, round_length_minutes: Option<u32>, now: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            code,
            status: GameStatus::Waiting,
            round: 1,
            round_length_minutes,
            game_start_time: None,
            start_time: None,
            pause_time: None,
            total_paused_duration: 0,
            paused_duration_at_round_start: 0,
            end_time: None,
            paused_by_time_limit: false,
            created_at: now,
            last_activity_time: now,
            teams,
        }
    }

    pub fn team(&self, team_id: &str) -> Option<&Team> {
        self.teams.iter().find(|team| team.id == team_id)
    }

    pub fn team_mut(&mut self, team_id: &str) -> Option<&mut Team> {
        self.teams.iter_mut().find(|team| team.id == team_id)
    }

    pub fn team_index(&self, team_id: &str) -> Option<usize> {
        self.teams.iter().position(|team| team.id == team_id)
    }

    pub fn seeker_count(&self) -> usize {
        self.teams.iter().filter(|team| team.is_seeker()).count()
    }

    pub fn hider_count(&self) -> usize {
        self.teams.iter().filter(|team| team.is_hider()).count()
    }

    pub fn has_both_roles(&self) -> bool {
        self.seeker_count() > 0 && self.hider_count() > 0
    }
}

/// Team as supplied at game creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamSpec {
    pub name: String,
    #[serde(default)]
    pub role: Option<TeamRole>,
}

impl TeamSpec {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: None,
        }
    }

    pub fn with_role(name: impl Into<String>, role: TeamRole) -> Self {
        Self {
            name: name.into(),
            role: Some(role),
        }
    }
}

/// Game snapshot with its derived durations, as broadcast and returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameView {
    #[serde(flatten)]
    pub game: Game,
    pub game_duration: i64,
    pub round_duration: i64,
}

impl GameView {
    /// Snapshot of `game` as of `now`. Curses that have run out are left off
    /// even if no write has pruned them from the stored game yet.
    pub fn at(mut game: Game, now: i64) -> Self {
        for team in &mut game.teams {
            team.prune_expired_curses(now);
            team.prune_expired_applied_curses(now);
        }
        let game_duration = timing::compute_game_duration(&game, now);
        let round_duration = timing::compute_round_duration(&game, now);
        Self {
            game,
            game_duration,
            round_duration,
        }
    }

    pub fn team(&self, team_id: &str) -> Option<&Team> {
        self.game.team(team_id)
    }
}
