//! Round state machine.
//!
//! Each transition checks every guard before it writes a single field, so a
//! rejected call leaves the game exactly as it was.

use thiserror::Error;

use super::models::{Game, GameStatus, TeamRole};
use super::timing::{
    close_pause_interval, enter_pause, exit_pause, fold_hider_session, round_limit_reached,
    start_hider_session,
};
use crate::shared::AppError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("cannot {action} a game that is {status}")]
    InvalidSource {
        action: &'static str,
        status: GameStatus,
    },

    #[error("cannot {action}: at least one seeker and one hider are required")]
    MissingRoles { action: &'static str },

    #[error("round ended on its time limit; start the next round instead of resuming")]
    TimeLimitPause,

    #[error("round time limit has not been reached")]
    LimitNotReached,

    #[error("team {0} not found")]
    UnknownTeam(String),

    #[error("team {team} is a {role}, expected a {expected}")]
    RoleMismatch {
        team: String,
        role: TeamRole,
        expected: TeamRole,
    },
}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::UnknownTeam(_) => AppError::NotFound(err.to_string()),
            TransitionError::RoleMismatch { .. } => AppError::PreconditionFailed(err.to_string()),
            _ => AppError::InvalidTransition(err.to_string()),
        }
    }
}

fn require_status(
    game: &Game,
    action: &'static str,
    allowed: &[GameStatus],
) -> Result<(), TransitionError> {
    if allowed.contains(&game.status) {
        Ok(())
    } else {
        Err(TransitionError::InvalidSource {
            action,
            status: game.status,
        })
    }
}

fn require_both_roles(game: &Game, action: &'static str) -> Result<(), TransitionError> {
    if game.has_both_roles() {
        Ok(())
    } else {
        Err(TransitionError::MissingRoles { action })
    }
}

/// waiting -> active
pub fn start(game: &mut Game, now: i64) -> Result<(), TransitionError> {
    require_status(game, "start", &[GameStatus::Waiting])?;
    require_both_roles(game, "start")?;

    game.status = GameStatus::Active;
    game.game_start_time = Some(now);
    game.start_time = Some(now);
    game.pause_time = None;
    game.end_time = None;
    game.paused_by_time_limit = false;
    game.paused_duration_at_round_start = game.total_paused_duration;
    for team in game.teams.iter_mut() {
        team.total_hider_time = team.total_hider_time.max(0);
        team.hider_start_time = None;
        start_hider_session(team, now);
    }
    Ok(())
}

/// active -> paused, by an admin
pub fn pause(game: &mut Game, now: i64) -> Result<(), TransitionError> {
    require_status(game, "pause", &[GameStatus::Active])?;

    enter_pause(game, now);
    game.status = GameStatus::Paused;
    game.paused_by_time_limit = false;
    Ok(())
}

/// active -> paused, because the round ran out of time
pub fn auto_pause(game: &mut Game, now: i64) -> Result<(), TransitionError> {
    require_status(game, "auto-pause", &[GameStatus::Active])?;
    if !round_limit_reached(game, now) {
        return Err(TransitionError::LimitNotReached);
    }

    enter_pause(game, now);
    game.status = GameStatus::Paused;
    game.paused_by_time_limit = true;
    Ok(())
}

/// paused -> active, continuing the same round
pub fn resume(game: &mut Game, now: i64) -> Result<(), TransitionError> {
    require_status(game, "resume", &[GameStatus::Paused])?;
    if game.paused_by_time_limit {
        return Err(TransitionError::TimeLimitPause);
    }

    exit_pause(game, now);
    game.status = GameStatus::Active;
    Ok(())
}

/// paused -> active, opening a fresh round
pub fn next_round(game: &mut Game, now: i64) -> Result<(), TransitionError> {
    require_status(game, "start the next round of", &[GameStatus::Paused])?;
    require_both_roles(game, "start the next round")?;

    close_pause_interval(game, now);
    game.round += 1;
    game.paused_by_time_limit = false;
    game.start_time = Some(now);
    game.paused_duration_at_round_start = game.total_paused_duration;
    game.status = GameStatus::Active;
    for team in game.teams.iter_mut() {
        fold_hider_session(team, now);
        start_hider_session(team, now);
    }
    Ok(())
}

/// active|paused -> ended
pub fn end(game: &mut Game, now: i64) -> Result<(), TransitionError> {
    require_status(game, "end", &[GameStatus::Active, GameStatus::Paused])?;

    for team in game.teams.iter_mut() {
        fold_hider_session(team, now);
    }
    close_pause_interval(game, now);
    game.end_time = Some(now);
    game.status = GameStatus::Ended;
    Ok(())
}

/// ended -> waiting, wiping timing and per-round team state
pub fn restart(game: &mut Game, starting_tokens: i64) -> Result<(), TransitionError> {
    require_status(game, "restart", &[GameStatus::Ended])?;

    game.status = GameStatus::Waiting;
    game.round = 1;
    game.game_start_time = None;
    game.start_time = None;
    game.pause_time = None;
    game.end_time = None;
    game.total_paused_duration = 0;
    game.paused_duration_at_round_start = 0;
    game.paused_by_time_limit = false;
    for team in game.teams.iter_mut() {
        team.reset_for_restart(starting_tokens);
    }
    Ok(())
}

/// Flip a found hider to seeker. Returns true when no hiders remain and the
/// game was paused as a result.
pub fn mark_found(game: &mut Game, team_id: &str, now: i64) -> Result<bool, TransitionError> {
    require_status(game, "mark a team found in", &[GameStatus::Active])?;
    let index = game
        .team_index(team_id)
        .ok_or_else(|| TransitionError::UnknownTeam(team_id.to_string()))?;
    let team = &game.teams[index];
    if !team.is_hider() {
        return Err(TransitionError::RoleMismatch {
            team: team.name.clone(),
            role: team.role,
            expected: TeamRole::Hider,
        });
    }

    let team = &mut game.teams[index];
    fold_hider_session(team, now);
    team.role = TeamRole::Seeker;

    if game.hider_count() == 0 {
        enter_pause(game, now);
        game.status = GameStatus::Paused;
        game.paused_by_time_limit = false;
        return Ok(true);
    }
    Ok(false)
}

/// Admin role assignment. Keeps hider sessions consistent while the game runs.
pub fn change_role(
    game: &mut Game,
    team_id: &str,
    role: TeamRole,
    now: i64,
) -> Result<(), TransitionError> {
    require_status(
        game,
        "change roles in",
        &[GameStatus::Waiting, GameStatus::Active, GameStatus::Paused],
    )?;
    let active = game.status == GameStatus::Active;
    let team = game
        .team_mut(team_id)
        .ok_or_else(|| TransitionError::UnknownTeam(team_id.to_string()))?;
    if team.role == role {
        return Ok(());
    }

    fold_hider_session(team, now);
    team.role = role;
    if active {
        start_hider_session(team, now);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::models::Team;
    use crate::game::timing::{compute_game_duration, compute_round_duration};
    use rstest::rstest;

    fn waiting_game(roles: &[TeamRole]) -> Game {
        let teams = roles
            .iter()
            .enumerate()
            .map(|(i, role)| Team::new(format!("Team {}", i), *role, 10))
            .collect();
        Game::new("ABCDEF".to_string(), teams, None, 0)
    }

    fn red_blue() -> Game {
        waiting_game(&[TeamRole::Seeker, TeamRole::Hider])
    }

    #[rstest]
    #[case(&[TeamRole::Seeker, TeamRole::Seeker])]
    #[case(&[TeamRole::Hider, TeamRole::Hider])]
    #[case(&[TeamRole::Hider])]
    fn test_start_requires_both_roles_and_changes_nothing(#[case] roles: &[TeamRole]) {
        let mut game = waiting_game(roles);
        let before = game.clone();

        let result = start(&mut game, 1_000);

        assert!(matches!(result, Err(TransitionError::MissingRoles { .. })));
        assert_eq!(game, before);
        assert!(matches!(
            AppError::from(result.unwrap_err()),
            AppError::InvalidTransition(_)
        ));
    }

    #[test]
    fn test_start_sets_anchors_and_hider_clock() {
        let mut game = red_blue();
        start(&mut game, 1_000).unwrap();

        assert_eq!(game.status, GameStatus::Active);
        assert_eq!(game.start_time, Some(1_000));
        assert_eq!(game.game_start_time, Some(1_000));
        assert_eq!(game.teams[0].hider_start_time, None);
        assert_eq!(game.teams[1].hider_start_time, Some(1_000));
    }

    #[test]
    fn test_start_twice_is_invalid() {
        let mut game = red_blue();
        start(&mut game, 0).unwrap();
        assert_eq!(
            start(&mut game, 5),
            Err(TransitionError::InvalidSource {
                action: "start",
                status: GameStatus::Active
            })
        );
    }

    #[test]
    fn test_manual_pause_resume_cycle() {
        let mut game = red_blue();
        start(&mut game, 0).unwrap();
        pause(&mut game, 10_000).unwrap();

        assert_eq!(game.status, GameStatus::Paused);
        assert!(!game.paused_by_time_limit);
        assert_eq!(game.teams[1].total_hider_time, 10_000);

        resume(&mut game, 15_000).unwrap();
        assert_eq!(game.status, GameStatus::Active);
        assert_eq!(game.total_paused_duration, 5_000);
        assert_eq!(game.teams[1].hider_start_time, Some(15_000));
    }

    #[test]
    fn test_auto_pause_blocks_resume_until_next_round() {
        let mut game = red_blue();
        game.round_length_minutes = Some(1);
        start(&mut game, 0).unwrap();

        assert_eq!(auto_pause(&mut game, 59_000), Err(TransitionError::LimitNotReached));
        auto_pause(&mut game, 60_000).unwrap();
        assert!(game.paused_by_time_limit);

        let before = game.clone();
        assert_eq!(resume(&mut game, 61_000), Err(TransitionError::TimeLimitPause));
        assert_eq!(game, before);

        next_round(&mut game, 70_000).unwrap();
        assert_eq!(game.round, 2);
        assert!(!game.paused_by_time_limit);
        assert_eq!(game.status, GameStatus::Active);
        assert_eq!(game.total_paused_duration, 10_000);
        assert_eq!(game.paused_duration_at_round_start, 10_000);
        assert_eq!(game.teams[1].hider_start_time, Some(70_000));
        assert_eq!(compute_round_duration(&game, 80_000), 10_000);
        assert_eq!(compute_game_duration(&game, 80_000), 70_000);
    }

    #[test]
    fn test_next_round_requires_paused_game() {
        let mut game = red_blue();
        start(&mut game, 0).unwrap();
        assert!(matches!(
            next_round(&mut game, 1_000),
            Err(TransitionError::InvalidSource { .. })
        ));
    }

    #[test]
    fn test_end_from_paused_closes_pause() {
        let mut game = red_blue();
        start(&mut game, 0).unwrap();
        pause(&mut game, 10_000).unwrap();
        end(&mut game, 25_000).unwrap();

        assert_eq!(game.status, GameStatus::Ended);
        assert_eq!(game.end_time, Some(25_000));
        assert_eq!(game.pause_time, None);
        assert_eq!(game.total_paused_duration, 15_000);
        assert_eq!(compute_game_duration(&game, 999_999), 10_000);
        assert_eq!(game.teams[1].total_hider_time, 10_000);
    }

    #[test]
    fn test_end_from_active_folds_hiders() {
        let mut game = red_blue();
        start(&mut game, 0).unwrap();
        end(&mut game, 12_000).unwrap();

        assert_eq!(game.teams[1].hider_start_time, None);
        assert_eq!(game.teams[1].total_hider_time, 12_000);
    }

    #[test]
    fn test_restart_resets_state_and_keeps_identity() {
        let mut game = red_blue();
        start(&mut game, 0).unwrap();
        pause(&mut game, 1_000).unwrap();
        resume(&mut game, 3_000).unwrap();
        game.teams[0].tokens = 2;
        game.teams[0].completed_challenge_ids.insert("c1".to_string());
        end(&mut game, 8_000).unwrap();
        let ids: Vec<String> = game.teams.iter().map(|t| t.id.clone()).collect();

        restart(&mut game, 10).unwrap();

        assert_eq!(game.status, GameStatus::Waiting);
        assert_eq!(game.round, 1);
        assert_eq!(game.total_paused_duration, 0);
        assert_eq!(game.paused_duration_at_round_start, 0);
        assert_eq!(game.start_time, None);
        assert_eq!(game.end_time, None);
        assert_eq!(game.teams[0].tokens, 10);
        assert!(game.teams[0].completed_challenge_ids.is_empty());
        assert_eq!(game.teams[1].total_hider_time, 0);
        assert_eq!(game.teams[1].role, TeamRole::Hider);
        assert_eq!(
            game.teams.iter().map(|t| t.id.clone()).collect::<Vec<_>>(),
            ids
        );
    }

    #[test]
    fn test_restart_only_from_ended() {
        let mut game = red_blue();
        assert!(restart(&mut game, 10).is_err());
    }

    #[test]
    fn test_mark_found_last_hider_pauses_game() {
        let mut game = waiting_game(&[TeamRole::Seeker, TeamRole::Hider, TeamRole::Hider]);
        start(&mut game, 0).unwrap();
        let first = game.teams[1].id.clone();
        let second = game.teams[2].id.clone();

        assert!(!mark_found(&mut game, &first, 5_000).unwrap());
        assert_eq!(game.teams[1].role, TeamRole::Seeker);
        assert_eq!(game.teams[1].total_hider_time, 5_000);
        assert_eq!(game.status, GameStatus::Active);

        assert!(mark_found(&mut game, &second, 9_000).unwrap());
        assert_eq!(game.status, GameStatus::Paused);
        assert!(!game.paused_by_time_limit);
        assert_eq!(game.teams[2].total_hider_time, 9_000);
        assert!(game.teams.iter().all(|t| t.hider_start_time.is_none()));
    }

    #[test]
    fn test_mark_found_rejects_seekers_and_unknown_teams() {
        let mut game = red_blue();
        start(&mut game, 0).unwrap();
        let seeker = game.teams[0].id.clone();

        let err = mark_found(&mut game, &seeker, 1_000).unwrap_err();
        assert!(matches!(AppError::from(err), AppError::PreconditionFailed(_)));

        let err = mark_found(&mut game, "nope", 1_000).unwrap_err();
        assert!(matches!(AppError::from(err), AppError::NotFound(_)));
    }

    #[test]
    fn test_change_role_keeps_hider_sessions_consistent() {
        let mut game = red_blue();
        start(&mut game, 0).unwrap();
        let seeker = game.teams[0].id.clone();
        let hider = game.teams[1].id.clone();

        change_role(&mut game, &seeker, TeamRole::Hider, 2_000).unwrap();
        assert_eq!(game.teams[0].hider_start_time, Some(2_000));

        change_role(&mut game, &hider, TeamRole::Seeker, 4_000).unwrap();
        assert_eq!(game.teams[1].hider_start_time, None);
        assert_eq!(game.teams[1].total_hider_time, 4_000);
    }

    #[test]
    fn test_change_role_while_waiting_starts_no_session() {
        let mut game = red_blue();
        let seeker = game.teams[0].id.clone();

        change_role(&mut game, &seeker, TeamRole::Hider, 2_000).unwrap();
        assert_eq!(game.teams[0].role, TeamRole::Hider);
        assert_eq!(game.teams[0].hider_start_time, None);
    }

    #[test]
    fn test_change_role_rejected_once_ended() {
        let mut game = red_blue();
        start(&mut game, 0).unwrap();
        end(&mut game, 1_000).unwrap();
        let seeker = game.teams[0].id.clone();

        assert!(change_role(&mut game, &seeker, TeamRole::Hider, 2_000).is_err());
    }
}
