//! Time accounting for games and hider tenures.
//!
//! Everything here is a pure function of the stored anchors and a caller supplied
//! `now` in epoch milliseconds. Ended games measure against `end_time` instead.

use super::models::{Game, Team};

/// Close the team's running hider session into its total. No-op when none is running.
pub fn fold_hider_session(team: &mut Team, now: i64) {
    if let Some(started) = team.hider_start_time.take() {
        team.total_hider_time += (now - started).max(0);
    }
}

/// Open a hider session at `now`. Teams that are not hiding are left untouched.
pub fn start_hider_session(team: &mut Team, now: i64) -> bool {
    if !team.is_hider() {
        return false;
    }
    team.hider_start_time = Some(now);
    true
}

/// Hider time including the session currently running, if any
pub fn hider_time_now(team: &Team, now: i64) -> i64 {
    let live = team
        .hider_start_time
        .map(|started| (now - started).max(0))
        .unwrap_or(0);
    team.total_hider_time + live
}

fn reference_time(game: &Game, now: i64) -> i64 {
    game.end_time.unwrap_or(now)
}

fn ongoing_pause(game: &Game, at: i64) -> i64 {
    game.pause_time
        .map(|paused_at| (at - paused_at).max(0))
        .unwrap_or(0)
}

pub fn compute_game_duration(game: &Game, now: i64) -> i64 {
    let Some(started) = game.game_start_time else {
        return 0;
    };
    let at = reference_time(game, now);
    (at - started - game.total_paused_duration - ongoing_pause(game, at)).max(0)
}

/// Active time in the current round; pauses before the round began do not count.
pub fn compute_round_duration(game: &Game, now: i64) -> i64 {
    let Some(started) = game.start_time else {
        return 0;
    };
    let at = reference_time(game, now);
    let paused_this_round = game.total_paused_duration - game.paused_duration_at_round_start;
    let round = (at - started - paused_this_round - ongoing_pause(game, at)).max(0);
    round.min(compute_game_duration(game, now))
}

/// Whether an active, time-limited game has used up its round
pub fn round_limit_reached(game: &Game, now: i64) -> bool {
    if game.status != super::models::GameStatus::Active {
        return false;
    }
    match game.round_length_minutes {
        Some(minutes) => compute_round_duration(game, now) >= i64::from(minutes) * 60_000,
        None => false,
    }
}

pub fn enter_pause(game: &mut Game, now: i64) {
    game.pause_time = Some(now);
    for team in game.teams.iter_mut() {
        fold_hider_session(team, now);
    }
}

/// Add the open pause interval to the game total without restarting any clocks
pub(crate) fn close_pause_interval(game: &mut Game, now: i64) {
    if let Some(paused_at) = game.pause_time.take() {
        game.total_paused_duration += (now - paused_at).max(0);
    }
}

pub fn exit_pause(game: &mut Game, now: i64) {
    close_pause_interval(game, now);
    for team in game.teams.iter_mut() {
        start_hider_session(team, now);
    }
}
