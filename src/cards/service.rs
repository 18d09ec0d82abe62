use std::sync::Arc;

use rand::Rng;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, instrument};

use crate::{
    catalog::{Catalog, Challenge, Curse},
    game::{ActiveChallenge, ActiveCurse, AppliedCurse, Game, GameService, GameStatus, Team, TeamRole},
    notify::Actor,
    shared::AppError,
};

/// What a seeker turned over with `draw_card`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "cardType", rename_all = "camelCase")]
pub enum DrawnCard {
    Challenge { team: Team, challenge: Challenge },
    Curse { team: Team, curse: Curse },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChallengeCompletion {
    pub team: Team,
    pub tokens_earned: i64,
}

/// Both sides of a curse placed on a hider
#[derive(Debug, Clone, PartialEq)]
pub struct CurseOutcome {
    pub seeker: Team,
    pub target: Team,
    pub curse: ActiveCurse,
}

/// Challenge and curse handlers layered on the game's serialized writes
pub struct CardService {
    games: Arc<GameService>,
    catalog: Arc<Catalog>,
}

fn require_status(game: &Game, action: &str, allowed: &[GameStatus]) -> Result<(), AppError> {
    if allowed.contains(&game.status) {
        Ok(())
    } else {
        Err(AppError::InvalidTransition(format!(
            "cannot {} while the game is {}",
            action, game.status
        )))
    }
}

fn team_index(game: &Game, team_id: &str) -> Result<usize, AppError> {
    game.team_index(team_id)
        .ok_or_else(|| AppError::NotFound(format!("team {} not found", team_id)))
}

fn require_role(team: &Team, role: TeamRole, action: &str) -> Result<(), AppError> {
    if team.role == role {
        Ok(())
    } else {
        Err(AppError::PreconditionFailed(format!(
            "team {} is a {} and cannot {}",
            team.name, team.role, action
        )))
    }
}

fn require_no_veto(team: &mut Team, now: i64) -> Result<(), AppError> {
    if team.veto_active(now) {
        let remaining = team.veto_end_time.map(|end| end - now).unwrap_or(0);
        return Err(AppError::PreconditionFailed(format!(
            "team {} is vetoed for another {}s",
            team.name,
            (remaining + 999) / 1000
        )));
    }
    Ok(())
}

fn require_no_active_challenge(team: &Team) -> Result<(), AppError> {
    match &team.active_challenge {
        Some(active) => Err(AppError::PreconditionFailed(format!(
            "team {} already has an active challenge: {}",
            team.name, active.challenge.title
        ))),
        None => Ok(()),
    }
}

impl CardService {
    pub fn new(games: Arc<GameService>, catalog: Arc<Catalog>) -> Self {
        Self { games, catalog }
    }

    #[instrument(skip(self))]
    pub async fn draw_challenge(&self, game_id: &str, team_id: &str) -> Result<Team, AppError> {
        let catalog = &self.catalog;
        let (team, _) = self
            .games
            .mutate(game_id, |game, now| {
                require_status(game, "draw a challenge", &[GameStatus::Active])?;
                let index = team_index(game, team_id)?;
                let team = &mut game.teams[index];
                require_role(team, TeamRole::Seeker, "draw challenges")?;
                require_no_veto(team, now)?;
                require_no_active_challenge(team)?;

                let challenge = catalog
                    .draw_challenge(&team.completed_challenge_ids)
                    .ok_or_else(|| {
                        AppError::Exhausted(format!("team {} has no challenges left", team.name))
                    })?;
                team.active_challenge = Some(ActiveChallenge {
                    challenge: challenge.clone(),
                    start_time: now,
                });
                Ok(team.clone())
            })
            .await?;

        if let Some(active) = &team.active_challenge {
            info!(game_id = %game_id, team = %team.name, challenge = %active.challenge.title, "Challenge drawn");
            self.games.record(
                game_id,
                "challenge_drawn",
                Actor::team(&team.id, &team.name),
                json!({ "challengeId": active.challenge.id }),
            );
        }
        Ok(team)
    }

    #[instrument(skip(self))]
    pub async fn complete_challenge(
        &self,
        game_id: &str,
        team_id: &str,
    ) -> Result<ChallengeCompletion, AppError> {
        let (completion, _) = self
            .games
            .mutate(game_id, |game, _| {
                require_status(game, "complete a challenge", &[GameStatus::Active])?;
                let index = team_index(game, team_id)?;
                let team = &mut game.teams[index];
                require_role(team, TeamRole::Seeker, "complete challenges")?;
                let active = team.active_challenge.take().ok_or_else(|| {
                    AppError::PreconditionFailed(format!(
                        "team {} has no active challenge",
                        team.name
                    ))
                })?;

                let reward = active.challenge.token_reward;
                team.tokens += reward;
                team.completed_challenge_ids.insert(active.challenge.id);
                Ok(ChallengeCompletion {
                    team: team.clone(),
                    tokens_earned: reward,
                })
            })
            .await?;

        info!(
            game_id = %game_id,
            team = %completion.team.name,
            tokens_earned = completion.tokens_earned,
            "Challenge completed"
        );
        self.games.record(
            game_id,
            "challenge_completed",
            Actor::team(&completion.team.id, &completion.team.name),
            json!({ "tokensEarned": completion.tokens_earned, "tokens": completion.team.tokens }),
        );
        Ok(completion)
    }

    /// Turn down the active challenge. Starts the veto window and applies the
    /// challenge's penalty curse to the refusing team.
    #[instrument(skip(self))]
    pub async fn refuse_challenge(&self, game_id: &str, team_id: &str) -> Result<Team, AppError> {
        let veto_ms = self.games.rules().veto_ms();
        let penalty_ms = self.games.rules().refusal_curse_ms();

        let (team, _) = self
            .games
            .mutate(game_id, |game, now| {
                require_status(game, "refuse a challenge", &[GameStatus::Active])?;
                let index = team_index(game, team_id)?;
                let team = &mut game.teams[index];
                require_role(team, TeamRole::Seeker, "refuse challenges")?;
                let active = team.active_challenge.take().ok_or_else(|| {
                    AppError::PreconditionFailed(format!(
                        "team {} has no active challenge",
                        team.name
                    ))
                })?;

                team.veto_end_time = Some(now + veto_ms);
                if let Some(penalty) = active.challenge.penalty_curse {
                    team.prune_expired_curses(now);
                    team.active_curses.push(ActiveCurse {
                        curse: penalty,
                        start_time: now,
                        end_time: now + penalty_ms,
                        completed: false,
                        completed_at: None,
                    });
                }
                Ok(team.clone())
            })
            .await?;

        info!(game_id = %game_id, team = %team.name, veto_end_time = ?team.veto_end_time, "Challenge refused");
        self.games.record(
            game_id,
            "challenge_refused",
            Actor::team(&team.id, &team.name),
            json!({ "vetoEndTime": team.veto_end_time }),
        );
        Ok(team)
    }

    /// Seeker draws either a challenge or a curse card. Curses are dealt without
    /// repeats until the team has seen the whole deck.
    #[instrument(skip(self))]
    pub async fn draw_card(&self, game_id: &str, team_id: &str) -> Result<DrawnCard, AppError> {
        let catalog = &self.catalog;
        let prefer_challenge = rand::rng().random_bool(0.5);

        let (card, _) = self
            .games
            .mutate(game_id, |game, now| {
                require_status(game, "draw a card", &[GameStatus::Active])?;
                let index = team_index(game, team_id)?;
                let team = &mut game.teams[index];
                require_role(team, TeamRole::Seeker, "draw cards")?;
                require_no_veto(team, now)?;
                require_no_active_challenge(team)?;

                let challenges_left = catalog.has_challenge_outside(&team.completed_challenge_ids);
                if (prefer_challenge && challenges_left) || catalog.curses().is_empty() {
                    let challenge = catalog
                        .draw_challenge(&team.completed_challenge_ids)
                        .cloned()
                        .ok_or_else(|| {
                            AppError::Exhausted(format!("team {} has no cards left", team.name))
                        })?;
                    team.active_challenge = Some(ActiveChallenge {
                        challenge: challenge.clone(),
                        start_time: now,
                    });
                    return Ok(DrawnCard::Challenge {
                        team: team.clone(),
                        challenge,
                    });
                }

                let (curse, recycled) = catalog
                    .draw_curse_for(&team.completed_curse_ids)
                    .ok_or_else(|| AppError::Exhausted("the curse deck is empty".to_string()))?;
                if recycled {
                    team.completed_curse_ids.clear();
                }
                team.completed_curse_ids.insert(curse.id.clone());
                Ok(DrawnCard::Curse {
                    team: team.clone(),
                    curse: curse.clone(),
                })
            })
            .await?;

        let (team, kind, card_id) = match &card {
            DrawnCard::Challenge { team, challenge } => (team, "challenge", &challenge.id),
            DrawnCard::Curse { team, curse } => (team, "curse", &curse.id),
        };
        info!(game_id = %game_id, team = %team.name, kind, card_id = %card_id, "Card drawn");
        self.games.record(
            game_id,
            "card_drawn",
            Actor::team(&team.id, &team.name),
            json!({ "cardType": kind, "cardId": card_id }),
        );
        Ok(card)
    }

    /// Seeker spends tokens to place a random curse on a hider
    #[instrument(skip(self))]
    pub async fn curse_team(
        &self,
        game_id: &str,
        seeker_id: &str,
        target_id: &str,
    ) -> Result<CurseOutcome, AppError> {
        let catalog = &self.catalog;

        let (outcome, _) = self
            .games
            .mutate(game_id, |game, now| {
                require_status(game, "curse a team", &[GameStatus::Active])?;
                let seeker_index = team_index(game, seeker_id)?;
                let target_index = team_index(game, target_id)?;

                {
                    let seeker = &mut game.teams[seeker_index];
                    require_role(seeker, TeamRole::Seeker, "place curses")?;
                    require_no_veto(seeker, now)?;
                }
                {
                    let target = &mut game.teams[target_index];
                    require_role(target, TeamRole::Hider, "be cursed")?;
                    target.prune_expired_curses(now);
                    if let Some(live) = target.live_curse(now) {
                        return Err(AppError::PreconditionFailed(format!(
                            "team {} is already under {} until {}",
                            target.name, live.curse.title, live.end_time
                        )));
                    }
                }

                let curse = catalog
                    .draw_curse()
                    .cloned()
                    .ok_or_else(|| AppError::Exhausted("the curse deck is empty".to_string()))?;
                let seeker = &game.teams[seeker_index];
                if seeker.tokens < curse.token_cost {
                    return Err(AppError::PreconditionFailed(format!(
                        "{} costs {} tokens but team {} has {}",
                        curse.title, curse.token_cost, seeker.name, seeker.tokens
                    )));
                }

                let duration = curse.duration_ms();
                let active = ActiveCurse {
                    curse: curse.clone(),
                    start_time: now,
                    end_time: now + duration,
                    completed: false,
                    completed_at: None,
                };

                let target = &mut game.teams[target_index];
                target.active_curses.push(active.clone());
                let target_snapshot = target.clone();

                let seeker = &mut game.teams[seeker_index];
                seeker.tokens -= curse.token_cost;
                seeker.prune_expired_applied_curses(now);
                seeker.applied_curses.push(AppliedCurse {
                    curse,
                    target_team_id: target_snapshot.id.clone(),
                    target_team_name: target_snapshot.name.clone(),
                    start_time: now,
                    end_time: now + duration,
                });

                Ok(CurseOutcome {
                    seeker: seeker.clone(),
                    target: target_snapshot,
                    curse: active,
                })
            })
            .await?;

        info!(
            game_id = %game_id,
            seeker = %outcome.seeker.name,
            target = %outcome.target.name,
            curse = %outcome.curse.curse.title,
            end_time = outcome.curse.end_time,
            "Curse applied"
        );
        self.games.record(
            game_id,
            "curse_applied",
            Actor::team(&outcome.seeker.id, &outcome.seeker.name),
            json!({
                "targetTeamId": outcome.target.id,
                "curseId": outcome.curse.curse.id,
                "endTime": outcome.curse.end_time,
            }),
        );
        self.games.push().notify(
            game_id,
            format!("{} has been cursed!", outcome.target.name),
            format!("{}: {}", outcome.curse.curse.title, outcome.curse.curse.description),
        );
        Ok(outcome)
    }

    /// Hider reports that it has carried out a curse
    #[instrument(skip(self))]
    pub async fn mark_curse_completed(
        &self,
        game_id: &str,
        team_id: &str,
        curse_id: &str,
    ) -> Result<Team, AppError> {
        let (team, _) = self
            .games
            .mutate(game_id, |game, now| {
                require_status(
                    game,
                    "complete a curse",
                    &[GameStatus::Active, GameStatus::Paused],
                )?;
                let index = team_index(game, team_id)?;
                let team = &mut game.teams[index];
                require_role(team, TeamRole::Hider, "complete curses")?;
                team.prune_expired_curses(now);

                let name = team.name.clone();
                let curse = team
                    .active_curses
                    .iter_mut()
                    .find(|active| active.curse.id == curse_id)
                    .ok_or_else(|| {
                        AppError::NotFound(format!(
                            "team {} has no live curse {}",
                            name, curse_id
                        ))
                    })?;
                if curse.completed {
                    return Err(AppError::PreconditionFailed(format!(
                        "curse {} is already completed",
                        curse.curse.title
                    )));
                }
                curse.completed = true;
                curse.completed_at = Some(now);
                Ok(team.clone())
            })
            .await?;

        info!(game_id = %game_id, team = %team.name, curse_id = %curse_id, "Curse completed");
        self.games.record(
            game_id,
            "curse_completed",
            Actor::team(&team.id, &team.name),
            json!({ "curseId": curse_id }),
        );
        Ok(team)
    }

    /// Hider teams the seeker could curse right now
    pub async fn curse_targets(&self, game_id: &str, seeker_id: &str) -> Result<Vec<Team>, AppError> {
        let view = self.games.get_game(game_id).await?;
        let now = self.games.now_ms();
        let seeker = view
            .team(seeker_id)
            .ok_or_else(|| AppError::NotFound(format!("team {} not found", seeker_id)))?;
        require_role(seeker, TeamRole::Seeker, "place curses")?;

        let targets: Vec<Team> = view
            .game
            .teams
            .iter()
            .filter(|team| team.is_hider() && team.live_curse(now).is_none())
            .cloned()
            .map(|mut team| {
                team.prune_expired_curses(now);
                team
            })
            .collect();

        debug!(game_id = %game_id, targets = targets.len(), "Curse targets listed");
        Ok(targets)
    }
}
