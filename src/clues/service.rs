use std::sync::Arc;

use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    history::PurchasedClue,
    text::{distance_to, ClueRequest, ClueTextGenerator, HiderSighting},
};
use crate::{
    catalog::Catalog,
    game::{GameService, GameStatus},
    notify::Actor,
    shared::AppError,
};

/// Sells clues to seekers, paying for them with tokens
pub struct ClueService {
    games: Arc<GameService>,
    catalog: Arc<Catalog>,
    generator: Arc<dyn ClueTextGenerator>,
}

impl ClueService {
    pub fn new(
        games: Arc<GameService>,
        catalog: Arc<Catalog>,
        generator: Arc<dyn ClueTextGenerator>,
    ) -> Self {
        Self {
            games,
            catalog,
            generator,
        }
    }

    /// Buy a clue about the hiders in range of the seeker team.
    ///
    /// Tokens are only taken once the clue text exists.
    #[instrument(skip(self))]
    pub async fn purchase_clue(
        &self,
        game_id: &str,
        team_id: &str,
        clue_type_id: &str,
    ) -> Result<PurchasedClue, AppError> {
        let clue_type = self
            .catalog
            .clue_type(clue_type_id)
            .ok_or_else(|| AppError::NotFound(format!("clue type {} not found", clue_type_id)))?;
        let generator = self.generator.clone();

        let ((clue, buyer_name), _, guard) = self
            .games
            .mutate_held(game_id, |game, now| {
                if game.status != GameStatus::Active {
                    return Err(AppError::InvalidTransition(format!(
                        "clues can only be bought while the game is active, not {}",
                        game.status
                    )));
                }
                let buyer = game
                    .team(team_id)
                    .ok_or_else(|| AppError::NotFound(format!("team {} not found", team_id)))?;
                if !buyer.is_seeker() {
                    return Err(AppError::PreconditionFailed(format!(
                        "team {} is not seeking and cannot buy clues",
                        buyer.name
                    )));
                }
                let seeker_location = buyer.location.ok_or_else(|| {
                    AppError::PreconditionFailed(format!(
                        "team {} has not shared a location yet",
                        buyer.name
                    ))
                })?;
                if buyer.tokens < clue_type.cost {
                    return Err(AppError::PreconditionFailed(format!(
                        "clue costs {} tokens but team {} has {}",
                        clue_type.cost, buyer.name, buyer.tokens
                    )));
                }

                let hiders: Vec<HiderSighting> = game
                    .teams
                    .iter()
                    .filter(|team| team.is_hider())
                    .filter_map(|team| {
                        team.location.map(|location| HiderSighting {
                            team_id: team.id.clone(),
                            team_name: team.name.clone(),
                            location,
                        })
                    })
                    .filter(|hider| match clue_type.range_meters {
                        Some(range) => distance_to(&seeker_location, hider) <= range,
                        None => true,
                    })
                    .collect();
                if hiders.is_empty() {
                    return Err(AppError::PreconditionFailed(
                        "no hider teams with a known location are within range".to_string(),
                    ));
                }

                let text = generator
                    .generate_clue_text(&ClueRequest {
                        clue_type,
                        seeker: &seeker_location,
                        hiders: &hiders,
                    })
                    .map_err(|e| AppError::ClueGeneration(e.to_string()))?;

                let buyer = game
                    .team_mut(team_id)
                    .ok_or_else(|| AppError::NotFound(format!("team {} not found", team_id)))?;
                buyer.tokens -= clue_type.cost;
                let buyer_name = buyer.name.clone();

                let clue = PurchasedClue {
                    id: Uuid::new_v4().to_string(),
                    game_id: game.id.clone(),
                    team_id: team_id.to_string(),
                    clue_type_id: clue_type.id.clone(),
                    clue_text: text,
                    cost: clue_type.cost,
                    timestamp: now,
                    target_hider_team_ids: hiders.into_iter().map(|h| h.team_id).collect(),
                };
                Ok((clue, buyer_name))
            })
            .await
            .inspect_err(|e| {
                warn!(game_id = %game_id, team_id = %team_id, clue_type = %clue_type_id, error = %e, "Clue purchase rejected")
            })?;

        // Logged before the lock is released so a delete always purges it
        self.games.clue_history().add(clue.clone()).await;
        drop(guard);

        info!(
            game_id = %game_id,
            team_id = %team_id,
            clue_type = %clue.clue_type_id,
            cost = clue.cost,
            targets = clue.target_hider_team_ids.len(),
            "Clue purchased"
        );
        self.games.record(
            game_id,
            "clue_purchased",
            Actor::team(team_id, &buyer_name),
            json!({ "clueType": clue.clue_type_id, "cost": clue.cost, "targets": clue.target_hider_team_ids }),
        );
        self.games.push().notify(
            game_id,
            "Clue purchased",
            format!("The seekers bought a {} clue.", clue_type.name),
        );

        Ok(clue)
    }

    /// Clues the team has bought in this game, newest first
    pub async fn clue_history(
        &self,
        game_id: &str,
        team_id: &str,
    ) -> Result<Vec<PurchasedClue>, AppError> {
        let game = self.games.get_game(game_id).await?;
        if game.team(team_id).is_none() {
            return Err(AppError::NotFound(format!("team {} not found", team_id)));
        }
        Ok(self.games.clue_history().for_team(game_id, team_id).await)
    }

    pub fn clue_types(&self) -> &[crate::catalog::ClueType] {
        self.catalog.clue_types()
    }
}
