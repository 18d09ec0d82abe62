use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchasedClue {
    pub id: String,
    pub game_id: String,
    pub team_id: String,
    pub clue_type_id: String,
    pub clue_text: String,
    pub cost: i64,
    pub timestamp: i64,
    pub target_hider_team_ids: Vec<String>,
}

/// Clues bought in each live game, oldest first
#[derive(Debug, Default)]
pub struct ClueHistory {
    by_game: RwLock<HashMap<String, Vec<PurchasedClue>>>,
}

impl ClueHistory {
    pub async fn add(&self, clue: PurchasedClue) {
        let mut by_game = self.by_game.write().await;
        by_game.entry(clue.game_id.clone()).or_default().push(clue);
    }

    /// Clues bought by one team, newest first
    pub async fn for_team(&self, game_id: &str, team_id: &str) -> Vec<PurchasedClue> {
        let by_game = self.by_game.read().await;
        by_game
            .get(game_id)
            .map(|clues| {
                clues
                    .iter()
                    .rev()
                    .filter(|clue| clue.team_id == team_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Forget a game's clues; returns how many were dropped
    pub async fn purge(&self, game_id: &str) -> usize {
        let mut by_game = self.by_game.write().await;
        by_game.remove(game_id).map(|clues| clues.len()).unwrap_or(0)
    }
}
