//! Challenge, curse and clue-type content, plus the random draws over it.

use std::{collections::BTreeSet, fs, io::ErrorKind, path::Path};

use rand::seq::IndexedRandom;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Curse {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(
        default,
        alias = "token_count",
        alias = "price",
        deserialize_with = "lenient_amount"
    )]
    pub token_cost: i64,
    #[serde(default, alias = "time_seconds")]
    pub duration_seconds: Option<u32>,
}

impl Curse {
    /// How long the curse stays live once applied.
    ///
    /// Content without an explicit duration falls back to reading the token cost
    /// as minutes.
    pub fn duration_ms(&self) -> i64 {
        match self.duration_seconds {
            Some(seconds) => i64::from(seconds) * 1000,
            None => {
                warn!(
                    curse_id = %self.id,
                    title = %self.title,
                    token_cost = self.token_cost,
                    "curse has no duration; using token cost as minutes"
                );
                self.token_cost.max(0) * 60_000
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(
        default,
        alias = "token_count",
        alias = "token_reward",
        deserialize_with = "lenient_amount"
    )]
    pub token_reward: i64,
    /// Curse the refusing team takes on when it turns this challenge down
    #[serde(default, alias = "curse")]
    pub penalty_curse: Option<Curse>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClueType {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub cost: i64,
    /// Only hiders within this many meters of the seeker are eligible; unbounded when absent
    #[serde(default)]
    pub range_meters: Option<f64>,
}

/// Token amounts in content files are sometimes written as text ("2 x Dice roll").
/// The leading number is taken; anything unreadable counts as one token.
fn lenient_amount<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawAmount {
        Number(i64),
        Text(String),
        Missing(()),
    }

    Ok(match RawAmount::deserialize(deserializer)? {
        RawAmount::Number(value) => value,
        RawAmount::Text(text) => text
            .split_whitespace()
            .next()
            .and_then(|head| head.parse().ok())
            .unwrap_or(1),
        RawAmount::Missing(()) => 0,
    })
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCatalog {
    #[serde(default)]
    challenges: Vec<Challenge>,
    #[serde(default)]
    curses: Vec<Curse>,
    #[serde(default, alias = "clue_types")]
    clue_types: Vec<ClueType>,
}

/// Immutable deck of game content shared by the card and clue handlers
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    challenges: Vec<Challenge>,
    curses: Vec<Curse>,
    clue_types: Vec<ClueType>,
}

impl Catalog {
    pub fn new(challenges: Vec<Challenge>, curses: Vec<Curse>, clue_types: Vec<ClueType>) -> Self {
        let mut catalog = Self {
            challenges,
            curses,
            clue_types,
        };
        catalog.assign_missing_ids();
        catalog
    }

    /// Parse a catalog document; ids missing from the file are derived from position.
    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        let raw: RawCatalog = serde_json::from_str(contents)?;
        let catalog = Self::new(raw.challenges, raw.curses, raw.clue_types);

        for curse in catalog.curses.iter().filter(|c| c.duration_seconds.is_none()) {
            warn!(
                curse_id = %curse.id,
                title = %curse.title,
                "curse has no duration_seconds; token cost will be read as minutes"
            );
        }

        Ok(catalog)
    }

    /// Load the catalog from `path`, falling back to the built-in deck.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            info!("no catalog path configured; using built-in catalog");
            return Self::builtin();
        };

        match fs::read_to_string(path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(catalog) => {
                    info!(
                        path = %path.display(),
                        challenges = catalog.challenges.len(),
                        curses = catalog.curses.len(),
                        clue_types = catalog.clue_types.len(),
                        "loaded catalog"
                    );
                    catalog
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse catalog; falling back to built-in catalog"
                    );
                    Self::builtin()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "catalog file not found; using built-in catalog"
                );
                Self::builtin()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read catalog; falling back to built-in catalog"
                );
                Self::builtin()
            }
        }
    }

    /// Default deck used when no catalog file is configured.
    pub fn builtin() -> Self {
        let curse = |title: &str, description: &str, token_cost: i64, seconds: u32| Curse {
            id: String::new(),
            title: title.to_string(),
            description: description.to_string(),
            token_cost,
            duration_seconds: Some(seconds),
        };
        let challenge = |title: &str, description: &str, token_reward: i64| Challenge {
            id: String::new(),
            title: title.to_string(),
            description: description.to_string(),
            token_reward,
            penalty_curse: None,
        };

        let mut challenges = vec![
            challenge(
                "Tourist Photo",
                "Take a team photo in front of a landmark with every member striking a pose.",
                2,
            ),
            challenge(
                "Local Knowledge",
                "Ask a stranger for a recommendation and follow it.",
                3,
            ),
            challenge(
                "Stair Master",
                "Climb at least 100 steps without stopping.",
                4,
            ),
            challenge(
                "Street Performer",
                "Perform a 30 second song in a public place.",
                3,
            ),
            challenge(
                "Transit Hop",
                "Ride any public transport line for exactly three stops and back.",
                5,
            ),
            challenge(
                "Snack Critic",
                "Buy a local snack and review it on camera.",
                2,
            ),
        ];
        challenges[2].penalty_curse = Some(curse(
            "Lead Legs",
            "Walk only; no running until the curse expires.",
            0,
            5 * 60,
        ));

        let curses = vec![
            curse(
                "Curse of the Statue",
                "Hiders must stay still for the duration.",
                4,
                10 * 60,
            ),
            curse(
                "Curse of the Open Sky",
                "Hiders may not go indoors.",
                5,
                15 * 60,
            ),
            curse(
                "Curse of the Right Turn",
                "Hiders may only turn right at intersections.",
                3,
                10 * 60,
            ),
            curse(
                "Curse of the Landmark",
                "Hiders must send a photo of the tallest building they can see.",
                6,
                5 * 60,
            ),
            curse(
                "Curse of Silence",
                "Hiders may not use their phones except for the game app.",
                4,
                20 * 60,
            ),
        ];

        let clue_types = vec![
            ClueType {
                id: "distance-from-seekers".to_string(),
                name: "Distance".to_string(),
                description: "How far away the nearest hider is.".to_string(),
                cost: 2,
                range_meters: None,
            },
            ClueType {
                id: "relative-direction".to_string(),
                name: "Direction".to_string(),
                description: "Which compass direction the nearest hider lies in.".to_string(),
                cost: 3,
                range_meters: None,
            },
            ClueType {
                id: "exact-location".to_string(),
                name: "Exact Location".to_string(),
                description: "Coordinates of a hider within 2 km.".to_string(),
                cost: 8,
                range_meters: Some(2_000.0),
            },
        ];

        Self::new(challenges, curses, clue_types)
    }

    fn assign_missing_ids(&mut self) {
        for (index, challenge) in self.challenges.iter_mut().enumerate() {
            if challenge.id.is_empty() {
                challenge.id = format!("challenge-{}", index + 1);
            }
            let challenge_id = challenge.id.clone();
            if let Some(penalty) = challenge.penalty_curse.as_mut() {
                if penalty.id.is_empty() {
                    penalty.id = format!("{}-penalty", challenge_id);
                }
            }
        }
        for (index, curse) in self.curses.iter_mut().enumerate() {
            if curse.id.is_empty() {
                curse.id = format!("curse-{}", index + 1);
            }
        }
    }

    pub fn challenges(&self) -> &[Challenge] {
        &self.challenges
    }

    pub fn curses(&self) -> &[Curse] {
        &self.curses
    }

    pub fn clue_types(&self) -> &[ClueType] {
        &self.clue_types
    }

    pub fn clue_type(&self, id: &str) -> Option<&ClueType> {
        self.clue_types.iter().find(|clue_type| clue_type.id == id)
    }

    /// Uniform pick among challenges whose id is not in `excluded`
    pub fn draw_challenge(&self, excluded: &BTreeSet<String>) -> Option<&Challenge> {
        let eligible: Vec<&Challenge> = self
            .challenges
            .iter()
            .filter(|challenge| !excluded.contains(&challenge.id))
            .collect();
        eligible.choose(&mut rand::rng()).copied()
    }

    pub fn has_challenge_outside(&self, excluded: &BTreeSet<String>) -> bool {
        self.challenges
            .iter()
            .any(|challenge| !excluded.contains(&challenge.id))
    }

    pub fn draw_curse(&self) -> Option<&Curse> {
        self.curses.choose(&mut rand::rng())
    }

    /// Pick a curse the team has not drawn yet.
    ///
    /// Once every curse has been drawn the deck is recycled; the returned flag
    /// tells the caller to reset the team's drawn set.
    pub fn draw_curse_for(&self, drawn: &BTreeSet<String>) -> Option<(&Curse, bool)> {
        let fresh: Vec<&Curse> = self
            .curses
            .iter()
            .filter(|curse| !drawn.contains(&curse.id))
            .collect();

        match fresh.choose(&mut rand::rng()) {
            Some(curse) => Some((*curse, false)),
            None => self.draw_curse().map(|curse| (curse, true)),
        }
    }
}
