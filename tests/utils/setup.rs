use std::sync::Arc;
use std::time::Duration;

use hideseek::{
    cards::CardService,
    catalog::{Catalog, Challenge, ClueType, Curse},
    clues::{ClueService, StandardClueText},
    notify::NotificationDispatcher,
    BroadcastHub, GameRules, GameService, GameView, ManualClock, TeamSpec,
};

use super::mocks::{RecordingEventRecorder, RecordingPushNotifier};

pub const T0: i64 = 1_700_000_000_000;

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

pub struct TestSetup {
    pub clock: Arc<ManualClock>,
    pub games: Arc<GameService>,
    pub cards: Arc<CardService>,
    pub clues: Arc<ClueService>,
    pub push: Arc<RecordingPushNotifier>,
    pub events: Arc<RecordingEventRecorder>,
}

pub struct TestSetupBuilder {
    start_ms: i64,
    rules: GameRules,
    catalog: Catalog,
}

#[allow(dead_code)]
impl TestSetupBuilder {
    pub fn new() -> Self {
        Self {
            start_ms: T0,
            rules: GameRules::default(),
            catalog: default_catalog(),
        }
    }

    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_veto(mut self, veto: Duration) -> Self {
        self.rules.veto_duration = veto;
        self
    }

    /// Must be called inside a tokio runtime; the push dispatcher spawns its worker
    pub fn build(self) -> TestSetup {
        let clock = Arc::new(ManualClock::new(self.start_ms));
        let push = Arc::new(RecordingPushNotifier::new());
        let events = Arc::new(RecordingEventRecorder::new());

        let games = Arc::new(GameService::new(
            clock.clone(),
            Arc::new(BroadcastHub::new()),
            self.rules,
            NotificationDispatcher::start_with(push.clone(), Duration::from_secs(1), 0),
            events.clone(),
        ));
        let catalog = Arc::new(self.catalog);
        let cards = Arc::new(CardService::new(games.clone(), catalog.clone()));
        let clues = Arc::new(ClueService::new(
            games.clone(),
            catalog,
            Arc::new(StandardClueText),
        ));

        TestSetup {
            clock,
            games,
            cards,
            clues,
            push,
            events,
        }
    }
}

#[allow(dead_code)]
impl TestSetup {
    /// Creates a game whose first team seeks and the rest hide
    pub async fn create_game(&self, names: &[&str], round_length_minutes: Option<u32>) -> GameView {
        let teams = names.iter().map(|name| TeamSpec::named(*name)).collect();
        self.games
            .create_game(teams, round_length_minutes)
            .await
            .unwrap()
    }

    pub async fn game(&self, game_id: &str) -> GameView {
        self.games.get_game(game_id).await.unwrap()
    }

    pub fn team_id(view: &GameView, name: &str) -> String {
        view.game
            .teams
            .iter()
            .find(|team| team.name == name)
            .map(|team| team.id.clone())
            .unwrap_or_else(|| panic!("no team named {}", name))
    }

    pub fn advance_secs(&self, secs: i64) -> i64 {
        self.clock.advance(secs * 1000)
    }
}

fn curse(id: &str, token_cost: i64, duration_seconds: u32) -> Curse {
    Curse {
        id: id.to_string(),
        title: format!("Curse {}", id),
        description: String::new(),
        token_cost,
        duration_seconds: Some(duration_seconds),
    }
}

/// One challenge with a penalty, one plain challenge, one ten-minute curse
pub fn default_catalog() -> Catalog {
    Catalog::new(
        vec![
            Challenge {
                id: "sing".to_string(),
                title: "Sing in public".to_string(),
                description: String::new(),
                token_reward: 3,
                penalty_curse: Some(curse("sing-penalty", 0, 300)),
            },
            Challenge {
                id: "photo".to_string(),
                title: "Photo with a statue".to_string(),
                description: String::new(),
                token_reward: 2,
                penalty_curse: None,
            },
        ],
        vec![curse("lead-legs", 4, 600)],
        vec![ClueType {
            id: "distance-from-seekers".to_string(),
            name: "Distance".to_string(),
            description: String::new(),
            cost: 2,
            range_meters: None,
        }],
    )
}
