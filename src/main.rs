use std::sync::Arc;

use hideseek::{
    cards::CardService,
    clues::{ClueService, StandardClueText},
    game::{start_cleanup_task, start_round_enforcer},
    notify::{LoggingPushNotifier, NotificationDispatcher, TracingEventRecorder},
    router, AppConfig, AppState, BroadcastHub, Catalog, GameService, SystemClock,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hideseek=debug,game_events=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting hide-and-seek game server");

    let config = AppConfig::from_env();
    let catalog = Arc::new(Catalog::load(config.catalog_path.as_deref()));

    let game_service = Arc::new(GameService::new(
        Arc::new(SystemClock),
        Arc::new(BroadcastHub::new()),
        config.rules.clone(),
        NotificationDispatcher::start(Arc::new(LoggingPushNotifier)),
        Arc::new(TracingEventRecorder),
    ));
    let card_service = Arc::new(CardService::new(game_service.clone(), catalog.clone()));
    let clue_service = Arc::new(ClueService::new(
        game_service.clone(),
        catalog,
        Arc::new(StandardClueText),
    ));

    tokio::spawn(start_round_enforcer(
        game_service.clone(),
        config.enforcer.clone(),
    ));
    tokio::spawn(start_cleanup_task(
        game_service.clone(),
        config.cleanup.clone(),
    ));

    let app_state = AppState::new(game_service, card_service, clue_service);
    let app = router(app_state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    info!(port = config.port, "Server running on http://localhost:{}", config.port);
    axum::serve(listener, app).await
}
