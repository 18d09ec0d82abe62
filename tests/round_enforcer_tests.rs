use hideseek::{
    game::{enforce_round_limits, timing},
    AppError, GameStatus,
};

mod utils;

use utils::*;

#[tokio::test]
async fn test_round_limit_pauses_game_and_blocks_resume() {
    let setup = TestSetupBuilder::new().build();
    let game = setup.create_game(&["Red", "Blue"], Some(1)).await;
    let id = game.game.id.clone();
    let blue = TestSetup::team_id(&game, "Blue");
    setup.games.start_game(&id).await.unwrap();

    setup.advance_secs(59);
    assert_eq!(enforce_round_limits(&setup.games).await, 0);

    let limit_at = setup.advance_secs(1);
    assert_eq!(enforce_round_limits(&setup.games).await, 1);

    let paused = setup.game(&id).await;
    assert_eq!(paused.game.status, GameStatus::Paused);
    assert!(paused.game.paused_by_time_limit);
    assert_eq!(paused.game.pause_time, Some(limit_at));
    assert_eq!(paused.round_duration, 60_000);
    assert_eq!(paused.team(&blue).unwrap().total_hider_time, 60_000);
    assert!(setup.push.wait_for_title(&id, "Time's up!").await);

    let resume = setup.games.resume_game(&id).await;
    assert!(matches!(resume, Err(AppError::InvalidTransition(_))));

    let next_at = setup.advance_secs(30);
    let next = setup.games.next_round(&id).await.unwrap();
    assert_eq!(next.game.status, GameStatus::Active);
    assert_eq!(next.game.round, 2);
    assert!(!next.game.paused_by_time_limit);
    assert_eq!(next.game.start_time, Some(next_at));
    assert_eq!(next.game.total_paused_duration, 30_000);
    assert_eq!(next.round_duration, 0);
    assert_eq!(next.game_duration, 60_000);
    assert_eq!(next.team(&blue).unwrap().hider_start_time, Some(next_at));
}

#[tokio::test]
async fn test_new_round_gets_a_full_time_allowance() {
    let setup = TestSetupBuilder::new().build();
    let game = setup.create_game(&["Red", "Blue"], Some(2)).await;
    let id = game.game.id.clone();
    setup.games.start_game(&id).await.unwrap();

    setup.advance_secs(120);
    assert_eq!(enforce_round_limits(&setup.games).await, 1);
    setup.advance_secs(600);
    setup.games.next_round(&id).await.unwrap();

    // Pauses from the previous round do not eat into this one
    setup.advance_secs(119);
    assert_eq!(enforce_round_limits(&setup.games).await, 0);
    let running = setup.game(&id).await;
    assert_eq!(
        timing::compute_round_duration(&running.game, setup.games.now_ms()),
        119_000
    );

    setup.advance_secs(1);
    assert_eq!(enforce_round_limits(&setup.games).await, 1);
    assert_eq!(
        setup.events.last_of("round_time_limit").unwrap().payload["round"],
        2
    );
}

#[tokio::test]
async fn test_ended_and_deleted_games_are_skipped() {
    let setup = TestSetupBuilder::new().build();
    let ended = setup.create_game(&["Red", "Blue"], Some(1)).await;
    let deleted = setup.create_game(&["Red", "Blue"], Some(1)).await;
    for id in [&ended.game.id, &deleted.game.id] {
        setup.games.start_game(id).await.unwrap();
    }
    setup.games.end_game(&ended.game.id).await.unwrap();
    setup.games.delete_game(&deleted.game.id).await.unwrap();

    setup.advance_secs(120);

    assert_eq!(enforce_round_limits(&setup.games).await, 0);
    assert_eq!(setup.game(&ended.game.id).await.game.status, GameStatus::Ended);
}
