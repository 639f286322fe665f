mod common;

use common::{deterministic_config, spawn_engine};
use harvest_exchange::engine::fanout::SessionEvent;

#[tokio::test]
async fn lobby_requires_host_and_two_players() {
    let engine = spawn_engine(deterministic_config(300));
    engine.create_session().await.unwrap();

    let alice = engine.join("alice".to_string()).await.unwrap();
    let err = engine.start(alice.id).await.unwrap_err();
    assert_eq!(err.code(), "too_few_players");

    let bob = engine.join("bob".to_string()).await.unwrap();
    let err = engine.start(bob.id).await.unwrap_err();
    assert_eq!(err.code(), "not_host");

    engine.start(alice.id).await.unwrap();
}

#[tokio::test]
async fn duplicate_join_and_full_session_are_rejected() {
    let engine = spawn_engine(deterministic_config(300));
    engine.create_session().await.unwrap();

    engine.join("alice".to_string()).await.unwrap();
    let err = engine.join("Alice".to_string()).await.unwrap_err();
    assert_eq!(err.code(), "name_taken");
}

#[tokio::test]
async fn session_ends_automatically_when_timer_elapses() {
    let engine = spawn_engine(deterministic_config(1));
    let mut events = engine.subscribe_broadcast();

    engine.create_session().await.unwrap();
    let alice = engine.join("alice".to_string()).await.unwrap();
    engine.join("bob".to_string()).await.unwrap();
    engine.start(alice.id).await.unwrap();

    let ended = tokio::time::timeout(std::time::Duration::from_secs(5), async {
        loop {
            if let Ok(SessionEvent::GameEnded { leaderboard }) = events.recv().await {
                return leaderboard;
            }
        }
    })
    .await
    .expect("session should end within the timeout");

    assert_eq!(ended.len(), 2);
    assert!(ended.iter().all(|entry| entry.total_score.is_some()));
}

#[tokio::test]
async fn leave_during_lobby_frees_the_name() {
    let engine = spawn_engine(deterministic_config(300));
    engine.create_session().await.unwrap();

    let alice = engine.join("alice".to_string()).await.unwrap();
    engine.leave(alice.id).await.unwrap();

    let rejoined = engine.join("alice".to_string()).await;
    assert!(rejoined.is_ok());
}
