//! Per-student serialization of concurrent summary refreshes.
//!
//! Two exchanges for the same student issued back to back must not lose one
//! exchange's contribution: the second refresh's prompt has to carry the
//! first refresh's committed summary, not the pre-first-update value.

use std::sync::Arc;
use std::time::Duration;

use mentord::completion::CompletionClient;
use mentord::config::Config;
use mentord::pipeline::summary::SummaryUpdater;

use crate::scripted::{setup_store, ScriptedClient};

#[tokio::test]
async fn queued_refresh_sees_the_first_commit() {
    let store = setup_store().await;
    // Each generate call stalls long enough for the second refresh to queue
    // behind the per-student lock while the first is in flight.
    let client = ScriptedClient::with_replies_and_delay(
        vec![Ok("- S1.".to_owned()), Ok("- S2.".to_owned())],
        Duration::from_millis(80),
    );
    let updater = Arc::new(SummaryUpdater::new(
        Arc::new(Config::default()),
        store.clone(),
        Arc::clone(&client) as Arc<dyn CompletionClient>,
    ));

    let first = updater.spawn_refresh("ada@example.com", "Premier message.", "Première réponse.");
    // Let the first refresh grab the lock before scheduling the second.
    tokio::time::sleep(Duration::from_millis(20)).await;
    let second = updater.spawn_refresh("ada@example.com", "Deuxième message.", "Deuxième réponse.");

    first.await.expect("first refresh should complete");
    second.await.expect("second refresh should complete");

    let calls = client.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[0].input.contains("Résumé actuel : (aucun)"));
    assert!(
        calls[1].input.contains("Résumé actuel : - S1."),
        "second refresh must see the first commit, got: {}",
        calls[1].input
    );

    let summary = store
        .summary("ada@example.com")
        .await
        .expect("read should succeed");
    assert_eq!(summary.as_deref(), Some("- S2."));
}

#[tokio::test]
async fn different_students_refresh_independently() {
    let store = setup_store().await;
    let client = ScriptedClient::with_replies_and_delay(
        vec![Ok("- Ada.".to_owned()), Ok("- Bob.".to_owned())],
        Duration::from_millis(30),
    );
    let updater = Arc::new(SummaryUpdater::new(
        Arc::new(Config::default()),
        store.clone(),
        Arc::clone(&client) as Arc<dyn CompletionClient>,
    ));

    let ada = updater.spawn_refresh("ada@example.com", "a", "b");
    let bob = updater.spawn_refresh("bob@example.com", "c", "d");
    ada.await.expect("ada refresh should complete");
    bob.await.expect("bob refresh should complete");

    assert!(store
        .summary("ada@example.com")
        .await
        .expect("read should succeed")
        .is_some());
    assert!(store
        .summary("bob@example.com")
        .await
        .expect("read should succeed")
        .is_some());
}

#[tokio::test]
async fn idle_lock_entries_are_garbage_collected() {
    let store = setup_store().await;
    let client = ScriptedClient::with_replies(vec![Ok("- Résumé.".to_owned())]);
    let updater = Arc::new(SummaryUpdater::new(
        Arc::new(Config::default()),
        store.clone(),
        Arc::clone(&client) as Arc<dyn CompletionClient>,
    ));

    updater.refresh("ada@example.com", "a", "b").await;

    assert_eq!(updater.lock_entries(), 0);
}
