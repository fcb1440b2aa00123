//! Scripted completion client and store fixtures shared by test crates.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use mentord::completion::{CompletionClient, CompletionError};
use mentord::store::SummaryStore;

/// One recorded `generate` invocation.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub system: String,
    pub input: String,
    pub max_tokens: u32,
}

/// Completion client that replays a scripted list of outcomes and records
/// every call. When the script is exhausted it answers a fixed default.
pub struct ScriptedClient {
    replies: Mutex<VecDeque<Result<String, CompletionError>>>,
    calls: Mutex<Vec<RecordedCall>>,
    delay: Option<Duration>,
}

impl ScriptedClient {
    pub fn with_replies(replies: Vec<Result<String, CompletionError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
            delay: None,
        })
    }

    /// Like [`with_replies`](Self::with_replies), with each call delayed —
    /// used to hold a refresh in flight while another queues behind it.
    pub fn with_replies_and_delay(
        replies: Vec<Result<String, CompletionError>>,
        delay: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
            delay: Some(delay),
        })
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn generate(
        &self,
        system: &str,
        input: &str,
        max_tokens: u32,
    ) -> Result<String, CompletionError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedCall {
                system: system.to_owned(),
                input: input.to_owned(),
                max_tokens,
            });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| Ok("réponse scriptée par défaut".to_owned()))
    }

    fn model_id(&self) -> &str {
        "scripted"
    }

    fn ready(&self) -> bool {
        true
    }
}

/// Poll the store until a summary exists for `email`, up to a 2 s deadline.
///
/// Detached refreshes have no handle on the response path; polling with a
/// deadline keeps the assertion robust on slow machines.
pub async fn wait_for_summary(store: &SummaryStore, email: &str) -> Option<String> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        if let Ok(Some(summary)) = store.summary(email).await {
            return Some(summary);
        }
        if tokio::time::Instant::now() >= deadline {
            return None;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// In-memory store with the schema applied.
pub async fn setup_store() -> SummaryStore {
    let opts = SqliteConnectOptions::new()
        .filename(":memory:")
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(opts)
        .await
        .expect("pool should connect");

    let schema = include_str!("../../migrations/001_schema.sql");
    sqlx::raw_sql(schema)
        .execute(&pool)
        .await
        .expect("schema should apply");

    SummaryStore::new(pool)
}
