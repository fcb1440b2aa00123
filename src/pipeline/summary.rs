//! Detached summary refresh with per-student serialization.
//!
//! After each exchange the previous summary, the student's message, and the
//! mentor's reply are condensed into a new summary and upserted. The refresh
//! runs detached from the response path: it has no caller to report to, so
//! every failure is logged and dropped.
//!
//! Two exchanges from the same student issued back to back would otherwise
//! race: the second refresh could read the summary before the first one
//! commits and silently discard its contribution. Refreshes are therefore
//! serialized per email through a lazily created map of async mutexes — at
//! most one in-flight refresh per student, later ones queued behind it. A
//! map entry is removed once no task holds or waits on it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::completion::CompletionClient;
use crate::config::Config;
use crate::store::SummaryStore;
use crate::template::{self, RenderMode};

/// Summary text substituted when the student has no summary yet.
const NO_PREVIOUS_SUMMARY: &str = "(aucun)";

/// Serialized, detached summary refresher.
pub struct SummaryUpdater {
    config: Arc<Config>,
    store: SummaryStore,
    client: Arc<dyn CompletionClient>,
    locks: StdMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl std::fmt::Debug for SummaryUpdater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SummaryUpdater")
            .field("model", &self.client.model_id())
            .finish_non_exhaustive()
    }
}

impl SummaryUpdater {
    /// Create a refresher over the given store and completion client.
    pub fn new(config: Arc<Config>, store: SummaryStore, client: Arc<dyn CompletionClient>) -> Self {
        Self {
            config,
            store,
            client,
            locks: StdMutex::new(HashMap::new()),
        }
    }

    /// Schedule a refresh without blocking the caller.
    ///
    /// The returned handle is only needed by tests that want to await the
    /// detached work; the response path drops it.
    pub fn spawn_refresh(
        self: &Arc<Self>,
        email: &str,
        last_user_message: &str,
        last_assistant_reply: &str,
    ) -> JoinHandle<()> {
        let this = Arc::clone(self);
        let email = email.to_owned();
        let user = last_user_message.to_owned();
        let reply = last_assistant_reply.to_owned();
        tokio::spawn(async move {
            this.refresh(&email, &user, &reply).await;
        })
    }

    /// Run one refresh to completion, serialized against other refreshes for
    /// the same email. Failures are logged and swallowed.
    pub async fn refresh(&self, email: &str, last_user_message: &str, last_assistant_reply: &str) {
        let lock = self.lock_for(email);
        {
            let _guard = lock.lock().await;
            if let Err(err) = self
                .refresh_locked(email, last_user_message, last_assistant_reply)
                .await
            {
                warn!(email, error = %err, "summary refresh failed");
            }
        }
        self.release(email, &lock);
    }

    /// The serialized body: independent re-read, render, generate, upsert.
    async fn refresh_locked(
        &self,
        email: &str,
        last_user_message: &str,
        last_assistant_reply: &str,
    ) -> anyhow::Result<()> {
        // Re-read under the lock — the response path's earlier read may be
        // stale by now if a queued refresh committed first.
        let previous = self.store.summary(email).await?.unwrap_or_default();
        let previous_block = if previous.trim().is_empty() {
            NO_PREVIOUS_SUMMARY.to_owned()
        } else {
            previous
        };

        let vars: HashMap<&str, String> = HashMap::from([
            ("previous_summary", previous_block),
            ("last_user_message", last_user_message.to_owned()),
            ("last_assistant_reply", last_assistant_reply.to_owned()),
        ]);

        let mode = if self.config.prompts.strict {
            RenderMode::Strict
        } else {
            RenderMode::Lenient
        };
        let rendered = template::render_with_mode(&self.config.prompts.summary_update, &vars, mode)?;
        if rendered.trim().is_empty() {
            warn!(email, "summary-update prompt rendered empty; skipping refresh");
            return Ok(());
        }

        let new_summary = self
            .client
            .generate(
                &self.config.prompts.summary_system,
                &rendered,
                self.config.completion.max_summary_tokens,
            )
            .await?;

        if new_summary.trim().is_empty() {
            warn!(email, "completion returned an empty summary; keeping previous");
            return Ok(());
        }

        self.store.upsert_summary(email, &new_summary).await?;
        debug!(email, "summary refreshed");
        Ok(())
    }

    /// Fetch or create the per-email lock.
    fn lock_for(&self, email: &str) -> Arc<AsyncMutex<()>> {
        let mut map = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            map.entry(email.to_owned())
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        )
    }

    /// Drop the map entry once nothing else references it.
    ///
    /// `lock` is the caller's clone: with the map's reference that makes a
    /// strong count of exactly two when no other task holds or waits on the
    /// entry, and only then is it removed.
    fn release(&self, email: &str, lock: &Arc<AsyncMutex<()>>) {
        let mut map = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if Arc::strong_count(lock) == 2 {
            map.remove(email);
        }
    }

    /// Number of live per-email lock entries (test observability).
    pub fn lock_entries(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
