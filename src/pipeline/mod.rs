//! Mentor response pipeline.
//!
//! One inbound chat request flows through: validate → (optionally) log the
//! message → fetch the student summary → render the mentor system prompt →
//! call the completion client → log the reply → schedule the detached
//! summary refresh → return the reply.
//!
//! All dependencies are constructed at startup and injected; the pipeline
//! holds no ambient state, so tests substitute a scripted completion client
//! and an in-memory store without touching the process environment.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{error, warn};

use crate::completion::{CompletionClient, CompletionError};
use crate::config::Config;
use crate::store::{MessageLog, MessageRole, SummaryStore};
use crate::template::{self, RenderMode};

pub mod summary;

use self::summary::SummaryUpdater;

/// Prompt line used when a student has no summary yet.
const NO_SUMMARY_FALLBACK: &str = "- Aucun historique significatif pour l'instant.";

/// An inbound chat request, already deserialized.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Student identifier (externally supplied, unvalidated beyond presence).
    pub email: String,
    /// The student's message.
    pub message: String,
    /// Optional program identifier for context injection.
    pub program_id: Option<String>,
}

/// Errors surfaced by the chat pipeline, mapped to HTTP at the boundary.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// `email` or `message` missing or blank → 400.
    #[error("email and message are required")]
    BadRequest,

    /// The mentor prompt failed to render or rendered blank → 500, logged
    /// loudly: this is an operational misconfiguration, not a bad request.
    #[error("mentor prompt misconfigured: {0}")]
    Configuration(String),

    /// Upstream quota exhaustion → 503.
    #[error("completion service rate limited")]
    RateLimited,

    /// Any other completion failure → 500, detail never echoed to callers.
    #[error("completion failed: {0}")]
    Completion(#[source] CompletionError),
}

/// Orchestrates a chat exchange end to end.
pub struct MentorPipeline {
    config: Arc<Config>,
    store: SummaryStore,
    log: MessageLog,
    client: Arc<dyn CompletionClient>,
    updater: Arc<SummaryUpdater>,
}

impl std::fmt::Debug for MentorPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MentorPipeline")
            .field("model", &self.client.model_id())
            .finish_non_exhaustive()
    }
}

impl MentorPipeline {
    /// Assemble the pipeline from its injected dependencies.
    pub fn new(
        config: Arc<Config>,
        store: SummaryStore,
        log: MessageLog,
        client: Arc<dyn CompletionClient>,
        updater: Arc<SummaryUpdater>,
    ) -> Self {
        Self {
            config,
            store,
            log,
            client,
            updater,
        }
    }

    /// Handle one chat exchange and return the mentor's reply.
    ///
    /// On success the summary refresh is already scheduled (not awaited) when
    /// this returns; response latency never includes the refresh cost.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError`]; see each variant for its HTTP mapping.
    pub async fn handle_chat(&self, request: ChatRequest) -> Result<String, ChatError> {
        let email = request.email.trim();
        let message = request.message.trim();
        if email.is_empty() || message.is_empty() {
            return Err(ChatError::BadRequest);
        }

        // Message-log writes are awaited, uniformly. A log failure is a
        // warning, never a request failure.
        if self.config.logging.log_messages {
            if let Err(err) = self.log.append(email, MessageRole::User, message).await {
                warn!(email, error = %err, "failed to log user message");
            }
        }

        // A storage failure here degrades to "no summary": personalization
        // is an enhancement, not a correctness requirement.
        let summary = match self.store.summary(email).await {
            Ok(stored) => stored.unwrap_or_default(),
            Err(err) => {
                warn!(email, error = %err, "summary read failed; continuing without context");
                String::new()
            }
        };

        let system_prompt = self.render_mentor_prompt(email, &summary, request.program_id.as_deref())?;

        let reply = match self
            .client
            .generate(&system_prompt, message, self.config.completion.max_reply_tokens)
            .await
        {
            Ok(reply) => reply,
            Err(err) if err.is_rate_limited() => return Err(ChatError::RateLimited),
            Err(err) => return Err(ChatError::Completion(err)),
        };

        if self.config.logging.log_messages {
            if let Err(err) = self.log.append(email, MessageRole::Assistant, &reply).await {
                warn!(email, error = %err, "failed to log mentor reply");
            }
        }

        // Fire and forget; ordering per student is the updater's job.
        self.updater.spawn_refresh(email, message, &reply);

        Ok(reply)
    }

    /// Render the mentor system prompt for one request.
    fn render_mentor_prompt(
        &self,
        email: &str,
        summary: &str,
        program_id: Option<&str>,
    ) -> Result<String, ChatError> {
        let summary_block = if summary.trim().is_empty() {
            NO_SUMMARY_FALLBACK.to_owned()
        } else {
            summary.to_owned()
        };

        let program_context = program_id
            .and_then(|id| self.config.programs.get(id))
            .map(|ctx| format!("\nContexte du programme :\n{ctx}\n"))
            .unwrap_or_default();

        let vars: HashMap<&str, String> = HashMap::from([
            ("email", email.to_owned()),
            ("school_name", self.config.mentor.school_name.clone()),
            ("tone", self.config.mentor.tone.clone()),
            ("rules", self.config.mentor.rules_block()),
            ("summary", summary_block),
            ("program_context", program_context),
        ]);

        let mode = if self.config.prompts.strict {
            RenderMode::Strict
        } else {
            RenderMode::Lenient
        };

        let rendered = template::render_with_mode(&self.config.prompts.mentor, &vars, mode)
            .map_err(|err| {
                error!(error = %err, "mentor prompt template failed to render");
                ChatError::Configuration(err.to_string())
            })?;

        if rendered.trim().is_empty() {
            error!("mentor prompt rendered empty; template missing or blank");
            return Err(ChatError::Configuration(
                "mentor prompt rendered empty".to_owned(),
            ));
        }

        Ok(rendered)
    }
}
