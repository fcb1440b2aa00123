//! Canned-reply client for running without the completion service.
//!
//! Mock mode exists so the full pipeline (validation, logging, summary
//! refresh) can be exercised in demos and local development with no API key
//! and no network. Replies acknowledge the student's message so the chat UI
//! stays usable.

use rand::seq::SliceRandom;

use super::{CompletionClient, CompletionError};

/// Canned mentor openings, one picked at random per reply.
const CANNED_OPENINGS: &[&str] = &[
    "Merci pour ton message, je vois bien la situation.",
    "C'est une bonne question, prenons-la point par point.",
    "Je comprends, beaucoup d'étudiants passent par là.",
];

/// Completion client that fabricates replies locally.
#[derive(Debug, Clone, Default)]
pub struct MockClient;

impl MockClient {
    /// Create a mock client.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl CompletionClient for MockClient {
    async fn generate(
        &self,
        _system: &str,
        input: &str,
        _max_tokens: u32,
    ) -> Result<String, CompletionError> {
        let opening = CANNED_OPENINGS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(CANNED_OPENINGS[0]);
        let excerpt: String = input.chars().take(120).collect();
        Ok(format!(
            "{opening} (mode démo : réponse générée localement)\n\n\
             Tu m'écris : « {excerpt} »\n\
             - Note ce qui te bloque précisément.\n\
             - Découpe le travail en étapes de 25 minutes.\n\
             - Reviens me dire où tu en es demain."
        ))
    }

    fn model_id(&self) -> &str {
        "mock"
    }

    fn ready(&self) -> bool {
        true
    }
}
