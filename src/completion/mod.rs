//! Completion service abstraction.
//!
//! Defines the [`CompletionClient`] trait and the shared error type used by
//! both implementations:
//! - [`openai::OpenAiClient`] — OpenAI `/v1/chat/completions` API
//! - [`mock::MockClient`] — canned replies for demos and tests
//!
//! The trait is deliberately narrow: one system-instructions string, one
//! user input, one bounded text completion back. Quota exhaustion is its own
//! error variant so the HTTP layer can answer 503 instead of a generic 500.

use async_trait::async_trait;
use regex::Regex;

pub mod mock;
pub mod openai;

/// Errors returned by completion clients.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    /// HTTP transport failure, including a hit request deadline.
    #[error("completion request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Response did not match the expected schema.
    #[error("completion response parse error: {0}")]
    Parse(String),

    /// Upstream reported quota exhaustion (HTTP 429).
    #[error("completion service rate limited")]
    RateLimited,

    /// Upstream responded with any other error status.
    #[error("completion service returned status {status}: {body}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
        /// Sanitized response body.
        body: String,
    },

    /// Client cannot make calls with its current configuration.
    #[error("completion service unavailable: {0}")]
    Unavailable(String),
}

impl CompletionError {
    /// Whether this failure is upstream throttling rather than a hard error.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited)
    }
}

/// Check an HTTP response and return its body text or a structured error.
///
/// HTTP 429 maps to [`CompletionError::RateLimited`]; any other non-2xx
/// status maps to [`CompletionError::HttpStatus`] with a sanitized body.
///
/// # Errors
///
/// Returns `CompletionError::Request` on transport failure.
pub async fn check_http_response(response: reqwest::Response) -> Result<String, CompletionError> {
    let status = response.status();
    let body = response.text().await?;
    if status.as_u16() == 429 {
        return Err(CompletionError::RateLimited);
    }
    if !status.is_success() {
        return Err(CompletionError::HttpStatus {
            status: status.as_u16(),
            body: sanitize_http_error_body(&body),
        });
    }
    Ok(body)
}

fn sanitize_http_error_body(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");

    // Redact anything that looks like an API key before it reaches the logs.
    let mut sanitized = collapsed;
    for pattern in [r"sk-[A-Za-z0-9_\-]{20,}", r"Bearer [A-Za-z0-9._\-]{16,}"] {
        if let Ok(regex) = Regex::new(pattern) {
            sanitized = regex.replace_all(&sanitized, "[REDACTED]").into_owned();
        }
    }

    const MAX_ERROR_BODY_CHARS: usize = 256;
    if sanitized.chars().count() > MAX_ERROR_BODY_CHARS {
        let shortened = sanitized
            .chars()
            .take(MAX_ERROR_BODY_CHARS)
            .collect::<String>();
        return format!("{shortened}...[truncated]");
    }

    sanitized
}

/// Core completion interface.
///
/// Implementations must be `Send + Sync` so one shared client serves all
/// in-flight requests.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Generate a completion for `input` under `system` instructions.
    ///
    /// The returned text is trimmed of leading and trailing whitespace.
    /// Output is non-deterministic; idempotency is not guaranteed.
    ///
    /// # Errors
    ///
    /// Returns [`CompletionError`] on transport, quota, or parse failure.
    async fn generate(
        &self,
        system: &str,
        input: &str,
        max_tokens: u32,
    ) -> Result<String, CompletionError>;

    /// The model identifier this client is instantiated for.
    fn model_id(&self) -> &str;

    /// Whether the client holds everything it needs to make calls.
    ///
    /// `false` means every [`generate`](Self::generate) call will fail with
    /// [`CompletionError::Unavailable`]; the health endpoint reports this.
    fn ready(&self) -> bool;
}
