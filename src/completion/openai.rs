//! OpenAI client using the `/v1/chat/completions` API.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{check_http_response, CompletionClient, CompletionError};

const OPENAI_API_BASE: &str = "https://api.openai.com/v1/chat/completions";

// ---------------------------------------------------------------------------
// Wire types (pub for integration testing)
// ---------------------------------------------------------------------------

/// OpenAI chat completions API request body.
#[doc(hidden)]
#[derive(Debug, Serialize)]
pub struct OpenAiRequest {
    /// Model identifier.
    pub model: String,
    /// System instruction followed by the user message.
    pub messages: Vec<OpenAiMessage>,
    /// Maximum completion tokens.
    pub max_tokens: u32,
}

/// A message in OpenAI chat format.
#[doc(hidden)]
#[derive(Debug, Serialize)]
pub struct OpenAiMessage {
    /// Role (`system` or `user`).
    pub role: String,
    /// Plain text content.
    pub content: String,
}

/// OpenAI chat completions API response body.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct OpenAiResponse {
    /// Response choices.
    pub choices: Vec<OpenAiChoice>,
}

/// A response choice from OpenAI.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct OpenAiChoice {
    /// Assistant message for this choice.
    pub message: OpenAiResponseMessage,
}

/// Assistant message from OpenAI.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct OpenAiResponseMessage {
    /// Text content.
    pub content: Option<String>,
}

// ---------------------------------------------------------------------------
// Request / Response builders (pub for integration testing)
// ---------------------------------------------------------------------------

/// Build an OpenAI API request body.
#[doc(hidden)]
pub fn build_request(model: &str, system: &str, input: &str, max_tokens: u32) -> OpenAiRequest {
    OpenAiRequest {
        model: model.to_owned(),
        messages: vec![
            OpenAiMessage {
                role: "system".to_owned(),
                content: system.to_owned(),
            },
            OpenAiMessage {
                role: "user".to_owned(),
                content: input.to_owned(),
            },
        ],
        max_tokens,
    }
}

/// Parse an OpenAI API response into trimmed completion text.
///
/// # Errors
///
/// Returns `CompletionError::Parse` if the body cannot be deserialized or
/// carries no usable first choice.
#[doc(hidden)]
pub fn parse_response(body: &str) -> Result<String, CompletionError> {
    let resp: OpenAiResponse =
        serde_json::from_str(body).map_err(|e| CompletionError::Parse(e.to_string()))?;

    let choice = resp
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| CompletionError::Parse("missing choices[0]".to_owned()))?;

    let text = choice
        .message
        .content
        .ok_or_else(|| CompletionError::Parse("choices[0] has no content".to_owned()))?;

    Ok(text.trim().to_owned())
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// OpenAI chat completions client.
///
/// The client is constructed even when no API key is available — the
/// service starts, serves its health endpoint, and every generate call
/// fails with [`CompletionError::Unavailable`] until a key is provided.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    model: String,
    api_key: Option<String>,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiClient {
    /// Create a client for `model` with a per-call deadline.
    ///
    /// # Errors
    ///
    /// Returns `CompletionError::Request` if the underlying HTTP client
    /// cannot be built.
    pub fn new(
        model: String,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            model,
            api_key,
            base_url: OPENAI_API_BASE.to_owned(),
            client,
        })
    }

    /// Create a client pointed at a non-default endpoint (tests,
    /// OpenAI-compatible gateways).
    ///
    /// # Errors
    ///
    /// Returns `CompletionError::Request` if the underlying HTTP client
    /// cannot be built.
    pub fn with_base_url(
        model: String,
        api_key: Option<String>,
        timeout: Duration,
        base_url: String,
    ) -> Result<Self, CompletionError> {
        let mut this = Self::new(model, api_key, timeout)?;
        this.base_url = base_url;
        Ok(this)
    }
}

#[async_trait::async_trait]
impl CompletionClient for OpenAiClient {
    async fn generate(
        &self,
        system: &str,
        input: &str,
        max_tokens: u32,
    ) -> Result<String, CompletionError> {
        let Some(api_key) = &self.api_key else {
            return Err(CompletionError::Unavailable(
                "no API key configured".to_owned(),
            ));
        };

        let body = build_request(&self.model, system, input, max_tokens);
        let response = self
            .client
            .post(&self.base_url)
            .header("content-type", "application/json")
            .header("authorization", format!("Bearer {api_key}"))
            .json(&body)
            .send()
            .await?;

        let payload = check_http_response(response).await?;
        parse_response(&payload)
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    fn ready(&self) -> bool {
        self.api_key.is_some()
    }
}
