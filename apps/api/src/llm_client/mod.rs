//! LLM Client: the single point of entry for all Claude API calls in the screener.
//!
//! ARCHITECTURAL RULE: No other module may call the Anthropic API directly.
//! Stages depend on the `TextGenerator` trait, never on `LlmClient` itself,
//! so tests can drive the pipeline with scripted doubles.
//!
//! Model: claude-sonnet-4-5, fixed for every stage.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;
pub mod structured;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// The model used for all LLM calls in the screener.
pub const MODEL: &str = "claude-sonnet-4-5";
const MAX_TOKENS: u32 = 4096;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM call timed out after {0:?}")]
    Timeout(Duration),

    #[error("LLM returned empty content")]
    EmptyContent,
}

impl LlmError {
    /// True when the capability could not be reached at all: transport
    /// failures, timeouts, throttling, server errors and rejected credentials.
    /// Other 4xx answers are about this particular request, so callers degrade
    /// instead of giving up.
    pub fn is_unavailable(&self) -> bool {
        match self {
            LlmError::Http(_) | LlmError::Timeout(_) | LlmError::RateLimited { .. } => true,
            LlmError::Api { status, .. } => {
                matches!(*status, 401 | 403 | 429) || *status >= 500
            }
            LlmError::EmptyContent => false,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Wire types (shared by the real client and test doubles)
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One block of message content. Mirrors the Messages API block types we use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
    /// Block types we neither send nor act on (e.g. thinking blocks).
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }
}

/// A callable tool advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// Everything a text-generation call needs: system instruction, the
/// conversation so far, and any tools the model may decide to call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSpec>,
}

impl CompletionRequest {
    /// Single-turn request: one system instruction, one user message, no tools.
    pub fn single(system: &str, user_content: &str) -> Self {
        Self {
            system: system.to_string(),
            messages: vec![Message::user_text(user_content)],
            tools: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Completion {
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub stop_reason: Option<String>,
}

impl Completion {
    /// Concatenates every text block. `None` when the model produced no text.
    pub fn text(&self) -> Option<String> {
        let text: Vec<&str> = self
            .content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        if text.is_empty() {
            None
        } else {
            Some(text.join("\n"))
        }
    }

    /// The tool calls the model asked for, in order: (id, name, input).
    pub fn tool_calls(&self) -> Vec<(&str, &str, &serde_json::Value)> {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolUse { id, name, input } => {
                    Some((id.as_str(), name.as_str(), input))
                }
                _ => None,
            })
            .collect()
    }
}

/// The text-generation capability. `LlmClient` is the production implementation.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError>;
}

/// Runs one completion under an explicit deadline.
pub async fn complete_within(
    llm: &dyn TextGenerator,
    request: &CompletionRequest,
    timeout: Duration,
) -> Result<Completion, LlmError> {
    match tokio::time::timeout(timeout, llm.complete(request)).await {
        Ok(result) => result,
        Err(_) => Err(LlmError::Timeout(timeout)),
    }
}

/// Single-turn convenience: returns the raw text of the model's answer.
/// Structured decoding is left to `structured::parse_tolerant`.
pub async fn generate_text(
    llm: &dyn TextGenerator,
    system: &str,
    user_content: &str,
    timeout: Duration,
) -> Result<String, LlmError> {
    let request = CompletionRequest::single(system, user_content);
    let completion = complete_within(llm, &request, timeout).await?;
    completion
        .text()
        .filter(|t| !t.trim().is_empty())
        .ok_or(LlmError::EmptyContent)
}

// ────────────────────────────────────────────────────────────────────────────
// Anthropic client
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "no_tools")]
    tools: &'a [ToolSpec],
}

fn no_tools(tools: &&[ToolSpec]) -> bool {
    tools.is_empty()
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

/// The single LLM client used by all stages.
/// Wraps the Anthropic Messages API with bounded retry on 429/5xx.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    max_attempts: u32,
}

impl LlmClient {
    pub fn new(api_key: String, timeout: Duration, max_retries: u32) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_key,
            max_attempts: max_retries + 1,
        })
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    /// Makes a raw call to the Claude API.
    /// Retries on 429 (rate limit) and 5xx errors with exponential backoff.
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        let messages: Vec<Message> = request
            .messages
            .iter()
            .map(|m| Message {
                role: m.role,
                content: m
                    .content
                    .iter()
                    .filter(|b| !matches!(b, ContentBlock::Unsupported))
                    .cloned()
                    .collect(),
            })
            .collect();

        let request_body = AnthropicRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            system: &request.system,
            messages: &messages,
            tools: &request.tools,
        };

        let mut last_error: Option<LlmError> = None;

        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s
                let delay = Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(ANTHROPIC_API_URL)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(&request_body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, body);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<AnthropicError>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let body: AnthropicResponse = response.json().await?;

            debug!(
                "LLM call succeeded: input_tokens={}, output_tokens={}, stop_reason={:?}",
                body.usage.input_tokens, body.usage.output_tokens, body.stop_reason
            );

            return Ok(Completion {
                content: body.content,
                stop_reason: body.stop_reason,
            });
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: self.max_attempts.saturating_sub(1),
        }))
    }
}
