//! OpenAI-compatible chat-completions adapter.
//!
//! Works against any endpoint that speaks the `/chat/completions` wire
//! format (OpenAI, local gateways, most hosted routers). Transient
//! failures retry with backoff per [`RetryConfig`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{ChatMessage, LlmClient, LlmError, RetryConfig, Role, ToolCall, ToolDefinition};

/// OpenAI-compatible API client.
pub struct OpenAiChatClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    retry: RetryConfig,
}

impl OpenAiChatClient {
    /// Create a new client. `base_url` is the API root, e.g.
    /// `https://api.openai.com/v1`.
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn chat_once(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ChatMessage, LlmError> {
        let request = CompletionRequest {
            model: self.model.clone(),
            messages: messages.to_vec(),
            tools: if tools.is_empty() {
                None
            } else {
                Some(tools.to_vec())
            },
            tool_choice: if tools.is_empty() {
                None
            } else {
                Some("auto".to_string())
            },
        };

        let url = format!("{}/chat/completions", self.base_url);
        tracing::debug!(model = %self.model, messages = messages.len(), "sending chat request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::network(e.to_string()))?;

        let status = response.status();
        let retry_after = parse_retry_after(&response);
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::network(e.to_string()))?;

        if !status.is_success() {
            tracing::warn!(%status, %body, "chat completion error");
            return Err(LlmError::from_status(status.as_u16(), body, retry_after));
        }

        let response: CompletionResponse = serde_json::from_str(&body).map_err(|e| {
            tracing::error!(error = %e, %body, "failed to parse chat response");
            LlmError::parse(format!("failed to parse chat response: {e}"))
        })?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::parse("no choices in chat response".to_string()))?;

        Ok(ChatMessage {
            role: Role::Assistant,
            content: choice.message.content,
            tool_calls: choice.message.tool_calls,
            tool_call_id: None,
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiChatClient {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> anyhow::Result<ChatMessage> {
        let mut attempt = 0u32;
        loop {
            match self.chat_once(messages, tools).await {
                Ok(message) => return Ok(message),
                Err(e) if self.retry.should_retry(&e, attempt) => {
                    let delay = e.suggested_delay(attempt);
                    tracing::warn!(error = %e, attempt, ?delay, "retrying chat request");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn parse_retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Chat-completions request body.
#[derive(Debug, Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolDefinition>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<String>,
}

/// Chat-completions response body.
#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCall>>,
}
