//! OpenAI-compatible embeddings adapter.
//!
//! Used only when an L3 knowledge store is configured; the embedding and
//! chat endpoints may point at different bases.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::memory::EmbeddingProvider;

use super::LlmError;

/// OpenAI-compatible `/embeddings` client.
pub struct OpenAiEmbedder {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiEmbedder {
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let url = format!("{}/embeddings", self.base_url);
        let request = EmbeddingRequest {
            model: self.model.clone(),
            input: text.to_string(),
        };

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
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::network(e.to_string()))?;

        if !status.is_success() {
            tracing::warn!(%status, %body, "embedding request error");
            return Err(LlmError::from_status(status.as_u16(), body, None).into());
        }

        let response: EmbeddingResponse = serde_json::from_str(&body)
            .map_err(|e| LlmError::parse(format!("failed to parse embedding response: {e}")))?;

        let entry = response
            .data
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::parse("no data in embedding response".to_string()))?;

        Ok(entry.embedding)
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    input: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingEntry>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingEntry {
    embedding: Vec<f32>,
}
