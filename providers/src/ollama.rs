//! Ollama-style chat and embedding client.
//!
//! Non-streaming by design: the turn pipeline wants whole completions to
//! parse, not deltas to render.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use kava_index::{EmbedError, Embedder};

use crate::retry::{RetryConfig, RetryOutcome, send_with_retry};
use crate::{ChatModel, CompletionRequest, CompletionResponse, ProviderError, http_client};

const MAX_ERROR_BODY_BYTES: usize = 16 * 1024;

/// Client for an Ollama-style HTTP model endpoint.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    endpoint: String,
    chat_model: String,
    embed_model: String,
    retry: RetryConfig,
}

#[derive(Debug, Deserialize)]
struct ChatResponseBody {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct EmbedResponseBody {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaClient {
    #[must_use]
    pub fn new(
        endpoint: impl Into<String>,
        chat_model: impl Into<String>,
        embed_model: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            chat_model: chat_model.into(),
            embed_model: embed_model.into(),
            retry: RetryConfig::default(),
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Cheap reachability probe for health reporting: lists local models.
    pub async fn ping(&self) -> Result<(), ProviderError> {
        let url = format!("{}/api/tags", self.endpoint);
        let response = http_client()
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::Unreachable {
                message: e.to_string(),
            })?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(ProviderError::Http {
                status: response.status().as_u16(),
                body: String::new(),
            })
        }
    }

    async fn post_json(
        &self,
        url: &str,
        body: serde_json::Value,
    ) -> Result<serde_json::Value, ProviderError> {
        let outcome = send_with_retry(
            || http_client().post(url).json(&body),
            &self.retry,
        )
        .await;

        match outcome {
            RetryOutcome::Success(response) => {
                response
                    .json::<serde_json::Value>()
                    .await
                    .map_err(|e| ProviderError::invalid(e.to_string()))
            }
            RetryOutcome::HttpError(response) => {
                let status = response.status().as_u16();
                let mut body = response.text().await.unwrap_or_default();
                if body.len() > MAX_ERROR_BODY_BYTES {
                    let mut end = MAX_ERROR_BODY_BYTES;
                    while !body.is_char_boundary(end) {
                        end -= 1;
                    }
                    body.truncate(end);
                }
                Err(ProviderError::Http { status, body })
            }
            RetryOutcome::ConnectionError { attempts, source } => {
                if source.is_timeout() {
                    Err(ProviderError::Timeout { attempts })
                } else {
                    Err(ProviderError::Unreachable {
                        message: source.to_string(),
                    })
                }
            }
        }
    }
}

#[async_trait]
impl ChatModel for OllamaClient {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        let url = format!("{}/api/chat", self.endpoint);
        let body = json!({
            "model": self.chat_model,
            "messages": request.messages,
            "stream": false,
        });

        let value = self.post_json(&url, body).await?;
        let parsed: ChatResponseBody = serde_json::from_value(value)
            .map_err(|e| ProviderError::invalid(format!("chat response: {e}")))?;

        tracing::debug!(
            model = %self.chat_model,
            chars = parsed.message.content.len(),
            "Chat completion received"
        );
        Ok(CompletionResponse {
            content: parsed.message.content,
        })
    }
}

#[async_trait]
impl Embedder for OllamaClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let url = format!("{}/api/embed", self.endpoint);
        let body = json!({
            "model": self.embed_model,
            "input": text,
        });

        let value = self
            .post_json(&url, body)
            .await
            .map_err(|e| EmbedError::new(e.to_string()))?;
        let parsed: EmbedResponseBody = serde_json::from_value(value)
            .map_err(|e| EmbedError::new(format!("embed response: {e}")))?;

        parsed
            .embeddings
            .into_iter()
            .next()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| EmbedError::new("embed response contained no vectors"))
    }
}
