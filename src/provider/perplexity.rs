//! Perplexity chat-completions client (research provider).
//!
//! OpenAI-compatible wire format. Constructed lazily by the gateway on the
//! first research request.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::error::{classify_status, ProviderError, ProviderErrorKind};
use super::TextProvider;
use crate::prompt::Prompt;

const PERPLEXITY_API_URL: &str = "https://api.perplexity.ai/chat/completions";

/// Client for the Perplexity chat-completions API.
pub struct PerplexityClient {
    client: Client,
    api_key: String,
    model: String,
}

impl PerplexityClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
        }
    }
}

#[async_trait]
impl TextProvider for PerplexityClient {
    async fn send(&self, prompt: &Prompt) -> Result<String, ProviderError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
        };

        tracing::debug!(model = %self.model, "sending request to Perplexity");

        let response = self
            .client
            .post(PERPLEXITY_API_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(self.name(), &e))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(ProviderError::request(
                self.name(),
                classify_status(status.as_u16()),
                format!("HTTP {}: {}", status.as_u16(), body),
            ));
        }

        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            ProviderError::request(
                self.name(),
                ProviderErrorKind::Unknown,
                format!("unexpected response body: {e}"),
            )
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
            .ok_or_else(|| {
                ProviderError::request(
                    self.name(),
                    ProviderErrorKind::Unknown,
                    "response carried no message content",
                )
            })
    }

    fn name(&self) -> &str {
        "perplexity"
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}
