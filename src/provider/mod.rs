//! Provider gateway: a uniform "send prompt, get text" contract over the
//! primary generation provider and the optional research provider.
//!
//! Concrete clients live in submodules; everything upstream of this module
//! talks to [`TextProvider`] objects only, so tests can substitute stubs.

mod anthropic;
mod error;
mod perplexity;

pub use anthropic::AnthropicClient;
pub use error::{classify_status, ProviderError, ProviderErrorKind, RetryPolicy};
pub use perplexity::PerplexityClient;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::progress::{HeartbeatGuard, ProgressEvent, ProgressSink};
use crate::prompt::Prompt;

/// A provider that accepts a prompt pair and returns raw response text.
#[async_trait]
pub trait TextProvider: Send + Sync {
    async fn send(&self, prompt: &Prompt) -> Result<String, ProviderError>;

    /// Short provider name for logs and error messages.
    fn name(&self) -> &str;
}

/// Credentials and model selection for both providers.
///
/// The research credential is optional: its absence must only fail the
/// research path, never decomposition or plain expansion.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub anthropic_api_key: String,
    pub model: String,
    pub perplexity_api_key: Option<String>,
    pub research_model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl GatewayConfig {
    pub const DEFAULT_MODEL: &'static str = "claude-3-7-sonnet-20250219";
    pub const DEFAULT_RESEARCH_MODEL: &'static str = "sonar-pro";

    /// Load configuration from the environment.
    ///
    /// `ANTHROPIC_API_KEY` is required; `PERPLEXITY_API_KEY` is picked up
    /// when present. `TASKFORGE_MODEL`, `PERPLEXITY_MODEL`, `MAX_TOKENS`
    /// and `TEMPERATURE` override the defaults.
    pub fn from_env() -> Result<Self, ProviderError> {
        let anthropic_api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
            ProviderError::Configuration("ANTHROPIC_API_KEY is not set".to_string())
        })?;

        Ok(Self {
            anthropic_api_key,
            model: std::env::var("TASKFORGE_MODEL")
                .unwrap_or_else(|_| Self::DEFAULT_MODEL.to_string()),
            perplexity_api_key: std::env::var("PERPLEXITY_API_KEY").ok(),
            research_model: std::env::var("PERPLEXITY_MODEL")
                .unwrap_or_else(|_| Self::DEFAULT_RESEARCH_MODEL.to_string()),
            max_tokens: std::env::var("MAX_TOKENS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(64_000),
            temperature: std::env::var("TEMPERATURE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.2),
        })
    }
}

/// Research-provider state: either a ready client (injected or already
/// constructed) or the credentials to build one on first use.
struct ResearchSlot {
    client: Mutex<Option<Arc<dyn TextProvider>>>,
    credentials: Option<(String, String)>,
}

/// Wraps both external AI calls behind one interface and reports call
/// progress to the sink. Created once per process and passed by reference
/// into the pipeline.
pub struct ProviderGateway {
    primary: Arc<dyn TextProvider>,
    research: ResearchSlot,
    sink: Arc<dyn ProgressSink>,
}

impl ProviderGateway {
    /// Build real clients from configuration. The primary client is
    /// constructed eagerly; the research client waits for first use.
    pub fn from_config(config: GatewayConfig, sink: Arc<dyn ProgressSink>) -> Self {
        let primary = Arc::new(AnthropicClient::new(
            config.anthropic_api_key.clone(),
            config.model.clone(),
            config.max_tokens,
            config.temperature,
        ));
        let credentials = config
            .perplexity_api_key
            .clone()
            .map(|key| (key, config.research_model.clone()));

        Self {
            primary,
            research: ResearchSlot {
                client: Mutex::new(None),
                credentials,
            },
            sink,
        }
    }

    /// Inject provider implementations directly. Used by tests and by
    /// callers that bring their own clients.
    pub fn with_clients(
        primary: Arc<dyn TextProvider>,
        research: Option<Arc<dyn TextProvider>>,
        sink: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            primary,
            research: ResearchSlot {
                client: Mutex::new(research),
                credentials: None,
            },
            sink,
        }
    }

    /// Send a prompt to the primary generation provider.
    pub async fn send_primary(
        &self,
        prompt: &Prompt,
        stage: &'static str,
    ) -> Result<String, ProviderError> {
        self.call(self.primary.clone(), prompt, stage).await
    }

    /// Send a prompt to the research provider, constructing it on first
    /// use. Fails fast with a configuration error when the research
    /// credential is absent.
    pub async fn send_research(
        &self,
        prompt: &Prompt,
        stage: &'static str,
    ) -> Result<String, ProviderError> {
        let client = self.research_client().await?;
        self.call(client, prompt, stage).await
    }

    async fn research_client(&self) -> Result<Arc<dyn TextProvider>, ProviderError> {
        let mut slot = self.research.client.lock().await;
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }

        let (key, model) = self.research.credentials.clone().ok_or_else(|| {
            ProviderError::Configuration(
                "PERPLEXITY_API_KEY is not set; research-augmented expansion is unavailable"
                    .to_string(),
            )
        })?;

        tracing::info!(model = %model, "initializing research provider client");
        let client: Arc<dyn TextProvider> = Arc::new(PerplexityClient::new(key, model));
        *slot = Some(client.clone());
        Ok(client)
    }

    /// One provider round-trip wrapped in progress notifications. The
    /// heartbeat guard is dropped (and its task aborted) on every exit
    /// path. Notifications are a side channel only; they never alter the
    /// returned result.
    async fn call(
        &self,
        provider: Arc<dyn TextProvider>,
        prompt: &Prompt,
        stage: &'static str,
    ) -> Result<String, ProviderError> {
        self.sink.notify(ProgressEvent::Started { stage });
        let _heartbeat = HeartbeatGuard::start(self.sink.clone(), stage);

        let result = provider.send(prompt).await;

        self.sink.notify(ProgressEvent::Finished { stage });
        match &result {
            Ok(text) => tracing::debug!(
                stage,
                provider = provider.name(),
                response_len = text.len(),
                "provider call succeeded"
            ),
            Err(err) => tracing::warn!(
                stage,
                provider = provider.name(),
                "provider call failed: {err}"
            ),
        }
        result
    }
}
