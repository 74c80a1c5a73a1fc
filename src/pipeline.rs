//! Top-level generation pipeline and its retry/fallback state machine.
//!
//! One invocation runs build -> send -> extract -> validate -> reconcile
//! strictly in sequence. Two failure families are treated asymmetrically:
//!
//! - Transient provider failures (quota, timeout, network) are retried
//!   with linear backoff; other provider failures are terminal and
//!   surface to the caller unmodified.
//! - Extraction/validation failures are absorbed: one re-parse of the
//!   same text, one fresh request, then a clearly-flagged fallback
//!   result. A malformed reply never blocks the caller.

use std::sync::Arc;

use serde_json::Value;

use crate::extract::{extract_json, ExpectedShape, ExtractionError};
use crate::fallback::{fallback_batch, fallback_subtasks};
use crate::model::{GenerationBatch, ParentTask, Subtask};
use crate::progress::{ProgressEvent, ProgressSink, TracingSink};
use crate::prompt::{Prompt, PromptBuilder};
use crate::provider::{ProviderError, ProviderGateway, RetryPolicy};
use crate::reconcile::{reconcile_batch, reconcile_subtasks};
use crate::validate::{validate_batch, validate_subtasks, CountCheck, ValidationError};

const STAGE_DECOMPOSE: &str = "generating-tasks";
const STAGE_EXPAND: &str = "expanding-task";
const STAGE_RESEARCH: &str = "researching-task";

/// Terminal pipeline failure. Extraction and validation problems never
/// appear here; they end in a fallback result instead.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GenerationError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Inputs for turning a source document into a task batch.
#[derive(Debug, Clone)]
pub struct DecomposeRequest {
    /// Free text of the requirements document.
    pub source_text: String,
    /// Document name recorded in batch metadata.
    pub source_name: String,
    pub num_tasks: usize,
    pub domain_knowledge: Option<String>,
    pub bilingual: bool,
}

/// Inputs for expanding one task into subtasks.
#[derive(Debug, Clone)]
pub struct ExpandRequest {
    pub parent: ParentTask,
    pub num_subtasks: usize,
    /// First id to assign; the result always covers exactly
    /// `next_subtask_id .. next_subtask_id + num_subtasks`.
    pub next_subtask_id: u32,
    pub domain_knowledge: Option<String>,
    pub bilingual: bool,
}

/// Orchestrates prompt building, provider calls, extraction, validation,
/// and reconciliation under one retry policy.
pub struct GenerationPipeline {
    gateway: Arc<ProviderGateway>,
    sink: Arc<dyn ProgressSink>,
    retry: RetryPolicy,
}

impl GenerationPipeline {
    pub fn new(gateway: Arc<ProviderGateway>) -> Self {
        Self {
            gateway,
            sink: Arc::new(TracingSink),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Decompose a source document into a dependency-ordered task batch.
    pub async fn decompose(
        &self,
        request: DecomposeRequest,
    ) -> Result<GenerationBatch, GenerationError> {
        let builder = PromptBuilder::new(request.domain_knowledge.clone(), request.bilingual);
        let prompt = builder.decompose(&request.source_text, request.num_tasks);

        let value = self
            .acquire(&prompt, STAGE_DECOMPOSE, ExpectedShape::Object, |v| {
                validate_batch(v, request.num_tasks)
            })
            .await?;

        Ok(match value {
            Some(value) => reconcile_batch(&value, &request.source_name, request.bilingual),
            None => fallback_batch(&request.source_name, request.num_tasks),
        })
    }

    /// Expand one task into subtasks.
    pub async fn expand(&self, request: ExpandRequest) -> Result<Vec<Subtask>, GenerationError> {
        self.expand_inner(request, None).await
    }

    /// Research-augmented expansion: one non-retried research call, then
    /// the standard expand pipeline with the findings folded in.
    ///
    /// A research failure is terminal - fabricating "default" findings
    /// would defeat the purpose of the research pass.
    pub async fn expand_with_research(
        &self,
        request: ExpandRequest,
    ) -> Result<Vec<Subtask>, GenerationError> {
        let builder = PromptBuilder::new(request.domain_knowledge.clone(), request.bilingual);
        let research_prompt = builder.research(&request.parent, request.num_subtasks);

        let findings = self
            .gateway
            .send_research(&research_prompt, STAGE_RESEARCH)
            .await?;
        tracing::info!(
            parent_task_id = request.parent.id,
            findings_len = findings.len(),
            "research pass complete"
        );

        self.expand_inner(request, Some(&findings)).await
    }

    async fn expand_inner(
        &self,
        request: ExpandRequest,
        findings: Option<&str>,
    ) -> Result<Vec<Subtask>, GenerationError> {
        let builder = PromptBuilder::new(request.domain_knowledge.clone(), request.bilingual);
        let prompt = match findings {
            Some(findings) => builder.expand_with_research(
                &request.parent,
                request.num_subtasks,
                request.next_subtask_id,
                findings,
            ),
            None => builder.expand(
                &request.parent,
                request.num_subtasks,
                request.next_subtask_id,
            ),
        };

        let value = self
            .acquire(&prompt, STAGE_EXPAND, ExpectedShape::Array, |v| {
                validate_subtasks(v, request.num_subtasks)
            })
            .await?;

        Ok(match value {
            Some(value) => {
                let raw = value.as_array().cloned().unwrap_or_default();
                reconcile_subtasks(
                    &raw,
                    request.parent.id,
                    request.next_subtask_id,
                    request.bilingual,
                )
            }
            None => fallback_subtasks(&request.parent, request.num_subtasks, request.next_subtask_id),
        })
    }

    /// The extract/validate loop: `Ok(Some(value))` on success,
    /// `Ok(None)` when the parse budget is spent (caller falls back),
    /// `Err` only for terminal provider failures.
    async fn acquire<V>(
        &self,
        prompt: &Prompt,
        stage: &'static str,
        shape: ExpectedShape,
        validate: V,
    ) -> Result<Option<Value>, GenerationError>
    where
        V: Fn(&Value) -> Result<CountCheck, ValidationError>,
    {
        let mut text = self.send_with_retry(prompt, stage).await?;

        for attempt in 0..=self.retry.parse_retries {
            // Last retry re-sends the request for a fresh response; the
            // one before it re-parses the same text.
            if attempt == self.retry.parse_retries && attempt > 0 {
                tracing::info!(stage, "requesting a fresh response for the final parse attempt");
                text = self.send_with_retry(prompt, stage).await?;
            }

            match Self::parse(&text, shape, &validate) {
                Ok((value, check)) => {
                    if check.mismatch() {
                        let message = format!(
                            "requested {} item(s) but the model returned {}",
                            check.requested, check.returned
                        );
                        tracing::warn!(stage, "{message}");
                        self.sink.notify(ProgressEvent::Warning { stage, message });
                    }
                    return Ok(Some(value));
                }
                Err(reason) => {
                    tracing::warn!(
                        stage,
                        attempt,
                        raw_len = text.len(),
                        "parse attempt failed: {reason}"
                    );
                    self.sink.notify(ProgressEvent::Warning {
                        stage,
                        message: format!("parse attempt {attempt} failed: {reason}"),
                    });
                }
            }
        }

        tracing::error!(stage, "parse retries exhausted, falling back to placeholder result");
        Ok(None)
    }

    fn parse<V>(
        text: &str,
        shape: ExpectedShape,
        validate: &V,
    ) -> Result<(Value, CountCheck), ParseFailure>
    where
        V: Fn(&Value) -> Result<CountCheck, ValidationError>,
    {
        let value = extract_json(text, shape)?;
        let check = validate(&value)?;
        Ok((value, check))
    }

    /// One logical provider request: an explicit bounded loop, not
    /// retry-by-reinvocation, so the attempt budget stays auditable.
    async fn send_with_retry(
        &self,
        prompt: &Prompt,
        stage: &'static str,
    ) -> Result<String, GenerationError> {
        let mut attempt = 0;
        loop {
            match self.gateway.send_primary(prompt, stage).await {
                Ok(text) => {
                    if attempt > 0 {
                        tracing::info!(stage, retries = attempt, "provider call recovered");
                    }
                    return Ok(text);
                }
                Err(err) if err.is_retryable() && attempt < self.retry.provider_retries => {
                    let delay = self.retry.delay(attempt);
                    tracing::warn!(
                        stage,
                        attempt = attempt + 1,
                        ?delay,
                        "transient provider failure, will retry: {err}"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    tracing::error!(stage, "provider call failed terminally: {err}");
                    return Err(err.into());
                }
            }
        }
    }
}

/// Internal union of the two absorbable failure families.
#[derive(Debug, thiserror::Error)]
enum ParseFailure {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}
