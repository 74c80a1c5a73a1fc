//! # Taskforge
//!
//! Turns an unstructured requirements document into a structured,
//! dependency-ordered set of development tasks (and, recursively,
//! subtasks) by orchestrating calls to an LLM provider, with an optional
//! research pass through a second provider.
//!
//! The interesting part is not the HTTP calls but the response-reliability
//! pipeline: prompt construction, text-to-JSON extraction, schema
//! validation, bilingual-field reconciliation, id renumbering, dependency
//! coercion, and a layered retry/fallback policy that never lets a
//! malformed or truncated model reply crash the caller.
//!
//! ## Control flow
//!
//! ```text
//!  PromptBuilder -> ProviderGateway -> extract -> validate -+-> reconcile -> result
//!                         ^                                 |
//!                         +--------- retry / re-parse ------+
//!                                                           |
//!                                            fallback  <----+ (budget spent)
//! ```
//!
//! Provider errors classified as transient are retried with backoff;
//! the rest are terminal. Parse failures are absorbed: after the retry
//! budget a clearly-flagged placeholder result is returned instead.
//!
//! ## Modules
//! - `model`: task, subtask and batch shapes handed to the caller
//! - `prompt`: system/user prompt assembly for the three request kinds
//! - `provider`: the gateway over the generation and research providers
//! - `extract` / `validate`: response-text-to-structured-data stages
//! - `reconcile`: unconditional post-success normalization
//! - `fallback`: structurally valid placeholders
//! - `progress`: observational progress sink and heartbeat
//! - `pipeline`: the orchestrator tying it all together

pub mod extract;
pub mod fallback;
pub mod model;
pub mod pipeline;
pub mod progress;
pub mod prompt;
pub mod provider;
pub mod reconcile;
pub mod validate;

pub use model::{
    BatchMetadata, GenerationBatch, ParentTask, Subtask, Task, TaskPriority, TaskStatus,
};
pub use pipeline::{DecomposeRequest, ExpandRequest, GenerationError, GenerationPipeline};
pub use progress::{ProgressEvent, ProgressSink, TracingSink};
pub use prompt::{Prompt, PromptBuilder};
pub use provider::{
    GatewayConfig, ProviderError, ProviderErrorKind, ProviderGateway, RetryPolicy, TextProvider,
};
