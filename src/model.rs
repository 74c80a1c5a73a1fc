//! Task, subtask, and generation-batch data model.
//!
//! These are the values the generation pipeline hands to its caller. They
//! are produced fresh per invocation and never mutated in place by the
//! core; status updates after persistence are the task store's business.
//!
//! Field names serialize in camelCase to match the persisted `tasks.json`
//! shape consumers expect (`testStrategy`, `parentTaskId`, `titleTrans`...).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a task or subtask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    Done,
    Deferred,
}

/// Scheduling priority of a top-level task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    High,
    #[default]
    Medium,
    Low,
}

/// A top-level development task produced by document decomposition.
///
/// Invariant: every entry in `dependencies` is strictly less than `id`,
/// so a batch is acyclic by construction. Reconciliation enforces this
/// before a batch is returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: u32,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub dependencies: Vec<u32>,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub test_strategy: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_trans: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_trans: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details_trans: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_strategy_trans: Option<String>,
}

/// A subtask produced by expanding one parent task.
///
/// Same shape as [`Task`] minus `priority`, plus the owning task's id.
/// Subtask ids are always contiguous from the caller-supplied starting id,
/// regardless of what the model returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subtask {
    pub id: u32,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub dependencies: Vec<u32>,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub test_strategy: String,
    pub parent_task_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_trans: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_trans: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details_trans: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_strategy_trans: Option<String>,
}

/// Metadata attached to a decomposition batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchMetadata {
    pub project_name: String,
    pub total_tasks: u32,
    pub source_document: String,
    pub generated_at: NaiveDate,
    /// Set when the batch was synthesized because model output could not
    /// be parsed after retries. Omitted from serialization otherwise.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fallback: bool,
}

impl BatchMetadata {
    /// Default project name used when the model reply carries no metadata.
    pub const DEFAULT_PROJECT_NAME: &'static str = "PRD Implementation";

    /// Synthesize metadata for a batch whose reply had none.
    pub fn synthesized(source_document: impl Into<String>, total_tasks: u32) -> Self {
        Self {
            project_name: Self::DEFAULT_PROJECT_NAME.to_string(),
            total_tasks,
            source_document: source_document.into(),
            generated_at: chrono::Utc::now().date_naive(),
            fallback: false,
        }
    }
}

/// The result of decomposing a source document into tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationBatch {
    pub tasks: Vec<Task>,
    pub metadata: BatchMetadata,
}

/// The fields of a parent task that expansion prompts need.
#[derive(Debug, Clone)]
pub struct ParentTask {
    pub id: u32,
    pub title: String,
    pub description: String,
    pub details: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_serializes_camel_case() {
        let task = Task {
            id: 1,
            title: "Set up project".to_string(),
            description: "Initialize the repository".to_string(),
            status: TaskStatus::Pending,
            dependencies: vec![],
            priority: TaskPriority::High,
            details: "Use the standard layout".to_string(),
            test_strategy: "CI builds green".to_string(),
            title_trans: None,
            description_trans: None,
            details_trans: None,
            test_strategy_trans: None,
        };

        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["testStrategy"], "CI builds green");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["priority"], "high");
        // Absent bilingual twins are omitted entirely.
        assert!(json.get("titleTrans").is_none());
    }

    #[test]
    fn test_subtask_parent_linkage_round_trip() {
        let subtask = Subtask {
            id: 5,
            title: "Write schema".to_string(),
            description: "Define the table layout".to_string(),
            status: TaskStatus::Pending,
            dependencies: vec![4],
            details: String::new(),
            test_strategy: String::new(),
            parent_task_id: 2,
            title_trans: Some("编写模式".to_string()),
            description_trans: None,
            details_trans: None,
            test_strategy_trans: None,
        };

        let json = serde_json::to_string(&subtask).unwrap();
        let back: Subtask = serde_json::from_str(&json).unwrap();
        assert_eq!(back, subtask);
        assert!(json.contains("\"parentTaskId\":2"));
        assert!(json.contains("titleTrans"));
    }

    #[test]
    fn test_metadata_fallback_flag_omitted_when_false() {
        let meta = BatchMetadata::synthesized("prd.txt", 3);
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["projectName"], BatchMetadata::DEFAULT_PROJECT_NAME);
        assert_eq!(json["totalTasks"], 3);
        assert!(json.get("fallback").is_none());
    }

    #[test]
    fn test_status_deserializes_lowercase() {
        let status: TaskStatus = serde_json::from_str("\"deferred\"").unwrap();
        assert_eq!(status, TaskStatus::Deferred);
    }
}
