//! Placeholder results for when model output cannot be parsed.
//!
//! After the parse-retry budget is spent the pipeline must still hand the
//! caller something structurally valid, clearly flagged so an operator can
//! revise it by hand. Content here is deliberately generic; inventing
//! plausible-looking task text would be worse than an honest placeholder.

use crate::model::{
    BatchMetadata, GenerationBatch, ParentTask, Subtask, Task, TaskPriority, TaskStatus,
};

const PLACEHOLDER_NOTE: &str =
    "Automatically generated placeholder: the model reply could not be parsed. Revise manually.";

/// Synthesize a batch of exactly `requested` placeholder tasks.
///
/// Tasks are chained sequentially (each depends on its predecessor) so the
/// batch is still dependency-ordered, and the metadata carries the
/// fallback flag.
pub fn fallback_batch(source_document: &str, requested: usize) -> GenerationBatch {
    tracing::warn!(
        requested,
        source_document,
        "synthesizing fallback task batch"
    );

    let tasks: Vec<Task> = (1..=requested as u32)
        .map(|id| Task {
            id,
            title: format!("Task {id}"),
            description: PLACEHOLDER_NOTE.to_string(),
            status: TaskStatus::Pending,
            dependencies: if id > 1 { vec![id - 1] } else { vec![] },
            priority: TaskPriority::Medium,
            details: String::new(),
            test_strategy: String::new(),
            title_trans: None,
            description_trans: None,
            details_trans: None,
            test_strategy_trans: None,
        })
        .collect();

    let mut metadata = BatchMetadata::synthesized(source_document, requested as u32);
    metadata.fallback = true;

    GenerationBatch { tasks, metadata }
}

/// Synthesize exactly `requested` placeholder subtasks for `parent`,
/// numbered contiguously from `next_subtask_id`.
pub fn fallback_subtasks(
    parent: &ParentTask,
    requested: usize,
    next_subtask_id: u32,
) -> Vec<Subtask> {
    tracing::warn!(
        parent_task_id = parent.id,
        requested,
        "synthesizing fallback subtask list"
    );

    (0..requested as u32)
        .map(|index| {
            let id = next_subtask_id + index;
            Subtask {
                id,
                title: format!("Subtask {} of {} for: {}", index + 1, requested, parent.title),
                description: PLACEHOLDER_NOTE.to_string(),
                status: TaskStatus::Pending,
                dependencies: if index > 0 { vec![id - 1] } else { vec![] },
                details: String::new(),
                test_strategy: String::new(),
                parent_task_id: parent.id,
                title_trans: None,
                description_trans: None,
                details_trans: None,
                test_strategy_trans: None,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_batch_shape() {
        let batch = fallback_batch("prd.txt", 4);
        assert_eq!(batch.tasks.len(), 4);
        assert!(batch.metadata.fallback);
        assert_eq!(batch.metadata.total_tasks, 4);
        assert_eq!(batch.metadata.source_document, "prd.txt");
        // Sequential chain keeps the batch dependency-ordered.
        assert!(batch.tasks[0].dependencies.is_empty());
        assert_eq!(batch.tasks[3].dependencies, vec![3]);
    }

    #[test]
    fn test_fallback_subtasks_contiguous_ids() {
        let parent = ParentTask {
            id: 9,
            title: "Build importer".to_string(),
            description: String::new(),
            details: String::new(),
        };
        let subtasks = fallback_subtasks(&parent, 3, 12);
        let ids: Vec<u32> = subtasks.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![12, 13, 14]);
        assert!(subtasks.iter().all(|s| s.parent_task_id == 9));
        assert!(subtasks[0].title.contains("Build importer"));
    }

    #[test]
    fn test_fallback_batch_acyclic_invariant() {
        let batch = fallback_batch("prd.txt", 6);
        for task in &batch.tasks {
            assert!(task.dependencies.iter().all(|d| *d < task.id));
        }
    }
}
