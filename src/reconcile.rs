//! Post-success normalization of model output.
//!
//! Runs unconditionally after every successful parse, even when the model
//! behaved: it is idempotent and cheap, and it is the only place the id,
//! dependency and bilingual invariants are enforced. Nothing in here can
//! fail - malformed fields are defaulted, logged, and moved past.

use serde_json::Value;

use crate::model::{
    BatchMetadata, GenerationBatch, Subtask, Task, TaskPriority, TaskStatus,
};

/// Read a string field, defaulting to empty when absent or non-string.
fn str_field(obj: &Value, key: &str) -> String {
    obj.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Optional string field, `None` when absent or non-string.
fn opt_str_field(obj: &Value, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Coerce a raw dependency list into numeric ids.
///
/// Numeric-looking strings become integers; entries that are neither are
/// dropped with a warning. An absent or malformed list becomes empty.
fn coerce_dependencies(raw: Option<&Value>, context: &str) -> Vec<u32> {
    let entries = match raw.and_then(Value::as_array) {
        Some(entries) => entries,
        None => {
            if raw.is_some() {
                tracing::warn!("{context}: dependencies is not an array, defaulting to []");
            }
            return Vec::new();
        }
    };

    entries
        .iter()
        .filter_map(|entry| match entry {
            Value::Number(n) => {
                let id = n.as_u64().and_then(|n| u32::try_from(n).ok());
                if id.is_none() {
                    tracing::warn!("{context}: dropping out-of-range dependency {n}");
                }
                id
            }
            Value::String(s) => {
                let parsed = s.trim().parse::<u32>().ok();
                if parsed.is_none() {
                    tracing::warn!("{context}: dropping non-numeric dependency {s:?}");
                }
                parsed
            }
            other => {
                tracing::warn!("{context}: dropping malformed dependency {other}");
                None
            }
        })
        .collect()
}

/// Pair each populated primary field with its bilingual twin, repairing an
/// absent twin with an empty placeholder. Soft defect only.
fn repair_bilingual(
    primary: &str,
    twin: Option<String>,
    field: &str,
    context: &str,
) -> Option<String> {
    match twin {
        Some(value) => Some(value),
        None if !primary.is_empty() => {
            tracing::warn!("{context}: missing bilingual twin for {field}, filling empty");
            Some(String::new())
        }
        None => None,
    }
}

/// Normalize a subtask reply into the contiguous-id contract.
///
/// Ids become exactly `next_subtask_id .. next_subtask_id + len`, in the
/// order the model returned the elements; status is forced to pending and
/// parent linkage is stamped on every element.
pub fn reconcile_subtasks(
    raw: &[Value],
    parent_task_id: u32,
    next_subtask_id: u32,
    bilingual: bool,
) -> Vec<Subtask> {
    raw.iter()
        .enumerate()
        .map(|(index, item)| {
            let expected_id = next_subtask_id + index as u32;
            let context = format!("subtask {expected_id} (parent {parent_task_id})");

            let model_id = item.get("id").and_then(Value::as_u64).map(|n| n as u32);
            if model_id != Some(expected_id) {
                tracing::info!(
                    "{context}: corrected model-supplied id {:?} to {expected_id}",
                    model_id
                );
            }

            let title = {
                let t = str_field(item, "title");
                if t.is_empty() {
                    format!("Subtask {expected_id}")
                } else {
                    t
                }
            };
            let description = str_field(item, "description");
            let details = str_field(item, "details");
            let test_strategy = str_field(item, "testStrategy");

            let (title_trans, description_trans, details_trans, test_strategy_trans) =
                if bilingual {
                    (
                        repair_bilingual(&title, opt_str_field(item, "titleTrans"), "title", &context),
                        repair_bilingual(
                            &description,
                            opt_str_field(item, "descriptionTrans"),
                            "description",
                            &context,
                        ),
                        repair_bilingual(
                            &details,
                            opt_str_field(item, "detailsTrans"),
                            "details",
                            &context,
                        ),
                        repair_bilingual(
                            &test_strategy,
                            opt_str_field(item, "testStrategyTrans"),
                            "testStrategy",
                            &context,
                        ),
                    )
                } else {
                    (None, None, None, None)
                };

            Subtask {
                id: expected_id,
                title,
                description,
                status: TaskStatus::Pending,
                dependencies: coerce_dependencies(item.get("dependencies"), &context),
                details,
                test_strategy,
                parent_task_id,
                title_trans,
                description_trans,
                details_trans,
                test_strategy_trans,
            }
        })
        .collect()
}

/// Normalize a decomposition reply into a [`GenerationBatch`].
///
/// Task ids are taken from the model (position is the fallback); forward
/// and self references in dependency lists violate the acyclicity
/// invariant and are dropped with a warning. Metadata is synthesized when
/// the reply has none, and `totalTasks` always reflects the real count.
pub fn reconcile_batch(raw: &Value, source_document: &str, bilingual: bool) -> GenerationBatch {
    let raw_tasks = raw
        .get("tasks")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let tasks: Vec<Task> = raw_tasks
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let id = item
                .get("id")
                .and_then(Value::as_u64)
                .map(|n| n as u32)
                .unwrap_or(index as u32 + 1);
            let context = format!("task {id}");

            let mut dependencies = coerce_dependencies(item.get("dependencies"), &context);
            dependencies.retain(|dep| {
                let backward = *dep < id;
                if !backward {
                    tracing::warn!(
                        "{context}: dropping dependency {dep} (must reference a lower id)"
                    );
                }
                backward
            });

            let status = item
                .get("status")
                .and_then(|v| serde_json::from_value::<TaskStatus>(v.clone()).ok())
                .unwrap_or_default();
            let priority = item
                .get("priority")
                .and_then(|v| serde_json::from_value::<TaskPriority>(v.clone()).ok())
                .unwrap_or_default();

            let title = {
                let t = str_field(item, "title");
                if t.is_empty() {
                    format!("Task {id}")
                } else {
                    t
                }
            };
            let description = str_field(item, "description");
            let details = str_field(item, "details");
            let test_strategy = str_field(item, "testStrategy");

            let (title_trans, description_trans, details_trans, test_strategy_trans) =
                if bilingual {
                    (
                        repair_bilingual(&title, opt_str_field(item, "titleTrans"), "title", &context),
                        repair_bilingual(
                            &description,
                            opt_str_field(item, "descriptionTrans"),
                            "description",
                            &context,
                        ),
                        repair_bilingual(
                            &details,
                            opt_str_field(item, "detailsTrans"),
                            "details",
                            &context,
                        ),
                        repair_bilingual(
                            &test_strategy,
                            opt_str_field(item, "testStrategyTrans"),
                            "testStrategy",
                            &context,
                        ),
                    )
                } else {
                    (None, None, None, None)
                };

            Task {
                id,
                title,
                description,
                status,
                dependencies,
                priority,
                details,
                test_strategy,
                title_trans,
                description_trans,
                details_trans,
                test_strategy_trans,
            }
        })
        .collect();

    let mut metadata = match raw.get("metadata") {
        Some(meta) if meta.is_object() => BatchMetadata {
            project_name: {
                let name = str_field(meta, "projectName");
                if name.is_empty() {
                    BatchMetadata::DEFAULT_PROJECT_NAME.to_string()
                } else {
                    name
                }
            },
            total_tasks: 0,
            source_document: {
                let doc = str_field(meta, "sourceDocument");
                if doc.is_empty() {
                    source_document.to_string()
                } else {
                    doc
                }
            },
            generated_at: opt_str_field(meta, "generatedAt")
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(|| chrono::Utc::now().date_naive()),
            fallback: false,
        },
        _ => {
            tracing::info!("decomposition reply had no metadata, synthesizing");
            BatchMetadata::synthesized(source_document, 0)
        }
    };
    metadata.total_tasks = tasks.len() as u32;

    GenerationBatch { tasks, metadata }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ids_renumbered_contiguously() {
        let raw = vec![
            json!({"id": 99, "title": "First"}),
            json!({"title": "Second"}),
            json!({"id": 1, "title": "Third"}),
        ];
        let subtasks = reconcile_subtasks(&raw, 7, 4, false);
        let ids: Vec<u32> = subtasks.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![4, 5, 6]);
        assert_eq!(subtasks[0].title, "First");
        assert!(subtasks.iter().all(|s| s.parent_task_id == 7));
        assert!(subtasks.iter().all(|s| s.status == TaskStatus::Pending));
    }

    #[test]
    fn test_dependency_coercion() {
        let raw = vec![json!({"title": "A", "dependencies": ["1", 2, "x", null]})];
        let subtasks = reconcile_subtasks(&raw, 1, 1, false);
        assert_eq!(subtasks[0].dependencies, vec![1, 2]);

        let raw = vec![json!({"title": "B"})];
        let subtasks = reconcile_subtasks(&raw, 1, 1, false);
        assert!(subtasks[0].dependencies.is_empty());

        let raw = vec![json!({"title": "C", "dependencies": "3"})];
        let subtasks = reconcile_subtasks(&raw, 1, 1, false);
        assert!(subtasks[0].dependencies.is_empty());
    }

    #[test]
    fn test_out_of_range_dependencies_dropped() {
        let raw = vec![json!({
            "title": "A",
            "dependencies": [-1, 2.5, 4294967296u64, 2]
        })];
        let subtasks = reconcile_subtasks(&raw, 1, 1, false);
        assert_eq!(subtasks[0].dependencies, vec![2]);
    }

    #[test]
    fn test_bilingual_repair_only_when_enabled() {
        let raw = vec![json!({"title": "Deploy", "description": ""})];

        let bilingual = reconcile_subtasks(&raw, 1, 1, true);
        assert_eq!(bilingual[0].title_trans.as_deref(), Some(""));
        // Empty primary stays unpaired.
        assert!(bilingual[0].description_trans.is_none());

        let plain = reconcile_subtasks(&raw, 1, 1, false);
        assert!(plain[0].title_trans.is_none());
    }

    #[test]
    fn test_bilingual_twin_preserved_when_present() {
        let raw = vec![json!({"title": "Deploy", "titleTrans": "部署"})];
        let subtasks = reconcile_subtasks(&raw, 1, 1, true);
        assert_eq!(subtasks[0].title_trans.as_deref(), Some("部署"));
    }

    #[test]
    fn test_status_forced_to_pending() {
        let raw = vec![json!({"title": "A", "status": "done"})];
        let subtasks = reconcile_subtasks(&raw, 1, 1, false);
        assert_eq!(subtasks[0].status, TaskStatus::Pending);
    }

    #[test]
    fn test_batch_metadata_synthesized_when_absent() {
        let raw = json!({"tasks": [{"id": 1, "title": "A"}, {"id": 2, "title": "B"}]});
        let batch = reconcile_batch(&raw, "prd.txt", false);
        assert_eq!(batch.metadata.project_name, "PRD Implementation");
        assert_eq!(batch.metadata.total_tasks, 2);
        assert_eq!(batch.metadata.source_document, "prd.txt");
        assert!(!batch.metadata.fallback);
    }

    #[test]
    fn test_batch_total_tasks_follows_real_count() {
        let raw = json!({
            "tasks": [{"id": 1, "title": "A"}],
            "metadata": {"projectName": "Demo", "totalTasks": 5, "sourceDocument": "spec.txt", "generatedAt": "2026-01-15"}
        });
        let batch = reconcile_batch(&raw, "prd.txt", false);
        assert_eq!(batch.metadata.total_tasks, 1);
        assert_eq!(batch.metadata.project_name, "Demo");
        assert_eq!(batch.metadata.source_document, "spec.txt");
        assert_eq!(batch.metadata.generated_at.to_string(), "2026-01-15");
    }

    #[test]
    fn test_forward_references_dropped_from_tasks() {
        let raw = json!({"tasks": [
            {"id": 1, "title": "A", "dependencies": [2]},
            {"id": 2, "title": "B", "dependencies": ["1", 2, 3]}
        ]});
        let batch = reconcile_batch(&raw, "prd.txt", false);
        assert!(batch.tasks[0].dependencies.is_empty());
        assert_eq!(batch.tasks[1].dependencies, vec![1]);
    }

    #[test]
    fn test_task_priority_defaults_to_medium() {
        let raw = json!({"tasks": [{"id": 1, "title": "A", "priority": "urgent"}]});
        let batch = reconcile_batch(&raw, "prd.txt", false);
        assert_eq!(batch.tasks[0].priority, TaskPriority::Medium);
    }

    #[test]
    fn test_reconciliation_is_idempotent() {
        let raw = vec![json!({"id": 3, "title": "A", "dependencies": [3]})];
        let once = reconcile_subtasks(&raw, 2, 3, true);
        let again_raw: Vec<Value> = once
            .iter()
            .map(|s| serde_json::to_value(s).unwrap())
            .collect();
        let twice = reconcile_subtasks(&again_raw, 2, 3, true);
        assert_eq!(once, twice);
    }
}
