//! Prompt assembly for the three request kinds.
//!
//! Pure string work: every method returns a system/user prompt pair and
//! performs no I/O. The prompts state the exact JSON contract expected in
//! the reply so the extractor and validator downstream have something
//! concrete to hold the model to.

use crate::model::ParentTask;

/// A system/user prompt pair ready to send to a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Builds prompts for decomposition, expansion, and research requests.
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    domain_knowledge: Option<String>,
    bilingual: bool,
}

impl PromptBuilder {
    pub fn new(domain_knowledge: Option<String>, bilingual: bool) -> Self {
        Self {
            domain_knowledge,
            bilingual,
        }
    }

    /// Prompt pair for turning a source document into `num_tasks` tasks.
    pub fn decompose(&self, source_text: &str, num_tasks: usize) -> Prompt {
        let system = format!(
            r#"You are an AI assistant that breaks a Product Requirements Document into exactly {num_tasks} well-structured, dependency-ordered development tasks.

Respond ONLY with a valid JSON object, no markdown fences and no commentary. The object must have this exact structure:

{{
  "tasks": [
    {{
      "id": 1,
      "title": "Short task name",
      "description": "One or two sentences describing the task",
      "status": "pending",
      "dependencies": [],
      "priority": "high",
      "details": "Implementation notes and guidance",
      "testStrategy": "How to verify this task is complete"
    }}
  ],
  "metadata": {{
    "projectName": "Name inferred from the document",
    "totalTasks": {num_tasks},
    "sourceDocument": "the source document name",
    "generatedAt": "YYYY-MM-DD"
  }}
}}

Rules:
- Produce exactly {num_tasks} tasks, numbered 1 through {num_tasks}.
- "dependencies" lists ids of tasks that must finish first. A task may only depend on tasks with a lower id.
- "status" is always "pending". "priority" is one of "high", "medium", "low".
- Order tasks so that foundational work comes first.{bilingual}"#,
            num_tasks = num_tasks,
            bilingual = self.bilingual_clause(),
        );

        let user = format!(
            "{context}Here is the requirements document to decompose into {num_tasks} tasks:\n\n{source}",
            context = self.context_block(),
            num_tasks = num_tasks,
            source = source_text,
        );

        Prompt { system, user }
    }

    /// Prompt pair for expanding one task into `num_subtasks` subtasks.
    pub fn expand(&self, parent: &ParentTask, num_subtasks: usize, next_subtask_id: u32) -> Prompt {
        self.expand_inner(parent, num_subtasks, next_subtask_id, None)
    }

    /// Expansion prompt with prior research findings folded in between the
    /// domain-knowledge block and the task description.
    pub fn expand_with_research(
        &self,
        parent: &ParentTask,
        num_subtasks: usize,
        next_subtask_id: u32,
        findings: &str,
    ) -> Prompt {
        self.expand_inner(parent, num_subtasks, next_subtask_id, Some(findings))
    }

    fn expand_inner(
        &self,
        parent: &ParentTask,
        num_subtasks: usize,
        next_subtask_id: u32,
        findings: Option<&str>,
    ) -> Prompt {
        let last_id = next_subtask_id + num_subtasks.saturating_sub(1) as u32;
        let system = format!(
            r#"You are an AI assistant that breaks one development task into exactly {num_subtasks} smaller, actionable subtasks.

Respond ONLY with a valid JSON array, no markdown fences and no commentary. Each element must have this exact structure:

{{
  "id": {next_id},
  "title": "Short subtask name",
  "description": "One or two sentences describing the subtask",
  "dependencies": [],
  "details": "Concrete implementation guidance",
  "testStrategy": "How to verify this subtask is complete"
}}

Rules:
- Produce exactly {num_subtasks} subtasks with ids {next_id} through {last_id}, in execution order.
- "dependencies" lists ids of earlier subtasks from this same list, as numbers.{bilingual}"#,
            num_subtasks = num_subtasks,
            next_id = next_subtask_id,
            last_id = last_id,
            bilingual = self.bilingual_clause(),
        );

        let research_block = match findings {
            Some(f) => format!("# Research findings\n\nTreat the following research as expert guidance for this task:\n\n{f}\n\n"),
            None => String::new(),
        };

        let user = format!(
            "{context}{research}Break down the following task into {num_subtasks} subtasks:\n\n\
             Task {id}: {title}\n\n\
             Description: {description}\n\n\
             Details: {details}",
            context = self.context_block(),
            research = research_block,
            num_subtasks = num_subtasks,
            id = parent.id,
            title = parent.title,
            description = parent.description,
            details = parent.details,
        );

        Prompt { system, user }
    }

    /// Stage-1 prompt for the research provider: free-text implementation
    /// guidance that later gets folded into the expansion prompt.
    pub fn research(&self, parent: &ParentTask, num_subtasks: usize) -> Prompt {
        let system = "You are a senior software researcher. Provide concise, current, \
                      implementation-focused guidance: concrete libraries, APIs, pitfalls, \
                      and best practices. Plain text, no JSON."
            .to_string();

        let user = format!(
            "{context}Research the best way to implement the following development task, \
             so it can be split into {num_subtasks} subtasks afterwards:\n\n\
             Task {id}: {title}\n\n\
             Description: {description}\n\n\
             Details: {details}",
            context = self.context_block(),
            num_subtasks = num_subtasks,
            id = parent.id,
            title = parent.title,
            description = parent.description,
            details = parent.details,
        );

        Prompt { system, user }
    }

    fn bilingual_clause(&self) -> &'static str {
        if self.bilingual {
            "\n- Additionally populate \"titleTrans\", \"descriptionTrans\", \"detailsTrans\" and \"testStrategyTrans\" with accurate translations of the corresponding fields."
        } else {
            ""
        }
    }

    fn context_block(&self) -> String {
        match &self.domain_knowledge {
            Some(knowledge) => format!(
                "# Project context (authoritative)\n\nTreat the following terminology and context as authoritative for this project:\n\n{knowledge}\n\n"
            ),
            None => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parent() -> ParentTask {
        ParentTask {
            id: 4,
            title: "Build auth layer".to_string(),
            description: "JWT-based authentication".to_string(),
            details: "Use middleware".to_string(),
        }
    }

    #[test]
    fn test_decompose_states_count_and_contract() {
        let prompt = PromptBuilder::default().decompose("The product shall...", 7);
        assert!(prompt.system.contains("exactly 7"));
        assert!(prompt.system.contains("\"testStrategy\""));
        assert!(prompt.system.contains("\"totalTasks\": 7"));
        assert!(prompt.user.contains("The product shall..."));
        assert!(!prompt.system.contains("titleTrans"));
    }

    #[test]
    fn test_expand_states_exact_id_range() {
        let prompt = PromptBuilder::default().expand(&parent(), 3, 11);
        assert!(prompt.system.contains("ids 11 through 13"));
        assert!(prompt.system.contains("exactly 3 subtasks"));
        assert!(prompt.user.contains("Task 4: Build auth layer"));
    }

    #[test]
    fn test_bilingual_clause_names_secondary_fields() {
        let builder = PromptBuilder::new(None, true);
        let prompt = builder.expand(&parent(), 2, 1);
        for field in ["titleTrans", "descriptionTrans", "detailsTrans", "testStrategyTrans"] {
            assert!(prompt.system.contains(field), "missing {field}");
        }
    }

    #[test]
    fn test_domain_knowledge_injected_verbatim() {
        let builder = PromptBuilder::new(Some("A 'shard' is a tenant partition.".to_string()), false);
        let prompt = builder.decompose("doc", 2);
        assert!(prompt.user.contains("A 'shard' is a tenant partition."));
        assert!(prompt.user.contains("authoritative"));
    }

    #[test]
    fn test_research_findings_sit_between_context_and_task() {
        let builder = PromptBuilder::new(Some("glossary".to_string()), false);
        let prompt = builder.expand_with_research(&parent(), 2, 5, "Use jsonwebtoken 9.x");
        let context_at = prompt.user.find("glossary").unwrap();
        let research_at = prompt.user.find("Use jsonwebtoken 9.x").unwrap();
        let task_at = prompt.user.find("Task 4:").unwrap();
        assert!(context_at < research_at && research_at < task_at);
    }

    #[test]
    fn test_research_prompt_asks_for_plain_text() {
        let prompt = PromptBuilder::default().research(&parent(), 4);
        assert!(prompt.system.contains("no JSON"));
        assert!(prompt.user.contains("4 subtasks"));
    }
}
