//! Planner seam.
//!
//! The planner is the external (typically language-model-backed)
//! collaborator that expands an objective into subtasks or synthesizes a
//! literal command sequence for one. The engine only depends on this
//! contract; prompt construction and transport live with the embedder.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{CommandInput, Task, TaskCategory};

/// Planner errors.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("failed to expand objective: {0}")]
    Expansion(String),

    #[error("failed to synthesize command sequence: {0}")]
    Synthesis(String),

    #[error("planner returned an invalid shape: {0}")]
    InvalidShape(String),

    #[error("LLM error: {0}")]
    Llm(String),
}

/// A partially populated task produced by the planner. Ids are assigned and
/// scores clamped when the seed is adopted into a plan.
#[derive(Debug, Clone)]
pub struct TaskSeed {
    pub objective: String,
    pub category: TaskCategory,
    /// A literal command that achieves the objective in its entirety, when
    /// one exists among the available formats.
    pub command: Option<CommandInput>,
    pub impact: f64,
    pub impact_rationale: String,
    pub feasibility: f64,
    pub feasibility_rationale: String,
    pub execution_order: i64,
}

impl TaskSeed {
    pub fn new(objective: impl Into<String>, category: TaskCategory) -> Self {
        Self {
            objective: objective.into(),
            category,
            command: None,
            impact: 1.0,
            impact_rationale: String::new(),
            feasibility: 1.0,
            feasibility_rationale: String::new(),
            execution_order: 1,
        }
    }

    pub fn with_command(mut self, command: CommandInput) -> Self {
        self.command = Some(command);
        self
    }

    pub fn with_execution_order(mut self, order: i64) -> Self {
        self.execution_order = order;
        self
    }

    pub fn with_impact(mut self, impact: f64, rationale: impl Into<String>) -> Self {
        self.impact = impact;
        self.impact_rationale = rationale.into();
        self
    }

    pub fn with_feasibility(mut self, feasibility: f64, rationale: impl Into<String>) -> Self {
        self.feasibility = feasibility;
        self.feasibility_rationale = rationale.into();
        self
    }

    /// Adopt the seed as a task: fresh id, clamped scores, and any seed that
    /// already carries a literal command is discrete regardless of the
    /// declared category.
    pub fn into_task(self) -> Task {
        let category = if self.command.is_some() {
            TaskCategory::Discrete
        } else {
            self.category
        };
        let mut task = Task {
            id: uuid::Uuid::new_v4().to_string(),
            objective: self.objective,
            category,
            command: self.command,
            impact: self.impact,
            impact_rationale: self.impact_rationale,
            feasibility: self.feasibility,
            feasibility_rationale: self.feasibility_rationale,
            execution_order: self.execution_order,
            subtasks: Vec::new(),
        };
        task.sanitize_scores();
        task
    }
}

/// External objective decomposition and sequence synthesis.
#[async_trait]
pub trait Planner: Send + Sync {
    /// Break an objective into subtasks, given a rendered summary of the
    /// surrounding task tree and the formats available for execution.
    async fn expand(
        &self,
        objective: &str,
        tree_summary: &str,
        relevant_formats: &[String],
    ) -> Result<Vec<TaskSeed>, PlanError>;

    /// Synthesize a literal command input that achieves the objective.
    /// Fails explicitly rather than returning a partial result.
    async fn synthesize_sequence(
        &self,
        objective: &str,
        relevant_formats: &[String],
    ) -> Result<CommandInput, PlanError>;
}
