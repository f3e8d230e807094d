//! The plan execution engine.
//!
//! Traverses a task tree, expands complex tasks through the external
//! planner, synthesizes commands for sequence tasks, escalates manual tasks
//! to a human, and runs discrete tasks through the sequence interpreter.
//! Each run is bounded to a fixed number of attempts.

use std::sync::Arc;

use thiserror::Error;

use crate::interpreter::Interpreter;
use crate::planner::{PlanError, Planner, TaskSeed};
use crate::types::{
    aggregate_feasibility, CommandInput, CommandResult, Plan, Task, TaskCategory, TaskId,
};

/// Attempt budget for one plan run.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Fatal engine misuse; these abort the run as errors rather than outcomes.
#[derive(Debug, Error)]
pub enum PlanExecutionError {
    #[error("task '{0}' not found in plan")]
    TaskNotFound(TaskId),

    #[error("precondition violated: {0}")]
    Precondition(String),
}

/// Terminal outcome of a plan run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanOutcome {
    /// Every task in the tree is complete.
    Completed,
    /// A manual task was reached; a human has to take over. Terminal for
    /// this run, but not an error.
    Escalated { task_id: TaskId, objective: String },
    /// The run failed: which task, on which attempt, and the deepest
    /// failure message.
    Failed {
        task_id: TaskId,
        attempt: u32,
        message: String,
    },
}

/// Drives a [`Plan`] to completion against a planner and an interpreter.
pub struct PlanExecutor {
    interpreter: Arc<Interpreter>,
    planner: Arc<dyn Planner>,
    max_attempts: u32,
}

impl PlanExecutor {
    pub fn new(interpreter: Arc<Interpreter>, planner: Arc<dyn Planner>) -> Self {
        Self {
            interpreter,
            planner,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Select the next unit of work.
    ///
    /// From the current task's parent (or the current task itself at the
    /// root), walk upward while the candidate is complete; then walk back
    /// down, at each level taking the first incomplete child by execution
    /// order. Returns `None` when the whole tree is complete.
    pub fn next_task(plan: &Plan) -> Result<Option<TaskId>, PlanExecutionError> {
        let current_id = plan.current_state.current_task_id.clone();
        if plan.find_task(&current_id).is_none() {
            return Err(PlanExecutionError::TaskNotFound(current_id));
        }

        let mut cursor: TaskId = plan
            .parent_id(&current_id)
            .cloned()
            .unwrap_or(current_id);

        loop {
            let task = plan
                .find_task(&cursor)
                .ok_or_else(|| PlanExecutionError::TaskNotFound(cursor.clone()))?;
            if !plan.is_complete(task) {
                break;
            }
            match plan.parent_id(&cursor) {
                Some(parent) => cursor = parent.clone(),
                None => return Ok(None),
            }
        }

        let mut task = plan
            .find_task(&cursor)
            .ok_or_else(|| PlanExecutionError::TaskNotFound(cursor.clone()))?;
        loop {
            let mut incomplete: Vec<&Task> = task
                .subtasks
                .iter()
                .filter(|subtask| !plan.is_complete(subtask))
                .collect();
            incomplete.sort_by_key(|subtask| subtask.execution_order);
            match incomplete.first() {
                Some(child) => task = *child,
                None => break,
            }
        }

        Ok(Some(task.id.clone()))
    }

    /// The command a task must carry to be run directly. Only a discrete
    /// task with a resolved command qualifies; everything else is a fatal
    /// precondition error.
    pub fn executable_command(task: &Task) -> Result<CommandInput, PlanExecutionError> {
        match task.category {
            TaskCategory::Complex => Err(PlanExecutionError::Precondition(format!(
                "task '{}' is complex and cannot be executed directly",
                task.id
            ))),
            TaskCategory::Manual => Err(PlanExecutionError::Precondition(format!(
                "task '{}' requires human intervention and cannot be executed",
                task.id
            ))),
            TaskCategory::Sequence => Err(PlanExecutionError::Precondition(format!(
                "task '{}' has not been synthesized into a command",
                task.id
            ))),
            TaskCategory::Discrete => task.command.clone().ok_or_else(|| {
                PlanExecutionError::Precondition(format!(
                    "task '{}' has no command to execute",
                    task.id
                ))
            }),
        }
    }

    /// Run the plan until it completes, escalates, fails, or exhausts the
    /// attempt budget.
    pub async fn execute(&self, plan: &mut Plan) -> Result<PlanOutcome, PlanExecutionError> {
        for attempt in 1..=self.max_attempts {
            if plan.is_plan_complete() {
                tracing::info!(plan = %plan.name, "plan complete");
                return Ok(PlanOutcome::Completed);
            }

            let Some(task_id) = Self::next_task(plan)? else {
                return Ok(PlanOutcome::Completed);
            };
            plan.current_state.current_task_id = task_id.clone();

            let (category, objective) = {
                let task = plan
                    .find_task(&task_id)
                    .ok_or_else(|| PlanExecutionError::TaskNotFound(task_id.clone()))?;
                (task.category, task.objective.clone())
            };
            tracing::info!(
                plan = %plan.name,
                attempt,
                task_id = %task_id,
                category = ?category,
                "executing plan attempt"
            );

            match category {
                TaskCategory::Complex => {
                    if let Err(error) = self.expand_task(plan, &task_id).await? {
                        tracing::warn!(task_id = %task_id, %error, "task expansion failed");
                        return Ok(PlanOutcome::Failed {
                            task_id,
                            attempt,
                            message: error.to_string(),
                        });
                    }
                }
                TaskCategory::Sequence => {
                    self.synthesize_task(plan, &task_id, &objective).await?;
                }
                TaskCategory::Manual => {
                    tracing::info!(task_id = %task_id, "manual task reached, escalating to human");
                    return Ok(PlanOutcome::Escalated { task_id, objective });
                }
                TaskCategory::Discrete => {
                    let results = self.execute_leaf(plan, &task_id).await?;
                    let last = results.last().cloned().unwrap_or_else(|| {
                        CommandResult::fail("no command results returned")
                    });
                    if last.success {
                        plan.mark_completed(task_id);
                    } else {
                        let message = last.message.unwrap_or_else(|| "command failed".to_string());
                        tracing::warn!(task_id = %task_id, attempt, %message, "task failed, aborting plan run");
                        return Ok(PlanOutcome::Failed {
                            task_id,
                            attempt,
                            message,
                        });
                    }
                }
            }
        }

        let task_id = plan.current_state.current_task_id.clone();
        tracing::warn!(plan = %plan.name, task_id = %task_id, "attempt budget exhausted");
        Ok(PlanOutcome::Failed {
            task_id,
            attempt: self.max_attempts,
            message: format!("plan incomplete after {} attempts", self.max_attempts),
        })
    }

    /// Expand a complex task through the planner. Expansion happens exactly
    /// once per task: a complex task that already has subtasks is a fatal
    /// precondition error.
    async fn expand_task(
        &self,
        plan: &mut Plan,
        task_id: &str,
    ) -> Result<Result<(), PlanError>, PlanExecutionError> {
        let objective = {
            let task = plan
                .find_task(task_id)
                .ok_or_else(|| PlanExecutionError::TaskNotFound(task_id.to_string()))?;
            if !task.subtasks.is_empty() {
                return Err(PlanExecutionError::Precondition(format!(
                    "task '{}' is already expanded",
                    task.id
                )));
            }
            task.objective.clone()
        };

        let tree_summary = plan.render_tree();
        let formats = self.interpreter.registry().format_strings_owned();
        let seeds = match self.planner.expand(&objective, &tree_summary, &formats).await {
            Ok(seeds) => seeds,
            Err(error) => return Ok(Err(error)),
        };
        if seeds.is_empty() {
            return Ok(Err(PlanError::InvalidShape(
                "planner returned no subtasks".to_string(),
            )));
        }

        let subtasks: Vec<Task> = seeds.into_iter().map(TaskSeed::into_task).collect();
        let revised_feasibility = aggregate_feasibility(&subtasks);
        plan.attach_subtasks(task_id, subtasks);
        if let Some(task) = plan.find_task_mut(task_id) {
            task.feasibility = revised_feasibility;
        }
        tracing::info!(task_id, revised_feasibility, "task expanded");
        Ok(Ok(()))
    }

    /// Synthesize a literal command for a sequence task. On success the
    /// task becomes discrete and executes on a later attempt; on planner
    /// failure the task is downgraded to complex and re-expanded instead of
    /// aborting the whole plan.
    async fn synthesize_task(
        &self,
        plan: &mut Plan,
        task_id: &str,
        objective: &str,
    ) -> Result<(), PlanExecutionError> {
        let formats = self.interpreter.registry().format_strings_owned();
        let synthesized = self.planner.synthesize_sequence(objective, &formats).await;
        let task = plan
            .find_task_mut(task_id)
            .ok_or_else(|| PlanExecutionError::TaskNotFound(task_id.to_string()))?;
        match synthesized {
            Ok(command) => {
                task.command = Some(command);
                task.category = TaskCategory::Discrete;
            }
            Err(error) => {
                tracing::warn!(task_id, %error, "sequence synthesis failed, downgrading task to complex");
                task.category = TaskCategory::Complex;
            }
        }
        Ok(())
    }

    /// Execute a leaf task's command through the interpreter.
    async fn execute_leaf(
        &self,
        plan: &Plan,
        task_id: &str,
    ) -> Result<Vec<CommandResult>, PlanExecutionError> {
        let task = plan
            .find_task(task_id)
            .ok_or_else(|| PlanExecutionError::TaskNotFound(task_id.to_string()))?;
        let command = Self::executable_command(task)?;
        Ok(self.interpreter.execute(&[command]).await)
    }
}
