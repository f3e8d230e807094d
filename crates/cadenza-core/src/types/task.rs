//! Task tree definitions and feasibility aggregation.
//!
//! Tasks form an owning tree (`subtasks`); parent links are never stored on
//! the task itself. A [`Plan`] keeps a flat `child id -> parent id` index
//! that is rebuilt after deserialization or any structural mutation, so the
//! persisted shape stays acyclic.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::types::{CommandInput, CommandRecord};

/// Opaque task identifier, unique within a plan.
pub type TaskId = String;

/// Floor applied to impact and feasibility before aggregation so zero scores
/// cannot collapse the weighted product.
pub const SCORE_EPSILON: f64 = 1e-4;

/// Cumulative-impact threshold below which a task is negligible for
/// planning-completeness checks.
pub const IMPACT_THRESHOLD: f64 = 0.1;

/// Classification of a task by how it can be carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskCategory {
    /// Achievable by executing a single resolved command.
    Discrete,
    /// Achievable by a synthesized combination of available commands.
    Sequence,
    /// Requires human or physical intervention; cannot be automated.
    Manual,
    /// Multi-faceted; must be expanded into subtasks before execution.
    Complex,
}

impl std::fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Discrete => "discrete",
            Self::Sequence => "sequence",
            Self::Manual => "manual",
            Self::Complex => "complex",
        };
        f.write_str(label)
    }
}

/// One node of the task tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub objective: String,
    pub category: TaskCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<CommandInput>,
    pub impact: f64,
    #[serde(default)]
    pub impact_rationale: String,
    pub feasibility: f64,
    #[serde(default)]
    pub feasibility_rationale: String,
    #[serde(default = "default_execution_order")]
    pub execution_order: i64,
    #[serde(default)]
    pub subtasks: Vec<Task>,
}

fn default_execution_order() -> i64 {
    1
}

impl Task {
    /// Create a task with neutral scores.
    pub fn new(id: impl Into<TaskId>, objective: impl Into<String>, category: TaskCategory) -> Self {
        Self {
            id: id.into(),
            objective: objective.into(),
            category,
            command: None,
            impact: 1.0,
            impact_rationale: String::new(),
            feasibility: 1.0,
            feasibility_rationale: String::new(),
            execution_order: 1,
            subtasks: Vec::new(),
        }
    }

    /// Create a fresh root task for an objective: complex, full impact,
    /// not yet expanded.
    pub fn root(objective: impl Into<String>) -> Self {
        Self::new(
            uuid::Uuid::new_v4().to_string(),
            objective,
            TaskCategory::Complex,
        )
    }

    pub fn with_command(mut self, command: CommandInput) -> Self {
        self.command = Some(command);
        self
    }

    pub fn with_execution_order(mut self, order: i64) -> Self {
        self.execution_order = order;
        self
    }

    pub fn with_impact(mut self, impact: f64) -> Self {
        self.impact = impact;
        self
    }

    pub fn with_feasibility(mut self, feasibility: f64) -> Self {
        self.feasibility = feasibility;
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.subtasks.is_empty()
    }

    /// Clamp scores into [0, 1], recursively. Applied to loaded plans and
    /// planner output before anything aggregates over them.
    pub fn sanitize_scores(&mut self) {
        self.impact = self.impact.clamp(0.0, 1.0);
        self.feasibility = self.feasibility.clamp(0.0, 1.0);
        for subtask in &mut self.subtasks {
            subtask.sanitize_scores();
        }
    }

    fn find(&self, id: &str) -> Option<&Task> {
        if self.id == id {
            return Some(self);
        }
        self.subtasks.iter().find_map(|subtask| subtask.find(id))
    }

    fn find_mut(&mut self, id: &str) -> Option<&mut Task> {
        if self.id == id {
            return Some(self);
        }
        self.subtasks
            .iter_mut()
            .find_map(|subtask| subtask.find_mut(id))
    }

    fn collect_leaves<'a>(&'a self, leaves: &mut Vec<&'a Task>) {
        if self.is_leaf() {
            leaves.push(self);
        } else {
            for subtask in &self.subtasks {
                subtask.collect_leaves(leaves);
            }
        }
    }
}

/// Weighted geometric mean of child feasibility, weighted by impact:
/// `(prod feasibility_i ^ impact_i) ^ (1 / sum impact_i)`.
///
/// Both factors are floored at [`SCORE_EPSILON`]; an empty child list is
/// fully feasible.
pub fn aggregate_feasibility(tasks: &[Task]) -> f64 {
    if tasks.is_empty() {
        return 1.0;
    }

    let mut weighted_product = 1.0_f64;
    let mut total_impact = 0.0_f64;

    for task in tasks {
        let impact = task.impact.max(SCORE_EPSILON);
        let feasibility = task.feasibility.max(SCORE_EPSILON);
        weighted_product *= feasibility.powf(impact);
        total_impact += impact;
    }

    weighted_product.powf(1.0 / total_impact)
}

/// Mutable execution state of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanState {
    pub current_task_id: TaskId,
    #[serde(default)]
    pub completed_tasks: BTreeSet<TaskId>,
}

impl PlanState {
    pub fn new(current_task_id: impl Into<TaskId>) -> Self {
        Self {
            current_task_id: current_task_id.into(),
            completed_tasks: BTreeSet::new(),
        }
    }
}

/// A named task tree plus its execution state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub name: String,
    pub task: Task,
    pub current_state: PlanState,
    /// Child id -> parent id, derived from the subtasks tree. Never
    /// persisted; callers must [`rebuild_links`](Self::rebuild_links) after
    /// deserializing before any traversal.
    #[serde(skip)]
    parent_of: HashMap<TaskId, TaskId>,
}

impl Plan {
    /// Create a plan rooted at the given task, with links built and the
    /// cursor on the root.
    pub fn new(name: impl Into<String>, task: Task) -> Self {
        let state = PlanState::new(task.id.clone());
        Self::with_state(name, task, state)
    }

    /// Create a plan with pre-existing execution state (e.g. reloaded).
    pub fn with_state(name: impl Into<String>, task: Task, current_state: PlanState) -> Self {
        let mut plan = Self {
            name: name.into(),
            task,
            current_state,
            parent_of: HashMap::new(),
        };
        plan.rebuild_links();
        plan
    }

    /// Rebuild the parent index from the subtasks tree. Must be called after
    /// deserialization and after any structural mutation of the tree.
    pub fn rebuild_links(&mut self) {
        self.parent_of.clear();
        fn walk(task: &Task, parent_of: &mut HashMap<TaskId, TaskId>) {
            for subtask in &task.subtasks {
                parent_of.insert(subtask.id.clone(), task.id.clone());
                walk(subtask, parent_of);
            }
        }
        walk(&self.task, &mut self.parent_of);
    }

    /// Depth-first lookup by id.
    pub fn find_task(&self, id: &str) -> Option<&Task> {
        self.task.find(id)
    }

    /// Depth-first mutable lookup by id.
    pub fn find_task_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.task.find_mut(id)
    }

    /// Parent id of a task, if it has one.
    pub fn parent_id(&self, id: &str) -> Option<&TaskId> {
        self.parent_of.get(id)
    }

    /// Replace a task's subtasks and refresh the parent index.
    pub fn attach_subtasks(&mut self, id: &str, subtasks: Vec<Task>) -> bool {
        let Some(task) = self.task.find_mut(id) else {
            return false;
        };
        task.subtasks = subtasks;
        self.rebuild_links();
        true
    }

    /// A leaf is complete iff it is not complex and recorded as completed;
    /// an internal task is complete iff every child is.
    pub fn is_complete(&self, task: &Task) -> bool {
        if task.is_leaf() {
            if task.category == TaskCategory::Complex {
                // unexpanded complex tasks always have work left
                return false;
            }
            return self.current_state.completed_tasks.contains(&task.id);
        }
        self.task_is_complete_recursive(task)
    }

    fn task_is_complete_recursive(&self, task: &Task) -> bool {
        task.subtasks.iter().all(|subtask| self.is_complete(subtask))
    }

    /// Whether the whole tree is complete.
    pub fn is_plan_complete(&self) -> bool {
        self.is_complete(&self.task)
    }

    /// Record a successful non-complex task execution.
    pub fn mark_completed(&mut self, id: impl Into<TaskId>) {
        self.current_state.completed_tasks.insert(id.into());
    }

    /// Product of the task's impact with every ancestor's impact.
    pub fn cumulative_impact(&self, id: &str) -> Option<f64> {
        let mut impact = self.find_task(id)?.impact;
        let mut cursor = id.to_string();
        while let Some(parent_id) = self.parent_of.get(&cursor) {
            if let Some(parent) = self.find_task(parent_id) {
                impact *= parent.impact;
            }
            cursor = parent_id.clone();
        }
        Some(impact)
    }

    /// Whether a task's cumulative impact falls below [`IMPACT_THRESHOLD`].
    /// Used by planning-completeness checks, never by execution.
    pub fn is_below_impact_threshold(&self, id: &str) -> bool {
        self.cumulative_impact(id)
            .map(|impact| impact < IMPACT_THRESHOLD)
            .unwrap_or(false)
    }

    /// A task is fully planned when every leaf under it carries a command,
    /// ignoring branches whose cumulative impact is negligible.
    pub fn is_fully_planned(&self, task: &Task) -> bool {
        if task.is_leaf() {
            return task.command.is_some();
        }
        task.subtasks
            .iter()
            .all(|subtask| self.is_fully_planned(subtask) || self.is_below_impact_threshold(&subtask.id))
    }

    /// Walk down the tree picking the least feasible not-fully-planned
    /// subtask at each level. Returns `None` when planning is finished.
    pub fn least_feasible_unplanned(&self) -> Option<&Task> {
        if self.is_fully_planned(&self.task) {
            return None;
        }

        let mut selected = &self.task;
        let mut level = &self.task.subtasks;
        while !level.is_empty() {
            let mut best: Option<&Task> = None;
            for subtask in level {
                if self.is_fully_planned(subtask) {
                    continue;
                }
                if best.map(|b| subtask.feasibility < b.feasibility).unwrap_or(true) {
                    best = Some(subtask);
                }
            }
            match best {
                Some(task) => {
                    selected = task;
                    level = &task.subtasks;
                }
                None => break,
            }
        }
        Some(selected)
    }

    /// Render the indented objective outline handed to the planner as tree
    /// context.
    pub fn render_tree(&self) -> String {
        let mut lines = vec![
            format!("Plan: {}", self.name),
            self.task.objective.clone(),
        ];

        fn walk(subtasks: &[Task], prefix: &str, depth: usize, lines: &mut Vec<String>) {
            for (index, subtask) in subtasks.iter().enumerate() {
                let label = if depth > 1 {
                    format!("{}.{}", prefix, index + 1)
                } else {
                    format!("{}", index + 1)
                };
                let annotation = match &subtask.command {
                    Some(command) => command.text().to_string(),
                    None => subtask.category.to_string(),
                };
                lines.push(format!(
                    "{}{}. {} ({})",
                    " ".repeat(depth),
                    label,
                    subtask.objective,
                    annotation
                ));
                if !subtask.subtasks.is_empty() {
                    walk(&subtask.subtasks, &label, depth + 1, lines);
                }
            }
        }

        walk(&self.task.subtasks, "", 1, &mut lines);
        lines.join("\n")
    }

    /// Convert a fully planned tree into a reusable sequence command: the
    /// leaf commands in tree order under the plan's name.
    pub fn as_command_record(&self) -> Result<CommandRecord, String> {
        let mut leaves = Vec::new();
        self.task.collect_leaves(&mut leaves);

        let mut sequence = Vec::with_capacity(leaves.len());
        for leaf in leaves {
            match &leaf.command {
                Some(command) => sequence.push(command.clone()),
                None => {
                    return Err(format!(
                        "no command found for subtask \"{}\"",
                        leaf.objective
                    ))
                }
            }
        }

        Ok(CommandRecord {
            format: self.name.clone(),
            description: Some(self.task.objective.clone()),
            sequence,
            alternative_sequence: None,
            examples: Vec::new(),
            requires: None,
        })
    }
}
