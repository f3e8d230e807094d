//! Plan-file loading and saving.
//!
//! Plans persist as nested task trees; parent links are never written and
//! are rebuilt when a plan is adopted at load time.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use cadenza_core::types::{Plan, PlanState, Task};

use crate::{namespaced, ConfigError};

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlanPack {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    namespace: Option<String>,
    plans: Vec<PlanRecord>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlanRecord {
    name: String,
    task: Task,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    current_state: Option<PlanState>,
}

fn collect_duplicate_id(task: &Task, seen: &mut HashSet<String>) -> Option<String> {
    if !seen.insert(task.id.clone()) {
        return Some(task.id.clone());
    }
    task.subtasks
        .iter()
        .find_map(|subtask| collect_duplicate_id(subtask, seen))
}

/// Parse one plan-pack document into runnable plans: names are namespaced,
/// scores clamped, parent links rebuilt, and execution state defaulted to
/// the root task.
pub fn parse_plan_pack(content: &str) -> Result<Vec<Plan>, ConfigError> {
    let pack: PlanPack = serde_json::from_str(content)?;
    if pack.plans.is_empty() {
        return Err(ConfigError::Invalid("no plans found".to_string()));
    }

    let namespace = pack.namespace.as_deref();
    let mut plans = Vec::with_capacity(pack.plans.len());
    for record in pack.plans {
        if record.name.trim().is_empty() {
            return Err(ConfigError::Invalid("plan name is empty".to_string()));
        }
        if let Some(duplicate) = collect_duplicate_id(&record.task, &mut HashSet::new()) {
            return Err(ConfigError::Invalid(format!(
                "plan \"{}\" has duplicate task id '{duplicate}'",
                record.name
            )));
        }

        let mut task = record.task;
        task.sanitize_scores();

        let name = namespaced(namespace, &record.name);
        let plan = match record.current_state {
            Some(state) => {
                let mut plan = Plan::with_state(name, task, state);
                if plan.find_task(&plan.current_state.current_task_id).is_none() {
                    tracing::warn!(
                        plan = %plan.name,
                        task_id = %plan.current_state.current_task_id,
                        "current task not in tree, resetting cursor to root"
                    );
                    plan.current_state.current_task_id = plan.task.id.clone();
                }
                plan
            }
            None => Plan::new(name, task),
        };
        plans.push(plan);
    }
    Ok(plans)
}

/// Load every plan file in a directory. Missing directories and malformed
/// files are diagnostics, never fatal.
pub fn load_plans(dir: &Path) -> Vec<Plan> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(error) => {
            tracing::warn!(dir = %dir.display(), %error, "plans directory not found");
            return Vec::new();
        }
    };

    let mut plans = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(error) => {
                tracing::warn!(file = %path.display(), %error, "unable to read plan file");
                continue;
            }
        };
        match parse_plan_pack(&content) {
            Ok(mut parsed) => {
                tracing::info!(file = %path.display(), count = parsed.len(), "imported plans");
                plans.append(&mut parsed);
            }
            Err(error) => {
                tracing::warn!(file = %path.display(), %error, "skipping invalid plan file");
            }
        }
    }
    plans
}

/// Save plans to a single pack file. Parent links are derived state and are
/// never serialized.
pub fn save_plans(plans: &[Plan], path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let pack = PlanPack {
        namespace: None,
        plans: plans
            .iter()
            .map(|plan| PlanRecord {
                name: plan.name.clone(),
                task: plan.task.clone(),
                current_state: Some(plan.current_state.clone()),
            })
            .collect(),
    };
    let content = serde_json::to_string_pretty(&pack)?;
    fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadenza_core::types::TaskCategory;

    fn plan_json() -> &'static str {
        r#"{
            "namespace": "demo",
            "plans": [
                {
                    "name": "fish poem",
                    "task": {
                        "id": "root",
                        "objective": "write and save a fish poem",
                        "category": "complex",
                        "impact": 1.0,
                        "feasibility": 1.4,
                        "subtasks": [
                            {
                                "id": "write",
                                "objective": "write the poem",
                                "category": "discrete",
                                "command": "console log a fish poem",
                                "impact": 0.6,
                                "feasibility": 0.9,
                                "executionOrder": 1
                            }
                        ]
                    }
                }
            ]
        }"#
    }

    #[test]
    fn test_parse_plan_defaults_state_and_rebuilds_links() {
        let plans = parse_plan_pack(plan_json()).unwrap();
        assert_eq!(plans.len(), 1);
        let plan = &plans[0];

        assert_eq!(plan.name, "demo:fish poem");
        assert_eq!(plan.current_state.current_task_id, "root");
        assert!(plan.current_state.completed_tasks.is_empty());
        assert_eq!(plan.parent_id("write").map(String::as_str), Some("root"));
        // out-of-range feasibility was clamped on load
        assert_eq!(plan.task.feasibility, 1.0);
        assert_eq!(
            plan.find_task("write").unwrap().category,
            TaskCategory::Discrete
        );
    }

    #[test]
    fn test_parse_plan_resets_unknown_cursor_to_root() {
        let content = r#"{
            "plans": [
                {
                    "name": "p",
                    "task": { "id": "root", "objective": "o", "category": "complex", "impact": 1, "feasibility": 1 },
                    "currentState": { "currentTaskId": "gone", "completedTasks": [] }
                }
            ]
        }"#;
        let plans = parse_plan_pack(content).unwrap();
        assert_eq!(plans[0].current_state.current_task_id, "root");
    }

    #[test]
    fn test_parse_plan_rejects_duplicate_task_ids() {
        let content = r#"{
            "plans": [
                {
                    "name": "p",
                    "task": {
                        "id": "root", "objective": "o", "category": "complex",
                        "impact": 1, "feasibility": 1,
                        "subtasks": [
                            { "id": "root", "objective": "again", "category": "manual", "impact": 1, "feasibility": 1 }
                        ]
                    }
                }
            ]
        }"#;
        assert!(matches!(
            parse_plan_pack(content).unwrap_err(),
            ConfigError::Invalid(_)
        ));
    }

    #[test]
    fn test_save_and_reload_round_trip_preserves_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("default.json");

        let mut plans = parse_plan_pack(plan_json()).unwrap();
        plans[0].mark_completed("write");
        save_plans(&plans, &path).unwrap();

        let reloaded = load_plans(dir.path());
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded[0].name, "demo:fish poem");
        assert!(reloaded[0]
            .current_state
            .completed_tasks
            .contains("write"));
        // links usable immediately after load
        assert_eq!(
            reloaded[0].parent_id("write").map(String::as_str),
            Some("root")
        );
    }

    #[test]
    fn test_load_skips_malformed_plan_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.json"), "{").unwrap();
        std::fs::write(
            dir.path().join("good.json"),
            r#"{ "plans": [ { "name": "ok", "task": { "id": "r", "objective": "o", "category": "complex", "impact": 1, "feasibility": 1 } } ] }"#,
        )
        .unwrap();

        let plans = load_plans(dir.path());
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].name, "ok");
    }
}
