//! Core type definitions for Cadenza
//!
//! This module contains the fundamental types used throughout the system:
//! - CommandInput: one node of the program tree (literal or block)
//! - Format / CommandRecord: declarative command templates
//! - CommandResult: the unit of the execution trace
//! - Task / Plan: the hierarchical task model

mod command;
mod task;

pub use command::{
    ArgMap, CommandExample, CommandInput, CommandRecord, CommandRequirements, CommandResult,
    Format,
};
pub use task::{
    aggregate_feasibility, Plan, PlanState, Task, TaskCategory, TaskId, IMPACT_THRESHOLD,
    SCORE_EPSILON,
};
