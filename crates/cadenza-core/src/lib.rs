//! # Cadenza Core
//!
//! Core abstractions and deterministic logic for the Cadenza automation
//! runtime.
//!
//! This crate contains:
//! - CommandInput / Format / Task / Plan definitions
//! - Pattern matching and argument extraction
//! - The variable store and the recursive sequence interpreter
//! - Flow-control constructs (loops, conditionals, try)
//! - The task-tree model, feasibility aggregation and the plan executor
//!
//! This crate does NOT care about:
//! - How free text is translated into commands (the resolver seam)
//! - How objectives are decomposed (the planner seam)
//! - Where command packs and plans are stored on disk
//! - How outcomes are rendered to a user

pub mod command;
pub mod engine;
pub mod error;
pub mod eval;
pub mod flow;
pub mod interpreter;
pub mod notify;
pub mod pattern;
pub mod planner;
pub mod resolver;
pub mod store;
pub mod types;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::command::{
        CommandKind, CommandRegistry, HandlerContext, InterruptFlag, NativeCommand,
        RegisteredCommand,
    };
    pub use crate::engine::{PlanExecutor, PlanExecutionError, PlanOutcome, DEFAULT_MAX_ATTEMPTS};
    pub use crate::error::CommandError;
    pub use crate::eval::{EvalError, EvalValue, ExpressionEvaluator, NullEvaluator};
    pub use crate::flow::{flow_formats, FlowKind};
    pub use crate::interpreter::Interpreter;
    pub use crate::notify::{NotificationSink, TracingNotifier};
    pub use crate::pattern::{extract_args, matching_formats, placeholder_names};
    pub use crate::planner::{PlanError, Planner, TaskSeed};
    pub use crate::resolver::{CommandResolver, ResolveError};
    pub use crate::store::VariableStore;
    pub use crate::types::{
        aggregate_feasibility, ArgMap, CommandExample, CommandInput, CommandRecord,
        CommandRequirements, CommandResult, Format, Plan, PlanState, Task, TaskCategory, TaskId,
    };
}

// Re-export key types at crate root
pub use command::{CommandRegistry, HandlerContext, InterruptFlag, NativeCommand};
pub use engine::{PlanExecutor, PlanOutcome};
pub use error::CommandError;
pub use eval::{EvalValue, ExpressionEvaluator};
pub use interpreter::Interpreter;
pub use notify::NotificationSink;
pub use planner::{PlanError, Planner, TaskSeed};
pub use resolver::CommandResolver;
pub use store::VariableStore;
pub use types::{
    CommandInput, CommandRecord, CommandResult, Format, Plan, Task, TaskCategory, TaskId,
};
