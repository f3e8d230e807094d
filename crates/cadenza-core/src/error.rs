//! Interpreter-level error taxonomy.
//!
//! Every variant eventually surfaces as a failing [`CommandResult`] at the
//! point of failure; callers above the interpreter never see these as `Err`.
//!
//! [`CommandResult`]: crate::types::CommandResult

use thiserror::Error;

use crate::eval::EvalError;

/// Errors raised while resolving or executing a command sequence.
#[derive(Debug, Error)]
pub enum CommandError {
    /// No matching template, an ambiguous match, or an argument layout that
    /// cannot be parsed.
    #[error("could not parse \"{input}\": {reason}")]
    Parse { input: String, reason: String },

    /// A `${name}` reference with no bound value in the variable store.
    #[error("no value bound for ${{{name}}}")]
    MissingVariable { name: String },

    /// A native handler reported failure, or a resolved command was missing
    /// the parts it needs to run.
    #[error("command execution failed: {0}")]
    Execution(String),

    /// A condition failed to evaluate or produced a non-coercible value.
    #[error(transparent)]
    Evaluation(#[from] EvalError),

    /// The cooperative cancellation flag was observed before dispatch.
    #[error("command interrupted during execution")]
    Interrupted,
}

impl CommandError {
    /// Convenience constructor for parse failures.
    pub fn parse(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            input: input.into(),
            reason: reason.into(),
        }
    }
}
