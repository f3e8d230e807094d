//! Expression evaluation seam.
//!
//! Conditions inside `if` and `while` are delegated to an external
//! arithmetic/relational evaluator; the core only defines the contract and
//! the truthiness coercion applied to non-boolean outcomes.

use thiserror::Error;

/// Evaluation errors.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("failed to evaluate condition \"{expr}\": {reason}")]
    Evaluation { expr: String, reason: String },
}

impl EvalError {
    pub fn new(expr: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Evaluation {
            expr: expr.into(),
            reason: reason.into(),
        }
    }
}

/// Result of evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl EvalValue {
    /// Coerce to a boolean: numbers are zero/nonzero, text is empty/nonempty.
    pub fn truthy(&self) -> bool {
        match self {
            Self::Bool(value) => *value,
            Self::Number(value) => *value != 0.0,
            Self::Text(value) => !value.is_empty(),
        }
    }
}

impl std::fmt::Display for EvalValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::Number(value) => {
                if value.fract() == 0.0 && value.is_finite() {
                    write!(f, "{}", *value as i64)
                } else {
                    write!(f, "{value}")
                }
            }
            Self::Text(value) => write!(f, "{value}"),
        }
    }
}

/// External arithmetic/relational expression evaluator.
pub trait ExpressionEvaluator: Send + Sync {
    fn evaluate(&self, expr: &str) -> Result<EvalValue, EvalError>;
}

/// Default evaluator for sessions that never configure one; every condition
/// fails with a diagnostic rather than panicking.
pub struct NullEvaluator;

impl ExpressionEvaluator for NullEvaluator {
    fn evaluate(&self, expr: &str) -> Result<EvalValue, EvalError> {
        Err(EvalError::new(expr, "no expression evaluator configured"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness_coercion() {
        assert!(EvalValue::Bool(true).truthy());
        assert!(!EvalValue::Bool(false).truthy());
        assert!(EvalValue::Number(2.0).truthy());
        assert!(!EvalValue::Number(0.0).truthy());
        assert!(EvalValue::Text("x".to_string()).truthy());
        assert!(!EvalValue::Text(String::new()).truthy());
    }

    #[test]
    fn test_display_renders_whole_numbers_without_fraction() {
        assert_eq!(EvalValue::Number(4.0).to_string(), "4");
        assert_eq!(EvalValue::Number(1.5).to_string(), "1.5");
        assert_eq!(EvalValue::Bool(true).to_string(), "true");
    }

    #[test]
    fn test_null_evaluator_reports_missing_configuration() {
        let error = NullEvaluator.evaluate("1 < 2").unwrap_err();
        assert!(error.to_string().contains("no expression evaluator"));
    }
}
