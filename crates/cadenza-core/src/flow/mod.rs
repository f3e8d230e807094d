//! Flow-control constructs.
//!
//! A closed set of constructs addressed by template string. Each handler is
//! a pure function over the extracted arguments and two continuations: one
//! running the attached sequence, one running the attached alternative (or
//! trivially succeeding when none was supplied). Handlers contribute
//! informational results to the trace alongside the body's results, and
//! stop at the first failing iteration.

use futures::future::BoxFuture;
use tokio::sync::RwLock;

use crate::eval::ExpressionEvaluator;
use crate::store::VariableStore;
use crate::types::{ArgMap, CommandResult};

/// Variable bound per iteration by `for each line of file`.
pub const LINE_OF_FILE_VARIABLE: &str = "lineOfFile";

/// Variable bound per iteration by `for each line of string`.
pub const CURRENT_LINE_VARIABLE: &str = "currentLine";

/// The closed set of flow-control constructs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowKind {
    Repeat,
    RepeatWithIndex,
    ForEachItem,
    ForEachFileLine,
    ForEachStringLine,
    If,
    While,
    Try,
}

impl FlowKind {
    pub const ALL: [FlowKind; 8] = [
        FlowKind::Repeat,
        FlowKind::RepeatWithIndex,
        FlowKind::ForEachItem,
        FlowKind::ForEachFileLine,
        FlowKind::ForEachStringLine,
        FlowKind::If,
        FlowKind::While,
        FlowKind::Try,
    ];

    /// The template string this construct answers to.
    pub fn format(self) -> &'static str {
        match self {
            FlowKind::Repeat => "repeat ${count} times",
            FlowKind::RepeatWithIndex => "repeat ${count} times with index ${index}",
            FlowKind::ForEachItem => "for each ${item} in ${list}",
            FlowKind::ForEachFileLine => "for each line of file ${filePath}",
            FlowKind::ForEachStringLine => "for each line of string ${text}",
            FlowKind::If => "if ${condition}",
            FlowKind::While => "while ${condition}",
            FlowKind::Try => "try",
        }
    }

    pub fn from_format(format: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.format() == format)
    }
}

/// Every flow-control template string.
pub fn flow_formats() -> Vec<&'static str> {
    FlowKind::ALL.iter().map(|kind| kind.format()).collect()
}

/// Session state a construct may touch: the variable store for loop
/// bindings and condition expansion, and the external evaluator.
pub(crate) struct FlowContext<'a> {
    pub store: &'a RwLock<VariableStore>,
    pub evaluator: &'a dyn ExpressionEvaluator,
}

fn ended_in_failure(results: &[CommandResult]) -> bool {
    results.last().map(CommandResult::is_failure).unwrap_or(false)
}

/// Dispatch a construct.
pub(crate) async fn run_construct<'a, F, G>(
    kind: FlowKind,
    args: &ArgMap,
    ctx: &FlowContext<'_>,
    run_sequence: F,
    run_alternative: G,
) -> Vec<CommandResult>
where
    F: Fn() -> BoxFuture<'a, Vec<CommandResult>> + Send + Sync,
    G: Fn() -> BoxFuture<'a, Vec<CommandResult>> + Send + Sync,
{
    match kind {
        FlowKind::Repeat => repeat(args, ctx, run_sequence, false).await,
        FlowKind::RepeatWithIndex => repeat(args, ctx, run_sequence, true).await,
        FlowKind::ForEachItem => for_each_item(args, ctx, run_sequence).await,
        FlowKind::ForEachFileLine => for_each_file_line(args, ctx, run_sequence).await,
        FlowKind::ForEachStringLine => for_each_string_line(args, ctx, run_sequence).await,
        FlowKind::If => if_condition(args, ctx, run_sequence, run_alternative).await,
        FlowKind::While => while_condition(args, ctx, run_sequence).await,
        FlowKind::Try => try_catch(run_sequence, run_alternative).await,
    }
}

async fn repeat<'a, F>(
    args: &ArgMap,
    ctx: &FlowContext<'_>,
    run_sequence: F,
    with_index: bool,
) -> Vec<CommandResult>
where
    F: Fn() -> BoxFuture<'a, Vec<CommandResult>>,
{
    let Some(count_text) = args.get("count") else {
        return vec![CommandResult::fail("no repeat count provided")];
    };
    let Ok(count) = count_text.parse::<u64>() else {
        return vec![CommandResult::fail(format!(
            "invalid number of times to repeat: {count_text}"
        ))];
    };
    let index_name = if with_index {
        match args.get("index") {
            Some(name) => Some(name.clone()),
            None => return vec![CommandResult::fail("no index variable name provided")],
        }
    } else {
        None
    };

    let mut results = vec![CommandResult::ok_with(format!(
        "repeating sequence {count} times"
    ))];
    for iteration in 0..count {
        if let Some(name) = &index_name {
            ctx.store.write().await.set(name, iteration.to_string());
        }
        let outcome = run_sequence().await;
        let failed = ended_in_failure(&outcome);
        results.extend(outcome);
        if failed {
            return results;
        }
    }
    results
}

async fn for_each_item<'a, F>(
    args: &ArgMap,
    ctx: &FlowContext<'_>,
    run_sequence: F,
) -> Vec<CommandResult>
where
    F: Fn() -> BoxFuture<'a, Vec<CommandResult>>,
{
    let (Some(item_name), Some(list_name)) = (args.get("item"), args.get("list")) else {
        return vec![CommandResult::fail("no list variable or item variable provided")];
    };

    let list_value = ctx.store.read().await.get(list_name).map(str::to_string);
    let Some(list_value) = list_value else {
        return vec![CommandResult::fail(format!(
            "variable ${{{list_name}}} not found"
        ))];
    };

    let items: Vec<String> = list_value
        .split(',')
        .map(|item| item.trim().to_string())
        .collect();

    let mut results = vec![CommandResult::ok_with(format!(
        "iterating over {} items",
        items.len()
    ))];
    for item in items {
        ctx.store.write().await.set(item_name, item);
        let outcome = run_sequence().await;
        let failed = ended_in_failure(&outcome);
        results.extend(outcome);
        if failed {
            return results;
        }
    }
    results
}

async fn for_each_file_line<'a, F>(
    args: &ArgMap,
    ctx: &FlowContext<'_>,
    run_sequence: F,
) -> Vec<CommandResult>
where
    F: Fn() -> BoxFuture<'a, Vec<CommandResult>>,
{
    let Some(path) = args.get("filePath") else {
        return vec![CommandResult::fail("no file path specified")];
    };

    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(error) => {
            return vec![CommandResult::fail(format!(
                "unable to read file {path}: {error}"
            ))]
        }
    };

    iterate_lines(&contents, LINE_OF_FILE_VARIABLE, ctx, run_sequence).await
}

async fn for_each_string_line<'a, F>(
    args: &ArgMap,
    ctx: &FlowContext<'_>,
    run_sequence: F,
) -> Vec<CommandResult>
where
    F: Fn() -> BoxFuture<'a, Vec<CommandResult>>,
{
    let Some(text) = args.get("text") else {
        return vec![CommandResult::fail("no source text provided")];
    };

    // quoted values carry the two-character newline escape
    let contents = text.replace("\\n", "\n");
    iterate_lines(&contents, CURRENT_LINE_VARIABLE, ctx, run_sequence).await
}

async fn iterate_lines<'a, F>(
    contents: &str,
    variable: &str,
    ctx: &FlowContext<'_>,
    run_sequence: F,
) -> Vec<CommandResult>
where
    F: Fn() -> BoxFuture<'a, Vec<CommandResult>>,
{
    let lines: Vec<&str> = contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect();

    let mut results = vec![CommandResult::ok_with(format!(
        "iterating over {} lines",
        lines.len()
    ))];
    for line in lines {
        ctx.store.write().await.set(variable, line);
        let outcome = run_sequence().await;
        let failed = ended_in_failure(&outcome);
        results.extend(outcome);
        if failed {
            return results;
        }
    }
    results
}

async fn if_condition<'a, F, G>(
    args: &ArgMap,
    ctx: &FlowContext<'_>,
    run_sequence: F,
    run_alternative: G,
) -> Vec<CommandResult>
where
    F: Fn() -> BoxFuture<'a, Vec<CommandResult>>,
    G: Fn() -> BoxFuture<'a, Vec<CommandResult>>,
{
    let Some(condition) = args.get("condition") else {
        return vec![CommandResult::fail("no condition provided")];
    };

    let expanded = ctx.store.read().await.expand_into_str(condition);
    let value = match ctx.evaluator.evaluate(&expanded) {
        Ok(value) => value,
        Err(error) => return vec![CommandResult::fail(error.to_string())],
    };

    let truthy = value.truthy();
    let mut results = vec![CommandResult::ok_with(format!(
        "condition \"{expanded}\" evaluated to {value}"
    ))];
    let outcome = if truthy {
        run_sequence().await
    } else {
        run_alternative().await
    };
    results.extend(outcome);
    results
}

async fn while_condition<'a, F>(
    args: &ArgMap,
    ctx: &FlowContext<'_>,
    run_sequence: F,
) -> Vec<CommandResult>
where
    F: Fn() -> BoxFuture<'a, Vec<CommandResult>>,
{
    let Some(condition) = args.get("condition") else {
        return vec![CommandResult::fail("no condition provided")];
    };

    let mut results = Vec::new();
    loop {
        // re-expand before every evaluation so mutated variables are seen
        let expanded = ctx.store.read().await.expand_into_str(condition);
        let value = match ctx.evaluator.evaluate(&expanded) {
            Ok(value) => value,
            Err(error) => {
                results.push(CommandResult::fail(error.to_string()));
                return results;
            }
        };
        let truthy = value.truthy();
        results.push(CommandResult::ok_with(format!(
            "condition \"{expanded}\" evaluated to {value}"
        )));
        if !truthy {
            return results;
        }

        let outcome = run_sequence().await;
        let failed = ended_in_failure(&outcome);
        results.extend(outcome);
        if failed {
            return results;
        }
    }
}

async fn try_catch<'a, F, G>(run_sequence: F, run_alternative: G) -> Vec<CommandResult>
where
    F: Fn() -> BoxFuture<'a, Vec<CommandResult>>,
    G: Fn() -> BoxFuture<'a, Vec<CommandResult>>,
{
    let mut results = run_sequence().await;
    if !ended_in_failure(&results) {
        return results;
    }

    tracing::debug!("primary sequence failed, running alternative sequence");
    results.push(CommandResult::ok_with(
        "primary sequence failed, running alternative sequence",
    ));
    results.extend(run_alternative().await);
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::eval::{EvalError, EvalValue};

    struct CmpEvaluator;

    impl ExpressionEvaluator for CmpEvaluator {
        fn evaluate(&self, expr: &str) -> Result<EvalValue, EvalError> {
            let expr = expr.trim();
            match expr {
                "true" => return Ok(EvalValue::Bool(true)),
                "false" => return Ok(EvalValue::Bool(false)),
                _ => {}
            }
            for op in ["<=", ">=", "==", "!=", "<", ">"] {
                if let Some((lhs, rhs)) = expr.split_once(op) {
                    let lhs: f64 = lhs
                        .trim()
                        .parse()
                        .map_err(|_| EvalError::new(expr, "bad left operand"))?;
                    let rhs: f64 = rhs
                        .trim()
                        .parse()
                        .map_err(|_| EvalError::new(expr, "bad right operand"))?;
                    let outcome = match op {
                        "<=" => lhs <= rhs,
                        ">=" => lhs >= rhs,
                        "==" => lhs == rhs,
                        "!=" => lhs != rhs,
                        "<" => lhs < rhs,
                        ">" => lhs > rhs,
                        _ => unreachable!(),
                    };
                    return Ok(EvalValue::Bool(outcome));
                }
            }
            expr.parse::<f64>()
                .map(EvalValue::Number)
                .map_err(|_| EvalError::new(expr, "unsupported expression"))
        }
    }

    fn args(pairs: &[(&str, &str)]) -> ArgMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn counting_runner(
        counter: Arc<AtomicUsize>,
        outcome: Vec<CommandResult>,
    ) -> impl Fn() -> BoxFuture<'static, Vec<CommandResult>> {
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            let outcome = outcome.clone();
            Box::pin(async move { outcome })
        }
    }

    fn never_runner() -> impl Fn() -> BoxFuture<'static, Vec<CommandResult>> {
        || Box::pin(async { panic!("continuation must not run") })
    }

    fn success_runner() -> impl Fn() -> BoxFuture<'static, Vec<CommandResult>> {
        || Box::pin(async { vec![CommandResult::ok()] })
    }

    #[test]
    fn test_repeat_invokes_body_exactly_n_times() {
        tokio_test::block_on(async {
            let store = RwLock::new(VariableStore::new());
            let ctx = FlowContext {
                store: &store,
                evaluator: &CmpEvaluator,
            };
            let calls = Arc::new(AtomicUsize::new(0));

            let results = run_construct(
                FlowKind::Repeat,
                &args(&[("count", "3")]),
                &ctx,
                counting_runner(calls.clone(), vec![CommandResult::ok()]),
                never_runner(),
            )
            .await;

            assert_eq!(calls.load(Ordering::SeqCst), 3);
            assert!(!ended_in_failure(&results));
        });
    }

    #[test]
    fn test_repeat_rejects_non_numeric_count() {
        tokio_test::block_on(async {
            let store = RwLock::new(VariableStore::new());
            let ctx = FlowContext {
                store: &store,
                evaluator: &CmpEvaluator,
            };

            let results = run_construct(
                FlowKind::Repeat,
                &args(&[("count", "lots")]),
                &ctx,
                never_runner(),
                never_runner(),
            )
            .await;

            assert!(ended_in_failure(&results));
        });
    }

    #[test]
    fn test_repeat_stops_at_first_failing_iteration() {
        tokio_test::block_on(async {
            let store = RwLock::new(VariableStore::new());
            let ctx = FlowContext {
                store: &store,
                evaluator: &CmpEvaluator,
            };
            let calls = Arc::new(AtomicUsize::new(0));

            let results = run_construct(
                FlowKind::Repeat,
                &args(&[("count", "5")]),
                &ctx,
                counting_runner(calls.clone(), vec![CommandResult::fail("boom")]),
                never_runner(),
            )
            .await;

            assert_eq!(calls.load(Ordering::SeqCst), 1);
            assert!(ended_in_failure(&results));
        });
    }

    #[test]
    fn test_repeat_with_index_writes_counter_before_each_iteration() {
        tokio_test::block_on(async {
            let store = Arc::new(RwLock::new(VariableStore::new()));
            let seen = Arc::new(RwLock::new(Vec::<String>::new()));

            let run = {
                let store = store.clone();
                let seen = seen.clone();
                move || -> BoxFuture<'static, Vec<CommandResult>> {
                    let store = store.clone();
                    let seen = seen.clone();
                    Box::pin(async move {
                        let value = store.read().await.get("i").map(str::to_string);
                        seen.write().await.push(value.unwrap_or_default());
                        vec![CommandResult::ok()]
                    })
                }
            };

            let ctx = FlowContext {
                store: store.as_ref(),
                evaluator: &CmpEvaluator,
            };
            let results = run_construct(
                FlowKind::RepeatWithIndex,
                &args(&[("count", "3"), ("index", "i")]),
                &ctx,
                run,
                never_runner(),
            )
            .await;

            assert!(!ended_in_failure(&results));
            assert_eq!(*seen.read().await, vec!["0", "1", "2"]);
        });
    }

    #[test]
    fn test_for_each_item_binds_each_trimmed_token() {
        tokio_test::block_on(async {
            let store = Arc::new(RwLock::new(VariableStore::with_values([(
                "myList", "a, b , c",
            )])));
            let seen = Arc::new(RwLock::new(Vec::<String>::new()));

            let run = {
                let store = store.clone();
                let seen = seen.clone();
                move || -> BoxFuture<'static, Vec<CommandResult>> {
                    let store = store.clone();
                    let seen = seen.clone();
                    Box::pin(async move {
                        let value = store.read().await.get("item").map(str::to_string);
                        seen.write().await.push(value.unwrap_or_default());
                        vec![CommandResult::ok()]
                    })
                }
            };

            let ctx = FlowContext {
                store: store.as_ref(),
                evaluator: &CmpEvaluator,
            };
            let results = run_construct(
                FlowKind::ForEachItem,
                &args(&[("item", "item"), ("list", "myList")]),
                &ctx,
                run,
                never_runner(),
            )
            .await;

            assert!(!ended_in_failure(&results));
            assert_eq!(*seen.read().await, vec!["a", "b", "c"]);
        });
    }

    #[test]
    fn test_for_each_item_fails_on_unbound_list() {
        tokio_test::block_on(async {
            let store = RwLock::new(VariableStore::new());
            let ctx = FlowContext {
                store: &store,
                evaluator: &CmpEvaluator,
            };

            let results = run_construct(
                FlowKind::ForEachItem,
                &args(&[("item", "item"), ("list", "ghost")]),
                &ctx,
                never_runner(),
                never_runner(),
            )
            .await;

            assert!(ended_in_failure(&results));
        });
    }

    #[test]
    fn test_for_each_string_line_skips_blank_lines() {
        tokio_test::block_on(async {
            let store = Arc::new(RwLock::new(VariableStore::new()));
            let calls = Arc::new(AtomicUsize::new(0));

            let ctx = FlowContext {
                store: store.as_ref(),
                evaluator: &CmpEvaluator,
            };
            let results = run_construct(
                FlowKind::ForEachStringLine,
                &args(&[("text", "one\\n\\n  \\ntwo")]),
                &ctx,
                counting_runner(calls.clone(), vec![CommandResult::ok()]),
                never_runner(),
            )
            .await;

            assert!(!ended_in_failure(&results));
            assert_eq!(calls.load(Ordering::SeqCst), 2);
            assert_eq!(store.read().await.get(CURRENT_LINE_VARIABLE), Some("two"));
        });
    }

    #[test]
    fn test_if_true_runs_sequence() {
        tokio_test::block_on(async {
            let store = RwLock::new(VariableStore::with_values([("x", "5")]));
            let ctx = FlowContext {
                store: &store,
                evaluator: &CmpEvaluator,
            };
            let calls = Arc::new(AtomicUsize::new(0));

            let results = run_construct(
                FlowKind::If,
                &args(&[("condition", "${x} > 1")]),
                &ctx,
                counting_runner(calls.clone(), vec![CommandResult::ok()]),
                never_runner(),
            )
            .await;

            assert_eq!(calls.load(Ordering::SeqCst), 1);
            assert!(!ended_in_failure(&results));
            // the evaluated condition is part of the trace
            assert!(results[0]
                .message
                .as_deref()
                .unwrap()
                .contains("5 > 1"));
        });
    }

    #[test]
    fn test_if_false_runs_alternative() {
        tokio_test::block_on(async {
            let store = RwLock::new(VariableStore::new());
            let ctx = FlowContext {
                store: &store,
                evaluator: &CmpEvaluator,
            };
            let calls = Arc::new(AtomicUsize::new(0));

            let results = run_construct(
                FlowKind::If,
                &args(&[("condition", "false")]),
                &ctx,
                never_runner(),
                counting_runner(calls.clone(), vec![CommandResult::ok()]),
            )
            .await;

            assert_eq!(calls.load(Ordering::SeqCst), 1);
            assert!(!ended_in_failure(&results));
        });
    }

    #[test]
    fn test_while_false_on_first_evaluation_never_runs_body() {
        tokio_test::block_on(async {
            let store = RwLock::new(VariableStore::new());
            let ctx = FlowContext {
                store: &store,
                evaluator: &CmpEvaluator,
            };

            let results = run_construct(
                FlowKind::While,
                &args(&[("condition", "1 > 2")]),
                &ctx,
                never_runner(),
                never_runner(),
            )
            .await;

            assert!(!ended_in_failure(&results));
        });
    }

    #[test]
    fn test_while_reevaluates_mutated_variable() {
        tokio_test::block_on(async {
            let store = Arc::new(RwLock::new(VariableStore::with_values([("n", "0")])));

            let run = {
                let store = store.clone();
                move || -> BoxFuture<'static, Vec<CommandResult>> {
                    let store = store.clone();
                    Box::pin(async move {
                        let mut guard = store.write().await;
                        let next = guard
                            .get("n")
                            .and_then(|n| n.parse::<i64>().ok())
                            .unwrap_or_default()
                            + 1;
                        guard.set("n", next.to_string());
                        vec![CommandResult::ok()]
                    })
                }
            };

            let ctx = FlowContext {
                store: store.as_ref(),
                evaluator: &CmpEvaluator,
            };
            let results = run_construct(
                FlowKind::While,
                &args(&[("condition", "${n} < 3")]),
                &ctx,
                run,
                never_runner(),
            )
            .await;

            assert!(!ended_in_failure(&results));
            assert_eq!(store.read().await.get("n"), Some("3"));
        });
    }

    #[test]
    fn test_while_fails_on_unevaluable_condition() {
        tokio_test::block_on(async {
            let store = RwLock::new(VariableStore::new());
            let ctx = FlowContext {
                store: &store,
                evaluator: &CmpEvaluator,
            };

            let results = run_construct(
                FlowKind::While,
                &args(&[("condition", "${ghost} < 3")]),
                &ctx,
                never_runner(),
                never_runner(),
            )
            .await;

            assert!(ended_in_failure(&results));
        });
    }

    #[test]
    fn test_try_with_failing_primary_runs_alternative_and_succeeds() {
        tokio_test::block_on(async {
            let store = RwLock::new(VariableStore::new());
            let ctx = FlowContext {
                store: &store,
                evaluator: &CmpEvaluator,
            };
            let primary = Arc::new(AtomicUsize::new(0));

            let results = run_construct(
                FlowKind::Try,
                &ArgMap::new(),
                &ctx,
                counting_runner(primary.clone(), vec![CommandResult::fail("boom")]),
                success_runner(),
            )
            .await;

            assert_eq!(primary.load(Ordering::SeqCst), 1);
            assert!(!ended_in_failure(&results));
            // trace keeps the primary failure
            assert!(results.iter().any(CommandResult::is_failure));
        });
    }

    #[test]
    fn test_try_with_succeeding_primary_skips_alternative() {
        tokio_test::block_on(async {
            let store = RwLock::new(VariableStore::new());
            let ctx = FlowContext {
                store: &store,
                evaluator: &CmpEvaluator,
            };

            let results = run_construct(
                FlowKind::Try,
                &ArgMap::new(),
                &ctx,
                success_runner(),
                never_runner(),
            )
            .await;

            assert_eq!(results.len(), 1);
            assert!(!ended_in_failure(&results));
        });
    }

    #[test]
    fn test_flow_formats_round_trip_through_lookup() {
        for kind in FlowKind::ALL {
            assert_eq!(FlowKind::from_format(kind.format()), Some(kind));
        }
        assert_eq!(FlowKind::from_format("repeat forever"), None);
    }
}
