//! The sequence interpreter.
//!
//! Resolves program nodes into runnable commands and executes them
//! recursively: the head of the list runs first and the tail only runs if
//! the head succeeded. Resolution tries registered formats, then
//! flow-control formats, then (once) the external natural-language
//! resolver, whose predictions are resolved again with the fallback
//! disabled.
//!
//! One interpreter is one session: it owns the running/interrupted flags
//! and shares one variable store; nothing here is process-global.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::RwLock;

use crate::command::{
    CommandKind, CommandRegistry, HandlerContext, InterruptFlag, NativeCommand,
};
use crate::error::CommandError;
use crate::eval::{ExpressionEvaluator, NullEvaluator};
use crate::flow::{self, FlowContext, FlowKind};
use crate::notify::{NotificationSink, TracingNotifier};
use crate::pattern;
use crate::resolver::CommandResolver;
use crate::store::VariableStore;
use crate::types::{ArgMap, CommandInput, CommandResult};

/// A resolved unit of work: the matched format, what to run, and the
/// extracted arguments.
struct Executable {
    format: String,
    kind: ExecutableKind,
    args: ArgMap,
}

enum ExecutableKind {
    Native(Arc<dyn NativeCommand>),
    Sequence {
        sequence: Vec<CommandInput>,
    },
    Flow {
        kind: FlowKind,
        sequence: Vec<CommandInput>,
        alternative_sequence: Option<Vec<CommandInput>>,
    },
}

/// An interpreter session.
pub struct Interpreter {
    registry: CommandRegistry,
    store: Arc<RwLock<VariableStore>>,
    notifier: Arc<dyn NotificationSink>,
    evaluator: Arc<dyn ExpressionEvaluator>,
    resolver: Option<Arc<dyn CommandResolver>>,
    running: AtomicBool,
    interrupt: Arc<InterruptFlag>,
}

impl Interpreter {
    /// Create a session over a registry, with a fresh store, log-backed
    /// notifications, no resolver, and an evaluator that rejects every
    /// condition until one is configured.
    pub fn new(registry: CommandRegistry) -> Self {
        Self {
            registry,
            store: Arc::new(RwLock::new(VariableStore::new())),
            notifier: Arc::new(TracingNotifier),
            evaluator: Arc::new(NullEvaluator),
            resolver: None,
            running: AtomicBool::new(false),
            interrupt: Arc::new(InterruptFlag::new()),
        }
    }

    /// Share an externally seeded variable store.
    pub fn with_store(mut self, store: Arc<RwLock<VariableStore>>) -> Self {
        self.store = store;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_evaluator(mut self, evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn CommandResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub fn store(&self) -> Arc<RwLock<VariableStore>> {
        self.store.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Request cooperative cancellation: the next command in any running
    /// sequence is skipped once the flag is observed. In-flight handlers
    /// are never preempted.
    pub fn interrupt(&self) {
        tracing::info!("interrupt requested");
        self.interrupt.set();
    }

    /// Reset the cancellation flag so new sequences can run.
    pub fn clear_interrupt(&self) {
        self.interrupt.clear();
    }

    /// The shared flag, for wiring into external controls or handlers.
    pub fn interrupt_flag(&self) -> Arc<InterruptFlag> {
        self.interrupt.clone()
    }

    /// Execute a list of program nodes, returning the ordered trace of
    /// results, oldest first. A failure terminates the run; everything
    /// accumulated so far is returned with the failing entry last.
    pub async fn execute(&self, items: &[CommandInput]) -> Vec<CommandResult> {
        self.running.store(true, Ordering::SeqCst);
        let results = self.run_items(items).await;
        self.running.store(false, Ordering::SeqCst);
        results
    }

    fn run_items<'a>(&'a self, items: &'a [CommandInput]) -> BoxFuture<'a, Vec<CommandResult>> {
        Box::pin(async move {
            let Some((head, tail)) = items.split_first() else {
                return Vec::new();
            };

            let injected = self.store.read().await.inject_into_input(head);
            let head_input = match injected {
                Ok(input) => input,
                Err(error) => {
                    tracing::warn!(command = head.text(), %error, "variable injection failed");
                    return vec![CommandResult::fail(error.to_string())];
                }
            };

            let executables = match self.resolve_input(&head_input, true).await {
                Ok(executables) => executables,
                Err(error) => return vec![CommandResult::fail(error.to_string())],
            };

            let mut results = Vec::new();
            for executable in &executables {
                if self.interrupt.is_set() {
                    tracing::warn!(format = %executable.format, "skipping command, session interrupted");
                    results.push(CommandResult::fail(CommandError::Interrupted.to_string()));
                    return results;
                }

                // predicted commands may still carry variable references
                let args = match self.inject_args(&executable.args).await {
                    Ok(args) => args,
                    Err(error) => {
                        results.push(CommandResult::fail(error.to_string()));
                        return results;
                    }
                };

                // all arguments are stored and visible to later commands
                self.store.write().await.merge(args.clone());

                let outcome = self.dispatch(executable, &args).await;
                let failed = outcome.last().map(CommandResult::is_failure).unwrap_or(false);
                results.extend(outcome);
                if failed {
                    tracing::warn!(format = %executable.format, "command failed");
                    return results;
                }
            }

            results.extend(self.run_items(tail).await);
            results
        })
    }

    async fn inject_args(&self, args: &ArgMap) -> Result<ArgMap, CommandError> {
        let store = self.store.read().await;
        let mut injected = ArgMap::with_capacity(args.len());
        for (name, value) in args {
            injected.insert(name.clone(), store.inject_into_str(value)?);
        }
        Ok(injected)
    }

    async fn dispatch(&self, executable: &Executable, args: &ArgMap) -> Vec<CommandResult> {
        match &executable.kind {
            ExecutableKind::Native(handler) => {
                tracing::info!(format = %executable.format, ?args, "running command");
                let ctx = HandlerContext {
                    store: self.store.clone(),
                    notifier: self.notifier.clone(),
                    evaluator: self.evaluator.clone(),
                    interrupt: self.interrupt.clone(),
                };
                vec![handler.run(args, ctx).await]
            }
            ExecutableKind::Sequence { sequence } => {
                if sequence.is_empty() {
                    return vec![CommandResult::fail(format!(
                        "sequence command missing sequence: \"{}\"",
                        executable.format
                    ))];
                }
                self.run_items(sequence).await
            }
            ExecutableKind::Flow {
                kind,
                sequence,
                alternative_sequence,
            } => {
                if sequence.is_empty() {
                    return vec![CommandResult::fail(format!(
                        "flow control command missing sequence: \"{}\"",
                        executable.format
                    ))];
                }
                let ctx = FlowContext {
                    store: self.store.as_ref(),
                    evaluator: self.evaluator.as_ref(),
                };
                let run_sequence = || self.run_items(sequence);
                let run_alternative = || match alternative_sequence {
                    Some(alternative) if !alternative.is_empty() => self.run_items(alternative),
                    // no alternative supplied: trivially succeed
                    _ => Box::pin(async { vec![CommandResult::ok()] }),
                };
                flow::run_construct(*kind, args, &ctx, run_sequence, run_alternative).await
            }
        }
    }

    /// Resolve one node into executables. `allow_resolver` is cleared when
    /// resolving the resolver's own predictions, bounding the lookup to one
    /// level.
    fn resolve_input<'a>(
        &'a self,
        input: &'a CommandInput,
        allow_resolver: bool,
    ) -> BoxFuture<'a, Result<Vec<Executable>, CommandError>> {
        Box::pin(async move {
            let text = input.text();

            let matches = pattern::matching_formats(text, self.registry.format_strings());
            match matches.len() {
                1 => {
                    let format = matches[0];
                    let command = self.registry.get(format).ok_or_else(|| {
                        CommandError::Execution(format!(
                            "command not found after match: \"{format}\""
                        ))
                    })?;
                    let args = pattern::extract_args(text, format)?;
                    let kind = match &command.kind {
                        CommandKind::Native(handler) => ExecutableKind::Native(handler.clone()),
                        CommandKind::Sequence { sequence, .. } => ExecutableKind::Sequence {
                            sequence: sequence.clone(),
                        },
                        CommandKind::Flow(flow_kind) => ExecutableKind::Flow {
                            kind: *flow_kind,
                            sequence: input.sequence().to_vec(),
                            alternative_sequence: input
                                .alternative_sequence()
                                .map(<[CommandInput]>::to_vec),
                        },
                    };
                    return Ok(vec![Executable {
                        format: format.to_string(),
                        kind,
                        args,
                    }]);
                }
                0 => {}
                _ => {
                    self.notifier
                        .push("Error", &format!("Multiple commands found matching \"{text}\""))
                        .await;
                    return Err(CommandError::parse(text, "multiple command formats match"));
                }
            }

            let flow_matches = pattern::matching_formats(text, flow::flow_formats());
            match flow_matches.len() {
                1 => {
                    let format = flow_matches[0];
                    let kind = FlowKind::from_format(format).ok_or_else(|| {
                        CommandError::Execution(format!(
                            "flow control not found after match: \"{format}\""
                        ))
                    })?;
                    let args = pattern::extract_args(text, format)?;
                    // the construct runs the sequences attached to this node
                    return Ok(vec![Executable {
                        format: format.to_string(),
                        kind: ExecutableKind::Flow {
                            kind,
                            sequence: input.sequence().to_vec(),
                            alternative_sequence: input
                                .alternative_sequence()
                                .map(<[CommandInput]>::to_vec),
                        },
                        args,
                    }]);
                }
                0 => {}
                _ => {
                    return Err(CommandError::parse(
                        text,
                        "multiple flow control formats match",
                    ));
                }
            }

            if !allow_resolver {
                return Err(CommandError::parse(text, "no matching command format"));
            }
            let Some(resolver) = &self.resolver else {
                self.notifier
                    .push("Error", &format!("Command not found: {text}"))
                    .await;
                return Err(CommandError::parse(text, "no matching command format"));
            };

            tracing::debug!(input = text, "no format match, delegating to resolver");
            let searchable = self.registry.searchable_formats();
            let examples = self.registry.examples();
            let predictions = resolver
                .resolve(text, &searchable, &examples)
                .await
                .map_err(|error| CommandError::parse(text, error.to_string()))?;
            if predictions.is_empty() {
                return Err(CommandError::parse(text, "unable to predict a command"));
            }

            let mut executables = Vec::new();
            for prediction in predictions {
                let predicted = CommandInput::from(prediction);
                let resolved = self.resolve_input(&predicted, false).await.map_err(|error| {
                    CommandError::parse(text, format!("predicted invalid command: {error}"))
                })?;
                executables.extend(resolved);
            }
            Ok(executables)
        })
    }
}
