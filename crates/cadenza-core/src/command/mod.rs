//! Command abstraction and registry.
//!
//! A registered command pairs a declarative [`Format`] with what resolving
//! it yields: a native handler, an embedded sequence, or a flow-control
//! construct. The registry is built once at startup; resolution never loads
//! code by name at call time.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::eval::ExpressionEvaluator;
use crate::flow::FlowKind;
use crate::notify::NotificationSink;
use crate::store::VariableStore;
use crate::types::{ArgMap, CommandExample, CommandInput, CommandRecord, CommandResult, Format};

/// Cooperative cancellation flag shared between an interpreter session and
/// anything that may interrupt it. Clearable, unlike a cancellation token.
#[derive(Debug, Default)]
pub struct InterruptFlag(AtomicBool);

impl InterruptFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Context handed to native handlers: the session store plus the seams a
/// handler may need for side effects.
#[derive(Clone)]
pub struct HandlerContext {
    pub store: Arc<RwLock<VariableStore>>,
    pub notifier: Arc<dyn NotificationSink>,
    pub evaluator: Arc<dyn ExpressionEvaluator>,
    pub interrupt: Arc<InterruptFlag>,
}

/// A native command handler.
///
/// Handlers report failure through the returned [`CommandResult`], never by
/// panicking, and may perform arbitrary side effects.
#[async_trait]
pub trait NativeCommand: Send + Sync {
    /// The format template this handler answers to.
    fn format(&self) -> &str;

    /// Description surfaced to users and the natural-language resolver.
    fn description(&self) -> &str;

    /// Worked examples for the natural-language resolver.
    fn examples(&self) -> Vec<CommandExample> {
        Vec::new()
    }

    /// When true the command only resolves on a literal format match.
    fn exact_match_only(&self) -> bool {
        false
    }

    /// Execute the command with extracted arguments.
    async fn run(&self, args: &ArgMap, ctx: HandlerContext) -> CommandResult;
}

/// What resolving a format yields.
#[derive(Clone)]
pub enum CommandKind {
    /// A native handler reference.
    Native(Arc<dyn NativeCommand>),
    /// An embedded command-input list from a declarative record.
    Sequence {
        sequence: Vec<CommandInput>,
        alternative_sequence: Option<Vec<CommandInput>>,
    },
    /// A flow-control construct.
    Flow(FlowKind),
}

impl std::fmt::Debug for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Native(_) => f.write_str("Native"),
            Self::Sequence { .. } => f.write_str("Sequence"),
            Self::Flow(kind) => write!(f, "Flow({kind:?})"),
        }
    }
}

/// A resolvable command: format metadata plus its executable kind.
#[derive(Debug, Clone)]
pub struct RegisteredCommand {
    pub format: Format,
    pub kind: CommandKind,
}

/// Registry of every resolvable command, keyed by format string.
#[derive(Default)]
pub struct CommandRegistry {
    commands: Vec<RegisteredCommand>,
    by_format: HashMap<String, usize>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command; a duplicate format replaces the earlier entry.
    pub fn register(&mut self, command: RegisteredCommand) {
        let format = command.format.format.clone();
        match self.by_format.get(&format) {
            Some(&index) => {
                tracing::warn!(%format, "replacing previously registered command");
                self.commands[index] = command;
            }
            None => {
                self.by_format.insert(format, self.commands.len());
                self.commands.push(command);
            }
        }
    }

    /// Register a native handler, deriving format metadata from the trait.
    pub fn register_native(&mut self, handler: Arc<dyn NativeCommand>) {
        let format = Format::new(handler.format())
            .with_description(handler.description())
            .with_exact_match_only(handler.exact_match_only())
            .with_examples(handler.examples());
        self.register(RegisteredCommand {
            format,
            kind: CommandKind::Native(handler),
        });
    }

    /// Register a declarative sequence command record.
    pub fn register_record(&mut self, record: CommandRecord) {
        let format = record.format_meta();
        self.register(RegisteredCommand {
            format,
            kind: CommandKind::Sequence {
                sequence: record.sequence,
                alternative_sequence: record.alternative_sequence,
            },
        });
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Lookup by exact format string.
    pub fn get(&self, format: &str) -> Option<&RegisteredCommand> {
        self.by_format
            .get(format)
            .and_then(|&index| self.commands.get(index))
    }

    /// All format strings, registration order.
    pub fn format_strings(&self) -> Vec<&str> {
        self.commands
            .iter()
            .map(|command| command.format.format.as_str())
            .collect()
    }

    /// Format strings as owned values, for handing to collaborators.
    pub fn format_strings_owned(&self) -> Vec<String> {
        self.commands
            .iter()
            .map(|command| command.format.format.clone())
            .collect()
    }

    /// Formats eligible for natural-language resolution.
    pub fn searchable_formats(&self) -> Vec<Format> {
        self.commands
            .iter()
            .filter(|command| !command.format.exact_match_only)
            .map(|command| command.format.clone())
            .collect()
    }

    /// Every worked example across all registered commands.
    pub fn examples(&self) -> Vec<CommandExample> {
        self.commands
            .iter()
            .flat_map(|command| command.format.examples.iter().cloned())
            .collect()
    }
}
