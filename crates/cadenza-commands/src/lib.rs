//! # Cadenza Commands
//!
//! Built-in native command handlers and the default registry builder.
//! User-defined sequence commands from config packs are layered on top of
//! these by the embedder.

pub mod builtin;

use std::sync::Arc;

use cadenza_core::command::CommandRegistry;

pub use builtin::{
    AppendToFile, CalculateExpression, ConsoleLog, FetchUrl, ListFilesInDirectory,
    PushNotification, ReadFromFile, StoreValue, Uninterrupt, WaitMilliseconds, WaitSeconds,
    WriteToFile,
};

/// Register every built-in command on an existing registry.
pub fn register_builtins(registry: &mut CommandRegistry) {
    registry.register_native(Arc::new(ConsoleLog));
    registry.register_native(Arc::new(WaitSeconds));
    registry.register_native(Arc::new(WaitMilliseconds));
    registry.register_native(Arc::new(PushNotification));
    registry.register_native(Arc::new(StoreValue));
    registry.register_native(Arc::new(WriteToFile));
    registry.register_native(Arc::new(AppendToFile));
    registry.register_native(Arc::new(ReadFromFile));
    registry.register_native(Arc::new(FetchUrl::new()));
    registry.register_native(Arc::new(CalculateExpression));
    registry.register_native(Arc::new(ListFilesInDirectory));
    registry.register_native(Arc::new(Uninterrupt));
    tracing::info!(count = registry.len(), "registered built-in commands");
}

/// A registry preloaded with the built-in commands.
pub fn builtin_registry() -> CommandRegistry {
    let mut registry = CommandRegistry::new();
    register_builtins(&mut registry);
    registry
}
