//! Natural-language command resolution seam.
//!
//! When no format matches an input, the interpreter may hand the text to an
//! external (typically language-model-backed) resolver together with the
//! searchable formats and their worked examples. The resolver answers with
//! zero or more literal command strings; the interpreter resolves each of
//! those with the fallback disabled, bounding the lookup to one level.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{CommandExample, Format};

/// Resolution errors.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("command resolution failed: {0}")]
    Failed(String),
}

/// External free-text to command-string resolver.
#[async_trait]
pub trait CommandResolver: Send + Sync {
    /// Translate free text into literal command strings. An empty vec means
    /// no suitable command was identified.
    async fn resolve(
        &self,
        input: &str,
        formats: &[Format],
        examples: &[CommandExample],
    ) -> Result<Vec<String>, ResolveError>;
}
