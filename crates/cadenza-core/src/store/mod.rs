//! Shared session variable store.
//!
//! A flat name -> value map living for one interpreter session. Every
//! executed command's arguments are merged in, and `${name}` references in
//! later commands read them back out.
//!
//! An empty string counts as a bound value: presence in the map is the only
//! bind criterion.

use std::collections::HashMap;

use crate::error::CommandError;
use crate::pattern::placeholder_regex;
use crate::types::CommandInput;

/// Session-scoped key/value state, last write wins.
#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    values: HashMap<String, String>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store from configuration or user variables.
    pub fn with_values<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// Merge a map of values, overwriting existing names.
    pub fn merge<I, K, V>(&mut self, values: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (name, value) in values {
            self.values.insert(name.into(), value.into());
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Replace every `${name}` occurrence with its stored value; any
    /// unbound name is an error.
    pub fn inject_into_str(&self, input: &str) -> Result<String, CommandError> {
        let mut output = String::with_capacity(input.len());
        let mut last = 0;
        for captures in placeholder_regex().captures_iter(input) {
            let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            output.push_str(&input[last..whole.start()]);
            match self.values.get(name.as_str()) {
                Some(value) => output.push_str(value),
                None => {
                    return Err(CommandError::MissingVariable {
                        name: name.as_str().to_string(),
                    })
                }
            }
            last = whole.end();
        }
        output.push_str(&input[last..]);
        Ok(output)
    }

    /// Replace every `${name}` whose value is bound and leave the rest
    /// verbatim. Used for condition text, where loop constructs re-expand
    /// on each evaluation.
    pub fn expand_into_str(&self, input: &str) -> String {
        let mut output = String::with_capacity(input.len());
        let mut last = 0;
        for captures in placeholder_regex().captures_iter(input) {
            let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            output.push_str(&input[last..whole.start()]);
            match self.values.get(name.as_str()) {
                Some(value) => output.push_str(value),
                None => output.push_str(whole.as_str()),
            }
            last = whole.end();
        }
        output.push_str(&input[last..]);
        output
    }

    /// Inject variables into the command text of a node only. Nested
    /// sequences are left untouched; they are injected lazily as each
    /// nested node is processed.
    pub fn inject_into_input(&self, input: &CommandInput) -> Result<CommandInput, CommandError> {
        let injected = self.inject_into_str(input.text())?;
        Ok(input.with_text(injected))
    }
}
