//! Command-side type definitions.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Named arguments extracted from an input against a format.
pub type ArgMap = HashMap<String, String>;

/// One node of the program tree: either a plain command string, or a block
/// carrying a main command plus the sequences a flow-control construct runs.
///
/// The tree is acyclic by construction; nested sequences are owned by their
/// parent node and injected lazily when the interpreter reaches them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandInput {
    Literal(String),
    Block {
        command: String,
        #[serde(default)]
        sequence: Vec<CommandInput>,
        #[serde(
            default,
            rename = "alternativeSequence",
            skip_serializing_if = "Option::is_none"
        )]
        alternative_sequence: Option<Vec<CommandInput>>,
    },
}

impl CommandInput {
    /// Create a block node with a main command and a sequence.
    pub fn block(
        command: impl Into<String>,
        sequence: Vec<CommandInput>,
        alternative_sequence: Option<Vec<CommandInput>>,
    ) -> Self {
        Self::Block {
            command: command.into(),
            sequence,
            alternative_sequence,
        }
    }

    /// The command text of this node.
    pub fn text(&self) -> &str {
        match self {
            Self::Literal(text) => text,
            Self::Block { command, .. } => command,
        }
    }

    /// A copy of this node with the command text replaced and any nested
    /// sequences carried over untouched.
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        match self {
            Self::Literal(_) => Self::Literal(text.into()),
            Self::Block {
                sequence,
                alternative_sequence,
                ..
            } => Self::Block {
                command: text.into(),
                sequence: sequence.clone(),
                alternative_sequence: alternative_sequence.clone(),
            },
        }
    }

    /// The attached sequence; empty for literal nodes.
    pub fn sequence(&self) -> &[CommandInput] {
        match self {
            Self::Literal(_) => &[],
            Self::Block { sequence, .. } => sequence,
        }
    }

    /// The attached alternative sequence, if any.
    pub fn alternative_sequence(&self) -> Option<&[CommandInput]> {
        match self {
            Self::Literal(_) => None,
            Self::Block {
                alternative_sequence,
                ..
            } => alternative_sequence.as_deref(),
        }
    }
}

impl From<&str> for CommandInput {
    fn from(text: &str) -> Self {
        Self::Literal(text.to_string())
    }
}

impl From<String> for CommandInput {
    fn from(text: String) -> Self {
        Self::Literal(text)
    }
}

/// A worked example of free text mapping onto literal commands, carried on a
/// format and handed to the natural-language resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandExample {
    pub prompt: String,
    pub output: Vec<String>,
}

impl CommandExample {
    pub fn new(prompt: impl Into<String>, output: Vec<String>) -> Self {
        Self {
            prompt: prompt.into(),
            output,
        }
    }
}

/// Outcome of one unit of work. Execution produces an ordered list of these,
/// oldest first; a failing entry terminates its enclosing sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CommandResult {
    /// A successful result with no message.
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    /// A successful result carrying an informational message.
    pub fn ok_with(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    /// A failed result with a message.
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }

    pub fn is_failure(&self) -> bool {
        !self.success
    }
}

/// A declarative command template: a format string with `${name}`
/// placeholders plus matching metadata. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Format {
    /// Template string, e.g. `console log ${log}`.
    pub format: String,
    /// Human/LLM-facing description of what the command does.
    pub description: Option<String>,
    /// Application that must be in context for the command to apply.
    pub requires_application: Option<String>,
    /// When set, the format only ever matches literally and is excluded
    /// from natural-language resolution.
    pub exact_match_only: bool,
    /// Worked examples handed to the natural-language resolver.
    pub examples: Vec<CommandExample>,
}

impl Format {
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            description: None,
            requires_application: None,
            exact_match_only: false,
            examples: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_requires_application(mut self, application: impl Into<String>) -> Self {
        self.requires_application = Some(application.into());
        self
    }

    pub fn with_exact_match_only(mut self, exact: bool) -> Self {
        self.exact_match_only = exact;
        self
    }

    pub fn with_examples(mut self, examples: Vec<CommandExample>) -> Self {
        self.examples = examples;
        self
    }
}

/// Requirement flags carried by a declarative command record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRequirements {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,
    #[serde(default)]
    pub exact_match: bool,
}

/// The persisted shape of a user-defined sequence command.
///
/// This is both what the config loader reads from command packs and what
/// [`Plan::as_command_record`] produces when a finished plan is saved as a
/// reusable command.
///
/// [`Plan::as_command_record`]: crate::types::Plan::as_command_record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRecord {
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub sequence: Vec<CommandInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternative_sequence: Option<Vec<CommandInput>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<CommandExample>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires: Option<CommandRequirements>,
}

impl CommandRecord {
    /// Build the [`Format`] metadata for this record.
    pub fn format_meta(&self) -> Format {
        let requires = self.requires.clone().unwrap_or_default();
        Format {
            format: self.format.clone(),
            description: self.description.clone(),
            requires_application: requires.application,
            exact_match_only: requires.exact_match,
            examples: self.examples.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_command_input_parses_both_shapes() {
        let literal: CommandInput = serde_json::from_value(json!("console log hi")).unwrap();
        assert_eq!(literal, CommandInput::Literal("console log hi".to_string()));

        let block: CommandInput = serde_json::from_value(json!({
            "command": "repeat 2 times",
            "sequence": ["console log hi"],
            "alternativeSequence": ["console log bye"],
        }))
        .unwrap();
        assert_eq!(block.text(), "repeat 2 times");
        assert_eq!(block.sequence().len(), 1);
        assert_eq!(block.alternative_sequence().map(<[_]>::len), Some(1));
    }

    #[test]
    fn test_with_text_preserves_nested_sequences() {
        let block = CommandInput::block(
            "if ${flag} == 1",
            vec!["console log yes".into()],
            Some(vec!["console log no".into()]),
        );
        let rewritten = block.with_text("if 1 == 1");
        assert_eq!(rewritten.text(), "if 1 == 1");
        assert_eq!(rewritten.sequence(), block.sequence());
        assert_eq!(rewritten.alternative_sequence(), block.alternative_sequence());
    }

    #[test]
    fn test_command_record_round_trips_camel_case() {
        let record = CommandRecord {
            format: "greet ${name}".to_string(),
            description: Some("Greets someone".to_string()),
            sequence: vec!["console log hello ${name}".into()],
            alternative_sequence: None,
            examples: vec![CommandExample::new(
                "say hi to ada",
                vec!["greet ada".to_string()],
            )],
            requires: Some(CommandRequirements {
                application: None,
                exact_match: true,
            }),
        };

        let value = serde_json::to_value(&record).unwrap();
        assert!(value.get("exactMatch").is_none());
        assert_eq!(value["requires"]["exactMatch"], json!(true));

        let parsed: CommandRecord = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, record);
        assert!(parsed.format_meta().exact_match_only);
    }
}
