//! Command-pack loading and saving.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use cadenza_core::types::{CommandRecord, CommandRequirements};

use crate::{namespaced, ConfigError};

/// File extension for command packs.
pub const COMMANDS_FILE_EXTENSION: &str = "json";

/// Document-level requirements inherited by every record in the pack.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct PackRequirements {
    #[serde(default)]
    application: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct CommandPack {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    requires: Option<PackRequirements>,
    commands: Vec<CommandRecord>,
}

/// Parse one command-pack document. Records with an empty format or an
/// empty sequence invalidate the document, matching the strictness applied
/// to hand-written packs.
pub fn parse_command_pack(content: &str) -> Result<Vec<CommandRecord>, ConfigError> {
    let pack: CommandPack = serde_json::from_str(content)?;
    if pack.commands.is_empty() {
        return Err(ConfigError::Invalid("no commands found".to_string()));
    }

    let namespace = pack.namespace.as_deref();
    let pack_application = pack
        .requires
        .as_ref()
        .and_then(|requires| requires.application.clone());

    let mut records = Vec::with_capacity(pack.commands.len());
    for mut record in pack.commands {
        if record.format.trim().is_empty() {
            return Err(ConfigError::Invalid("command format is empty".to_string()));
        }
        if record.sequence.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "command \"{}\" has an empty sequence",
                record.format
            )));
        }

        record.format = namespaced(namespace, &record.format);
        // a record-level application wins over the pack default
        if let Some(application) = &pack_application {
            let requires = record.requires.get_or_insert_with(CommandRequirements::default);
            if requires.application.is_none() {
                requires.application = Some(application.clone());
            }
        }
        records.push(record);
    }
    Ok(records)
}

/// Load every command pack in a directory.
///
/// A missing directory yields no records with a warning; a malformed file
/// is skipped with a diagnostic. Neither is fatal to startup.
pub fn load_command_packs(dir: &Path) -> Vec<CommandRecord> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(error) => {
            tracing::warn!(dir = %dir.display(), %error, "commands directory not found");
            return Vec::new();
        }
    };

    let mut records = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some(COMMANDS_FILE_EXTENSION) {
            continue;
        }
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(error) => {
                tracing::warn!(file = %path.display(), %error, "unable to read command pack");
                continue;
            }
        };
        match parse_command_pack(&content) {
            Ok(mut parsed) => {
                tracing::info!(
                    file = %path.display(),
                    count = parsed.len(),
                    "imported commands"
                );
                records.append(&mut parsed);
            }
            Err(error) => {
                tracing::warn!(file = %path.display(), %error, "skipping invalid command pack");
            }
        }
    }
    records
}

/// Write a single-command pack, e.g. a plan saved as a reusable command.
pub fn save_command_record(
    record: &CommandRecord,
    dir: &Path,
    filename: &str,
) -> Result<(), ConfigError> {
    fs::create_dir_all(dir)?;
    let pack = CommandPack {
        namespace: None,
        requires: None,
        commands: vec![record.clone()],
    };
    let content = serde_json::to_string_pretty(&pack)?;
    fs::write(dir.join(filename), content)?;
    Ok(())
}

/// A filesystem-safe file name for a command derived from its format.
pub fn command_filename(format: &str) -> String {
    let cleaned: String = format
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ')
        .collect();
    format!(
        "{}.{}",
        cleaned.trim().to_lowercase().replace(' ', "-"),
        COMMANDS_FILE_EXTENSION
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pack_applies_namespace_prefix() {
        let records = parse_command_pack(
            r#"{
                "namespace": "sheets",
                "commands": [
                    { "format": "open sheet ${name}", "sequence": ["console log opening ${name}"] }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].format, "sheets:open sheet ${name}");
    }

    #[test]
    fn test_parse_pack_inherits_document_application() {
        let records = parse_command_pack(
            r#"{
                "requires": { "application": "browser" },
                "commands": [
                    { "format": "scroll down", "sequence": ["press page-down"] },
                    {
                        "format": "focus editor",
                        "sequence": ["press escape"],
                        "requires": { "application": "editor" }
                    }
                ]
            }"#,
        )
        .unwrap();
        let meta: Vec<_> = records.iter().map(CommandRecord::format_meta).collect();
        assert_eq!(meta[0].requires_application.as_deref(), Some("browser"));
        assert_eq!(meta[1].requires_application.as_deref(), Some("editor"));
    }

    #[test]
    fn test_parse_pack_rejects_empty_sequence() {
        let error = parse_command_pack(
            r#"{ "commands": [ { "format": "noop", "sequence": [] } ] }"#,
        )
        .unwrap_err();
        assert!(matches!(error, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_load_skips_malformed_pack_and_keeps_valid_ones() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("good.json"),
            r#"{ "commands": [ { "format": "good", "sequence": ["console log ok"] } ] }"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("bad.json"), "{ not json").unwrap();
        std::fs::write(dir.path().join("ignored.txt"), "not a pack").unwrap();

        let records = load_command_packs(dir.path());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].format, "good");
    }

    #[test]
    fn test_load_missing_directory_is_empty_not_fatal() {
        let records = load_command_packs(Path::new("/no/such/commands/dir"));
        assert!(records.is_empty());
    }

    #[test]
    fn test_save_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let record = CommandRecord {
            format: "daily report".to_string(),
            description: Some("Compile the daily report".to_string()),
            sequence: vec!["console log compiling".into()],
            alternative_sequence: None,
            examples: Vec::new(),
            requires: None,
        };

        save_command_record(&record, dir.path(), &command_filename(&record.format)).unwrap();
        let reloaded = load_command_packs(dir.path());
        assert_eq!(reloaded, vec![record]);
    }

    #[test]
    fn test_command_filename_is_filesystem_safe() {
        assert_eq!(command_filename("Daily Report!"), "daily-report.json");
    }
}
