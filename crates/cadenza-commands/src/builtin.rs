//! Built-in native commands.
//!
//! These are the control commands every session ships with: console output,
//! waiting, storing values, file access, arithmetic, and session control.
//! Values stored into the variable store keep newlines as the two-character
//! `\n` escape so they stay single-line for later injection; values leaving
//! the system (console, files) are unescaped again.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use cadenza_core::command::{HandlerContext, NativeCommand};
use cadenza_core::types::{ArgMap, CommandExample, CommandResult};

fn escape_newlines(value: &str) -> String {
    value.replace('\n', "\\n")
}

fn unescape_newlines(value: &str) -> String {
    value.replace("\\n", "\n")
}

fn require<'a>(args: &'a ArgMap, name: &str) -> Option<&'a str> {
    args.get(name).map(String::as_str).filter(|value| !value.is_empty())
}

/// `console log ${log}`
pub struct ConsoleLog;

#[async_trait]
impl NativeCommand for ConsoleLog {
    fn format(&self) -> &str {
        "console log ${log}"
    }

    fn description(&self) -> &str {
        "Logs a message to the console."
    }

    fn examples(&self) -> Vec<CommandExample> {
        vec![
            CommandExample::new("log hello world", vec!["console log hello world".to_string()]),
            CommandExample::new("print hello world", vec!["console log hello world".to_string()]),
            CommandExample::new("output hello world", vec!["console log hello world".to_string()]),
        ]
    }

    async fn run(&self, args: &ArgMap, _ctx: HandlerContext) -> CommandResult {
        let Some(log) = require(args, "log") else {
            return CommandResult::fail("no log provided");
        };
        println!("{}", unescape_newlines(log));
        CommandResult::ok()
    }
}

/// `wait ${duration} seconds`
pub struct WaitSeconds;

#[async_trait]
impl NativeCommand for WaitSeconds {
    fn format(&self) -> &str {
        "wait ${duration} seconds"
    }

    fn description(&self) -> &str {
        "Waits for the given number of seconds."
    }

    async fn run(&self, args: &ArgMap, _ctx: HandlerContext) -> CommandResult {
        let Some(duration) = require(args, "duration").and_then(|d| d.parse::<u64>().ok()) else {
            return CommandResult::fail("no valid duration provided");
        };
        tracing::debug!(duration, "waiting in seconds");
        tokio::time::sleep(Duration::from_secs(duration)).await;
        CommandResult::ok()
    }
}

/// `wait ${duration} milliseconds`
pub struct WaitMilliseconds;

#[async_trait]
impl NativeCommand for WaitMilliseconds {
    fn format(&self) -> &str {
        "wait ${duration} milliseconds"
    }

    fn description(&self) -> &str {
        "Waits for the given number of milliseconds."
    }

    async fn run(&self, args: &ArgMap, _ctx: HandlerContext) -> CommandResult {
        let Some(duration) = require(args, "duration").and_then(|d| d.parse::<u64>().ok()) else {
            return CommandResult::fail("no valid duration provided");
        };
        tokio::time::sleep(Duration::from_millis(duration)).await;
        CommandResult::ok()
    }
}

/// `notification ${title} ${body}`
pub struct PushNotification;

#[async_trait]
impl NativeCommand for PushNotification {
    fn format(&self) -> &str {
        "notification ${title} ${body}"
    }

    fn description(&self) -> &str {
        "Pushes a notification with the given title and body to registered handlers."
    }

    async fn run(&self, args: &ArgMap, ctx: HandlerContext) -> CommandResult {
        let (Some(title), Some(body)) = (require(args, "title"), require(args, "body")) else {
            return CommandResult::fail("no title or body provided");
        };
        ctx.notifier.push(title, body).await;
        CommandResult::ok()
    }
}

/// `store ${key} ${value}`
pub struct StoreValue;

#[async_trait]
impl NativeCommand for StoreValue {
    fn format(&self) -> &str {
        "store ${key} ${value}"
    }

    fn description(&self) -> &str {
        "Stores the given value as the given key. It can be referenced in later commands with ${key}."
    }

    async fn run(&self, args: &ArgMap, ctx: HandlerContext) -> CommandResult {
        let (Some(key), Some(value)) = (require(args, "key"), require(args, "value")) else {
            return CommandResult::fail("no key or value provided");
        };
        ctx.store.write().await.set(key, value);
        CommandResult::ok()
    }
}

/// `write ${variableName} to file ${filePath}`
pub struct WriteToFile;

#[async_trait]
impl NativeCommand for WriteToFile {
    fn format(&self) -> &str {
        "write ${variableName} to file ${filePath}"
    }

    fn description(&self) -> &str {
        "Creates a file at the given path and writes the specified variable to it."
    }

    async fn run(&self, args: &ArgMap, ctx: HandlerContext) -> CommandResult {
        let (Some(variable), Some(path)) =
            (require(args, "variableName"), require(args, "filePath"))
        else {
            return CommandResult::fail("no file path or variable name provided");
        };

        let content = ctx.store.read().await.get(variable).map(str::to_string);
        let Some(content) = content else {
            return CommandResult::fail(format!("variable not saved: {variable}"));
        };

        if let Err(error) = tokio::fs::write(path, unescape_newlines(&content)).await {
            tracing::warn!(path, %error, "file write failed");
            return CommandResult::fail(format!("unable to write to file {path}"));
        }
        ctx.notifier
            .push("Success", &format!("File saved to {path}"))
            .await;
        CommandResult::ok()
    }
}

/// `append ${variableName} to file ${filePath}`
pub struct AppendToFile;

#[async_trait]
impl NativeCommand for AppendToFile {
    fn format(&self) -> &str {
        "append ${variableName} to file ${filePath}"
    }

    fn description(&self) -> &str {
        "Appends the specified variable to the given file."
    }

    async fn run(&self, args: &ArgMap, ctx: HandlerContext) -> CommandResult {
        let (Some(variable), Some(path)) =
            (require(args, "variableName"), require(args, "filePath"))
        else {
            return CommandResult::fail("no file path or variable name provided");
        };

        let content = ctx.store.read().await.get(variable).map(str::to_string);
        let Some(content) = content else {
            return CommandResult::fail(format!("variable not saved: {variable}"));
        };

        let to_append = format!("\n{}", unescape_newlines(&content));
        let opened = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await;
        let result = match opened {
            Ok(mut file) => file.write_all(to_append.as_bytes()).await,
            Err(error) => Err(error),
        };
        if let Err(error) = result {
            tracing::warn!(path, %error, "file append failed");
            return CommandResult::fail(format!("unable to write to file {path}"));
        }
        ctx.notifier
            .push("Success", &format!("File saved to {path}"))
            .await;
        CommandResult::ok()
    }
}

/// `read file ${filePath} into ${variableName}`
pub struct ReadFromFile;

#[async_trait]
impl NativeCommand for ReadFromFile {
    fn format(&self) -> &str {
        "read file ${filePath} into ${variableName}"
    }

    fn description(&self) -> &str {
        "Reads the contents of the file at the given path and stores it in the specified variable."
    }

    async fn run(&self, args: &ArgMap, ctx: HandlerContext) -> CommandResult {
        let (Some(path), Some(variable)) =
            (require(args, "filePath"), require(args, "variableName"))
        else {
            return CommandResult::fail("no file path or variable name provided");
        };

        match tokio::fs::read_to_string(path).await {
            Ok(contents) => {
                ctx.store
                    .write()
                    .await
                    .set(variable, escape_newlines(contents.trim_end()));
                CommandResult::ok()
            }
            Err(error) => {
                tracing::warn!(path, %error, "file read failed");
                CommandResult::fail(format!("unable to read file {path}"))
            }
        }
    }
}

/// `fetch url ${url} into ${variableName}`
pub struct FetchUrl {
    client: reqwest::Client,
}

impl FetchUrl {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for FetchUrl {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NativeCommand for FetchUrl {
    fn format(&self) -> &str {
        "fetch url ${url} into ${variableName}"
    }

    fn description(&self) -> &str {
        "Fetches the content from the given URL and stores it in the specified variable."
    }

    async fn run(&self, args: &ArgMap, ctx: HandlerContext) -> CommandResult {
        let (Some(url), Some(variable)) = (require(args, "url"), require(args, "variableName"))
        else {
            return CommandResult::fail("no url or variable name provided");
        };

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(error) => return CommandResult::fail(format!("unable to fetch {url}: {error}")),
        };
        match response.text().await {
            Ok(body) => {
                ctx.store.write().await.set(variable, escape_newlines(&body));
                CommandResult::ok()
            }
            Err(error) => CommandResult::fail(format!("unable to read response from {url}: {error}")),
        }
    }
}

/// `calculate ${expression} into ${variableName}`
pub struct CalculateExpression;

#[async_trait]
impl NativeCommand for CalculateExpression {
    fn format(&self) -> &str {
        "calculate ${expression} into ${variableName}"
    }

    fn description(&self) -> &str {
        "Calculates the given mathematical expression and stores the result in the specified variable."
    }

    async fn run(&self, args: &ArgMap, ctx: HandlerContext) -> CommandResult {
        let (Some(expression), Some(variable)) =
            (require(args, "expression"), require(args, "variableName"))
        else {
            return CommandResult::fail("no expression or variable name provided");
        };

        match ctx.evaluator.evaluate(expression) {
            Ok(value) => {
                ctx.store.write().await.set(variable, value.to_string());
                CommandResult::ok()
            }
            Err(error) => CommandResult::fail(error.to_string()),
        }
    }
}

/// `list files in ${directoryPath} into ${variableName}`
pub struct ListFilesInDirectory;

#[async_trait]
impl NativeCommand for ListFilesInDirectory {
    fn format(&self) -> &str {
        "list files in ${directoryPath} into ${variableName}"
    }

    fn description(&self) -> &str {
        "Lists files in the specified directory and stores the comma-separated list in the specified variable."
    }

    async fn run(&self, args: &ArgMap, ctx: HandlerContext) -> CommandResult {
        let (Some(directory), Some(variable)) =
            (require(args, "directoryPath"), require(args, "variableName"))
        else {
            return CommandResult::fail("no directory path or variable name provided");
        };

        let mut entries = match tokio::fs::read_dir(Path::new(directory)).await {
            Ok(entries) => entries,
            Err(error) => {
                return CommandResult::fail(format!("unable to list files in {directory}: {error}"))
            }
        };

        let mut names = Vec::new();
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => names.push(entry.file_name().to_string_lossy().into_owned()),
                Ok(None) => break,
                Err(error) => {
                    return CommandResult::fail(format!(
                        "unable to list files in {directory}: {error}"
                    ))
                }
            }
        }
        names.sort();

        ctx.store.write().await.set(variable, names.join(", "));
        CommandResult::ok()
    }
}

/// `uninterrupt`: resets the session interrupt flag so sequences can run
/// again. Exact match only.
pub struct Uninterrupt;

#[async_trait]
impl NativeCommand for Uninterrupt {
    fn format(&self) -> &str {
        "uninterrupt"
    }

    fn description(&self) -> &str {
        "Resets the interrupt flag. If a command was interrupted, this allows execution to continue."
    }

    fn exact_match_only(&self) -> bool {
        true
    }

    async fn run(&self, _args: &ArgMap, ctx: HandlerContext) -> CommandResult {
        ctx.interrupt.clear();
        CommandResult::ok()
    }
}
