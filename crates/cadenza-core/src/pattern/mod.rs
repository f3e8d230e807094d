//! Template matching and argument extraction.
//!
//! Formats are template strings with `${name}` placeholders. Matching is
//! two-phase: phase one accepts a double-quoted string or a single
//! non-whitespace token per placeholder, so `press a b` matches
//! `press ${one} ${two}` but `press a b c` does not. Only when phase one
//! yields nothing does phase two run with an unrestricted greedy pattern,
//! letting unquoted natural sentences match single-placeholder formats.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::CommandError;
use crate::types::ArgMap;

const PHASE_ONE_VALUE: &str = "\".+\"|\\S+";
const PHASE_TWO_VALUE: &str = ".+";

/// The `${name}` placeholder syntax shared by formats and variable
/// references.
pub(crate) fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(r"\$\{(\w+)\}").expect("placeholder regex is valid"))
}

/// Placeholder names in declaration order.
pub fn placeholder_names(format: &str) -> Vec<String> {
    placeholder_regex()
        .captures_iter(format)
        .filter_map(|caps| caps.get(1).map(|name| name.as_str().to_string()))
        .collect()
}

/// Literal newlines become the two-character escape `\n` so that formats
/// stay single-line.
fn escape_newlines(input: &str) -> String {
    input.replace('\n', "\\n")
}

/// Compile a format into an anchored regex, substituting each placeholder
/// with `value_pattern` as a capture group. Literal segments are escaped.
/// `padded` wraps each group in `\s*` for extraction.
fn compile_format(format: &str, value_pattern: &str, padded: bool) -> Option<Regex> {
    let mut pattern = String::with_capacity(format.len() + 16);
    pattern.push('^');
    let mut last = 0;
    for placeholder in placeholder_regex().find_iter(format) {
        pattern.push_str(&regex::escape(&format[last..placeholder.start()]));
        if padded {
            pattern.push_str("\\s*");
        }
        pattern.push('(');
        pattern.push_str(value_pattern);
        pattern.push(')');
        if padded {
            pattern.push_str("\\s*");
        }
        last = placeholder.end();
    }
    pattern.push_str(&regex::escape(&format[last..]));
    pattern.push('$');

    match Regex::new(&pattern) {
        Ok(regex) => Some(regex),
        Err(error) => {
            tracing::debug!(format, %error, "format did not compile to a regex");
            None
        }
    }
}

/// Collect the formats an input matches.
///
/// Returns zero, one or many formats; callers treat more than one as
/// ambiguous. Exact literal equality always counts as a match.
pub fn matching_formats<'a, I>(input: &str, formats: I) -> Vec<&'a str>
where
    I: IntoIterator<Item = &'a str>,
    I::IntoIter: Clone,
{
    let input = escape_newlines(input);
    let formats = formats.into_iter();

    let strict: Vec<&str> = formats
        .clone()
        .filter(|format| {
            input == *format
                || compile_format(format, PHASE_ONE_VALUE, false)
                    .map(|regex| regex.is_match(&input))
                    .unwrap_or(false)
        })
        .collect();
    if !strict.is_empty() {
        return strict;
    }

    formats
        .filter(|format| {
            compile_format(format, PHASE_TWO_VALUE, false)
                .map(|regex| regex.is_match(&input))
                .unwrap_or(false)
        })
        .collect()
}

/// Extract named arguments from an input against a single format.
///
/// Quotes are stripped from captured values. Extraction is refused when the
/// free-whitespace phase would need two placeholders with no literal text
/// between them, since the boundary between the two values is undecidable.
pub fn extract_args(input: &str, format: &str) -> Result<ArgMap, CommandError> {
    let input = escape_newlines(input);
    let names = placeholder_names(format);

    let strict = compile_format(format, PHASE_ONE_VALUE, true)
        .ok_or_else(|| CommandError::parse(&input, format!("invalid format \"{format}\"")))?;

    let captures = match strict.captures(&input) {
        Some(captures) => captures,
        None => {
            if has_adjacent_placeholders(format) {
                return Err(CommandError::parse(
                    &input,
                    format!(
                        "format \"{format}\" has adjacent arguments; values containing \
                         whitespace must be double-quoted"
                    ),
                ));
            }
            let loose = compile_format(format, PHASE_TWO_VALUE, true).ok_or_else(|| {
                CommandError::parse(&input, format!("invalid format \"{format}\""))
            })?;
            loose.captures(&input).ok_or_else(|| {
                CommandError::parse(&input, format!("input does not match format \"{format}\""))
            })?
        }
    };

    if captures.len() - 1 != names.len() {
        return Err(CommandError::parse(
            &input,
            format!("argument count mismatch for format \"{format}\""),
        ));
    }

    let mut args = ArgMap::with_capacity(names.len());
    for (index, name) in names.into_iter().enumerate() {
        let value = captures
            .get(index + 1)
            .map(|m| m.as_str())
            .unwrap_or_default();
        args.insert(name, strip_quotes(value).to_string());
    }
    Ok(args)
}

/// True when two placeholders are separated by whitespace-only literal text.
fn has_adjacent_placeholders(format: &str) -> bool {
    let mut previous_end: Option<usize> = None;
    for placeholder in placeholder_regex().find_iter(format) {
        if let Some(end) = previous_end {
            let between = &format[end..placeholder.start()];
            if between.trim().is_empty() {
                return true;
            }
        }
        previous_end = Some(placeholder.end());
    }
    false
}

fn strip_quotes(value: &str) -> &str {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        &value[1..value.len() - 1]
    } else {
        value
    }
}
