use crate::models::scan::{Finding, Severity};
use lazy_static::lazy_static;
use log::warn;
use regex::Regex;
use serde_json::Value;

pub const MAX_ISSUE_CHARS: usize = 250;
pub const MAX_FIX_CHARS: usize = 400;

const DEFAULT_FIX: &str = "Review this code path and apply secure coding practices.";

lazy_static! {
    static ref TRAILING_COMMA: Regex = Regex::new(r",\s*([\]\}])").unwrap();
}

/// Validating parser for the completion output. Whatever the model returned,
/// the result is a findings list inside the declared shape and bounds; parse
/// failures surface as a single synthetic finding, never as an error.
pub fn parse_findings(raw: &str) -> Vec<Finding> {
    let stripped = strip_code_fences(raw);

    let Some(candidate) = find_balanced_array(stripped) else {
        warn!("No JSON array found in completion output");
        return vec![parse_failure_finding()];
    };

    let parsed = match serde_json::from_str::<Value>(candidate) {
        Ok(value) => value,
        Err(first_error) => {
            let repaired = repair_json(candidate);
            match serde_json::from_str::<Value>(&repaired) {
                Ok(value) => value,
                Err(second_error) => {
                    warn!(
                        "Completion output unparseable (parse: {}, repair: {})",
                        first_error, second_error
                    );
                    return vec![parse_failure_finding()];
                }
            }
        }
    };

    normalize_findings(&parsed)
}

fn parse_failure_finding() -> Finding {
    Finding::synthetic(
        "Failed to parse analysis output",
        "Re-run the scan; the detection service returned malformed output",
    )
}

/// The model is instructed not to wrap its answer in markdown, but does so
/// anyway often enough to defend against.
fn strip_code_fences(raw: &str) -> &str {
    raw.trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// First balanced `[...]` substring, string- and escape-aware, so prose
/// before or after the payload does not break extraction.
fn find_balanced_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '[' if !in_string => depth += 1,
            ']' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Best-effort single repair pass: trailing commas, single quotes, literal
/// newlines. Applied once; a second failure degrades to a synthetic finding.
fn repair_json(candidate: &str) -> String {
    let without_trailing = TRAILING_COMMA.replace_all(candidate, "$1").into_owned();
    without_trailing
        .replace('\'', "\"")
        .replace('\n', " ")
        .replace('\r', " ")
}

pub fn normalize_findings(parsed: &Value) -> Vec<Finding> {
    let Some(entries) = parsed.as_array() else {
        return Vec::new();
    };
    entries.iter().filter_map(normalize_entry).collect()
}

fn normalize_entry(raw: &Value) -> Option<Finding> {
    let entry = raw.as_object()?;

    // An element carrying neither an issue nor a severity has no signal
    // worth keeping.
    if !entry.contains_key("issue") && !entry.contains_key("severity") {
        return None;
    }

    Some(Finding {
        file: string_field(entry.get("file"), "unknown"),
        line: line_field(entry.get("line")),
        severity: severity_field(entry.get("severity")),
        issue: clamp_chars(&string_field(entry.get("issue"), ""), MAX_ISSUE_CHARS),
        fix_suggestion: clamp_chars(
            &string_field(entry.get("fix_suggestion"), DEFAULT_FIX),
            MAX_FIX_CHARS,
        ),
    })
}

fn string_field(value: Option<&Value>, default: &str) -> String {
    match value {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::Bool(flag)) => flag.to_string(),
        _ => default.to_string(),
    }
}

fn line_field(value: Option<&Value>) -> usize {
    let line = match value {
        Some(Value::Number(number)) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|float| float as i64))
            .unwrap_or(1),
        Some(Value::String(text)) => text.trim().parse::<i64>().unwrap_or(1),
        _ => 1,
    };
    line.max(1) as usize
}

/// Closed enum: anything but an exact match coerces to Low rather than
/// being dropped.
fn severity_field(value: Option<&Value>) -> Severity {
    match value.and_then(Value::as_str) {
        Some("Critical") => Severity::Critical,
        Some("High") => Severity::High,
        Some("Low") => Severity::Low,
        _ => Severity::Low,
    }
}

fn clamp_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
