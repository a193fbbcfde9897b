use crate::errors::ScanError;
use crate::models::scan::ScanRequest;
use lazy_static::lazy_static;
use regex::Regex;

pub const MIN_SNIPPET_CHARS: usize = 10;
pub const MAX_SNIPPET_CHARS: usize = 50_000;

lazy_static! {
    // Owner and repository name restricted to word characters, dots and
    // hyphens; anything looser is rejected here before the materializer
    // ever parses it.
    static ref REPO_URL_SHAPE: Regex = Regex::new(r"github\.com/[\w.-]+/[\w.-]+").unwrap();
}

/// Gate on the raw submission. Rules are checked in order and the first
/// failure wins; no side effects, no external calls.
pub fn validate_scan_request(request: &ScanRequest) -> Result<(), ScanError> {
    if request.scan_type != "repo" && request.scan_type != "snippet" {
        return Err(ScanError::validation(
            "invalid type: must be 'repo' or 'snippet'",
        ));
    }

    if request.content.is_empty() {
        return Err(ScanError::validation("missing content"));
    }

    if request.scan_type == "repo" {
        if !REPO_URL_SHAPE.is_match(&request.content) {
            return Err(ScanError::validation("invalid repository URL format"));
        }
    } else {
        if request.content.trim().chars().count() < MIN_SNIPPET_CHARS {
            return Err(ScanError::validation(format!(
                "snippet too short: minimum {} characters",
                MIN_SNIPPET_CHARS
            )));
        }
        if request.content.chars().count() > MAX_SNIPPET_CHARS {
            return Err(ScanError::validation(format!(
                "snippet too large: maximum {} characters",
                MAX_SNIPPET_CHARS
            )));
        }
    }

    Ok(())
}
