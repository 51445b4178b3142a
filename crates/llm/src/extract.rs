//! Response Extraction and Repair
//!
//! Backends are asked for JSON but answer in free text: prose around a fenced
//! block, a bare object, or an object cut off by the token limit. This module
//! recovers a `serde_json::Value` from that text, trying the cheap strategies
//! first and falling back to a structural repair of truncated output.
//!
//! Order (first success wins):
//!
//! 1. the first closed fenced code block, with or without a language tag
//! 2. the span from the first `{` to the last `}`
//! 3. the whole trimmed text
//! 4. [`repair_json`] applied to each candidate in turn, then parsed again
//!
//! Repair never changes already-valid JSON.

use serde_json::Value;
use tracing::debug;

use crate::types::{LlmError, LlmResult};

/// Characters of the raw response kept in a parse error message.
pub const ERROR_PREVIEW_CHARS: usize = 200;

/// Which strategy produced the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractStrategy {
    FencedBlock,
    BraceSpan,
    WholeText,
    Repaired,
}

/// A JSON value recovered from response text.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub value: Value,
    pub strategy: ExtractStrategy,
}

/// Recover a JSON value from raw backend text.
pub fn extract_json(text: &str) -> LlmResult<Extracted> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(LlmError::ParseError {
            message: "response contained no text".to_string(),
        });
    }

    let fence = find_fence(trimmed);

    if let Some(fence) = fence.filter(|f| f.closed) {
        if let Ok(value) = serde_json::from_str::<Value>(fence.body) {
            return Ok(found(value, ExtractStrategy::FencedBlock));
        }
    }

    if let Some(span) = brace_span(trimmed) {
        if let Ok(value) = serde_json::from_str::<Value>(span) {
            return Ok(found(value, ExtractStrategy::BraceSpan));
        }
    }

    let whole_err = match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => return Ok(found(value, ExtractStrategy::WholeText)),
        Err(e) => e,
    };

    let candidates = repair_candidates(trimmed, fence);
    let mut first_failure: Option<(String, &str, serde_json::Error)> = None;
    for candidate in candidates {
        let repaired = repair_json(candidate);
        debug!(
            len = text.len(),
            candidate_len = candidate.len(),
            "extract: attempting structural repair"
        );
        match serde_json::from_str::<Value>(&repaired) {
            Ok(value) => return Ok(found(value, ExtractStrategy::Repaired)),
            Err(e) if first_failure.is_none() => first_failure = Some((repaired, candidate, e)),
            Err(_) => {}
        }
    }

    // Report the repair failure when repair actually changed something,
    // otherwise the plain parse error is the more useful one.
    let parser_message = match first_failure {
        Some((repaired, candidate, repair_err)) if repaired != candidate => repair_err.to_string(),
        _ => whole_err.to_string(),
    };
    Err(LlmError::ParseError {
        message: format!(
            "no JSON found in response (length {}, preview {:?}): {}",
            text.chars().count(),
            text.chars().take(ERROR_PREVIEW_CHARS).collect::<String>(),
            parser_message
        ),
    })
}

fn found(value: Value, strategy: ExtractStrategy) -> Extracted {
    debug!(strategy = ?strategy, "extract: parsed response JSON");
    Extracted { value, strategy }
}

#[derive(Debug, Clone, Copy)]
struct Fence<'a> {
    body: &'a str,
    closed: bool,
}

/// Locate the first fenced block. An unterminated fence runs to end of text.
fn find_fence(text: &str) -> Option<Fence<'_>> {
    let start = text.find("```")?;
    let after = &text[start + 3..];

    let body_start = match after.find('\n') {
        Some(nl) if is_language_tag(&after[..nl]) => nl + 1,
        None if is_language_tag(after) => after.len(),
        _ => 0,
    };
    let body = &after[body_start..];

    Some(match body.find("```") {
        Some(end) => Fence {
            body: body[..end].trim(),
            closed: true,
        },
        None => Fence {
            body: body.trim(),
            closed: false,
        },
    })
}

fn is_language_tag(line: &str) -> bool {
    line.trim()
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+' | '.'))
}

fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start <= end).then(|| &text[start..=end])
}

/// Texts worth repairing, best first: an unclosed fence body, then the text
/// from the first `{` or `[`, then from the first `{` when a stray `[` came
/// earlier in the prose.
fn repair_candidates<'a>(trimmed: &'a str, fence: Option<Fence<'a>>) -> Vec<&'a str> {
    if let Some(fence) = fence {
        if fence.body.starts_with('{') || fence.body.starts_with('[') {
            return vec![fence.body];
        }
    }
    let opener = trimmed.find(|c: char| c == '{' || c == '[');
    let object = trimmed.find('{');
    match (opener, object) {
        (Some(start), Some(obj)) if obj != start => vec![&trimmed[start..], &trimmed[obj..]],
        (Some(start), _) => vec![&trimmed[start..]],
        (None, _) => vec![trimmed],
    }
}

/// Close whatever a truncated JSON document left open.
///
/// Scans once, tracking string state (with backslash escapes) and a stack of
/// open `{`/`[`. At end of input: a dangling backslash inside a string is
/// dropped, an open string is closed, trailing whitespace and a dangling `,`
/// are removed, and open brackets are closed innermost first.
pub fn repair_json(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 8);
    let mut closers: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for ch in input.chars() {
        out.push(ch);
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => closers.push('}'),
            '[' => closers.push(']'),
            '}' | ']' => {
                if closers.last() == Some(&ch) {
                    closers.pop();
                }
            }
            _ => {}
        }
    }

    if in_string {
        if escaped {
            out.pop();
        }
        out.push('"');
    }

    let len = out.trim_end().len();
    out.truncate(len);
    if out.ends_with(',') {
        out.pop();
        let len = out.trim_end().len();
        out.truncate(len);
    }

    while let Some(close) = closers.pop() {
        out.push(close);
    }
    out
}
