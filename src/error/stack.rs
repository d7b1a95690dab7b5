//! Stack-trace line parser
//!
//! Raw stacks arrive as one string: a message line followed by `at ...`
//! frame lines. A single fixed-format pattern extracts function name, file,
//! line and column. Lines that do not match the pattern are skipped entirely
//! (they produce no frame and do not count toward the frame budget); parsing
//! stops after the first `STACKTRACE_LIMIT` resolved frames.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

/// Only the first 10 resolved frames are kept.
pub const STACKTRACE_LIMIT: usize = 10;

/// One parsed stack frame. Unresolvable positions stay `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StackFrame {
    pub function_name: String,
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lineno: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colno: Option<u32>,
}

fn frame_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)^\s*at (?:(.*?) ?\()?((?:file|https?|blob|chrome-extension|address|native|eval|webpack|<anonymous>|[-a-z]+:|.*bundle|/).*?)(?::(\d+))?(?::(\d+))?\)?\s*$",
        )
        .expect("stack frame pattern is valid")
    })
}

/// Parse a single frame line. Returns `None` when the line does not have the
/// expected shape.
pub fn parse_stack_line(line: &str) -> Option<StackFrame> {
    let captures = frame_pattern().captures(line)?;
    let function_name = captures
        .get(1)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();
    let filename = captures.get(2)?.as_str().to_string();
    let lineno = captures.get(3).and_then(|m| m.as_str().parse().ok());
    let colno = captures.get(4).and_then(|m| m.as_str().parse().ok());
    Some(StackFrame {
        function_name,
        filename,
        lineno,
        colno,
    })
}

/// Parse a raw stack string: drop the message line, parse the rest, keep the
/// first `STACKTRACE_LIMIT` resolved frames.
pub fn parse_stack_frames(stack: &str) -> Vec<StackFrame> {
    stack
        .lines()
        .skip(1)
        .filter_map(parse_stack_line)
        .take(STACKTRACE_LIMIT)
        .collect()
}
