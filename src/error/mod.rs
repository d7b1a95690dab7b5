//! Error identity and stack parsing
//!
//! - `fingerprint` - deterministic identity for one-shot dedup
//! - `stack` - fixed-format stack-frame parser

pub mod fingerprint;
pub mod stack;

pub use fingerprint::{fingerprint, fingerprint_signal};
pub use stack::{parse_stack_frames, parse_stack_line, StackFrame, STACKTRACE_LIMIT};
