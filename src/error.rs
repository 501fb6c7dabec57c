//! Error types for the parsing pipeline.
//!
//! Two disjoint failure families exist and must not be mixed:
//! [`LogTreeError`] is structural and fatal to the current transaction's log
//! parse; [`DecodeError`] is local to one instruction payload and is carried
//! inside [`crate::reader::Decoded::Malformed`] so sibling instructions keep
//! parsing.

use thiserror::Error;

/// Structural violation while rebuilding the program invocation tree from
/// log lines. Any of these means the log format assumption itself is broken
/// for this transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LogTreeError {
    /// A success/failed line names a program other than the currently open
    /// invocation.
    #[error("closing a different node: open {open}, closing {closing}")]
    ClosingDifferentNode { open: String, closing: String },

    /// An invocation's outcome was recorded twice.
    #[error("closing node twice: {address}")]
    ClosingNodeTwice { address: String },

    /// A log line arrived while no invocation was open.
    #[error("there is no current node for log line: {line}")]
    NoCurrentNode { line: String },
}

/// Failure decoding a binary instruction or log payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unexpected end of data: wanted {wanted} bytes at offset {offset}, {remaining} remaining")]
    UnexpectedEof {
        wanted: usize,
        offset: usize,
        remaining: usize,
    },

    /// A length-prefixed string claims more bytes than the buffer holds.
    /// Checked before any allocation happens.
    #[error("string length {len} exceeds remaining buffer of {remaining} bytes")]
    StringTooLong { len: usize, remaining: usize },

    #[error("invalid utf-8 in string field at offset {offset}")]
    InvalidUtf8 { offset: usize },
}
