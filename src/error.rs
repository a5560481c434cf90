//! Error types for pattern parsing and construction.
//!
//! Matching has no error type: a pattern either matches a buffer or it does not.

use crate::segment::Kind;

/// Textual pattern could not be turned into a [`Pattern`](crate::Pattern).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Parse error: {0}")]
    Syntax(String),
    #[error("Unknown specifier: {0}")]
    UnknownSpecifier(String),
    #[error("Invalid size: {0}")]
    InvalidSize(String),
    #[error("Invalid literal: {0}")]
    InvalidLiteral(String),
}

/// Construction failed. Nothing is returned to the caller on any of these.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("Missing value for pattern variable: {0}")]
    MissingBinding(String),
    #[error("Segment {segment}: size variable {name} is not bound")]
    UnboundSizeVariable { segment: String, name: String },
    #[error("Segment {segment}: size variable {name} is not a non-negative integer")]
    InvalidSizeVariable { segment: String, name: String },
    #[error("Segment {segment}: {bits}-bit {kind} is not supported")]
    UnsupportedWidth { segment: String, kind: Kind, bits: u64 },
    #[error("Segment {segment}: {bits} bits is not a whole number of bytes")]
    Misaligned { segment: String, bits: u64 },
    #[error("Segment {segment}: rest size is only valid for binary and string segments")]
    InvalidRest { segment: String },
    #[error("Segment {segment}: length {actual} exceeds declared size {capacity}")]
    FieldTooLarge { segment: String, capacity: u64, actual: u64 },
    #[error("Segment {segment}: {value} needs {digits} BCD digits, only {capacity} fit")]
    ValueTooLarge { segment: String, value: u64, digits: u64, capacity: u64 },
    #[error("Segment {segment}: expected {expected} bytes, value has {actual}")]
    LengthMismatch { segment: String, expected: u64, actual: u64 },
    #[error("Segment {segment}: expected {expected}, got {found}")]
    TypeMismatch { segment: String, expected: &'static str, found: &'static str },
    #[error("Segment {segment}: {value} does not fit in {bits} bits")]
    OutOfRange { segment: String, value: String, bits: u64 },
    #[error("Buffer overflow: {needed} bytes at offset {offset}, buffer holds {available}")]
    Overflow { offset: usize, needed: usize, available: usize },
}
