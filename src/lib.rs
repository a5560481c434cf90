//! # bitsyntax: Erlang-style bit syntax for Rust
//!
//! Describe a binary layout once as a [`Pattern`] and use it both to match
//! (decode) buffers into named values and to construct (encode) buffers from
//! named values.
//!
//! ## Pattern text
//!
//! A pattern is a comma-separated list of segments. Each segment is either a
//! quoted string literal or `name_or_literal[:size][/specifier(-specifier)*]`:
//!
//! - name: an identifier to bind, `_` to skip, or a number to match literally
//! - size: a count, or the name of a variable bound earlier in the pattern
//! - specifiers: `integer`, `float`, `binary`, `utf8`, `bcd`, `signed`,
//!   `unsigned`, `big`, `little`, `unit:N`, and for strings `z`, `left`,
//!   `right`, `space`, `hex`, `bits`
//!
//! Defaults: integer, big-endian, unsigned; unit 1 for integers and floats,
//! 8 otherwise; size 8 for integers, 64 for floats, all remaining bytes for
//! binaries and strings.
//!
//! ## Example
//!
//! ```text
//! let pattern = bitsyntax::parse("len:16, payload:len/binary, crc:32/little")?;
//! let bound = pattern.decode(&bytes).ok_or("no match")?;
//! let again = pattern.build(&bound)?;
//! ```
//!
//! A match consumes the whole buffer or fails; it never returns partial
//! bindings. Construction reports precise [`BuildError`]s.
//!
//! For repeated matching against one pattern, [`compile`] it into a
//! [`Matcher`] first.

pub mod compile;
pub mod decode;
pub mod encode;
pub mod error;
pub mod parser;
pub mod segment;
pub mod size;
pub mod value;

pub use compile::{compile, Matcher};
pub use decode::decode;
pub use encode::{build, size_of, write, Builder};
pub use error::{BuildError, ParseError};
pub use parser::parse;
pub use segment::{
    Endianness, Justify, Kind, Literal, Padding, Pattern, Segment, Size, Specifier, Target,
    TextEncoding, WILDCARD,
};
pub use value::{Bindings, Value};

/// Parse `source` and compile it into a [`Matcher`].
pub fn matcher(source: &str) -> Result<Matcher, ParseError> {
    Ok(compile(&parse(source)?))
}

/// Parse `source` into a reusable [`Builder`].
pub fn builder(source: &str) -> Result<Builder, ParseError> {
    Ok(Builder::new(parse(source)?))
}
