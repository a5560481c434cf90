//! Parse textual bit-syntax patterns using PEST.
//!
//! ```text
//! len:16/little, payload:len/binary, "END", _/binary
//! ```

use crate::error::ParseError;
use crate::segment::{Literal, Pattern, Segment, Size, Specifier};
use pest::Parser;
use pest_derive::Parser as PestParser;

#[derive(PestParser)]
#[grammar = "grammar.pest"]
struct PatternParser;

/// Parse pattern source into a [`Pattern`].
pub fn parse(source: &str) -> Result<Pattern, ParseError> {
    let pairs = PatternParser::parse(Rule::pattern, source)
        .map_err(|e| ParseError::Syntax(e.to_string()))?;
    let pair = pairs
        .into_iter()
        .next()
        .ok_or_else(|| ParseError::Syntax("empty parse".to_string()))?;
    let mut segments = Vec::new();
    for inner in pair.into_inner() {
        if inner.as_rule() == Rule::segment {
            segments.push(build_segment(inner)?);
        }
    }
    Ok(Pattern::new(segments))
}

fn build_segment(pair: pest::iterators::Pair<Rule>) -> Result<Segment, ParseError> {
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| ParseError::Syntax("empty segment".to_string()))?;
    match inner.as_rule() {
        Rule::quoted => {
            let text = inner.into_inner().next().map(|t| t.as_str()).unwrap_or("");
            Ok(Segment::string(unescape(text)))
        }
        Rule::field => build_field(inner),
        other => Err(ParseError::Syntax(format!("unexpected {:?}", other))),
    }
}

fn build_field(pair: pest::iterators::Pair<Rule>) -> Result<Segment, ParseError> {
    let mut parts = pair.into_inner();
    let head = parts
        .next()
        .ok_or_else(|| ParseError::Syntax("segment: missing name or value".to_string()))?;
    let mut size = None;
    let mut specifiers = Vec::new();
    for part in parts {
        match part.as_rule() {
            Rule::integer => {
                let n = part
                    .as_str()
                    .parse::<u64>()
                    .map_err(|_| ParseError::InvalidSize(part.as_str().to_string()))?;
                size = Some(Size::Fixed(n));
            }
            Rule::ident => size = Some(Size::Var(part.as_str().to_string())),
            Rule::specifiers => {
                for spec in part.into_inner() {
                    match spec.as_str().parse::<Specifier>() {
                        Ok(specifier) => specifiers.push(specifier),
                        Err(ParseError::UnknownSpecifier(word)) => {
                            log::debug!("ignoring unknown specifier `{}`", word);
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
            _ => {}
        }
    }
    match head.as_rule() {
        Rule::number => Ok(Segment::value(parse_number(head.as_str())?, size, &specifiers)),
        Rule::ident => Ok(Segment::variable(head.as_str(), size, &specifiers)),
        other => Err(ParseError::Syntax(format!("unexpected {:?}", other))),
    }
}

fn parse_number(s: &str) -> Result<Literal, ParseError> {
    if s.contains('.') {
        s.parse::<f64>()
            .map(Literal::Float)
            .map_err(|_| ParseError::InvalidLiteral(s.to_string()))
    } else {
        s.parse::<i64>()
            .map(Literal::Int)
            .map_err(|_| ParseError::InvalidLiteral(s.to_string()))
    }
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
