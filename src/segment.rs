//! Segment model: one field of a bit-syntax pattern, and the pattern itself.
//!
//! A [`Segment`] carries everything needed to match or construct one field:
//! its kind, what happens to the value (bind, skip, compare to a literal), its
//! size in units, and the encoding flags. Defaults are derived from the
//! specifier list the same way for direct construction and for parsed text.

use crate::compile::Matcher;
use crate::error::{BuildError, ParseError};
use crate::value::{Bindings, Value};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// Name that consumes a segment without binding it.
pub const WILDCARD: &str = "_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Integer,
    Float,
    Binary,
    String,
    Bcd,
}

impl Kind {
    fn default_unit(self) -> u32 {
        match self {
            Kind::Integer | Kind::Float => 1,
            Kind::Binary | Kind::String | Kind::Bcd => 8,
        }
    }

    fn default_size(self) -> Size {
        match self {
            Kind::Integer => Size::Fixed(8),
            Kind::Float => Size::Fixed(64),
            Kind::Binary | Kind::String => Size::Rest,
            Kind::Bcd => Size::Fixed(1),
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Kind::Integer => "integer",
            Kind::Float => "float",
            Kind::Binary => "binary",
            Kind::String => "utf8",
            Kind::Bcd => "bcd",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endianness {
    #[default]
    Big,
    Little,
}

/// Declared size, in units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Size {
    Fixed(u64),
    /// Value of a variable bound earlier in the pattern (or supplied as a free variable).
    Var(String),
    /// Everything remaining.
    Rest,
}

/// Exact value a literal segment must match, or writes.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
}

impl Literal {
    pub fn matches(&self, value: &Value<'_>) -> bool {
        self.to_value().same_as(value)
    }

    pub fn to_value(&self) -> Value<'_> {
        match self {
            Literal::Int(i) => Value::Int(*i),
            Literal::Float(x) => Value::Float(*x),
            Literal::Str(s) => Value::Str(Cow::Borrowed(s)),
            Literal::Bytes(b) => Value::Bytes(Cow::Borrowed(b)),
        }
    }

    fn natural_kind(&self) -> Kind {
        match self {
            Literal::Int(_) => Kind::Integer,
            Literal::Float(_) => Kind::Float,
            Literal::Str(_) => Kind::String,
            Literal::Bytes(_) => Kind::Binary,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(i) => write!(f, "{}", i),
            Literal::Float(x) if x.is_finite() && x.fract() == 0.0 => write!(f, "{}.0", x),
            Literal::Float(x) => write!(f, "{}", x),
            Literal::Str(s) => write!(f, "\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
            Literal::Bytes(b) => write!(f, "0x{}", hex::encode(b)),
        }
    }
}

/// What a segment does with its value.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Bind(String),
    /// `_`: consume on match, zero-fill on build.
    Skip,
    Literal(Literal),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Justify {
    Left,
    Right,
}

/// Padding of string values to the declared width.
///
/// `Justify::Left` pads on the left (right-aligned text), `Justify::Right` on the right.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Padding {
    pub justify: Justify,
    pub fill: char,
}

/// How string text is laid out on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    #[default]
    Plain,
    /// Lowercase hex digits of the UTF-8 bytes.
    Hex,
    /// Eight `0`/`1` digits per UTF-8 byte.
    Bits,
}

impl TextEncoding {
    /// Wire bytes per byte of text.
    pub fn expansion(self) -> u64 {
        match self {
            TextEncoding::Plain => 1,
            TextEncoding::Hex => 2,
            TextEncoding::Bits => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Specifier {
    Little,
    Big,
    Signed,
    Unsigned,
    Unit(u32),
    Integer,
    Float,
    Binary,
    Utf8,
    Bcd,
    /// Zero-terminated.
    Zero,
    Left,
    Right,
    Space,
    Hex,
    Bits,
}

impl Specifier {
    fn kind(self) -> Option<Kind> {
        match self {
            Specifier::Integer => Some(Kind::Integer),
            Specifier::Float => Some(Kind::Float),
            Specifier::Binary => Some(Kind::Binary),
            Specifier::Utf8 => Some(Kind::String),
            Specifier::Bcd => Some(Kind::Bcd),
            _ => None,
        }
    }
}

impl FromStr for Specifier {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(n) = s.strip_prefix("unit:") {
            return match n.parse::<u32>() {
                Ok(unit @ 1..=256) => Ok(Specifier::Unit(unit)),
                _ => Err(ParseError::InvalidSize(s.to_string())),
            };
        }
        Ok(match s {
            "little" => Specifier::Little,
            "big" => Specifier::Big,
            "signed" => Specifier::Signed,
            "unsigned" => Specifier::Unsigned,
            "integer" => Specifier::Integer,
            "float" => Specifier::Float,
            "binary" => Specifier::Binary,
            "utf8" | "string" => Specifier::Utf8,
            "bcd" => Specifier::Bcd,
            "z" => Specifier::Zero,
            "left" => Specifier::Left,
            "right" => Specifier::Right,
            "space" => Specifier::Space,
            "hex" => Specifier::Hex,
            "bits" => Specifier::Bits,
            _ => return Err(ParseError::UnknownSpecifier(s.to_string())),
        })
    }
}

/// One field of a [`Pattern`].
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub kind: Kind,
    pub target: Target,
    pub size: Size,
    /// Bits per size unit.
    pub unit: u32,
    pub signed: bool,
    pub endianness: Endianness,
    pub padding: Option<Padding>,
    pub encoding: TextEncoding,
    /// Declared size is a capacity; the wire form is the content plus one zero byte.
    pub zero_terminated: bool,
}

impl Segment {
    /// Segment bound to `name` (`_` makes it a wildcard).
    pub fn variable(name: impl Into<String>, size: Option<Size>, specifiers: &[Specifier]) -> Self {
        let name = name.into();
        let target = if name == WILDCARD {
            Target::Skip
        } else {
            Target::Bind(name)
        };
        Self::from_specifiers(target, Kind::Integer, size, specifiers)
    }

    /// Literal segment. Without a type specifier the kind follows the literal.
    pub fn value(literal: Literal, size: Option<Size>, specifiers: &[Specifier]) -> Self {
        let kind = literal.natural_kind();
        let size = size.or_else(|| match &literal {
            Literal::Str(s) => Some(Size::Fixed(s.len() as u64)),
            Literal::Bytes(b) => Some(Size::Fixed(b.len() as u64)),
            _ => None,
        });
        Self::from_specifiers(Target::Literal(literal), kind, size, specifiers)
    }

    /// UTF-8 string literal; occupies exactly its byte length.
    pub fn string(text: impl Into<String>) -> Self {
        Self::value(Literal::Str(text.into()), None, &[])
    }

    /// Wildcard consuming all remaining bytes.
    pub fn rest() -> Self {
        Self::variable(WILDCARD, Some(Size::Rest), &[Specifier::Binary])
    }

    fn from_specifiers(
        target: Target,
        fallback: Kind,
        size: Option<Size>,
        specifiers: &[Specifier],
    ) -> Self {
        let kind = specifiers
            .iter()
            .rev()
            .find_map(|s| s.kind())
            .unwrap_or(fallback);
        let unit = specifiers
            .iter()
            .rev()
            .find_map(|s| match s {
                Specifier::Unit(u) => Some(*u),
                _ => None,
            })
            .unwrap_or_else(|| kind.default_unit());
        let last_of = |a: Specifier, b: Specifier| specifiers.iter().rev().find(|s| **s == a || **s == b).copied();
        let signed = last_of(Specifier::Signed, Specifier::Unsigned) == Some(Specifier::Signed);
        let endianness = match last_of(Specifier::Little, Specifier::Big) {
            Some(Specifier::Little) => Endianness::Little,
            _ => Endianness::Big,
        };
        let padding = last_of(Specifier::Left, Specifier::Right).map(|side| Padding {
            justify: if side == Specifier::Left { Justify::Left } else { Justify::Right },
            fill: if specifiers.contains(&Specifier::Space) { ' ' } else { '0' },
        });
        let encoding = match last_of(Specifier::Hex, Specifier::Bits) {
            Some(Specifier::Hex) => TextEncoding::Hex,
            Some(Specifier::Bits) => TextEncoding::Bits,
            _ => TextEncoding::Plain,
        };
        Segment {
            kind,
            target,
            size: size.unwrap_or_else(|| kind.default_size()),
            unit,
            signed,
            endianness,
            padding,
            encoding,
            zero_terminated: specifiers.contains(&Specifier::Zero),
        }
    }

    pub fn name(&self) -> Option<&str> {
        match &self.target {
            Target::Bind(name) => Some(name),
            _ => None,
        }
    }

    pub fn literal(&self) -> Option<&Literal> {
        match &self.target {
            Target::Literal(lit) => Some(lit),
            _ => None,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.target == Target::Skip
    }

    /// Whether a decoded `value` equals this segment's literal as construction would have written it.
    ///
    /// String segments compare text: a numeric literal is compared through its decimal form, padded
    /// to the decoded width when the segment pads. Segments without a literal accept anything.
    pub fn literal_matches(&self, value: &Value<'_>) -> bool {
        let lit = match &self.target {
            Target::Literal(lit) => lit,
            _ => return true,
        };
        let text = match (self.kind, value) {
            (Kind::String, Value::Str(text)) => text,
            _ => return lit.matches(value),
        };
        let expected = match lit {
            Literal::Bytes(b) => match std::str::from_utf8(b) {
                Ok(s) => s.to_string(),
                Err(_) => return false,
            },
            other => other.to_value().to_string(),
        };
        match self.padding {
            Some(padding) if expected.len() < text.len() => {
                let fill: String = std::iter::repeat(padding.fill)
                    .take(text.len() - expected.len())
                    .collect();
                let padded = match padding.justify {
                    Justify::Left => fill + &expected,
                    Justify::Right => expected + &fill,
                };
                padded == **text
            }
            _ => expected == **text,
        }
    }

    /// Name used to identify the segment in errors and logs.
    pub fn label(&self) -> String {
        match &self.target {
            Target::Bind(name) => name.clone(),
            Target::Skip => WILDCARD.to_string(),
            Target::Literal(lit) => lit.to_string(),
        }
    }

    fn specifier_words(&self) -> Vec<String> {
        let mut words = Vec::new();
        if self.kind != Kind::Integer {
            words.push(self.kind.to_string());
        }
        if self.signed {
            words.push("signed".to_string());
        }
        if self.endianness == Endianness::Little {
            words.push("little".to_string());
        }
        if self.unit != self.kind.default_unit() {
            words.push(format!("unit:{}", self.unit));
        }
        if self.zero_terminated {
            words.push("z".to_string());
        }
        if let Some(p) = self.padding {
            words.push(if p.justify == Justify::Left { "left" } else { "right" }.to_string());
            if p.fill == ' ' {
                words.push("space".to_string());
            }
        }
        match self.encoding {
            TextEncoding::Hex => words.push("hex".to_string()),
            TextEncoding::Bits => words.push("bits".to_string()),
            TextEncoding::Plain => {}
        }
        words
    }
}

/// Textual form; parses back to an equal segment. String literals with a
/// non-default shape, byte literals and non-finite float literals have no
/// textual form and print as-is.
impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Target::Literal(lit @ Literal::Str(_)) = &self.target {
            return write!(f, "{}", lit);
        }
        write!(f, "{}", self.label())?;
        match &self.size {
            size if *size == self.kind.default_size() => {}
            Size::Fixed(n) => write!(f, ":{}", n)?,
            Size::Var(name) => write!(f, ":{}", name)?,
            Size::Rest => {}
        }
        let words = self.specifier_words();
        if !words.is_empty() {
            write!(f, "/{}", words.join("-"))?;
        }
        Ok(())
    }
}

/// Ordered sequence of segments describing a complete binary layout. Immutable once built.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Pattern {
    segments: Vec<Segment>,
}

impl Pattern {
    pub fn new(segments: Vec<Segment>) -> Self {
        Pattern { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Names bound by this pattern, in first-binding order.
    pub fn variables(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for name in self.segments.iter().filter_map(Segment::name) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    pub fn decode<'a>(&self, bin: &'a [u8]) -> Option<Bindings<'a>> {
        crate::decode::decode(self, bin, None)
    }

    /// Match with free variables visible to size expressions.
    pub fn decode_with<'a>(&self, bin: &'a [u8], free: &Bindings<'_>) -> Option<Bindings<'a>> {
        crate::decode::decode(self, bin, Some(free))
    }

    pub fn build(&self, bindings: &Bindings<'_>) -> Result<Vec<u8>, BuildError> {
        crate::encode::build(self, bindings)
    }

    pub fn compile(&self) -> Matcher {
        crate::compile::compile(self)
    }
}

impl FromStr for Pattern {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        crate::parser::parse(s)
    }
}

impl FromIterator<Segment> for Pattern {
    fn from_iter<I: IntoIterator<Item = Segment>>(iter: I) -> Self {
        Pattern::new(iter.into_iter().collect())
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}
