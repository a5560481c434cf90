//! Specialized matchers.
//!
//! [`compile`] looks at a pattern's static shape once: which reader each
//! segment needs, which widths are known up front (and already invalid), and
//! which result slot each bound name lands in. [`Matcher::decode`] then replays
//! that plan against each buffer without consulting the pattern again.
//!
//! A matcher accepts and rejects exactly the buffers
//! [`decode`](crate::decode::decode) does, with the same bindings.

use crate::decode::{self, BitCursor, Mismatch};
use crate::segment::{Endianness, Kind, Pattern, Segment, Size, Target, TextEncoding};
use crate::size::{self, Extent};
use crate::value::{Bindings, Value};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use std::borrow::Cow;
use std::fmt;

type IntReader = fn(&[u8]) -> Value<'static>;

/// Where a segment's width comes from.
#[derive(Clone)]
enum Width {
    /// Bits, known when compiling.
    Static(u64),
    /// `count * unit` bits; `count` from the slot filled earlier in this match, else from free variables.
    Dynamic { name: String, slot: Option<usize>, unit: u32 },
    Rest,
}

impl Width {
    fn resolve(&self, slots: &[Option<Value<'_>>], free: Option<&Bindings<'_>>) -> Result<Extent, Mismatch> {
        match self {
            Width::Static(bits) => Ok(Extent::Bits(*bits)),
            Width::Rest => Ok(Extent::Rest),
            Width::Dynamic { name, slot, unit } => {
                let count = match slot.and_then(|s| slots[s].as_ref()) {
                    Some(value) => size::size_value(name, Some(value))?,
                    None => size::size_value(name, free.and_then(|f| f.get(name)))?,
                };
                Ok(Extent::Bits(size::scaled(count, *unit)?))
            }
        }
    }

    fn bits(&self, slots: &[Option<Value<'_>>], free: Option<&Bindings<'_>>) -> Result<u64, Mismatch> {
        match self.resolve(slots, free)? {
            Extent::Bits(bits) => Ok(bits),
            Extent::Rest => Err(Mismatch::InvalidRest),
        }
    }
}

#[derive(Clone)]
enum Op {
    Skip(Width),
    /// Fixed 8/16/32/64-bit integer with a dedicated reader.
    FastInt { bits: u64, read: IntReader },
    Int { width: Width, endianness: Endianness, signed: bool },
    Float { width: Width, endianness: Endianness },
    Bcd(Width),
    Bytes { width: Width, terminated: bool },
    Text { width: Width, encoding: TextEncoding, terminated: bool },
    /// Never matches: the segment's static shape is invalid.
    Fail(Mismatch),
}

#[derive(Clone)]
enum Sink {
    Slot(usize),
    /// Literal segment the value is checked against.
    Literal(Segment),
    Discard,
}

#[derive(Clone)]
struct Step {
    op: Op,
    sink: Sink,
}

/// Reusable decoder for one pattern.
#[derive(Clone)]
pub struct Matcher {
    steps: Vec<Step>,
    names: Vec<String>,
}

/// Build a specialized matcher for `pattern`.
pub fn compile(pattern: &Pattern) -> Matcher {
    let names: Vec<String> = pattern.variables().into_iter().map(String::from).collect();
    let steps: Vec<Step> = pattern
        .segments()
        .iter()
        .map(|segment| Step {
            op: op_for(segment, &names),
            sink: match &segment.target {
                Target::Bind(name) => names
                    .iter()
                    .position(|n| n == name)
                    .map_or(Sink::Discard, Sink::Slot),
                Target::Literal(_) => Sink::Literal(segment.clone()),
                Target::Skip => Sink::Discard,
            },
        })
        .collect();
    log::debug!(
        "compiled `{}`: {} steps, {} bound names",
        pattern,
        steps.len(),
        names.len()
    );
    Matcher { steps, names }
}

fn op_for(segment: &Segment, names: &[String]) -> Op {
    let width = match &segment.size {
        Size::Fixed(n) => match size::scaled(*n, segment.unit) {
            Ok(bits) => Width::Static(bits),
            Err(e) => return Op::Fail(e.into()),
        },
        Size::Var(name) => Width::Dynamic {
            name: name.clone(),
            slot: names.iter().position(|n| n == name),
            unit: segment.unit,
        },
        Size::Rest => Width::Rest,
    };
    if segment.is_wildcard() {
        return Op::Skip(width);
    }
    match (segment.kind, width) {
        (Kind::Integer | Kind::Float | Kind::Bcd, Width::Rest) => Op::Fail(Mismatch::InvalidRest),
        (Kind::Integer, Width::Static(bits)) => match decode::int_width(bits) {
            Err(e) => Op::Fail(e),
            Ok(bits) => match int_reader(bits, segment.endianness, segment.signed) {
                Some(read) => Op::FastInt { bits, read },
                None => Op::Int {
                    width: Width::Static(bits),
                    endianness: segment.endianness,
                    signed: segment.signed,
                },
            },
        },
        (Kind::Integer, width) => Op::Int { width, endianness: segment.endianness, signed: segment.signed },
        (Kind::Float, Width::Static(bits)) if decode::float_width(bits).is_err() => {
            Op::Fail(Mismatch::UnsupportedWidth { kind: Kind::Float, bits })
        }
        (Kind::Float, width) => Op::Float { width, endianness: segment.endianness },
        (Kind::Bcd, Width::Static(bits)) if bits % 8 != 0 => {
            Op::Fail(Mismatch::UnsupportedWidth { kind: Kind::Bcd, bits })
        }
        (Kind::Bcd, width) => Op::Bcd(width),
        (Kind::Binary | Kind::String, Width::Static(bits)) if bits % 8 != 0 && !segment.zero_terminated => {
            Op::Fail(Mismatch::UnsupportedWidth { kind: segment.kind, bits })
        }
        (Kind::Binary, width) => Op::Bytes { width, terminated: segment.zero_terminated },
        (Kind::String, width) => Op::Text {
            width,
            encoding: segment.encoding,
            terminated: segment.zero_terminated,
        },
    }
}

fn int_reader(bits: u64, endianness: Endianness, signed: bool) -> Option<IntReader> {
    use Endianness::{Big, Little};
    let read: IntReader = match (bits, endianness, signed) {
        (8, _, false) => |b: &[u8]| Value::UInt(u64::from(b[0])),
        (8, _, true) => |b: &[u8]| Value::Int(i64::from(b[0] as i8)),
        (16, Big, false) => |b: &[u8]| Value::UInt(u64::from(BigEndian::read_u16(b))),
        (16, Big, true) => |b: &[u8]| Value::Int(i64::from(BigEndian::read_i16(b))),
        (16, Little, false) => |b: &[u8]| Value::UInt(u64::from(LittleEndian::read_u16(b))),
        (16, Little, true) => |b: &[u8]| Value::Int(i64::from(LittleEndian::read_i16(b))),
        (32, Big, false) => |b: &[u8]| Value::UInt(u64::from(BigEndian::read_u32(b))),
        (32, Big, true) => |b: &[u8]| Value::Int(i64::from(BigEndian::read_i32(b))),
        (32, Little, false) => |b: &[u8]| Value::UInt(u64::from(LittleEndian::read_u32(b))),
        (32, Little, true) => |b: &[u8]| Value::Int(i64::from(LittleEndian::read_i32(b))),
        (64, Big, false) => |b: &[u8]| Value::UInt(BigEndian::read_u64(b)),
        (64, Big, true) => |b: &[u8]| Value::Int(BigEndian::read_i64(b)),
        (64, Little, false) => |b: &[u8]| Value::UInt(LittleEndian::read_u64(b)),
        (64, Little, true) => |b: &[u8]| Value::Int(LittleEndian::read_i64(b)),
        _ => return None,
    };
    Some(read)
}

impl Op {
    fn execute<'a>(
        &self,
        cursor: &mut BitCursor<'a>,
        slots: &[Option<Value<'a>>],
        free: Option<&Bindings<'_>>,
    ) -> Result<Option<Value<'a>>, Mismatch> {
        let value = match self {
            Op::Fail(why) => return Err(why.clone()),
            Op::Skip(width) => {
                match width.resolve(slots, free)? {
                    Extent::Rest => cursor.skip_rest()?,
                    Extent::Bits(bits) => cursor.skip(bits)?,
                }
                return Ok(None);
            }
            Op::FastInt { bits, read } => read(cursor.take(*bits)?),
            Op::Int { width, endianness, signed } => {
                let bits = decode::int_width(width.bits(slots, free)?)?;
                decode::read_integer(cursor.take(bits)?, *endianness, *signed)
            }
            Op::Float { width, endianness } => {
                let bits = decode::float_width(width.bits(slots, free)?)?;
                decode::read_float(cursor.take(bits)?, *endianness)
            }
            Op::Bcd(width) => {
                let bits = decode::byte_width(Kind::Bcd, width.bits(slots, free)?)?;
                decode::read_bcd(cursor.take(bits)?)?
            }
            Op::Bytes { width, terminated } => {
                let extent = width.resolve(slots, free)?;
                Value::Bytes(Cow::Borrowed(decode::take_bytes(cursor, Kind::Binary, extent, 1, *terminated)?))
            }
            Op::Text { width, encoding, terminated } => {
                let extent = width.resolve(slots, free)?;
                let bytes = decode::take_bytes(cursor, Kind::String, extent, encoding.expansion(), *terminated)?;
                decode::read_text(bytes, *encoding)?
            }
        };
        Ok(Some(value))
    }
}

impl Matcher {
    /// Names this matcher binds, in first-binding order.
    pub fn variables(&self) -> &[String] {
        &self.names
    }

    /// Match `bin`; see [`decode`](crate::decode::decode).
    pub fn decode<'a>(&self, bin: &'a [u8], free: Option<&Bindings<'_>>) -> Option<Bindings<'a>> {
        let mut slots: Vec<Option<Value<'a>>> = vec![None; self.names.len()];
        if let Err((index, why)) = self.run(bin, free, &mut slots) {
            log::trace!("compiled pattern does not match at step {}: {:?}", index, why);
            return None;
        }
        Some(
            self.names
                .iter()
                .zip(slots)
                .filter_map(|(name, value)| value.map(|v| (name.clone(), v)))
                .collect(),
        )
    }

    fn run<'a>(
        &self,
        bin: &'a [u8],
        free: Option<&Bindings<'_>>,
        slots: &mut [Option<Value<'a>>],
    ) -> Result<(), (usize, Mismatch)> {
        let mut cursor = BitCursor::new(bin);
        for (index, step) in self.steps.iter().enumerate() {
            let value = step.op.execute(&mut cursor, slots, free).map_err(|e| (index, e))?;
            match (&step.sink, value) {
                (Sink::Slot(slot), Some(value)) => slots[*slot] = Some(value),
                (Sink::Literal(segment), Some(value)) if !segment.literal_matches(&value) => {
                    return Err((index, Mismatch::Literal));
                }
                _ => {}
            }
        }
        cursor.finish().map_err(|e| (self.steps.len(), e))
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matcher")
            .field("steps", &self.steps.len())
            .field("names", &self.names)
            .finish()
    }
}
