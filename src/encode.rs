//! Construction: write bound values into a buffer shaped by a pattern.
//!
//! Building is two-pass. Every segment is first turned into its encoded form
//! (which resolves sizes and validates values) and the total is summed; only
//! then is one buffer of exactly that size allocated and filled. Any error
//! aborts the build before a single byte is written.

use crate::error::BuildError;
use crate::segment::{Endianness, Justify, Kind, Pattern, Segment, Target, TextEncoding};
use crate::size::{self, Extent};
use crate::value::{Bindings, Value};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use std::borrow::Cow;

/// Encoded form of one segment, ready to be copied into place.
enum Field<'v> {
    Zero(usize),
    Int { raw: u64, bytes: usize, signed: bool, endianness: Endianness },
    Float { value: f64, bytes: usize, endianness: Endianness },
    Bcd { value: u64, bytes: usize },
    Bytes { data: Cow<'v, [u8]>, terminated: bool },
}

impl Field<'_> {
    fn len(&self) -> usize {
        match self {
            Field::Zero(n) => *n,
            Field::Int { bytes, .. } | Field::Float { bytes, .. } | Field::Bcd { bytes, .. } => *bytes,
            Field::Bytes { data, terminated } => data.len() + usize::from(*terminated),
        }
    }

    /// `out` is exactly `self.len()` bytes.
    fn write_into(&self, out: &mut [u8]) {
        match self {
            Field::Zero(_) => out.fill(0),
            Field::Int { raw, bytes, signed: false, endianness } => match endianness {
                Endianness::Big => BigEndian::write_uint(out, *raw, *bytes),
                Endianness::Little => LittleEndian::write_uint(out, *raw, *bytes),
            },
            Field::Int { raw, bytes, signed: true, endianness } => match endianness {
                Endianness::Big => BigEndian::write_int(out, *raw as i64, *bytes),
                Endianness::Little => LittleEndian::write_int(out, *raw as i64, *bytes),
            },
            Field::Float { value, bytes: 4, endianness } => match endianness {
                Endianness::Big => BigEndian::write_f32(out, *value as f32),
                Endianness::Little => LittleEndian::write_f32(out, *value as f32),
            },
            Field::Float { value, endianness, .. } => match endianness {
                Endianness::Big => BigEndian::write_f64(out, *value),
                Endianness::Little => LittleEndian::write_f64(out, *value),
            },
            Field::Bcd { value, .. } => write_bcd(out, *value),
            Field::Bytes { data, terminated } => {
                out[..data.len()].copy_from_slice(data);
                if *terminated {
                    out[data.len()] = 0;
                }
            }
        }
    }
}

/// Encoded form of every segment, in order.
fn plan_all<'v>(pattern: &'v Pattern, bindings: &'v Bindings<'_>) -> Result<Vec<Field<'v>>, BuildError> {
    pattern.segments().iter().map(|segment| plan(segment, bindings)).collect()
}

fn total_len(fields: &[Field<'_>]) -> Result<usize, BuildError> {
    let mut total = 0usize;
    for field in fields {
        let len = field.len();
        total = total.checked_add(len).ok_or(BuildError::Overflow {
            offset: total,
            needed: len,
            available: usize::MAX - total,
        })?;
    }
    Ok(total)
}

fn write_fields(out: &mut [u8], fields: &[Field<'_>]) {
    let mut offset = 0;
    for field in fields {
        let len = field.len();
        field.write_into(&mut out[offset..offset + len]);
        offset += len;
    }
}

/// Total bytes `build` would produce.
pub fn size_of(pattern: &Pattern, bindings: &Bindings<'_>) -> Result<usize, BuildError> {
    total_len(&plan_all(pattern, bindings)?)
}

/// Construct a fresh buffer holding `bindings` laid out by `pattern`.
pub fn build(pattern: &Pattern, bindings: &Bindings<'_>) -> Result<Vec<u8>, BuildError> {
    let fields = plan_all(pattern, bindings)?;
    let mut buf = vec![0u8; total_len(&fields)?];
    write_fields(&mut buf, &fields);
    Ok(buf)
}

/// Write into a preallocated buffer starting at byte `offset`; returns the offset after the last segment.
///
/// Every segment is encoded and the total checked against `buf` before anything is written, so on
/// error `buf` is left untouched.
pub fn write(
    buf: &mut [u8],
    offset: usize,
    pattern: &Pattern,
    bindings: &Bindings<'_>,
) -> Result<usize, BuildError> {
    let fields = plan_all(pattern, bindings)?;
    let needed = total_len(&fields)?;
    let available = buf.len().saturating_sub(offset);
    if needed > available {
        return Err(BuildError::Overflow { offset, needed, available });
    }
    write_fields(&mut buf[offset..offset + needed], &fields);
    Ok(offset + needed)
}

/// Construct from a fixed pattern, reused across calls.
#[derive(Debug, Clone)]
pub struct Builder {
    pattern: Pattern,
}

impl Builder {
    pub fn new(pattern: Pattern) -> Self {
        Builder { pattern }
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn build(&self, bindings: &Bindings<'_>) -> Result<Vec<u8>, BuildError> {
        build(&self.pattern, bindings)
    }

    pub fn size_of(&self, bindings: &Bindings<'_>) -> Result<usize, BuildError> {
        size_of(&self.pattern, bindings)
    }
}

fn plan<'v>(segment: &'v Segment, bindings: &'v Bindings<'_>) -> Result<Field<'v>, BuildError> {
    let value = match &segment.target {
        Target::Skip => {
            let bytes = size::resolve_bytes(segment, bindings)?.unwrap_or(0);
            return Ok(Field::Zero(bytes as usize));
        }
        Target::Bind(name) => bindings
            .get(name)
            .ok_or_else(|| BuildError::MissingBinding(name.clone()))?
            .reborrow(),
        Target::Literal(lit) => lit.to_value(),
    };
    match segment.kind {
        Kind::Integer => {
            let bits = numeric_bits(segment, bindings, &[8, 16, 32, 64])?;
            Ok(Field::Int {
                raw: int_raw(segment, &value, bits)?,
                bytes: (bits / 8) as usize,
                signed: segment.signed,
                endianness: segment.endianness,
            })
        }
        Kind::Float => {
            let bits = numeric_bits(segment, bindings, &[32, 64])?;
            let value = value.as_f64().ok_or_else(|| type_mismatch(segment, "float", &value))?;
            Ok(Field::Float { value, bytes: (bits / 8) as usize, endianness: segment.endianness })
        }
        Kind::Bcd => {
            let bytes = size::resolve_bytes(segment, bindings)?
                .ok_or_else(|| BuildError::InvalidRest { segment: segment.label() })?;
            Ok(Field::Bcd { value: bcd_value(segment, &value, bytes)?, bytes: bytes as usize })
        }
        Kind::Binary => {
            let data = match value {
                Value::Bytes(b) => b,
                Value::Str(Cow::Borrowed(s)) => Cow::Borrowed(s.as_bytes()),
                Value::Str(Cow::Owned(s)) => Cow::Owned(s.into_bytes()),
                other => return Err(type_mismatch(segment, "bytes", &other)),
            };
            let declared = size::resolve_bytes(segment, bindings)?;
            sized_bytes(segment, data, declared)
        }
        Kind::String => {
            let declared = size::resolve_bytes(segment, bindings)?;
            let text = pad(segment, text_of(segment, value)?, declared)?;
            if segment.zero_terminated {
                size::terminated_len(segment, declared, text.len() as u64)?;
            } else if segment.padding.is_none() {
                check_exact(segment, declared, text.len() as u64)?;
            }
            Ok(Field::Bytes {
                data: encode_text(text, segment.encoding),
                terminated: segment.zero_terminated,
            })
        }
    }
}

/// Width of an integer or float segment; only the listed widths are encodable.
fn numeric_bits(segment: &Segment, bindings: &Bindings<'_>, widths: &[u64]) -> Result<u64, BuildError> {
    match size::resolve(segment, bindings).map_err(|e| e.into_build_error(segment))? {
        Extent::Bits(bits) if widths.contains(&bits) => Ok(bits),
        Extent::Bits(bits) => Err(BuildError::UnsupportedWidth {
            segment: segment.label(),
            kind: segment.kind,
            bits,
        }),
        Extent::Rest => Err(BuildError::InvalidRest { segment: segment.label() }),
    }
}

fn type_mismatch(segment: &Segment, expected: &'static str, value: &Value<'_>) -> BuildError {
    BuildError::TypeMismatch {
        segment: segment.label(),
        expected,
        found: value.type_name(),
    }
}

/// Integer as the raw bits to write, after checking it fits the declared width and signedness.
fn int_raw(segment: &Segment, value: &Value<'_>, bits: u64) -> Result<u64, BuildError> {
    if !value.is_integer() {
        return Err(type_mismatch(segment, "integer", value));
    }
    let out_of_range = || BuildError::OutOfRange {
        segment: segment.label(),
        value: value.to_string(),
        bits,
    };
    if segment.signed {
        let v = value.as_i64().ok_or_else(out_of_range)?;
        let fits = bits == 64 || (-(1i64 << (bits - 1))..(1i64 << (bits - 1))).contains(&v);
        if !fits {
            return Err(out_of_range());
        }
        Ok(v as u64)
    } else {
        let v = value.as_u64().ok_or_else(out_of_range)?;
        if bits < 64 && v >> bits != 0 {
            return Err(out_of_range());
        }
        Ok(v)
    }
}

fn bcd_value(segment: &Segment, value: &Value<'_>, bytes: u64) -> Result<u64, BuildError> {
    if !value.is_integer() {
        return Err(type_mismatch(segment, "integer", value));
    }
    let v = value.as_u64().ok_or_else(|| BuildError::OutOfRange {
        segment: segment.label(),
        value: value.to_string(),
        bits: bytes * 8,
    })?;
    let digits = v.to_string().len() as u64;
    let capacity = bytes.saturating_mul(2);
    if digits > capacity {
        return Err(BuildError::ValueTooLarge {
            segment: segment.label(),
            value: v,
            digits,
            capacity,
        });
    }
    Ok(v)
}

/// Packed BCD filling `out` from the least significant byte; leading bytes are zero.
fn write_bcd(out: &mut [u8], mut value: u64) {
    for byte in out.iter_mut().rev() {
        let low = (value % 10) as u8;
        value /= 10;
        let high = (value % 10) as u8;
        value /= 10;
        *byte = (high << 4) | low;
    }
}

fn sized_bytes<'v>(segment: &Segment, data: Cow<'v, [u8]>, declared: Option<u64>) -> Result<Field<'v>, BuildError> {
    let len = data.len() as u64;
    if segment.zero_terminated {
        size::terminated_len(segment, declared, len)?;
    } else {
        check_exact(segment, declared, len)?;
    }
    Ok(Field::Bytes { data, terminated: segment.zero_terminated })
}

fn check_exact(segment: &Segment, declared: Option<u64>, actual: u64) -> Result<(), BuildError> {
    match declared {
        Some(expected) if expected != actual => Err(BuildError::LengthMismatch {
            segment: segment.label(),
            expected,
            actual,
        }),
        _ => Ok(()),
    }
}

/// Textual form of a value bound to a string segment.
fn text_of<'v>(segment: &Segment, value: Value<'v>) -> Result<Cow<'v, str>, BuildError> {
    match value {
        Value::Str(s) => Ok(s),
        Value::UInt(_) | Value::Int(_) | Value::Float(_) => Ok(Cow::Owned(value.to_string())),
        Value::Bytes(Cow::Borrowed(b)) => std::str::from_utf8(b)
            .map(Cow::Borrowed)
            .map_err(|_| type_mismatch(segment, "UTF-8 text", &value)),
        Value::Bytes(Cow::Owned(ref b)) => match std::str::from_utf8(b) {
            Ok(s) => Ok(Cow::Owned(s.to_string())),
            Err(_) => Err(type_mismatch(segment, "UTF-8 text", &value)),
        },
    }
}

/// Justify `text` to the declared width with the fill character.
fn pad<'v>(segment: &Segment, text: Cow<'v, str>, width: Option<u64>) -> Result<Cow<'v, str>, BuildError> {
    let (padding, width) = match (segment.padding, width) {
        (Some(padding), Some(width)) => (padding, width),
        _ => return Ok(text),
    };
    let len = text.len() as u64;
    if len > width {
        return Err(BuildError::FieldTooLarge {
            segment: segment.label(),
            capacity: width,
            actual: len,
        });
    }
    let fill: String = std::iter::repeat(padding.fill).take((width - len) as usize).collect();
    Ok(Cow::Owned(match padding.justify {
        Justify::Left => fill + &*text,
        Justify::Right => text.into_owned() + &fill,
    }))
}

fn encode_text(text: Cow<'_, str>, encoding: TextEncoding) -> Cow<'_, [u8]> {
    match encoding {
        TextEncoding::Plain => match text {
            Cow::Borrowed(s) => Cow::Borrowed(s.as_bytes()),
            Cow::Owned(s) => Cow::Owned(s.into_bytes()),
        },
        TextEncoding::Hex => Cow::Owned(hex::encode(text.as_bytes()).into_bytes()),
        TextEncoding::Bits => Cow::Owned(
            text.bytes()
                .flat_map(|b| format!("{:08b}", b).into_bytes())
                .collect(),
        ),
    }
}
