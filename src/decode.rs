//! Match engine: walk a pattern over a buffer and bind its variables.
//!
//! Segments are evaluated strictly left to right against a bit cursor. Any
//! failing segment, or bits left over at the end, fails the whole match and
//! no partial bindings are returned. The reason is reported at `trace` level
//! only.
//!
//! Binary and string values borrow from the matched buffer.

use crate::segment::{Endianness, Kind, Pattern, Segment, Target, TextEncoding};
use crate::size::{self, Extent, Scope, SizeError};
use crate::value::{Bindings, Value};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use std::borrow::Cow;

/// Why a segment did not match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Mismatch {
    ShortBuffer { offset: u64, needed: u64, available: u64 },
    Misaligned { offset: u64 },
    UnsupportedWidth { kind: Kind, bits: u64 },
    /// Rest size on a segment that cannot take it.
    InvalidRest,
    Literal,
    UnboundSize(String),
    InvalidSize(String),
    InvalidText,
    InvalidBcd,
    Unterminated,
    Trailing { consumed: u64, total: u64 },
}

impl From<SizeError> for Mismatch {
    fn from(e: SizeError) -> Self {
        match e {
            SizeError::Unbound(name) => Mismatch::UnboundSize(name),
            SizeError::Invalid(name) => Mismatch::InvalidSize(name),
            SizeError::Overflow => Mismatch::UnsupportedWidth { kind: Kind::Integer, bits: u64::MAX },
        }
    }
}

/// Read position over a buffer, in bits.
pub(crate) struct BitCursor<'a> {
    bin: &'a [u8],
    offset: u64,
    size: u64,
}

impl<'a> BitCursor<'a> {
    pub(crate) fn new(bin: &'a [u8]) -> Self {
        BitCursor { bin, offset: 0, size: bin.len() as u64 * 8 }
    }

    fn byte_offset(&self) -> Result<usize, Mismatch> {
        if self.offset % 8 != 0 {
            return Err(Mismatch::Misaligned { offset: self.offset });
        }
        Ok((self.offset / 8) as usize)
    }

    fn ensure(&self, bits: u64) -> Result<(), Mismatch> {
        let available = self.size - self.offset;
        if bits > available {
            return Err(Mismatch::ShortBuffer { offset: self.offset, needed: bits, available });
        }
        Ok(())
    }

    pub(crate) fn skip(&mut self, bits: u64) -> Result<(), Mismatch> {
        self.ensure(bits)?;
        self.offset += bits;
        Ok(())
    }

    pub(crate) fn skip_rest(&mut self) -> Result<(), Mismatch> {
        self.byte_offset()?;
        self.offset = self.size;
        Ok(())
    }

    /// Next `bits / 8` bytes. Callers check `bits` is a whole number of bytes.
    pub(crate) fn take(&mut self, bits: u64) -> Result<&'a [u8], Mismatch> {
        let start = self.byte_offset()?;
        self.ensure(bits)?;
        self.offset += bits;
        Ok(&self.bin[start..start + (bits / 8) as usize])
    }

    pub(crate) fn take_rest(&mut self) -> Result<&'a [u8], Mismatch> {
        let start = self.byte_offset()?;
        self.offset = self.size;
        Ok(&self.bin[start..])
    }

    /// Bytes up to a zero terminator found within `limit` bytes; the terminator is consumed.
    pub(crate) fn take_terminated(&mut self, limit: Option<u64>) -> Result<&'a [u8], Mismatch> {
        let start = self.byte_offset()?;
        let window = &self.bin[start..];
        let window = match limit {
            Some(limit) if (limit as usize) < window.len() => &window[..limit as usize],
            _ => window,
        };
        let end = window.iter().position(|b| *b == 0).ok_or(Mismatch::Unterminated)?;
        self.offset += (end as u64 + 1) * 8;
        Ok(&window[..end])
    }

    pub(crate) fn finish(&self) -> Result<(), Mismatch> {
        if self.offset != self.size {
            return Err(Mismatch::Trailing { consumed: self.offset, total: self.size });
        }
        Ok(())
    }
}

pub(crate) fn int_width(bits: u64) -> Result<u64, Mismatch> {
    if bits % 8 != 0 || !(8..=64).contains(&bits) {
        return Err(Mismatch::UnsupportedWidth { kind: Kind::Integer, bits });
    }
    Ok(bits)
}

pub(crate) fn float_width(bits: u64) -> Result<u64, Mismatch> {
    match bits {
        32 | 64 => Ok(bits),
        _ => Err(Mismatch::UnsupportedWidth { kind: Kind::Float, bits }),
    }
}

pub(crate) fn byte_width(kind: Kind, bits: u64) -> Result<u64, Mismatch> {
    if bits % 8 != 0 {
        return Err(Mismatch::UnsupportedWidth { kind, bits });
    }
    Ok(bits)
}

/// Two's-complement or unsigned integer of 1 to 8 bytes.
pub(crate) fn read_integer(bytes: &[u8], endianness: Endianness, signed: bool) -> Value<'static> {
    let n = bytes.len();
    match (endianness, signed) {
        (Endianness::Big, false) => Value::UInt(BigEndian::read_uint(bytes, n)),
        (Endianness::Big, true) => Value::Int(BigEndian::read_int(bytes, n)),
        (Endianness::Little, false) => Value::UInt(LittleEndian::read_uint(bytes, n)),
        (Endianness::Little, true) => Value::Int(LittleEndian::read_int(bytes, n)),
    }
}

/// IEEE-754 single or double; `bytes` is 4 or 8 long.
pub(crate) fn read_float(bytes: &[u8], endianness: Endianness) -> Value<'static> {
    Value::Float(match (bytes.len(), endianness) {
        (4, Endianness::Big) => BigEndian::read_f32(bytes).into(),
        (4, Endianness::Little) => LittleEndian::read_f32(bytes).into(),
        (_, Endianness::Big) => BigEndian::read_f64(bytes),
        (_, Endianness::Little) => LittleEndian::read_f64(bytes),
    })
}

/// Wire bytes back to text, undoing hex or binary-digit encoding.
pub(crate) fn read_text(bytes: &[u8], encoding: TextEncoding) -> Result<Value<'_>, Mismatch> {
    let raw: Cow<'_, [u8]> = match encoding {
        TextEncoding::Plain => Cow::Borrowed(bytes),
        TextEncoding::Hex => Cow::Owned(hex::decode(bytes).map_err(|_| Mismatch::InvalidText)?),
        TextEncoding::Bits => {
            if bytes.len() % 8 != 0 {
                return Err(Mismatch::InvalidText);
            }
            let mut out = Vec::with_capacity(bytes.len() / 8);
            for chunk in bytes.chunks(8) {
                let mut byte = 0u8;
                for digit in chunk {
                    byte = match digit {
                        b'0' => byte << 1,
                        b'1' => (byte << 1) | 1,
                        _ => return Err(Mismatch::InvalidText),
                    };
                }
                out.push(byte);
            }
            Cow::Owned(out)
        }
    };
    let text = match raw {
        Cow::Borrowed(b) => Cow::Borrowed(std::str::from_utf8(b).map_err(|_| Mismatch::InvalidText)?),
        Cow::Owned(v) => Cow::Owned(String::from_utf8(v).map_err(|_| Mismatch::InvalidText)?),
    };
    Ok(Value::Str(text))
}

/// Packed BCD, two digits per byte, most significant nibble first.
pub(crate) fn read_bcd(bytes: &[u8]) -> Result<Value<'static>, Mismatch> {
    let mut n: u64 = 0;
    for byte in bytes {
        for digit in [byte >> 4, byte & 0x0f] {
            if digit > 9 {
                return Err(Mismatch::InvalidBcd);
            }
            n = n
                .checked_mul(10)
                .and_then(|n| n.checked_add(u64::from(digit)))
                .ok_or(Mismatch::InvalidBcd)?;
        }
    }
    Ok(Value::UInt(n))
}

/// Terminator search window for a zero-terminated field of `capacity` content bytes.
pub(crate) fn terminated_limit(extent: Extent, expansion: u64) -> Option<u64> {
    match extent {
        Extent::Rest => None,
        Extent::Bits(bits) => Some((bits / 8).saturating_mul(expansion).saturating_add(1)),
    }
}

/// Match `pattern` against `bin`.
///
/// `free` variables are visible to size expressions only; the result holds
/// exactly the names bound by this pattern. Returns `None` when the pattern
/// does not match.
pub fn decode<'a>(pattern: &Pattern, bin: &'a [u8], free: Option<&Bindings<'_>>) -> Option<Bindings<'a>> {
    match run(pattern, bin, free) {
        Ok(bound) => Some(bound),
        Err((index, why)) => {
            log::trace!("pattern does not match at segment {}: {:?}", index, why);
            None
        }
    }
}

fn run<'a>(
    pattern: &Pattern,
    bin: &'a [u8],
    free: Option<&Bindings<'_>>,
) -> Result<Bindings<'a>, (usize, Mismatch)> {
    let mut cursor = BitCursor::new(bin);
    let mut bound = Bindings::new();
    for (index, segment) in pattern.segments().iter().enumerate() {
        let extent = size::resolve(segment, &Scope::new(&bound, free)).map_err(|e| (index, e.into()))?;
        let value = match_segment(segment, extent, &mut cursor).map_err(|e| (index, e))?;
        match (&segment.target, value) {
            (Target::Bind(name), Some(value)) => {
                bound.insert(name.clone(), value);
            }
            (Target::Literal(_), Some(value)) if !segment.literal_matches(&value) => {
                return Err((index, Mismatch::Literal));
            }
            _ => {}
        }
    }
    cursor.finish().map_err(|e| (pattern.len(), e))?;
    Ok(bound)
}

fn match_segment<'a>(
    segment: &Segment,
    extent: Extent,
    cursor: &mut BitCursor<'a>,
) -> Result<Option<Value<'a>>, Mismatch> {
    if segment.is_wildcard() {
        match extent {
            Extent::Rest => cursor.skip_rest()?,
            Extent::Bits(bits) => cursor.skip(bits)?,
        }
        return Ok(None);
    }
    let value = match segment.kind {
        Kind::Integer => {
            let bits = int_width(fixed(extent)?)?;
            read_integer(cursor.take(bits)?, segment.endianness, segment.signed)
        }
        Kind::Float => {
            let bits = float_width(fixed(extent)?)?;
            read_float(cursor.take(bits)?, segment.endianness)
        }
        Kind::Bcd => {
            let bits = byte_width(Kind::Bcd, fixed(extent)?)?;
            read_bcd(cursor.take(bits)?)?
        }
        Kind::Binary => Value::Bytes(Cow::Borrowed(take_bytes(
            cursor,
            Kind::Binary,
            extent,
            1,
            segment.zero_terminated,
        )?)),
        Kind::String => {
            let expansion = segment.encoding.expansion();
            let bytes = take_bytes(cursor, Kind::String, extent, expansion, segment.zero_terminated)?;
            read_text(bytes, segment.encoding)?
        }
    };
    Ok(Some(value))
}

fn fixed(extent: Extent) -> Result<u64, Mismatch> {
    match extent {
        Extent::Bits(bits) => Ok(bits),
        Extent::Rest => Err(Mismatch::InvalidRest),
    }
}

/// Raw wire bytes of a binary or string segment; `expansion` wire bytes per content byte.
pub(crate) fn take_bytes<'a>(
    cursor: &mut BitCursor<'a>,
    kind: Kind,
    extent: Extent,
    expansion: u64,
    terminated: bool,
) -> Result<&'a [u8], Mismatch> {
    if terminated {
        return cursor.take_terminated(terminated_limit(extent, expansion));
    }
    match extent {
        Extent::Rest => cursor.take_rest(),
        Extent::Bits(bits) => {
            let bits = byte_width(kind, bits)?;
            let wire = bits
                .checked_mul(expansion)
                .ok_or(Mismatch::UnsupportedWidth { kind, bits })?;
            cursor.take(wire)
        }
    }
}
