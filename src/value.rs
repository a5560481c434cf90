//! Runtime values for matching and construction.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

/// Variable name → value. Produced by a match, consumed by a build.
pub type Bindings<'a> = HashMap<String, Value<'a>>;

/// A single bound value.
///
/// Byte sequences and text produced by a match borrow from the matched buffer;
/// use [`Value::into_owned`] to detach them.
#[derive(Debug, Clone, PartialEq)]
pub enum Value<'a> {
    /// Unsigned integers and BCD fields.
    UInt(u64),
    /// Signed integers.
    Int(i64),
    Float(f64),
    Bytes(Cow<'a, [u8]>),
    Str(Cow<'a, str>),
}

impl<'a> Value<'a> {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::UInt(x) => Some(*x),
            Value::Int(x) => u64::try_from(*x).ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(x) => Some(*x),
            Value::UInt(x) => i64::try_from(*x).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x),
            Value::Int(x) => Some(*x as f64),
            Value::UInt(x) => Some(*x as f64),
            _ => None,
        }
    }

    /// Raw bytes of a byte sequence or of UTF-8 text.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            Value::Str(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Value::UInt(_) | Value::Int(_))
    }

    /// Short type name, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::UInt(_) => "unsigned integer",
            Value::Int(_) => "signed integer",
            Value::Float(_) => "float",
            Value::Bytes(_) => "bytes",
            Value::Str(_) => "string",
        }
    }

    /// Equality by value: integers compare across signedness, integers and floats numerically.
    pub fn same_as(&self, other: &Value<'_>) -> bool {
        match (self, other) {
            (Value::UInt(_) | Value::Int(_), Value::UInt(_) | Value::Int(_)) => {
                self.as_i128() == other.as_i128()
            }
            (Value::Float(a), _) => other.as_f64() == Some(*a),
            (_, Value::Float(b)) => self.as_f64() == Some(*b),
            (Value::Str(a), Value::Str(b)) => a == b,
            (a, b) => a.as_bytes().is_some() && a.as_bytes() == b.as_bytes(),
        }
    }

    fn as_i128(&self) -> Option<i128> {
        match self {
            Value::UInt(x) => Some(*x as i128),
            Value::Int(x) => Some(*x as i128),
            _ => None,
        }
    }

    /// Borrowing view of this value; never copies bytes.
    pub fn reborrow(&self) -> Value<'_> {
        match self {
            Value::UInt(x) => Value::UInt(*x),
            Value::Int(x) => Value::Int(*x),
            Value::Float(x) => Value::Float(*x),
            Value::Bytes(b) => Value::Bytes(Cow::Borrowed(b)),
            Value::Str(s) => Value::Str(Cow::Borrowed(s)),
        }
    }

    pub fn into_owned(self) -> Value<'static> {
        match self {
            Value::UInt(x) => Value::UInt(x),
            Value::Int(x) => Value::Int(x),
            Value::Float(x) => Value::Float(x),
            Value::Bytes(b) => Value::Bytes(Cow::Owned(b.into_owned())),
            Value::Str(s) => Value::Str(Cow::Owned(s.into_owned())),
        }
    }
}

impl fmt::Display for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::UInt(x) => write!(f, "{}", x),
            Value::Int(x) => write!(f, "{}", x),
            Value::Float(x) => write!(f, "{}", x),
            Value::Bytes(b) => write!(f, "0x{}", hex::encode(b)),
            Value::Str(s) => f.write_str(s),
        }
    }
}

macro_rules! from_int {
    ($variant:ident: $($t:ty),*) => {
        $(impl From<$t> for Value<'_> {
            fn from(x: $t) -> Self {
                Value::$variant(x.into())
            }
        })*
    };
}

from_int!(UInt: u8, u16, u32, u64);
from_int!(Int: i8, i16, i32, i64);

impl From<f64> for Value<'_> {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<f32> for Value<'_> {
    fn from(x: f32) -> Self {
        Value::Float(x.into())
    }
}

impl<'a> From<&'a [u8]> for Value<'a> {
    fn from(b: &'a [u8]) -> Self {
        Value::Bytes(Cow::Borrowed(b))
    }
}

impl From<Vec<u8>> for Value<'_> {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(Cow::Owned(b))
    }
}

impl<'a> From<&'a str> for Value<'a> {
    fn from(s: &'a str) -> Self {
        Value::Str(Cow::Borrowed(s))
    }
}

impl From<String> for Value<'_> {
    fn from(s: String) -> Self {
        Value::Str(Cow::Owned(s))
    }
}
