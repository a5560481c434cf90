//! Size resolution shared by matching and construction.
//!
//! A segment's extent is `size * unit` bits, where `size` may name a variable
//! bound earlier. Matching looks variables up in the fresh bindings first, then
//! in the caller's free variables; construction looks them up in the supplied
//! bindings.

use crate::error::BuildError;
use crate::segment::{Segment, Size};
use crate::value::{Bindings, Value};

/// Resolved extent of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extent {
    Bits(u64),
    /// Everything remaining in the buffer (match) or the whole bound value (build).
    Rest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SizeError {
    /// Size names a variable that is not bound (a forward reference).
    Unbound(String),
    /// Size variable is bound to something other than a non-negative integer.
    Invalid(String),
    /// `size * unit` does not fit in 64 bits.
    Overflow,
}

impl SizeError {
    pub(crate) fn into_build_error(self, segment: &Segment) -> BuildError {
        match self {
            SizeError::Unbound(name) => BuildError::UnboundSizeVariable { segment: segment.label(), name },
            SizeError::Invalid(name) => BuildError::InvalidSizeVariable { segment: segment.label(), name },
            SizeError::Overflow => BuildError::UnsupportedWidth {
                segment: segment.label(),
                kind: segment.kind,
                bits: u64::MAX,
            },
        }
    }
}

/// Variables visible to size expressions.
pub trait Variables {
    fn lookup(&self, name: &str) -> Option<&Value<'_>>;
}

impl Variables for Bindings<'_> {
    fn lookup(&self, name: &str) -> Option<&Value<'_>> {
        self.get(name)
    }
}

/// Bindings made so far in a match, layered over read-only free variables.
pub struct Scope<'s, 'a, 'f> {
    bound: &'s Bindings<'a>,
    free: Option<&'s Bindings<'f>>,
}

impl<'s, 'a, 'f> Scope<'s, 'a, 'f> {
    pub fn new(bound: &'s Bindings<'a>, free: Option<&'s Bindings<'f>>) -> Self {
        Scope { bound, free }
    }
}

impl Variables for Scope<'_, '_, '_> {
    fn lookup(&self, name: &str) -> Option<&Value<'_>> {
        if let Some(value) = self.bound.get(name) {
            return Some(value);
        }
        self.free.and_then(|free| free.get(name))
    }
}

/// Resolve a segment's extent in bits.
pub fn resolve(segment: &Segment, vars: &impl Variables) -> Result<Extent, SizeError> {
    let count = match &segment.size {
        Size::Rest => return Ok(Extent::Rest),
        Size::Fixed(n) => *n,
        Size::Var(name) => size_value(name, vars.lookup(name))?,
    };
    scaled(count, segment.unit).map(Extent::Bits)
}

/// Interpret a bound variable as a size count.
pub fn size_value(name: &str, value: Option<&Value<'_>>) -> Result<u64, SizeError> {
    let value = value.ok_or_else(|| SizeError::Unbound(name.to_string()))?;
    value.as_u64().ok_or_else(|| SizeError::Invalid(name.to_string()))
}

pub fn scaled(count: u64, unit: u32) -> Result<u64, SizeError> {
    count.checked_mul(u64::from(unit)).ok_or(SizeError::Overflow)
}

/// Construction-time extent in whole bytes; `None` for a rest-sized segment.
pub fn resolve_bytes(segment: &Segment, bindings: &Bindings<'_>) -> Result<Option<u64>, BuildError> {
    match resolve(segment, bindings).map_err(|e| e.into_build_error(segment))? {
        Extent::Rest => Ok(None),
        Extent::Bits(bits) if bits % 8 == 0 => Ok(Some(bits / 8)),
        Extent::Bits(bits) => Err(BuildError::Misaligned { segment: segment.label(), bits }),
    }
}

/// Wire length of a zero-terminated field holding `actual` bytes of content.
pub fn terminated_len(segment: &Segment, capacity: Option<u64>, actual: u64) -> Result<u64, BuildError> {
    match capacity {
        Some(capacity) if actual > capacity => Err(BuildError::FieldTooLarge {
            segment: segment.label(),
            capacity,
            actual,
        }),
        _ => Ok(actual + 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::Specifier;

    #[test]
    fn fixed_size_scales_by_unit() {
        let s = Segment::variable("n", Some(Size::Fixed(4)), &[Specifier::Unit(8)]);
        assert_eq!(resolve(&s, &Bindings::new()), Ok(Extent::Bits(32)));
    }

    #[test]
    fn variable_size_prefers_bound_over_free() {
        let s = Segment::variable("data", Some(Size::Var("len".into())), &[Specifier::Binary]);
        let mut bound = Bindings::new();
        let mut free = Bindings::new();
        free.insert("len".into(), Value::UInt(9));
        assert_eq!(resolve(&s, &Scope::new(&bound, Some(&free))), Ok(Extent::Bits(72)));
        bound.insert("len".into(), Value::UInt(2));
        assert_eq!(resolve(&s, &Scope::new(&bound, Some(&free))), Ok(Extent::Bits(16)));
    }

    #[test]
    fn unbound_and_invalid_variables() {
        let s = Segment::variable("data", Some(Size::Var("len".into())), &[]);
        let mut vars = Bindings::new();
        assert_eq!(resolve(&s, &vars), Err(SizeError::Unbound("len".into())));
        vars.insert("len".into(), Value::Int(-1));
        assert_eq!(resolve(&s, &vars), Err(SizeError::Invalid("len".into())));
        vars.insert("len".into(), Value::UInt(u64::MAX));
        let wide = Segment::variable("data", Some(Size::Var("len".into())), &[Specifier::Unit(8)]);
        assert_eq!(resolve(&wide, &vars), Err(SizeError::Overflow));
    }

    #[test]
    fn rest_and_whole_bytes() {
        assert_eq!(resolve(&Segment::rest(), &Bindings::new()), Ok(Extent::Rest));
        let odd = Segment::variable("n", Some(Size::Fixed(12)), &[]);
        assert!(matches!(
            resolve_bytes(&odd, &Bindings::new()),
            Err(BuildError::Misaligned { bits: 12, .. })
        ));
    }

    #[test]
    fn terminated_capacity() {
        let s = Segment::variable("s", Some(Size::Fixed(4)), &[Specifier::Utf8, Specifier::Zero]);
        assert_eq!(terminated_len(&s, Some(4), 4), Ok(5));
        assert!(matches!(
            terminated_len(&s, Some(4), 5),
            Err(BuildError::FieldTooLarge { capacity: 4, actual: 5, .. })
        ));
    }
}
