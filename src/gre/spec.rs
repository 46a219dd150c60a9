use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::flags::GreFlags;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Flags,
    Mask,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Field::Flags => write!(f, "flags"),
            Field::Mask => write!(f, "mask"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
    #[error("GRE {0} {1} should be in the range [0-31]")]
    OutOfRange(Field, u64),
    #[error("malformed gre flags \"{0}\", should be value[/mask]")]
    Malformed(String),
}

/// A `value/mask` pair over the five GRE flag bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlagSpec {
    pub value: GreFlags,
    pub mask: GreFlags,
}

impl FlagSpec {
    pub fn new(value: GreFlags, mask: GreFlags) -> Self {
        FlagSpec { value, mask }
    }

    /// Spec comparing every flag bit against `value`.
    pub fn exact(value: GreFlags) -> Self {
        FlagSpec {
            value,
            mask: GreFlags::ALL,
        }
    }

    /// Whether `value` has bits the mask ignores.
    pub fn value_outside_mask(&self) -> bool {
        self.value & !self.mask != GreFlags::NONE
    }
}

impl FromStr for FlagSpec {
    type Err = SpecError;

    fn from_str(text: &str) -> Result<Self, SpecError> {
        parse_spec(text)
    }
}

impl fmt::Display for FlagSpec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.value, self.mask)
    }
}

/// Parse `value` or `value/mask`, both integer literals in C notation.
pub fn parse_spec(text: &str) -> Result<FlagSpec, SpecError> {
    let malformed = || SpecError::Malformed(text.to_string());

    let (value, rest) = parse_literal(text).ok_or_else(malformed)?;
    let value = in_range(Field::Flags, value)?;

    let (mask, rest) = match rest.strip_prefix('/') {
        Some(mask) => {
            let (mask, rest) = parse_literal(mask).ok_or_else(malformed)?;
            (in_range(Field::Mask, mask)?, rest)
        }
        None => (GreFlags::ALL, rest),
    };

    if !rest.is_empty() {
        return Err(malformed());
    }
    Ok(FlagSpec { value, mask })
}

fn in_range(field: Field, value: u64) -> Result<GreFlags, SpecError> {
    if value > u64::from(u8::MAX) {
        return Err(SpecError::OutOfRange(field, value));
    }
    GreFlags::new(value as u8).ok_or(SpecError::OutOfRange(field, value))
}

/// Parse a leading unsigned integer the way `strtoul(s, &end, 0)` does.
///
/// Returns the value and the unparsed remainder, or `None` when no digit was consumed.
/// Negative numbers wrap like in C and overflow saturates, both end up out of range.
fn parse_literal(text: &str) -> Option<(u64, &str)> {
    let trimmed = text.trim_start();
    let (negative, unsigned) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let bytes = unsigned.as_bytes();
    let (radix, start) = match bytes {
        [b'0', b'x', digit, ..] | [b'0', b'X', digit, ..] if digit.is_ascii_hexdigit() => {
            (16, 2)
        }
        [b'0', ..] => (8, 0),
        _ => (10, 0),
    };

    let digits = bytes[start..]
        .iter()
        .take_while(|b| char::from(**b).is_digit(radix))
        .count();
    if digits == 0 {
        return None;
    }

    let end = start + digits;
    let magnitude = unsigned[start..end].chars().fold(0u64, |acc, c| {
        let digit = u64::from(c.to_digit(radix).unwrap_or(0));
        acc.saturating_mul(u64::from(radix)).saturating_add(digit)
    });
    let value = if negative {
        magnitude.wrapping_neg()
    } else {
        magnitude
    };
    Some((value, &unsigned[end..]))
}
