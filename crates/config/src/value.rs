//! Conversion of raw environment strings into typed values.

use std::num::ParseIntError;
use std::time::Duration;
use thiserror::Error;

use crate::schema::FieldKind;

/// A converted field value, tagged by kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    String(String),
    Integer(i64),
    Duration(Duration),
    List(Vec<String>),
}

impl Value {
    /// Value of a field that has neither an environment value nor a default.
    pub fn zero(kind: FieldKind) -> Self {
        match kind {
            FieldKind::String => Value::String(String::new()),
            FieldKind::Integer => Value::Integer(0),
            FieldKind::Duration => Value::Duration(Duration::ZERO),
            FieldKind::StringList { .. } => Value::List(Vec::new()),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    #[error("invalid integer: {0}")]
    Integer(#[from] ParseIntError),

    #[error("invalid duration: {0}")]
    Duration(#[from] DurationError),

    #[error("{value} is out of range for {target}")]
    OutOfRange { value: i64, target: &'static str },

    #[error("value is not valid unicode")]
    NotUnicode,
}

/// Convert `raw` according to `kind`.
pub fn convert(kind: FieldKind, raw: &str) -> Result<Value, ValueError> {
    match kind {
        FieldKind::String => Ok(Value::String(raw.to_string())),
        FieldKind::Integer => Ok(Value::Integer(raw.parse::<i64>()?)),
        FieldKind::Duration => Ok(Value::Duration(parse_duration(raw)?)),
        FieldKind::StringList { separator } => Ok(Value::List(split_list(raw, separator))),
    }
}

/// Split on `separator`, keeping empty segments between separators.
/// An empty input is an empty list.
pub fn split_list(raw: &str, separator: char) -> Vec<String> {
    if raw.is_empty() {
        return Vec::new();
    }
    raw.split(separator).map(str::to_string).collect()
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DurationError {
    #[error("empty duration")]
    Empty,

    #[error("negative duration {0:?} is not supported")]
    Negative(String),

    #[error("missing number in {0:?}")]
    MissingNumber(String),

    #[error("missing unit in {0:?}")]
    MissingUnit(String),

    #[error("unknown unit {unit:?} in {input:?}")]
    UnknownUnit { unit: String, input: String },

    #[error("duration {0:?} overflows")]
    Overflow(String),
}

const NANOS_PER_MICRO: u64 = 1_000;
const NANOS_PER_MILLI: u64 = 1_000_000;
const NANOS_PER_SEC: u64 = 1_000_000_000;

fn unit_nanos(unit: &str) -> Option<u64> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" | "μs" => Some(NANOS_PER_MICRO),
        "ms" => Some(NANOS_PER_MILLI),
        "s" => Some(NANOS_PER_SEC),
        "m" => Some(60 * NANOS_PER_SEC),
        "h" => Some(3600 * NANOS_PER_SEC),
        _ => None,
    }
}

/// Parse a time span such as `"5s"`, `"120s"`, `"1h30m"` or `"1.5h"`.
///
/// Accepts an optional leading `+`, one or more `<number>[.<fraction>]<unit>`
/// groups with units `ns`, `us` (`µs`), `ms`, `s`, `m`, `h`, and the bare
/// literal `0`.
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    let mut s = input;
    if let Some(rest) = s.strip_prefix('+') {
        s = rest;
    } else if let Some(rest) = s.strip_prefix('-') {
        // "-0" is still zero.
        if rest.chars().all(|c| c == '0') && !rest.is_empty() {
            return Ok(Duration::ZERO);
        }
        return Err(DurationError::Negative(input.to_string()));
    }

    if s == "0" {
        return Ok(Duration::ZERO);
    }
    if s.is_empty() {
        return Err(DurationError::Empty);
    }

    let overflow = || DurationError::Overflow(input.to_string());
    let mut total: u64 = 0;

    while !s.is_empty() {
        let int_len = s.bytes().take_while(u8::is_ascii_digit).count();
        let (int_part, rest) = s.split_at(int_len);
        s = rest;

        let mut frac_part = "";
        if let Some(rest) = s.strip_prefix('.') {
            let frac_len = rest.bytes().take_while(u8::is_ascii_digit).count();
            frac_part = &rest[..frac_len];
            s = &rest[frac_len..];
            if int_part.is_empty() && frac_part.is_empty() {
                return Err(DurationError::MissingNumber(input.to_string()));
            }
        } else if int_part.is_empty() {
            return Err(DurationError::MissingNumber(input.to_string()));
        }

        let unit_len = s
            .char_indices()
            .find(|(_, c)| *c == '.' || c.is_ascii_digit())
            .map(|(i, _)| i)
            .unwrap_or(s.len());
        if unit_len == 0 {
            return Err(DurationError::MissingUnit(input.to_string()));
        }
        let (unit, rest) = s.split_at(unit_len);
        s = rest;
        let scale = unit_nanos(unit).ok_or_else(|| DurationError::UnknownUnit {
            unit: unit.to_string(),
            input: input.to_string(),
        })?;

        let whole: u64 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| overflow())?
        };
        let mut nanos = whole.checked_mul(scale).ok_or_else(overflow)?;
        nanos = nanos
            .checked_add(fraction_nanos(frac_part, scale))
            .ok_or_else(overflow)?;
        total = total.checked_add(nanos).ok_or_else(overflow)?;
    }

    Ok(Duration::from_nanos(total))
}

/// Nanoseconds contributed by the digits after the decimal point. Digits
/// beyond nanosecond precision are dropped.
fn fraction_nanos(digits: &str, scale: u64) -> u64 {
    let mut numerator: u128 = 0;
    let mut denominator: u128 = 1;
    for b in digits.bytes().take(18) {
        numerator = numerator * 10 + u128::from(b - b'0');
        denominator *= 10;
    }
    (numerator * u128::from(scale) / denominator) as u64
}
