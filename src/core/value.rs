//! Purpose: Text-backed scalar cell with fallible typed views.
//! Exports: `Value`, `parse_duration`, `format_duration`.
//! Role: The only cell type stored by columns; typing is deferred to access time.
//! Invariants: Equality is textual equality of the canonical representation.
//! Invariants: Non-text inputs are canonicalized once, at construction.

use std::fmt;

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::{Date, Duration, OffsetDateTime, PrimitiveDateTime};

use crate::core::error::{Error, ErrorKind};

const NANOS_PER_MICRO: u128 = 1_000;
const NANOS_PER_MILLI: u128 = 1_000_000;
const NANOS_PER_SECOND: u128 = 1_000_000_000;

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Value {
    text: String,
}

impl Value {
    pub fn new(input: impl Into<Value>) -> Self {
        input.into()
    }

    pub fn nil() -> Self {
        Self::default()
    }

    /// Builds a value from a dynamically typed JSON scalar. Strings and
    /// numbers are accepted, `null` yields the nil value, and any other kind
    /// fails with `UnsupportedType`.
    pub fn from_json(input: &serde_json::Value) -> Result<Self, Error> {
        match input {
            serde_json::Value::String(text) => Ok(Self::from(text.as_str())),
            serde_json::Value::Number(number) => {
                if let Some(n) = number.as_i64() {
                    Ok(Self::from(n))
                } else if let Some(n) = number.as_u64() {
                    Ok(Self::from(n))
                } else if let Some(n) = number.as_f64() {
                    Ok(Self::from(n))
                } else {
                    Err(unsupported(input))
                }
            }
            serde_json::Value::Null => Ok(Self::nil()),
            other => Err(unsupported(other)),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn as_text(&self) -> Option<String> {
        Some(self.text.clone())
    }

    pub fn as_number(&self) -> Option<f64> {
        self.text.parse::<f64>().ok()
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.text.parse::<i64>().ok()
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.text.parse::<u64>().ok()
    }

    /// Parses the text with a `time` format description such as
    /// `"[year]-[month]-[day] [hour]:[minute]:[second]"`. Layouts without an
    /// offset are read as UTC; date-only layouts resolve to midnight.
    pub fn as_time(&self, layout: &str) -> Option<OffsetDateTime> {
        let items = time::format_description::parse(layout).ok()?;
        if let Ok(parsed) = OffsetDateTime::parse(&self.text, &items[..]) {
            return Some(parsed);
        }
        if let Ok(parsed) = PrimitiveDateTime::parse(&self.text, &items[..]) {
            return Some(parsed.assume_utc());
        }
        Date::parse(&self.text, &items[..])
            .ok()
            .map(|date| date.midnight().assume_utc())
    }

    pub fn as_rfc3339(&self) -> Option<OffsetDateTime> {
        OffsetDateTime::parse(&self.text, &Rfc3339).ok()
    }

    pub fn as_duration(&self) -> Option<Duration> {
        parse_duration(&self.text)
    }

    pub fn is_nil(&self) -> bool {
        self.text.is_empty()
    }

    pub fn equal_to(&self, other: &Value) -> bool {
        self.text == other.text
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

fn unsupported(input: &serde_json::Value) -> Error {
    let kind = match input {
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
        _ => "number",
    };
    Error::new(ErrorKind::UnsupportedType).with_message(format!("{input}({kind}) is not supported"))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Self { text }
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }
}

macro_rules! value_from_integer {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Self { text: n.to_string() }
                }
            }
        )*
    };
}

value_from_integer!(i32, i64, u32, u64, usize);

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        // `Display` for f64 is the shortest round-trip decimal, never exponent form.
        Self { text: n.to_string() }
    }
}

impl From<f32> for Value {
    fn from(n: f32) -> Self {
        Self { text: n.to_string() }
    }
}

impl From<OffsetDateTime> for Value {
    fn from(ts: OffsetDateTime) -> Self {
        let text = ts.format(&Rfc3339).unwrap_or_else(|_| ts.to_string());
        Self { text }
    }
}

impl From<Duration> for Value {
    fn from(d: Duration) -> Self {
        Self {
            text: format_duration(d),
        }
    }
}

/// Parses a signed duration literal such as `"1h2m3s"`, `"-1.5s"` or
/// `"200h"`. Accepted units are `ns`, `us`, `µs`, `μs`, `ms`, `s`, `m`, `h`.
pub fn parse_duration(literal: &str) -> Option<Duration> {
    let (negative, mut rest) = match literal.as_bytes().first() {
        Some(b'-') => (true, &literal[1..]),
        Some(b'+') => (false, &literal[1..]),
        _ => (false, literal),
    };
    if rest == "0" {
        return Some(Duration::ZERO);
    }
    if rest.is_empty() {
        return None;
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let int_len = rest.bytes().take_while(u8::is_ascii_digit).count();
        let int_part = &rest[..int_len];
        rest = &rest[int_len..];

        let mut frac_part = "";
        if let Some(after_dot) = rest.strip_prefix('.') {
            let frac_len = after_dot.bytes().take_while(u8::is_ascii_digit).count();
            frac_part = &after_dot[..frac_len];
            rest = &after_dot[frac_len..];
        }
        if int_part.is_empty() && frac_part.is_empty() {
            return None;
        }

        let unit_len = rest
            .find(|c: char| c == '.' || c.is_ascii_digit())
            .unwrap_or(rest.len());
        let scale = unit_scale(&rest[..unit_len])?;
        rest = &rest[unit_len..];

        let whole = if int_part.is_empty() {
            0
        } else {
            int_part.parse::<u64>().ok()? as u128
        };
        total = total.checked_add(whole.checked_mul(scale)?)?;
        total = total.checked_add(fraction_nanos(frac_part, scale))?;
        if total > i64::MAX as u128 + 1 {
            return None;
        }
    }

    let signed = if negative {
        -(total as i128)
    } else {
        total as i128
    };
    let nanos = i64::try_from(signed).ok()?;
    Some(Duration::nanoseconds(nanos))
}

fn unit_scale(unit: &str) -> Option<u128> {
    match unit {
        "ns" => Some(1),
        "us" | "\u{b5}s" | "\u{3bc}s" => Some(NANOS_PER_MICRO),
        "ms" => Some(NANOS_PER_MILLI),
        "s" => Some(NANOS_PER_SECOND),
        "m" => Some(60 * NANOS_PER_SECOND),
        "h" => Some(3600 * NANOS_PER_SECOND),
        _ => None,
    }
}

fn fraction_nanos(digits: &str, scale: u128) -> u128 {
    let mut numerator: u128 = 0;
    let mut denominator: u128 = 1;
    // digits past nanosecond resolution of the largest unit cannot change the result
    for digit in digits.bytes().take(18) {
        numerator = numerator * 10 + u128::from(digit - b'0');
        denominator *= 10;
    }
    numerator * scale / denominator
}

/// Renders a duration as the literal `parse_duration` reads back:
/// `"1h2m3s"`, `"1m30s"`, `"1.5s"`, `"300ms"`, `"1.5µs"`, `"0s"`.
pub fn format_duration(d: Duration) -> String {
    let nanos = d.whole_nanoseconds();
    if nanos == 0 {
        return "0s".to_string();
    }
    let sign = if nanos < 0 { "-" } else { "" };
    let magnitude = nanos.unsigned_abs();

    if magnitude < NANOS_PER_SECOND {
        let (unit, precision) = if magnitude < NANOS_PER_MICRO {
            ("ns", 0)
        } else if magnitude < NANOS_PER_MILLI {
            ("\u{b5}s", 3)
        } else {
            ("ms", 6)
        };
        return format!("{sign}{}{unit}", fixed_point(magnitude, precision));
    }

    let whole_seconds = magnitude / NANOS_PER_SECOND;
    let hours = whole_seconds / 3600;
    let minutes = (whole_seconds / 60) % 60;
    let seconds = fixed_point((whole_seconds % 60) * NANOS_PER_SECOND + magnitude % NANOS_PER_SECOND, 9);
    if hours > 0 {
        format!("{sign}{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{sign}{minutes}m{seconds}s")
    } else {
        format!("{sign}{seconds}s")
    }
}

fn fixed_point(value: u128, precision: u32) -> String {
    if precision == 0 {
        return value.to_string();
    }
    let divisor = 10u128.pow(precision);
    let whole = value / divisor;
    let frac = value % divisor;
    if frac == 0 {
        return whole.to_string();
    }
    let digits = format!("{frac:0width$}", width = precision as usize);
    format!("{whole}.{}", digits.trim_end_matches('0'))
}
