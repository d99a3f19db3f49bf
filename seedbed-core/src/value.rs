//! Conversion of document text into typed scalar values.

use std::fmt;
use std::num::{ParseFloatError, ParseIntError};
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Primitive type tag of a scalar field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    String,
    I8,
    I16,
    I32,
    I64,
    U8,
    Bool,
    Decimal,
    F32,
    F64,
    DateTime,
    DateTimeOffset,
    TimeSpan,
    Bytes,
    Uuid,
}

impl ScalarType {
    pub const ALL: [ScalarType; 15] = [
        ScalarType::String,
        ScalarType::I8,
        ScalarType::I16,
        ScalarType::I32,
        ScalarType::I64,
        ScalarType::U8,
        ScalarType::Bool,
        ScalarType::Decimal,
        ScalarType::F32,
        ScalarType::F64,
        ScalarType::DateTime,
        ScalarType::DateTimeOffset,
        ScalarType::TimeSpan,
        ScalarType::Bytes,
        ScalarType::Uuid,
    ];

    /// Canonical tag name, as accepted by [`ScalarType::from_str`].
    pub fn name(&self) -> &'static str {
        match self {
            ScalarType::String => "string",
            ScalarType::I8 => "i8",
            ScalarType::I16 => "i16",
            ScalarType::I32 => "i32",
            ScalarType::I64 => "i64",
            ScalarType::U8 => "u8",
            ScalarType::Bool => "bool",
            ScalarType::Decimal => "decimal",
            ScalarType::F32 => "f32",
            ScalarType::F64 => "f64",
            ScalarType::DateTime => "datetime",
            ScalarType::DateTimeOffset => "datetime_offset",
            ScalarType::TimeSpan => "timespan",
            ScalarType::Bytes => "bytes",
            ScalarType::Uuid => "uuid",
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScalarType {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ScalarType::ALL
            .into_iter()
            .find(|ty| ty.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConvertError::UnsupportedType(s.to_string()))
    }
}

/// A converted scalar value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    String(String),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    Bool(bool),
    Decimal(Decimal),
    F32(f32),
    F64(f64),
    DateTime(NaiveDateTime),
    DateTimeOffset(DateTime<FixedOffset>),
    TimeSpan(#[serde(with = "crate::serde_helpers::time_span")] TimeDelta),
    Bytes(#[serde(with = "crate::serde_helpers::byte_string")] Vec<u8>),
    Uuid(Uuid),
}

impl Scalar {
    /// Returns the type tag of this value.
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            Scalar::String(_) => ScalarType::String,
            Scalar::I8(_) => ScalarType::I8,
            Scalar::I16(_) => ScalarType::I16,
            Scalar::I32(_) => ScalarType::I32,
            Scalar::I64(_) => ScalarType::I64,
            Scalar::U8(_) => ScalarType::U8,
            Scalar::Bool(_) => ScalarType::Bool,
            Scalar::Decimal(_) => ScalarType::Decimal,
            Scalar::F32(_) => ScalarType::F32,
            Scalar::F64(_) => ScalarType::F64,
            Scalar::DateTime(_) => ScalarType::DateTime,
            Scalar::DateTimeOffset(_) => ScalarType::DateTimeOffset,
            Scalar::TimeSpan(_) => ScalarType::TimeSpan,
            Scalar::Bytes(_) => ScalarType::Bytes,
            Scalar::Uuid(_) => ScalarType::Uuid,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::String(v) => f.write_str(v),
            Scalar::I8(v) => write!(f, "{v}"),
            Scalar::I16(v) => write!(f, "{v}"),
            Scalar::I32(v) => write!(f, "{v}"),
            Scalar::I64(v) => write!(f, "{v}"),
            Scalar::U8(v) => write!(f, "{v}"),
            Scalar::Bool(v) => write!(f, "{v}"),
            Scalar::Decimal(v) => write!(f, "{v}"),
            Scalar::F32(v) => write!(f, "{v}"),
            Scalar::F64(v) => write!(f, "{v}"),
            Scalar::DateTime(v) => write!(f, "{v}"),
            Scalar::DateTimeOffset(v) => write!(f, "{}", v.to_rfc3339()),
            Scalar::TimeSpan(v) => write!(f, "{v}"),
            Scalar::Bytes(v) => f.write_str(&hex::encode(v)),
            Scalar::Uuid(v) => write!(f, "{v}"),
        }
    }
}

/// Error produced by the value converter.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("can't convert to type \"{0}\"")]
    UnsupportedType(String),
    #[error("error converting \"{value}\" to type \"{target}\": {source}")]
    Parse {
        value: String,
        target: ScalarType,
        #[source]
        source: ParseFailure,
    },
}

/// Underlying reason a textual value did not parse.
#[derive(Debug, thiserror::Error)]
pub enum ParseFailure {
    #[error(transparent)]
    Int(#[from] ParseIntError),
    #[error(transparent)]
    Float(#[from] ParseFloatError),
    #[error(transparent)]
    Decimal(#[from] rust_decimal::Error),
    #[error(transparent)]
    DateTime(#[from] chrono::ParseError),
    #[error(transparent)]
    Uuid(#[from] uuid::Error),
    #[error(transparent)]
    Hex(#[from] hex::FromHexError),
    #[error("expected \"true\" or \"false\"")]
    Bool,
    #[error("expected [-]d or [-][d.]hh:mm[:ss[.fffffff]]")]
    TimeSpan,
}

/// Converts document text into a value of the given scalar type.
///
/// Strings are taken verbatim; every other type is trimmed first.
pub fn convert(target: ScalarType, text: &str) -> Result<Scalar, ConvertError> {
    parse_scalar(target, text).map_err(|source| ConvertError::Parse {
        value: text.to_string(),
        target,
        source,
    })
}

/// Like [`convert`], with the target given by its tag name.
pub fn convert_named(type_name: &str, text: &str) -> Result<Scalar, ConvertError> {
    convert(type_name.parse()?, text)
}

fn parse_scalar(target: ScalarType, text: &str) -> Result<Scalar, ParseFailure> {
    let trimmed = text.trim();
    let scalar = match target {
        ScalarType::String => Scalar::String(text.to_string()),
        ScalarType::I8 => Scalar::I8(trimmed.parse()?),
        ScalarType::I16 => Scalar::I16(trimmed.parse()?),
        ScalarType::I32 => Scalar::I32(trimmed.parse()?),
        ScalarType::I64 => Scalar::I64(trimmed.parse()?),
        ScalarType::U8 => Scalar::U8(trimmed.parse()?),
        ScalarType::Bool => Scalar::Bool(parse_bool(trimmed)?),
        ScalarType::Decimal => Scalar::Decimal(parse_decimal(trimmed)?),
        ScalarType::F32 => Scalar::F32(trimmed.parse()?),
        ScalarType::F64 => Scalar::F64(trimmed.parse()?),
        ScalarType::DateTime => Scalar::DateTime(parse_date_time(trimmed)?),
        ScalarType::DateTimeOffset => Scalar::DateTimeOffset(parse_date_time_offset(trimmed)?),
        ScalarType::TimeSpan => Scalar::TimeSpan(parse_time_span(trimmed).ok_or(ParseFailure::TimeSpan)?),
        ScalarType::Bytes => Scalar::Bytes(decode_hex_lenient(text)?),
        ScalarType::Uuid => Scalar::Uuid(Uuid::parse_str(trimmed)?),
    };
    Ok(scalar)
}

fn parse_bool(text: &str) -> Result<bool, ParseFailure> {
    if text.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if text.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(ParseFailure::Bool)
    }
}

fn parse_decimal(text: &str) -> Result<Decimal, ParseFailure> {
    match Decimal::from_str(text) {
        Ok(value) => Ok(value),
        Err(err) => {
            if text.contains(['e', 'E']) {
                Ok(Decimal::from_scientific(text)?)
            } else {
                Err(err.into())
            }
        }
    }
}

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

fn parse_date_time(text: &str) -> Result<NaiveDateTime, ParseFailure> {
    let mut first_err = None;
    for format in DATE_TIME_FORMATS {
        match NaiveDateTime::parse_from_str(text, format) {
            Ok(value) => return Ok(value),
            Err(err) => {
                first_err.get_or_insert(err);
            }
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Ok(date.and_time(NaiveTime::MIN));
        }
    }
    match DateTime::parse_from_rfc3339(text) {
        Ok(value) => Ok(value.naive_local()),
        Err(err) => Err(first_err.unwrap_or(err).into()),
    }
}

const DATE_TIME_OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f %:z", "%Y-%m-%d %H:%M:%S%.f%:z"];

fn parse_date_time_offset(text: &str) -> Result<DateTime<FixedOffset>, ParseFailure> {
    let rfc_err = match DateTime::parse_from_rfc3339(text) {
        Ok(value) => return Ok(value),
        Err(err) => err,
    };
    for format in DATE_TIME_OFFSET_FORMATS {
        if let Ok(value) = DateTime::parse_from_str(text, format) {
            return Ok(value);
        }
    }
    // No offset in the text: the wall-clock time is taken as UTC.
    match parse_date_time(text) {
        Ok(naive) => Ok(naive.and_utc().fixed_offset()),
        Err(_) => Err(rfc_err.into()),
    }
}

/// Parses `[-]d` or `[-][d.]hh:mm[:ss[.fffffff]]`.
fn parse_time_span(text: &str) -> Option<TimeDelta> {
    let (negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };

    let span = match body.split_once(':') {
        None => TimeDelta::try_days(parse_digits(body)?)?,
        Some((head, clock)) => {
            let (days, hours) = match head.split_once('.') {
                Some((days, hours)) => (parse_digits(days)?, parse_digits(hours)?),
                None => (0, parse_digits(head)?),
            };
            let mut parts = clock.splitn(2, ':');
            let minutes = parse_digits(parts.next()?)?;
            let (seconds, nanos) = match parts.next() {
                None => (0, 0),
                Some(seconds) => match seconds.split_once('.') {
                    Some((whole, fraction)) => (parse_digits(whole)?, parse_fraction(fraction)?),
                    None => (parse_digits(seconds)?, 0),
                },
            };
            if hours > 23 || minutes > 59 || seconds > 59 {
                return None;
            }
            TimeDelta::try_days(days)?
                .checked_add(&TimeDelta::try_hours(hours)?)?
                .checked_add(&TimeDelta::try_minutes(minutes)?)?
                .checked_add(&TimeDelta::try_seconds(seconds)?)?
                .checked_add(&TimeDelta::nanoseconds(nanos))?
        }
    };

    Some(if negative { -span } else { span })
}

fn parse_digits(text: &str) -> Option<i64> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// Up to seven fractional digits (100ns ticks), scaled to nanoseconds.
fn parse_fraction(text: &str) -> Option<i64> {
    if text.len() > 7 {
        return None;
    }
    let value = parse_digits(text)?;
    Some(value * 10i64.pow(9 - text.len() as u32))
}

/// Decodes hex leniently: characters outside `[0-9A-Fa-f]` are stripped and
/// a trailing odd nibble is silently dropped, so `"0A1"` yields `[0x0A]`.
fn decode_hex_lenient(text: &str) -> Result<Vec<u8>, ParseFailure> {
    let mut digits: String = text.chars().filter(char::is_ascii_hexdigit).collect();
    digits.truncate(digits.len() - digits.len() % 2);
    Ok(hex::decode(digits)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn converts_integers() {
        assert_eq!(convert(ScalarType::I32, "123").unwrap(), Scalar::I32(123));
        assert_eq!(convert(ScalarType::I16, " -7 ").unwrap(), Scalar::I16(-7));
        assert_eq!(convert(ScalarType::I64, "9000000000").unwrap(), Scalar::I64(9_000_000_000));
        assert_eq!(convert(ScalarType::U8, "255").unwrap(), Scalar::U8(255));
        assert_eq!(convert(ScalarType::I8, "-128").unwrap(), Scalar::I8(-128));
    }

    #[test]
    fn integer_overflow_is_a_conversion_error() {
        let err = convert(ScalarType::U8, "256").unwrap_err();
        assert!(matches!(err, ConvertError::Parse { target: ScalarType::U8, .. }));
    }

    #[test]
    fn non_numeric_keeps_value_and_target() {
        let err = convert(ScalarType::I32, "twelve").unwrap_err();
        match err {
            ConvertError::Parse { value, target, source } => {
                assert_eq!(value, "twelve");
                assert_eq!(target, ScalarType::I32);
                assert!(matches!(source, ParseFailure::Int(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn booleans_ignore_case() {
        assert_eq!(convert(ScalarType::Bool, "true").unwrap(), Scalar::Bool(true));
        assert_eq!(convert(ScalarType::Bool, "TRUE").unwrap(), Scalar::Bool(true));
        assert_eq!(convert(ScalarType::Bool, "False").unwrap(), Scalar::Bool(false));
        assert!(convert(ScalarType::Bool, "yes").is_err());
    }

    #[test]
    fn strings_are_verbatim() {
        assert_eq!(
            convert(ScalarType::String, "  padded ").unwrap(),
            Scalar::String("  padded ".to_string())
        );
    }

    #[test]
    fn decimals_and_floats() {
        assert_eq!(
            convert(ScalarType::Decimal, "12.50").unwrap(),
            Scalar::Decimal(Decimal::new(1250, 2))
        );
        assert_eq!(
            convert(ScalarType::Decimal, "1.5e2").unwrap(),
            Scalar::Decimal(Decimal::new(150, 0))
        );
        assert_eq!(convert(ScalarType::F64, "2.25").unwrap(), Scalar::F64(2.25));
        assert_eq!(convert(ScalarType::F32, "0.5").unwrap(), Scalar::F32(0.5));
    }

    #[test]
    fn hex_bytes_are_lenient() {
        assert_eq!(convert(ScalarType::Bytes, "0A1").unwrap(), Scalar::Bytes(vec![0x0A]));
        assert_eq!(
            convert(ScalarType::Bytes, "de-ad be:ef").unwrap(),
            Scalar::Bytes(vec![0xDE, 0xAD, 0xBE, 0xEF])
        );
        assert_eq!(convert(ScalarType::Bytes, "").unwrap(), Scalar::Bytes(vec![]));
        assert_eq!(convert(ScalarType::Bytes, "x").unwrap(), Scalar::Bytes(vec![]));
    }

    #[test]
    fn date_times() {
        let Scalar::DateTime(dt) = convert(ScalarType::DateTime, "2012-05-01").unwrap() else {
            panic!("expected date-time");
        };
        assert_eq!((dt.year(), dt.month(), dt.day(), dt.hour()), (2012, 5, 1, 0));

        let Scalar::DateTime(dt) = convert(ScalarType::DateTime, "2012-05-01T13:45:10.25").unwrap() else {
            panic!("expected date-time");
        };
        assert_eq!((dt.hour(), dt.minute(), dt.second()), (13, 45, 10));
        assert_eq!(dt.nanosecond(), 250_000_000);

        assert!(convert(ScalarType::DateTime, "05/01/2012 08:30").is_ok());
        assert!(convert(ScalarType::DateTime, "not a date").is_err());
    }

    #[test]
    fn date_time_offsets() {
        let Scalar::DateTimeOffset(dt) =
            convert(ScalarType::DateTimeOffset, "2012-05-01T10:00:00+02:00").unwrap()
        else {
            panic!("expected offset date-time");
        };
        assert_eq!(dt.offset().local_minus_utc(), 7200);

        let Scalar::DateTimeOffset(dt) = convert(ScalarType::DateTimeOffset, "2012-05-01 10:00").unwrap() else {
            panic!("expected offset date-time");
        };
        assert_eq!(dt.offset().local_minus_utc(), 0);
    }

    #[test]
    fn time_spans() {
        assert_eq!(
            convert(ScalarType::TimeSpan, "01:30").unwrap(),
            Scalar::TimeSpan(TimeDelta::minutes(90))
        );
        assert_eq!(
            convert(ScalarType::TimeSpan, "2").unwrap(),
            Scalar::TimeSpan(TimeDelta::days(2))
        );
        assert_eq!(
            convert(ScalarType::TimeSpan, "1.02:03:04.5").unwrap(),
            Scalar::TimeSpan(
                TimeDelta::days(1)
                    + TimeDelta::hours(2)
                    + TimeDelta::minutes(3)
                    + TimeDelta::seconds(4)
                    + TimeDelta::milliseconds(500)
            )
        );
        assert_eq!(
            convert(ScalarType::TimeSpan, "-00:00:10").unwrap(),
            Scalar::TimeSpan(TimeDelta::seconds(-10))
        );
        assert!(convert(ScalarType::TimeSpan, "25:00").is_err());
        assert!(convert(ScalarType::TimeSpan, "1:2:3:4").is_err());
    }

    #[test]
    fn uuids() {
        let text = "6f9619ff-8b86-d011-b42d-00c04fc964ff";
        assert_eq!(
            convert(ScalarType::Uuid, text).unwrap(),
            Scalar::Uuid(Uuid::parse_str(text).unwrap())
        );
        assert!(convert(ScalarType::Uuid, "{6f9619ff-8b86-d011-b42d-00c04fc964ff}").is_ok());
    }

    #[test]
    fn unknown_type_name_is_unsupported() {
        let err = convert_named("xml", "<a/>").unwrap_err();
        assert!(matches!(err, ConvertError::UnsupportedType(name) if name == "xml"));
        assert_eq!(convert_named("I32", "5").unwrap(), Scalar::I32(5));
    }

    #[test]
    fn scalar_reports_its_type() {
        for ty in ScalarType::ALL {
            assert_eq!(ty.name().parse::<ScalarType>().unwrap(), ty);
        }
        assert_eq!(Scalar::Bool(true).scalar_type(), ScalarType::Bool);
    }
}
