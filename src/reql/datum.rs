//! Datum - the value model shared by queries and responses.
//!
//! A `Datum` is any value that can travel between the driver and the server.
//! It is JSON-shaped, with three pseudo types layered on top of plain JSON:
//!
//! - **TIME**: epoch seconds plus a fixed timezone offset (`"+02:00"`)
//! - **BINARY**: raw bytes, base64 encoded on the wire
//! - **GROUPED_DATA**: the `[group, reduction]` pairs produced by `group()`
//!
//! On the wire a pseudo type is an object tagged with `$reql_type$`:
//!
//! ```json
//! {"$reql_type$": "TIME", "epoch_time": 1700000000.0, "timezone": "+00:00"}
//! {"$reql_type$": "BINARY", "data": "AQID"}
//! {"$reql_type$": "GROUPED_DATA", "data": [["a", 1], ["b", 2]]}
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use rethinkdb_client::reql::Datum;
//! use chrono::{FixedOffset, TimeZone};
//!
//! let when = FixedOffset::east_opt(3600).unwrap()
//!     .with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
//! let datum = Datum::from(when);
//! assert_eq!(datum.as_time(), Some(when));
//! ```

use crate::error::{Error, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value};
use std::collections::{BTreeMap, HashMap};

/// Key that marks an object as a pseudo type.
pub const REQL_TYPE_KEY: &str = "$reql_type$";

const TIME_TYPE: &str = "TIME";
const BINARY_TYPE: &str = "BINARY";
const GROUPED_DATA_TYPE: &str = "GROUPED_DATA";

/// A point in time as the server represents it.
#[derive(Debug, Clone, PartialEq)]
pub struct ReqlTime {
    /// Seconds since the Unix epoch, with fractional milliseconds.
    pub epoch_time: f64,
    /// Offset in `[+-]HH:MM` form.
    pub timezone: String,
}

impl ReqlTime {
    /// Rebuild the timezone-aware timestamp.
    ///
    /// The server keeps millisecond precision, so the epoch is rounded to
    /// whole milliseconds before conversion.
    pub fn to_datetime(&self) -> Option<DateTime<FixedOffset>> {
        let offset = parse_offset(&self.timezone)?;
        let millis = (self.epoch_time * 1000.0).round() as i64;
        let utc = DateTime::<Utc>::from_timestamp_millis(millis)?;
        Some(utc.with_timezone(&offset))
    }
}

/// Datum represents a value in a query or a response.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    Array(Vec<Datum>),
    Object(HashMap<String, Datum>),
    Time(ReqlTime),
    Binary(Bytes),
    GroupedData(Vec<(Datum, Datum)>),
}

impl Datum {
    /// Check if datum is null
    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    /// Get as string
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Datum::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Datum::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Get as boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Datum::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as array
    pub fn as_array(&self) -> Option<&Vec<Datum>> {
        match self {
            Datum::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Get as object
    pub fn as_object(&self) -> Option<&HashMap<String, Datum>> {
        match self {
            Datum::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Get a TIME pseudo type as a timezone-aware timestamp.
    pub fn as_time(&self) -> Option<DateTime<FixedOffset>> {
        match self {
            Datum::Time(t) => t.to_datetime(),
            _ => None,
        }
    }

    /// Get a BINARY pseudo type as its bytes.
    pub fn as_binary(&self) -> Option<&Bytes> {
        match self {
            Datum::Binary(b) => Some(b),
            _ => None,
        }
    }

    /// Get GROUPED_DATA as its `(group, value)` pairs.
    pub fn as_grouped(&self) -> Option<&[(Datum, Datum)]> {
        match self {
            Datum::GroupedData(groups) => Some(groups),
            _ => None,
        }
    }

    /// Name of the datum kind, matching the server's `typeOf` names.
    pub fn type_name(&self) -> &'static str {
        match self {
            Datum::Null => "NULL",
            Datum::Boolean(_) => "BOOL",
            Datum::Number(_) => "NUMBER",
            Datum::String(_) => "STRING",
            Datum::Array(_) => "ARRAY",
            Datum::Object(_) => "OBJECT",
            Datum::Time(_) => "PTYPE<TIME>",
            Datum::Binary(_) => "PTYPE<BINARY>",
            Datum::GroupedData(_) => "GROUPED_DATA",
        }
    }

    /// Convert a native value into the matching variant.
    ///
    /// Timestamps become TIME and byte buffers (`Bytes`, `&[u8]`) become
    /// BINARY. Types with no conversion are rejected at compile time; use
    /// [`Datum::from_serialize`] for arbitrary serde types.
    pub fn from_native<T: Into<Datum>>(value: T) -> Self {
        value.into()
    }

    /// Convert any serializable value through its JSON form.
    ///
    /// Timestamps and byte vectors arrive here as strings and number arrays;
    /// wrap them with [`Datum::from_native`] to keep their pseudo types.
    /// Fails with [`Error::UnsupportedType`] for values JSON cannot hold,
    /// such as maps keyed by something other than strings.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        let json = serde_json::to_value(value)
            .map_err(|e| Error::UnsupportedType(e.to_string()))?;
        Ok(Datum::from_json(json))
    }

    /// Convert the datum back into a native value.
    ///
    /// TIME becomes an RFC 3339 string (so it deserializes into
    /// `DateTime<FixedOffset>`), BINARY a sequence of bytes and GROUPED_DATA
    /// an array of `[group, value]` pairs.
    pub fn to_native<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.to_plain_json())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Decode a wire JSON value, recognising pseudo types.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => Datum::Null,
            Value::Bool(b) => Datum::Boolean(b),
            Value::Number(n) => Datum::Number(n.as_f64().unwrap_or(0.0)),
            Value::String(s) => Datum::String(s),
            Value::Array(arr) => Datum::Array(arr.into_iter().map(Datum::from_json).collect()),
            Value::Object(obj) => Self::object_from_json(obj),
        }
    }

    fn object_from_json(obj: Map<String, Value>) -> Self {
        match obj.get(REQL_TYPE_KEY).and_then(Value::as_str) {
            Some(TIME_TYPE) => {
                let epoch_time = obj.get("epoch_time").and_then(Value::as_f64);
                let timezone = obj.get("timezone").and_then(Value::as_str);
                if let (Some(epoch_time), Some(timezone)) = (epoch_time, timezone) {
                    return Datum::Time(ReqlTime {
                        epoch_time,
                        timezone: timezone.to_string(),
                    });
                }
            }
            Some(BINARY_TYPE) => {
                if let Some(bytes) = obj
                    .get("data")
                    .and_then(Value::as_str)
                    .and_then(|data| BASE64.decode(data).ok())
                {
                    return Datum::Binary(Bytes::from(bytes));
                }
            }
            Some(GROUPED_DATA_TYPE) => {
                if let Some(pairs) = obj.get("data").and_then(Value::as_array) {
                    let groups: Option<Vec<(Datum, Datum)>> = pairs
                        .iter()
                        .map(|pair| match pair.as_array().map(Vec::as_slice) {
                            Some([group, value]) => Some((
                                Datum::from_json(group.clone()),
                                Datum::from_json(value.clone()),
                            )),
                            _ => None,
                        })
                        .collect();
                    if let Some(groups) = groups {
                        return Datum::GroupedData(groups);
                    }
                }
            }
            // Other pseudo types (GEOMETRY, ...) stay plain objects.
            _ => {}
        }

        Datum::Object(
            obj.into_iter()
                .map(|(k, v)| (k, Datum::from_json(v)))
                .collect(),
        )
    }

    /// Encode as wire JSON, pseudo types in their tagged form.
    pub fn to_json(&self) -> Value {
        match self {
            Datum::Null => Value::Null,
            Datum::Boolean(b) => Value::Bool(*b),
            Datum::Number(n) => number_to_json(*n),
            Datum::String(s) => Value::String(s.clone()),
            Datum::Array(arr) => Value::Array(arr.iter().map(Datum::to_json).collect()),
            Datum::Object(obj) => Value::Object(
                obj.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Datum::Time(t) => serde_json::json!({
                REQL_TYPE_KEY: TIME_TYPE,
                "epoch_time": t.epoch_time,
                "timezone": t.timezone,
            }),
            Datum::Binary(bytes) => serde_json::json!({
                REQL_TYPE_KEY: BINARY_TYPE,
                "data": BASE64.encode(bytes),
            }),
            Datum::GroupedData(groups) => serde_json::json!({
                REQL_TYPE_KEY: GROUPED_DATA_TYPE,
                "data": groups
                    .iter()
                    .map(|(g, v)| Value::Array(vec![g.to_json(), v.to_json()]))
                    .collect::<Vec<_>>(),
            }),
        }
    }

    fn to_plain_json(&self) -> Value {
        match self {
            Datum::Array(arr) => Value::Array(arr.iter().map(Datum::to_plain_json).collect()),
            Datum::Object(obj) => Value::Object(
                obj.iter()
                    .map(|(k, v)| (k.clone(), v.to_plain_json()))
                    .collect(),
            ),
            Datum::Time(t) => t
                .to_datetime()
                .map(|dt| Value::String(dt.to_rfc3339()))
                .unwrap_or(Value::Null),
            Datum::Binary(bytes) => Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()),
            Datum::GroupedData(groups) => Value::Array(
                groups
                    .iter()
                    .map(|(g, v)| Value::Array(vec![g.to_plain_json(), v.to_plain_json()]))
                    .collect(),
            ),
            other => other.to_json(),
        }
    }
}

/// Integral values render without a fractional part; everything is f64.
fn number_to_json(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        Value::Number(Number::from(n as i64))
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

fn parse_offset(tz: &str) -> Option<FixedOffset> {
    if tz == "Z" {
        return FixedOffset::east_opt(0);
    }
    let (sign, rest) = match tz.as_bytes().first()? {
        b'+' => (1, &tz[1..]),
        b'-' => (-1, &tz[1..]),
        _ => return None,
    };
    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h.parse::<i32>().ok()?, m.parse::<i32>().ok()?),
        None if rest.len() == 4 => (rest[..2].parse().ok()?, rest[2..].parse().ok()?),
        None => (rest.parse().ok()?, 0),
    };
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

fn format_offset(offset: &FixedOffset) -> String {
    let secs = offset.local_minus_utc();
    let sign = if secs < 0 { '-' } else { '+' };
    let secs = secs.abs();
    format!("{}{:02}:{:02}", sign, secs / 3600, (secs % 3600) / 60)
}

impl Serialize for Datum {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Datum {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Datum::from_json)
    }
}

// Conversions

impl From<()> for Datum {
    fn from(_: ()) -> Self {
        Datum::Null
    }
}

impl From<bool> for Datum {
    fn from(b: bool) -> Self {
        Datum::Boolean(b)
    }
}

macro_rules! datum_from_number {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Datum {
                fn from(n: $t) -> Self {
                    Datum::Number(n as f64)
                }
            }
        )*
    };
}

datum_from_number!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize, f32, f64);

impl From<String> for Datum {
    fn from(s: String) -> Self {
        Datum::String(s)
    }
}

impl From<&str> for Datum {
    fn from(s: &str) -> Self {
        Datum::String(s.to_string())
    }
}

impl From<&String> for Datum {
    fn from(s: &String) -> Self {
        Datum::String(s.clone())
    }
}

impl<T: Into<Datum>> From<Vec<T>> for Datum {
    fn from(items: Vec<T>) -> Self {
        Datum::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Datum>> From<Option<T>> for Datum {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Datum::Null)
    }
}

impl<T: Into<Datum>> From<HashMap<String, T>> for Datum {
    fn from(map: HashMap<String, T>) -> Self {
        Datum::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<T: Into<Datum>> From<BTreeMap<String, T>> for Datum {
    fn from(map: BTreeMap<String, T>) -> Self {
        Datum::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for Datum {
    fn from(dt: DateTime<Tz>) -> Self {
        let fixed = dt.fixed_offset();
        let epoch_time = fixed.timestamp() as f64 + f64::from(fixed.timestamp_subsec_millis()) / 1000.0;
        Datum::Time(ReqlTime {
            epoch_time,
            timezone: format_offset(fixed.offset()),
        })
    }
}

impl From<Bytes> for Datum {
    fn from(bytes: Bytes) -> Self {
        Datum::Binary(bytes)
    }
}

impl From<&[u8]> for Datum {
    fn from(bytes: &[u8]) -> Self {
        Datum::Binary(Bytes::copy_from_slice(bytes))
    }
}

impl From<Value> for Datum {
    fn from(value: Value) -> Self {
        Datum::from_json(value)
    }
}

impl From<Datum> for Value {
    fn from(datum: Datum) -> Self {
        datum.to_json()
    }
}

impl std::fmt::Display for Datum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Datum::Null => write!(f, "null"),
            Datum::Boolean(b) => write!(f, "{}", b),
            Datum::Number(n) => write!(f, "{}", n),
            Datum::String(s) => write!(f, "\"{}\"", s),
            Datum::Array(arr) => {
                write!(f, "[")?;
                for (i, item) in arr.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Datum::Object(obj) => {
                write!(f, "{{")?;
                for (i, (key, value)) in obj.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "\"{}\": {}", key, value)?;
                }
                write!(f, "}}")
            }
            Datum::Time(t) => match t.to_datetime() {
                Some(dt) => write!(f, "TIME({})", dt.to_rfc3339()),
                None => write!(f, "TIME({} {})", t.epoch_time, t.timezone),
            },
            Datum::Binary(bytes) => write!(f, "BINARY({} bytes)", bytes.len()),
            Datum::GroupedData(groups) => {
                write!(f, "GROUPED(")?;
                for (i, (group, value)) in groups.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{} => {}", group, value)?;
                }
                write!(f, ")")
            }
        }
    }
}
