//! Structural type marshalling
//!
//! Three operations connect loosely typed wire JSON with the typed values the
//! callers work with:
//!
//! - [`construct`] builds a structured instance from a raw mapping.
//! - [`serialize`] turns any [`Value`] into JSON for the wire.
//! - [`convert`] turns a raw reply value into the declared result type.
//!
//! Wire conventions:
//!
//! | In memory            | On the wire                             |
//! |----------------------|-----------------------------------------|
//! | structure            | object of its set fields                |
//! | enumeration value    | its symbolic name, as a string          |
//! | binary               | base64 text                             |
//! | date                 | `YYYY-MM-DDTHH:MM:SS.ffffffZ` (UTC)     |
//!
//! Nothing here performs I/O.

use crate::error::{Error, Result};
use crate::schema::{EnumType, StructType, TypeDescriptor, TypeRegistry};
use crate::value::{StructValue, Value};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::collections::BTreeMap;

/// Format used when sending dates: UTC, microseconds, literal `Z`
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

// `%.f` reads any number of fractional digits, so millisecond timestamps
// produced by JavaScript services parse as well.
const DATETIME_PARSE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

/// Render a date in the wire format
///
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use rpctunnel_core::marshal::format_datetime;
///
/// let date = Utc.with_ymd_and_hms(2014, 5, 8, 10, 11, 12).unwrap();
/// assert_eq!(format_datetime(&date), "2014-05-08T10:11:12.000000Z");
/// ```
pub fn format_datetime(date: &DateTime<Utc>) -> String {
    date.format(DATETIME_FORMAT).to_string()
}

/// Parse a date in the wire format
pub fn parse_datetime(text: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(text, DATETIME_PARSE_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| Error::Decode(format!("invalid date {:?}: {}", text, e)))
}

/// Encode bytes as base64 text
pub fn encode_binary(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode base64 text
pub fn decode_binary(text: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(text)
        .map_err(|e| Error::Decode(format!("invalid base64: {}", e)))
}

/// Marshal a value to JSON
///
/// Structures become objects of their set fields, enumeration values their
/// symbolic name, bytes base64 text and dates the fixed UTC form. A float
/// that JSON cannot represent (NaN, infinity) is a serialization fault.
pub fn serialize(value: &Value) -> Result<serde_json::Value> {
    Ok(match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Integer(i) => serde_json::Value::from(*i),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .ok_or_else(|| Error::Serialization(format!("{} is not convertible to JSON", f)))?,
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Binary(bytes) => serde_json::Value::String(encode_binary(bytes)),
        Value::DateTime(date) => serde_json::Value::String(format_datetime(date)),
        Value::Sequence(items) => serde_json::Value::Array(
            items.iter().map(serialize).collect::<Result<Vec<_>>>()?,
        ),
        Value::Mapping(map) => {
            let mut object = serde_json::Map::new();
            for (key, item) in map {
                object.insert(key.clone(), serialize(item)?);
            }
            serde_json::Value::Object(object)
        }
        Value::Struct(instance) => {
            let mut object = serde_json::Map::new();
            for (field, item) in instance.set_fields() {
                object.insert(field.to_string(), serialize(item)?);
            }
            serde_json::Value::Object(object)
        }
        Value::Enum(e) => serde_json::Value::String(e.name().to_string()),
    })
}

/// Build an instance of `ty` from a raw mapping
///
/// Declared fields missing from `raw` stay unset and members that `ty` does
/// not declare are ignored. For each present field:
///
/// - a structured field type is constructed recursively from the nested
///   mapping;
/// - an enumeration accepts either the integer code or the symbolic name;
/// - sequences, binary and date fields are converted like results are;
/// - any other value is copied as-is.
///
/// Forward references in field types are looked up in `registry` here, at
/// construction time.
pub fn construct(registry: &TypeRegistry, ty: &StructType, raw: Value) -> Result<StructValue> {
    let mut members = match raw {
        Value::Mapping(map) => map,
        Value::Struct(instance) => instance
            .set_fields()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect(),
        other => return Err(Error::conversion(ty.name(), other.kind())),
    };

    let mut instance = StructValue::new(ty);
    for field in ty.fields() {
        let Some(raw_field) = members.remove(&field.name) else {
            continue;
        };

        let value = match registry.resolve(&field.ty)? {
            declared @ (TypeDescriptor::Struct(_)
            | TypeDescriptor::Enum(_)
            | TypeDescriptor::Sequence(_)
            | TypeDescriptor::Binary
            | TypeDescriptor::DateTime) => convert(registry, raw_field, &declared)?,
            _ => raw_field,
        };
        instance.set(&field.name, value)?;
    }

    Ok(instance)
}

/// Convert a raw value to the declared type
///
/// The inverse of [`serialize`]: `[T]` converts every element to `T`, a
/// mapping against a structured type is constructed, dates are parsed from
/// the wire format, base64 text against a binary type is decoded, and
/// primitives are coerced directly. `null` converts to `null` for every
/// declared type, and [`TypeDescriptor::Any`] passes the raw value through.
pub fn convert(registry: &TypeRegistry, raw: Value, expected: &TypeDescriptor) -> Result<Value> {
    if raw.is_null() {
        return Ok(Value::Null);
    }

    match expected {
        TypeDescriptor::Any => Ok(raw),
        TypeDescriptor::Named(_) => convert(registry, raw, &registry.resolve(expected)?),
        TypeDescriptor::Sequence(item) => match raw {
            Value::Sequence(items) => items
                .into_iter()
                .map(|element| convert(registry, element, item))
                .collect::<Result<Vec<_>>>()
                .map(Value::Sequence),
            other => Err(Error::conversion(expected, other.kind())),
        },
        TypeDescriptor::Struct(ty) => construct(registry, ty, raw).map(Value::Struct),
        TypeDescriptor::Enum(ty) => convert_enum(ty, raw).map(Value::Enum),
        TypeDescriptor::DateTime => match raw {
            Value::DateTime(_) => Ok(raw),
            Value::String(text) => parse_datetime(&text).map(Value::DateTime),
            other => Err(Error::conversion(expected, other.kind())),
        },
        TypeDescriptor::Binary => match raw {
            Value::Binary(_) => Ok(raw),
            Value::String(text) => decode_binary(&text).map(Value::Binary),
            other => Err(Error::conversion(expected, other.kind())),
        },
        TypeDescriptor::Boolean => match raw {
            Value::Bool(_) => Ok(raw),
            other => Err(Error::conversion(expected, other.kind())),
        },
        TypeDescriptor::Integer => match raw {
            Value::Integer(_) => Ok(raw),
            Value::Float(f) if f.is_finite() => Ok(Value::Integer(f.trunc() as i64)),
            Value::Enum(e) => Ok(Value::Integer(e.code())),
            Value::String(text) => text
                .trim()
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| Error::conversion(expected, format!("string {:?}", text))),
            other => Err(Error::conversion(expected, other.kind())),
        },
        TypeDescriptor::Float => match raw {
            Value::Float(_) => Ok(raw),
            Value::Integer(i) => Ok(Value::Float(i as f64)),
            Value::String(text) => text
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| Error::conversion(expected, format!("string {:?}", text))),
            other => Err(Error::conversion(expected, other.kind())),
        },
        TypeDescriptor::String => match raw {
            Value::String(_) => Ok(raw),
            Value::Integer(i) => Ok(Value::String(i.to_string())),
            Value::Float(f) => Ok(Value::String(f.to_string())),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            Value::Enum(e) => Ok(Value::String(e.name().to_string())),
            other => Err(Error::conversion(expected, other.kind())),
        },
        TypeDescriptor::Mapping => match raw {
            Value::Mapping(_) => Ok(raw),
            Value::Struct(instance) => Ok(Value::Mapping(
                instance
                    .set_fields()
                    .map(|(name, value)| (name.to_string(), value.clone()))
                    .collect::<BTreeMap<_, _>>(),
            )),
            other => Err(Error::conversion(expected, other.kind())),
        },
    }
}

/// [`convert`] for a raw JSON value
pub fn convert_json(
    registry: &TypeRegistry,
    raw: serde_json::Value,
    expected: &TypeDescriptor,
) -> Result<Value> {
    convert(registry, Value::from_json(raw), expected)
}

fn convert_enum(ty: &EnumType, raw: Value) -> Result<crate::value::EnumValue> {
    match raw {
        Value::Integer(code) => ty.from_code(code),
        Value::String(name) => ty.value(&name),
        Value::Enum(e) if e.enumeration() == ty.name() => Ok(e),
        other => Err(Error::conversion(ty.name(), other.kind())),
    }
}
