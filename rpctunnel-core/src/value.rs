//! In-memory values handled by the marshaller
//!
//! [`Value`] is what callers pass as call arguments and what they get back as
//! results. Compared to a plain JSON value it adds the kinds that have no
//! native JSON form: raw bytes, timestamps, structured records, and
//! enumeration values.

use crate::error::{Error, Result};
use crate::marshal;
use crate::schema::StructType;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// A dynamically typed value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// JSON null
    Null,
    /// Boolean
    Bool(bool),
    /// Integer
    Integer(i64),
    /// Floating point number
    Float(f64),
    /// Text
    String(String),
    /// Raw bytes
    Binary(Vec<u8>),
    /// UTC timestamp
    DateTime(DateTime<Utc>),
    /// Sequence of values
    Sequence(Vec<Value>),
    /// Untyped mapping
    Mapping(BTreeMap<String, Value>),
    /// Instance of a structured type
    Struct(StructValue),
    /// Value of an enumeration
    Enum(EnumValue),
}

impl Value {
    /// Build a value from raw JSON, without any type information
    ///
    /// Numbers that fit an `i64` become integers, everything else numeric
    /// becomes a float.
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Sequence(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Mapping(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Marshal to JSON; see [`marshal::serialize`]
    pub fn to_json(&self) -> Result<serde_json::Value> {
        marshal::serialize(self)
    }

    /// Short description of the value's kind, used in conversion errors
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Binary(_) => "binary",
            Value::DateTime(_) => "date",
            Value::Sequence(_) => "sequence",
            Value::Mapping(_) => "mapping",
            Value::Struct(_) => "structure",
            Value::Enum(_) => "enumeration value",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integers, and the code of enumeration values
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Enum(e) => Some(e.code()),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Binary(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<&DateTime<Utc>> {
        match self {
            Value::DateTime(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Mapping(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructValue> {
        match self {
            Value::Struct(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&EnumValue> {
        match self {
            Value::Enum(e) => Some(e),
            _ => None,
        }
    }

    /// Member lookup on mappings and structures
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Mapping(map) => map.get(key),
            Value::Struct(s) => s.get(key),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::Binary(bytes)
    }
}

impl From<&[u8]> for Value {
    fn from(bytes: &[u8]) -> Self {
        Value::Binary(bytes.to_vec())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(d: DateTime<Utc>) -> Self {
        Value::DateTime(d)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Sequence(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Mapping(map)
    }
}

impl From<StructValue> for Value {
    fn from(s: StructValue) -> Self {
        Value::Struct(s)
    }
}

impl From<EnumValue> for Value {
    fn from(e: EnumValue) -> Self {
        Value::Enum(e)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Value::from_json(json)
    }
}

/// Instance of a [`StructType`]
///
/// Every declared field is either set or unset. Unset fields are left out
/// when the instance is marshalled, which is how partial structures travel.
/// Two instances are equal when they are of the same type and agree on every
/// field, set or unset.
///
/// # Examples
///
/// ```rust
/// use rpctunnel_core::{StructType, StructValue, TypeDescriptor};
///
/// let ty = StructType::new("RenderOptions")
///     .field("width", TypeDescriptor::Integer)
///     .field("height", TypeDescriptor::Integer);
///
/// let options = StructValue::new(&ty).with("width", 320).unwrap();
/// assert_eq!(options.get("width").and_then(|v| v.as_i64()), Some(320));
/// assert!(!options.is_set("height"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct StructValue {
    type_name: String,
    fields: Vec<(String, Option<Value>)>,
}

impl StructValue {
    /// An instance with every field unset
    pub fn new(ty: &StructType) -> Self {
        Self {
            type_name: ty.name().to_string(),
            fields: ty.fields().iter().map(|f| (f.name.clone(), None)).collect(),
        }
    }

    /// Name of the structured type
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Value of a set field
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .and_then(|(_, value)| value.as_ref())
    }

    /// `true` if the field is declared and set
    pub fn is_set(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    /// Set a declared field
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> Result<()> {
        let slot = self.slot(field)?;
        *slot = Some(value.into());
        Ok(())
    }

    /// Builder form of [`StructValue::set`]
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Result<Self> {
        self.set(field, value)?;
        Ok(self)
    }

    /// Unset a declared field, returning its previous value
    pub fn unset(&mut self, field: &str) -> Result<Option<Value>> {
        Ok(self.slot(field)?.take())
    }

    /// Set fields, in declaration order
    pub fn set_fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields
            .iter()
            .filter_map(|(name, value)| value.as_ref().map(|v| (name.as_str(), v)))
    }

    fn slot(&mut self, field: &str) -> Result<&mut Option<Value>> {
        let type_name = &self.type_name;
        self.fields
            .iter_mut()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
            .ok_or_else(|| Error::UnknownField {
                structure: type_name.clone(),
                field: field.to_string(),
            })
    }
}

/// Value of an enumeration
///
/// Behaves as its integer code for comparison and ordering; its symbolic name
/// is what goes on the wire.
#[derive(Debug, Clone)]
pub struct EnumValue {
    enumeration: String,
    name: String,
    code: i64,
}

impl EnumValue {
    pub(crate) fn new(enumeration: &str, name: &str, code: i64) -> Self {
        Self {
            enumeration: enumeration.to_string(),
            name: name.to_string(),
            code,
        }
    }

    /// Name of the enumeration type
    pub fn enumeration(&self) -> &str {
        &self.enumeration
    }

    /// Symbolic name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Integer code
    pub fn code(&self) -> i64 {
        self.code
    }
}

impl PartialEq for EnumValue {
    fn eq(&self, other: &Self) -> bool {
        self.enumeration == other.enumeration && self.code == other.code
    }
}

impl Eq for EnumValue {}

impl PartialEq<i64> for EnumValue {
    fn eq(&self, other: &i64) -> bool {
        self.code == *other
    }
}

impl PartialOrd for EnumValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EnumValue {
    fn cmp(&self, other: &Self) -> Ordering {
        self.code
            .cmp(&other.code)
            .then_with(|| self.enumeration.cmp(&other.enumeration))
    }
}

impl PartialOrd<i64> for EnumValue {
    fn partial_cmp(&self, other: &i64) -> Option<Ordering> {
        Some(self.code.cmp(other))
    }
}

impl From<EnumValue> for i64 {
    fn from(e: EnumValue) -> Self {
        e.code
    }
}
