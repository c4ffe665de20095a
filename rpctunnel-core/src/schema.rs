//! Type descriptors and the type registry
//!
//! A [`TypeDescriptor`] tells the marshaller what shape a value is expected to
//! have: a primitive, a sequence, a structured record, an enumeration, or a
//! forward reference to a record or enumeration by name.
//!
//! Structured and enumeration types are registered in a [`TypeRegistry`] at
//! startup. Field types may name other registered types before those types
//! exist (mutual or self reference); the name is looked up in the registry
//! when a value is constructed, and [`TypeRegistry::validate`] checks once that
//! every such name resolves.
//!
//! # Examples
//!
//! ```rust
//! use rpctunnel_core::{EnumType, StructType, TypeDescriptor, TypeRegistry};
//!
//! let mut registry = TypeRegistry::new();
//! registry.register_struct(
//!     StructType::new("RenderOptions")
//!         .field("width", TypeDescriptor::Integer)
//!         .field("height", TypeDescriptor::Integer)
//!         .field("renderMode", TypeDescriptor::named("RenderMode")),
//! );
//! registry.register_enum(
//!     EnumType::new("RenderMode")
//!         .variant("Production", -1)
//!         .variant("RtCpu", 0)
//!         .variant("RtGpuCuda", 5),
//! );
//!
//! registry.validate().unwrap();
//! ```

use crate::error::{Error, Result};
use crate::value::EnumValue;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Expected shape of a value
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDescriptor {
    /// No expectation; the raw value is passed through
    Any,
    /// JSON boolean
    Boolean,
    /// 64-bit signed integer
    Integer,
    /// Floating point number
    Float,
    /// Text
    String,
    /// Untyped JSON object
    Mapping,
    /// Raw bytes, base64 text on the wire
    Binary,
    /// UTC timestamp, `YYYY-MM-DDTHH:MM:SS.ffffffZ` on the wire
    DateTime,
    /// Homogeneous sequence
    Sequence(Box<TypeDescriptor>),
    /// A structured record type
    Struct(Arc<StructType>),
    /// A closed enumeration
    Enum(Arc<EnumType>),
    /// A structured or enumeration type referred to by its registered name
    Named(String),
}

impl TypeDescriptor {
    /// `[T]`
    pub fn sequence_of(item: TypeDescriptor) -> Self {
        TypeDescriptor::Sequence(Box::new(item))
    }

    /// A forward reference to a registered type
    pub fn named(name: impl Into<String>) -> Self {
        TypeDescriptor::Named(name.into())
    }

    /// `true` for [`TypeDescriptor::Binary`]
    pub fn is_binary(&self) -> bool {
        matches!(self, TypeDescriptor::Binary)
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::Any => write!(f, "any"),
            TypeDescriptor::Boolean => write!(f, "boolean"),
            TypeDescriptor::Integer => write!(f, "integer"),
            TypeDescriptor::Float => write!(f, "float"),
            TypeDescriptor::String => write!(f, "string"),
            TypeDescriptor::Mapping => write!(f, "mapping"),
            TypeDescriptor::Binary => write!(f, "binary"),
            TypeDescriptor::DateTime => write!(f, "date"),
            TypeDescriptor::Sequence(item) => write!(f, "[{}]", item),
            TypeDescriptor::Struct(ty) => write!(f, "{}", ty.name()),
            TypeDescriptor::Enum(ty) => write!(f, "{}", ty.name()),
            TypeDescriptor::Named(name) => write!(f, "{}", name),
        }
    }
}

impl From<Arc<StructType>> for TypeDescriptor {
    fn from(ty: Arc<StructType>) -> Self {
        TypeDescriptor::Struct(ty)
    }
}

impl From<Arc<EnumType>> for TypeDescriptor {
    fn from(ty: Arc<EnumType>) -> Self {
        TypeDescriptor::Enum(ty)
    }
}

/// One declared field of a structured type
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    /// Field name as it appears on the wire
    pub name: String,
    /// Declared type of the field
    pub ty: TypeDescriptor,
}

/// A named record type with an ordered list of typed fields
#[derive(Debug, Clone, PartialEq)]
pub struct StructType {
    name: String,
    fields: Vec<FieldDef>,
}

impl StructType {
    /// Create a type with no fields
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Declare a field. Redeclaring a name replaces its type in place.
    pub fn field(mut self, name: impl Into<String>, ty: TypeDescriptor) -> Self {
        let name = name.into();
        match self.fields.iter_mut().find(|f| f.name == name) {
            Some(existing) => existing.ty = ty,
            None => self.fields.push(FieldDef { name, ty }),
        }
        self
    }

    /// Registered name of the type
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared fields, in declaration order
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Declared type of a field
    pub fn field_type(&self, name: &str) -> Option<&TypeDescriptor> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.ty)
    }
}

/// A closed bijection between symbolic names and integer codes
#[derive(Debug, Clone, PartialEq)]
pub struct EnumType {
    name: String,
    variants: Vec<(String, i64)>,
}

impl EnumType {
    /// Create an enumeration with no variants
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variants: Vec::new(),
        }
    }

    /// Declare a variant
    pub fn variant(mut self, name: impl Into<String>, code: i64) -> Self {
        self.variants.push((name.into(), code));
        self
    }

    /// Registered name of the enumeration
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared variants, in declaration order
    pub fn variants(&self) -> impl Iterator<Item = (&str, i64)> {
        self.variants.iter().map(|(name, code)| (name.as_str(), *code))
    }

    /// Integer code of a symbolic name
    pub fn code_of(&self, name: &str) -> Option<i64> {
        self.variants.iter().find(|(n, _)| n == name).map(|(_, c)| *c)
    }

    /// Symbolic name of an integer code
    pub fn name_of(&self, code: i64) -> Option<&str> {
        self.variants
            .iter()
            .find(|(_, c)| *c == code)
            .map(|(n, _)| n.as_str())
    }

    /// The enumeration value with this symbolic name
    pub fn value(&self, name: &str) -> Result<EnumValue> {
        let code = self.code_of(name).ok_or_else(|| self.unknown(name))?;
        Ok(EnumValue::new(&self.name, name, code))
    }

    /// The enumeration value with this integer code
    pub fn from_code(&self, code: i64) -> Result<EnumValue> {
        let name = self.name_of(code).ok_or_else(|| self.unknown(code))?;
        Ok(EnumValue::new(&self.name, name, code))
    }

    fn unknown(&self, variant: impl fmt::Display) -> Error {
        Error::UnknownEnumVariant {
            enumeration: self.name.clone(),
            variant: variant.to_string(),
        }
    }

    fn check_bijection(&self) -> Result<()> {
        let mut names = HashSet::new();
        let mut codes = HashSet::new();
        for (name, code) in &self.variants {
            if !names.insert(name.as_str()) {
                return Err(self.unknown(format!("{} (declared twice)", name)));
            }
            if !codes.insert(*code) {
                return Err(self.unknown(format!("{} (code {} declared twice)", name, code)));
            }
        }
        Ok(())
    }
}

/// A registered type
#[derive(Debug, Clone)]
pub enum TypeDef {
    /// Structured record type
    Struct(Arc<StructType>),
    /// Enumeration type
    Enum(Arc<EnumType>),
}

impl TypeDef {
    /// The descriptor that refers to this type directly
    pub fn descriptor(&self) -> TypeDescriptor {
        match self {
            TypeDef::Struct(ty) => TypeDescriptor::Struct(Arc::clone(ty)),
            TypeDef::Enum(ty) => TypeDescriptor::Enum(Arc::clone(ty)),
        }
    }
}

/// Registry of all structured and enumeration types of a service
///
/// Usually built once at startup and shared behind an `Arc` with the tunnel.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: HashMap<String, TypeDef>,
}

impl TypeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a structured type, replacing any type with the same name
    pub fn register_struct(&mut self, ty: StructType) -> Arc<StructType> {
        let ty = Arc::new(ty);
        self.types
            .insert(ty.name().to_string(), TypeDef::Struct(Arc::clone(&ty)));
        ty
    }

    /// Register an enumeration, replacing any type with the same name
    pub fn register_enum(&mut self, ty: EnumType) -> Arc<EnumType> {
        let ty = Arc::new(ty);
        self.types
            .insert(ty.name().to_string(), TypeDef::Enum(Arc::clone(&ty)));
        ty
    }

    /// Look up a registered type
    pub fn get(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }

    /// Look up a registered structured type
    pub fn get_struct(&self, name: &str) -> Option<Arc<StructType>> {
        match self.types.get(name) {
            Some(TypeDef::Struct(ty)) => Some(Arc::clone(ty)),
            _ => None,
        }
    }

    /// Look up a registered enumeration
    pub fn get_enum(&self, name: &str) -> Option<Arc<EnumType>> {
        match self.types.get(name) {
            Some(TypeDef::Enum(ty)) => Some(Arc::clone(ty)),
            _ => None,
        }
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// `true` if nothing is registered
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Replace a forward reference by the descriptor of the type it names
    ///
    /// Any other descriptor is returned unchanged.
    pub fn resolve(&self, ty: &TypeDescriptor) -> Result<TypeDescriptor> {
        match ty {
            TypeDescriptor::Named(name) => self
                .types
                .get(name)
                .map(TypeDef::descriptor)
                .ok_or_else(|| Error::UnknownType(name.clone())),
            other => Ok(other.clone()),
        }
    }

    /// Check every registered type
    ///
    /// Fails if a field refers to an unregistered name, or if an enumeration
    /// declares a name or a code twice.
    pub fn validate(&self) -> Result<()> {
        for def in self.types.values() {
            match def {
                TypeDef::Struct(ty) => {
                    for field in ty.fields() {
                        self.check_references(&field.ty)?;
                    }
                }
                TypeDef::Enum(ty) => ty.check_bijection()?,
            }
        }
        Ok(())
    }

    fn check_references(&self, ty: &TypeDescriptor) -> Result<()> {
        match ty {
            TypeDescriptor::Named(_) => self.resolve(ty).map(|_| ()),
            TypeDescriptor::Sequence(item) => self.check_references(item),
            _ => Ok(()),
        }
    }
}
