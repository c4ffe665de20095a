//! Call arguments and optional-argument markers
//!
//! A generated proxy method passes its arguments positionally. Trailing
//! arguments the caller may leave out are passed as an [`Optional`] marker
//! carrying the declared type; markers are dropped right before the
//! argument list is serialized into `params`.
//!
//! Only trailing omissions keep positions intact. Omitting an earlier
//! optional while supplying a later one shifts the later value into the
//! earlier slot on the server side.
//!
//! # Examples
//!
//! ```rust
//! use rpctunnel_core::{argument::marshal_params, Argument, TypeDescriptor};
//!
//! let args = vec![
//!     Argument::value(2),
//!     Argument::optional(None::<i64>, TypeDescriptor::Integer),
//! ];
//! assert_eq!(marshal_params(&args).unwrap(), vec![serde_json::json!(2)]);
//! ```

use crate::error::Result;
use crate::marshal;
use crate::schema::TypeDescriptor;
use crate::value::Value;

/// Sentinel for an omitted optional argument
#[derive(Debug, Clone, PartialEq)]
pub struct Optional {
    /// The type the argument would have had
    pub ty: TypeDescriptor,
}

impl Optional {
    pub fn new(ty: TypeDescriptor) -> Self {
        Self { ty }
    }
}

/// One positional argument
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    /// A supplied value
    Value(Value),
    /// An omitted optional argument
    Omitted(Optional),
}

impl Argument {
    /// A supplied argument
    pub fn value(value: impl Into<Value>) -> Self {
        Argument::Value(value.into())
    }

    /// An optional argument: the value when supplied, a marker otherwise
    pub fn optional<T: Into<Value>>(value: Option<T>, ty: TypeDescriptor) -> Self {
        match value {
            Some(v) => Argument::Value(v.into()),
            None => Argument::Omitted(Optional::new(ty)),
        }
    }

    pub fn is_omitted(&self) -> bool {
        matches!(self, Argument::Omitted(_))
    }
}

impl From<Value> for Argument {
    fn from(value: Value) -> Self {
        Argument::Value(value)
    }
}

impl From<Optional> for Argument {
    fn from(marker: Optional) -> Self {
        Argument::Omitted(marker)
    }
}

/// Supplied values in order, markers removed
pub fn filter_optional(args: &[Argument]) -> impl Iterator<Item = &Value> {
    args.iter().filter_map(|arg| match arg {
        Argument::Value(value) => Some(value),
        Argument::Omitted(_) => None,
    })
}

/// Build the `params` array of an envelope
pub fn marshal_params(args: &[Argument]) -> Result<Vec<serde_json::Value>> {
    filter_optional(args).map(marshal::serialize).collect()
}
