//! Value model: caller-side values, wire attributes, and field kinds.

mod attribute;
mod error;
mod kind;
mod value;

pub use attribute::{AttributeValue, Item, PrimaryKey};
pub use error::{DecodeError, ValidationError};
pub use kind::ValueKind;
pub use value::{attributes, number_set, string_set, Attributes, Number, Value};
