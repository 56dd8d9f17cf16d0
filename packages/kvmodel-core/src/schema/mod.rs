//! Entity declarations: field descriptors, key templates, schemas and the
//! registry that caches them.

mod error;
mod field;
mod registry;
#[allow(clippy::module_inception)]
mod schema;
mod template;
pub(crate) mod validation;

pub use error::DeclarationError;
pub use field::{FieldSpec, ValidatorFn};
pub use registry::{EntityDecl, SchemaRegistry};
pub use schema::{AbstractSchema, Capacity, EntitySchema, SchemaBuilder};
pub use template::KeyTemplate;
