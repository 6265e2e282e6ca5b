#![forbid(unsafe_code)]

//! Structural types, record/union schemas and the runtime value model.
//!
//! This is the leaf crate of the projection stack: `prism-core` builds
//! expression trees and query output schemas over these types, and
//! `prism-eval` interprets those trees into [`Value`]s.

pub mod builtins;
mod error;
mod registry;
mod schema;
mod types;
mod value;

pub use error::SchemaError;
pub use registry::TypeRegistry;
pub use schema::{Field, FieldDefault, RecordSchema, SchemaBuilder, UnionSchema, Validator};
pub use types::{PathSeg, Repr, Type};
pub use value::{RecordValue, Value, VariantValue};
