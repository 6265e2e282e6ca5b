#![forbid(unsafe_code)]

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum SchemaError {
    #[error("duplicate field '{field}' in schema '{schema}'")]
    #[diagnostic(code(prism::schema::duplicate_field))]
    DuplicateField { schema: String, field: String },

    #[error("unknown field '{field}' in schema '{schema}'")]
    #[diagnostic(code(prism::schema::unknown_field))]
    UnknownField { schema: String, field: String },

    #[error("duplicate variant '{variant}' in union '{union_name}'")]
    #[diagnostic(code(prism::schema::duplicate_variant))]
    DuplicateVariant { union_name: String, variant: String },

    #[error("type name '{0}' is already registered")]
    #[diagnostic(code(prism::schema::duplicate_name))]
    DuplicateName(String),

    #[error("unresolved type reference '{0}'")]
    #[diagnostic(code(prism::schema::unresolved))]
    Unresolved(String),

    #[error("segment '{segment}' is not shared by every alternative of {ty}")]
    #[diagnostic(code(prism::schema::path_not_shared))]
    PathNotShared { ty: String, segment: String },

    #[error("type {ty} cannot be indexed by '{segment}'")]
    #[diagnostic(code(prism::schema::not_indexable))]
    NotIndexable { ty: String, segment: String },

    #[error("cannot coerce {value} into {ty}")]
    #[diagnostic(code(prism::schema::coercion))]
    Coercion { ty: String, value: String },

    #[error("validator rejected field '{field}': {message}")]
    #[diagnostic(code(prism::schema::validator))]
    Validator { field: String, message: String },

    #[error("validation failed for '{schema}': {}", problems.join("; "))]
    #[diagnostic(code(prism::schema::validation))]
    Validation {
        schema: String,
        problems: Vec<String>,
    },
}
