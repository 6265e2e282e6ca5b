#![forbid(unsafe_code)]

use miette::Diagnostic;
use thiserror::Error;

use prism_schema::SchemaError;

/// Build-time failures raised while a query's output schema or body is
/// assembled. These surface at registration time and are never swallowed.
#[derive(Debug, Error, Diagnostic)]
pub enum BuildError {
    #[error("variable '{0}' is not declared by any enclosing scope")]
    #[diagnostic(code(prism::build::undeclared_var))]
    UndeclaredVar(String),

    #[error(
        "field '{target}' already selected as {existing}, cannot re-select as {incoming}"
    )]
    #[diagnostic(code(prism::build::duplicate_selector))]
    DuplicateSelector {
        target: String,
        existing: String,
        incoming: String,
    },

    #[error("selector '{target}' has no source and the query declares {inputs} inputs")]
    #[diagnostic(code(prism::build::ambiguous_selector))]
    AmbiguousSelector { target: String, inputs: usize },

    #[error("fragment binds '{param}', which query '{query}' does not declare")]
    #[diagnostic(code(prism::build::unknown_bind_param))]
    UnknownBindParam { query: String, param: String },

    #[error("fmap source has type {ty}, expected a unary type application")]
    #[diagnostic(code(prism::build::fmap_non_functor))]
    FmapNonFunctor { ty: String },

    #[error("parameter '{param}' of '{func}' has neither a type nor a default")]
    #[diagnostic(code(prism::build::unannotated_param))]
    UnannotatedParam { func: String, param: String },

    #[error("body can only be built for non-inline queries")]
    #[diagnostic(code(prism::build::inline_body))]
    InlineBody,

    #[error(transparent)]
    #[diagnostic(transparent)]
    Schema(#[from] SchemaError),
}
