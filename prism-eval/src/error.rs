#![forbid(unsafe_code)]

use miette::Diagnostic;
use thiserror::Error;

use prism_core::{BuildError, NativeError};
use prism_schema::SchemaError;

#[derive(Debug, Error, Diagnostic)]
pub enum EvalError {
    #[error("variable '{0}' is not bound in the environment")]
    #[diagnostic(code(prism::eval::undefined))]
    Undefined(String),

    #[error("call to '{func}' is missing required argument '{arg}'")]
    #[diagnostic(code(prism::eval::missing_arg))]
    MissingArg { func: String, arg: String },

    #[error("value {0} is not callable")]
    #[diagnostic(code(prism::eval::not_callable))]
    NotCallable(String),

    #[error("fmap source {0} is not a sequence")]
    #[diagnostic(code(prism::eval::not_a_sequence))]
    NotASequence(String),

    #[error("fmap functor '{func}' must take exactly one required argument")]
    #[diagnostic(code(prism::eval::fmap_arity))]
    FmapArity { func: String },

    #[error("value {0} has no addressable fields")]
    #[diagnostic(code(prism::eval::not_a_container))]
    NotAContainer(String),

    #[error("cannot allocate an instance of non-record type {0}")]
    #[diagnostic(code(prism::eval::not_a_record_type))]
    NotARecordType(String),

    #[error("{0} is a function, not a data value")]
    #[diagnostic(code(prism::eval::not_a_value))]
    NotAValue(String),

    // Host failures pass through unmodified; no retry, no suppression.
    #[error(transparent)]
    #[diagnostic(code(prism::eval::native))]
    Native(#[from] NativeError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Build(#[from] BuildError),
}
