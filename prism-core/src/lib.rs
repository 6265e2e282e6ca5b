#![forbid(unsafe_code)]

//! Expression AST, static type inference and the query/derivation builder.
//!
//! A [`Query`] declares typed inputs and chains selectors and fragment
//! inclusions; from those it derives an output record schema and an
//! executable [`Expr`] body, both lazily memoized. `prism-eval` interprets
//! the body against an environment binding the declared inputs.

mod error;
mod expr;
mod func;
mod infer;
mod query;

pub use error::BuildError;
pub use expr::Expr;
pub use func::{Func, FuncSig, NativeError, NativeFunc, NativeHandler, Param};
pub use infer::TypeInfer;
pub use query::{Command, Fragment, Query, Selector};
