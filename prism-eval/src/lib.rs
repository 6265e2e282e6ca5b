#![forbid(unsafe_code)]

//! Depth-first interpreter for `prism-core` expression trees.
//!
//! Evaluation is single-threaded and synchronous. Environments and
//! evaluated values are immutable once constructed, so one built query body
//! can serve many concurrent evaluations against independent environments.

mod env;
mod error;
mod eval;

pub use env::{Closure, Env, EvalValue};
pub use error::EvalError;
pub use eval::Evaluator;
