#![forbid(unsafe_code)]

//! Lexical environments and the values flowing through evaluation.
//!
//! An [`Env`] is an immutable chain of frames: `extend` returns a child
//! scope and lookup walks outward. Environments are never mutated after
//! construction, so a built query body can be evaluated against independent
//! environments in parallel without locking.

use std::collections::HashMap;
use std::sync::Arc;

use prism_core::{Func, NativeFunc};
use prism_schema::Value;

use crate::error::EvalError;

/// A value produced by evaluation: plain data, or one of the two callable
/// shapes (an interpreted function with its captured environment, or a
/// native function).
#[derive(Clone, Debug)]
pub enum EvalValue {
    Data(Value),
    Closure(Closure),
    Native(Arc<NativeFunc>),
}

#[derive(Clone, Debug)]
pub struct Closure {
    pub func: Arc<Func>,
    pub env: Env,
}

impl EvalValue {
    pub fn data(value: impl Into<Value>) -> EvalValue {
        EvalValue::Data(value.into())
    }

    pub fn into_value(self) -> Result<Value, EvalError> {
        match self {
            EvalValue::Data(v) => Ok(v),
            EvalValue::Closure(c) => Err(EvalError::NotAValue(c.func.name().to_string())),
            EvalValue::Native(nf) => Err(EvalError::NotAValue(nf.name().to_string())),
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            EvalValue::Data(v) => v.is_truthy(),
            EvalValue::Closure(_) | EvalValue::Native(_) => true,
        }
    }
}

impl From<Value> for EvalValue {
    fn from(v: Value) -> EvalValue {
        EvalValue::Data(v)
    }
}

#[derive(Clone, Debug, Default)]
pub struct Env {
    frame: Option<Arc<Frame>>,
}

#[derive(Debug)]
struct Frame {
    vars: HashMap<String, EvalValue>,
    parent: Option<Arc<Frame>>,
}

impl Env {
    pub fn new() -> Env {
        Env::default()
    }

    /// Child scope with `bindings` layered over this one.
    pub fn extend(
        &self,
        bindings: impl IntoIterator<Item = (impl Into<String>, EvalValue)>,
    ) -> Env {
        Env {
            frame: Some(Arc::new(Frame {
                vars: bindings
                    .into_iter()
                    .map(|(n, v)| (n.into(), v))
                    .collect(),
                parent: self.frame.clone(),
            })),
        }
    }

    /// Convenience for binding plain data values.
    pub fn bind(
        &self,
        bindings: impl IntoIterator<Item = (impl Into<String>, Value)>,
    ) -> Env {
        self.extend(
            bindings
                .into_iter()
                .map(|(n, v)| (n, EvalValue::Data(v))),
        )
    }

    /// Innermost-first lookup.
    pub fn get(&self, name: &str) -> Option<&EvalValue> {
        let mut frame = self.frame.as_deref();
        while let Some(f) = frame {
            if let Some(v) = f.vars.get(name) {
                return Some(v);
            }
            frame = f.parent.as_deref();
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_walks_outward_and_shadows() {
        let root = Env::new().bind([("x", Value::Int(1)), ("y", Value::Int(2))]);
        let child = root.bind([("x", Value::Int(10))]);
        assert!(matches!(
            child.get("x"),
            Some(EvalValue::Data(Value::Int(10)))
        ));
        assert!(matches!(
            child.get("y"),
            Some(EvalValue::Data(Value::Int(2)))
        ));
        assert!(child.get("z").is_none());
        // Parent scope is untouched by the child.
        assert!(matches!(
            root.get("x"),
            Some(EvalValue::Data(Value::Int(1)))
        ));
    }
}
