#![forbid(unsafe_code)]

//! The computation AST.
//!
//! Every node is one variant of the closed [`Expr`] enum; query bodies are
//! assembled from these and interpreted by `prism-eval`. Construction
//! helpers keep call sites close to the shapes the builder produces.

use std::sync::Arc;

use prism_schema::{PathSeg, Type, Value};

use crate::func::{Func, NativeFunc};
use crate::query::Query;

#[derive(Clone, Debug)]
pub enum Expr {
    /// Reference to a scope input or a `let` binding.
    Var(String),
    /// Transparent reference wrapper.
    Ref(Box<Expr>),
    /// Bindings evaluated against the *enclosing* environment (siblings are
    /// invisible to each other), then the body under the extended scope.
    Let {
        bindings: Vec<(String, Expr)>,
        body: Box<Expr>,
    },
    IfElse {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    /// Dynamic check that a value satisfies a type.
    IsType { expr: Box<Expr>, target: Type },
    Getter {
        source: Box<Expr>,
        key: PathSeg,
    },
    Setter {
        source: Box<Expr>,
        updates: Vec<(String, Expr)>,
    },
    /// Allocate an empty instance of a record type.
    New(Type),
    /// Eager map of a functor over a sequence.
    FMap {
        func: Box<Expr>,
        source: Box<Expr>,
    },
    /// Application with named arguments; `call` and `apply` are one node.
    Call {
        callee: Box<Expr>,
        args: Vec<(String, Expr)>,
    },
    Literal(Value),
    Func(Arc<Func>),
    Native(Arc<NativeFunc>),
    /// A query used as a callable (fragment bind or transformer).
    Query(Arc<Query>),
}

impl Expr {
    pub fn var(name: impl Into<String>) -> Expr {
        Expr::Var(name.into())
    }

    pub fn lit(value: impl Into<Value>) -> Expr {
        Expr::Literal(value.into())
    }

    pub fn getter(source: Expr, key: impl Into<PathSeg>) -> Expr {
        Expr::Getter {
            source: Box::new(source),
            key: key.into(),
        }
    }

    pub fn setter(
        source: Expr,
        updates: impl IntoIterator<Item = (impl Into<String>, Expr)>,
    ) -> Expr {
        Expr::Setter {
            source: Box::new(source),
            updates: updates
                .into_iter()
                .map(|(k, v)| (k.into(), v))
                .collect(),
        }
    }

    pub fn let_(
        bindings: impl IntoIterator<Item = (impl Into<String>, Expr)>,
        body: Expr,
    ) -> Expr {
        Expr::Let {
            bindings: bindings
                .into_iter()
                .map(|(k, v)| (k.into(), v))
                .collect(),
            body: Box::new(body),
        }
    }

    pub fn if_else(cond: Expr, then_expr: Expr, else_expr: Expr) -> Expr {
        Expr::IfElse {
            cond: Box::new(cond),
            then_expr: Box::new(then_expr),
            else_expr: Box::new(else_expr),
        }
    }

    pub fn and(operands: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(operands.into_iter().collect())
    }

    pub fn or(operands: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Or(operands.into_iter().collect())
    }

    pub fn not(operand: Expr) -> Expr {
        Expr::Not(Box::new(operand))
    }

    pub fn is_type(expr: Expr, target: Type) -> Expr {
        Expr::IsType {
            expr: Box::new(expr),
            target,
        }
    }

    pub fn fmap(func: Expr, source: Expr) -> Expr {
        Expr::FMap {
            func: Box::new(func),
            source: Box::new(source),
        }
    }

    pub fn call(
        callee: Expr,
        args: impl IntoIterator<Item = (impl Into<String>, Expr)>,
    ) -> Expr {
        Expr::Call {
            callee: Box::new(callee),
            args: args.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Parses the `$var/seg/seg` field-path shorthand into a `Var` plus a
    /// `Getter` chain. Numeric segments index positionally.
    pub fn path(path: &str) -> Expr {
        let path = path.strip_prefix('$').unwrap_or(path);
        let mut segs = path.split('/').filter(|s| !s.is_empty());
        let root = Expr::var(segs.next().unwrap_or_default());
        segs.fold(root, |acc, seg| Expr::getter(acc, seg))
    }
}

impl From<&str> for Expr {
    /// Strings are field paths when `$`-prefixed, literals otherwise.
    fn from(s: &str) -> Expr {
        if s.starts_with('$') {
            Expr::path(s)
        } else {
            Expr::Literal(Value::str(s))
        }
    }
}

impl From<Value> for Expr {
    fn from(v: Value) -> Expr {
        Expr::Literal(v)
    }
}

impl From<i64> for Expr {
    fn from(i: i64) -> Expr {
        Expr::Literal(Value::Int(i))
    }
}

impl From<bool> for Expr {
    fn from(b: bool) -> Expr {
        Expr::Literal(Value::Bool(b))
    }
}

impl From<Arc<Func>> for Expr {
    fn from(f: Arc<Func>) -> Expr {
        Expr::Func(f)
    }
}

impl From<Arc<NativeFunc>> for Expr {
    fn from(f: Arc<NativeFunc>) -> Expr {
        Expr::Native(f)
    }
}

impl From<Arc<Query>> for Expr {
    fn from(q: Arc<Query>) -> Expr {
        Expr::Query(q)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_shorthand_builds_getter_chains() {
        let expr = Expr::path("$user/friends/0");
        let Expr::Getter { source, key } = expr else {
            panic!("expected getter");
        };
        assert_eq!(key, PathSeg::Index(0));
        let Expr::Getter { source, key } = *source else {
            panic!("expected getter");
        };
        assert_eq!(key, PathSeg::name("friends"));
        assert!(matches!(*source, Expr::Var(ref n) if n == "user"));
    }

    #[test]
    fn bare_strings_convert_to_literals() {
        assert!(matches!(Expr::from("zuck"), Expr::Literal(Value::Str(_))));
        assert!(matches!(Expr::from("$user"), Expr::Var(_)));
    }
}
