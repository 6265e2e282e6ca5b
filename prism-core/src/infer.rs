#![forbid(unsafe_code)]

//! Static type inference over [`Expr`] trees.
//!
//! Inference runs at build time, against a stack of enclosing query scopes
//! (innermost first). Every failure is a [`BuildError`]; nothing is
//! deferred to evaluation.

use prism_schema::{Type, TypeRegistry};

use crate::error::BuildError;
use crate::expr::Expr;
use crate::query::Query;

pub struct TypeInfer<'a> {
    reg: &'a TypeRegistry,
}

impl<'a> TypeInfer<'a> {
    pub fn new(reg: &'a TypeRegistry) -> TypeInfer<'a> {
        TypeInfer { reg }
    }

    pub fn infer(&self, expr: &Expr, scopes: &[&Query]) -> Result<Type, BuildError> {
        let mut locals = Vec::new();
        self.infer_in(expr, scopes, &mut locals)
    }

    fn infer_in(
        &self,
        expr: &Expr,
        scopes: &[&Query],
        locals: &mut Vec<(String, Type)>,
    ) -> Result<Type, BuildError> {
        match expr {
            Expr::Var(name) => {
                if let Some((_, ty)) = locals.iter().rev().find(|(n, _)| n == name) {
                    return Ok(ty.clone());
                }
                for query in scopes {
                    if let Some(ty) = query.input_type(name) {
                        return Ok(ty.clone());
                    }
                }
                Err(BuildError::UndeclaredVar(name.clone()))
            }
            Expr::Ref(inner) => self.infer_in(inner, scopes, locals),
            Expr::Literal(value) => Ok(value.type_of()),
            Expr::Getter { source, key } => {
                let source_ty = self.infer_in(source, scopes, locals)?;
                Ok(source_ty.type_for_field_path(std::slice::from_ref(key), self.reg)?)
            }
            Expr::Setter { source, .. } => self.infer_in(source, scopes, locals),
            Expr::New(ty) => Ok(ty.clone()),
            Expr::Let { bindings, body } => {
                // Sibling bindings cannot see each other: infer all of them
                // against the pre-let scope before extending it.
                let mut bound = Vec::with_capacity(bindings.len());
                for (name, bexpr) in bindings {
                    bound.push((name.clone(), self.infer_in(bexpr, scopes, locals)?));
                }
                let depth = locals.len();
                locals.extend(bound);
                let out = self.infer_in(body, scopes, locals);
                locals.truncate(depth);
                out
            }
            Expr::IfElse { then_expr, .. } => self.infer_in(then_expr, scopes, locals),
            Expr::And(_) | Expr::Or(_) | Expr::Not(_) | Expr::IsType { .. } => {
                Ok(prism_schema::builtins::boolean())
            }
            Expr::FMap { func, source } => {
                let source_ty = self
                    .infer_in(source, scopes, locals)?
                    .resolved(self.reg)?;
                let Type::App { origin, args } = &source_ty else {
                    return Err(BuildError::FmapNonFunctor {
                        ty: source_ty.display(),
                    });
                };
                if args.len() != 1 {
                    return Err(BuildError::FmapNonFunctor {
                        ty: source_ty.display(),
                    });
                }
                let elem_ty = self.infer_in(func, scopes, locals)?;
                Ok(Type::app(origin.as_ref().clone(), [elem_ty]))
            }
            Expr::Call { callee, .. } => self.infer_in(callee, scopes, locals),
            Expr::Func(f) => Ok(f.return_type().clone()),
            Expr::Native(nf) => Ok(nf.return_type().clone()),
            Expr::Query(q) => Ok(q.return_type(self.reg)?.clone()),
        }
    }
}
