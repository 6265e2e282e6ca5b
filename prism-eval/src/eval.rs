#![forbid(unsafe_code)]

//! The tree-walking evaluator: single-threaded, depth-first, synchronous.

use std::collections::BTreeMap;
use std::sync::Arc;

use prism_core::{Expr, FuncSig};
use prism_schema::{PathSeg, TypeRegistry, Value};

use crate::env::{Closure, Env, EvalValue};
use crate::error::EvalError;

pub struct Evaluator<'a> {
    reg: &'a TypeRegistry,
}

impl<'a> Evaluator<'a> {
    pub fn new(reg: &'a TypeRegistry) -> Evaluator<'a> {
        Evaluator { reg }
    }

    pub fn eval(&self, expr: &Expr, env: &Env) -> Result<EvalValue, EvalError> {
        match expr {
            Expr::Var(name) => env
                .get(name)
                .cloned()
                .ok_or_else(|| EvalError::Undefined(name.clone())),
            Expr::Ref(inner) => self.eval(inner, env),
            Expr::Literal(value) => Ok(EvalValue::Data(value.clone())),
            Expr::Func(f) => Ok(EvalValue::Closure(Closure {
                func: f.clone(),
                env: env.clone(),
            })),
            Expr::Native(nf) => Ok(EvalValue::Native(nf.clone())),
            Expr::Query(q) => Ok(EvalValue::Closure(Closure {
                func: Arc::new(q.func(self.reg)?),
                env: Env::new(),
            })),
            Expr::Let { bindings, body } => {
                // All bindings evaluate against the current env; siblings
                // cannot see each other.
                let mut bound = Vec::with_capacity(bindings.len());
                for (name, bexpr) in bindings {
                    bound.push((name.clone(), self.eval(bexpr, env)?));
                }
                self.eval(body, &env.extend(bound))
            }
            Expr::IfElse {
                cond,
                then_expr,
                else_expr,
            } => {
                // Exactly one branch runs.
                if self.eval(cond, env)?.is_truthy() {
                    self.eval(then_expr, env)
                } else {
                    self.eval(else_expr, env)
                }
            }
            Expr::And(operands) => {
                for operand in operands {
                    if !self.eval(operand, env)?.is_truthy() {
                        return Ok(EvalValue::Data(Value::Bool(false)));
                    }
                }
                Ok(EvalValue::Data(Value::Bool(true)))
            }
            Expr::Or(operands) => {
                for operand in operands {
                    if self.eval(operand, env)?.is_truthy() {
                        return Ok(EvalValue::Data(Value::Bool(true)));
                    }
                }
                Ok(EvalValue::Data(Value::Bool(false)))
            }
            Expr::Not(operand) => Ok(EvalValue::Data(Value::Bool(
                !self.eval(operand, env)?.is_truthy(),
            ))),
            Expr::IsType { expr, target } => {
                let matched = match self.eval(expr, env)? {
                    EvalValue::Data(v) => v.matches_type(target, self.reg)?,
                    EvalValue::Closure(_) | EvalValue::Native(_) => false,
                };
                Ok(EvalValue::Data(Value::Bool(matched)))
            }
            Expr::Getter { source, key } => {
                let source = self.eval(source, env)?.into_value()?;
                self.get_key(source, key)
            }
            Expr::Setter { source, updates } => {
                let source = self.eval(source, env)?.into_value()?;
                self.set_keys(source, updates, env)
            }
            Expr::New(ty) => {
                let resolved = ty.resolved(self.reg)?;
                match resolved {
                    prism_schema::Type::Record(schema) => {
                        Ok(EvalValue::Data(Value::record(schema)))
                    }
                    other => Err(EvalError::NotARecordType(other.display())),
                }
            }
            Expr::FMap { func, source } => {
                let functor = self.eval(func, env)?;
                match self.eval(source, env)?.into_value()? {
                    // A null sequence propagates the null sentinel.
                    Value::Null => Ok(EvalValue::Data(Value::Null)),
                    Value::List(items) => {
                        let mut out = Vec::with_capacity(items.len());
                        for item in items {
                            out.push(self.apply_unary(&functor, item)?.into_value()?);
                        }
                        Ok(EvalValue::Data(Value::List(out)))
                    }
                    other => Err(EvalError::NotASequence(format!("{other:?}"))),
                }
            }
            Expr::Call { callee, args } => {
                let callee = self.eval(callee, env)?;
                let mut evaluated = BTreeMap::new();
                for (name, arg) in args {
                    evaluated.insert(name.clone(), self.eval(arg, env)?);
                }
                self.apply(callee, evaluated)
            }
        }
    }

    /// Applies a callable to named arguments, filling omitted ones from
    /// declared defaults. A required argument with no value is an error.
    pub fn apply(
        &self,
        callee: EvalValue,
        args: BTreeMap<String, EvalValue>,
    ) -> Result<EvalValue, EvalError> {
        match callee {
            EvalValue::Closure(closure) => {
                let bound = bind_args(&closure.func.sig, args)?;
                self.eval(&closure.func.body, &closure.env.extend(bound))
            }
            EvalValue::Native(nf) => {
                let bound = bind_args(nf.sig(), args)?;
                let mut values = BTreeMap::new();
                for (name, value) in bound {
                    values.insert(name, value.into_value()?);
                }
                Ok(EvalValue::Data(nf.invoke(values)?))
            }
            EvalValue::Data(v) => Err(EvalError::NotCallable(format!("{v:?}"))),
        }
    }

    fn apply_unary(&self, functor: &EvalValue, item: Value) -> Result<EvalValue, EvalError> {
        let sig = match functor {
            EvalValue::Closure(c) => c.func.sig.clone(),
            EvalValue::Native(nf) => nf.sig().clone(),
            EvalValue::Data(v) => return Err(EvalError::NotCallable(format!("{v:?}"))),
        };
        let param = sole_required_param(&sig)?;
        let mut args = BTreeMap::new();
        args.insert(param, EvalValue::Data(item));
        self.apply(functor.clone(), args)
    }

    fn get_key(&self, source: Value, key: &PathSeg) -> Result<EvalValue, EvalError> {
        let value = match (source, key) {
            // Dereferencing null degrades to the null sentinel by design.
            (Value::Null, _) => Value::Null,
            (Value::Record(rec), PathSeg::Name(name)) => rec.get(name)?,
            (Value::Record(rec), PathSeg::Index(i)) => {
                let field = rec.schema().field_at(*i).ok_or_else(|| {
                    EvalError::NotAContainer(format!("{}[{i}]", rec.schema().name()))
                })?;
                rec.get(field.name())?
            }
            (Value::Map(entries), PathSeg::Name(name)) => {
                entries.get(name).cloned().unwrap_or(Value::Null)
            }
            (Value::List(items), PathSeg::Index(i)) => {
                items.get(*i).cloned().unwrap_or(Value::Null)
            }
            (Value::Variant(var), PathSeg::Name(tag)) => {
                if var.tag == *tag {
                    *var.value
                } else {
                    Value::Null
                }
            }
            (other, _) => return Err(EvalError::NotAContainer(format!("{other:?}"))),
        };
        Ok(EvalValue::Data(value))
    }

    fn set_keys(
        &self,
        source: Value,
        updates: &[(String, Expr)],
        env: &Env,
    ) -> Result<EvalValue, EvalError> {
        match source {
            Value::Null => Ok(EvalValue::Data(Value::Null)),
            Value::Record(mut rec) => {
                for (key, expr) in updates {
                    let value = self.eval(expr, env)?.into_value()?;
                    rec.set(key, value)?;
                }
                Ok(EvalValue::Data(Value::Record(rec)))
            }
            Value::Map(mut entries) => {
                for (key, expr) in updates {
                    let value = self.eval(expr, env)?.into_value()?;
                    entries.insert(key.clone(), value);
                }
                Ok(EvalValue::Data(Value::Map(entries)))
            }
            other => Err(EvalError::NotAContainer(format!("{other:?}"))),
        }
    }
}

fn bind_args(
    sig: &FuncSig,
    mut args: BTreeMap<String, EvalValue>,
) -> Result<Vec<(String, EvalValue)>, EvalError> {
    let mut bound = Vec::with_capacity(sig.params.len());
    for param in &sig.params {
        let value = match args.remove(&param.name) {
            Some(v) => v,
            None => match &param.default {
                Some(d) => EvalValue::Data(d.clone()),
                None => {
                    return Err(EvalError::MissingArg {
                        func: sig.name.clone(),
                        arg: param.name.clone(),
                    });
                }
            },
        };
        bound.push((param.name.clone(), value));
    }
    Ok(bound)
}

/// The parameter an `fmap` element binds to: the functor's single required
/// parameter, or its only parameter when all carry defaults.
fn sole_required_param(sig: &FuncSig) -> Result<String, EvalError> {
    let required: Vec<_> = sig.params.iter().filter(|p| p.is_required()).collect();
    match required.as_slice() {
        [one] => Ok(one.name.clone()),
        [] if sig.params.len() == 1 => Ok(sig.params[0].name.clone()),
        _ => Err(EvalError::FmapArity {
            func: sig.name.clone(),
        }),
    }
}
