#![forbid(unsafe_code)]

//! Interpreted and native functions.
//!
//! Native callables are registered with an explicit signature descriptor
//! (name, ordered typed params with optional defaults, return type) rather
//! than introspected by reflection. A parameter with neither a type nor a
//! default is rejected outright: inference must fail rather than guess.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use prism_schema::{Type, Value};

use crate::error::BuildError;
use crate::expr::Expr;

/// Failure raised by a wrapped host callable. It propagates to the caller
/// unmodified; the evaluator never retries or suppresses it.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct NativeError(Box<dyn std::error::Error + Send + Sync>);

impl NativeError {
    pub fn new(source: impl std::error::Error + Send + Sync + 'static) -> NativeError {
        NativeError(Box::new(source))
    }

    pub fn msg(message: impl Into<String>) -> NativeError {
        #[derive(Debug, Error)]
        #[error("{0}")]
        struct Message(String);
        NativeError(Box::new(Message(message.into())))
    }
}

pub type NativeHandler =
    Arc<dyn Fn(BTreeMap<String, Value>) -> Result<Value, NativeError> + Send + Sync>;

#[derive(Clone, Debug)]
pub struct Param {
    pub name: String,
    pub ty: Option<Type>,
    pub default: Option<Value>,
}

impl Param {
    pub fn required(name: impl Into<String>, ty: Type) -> Param {
        Param {
            name: name.into(),
            ty: Some(ty),
            default: None,
        }
    }

    pub fn with_default(name: impl Into<String>, ty: Type, default: Value) -> Param {
        Param {
            name: name.into(),
            ty: Some(ty),
            default: Some(default),
        }
    }

    /// Declared type, falling back to the natural type of the default.
    pub fn ty(&self) -> Option<Type> {
        self.ty
            .clone()
            .or_else(|| self.default.as_ref().map(Value::type_of))
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

/// Ordered signature of a callable: the uniform shape shared by interpreted
/// funcs, native funcs and queries.
#[derive(Clone, Debug)]
pub struct FuncSig {
    pub name: String,
    pub params: Vec<Param>,
    pub ret: Type,
}

impl FuncSig {
    pub fn new(name: impl Into<String>, ret: Type) -> FuncSig {
        FuncSig {
            name: name.into(),
            params: Vec::new(),
            ret,
        }
    }

    pub fn param(mut self, name: impl Into<String>, ty: Type) -> FuncSig {
        self.params.push(Param::required(name, ty));
        self
    }

    pub fn param_with_default(
        mut self,
        name: impl Into<String>,
        ty: Type,
        default: Value,
    ) -> FuncSig {
        self.params.push(Param::with_default(name, ty, default));
        self
    }

    /// Raw param push, used to exercise the unannotated-param rejection.
    pub fn push_param(mut self, param: Param) -> FuncSig {
        self.params.push(param);
        self
    }

    pub fn param_named(&self, name: &str) -> Option<&Param> {
        self.params.iter().find(|p| p.name == name)
    }

    fn func_type(&self) -> Result<Type, BuildError> {
        let mut params = Vec::with_capacity(self.params.len());
        for p in &self.params {
            let ty = p.ty().ok_or_else(|| BuildError::UnannotatedParam {
                func: self.name.clone(),
                param: p.name.clone(),
            })?;
            params.push((p.name.clone(), ty));
        }
        Ok(Type::func(params, self.ret.clone()))
    }
}

/// An interpreted function: typed params plus an expression body.
#[derive(Clone, Debug)]
pub struct Func {
    pub sig: FuncSig,
    pub body: Expr,
}

impl Func {
    pub fn new(sig: FuncSig, body: Expr) -> Func {
        Func { sig, body }
    }

    pub fn name(&self) -> &str {
        &self.sig.name
    }

    pub fn return_type(&self) -> &Type {
        &self.sig.ret
    }

    pub fn func_type(&self) -> Result<Type, BuildError> {
        self.sig.func_type()
    }

    pub fn call(
        self: &Arc<Self>,
        args: impl IntoIterator<Item = (impl Into<String>, Expr)>,
    ) -> Expr {
        Expr::call(Expr::Func(self.clone()), args)
    }
}

/// A host-implemented callable made uniform with interpreted functions.
pub struct NativeFunc {
    sig: FuncSig,
    handler: NativeHandler,
}

impl NativeFunc {
    /// Validates the signature at registration: every parameter must carry
    /// a type or a default.
    pub fn new(
        sig: FuncSig,
        handler: impl Fn(BTreeMap<String, Value>) -> Result<Value, NativeError>
        + Send
        + Sync
        + 'static,
    ) -> Result<Arc<NativeFunc>, BuildError> {
        for p in &sig.params {
            if p.ty().is_none() {
                return Err(BuildError::UnannotatedParam {
                    func: sig.name.clone(),
                    param: p.name.clone(),
                });
            }
        }
        Ok(Arc::new(NativeFunc {
            sig,
            handler: Arc::new(handler),
        }))
    }

    pub fn name(&self) -> &str {
        &self.sig.name
    }

    pub fn sig(&self) -> &FuncSig {
        &self.sig
    }

    pub fn return_type(&self) -> &Type {
        &self.sig.ret
    }

    pub fn func_type(&self) -> Result<Type, BuildError> {
        self.sig.func_type()
    }

    pub fn invoke(&self, args: BTreeMap<String, Value>) -> Result<Value, NativeError> {
        (self.handler)(args)
    }

    pub fn call(
        self: &Arc<Self>,
        args: impl IntoIterator<Item = (impl Into<String>, Expr)>,
    ) -> Expr {
        Expr::call(Expr::Native(self.clone()), args)
    }
}

impl fmt::Debug for NativeFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunc")
            .field("sig", &self.sig)
            .finish_non_exhaustive()
    }
}
