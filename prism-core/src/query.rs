#![forbid(unsafe_code)]

//! The query/derivation builder.
//!
//! A query declares named typed inputs and an ordered list of commands
//! (field selectors and fragment inclusions). From those it derives, lazily
//! and exactly once each, an output record type (the *type pass*) and an
//! executable body expression (the *body pass*). The two passes are
//! separate because the full output field set must exist before the body
//! that populates it can be assembled, and because optionality that is
//! static in the schema must still be re-checked dynamically at evaluation
//! time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use prism_schema::{Field, PathSeg, SchemaBuilder, Type, TypeRegistry};

use crate::error::BuildError;
use crate::expr::Expr;
use crate::func::{Func, FuncSig, Param};
use crate::infer::TypeInfer;

/// Projects one output field from a source expression. A missing source is
/// resolved during the passes via the single-input shorthand.
#[derive(Clone, Debug)]
pub struct Selector {
    pub target: String,
    pub source: Option<Expr>,
}

impl Selector {
    pub fn new(target: impl Into<String>, source: Expr) -> Selector {
        Selector {
            target: target.into(),
            source: Some(source),
        }
    }

    pub fn shorthand(target: impl Into<String>) -> Selector {
        Selector {
            target: target.into(),
            source: None,
        }
    }
}

impl From<&str> for Selector {
    fn from(target: &str) -> Selector {
        Selector::shorthand(target)
    }
}

impl From<(&str, Expr)> for Selector {
    fn from((target, source): (&str, Expr)) -> Selector {
        Selector::new(target, source)
    }
}

impl From<(String, Expr)> for Selector {
    fn from((target, source): (String, Expr)) -> Selector {
        Selector::new(target, source)
    }
}

impl From<(&str, &str)> for Selector {
    fn from((target, source): (&str, &str)) -> Selector {
        Selector::new(target, Expr::from(source))
    }
}

/// Splices a sub-query's output fields into the including query, optionally
/// gated by a condition, with named bind expressions for the sub-query's
/// declared inputs.
#[derive(Clone, Debug)]
pub struct Fragment {
    pub query: Arc<Query>,
    pub condition: Option<Expr>,
    pub binds: Vec<(String, Expr)>,
}

#[derive(Clone, Debug)]
pub enum Command {
    Selector(Selector),
    Fragment(Fragment),
}

static DERIVATION_COUNTER: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Default)]
pub struct Query {
    name: Option<String>,
    inline: bool,
    inputs: Vec<(String, Type)>,
    commands: Vec<Command>,
    handle: OnceLock<String>,
    out_type: OnceLock<Type>,
    out_body: OnceLock<Expr>,
}

impl Query {
    pub fn new(inputs: impl IntoIterator<Item = (impl Into<String>, Type)>) -> Query {
        Query {
            name: None,
            inline: false,
            inputs: inputs.into_iter().map(|(n, t)| (n.into(), t)).collect(),
            commands: Vec::new(),
            handle: OnceLock::new(),
            out_type: OnceLock::new(),
            out_body: OnceLock::new(),
        }
    }

    /// An inline query only ever serves as a fragment; its body is never
    /// built on its own.
    pub fn inline(inputs: impl IntoIterator<Item = (impl Into<String>, Type)>) -> Query {
        let mut q = Query::new(inputs);
        q.inline = true;
        q
    }

    /// Names the synthesized output schema instead of the generated
    /// `Derivation_{n}` handle.
    pub fn named(mut self, name: impl Into<String>) -> Query {
        self.name = Some(name.into());
        self.handle = OnceLock::new();
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_inline(&self) -> bool {
        self.inline
    }

    pub fn input_type(&self, name: &str) -> Option<&Type> {
        self.inputs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t)
    }

    pub fn inputs(&self) -> impl Iterator<Item = &(String, Type)> {
        self.inputs.iter()
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Appends one selector. Chain calls to select several fields:
    /// `.select("id").select(("friends", expr))`.
    pub fn select(self, selector: impl Into<Selector>) -> Query {
        self.push(Command::Selector(selector.into()))
    }

    /// Unconditionally splices `sub`'s fields into this query.
    pub fn include(
        self,
        sub: Arc<Query>,
        binds: impl IntoIterator<Item = (impl Into<String>, Expr)>,
    ) -> Query {
        self.push(Command::Fragment(Fragment {
            query: sub,
            condition: None,
            binds: binds.into_iter().map(|(n, e)| (n.into(), e)).collect(),
        }))
    }

    /// Splices `sub`'s fields gated by `condition`; every cloned field
    /// becomes optional in this query's output.
    pub fn include_if(
        self,
        condition: Expr,
        sub: Arc<Query>,
        binds: impl IntoIterator<Item = (impl Into<String>, Expr)>,
    ) -> Query {
        self.push(Command::Fragment(Fragment {
            query: sub,
            condition: Some(condition),
            binds: binds.into_iter().map(|(n, e)| (n.into(), e)).collect(),
        }))
    }

    // Every mutation invalidates both memo cells; they rebuild on next
    // access.
    fn push(mut self, command: Command) -> Query {
        self.commands.push(command);
        self.out_type = OnceLock::new();
        self.out_body = OnceLock::new();
        self
    }

    /// The output record type: a freshly synthesized schema mirroring the
    /// selection, registered in `reg` under the query's (or a generated)
    /// name. Computed once and cached; never recomputed after a successful
    /// build.
    pub fn return_type(&self, reg: &TypeRegistry) -> Result<&Type, BuildError> {
        if let Some(ty) = self.out_type.get() {
            return Ok(ty);
        }
        let ty = self.build_return_type(reg)?;
        Ok(self.out_type.get_or_init(|| ty))
    }

    /// The executable body: `new(output)` folded through the command list.
    /// Only non-inline queries have one.
    pub fn body(&self, reg: &TypeRegistry) -> Result<&Expr, BuildError> {
        if self.inline {
            return Err(BuildError::InlineBody);
        }
        if let Some(body) = self.out_body.get() {
            return Ok(body);
        }
        let body = self.build_body(reg)?;
        Ok(self.out_body.get_or_init(|| body))
    }

    /// This query as a callable: declared inputs become parameters, the
    /// body becomes the function body.
    pub fn func(&self, reg: &TypeRegistry) -> Result<Func, BuildError> {
        let ret = self.return_type(reg)?.clone();
        let body = self.body(reg)?.clone();
        let name = match &ret {
            Type::Record(schema) => schema.name().to_string(),
            _ => self.schema_handle().to_string(),
        };
        let mut sig = FuncSig::new(name, ret);
        for (name, ty) in &self.inputs {
            sig = sig.push_param(Param::required(name.clone(), ty.clone()));
        }
        Ok(Func::new(sig, body))
    }

    /// Builds the `apply` expression that lets a query nest inside another
    /// query as a fragment or transformer.
    pub fn apply(
        self: &Arc<Self>,
        args: impl IntoIterator<Item = (impl Into<String>, Expr)>,
    ) -> Expr {
        Expr::call(Expr::Query(self.clone()), args)
    }

    /// The name this query's output schema is (or will be) registered
    /// under. Generated `Derivation_{N}` handles are minted once and stay
    /// stable across error paths and post-mutation rebuilds, so a rebuild
    /// replaces the registry entry instead of leaking a stale one.
    fn schema_handle(&self) -> &str {
        self.handle.get_or_init(|| match &self.name {
            Some(name) => name.clone(),
            None => format!(
                "Derivation_{}",
                DERIVATION_COUNTER.fetch_add(1, Ordering::SeqCst)
            ),
        })
    }

    // ---- type pass ----

    fn build_return_type(&self, reg: &TypeRegistry) -> Result<Type, BuildError> {
        let mut builder = SchemaBuilder::new(self.schema_handle());
        for command in &self.commands {
            self.command_into_schema(command, &mut builder, reg)?;
        }
        let schema = builder.finish();
        let ty = Type::Record(schema.clone());
        reg.insert(schema.name().to_string(), ty.clone());
        Ok(ty)
    }

    fn command_into_schema(
        &self,
        command: &Command,
        builder: &mut SchemaBuilder,
        reg: &TypeRegistry,
    ) -> Result<(), BuildError> {
        match command {
            Command::Selector(selector) => {
                let source = self.selector_source(selector)?;
                let ty = TypeInfer::new(reg).infer(&source, &[self])?;
                merge_output_field(builder, Field::new(selector.target.clone(), ty))
            }
            Command::Fragment(fragment) => {
                // A condition makes every cloned field optional; so does any
                // bind whose static type does not exactly match the declared
                // parameter, because the inclusion may legitimately not fire
                // for a given value.
                let mut optional = fragment.condition.is_some();
                for (param, bind) in &fragment.binds {
                    let param_ty = fragment.query.input_type(param).ok_or_else(|| {
                        BuildError::UnknownBindParam {
                            query: fragment.query.schema_handle().to_string(),
                            param: param.clone(),
                        }
                    })?;
                    let bind_ty = TypeInfer::new(reg).infer(bind, &[self])?;
                    if bind_ty != *param_ty {
                        optional = true;
                    }
                }
                let sub_ty = fragment.query.return_type(reg)?;
                let Type::Record(schema) = sub_ty else {
                    // build_return_type always yields a record.
                    return Err(BuildError::Schema(prism_schema::SchemaError::Unresolved(
                        sub_ty.display(),
                    )));
                };
                for field in schema.fields() {
                    // Cloned fields are copies, never aliases: each
                    // inclusion site owns its optionality.
                    let mut cloned = field.clone();
                    cloned.optional = field.optional || optional;
                    merge_output_field(builder, cloned)?;
                }
                Ok(())
            }
        }
    }

    // ---- body pass ----

    fn build_body(&self, reg: &TypeRegistry) -> Result<Expr, BuildError> {
        let out_ty = self.return_type(reg)?.clone();
        let mut acc = Expr::New(out_ty);
        for command in &self.commands {
            acc = self.fold_command(command, acc)?;
        }
        Ok(acc)
    }

    fn fold_command(&self, command: &Command, acc: Expr) -> Result<Expr, BuildError> {
        match command {
            Command::Selector(selector) => {
                let source = self.selector_source(selector)?;
                Ok(Expr::setter(acc, [(selector.target.clone(), source)]))
            }
            Command::Fragment(fragment) => {
                // let {binds} in if (cond && binds-match-declared-types)
                // then <sub commands over acc> else acc. The is_type checks
                // re-verify statically-optional inclusions against the
                // dynamic values.
                let mut checks = Vec::new();
                if let Some(cond) = &fragment.condition {
                    checks.push(cond.clone());
                }
                for (param, _) in &fragment.binds {
                    let param_ty = fragment.query.input_type(param).ok_or_else(|| {
                        BuildError::UnknownBindParam {
                            query: fragment.query.schema_handle().to_string(),
                            param: param.clone(),
                        }
                    })?;
                    checks.push(Expr::is_type(Expr::var(param), param_ty.clone()));
                }
                let mut applied = acc.clone();
                for sub_command in fragment.query.commands() {
                    applied = fragment.query.fold_command(sub_command, applied)?;
                }
                let gated = match checks.len() {
                    0 => applied,
                    1 => Expr::if_else(checks.remove(0), applied, acc),
                    _ => Expr::if_else(Expr::and(checks), applied, acc),
                };
                Ok(Expr::let_(fragment.binds.clone(), gated))
            }
        }
    }

    /// Resolves a selector's source. The shorthand (`select("id")`) reads
    /// the same-named field off the query's sole input; with zero or
    /// several inputs it is ambiguous and fails.
    fn selector_source(&self, selector: &Selector) -> Result<Expr, BuildError> {
        if let Some(source) = &selector.source {
            return Ok(source.clone());
        }
        match self.inputs.as_slice() {
            [(input, _)] => Ok(Expr::getter(
                Expr::var(input.clone()),
                PathSeg::name(selector.target.clone()),
            )),
            _ => Err(BuildError::AmbiguousSelector {
                target: selector.target.clone(),
                inputs: self.inputs.len(),
            }),
        }
    }
}

/// Registers one output field, merging re-selections: an equal-typed
/// duplicate is a no-op, a differing one is an error.
fn merge_output_field(builder: &mut SchemaBuilder, field: Field) -> Result<(), BuildError> {
    if let Some(existing) = builder.registered(field.name()) {
        if existing.logical_type() == field.logical_type() {
            return Ok(());
        }
        return Err(BuildError::DuplicateSelector {
            target: field.name().to_string(),
            existing: existing.logical_type().display(),
            incoming: field.logical_type().display(),
        });
    }
    builder.field(field)?;
    Ok(())
}
