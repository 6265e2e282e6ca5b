#![forbid(unsafe_code)]

//! The structural type algebra.
//!
//! Every type in the system is a value of the closed [`Type`] enum. Equality
//! is structural: same variant, deep-equal payload. Schema-backed variants
//! (`Record`, `Union`) compare the referenced schema field-by-field.

use std::fmt;
use std::sync::Arc;

use crate::error::SchemaError;
use crate::registry::TypeRegistry;
use crate::schema::{RecordSchema, UnionSchema};

/// One segment of a field path: a field name or a positional index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathSeg {
    Name(String),
    Index(usize),
}

impl PathSeg {
    pub fn name(s: impl Into<String>) -> Self {
        PathSeg::Name(s.into())
    }
}

impl fmt::Display for PathSeg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSeg::Name(n) => write!(f, "{n}"),
            PathSeg::Index(i) => write!(f, "{i}"),
        }
    }
}

impl From<&str> for PathSeg {
    fn from(s: &str) -> Self {
        match s.parse::<usize>() {
            Ok(i) => PathSeg::Index(i),
            Err(_) => PathSeg::Name(s.to_string()),
        }
    }
}

impl From<usize> for PathSeg {
    fn from(i: usize) -> Self {
        PathSeg::Index(i)
    }
}

/// Host representative of an opaque type, used to coerce incoming values
/// when a field is assigned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Repr {
    Int,
    Float,
    Bool,
    Str,
    Bytes,
    DateTime,
    List,
    Map,
    /// No host representative; values pass through uncoerced.
    Abstract,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Type {
    /// Leaf type carrying a name and a host representative.
    Opaque { name: String, repr: Repr },
    /// A record schema reference; field lookup delegates to the schema.
    Record(Arc<RecordSchema>),
    /// A tagged union reference; variant lookup delegates to the schema.
    Union(Arc<UnionSchema>),
    /// Untagged "OR" of alternatives.
    Sum(Vec<Type>),
    /// Ordered required components.
    Product(Vec<Type>),
    /// Generic instantiation, e.g. `List[T]`, `Key[User]`.
    App { origin: Box<Type>, args: Vec<Type> },
    /// Placeholder type variable.
    Var(String),
    /// Lazy forward reference resolved through the [`TypeRegistry`].
    Named(String),
    /// Function type: ordered named params plus a return type.
    Func {
        params: Vec<(String, Type)>,
        ret: Box<Type>,
    },
    /// Nullable wrapper. Construction normalizes `optional(optional(x))`.
    Optional(Box<Type>),
}

impl Type {
    pub fn opaque(name: impl Into<String>, repr: Repr) -> Type {
        Type::Opaque {
            name: name.into(),
            repr,
        }
    }

    pub fn record(schema: Arc<RecordSchema>) -> Type {
        Type::Record(schema)
    }

    pub fn union(schema: Arc<UnionSchema>) -> Type {
        Type::Union(schema)
    }

    pub fn sum(alts: impl IntoIterator<Item = Type>) -> Type {
        Type::Sum(alts.into_iter().collect())
    }

    pub fn product(parts: impl IntoIterator<Item = Type>) -> Type {
        Type::Product(parts.into_iter().collect())
    }

    pub fn app(origin: Type, args: impl IntoIterator<Item = Type>) -> Type {
        Type::App {
            origin: Box::new(origin),
            args: args.into_iter().collect(),
        }
    }

    pub fn var(name: impl Into<String>) -> Type {
        Type::Var(name.into())
    }

    pub fn named(name: impl Into<String>) -> Type {
        Type::Named(name.into())
    }

    pub fn func(params: Vec<(String, Type)>, ret: Type) -> Type {
        Type::Func {
            params,
            ret: Box::new(ret),
        }
    }

    /// Wraps `inner` as nullable. Idempotent: an already-optional type is
    /// returned unchanged rather than double-wrapped.
    pub fn optional(inner: Type) -> Type {
        match inner {
            Type::Optional(_) => inner,
            other => Type::Optional(Box::new(other)),
        }
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, Type::Optional(_))
    }

    /// Chases `Named` links through the registry until a concrete type is
    /// found. Fails if any link is not registered.
    pub fn resolved(&self, reg: &TypeRegistry) -> Result<Type, SchemaError> {
        match self {
            Type::Named(name) => reg.resolve(name)?.resolved(reg),
            other => Ok(other.clone()),
        }
    }

    /// Walks a field path through this type, segment by segment.
    ///
    /// String segments index records, unions and sums; integer segments index
    /// products and type-application arguments. For a `Sum` the segment must
    /// resolve to one consistent type across **every** alternative: this is
    /// what lets a selector index through an untagged union the way GraphQL
    /// inline fragments do.
    pub fn type_for_field_path(
        &self,
        path: &[PathSeg],
        reg: &TypeRegistry,
    ) -> Result<Type, SchemaError> {
        let Some((seg, rest)) = path.split_first() else {
            return Ok(self.clone());
        };
        let child = self.child_for_segment(seg, reg)?;
        child.type_for_field_path(rest, reg)
    }

    fn child_for_segment(&self, seg: &PathSeg, reg: &TypeRegistry) -> Result<Type, SchemaError> {
        match self {
            Type::Named(name) => reg.resolve(name)?.child_for_segment(seg, reg),
            Type::Record(schema) => match seg {
                PathSeg::Name(key) => schema
                    .field(key)
                    .map(|f| f.logical_type())
                    .ok_or_else(|| SchemaError::UnknownField {
                        schema: schema.name().to_string(),
                        field: key.clone(),
                    }),
                PathSeg::Index(i) => schema
                    .field_at(*i)
                    .map(|f| f.logical_type())
                    .ok_or_else(|| self.not_indexable(seg)),
            },
            Type::Union(schema) => match seg {
                PathSeg::Name(tag) => schema
                    .variant(tag)
                    .cloned()
                    .ok_or_else(|| SchemaError::UnknownField {
                        schema: schema.name().to_string(),
                        field: tag.clone(),
                    }),
                PathSeg::Index(_) => Err(self.not_indexable(seg)),
            },
            Type::Sum(alts) => child_if_exists_in_all_variants(self, alts, seg, reg),
            Type::Product(parts) => match seg {
                PathSeg::Index(i) => parts
                    .get(*i)
                    .cloned()
                    .ok_or_else(|| self.not_indexable(seg)),
                PathSeg::Name(_) => Err(self.not_indexable(seg)),
            },
            Type::App { args, .. } => match seg {
                PathSeg::Index(i) => args.get(*i).cloned().ok_or_else(|| self.not_indexable(seg)),
                PathSeg::Name(_) => Err(self.not_indexable(seg)),
            },
            // Null propagation: indexing a nullable type yields a nullable
            // child, mirroring the evaluator's null sentinel.
            Type::Optional(inner) => Ok(Type::optional(inner.child_for_segment(seg, reg)?)),
            Type::Opaque { .. } | Type::Var(_) | Type::Func { .. } => {
                Err(self.not_indexable(seg))
            }
        }
    }

    fn not_indexable(&self, seg: &PathSeg) -> SchemaError {
        SchemaError::NotIndexable {
            ty: self.display(),
            segment: seg.to_string(),
        }
    }

    pub fn display(&self) -> String {
        match self {
            Type::Opaque { name, .. } => name.clone(),
            Type::Record(schema) => schema.name().to_string(),
            Type::Union(schema) => schema.name().to_string(),
            Type::Sum(alts) => {
                let alts_s = alts.iter().map(Type::display).collect::<Vec<_>>();
                alts_s.join(" | ")
            }
            Type::Product(parts) => {
                let parts_s = parts.iter().map(Type::display).collect::<Vec<_>>();
                format!("({})", parts_s.join(", "))
            }
            Type::App { origin, args } => {
                let args_s = args.iter().map(Type::display).collect::<Vec<_>>();
                format!("{}[{}]", origin.display(), args_s.join(", "))
            }
            Type::Var(name) => format!("'{name}"),
            Type::Named(name) => name.clone(),
            Type::Func { params, ret } => {
                let params_s = params
                    .iter()
                    .map(|(n, t)| format!("{n}: {}", t.display()))
                    .collect::<Vec<_>>();
                format!("({}) -> {}", params_s.join(", "), ret.display())
            }
            Type::Optional(inner) => format!("{}?", inner.display()),
        }
    }
}

/// Flattens nested sums and collects the segment's type from every
/// alternative. Succeeds only when each alternative has the segment and all
/// of them agree on its type.
fn child_if_exists_in_all_variants(
    whole: &Type,
    alts: &[Type],
    seg: &PathSeg,
    reg: &TypeRegistry,
) -> Result<Type, SchemaError> {
    let not_shared = || SchemaError::PathNotShared {
        ty: whole.display(),
        segment: seg.to_string(),
    };
    let mut found: Option<Type> = None;
    let mut pending: Vec<Type> = alts.to_vec();
    while let Some(alt) = pending.pop() {
        let alt = alt.resolved(reg)?;
        if let Type::Sum(nested) = alt {
            pending.extend(nested);
            continue;
        }
        let child = alt.child_for_segment(seg, reg).map_err(|_| not_shared())?;
        match &found {
            None => found = Some(child),
            Some(prev) if *prev == child => {}
            Some(_) => return Err(not_shared()),
        }
    }
    found.ok_or_else(not_shared)
}
