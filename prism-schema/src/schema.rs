#![forbid(unsafe_code)]

//! Record and union schemas plus per-field metadata.
//!
//! A [`RecordSchema`] is an ordered field registry: iteration order is
//! declaration order, which downstream layers rely on for deterministic
//! output schemas.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::SchemaError;
use crate::types::{Repr, Type};
use crate::value::{RecordValue, Value};

pub type Validator = Arc<dyn Fn(Value) -> Result<Value, SchemaError> + Send + Sync>;

/// Default source for an unset field: absent, a fixed value, or a factory
/// invoked per access.
#[derive(Clone, Default)]
pub enum FieldDefault {
    #[default]
    None,
    Value(Value),
    Factory(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl FieldDefault {
    pub fn produce(&self) -> Option<Value> {
        match self {
            FieldDefault::None => None,
            FieldDefault::Value(v) => Some(v.clone()),
            FieldDefault::Factory(f) => Some(f()),
        }
    }
}

impl fmt::Debug for FieldDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldDefault::None => f.write_str("None"),
            FieldDefault::Value(v) => write!(f, "Value({v:?})"),
            FieldDefault::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

#[derive(Clone)]
pub struct Field {
    name: String,
    ty: Type,
    pub optional: bool,
    default: FieldDefault,
    validators: Vec<Validator>,
}

impl Field {
    /// Builds a field over `ty`. An already-optional base type auto-unwraps
    /// and sets the flag instead, so the logical type never double-wraps.
    pub fn new(name: impl Into<String>, ty: Type) -> Field {
        let (ty, optional) = match ty {
            Type::Optional(inner) => (*inner, true),
            other => (other, false),
        };
        Field {
            name: name.into(),
            ty,
            optional,
            default: FieldDefault::None,
            validators: Vec::new(),
        }
    }

    pub fn optional(name: impl Into<String>, ty: Type) -> Field {
        let mut f = Field::new(name, ty);
        f.optional = true;
        f
    }

    pub fn with_default(mut self, value: Value) -> Field {
        self.default = FieldDefault::Value(value);
        self
    }

    pub fn with_factory(mut self, factory: impl Fn() -> Value + Send + Sync + 'static) -> Field {
        self.default = FieldDefault::Factory(Arc::new(factory));
        self
    }

    pub fn with_validator(
        mut self,
        validator: impl Fn(Value) -> Result<Value, SchemaError> + Send + Sync + 'static,
    ) -> Field {
        self.validators.push(Arc::new(validator));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_type(&self) -> &Type {
        &self.ty
    }

    /// `optional(base)` iff the field is flagged optional.
    pub fn logical_type(&self) -> Type {
        if self.optional {
            Type::optional(self.ty.clone())
        } else {
            self.ty.clone()
        }
    }

    pub fn default_value(&self) -> Option<Value> {
        self.default.produce()
    }

    /// Coerces a non-null value through the base type's host representative,
    /// then runs user validators in order.
    pub fn validate(&self, value: Value) -> Result<Value, SchemaError> {
        let mut value = coerce(&self.ty, value)?;
        for validator in &self.validators {
            value = validator(value).map_err(|e| match e {
                SchemaError::Validator { message, .. } => SchemaError::Validator {
                    field: self.name.clone(),
                    message,
                },
                other => other,
            })?;
        }
        Ok(value)
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("ty", &self.ty.display())
            .field("optional", &self.optional)
            .finish_non_exhaustive()
    }
}

// Validators and defaults are behavior, not shape; equality covers name,
// base type and optionality only.
impl PartialEq for Field {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.ty == other.ty && self.optional == other.optional
    }
}

fn coerce(ty: &Type, value: Value) -> Result<Value, SchemaError> {
    let Type::Opaque { repr, name } = ty else {
        return Ok(value);
    };
    let fail = |value: &Value| SchemaError::Coercion {
        ty: name.clone(),
        value: format!("{value:?}"),
    };
    match (*repr, value) {
        (Repr::Int, Value::Int(i)) => Ok(Value::Int(i)),
        (Repr::Int, Value::Bool(b)) => Ok(Value::Int(b as i64)),
        (Repr::Int, Value::Float(x)) => Ok(Value::Int(x as i64)),
        (Repr::Int, Value::Str(s)) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| fail(&Value::Str(s.clone()))),
        (Repr::Float, Value::Float(x)) => Ok(Value::Float(x)),
        (Repr::Float, Value::Int(i)) => Ok(Value::Float(i as f64)),
        (Repr::Float, Value::Str(s)) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| fail(&Value::Str(s.clone()))),
        (Repr::Bool, Value::Bool(b)) => Ok(Value::Bool(b)),
        (Repr::Bool, Value::Int(i)) => Ok(Value::Bool(i != 0)),
        (Repr::Str, Value::Str(s)) => Ok(Value::Str(s)),
        (Repr::Str, Value::Int(i)) => Ok(Value::Str(i.to_string())),
        (Repr::Str, Value::Float(x)) => Ok(Value::Str(x.to_string())),
        (Repr::Str, Value::Bool(b)) => Ok(Value::Str(b.to_string())),
        (Repr::Bytes, Value::Bytes(b)) => Ok(Value::Bytes(b)),
        (Repr::Bytes, Value::Str(s)) => Ok(Value::Bytes(s.into_bytes())),
        // Dates travel as ISO-8601 strings at this layer.
        (Repr::DateTime, Value::Str(s)) => Ok(Value::Str(s)),
        (Repr::List, v @ Value::List(_)) => Ok(v),
        (Repr::Map, v @ Value::Map(_)) => Ok(v),
        (Repr::Abstract, v) => Ok(v),
        (_, v) => Err(fail(&v)),
    }
}

/// Ordered name -> [`Field`] registry for one record shape.
#[derive(Debug)]
pub struct RecordSchema {
    name: String,
    fields: Vec<Field>,
    index: HashMap<String, usize>,
}

impl RecordSchema {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    pub fn field_at(&self, i: usize) -> Option<&Field> {
        self.fields.get(i)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Declaration-ordered iteration.
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Walks fields in order: a null is accepted only when the field is
    /// optional; non-null values are re-validated through the field.
    /// Problems aggregate across fields before failing.
    pub fn validate(&self, record: &RecordValue) -> Result<(), SchemaError> {
        let mut problems = Vec::new();
        for field in &self.fields {
            let value = record.effective(field);
            if value == Value::Null {
                if !field.optional {
                    problems.push(format!("required field '{}' has no value", field.name));
                }
                continue;
            }
            if let Err(e) = field.validate(value) {
                problems.push(e.to_string());
            }
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(SchemaError::Validation {
                schema: self.name.clone(),
                problems,
            })
        }
    }
}

impl PartialEq for RecordSchema {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.fields == other.fields
    }
}

/// Field-by-field schema builder. Duplicate names are rejected at
/// registration, never silently merged.
#[derive(Debug)]
pub struct SchemaBuilder {
    name: String,
    fields: Vec<Field>,
    index: HashMap<String, usize>,
}

impl SchemaBuilder {
    pub fn new(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            name: name.into(),
            fields: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn field(&mut self, field: Field) -> Result<&mut SchemaBuilder, SchemaError> {
        if self.index.contains_key(field.name()) {
            return Err(SchemaError::DuplicateField {
                schema: self.name.clone(),
                field: field.name().to_string(),
            });
        }
        self.index.insert(field.name().to_string(), self.fields.len());
        self.fields.push(field);
        Ok(self)
    }

    /// Explicit inheritance: clones every field of `parent` into this
    /// builder, in the parent's declaration order.
    pub fn extend_from(&mut self, parent: &RecordSchema) -> Result<&mut SchemaBuilder, SchemaError> {
        for field in parent.fields() {
            self.field(field.clone())?;
        }
        Ok(self)
    }

    pub fn registered(&self, name: &str) -> Option<&Field> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    pub fn finish(self) -> Arc<RecordSchema> {
        Arc::new(RecordSchema {
            name: self.name,
            fields: self.fields,
            index: self.index,
        })
    }
}

/// Tagged union: ordered named variants, each with a payload type.
#[derive(Debug, PartialEq)]
pub struct UnionSchema {
    name: String,
    variants: Vec<(String, Type)>,
}

impl UnionSchema {
    pub fn new(
        name: impl Into<String>,
        variants: impl IntoIterator<Item = (impl Into<String>, Type)>,
    ) -> Result<Arc<UnionSchema>, SchemaError> {
        let name = name.into();
        let mut out: Vec<(String, Type)> = Vec::new();
        for (tag, ty) in variants {
            let tag = tag.into();
            if out.iter().any(|(t, _)| *t == tag) {
                return Err(SchemaError::DuplicateVariant {
                    union_name: name,
                    variant: tag,
                });
            }
            out.push((tag, ty));
        }
        Ok(Arc::new(UnionSchema {
            name,
            variants: out,
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variant(&self, tag: &str) -> Option<&Type> {
        self.variants
            .iter()
            .find(|(t, _)| t == tag)
            .map(|(_, ty)| ty)
    }

    pub fn variants(&self) -> impl Iterator<Item = &(String, Type)> {
        self.variants.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins;

    #[test]
    fn optional_base_auto_unwraps() {
        let f = Field::new("nick", Type::optional(builtins::string()));
        assert!(f.optional);
        assert_eq!(f.base_type(), &builtins::string());
        assert_eq!(f.logical_type(), Type::optional(builtins::string()));
    }

    #[test]
    fn duplicate_field_names_are_rejected() {
        let mut b = SchemaBuilder::new("User");
        b.field(Field::new("id", builtins::string())).unwrap();
        let err = b.field(Field::new("id", builtins::int())).unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateField { .. }));
    }

    #[test]
    fn iteration_order_is_declaration_order() {
        let mut b = SchemaBuilder::new("User");
        b.field(Field::new("id", builtins::string())).unwrap();
        b.field(Field::new("name", builtins::string())).unwrap();
        b.field(Field::new("age", builtins::int())).unwrap();
        let schema = b.finish();
        let names: Vec<_> = schema.fields().map(Field::name).collect();
        assert_eq!(names, ["id", "name", "age"]);
    }

    #[test]
    fn factory_defaults_produce_per_read() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = Arc::new(AtomicUsize::new(0));
        let counted = calls.clone();
        let f = Field::new("attempts", builtins::int())
            .with_factory(move || Value::Int(counted.fetch_add(1, Ordering::SeqCst) as i64));
        assert_eq!(f.default_value(), Some(Value::Int(0)));
        assert_eq!(f.default_value(), Some(Value::Int(1)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn extend_from_composes_parent_fields_in_order() {
        let mut parent = SchemaBuilder::new("Entity");
        parent.field(Field::new("id", builtins::string())).unwrap();
        parent
            .field(Field::new("created", builtins::date_time()))
            .unwrap();
        let parent = parent.finish();

        let mut child = SchemaBuilder::new("User");
        child.field(Field::new("name", builtins::string())).unwrap();
        child.extend_from(&parent).unwrap();
        // Inherited names collide like any other registration.
        let err = child.field(Field::new("id", builtins::int())).unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateField { .. }));

        let schema = child.finish();
        let names: Vec<_> = schema.fields().map(Field::name).collect();
        assert_eq!(names, ["name", "id", "created"]);
    }

    #[test]
    fn field_coerces_through_repr() {
        let f = Field::new("age", builtins::int());
        assert_eq!(f.validate(Value::Str("42".into())).unwrap(), Value::Int(42));
        let err = f.validate(Value::Str("nope".into())).unwrap_err();
        assert!(matches!(err, SchemaError::Coercion { .. }));
    }

    #[test]
    fn validators_run_in_order() {
        let f = Field::new("handle", builtins::string())
            .with_validator(|v| match v {
                Value::Str(s) => Ok(Value::Str(s.to_lowercase())),
                other => Ok(other),
            })
            .with_validator(|v| match &v {
                Value::Str(s) if s.is_empty() => Err(SchemaError::Validator {
                    field: String::new(),
                    message: "empty handle".into(),
                }),
                _ => Ok(v),
            });
        assert_eq!(
            f.validate(Value::Str("Zuck".into())).unwrap(),
            Value::Str("zuck".into())
        );
        assert!(f.validate(Value::Str(String::new())).is_err());
    }

    #[test]
    fn union_variant_lookup() {
        let u = UnionSchema::new(
            "Outcome",
            [("ok", builtins::int()), ("err", builtins::string())],
        )
        .unwrap();
        assert_eq!(u.variant("ok"), Some(&builtins::int()));
        assert!(u.variant("missing").is_none());
        assert!(
            UnionSchema::new("Dup", [("a", builtins::int()), ("a", builtins::int())]).is_err()
        );
    }
}
