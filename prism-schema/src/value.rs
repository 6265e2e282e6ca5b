#![forbid(unsafe_code)]

//! The runtime value model.
//!
//! Record "instances" are tagged structs keyed by their schema handle; no
//! host classes are generated. Values are treated as immutable once
//! constructed, so sharing across evaluations needs no locking.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::builtins;
use crate::error::SchemaError;
use crate::registry::TypeRegistry;
use crate::schema::{Field, RecordSchema, UnionSchema};
use crate::types::{Repr, Type};

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Record(RecordValue),
    Variant(VariantValue),
}

/// A record instance: schema handle plus the field slots actually set.
/// Reads fall back to the field's declared default.
#[derive(Clone, Debug)]
pub struct RecordValue {
    schema: Arc<RecordSchema>,
    slots: BTreeMap<String, Value>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VariantValue {
    pub schema: Arc<UnionSchema>,
    pub tag: String,
    pub value: Box<Value>,
}

impl RecordValue {
    pub fn new(schema: Arc<RecordSchema>) -> RecordValue {
        RecordValue {
            schema,
            slots: BTreeMap::new(),
        }
    }

    pub fn schema(&self) -> &Arc<RecordSchema> {
        &self.schema
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    /// Set slot, falling back to the field default, then to `Null`.
    pub(crate) fn effective(&self, field: &Field) -> Value {
        self.slots
            .get(field.name())
            .cloned()
            .or_else(|| field.default_value())
            .unwrap_or(Value::Null)
    }

    pub fn get(&self, name: &str) -> Result<Value, SchemaError> {
        let field = self
            .schema
            .field(name)
            .ok_or_else(|| SchemaError::UnknownField {
                schema: self.schema.name().to_string(),
                field: name.to_string(),
            })?;
        Ok(self.effective(field))
    }

    /// Validates and stores one field value. A null is accepted only when
    /// the field is optional; everything else coerces through the field.
    pub fn set(&mut self, name: &str, value: Value) -> Result<(), SchemaError> {
        let field = self
            .schema
            .field(name)
            .ok_or_else(|| SchemaError::UnknownField {
                schema: self.schema.name().to_string(),
                field: name.to_string(),
            })?;
        let value = if value == Value::Null {
            if !field.optional {
                return Err(SchemaError::Validation {
                    schema: self.schema.name().to_string(),
                    problems: vec![format!("required field '{name}' has no value")],
                });
            }
            Value::Null
        } else {
            field.validate(value)?
        };
        self.slots.insert(name.to_string(), value);
        Ok(())
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        self.schema.validate(self)
    }
}

// Two records are equal when they share a schema shape and every field's
// effective value (defaults included) agrees.
impl PartialEq for RecordValue {
    fn eq(&self, other: &Self) -> bool {
        if self.schema != other.schema {
            return false;
        }
        self.schema
            .fields()
            .all(|f| self.effective(f) == other.effective(f))
    }
}

impl Value {
    pub fn record(schema: Arc<RecordSchema>) -> Value {
        Value::Record(RecordValue::new(schema))
    }

    pub fn str(s: impl Into<String>) -> Value {
        Value::Str(s.into())
    }

    pub fn list(items: impl IntoIterator<Item = Value>) -> Value {
        Value::List(items.into_iter().collect())
    }

    /// Python-ish truthiness used by conditions: null, false, zero and empty
    /// containers are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(x) => *x != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Bytes(b) => !b.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(entries) => !entries.is_empty(),
            Value::Record(_) | Value::Variant(_) => true,
        }
    }

    /// The natural type of a literal value.
    pub fn type_of(&self) -> Type {
        match self {
            Value::Null => Type::optional(Type::var("_")),
            Value::Bool(_) => builtins::boolean(),
            Value::Int(_) => builtins::int(),
            Value::Float(_) => builtins::double(),
            Value::Str(_) => builtins::string(),
            Value::Bytes(_) => builtins::bytes(),
            Value::List(items) => {
                let elem = items
                    .first()
                    .map(Value::type_of)
                    .unwrap_or_else(|| Type::var("_"));
                builtins::list_of(elem)
            }
            Value::Map(entries) => {
                let val = entries
                    .values()
                    .next()
                    .map(Value::type_of)
                    .unwrap_or_else(|| Type::var("_"));
                builtins::map_of(builtins::string(), val)
            }
            Value::Record(rec) => Type::Record(rec.schema.clone()),
            Value::Variant(var) => Type::Union(var.schema.clone()),
        }
    }

    /// Dynamic type check behind `is_type`. `Null` satisfies only optional
    /// types; a sum is satisfied by any alternative.
    pub fn matches_type(&self, ty: &Type, reg: &TypeRegistry) -> Result<bool, SchemaError> {
        match ty {
            Type::Named(name) => self.matches_type(&reg.resolve(name)?, reg),
            Type::Optional(inner) => {
                if *self == Value::Null {
                    Ok(true)
                } else {
                    self.matches_type(inner, reg)
                }
            }
            Type::Var(_) => Ok(true),
            Type::Opaque { repr, .. } => Ok(self.matches_repr(*repr)),
            Type::Record(schema) => Ok(match self {
                Value::Record(rec) => rec.schema == *schema,
                _ => false,
            }),
            Type::Union(schema) => match self {
                Value::Variant(var) if var.schema == *schema => {
                    match var.schema.variant(&var.tag) {
                        Some(payload) => var.value.matches_type(payload, reg),
                        None => Ok(false),
                    }
                }
                _ => Ok(false),
            },
            Type::Sum(alts) => {
                for alt in alts {
                    if self.matches_type(alt, reg)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Type::Product(parts) => match self {
                Value::List(items) if items.len() == parts.len() => {
                    for (item, part) in items.iter().zip(parts) {
                        if !item.matches_type(part, reg)? {
                            return Ok(false);
                        }
                    }
                    Ok(true)
                }
                _ => Ok(false),
            },
            Type::App { origin, args } => self.matches_app(origin, args, reg),
            Type::Func { .. } => Ok(false),
        }
    }

    fn matches_repr(&self, repr: Repr) -> bool {
        match repr {
            Repr::Int => matches!(self, Value::Int(_)),
            Repr::Float => matches!(self, Value::Float(_) | Value::Int(_)),
            Repr::Bool => matches!(self, Value::Bool(_)),
            Repr::Str | Repr::DateTime => matches!(self, Value::Str(_)),
            Repr::Bytes => matches!(self, Value::Bytes(_)),
            Repr::List => matches!(self, Value::List(_)),
            Repr::Map => matches!(self, Value::Map(_)),
            Repr::Abstract => true,
        }
    }

    fn matches_app(
        &self,
        origin: &Type,
        args: &[Type],
        reg: &TypeRegistry,
    ) -> Result<bool, SchemaError> {
        match (origin.resolved(reg)?, self) {
            (Type::Opaque { repr: Repr::List, .. }, Value::List(items)) => {
                let Some(elem_ty) = args.first() else {
                    return Ok(true);
                };
                for item in items {
                    if !item.matches_type(elem_ty, reg)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            (Type::Opaque { repr: Repr::Map, .. }, Value::Map(entries)) => {
                let Some(val_ty) = args.get(1) else {
                    return Ok(true);
                };
                for value in entries.values() {
                    if !value.matches_type(val_ty, reg)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            // Keys travel as opaque id strings regardless of their target.
            (Type::Opaque { name, .. }, value) if name == "key" => {
                Ok(matches!(value, Value::Str(_)))
            }
            (resolved, value) => value.matches_type(&resolved, reg),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(x) => serializer.serialize_f64(*x),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Bytes(b) => serializer.serialize_bytes(b),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            Value::Record(rec) => {
                let schema = rec.schema();
                let mut map = serializer.serialize_map(Some(schema.len()))?;
                for field in schema.fields() {
                    map.serialize_entry(field.name(), &rec.effective(field))?;
                }
                map.end()
            }
            Value::Variant(var) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(&var.tag, var.value.as_ref())?;
                map.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaBuilder;

    fn user_schema() -> Arc<RecordSchema> {
        let mut b = SchemaBuilder::new("User");
        b.field(Field::new("id", builtins::string())).unwrap();
        b.field(Field::optional("nick", builtins::string())).unwrap();
        b.field(Field::new("age", builtins::int()).with_default(Value::Int(0)))
            .unwrap();
        b.finish()
    }

    #[test]
    fn unset_fields_read_defaults() {
        let rec = RecordValue::new(user_schema());
        assert_eq!(rec.get("age").unwrap(), Value::Int(0));
        assert_eq!(rec.get("nick").unwrap(), Value::Null);
        assert!(rec.get("ghost").is_err());
    }

    #[test]
    fn set_rejects_null_on_required_fields() {
        let mut rec = RecordValue::new(user_schema());
        assert!(rec.set("id", Value::Null).is_err());
        rec.set("nick", Value::Null).unwrap();
        rec.set("id", Value::str("u1")).unwrap();
        assert_eq!(rec.get("id").unwrap(), Value::str("u1"));
    }

    #[test]
    fn validate_reports_missing_required_fields() {
        let rec = RecordValue::new(user_schema());
        let err = rec.validate().unwrap_err();
        assert!(matches!(err, SchemaError::Validation { ref problems, .. } if problems.len() == 1));
    }

    #[test]
    fn null_matches_only_optionals() {
        let reg = TypeRegistry::new();
        assert!(Value::Null
            .matches_type(&Type::optional(builtins::int()), &reg)
            .unwrap());
        assert!(!Value::Null.matches_type(&builtins::int(), &reg).unwrap());
    }

    #[test]
    fn sum_matches_any_alternative() {
        let reg = TypeRegistry::new();
        let ty = Type::sum([builtins::int(), builtins::string()]);
        assert!(Value::Int(4).matches_type(&ty, &reg).unwrap());
        assert!(Value::str("x").matches_type(&ty, &reg).unwrap());
        assert!(!Value::Bool(true).matches_type(&ty, &reg).unwrap());
    }

    #[test]
    fn list_app_matches_element_wise() {
        let reg = TypeRegistry::new();
        let ty = builtins::list_of(builtins::int());
        assert!(Value::list([Value::Int(1), Value::Int(2)])
            .matches_type(&ty, &reg)
            .unwrap());
        assert!(!Value::list([Value::Int(1), Value::str("x")])
            .matches_type(&ty, &reg)
            .unwrap());
    }

    #[test]
    fn records_serialize_as_objects() {
        let mut rec = RecordValue::new(user_schema());
        rec.set("id", Value::str("u1")).unwrap();
        let json = serde_json::to_value(Value::Record(rec)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "id": "u1", "nick": null, "age": 0 })
        );
    }
}
