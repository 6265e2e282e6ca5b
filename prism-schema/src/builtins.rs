#![forbid(unsafe_code)]

//! Well-known opaque types and the generic containers built over them.

use crate::types::{Repr, Type};

pub fn int() -> Type {
    Type::opaque("int", Repr::Int)
}

pub fn long() -> Type {
    Type::opaque("long", Repr::Int)
}

pub fn string() -> Type {
    Type::opaque("str", Repr::Str)
}

pub fn boolean() -> Type {
    Type::opaque("bool", Repr::Bool)
}

pub fn float() -> Type {
    Type::opaque("float", Repr::Float)
}

pub fn double() -> Type {
    Type::opaque("double", Repr::Float)
}

pub fn bytes() -> Type {
    Type::opaque("bytes", Repr::Bytes)
}

pub fn url() -> Type {
    Type::opaque("URL", Repr::Str)
}

pub fn date_time() -> Type {
    Type::opaque("DateTime", Repr::DateTime)
}

pub fn key() -> Type {
    Type::opaque("key", Repr::Abstract)
}

pub fn list_() -> Type {
    Type::opaque("list", Repr::List)
}

pub fn map_() -> Type {
    Type::opaque("map", Repr::Map)
}

pub fn list_of(elem: Type) -> Type {
    Type::app(list_(), [elem])
}

pub fn map_of(k: Type, v: Type) -> Type {
    Type::app(map_(), [k, v])
}

pub fn key_of(target: Type) -> Type {
    Type::app(key(), [target])
}
