#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::SchemaError;
use crate::types::Type;

/// Name -> [`Type`] table backing lazy `Named` references.
///
/// Domain schemas are registered here at startup; the query builder also
/// registers each synthesized output schema under its generated name. All
/// registration happens before concurrent traffic, so a plain `RwLock` is
/// enough.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    entries: RwLock<HashMap<String, Type>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Type>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Type>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Registers a type under `name`. Registering the same name twice is an
    /// error; synthesized schemas use [`TypeRegistry::insert`] instead.
    pub fn register(&self, name: impl Into<String>, ty: Type) -> Result<(), SchemaError> {
        let name = name.into();
        let mut entries = self.write();
        if entries.contains_key(&name) {
            return Err(SchemaError::DuplicateName(name));
        }
        entries.insert(name, ty);
        Ok(())
    }

    /// Registers or replaces. Used for query output schemas, which are
    /// rebuilt (under the same declared name) whenever a query is extended
    /// after a first build.
    pub fn insert(&self, name: impl Into<String>, ty: Type) {
        self.write().insert(name.into(), ty);
    }

    pub fn resolve(&self, name: &str) -> Result<Type, SchemaError> {
        self.read()
            .get(name)
            .cloned()
            .ok_or_else(|| SchemaError::Unresolved(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }
}
