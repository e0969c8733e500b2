//! Registry of versioned schema contracts.

use super::contract::SchemaContract;
use super::validator::{check_constraints, validate, ValidationOutcome};
use crate::errors::SchemaRegistryError;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

#[allow(clippy::expect_used)]
static SCHEMA_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_\-]*\.v[0-9]+$").expect("valid regex"));

/// Returns true if `id` follows the `<name>.v<version>` convention.
#[must_use]
pub fn is_valid_schema_id(id: &str) -> bool {
    SCHEMA_ID.is_match(id)
}

/// Explicit, caller-owned registry of schema contracts.
///
/// Built once during setup and then shared read-only (usually behind an
/// `Arc`) by every run. A registered version can never be replaced.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    contracts: HashMap<String, Arc<SchemaContract>>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a contract and returns its id.
    ///
    /// Re-registering an identical contract is a no-op. Registering a
    /// different contract under an existing id is a version conflict.
    pub fn register(&mut self, contract: SchemaContract) -> Result<String, SchemaRegistryError> {
        let id = contract.id();
        if !is_valid_schema_id(&id) {
            return Err(SchemaRegistryError::invalid_id(
                id,
                "names must be lowercase and start with a letter",
            ));
        }

        check_constraints(&contract).map_err(|(field, reason)| {
            SchemaRegistryError::InvalidConstraint {
                id: id.clone(),
                field,
                reason,
            }
        })?;

        if let Some(existing) = self.contracts.get(&id) {
            if **existing == contract {
                return Ok(id);
            }
            return Err(SchemaRegistryError::VersionConflict { id });
        }

        tracing::debug!(schema_id = %id, fields = contract.fields.len(), "Registered schema contract");
        self.contracts.insert(id.clone(), Arc::new(contract));
        Ok(id)
    }

    /// Registers a contract and returns the registry, for chained setup.
    pub fn with(mut self, contract: SchemaContract) -> Result<Self, SchemaRegistryError> {
        self.register(contract)?;
        Ok(self)
    }

    /// Looks up a contract by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<SchemaContract>> {
        self.contracts.get(id).cloned()
    }

    /// Looks up a contract by id, failing if it is unknown.
    pub fn require(&self, id: &str) -> Result<Arc<SchemaContract>, SchemaRegistryError> {
        self.get(id).ok_or_else(|| SchemaRegistryError::unknown(id))
    }

    /// Returns true if the id is registered.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.contracts.contains_key(id)
    }

    /// Registered versions of a contract name, ascending.
    #[must_use]
    pub fn versions(&self, name: &str) -> Vec<u32> {
        let mut versions: Vec<u32> = self
            .contracts
            .values()
            .filter(|c| c.name == name)
            .map(|c| c.version)
            .collect();
        versions.sort_unstable();
        versions
    }

    /// The highest registered version of a contract name.
    #[must_use]
    pub fn latest(&self, name: &str) -> Option<Arc<SchemaContract>> {
        self.contracts
            .values()
            .filter(|c| c.name == name)
            .max_by_key(|c| c.version)
            .cloned()
    }

    /// All registered ids, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.contracts.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of registered contracts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }

    /// Validates a value against a registered contract.
    pub fn validate(&self, id: &str, value: &Value) -> Result<ValidationOutcome, SchemaRegistryError> {
        let contract = self.require(id)?;
        Ok(validate(value, &contract))
    }
}
