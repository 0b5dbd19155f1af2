//! Shopify object schema.
//!
//! Maps each global object name to its properties and their type strings.
//! Type strings are scalars (`string`, `number`, `boolean`), `object`, `any`,
//! another object name (`image`), or an array of either (`array<variant>`).
//! A `"*"` property makes every property of that object resolve to its type.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use thiserror::Error;

const STANDARD_SCHEMA: &str = include_str!("../data/shopify_schema.json");

static STANDARD: LazyLock<Schema> = LazyLock::new(|| {
    Schema::from_json(STANDARD_SCHEMA).expect("embedded shopify_schema.json is valid")
});

/// Property name matching any property of an object.
pub const WILDCARD_PROPERTY: &str = "*";

/// Error loading a schema or definitions table.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Object name → property name → type string.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    objects: BTreeMap<String, BTreeMap<String, String>>,
}

impl Schema {
    /// The schema compiled into this crate.
    pub fn standard() -> &'static Schema {
        &STANDARD
    }

    /// Load a schema from its JSON form: `{"product": {"title": "string"}}`.
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn has_object(&self, name: &str) -> bool {
        self.objects.contains_key(name)
    }

    /// Declared type of `object.property`, honoring the `"*"` wildcard.
    pub fn property_type(&self, object: &str, property: &str) -> Option<&str> {
        let properties = self.objects.get(object)?;
        properties
            .get(property)
            .or_else(|| properties.get(WILDCARD_PROPERTY))
            .map(String::as_str)
    }

    /// Object names, sorted.
    pub fn object_names(&self) -> impl Iterator<Item = &str> {
        self.objects.keys().map(String::as_str)
    }

    /// Property names of `object`, sorted. Empty for unknown objects.
    pub fn property_names(&self, object: &str) -> impl Iterator<Item = &str> {
        self.objects
            .get(object)
            .into_iter()
            .flat_map(|properties| properties.keys())
            .map(String::as_str)
            .filter(|name| *name != WILDCARD_PROPERTY)
    }
}
