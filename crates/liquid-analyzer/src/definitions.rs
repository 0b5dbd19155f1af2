//! Tag and filter definitions.
//!
//! The standard tables ship with the crate. Per-project additions arrive as
//! [`CustomDefinitions`] from a [`DefinitionProvider`].

use crate::schema::SchemaError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;
use thiserror::Error;

const STANDARD_DEFINITIONS: &str = include_str!("../data/definitions.json");

static STANDARD: LazyLock<Definitions> = LazyLock::new(|| {
    Definitions::from_json(STANDARD_DEFINITIONS).expect("embedded definitions.json is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagDefinition {
    pub requires_closing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterDefinition {
    pub input_type: String,
    pub output_type: String,
    #[serde(default)]
    pub shopify_specific: bool,
}

/// Standard tag and filter tables.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Definitions {
    #[serde(default)]
    pub tags: BTreeMap<String, TagDefinition>,
    #[serde(default)]
    pub filters: BTreeMap<String, FilterDefinition>,
}

impl Definitions {
    /// The definitions compiled into this crate.
    pub fn standard() -> &'static Definitions {
        &STANDARD
    }

    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn tag(&self, name: &str) -> Option<&TagDefinition> {
        self.tags.get(name)
    }

    pub fn filter(&self, name: &str) -> Option<&FilterDefinition> {
        self.filters.get(name)
    }

    /// Whether `name` is a standard tag that takes an end tag.
    pub fn requires_closing(&self, name: &str) -> bool {
        self.tag(name).is_some_and(|tag| tag.requires_closing)
    }
}

/// Project-specific names accepted on top of the standard tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct CustomDefinitions {
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub filters: Vec<String>,
    /// Extra global variable names.
    #[serde(default)]
    pub objects: Vec<String>,
}

impl CustomDefinitions {
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.filters.is_empty() && self.objects.is_empty()
    }

    pub fn has_tag(&self, name: &str) -> bool {
        self.tags.iter().any(|t| t == name)
    }

    pub fn has_filter(&self, name: &str) -> bool {
        self.filters.iter().any(|f| f == name)
    }

    pub fn has_object(&self, name: &str) -> bool {
        self.objects.iter().any(|o| o == name)
    }
}

/// Failure to fetch a project's custom definitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("No custom definitions for project '{0}'")]
    NotFound(String),
    #[error("Custom definitions unavailable: {0}")]
    Unavailable(String),
}

/// Source of per-project custom tags, filters and objects.
#[async_trait]
pub trait DefinitionProvider: Send + Sync {
    async fn custom_definitions(&self, project_id: &str)
        -> Result<CustomDefinitions, LookupError>;
}

/// In-memory provider keyed by project id.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct StaticDefinitionProvider {
    projects: HashMap<String, CustomDefinitions>,
}

impl StaticDefinitionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `{"project-id": {"tags": [...], "filters": [...]}}`.
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn insert(&mut self, project_id: impl Into<String>, definitions: CustomDefinitions) {
        self.projects.insert(project_id.into(), definitions);
    }
}

#[async_trait]
impl DefinitionProvider for StaticDefinitionProvider {
    async fn custom_definitions(&self, project_id: &str) -> Result<CustomDefinitions, LookupError> {
        self.projects
            .get(project_id)
            .cloned()
            .ok_or_else(|| LookupError::NotFound(project_id.to_string()))
    }
}
