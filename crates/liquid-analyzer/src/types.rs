//! Schema-driven type inference.
//!
//! Types are plain strings as they appear in the schema. Internally a path
//! resolves to its *raw* type (`array<variant>`, `image`); [`TypeChecker::infer_type`]
//! reports the normalized form (`array`, `object`).

use crate::definitions::Definitions;
use crate::schema::Schema;
use serde::Serialize;

pub const ANY: &str = "any";
pub const UNKNOWN: &str = "unknown";

/// Outcome of resolving a property chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Raw type of the full chain.
    Type(String),
    /// `property` does not exist on `object` (a schema object or raw type).
    UnknownProperty { object: String, property: String },
}

/// Result of checking a filter against its input type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterTypeCheck {
    pub valid: bool,
    /// Input type the filter declares, when the filter is known.
    pub expected_type: Option<String>,
}

/// Type inference over a schema and a filter table.
#[derive(Debug, Clone, Copy)]
pub struct TypeChecker<'a> {
    schema: &'a Schema,
    definitions: &'a Definitions,
}

impl TypeChecker<'static> {
    /// Checker over the embedded schema and definitions.
    pub fn standard() -> Self {
        Self::new(Schema::standard(), Definitions::standard())
    }
}

impl<'a> TypeChecker<'a> {
    pub fn new(schema: &'a Schema, definitions: &'a Definitions) -> Self {
        Self {
            schema,
            definitions,
        }
    }

    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    /// Normalized type of a dotted path (`product.price` → `number`).
    /// `unknown` as soon as the root or any property is missing.
    pub fn infer_type(&self, path: &str) -> String {
        let mut parts = path.split('.');
        let root = parts.next().unwrap_or_default();
        if !self.schema.has_object(root) {
            return UNKNOWN.to_string();
        }

        let properties: Vec<&str> = parts.collect();
        match self.resolve(root, &properties) {
            Resolution::Type(raw) => self.normalize(&raw),
            Resolution::UnknownProperty { .. } => UNKNOWN.to_string(),
        }
    }

    /// Walk `properties` starting from the raw type `base`.
    pub fn resolve(&self, base: &str, properties: &[&str]) -> Resolution {
        let mut current = base.to_string();

        for property in properties {
            if current == ANY || current == "object" || current == UNKNOWN {
                return Resolution::Type(ANY.to_string());
            }

            let next = if let Some(element) = element_type(&current) {
                match *property {
                    "first" | "last" => Some(element.to_string()),
                    "size" => Some("number".to_string()),
                    _ => None,
                }
            } else if self.schema.has_object(&current) {
                self.schema
                    .property_type(&current, property)
                    .map(str::to_string)
                    .or_else(|| (*property == "size").then(|| "number".to_string()))
            } else if current == "string" && *property == "size" {
                Some("number".to_string())
            } else {
                None
            };

            match next {
                Some(ty) => current = ty,
                None => {
                    return Resolution::UnknownProperty {
                        object: current,
                        property: property.to_string(),
                    }
                }
            }
        }

        Resolution::Type(current)
    }

    /// `array<T>` → `array`, schema object names → `object`.
    pub fn normalize(&self, raw: &str) -> String {
        if raw == "array" || element_type(raw).is_some() {
            "array".to_string()
        } else if self.schema.has_object(raw) {
            "object".to_string()
        } else {
            raw.to_string()
        }
    }

    /// Whether `filter` accepts `input_type`.
    ///
    /// Unknown filters are invalid. A declared or supplied type of `any`
    /// always passes; otherwise the types must match exactly or the input must
    /// specialize the declared type (`array<string>` satisfies `array`).
    pub fn check_filter_type(&self, filter: &str, input_type: &str) -> FilterTypeCheck {
        let Some(definition) = self.definitions.filter(filter) else {
            return FilterTypeCheck {
                valid: false,
                expected_type: None,
            };
        };

        let declared = definition.input_type.as_str();
        let valid = declared == ANY
            || input_type == ANY
            || input_type == declared
            || input_type
                .strip_prefix(declared)
                .is_some_and(|rest| rest.starts_with('<'));

        FilterTypeCheck {
            valid,
            expected_type: Some(declared.to_string()),
        }
    }

    /// Declared output type of `filter`, `any` for unknown filters.
    pub fn get_filter_output_type(&self, filter: &str) -> String {
        self.definitions
            .filter(filter)
            .map_or_else(|| ANY.to_string(), |f| f.output_type.clone())
    }

    /// Type after applying `filters` in order to a value of type `input`.
    pub fn filter_chain_type<'f>(&self, input: &str, filters: impl IntoIterator<Item = &'f str>) -> String {
        filters
            .into_iter()
            .fold(input.to_string(), |_, filter| self.get_filter_output_type(filter))
    }

    /// Type a filter sees for a raw value type: objects are `object`,
    /// arrays keep their element type.
    pub fn filter_input_type(&self, raw: &str) -> String {
        if self.schema.has_object(raw) {
            "object".to_string()
        } else if raw == UNKNOWN {
            ANY.to_string()
        } else {
            raw.to_string()
        }
    }
}

/// `T` for `array<T>`, `any` for a bare `array`.
pub fn element_type(raw: &str) -> Option<&str> {
    if raw == "array" {
        return Some(ANY);
    }
    raw.strip_prefix("array<")?.strip_suffix('>')
}
