//! Liquid Analyzer
//!
//! Static analysis for Shopify-flavoured Liquid templates: lexical scope
//! tracking, schema-driven type inference and a three-pass validator
//! (syntax, semantics, security).
//!
//! The Shopify object schema and the tag/filter definition tables are
//! embedded at build time and can be replaced per validator.
//!
//! ```
//! use liquid_analyzer::{Severity, Validator};
//!
//! let result = Validator::new()
//!     .validate_with("{% if product %}{{ product.titel }}{% endif %}", &Default::default());
//! assert!(result.valid);
//! assert_eq!(result.warnings[0].severity, Severity::Warning);
//! assert_eq!(result.warnings[0].suggestion.as_deref(), Some("Did you mean 'title'?"));
//! ```

pub mod definitions;
pub mod schema;
pub mod scope;
pub mod suggest;
pub mod types;
pub mod validator;

pub use definitions::{
    CustomDefinitions, DefinitionProvider, Definitions, FilterDefinition, LookupError,
    StaticDefinitionProvider, TagDefinition,
};
pub use schema::{Schema, SchemaError};
pub use scope::{ScopeTracker, ScopedVariable};
pub use types::TypeChecker;
pub use validator::{
    DiagnosticKind, Severity, ValidationError, ValidationResult, Validator, ValidatorOptions,
};
