//! Template validation.
//!
//! Three passes that can run on their own ([`Validator::validate_syntax`],
//! [`Validator::validate_semantics`], [`Validator::validate_security`]) and an
//! orchestrating [`Validator::validate`] that partitions their diagnostics.
//! Only `error` diagnostics make a template invalid.

mod security;
mod semantic;
mod syntax;

use crate::definitions::{CustomDefinitions, DefinitionProvider, Definitions};
use crate::schema::Schema;
use crate::types::TypeChecker;
use liquid_lexer::SourceLocation;
use serde::Serialize;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Largest template accepted by default (1 MiB).
pub const DEFAULT_MAX_INPUT_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticKind {
    Syntax,
    Semantic,
    Security,
}

impl DiagnosticKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticKind::Syntax => "syntax",
            DiagnosticKind::Semantic => "semantic",
            DiagnosticKind::Security => "security",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{severity} ({kind}) at line {line}, column {column}: {message}")]
pub struct ValidationError {
    #[serde(rename = "type")]
    pub kind: DiagnosticKind,
    pub line: usize,
    pub column: usize,
    pub message: String,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ValidationError {
    pub fn new(
        kind: DiagnosticKind,
        severity: Severity,
        loc: SourceLocation,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            line: loc.line,
            column: loc.column,
            message: message.into(),
            severity,
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: Option<String>) -> Self {
        self.suggestion = suggestion;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    /// Warnings and informational notices.
    pub warnings: Vec<ValidationError>,
}

impl ValidationResult {
    /// Partition diagnostics by severity.
    pub fn from_diagnostics(diagnostics: Vec<ValidationError>) -> Self {
        let (errors, warnings): (Vec<_>, Vec<_>) = diagnostics
            .into_iter()
            .partition(|d| d.severity == Severity::Error);
        Self {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatorOptions {
    /// Inputs longer than this (in bytes) are rejected without analysis.
    pub max_input_bytes: usize,
    /// Run the AST-based type pass after the name pass.
    pub semantic_ast_pass: bool,
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        Self {
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
            semantic_ast_pass: true,
        }
    }
}

/// Liquid template validator.
///
/// Holds the schema and definition tables plus an optional provider of
/// per-project custom definitions. Every call is independent, so one
/// validator can serve concurrent callers.
pub struct Validator {
    options: ValidatorOptions,
    schema: Cow<'static, Schema>,
    definitions: Cow<'static, Definitions>,
    custom: CustomDefinitions,
    provider: Option<Arc<dyn DefinitionProvider>>,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator {
    /// Validator over the embedded schema and definitions.
    pub fn new() -> Self {
        Self {
            options: ValidatorOptions::default(),
            schema: Cow::Borrowed(Schema::standard()),
            definitions: Cow::Borrowed(Definitions::standard()),
            custom: CustomDefinitions::default(),
            provider: None,
        }
    }

    pub fn with_options(mut self, options: ValidatorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Cow::Owned(schema);
        self
    }

    pub fn with_definitions(mut self, definitions: Definitions) -> Self {
        self.definitions = Cow::Owned(definitions);
        self
    }

    /// Custom names accepted on every call, in addition to any looked up.
    pub fn with_custom(mut self, custom: CustomDefinitions) -> Self {
        self.custom = custom;
        self
    }

    pub fn with_provider(mut self, provider: Arc<dyn DefinitionProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn options(&self) -> &ValidatorOptions {
        &self.options
    }

    pub fn type_checker(&self) -> TypeChecker<'_> {
        TypeChecker::new(&self.schema, &self.definitions)
    }

    /// Block structure and tag names.
    pub fn validate_syntax(&self, source: &str, custom: &CustomDefinitions) -> Vec<ValidationError> {
        let custom = self.merged_custom(custom);
        syntax::check(source, &self.definitions, &custom)
    }

    /// Variable and filter names, then (optionally) types over the AST.
    pub fn validate_semantics(&self, source: &str, custom: &CustomDefinitions) -> Vec<ValidationError> {
        let custom = self.merged_custom(custom);
        let types = self.type_checker();

        let names = semantic::check_names(source, &types, &self.definitions, &custom);
        if !self.options.semantic_ast_pass {
            return names;
        }

        let typed = semantic::check_ast(source, &types);
        semantic::merge(names, typed)
    }

    /// Unescaped sensitive output and raw blocks.
    pub fn validate_security(&self, source: &str) -> Vec<ValidationError> {
        security::check(source)
    }

    /// Run all passes with the given custom definitions.
    pub fn validate_with(&self, source: &str, custom: &CustomDefinitions) -> ValidationResult {
        if source.len() > self.options.max_input_bytes {
            tracing::warn!(
                bytes = source.len(),
                limit = self.options.max_input_bytes,
                "template exceeds maximum size"
            );
            return ValidationResult::from_diagnostics(vec![ValidationError::new(
                DiagnosticKind::Syntax,
                Severity::Error,
                SourceLocation::new(1, 1, 0, 0),
                format!(
                    "Template exceeds maximum size of {} bytes ({} bytes)",
                    self.options.max_input_bytes,
                    source.len()
                ),
            )]);
        }

        let mut diagnostics = self.validate_syntax(source, custom);
        diagnostics.extend(self.validate_semantics(source, custom));
        diagnostics.extend(self.validate_security(source));

        let result = ValidationResult::from_diagnostics(diagnostics);
        tracing::debug!(
            errors = result.errors.len(),
            warnings = result.warnings.len(),
            "validated template"
        );
        result
    }

    /// Run all passes, first fetching custom definitions for `project_id`
    /// when a provider is configured. A failed lookup falls back to the
    /// standard definitions.
    pub async fn validate(&self, source: &str, project_id: Option<&str>) -> ValidationResult {
        let custom = match (&self.provider, project_id) {
            (Some(provider), Some(project_id)) => {
                match provider.custom_definitions(project_id).await {
                    Ok(custom) => custom,
                    Err(e) => {
                        tracing::warn!(
                            project_id,
                            error = %e,
                            "custom definition lookup failed, using standard definitions"
                        );
                        CustomDefinitions::default()
                    }
                }
            }
            _ => CustomDefinitions::default(),
        };

        self.validate_with(source, &custom)
    }

    fn merged_custom<'c>(&'c self, custom: &'c CustomDefinitions) -> Cow<'c, CustomDefinitions> {
        if self.custom.is_empty() {
            return Cow::Borrowed(custom);
        }
        let mut merged = self.custom.clone();
        merged.tags.extend(custom.tags.iter().cloned());
        merged.filters.extend(custom.filters.iter().cloned());
        merged.objects.extend(custom.objects.iter().cloned());
        Cow::Owned(merged)
    }
}
