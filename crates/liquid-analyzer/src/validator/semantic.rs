//! Semantic pass: names, then types.
//!
//! The name pass is a fast text scan: names bound anywhere by `assign`,
//! `capture`, `for` and friends are collected with regexes, and every output
//! is checked against them plus the schema, the builtin globals and the
//! caller's custom names. The AST pass walks the parsed template with a
//! [`ScopeTracker`] and reports unknown properties, filter type mismatches and
//! invalid `schema` JSON.

use super::{DiagnosticKind, Severity, ValidationError};
use crate::definitions::{CustomDefinitions, Definitions};
use crate::scope::ScopeTracker;
use crate::suggest::did_you_mean;
use crate::types::{Resolution, TypeChecker, ANY};
use liquid_lexer::{LineIndex, Scanner, SegmentKind, SourceLocation};
use liquid_parser::expr_parser::ExprParser;
use liquid_parser::{parse, ExprKind, Expression, FilterApplication, Lookup, Node};
use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use std::sync::LazyLock;

/// Globals Shopify provides that the schema does not describe.
pub const BUILTIN_GLOBALS: &[&str] = &[
    "additional_checkout_buttons",
    "all_country_option_tags",
    "all_products",
    "articles",
    "blogs",
    "canonical_url",
    "checkout",
    "collections",
    "content_for_additional_checkout_buttons",
    "content_for_header",
    "content_for_index",
    "content_for_layout",
    "country_option_tags",
    "current_page",
    "current_tags",
    "forloop",
    "handle",
    "images",
    "linklists",
    "page_description",
    "page_image",
    "page_title",
    "pages",
    "powered_by_link",
    "predictive_search",
    "recommendations",
    "scripts",
    "tablerowloop",
    "template",
    "theme",
];

static BOUND_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{%-?\s*(?:assign|capture|increment|decrement)\s+['"]?([A-Za-z_][\w-]*)"#)
        .expect("bound name pattern is valid")
});

static LOOP_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{%-?\s*(?:for|tablerow)\s+([A-Za-z_][\w-]*)\s+in\b")
        .expect("loop name pattern is valid")
});

static PARTIAL_ALIAS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{%-?\s*(?:render|include)\s[^%]*?\bas\s+([A-Za-z_][\w-]*)")
        .expect("partial alias pattern is valid")
});

/// Every name the template binds, wherever it appears.
fn bound_names(source: &str) -> BTreeSet<&str> {
    [&*BOUND_NAME, &*LOOP_NAME, &*PARTIAL_ALIAS]
        .into_iter()
        .flat_map(|re| re.captures_iter(source))
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .collect()
}

pub(super) fn check_names(
    source: &str,
    types: &TypeChecker<'_>,
    definitions: &Definitions,
    custom: &CustomDefinitions,
) -> Vec<ValidationError> {
    let index = LineIndex::new(source);

    let known_variables: BTreeSet<&str> = types
        .schema()
        .object_names()
        .chain(bound_names(source))
        .chain(BUILTIN_GLOBALS.iter().copied())
        .chain(custom.objects.iter().map(String::as_str))
        .collect();
    let known_filters: BTreeSet<&str> = definitions
        .filters
        .keys()
        .map(String::as_str)
        .chain(custom.filters.iter().map(String::as_str))
        .collect();

    let mut diagnostics = Vec::new();

    for segment in Scanner::scan(source) {
        let (markup, offset) = match segment.kind {
            SegmentKind::Output => (segment.content.as_str(), segment.content_offset),
            SegmentKind::Tag if segment.tag_name() == Some("echo") => {
                (segment.markup(), segment.markup_offset())
            }
            _ => continue,
        };

        let (expression, filters) = ExprParser::new(markup, offset, &index).parse_output();

        if let Some(root) = expression.root_name() {
            if !known_variables.contains(root) {
                diagnostics.push(
                    warning(expression.loc, format!("Unknown variable '{root}'"))
                        .with_suggestion(did_you_mean(root, known_variables.iter().copied())),
                );
            }
        }

        for filter in &filters {
            if !known_filters.contains(filter.name.as_str()) {
                diagnostics.push(
                    warning(filter.loc, format!("Unknown filter '{}'", filter.name))
                        .with_suggestion(did_you_mean(&filter.name, known_filters.iter().copied())),
                );
            }
        }
    }

    tracing::debug!(diagnostics = diagnostics.len(), "semantic name pass");
    diagnostics
}

pub(super) fn check_ast(source: &str, types: &TypeChecker<'_>) -> Vec<ValidationError> {
    let result = parse(source);
    let mut diagnostics = Vec::new();
    let mut scope = ScopeTracker::with_types(*types);

    scope.build_from_ast_with(&result.ast, &mut |node, scope| {
        let mut checker = AstChecker {
            types,
            scope,
            diagnostics: &mut diagnostics,
        };
        checker.check_node(node);
    });

    tracing::debug!(diagnostics = diagnostics.len(), "semantic type pass");
    diagnostics
}

/// Merge the name and type passes, dropping repeats of the same message on
/// the same line.
pub(super) fn merge(
    names: Vec<ValidationError>,
    typed: Vec<ValidationError>,
) -> Vec<ValidationError> {
    let mut seen = HashSet::new();
    names
        .into_iter()
        .chain(typed)
        .filter(|d| seen.insert((d.line, d.message.clone())))
        .collect()
}

fn warning(loc: SourceLocation, message: String) -> ValidationError {
    ValidationError::new(DiagnosticKind::Semantic, Severity::Warning, loc, message)
}

/// Per-node checks, run with the scope in force at that node.
struct AstChecker<'c, 't> {
    types: &'c TypeChecker<'t>,
    scope: &'c ScopeTracker<'t>,
    diagnostics: &'c mut Vec<ValidationError>,
}

impl AstChecker<'_, '_> {
    fn check_node(&mut self, node: &Node) {
        match node {
            Node::Output(n) | Node::Echo(n) => self.check_filtered(&n.expression, &n.filters),
            Node::Assign(n) => self.check_filtered(&n.value, &n.filters),
            Node::If(n) | Node::Unless(n) => {
                for condition in n.branches.iter().filter_map(|b| b.condition.as_ref()) {
                    self.check_lookups(condition);
                }
            }
            Node::For(n) => self.check_lookups(&n.collection),
            Node::TableRow(n) => self.check_lookups(&n.collection),
            Node::Paginate(n) => self.check_lookups(&n.collection),
            Node::Case(n) => self.check_lookups(&n.subject),
            Node::Schema(n) => {
                if let Err(e) = serde_json::from_str::<serde_json::Value>(&n.content) {
                    self.diagnostics.push(ValidationError::new(
                        DiagnosticKind::Semantic,
                        Severity::Error,
                        n.loc,
                        format!("Invalid JSON in schema: {e}"),
                    ));
                }
            }
            _ => {}
        }
    }

    /// Property checks on the value and filter arguments, then filter types
    /// along the chain.
    fn check_filtered(&mut self, value: &Expression, filters: &[FilterApplication]) {
        self.check_lookups(value);
        for filter in filters {
            for arg in &filter.args {
                self.check_lookups(arg);
            }
            for arg in &filter.keyword_args {
                self.check_lookups(&arg.value);
            }
        }

        let mut input = self.value_type(value);
        for filter in filters {
            let check = self.types.check_filter_type(&filter.name, &input);
            if let (false, Some(expected)) = (check.valid, &check.expected_type) {
                self.diagnostics.push(warning(
                    filter.loc,
                    format!(
                        "Type mismatch: filter '{}' expects {expected} but receives {input}",
                        filter.name
                    ),
                ));
            }
            input = self.types.get_filter_output_type(&filter.name);
        }
    }

    /// Type a filter sees for `value`.
    fn value_type(&self, value: &Expression) -> String {
        match &value.kind {
            ExprKind::String { .. } => "string".into(),
            ExprKind::Number { .. } => "number".into(),
            ExprKind::Boolean { .. } | ExprKind::Binary { .. } => "boolean".into(),
            ExprKind::Range { .. } => "array".into(),
            ExprKind::Nil => ANY.into(),
            ExprKind::Variable { .. } => self
                .scope
                .lookup_type(value)
                .map_or_else(|| ANY.into(), |raw| self.types.filter_input_type(&raw)),
        }
    }

    /// Report unknown properties on every lookup inside `expr`.
    fn check_lookups(&mut self, expr: &Expression) {
        match &expr.kind {
            ExprKind::Variable { name, lookups } => {
                for lookup in lookups {
                    if let Lookup::Index(inner) = lookup {
                        self.check_lookups(inner);
                    }
                }
                self.check_property_chain(expr, name, lookups);
            }
            ExprKind::Range { start, end } => {
                self.check_lookups(start);
                self.check_lookups(end);
            }
            ExprKind::Binary { left, right, .. } => {
                self.check_lookups(left);
                self.check_lookups(right);
            }
            ExprKind::String { .. }
            | ExprKind::Number { .. }
            | ExprKind::Boolean { .. }
            | ExprKind::Nil => {}
        }
    }

    fn check_property_chain(&mut self, expr: &Expression, root: &str, lookups: &[Lookup]) {
        let schema = self.types.schema();
        let base = match self.scope.get_variable(root) {
            Some(variable) => variable.ty.clone(),
            None if schema.has_object(root) => root.to_string(),
            None => return,
        };

        // Only the literal prefix of the chain can be checked
        let properties: Vec<&str> = lookups
            .iter()
            .map_while(|lookup| match lookup {
                Lookup::Property(p) => Some(p.as_str()),
                Lookup::Index(_) => None,
            })
            .collect();

        if let Resolution::UnknownProperty { object, property } =
            self.types.resolve(&base, &properties)
        {
            if schema.has_object(&object) {
                self.diagnostics.push(
                    warning(
                        expr.loc,
                        format!("Unknown property '{property}' on '{object}'"),
                    )
                    .with_suggestion(did_you_mean(&property, schema.property_names(&object))),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(source: &str, custom: &CustomDefinitions) -> Vec<ValidationError> {
        check_names(source, &TypeChecker::standard(), Definitions::standard(), custom)
    }

    fn typed(source: &str) -> Vec<ValidationError> {
        check_ast(source, &TypeChecker::standard())
    }

    fn no_custom() -> CustomDefinitions {
        CustomDefinitions::default()
    }

    // =========================================================================
    // Name pass
    // =========================================================================

    #[test]
    fn test_unknown_variable_suggestion() {
        let diagnostics = names("{{ prodcut.title }}", &no_custom());
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].message, "Unknown variable 'prodcut'");
        assert_eq!(diagnostics[0].severity, Severity::Warning);
        assert!(diagnostics[0].suggestion.as_deref().unwrap().contains("product"));
        assert_eq!(diagnostics[0].column, 4);
    }

    #[test]
    fn test_unknown_filter_suggestion() {
        let diagnostics = names("{{ product.title | upcasee }}", &no_custom());
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].message, "Unknown filter 'upcasee'");
        assert!(diagnostics[0].suggestion.as_deref().unwrap().contains("upcase"));
    }

    #[test]
    fn test_custom_filter_suppresses_warning() {
        let custom = CustomDefinitions {
            filters: vec!["my_filter".into()],
            ..CustomDefinitions::default()
        };
        assert_eq!(names("{{ product.title | my_filter }}", &no_custom()).len(), 1);
        assert!(names("{{ product.title | my_filter }}", &custom).is_empty());
    }

    #[test]
    fn test_bound_names_are_known() {
        let source = "{% assign total = 1 %}{% capture 'note' %}x{% endcapture %}\
                      {% for item in cart.items %}{{ item.title }}{% endfor %}\
                      {% render 'card' for products as card %}\
                      {{ total }}{{ note }}{{ card }}{% increment counter %}{{ counter }}";
        assert!(names(source, &no_custom()).is_empty());
    }

    #[test]
    fn test_builtins_and_literals_are_known() {
        assert!(names(
            "{{ content_for_header }}{{ settings.logo }}{{ 'text' | upcase }}{{ 5 }}",
            &no_custom()
        )
        .is_empty());
    }

    #[test]
    fn test_echo_is_checked() {
        let diagnostics = names("{% echo mystery | upcase %}", &no_custom());
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].message, "Unknown variable 'mystery'");
    }

    #[test]
    fn test_no_suggestion_when_nothing_close() {
        let diagnostics = names("{{ zzzzzzzzzz }}", &no_custom());
        assert_eq!(diagnostics[0].suggestion, None);
    }

    // =========================================================================
    // AST pass
    // =========================================================================

    #[test]
    fn test_filter_type_mismatch() {
        let diagnostics = typed("{{ product.title | plus: 1 }}");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].message,
            "Type mismatch: filter 'plus' expects number but receives string"
        );
    }

    #[test]
    fn test_range_is_an_array() {
        assert!(typed("{{ (1..3) | join: ',' }}").is_empty());
        let diagnostics = typed("{% assign r = (1..3) %}{{ r | upcase }}");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].message,
            "Type mismatch: filter 'upcase' expects string but receives array"
        );
    }

    #[test]
    fn test_filter_chain_propagates_type() {
        assert!(typed("{{ product.title | size | plus: 1 }}").is_empty());
        assert_eq!(typed("{{ product.price | money | minus: 1 }}").len(), 1);
    }

    #[test]
    fn test_specialized_array_satisfies_filter() {
        assert!(typed("{{ product.tags | join: ', ' }}").is_empty());
    }

    #[test]
    fn test_loop_variable_typed_from_collection() {
        let diagnostics = typed("{% for v in product.variants %}{{ v.price | upcase }}{% endfor %}");
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("expects string but receives number"));
    }

    #[test]
    fn test_unknown_property_suggestion() {
        let diagnostics = typed("{{ product.titel }}");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].message, "Unknown property 'titel' on 'product'");
        assert_eq!(diagnostics[0].suggestion.as_deref(), Some("Did you mean 'title'?"));
    }

    #[test]
    fn test_unknown_property_in_condition() {
        let diagnostics = typed("{% if customer.emial %}x{% endif %}");
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("'emial' on 'customer'"));
    }

    #[test]
    fn test_unknown_roots_left_to_name_pass() {
        assert!(typed("{{ mystery.anything | upcase }}").is_empty());
    }

    #[test]
    fn test_invalid_schema_json() {
        let diagnostics = typed("{% schema %}{ \"name\": }{% endschema %}");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, Severity::Error);
        assert!(diagnostics[0].message.starts_with("Invalid JSON in schema"));

        assert!(typed("{% schema %}{\"name\": \"Header\"}{% endschema %}").is_empty());
    }

    // =========================================================================
    // Merge
    // =========================================================================

    #[test]
    fn test_merge_dedupes_by_line_and_message() {
        let loc = |line, column| SourceLocation::new(line, column, 0, 1);
        let a = warning(loc(1, 1), "Unknown variable 'x'".into());
        let same_line_other_column = warning(loc(1, 9), "Unknown variable 'x'".into());
        let other_line = warning(loc(2, 1), "Unknown variable 'x'".into());

        let merged = merge(vec![a.clone()], vec![same_line_other_column, other_line.clone()]);
        assert_eq!(merged, vec![a, other_line]);
    }
}
