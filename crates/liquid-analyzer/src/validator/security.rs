//! Security pass: unescaped sensitive output and raw blocks.

use super::{DiagnosticKind, Severity, ValidationError};
use liquid_lexer::{LineIndex, Scanner, SegmentKind};
use liquid_parser::expr_parser::ExprParser;
use liquid_parser::{expression_to_string, Expression, ExprKind};

/// Objects whose every property may carry user-controlled text.
const SENSITIVE_OBJECTS: &[&str] = &["request", "form"];

/// Objects whose properties (but not the object itself) are sensitive.
const SENSITIVE_PROPERTY_OBJECTS: &[&str] = &["customer"];

const ESCAPE_FILTERS: &[&str] = &["escape", "escape_once"];

pub(super) fn check(source: &str) -> Vec<ValidationError> {
    let index = LineIndex::new(source);
    let mut diagnostics = Vec::new();

    for segment in Scanner::scan(source) {
        match segment.kind {
            SegmentKind::Output => {
                let (expression, filters) =
                    ExprParser::new(&segment.content, segment.content_offset, &index).parse_output();

                let escaped = filters
                    .iter()
                    .any(|f| ESCAPE_FILTERS.contains(&f.name.as_str()));
                if is_sensitive(&expression) && !escaped {
                    let path = expression_to_string(&expression);
                    diagnostics.push(
                        ValidationError::new(
                            DiagnosticKind::Security,
                            Severity::Warning,
                            index.location(segment.offset, segment.raw.len()),
                            format!("Potential XSS: '{path}' is output without escaping"),
                        )
                        .with_suggestion(Some(format!("Use {{{{ {path} | escape }}}}"))),
                    );
                }
            }
            SegmentKind::Tag if segment.tag_name() == Some("raw") => {
                diagnostics.push(ValidationError::new(
                    DiagnosticKind::Security,
                    Severity::Info,
                    index.location(segment.offset, segment.raw.len()),
                    "Raw block content is output verbatim; make sure it contains no untrusted data",
                ));
            }
            _ => {}
        }
    }

    tracing::debug!(diagnostics = diagnostics.len(), "security pass");
    diagnostics
}

fn is_sensitive(expression: &Expression) -> bool {
    let ExprKind::Variable { name, lookups } = &expression.kind else {
        return false;
    };
    SENSITIVE_OBJECTS.contains(&name.as_str())
        || (SENSITIVE_PROPERTY_OBJECTS.contains(&name.as_str()) && !lookups.is_empty())
}
