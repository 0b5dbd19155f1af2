//! Syntax pass: block nesting and tag names.
//!
//! One forward scan over the segments with a stack of open blocks.
//! Intermediate tags are transparent. A closer that does not match the top of
//! the stack is reported and still pops it.

use super::{DiagnosticKind, Severity, ValidationError};
use crate::definitions::{CustomDefinitions, Definitions};
use crate::suggest::did_you_mean;
use liquid_lexer::{is_raw_content_tag, LineIndex, Scanner, Segment, SegmentKind};
use liquid_parser::parser::INTERMEDIATE_TAGS;
use std::collections::BTreeSet;

pub(super) fn check(
    source: &str,
    definitions: &Definitions,
    custom: &CustomDefinitions,
) -> Vec<ValidationError> {
    let segments = Scanner::scan(source);
    let index = LineIndex::new(source);
    let error = |segment: &Segment, message: String| {
        ValidationError::new(
            DiagnosticKind::Syntax,
            Severity::Error,
            index.location(segment.offset, segment.raw.len()),
            message,
        )
    };

    let mut diagnostics = Vec::new();
    let mut stack: Vec<(&str, &Segment)> = Vec::new();
    let mut in_raw_body = false;

    for segment in &segments {
        let after_raw_opener = std::mem::take(&mut in_raw_body);

        match segment.kind {
            SegmentKind::Output => {}
            SegmentKind::Text => {
                if after_raw_opener {
                    continue;
                }
                if segment.raw.starts_with("{{") {
                    diagnostics.push(error(segment, "Unterminated output: missing '}}'".into()));
                } else if segment.raw.starts_with("{%") {
                    diagnostics.push(error(segment, "Unterminated tag: missing '%}'".into()));
                }
            }
            SegmentKind::Tag => {
                let Some(name) = segment.tag_name() else {
                    diagnostics.push(error(segment, "Empty tag".into()));
                    continue;
                };
                in_raw_body = is_raw_content_tag(name);

                if name == "#" {
                    continue;
                }

                if definitions.requires_closing(name) {
                    stack.push((name, segment));
                    continue;
                }

                if let Some(block) = name
                    .strip_prefix("end")
                    .filter(|block| definitions.requires_closing(block))
                {
                    match stack.last() {
                        None => diagnostics.push(error(
                            segment,
                            format!("Unexpected closing tag '{{% {name} %}}' with no open block"),
                        )),
                        Some((open, _)) if *open == block => {
                            stack.pop();
                        }
                        Some((open, _)) => {
                            diagnostics.push(error(
                                segment,
                                format!(
                                    "Mismatched tag: expected '{{% end{open} %}}' but found '{{% {name} %}}'"
                                ),
                            ));
                            stack.pop();
                        }
                    }
                    continue;
                }

                let known = INTERMEDIATE_TAGS.contains(&name)
                    || definitions.tag(name).is_some()
                    || custom.has_tag(name)
                    || name.strip_prefix("end").is_some_and(|b| custom.has_tag(b));
                if !known {
                    let candidates: BTreeSet<&str> = definitions
                        .tags
                        .keys()
                        .map(String::as_str)
                        .chain(custom.tags.iter().map(String::as_str))
                        .chain(INTERMEDIATE_TAGS.iter().copied())
                        .collect();
                    diagnostics.push(
                        ValidationError::new(
                            DiagnosticKind::Syntax,
                            Severity::Warning,
                            index.location(segment.offset, segment.raw.len()),
                            format!("Unknown tag '{name}'"),
                        )
                        .with_suggestion(did_you_mean(name, candidates)),
                    );
                }
            }
        }
    }

    for (name, segment) in stack {
        diagnostics.push(error(
            segment,
            format!("Unclosed tag '{{% {name} %}}': missing '{{% end{name} %}}'"),
        ));
    }

    tracing::debug!(diagnostics = diagnostics.len(), "syntax pass");
    diagnostics
}
