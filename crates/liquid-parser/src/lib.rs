//! Liquid Parser
//!
//! Parses Liquid templates into a location-annotated AST, and prints an AST
//! back to Liquid source.
//!
//! Parsing never aborts: errors are collected alongside the best-effort AST,
//! so a template with a broken tag still yields nodes for everything around it.
//!
//! # Example
//!
//! ```
//! use liquid_parser::{parse, ast_to_string, Node};
//!
//! let result = parse("{% if product.available %}{{ product.title }}{% endif %}");
//! assert!(result.errors.is_empty());
//! assert!(matches!(result.ast[0], Node::If(_)));
//! assert_eq!(
//!     ast_to_string(&result.ast),
//!     "{% if product.available %}{{ product.title }}{% endif %}"
//! );
//! ```

pub mod ast;
pub mod expr_lexer;
pub mod expr_parser;
pub mod parser;
pub mod printer;

pub use ast::*;
pub use parser::TagParser;
pub use printer::{ast_to_string, expression_to_string};

use liquid_lexer::SourceLocation;
use serde::Serialize;
use thiserror::Error;

/// Parse error with source location.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("Parse error at line {}, column {}: {message}", .loc.line, .loc.column)]
pub struct ParseError {
    pub message: String,
    pub loc: SourceLocation,
}

/// AST plus every error recorded while building it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseResult {
    pub ast: Vec<Node>,
    pub errors: Vec<ParseError>,
}

/// Parse Liquid template source.
pub fn parse(source: &str) -> ParseResult {
    TagParser::parse(source)
}
