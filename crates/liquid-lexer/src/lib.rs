//! Liquid Lexer
//!
//! Splits Liquid template source into text, output (`{{ }}`) and tag (`{% %}`)
//! segments. Handles whitespace-trim markers, quoted strings inside delimiters,
//! and the raw-content tags (`raw`, `comment`, `schema`, `style`, `javascript`,
//! `stylesheet`) whose bodies are never scanned for Liquid markup.
//!
//! # Example
//!
//! ```
//! use liquid_lexer::{Scanner, SegmentKind};
//!
//! let segments = Scanner::scan("Hello {{ name }}");
//! assert_eq!(segments.len(), 2);
//! assert_eq!(segments[1].kind, SegmentKind::Output);
//! ```

pub mod location;
pub mod scanner;
pub mod segment;

pub use location::{LineIndex, SourceLocation};
pub use scanner::Scanner;
pub use segment::{is_raw_content_tag, Segment, SegmentKind, RAW_CONTENT_TAGS};
