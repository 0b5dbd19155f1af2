//! Expression parser for Liquid.
//!
//! Parses expression token streams (from `expr_lexer`) into `Expression` AST
//! nodes and filter chains. Recursive descent with three levels:
//!
//! ```text
//! condition  := comparison (("and" | "or") comparison)*      flat, left to right
//! comparison := primary (compare_op primary)?                 no chaining
//! primary    := string | number | true | false | nil | range | variable
//! variable   := identifier ("." identifier | "[" condition "]")*
//! filters    := ("|" identifier (":" argument ("," argument)*)?)*
//! ```
//!
//! `and` and `or` share one precedence level: `a and b or c` is `(a and b) or c`.
//! A primary that cannot be parsed becomes a nil literal spanning the offending
//! token, and an error is recorded, so the rest of the markup stays parseable.

use crate::ast::{
    BinaryOperator, ExprKind, Expression, FilterApplication, KeywordArgument, Lookup,
};
use crate::expr_lexer::{ExprLexer, Token, TokenKind, TokenValue};
use crate::ParseError;
use liquid_lexer::LineIndex;

/// Deepest `[...]` / `(...)` nesting parsed; deeper groups become nil.
pub const MAX_EXPRESSION_DEPTH: usize = 64;

/// Liquid expression parser.
///
/// Converts the token stream of one markup string into expression trees.
/// The tag parser also drives it token by token for tag heads
/// (`item in collection limit: 4`, `'snippet' with product as p`).
pub struct ExprParser<'i, 'src> {
    tokens: Vec<Token>,
    pos: usize,
    index: &'i LineIndex<'src>,
    errors: Vec<ParseError>,
    depth: usize,
}

impl<'i, 'src> ExprParser<'i, 'src> {
    /// Create a parser for `markup`, which starts at byte `base` of the template.
    pub fn new(markup: &str, base: usize, index: &'i LineIndex<'src>) -> Self {
        Self {
            tokens: ExprLexer::tokenize(markup, base),
            pos: 0,
            index,
            errors: Vec::new(),
            depth: 0,
        }
    }

    /// Parse a complete `{{ }}` body: an expression plus its filter chain.
    pub fn parse_output(&mut self) -> (Expression, Vec<FilterApplication>) {
        let expression = self.parse_condition();
        let filters = self.parse_filter_chain();
        self.expect_end();
        (expression, filters)
    }

    /// Errors recorded so far.
    pub fn into_errors(self) -> Vec<ParseError> {
        self.errors
    }

    // =========================================================================
    // Grammar
    // =========================================================================

    /// `and`/`or` chain, flat and left-associative.
    pub fn parse_condition(&mut self) -> Expression {
        let mut left = self.parse_comparison();

        while let Some(op) = self.peek_operator().filter(|op| op.is_logical()) {
            self.advance();
            let right = self.parse_comparison();
            left = self.binary(left, op, right);
        }

        left
    }

    /// At most one comparison between two primaries.
    pub fn parse_comparison(&mut self) -> Expression {
        let left = self.parse_primary();

        match self.peek_operator().filter(|op| !op.is_logical()) {
            Some(op) => {
                self.advance();
                let right = self.parse_primary();
                self.binary(left, op, right)
            }
            None => left,
        }
    }

    /// Literal, range, or variable lookup.
    pub fn parse_primary(&mut self) -> Expression {
        let token = self.peek().clone();

        match token.kind {
            TokenKind::String => {
                self.advance();
                let value = match token.value {
                    TokenValue::String(s) => s,
                    _ => String::new(),
                };
                self.expr(ExprKind::String { value }, token.start, token.end)
            }
            TokenKind::Number => {
                self.advance();
                let value = match token.value {
                    TokenValue::Number(n) => n,
                    _ => 0.0,
                };
                self.expr(ExprKind::Number { value }, token.start, token.end)
            }
            TokenKind::Identifier => match token.identifier() {
                Some("true") | Some("false") => {
                    self.advance();
                    let value = token.is_word("true");
                    self.expr(ExprKind::Boolean { value }, token.start, token.end)
                }
                Some("nil") | Some("null") | Some("blank") | Some("empty") => {
                    self.advance();
                    self.expr(ExprKind::Nil, token.start, token.end)
                }
                _ => self.parse_variable(),
            },
            TokenKind::LParen => self.parse_range(),
            TokenKind::Eof => {
                self.error_at("Expected expression".into(), token.start, token.end);
                self.expr(ExprKind::Nil, token.start, token.end)
            }
            _ => {
                self.advance();
                let lexeme = self.lexeme(&token).to_string();
                self.error_at(
                    format!("Unexpected '{lexeme}' in expression"),
                    token.start,
                    token.end,
                );
                self.expr(ExprKind::Nil, token.start, token.end)
            }
        }
    }

    /// Identifier followed by `.prop` and `[expr]` accessors.
    pub fn parse_variable(&mut self) -> Expression {
        let first = self.peek().clone();
        let Some(name) = first.identifier().map(str::to_string) else {
            return self.parse_primary();
        };
        self.advance();

        let mut lookups = Vec::new();

        loop {
            match self.peek().kind {
                TokenKind::Dot => {
                    self.advance();
                    let prop = self.peek().clone();
                    match prop.identifier() {
                        Some(p) => {
                            lookups.push(Lookup::Property(p.to_string()));
                            self.advance();
                        }
                        None => {
                            self.error_at(
                                format!("Expected property name after '{name}.'"),
                                prop.start,
                                prop.end,
                            );
                            break;
                        }
                    }
                }
                TokenKind::LBracket => {
                    let open = self.peek().clone();
                    self.advance();
                    if !self.enter_group(&open, TokenKind::RBracket) {
                        let placeholder = self.expr(ExprKind::Nil, open.start, self.prev_end());
                        lookups.push(Lookup::Index(Box::new(placeholder)));
                        continue;
                    }
                    let inner = self.parse_condition();
                    self.depth -= 1;
                    if !self.eat(TokenKind::RBracket) {
                        self.error_at("Expected ']' to close index".into(), open.start, open.end);
                    }
                    lookups.push(Lookup::Index(Box::new(inner)));
                }
                _ => break,
            }
        }

        let end = self.prev_end().max(first.end);
        self.expr(ExprKind::Variable { name, lookups }, first.start, end)
    }

    /// `(start..end)`
    fn parse_range(&mut self) -> Expression {
        let open = self.peek().clone();
        self.advance(); // consume (

        if !self.enter_group(&open, TokenKind::RParen) {
            return self.expr(ExprKind::Nil, open.start, self.prev_end());
        }
        let range = self.parse_range_body(&open);
        self.depth -= 1;
        range
    }

    fn parse_range_body(&mut self, open: &Token) -> Expression {
        let start = self.parse_primary();

        if !self.eat(TokenKind::DotDot) {
            self.error_at("Expected '..' in range".into(), open.start, self.prev_end());
            self.eat(TokenKind::RParen);
            return self.expr(ExprKind::Nil, open.start, self.prev_end());
        }

        let end = self.parse_primary();

        if !self.eat(TokenKind::RParen) {
            self.error_at("Expected ')' to close range".into(), open.start, self.prev_end());
        }

        self.expr(
            ExprKind::Range {
                start: Box::new(start),
                end: Box::new(end),
            },
            open.start,
            self.prev_end(),
        )
    }

    /// Zero or more `| name: arg, key: value` suffixes, in source order.
    pub fn parse_filter_chain(&mut self) -> Vec<FilterApplication> {
        let mut filters = Vec::new();

        while self.eat(TokenKind::Pipe) {
            let name_token = self.peek().clone();
            let Some(name) = name_token.identifier().map(str::to_string) else {
                self.error_at(
                    "Expected filter name after '|'".into(),
                    name_token.start,
                    name_token.end,
                );
                continue;
            };
            self.advance();

            let mut args = Vec::new();
            let mut keyword_args = Vec::new();

            if self.eat(TokenKind::Colon) {
                loop {
                    match self.parse_keyword_argument() {
                        Some(kwarg) => keyword_args.push(kwarg),
                        None => args.push(self.parse_primary()),
                    }
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
            }

            filters.push(FilterApplication {
                name,
                args,
                keyword_args,
                loc: self.index.span(name_token.start, self.prev_end()),
            });
        }

        filters
    }

    /// `name: value`, if the next two tokens are an identifier and a colon.
    pub fn parse_keyword_argument(&mut self) -> Option<KeywordArgument> {
        let name = self.peek().identifier()?.to_string();
        if self.peek_at(1).kind != TokenKind::Colon {
            return None;
        }
        self.advance_n(2);
        let value = self.parse_condition();
        Some(KeywordArgument { name, value })
    }

    /// Comma-separated `name: value` list, with an optional leading comma.
    pub fn parse_keyword_arguments(&mut self) -> Vec<KeywordArgument> {
        let mut arguments = Vec::new();
        self.eat(TokenKind::Comma);

        while !self.is_at_end() {
            match self.parse_keyword_argument() {
                Some(arg) => arguments.push(arg),
                None => break,
            }
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }

        arguments
    }

    /// Record an error for any tokens left before EOF, and skip them.
    pub fn expect_end(&mut self) {
        if self.is_at_end() {
            return;
        }
        let first = self.peek().clone();
        let last_end = self
            .tokens
            .iter()
            .rev()
            .find(|t| t.kind != TokenKind::Eof)
            .map_or(first.end, |t| t.end);
        let lexeme = self.lexeme(&first).to_string();
        self.error_at(format!("Unexpected '{lexeme}' in expression"), first.start, last_end);
        self.pos = self.tokens.len().saturating_sub(1);
    }

    /// Count one more level of nesting after the opener `open` has been
    /// consumed. Past [`MAX_EXPRESSION_DEPTH`] the group is skipped up to its
    /// matching `close` and an error is recorded.
    fn enter_group(&mut self, open: &Token, close: TokenKind) -> bool {
        if self.depth < MAX_EXPRESSION_DEPTH {
            self.depth += 1;
            return true;
        }

        let mut nesting = 1;
        while !self.is_at_end() && nesting > 0 {
            let kind = self.peek().kind;
            if kind == open.kind {
                nesting += 1;
            } else if kind == close {
                nesting -= 1;
            }
            self.advance();
        }
        self.error_at(
            format!("Expression nested deeper than {MAX_EXPRESSION_DEPTH} levels"),
            open.start,
            self.prev_end(),
        );
        false
    }

    // =========================================================================
    // Token navigation helpers
    // =========================================================================

    pub fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    pub fn peek_at(&self, offset: usize) -> &Token {
        // The token list always ends with Eof, and navigation never passes it
        let last = self.tokens.len() - 1;
        &self.tokens[(self.pos + offset).min(last)]
    }

    pub fn advance(&mut self) {
        if !self.is_at_end() {
            self.pos += 1;
        }
    }

    fn advance_n(&mut self, n: usize) {
        for _ in 0..n {
            self.advance();
        }
    }

    pub fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    /// Consume the next token if it has `kind`.
    pub fn eat(&mut self, kind: TokenKind) -> bool {
        if self.peek().kind == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consume the next token if it is the identifier `word`.
    pub fn eat_word(&mut self, word: &str) -> bool {
        if self.peek().is_word(word) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consume an identifier and return its name.
    pub fn eat_identifier(&mut self) -> Option<String> {
        let name = self.peek().identifier()?.to_string();
        self.advance();
        Some(name)
    }

    /// End offset of the last consumed token (or the start of the first).
    pub fn prev_end(&self) -> usize {
        match self.pos {
            0 => self.tokens[0].start,
            n => self.tokens[n - 1].end,
        }
    }

    pub fn error_at(&mut self, message: String, start: usize, end: usize) {
        self.errors.push(ParseError {
            message,
            loc: self.index.span(start, end),
        });
    }

    fn peek_operator(&self) -> Option<BinaryOperator> {
        self.peek().operator().and_then(BinaryOperator::from_lexeme)
    }

    fn lexeme(&self, token: &Token) -> &str {
        self.index.source().get(token.start..token.end).unwrap_or("")
    }

    fn expr(&self, kind: ExprKind, start: usize, end: usize) -> Expression {
        Expression::new(kind, self.index.span(start, end))
    }

    fn binary(&self, left: Expression, operator: BinaryOperator, right: Expression) -> Expression {
        let start = left.loc.offset;
        let end = right.loc.end().max(left.loc.end());
        self.expr(
            ExprKind::Binary {
                left: Box::new(left),
                operator,
                right: Box::new(right),
            },
            start,
            end,
        )
    }
}
