//! Lexer for Liquid expressions.
//!
//! Tokenizes the markup of a single output or tag (e.g. the content of
//! `{{ product.title | upcase }}`). The lexer never fails: characters it does
//! not recognise are skipped, since it runs on half-typed templates in editors.
//!
//! # Examples
//!
//! ```
//! use liquid_parser::expr_lexer::{ExprLexer, TokenKind};
//!
//! let tokens = ExprLexer::tokenize("price | plus: 1", 0);
//! assert_eq!(tokens[0].kind, TokenKind::Identifier);
//! assert_eq!(tokens[1].kind, TokenKind::Pipe);
//! assert_eq!(tokens[2].kind, TokenKind::Identifier);
//! assert_eq!(tokens[3].kind, TokenKind::Colon);
//! assert_eq!(tokens[4].kind, TokenKind::Number);
//! ```

/// A token produced by the expression lexer.
///
/// `start` and `end` are byte offsets into the whole template source.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
    pub value: TokenValue,
}

impl Token {
    /// Identifier name, if this is an identifier.
    pub fn identifier(&self) -> Option<&str> {
        match &self.value {
            TokenValue::Identifier(name) if self.kind == TokenKind::Identifier => Some(name),
            _ => None,
        }
    }

    /// Whether this is the identifier `word` (`in`, `with`, `reversed`, ...).
    pub fn is_word(&self, word: &str) -> bool {
        self.identifier() == Some(word)
    }

    /// Operator lexeme, if this is a comparison or logical operator.
    pub fn operator(&self) -> Option<&str> {
        match &self.value {
            TokenValue::Operator(op) if self.kind == TokenKind::CompareOp => Some(op),
            _ => None,
        }
    }
}

/// Token classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Literals
    Identifier,
    String,
    Number,

    // Punctuation
    Dot,
    DotDot,
    Pipe,
    Colon,
    Comma,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Equals,

    /// `== != <> <= >= < >` and the keywords `and`, `or`, `contains`.
    CompareOp,

    // End of input
    Eof,
}

/// The value carried by a token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenValue {
    None,
    Number(f64),
    String(String),
    Identifier(String),
    Operator(String),
}

/// Liquid expression lexer.
///
/// Operates on one markup string; `base` is the byte offset of that string in
/// the template so token positions are absolute.
pub struct ExprLexer<'a> {
    source: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
    base: usize,
}

impl<'a> ExprLexer<'a> {
    /// Create a new expression lexer for the given markup.
    pub fn new(source: &'a str, base: usize) -> Self {
        Self {
            source,
            chars: source.char_indices().collect(),
            pos: 0,
            base,
        }
    }

    /// Tokenize the entire markup. The last token is always `Eof`.
    pub fn tokenize(source: &str, base: usize) -> Vec<Token> {
        let mut lexer = ExprLexer::new(source, base);
        let mut tokens = Vec::new();

        loop {
            let token = lexer.next_token();
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }

        tokens
    }

    /// Read the next token, skipping whitespace and unknown characters.
    pub fn next_token(&mut self) -> Token {
        loop {
            self.skip_whitespace();

            if self.is_at_end() {
                let end = self.offset();
                return self.token_at(TokenKind::Eof, end, end, TokenValue::None);
            }

            let start = self.offset();
            let ch = self.current();

            let token = match ch {
                // Numbers (including a leading minus)
                '0'..='9' => Some(self.read_number(start)),
                '-' if self.peek().is_some_and(|c| c.is_ascii_digit()) => {
                    Some(self.read_number(start))
                }

                // Strings
                '\'' | '"' => Some(self.read_string(start)),

                // Identifiers and keyword operators
                c if c.is_alphabetic() || c == '_' => Some(self.read_identifier(start)),

                // Two-character operators
                '=' if self.peek() == Some('=') => Some(self.operator(start, 2)),
                '!' if self.peek() == Some('=') => Some(self.operator(start, 2)),
                '<' if self.peek() == Some('>') => Some(self.operator(start, 2)),
                '<' if self.peek() == Some('=') => Some(self.operator(start, 2)),
                '>' if self.peek() == Some('=') => Some(self.operator(start, 2)),
                '.' if self.peek() == Some('.') => {
                    self.advance_n(2);
                    Some(self.token(TokenKind::DotDot, start, TokenValue::None))
                }

                // Single-character tokens
                '<' | '>' => Some(self.operator(start, 1)),
                '.' => Some(self.punct(TokenKind::Dot, start)),
                '|' => Some(self.punct(TokenKind::Pipe, start)),
                ':' => Some(self.punct(TokenKind::Colon, start)),
                ',' => Some(self.punct(TokenKind::Comma, start)),
                '[' => Some(self.punct(TokenKind::LBracket, start)),
                ']' => Some(self.punct(TokenKind::RBracket, start)),
                '(' => Some(self.punct(TokenKind::LParen, start)),
                ')' => Some(self.punct(TokenKind::RParen, start)),
                '=' => Some(self.punct(TokenKind::Equals, start)),

                _ => None,
            };

            match token {
                Some(token) => return token,
                None => self.advance(), // unknown character, skip
            }
        }
    }

    // --- Private helpers ---

    fn read_number(&mut self, start: usize) -> Token {
        if self.current() == '-' {
            self.advance();
        }
        self.skip_digits();

        // A dot only belongs to the number if a digit follows (`1..5` is a range)
        if !self.is_at_end()
            && self.current() == '.'
            && self.peek().is_some_and(|c| c.is_ascii_digit())
        {
            self.advance();
            self.skip_digits();
        }

        let text = &self.source[start - self.base..self.offset() - self.base];
        let value = text.parse::<f64>().unwrap_or(0.0);
        self.token(TokenKind::Number, start, TokenValue::Number(value))
    }

    /// Quoted string without escape processing. An unterminated string runs
    /// to the end of the markup.
    fn read_string(&mut self, start: usize) -> Token {
        let quote = self.current();
        self.advance(); // skip opening quote

        let content_start = self.offset();
        while !self.is_at_end() && self.current() != quote {
            self.advance();
        }
        let value = self.source[content_start - self.base..self.offset() - self.base].to_string();

        if !self.is_at_end() {
            self.advance(); // skip closing quote
        }

        self.token(TokenKind::String, start, TokenValue::String(value))
    }

    /// Identifiers may contain `-` only when a letter follows, so `a-b` is one
    /// identifier while `a - 1` and `a-1` are not merged.
    fn read_identifier(&mut self, start: usize) -> Token {
        while !self.is_at_end() {
            let c = self.current();
            let continues = c.is_alphanumeric()
                || c == '_'
                || c == '?'
                || (c == '-' && self.peek().is_some_and(|n| n.is_alphabetic()));
            if !continues {
                break;
            }
            self.advance();
        }

        let text = &self.source[start - self.base..self.offset() - self.base];

        match text {
            "and" | "or" | "contains" => {
                self.token(TokenKind::CompareOp, start, TokenValue::Operator(text.to_string()))
            }
            _ => self.token(
                TokenKind::Identifier,
                start,
                TokenValue::Identifier(text.to_string()),
            ),
        }
    }

    fn operator(&mut self, start: usize, len: usize) -> Token {
        self.advance_n(len);
        let text = &self.source[start - self.base..self.offset() - self.base];
        self.token(TokenKind::CompareOp, start, TokenValue::Operator(text.to_string()))
    }

    fn punct(&mut self, kind: TokenKind, start: usize) -> Token {
        self.advance();
        self.token(kind, start, TokenValue::None)
    }

    fn token(&self, kind: TokenKind, start: usize, value: TokenValue) -> Token {
        self.token_at(kind, start, self.offset(), value)
    }

    fn token_at(&self, kind: TokenKind, start: usize, end: usize, value: TokenValue) -> Token {
        Token {
            kind,
            start,
            end,
            value,
        }
    }

    /// Absolute byte offset of the current character.
    fn offset(&self) -> usize {
        self.base
            + self
                .chars
                .get(self.pos)
                .map_or(self.source.len(), |(i, _)| *i)
    }

    fn current(&self) -> char {
        self.chars[self.pos].1
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos + 1).map(|(_, c)| *c)
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn advance_n(&mut self, n: usize) {
        self.pos += n;
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn skip_digits(&mut self) {
        while !self.is_at_end() && self.current().is_ascii_digit() {
            self.advance();
        }
    }

    fn skip_whitespace(&mut self) {
        while !self.is_at_end() && self.current().is_whitespace() {
            self.advance();
        }
    }
}
