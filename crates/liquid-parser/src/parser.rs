//! Tag parser for Liquid.
//!
//! Consumes the segment list produced by `liquid-lexer` and assembles a
//! location-annotated AST. Block tags recurse through [`TagParser::parse_body`]
//! with a stop set; the stop tag is left unconsumed so the caller can branch on
//! it (`elsif`/`else` before `endif`, `when` before `endcase`).
//!
//! Parsing never fails. A tag that cannot be parsed is turned into an error
//! plus a placeholder node, a block with no end tag is closed at the last child
//! it parsed, and stray end tags are dropped with an error.

use crate::ast::{
    AssignNode, BindingKind, CaptureNode, CaseNode, CommentNode, ConditionalBranch,
    ConditionalNode, CounterNode, ExprKind, Expression, ForNode, FormNode,
    KeywordArgument, LayoutNode, LiquidTagNode, Node, OutputNode, PaginateNode, PartialBinding,
    PartialNode, RawContentNode, SectionNode, TableRowNode, TextNode, WhenClause,
};
use crate::expr_lexer::TokenKind;
use crate::expr_parser::ExprParser;
use crate::{ParseError, ParseResult};
use liquid_lexer::{LineIndex, Scanner, Segment, SegmentKind};

/// Block tags that take an end tag.
pub const BLOCK_TAGS: &[&str] = &[
    "if",
    "unless",
    "for",
    "case",
    "capture",
    "form",
    "paginate",
    "tablerow",
    "raw",
    "comment",
    "schema",
    "style",
    "javascript",
    "stylesheet",
];

/// Tags that are only valid inside a block.
pub const INTERMEDIATE_TAGS: &[&str] = &["elsif", "else", "when"];

/// Maximum block nesting before further blocks are kept as plain tags.
/// Every consumer of the AST recurses per level, so this also bounds their
/// stack use.
pub const MAX_NESTING_DEPTH: usize = 64;

/// A tag that failed to parse: the error plus a best-effort placeholder node.
#[derive(Debug)]
pub struct Recovered {
    pub node: Node,
    pub error: ParseError,
}

type TagResult = Result<Node, Recovered>;

/// Loop head shared by `for` and `tablerow`.
struct LoopHead {
    variable: String,
    collection: Expression,
    limit: Option<Expression>,
    offset: Option<Expression>,
    cols: Option<Expression>,
    reversed: bool,
}

/// Liquid tag parser.
///
/// Holds the read-only segment list and a cursor into it.
pub struct TagParser<'src> {
    segments: Vec<Segment>,
    pos: usize,
    index: LineIndex<'src>,
    errors: Vec<ParseError>,
    open_blocks: Vec<&'static str>,
}

impl<'src> TagParser<'src> {
    /// Create a parser over already-scanned segments of `source`.
    pub fn new(source: &'src str, segments: Vec<Segment>) -> Self {
        Self {
            segments,
            pos: 0,
            index: LineIndex::new(source),
            errors: Vec::new(),
            open_blocks: Vec::new(),
        }
    }

    /// Scan and parse a template.
    pub fn parse(source: &'src str) -> ParseResult {
        let segments = Scanner::scan(source);
        let mut parser = TagParser::new(source, segments);
        let ast = parser.parse_body(&[]);
        tracing::debug!(
            nodes = ast.len(),
            errors = parser.errors.len(),
            "parsed template"
        );
        ParseResult {
            ast,
            errors: parser.errors,
        }
    }

    // =========================================================================
    // Body
    // =========================================================================

    /// Parse nodes until a tag named in `stop` (not consumed), an end tag that
    /// closes an enclosing block (not consumed), or the end of input.
    pub fn parse_body(&mut self, stop: &[&str]) -> Vec<Node> {
        let mut nodes = Vec::new();

        while let Some(segment) = self.segments.get(self.pos) {
            match segment.kind {
                SegmentKind::Text => {
                    nodes.push(Node::Text(TextNode {
                        value: segment.raw.clone(),
                        loc: self.index.location(segment.offset, segment.raw.len()),
                    }));
                    self.pos += 1;
                }
                SegmentKind::Output => {
                    let segment = segment.clone();
                    self.pos += 1;
                    nodes.push(Node::Output(self.parse_output(&segment)));
                }
                SegmentKind::Tag => {
                    let name = segment.tag_name().unwrap_or("").to_string();
                    if stop.contains(&name.as_str()) || self.closes_enclosing_block(&name) {
                        break;
                    }

                    let segment = segment.clone();
                    self.pos += 1;

                    if name.is_empty() {
                        self.error_at(&segment, "Empty tag".into());
                        continue;
                    }
                    if is_orphan(&name) {
                        self.error_at(
                            &segment,
                            format!("Unexpected '{{% {name} %}}' with no matching opening tag"),
                        );
                        continue;
                    }

                    match self.parse_tag(&name, &segment) {
                        Ok(node) => nodes.push(node),
                        Err(Recovered { node, error }) => {
                            self.errors.push(error);
                            nodes.push(node);
                        }
                    }
                }
            }
        }

        nodes
    }

    fn parse_tag(&mut self, name: &str, open: &Segment) -> TagResult {
        if BLOCK_TAGS.contains(&name) && self.open_blocks.len() >= MAX_NESTING_DEPTH {
            return Err(Recovered {
                node: self.liquid_tag(open),
                error: self.error_for(open, format!("Blocks nested deeper than {MAX_NESTING_DEPTH} levels")),
            });
        }

        match name {
            "if" => Ok(self.parse_conditional(open, "if")),
            "unless" => Ok(self.parse_conditional(open, "unless")),
            "for" => Ok(self.parse_for(open)),
            "tablerow" => Ok(self.parse_tablerow(open)),
            "case" => Ok(self.parse_case(open)),
            "capture" => self.parse_capture(open),
            "form" => Ok(self.parse_form(open)),
            "paginate" => Ok(self.parse_paginate(open)),

            "raw" => {
                let (content, loc) = self.parse_raw_content(open, "raw");
                Ok(Node::Raw(RawContentNode { content, loc }))
            }
            "comment" => {
                let (text, loc) = self.parse_raw_content(open, "comment");
                Ok(Node::Comment(CommentNode {
                    text,
                    inline: false,
                    loc,
                }))
            }
            "schema" => {
                let (content, loc) = self.parse_raw_content(open, "schema");
                Ok(Node::Schema(RawContentNode { content, loc }))
            }
            "style" => {
                let (content, loc) = self.parse_raw_content(open, "style");
                Ok(Node::Style(RawContentNode { content, loc }))
            }
            "javascript" => {
                let (content, loc) = self.parse_raw_content(open, "javascript");
                Ok(Node::JavaScript(RawContentNode { content, loc }))
            }
            "stylesheet" => {
                let (content, loc) = self.parse_raw_content(open, "stylesheet");
                Ok(Node::Stylesheet(RawContentNode { content, loc }))
            }

            "#" => Ok(Node::Comment(CommentNode {
                text: open.markup().to_string(),
                inline: true,
                loc: self.tag_loc(open),
            })),
            "assign" => self.parse_assign(open),
            "echo" => {
                let (expression, filters) =
                    self.with_expr(open.markup(), open.markup_offset(), |p| p.parse_output());
                Ok(Node::Echo(OutputNode {
                    expression,
                    filters,
                    loc: self.tag_loc(open),
                }))
            }
            "render" => self.parse_partial(open, true),
            "include" => self.parse_partial(open, false),
            "section" => self.parse_section(open),
            "layout" => {
                let name = self.with_expr(open.markup(), open.markup_offset(), |p| {
                    let name = p.parse_primary();
                    p.expect_end();
                    name
                });
                Ok(Node::Layout(LayoutNode {
                    name,
                    loc: self.tag_loc(open),
                }))
            }
            "increment" | "decrement" => self.parse_counter(open, name == "increment"),
            "break" => Ok(Node::Break(self.tag_loc(open))),
            "continue" => Ok(Node::Continue(self.tag_loc(open))),

            _ => Ok(self.liquid_tag(open)),
        }
    }

    // =========================================================================
    // Output and simple tags
    // =========================================================================

    fn parse_output(&mut self, segment: &Segment) -> OutputNode {
        let (expression, filters) =
            self.with_expr(&segment.content, segment.content_offset, |p| p.parse_output());
        OutputNode {
            expression,
            filters,
            loc: self.tag_loc(segment),
        }
    }

    /// `{% assign name = expression | filters %}`
    fn parse_assign(&mut self, open: &Segment) -> TagResult {
        let parsed = self.with_expr(open.markup(), open.markup_offset(), |p| {
            let target = p.peek().clone();
            let Some(name) = p.eat_identifier() else {
                return Err(("Expected variable name after 'assign'", target.start));
            };
            let equals = p.peek().clone();
            if !p.eat(TokenKind::Equals) {
                return Err(("Expected '=' in assign", equals.start));
            }
            let value = p.parse_condition();
            let filters = p.parse_filter_chain();
            p.expect_end();
            Ok((name, value, filters))
        });

        match parsed {
            Ok((name, value, filters)) => Ok(Node::Assign(AssignNode {
                name,
                value,
                filters,
                loc: self.tag_loc(open),
            })),
            Err((message, at)) => Err(Recovered {
                node: self.liquid_tag(open),
                error: ParseError {
                    message: message.to_string(),
                    loc: self.index.location(at, 0),
                },
            }),
        }
    }

    /// `{% render 'name' [with|for expr [as alias]] [, key: value]* %}`
    /// `include` also accepts a variable template name.
    fn parse_partial(&mut self, open: &Segment, is_render: bool) -> TagResult {
        let (template, binding, arguments) =
            self.with_expr(open.markup(), open.markup_offset(), |p| {
                let template = p.parse_primary();

                let kind = if p.eat_word("with") {
                    Some(BindingKind::With)
                } else if p.eat_word("for") {
                    Some(BindingKind::For)
                } else {
                    None
                };
                let binding = kind.map(|kind| {
                    let expression = p.parse_primary();
                    let alias = if p.eat_word("as") {
                        p.eat_identifier()
                    } else {
                        None
                    };
                    PartialBinding {
                        kind,
                        expression,
                        alias,
                    }
                });

                let arguments = p.parse_keyword_arguments();
                p.expect_end();
                (template, binding, arguments)
            });

        let loc = self.tag_loc(open);
        let is_string = matches!(template.kind, ExprKind::String { .. });
        let node = PartialNode {
            template,
            binding,
            arguments,
            loc,
        };

        if is_render && !is_string {
            return Err(Recovered {
                error: ParseError {
                    message: "Expected a quoted template name after 'render'".into(),
                    loc: node.template.loc,
                },
                node: Node::Render(node),
            });
        }

        Ok(if is_render {
            Node::Render(node)
        } else {
            Node::Include(node)
        })
    }

    /// `{% section 'name' %}`
    fn parse_section(&mut self, open: &Segment) -> TagResult {
        let name = self.with_expr(open.markup(), open.markup_offset(), |p| {
            let name = p.parse_primary();
            p.expect_end();
            name
        });

        match name.kind {
            ExprKind::String { value } => Ok(Node::Section(SectionNode {
                name: value,
                loc: self.tag_loc(open),
            })),
            _ => Err(Recovered {
                node: self.liquid_tag(open),
                error: ParseError {
                    message: "Expected a quoted section name".into(),
                    loc: name.loc,
                },
            }),
        }
    }

    /// `{% increment name %}` / `{% decrement name %}`
    fn parse_counter(&mut self, open: &Segment, increment: bool) -> TagResult {
        let name = self.with_expr(open.markup(), open.markup_offset(), |p| {
            let name = p.eat_identifier();
            if name.is_some() {
                p.expect_end();
            }
            name
        });

        let Some(name) = name else {
            let tag = if increment { "increment" } else { "decrement" };
            return Err(Recovered {
                node: self.liquid_tag(open),
                error: self.error_for(open, format!("Expected variable name after '{tag}'")),
            });
        };

        let node = CounterNode {
            name,
            loc: self.tag_loc(open),
        };
        Ok(if increment {
            Node::Increment(node)
        } else {
            Node::Decrement(node)
        })
    }

    // =========================================================================
    // Block tags
    // =========================================================================

    /// `if` / `unless` with `elsif` and `else` branches.
    fn parse_conditional(&mut self, open: &Segment, tag: &'static str) -> Node {
        let end_name = format!("end{tag}");
        let stop = ["elsif", "else", end_name.as_str()];

        let mut branches = Vec::new();

        let condition = self.parse_condition_markup(open);
        let body = self.parse_block_body(tag, &stop);
        branches.push(ConditionalBranch {
            condition: Some(condition),
            body,
            loc: self.index.span(open.offset, self.prev_end()),
        });

        let mut seen_else = false;

        while let Some(branch_tag) = self.next_tag_in(&["elsif", "else"]) {
            let condition = if branch_tag.tag_name() == Some("elsif") {
                if seen_else {
                    self.error_at(&branch_tag, format!("Unexpected 'elsif' after 'else' in '{tag}'"));
                }
                Some(self.parse_condition_markup(&branch_tag))
            } else {
                if seen_else {
                    self.error_at(&branch_tag, format!("Duplicate 'else' in '{tag}'"));
                }
                seen_else = true;
                None
            };

            let body = self.parse_block_body(tag, &stop);
            branches.push(ConditionalBranch {
                condition,
                body,
                loc: self.index.span(branch_tag.offset, self.prev_end()),
            });
        }

        let end = self.close_block(tag, open);
        let node = ConditionalNode {
            branches,
            loc: self.index.span(open.offset, end),
        };

        if tag == "if" {
            Node::If(node)
        } else {
            Node::Unless(node)
        }
    }

    /// `{% for item in collection [limit: n] [offset: n] [reversed] %}` with optional `else`.
    fn parse_for(&mut self, open: &Segment) -> Node {
        let head = self.parse_loop_head(open, false);

        let body = self.parse_block_body("for", &["else", "endfor"]);
        let else_body = match self.next_tag_in(&["else"]) {
            Some(_) => Some(self.parse_block_body("for", &["endfor"])),
            None => None,
        };

        let end = self.close_block("for", open);

        Node::For(ForNode {
            variable: head.variable,
            collection: head.collection,
            limit: head.limit,
            offset: head.offset,
            reversed: head.reversed,
            body,
            else_body,
            loc: self.index.span(open.offset, end),
        })
    }

    /// `{% tablerow item in collection [cols: n] [limit: n] [offset: n] %}`
    fn parse_tablerow(&mut self, open: &Segment) -> Node {
        let head = self.parse_loop_head(open, true);
        let body = self.parse_block_body("tablerow", &["endtablerow"]);
        let end = self.close_block("tablerow", open);

        Node::TableRow(TableRowNode {
            variable: head.variable,
            collection: head.collection,
            cols: head.cols,
            limit: head.limit,
            offset: head.offset,
            body,
            loc: self.index.span(open.offset, end),
        })
    }

    fn parse_loop_head(&mut self, open: &Segment, is_tablerow: bool) -> LoopHead {
        let tag = if is_tablerow { "tablerow" } else { "for" };

        self.with_expr(open.markup(), open.markup_offset(), |p| {
            let first = p.peek().clone();
            let variable = match p.eat_identifier() {
                Some(name) => name,
                None => {
                    p.error_at(format!("Expected loop variable after '{tag}'"), first.start, first.end);
                    String::new()
                }
            };

            if !p.eat_word("in") {
                let at = p.peek().clone();
                p.error_at("Expected 'in' after loop variable".into(), at.start, at.end);
            }

            let mut head = LoopHead {
                variable,
                collection: p.parse_primary(),
                limit: None,
                offset: None,
                cols: None,
                reversed: false,
            };

            while !p.is_at_end() {
                if !is_tablerow && p.eat_word("reversed") {
                    head.reversed = true;
                    continue;
                }
                let at = p.peek().clone();
                let Some(KeywordArgument { name, value }) = p.parse_keyword_argument() else {
                    p.expect_end();
                    break;
                };
                match name.as_str() {
                    "limit" => head.limit = Some(value),
                    "offset" => head.offset = Some(value),
                    "cols" if is_tablerow => head.cols = Some(value),
                    _ => p.error_at(format!("Unknown '{tag}' modifier '{name}'"), at.start, at.end),
                }
            }

            head
        })
    }

    /// `{% case subject %}{% when a, b %}...{% else %}...{% endcase %}`
    fn parse_case(&mut self, open: &Segment) -> Node {
        let subject = self.parse_condition_markup(open);
        let stop = ["when", "else", "endcase"];

        // Anything between `case` and the first `when` is never rendered
        self.parse_block_body("case", &stop);

        let mut whens = Vec::new();
        let mut else_body = None;

        while let Some(clause) = self.next_tag_in(&["when", "else"]) {
            if clause.tag_name() == Some("when") {
                let values = self.with_expr(clause.markup(), clause.markup_offset(), |p| {
                    let mut values = vec![p.parse_primary()];
                    loop {
                        if p.peek().operator() == Some("or") {
                            p.advance();
                        } else if !p.eat(TokenKind::Comma) {
                            break;
                        }
                        values.push(p.parse_primary());
                    }
                    p.expect_end();
                    values
                });
                let body = self.parse_block_body("case", &stop);
                whens.push(WhenClause {
                    values,
                    body,
                    loc: self.index.span(clause.offset, self.prev_end()),
                });
            } else {
                if else_body.is_some() {
                    self.error_at(&clause, "Duplicate 'else' in 'case'".into());
                }
                else_body = Some(self.parse_block_body("case", &stop));
            }
        }

        let end = self.close_block("case", open);

        Node::Case(CaseNode {
            subject,
            whens,
            else_body,
            loc: self.index.span(open.offset, end),
        })
    }

    /// `{% capture name %}...{% endcapture %}`. The name may be quoted.
    fn parse_capture(&mut self, open: &Segment) -> TagResult {
        let name = self.with_expr(open.markup(), open.markup_offset(), |p| {
            let target = p.parse_primary();
            p.expect_end();
            match target.kind {
                ExprKind::Variable { name, lookups } if lookups.is_empty() => Some(name),
                ExprKind::String { value } => Some(value),
                _ => None,
            }
        });

        let body = self.parse_block_body("capture", &["endcapture"]);
        let end = self.close_block("capture", open);
        let loc = self.index.span(open.offset, end);

        match name {
            Some(name) => Ok(Node::Capture(CaptureNode { name, body, loc })),
            None => Err(Recovered {
                error: self.error_for(open, "Expected variable name after 'capture'".into()),
                node: Node::Capture(CaptureNode {
                    name: String::new(),
                    body,
                    loc,
                }),
            }),
        }
    }

    /// `{% form 'type'[, object]*[, key: value]* %}...{% endform %}`
    fn parse_form(&mut self, open: &Segment) -> Node {
        let (form_type, arguments, attributes) =
            self.with_expr(open.markup(), open.markup_offset(), |p| {
                let form_type = p.parse_primary();
                let mut arguments = Vec::new();
                let mut attributes = Vec::new();

                while p.eat(TokenKind::Comma) {
                    match p.parse_keyword_argument() {
                        Some(attr) => attributes.push(attr),
                        None => arguments.push(p.parse_primary()),
                    }
                }
                p.expect_end();
                (form_type, arguments, attributes)
            });

        let body = self.parse_block_body("form", &["endform"]);
        let end = self.close_block("form", open);

        Node::Form(FormNode {
            form_type,
            arguments,
            attributes,
            body,
            loc: self.index.span(open.offset, end),
        })
    }

    /// `{% paginate collection by page_size %}...{% endpaginate %}`
    fn parse_paginate(&mut self, open: &Segment) -> Node {
        let (collection, page_size) = self.with_expr(open.markup(), open.markup_offset(), |p| {
            let collection = p.parse_primary();
            if !p.eat_word("by") {
                let at = p.peek().clone();
                p.error_at("Expected 'by' in paginate".into(), at.start, at.end);
            }
            let page_size = p.parse_primary();
            p.expect_end();
            (collection, page_size)
        });

        let body = self.parse_block_body("paginate", &["endpaginate"]);
        let end = self.close_block("paginate", open);

        Node::Paginate(PaginateNode {
            collection,
            page_size,
            body,
            loc: self.index.span(open.offset, end),
        })
    }

    /// Body of a raw-content tag (already captured verbatim by the scanner).
    fn parse_raw_content(
        &mut self,
        open: &Segment,
        tag: &str,
    ) -> (String, liquid_lexer::SourceLocation) {
        let mut content = String::new();
        if let Some(segment) = self.segments.get(self.pos) {
            if segment.kind == SegmentKind::Text {
                content = segment.raw.clone();
                self.pos += 1;
            }
        }

        let end = self.close_block(tag, open);
        (content, self.index.span(open.offset, end))
    }

    // =========================================================================
    // Block helpers
    // =========================================================================

    /// Parse a body while `block` is marked open.
    fn parse_block_body(&mut self, block: &'static str, stop: &[&str]) -> Vec<Node> {
        self.open_blocks.push(block);
        let body = self.parse_body(stop);
        self.open_blocks.pop();
        body
    }

    /// Consume `{% end<block> %}` and return the block's end offset. Without it,
    /// record an "Unclosed" error and end the block at the last consumed segment.
    fn close_block(&mut self, block: &str, open: &Segment) -> usize {
        let end_name = format!("end{block}");

        if let Some(end_tag) = self.next_tag_in(&[end_name.as_str()]) {
            return end_tag.end();
        }

        self.error_at(
            open,
            format!("Unclosed '{block}' tag: expected '{{% {end_name} %}}'"),
        );
        self.prev_end()
    }

    /// Consume and return the next segment if it is a tag named in `names`.
    fn next_tag_in(&mut self, names: &[&str]) -> Option<Segment> {
        let segment = self.segments.get(self.pos)?;
        if !segment.tag_name().is_some_and(|n| names.contains(&n)) {
            return None;
        }
        let segment = segment.clone();
        self.pos += 1;
        Some(segment)
    }

    fn closes_enclosing_block(&self, name: &str) -> bool {
        name.strip_prefix("end")
            .is_some_and(|block| self.open_blocks.contains(&block))
    }

    fn parse_condition_markup(&mut self, tag: &Segment) -> Expression {
        self.with_expr(tag.markup(), tag.markup_offset(), |p| {
            let condition = p.parse_condition();
            p.expect_end();
            condition
        })
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Run an expression parser over `markup`, collecting its errors.
    fn with_expr<T>(
        &mut self,
        markup: &str,
        base: usize,
        f: impl FnOnce(&mut ExprParser<'_, 'src>) -> T,
    ) -> T {
        let mut parser = ExprParser::new(markup, base, &self.index);
        let result = f(&mut parser);
        self.errors.extend(parser.into_errors());
        result
    }

    /// End offset of the last consumed segment.
    fn prev_end(&self) -> usize {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.segments.get(i))
            .map_or(0, Segment::end)
    }

    fn tag_loc(&self, segment: &Segment) -> liquid_lexer::SourceLocation {
        self.index.location(segment.offset, segment.raw.len())
    }

    fn liquid_tag(&self, segment: &Segment) -> Node {
        Node::LiquidTag(LiquidTagNode {
            name: segment.tag_name().unwrap_or("").to_string(),
            markup: segment.markup().to_string(),
            loc: self.tag_loc(segment),
        })
    }

    fn error_for(&self, segment: &Segment, message: String) -> ParseError {
        ParseError {
            message,
            loc: self.tag_loc(segment),
        }
    }

    fn error_at(&mut self, segment: &Segment, message: String) {
        let error = self.error_for(segment, message);
        self.errors.push(error);
    }
}

/// End tags of known blocks and intermediate tags are only valid inside their block.
fn is_orphan(name: &str) -> bool {
    INTERMEDIATE_TAGS.contains(&name)
        || name
            .strip_prefix("end")
            .is_some_and(|block| BLOCK_TAGS.contains(&block))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> ParseResult {
        TagParser::parse(source)
    }

    /// Parse and assert there are no errors.
    fn parse_ok(source: &str) -> Vec<Node> {
        let result = parse(source);
        assert!(result.errors.is_empty(), "unexpected errors: {:?}", result.errors);
        result.ast
    }

    fn filter_names(filters: &[FilterApplication]) -> Vec<&str> {
        filters.iter().map(|f| f.name.as_str()).collect()
    }

    fn kinds(nodes: &[Node]) -> Vec<&'static str> {
        nodes.iter().map(Node::kind_name).collect()
    }

    fn first_if(nodes: &[Node]) -> &ConditionalNode {
        match &nodes[0] {
            Node::If(n) => n,
            other => panic!("Expected If, got {other:?}"),
        }
    }

    fn first_for(nodes: &[Node]) -> &ForNode {
        match &nodes[0] {
            Node::For(n) => n,
            other => panic!("Expected For, got {other:?}"),
        }
    }

    // =========================================================================
    // Text and output
    // =========================================================================

    #[test]
    fn test_empty_template() {
        let result = parse("");
        assert!(result.ast.is_empty());
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_text_and_output() {
        let ast = parse_ok("Hello {{ customer.first_name | capitalize }}!");
        assert_eq!(kinds(&ast), vec!["Text", "Output", "Text"]);
        match &ast[1] {
            Node::Output(out) => {
                assert_eq!(
                    out.expression.dotted_path().as_deref(),
                    Some("customer.first_name")
                );
                assert_eq!(filter_names(&out.filters), vec!["capitalize"]);
                assert_eq!(out.loc.offset, 6);
                assert_eq!(out.loc.length, 38);
            }
            other => panic!("Expected Output, got {other:?}"),
        }
    }

    #[test]
    fn test_node_locations_on_later_lines() {
        let ast = parse_ok("a\nb {{ x }}");
        let loc = ast[1].loc();
        assert_eq!((loc.line, loc.column), (2, 3));
    }

    // =========================================================================
    // Conditionals
    // =========================================================================

    #[test]
    fn test_if_elsif_else() {
        let ast = parse_ok(
            "{% if a == 1 %}one{% elsif a == 2 %}two{% else %}other{% endif %}",
        );
        assert_eq!(ast.len(), 1);
        let node = first_if(&ast);
        assert_eq!(node.branches.len(), 3);

        match &node.branches[0].condition {
            Some(Expression {
                kind: ExprKind::Binary { operator, .. },
                ..
            }) => assert_eq!(operator.as_str(), "=="),
            other => panic!("Expected binary condition, got {other:?}"),
        }
        assert!(node.branches[1].condition.is_some());
        assert!(node.branches[2].condition.is_none());
        assert_eq!(kinds(&node.branches[2].body), vec!["Text"]);
    }

    #[test]
    fn test_if_loc_spans_through_endif() {
        let source = "x{% if a %}b{% endif %}y";
        let ast = parse_ok(source);
        let loc = ast[1].loc();
        assert_eq!(loc.offset, 1);
        assert_eq!(&source[loc.offset..loc.end()], "{% if a %}b{% endif %}");
    }

    #[test]
    fn test_unless() {
        let ast = parse_ok("{% unless sold_out %}buy{% else %}gone{% endunless %}");
        match &ast[0] {
            Node::Unless(n) => assert_eq!(n.branches.len(), 2),
            other => panic!("Expected Unless, got {other:?}"),
        }
    }

    #[test]
    fn test_nested_if() {
        let ast = parse_ok("{% if a %}{% if b %}x{% endif %}{% endif %}");
        let outer = first_if(&ast);
        assert_eq!(kinds(&outer.branches[0].body), vec!["If"]);
    }

    #[test]
    fn test_unclosed_if_keeps_partial_node() {
        let source = "{% if a %}x{{ y }}";
        let result = parse(source);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].message.contains("Unclosed 'if'"));
        let node = first_if(&result.ast);
        assert_eq!(kinds(&node.branches[0].body), vec!["Text", "Output"]);
        assert_eq!(node.loc.end(), source.len());
    }

    #[test]
    fn test_elsif_after_else() {
        let result = parse("{% if a %}{% else %}{% elsif b %}{% endif %}");
        assert_eq!(result.errors.len(), 1);
        assert_eq!(first_if(&result.ast).branches.len(), 3);
    }

    // =========================================================================
    // Loops
    // =========================================================================

    #[test]
    fn test_for_basic() {
        let ast = parse_ok("{% for item in collection.products %}{{ item.title }}{% endfor %}");
        let node = first_for(&ast);
        assert_eq!(node.variable, "item");
        assert_eq!(
            node.collection.dotted_path().as_deref(),
            Some("collection.products")
        );
        assert_eq!(kinds(&node.body), vec!["Output"]);
        assert!(node.else_body.is_none());
    }

    #[test]
    fn test_for_modifiers_any_order() {
        let ast = parse_ok("{% for x in list reversed offset: 2 limit: 4 %}{% endfor %}");
        let node = first_for(&ast);
        assert!(node.reversed);
        assert_eq!(node.limit.as_ref().map(|e| &e.kind), Some(&ExprKind::Number { value: 4.0 }));
        assert_eq!(node.offset.as_ref().map(|e| &e.kind), Some(&ExprKind::Number { value: 2.0 }));

        let ast = parse_ok("{% for x in list limit: 1 reversed %}{% endfor %}");
        assert!(first_for(&ast).reversed);
    }

    #[test]
    fn test_for_range() {
        let ast = parse_ok("{% for i in (1..5) %}{{ i }}{% endfor %}");
        assert!(matches!(first_for(&ast).collection.kind, ExprKind::Range { .. }));
    }

    #[test]
    fn test_for_else() {
        let ast = parse_ok("{% for x in xs %}a{% else %}empty{% endfor %}");
        let node = first_for(&ast);
        assert_eq!(node.else_body.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn test_for_missing_in() {
        let result = parse("{% for x xs %}a{% endfor %}");
        assert!(result.errors.iter().any(|e| e.message.contains("Expected 'in'")));
        assert_eq!(kinds(&result.ast), vec!["For"]);
    }

    #[test]
    fn test_break_and_continue() {
        let ast = parse_ok("{% for x in xs %}{% break %}{% continue %}{% endfor %}");
        assert_eq!(kinds(&first_for(&ast).body), vec!["Break", "Continue"]);
    }

    #[test]
    fn test_tablerow() {
        let ast = parse_ok("{% tablerow p in products cols: 3 limit: 6 %}{{ p }}{% endtablerow %}");
        match &ast[0] {
            Node::TableRow(n) => {
                assert_eq!(n.variable, "p");
                assert!(n.cols.is_some());
                assert!(n.limit.is_some());
            }
            other => panic!("Expected TableRow, got {other:?}"),
        }
    }

    // =========================================================================
    // Case
    // =========================================================================

    #[test]
    fn test_case_when_else() {
        let ast = parse_ok(
            "{% case handle %}\n{% when 'a', 'b' %}ab{% when 'c' or 'd' %}cd{% else %}other{% endcase %}",
        );
        match &ast[0] {
            Node::Case(n) => {
                assert_eq!(n.subject.root_name(), Some("handle"));
                assert_eq!(n.whens.len(), 2);
                assert_eq!(n.whens[0].values.len(), 2);
                assert_eq!(n.whens[1].values.len(), 2);
                assert!(n.else_body.is_some());
            }
            other => panic!("Expected Case, got {other:?}"),
        }
    }

    // =========================================================================
    // Assign and capture
    // =========================================================================

    #[test]
    fn test_assign() {
        let ast = parse_ok("{% assign title = product.title | upcase %}");
        match &ast[0] {
            Node::Assign(n) => {
                assert_eq!(n.name, "title");
                assert_eq!(n.value.dotted_path().as_deref(), Some("product.title"));
                assert_eq!(filter_names(&n.filters), vec!["upcase"]);
            }
            other => panic!("Expected Assign, got {other:?}"),
        }
    }

    #[test]
    fn test_assign_without_equals_recovers() {
        let result = parse("{% assign x 5 %}after");
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].message.contains("Expected '='"));
        assert_eq!(kinds(&result.ast), vec!["LiquidTag", "Text"]);
    }

    #[test]
    fn test_capture() {
        let ast = parse_ok("{% capture greeting %}Hi {{ name }}{% endcapture %}");
        match &ast[0] {
            Node::Capture(n) => {
                assert_eq!(n.name, "greeting");
                assert_eq!(kinds(&n.body), vec!["Text", "Output"]);
            }
            other => panic!("Expected Capture, got {other:?}"),
        }
    }

    #[test]
    fn test_capture_quoted_name() {
        let ast = parse_ok("{% capture 'x' %}{% endcapture %}");
        assert!(matches!(&ast[0], Node::Capture(n) if n.name == "x"));
    }

    // =========================================================================
    // Raw-content tags
    // =========================================================================

    #[test]
    fn test_raw_keeps_markup() {
        let ast = parse_ok("{% raw %}{{ not_parsed }}{% endraw %}");
        assert!(matches!(&ast[0], Node::Raw(n) if n.content == "{{ not_parsed }}"));
    }

    #[test]
    fn test_comment_block_and_inline() {
        let ast = parse_ok("{% comment %}note{% endcomment %}{% # quick %}");
        assert!(matches!(&ast[0], Node::Comment(n) if !n.inline && n.text == "note"));
        assert!(matches!(&ast[1], Node::Comment(n) if n.inline && n.text == "quick"));
    }

    #[test]
    fn test_schema_style_javascript_stylesheet() {
        let ast = parse_ok(
            "{% schema %}{}{% endschema %}{% style %}a{}{% endstyle %}{% javascript %}x(){% endjavascript %}{% stylesheet %}b{}{% endstylesheet %}",
        );
        assert_eq!(kinds(&ast), vec!["Schema", "Style", "JavaScript", "Stylesheet"]);
    }

    #[test]
    fn test_unclosed_raw() {
        let result = parse("{% raw %}{{ a }}");
        assert_eq!(result.errors.len(), 1);
        assert!(matches!(&result.ast[0], Node::Raw(n) if n.content == "{{ a }}"));
    }

    // =========================================================================
    // Shopify tags
    // =========================================================================

    #[test]
    fn test_render_with_arguments() {
        let ast = parse_ok("{% render 'card', product: item, show_price: true %}");
        match &ast[0] {
            Node::Render(n) => {
                assert_eq!(n.template.kind, ExprKind::String { value: "card".into() });
                assert!(n.binding.is_none());
                assert_eq!(n.arguments.len(), 2);
                assert_eq!(n.arguments[0].name, "product");
            }
            other => panic!("Expected Render, got {other:?}"),
        }
    }

    #[test]
    fn test_render_for_as() {
        let ast = parse_ok("{% render 'card' for products as p %}");
        match &ast[0] {
            Node::Render(PartialNode {
                binding: Some(binding),
                ..
            }) => {
                assert_eq!(binding.kind, BindingKind::For);
                assert_eq!(binding.alias.as_deref(), Some("p"));
            }
            other => panic!("Expected Render with binding, got {other:?}"),
        }
    }

    #[test]
    fn test_render_requires_string() {
        let result = parse("{% render snippet_name %}");
        assert_eq!(result.errors.len(), 1);
        assert_eq!(kinds(&result.ast), vec!["Render"]);
    }

    #[test]
    fn test_include_accepts_variable() {
        let ast = parse_ok("{% include snippet_name %}");
        assert_eq!(kinds(&ast), vec!["Include"]);
    }

    #[test]
    fn test_section() {
        let ast = parse_ok("{% section 'header' %}");
        assert!(matches!(&ast[0], Node::Section(n) if n.name == "header"));
    }

    #[test]
    fn test_form() {
        let ast = parse_ok("{% form 'product', product, class: 'f' %}{{ form.errors }}{% endform %}");
        match &ast[0] {
            Node::Form(n) => {
                assert_eq!(n.form_type.kind, ExprKind::String { value: "product".into() });
                assert_eq!(n.arguments.len(), 1);
                assert_eq!(n.attributes.len(), 1);
                assert_eq!(n.body.len(), 1);
            }
            other => panic!("Expected Form, got {other:?}"),
        }
    }

    #[test]
    fn test_paginate() {
        let ast = parse_ok("{% paginate collection.products by 12 %}x{% endpaginate %}");
        match &ast[0] {
            Node::Paginate(n) => {
                assert_eq!(n.page_size.kind, ExprKind::Number { value: 12.0 });
            }
            other => panic!("Expected Paginate, got {other:?}"),
        }
    }

    #[test]
    fn test_layout_echo_counters() {
        let ast = parse_ok(
            "{% layout none %}{% echo x | upcase %}{% increment n %}{% decrement n %}",
        );
        assert_eq!(kinds(&ast), vec!["Layout", "Echo", "Increment", "Decrement"]);
    }

    // =========================================================================
    // Recovery
    // =========================================================================

    #[test]
    fn test_unknown_tag_is_liquid_tag() {
        let ast = parse_ok("{% cycle 'a', 'b' %}");
        match &ast[0] {
            Node::LiquidTag(n) => {
                assert_eq!(n.name, "cycle");
                assert_eq!(n.markup, "'a', 'b'");
            }
            other => panic!("Expected LiquidTag, got {other:?}"),
        }
    }

    #[test]
    fn test_orphan_end_tag_dropped() {
        let result = parse("a{% endfor %}b");
        assert_eq!(kinds(&result.ast), vec!["Text", "Text"]);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].message.contains("no matching opening tag"));
    }

    #[test]
    fn test_orphan_else_dropped() {
        let result = parse("{% else %}");
        assert!(result.ast.is_empty());
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn test_inner_unclosed_block_yields_to_outer_end() {
        let result = parse("{% if a %}{% for x in xs %}y{% endif %}after");
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].message.contains("Unclosed 'for'"));
        assert_eq!(kinds(&result.ast), vec!["If", "Text"]);
        let outer = first_if(&result.ast);
        assert_eq!(kinds(&outer.branches[0].body), vec!["For"]);
    }

    #[test]
    fn test_errors_do_not_stop_later_tags() {
        let result = parse("{% assign %}{% if %}{% endif %}{{ ok }}");
        assert!(!result.errors.is_empty());
        assert_eq!(kinds(&result.ast), vec!["LiquidTag", "If", "Output"]);
    }

    #[test]
    fn test_unterminated_output_is_text() {
        let result = parse("a {{ b");
        assert!(result.errors.is_empty());
        assert_eq!(kinds(&result.ast), vec!["Text", "Text"]);
    }

    #[test]
    fn test_empty_tag() {
        let result = parse("{% %}");
        assert!(result.ast.is_empty());
        assert_eq!(result.errors.len(), 1);
    }

    fn nested_ifs(levels: usize) -> String {
        format!("{}x{}", "{% if a %}".repeat(levels), "{% endif %}".repeat(levels))
    }

    fn if_depth(nodes: &[Node]) -> usize {
        match nodes.first() {
            Some(Node::If(n)) => 1 + if_depth(&n.branches[0].body),
            _ => 0,
        }
    }

    #[test]
    fn test_nesting_at_cap() {
        let ast = parse_ok(&nested_ifs(MAX_NESTING_DEPTH));
        assert_eq!(if_depth(&ast), MAX_NESTING_DEPTH);
    }

    #[test]
    fn test_nesting_past_cap() {
        let result = parse(&nested_ifs(MAX_NESTING_DEPTH + 1));
        assert_eq!(if_depth(&result.ast), MAX_NESTING_DEPTH);
        assert_eq!(result.errors.len(), 2, "{:?}", result.errors);
        assert_eq!(result.errors[0].message, "Blocks nested deeper than 64 levels");
        assert!(result.errors[1].message.starts_with("Unexpected '{% endif %}'"));
    }

    #[test]
    fn test_very_deep_template_does_not_overflow() {
        let result = parse(&nested_ifs(5_000));
        assert_eq!(if_depth(&result.ast), MAX_NESTING_DEPTH);
        assert!(!result.errors.is_empty());

        let index = format!("{{{{ {}x{} }}}}", "a[".repeat(20_000), "]".repeat(20_000));
        let result = parse(&index);
        assert_eq!(kinds(&result.ast), vec!["Output"]);
        assert_eq!(result.errors.len(), 1, "{:?}", result.errors);
    }

    #[test]
    fn test_deterministic() {
        let source = "{% if a %}{% for x in y %}{{ x | z }}{% endif %}{% endunless %}";
        assert_eq!(parse(source), parse(source));
    }

    #[test]
    fn test_all_locations_within_source() {
        fn check(nodes: &[Node], len: usize) {
            for node in nodes {
                assert!(node.loc().end() <= len, "{node:?}");
                if let Node::If(n) = node {
                    for b in &n.branches {
                        check(&b.body, len);
                    }
                }
            }
        }
        let source = "{% if a %}é{{ b }}{% if c %}";
        let result = parse(source);
        check(&result.ast, source.len());
    }
}
