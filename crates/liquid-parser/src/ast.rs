//! Abstract Syntax Tree for Liquid templates.
//!
//! Contains both template-level nodes (text, output, tags and blocks)
//! and expression-level nodes (variable lookups, literals, comparisons).
//! Every node carries the [`SourceLocation`] it was parsed from.

use liquid_lexer::SourceLocation;
use serde::Serialize;

// ---------------------------------------------------------------------------
// Template-level AST
// ---------------------------------------------------------------------------

/// A template node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Node {
    /// Literal text between delimiters.
    Text(TextNode),

    /// `{{ expression | filters }}`
    Output(OutputNode),

    /// `{% echo expression | filters %}`
    Echo(OutputNode),

    /// `{% assign name = expression | filters %}`
    Assign(AssignNode),

    /// `{% if %}` with `elsif`/`else` branches.
    If(ConditionalNode),

    /// `{% unless %}` with `elsif`/`else` branches.
    Unless(ConditionalNode),

    /// `{% for item in collection %}`
    For(ForNode),

    /// `{% case subject %}{% when ... %}`
    Case(CaseNode),

    /// `{% capture name %}...{% endcapture %}`
    Capture(CaptureNode),

    /// `{% raw %}...{% endraw %}`
    Raw(RawContentNode),

    /// `{% comment %}...{% endcomment %}` or `{% # note %}`
    Comment(CommentNode),

    /// `{% render 'snippet' %}`
    Render(PartialNode),

    /// `{% include 'snippet' %}`
    Include(PartialNode),

    /// `{% section 'header' %}`
    Section(SectionNode),

    /// `{% schema %}...{% endschema %}`
    Schema(RawContentNode),

    /// `{% form 'type', object %}...{% endform %}`
    Form(FormNode),

    /// `{% paginate collection by 12 %}...{% endpaginate %}`
    Paginate(PaginateNode),

    /// `{% tablerow item in collection %}`
    TableRow(TableRowNode),

    /// `{% layout 'name' %}` or `{% layout none %}`
    Layout(LayoutNode),

    /// `{% style %}...{% endstyle %}`
    Style(RawContentNode),

    /// `{% javascript %}...{% endjavascript %}`
    JavaScript(RawContentNode),

    /// `{% stylesheet %}...{% endstylesheet %}`
    Stylesheet(RawContentNode),

    /// `{% increment counter %}`
    Increment(CounterNode),

    /// `{% decrement counter %}`
    Decrement(CounterNode),

    /// `{% break %}`
    Break(SourceLocation),

    /// `{% continue %}`
    Continue(SourceLocation),

    /// Any tag this parser does not model, kept with its raw markup.
    LiquidTag(LiquidTagNode),
}

impl Node {
    /// Location of the node in the source.
    pub fn loc(&self) -> SourceLocation {
        match self {
            Node::Text(n) => n.loc,
            Node::Output(n) | Node::Echo(n) => n.loc,
            Node::Assign(n) => n.loc,
            Node::If(n) | Node::Unless(n) => n.loc,
            Node::For(n) => n.loc,
            Node::Case(n) => n.loc,
            Node::Capture(n) => n.loc,
            Node::Raw(n)
            | Node::Schema(n)
            | Node::Style(n)
            | Node::JavaScript(n)
            | Node::Stylesheet(n) => n.loc,
            Node::Comment(n) => n.loc,
            Node::Render(n) | Node::Include(n) => n.loc,
            Node::Section(n) => n.loc,
            Node::Form(n) => n.loc,
            Node::Paginate(n) => n.loc,
            Node::TableRow(n) => n.loc,
            Node::Layout(n) => n.loc,
            Node::Increment(n) | Node::Decrement(n) => n.loc,
            Node::Break(loc) | Node::Continue(loc) => *loc,
            Node::LiquidTag(n) => n.loc,
        }
    }

    /// Short, stable name of the node kind (`"If"`, `"Output"`, ...).
    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::Text(_) => "Text",
            Node::Output(_) => "Output",
            Node::Echo(_) => "Echo",
            Node::Assign(_) => "Assign",
            Node::If(_) => "If",
            Node::Unless(_) => "Unless",
            Node::For(_) => "For",
            Node::Case(_) => "Case",
            Node::Capture(_) => "Capture",
            Node::Raw(_) => "Raw",
            Node::Comment(_) => "Comment",
            Node::Render(_) => "Render",
            Node::Include(_) => "Include",
            Node::Section(_) => "Section",
            Node::Schema(_) => "Schema",
            Node::Form(_) => "Form",
            Node::Paginate(_) => "Paginate",
            Node::TableRow(_) => "TableRow",
            Node::Layout(_) => "Layout",
            Node::Style(_) => "Style",
            Node::JavaScript(_) => "JavaScript",
            Node::Stylesheet(_) => "Stylesheet",
            Node::Increment(_) => "Increment",
            Node::Decrement(_) => "Decrement",
            Node::Break(_) => "Break",
            Node::Continue(_) => "Continue",
            Node::LiquidTag(_) => "LiquidTag",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextNode {
    pub value: String,
    pub loc: SourceLocation,
}

/// Shared by `{{ }}` output and the `echo` tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputNode {
    pub expression: Expression,
    pub filters: Vec<FilterApplication>,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignNode {
    pub name: String,
    pub value: Expression,
    pub filters: Vec<FilterApplication>,
    pub loc: SourceLocation,
}

/// `if` / `unless`: an ordered chain of branches.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConditionalNode {
    pub branches: Vec<ConditionalBranch>,
    pub loc: SourceLocation,
}

/// One `if`/`elsif`/`else` arm. `condition` is `None` for `else`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConditionalBranch {
    pub condition: Option<Expression>,
    pub body: Vec<Node>,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForNode {
    pub variable: String,
    pub collection: Expression,
    pub limit: Option<Expression>,
    pub offset: Option<Expression>,
    pub reversed: bool,
    pub body: Vec<Node>,
    /// Rendered when the collection is empty (`{% else %}` inside the loop).
    pub else_body: Option<Vec<Node>>,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseNode {
    pub subject: Expression,
    pub whens: Vec<WhenClause>,
    pub else_body: Option<Vec<Node>>,
    pub loc: SourceLocation,
}

/// `{% when a, b or c %}` and its body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WhenClause {
    pub values: Vec<Expression>,
    pub body: Vec<Node>,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptureNode {
    pub name: String,
    pub body: Vec<Node>,
    pub loc: SourceLocation,
}

/// Body captured verbatim: `raw`, `schema`, `style`, `javascript`, `stylesheet`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawContentNode {
    pub content: String,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentNode {
    pub text: String,
    /// `{% # note %}` rather than a `comment` block.
    pub inline: bool,
    pub loc: SourceLocation,
}

/// `render` / `include`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartialNode {
    pub template: Expression,
    pub binding: Option<PartialBinding>,
    pub arguments: Vec<KeywordArgument>,
    pub loc: SourceLocation,
}

/// `with expr [as alias]` or `for expr [as alias]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartialBinding {
    pub kind: BindingKind,
    pub expression: Expression,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingKind {
    With,
    For,
}

impl BindingKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BindingKind::With => "with",
            BindingKind::For => "for",
        }
    }
}

/// `name: value`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeywordArgument {
    pub name: String,
    pub value: Expression,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionNode {
    pub name: String,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormNode {
    pub form_type: Expression,
    pub arguments: Vec<Expression>,
    pub attributes: Vec<KeywordArgument>,
    pub body: Vec<Node>,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginateNode {
    pub collection: Expression,
    pub page_size: Expression,
    pub body: Vec<Node>,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRowNode {
    pub variable: String,
    pub collection: Expression,
    pub cols: Option<Expression>,
    pub limit: Option<Expression>,
    pub offset: Option<Expression>,
    pub body: Vec<Node>,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutNode {
    /// A string literal, or `none` as a variable lookup.
    pub name: Expression,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CounterNode {
    pub name: String,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiquidTagNode {
    pub name: String,
    pub markup: String,
    pub loc: SourceLocation,
}

// ---------------------------------------------------------------------------
// Expression-level AST
// ---------------------------------------------------------------------------

/// A complete expression node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expression {
    pub kind: ExprKind,
    pub loc: SourceLocation,
}

impl Expression {
    pub fn new(kind: ExprKind, loc: SourceLocation) -> Self {
        Self { kind, loc }
    }

    pub fn nil(loc: SourceLocation) -> Self {
        Self::new(ExprKind::Nil, loc)
    }

    /// `product.title` for a lookup made only of literal property names.
    /// `None` for literals and lookups with bracket access.
    pub fn dotted_path(&self) -> Option<String> {
        let ExprKind::Variable { name, lookups } = &self.kind else {
            return None;
        };
        let mut path = name.clone();
        for lookup in lookups {
            match lookup {
                Lookup::Property(prop) => {
                    path.push('.');
                    path.push_str(prop);
                }
                Lookup::Index(_) => return None,
            }
        }
        Some(path)
    }

    /// Root variable name of a lookup.
    pub fn root_name(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Variable { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// Expression variants.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ExprKind {
    /// `product.title`, `items[0]`, `settings[key].value`
    Variable { name: String, lookups: Vec<Lookup> },

    /// `'hello'`, `"world"`
    String { value: String },

    /// `42`, `3.14`, `-1`
    Number { value: f64 },

    /// `true`, `false`
    Boolean { value: bool },

    /// `nil`, `null`, `blank`, `empty`
    Nil,

    /// `(1..5)`, `(1..limit)`
    Range {
        start: Box<Expression>,
        end: Box<Expression>,
    },

    /// `a == b`, `a and b`, `tags contains 'sale'`
    Binary {
        left: Box<Expression>,
        operator: BinaryOperator,
        right: Box<Expression>,
    },
}

/// One accessor in a variable lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value")]
pub enum Lookup {
    /// `.name`
    Property(String),
    /// `[expr]`
    Index(Box<Expression>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinaryOperator {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    NotEq,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "and")]
    And,
    #[serde(rename = "or")]
    Or,
}

impl BinaryOperator {
    /// Map an operator lexeme to its variant. `<>` is an alias for `!=`.
    pub fn from_lexeme(op: &str) -> Option<Self> {
        match op {
            "==" => Some(BinaryOperator::Eq),
            "!=" | "<>" => Some(BinaryOperator::NotEq),
            "<" => Some(BinaryOperator::Lt),
            ">" => Some(BinaryOperator::Gt),
            "<=" => Some(BinaryOperator::Lte),
            ">=" => Some(BinaryOperator::Gte),
            "contains" => Some(BinaryOperator::Contains),
            "and" => Some(BinaryOperator::And),
            "or" => Some(BinaryOperator::Or),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOperator::Eq => "==",
            BinaryOperator::NotEq => "!=",
            BinaryOperator::Lt => "<",
            BinaryOperator::Gt => ">",
            BinaryOperator::Lte => "<=",
            BinaryOperator::Gte => ">=",
            BinaryOperator::Contains => "contains",
            BinaryOperator::And => "and",
            BinaryOperator::Or => "or",
        }
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOperator::And | BinaryOperator::Or)
    }
}

/// `| name: arg, arg, key: value`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterApplication {
    pub name: String,
    pub args: Vec<Expression>,
    pub keyword_args: Vec<KeywordArgument>,
    pub loc: SourceLocation,
}
