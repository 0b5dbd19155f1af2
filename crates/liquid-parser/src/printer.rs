//! AST printer.
//!
//! Re-serializes an AST back into Liquid markup. Output is whitespace
//! normalized (`{{ x }}`, `{% tag markup %}`), so it is structurally rather
//! than byte-for-byte equivalent to the original source. Text nodes are
//! printed verbatim.

use crate::ast::{
    ConditionalNode, ExprKind, Expression, FilterApplication, KeywordArgument, Lookup, Node,
    PartialNode,
};
use crate::expr_lexer::{ExprLexer, TokenKind};

/// Print a list of nodes as Liquid source.
pub fn ast_to_string(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        print_node(node, &mut out);
    }
    out
}

fn print_node(node: &Node, out: &mut String) {
    match node {
        Node::Text(n) => out.push_str(&n.value),
        Node::Output(n) => {
            out.push_str("{{ ");
            out.push_str(&expression_to_string(&n.expression));
            out.push_str(&filters_to_string(&n.filters));
            out.push_str(" }}");
        }
        Node::Echo(n) => {
            let markup = format!(
                "{}{}",
                expression_to_string(&n.expression),
                filters_to_string(&n.filters)
            );
            push_tag(out, "echo", &markup);
        }
        Node::Assign(n) => {
            let markup = format!(
                "{} = {}{}",
                n.name,
                expression_to_string(&n.value),
                filters_to_string(&n.filters)
            );
            push_tag(out, "assign", &markup);
        }
        Node::If(n) => print_conditional(n, "if", out),
        Node::Unless(n) => print_conditional(n, "unless", out),
        Node::For(n) => {
            let mut markup = format!("{} in {}", n.variable, expression_to_string(&n.collection));
            if n.reversed {
                markup.push_str(" reversed");
            }
            push_modifier(&mut markup, "limit", n.limit.as_ref());
            push_modifier(&mut markup, "offset", n.offset.as_ref());
            push_tag(out, "for", &markup);
            print_body(&n.body, out);
            if let Some(else_body) = &n.else_body {
                push_tag(out, "else", "");
                print_body(else_body, out);
            }
            push_tag(out, "endfor", "");
        }
        Node::Case(n) => {
            push_tag(out, "case", &expression_to_string(&n.subject));
            for when in &n.whens {
                let values: Vec<String> = when.values.iter().map(expression_to_string).collect();
                push_tag(out, "when", &values.join(", "));
                print_body(&when.body, out);
            }
            if let Some(else_body) = &n.else_body {
                push_tag(out, "else", "");
                print_body(else_body, out);
            }
            push_tag(out, "endcase", "");
        }
        Node::Capture(n) => {
            push_tag(out, "capture", &capture_name(&n.name));
            print_body(&n.body, out);
            push_tag(out, "endcapture", "");
        }
        Node::Raw(n) => print_raw_content("raw", &n.content, out),
        Node::Schema(n) => print_raw_content("schema", &n.content, out),
        Node::Style(n) => print_raw_content("style", &n.content, out),
        Node::JavaScript(n) => print_raw_content("javascript", &n.content, out),
        Node::Stylesheet(n) => print_raw_content("stylesheet", &n.content, out),
        Node::Comment(n) if n.inline => push_tag(out, "#", &n.text),
        Node::Comment(n) => print_raw_content("comment", &n.text, out),
        Node::Render(n) => push_tag(out, "render", &partial_markup(n)),
        Node::Include(n) => push_tag(out, "include", &partial_markup(n)),
        Node::Section(n) => push_tag(out, "section", &quote(&n.name)),
        Node::Form(n) => {
            let mut parts = vec![expression_to_string(&n.form_type)];
            parts.extend(n.arguments.iter().map(expression_to_string));
            parts.extend(n.attributes.iter().map(keyword_argument_to_string));
            push_tag(out, "form", &parts.join(", "));
            print_body(&n.body, out);
            push_tag(out, "endform", "");
        }
        Node::Paginate(n) => {
            let markup = format!(
                "{} by {}",
                expression_to_string(&n.collection),
                expression_to_string(&n.page_size)
            );
            push_tag(out, "paginate", &markup);
            print_body(&n.body, out);
            push_tag(out, "endpaginate", "");
        }
        Node::TableRow(n) => {
            let mut markup = format!("{} in {}", n.variable, expression_to_string(&n.collection));
            push_modifier(&mut markup, "cols", n.cols.as_ref());
            push_modifier(&mut markup, "limit", n.limit.as_ref());
            push_modifier(&mut markup, "offset", n.offset.as_ref());
            push_tag(out, "tablerow", &markup);
            print_body(&n.body, out);
            push_tag(out, "endtablerow", "");
        }
        Node::Layout(n) => push_tag(out, "layout", &expression_to_string(&n.name)),
        Node::Increment(n) => push_tag(out, "increment", &n.name),
        Node::Decrement(n) => push_tag(out, "decrement", &n.name),
        Node::Break(_) => push_tag(out, "break", ""),
        Node::Continue(_) => push_tag(out, "continue", ""),
        Node::LiquidTag(n) => push_tag(out, &n.name, &n.markup),
    }
}

fn print_body(nodes: &[Node], out: &mut String) {
    for node in nodes {
        print_node(node, out);
    }
}

fn print_conditional(node: &ConditionalNode, tag: &str, out: &mut String) {
    for (i, branch) in node.branches.iter().enumerate() {
        match (&branch.condition, i) {
            (Some(condition), 0) => push_tag(out, tag, &expression_to_string(condition)),
            (Some(condition), _) => push_tag(out, "elsif", &expression_to_string(condition)),
            (None, _) => push_tag(out, "else", ""),
        }
        print_body(&branch.body, out);
    }
    push_tag(out, &format!("end{tag}"), "");
}

fn print_raw_content(tag: &str, content: &str, out: &mut String) {
    push_tag(out, tag, "");
    out.push_str(content);
    push_tag(out, &format!("end{tag}"), "");
}

fn push_tag(out: &mut String, name: &str, markup: &str) {
    out.push_str("{% ");
    out.push_str(name);
    if !markup.is_empty() {
        out.push(' ');
        out.push_str(markup);
    }
    out.push_str(" %}");
}

fn push_modifier(markup: &mut String, name: &str, value: Option<&Expression>) {
    if let Some(value) = value {
        markup.push_str(&format!(" {name}: {}", expression_to_string(value)));
    }
}

fn partial_markup(node: &PartialNode) -> String {
    let mut markup = expression_to_string(&node.template);
    if let Some(binding) = &node.binding {
        markup.push_str(&format!(
            " {} {}",
            binding.kind.as_str(),
            expression_to_string(&binding.expression)
        ));
        if let Some(alias) = &binding.alias {
            markup.push_str(&format!(" as {alias}"));
        }
    }
    for argument in &node.arguments {
        markup.push_str(", ");
        markup.push_str(&keyword_argument_to_string(argument));
    }
    markup
}

/// Print an expression as Liquid source.
pub fn expression_to_string(expr: &Expression) -> String {
    match &expr.kind {
        ExprKind::Variable { name, lookups } => {
            let mut s = name.clone();
            for lookup in lookups {
                match lookup {
                    Lookup::Property(prop) => {
                        s.push('.');
                        s.push_str(prop);
                    }
                    Lookup::Index(index) => {
                        s.push('[');
                        s.push_str(&expression_to_string(index));
                        s.push(']');
                    }
                }
            }
            s
        }
        ExprKind::String { value } => quote(value),
        ExprKind::Number { value } => format_number(*value),
        ExprKind::Boolean { value } => value.to_string(),
        ExprKind::Nil => "nil".into(),
        ExprKind::Range { start, end } => format!(
            "({}..{})",
            expression_to_string(start),
            expression_to_string(end)
        ),
        ExprKind::Binary {
            left,
            operator,
            right,
        } => format!(
            "{} {} {}",
            expression_to_string(left),
            operator.as_str(),
            expression_to_string(right)
        ),
    }
}

fn filters_to_string(filters: &[FilterApplication]) -> String {
    let mut s = String::new();
    for filter in filters {
        s.push_str(" | ");
        s.push_str(&filter.name);

        let args: Vec<String> = filter
            .args
            .iter()
            .map(expression_to_string)
            .chain(filter.keyword_args.iter().map(keyword_argument_to_string))
            .collect();
        if !args.is_empty() {
            s.push_str(": ");
            s.push_str(&args.join(", "));
        }
    }
    s
}

fn keyword_argument_to_string(arg: &KeywordArgument) -> String {
    format!("{}: {}", arg.name, expression_to_string(&arg.value))
}

/// Liquid strings have no escapes, so pick the quote the value does not contain.
fn quote(value: &str) -> String {
    if value.contains('\'') {
        format!("\"{value}\"")
    } else {
        format!("'{value}'")
    }
}

/// A capture name prints bare only when it reads back as a plain variable.
fn capture_name(name: &str) -> String {
    let tokens = ExprLexer::tokenize(name, 0);
    let bare = matches!(
        tokens.as_slice(),
        [only, eof] if only.identifier() == Some(name) && eof.kind == TokenKind::Eof
    ) && !matches!(name, "true" | "false" | "nil" | "null" | "blank" | "empty");

    if bare {
        name.to_string()
    } else {
        quote(name)
    }
}

/// Largest magnitude below which every whole `f64` is an exact integer.
const EXACT_INTEGER_LIMIT: f64 = 9_007_199_254_740_992.0;

/// Format a number, dropping the fraction for whole values.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < EXACT_INTEGER_LIMIT {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}
