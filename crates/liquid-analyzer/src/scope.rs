//! Lexical scope tracking.
//!
//! A stack of name → variable frames. Depth 0 is the global frame and is
//! never popped. Loops and Shopify blocks that expose implicit objects
//! (`forloop`, `paginate`, `form`) open a frame; `assign` and `capture` write
//! into whichever frame is current.

use crate::types::{element_type, Resolution, TypeChecker, ANY};
use liquid_parser::{ExprKind, Expression, FilterApplication, Node};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopedVariable {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

/// Stack of variable frames.
#[derive(Debug, Clone)]
pub struct ScopeTracker<'a> {
    scopes: Vec<HashMap<String, ScopedVariable>>,
    types: Option<TypeChecker<'a>>,
}

impl Default for ScopeTracker<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> ScopeTracker<'a> {
    /// Tracker with only the global frame. Lookup types stay provisional.
    pub fn new() -> Self {
        Self {
            scopes: vec![HashMap::new()],
            types: None,
        }
    }

    /// Tracker that resolves bound types through `types`.
    pub fn with_types(types: TypeChecker<'a>) -> Self {
        Self {
            scopes: vec![HashMap::new()],
            types: Some(types),
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    /// Drop the innermost frame. The global frame stays.
    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Bind `name` in the innermost frame, shadowing outer bindings.
    pub fn add_variable(&mut self, name: impl Into<String>, ty: impl Into<String>) {
        let name = name.into();
        let variable = ScopedVariable {
            name: name.clone(),
            ty: ty.into(),
        };
        if let Some(frame) = self.scopes.last_mut() {
            frame.insert(name, variable);
        }
    }

    /// Innermost binding of `name`.
    pub fn get_variable(&self, name: &str) -> Option<&ScopedVariable> {
        self.scopes.iter().rev().find_map(|frame| frame.get(name))
    }

    pub fn current_depth(&self) -> usize {
        self.scopes.len() - 1
    }

    /// Bind everything `nodes` declares at the top level, leaving the tracker
    /// at the depth it started at.
    pub fn build_from_ast(&mut self, nodes: &[Node]) {
        self.build_from_ast_with(nodes, &mut |_, _| {});
    }

    /// Like [`build_from_ast`](Self::build_from_ast), calling `visit` on every
    /// node with the bindings in force where that node appears.
    pub fn build_from_ast_with<F>(&mut self, nodes: &[Node], visit: &mut F)
    where
        F: FnMut(&Node, &ScopeTracker<'a>),
    {
        for node in nodes {
            visit(node, &*self);

            match node {
                Node::Assign(n) => {
                    let ty = self.expression_type(&n.value, &n.filters);
                    self.add_variable(&n.name, ty);
                }
                Node::Capture(n) => {
                    self.build_from_ast_with(&n.body, visit);
                    self.add_variable(&n.name, "string");
                }
                Node::Increment(n) | Node::Decrement(n) => {
                    self.add_variable(&n.name, "number");
                }
                Node::For(n) => {
                    self.push_scope();
                    let item = self.collection_element_type(&n.collection);
                    self.add_variable(&n.variable, item);
                    self.add_variable("forloop", "forloop");
                    self.build_from_ast_with(&n.body, visit);
                    self.pop_scope();

                    if let Some(else_body) = &n.else_body {
                        self.build_from_ast_with(else_body, visit);
                    }
                }
                Node::TableRow(n) => {
                    self.push_scope();
                    let item = self.collection_element_type(&n.collection);
                    self.add_variable(&n.variable, item);
                    self.add_variable("tablerowloop", "tablerowloop");
                    self.build_from_ast_with(&n.body, visit);
                    self.pop_scope();
                }
                Node::Paginate(n) => {
                    self.push_scope();
                    self.add_variable("paginate", "paginate");
                    self.build_from_ast_with(&n.body, visit);
                    self.pop_scope();
                }
                Node::Form(n) => {
                    self.push_scope();
                    self.add_variable("form", "form");
                    self.build_from_ast_with(&n.body, visit);
                    self.pop_scope();
                }
                Node::If(n) | Node::Unless(n) => {
                    for branch in &n.branches {
                        self.build_from_ast_with(&branch.body, visit);
                    }
                }
                Node::Case(n) => {
                    for when in &n.whens {
                        self.build_from_ast_with(&when.body, visit);
                    }
                    if let Some(else_body) = &n.else_body {
                        self.build_from_ast_with(else_body, visit);
                    }
                }
                Node::Text(_)
                | Node::Output(_)
                | Node::Echo(_)
                | Node::Raw(_)
                | Node::Comment(_)
                | Node::Render(_)
                | Node::Include(_)
                | Node::Section(_)
                | Node::Schema(_)
                | Node::Layout(_)
                | Node::Style(_)
                | Node::JavaScript(_)
                | Node::Stylesheet(_)
                | Node::Break(_)
                | Node::Continue(_)
                | Node::LiquidTag(_) => {}
            }
        }
    }

    /// Raw type of a lookup, via bound variables first and then the schema.
    /// `None` when the root is neither.
    pub fn lookup_type(&self, expr: &Expression) -> Option<String> {
        let ExprKind::Variable { name, .. } = &expr.kind else {
            return None;
        };
        let path = expr.dotted_path()?;
        let properties: Vec<&str> = path.split('.').skip(1).collect();

        let base = match self.get_variable(name) {
            Some(variable) => variable.ty.clone(),
            None => {
                let types = self.types.as_ref()?;
                if !types.schema().has_object(name) {
                    return None;
                }
                name.clone()
            }
        };

        match &self.types {
            Some(types) => match types.resolve(&base, &properties) {
                Resolution::Type(ty) => Some(ty),
                Resolution::UnknownProperty { .. } => None,
            },
            None if properties.is_empty() => Some(base),
            None => None,
        }
    }

    /// Structural type of `value | filters`.
    fn expression_type(&self, value: &Expression, filters: &[FilterApplication]) -> String {
        if let (Some(types), Some(_)) = (&self.types, filters.last()) {
            return types.filter_chain_type(ANY, filters.iter().map(|f| f.name.as_str()));
        }

        match &value.kind {
            ExprKind::String { .. } => "string".into(),
            ExprKind::Number { .. } => "number".into(),
            ExprKind::Boolean { .. } => "boolean".into(),
            ExprKind::Nil => "nil".into(),
            ExprKind::Range { .. } => "array".into(),
            ExprKind::Binary { .. } => "boolean".into(),
            ExprKind::Variable { .. } => match (&self.types, value.dotted_path()) {
                (Some(_), _) => self.lookup_type(value).unwrap_or_else(|| ANY.into()),
                // Provisional: the name of what it was assigned from
                (None, Some(path)) => path,
                (None, None) => ANY.into(),
            },
        }
    }

    fn collection_element_type(&self, collection: &Expression) -> String {
        if let ExprKind::Range { .. } = collection.kind {
            return "number".into();
        }
        self.lookup_type(collection)
            .as_deref()
            .and_then(element_type)
            .unwrap_or(ANY)
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use liquid_parser::parse;
    use pretty_assertions::assert_eq;

    fn type_of<'a>(scope: &'a ScopeTracker, name: &str) -> Option<&'a str> {
        scope.get_variable(name).map(|v| v.ty.as_str())
    }

    // =========================================================================
    // Frames
    // =========================================================================

    #[test]
    fn test_scope_nesting_and_shadowing() {
        let mut scope = ScopeTracker::new();
        scope.add_variable("x", "number");
        scope.push_scope();
        scope.add_variable("x", "string");
        assert_eq!(type_of(&scope, "x"), Some("string"));
        assert_eq!(scope.current_depth(), 1);

        scope.pop_scope();
        assert_eq!(type_of(&scope, "x"), Some("number"));

        scope.pop_scope();
        scope.pop_scope();
        assert_eq!(scope.current_depth(), 0);
        assert_eq!(type_of(&scope, "x"), Some("number"));
    }

    #[test]
    fn test_outer_binding_visible_inside() {
        let mut scope = ScopeTracker::new();
        scope.add_variable("outer", "string");
        scope.push_scope();
        assert_eq!(type_of(&scope, "outer"), Some("string"));
        assert_eq!(scope.get_variable("missing"), None);
    }

    // =========================================================================
    // AST walk
    // =========================================================================

    #[test]
    fn test_assign_literal_types() {
        let ast = parse("{% assign a = 'x' %}{% assign b = 2 %}{% assign c = (1..3) %}{% assign d = x == 1 %}").ast;
        let mut scope = ScopeTracker::new();
        scope.build_from_ast(&ast);
        assert_eq!(type_of(&scope, "a"), Some("string"));
        assert_eq!(type_of(&scope, "b"), Some("number"));
        assert_eq!(type_of(&scope, "c"), Some("array"));
        assert_eq!(type_of(&scope, "d"), Some("boolean"));
    }

    #[test]
    fn test_assign_lookup_is_provisional_without_types() {
        let ast = parse("{% assign p = product %}{% assign t = product.title %}").ast;
        let mut scope = ScopeTracker::new();
        scope.build_from_ast(&ast);
        assert_eq!(type_of(&scope, "p"), Some("product"));
        assert_eq!(type_of(&scope, "t"), Some("product.title"));
    }

    #[test]
    fn test_assign_lookup_resolved_with_types() {
        let ast = parse("{% assign t = product.title %}{% assign n = product.title | size %}").ast;
        let mut scope = ScopeTracker::with_types(TypeChecker::standard());
        scope.build_from_ast(&ast);
        assert_eq!(type_of(&scope, "t"), Some("string"));
        assert_eq!(type_of(&scope, "n"), Some("number"));
    }

    #[test]
    fn test_capture_binds_string_in_current_frame() {
        let ast = parse("{% capture greeting %}hi{% endcapture %}").ast;
        let mut scope = ScopeTracker::new();
        scope.build_from_ast(&ast);
        assert_eq!(type_of(&scope, "greeting"), Some("string"));
        assert_eq!(scope.current_depth(), 0);
    }

    #[test]
    fn test_for_scope_is_popped() {
        let ast = parse("{% for item in collection.products %}{% assign inner = 1 %}{% endfor %}").ast;
        let mut scope = ScopeTracker::with_types(TypeChecker::standard());
        scope.build_from_ast(&ast);
        assert_eq!(scope.current_depth(), 0);
        assert_eq!(scope.get_variable("item"), None);
        assert_eq!(scope.get_variable("inner"), None);
    }

    #[test]
    fn test_visitor_sees_loop_bindings() {
        let ast = parse("{% for item in collection.products %}{{ item.title }}{% endfor %}{{ item }}").ast;
        let mut scope = ScopeTracker::with_types(TypeChecker::standard());
        let mut seen = Vec::new();
        scope.build_from_ast_with(&ast, &mut |node, scope| {
            if let Node::Output(_) = node {
                seen.push((
                    scope.current_depth(),
                    type_of(scope, "item").map(str::to_string),
                    type_of(scope, "forloop").map(str::to_string),
                ));
            }
        });
        assert_eq!(
            seen,
            vec![
                (1, Some("product".to_string()), Some("forloop".to_string())),
                (0, None, None),
            ]
        );
    }

    #[test]
    fn test_unknown_collection_binds_any() {
        let ast = parse("{% for x in mystery %}{{ x }}{% endfor %}").ast;
        let mut scope = ScopeTracker::with_types(TypeChecker::standard());
        let mut item = None;
        scope.build_from_ast_with(&ast, &mut |node, scope| {
            if let Node::Output(_) = node {
                item = type_of(scope, "x").map(str::to_string);
            }
        });
        assert_eq!(item.as_deref(), Some("any"));
    }

    #[test]
    fn test_paginate_form_and_tablerow_bindings() {
        let ast = parse(
            "{% paginate collection.products by 4 %}{{ paginate.pages }}{% endpaginate %}\
             {% form 'contact' %}{{ form.errors }}{% endform %}\
             {% tablerow p in collection.products %}{{ tablerowloop.col }}{% endtablerow %}",
        )
        .ast;
        let mut scope = ScopeTracker::new();
        let mut bound = Vec::new();
        scope.build_from_ast_with(&ast, &mut |node, scope| {
            if let Node::Output(out) = node {
                let root = out.expression.root_name().unwrap_or_default();
                bound.push(scope.get_variable(root).is_some());
            }
        });
        assert_eq!(bound, vec![true, true, true]);
        assert_eq!(scope.current_depth(), 0);
    }

    #[test]
    fn test_lookup_type_through_binding() {
        let ast = parse("{% assign v = product.variants.first %}").ast;
        let mut scope = ScopeTracker::with_types(TypeChecker::standard());
        scope.build_from_ast(&ast);
        let expr = parse("{{ v.price }}").ast;
        let Node::Output(out) = &expr[0] else {
            panic!("Expected Output");
        };
        assert_eq!(scope.lookup_type(&out.expression).as_deref(), Some("number"));
    }
}
