//! Binding-aware name resolution.
//!
//! Every name reference is resolved to a binding id during one ordered walk:
//! `set` binds from its statement to the end of the enclosing body (rebinding
//! in the same frame reuses the binding), `for` targets and macro parameters
//! live only inside their bodies, and anything unresolved becomes an implicit
//! context binding in the root frame. References and rename operate on
//! binding identity, so an outer `x` never captures a loop-local `x`.

use std::collections::HashMap;

use analyzer::Span;
use analyzer::ast::{Expr, ExprKind, Stmt, StmtKind, Target, TargetKind, Template};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Set,
    ForLoop,
    MacroParam,
    Macro,
    Context,
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub id: u32,
    pub name: String,
    pub kind: BindingKind,
    pub def_span: Option<Span>,
}

#[derive(Debug, Clone, Copy)]
pub struct NameOccurrence {
    pub span: Span,
    pub binding: u32,
}

#[derive(Debug, Default)]
pub struct ScopeMap {
    pub bindings: Vec<Binding>,
    pub occurrences: Vec<NameOccurrence>,
}

impl ScopeMap {
    pub fn build(template: &Template) -> ScopeMap {
        let mut builder = ScopeBuilder {
            map: ScopeMap::default(),
            frames: vec![HashMap::new()],
        };
        builder.walk_body(&template.body);
        builder.map
    }

    /// The binding and exact span under a byte offset (reference or
    /// definition site).
    pub fn symbol_at(&self, offset: u32) -> Option<(&Binding, Span)> {
        for occurrence in &self.occurrences {
            if occurrence.span.touches(offset) && !occurrence.span.is_empty() {
                let binding = self.bindings.get(occurrence.binding as usize)?;
                return Some((binding, occurrence.span));
            }
        }
        for binding in &self.bindings {
            if let Some(span) = binding.def_span {
                if span.touches(offset) && !span.is_empty() {
                    return Some((binding, span));
                }
            }
        }
        None
    }

    pub fn binding_at(&self, offset: u32) -> Option<&Binding> {
        self.symbol_at(offset).map(|(binding, _)| binding)
    }

    /// Definition site plus every reference of a binding, in source order.
    pub fn spans_of(&self, binding_id: u32) -> Vec<Span> {
        let mut spans = Vec::new();
        if let Some(binding) = self.bindings.get(binding_id as usize) {
            if let Some(span) = binding.def_span {
                spans.push(span);
            }
        }
        for occurrence in &self.occurrences {
            if occurrence.binding == binding_id {
                spans.push(occurrence.span);
            }
        }
        spans.sort_by_key(|s| (s.start, s.end));
        spans.dedup();
        spans
    }
}

struct ScopeBuilder {
    map: ScopeMap,
    frames: Vec<HashMap<String, u32>>,
}

impl ScopeBuilder {
    fn define(&mut self, name: &str, kind: BindingKind, span: Option<Span>) -> u32 {
        if kind == BindingKind::Set {
            // Re-assignment in the same frame is the same symbol; the new
            // target span still counts as an occurrence for rename.
            if let Some(&id) = self.frames.last().and_then(|f| f.get(name)) {
                if let Some(span) = span {
                    self.map.occurrences.push(NameOccurrence { span, binding: id });
                }
                return id;
            }
        }
        let id = self.map.bindings.len() as u32;
        self.map.bindings.push(Binding {
            id,
            name: name.to_string(),
            kind,
            def_span: span,
        });
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.to_string(), id);
        }
        id
    }

    fn resolve(&mut self, name: &str) -> u32 {
        for frame in self.frames.iter().rev() {
            if let Some(&id) = frame.get(name) {
                return id;
            }
        }
        // Unresolved names are context variables rooted at the outermost frame.
        let id = self.map.bindings.len() as u32;
        self.map.bindings.push(Binding {
            id,
            name: name.to_string(),
            kind: BindingKind::Context,
            def_span: None,
        });
        if let Some(frame) = self.frames.first_mut() {
            frame.insert(name.to_string(), id);
        }
        id
    }

    fn reference(&mut self, name: &str, span: Span) {
        let id = self.resolve(name);
        self.map.occurrences.push(NameOccurrence { span, binding: id });
    }

    fn walk_body(&mut self, body: &[Stmt]) {
        for stmt in body {
            self.walk_stmt(stmt);
        }
    }

    fn walk_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Text { .. } | StmtKind::Comment { .. } | StmtKind::Raw { .. } => {}
            StmtKind::Output { expr, .. } => self.walk_expr(expr),
            StmtKind::If {
                test,
                body,
                else_body,
                ..
            } => {
                self.walk_expr(test);
                self.walk_body(body);
                self.walk_body(else_body);
            }
            StmtKind::For {
                target,
                iter,
                body,
                else_body,
            } => {
                // The iterable is evaluated in the enclosing scope.
                self.walk_expr(iter);
                self.frames.push(HashMap::new());
                self.bind_target(target, BindingKind::ForLoop);
                self.walk_body(body);
                self.frames.pop();
                self.walk_body(else_body);
            }
            StmtKind::Set { target, value } => {
                // The value sees the previous binding (`set x = x + 1`).
                self.walk_expr(value);
                self.bind_target(target, BindingKind::Set);
            }
            StmtKind::SetBlock { target, body } => {
                self.walk_body(body);
                self.bind_target(target, BindingKind::Set);
            }
            StmtKind::Block { body, .. } => self.walk_body(body),
            StmtKind::Extends { template } | StmtKind::Include { template, .. } => {
                self.walk_expr(template);
            }
            StmtKind::Import { template, alias } => {
                self.walk_expr(template);
                self.define(&alias.node.text, BindingKind::Macro, Some(alias.span));
            }
            StmtKind::FromImport {
                template, names, ..
            } => {
                self.walk_expr(template);
                for import in names {
                    let (name, span) = match &import.alias {
                        Some(alias) => (&alias.node.text, alias.span),
                        None => (&import.name.node.text, import.name.span),
                    };
                    self.define(name, BindingKind::Macro, Some(span));
                }
            }
            StmtKind::Macro { name, params, body } => {
                self.define(&name.node.text, BindingKind::Macro, Some(name.span));
                self.frames.push(HashMap::new());
                for param in params {
                    if let Some(default) = &param.default {
                        self.walk_expr(default);
                    }
                    self.define(
                        &param.name.node.text,
                        BindingKind::MacroParam,
                        Some(param.name.span),
                    );
                }
                self.walk_body(body);
                self.frames.pop();
            }
            StmtKind::CallBlock {
                callee,
                args,
                kwargs,
                body,
            } => {
                self.walk_expr(callee);
                for arg in args {
                    self.walk_expr(arg);
                }
                for kwarg in kwargs {
                    self.walk_expr(&kwarg.value);
                }
                self.walk_body(body);
            }
            StmtKind::CustomTag {
                args, kwargs, body, ..
            } => {
                for arg in args {
                    self.walk_expr(arg);
                }
                for kwarg in kwargs {
                    self.walk_expr(&kwarg.value);
                }
                self.walk_body(body);
            }
        }
    }

    fn bind_target(&mut self, target: &Target, kind: BindingKind) {
        match &target.kind {
            TargetKind::Name(sym) => {
                self.define(&sym.text, kind, Some(target.span));
            }
            TargetKind::Tuple(items) => {
                for item in items {
                    self.bind_target(item, kind);
                }
            }
            // `set a.b = …` references the base binding instead of creating one.
            TargetKind::GetAttr { .. } | TargetKind::GetItem { .. } => self.target_ref(target),
            TargetKind::Error => {}
        }
    }

    fn target_ref(&mut self, target: &Target) {
        match &target.kind {
            TargetKind::Name(sym) => self.reference(&sym.text, target.span),
            TargetKind::GetAttr { target: inner, .. } => self.target_ref(inner),
            TargetKind::GetItem { target: inner, index } => {
                self.target_ref(inner);
                self.walk_expr(index);
            }
            TargetKind::Tuple(items) => {
                for item in items {
                    self.target_ref(item);
                }
            }
            TargetKind::Error => {}
        }
    }

    fn walk_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Name(sym) => self.reference(&sym.text, expr.span),
            ExprKind::Lit(_) | ExprKind::Error => {}
            ExprKind::Unary { expr: inner, .. } | ExprKind::Group { inner } => {
                self.walk_expr(inner)
            }
            ExprKind::Binary { left, right, .. } => {
                self.walk_expr(left);
                self.walk_expr(right);
            }
            ExprKind::Call {
                callee,
                args,
                kwargs,
            } => {
                self.walk_expr(callee);
                for arg in args {
                    self.walk_expr(arg);
                }
                for kwarg in kwargs {
                    self.walk_expr(&kwarg.value);
                }
            }
            // Filter and test names live in their own namespaces.
            ExprKind::Filter {
                expr: inner,
                args,
                kwargs,
                ..
            }
            | ExprKind::Test {
                expr: inner,
                args,
                kwargs,
                ..
            } => {
                self.walk_expr(inner);
                for arg in args {
                    self.walk_expr(arg);
                }
                for kwarg in kwargs {
                    self.walk_expr(&kwarg.value);
                }
            }
            ExprKind::GetAttr { target, .. } => self.walk_expr(target),
            ExprKind::GetItem { target, index } => {
                self.walk_expr(target);
                self.walk_expr(index);
            }
            ExprKind::List { items } | ExprKind::Tuple { items } => {
                for item in items {
                    self.walk_expr(item);
                }
            }
            ExprKind::Dict { pairs } => {
                for (key, value) in pairs {
                    self.walk_expr(key);
                    self.walk_expr(value);
                }
            }
        }
    }
}
