//! Typed template AST.
//!
//! Statements and expressions are sealed sum types; every node carries a
//! [`Span`] covering all of its constituent tokens and a [`NodeId`] allocated
//! by the parser in visit order. Recovery is represented in-tree:
//! [`ExprKind::Error`] and [`TargetKind::Error`] are spanned placeholders, so
//! a template with syntax errors still has a maximally-reconstructed body.

use crate::lexer::Symbol;
use crate::span::{Span, Spanned};

pub type NodeId = u32;

#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub body: Vec<Stmt>,
    pub span: Span,
}

/// Whitespace-trim markers attached to an output delimiter pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Trim {
    pub left: bool,
    pub right: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub id: NodeId,
    pub span: Span,
    pub kind: StmtKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MacroParam {
    pub name: Spanned<Symbol>,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportName {
    pub name: Spanned<Symbol>,
    pub alias: Option<Spanned<Symbol>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// Raw template text, with any adjacent trim markers already applied.
    Text { text: String },
    /// `{# … #}` — the full lexeme is kept for the formatter.
    Comment { text: String },
    Output {
        expr: Expr,
        trim: Trim,
    },
    If {
        test: Expr,
        body: Vec<Stmt>,
        else_body: Vec<Stmt>,
        /// True when this node was written as `{% elif … %}` inside an
        /// enclosing `if`; pretty-printers re-emit `elif` instead of
        /// `else` + nested `if`.
        is_elif: bool,
    },
    For {
        target: Target,
        iter: Expr,
        body: Vec<Stmt>,
        else_body: Vec<Stmt>,
    },
    Set {
        target: Target,
        value: Expr,
    },
    SetBlock {
        target: Target,
        body: Vec<Stmt>,
    },
    Block {
        name: Spanned<Symbol>,
        body: Vec<Stmt>,
        /// Optional trailing name on `{% endblock name %}`. Mismatches are
        /// deferred to the linter.
        end_name: Option<Spanned<Symbol>>,
    },
    Extends {
        template: Expr,
    },
    Include {
        template: Expr,
        with_context: bool,
        ignore_missing: bool,
    },
    Import {
        template: Expr,
        alias: Spanned<Symbol>,
    },
    FromImport {
        template: Expr,
        names: Vec<ImportName>,
        with_context: bool,
    },
    Macro {
        name: Spanned<Symbol>,
        params: Vec<MacroParam>,
        body: Vec<Stmt>,
    },
    CallBlock {
        callee: Expr,
        args: Vec<Expr>,
        kwargs: Vec<Kwarg>,
        body: Vec<Stmt>,
    },
    /// Verbatim concatenation of the inner token lexemes; nothing inside is
    /// interpreted.
    Raw { text: String },
    CustomTag {
        name: Spanned<Symbol>,
        args: Vec<Expr>,
        kwargs: Vec<Kwarg>,
        body: Vec<Stmt>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOpKind {
    Not,
    Neg,
    Pos,
}

pub type UnOp = Spanned<UnOpKind>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOpKind {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
    Add,
    Sub,
    /// `~` string concatenation.
    Concat,
    Mul,
    Div,
    FloorDiv,
    Rem,
    Pow,
}

pub type BinOp = Spanned<BinOpKind>;

#[derive(Debug, Clone, PartialEq)]
pub enum LitKind {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Kwarg {
    pub name: Spanned<Symbol>,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub id: NodeId,
    pub span: Span,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Name(Symbol),
    Lit(LitKind),
    Unary {
        op: UnOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Group {
        inner: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        kwargs: Vec<Kwarg>,
    },
    Filter {
        expr: Box<Expr>,
        name: Spanned<Symbol>,
        args: Vec<Expr>,
        kwargs: Vec<Kwarg>,
    },
    Test {
        expr: Box<Expr>,
        name: Spanned<Symbol>,
        args: Vec<Expr>,
        kwargs: Vec<Kwarg>,
        negated: bool,
    },
    GetAttr {
        target: Box<Expr>,
        name: Spanned<Symbol>,
    },
    GetItem {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    List {
        items: Vec<Expr>,
    },
    Tuple {
        items: Vec<Expr>,
    },
    Dict {
        pairs: Vec<(Expr, Expr)>,
    },
    Error,
}

/// The subset of expressions permitted on the left of `set` / `for`.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub id: NodeId,
    pub span: Span,
    pub kind: TargetKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TargetKind {
    Name(Symbol),
    GetAttr {
        target: Box<Target>,
        name: Spanned<Symbol>,
    },
    GetItem {
        target: Box<Target>,
        index: Box<Expr>,
    },
    Tuple(Vec<Target>),
    Error,
}

/// AST walk with cooperative cancellation.
///
/// Override the `visit_*` hooks you care about and call the matching `walk_*`
/// to descend. `should_cancel` is polled between node visits; when it returns
/// true the walk stops early with whatever the visitor accumulated so far.
pub trait Visitor {
    fn should_cancel(&self) -> bool {
        false
    }

    fn visit_template(&mut self, template: &Template) {
        walk_template(self, template);
    }

    fn visit_stmt(&mut self, stmt: &Stmt) {
        walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        walk_expr(self, expr);
    }

    fn visit_target(&mut self, target: &Target) {
        walk_target(self, target);
    }
}

pub fn walk_template<V: Visitor + ?Sized>(v: &mut V, template: &Template) {
    walk_body(v, &template.body);
}

pub fn walk_body<V: Visitor + ?Sized>(v: &mut V, body: &[Stmt]) {
    for stmt in body {
        if v.should_cancel() {
            return;
        }
        v.visit_stmt(stmt);
    }
}

pub fn walk_stmt<V: Visitor + ?Sized>(v: &mut V, stmt: &Stmt) {
    if v.should_cancel() {
        return;
    }
    match &stmt.kind {
        StmtKind::Text { .. } | StmtKind::Comment { .. } | StmtKind::Raw { .. } => {}
        StmtKind::Output { expr, .. } => v.visit_expr(expr),
        StmtKind::If {
            test,
            body,
            else_body,
            ..
        } => {
            v.visit_expr(test);
            walk_body(v, body);
            walk_body(v, else_body);
        }
        StmtKind::For {
            target,
            iter,
            body,
            else_body,
        } => {
            v.visit_target(target);
            v.visit_expr(iter);
            walk_body(v, body);
            walk_body(v, else_body);
        }
        StmtKind::Set { target, value } => {
            v.visit_target(target);
            v.visit_expr(value);
        }
        StmtKind::SetBlock { target, body } => {
            v.visit_target(target);
            walk_body(v, body);
        }
        StmtKind::Block { body, .. } => walk_body(v, body),
        StmtKind::Extends { template } => v.visit_expr(template),
        StmtKind::Include { template, .. } => v.visit_expr(template),
        StmtKind::Import { template, .. } => v.visit_expr(template),
        StmtKind::FromImport { template, .. } => v.visit_expr(template),
        StmtKind::Macro { params, body, .. } => {
            for param in params {
                if let Some(default) = &param.default {
                    v.visit_expr(default);
                }
            }
            walk_body(v, body);
        }
        StmtKind::CallBlock {
            callee,
            args,
            kwargs,
            body,
        } => {
            v.visit_expr(callee);
            for arg in args {
                v.visit_expr(arg);
            }
            for kwarg in kwargs {
                v.visit_expr(&kwarg.value);
            }
            walk_body(v, body);
        }
        StmtKind::CustomTag {
            args, kwargs, body, ..
        } => {
            for arg in args {
                v.visit_expr(arg);
            }
            for kwarg in kwargs {
                v.visit_expr(&kwarg.value);
            }
            walk_body(v, body);
        }
    }
}

pub fn walk_expr<V: Visitor + ?Sized>(v: &mut V, expr: &Expr) {
    if v.should_cancel() {
        return;
    }
    match &expr.kind {
        ExprKind::Name(_) | ExprKind::Lit(_) | ExprKind::Error => {}
        ExprKind::Unary { expr: inner, .. } => v.visit_expr(inner),
        ExprKind::Binary { left, right, .. } => {
            v.visit_expr(left);
            v.visit_expr(right);
        }
        ExprKind::Group { inner } => v.visit_expr(inner),
        ExprKind::Call {
            callee,
            args,
            kwargs,
        } => {
            v.visit_expr(callee);
            for arg in args {
                v.visit_expr(arg);
            }
            for kwarg in kwargs {
                v.visit_expr(&kwarg.value);
            }
        }
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
            v.visit_expr(inner);
            for arg in args {
                v.visit_expr(arg);
            }
            for kwarg in kwargs {
                v.visit_expr(&kwarg.value);
            }
        }
        ExprKind::GetAttr { target, .. } => v.visit_expr(target),
        ExprKind::GetItem { target, index } => {
            v.visit_expr(target);
            v.visit_expr(index);
        }
        ExprKind::List { items } | ExprKind::Tuple { items } => {
            for item in items {
                v.visit_expr(item);
            }
        }
        ExprKind::Dict { pairs } => {
            for (key, value) in pairs {
                v.visit_expr(key);
                v.visit_expr(value);
            }
        }
    }
}

pub fn walk_target<V: Visitor + ?Sized>(v: &mut V, target: &Target) {
    if v.should_cancel() {
        return;
    }
    match &target.kind {
        TargetKind::Name(_) | TargetKind::Error => {}
        TargetKind::GetAttr { target: inner, .. } => v.visit_target(inner),
        TargetKind::GetItem {
            target: inner,
            index,
        } => {
            v.visit_target(inner);
            v.visit_expr(index);
        }
        TargetKind::Tuple(items) => {
            for item in items {
                v.visit_target(item);
            }
        }
    }
}
