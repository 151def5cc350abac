//! Canonical source formatter.
//!
//! Text nodes are emitted verbatim; delimiter contents are re-printed with
//! canonical spacing (`{{ expr }}`, `{% if cond %}`). Explicit parentheses
//! survive as `Group` nodes, so formatting parsed source is structure
//! preserving and `format(format(s)) == format(s)`.
//!
//! Sources with error-severity diagnostics are returned unchanged (plus a
//! `Formatter/ErrorNode` note): a recovered AST is good enough for analysis
//! but not a faithful base for rewriting the file.

use crate::ast::{Expr, ExprKind, LitKind, Kwarg, Stmt, StmtKind, Target, TargetKind, Template, UnOpKind};
use crate::ast::BinOpKind;
use crate::diagnostics::{Code, Diagnostic, FormatterCode, Severity, sort_diagnostics};
use crate::parser::TagRegistry;
use crate::span::Span;

const BP_OR: u8 = 1;
const BP_AND: u8 = 3;
const BP_COMPARE: u8 = 7;
const BP_ADD: u8 = 9;
const BP_MUL: u8 = 11;
const BP_UNARY: u8 = 13;
const BP_POW: u8 = 15;
const BP_POSTFIX: u8 = 17;

/// Format a full source string. On syntax errors the source is returned
/// unchanged.
pub fn format_source(source: &str, tags: &TagRegistry) -> (String, Vec<Diagnostic>) {
    let output = crate::parse(source, tags);
    let has_errors = output
        .diagnostics
        .iter()
        .any(|d| d.severity == Severity::Error);
    if has_errors {
        let mut diagnostics = output.diagnostics;
        diagnostics.push(Diagnostic {
            code: Code::Formatter(FormatterCode::ErrorNode),
            severity: Severity::Info,
            message: "source has syntax errors; formatting skipped".to_string(),
            span: Span::point(0),
        });
        sort_diagnostics(&mut diagnostics);
        return (source.to_string(), diagnostics);
    }
    (format_template(&output.template), output.diagnostics)
}

pub fn format_template(template: &Template) -> String {
    let mut out = String::new();
    format_body(&template.body, &mut out);
    out
}

fn format_body(body: &[Stmt], out: &mut String) {
    for stmt in body {
        format_stmt(stmt, out);
    }
}

fn format_stmt(stmt: &Stmt, out: &mut String) {
    match &stmt.kind {
        StmtKind::Text { text } => out.push_str(text),
        StmtKind::Comment { text } => out.push_str(text),
        StmtKind::Raw { text } => {
            out.push_str("{% raw %}");
            out.push_str(text);
            out.push_str("{% endraw %}");
        }
        StmtKind::Output { expr, trim } => {
            out.push_str(if trim.left { "{{- " } else { "{{ " });
            out.push_str(&format_expr(expr));
            out.push_str(if trim.right { " -}}" } else { " }}" });
        }
        StmtKind::If {
            test,
            body,
            else_body,
            ..
        } => {
            format_if_chain(test, body, else_body, "if", out);
            out.push_str("{% endif %}");
        }
        StmtKind::For {
            target,
            iter,
            body,
            else_body,
        } => {
            out.push_str("{% for ");
            out.push_str(&format_target(target));
            out.push_str(" in ");
            out.push_str(&format_expr(iter));
            out.push_str(" %}");
            format_body(body, out);
            if !else_body.is_empty() {
                out.push_str("{% else %}");
                format_body(else_body, out);
            }
            out.push_str("{% endfor %}");
        }
        StmtKind::Set { target, value } => {
            out.push_str("{% set ");
            out.push_str(&format_target(target));
            out.push_str(" = ");
            out.push_str(&format_expr(value));
            out.push_str(" %}");
        }
        StmtKind::SetBlock { target, body } => {
            out.push_str("{% set ");
            out.push_str(&format_target(target));
            out.push_str(" %}");
            format_body(body, out);
            out.push_str("{% endset %}");
        }
        StmtKind::Block {
            name,
            body,
            end_name,
        } => {
            out.push_str("{% block ");
            out.push_str(&name.node.text);
            out.push_str(" %}");
            format_body(body, out);
            if end_name.is_some() {
                out.push_str("{% endblock ");
                out.push_str(&name.node.text);
                out.push_str(" %}");
            } else {
                out.push_str("{% endblock %}");
            }
        }
        StmtKind::Extends { template } => {
            out.push_str("{% extends ");
            out.push_str(&format_expr(template));
            out.push_str(" %}");
        }
        StmtKind::Include {
            template,
            with_context,
            ignore_missing,
        } => {
            out.push_str("{% include ");
            out.push_str(&format_expr(template));
            if *ignore_missing {
                out.push_str(" ignore missing");
            }
            if !*with_context {
                out.push_str(" without context");
            }
            out.push_str(" %}");
        }
        StmtKind::Import { template, alias } => {
            out.push_str("{% import ");
            out.push_str(&format_expr(template));
            out.push_str(" as ");
            out.push_str(&alias.node.text);
            out.push_str(" %}");
        }
        StmtKind::FromImport {
            template,
            names,
            with_context,
        } => {
            out.push_str("{% from ");
            out.push_str(&format_expr(template));
            out.push_str(" import ");
            for (i, name) in names.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(&name.name.node.text);
                if let Some(alias) = &name.alias {
                    out.push_str(" as ");
                    out.push_str(&alias.node.text);
                }
            }
            if *with_context {
                out.push_str(" with context");
            }
            out.push_str(" %}");
        }
        StmtKind::Macro { name, params, body } => {
            out.push_str("{% macro ");
            out.push_str(&name.node.text);
            out.push('(');
            for (i, param) in params.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(&param.name.node.text);
                if let Some(default) = &param.default {
                    out.push('=');
                    out.push_str(&format_expr(default));
                }
            }
            out.push_str(") %}");
            format_body(body, out);
            out.push_str("{% endmacro %}");
        }
        StmtKind::CallBlock {
            callee,
            args,
            kwargs,
            body,
        } => {
            out.push_str("{% call ");
            out.push_str(&fmt_prec(callee, BP_POSTFIX));
            out.push('(');
            out.push_str(&format_args(args, kwargs));
            out.push_str(") %}");
            format_body(body, out);
            out.push_str("{% endcall %}");
        }
        StmtKind::CustomTag {
            name, args, kwargs, body, ..
        } => {
            out.push_str("{% ");
            out.push_str(&name.node.text);
            if !args.is_empty() || !kwargs.is_empty() {
                out.push(' ');
                out.push_str(&format_args(args, kwargs));
            }
            out.push_str(" %}");
            format_body(body, out);
            if !body.is_empty() {
                out.push_str("{% end");
                out.push_str(&name.node.text);
                out.push_str(" %}");
            }
        }
    }
}

fn format_if_chain(test: &Expr, body: &[Stmt], else_body: &[Stmt], kw: &str, out: &mut String) {
    out.push_str("{% ");
    out.push_str(kw);
    out.push(' ');
    out.push_str(&format_expr(test));
    out.push_str(" %}");
    format_body(body, out);

    if else_body.len() == 1 {
        if let StmtKind::If {
            test: nested_test,
            body: nested_body,
            else_body: nested_else,
            is_elif: true,
        } = &else_body[0].kind
        {
            format_if_chain(nested_test, nested_body, nested_else, "elif", out);
            return;
        }
    }
    if !else_body.is_empty() {
        out.push_str("{% else %}");
        format_body(else_body, out);
    }
}

pub fn format_target(target: &Target) -> String {
    match &target.kind {
        TargetKind::Name(sym) => sym.text.clone(),
        TargetKind::GetAttr { target, name } => {
            format!("{}.{}", format_target(target), name.node.text)
        }
        TargetKind::GetItem { target, index } => {
            format!("{}[{}]", format_target(target), format_expr(index))
        }
        TargetKind::Tuple(items) => {
            let parts: Vec<String> = items.iter().map(format_target).collect();
            parts.join(", ")
        }
        TargetKind::Error => String::new(),
    }
}

pub fn format_expr(expr: &Expr) -> String {
    fmt_prec(expr, 0)
}

fn fmt_prec(expr: &Expr, parent_bp: u8) -> String {
    match &expr.kind {
        ExprKind::Name(sym) => sym.text.clone(),
        ExprKind::Lit(lit) => fmt_lit(lit),
        ExprKind::Error => String::new(),
        ExprKind::Group { inner } => format!("({})", fmt_prec(inner, 0)),
        ExprKind::Unary { op, expr: inner } => {
            let rendered = match op.node {
                UnOpKind::Not => format!("not {}", fmt_prec(inner, 5)),
                UnOpKind::Neg => format!("-{}", fmt_prec(inner, BP_UNARY)),
                UnOpKind::Pos => format!("+{}", fmt_prec(inner, BP_UNARY)),
            };
            let bp = if op.node == UnOpKind::Not { 5 } else { BP_UNARY };
            parenthesize_if(rendered, bp < parent_bp)
        }
        ExprKind::Binary { op, left, right } => {
            let (l_bp, r_bp) = binop_power(op.node);
            let rendered = format!(
                "{} {} {}",
                fmt_prec(left, l_bp),
                binop_str(op.node),
                fmt_prec(right, r_bp)
            );
            parenthesize_if(rendered, l_bp < parent_bp)
        }
        ExprKind::Call {
            callee,
            args,
            kwargs,
        } => format!(
            "{}({})",
            fmt_prec(callee, BP_POSTFIX),
            format_args(args, kwargs)
        ),
        ExprKind::Filter {
            expr: inner,
            name,
            args,
            kwargs,
        } => {
            let mut s = format!("{} | {}", fmt_prec(inner, BP_POSTFIX), name.node.text);
            if !args.is_empty() || !kwargs.is_empty() {
                s.push('(');
                s.push_str(&format_args(args, kwargs));
                s.push(')');
            }
            parenthesize_if(s, BP_POSTFIX < parent_bp)
        }
        ExprKind::Test {
            expr: inner,
            name,
            args,
            kwargs,
            negated,
        } => {
            let mut s = format!(
                "{} is {}{}",
                fmt_prec(inner, BP_COMPARE),
                if *negated { "not " } else { "" },
                name.node.text
            );
            if !args.is_empty() || !kwargs.is_empty() {
                s.push('(');
                s.push_str(&format_args(args, kwargs));
                s.push(')');
            }
            parenthesize_if(s, BP_COMPARE < parent_bp)
        }
        ExprKind::GetAttr { target, name } => {
            format!("{}.{}", fmt_prec(target, BP_POSTFIX), name.node.text)
        }
        ExprKind::GetItem { target, index } => {
            format!("{}[{}]", fmt_prec(target, BP_POSTFIX), fmt_prec(index, 0))
        }
        ExprKind::List { items } => {
            let parts: Vec<String> = items.iter().map(|e| fmt_prec(e, 0)).collect();
            format!("[{}]", parts.join(", "))
        }
        ExprKind::Tuple { items } => {
            let parts: Vec<String> = items.iter().map(|e| fmt_prec(e, 0)).collect();
            if parts.len() == 1 {
                format!("({},)", parts[0])
            } else {
                format!("({})", parts.join(", "))
            }
        }
        ExprKind::Dict { pairs } => {
            let parts: Vec<String> = pairs
                .iter()
                .map(|(k, v)| format!("{}: {}", fmt_prec(k, 0), fmt_prec(v, 0)))
                .collect();
            format!("{{{}}}", parts.join(", "))
        }
    }
}

fn format_args(args: &[Expr], kwargs: &[Kwarg]) -> String {
    let mut parts: Vec<String> = args.iter().map(|e| fmt_prec(e, 0)).collect();
    for kwarg in kwargs {
        parts.push(format!("{}={}", kwarg.name.node.text, fmt_prec(&kwarg.value, 0)));
    }
    parts.join(", ")
}

fn parenthesize_if(s: String, wrap: bool) -> String {
    if wrap { format!("({})", s) } else { s }
}

fn fmt_lit(lit: &LitKind) -> String {
    match lit {
        LitKind::Str(s) => {
            let mut out = String::with_capacity(s.len() + 2);
            out.push('"');
            for c in s.chars() {
                match c {
                    '"' => out.push_str("\\\""),
                    '\\' => out.push_str("\\\\"),
                    '\n' => out.push_str("\\n"),
                    '\t' => out.push_str("\\t"),
                    '\r' => out.push_str("\\r"),
                    _ => out.push(c),
                }
            }
            out.push('"');
            out
        }
        LitKind::Int(v) => v.to_string(),
        LitKind::Float(v) => {
            if v.fract() == 0.0 && v.is_finite() {
                format!("{:.1}", v)
            } else {
                format!("{}", v)
            }
        }
        LitKind::Bool(true) => "true".to_string(),
        LitKind::Bool(false) => "false".to_string(),
        LitKind::Null => "none".to_string(),
    }
}

fn binop_power(op: BinOpKind) -> (u8, u8) {
    match op {
        BinOpKind::Or => (BP_OR, BP_OR + 1),
        BinOpKind::And => (BP_AND, BP_AND + 1),
        BinOpKind::Eq
        | BinOpKind::Ne
        | BinOpKind::Lt
        | BinOpKind::Le
        | BinOpKind::Gt
        | BinOpKind::Ge
        | BinOpKind::In
        | BinOpKind::NotIn => (BP_COMPARE, BP_COMPARE + 1),
        BinOpKind::Add | BinOpKind::Sub | BinOpKind::Concat => (BP_ADD, BP_ADD + 1),
        BinOpKind::Mul | BinOpKind::Div | BinOpKind::FloorDiv | BinOpKind::Rem => {
            (BP_MUL, BP_MUL + 1)
        }
        BinOpKind::Pow => (BP_POW, BP_POW - 1),
    }
}

fn binop_str(op: BinOpKind) -> &'static str {
    match op {
        BinOpKind::Or => "or",
        BinOpKind::And => "and",
        BinOpKind::Eq => "==",
        BinOpKind::Ne => "!=",
        BinOpKind::Lt => "<",
        BinOpKind::Le => "<=",
        BinOpKind::Gt => ">",
        BinOpKind::Ge => ">=",
        BinOpKind::In => "in",
        BinOpKind::NotIn => "not in",
        BinOpKind::Add => "+",
        BinOpKind::Sub => "-",
        BinOpKind::Concat => "~",
        BinOpKind::Mul => "*",
        BinOpKind::Div => "/",
        BinOpKind::FloorDiv => "//",
        BinOpKind::Rem => "%",
        BinOpKind::Pow => "**",
    }
}
