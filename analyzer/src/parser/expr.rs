//! Expression parsing (Pratt precedence climb).
//!
//! Precedence, low to high: `or`, `and`, unary `not`, comparisons (including
//! `in` / `not in` and `is [not]` tests), additive (`+ - ~`), multiplicative
//! (`* / // %`), power (`**`, right-associative), unary `+`/`-`, and the
//! postfix chain (`.attr`, `[index]`, `(args)`, `| filter`).
//!
//! Comparisons do not chain; each one produces a `Binary`. On an unexpected
//! token the parser emits one diagnostic and advances to the next
//! expression-start or stop token, so `1 + * 2` parses as `1 + 2` with a
//! single `Parser/UnexpectedToken`.

use crate::ast::{BinOpKind, Expr, ExprKind, Kwarg, LitKind, UnOpKind};
use crate::diagnostics::{Code, ParserCode};
use crate::lexer::{OpKind, PunctKind, Symbol, TokenKind};
use crate::span::{Span, Spanned};

use super::{Parser, is_expr_boundary};

const OR_BP: (u8, u8) = (1, 2);
const AND_BP: (u8, u8) = (3, 4);
const NOT_BP: u8 = 5;
const COMPARE_BP: (u8, u8) = (7, 8);
const ADD_BP: (u8, u8) = (9, 10);
const MUL_BP: (u8, u8) = (11, 12);
const UNARY_BP: u8 = 13;
const POW_BP: (u8, u8) = (15, 14);

fn infix_binding_power(op: BinOpKind) -> (u8, u8) {
    match op {
        BinOpKind::Or => OR_BP,
        BinOpKind::And => AND_BP,
        BinOpKind::Eq
        | BinOpKind::Ne
        | BinOpKind::Lt
        | BinOpKind::Le
        | BinOpKind::Gt
        | BinOpKind::Ge
        | BinOpKind::In
        | BinOpKind::NotIn => COMPARE_BP,
        BinOpKind::Add | BinOpKind::Sub | BinOpKind::Concat => ADD_BP,
        BinOpKind::Mul | BinOpKind::Div | BinOpKind::FloorDiv | BinOpKind::Rem => MUL_BP,
        BinOpKind::Pow => POW_BP,
    }
}

impl<'a> Parser<'a> {
    pub(crate) fn parse_expr(&mut self) -> Expr {
        self.parse_expr_bp(0)
    }

    fn parse_expr_bp(&mut self, min_bp: u8) -> Expr {
        let mut lhs = self.parse_prefix();

        loop {
            // `is [not] <name> [(args)]` sits at comparison level.
            if self.cur_is_ident("is") {
                if COMPARE_BP.0 < min_bp {
                    break;
                }
                self.bump();
                let negated = if self.cur_is_ident("not") {
                    self.bump();
                    true
                } else {
                    false
                };
                let name = self.expect_name("test name");
                let (args, kwargs) =
                    if matches!(self.cur().kind, TokenKind::Punct(PunctKind::OpenParen)) {
                        self.bump();
                        self.parse_args()
                    } else {
                        (Vec::new(), Vec::new())
                    };
                let span = Span::new(lhs.span.start, self.last_bumped_end());
                lhs = self.mk_expr(
                    span,
                    ExprKind::Test {
                        expr: Box::new(lhs),
                        name,
                        args,
                        kwargs,
                        negated,
                    },
                );
                continue;
            }

            let Some((op, width)) = self.infix_op() else {
                break;
            };
            let (l_bp, r_bp) = infix_binding_power(op);
            if l_bp < min_bp {
                break;
            }

            let op_tok = self.bump();
            let mut op_span = op_tok.span;
            if width == 2 {
                let second = self.bump();
                op_span = op_span.to(second.span);
            }

            let rhs = self.parse_operand(r_bp, op_span);
            let span = Span::new(lhs.span.start, rhs.span.end.max(op_span.end));
            lhs = self.mk_expr(
                span,
                ExprKind::Binary {
                    op: Spanned::new(op, op_span),
                    left: Box::new(lhs),
                    right: Box::new(rhs),
                },
            );
        }

        lhs
    }

    /// The infix operator at the cursor, with the number of tokens it spans.
    fn infix_op(&self) -> Option<(BinOpKind, u8)> {
        let tok = self.cur();
        let op = match &tok.kind {
            TokenKind::Ident(sym) => match sym.text.as_str() {
                "or" => BinOpKind::Or,
                "and" => BinOpKind::And,
                "in" => BinOpKind::In,
                "not" => {
                    if matches!(&self.peek2().kind, TokenKind::Ident(s2) if s2.text == "in") {
                        return Some((BinOpKind::NotIn, 2));
                    }
                    return None;
                }
                _ => return None,
            },
            TokenKind::Op(op) => match op {
                OpKind::EqEq => BinOpKind::Eq,
                OpKind::Ne => BinOpKind::Ne,
                OpKind::Lt => BinOpKind::Lt,
                OpKind::Le => BinOpKind::Le,
                OpKind::Gt => BinOpKind::Gt,
                OpKind::Ge => BinOpKind::Ge,
                OpKind::Plus => BinOpKind::Add,
                OpKind::Minus => BinOpKind::Sub,
                OpKind::Tilde => BinOpKind::Concat,
                OpKind::Star => BinOpKind::Mul,
                OpKind::Slash => BinOpKind::Div,
                OpKind::FloorDiv => BinOpKind::FloorDiv,
                OpKind::Percent => BinOpKind::Rem,
                OpKind::Pow => BinOpKind::Pow,
                OpKind::OrOr => BinOpKind::Or,
                OpKind::AndAnd => BinOpKind::And,
                _ => return None,
            },
            _ => return None,
        };
        Some((op, 1))
    }

    /// Parse the right operand of an infix operator, recovering to the next
    /// expression-start token on an unexpected one.
    fn parse_operand(&mut self, r_bp: u8, op_span: Span) -> Expr {
        if self.cur().can_begin_expr() {
            return self.parse_expr_bp(r_bp);
        }
        let tok = self.cur();
        self.diagnostics.emit(
            Code::Parser(ParserCode::UnexpectedToken),
            tok.span,
            format!(
                "expected expression, found {}",
                Self::describe_token(&tok.kind)
            ),
        );
        if is_expr_boundary(&tok.kind) {
            return self.mk_expr(Span::point(op_span.end), ExprKind::Error);
        }
        self.bump();
        self.skip_to_expr_start();
        if self.cur().can_begin_expr() {
            self.parse_expr_bp(r_bp)
        } else {
            self.mk_expr(Span::point(op_span.end), ExprKind::Error)
        }
    }

    fn parse_prefix(&mut self) -> Expr {
        if self.cur_is_ident("not") {
            // `not in` never reaches here: it is only an infix continuation.
            let tok = self.bump();
            let operand = self.parse_operand(NOT_BP, tok.span);
            let span = Span::new(tok.span.start, operand.span.end.max(tok.span.end));
            return self.mk_expr(
                span,
                ExprKind::Unary {
                    op: Spanned::new(UnOpKind::Not, tok.span),
                    expr: Box::new(operand),
                },
            );
        }
        match self.cur().kind {
            TokenKind::Op(OpKind::Minus) => self.parse_unary(UnOpKind::Neg),
            TokenKind::Op(OpKind::Plus) => self.parse_unary(UnOpKind::Pos),
            _ => self.parse_postfix(),
        }
    }

    fn parse_unary(&mut self, op: UnOpKind) -> Expr {
        let tok = self.bump();
        let operand = self.parse_operand(UNARY_BP, tok.span);
        let span = Span::new(tok.span.start, operand.span.end.max(tok.span.end));
        self.mk_expr(
            span,
            ExprKind::Unary {
                op: Spanned::new(op, tok.span),
                expr: Box::new(operand),
            },
        )
    }

    fn parse_postfix(&mut self) -> Expr {
        let mut expr = self.parse_primary();

        loop {
            match self.cur().kind {
                TokenKind::Op(OpKind::Dot) => {
                    self.bump();
                    let name = self.expect_name("attribute name");
                    let span = Span::new(expr.span.start, self.last_bumped_end());
                    expr = self.mk_expr(
                        span,
                        ExprKind::GetAttr {
                            target: Box::new(expr),
                            name,
                        },
                    );
                }
                TokenKind::Punct(PunctKind::OpenBracket) => {
                    self.bump();
                    let index = self.parse_expr();
                    self.expect_close(PunctKind::CloseBracket, "`]`");
                    let span = Span::new(expr.span.start, self.last_bumped_end());
                    expr = self.mk_expr(
                        span,
                        ExprKind::GetItem {
                            target: Box::new(expr),
                            index: Box::new(index),
                        },
                    );
                }
                TokenKind::Punct(PunctKind::OpenParen) => {
                    self.bump();
                    let (args, kwargs) = self.parse_args();
                    let span = Span::new(expr.span.start, self.last_bumped_end());
                    expr = self.mk_expr(
                        span,
                        ExprKind::Call {
                            callee: Box::new(expr),
                            args,
                            kwargs,
                        },
                    );
                }
                TokenKind::Op(OpKind::Pipe) => {
                    self.bump();
                    let name = self.expect_name("filter name");
                    let (args, kwargs) =
                        if matches!(self.cur().kind, TokenKind::Punct(PunctKind::OpenParen)) {
                            self.bump();
                            self.parse_args()
                        } else {
                            (Vec::new(), Vec::new())
                        };
                    let span = Span::new(expr.span.start, self.last_bumped_end());
                    expr = self.mk_expr(
                        span,
                        ExprKind::Filter {
                            expr: Box::new(expr),
                            name,
                            args,
                            kwargs,
                        },
                    );
                }
                _ => break,
            }
        }

        expr
    }

    fn parse_primary(&mut self) -> Expr {
        let tok = self.cur();
        match tok.kind {
            TokenKind::Ident(sym) => {
                self.bump();
                let kind = match sym.text.as_str() {
                    "true" | "True" => ExprKind::Lit(LitKind::Bool(true)),
                    "false" | "False" => ExprKind::Lit(LitKind::Bool(false)),
                    "none" | "None" | "null" => ExprKind::Lit(LitKind::Null),
                    _ => ExprKind::Name(sym),
                };
                self.mk_expr(tok.span, kind)
            }
            TokenKind::Number(sym) => {
                self.bump();
                let kind = if sym.text.contains('.') {
                    match sym.text.parse::<f64>() {
                        Ok(v) => ExprKind::Lit(LitKind::Float(v)),
                        Err(_) => ExprKind::Error,
                    }
                } else {
                    match sym.text.parse::<i64>() {
                        Ok(v) => ExprKind::Lit(LitKind::Int(v)),
                        // Overflowing integers fall back to float.
                        Err(_) => match sym.text.parse::<f64>() {
                            Ok(v) => ExprKind::Lit(LitKind::Float(v)),
                            Err(_) => ExprKind::Error,
                        },
                    }
                };
                self.mk_expr(tok.span, kind)
            }
            TokenKind::Str(sym) => {
                self.bump();
                self.mk_expr(tok.span, ExprKind::Lit(LitKind::Str(unescape_string(&sym.text))))
            }
            TokenKind::Punct(PunctKind::OpenParen) => self.parse_group_or_tuple(),
            TokenKind::Punct(PunctKind::OpenBracket) => self.parse_list_literal(),
            TokenKind::Punct(PunctKind::OpenBrace) => self.parse_dict_literal(),
            _ => {
                self.diagnostics.emit(
                    Code::Parser(ParserCode::ExpectedExpression),
                    tok.span,
                    format!(
                        "expected expression, found {}",
                        Self::describe_token(&tok.kind)
                    ),
                );
                if is_expr_boundary(&tok.kind) {
                    return self.mk_expr(Span::point(tok.span.start), ExprKind::Error);
                }
                self.bump();
                self.skip_to_expr_start();
                if self.cur().can_begin_expr() {
                    self.parse_primary()
                } else {
                    self.mk_expr(tok.span, ExprKind::Error)
                }
            }
        }
    }

    /// `(expr)` is a group; `(a, b)` and `(a,)` are tuples; `()` is the empty
    /// tuple.
    fn parse_group_or_tuple(&mut self) -> Expr {
        let open = self.bump();
        if matches!(self.cur().kind, TokenKind::Punct(PunctKind::CloseParen)) {
            self.bump();
            let span = Span::new(open.span.start, self.last_bumped_end());
            return self.mk_expr(span, ExprKind::Tuple { items: Vec::new() });
        }

        let first = self.parse_expr();
        if matches!(self.cur().kind, TokenKind::Punct(PunctKind::Comma)) {
            let mut items = vec![first];
            while matches!(self.cur().kind, TokenKind::Punct(PunctKind::Comma)) {
                self.bump();
                if matches!(self.cur().kind, TokenKind::Punct(PunctKind::CloseParen)) {
                    break;
                }
                if !self.cur().can_begin_expr() {
                    break;
                }
                items.push(self.parse_expr());
            }
            self.expect_close(PunctKind::CloseParen, "`)`");
            let span = Span::new(open.span.start, self.last_bumped_end());
            return self.mk_expr(span, ExprKind::Tuple { items });
        }

        self.expect_close(PunctKind::CloseParen, "`)`");
        let span = Span::new(open.span.start, self.last_bumped_end());
        self.mk_expr(
            span,
            ExprKind::Group {
                inner: Box::new(first),
            },
        )
    }

    fn parse_list_literal(&mut self) -> Expr {
        let open = self.bump();
        let mut items = Vec::new();
        loop {
            let tok = self.cur();
            match tok.kind {
                TokenKind::Punct(PunctKind::CloseBracket) => {
                    self.bump();
                    break;
                }
                _ if is_expr_boundary(&tok.kind) => {
                    self.emit_expected("`]`", &tok);
                    break;
                }
                _ => {
                    items.push(self.parse_expr());
                    match self.cur().kind {
                        TokenKind::Punct(PunctKind::Comma) => {
                            self.bump();
                        }
                        TokenKind::Punct(PunctKind::CloseBracket) => {
                            self.bump();
                            break;
                        }
                        _ => {
                            let tok = self.cur();
                            self.emit_expected("`,` or `]`", &tok);
                            if !self.skip_to_separator(PunctKind::CloseBracket) {
                                break;
                            }
                        }
                    }
                }
            }
        }
        let span = Span::new(open.span.start, self.last_bumped_end());
        self.mk_expr(span, ExprKind::List { items })
    }

    fn parse_dict_literal(&mut self) -> Expr {
        let open = self.bump();
        let mut pairs = Vec::new();
        loop {
            let tok = self.cur();
            match tok.kind {
                TokenKind::Punct(PunctKind::CloseBrace) => {
                    self.bump();
                    break;
                }
                _ if is_expr_boundary(&tok.kind) => {
                    self.emit_expected("`}`", &tok);
                    break;
                }
                _ => {
                    let key = self.parse_expr();
                    if matches!(self.cur().kind, TokenKind::Punct(PunctKind::Colon)) {
                        self.bump();
                    } else {
                        let tok = self.cur();
                        self.emit_expected("`:`", &tok);
                    }
                    let value = self.parse_expr();
                    pairs.push((key, value));
                    match self.cur().kind {
                        TokenKind::Punct(PunctKind::Comma) => {
                            self.bump();
                        }
                        TokenKind::Punct(PunctKind::CloseBrace) => {
                            self.bump();
                            break;
                        }
                        _ => {
                            let tok = self.cur();
                            self.emit_expected("`,` or `}`", &tok);
                            if !self.skip_to_separator(PunctKind::CloseBrace) {
                                break;
                            }
                        }
                    }
                }
            }
        }
        let span = Span::new(open.span.start, self.last_bumped_end());
        self.mk_expr(span, ExprKind::Dict { pairs })
    }

    /// Argument list after a consumed `(`. Positional args come before
    /// keyword args; `ident =` (keyword-lookahead) starts a kwarg.
    pub(crate) fn parse_args(&mut self) -> (Vec<Expr>, Vec<Kwarg>) {
        let mut args = Vec::new();
        let mut kwargs = Vec::new();
        loop {
            let tok = self.cur();
            match tok.kind {
                TokenKind::Punct(PunctKind::CloseParen) => {
                    self.bump();
                    break;
                }
                _ if is_expr_boundary(&tok.kind) => {
                    self.emit_expected("`)`", &tok);
                    break;
                }
                _ => {
                    let is_kwarg = matches!(&tok.kind, TokenKind::Ident(_))
                        && matches!(self.peek2().kind, TokenKind::Op(OpKind::Eq));
                    if is_kwarg {
                        let name_tok = self.bump();
                        let sym = match name_tok.kind {
                            TokenKind::Ident(sym) => sym,
                            _ => unreachable!(),
                        };
                        self.bump(); // `=`
                        let value = self.parse_expr();
                        kwargs.push(Kwarg {
                            name: Spanned::new(sym, name_tok.span),
                            value,
                        });
                    } else {
                        args.push(self.parse_expr());
                    }
                    match self.cur().kind {
                        TokenKind::Punct(PunctKind::Comma) => {
                            self.bump();
                        }
                        TokenKind::Punct(PunctKind::CloseParen) => {
                            self.bump();
                            break;
                        }
                        _ => {
                            let tok = self.cur();
                            self.emit_expected("`,` or `)`", &tok);
                            if !self.skip_to_separator(PunctKind::CloseParen) {
                                break;
                            }
                        }
                    }
                }
            }
        }
        (args, kwargs)
    }

    /// Skip to the next comma (consumed, returns true to continue the list)
    /// or to `close` / a frame boundary (returns false).
    fn skip_to_separator(&mut self, close: PunctKind) -> bool {
        loop {
            let tok = self.cur();
            match &tok.kind {
                TokenKind::Punct(PunctKind::Comma) => {
                    self.bump();
                    return true;
                }
                TokenKind::Punct(p) if *p == close => {
                    self.bump();
                    return false;
                }
                kind if is_expr_boundary(kind) => return false,
                _ => {
                    self.bump();
                }
            }
        }
    }

    /// Consume a closing punct, diagnosing and syncing past stray tokens.
    pub(crate) fn expect_close(&mut self, close: PunctKind, label: &str) {
        if matches!(&self.cur().kind, TokenKind::Punct(p) if *p == close) {
            self.bump();
            return;
        }
        let tok = self.cur();
        self.emit_expected(label, &tok);
        loop {
            let tok = self.cur();
            match &tok.kind {
                TokenKind::Punct(p) if *p == close => {
                    self.bump();
                    return;
                }
                kind if is_expr_boundary(kind) => return,
                _ => {
                    self.bump();
                }
            }
        }
    }

    /// Consume an identifier, or synthesize an empty one with a diagnostic.
    pub(crate) fn expect_name(&mut self, what: &str) -> Spanned<Symbol> {
        match self.cur().kind {
            TokenKind::Ident(sym) => {
                let tok = self.bump();
                Spanned::new(sym, tok.span)
            }
            _ => {
                let tok = self.cur();
                self.emit_expected(what, &tok);
                Spanned::new(Symbol::new(""), Span::point(tok.span.start))
            }
        }
    }
}

/// Strip quotes and process `\` escapes. Unknown escapes keep the escaped
/// character; an unterminated lexeme simply lacks the closing quote.
pub(crate) fn unescape_string(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    let quote = raw.as_bytes()[0] as char;
    let mut inner = &raw[1..];
    if inner.ends_with(quote) {
        inner = &inner[..inner.len() - 1];
    }

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}
