//! Template parser.
//!
//! Recursive descent at statement level, Pratt precedence climb for
//! expressions, over a trivia-skipping [`TokenCursor`]. The parser is handed a
//! [`TagRegistry`] so it can dispatch custom tags.
//!
//! Responsibility: build the AST plus parse diagnostics only. Recovery never
//! truncates: every error production yields a spanned placeholder node and the
//! parser re-synchronizes at statement or delimiter boundaries.

use crate::ast::{Expr, ExprKind, NodeId, Stmt, StmtKind, Target, TargetKind, Template};
use crate::diagnostics::{Code, Diagnostic, Diagnostics, ParserCode};
use crate::lexer::{OpKind, PunctKind, Token, TokenKind};
use crate::span::Span;

mod expr;
mod stmt;
mod tags;
mod tokenstream;

pub use tags::{TagExtension, TagHandler, TagParser, TagRegistry};
pub use tokenstream::TokenCursor;

pub struct Parser<'a> {
    pub(crate) cursor: TokenCursor<'a>,
    pub(crate) tags: &'a TagRegistry,
    next_id: NodeId,
    pub(crate) diagnostics: Diagnostics,
}

#[derive(Debug, Clone)]
pub struct ParseOutput {
    pub template: Template,
    pub tokens: Vec<Token>,
    pub diagnostics: Vec<Diagnostic>,
}

/// A break tag consumed by `parse_body_until`: the `{%` span and the tag name.
pub(crate) struct EndTag {
    pub name: String,
    pub name_span: Span,
    pub start_span: Span,
}

impl<'a> Parser<'a> {
    pub fn new(cursor: TokenCursor<'a>, tags: &'a TagRegistry) -> Self {
        Parser {
            cursor,
            tags,
            next_id: 0,
            diagnostics: Diagnostics::default(),
        }
    }

    pub fn parse(mut self) -> ParseOutput {
        let len = self.cursor.source.len() as u32;
        let (body, _) = self.parse_body_until(&[], None);
        let template = Template {
            body,
            span: Span::new(0, len),
        };
        ParseOutput {
            template,
            tokens: self.cursor.tokens,
            diagnostics: self.diagnostics.into_sorted(),
        }
    }

    pub(crate) fn alloc_id(&mut self) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub(crate) fn mk_stmt(&mut self, span: Span, kind: StmtKind) -> Stmt {
        Stmt {
            id: self.alloc_id(),
            span,
            kind,
        }
    }

    pub(crate) fn mk_expr(&mut self, span: Span, kind: ExprKind) -> Expr {
        Expr {
            id: self.alloc_id(),
            span,
            kind,
        }
    }

    pub(crate) fn mk_target(&mut self, span: Span, kind: TargetKind) -> Target {
        Target {
            id: self.alloc_id(),
            span,
            kind,
        }
    }

    fn next_nontrivia_idx(&self, mut idx: usize) -> usize {
        while idx < self.cursor.tokens.len() {
            if self.cursor.tokens[idx].is_trivia() {
                idx += 1;
                continue;
            }
            break;
        }
        idx.min(self.cursor.tokens.len().saturating_sub(1))
    }

    pub(crate) fn cur(&self) -> Token {
        self.cursor.tokens[self.next_nontrivia_idx(self.cursor.pos)].clone()
    }

    pub(crate) fn peek2(&self) -> Token {
        let i = self.next_nontrivia_idx(self.cursor.pos);
        let j = self.next_nontrivia_idx(i + 1);
        self.cursor.tokens[j].clone()
    }

    pub(crate) fn bump(&mut self) -> Token {
        let idx = self.next_nontrivia_idx(self.cursor.pos);
        let tok = self.cursor.tokens[idx].clone();
        self.cursor.pos = idx + 1;
        tok
    }

    pub(crate) fn last_bumped_end(&self) -> u32 {
        self.cursor
            .pos
            .checked_sub(1)
            .and_then(|i| self.cursor.tokens.get(i))
            .map(|t| t.span.end)
            .unwrap_or(0)
    }

    pub(crate) fn cur_is_ident(&self, text: &str) -> bool {
        matches!(&self.cur().kind, TokenKind::Ident(sym) if sym.text == text)
    }

    /// Consume the closing `%}`, diagnosing and skipping any stray tokens
    /// before it. Unterminated tags (already reported by the lexer) stay
    /// silent.
    pub(crate) fn expect_block_end(&mut self) -> Span {
        loop {
            let tok = self.cur();
            match tok.kind {
                TokenKind::BlockEnd { .. } => {
                    self.bump();
                    return tok.span;
                }
                TokenKind::Eof
                | TokenKind::Text
                | TokenKind::Comment
                | TokenKind::VarStart { .. }
                | TokenKind::BlockStart { .. } => {
                    return Span::point(self.last_bumped_end());
                }
                _ => {
                    self.emit_unexpected(&tok, "`%}`");
                    self.bump();
                    while !matches!(
                        self.cur().kind,
                        TokenKind::BlockEnd { .. }
                            | TokenKind::Eof
                            | TokenKind::Text
                            | TokenKind::Comment
                            | TokenKind::VarStart { .. }
                            | TokenKind::BlockStart { .. }
                    ) {
                        self.bump();
                    }
                }
            }
        }
    }

    /// Same as [`expect_block_end`], for `}}`; returns the trim marker.
    pub(crate) fn expect_var_end(&mut self) -> (Span, bool) {
        loop {
            let tok = self.cur();
            match tok.kind {
                TokenKind::VarEnd { trim } => {
                    self.bump();
                    return (tok.span, trim);
                }
                TokenKind::Eof
                | TokenKind::Text
                | TokenKind::Comment
                | TokenKind::VarStart { .. }
                | TokenKind::BlockStart { .. } => {
                    return (Span::point(self.last_bumped_end()), false);
                }
                _ => {
                    self.emit_unexpected(&tok, "`}}`");
                    self.bump();
                    while !matches!(
                        self.cur().kind,
                        TokenKind::VarEnd { .. }
                            | TokenKind::Eof
                            | TokenKind::Text
                            | TokenKind::Comment
                            | TokenKind::VarStart { .. }
                            | TokenKind::BlockStart { .. }
                    ) {
                        self.bump();
                    }
                }
            }
        }
    }

    /// Skip the rest of the current tag, consuming its `%}` when present.
    pub(crate) fn recover_to_block_end(&mut self) {
        loop {
            let tok = self.cur();
            match tok.kind {
                TokenKind::BlockEnd { .. } => {
                    self.bump();
                    return;
                }
                TokenKind::Eof
                | TokenKind::Text
                | TokenKind::Comment
                | TokenKind::VarStart { .. }
                | TokenKind::BlockStart { .. } => return,
                _ => {
                    self.bump();
                }
            }
        }
    }

    /// Advance to the next expression-start token or stop token without
    /// emitting further diagnostics (recovery rule for expressions).
    pub(crate) fn skip_to_expr_start(&mut self) {
        loop {
            let tok = self.cur();
            if tok.can_begin_expr() || is_expr_boundary(&tok.kind) {
                return;
            }
            self.bump();
        }
    }

    pub(crate) fn emit_expected(&mut self, expected: &str, found: &Token) {
        self.diagnostics.emit(
            Code::Parser(ParserCode::ExpectedToken),
            found.span,
            format!(
                "expected {}, found {}",
                expected,
                Self::describe_token(&found.kind)
            ),
        );
    }

    pub(crate) fn emit_unexpected(&mut self, found: &Token, expected: &str) {
        self.diagnostics.emit(
            Code::Parser(ParserCode::UnexpectedToken),
            found.span,
            format!(
                "expected {}, found {}",
                expected,
                Self::describe_token(&found.kind)
            ),
        );
    }

    pub(crate) fn describe_token(kind: &TokenKind) -> String {
        match kind {
            TokenKind::Ident(sym) => format!("identifier `{}`", sym.text),
            TokenKind::Number(sym) => format!("number `{}`", sym.text),
            TokenKind::Str(_) => "string literal".into(),
            TokenKind::Op(op) => format!("`{}`", op_spelling(*op)),
            TokenKind::Punct(p) => format!("`{}`", punct_spelling(*p)),
            TokenKind::VarStart { .. } => "`{{`".into(),
            TokenKind::VarEnd { .. } => "`}}`".into(),
            TokenKind::BlockStart { .. } => "`{%`".into(),
            TokenKind::BlockEnd { .. } => "`%}`".into(),
            TokenKind::Text => "template text".into(),
            TokenKind::Comment => "comment".into(),
            TokenKind::Whitespace => "whitespace".into(),
            TokenKind::Error => "invalid character".into(),
            TokenKind::Eof => "end of input".into(),
        }
    }
}

pub(crate) fn op_spelling(op: OpKind) -> &'static str {
    match op {
        OpKind::EqEq => "==",
        OpKind::Ne => "!=",
        OpKind::Le => "<=",
        OpKind::Ge => ">=",
        OpKind::FloorDiv => "//",
        OpKind::Pow => "**",
        OpKind::OrOr => "||",
        OpKind::AndAnd => "&&",
        OpKind::Plus => "+",
        OpKind::Minus => "-",
        OpKind::Star => "*",
        OpKind::Slash => "/",
        OpKind::Percent => "%",
        OpKind::Pipe => "|",
        OpKind::Dot => ".",
        OpKind::Tilde => "~",
        OpKind::Lt => "<",
        OpKind::Gt => ">",
        OpKind::Eq => "=",
        OpKind::Bang => "!",
    }
}

pub(crate) fn punct_spelling(p: PunctKind) -> &'static str {
    match p {
        PunctKind::OpenParen => "(",
        PunctKind::CloseParen => ")",
        PunctKind::OpenBracket => "[",
        PunctKind::CloseBracket => "]",
        PunctKind::OpenBrace => "{",
        PunctKind::CloseBrace => "}",
        PunctKind::Comma => ",",
        PunctKind::Colon => ":",
    }
}

/// Tokens that end the current expression frame: tag delimiters, separators,
/// and closing brackets.
pub(crate) fn is_expr_boundary(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::VarEnd { .. }
            | TokenKind::BlockEnd { .. }
            | TokenKind::VarStart { .. }
            | TokenKind::BlockStart { .. }
            | TokenKind::Text
            | TokenKind::Comment
            | TokenKind::Eof
            | TokenKind::Punct(PunctKind::Comma)
            | TokenKind::Punct(PunctKind::Colon)
            | TokenKind::Punct(PunctKind::CloseParen)
            | TokenKind::Punct(PunctKind::CloseBracket)
            | TokenKind::Punct(PunctKind::CloseBrace)
    )
}
