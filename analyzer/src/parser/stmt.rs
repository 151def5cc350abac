//! Statement-level parsing: the body loop and the built-in tag handlers.
//!
//! Each tag handler is entered with the `{%` and the tag-name identifier
//! already consumed. Handlers parse up to and including their terminating
//! delimiter, recursively re-entering the body loop with the fixed set of
//! break tags for the construct. Block-shaped nodes span from the opening
//! delimiter's start to the end of their terminating delimiter.

use crate::ast::{
    ImportName, MacroParam, Stmt, StmtKind, Target, TargetKind, Trim,
};
use crate::diagnostics::{Code, ParserCode};
use crate::lexer::{OpKind, PunctKind, Symbol, Token, TokenKind};
use crate::span::{Span, Spanned};

use super::{EndTag, Parser, is_expr_boundary};

impl<'a> Parser<'a> {
    /// Parse statements until EOF or one of `breaks` opens. A break tag is
    /// consumed through its name; the caller finishes the tag. `open` names
    /// the enclosing construct for the missing-end-tag diagnostic.
    pub(crate) fn parse_body_until(
        &mut self,
        breaks: &[&str],
        open: Option<(&str, Span)>,
    ) -> (Vec<Stmt>, Option<EndTag>) {
        let mut body = Vec::new();
        loop {
            let tok = self.cur();
            match tok.kind {
                TokenKind::Eof => {
                    if let Some((name, span)) = open {
                        self.diagnostics.emit(
                            Code::Parser(ParserCode::MissingEndTag),
                            span,
                            format!(
                                "`{{% {} %}}` is never closed (expected {})",
                                name,
                                describe_breaks(breaks)
                            ),
                        );
                    }
                    return (body, None);
                }
                TokenKind::Text => {
                    self.bump();
                    let stmt = self.text_stmt(tok.span);
                    body.push(stmt);
                }
                TokenKind::Comment => {
                    self.bump();
                    let text = tok.lexeme(self.cursor.source).to_string();
                    let stmt = self.mk_stmt(tok.span, StmtKind::Comment { text });
                    body.push(stmt);
                }
                TokenKind::VarStart { trim } => {
                    let stmt = self.parse_output(trim);
                    body.push(stmt);
                }
                TokenKind::BlockStart { .. } => {
                    let name_tok = self.peek2();
                    let ident = match &name_tok.kind {
                        TokenKind::Ident(sym) => Some(sym.clone()),
                        _ => None,
                    };
                    if let Some(sym) = ident {
                        if breaks.iter().any(|b| *b == sym.text) {
                            let bs = self.bump();
                            let nt = self.bump();
                            return (
                                body,
                                Some(EndTag {
                                    name: sym.text,
                                    name_span: nt.span,
                                    start_span: bs.span,
                                }),
                            );
                        }
                        let bs = self.bump();
                        self.bump(); // tag name
                        let name = Spanned::new(sym, name_tok.span);
                        if let Some(stmt) = self.parse_tag(bs.span, name) {
                            body.push(stmt);
                        }
                    } else {
                        self.bump();
                        self.emit_expected("tag name", &name_tok);
                        self.recover_to_block_end();
                    }
                }
                _ => {
                    // Leftovers from lexer recovery; skip without cascading.
                    self.bump();
                }
            }
        }
    }

    /// A `Text` statement with the neighboring trim markers applied.
    fn text_stmt(&mut self, span: Span) -> Stmt {
        let source = self.cursor.source;
        let idx = self.cursor.pos - 1;
        let mut text = &source[span.start as usize..span.end as usize];
        let trim_start = idx
            .checked_sub(1)
            .and_then(|i| self.cursor.tokens.get(i))
            .map_or(false, |t| right_trims(t, source));
        let trim_end = self
            .cursor
            .tokens
            .get(idx + 1)
            .map_or(false, |t| left_trims(t, source));
        if trim_start {
            text = trim_leading_text(text);
        }
        if trim_end {
            text = trim_trailing_text(text);
        }
        let text = text.to_string();
        self.mk_stmt(span, StmtKind::Text { text })
    }

    fn parse_output(&mut self, trim_left: bool) -> Stmt {
        let start_tok = self.bump(); // VarStart
        let expr = self.parse_expr();
        let (end_span, trim_right) = self.expect_var_end();
        let span = Span::new(start_tok.span.start, end_span.end.max(start_tok.span.end));
        self.mk_stmt(
            span,
            StmtKind::Output {
                expr,
                trim: Trim {
                    left: trim_left,
                    right: trim_right,
                },
            },
        )
    }

    /// Dispatch a tag: extension override, then builtins, then extensions,
    /// otherwise `Parser/UnknownTag` (or `Parser/UnexpectedEndTag` for a
    /// mismatched `end*`) with recovery to the next `%}`.
    fn parse_tag(&mut self, start: Span, name: Spanned<Symbol>) -> Option<Stmt> {
        let tag = name.node.text.clone();
        let ext_overrides = self.tags.get(&tag).map_or(false, |t| t.override_builtin);

        if !ext_overrides {
            match tag.as_str() {
                "if" => return Some(self.parse_if(start, false)),
                "for" => return Some(self.parse_for(start)),
                "set" => return Some(self.parse_set(start)),
                "block" => return Some(self.parse_block(start)),
                "extends" => return Some(self.parse_extends(start)),
                "include" => return Some(self.parse_include(start)),
                "import" => return Some(self.parse_import(start)),
                "from" => return Some(self.parse_from_import(start)),
                "macro" => return Some(self.parse_macro(start)),
                "call" => return Some(self.parse_call_block(start)),
                "raw" => return Some(self.parse_raw(start)),
                _ => {}
            }
        }

        if self.tags.get(&tag).is_some() {
            return self.parse_custom_tag(start, name);
        }

        if tag.starts_with("end") {
            self.diagnostics.emit(
                Code::Parser(ParserCode::UnexpectedEndTag),
                name.span,
                format!("unexpected `{{% {} %}}`", tag),
            );
        } else {
            self.diagnostics.emit(
                Code::Parser(ParserCode::UnknownTag),
                name.span,
                format!("unknown tag `{}`", tag),
            );
        }
        self.recover_to_block_end();
        None
    }

    fn parse_if(&mut self, start: Span, is_elif: bool) -> Stmt {
        let test = self.parse_expr();
        self.expect_block_end();

        let (body, end) = self.parse_body_until(&["endif", "elif", "else"], Some(("if", start)));

        let else_body = match end {
            Some(tag) if tag.name == "elif" => {
                let nested = self.parse_if(tag.start_span, true);
                vec![nested]
            }
            Some(tag) if tag.name == "else" => {
                self.expect_block_end();
                let (else_body, end2) = self.parse_body_until(&["endif"], Some(("if", start)));
                if end2.is_some() {
                    self.expect_block_end();
                }
                else_body
            }
            Some(_) => {
                // endif
                self.expect_block_end();
                Vec::new()
            }
            None => Vec::new(),
        };

        let span = Span::new(start.start, self.last_bumped_end());
        self.mk_stmt(
            span,
            StmtKind::If {
                test,
                body,
                else_body,
                is_elif,
            },
        )
    }

    fn parse_for(&mut self, start: Span) -> Stmt {
        let target = self.parse_target();
        if self.cur_is_ident("in") {
            self.bump();
        } else {
            let tok = self.cur();
            self.emit_expected("`in`", &tok);
        }
        let iter = self.parse_expr();
        self.expect_block_end();

        let (body, end) = self.parse_body_until(&["endfor", "else"], Some(("for", start)));
        let else_body = match end {
            Some(tag) if tag.name == "else" => {
                self.expect_block_end();
                let (else_body, end2) = self.parse_body_until(&["endfor"], Some(("for", start)));
                if end2.is_some() {
                    self.expect_block_end();
                }
                else_body
            }
            Some(_) => {
                self.expect_block_end();
                Vec::new()
            }
            None => Vec::new(),
        };

        let span = Span::new(start.start, self.last_bumped_end());
        self.mk_stmt(
            span,
            StmtKind::For {
                target,
                iter,
                body,
                else_body,
            },
        )
    }

    /// `{% set x = expr %}` or the block form `{% set x %}…{% endset %}`,
    /// which binds the rendered body text.
    fn parse_set(&mut self, start: Span) -> Stmt {
        let target = self.parse_target();

        if matches!(self.cur().kind, TokenKind::Op(OpKind::Eq)) {
            self.bump();
            let value = self.parse_expr();
            self.expect_block_end();
            let span = Span::new(start.start, self.last_bumped_end());
            return self.mk_stmt(span, StmtKind::Set { target, value });
        }

        if matches!(self.cur().kind, TokenKind::BlockEnd { .. }) {
            self.expect_block_end();
            let (body, end) = self.parse_body_until(&["endset"], Some(("set", start)));
            if end.is_some() {
                self.expect_block_end();
            }
            let span = Span::new(start.start, self.last_bumped_end());
            return self.mk_stmt(span, StmtKind::SetBlock { target, body });
        }

        let tok = self.cur();
        self.emit_expected("`=` or `%}`", &tok);
        self.recover_to_block_end();
        let span = Span::new(start.start, self.last_bumped_end());
        let value = self.mk_expr(Span::point(span.end), crate::ast::ExprKind::Error);
        self.mk_stmt(span, StmtKind::Set { target, value })
    }

    fn parse_block(&mut self, start: Span) -> Stmt {
        let name = self.expect_name("block name");
        self.expect_block_end();

        let (body, end) = self.parse_body_until(&["endblock"], Some(("block", start)));
        let mut end_name = None;
        if end.is_some() {
            if let TokenKind::Ident(sym) = self.cur().kind {
                let tok = self.bump();
                end_name = Some(Spanned::new(sym, tok.span));
            }
            self.expect_block_end();
        }

        let span = Span::new(start.start, self.last_bumped_end());
        self.mk_stmt(
            span,
            StmtKind::Block {
                name,
                body,
                end_name,
            },
        )
    }

    fn parse_extends(&mut self, start: Span) -> Stmt {
        let template = self.parse_expr();
        self.expect_block_end();
        let span = Span::new(start.start, self.last_bumped_end());
        self.mk_stmt(span, StmtKind::Extends { template })
    }

    fn parse_include(&mut self, start: Span) -> Stmt {
        let template = self.parse_expr();
        let mut with_context = true;
        let mut ignore_missing = false;
        loop {
            if self.cur_is_ident("ignore") {
                self.bump();
                self.expect_kw("missing");
                ignore_missing = true;
            } else if self.cur_is_ident("with") {
                self.bump();
                self.expect_kw("context");
                with_context = true;
            } else if self.cur_is_ident("without") {
                self.bump();
                self.expect_kw("context");
                with_context = false;
            } else {
                break;
            }
        }
        self.expect_block_end();
        let span = Span::new(start.start, self.last_bumped_end());
        self.mk_stmt(
            span,
            StmtKind::Include {
                template,
                with_context,
                ignore_missing,
            },
        )
    }

    fn parse_import(&mut self, start: Span) -> Stmt {
        let template = self.parse_expr();
        self.expect_kw("as");
        let alias = self.expect_name("alias");
        self.expect_block_end();
        let span = Span::new(start.start, self.last_bumped_end());
        self.mk_stmt(span, StmtKind::Import { template, alias })
    }

    fn parse_from_import(&mut self, start: Span) -> Stmt {
        let template = self.parse_expr();
        self.expect_kw("import");

        let mut names = Vec::new();
        loop {
            if self.cur_is_ident("with") || self.cur_is_ident("without") {
                break;
            }
            let TokenKind::Ident(sym) = self.cur().kind else {
                break;
            };
            let tok = self.bump();
            let mut alias = None;
            if self.cur_is_ident("as") {
                self.bump();
                alias = Some(self.expect_name("alias"));
            }
            names.push(ImportName {
                name: Spanned::new(sym, tok.span),
                alias,
            });
            if matches!(self.cur().kind, TokenKind::Punct(PunctKind::Comma)) {
                self.bump();
            } else {
                break;
            }
        }
        if names.is_empty() {
            let tok = self.cur();
            self.emit_expected("name to import", &tok);
        }

        // Imports run without context unless asked for.
        let mut with_context = false;
        if self.cur_is_ident("with") {
            self.bump();
            self.expect_kw("context");
            with_context = true;
        } else if self.cur_is_ident("without") {
            self.bump();
            self.expect_kw("context");
        }
        self.expect_block_end();

        let span = Span::new(start.start, self.last_bumped_end());
        self.mk_stmt(
            span,
            StmtKind::FromImport {
                template,
                names,
                with_context,
            },
        )
    }

    fn parse_macro(&mut self, start: Span) -> Stmt {
        let name = self.expect_name("macro name");

        let mut params = Vec::new();
        if matches!(self.cur().kind, TokenKind::Punct(PunctKind::OpenParen)) {
            self.bump();
            loop {
                let tok = self.cur();
                match tok.kind {
                    TokenKind::Punct(PunctKind::CloseParen) => {
                        self.bump();
                        break;
                    }
                    TokenKind::Ident(sym) => {
                        let name_tok = self.bump();
                        let default = if matches!(self.cur().kind, TokenKind::Op(OpKind::Eq)) {
                            self.bump();
                            Some(self.parse_expr())
                        } else {
                            None
                        };
                        params.push(MacroParam {
                            name: Spanned::new(sym, name_tok.span),
                            default,
                        });
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
                                self.expect_close(PunctKind::CloseParen, "`)`");
                                break;
                            }
                        }
                    }
                    _ if is_expr_boundary(&tok.kind) => {
                        self.emit_expected("`)`", &tok);
                        break;
                    }
                    _ => {
                        self.emit_expected("parameter name", &tok);
                        self.bump();
                    }
                }
            }
        } else {
            let tok = self.cur();
            self.emit_expected("`(`", &tok);
        }
        self.expect_block_end();

        let (body, end) = self.parse_body_until(&["endmacro"], Some(("macro", start)));
        if end.is_some() {
            self.expect_block_end();
        }

        let span = Span::new(start.start, self.last_bumped_end());
        self.mk_stmt(span, StmtKind::Macro { name, params, body })
    }

    fn parse_call_block(&mut self, start: Span) -> Stmt {
        let callee_expr = self.parse_expr();
        let (callee, args, kwargs) = match callee_expr.kind {
            crate::ast::ExprKind::Call {
                callee,
                args,
                kwargs,
            } => (*callee, args, kwargs),
            _ => (callee_expr, Vec::new(), Vec::new()),
        };
        self.expect_block_end();

        let (body, end) = self.parse_body_until(&["endcall"], Some(("call", start)));
        if end.is_some() {
            self.expect_block_end();
        }

        let span = Span::new(start.start, self.last_bumped_end());
        self.mk_stmt(
            span,
            StmtKind::CallBlock {
                callee,
                args,
                kwargs,
                body,
            },
        )
    }

    /// The lexer collapses a conforming raw body into one verbatim `Text`
    /// token between `{% raw %}` and `{% endraw %}`.
    fn parse_raw(&mut self, start: Span) -> Stmt {
        self.expect_block_end();

        let mut text = String::new();
        if matches!(self.cur().kind, TokenKind::Text) {
            let tok = self.bump();
            text = tok.lexeme(self.cursor.source).to_string();
        }

        let closed = matches!(self.cur().kind, TokenKind::BlockStart { .. })
            && matches!(&self.peek2().kind, TokenKind::Ident(sym) if sym.text == "endraw");
        if closed {
            self.bump();
            self.bump();
            self.expect_block_end();
        } else {
            self.diagnostics.emit(
                Code::Parser(ParserCode::MissingEndTag),
                start,
                "`{% raw %}` is never closed (expected `{% endraw %}`)",
            );
        }

        let span = Span::new(start.start, self.last_bumped_end());
        self.mk_stmt(span, StmtKind::Raw { text })
    }

    fn parse_custom_tag(&mut self, start: Span, name: Spanned<Symbol>) -> Option<Stmt> {
        let ext = self.tags.get(&name.node.text)?.clone();

        let handled = {
            let mut tp = super::TagParser::new(self, name.clone(), start);
            (ext.handler)(&mut tp, start)
        };
        if let Some(stmt) = handled {
            return Some(stmt);
        }

        // Fallback for a handler that declined: skip the opening tag; when end
        // tags were declared, capture the body into a placeholder node so
        // downstream consumers still see a valid, spanned statement.
        self.recover_to_block_end();
        let mut body = Vec::new();
        if !ext.end_tags.is_empty() {
            let tag_name = name.node.text.clone();
            let ends: Vec<&str> = ext.end_tags.iter().map(String::as_str).collect();
            let (parsed, end) = self.parse_body_until(&ends, Some((tag_name.as_str(), start)));
            body = parsed;
            if end.is_some() {
                self.expect_block_end();
            }
        }
        let span = Span::new(start.start, self.last_bumped_end());
        Some(self.mk_stmt(
            span,
            StmtKind::CustomTag {
                name,
                args: Vec::new(),
                kwargs: Vec::new(),
                body,
            },
        ))
    }

    fn expect_kw(&mut self, kw: &str) {
        if self.cur_is_ident(kw) {
            self.bump();
        } else {
            let tok = self.cur();
            self.emit_expected(&format!("`{}`", kw), &tok);
        }
    }

    /// Assignment targets: names with `.attr` / `[index]` chains, and
    /// comma-separated tuples (optionally parenthesized).
    pub(crate) fn parse_target(&mut self) -> Target {
        let first = self.parse_primary_target();
        if !matches!(self.cur().kind, TokenKind::Punct(PunctKind::Comma)) {
            return first;
        }

        let mut items = vec![first];
        while matches!(self.cur().kind, TokenKind::Punct(PunctKind::Comma)) {
            self.bump();
            if !self.cur().can_begin_expr() {
                break;
            }
            items.push(self.parse_primary_target());
        }
        let start = items.first().map(|t| t.span.start).unwrap_or(0);
        let end = items.last().map(|t| t.span.end).unwrap_or(start);
        self.mk_target(Span::new(start, end), TargetKind::Tuple(items))
    }

    fn parse_primary_target(&mut self) -> Target {
        let tok = self.cur();
        match tok.kind {
            TokenKind::Punct(PunctKind::OpenParen) => {
                self.bump();
                let inner = self.parse_target();
                self.expect_close(PunctKind::CloseParen, "`)`");
                inner
            }
            TokenKind::Ident(sym) => {
                self.bump();
                let mut target = self.mk_target(tok.span, TargetKind::Name(sym));
                loop {
                    match self.cur().kind {
                        TokenKind::Op(OpKind::Dot) => {
                            self.bump();
                            let name = self.expect_name("attribute name");
                            let span = Span::new(target.span.start, self.last_bumped_end());
                            target = self.mk_target(
                                span,
                                TargetKind::GetAttr {
                                    target: Box::new(target),
                                    name,
                                },
                            );
                        }
                        TokenKind::Punct(PunctKind::OpenBracket) => {
                            self.bump();
                            let index = self.parse_expr();
                            self.expect_close(PunctKind::CloseBracket, "`]`");
                            let span = Span::new(target.span.start, self.last_bumped_end());
                            target = self.mk_target(
                                span,
                                TargetKind::GetItem {
                                    target: Box::new(target),
                                    index: Box::new(index),
                                },
                            );
                        }
                        _ => break,
                    }
                }
                target
            }
            _ => {
                self.diagnostics.emit(
                    Code::Parser(ParserCode::ExpectedExpression),
                    tok.span,
                    format!(
                        "expected assignment target, found {}",
                        Self::describe_token(&tok.kind)
                    ),
                );
                if !is_expr_boundary(&tok.kind) {
                    self.bump();
                }
                self.mk_target(Span::point(tok.span.start), TargetKind::Error)
            }
        }
    }
}

fn describe_breaks(breaks: &[&str]) -> String {
    let names: Vec<String> = breaks.iter().map(|b| format!("`{{% {} %}}`", b)).collect();
    if names.is_empty() {
        "end of block".to_string()
    } else {
        names.join(" or ")
    }
}

fn right_trims(tok: &Token, source: &str) -> bool {
    match tok.kind {
        TokenKind::VarEnd { trim } | TokenKind::BlockEnd { trim } => trim,
        TokenKind::Comment => tok.lexeme(source).ends_with("-#}"),
        _ => false,
    }
}

fn left_trims(tok: &Token, source: &str) -> bool {
    match tok.kind {
        TokenKind::VarStart { trim } | TokenKind::BlockStart { trim } => trim,
        TokenKind::Comment => tok.lexeme(source).starts_with("{#-"),
        _ => false,
    }
}

/// A right-trim on the preceding delimiter eats leading whitespace of this
/// text up to and including the next newline.
fn trim_leading_text(s: &str) -> &str {
    for (i, c) in s.char_indices() {
        if c == '\n' {
            return &s[i + 1..];
        }
        if !c.is_whitespace() {
            return &s[i..];
        }
    }
    ""
}

/// A left-trim on the following delimiter eats trailing whitespace of this
/// text back to and including the previous newline.
fn trim_trailing_text(s: &str) -> &str {
    for (i, c) in s.char_indices().rev() {
        if c == '\n' {
            return &s[..i];
        }
        if !c.is_whitespace() {
            return &s[..i + c.len_utf8()];
        }
    }
    ""
}
