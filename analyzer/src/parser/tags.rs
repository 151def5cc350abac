//! Tag-extension registry and the capability surface handed to tag handlers.
//!
//! A handler receives a [`TagParser`] — a deliberately narrow view of the
//! parser — and the span of the opening `{%`. It returns the parsed statement,
//! or `None` to let the parser fall back: the opening tag is skipped and, when
//! the extension declared end tags, the body up to the first of them becomes a
//! spanned [`StmtKind::CustomTag`] placeholder with empty arguments.
//!
//! A handler that returns `None` must not consume past the opening tag.

use std::collections::HashMap;
use std::sync::Arc;

use crate::ast::{Expr, Kwarg, Stmt, StmtKind};
use crate::diagnostics::Code;
use crate::lexer::{Symbol, Token, TokenKind};
use crate::span::{Span, Spanned};

use super::Parser;

pub type TagHandler = Arc<dyn Fn(&mut TagParser<'_, '_>, Span) -> Option<Stmt> + Send + Sync>;

#[derive(Clone)]
pub struct TagExtension {
    pub end_tags: Vec<String>,
    pub override_builtin: bool,
    pub handler: TagHandler,
}

#[derive(Clone, Default)]
pub struct TagRegistry {
    tags: HashMap<String, TagExtension>,
}

impl TagRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        end_tags: Vec<String>,
        override_builtin: bool,
        handler: impl Fn(&mut TagParser<'_, '_>, Span) -> Option<Stmt> + Send + Sync + 'static,
    ) {
        self.tags.insert(
            name.into(),
            TagExtension {
                end_tags,
                override_builtin,
                handler: Arc::new(handler),
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&TagExtension> {
        self.tags.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Registered tag names in stable order, for completions.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tags.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// The minimal parser surface exposed to tag handlers.
pub struct TagParser<'p, 'a> {
    parser: &'p mut Parser<'a>,
    name: Spanned<Symbol>,
    start: Span,
}

impl<'p, 'a> TagParser<'p, 'a> {
    pub(crate) fn new(parser: &'p mut Parser<'a>, name: Spanned<Symbol>, start: Span) -> Self {
        TagParser {
            parser,
            name,
            start,
        }
    }

    pub fn tag_name(&self) -> &str {
        &self.name.node.text
    }

    pub fn start_span(&self) -> Span {
        self.start
    }

    /// The next significant token, without consuming it.
    pub fn peek(&self) -> Token {
        self.parser.cur()
    }

    /// Consume and return the next significant token.
    pub fn advance(&mut self) -> Token {
        self.parser.bump()
    }

    pub fn at_block_end(&self) -> bool {
        matches!(
            self.parser.cur().kind,
            TokenKind::BlockEnd { .. } | TokenKind::Eof
        )
    }

    /// Parse one expression; stops at `%}`, commas, and closing brackets.
    pub fn parse_expression(&mut self) -> Expr {
        self.parser.parse_expr()
    }

    /// Consume the closing `%}` of the current tag, recovering if necessary.
    pub fn expect_block_end(&mut self) -> Span {
        self.parser.expect_block_end()
    }

    /// Parse statements until one of `end_tags` opens; the end tag name is
    /// consumed and returned, its `%}` is not.
    pub fn parse_until_any_end_tag(&mut self, end_tags: &[&str]) -> (Vec<Stmt>, Option<String>) {
        let name = self.name.node.text.clone();
        let (body, end) = self
            .parser
            .parse_body_until(end_tags, Some((name.as_str(), self.start)));
        (body, end.map(|tag| tag.name))
    }

    pub fn emit(&mut self, code: Code, span: Span, message: impl Into<String>) {
        self.parser.diagnostics.emit(code, span, message);
    }

    /// Build the handler's result node: a `CustomTag` spanning from the
    /// opening delimiter to the last consumed token.
    pub fn node(&mut self, args: Vec<Expr>, kwargs: Vec<Kwarg>, body: Vec<Stmt>) -> Stmt {
        let span = Span::new(self.start.start, self.parser.last_bumped_end());
        self.parser.mk_stmt(
            span,
            StmtKind::CustomTag {
                name: self.name.clone(),
                args,
                kwargs,
                body,
            },
        )
    }
}
