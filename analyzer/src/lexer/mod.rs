//! Dual-mode template lexer.
//!
//! Three modes: `Text` (raw template), `Expr` (inside `{{ … }}`), `Block`
//! (inside `{% … %}`). Spans are UTF-8 byte offsets, half-open `[start, end)`.
//! The token stream covers every byte of the input and ends in exactly one
//! [`TokenKind::Eof`].
//!
//! Recovery never aborts the stream: an opener seen while a tag is still open
//! emits the matching `Lexer/Unterminated*` diagnostic and drops back to text
//! mode without consuming the new opener; unknown bytes in expression mode
//! become [`TokenKind::Error`] trivia.

use crate::diagnostics::{Code, Diagnostic, Diagnostics, LexerCode};
use crate::span::Span;

mod token;

pub use token::{OpKind, PunctKind, Symbol, Token, TokenKind};

pub struct LexOutput {
    pub tokens: Vec<Token>,
    pub diagnostics: Vec<Diagnostic>,
}

pub fn lex(input: &str) -> LexOutput {
    Lexer::new(input).run()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Text,
    Expr,
    Block,
}

struct Lexer<'a> {
    source: &'a str,
    pos: usize,
    mode: Mode,
    /// Byte offset of the `{{` / `{%` that opened the current tag, for
    /// unterminated-diagnostic attribution.
    mode_start: usize,
    /// Bracket nesting inside the current tag; close delimiters are only
    /// recognized at depth zero so `{{ {'a': 1} }}` lexes the braces as punct.
    depth: u32,
    /// Token index of the current `BlockStart`, for `{% raw %}` detection.
    block_start_idx: usize,
    tokens: Vec<Token>,
    diagnostics: Diagnostics,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Lexer {
            source,
            pos: 0,
            mode: Mode::Text,
            mode_start: 0,
            depth: 0,
            block_start_idx: 0,
            tokens: Vec::new(),
            diagnostics: Diagnostics::default(),
        }
    }

    fn run(mut self) -> LexOutput {
        while self.pos < self.source.len() {
            match self.mode {
                Mode::Text => self.lex_text(),
                Mode::Expr | Mode::Block => self.lex_in_tag(),
            }
        }
        if self.mode != Mode::Text {
            self.emit_unterminated();
        }
        let len = self.source.len();
        self.push_at(TokenKind::Eof, len, len);
        LexOutput {
            tokens: self.tokens,
            diagnostics: self.diagnostics.into_sorted(),
        }
    }

    fn push_at(&mut self, kind: TokenKind, start: usize, end: usize) {
        self.tokens.push(Token {
            kind,
            span: Span::new(start as u32, end as u32),
        });
    }

    fn eat_trim_marker(&mut self) -> bool {
        if self.source[self.pos..].starts_with('-') {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn lex_text(&mut self) {
        let src = self.source;
        let start = self.pos;
        while self.pos < src.len() {
            let rest = &src[self.pos..];
            if rest.starts_with("{{") || rest.starts_with("{%") || rest.starts_with("{#") {
                break;
            }
            self.pos += rest.chars().next().map(char::len_utf8).unwrap_or(1);
        }
        if self.pos > start {
            self.push_at(TokenKind::Text, start, self.pos);
        }
        if self.pos >= src.len() {
            return;
        }

        let rest = &src[self.pos..];
        if rest.starts_with("{#") {
            self.lex_comment();
        } else if rest.starts_with("{{") {
            let start = self.pos;
            self.pos += 2;
            let trim = self.eat_trim_marker();
            self.push_at(TokenKind::VarStart { trim }, start, self.pos);
            self.mode = Mode::Expr;
            self.mode_start = start;
            self.depth = 0;
        } else {
            let start = self.pos;
            self.pos += 2;
            let trim = self.eat_trim_marker();
            self.push_at(TokenKind::BlockStart { trim }, start, self.pos);
            self.mode = Mode::Block;
            self.mode_start = start;
            self.depth = 0;
            self.block_start_idx = self.tokens.len() - 1;
        }
    }

    fn lex_comment(&mut self) {
        let start = self.pos;
        match self.source[start + 2..].find("#}") {
            Some(idx) => {
                let end = start + 2 + idx + 2;
                self.pos = end;
                self.push_at(TokenKind::Comment, start, end);
            }
            None => {
                self.pos = self.source.len();
                self.diagnostics.emit(
                    Code::Lexer(LexerCode::UnterminatedComment),
                    Span::new(start as u32, self.pos as u32),
                    "unterminated comment",
                );
                self.push_at(TokenKind::Comment, start, self.pos);
            }
        }
    }

    fn lex_in_tag(&mut self) {
        let src = self.source;
        let rest = &src[self.pos..];

        // A fresh opener while the current tag is still open: diagnose the open
        // tag and drop to text mode; the next iteration re-enters cleanly.
        if rest.starts_with("{{") || rest.starts_with("{%") {
            self.emit_unterminated();
            self.mode = Mode::Text;
            return;
        }

        if self.depth == 0 {
            match self.mode {
                Mode::Expr => {
                    if rest.starts_with("}}") {
                        self.close_tag(2, TokenKind::VarEnd { trim: false });
                        return;
                    }
                    if rest.starts_with("-}}") {
                        self.close_tag(3, TokenKind::VarEnd { trim: true });
                        return;
                    }
                }
                Mode::Block => {
                    if rest.starts_with("%}") {
                        self.close_tag(2, TokenKind::BlockEnd { trim: false });
                        return;
                    }
                    if rest.starts_with("-%}") {
                        self.close_tag(3, TokenKind::BlockEnd { trim: true });
                        return;
                    }
                }
                Mode::Text => {}
            }
        }

        let start = self.pos;
        let c = rest.chars().next().unwrap();

        if c.is_whitespace() {
            while let Some(c2) = src[self.pos..].chars().next() {
                if !c2.is_whitespace() {
                    break;
                }
                self.pos += c2.len_utf8();
            }
            self.push_at(TokenKind::Whitespace, start, self.pos);
            return;
        }

        if c == '_' || c.is_ascii_alphabetic() {
            self.pos += 1;
            while let Some(c2) = src[self.pos..].chars().next() {
                if c2 == '_' || c2.is_ascii_alphanumeric() {
                    self.pos += c2.len_utf8();
                } else {
                    break;
                }
            }
            let sym = Symbol::new(&src[start..self.pos]);
            self.push_at(TokenKind::Ident(sym), start, self.pos);
            return;
        }

        if c.is_ascii_digit() {
            self.pos += 1;
            while self.pos < src.len() && src.as_bytes()[self.pos].is_ascii_digit() {
                self.pos += 1;
            }
            // Fractional part only when a digit follows the dot, so `1.upper`
            // still lexes as number, dot, ident.
            if self.pos + 1 < src.len()
                && src.as_bytes()[self.pos] == b'.'
                && src.as_bytes()[self.pos + 1].is_ascii_digit()
            {
                self.pos += 1;
                while self.pos < src.len() && src.as_bytes()[self.pos].is_ascii_digit() {
                    self.pos += 1;
                }
            }
            let sym = Symbol::new(&src[start..self.pos]);
            self.push_at(TokenKind::Number(sym), start, self.pos);
            return;
        }

        if c == '"' || c == '\'' {
            self.lex_string(c);
            return;
        }

        const TWO_CHAR: [(&str, OpKind); 8] = [
            ("==", OpKind::EqEq),
            ("!=", OpKind::Ne),
            ("<=", OpKind::Le),
            (">=", OpKind::Ge),
            ("//", OpKind::FloorDiv),
            ("**", OpKind::Pow),
            ("||", OpKind::OrOr),
            ("&&", OpKind::AndAnd),
        ];
        for (pat, op) in TWO_CHAR {
            if rest.starts_with(pat) {
                self.pos += 2;
                self.push_at(TokenKind::Op(op), start, self.pos);
                return;
            }
        }

        let kind = match c {
            '+' => TokenKind::Op(OpKind::Plus),
            '-' => TokenKind::Op(OpKind::Minus),
            '*' => TokenKind::Op(OpKind::Star),
            '/' => TokenKind::Op(OpKind::Slash),
            '%' => TokenKind::Op(OpKind::Percent),
            '|' => TokenKind::Op(OpKind::Pipe),
            '.' => TokenKind::Op(OpKind::Dot),
            '~' => TokenKind::Op(OpKind::Tilde),
            '<' => TokenKind::Op(OpKind::Lt),
            '>' => TokenKind::Op(OpKind::Gt),
            '=' => TokenKind::Op(OpKind::Eq),
            '!' => TokenKind::Op(OpKind::Bang),
            '(' => {
                self.depth += 1;
                TokenKind::Punct(PunctKind::OpenParen)
            }
            ')' => {
                self.depth = self.depth.saturating_sub(1);
                TokenKind::Punct(PunctKind::CloseParen)
            }
            '[' => {
                self.depth += 1;
                TokenKind::Punct(PunctKind::OpenBracket)
            }
            ']' => {
                self.depth = self.depth.saturating_sub(1);
                TokenKind::Punct(PunctKind::CloseBracket)
            }
            '{' => {
                self.depth += 1;
                TokenKind::Punct(PunctKind::OpenBrace)
            }
            '}' => {
                self.depth = self.depth.saturating_sub(1);
                TokenKind::Punct(PunctKind::CloseBrace)
            }
            ',' => TokenKind::Punct(PunctKind::Comma),
            ':' => TokenKind::Punct(PunctKind::Colon),
            _ => {
                self.pos += c.len_utf8();
                self.diagnostics.emit(
                    Code::Lexer(LexerCode::UnexpectedChar),
                    Span::new(start as u32, self.pos as u32),
                    format!("unexpected char '{}'", c),
                );
                self.push_at(TokenKind::Error, start, self.pos);
                return;
            }
        };
        self.pos += 1;
        self.push_at(kind, start, self.pos);
    }

    fn lex_string(&mut self, quote: char) {
        let src = self.source;
        let start = self.pos;
        self.pos += 1;
        let mut terminated = false;
        while let Some(c) = src[self.pos..].chars().next() {
            self.pos += c.len_utf8();
            if c == '\\' {
                if let Some(esc) = src[self.pos..].chars().next() {
                    self.pos += esc.len_utf8();
                }
                continue;
            }
            if c == quote {
                terminated = true;
                break;
            }
        }
        if !terminated {
            // Synthesize a closed token running to EOF.
            self.diagnostics.emit(
                Code::Lexer(LexerCode::UnterminatedString),
                Span::new(start as u32, self.pos as u32),
                "unterminated string literal",
            );
        }
        let sym = Symbol::new(&src[start..self.pos]);
        self.push_at(TokenKind::Str(sym), start, self.pos);
    }

    fn close_tag(&mut self, len: usize, kind: TokenKind) {
        let start = self.pos;
        self.pos += len;
        self.push_at(kind, start, self.pos);
        let was_block = self.mode == Mode::Block;
        self.mode = Mode::Text;
        if was_block && self.block_is_raw() {
            self.lex_raw_body();
        }
    }

    /// True when the block that just closed was exactly `{% raw %}`.
    fn block_is_raw(&self) -> bool {
        let inner = &self.tokens[self.block_start_idx + 1..self.tokens.len() - 1];
        let mut significant = inner.iter().filter(|t| !t.is_trivia());
        match (significant.next(), significant.next()) {
            (Some(tok), None) => matches!(&tok.kind, TokenKind::Ident(sym) if sym.text == "raw"),
            _ => false,
        }
    }

    /// Consume everything up to the matching `{% endraw %}` opener as one
    /// verbatim `Text` token. No interpretation happens inside.
    fn lex_raw_body(&mut self) {
        let src = self.source;
        let start = self.pos;
        let mut scan = self.pos;
        let end = loop {
            match src[scan..].find("{%") {
                Some(idx) => {
                    let candidate = scan + idx;
                    let mut after = candidate + 2;
                    if src[after..].starts_with('-') {
                        after += 1;
                    }
                    let trimmed = src[after..].trim_start();
                    if let Some(tail) = trimmed.strip_prefix("endraw") {
                        let at_boundary = tail
                            .chars()
                            .next()
                            .map_or(true, |c| !(c == '_' || c.is_ascii_alphanumeric()));
                        if at_boundary {
                            break candidate;
                        }
                    }
                    scan = candidate + 2;
                }
                None => break src.len(),
            }
        };
        if end > start {
            self.push_at(TokenKind::Text, start, end);
        }
        self.pos = end;
    }

    fn emit_unterminated(&mut self) {
        let span = Span::new(self.mode_start as u32, self.pos as u32);
        match self.mode {
            Mode::Expr => self.diagnostics.emit(
                Code::Lexer(LexerCode::UnterminatedExpression),
                span,
                "unterminated expression",
            ),
            Mode::Block => self.diagnostics.emit(
                Code::Lexer(LexerCode::UnterminatedBlock),
                span,
                "unterminated block",
            ),
            Mode::Text => {}
        }
    }
}
