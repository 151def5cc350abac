//! Token stream cursor for the parser.
//!
//! Tokens keep trivia (whitespace and recovery bytes) plus an explicit EOF
//! token; the parser reads through trivia-skipping helpers but `pos` stays a
//! plain boundary index into the full stream.

use crate::lexer::Token;

/// A mutable cursor over a token stream.
pub struct TokenCursor<'a> {
    /// The original source string that token spans index into.
    pub source: &'a str,
    /// Tokens in source order, including trivia and an explicit EOF token.
    pub tokens: Vec<Token>,
    /// Current boundary index into `tokens`.
    pub pos: usize,
}

impl<'a> TokenCursor<'a> {
    /// Construct a cursor at the start of `tokens`.
    pub fn new(source: &'a str, tokens: Vec<Token>) -> Self {
        TokenCursor {
            source,
            tokens,
            pos: 0,
        }
    }
}
