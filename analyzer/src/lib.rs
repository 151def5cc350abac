//! Core template analyzer.
//!
//! Pipeline: lex → parse → format / lint / render / index.
//! All spans are UTF-8 byte offsets into the original source, using `[start, end)`.
//! Every pass accumulates diagnostics instead of raising; callers read them
//! off the pipeline output in stable span order.

use tracing::trace;

pub mod ast;
mod diagnostics;
mod format;
mod lexer;
mod loader;
mod parser;
mod source_map;
mod span;
mod tests;

pub use diagnostics::{
    Code, Diagnostic, DiagnosticJson, Diagnostics, FormatterCode, LexerCode, LintCode, NamingCode,
    ParserCode, PositionJson, RendererCode, Severity, SpanJson, StyleCode, format_diagnostics,
    sort_diagnostics,
};
pub use format::{format_expr, format_source, format_target, format_template};
pub use lexer::{LexOutput, OpKind, PunctKind, Symbol, Token, TokenKind, lex};
pub use loader::{Loader, MemoryLoader};
pub use parser::{ParseOutput, Parser, TagExtension, TagHandler, TagParser, TagRegistry, TokenCursor};
pub use source_map::SourceMap;
pub use span::{Span, Spanned};

/// Lex and parse one template. Lexer and parser diagnostics are merged into
/// one stream in stable span order.
pub fn parse(source: &str, tags: &TagRegistry) -> ParseOutput {
    let lex_output = lex(source);
    let token_cursor = TokenCursor::new(source, lex_output.tokens);
    let parser = Parser::new(token_cursor, tags);
    let mut output = parser.parse();
    output.diagnostics.extend(lex_output.diagnostics);
    sort_diagnostics(&mut output.diagnostics);
    trace!(
        bytes = source.len(),
        diagnostics = output.diagnostics.len(),
        "parsed template"
    );
    output
}
