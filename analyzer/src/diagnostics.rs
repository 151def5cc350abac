//! The shared diagnostic model for every pass.
//!
//! Codes are a closed two-level sum: a category (matching the pass that found
//! the fault) plus a rule name. `Code::name()` renders the canonical
//! `Category/RuleName` string used in snapshots and the JSON shape.
//!
//! No pass raises on a fault. Each pass owns a [`Diagnostics`] accumulator,
//! emits into it, and returns a neutral value; callers collect and sort.

use serde::Serialize;

use crate::source_map::SourceMap;
use crate::span::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
    Hint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexerCode {
    UnterminatedExpression,
    UnterminatedBlock,
    UnterminatedComment,
    UnterminatedString,
    UnexpectedChar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserCode {
    UnexpectedToken,
    ExpectedToken,
    UnknownTag,
    UnexpectedEndTag,
    MissingEndTag,
    ExpectedExpression,
    MismatchedBlockName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererCode {
    UnknownVariable,
    UnknownFilter,
    UnknownTest,
    UnknownFunction,
    UnknownMacro,
    InvalidOperand,
    NotIterable,
    TemplateNotFound,
    TemplateCycle,
    UnsupportedNode,
    MissingArgument,
    TypeMismatch,
    UnknownTagRenderer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatterCode {
    ErrorNode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LintCode {
    MultipleExtends,
    ExtendsNotFirst,
    DuplicateBlock,
    DuplicateMacro,
    UnusedMacro,
    UnknownFilter,
    UnknownTest,
    UnknownFunction,
    MissingEndTag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleCode {
    TrailingWhitespace,
    MixedIndentation,
    ExcessiveBlankLines,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamingCode {
    BlockName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Code {
    Lexer(LexerCode),
    Parser(ParserCode),
    Renderer(RendererCode),
    Formatter(FormatterCode),
    Lint(LintCode),
    Style(StyleCode),
    Naming(NamingCode),
}

impl Code {
    /// The canonical `Category/RuleName` identifier.
    pub fn name(self) -> &'static str {
        match self {
            Code::Lexer(LexerCode::UnterminatedExpression) => "Lexer/UnterminatedExpression",
            Code::Lexer(LexerCode::UnterminatedBlock) => "Lexer/UnterminatedBlock",
            Code::Lexer(LexerCode::UnterminatedComment) => "Lexer/UnterminatedComment",
            Code::Lexer(LexerCode::UnterminatedString) => "Lexer/UnterminatedString",
            Code::Lexer(LexerCode::UnexpectedChar) => "Lexer/UnexpectedChar",

            Code::Parser(ParserCode::UnexpectedToken) => "Parser/UnexpectedToken",
            Code::Parser(ParserCode::ExpectedToken) => "Parser/ExpectedToken",
            Code::Parser(ParserCode::UnknownTag) => "Parser/UnknownTag",
            Code::Parser(ParserCode::UnexpectedEndTag) => "Parser/UnexpectedEndTag",
            Code::Parser(ParserCode::MissingEndTag) => "Parser/MissingEndTag",
            Code::Parser(ParserCode::ExpectedExpression) => "Parser/ExpectedExpression",
            Code::Parser(ParserCode::MismatchedBlockName) => "Parser/MismatchedBlockName",

            Code::Renderer(RendererCode::UnknownVariable) => "Renderer/UnknownVariable",
            Code::Renderer(RendererCode::UnknownFilter) => "Renderer/UnknownFilter",
            Code::Renderer(RendererCode::UnknownTest) => "Renderer/UnknownTest",
            Code::Renderer(RendererCode::UnknownFunction) => "Renderer/UnknownFunction",
            Code::Renderer(RendererCode::UnknownMacro) => "Renderer/UnknownMacro",
            Code::Renderer(RendererCode::InvalidOperand) => "Renderer/InvalidOperand",
            Code::Renderer(RendererCode::NotIterable) => "Renderer/NotIterable",
            Code::Renderer(RendererCode::TemplateNotFound) => "Renderer/TemplateNotFound",
            Code::Renderer(RendererCode::TemplateCycle) => "Renderer/TemplateCycle",
            Code::Renderer(RendererCode::UnsupportedNode) => "Renderer/UnsupportedNode",
            Code::Renderer(RendererCode::MissingArgument) => "Renderer/MissingArgument",
            Code::Renderer(RendererCode::TypeMismatch) => "Renderer/TypeMismatch",
            Code::Renderer(RendererCode::UnknownTagRenderer) => "Renderer/UnknownTagRenderer",

            Code::Formatter(FormatterCode::ErrorNode) => "Formatter/ErrorNode",

            Code::Lint(LintCode::MultipleExtends) => "Lint/MultipleExtends",
            Code::Lint(LintCode::ExtendsNotFirst) => "Lint/ExtendsNotFirst",
            Code::Lint(LintCode::DuplicateBlock) => "Lint/DuplicateBlock",
            Code::Lint(LintCode::DuplicateMacro) => "Lint/DuplicateMacro",
            Code::Lint(LintCode::UnusedMacro) => "Lint/UnusedMacro",
            Code::Lint(LintCode::UnknownFilter) => "Lint/UnknownFilter",
            Code::Lint(LintCode::UnknownTest) => "Lint/UnknownTest",
            Code::Lint(LintCode::UnknownFunction) => "Lint/UnknownFunction",
            Code::Lint(LintCode::MissingEndTag) => "Lint/MissingEndTag",

            Code::Style(StyleCode::TrailingWhitespace) => "Style/TrailingWhitespace",
            Code::Style(StyleCode::MixedIndentation) => "Style/MixedIndentation",
            Code::Style(StyleCode::ExcessiveBlankLines) => "Style/ExcessiveBlankLines",

            Code::Naming(NamingCode::BlockName) => "Naming/BlockName",
        }
    }

    /// The default severity for this code. Emission sites may override via
    /// [`Diagnostics::emit_with`] where a code is warning-or-error by context.
    pub fn severity(self) -> Severity {
        match self {
            Code::Lexer(_) | Code::Parser(_) => Severity::Error,
            Code::Renderer(code) => match code {
                RendererCode::TemplateNotFound | RendererCode::TemplateCycle => Severity::Error,
                RendererCode::UnknownTagRenderer => Severity::Info,
                _ => Severity::Warning,
            },
            Code::Formatter(_) => Severity::Info,
            Code::Lint(_) => Severity::Warning,
            Code::Style(_) | Code::Naming(_) => Severity::Info,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub code: Code,
    pub severity: Severity,
    pub message: String,
    pub span: Span,
}

impl Diagnostic {
    pub fn to_json(&self, sm: &SourceMap<'_>) -> DiagnosticJson {
        DiagnosticJson {
            id: self.code.name(),
            severity: self.severity,
            message: self.message.clone(),
            span: SpanJson {
                start: PositionJson::at(self.span.start, sm),
                end: PositionJson::at(self.span.end, sm),
            },
        }
    }
}

/// The wire shape used by snapshots and the CLI:
/// `{id, severity, message, span:{start:{offset,line,column}, end:{…}}}`.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticJson {
    pub id: &'static str,
    pub severity: Severity,
    pub message: String,
    pub span: SpanJson,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpanJson {
    pub start: PositionJson,
    pub end: PositionJson,
}

#[derive(Debug, Clone, Serialize)]
pub struct PositionJson {
    pub offset: u32,
    pub line: u32,
    pub column: u32,
}

impl PositionJson {
    fn at(offset: u32, sm: &SourceMap<'_>) -> PositionJson {
        let (line, column) = sm.line_col(offset);
        PositionJson {
            offset,
            line,
            column,
        }
    }
}

#[derive(Default, Debug)]
pub struct Diagnostics {
    diags: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn emit(&mut self, code: Code, span: Span, message: impl Into<String>) {
        self.emit_with(code, code.severity(), span, message);
    }

    pub fn emit_with(
        &mut self,
        code: Code,
        severity: Severity,
        span: Span,
        message: impl Into<String>,
    ) {
        self.diags.push(Diagnostic {
            code,
            severity,
            message: message.into(),
            span,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.diags.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diags.len()
    }

    pub fn extend(&mut self, diags: Vec<Diagnostic>) {
        self.diags.extend(diags);
    }

    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.diags
    }

    /// Drain into the stable snapshot order: span start, then category name.
    pub fn into_sorted(self) -> Vec<Diagnostic> {
        let mut diags = self.diags;
        sort_diagnostics(&mut diags);
        diags
    }
}

/// Stable snapshot order shared by every pass: (span start, span end, code name).
pub fn sort_diagnostics(diags: &mut [Diagnostic]) {
    diags.sort_by(|a, b| {
        (a.span.start, a.span.end, a.code.name()).cmp(&(b.span.start, b.span.end, b.code.name()))
    });
}

/// Human-readable rendering used by tests and snapshot output.
pub fn format_diagnostics(source: &str, mut diags: Vec<Diagnostic>) -> String {
    use std::fmt::Write;

    sort_diagnostics(&mut diags);
    let sm = SourceMap::new(source);

    let mut out = String::new();
    for d in diags {
        let (line, col) = sm.line_col(d.span.start);
        let severity = match d.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
            Severity::Hint => "hint",
        };
        let _ = writeln!(&mut out, "{}: {}: {}", severity, d.code.name(), d.message);
        let _ = writeln!(
            &mut out,
            "  --> <input>:{}:{} [{}..{}]",
            line, col, d.span.start, d.span.end
        );
    }
    out
}
