//! Lint rule framework and the fixed rule catalog.
//!
//! `check` is a pure function over one document's parse output, its symbol
//! index, and the environment's registries. Lexer and parser diagnostics pass
//! through unchanged, except `Parser/MissingEndTag`, which the linter owns as
//! `Lint/MissingEndTag`. Output is stably sorted by span.

use std::collections::{HashMap, HashSet};

use analyzer::ast::{StmtKind, Template};
use analyzer::{
    Code, Diagnostic, Diagnostics, LintCode, NamingCode, ParseOutput, ParserCode, Span, StyleCode,
};
use renderer::Environment;

use crate::index::DocumentIndex;

pub struct LintContext<'a> {
    pub uri: &'a str,
    pub source: &'a str,
    pub template: &'a Template,
    pub index: &'a DocumentIndex,
    pub env: &'a Environment,
}

pub trait Rule {
    fn name(&self) -> &'static str;
    fn check(&self, ctx: &LintContext<'_>, out: &mut Diagnostics);
}

pub fn rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(MultipleExtends),
        Box::new(ExtendsNotFirst),
        Box::new(DuplicateBlock),
        Box::new(DuplicateMacro),
        Box::new(UnusedMacro),
        Box::new(MismatchedBlockName),
        Box::new(UnknownFilter),
        Box::new(UnknownTest),
        Box::new(UnknownFunction),
        Box::new(TrailingWhitespace),
        Box::new(MixedIndentation),
        Box::new(ExcessiveBlankLines),
        Box::new(BlockNaming),
    ]
}

pub fn check(
    uri: &str,
    source: &str,
    parse: &ParseOutput,
    index: &DocumentIndex,
    env: &Environment,
) -> Vec<Diagnostic> {
    let mut out = Diagnostics::default();

    for diag in &parse.diagnostics {
        if diag.code == Code::Parser(ParserCode::MissingEndTag) {
            out.emit(
                Code::Lint(LintCode::MissingEndTag),
                diag.span,
                diag.message.clone(),
            );
        } else {
            out.extend(vec![diag.clone()]);
        }
    }

    let ctx = LintContext {
        uri,
        source,
        template: &parse.template,
        index,
        env,
    };
    for rule in rules() {
        rule.check(&ctx, &mut out);
    }
    out.into_sorted()
}

struct MultipleExtends;

impl Rule for MultipleExtends {
    fn name(&self) -> &'static str {
        "Lint/MultipleExtends"
    }

    fn check(&self, ctx: &LintContext<'_>, out: &mut Diagnostics) {
        let mut seen = false;
        for stmt in &ctx.template.body {
            if let StmtKind::Extends { .. } = stmt.kind {
                if seen {
                    out.emit(
                        Code::Lint(LintCode::MultipleExtends),
                        stmt.span,
                        "template already extends a parent; the first extends wins",
                    );
                }
                seen = true;
            }
        }
    }
}

struct ExtendsNotFirst;

impl Rule for ExtendsNotFirst {
    fn name(&self) -> &'static str {
        "Lint/ExtendsNotFirst"
    }

    fn check(&self, ctx: &LintContext<'_>, out: &mut Diagnostics) {
        for stmt in &ctx.template.body {
            match &stmt.kind {
                StmtKind::Extends { .. } => return,
                StmtKind::Text { .. } | StmtKind::Comment { .. } => continue,
                _ => break,
            }
        }
        // A later extends (if any) is misplaced.
        for stmt in &ctx.template.body {
            if let StmtKind::Extends { .. } = stmt.kind {
                out.emit(
                    Code::Lint(LintCode::ExtendsNotFirst),
                    stmt.span,
                    "`{% extends %}` must be the first tag in the template",
                );
                return;
            }
        }
    }
}

struct DuplicateBlock;

impl Rule for DuplicateBlock {
    fn name(&self) -> &'static str {
        "Lint/DuplicateBlock"
    }

    fn check(&self, ctx: &LintContext<'_>, out: &mut Diagnostics) {
        let mut seen: HashMap<&str, Span> = HashMap::new();
        for block in &ctx.index.blocks {
            if seen.contains_key(block.name.as_str()) {
                out.emit(
                    Code::Lint(LintCode::DuplicateBlock),
                    block.name_span,
                    format!("block `{}` is defined more than once", block.name),
                );
            } else {
                seen.insert(&block.name, block.name_span);
            }
        }
    }
}

struct DuplicateMacro;

impl Rule for DuplicateMacro {
    fn name(&self) -> &'static str {
        "Lint/DuplicateMacro"
    }

    fn check(&self, ctx: &LintContext<'_>, out: &mut Diagnostics) {
        let mut seen: HashSet<&str> = HashSet::new();
        for mac in &ctx.index.macros {
            if !seen.insert(&mac.name) {
                out.emit(
                    Code::Lint(LintCode::DuplicateMacro),
                    mac.name_span,
                    format!("macro `{}` is defined more than once", mac.name),
                );
            }
        }
    }
}

struct UnusedMacro;

impl Rule for UnusedMacro {
    fn name(&self) -> &'static str {
        "Lint/UnusedMacro"
    }

    fn check(&self, ctx: &LintContext<'_>, out: &mut Diagnostics) {
        let used: HashSet<&str> = ctx
            .index
            .name_refs
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        for mac in &ctx.index.macros {
            if !used.contains(mac.name.as_str()) {
                out.emit(
                    Code::Lint(LintCode::UnusedMacro),
                    mac.name_span,
                    format!("macro `{}` is never used", mac.name),
                );
            }
        }
    }
}

struct MismatchedBlockName;

impl Rule for MismatchedBlockName {
    fn name(&self) -> &'static str {
        "Parser/MismatchedBlockName"
    }

    fn check(&self, ctx: &LintContext<'_>, out: &mut Diagnostics) {
        for block in &ctx.index.blocks {
            if let Some((end_name, span)) = &block.end_name {
                if *end_name != block.name {
                    out.emit(
                        Code::Parser(ParserCode::MismatchedBlockName),
                        *span,
                        format!(
                            "`{{% endblock {} %}}` does not match `{{% block {} %}}`",
                            end_name, block.name
                        ),
                    );
                }
            }
        }
    }
}

struct UnknownFilter;

impl Rule for UnknownFilter {
    fn name(&self) -> &'static str {
        "Lint/UnknownFilter"
    }

    fn check(&self, ctx: &LintContext<'_>, out: &mut Diagnostics) {
        for filter in &ctx.index.filter_refs {
            if !filter.name.is_empty() && !ctx.env.has_filter(&filter.name) {
                out.emit(
                    Code::Lint(LintCode::UnknownFilter),
                    filter.span,
                    format!("unknown filter `{}`", filter.name),
                );
            }
        }
    }
}

struct UnknownTest;

impl Rule for UnknownTest {
    fn name(&self) -> &'static str {
        "Lint/UnknownTest"
    }

    fn check(&self, ctx: &LintContext<'_>, out: &mut Diagnostics) {
        for test in &ctx.index.test_refs {
            if !test.name.is_empty() && !ctx.env.has_test(&test.name) {
                out.emit(
                    Code::Lint(LintCode::UnknownTest),
                    test.span,
                    format!("unknown test `{}`", test.name),
                );
            }
        }
    }
}

struct UnknownFunction;

impl Rule for UnknownFunction {
    fn name(&self) -> &'static str {
        "Lint/UnknownFunction"
    }

    fn check(&self, ctx: &LintContext<'_>, out: &mut Diagnostics) {
        let mut known: HashSet<&str> = HashSet::new();
        known.insert("caller");
        for mac in &ctx.index.macros {
            known.insert(&mac.name);
        }
        for import in &ctx.index.imports {
            if let Some(alias) = &import.alias {
                known.insert(alias);
            }
            for (name, alias, _) in &import.names {
                known.insert(alias.as_deref().unwrap_or(name.as_str()));
            }
        }
        for var in &ctx.index.variables {
            known.insert(&var.name);
        }

        for call in &ctx.index.call_refs {
            if known.contains(call.name.as_str()) || ctx.env.has_function(&call.name) {
                continue;
            }
            out.emit(
                Code::Lint(LintCode::UnknownFunction),
                call.span,
                format!("unknown function `{}`", call.name),
            );
        }
    }
}

struct TrailingWhitespace;

impl Rule for TrailingWhitespace {
    fn name(&self) -> &'static str {
        "Style/TrailingWhitespace"
    }

    fn check(&self, ctx: &LintContext<'_>, out: &mut Diagnostics) {
        for (start, line) in lines_with_offsets(ctx.source) {
            let content = line.strip_suffix('\r').unwrap_or(line);
            let trimmed = content.trim_end_matches([' ', '\t']);
            if trimmed.len() < content.len() {
                out.emit(
                    Code::Style(StyleCode::TrailingWhitespace),
                    Span::new(
                        (start + trimmed.len()) as u32,
                        (start + content.len()) as u32,
                    ),
                    "trailing whitespace",
                );
            }
        }
    }
}

struct MixedIndentation;

impl Rule for MixedIndentation {
    fn name(&self) -> &'static str {
        "Style/MixedIndentation"
    }

    fn check(&self, ctx: &LintContext<'_>, out: &mut Diagnostics) {
        for (start, line) in lines_with_offsets(ctx.source) {
            let indent_len = line.len() - line.trim_start_matches([' ', '\t']).len();
            let indent = &line[..indent_len];
            if indent.contains(' ') && indent.contains('\t') {
                out.emit(
                    Code::Style(StyleCode::MixedIndentation),
                    Span::new(start as u32, (start + indent_len) as u32),
                    "indentation mixes tabs and spaces",
                );
            }
        }
    }
}

struct ExcessiveBlankLines;

impl Rule for ExcessiveBlankLines {
    fn name(&self) -> &'static str {
        "Style/ExcessiveBlankLines"
    }

    fn check(&self, ctx: &LintContext<'_>, out: &mut Diagnostics) {
        let mut run_start: Option<usize> = None;
        let mut run_len = 0usize;
        let mut flagged = Vec::new();
        for (start, line) in lines_with_offsets(ctx.source) {
            if line.trim().is_empty() {
                if run_len == 0 {
                    run_start = Some(start);
                }
                run_len += 1;
            } else {
                if run_len > 2 {
                    if let Some(s) = run_start {
                        flagged.push((s, start));
                    }
                }
                run_len = 0;
                run_start = None;
            }
        }
        if run_len > 2 {
            if let Some(s) = run_start {
                flagged.push((s, ctx.source.len()));
            }
        }
        for (start, end) in flagged {
            out.emit(
                Code::Style(StyleCode::ExcessiveBlankLines),
                Span::new(start as u32, end as u32),
                "more than two consecutive blank lines",
            );
        }
    }
}

struct BlockNaming;

impl Rule for BlockNaming {
    fn name(&self) -> &'static str {
        "Naming/BlockName"
    }

    fn check(&self, ctx: &LintContext<'_>, out: &mut Diagnostics) {
        for block in &ctx.index.blocks {
            if !is_snake_case(&block.name) {
                out.emit(
                    Code::Naming(NamingCode::BlockName),
                    block.name_span,
                    format!("block name `{}` should be lower_snake_case", block.name),
                );
            }
        }
    }
}

fn is_snake_case(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_lowercase() || c.is_ascii_digit())
}

fn lines_with_offsets(source: &str) -> Vec<(usize, &str)> {
    let mut lines = Vec::new();
    let mut start = 0usize;
    for line in source.split('\n') {
        lines.push((start, line));
        start += line.len() + 1;
    }
    lines
}
