use analyzer::ast::{Stmt, StmtKind};
use analyzer::{SourceMap, Span};

use crate::lsp::FoldingRange;

use super::Analysis;

/// Folding ranges for multi-line block statements and comments.
pub fn folding_ranges(analysis: &Analysis<'_>) -> Vec<FoldingRange> {
    let sm = SourceMap::new(analysis.source);
    let mut ranges = Vec::new();
    collect(&analysis.parse.template.body, &sm, &mut ranges);
    ranges.sort_by_key(|r| (r.start_line, r.end_line));
    ranges
}

fn collect(body: &[Stmt], sm: &SourceMap<'_>, out: &mut Vec<FoldingRange>) {
    for stmt in body {
        match &stmt.kind {
            StmtKind::If {
                body, else_body, ..
            } => {
                push_range(stmt.span, sm, out);
                collect(body, sm, out);
                collect(else_body, sm, out);
            }
            StmtKind::For {
                body, else_body, ..
            } => {
                push_range(stmt.span, sm, out);
                collect(body, sm, out);
                collect(else_body, sm, out);
            }
            StmtKind::Block { body, .. }
            | StmtKind::Macro { body, .. }
            | StmtKind::SetBlock { body, .. }
            | StmtKind::CallBlock { body, .. }
            | StmtKind::CustomTag { body, .. } => {
                push_range(stmt.span, sm, out);
                collect(body, sm, out);
            }
            StmtKind::Raw { .. } | StmtKind::Comment { .. } => {
                push_range(stmt.span, sm, out);
            }
            _ => {}
        }
    }
}

fn push_range(span: Span, sm: &SourceMap<'_>, out: &mut Vec<FoldingRange>) {
    let (start_line, _) = sm.line_col(span.start);
    let (end_line, _) = sm.line_col(span.end);
    if end_line > start_line {
        out.push(FoldingRange {
            start_line: start_line - 1,
            end_line: end_line - 1,
        });
    }
}
