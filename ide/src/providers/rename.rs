use std::collections::HashMap;

use analyzer::SourceMap;

use crate::lsp::{Range, TextEdit, WorkspaceEdit, range_of};

use super::Analysis;

pub fn prepare_rename(analysis: &Analysis<'_>, offset: u32) -> Option<Range> {
    let (_, span) = analysis.scopes.symbol_at(offset)?;
    let sm = SourceMap::new(analysis.source);
    Some(range_of(span, &sm))
}

/// Rename by binding identity: the definition plus exactly the references
/// resolving to it. Shadowing bindings elsewhere are untouched.
pub fn rename(analysis: &Analysis<'_>, offset: u32, new_name: &str) -> Option<WorkspaceEdit> {
    if !is_identifier(new_name) {
        return None;
    }
    let (binding, _) = analysis.scopes.symbol_at(offset)?;
    let sm = SourceMap::new(analysis.source);

    let edits: Vec<TextEdit> = analysis
        .scopes
        .spans_of(binding.id)
        .into_iter()
        .map(|span| TextEdit {
            range: range_of(span, &sm),
            new_text: new_name.to_string(),
        })
        .collect();
    if edits.is_empty() {
        return None;
    }

    let mut changes = HashMap::new();
    changes.insert(analysis.uri.to_string(), edits);
    Some(WorkspaceEdit { changes })
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}
