//! LSP-shaped result types.
//!
//! The JSON-RPC transport lives outside this crate; providers return these
//! serde shapes and the host frames them. Positions are 0-based line /
//! character pairs with characters counted in Unicode scalar values,
//! converted from byte spans through [`SourceMap`].

use std::collections::HashMap;

use analyzer::{SourceMap, Span};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    pub uri: String,
    pub range: Range,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hover {
    pub contents: String,
    pub range: Option<Range>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionItemKind {
    Variable,
    Function,
    Keyword,
    Property,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionItem {
    pub label: String,
    pub kind: CompletionItemKind,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Variable,
    Function,
    Namespace,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentSymbol {
    pub name: String,
    pub kind: SymbolKind,
    pub range: Range,
    pub selection_range: Range,
    pub children: Vec<DocumentSymbol>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FoldingRange {
    pub start_line: u32,
    pub end_line: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextEdit {
    pub range: Range,
    pub new_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct WorkspaceEdit {
    pub changes: HashMap<String, Vec<TextEdit>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlayHint {
    pub position: Position,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentLink {
    pub range: Range,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkspaceSymbol {
    pub name: String,
    pub kind: SymbolKind,
    pub location: Location,
}

pub fn position_of(offset: u32, sm: &SourceMap<'_>) -> Position {
    let (line, col) = sm.line_col(offset);
    Position {
        line: line.saturating_sub(1),
        character: col.saturating_sub(1),
    }
}

pub fn range_of(span: Span, sm: &SourceMap<'_>) -> Range {
    Range {
        start: position_of(span.start, sm),
        end: position_of(span.end, sm),
    }
}

/// Byte offset for an incoming editor position, clamped to the line end.
pub fn offset_at(text: &str, position: Position) -> u32 {
    let sm = SourceMap::new(text);
    let line_start = sm.line_start(position.line + 1) as usize;
    let mut offset = line_start;
    let mut chars = 0u32;
    for c in text[line_start..].chars() {
        if chars >= position.character || c == '\n' {
            break;
        }
        offset += c.len_utf8();
        chars += 1;
    }
    offset as u32
}
