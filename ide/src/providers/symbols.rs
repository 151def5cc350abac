use analyzer::SourceMap;

use crate::index::VarSource;
use crate::lsp::{DocumentSymbol, SymbolKind, range_of};

use super::Analysis;

pub fn document_symbols(analysis: &Analysis<'_>) -> Vec<DocumentSymbol> {
    let sm = SourceMap::new(analysis.source);
    let mut symbols = Vec::new();

    for block in &analysis.index.blocks {
        symbols.push(DocumentSymbol {
            name: block.name.clone(),
            kind: SymbolKind::Namespace,
            range: range_of(block.span, &sm),
            selection_range: range_of(block.name_span, &sm),
            children: Vec::new(),
        });
    }
    for mac in &analysis.index.macros {
        symbols.push(DocumentSymbol {
            name: mac.signature.clone(),
            kind: SymbolKind::Function,
            range: range_of(mac.span, &sm),
            selection_range: range_of(mac.name_span, &sm),
            children: Vec::new(),
        });
    }
    for variable in &analysis.index.variables {
        if variable.source != VarSource::Set {
            continue;
        }
        if let Some(span) = variable.span {
            symbols.push(DocumentSymbol {
                name: variable.name.clone(),
                kind: SymbolKind::Variable,
                range: range_of(span, &sm),
                selection_range: range_of(span, &sm),
                children: Vec::new(),
            });
        }
    }

    symbols.sort_by_key(|s| (s.range.start.line, s.range.start.character));
    symbols
}
