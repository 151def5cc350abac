use analyzer::SourceMap;

use crate::lsp::{DocumentLink, range_of};

use super::Analysis;

/// Links for every literal template reference: extends, include, import.
pub fn document_links(analysis: &Analysis<'_>) -> Vec<DocumentLink> {
    let sm = SourceMap::new(analysis.source);
    let mut links = Vec::new();

    if let Some((name, span)) = &analysis.index.extends {
        links.push(DocumentLink {
            range: range_of(*span, &sm),
            target: name.clone(),
        });
    }
    for include in &analysis.index.includes {
        links.push(DocumentLink {
            range: range_of(include.template_span, &sm),
            target: include.template.clone(),
        });
    }
    for import in &analysis.index.imports {
        links.push(DocumentLink {
            range: range_of(import.template_span, &sm),
            target: import.template.clone(),
        });
    }

    links.sort_by_key(|l| (l.range.start.line, l.range.start.character));
    links
}
