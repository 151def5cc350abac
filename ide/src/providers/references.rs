use analyzer::SourceMap;

use crate::lsp::{Location, range_of};

use super::Analysis;

pub fn references(analysis: &Analysis<'_>, offset: u32) -> Vec<Location> {
    let Some((binding, _)) = analysis.scopes.symbol_at(offset) else {
        return Vec::new();
    };
    let sm = SourceMap::new(analysis.source);
    analysis
        .scopes
        .spans_of(binding.id)
        .into_iter()
        .map(|span| Location {
            uri: analysis.uri.to_string(),
            range: range_of(span, &sm),
        })
        .collect()
}
