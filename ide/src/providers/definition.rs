use analyzer::SourceMap;

use crate::index::InferenceIndex;
use crate::lsp::{Location, Position, Range, range_of};

use super::Analysis;

pub fn definition(
    analysis: &Analysis<'_>,
    offset: u32,
    infer: &InferenceIndex,
) -> Option<Location> {
    let sm = SourceMap::new(analysis.source);

    // A template-name string under the cursor jumps to that template.
    if let Some(target) = template_target_at(analysis, offset) {
        return Some(Location {
            uri: target,
            range: Range {
                start: Position {
                    line: 0,
                    character: 0,
                },
                end: Position {
                    line: 0,
                    character: 0,
                },
            },
        });
    }

    let (binding, _) = analysis.scopes.symbol_at(offset)?;

    if let Some(def_span) = binding.def_span {
        return Some(Location {
            uri: analysis.uri.to_string(),
            range: range_of(def_span, &sm),
        });
    }

    // Context-looking names that were imported resolve into their source
    // template.
    for import in &analysis.index.imports {
        let matches_import = import.names.iter().any(|(name, alias, _)| {
            alias.as_deref().unwrap_or(name.as_str()) == binding.name
        });
        if !matches_import {
            continue;
        }
        let other = infer.resolve_template(analysis.env, &import.template)?;
        let source = analysis.env.load_template(&import.template)?;
        let other_sm = SourceMap::new(&source);
        let original = import
            .names
            .iter()
            .find(|(name, alias, _)| alias.as_deref().unwrap_or(name.as_str()) == binding.name)
            .map(|(name, _, _)| name.as_str())?;
        let mac = other.macros.iter().find(|m| m.name == original)?;
        return Some(Location {
            uri: import.template.clone(),
            range: range_of(mac.name_span, &other_sm),
        });
    }

    None
}

fn template_target_at(analysis: &Analysis<'_>, offset: u32) -> Option<String> {
    if let Some((name, span)) = &analysis.index.extends {
        if span.touches(offset) {
            return Some(name.clone());
        }
    }
    for include in &analysis.index.includes {
        if include.template_span.touches(offset) {
            return Some(include.template.clone());
        }
    }
    for import in &analysis.index.imports {
        if import.template_span.touches(offset) {
            return Some(import.template.clone());
        }
    }
    None
}
