use analyzer::SourceMap;

use crate::index::VarSource;
use crate::lsp::{Hover, range_of};
use crate::scope::BindingKind;

use super::Analysis;

pub fn hover(analysis: &Analysis<'_>, offset: u32) -> Option<Hover> {
    let sm = SourceMap::new(analysis.source);

    for filter in &analysis.index.filter_refs {
        if filter.span.touches(offset) && !filter.span.is_empty() {
            let note = if analysis.env.has_filter(&filter.name) {
                ""
            } else {
                " (unknown)"
            };
            return Some(Hover {
                contents: format!("filter `{}`{}", filter.name, note),
                range: Some(range_of(filter.span, &sm)),
            });
        }
    }
    for test in &analysis.index.test_refs {
        if test.span.touches(offset) && !test.span.is_empty() {
            let note = if analysis.env.has_test(&test.name) {
                ""
            } else {
                " (unknown)"
            };
            return Some(Hover {
                contents: format!("test `{}`{}", test.name, note),
                range: Some(range_of(test.span, &sm)),
            });
        }
    }
    for block in &analysis.index.blocks {
        if block.name_span.touches(offset) && !block.name_span.is_empty() {
            return Some(Hover {
                contents: format!("block `{}`", block.name),
                range: Some(range_of(block.name_span, &sm)),
            });
        }
    }

    let (binding, span) = analysis.scopes.symbol_at(offset)?;

    if binding.kind == BindingKind::Macro {
        if let Some(mac) = analysis
            .index
            .macros
            .iter()
            .find(|m| m.name == binding.name)
        {
            return Some(Hover {
                contents: format!("macro `{}`", mac.signature),
                range: Some(range_of(span, &sm)),
            });
        }
        return Some(Hover {
            contents: format!("imported macro `{}`", binding.name),
            range: Some(range_of(span, &sm)),
        });
    }

    let role = match binding.kind {
        BindingKind::Set => "assigned with `set`",
        BindingKind::ForLoop => "loop variable",
        BindingKind::MacroParam => "macro parameter",
        BindingKind::Context => "context variable",
        BindingKind::Macro => "macro",
    };
    let ty = analysis
        .index
        .variables
        .iter()
        .find(|v| v.name == binding.name && matches(binding.kind, v.source))
        .map(|v| format!(": {}", v.ty.label()))
        .unwrap_or_default();

    Some(Hover {
        contents: format!("`{}`{} — {}", binding.name, ty, role),
        range: Some(range_of(span, &sm)),
    })
}

fn matches(kind: BindingKind, source: VarSource) -> bool {
    matches!(
        (kind, source),
        (BindingKind::Set, VarSource::Set)
            | (BindingKind::ForLoop, VarSource::ForLoop)
            | (BindingKind::MacroParam, VarSource::MacroParam)
            | (BindingKind::Context, VarSource::Context)
    )
}
