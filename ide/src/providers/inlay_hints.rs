use std::collections::HashMap;

use analyzer::SourceMap;
use analyzer::ast::{Expr, ExprKind, Visitor, walk_expr, walk_template};

use crate::lsp::{InlayHint, position_of};

use super::Analysis;

/// Parameter-name hints for positional arguments at macro call sites.
pub fn inlay_hints(analysis: &Analysis<'_>) -> Vec<InlayHint> {
    let params_by_macro: HashMap<&str, &[String]> = analysis
        .index
        .macros
        .iter()
        .map(|m| (m.name.as_str(), m.params.as_slice()))
        .collect();

    let sm = SourceMap::new(analysis.source);
    let mut collector = HintCollector {
        params_by_macro,
        sm: &sm,
        hints: Vec::new(),
    };
    walk_template(&mut collector, &analysis.parse.template);
    collector
        .hints
        .sort_by_key(|h| (h.position.line, h.position.character));
    collector.hints
}

struct HintCollector<'a> {
    params_by_macro: HashMap<&'a str, &'a [String]>,
    sm: &'a SourceMap<'a>,
    hints: Vec<InlayHint>,
}

impl Visitor for HintCollector<'_> {
    fn visit_expr(&mut self, expr: &Expr) {
        if let ExprKind::Call { callee, args, .. } = &expr.kind {
            if let ExprKind::Name(sym) = &callee.kind {
                if let Some(params) = self.params_by_macro.get(sym.text.as_str()) {
                    for (i, arg) in args.iter().enumerate() {
                        let Some(param) = params.get(i) else {
                            break;
                        };
                        self.hints.push(InlayHint {
                            position: position_of(arg.span.start, self.sm),
                            label: format!("{}:", param),
                        });
                    }
                }
            }
        }
        walk_expr(self, expr);
    }
}
