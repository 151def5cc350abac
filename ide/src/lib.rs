//! IDE layer over the analysis pipeline.
//!
//! Owns the versioned document store, the per-URI inference index, the lint
//! rule catalog, and the read-only LSP providers. The JSON-RPC transport is a
//! host concern; [`Workspace`] exposes provider functions that take
//! `(uri, position)` and return LSP-shaped results.
//!
//! Concurrency: the store and inference cache are `RwLock`-guarded at URI
//! granularity, the environment is read-only after setup, and every provider
//! call works on an immutable analysis snapshot.

mod index;
mod lint;
mod lsp;
mod providers;
mod scope;
mod store;
mod tests;

use std::sync::Arc;

use analyzer::{Diagnostic, DiagnosticJson, SourceMap};
use renderer::Environment;

pub use index::{
    BlockSym, DocumentIndex, ImportSym, IncludeSym, InferenceIndex, MacroSym, NameRef, TypeTag,
    VarSource, Variable, build_index,
};
pub use lint::{LintContext, Rule, check, rules};
pub use lsp::{
    CompletionItem, CompletionItemKind, DocumentLink, DocumentSymbol, FoldingRange, Hover,
    InlayHint, Location, Position, Range, SymbolKind, TextEdit, WorkspaceEdit, WorkspaceSymbol,
    offset_at, position_of, range_of,
};
pub use providers::Analysis;
pub use scope::{Binding, BindingKind, NameOccurrence, ScopeMap};
pub use store::{Document, DocumentStore};

/// One workspace of open documents sharing an environment.
pub struct Workspace {
    env: Arc<Environment>,
    store: DocumentStore,
    infer: InferenceIndex,
}

impl Workspace {
    pub fn new(env: Arc<Environment>) -> Self {
        Workspace {
            env,
            store: DocumentStore::new(),
            infer: InferenceIndex::new(),
        }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn open(&self, uri: &str, version: i32, text: impl Into<String>) {
        self.store.open(uri, version, text);
        self.infer.invalidate(uri);
    }

    pub fn change(&self, uri: &str, version: i32, text: impl Into<String>) {
        self.store.change(uri, version, text);
        self.infer.invalidate(uri);
    }

    pub fn close(&self, uri: &str) {
        self.store.close(uri);
        self.infer.invalidate(uri);
    }

    /// Parse + lint diagnostics for publishing, in stable span order.
    pub fn diagnostics(&self, uri: &str) -> Vec<Diagnostic> {
        let Some(doc) = self.store.get(uri) else {
            return Vec::new();
        };
        let Some(parse) = self.store.parse(uri, self.env.tags()) else {
            return Vec::new();
        };
        let index = self.infer.analyze(uri, Some(doc.version), &parse.template);
        lint::check(uri, &doc.text, &parse, &index, &self.env)
    }

    /// The wire shape used by snapshots and the CLI.
    pub fn diagnostics_json(&self, uri: &str) -> Vec<DiagnosticJson> {
        let Some(doc) = self.store.get(uri) else {
            return Vec::new();
        };
        let sm = SourceMap::new(&doc.text);
        self.diagnostics(uri)
            .iter()
            .map(|d| d.to_json(&sm))
            .collect()
    }

    fn with_analysis<T>(&self, uri: &str, f: impl FnOnce(&Analysis<'_>) -> T) -> Option<T> {
        let doc = self.store.get(uri)?;
        let parse = self.store.parse(uri, self.env.tags())?;
        let index = self.infer.analyze(uri, Some(doc.version), &parse.template);
        let scopes = ScopeMap::build(&parse.template);
        let analysis = Analysis {
            uri,
            source: &doc.text,
            parse: &parse,
            index: &index,
            scopes: &scopes,
            env: &self.env,
        };
        Some(f(&analysis))
    }

    pub fn hover(&self, uri: &str, position: Position) -> Option<Hover> {
        self.with_analysis(uri, |a| {
            let offset = offset_at(a.source, position);
            providers::hover::hover(a, offset)
        })
        .flatten()
    }

    pub fn definition(&self, uri: &str, position: Position) -> Option<Location> {
        self.with_analysis(uri, |a| {
            let offset = offset_at(a.source, position);
            providers::definition::definition(a, offset, &self.infer)
        })
        .flatten()
    }

    pub fn references(&self, uri: &str, position: Position) -> Vec<Location> {
        self.with_analysis(uri, |a| {
            let offset = offset_at(a.source, position);
            providers::references::references(a, offset)
        })
        .unwrap_or_default()
    }

    pub fn completion(&self, uri: &str, position: Position) -> Vec<CompletionItem> {
        self.with_analysis(uri, |a| {
            let offset = offset_at(a.source, position);
            providers::completion::completion(a, offset)
        })
        .unwrap_or_default()
    }

    pub fn document_symbols(&self, uri: &str) -> Vec<DocumentSymbol> {
        self.with_analysis(uri, |a| providers::symbols::document_symbols(a))
            .unwrap_or_default()
    }

    pub fn folding_ranges(&self, uri: &str) -> Vec<FoldingRange> {
        self.with_analysis(uri, |a| providers::folding::folding_ranges(a))
            .unwrap_or_default()
    }

    pub fn prepare_rename(&self, uri: &str, position: Position) -> Option<Range> {
        self.with_analysis(uri, |a| {
            let offset = offset_at(a.source, position);
            providers::rename::prepare_rename(a, offset)
        })
        .flatten()
    }

    pub fn rename(&self, uri: &str, position: Position, new_name: &str) -> Option<WorkspaceEdit> {
        self.with_analysis(uri, |a| {
            let offset = offset_at(a.source, position);
            providers::rename::rename(a, offset, new_name)
        })
        .flatten()
    }

    pub fn inlay_hints(&self, uri: &str) -> Vec<InlayHint> {
        self.with_analysis(uri, |a| providers::inlay_hints::inlay_hints(a))
            .unwrap_or_default()
    }

    pub fn document_links(&self, uri: &str) -> Vec<DocumentLink> {
        self.with_analysis(uri, |a| providers::links::document_links(a))
            .unwrap_or_default()
    }

    /// Case-insensitive symbol search across every open document.
    pub fn workspace_symbols(&self, query: &str) -> Vec<WorkspaceSymbol> {
        let needle = query.to_lowercase();
        let mut symbols = Vec::new();
        for uri in self.store.open_uris() {
            for symbol in self.document_symbols(&uri) {
                if !needle.is_empty() && !symbol.name.to_lowercase().contains(&needle) {
                    continue;
                }
                symbols.push(WorkspaceSymbol {
                    name: symbol.name,
                    kind: symbol.kind,
                    location: Location {
                        uri: uri.clone(),
                        range: symbol.range,
                    },
                });
            }
        }
        symbols
    }

    /// Canonical reformat of an open document.
    pub fn format(&self, uri: &str) -> Option<(String, Vec<Diagnostic>)> {
        let doc = self.store.get(uri)?;
        Some(analyzer::format_source(&doc.text, self.env.tags()))
    }
}
