//! Read-only LSP providers over one analyzed document.
//!
//! Each provider is a pure function of an [`Analysis`] snapshot and a byte
//! offset or range; nothing here mutates the store or the caches.

pub mod completion;
pub mod definition;
pub mod folding;
pub mod hover;
pub mod inlay_hints;
pub mod links;
pub mod references;
pub mod rename;
pub mod symbols;

use analyzer::ParseOutput;
use renderer::Environment;

use crate::index::DocumentIndex;
use crate::scope::ScopeMap;

/// Everything a provider can read about one document.
pub struct Analysis<'a> {
    pub uri: &'a str,
    pub source: &'a str,
    pub parse: &'a ParseOutput,
    pub index: &'a DocumentIndex,
    pub scopes: &'a ScopeMap,
    pub env: &'a Environment,
}
