//! Versioned document store with a parse cache.
//!
//! Documents are mutable, versioned, and shared across providers; callers get
//! short-lived `Arc` read handles. The parse cache is keyed by (URI, version)
//! with LRU eviction, and a write to a document invalidates its cache entry.
//! The `RwLock` gives per-URI-map concurrency safety for parallel provider
//! calls.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};

use analyzer::{ParseOutput, TagRegistry};

const DEFAULT_PARSE_CACHE_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct Document {
    pub uri: String,
    pub version: i32,
    pub text: String,
}

#[derive(Default)]
struct StoreInner {
    docs: HashMap<String, Arc<Document>>,
    parses: HashMap<String, (i32, Arc<ParseOutput>)>,
    lru: VecDeque<String>,
}

pub struct DocumentStore {
    inner: RwLock<StoreInner>,
    capacity: usize,
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_PARSE_CACHE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        DocumentStore {
            inner: RwLock::new(StoreInner::default()),
            capacity: capacity.max(1),
        }
    }

    pub fn open(&self, uri: &str, version: i32, text: impl Into<String>) {
        let Ok(mut inner) = self.inner.write() else {
            return;
        };
        inner.docs.insert(
            uri.to_string(),
            Arc::new(Document {
                uri: uri.to_string(),
                version,
                text: text.into(),
            }),
        );
        inner.parses.remove(uri);
    }

    pub fn change(&self, uri: &str, version: i32, text: impl Into<String>) {
        self.open(uri, version, text);
    }

    pub fn close(&self, uri: &str) {
        let Ok(mut inner) = self.inner.write() else {
            return;
        };
        inner.docs.remove(uri);
        inner.parses.remove(uri);
        inner.lru.retain(|u| u != uri);
    }

    pub fn get(&self, uri: &str) -> Option<Arc<Document>> {
        self.inner.read().ok()?.docs.get(uri).cloned()
    }

    pub fn open_uris(&self) -> Vec<String> {
        match self.inner.read() {
            Ok(inner) => {
                let mut uris: Vec<String> = inner.docs.keys().cloned().collect();
                uris.sort_unstable();
                uris
            }
            Err(_) => Vec::new(),
        }
    }

    /// Parse a document, reusing the cached tree when the version matches.
    pub fn parse(&self, uri: &str, tags: &TagRegistry) -> Option<Arc<ParseOutput>> {
        let doc = self.get(uri)?;

        {
            let Ok(mut inner) = self.inner.write() else {
                return None;
            };
            if let Some((version, parsed)) = inner.parses.get(uri) {
                if *version == doc.version {
                    let parsed = parsed.clone();
                    touch(&mut inner.lru, uri);
                    return Some(parsed);
                }
            }
        }

        let parsed = Arc::new(analyzer::parse(&doc.text, tags));
        let Ok(mut inner) = self.inner.write() else {
            return Some(parsed);
        };
        inner
            .parses
            .insert(uri.to_string(), (doc.version, parsed.clone()));
        touch(&mut inner.lru, uri);
        while inner.lru.len() > self.capacity {
            if let Some(evicted) = inner.lru.pop_front() {
                inner.parses.remove(&evicted);
            }
        }
        Some(parsed)
    }
}

fn touch(lru: &mut VecDeque<String>, uri: &str) {
    lru.retain(|u| u != uri);
    lru.push_back(uri.to_string());
}
