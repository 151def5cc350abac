//! Template loading.
//!
//! The loader is the only I/O touchpoint of the core. It is invoked
//! synchronously, must be idempotent, and returns `None` for unknown names;
//! the caller decides whether that is a fault (`include` without
//! `ignore missing`) or not.

use std::collections::HashMap;

pub trait Loader: Send + Sync {
    fn load(&self, name: &str) -> Option<String>;
}

/// In-memory loader used by tests and baked template sets.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    templates: HashMap<String, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.templates.insert(name.into(), source.into());
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.templates.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Loader for MemoryLoader {
    fn load(&self, name: &str) -> Option<String> {
        self.templates.get(name).cloned()
    }
}
