use std::sync::Arc;

use analyzer::MemoryLoader;
use renderer::Environment;

use crate::Workspace;
use crate::lsp::Position;

pub const URI: &str = "file:///main.j2";

/// A workspace with `source` open as the main document and `templates`
/// available through the loader.
pub fn workspace(source: &str, templates: Vec<(&str, &str)>) -> Workspace {
    let mut env = Environment::new();
    if !templates.is_empty() {
        let mut loader = MemoryLoader::new();
        for (name, text) in templates {
            loader.insert(name, text);
        }
        env.set_loader(loader);
    }
    let workspace = Workspace::new(Arc::new(env));
    workspace.open(URI, 1, source);
    workspace
}

/// Editor position of a byte offset in `source` (0-based line/character).
pub fn position_at(source: &str, offset: usize) -> Position {
    let before = &source[..offset];
    let line = before.matches('\n').count() as u32;
    let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
    Position {
        line,
        character: before[line_start..].chars().count() as u32,
    }
}

/// Position of the `needle`'s `occurrence`-th appearance (0-based).
pub fn position_of_occurrence(source: &str, needle: &str, occurrence: usize) -> Position {
    let mut from = 0usize;
    for _ in 0..occurrence {
        let at = source[from..].find(needle).expect("occurrence exists");
        from += at + needle.len();
    }
    let at = source[from..].find(needle).expect("occurrence exists");
    position_at(source, from + at)
}
