use std::collections::HashSet;

use analyzer::{OpKind, Token, TokenKind};

use crate::lsp::{CompletionItem, CompletionItemKind};

use super::Analysis;

const BUILTIN_TAGS: [&str; 11] = [
    "if", "for", "set", "block", "extends", "include", "import", "from", "macro", "call", "raw",
];

/// Context-sensitive completion: tag names after `{%`, filter names after
/// `|`, test names after `is`, otherwise everything nameable inside an
/// expression. Text position completes nothing.
pub fn completion(analysis: &Analysis<'_>, offset: u32) -> Vec<CompletionItem> {
    let (prev, prev2, in_tag) = cursor_context(&analysis.parse.tokens, offset);

    // When the cursor sits inside a partial identifier, classify by the token
    // before it.
    let anchor = match &prev {
        Some(tok) if matches!(tok.kind, TokenKind::Ident(_)) && tok.span.touches(offset) => {
            prev2.as_ref()
        }
        _ => prev.as_ref(),
    };

    let Some(anchor) = anchor else {
        return Vec::new();
    };

    match &anchor.kind {
        TokenKind::Op(OpKind::Pipe) => analysis
            .env
            .filter_names()
            .into_iter()
            .map(|name| item(name, CompletionItemKind::Function, "filter"))
            .collect(),
        TokenKind::Ident(sym) if sym.text == "is" => analysis
            .env
            .test_names()
            .into_iter()
            .map(|name| item(name, CompletionItemKind::Function, "test"))
            .collect(),
        TokenKind::BlockStart { .. } => {
            let mut names: Vec<&str> = BUILTIN_TAGS.to_vec();
            names.extend(analysis.env.tags().names());
            names.sort_unstable();
            names.dedup();
            names
                .into_iter()
                .map(|name| item(name, CompletionItemKind::Keyword, "tag"))
                .collect()
        }
        _ if in_tag => expression_items(analysis),
        _ => Vec::new(),
    }
}

fn expression_items(analysis: &Analysis<'_>) -> Vec<CompletionItem> {
    let mut items = Vec::new();
    let mut seen = HashSet::new();

    for variable in &analysis.index.variables {
        if seen.insert(variable.name.clone()) {
            items.push(item(
                &variable.name,
                CompletionItemKind::Variable,
                &variable.ty.label(),
            ));
        }
    }
    for name in &analysis.index.context_names {
        if seen.insert(name.name.clone()) {
            items.push(item(&name.name, CompletionItemKind::Variable, "context"));
        }
    }
    for mac in &analysis.index.macros {
        if seen.insert(mac.name.clone()) {
            items.push(item(&mac.name, CompletionItemKind::Function, &mac.signature));
        }
    }
    for import in &analysis.index.imports {
        if let Some(alias) = &import.alias {
            if seen.insert(alias.clone()) {
                items.push(item(alias, CompletionItemKind::Property, "import namespace"));
            }
        }
        for (name, alias, _) in &import.names {
            let bound = alias.as_deref().unwrap_or(name.as_str());
            if seen.insert(bound.to_string()) {
                items.push(item(bound, CompletionItemKind::Function, "imported macro"));
            }
        }
    }
    for name in analysis.env.function_names() {
        if seen.insert(name.to_string()) {
            items.push(item(name, CompletionItemKind::Function, "function"));
        }
    }

    items.sort_by(|a, b| a.label.cmp(&b.label));
    items
}

fn item(label: &str, kind: CompletionItemKind, detail: &str) -> CompletionItem {
    CompletionItem {
        label: label.to_string(),
        kind,
        detail: Some(detail.to_string()),
    }
}

/// The last two significant tokens before the cursor and whether the cursor
/// is inside `{{ … }}` / `{% … %}`.
fn cursor_context(tokens: &[Token], offset: u32) -> (Option<Token>, Option<Token>, bool) {
    let mut prev: Option<Token> = None;
    let mut prev2: Option<Token> = None;
    let mut in_tag = false;
    for token in tokens {
        if token.span.start >= offset {
            break;
        }
        match token.kind {
            TokenKind::VarStart { .. } | TokenKind::BlockStart { .. } => in_tag = true,
            TokenKind::VarEnd { .. } | TokenKind::BlockEnd { .. } => {
                // Only exit the tag once the cursor is past the closer.
                if token.span.end <= offset {
                    in_tag = false;
                }
            }
            _ => {}
        }
        if !token.is_trivia() && !matches!(token.kind, TokenKind::Eof) {
            prev2 = prev.take();
            prev = Some(token.clone());
        }
    }
    (prev, prev2, in_tag)
}
