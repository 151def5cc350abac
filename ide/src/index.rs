//! Per-URI symbol index and the cross-file inference cache.
//!
//! One visitor traversal collects everything linting and the LSP providers
//! read: variables with their binding source and a shallow type tag, macros
//! with rendered signatures, blocks, imports/includes, the extends target,
//! every name/filter/test/call reference with its span, and the referenced
//! context names (used but never defined).
//!
//! [`InferenceIndex`] caches one index per URI, invalidated on version
//! change; cross-template imports are resolved on demand through the
//! environment's loader and tracked in a dependency graph so invalidating a
//! template invalidates its dependents transitively.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use analyzer::ast::{
    Expr, ExprKind, LitKind, Stmt, StmtKind, Target, TargetKind, Template, Visitor, walk_expr,
    walk_stmt, walk_template,
};
use analyzer::{Span, format_expr};
use renderer::Environment;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarSource {
    Set,
    ForLoop,
    MacroParam,
    Context,
}

/// Deliberately shallow type tags: literals get their literal type, a `for`
/// target gets an element-of hint, everything else is `Any`. Advisory only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeTag {
    Any,
    Str,
    Int,
    Float,
    Bool,
    Null,
    List,
    Dict,
    ElementOf(Box<TypeTag>),
}

impl TypeTag {
    pub fn label(&self) -> String {
        match self {
            TypeTag::Any => "any".to_string(),
            TypeTag::Str => "string".to_string(),
            TypeTag::Int => "int".to_string(),
            TypeTag::Float => "float".to_string(),
            TypeTag::Bool => "bool".to_string(),
            TypeTag::Null => "none".to_string(),
            TypeTag::List => "list".to_string(),
            TypeTag::Dict => "dict".to_string(),
            TypeTag::ElementOf(inner) => format!("element of {}", inner.label()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub source: VarSource,
    pub span: Option<Span>,
    pub ty: TypeTag,
}

#[derive(Debug, Clone)]
pub struct MacroSym {
    pub name: String,
    pub params: Vec<String>,
    pub defaults: Vec<Option<String>>,
    pub signature: String,
    pub span: Span,
    pub name_span: Span,
}

#[derive(Debug, Clone)]
pub struct BlockSym {
    pub name: String,
    pub uri: String,
    pub span: Span,
    pub name_span: Span,
    pub end_name: Option<(String, Span)>,
}

#[derive(Debug, Clone)]
pub struct ImportSym {
    pub template: String,
    pub template_span: Span,
    /// Namespace alias for `import … as x`; empty for `from … import`.
    pub alias: Option<String>,
    /// Imported names with optional aliases for `from … import`.
    pub names: Vec<(String, Option<String>, Span)>,
    pub with_context: bool,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct IncludeSym {
    pub template: String,
    pub template_span: Span,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct NameRef {
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone, Default)]
pub struct DocumentIndex {
    pub uri: String,
    pub variables: Vec<Variable>,
    pub macros: Vec<MacroSym>,
    pub blocks: Vec<BlockSym>,
    pub imports: Vec<ImportSym>,
    pub includes: Vec<IncludeSym>,
    pub extends: Option<(String, Span)>,
    pub name_refs: Vec<NameRef>,
    pub filter_refs: Vec<NameRef>,
    pub test_refs: Vec<NameRef>,
    pub call_refs: Vec<NameRef>,
    /// Names used but never defined — candidates for context-variable hover.
    pub context_names: Vec<NameRef>,
}

pub fn build_index(
    uri: &str,
    template: &Template,
    cancel: Option<&dyn Fn() -> bool>,
) -> DocumentIndex {
    let mut builder = IndexBuilder {
        index: DocumentIndex {
            uri: uri.to_string(),
            ..DocumentIndex::default()
        },
        defined: HashSet::new(),
        cancel,
    };
    walk_template(&mut builder, template);

    let mut index = builder.index;
    let defined = builder.defined;
    let mut seen = HashSet::new();
    index.context_names = index
        .name_refs
        .iter()
        .filter(|r| !defined.contains(&r.name) && r.name != "caller")
        .filter(|r| seen.insert(r.name.clone()))
        .cloned()
        .collect();
    index
}

struct IndexBuilder<'a> {
    index: DocumentIndex,
    defined: HashSet<String>,
    cancel: Option<&'a dyn Fn() -> bool>,
}

impl IndexBuilder<'_> {
    fn define_target(&mut self, target: &Target, source: VarSource, ty: TypeTag) {
        match &target.kind {
            TargetKind::Name(sym) => {
                self.defined.insert(sym.text.clone());
                self.index.variables.push(Variable {
                    name: sym.text.clone(),
                    source,
                    span: Some(target.span),
                    ty,
                });
            }
            TargetKind::Tuple(items) => {
                for item in items {
                    self.define_target(item, source, TypeTag::Any);
                }
            }
            // Assignment through `a.b` / `a[k]` mutates an existing binding.
            TargetKind::GetAttr { .. } | TargetKind::GetItem { .. } | TargetKind::Error => {}
        }
    }
}

impl Visitor for IndexBuilder<'_> {
    fn should_cancel(&self) -> bool {
        self.cancel.is_some_and(|f| f())
    }

    fn visit_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Set { target, value } => {
                self.define_target(target, VarSource::Set, infer_ty(value));
            }
            StmtKind::SetBlock { target, .. } => {
                self.define_target(target, VarSource::Set, TypeTag::Str);
            }
            StmtKind::For { target, iter, .. } => {
                let element = TypeTag::ElementOf(Box::new(infer_ty(iter)));
                self.define_target(target, VarSource::ForLoop, element);
            }
            StmtKind::Macro { name, params, body: _ } => {
                let mut rendered: Vec<String> = Vec::new();
                let mut param_names = Vec::new();
                let mut defaults = Vec::new();
                for param in params {
                    param_names.push(param.name.node.text.clone());
                    let default = param.default.as_ref().map(format_expr);
                    match &default {
                        Some(d) => rendered.push(format!("{}={}", param.name.node.text, d)),
                        None => rendered.push(param.name.node.text.clone()),
                    }
                    defaults.push(default);
                    self.defined.insert(param.name.node.text.clone());
                    self.index.variables.push(Variable {
                        name: param.name.node.text.clone(),
                        source: VarSource::MacroParam,
                        span: Some(param.name.span),
                        ty: TypeTag::Any,
                    });
                }
                self.defined.insert(name.node.text.clone());
                self.index.macros.push(MacroSym {
                    name: name.node.text.clone(),
                    params: param_names,
                    defaults,
                    signature: format!("{}({})", name.node.text, rendered.join(", ")),
                    span: stmt.span,
                    name_span: name.span,
                });
            }
            StmtKind::Block {
                name, end_name, ..
            } => {
                self.index.blocks.push(BlockSym {
                    name: name.node.text.clone(),
                    uri: self.index.uri.clone(),
                    span: stmt.span,
                    name_span: name.span,
                    end_name: end_name
                        .as_ref()
                        .map(|n| (n.node.text.clone(), n.span)),
                });
            }
            StmtKind::Extends { template } => {
                if self.index.extends.is_none() {
                    if let Some((name, span)) = template_name(template) {
                        self.index.extends = Some((name, span));
                    }
                }
            }
            StmtKind::Include { template, .. } => {
                if let Some((name, span)) = template_name(template) {
                    self.index.includes.push(IncludeSym {
                        template: name,
                        template_span: span,
                        span: stmt.span,
                    });
                }
            }
            StmtKind::Import { template, alias } => {
                self.defined.insert(alias.node.text.clone());
                if let Some((name, span)) = template_name(template) {
                    self.index.imports.push(ImportSym {
                        template: name,
                        template_span: span,
                        alias: Some(alias.node.text.clone()),
                        names: Vec::new(),
                        with_context: false,
                        span: stmt.span,
                    });
                }
            }
            StmtKind::FromImport {
                template,
                names,
                with_context,
            } => {
                let mut imported = Vec::new();
                for import in names {
                    let bound = import
                        .alias
                        .as_ref()
                        .map(|a| a.node.text.clone())
                        .unwrap_or_else(|| import.name.node.text.clone());
                    self.defined.insert(bound);
                    imported.push((
                        import.name.node.text.clone(),
                        import.alias.as_ref().map(|a| a.node.text.clone()),
                        import.name.span,
                    ));
                }
                if let Some((name, span)) = template_name(template) {
                    self.index.imports.push(ImportSym {
                        template: name,
                        template_span: span,
                        alias: None,
                        names: imported,
                        with_context: *with_context,
                        span: stmt.span,
                    });
                }
            }
            _ => {}
        }
        walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Name(sym) => {
                self.index.name_refs.push(NameRef {
                    name: sym.text.clone(),
                    span: expr.span,
                });
            }
            ExprKind::Filter { name, .. } => {
                self.index.filter_refs.push(NameRef {
                    name: name.node.text.clone(),
                    span: name.span,
                });
            }
            ExprKind::Test { name, .. } => {
                self.index.test_refs.push(NameRef {
                    name: name.node.text.clone(),
                    span: name.span,
                });
            }
            ExprKind::Call { callee, .. } => {
                if let ExprKind::Name(sym) = &callee.kind {
                    self.index.call_refs.push(NameRef {
                        name: sym.text.clone(),
                        span: callee.span,
                    });
                }
            }
            _ => {}
        }
        walk_expr(self, expr);
    }
}

/// Literal template targets (`extends "base.html"`) resolve statically;
/// dynamic expressions stay out of the index.
fn template_name(expr: &Expr) -> Option<(String, Span)> {
    match &expr.kind {
        ExprKind::Lit(LitKind::Str(s)) => Some((s.clone(), expr.span)),
        ExprKind::Group { inner } => template_name(inner),
        _ => None,
    }
}

fn infer_ty(expr: &Expr) -> TypeTag {
    match &expr.kind {
        ExprKind::Lit(LitKind::Str(_)) => TypeTag::Str,
        ExprKind::Lit(LitKind::Int(_)) => TypeTag::Int,
        ExprKind::Lit(LitKind::Float(_)) => TypeTag::Float,
        ExprKind::Lit(LitKind::Bool(_)) => TypeTag::Bool,
        ExprKind::Lit(LitKind::Null) => TypeTag::Null,
        ExprKind::List { .. } | ExprKind::Tuple { .. } => TypeTag::List,
        ExprKind::Dict { .. } => TypeTag::Dict,
        ExprKind::Group { inner } => infer_ty(inner),
        _ => TypeTag::Any,
    }
}

struct CacheEntry {
    version: Option<i32>,
    index: Arc<DocumentIndex>,
}

/// Cross-file analysis cache, one entry per URI.
#[derive(Default)]
pub struct InferenceIndex {
    cache: RwLock<HashMap<String, CacheEntry>>,
    dependents: RwLock<HashMap<String, HashSet<String>>>,
}

impl InferenceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn analyze(
        &self,
        uri: &str,
        version: Option<i32>,
        template: &Template,
    ) -> Arc<DocumentIndex> {
        self.analyze_with_cancel(uri, version, template, None)
    }

    pub fn analyze_with_cancel(
        &self,
        uri: &str,
        version: Option<i32>,
        template: &Template,
        cancel: Option<&dyn Fn() -> bool>,
    ) -> Arc<DocumentIndex> {
        if let Some(hit) = self.cached(uri, version) {
            return hit;
        }
        let index = Arc::new(build_index(uri, template, cancel));
        self.record_dependencies(uri, &index);
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(
                uri.to_string(),
                CacheEntry {
                    version,
                    index: index.clone(),
                },
            );
        }
        index
    }

    pub fn get(&self, uri: &str) -> Option<Arc<DocumentIndex>> {
        self.cache.read().ok()?.get(uri).map(|e| e.index.clone())
    }

    fn cached(&self, uri: &str, version: Option<i32>) -> Option<Arc<DocumentIndex>> {
        let cache = self.cache.read().ok()?;
        let entry = cache.get(uri)?;
        if entry.version == version {
            Some(entry.index.clone())
        } else {
            None
        }
    }

    /// Analyze a template referenced by name (`from "macros.j2" import …`),
    /// loading it through the environment's loader. Cached until invalidated.
    pub fn resolve_template(&self, env: &Environment, name: &str) -> Option<Arc<DocumentIndex>> {
        if let Some(hit) = self.get(name) {
            return Some(hit);
        }
        let source = env.load_template(name)?;
        let parsed = env.parse(&source);
        let index = Arc::new(build_index(name, &parsed.template, None));
        self.record_dependencies(name, &index);
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(
                name.to_string(),
                CacheEntry {
                    version: None,
                    index: index.clone(),
                },
            );
        }
        Some(index)
    }

    fn record_dependencies(&self, uri: &str, index: &DocumentIndex) {
        let Ok(mut dependents) = self.dependents.write() else {
            return;
        };
        let mut targets: Vec<&str> = Vec::new();
        if let Some((name, _)) = &index.extends {
            targets.push(name);
        }
        for import in &index.imports {
            targets.push(&import.template);
        }
        for include in &index.includes {
            targets.push(&include.template);
        }
        for target in targets {
            dependents
                .entry(target.to_string())
                .or_default()
                .insert(uri.to_string());
        }
    }

    /// Drop a document's index and, transitively, everything that imported it.
    pub fn invalidate(&self, uri: &str) {
        let mut worklist = vec![uri.to_string()];
        let mut dropped = HashSet::new();
        while let Some(current) = worklist.pop() {
            if !dropped.insert(current.clone()) {
                continue;
            }
            if let Ok(mut cache) = self.cache.write() {
                cache.remove(&current);
            }
            if let Ok(dependents) = self.dependents.read() {
                if let Some(users) = dependents.get(&current) {
                    worklist.extend(users.iter().cloned());
                }
            }
        }
    }
}
