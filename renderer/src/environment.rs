//! The environment: registries for filters, tests, functions, and tag
//! extensions, plus the template loader and the strict-mode flags.
//!
//! Populated before parsing and rendering, consulted — never mutated — by
//! both. Handlers are stored behind `Arc` so an environment can be shared
//! across threads once setup is done.

use std::collections::HashMap;
use std::sync::Arc;

use analyzer::ast::Stmt;
use analyzer::{
    Code, Diagnostics, Loader, ParseOutput, Severity, Span, TagParser, TagRegistry,
};
use tracing::debug;

use crate::builtins;
use crate::value::{Kwargs, Value};

pub type FilterFn = dyn Fn(&Value, &[Value], &Kwargs, &mut EvalSink<'_>) -> Value + Send + Sync;
pub type TestFn = dyn Fn(&Value, &[Value], &Kwargs, &mut EvalSink<'_>) -> bool + Send + Sync;
pub type FunctionFn = dyn Fn(&[Value], &Kwargs, &mut EvalSink<'_>) -> Value + Send + Sync;

/// Diagnostic sink passed into filter/test/function bodies, pre-bound to the
/// span of the call site. Handlers report faults here and return a neutral
/// value; nothing raises.
pub struct EvalSink<'a> {
    diagnostics: &'a mut Diagnostics,
    span: Span,
}

impl<'a> EvalSink<'a> {
    pub fn new(diagnostics: &'a mut Diagnostics, span: Span) -> Self {
        EvalSink { diagnostics, span }
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn emit(&mut self, code: Code, message: impl Into<String>) {
        self.diagnostics.emit(code, self.span, message);
    }

    pub fn emit_with(&mut self, code: Code, severity: Severity, message: impl Into<String>) {
        self.diagnostics.emit_with(code, severity, self.span, message);
    }
}

pub struct Environment {
    filters: HashMap<String, Arc<FilterFn>>,
    tests: HashMap<String, Arc<TestFn>>,
    functions: HashMap<String, Arc<FunctionFn>>,
    tags: TagRegistry,
    loader: Option<Box<dyn Loader>>,
    strict_undefined: bool,
    autoescape: bool,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    /// An environment with the builtin filter/test/function library.
    pub fn new() -> Self {
        let mut env = Self::empty();
        builtins::register(&mut env);
        env
    }

    /// A bare environment with nothing registered.
    pub fn empty() -> Self {
        Environment {
            filters: HashMap::new(),
            tests: HashMap::new(),
            functions: HashMap::new(),
            tags: TagRegistry::new(),
            loader: None,
            strict_undefined: false,
            autoescape: false,
        }
    }

    pub fn register_filter(
        &mut self,
        name: impl Into<String>,
        filter: impl Fn(&Value, &[Value], &Kwargs, &mut EvalSink<'_>) -> Value + Send + Sync + 'static,
    ) {
        self.filters.insert(name.into(), Arc::new(filter));
    }

    pub fn register_test(
        &mut self,
        name: impl Into<String>,
        test: impl Fn(&Value, &[Value], &Kwargs, &mut EvalSink<'_>) -> bool + Send + Sync + 'static,
    ) {
        self.tests.insert(name.into(), Arc::new(test));
    }

    pub fn register_function(
        &mut self,
        name: impl Into<String>,
        function: impl Fn(&[Value], &Kwargs, &mut EvalSink<'_>) -> Value + Send + Sync + 'static,
    ) {
        self.functions.insert(name.into(), Arc::new(function));
    }

    pub fn register_tag(
        &mut self,
        name: impl Into<String>,
        end_tags: Vec<String>,
        override_builtin: bool,
        handler: impl Fn(&mut TagParser<'_, '_>, Span) -> Option<Stmt> + Send + Sync + 'static,
    ) {
        self.tags.register(name, end_tags, override_builtin, handler);
    }

    pub fn set_loader(&mut self, loader: impl Loader + 'static) {
        self.loader = Some(Box::new(loader));
    }

    pub fn set_strict_undefined(&mut self, strict: bool) {
        self.strict_undefined = strict;
    }

    pub fn strict_undefined(&self) -> bool {
        self.strict_undefined
    }

    pub fn set_autoescape(&mut self, autoescape: bool) {
        self.autoescape = autoescape;
    }

    pub fn autoescape(&self) -> bool {
        self.autoescape
    }

    pub fn tags(&self) -> &TagRegistry {
        &self.tags
    }

    pub fn filter(&self, name: &str) -> Option<Arc<FilterFn>> {
        self.filters.get(name).cloned()
    }

    pub fn test(&self, name: &str) -> Option<Arc<TestFn>> {
        self.tests.get(name).cloned()
    }

    pub fn function(&self, name: &str) -> Option<Arc<FunctionFn>> {
        self.functions.get(name).cloned()
    }

    pub fn has_filter(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    pub fn has_test(&self, name: &str) -> bool {
        self.tests.contains_key(name)
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn filter_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.filters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn test_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tests.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn function_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// The only I/O touchpoint of the core.
    pub fn load_template(&self, name: &str) -> Option<String> {
        let loader = self.loader.as_ref()?;
        let source = loader.load(name);
        debug!(template = name, found = source.is_some(), "loader request");
        source
    }

    /// Parse with this environment's tag extensions.
    pub fn parse(&self, source: &str) -> ParseOutput {
        analyzer::parse(source, &self.tags)
    }
}
