//! AST-walking renderer.
//!
//! State is per-call: a scope stack (lookups search top-down, assignments
//! write the current frame), macro tables and namespaces, the `caller()`
//! stack, block overrides for inheritance, and the load stack that detects
//! template cycles. Every runtime fault emits a diagnostic at the offending
//! node and continues with a neutral value; rendering never raises.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use analyzer::ast::{Expr, ExprKind, ImportName, Kwarg, MacroParam, Stmt, StmtKind, Target, TargetKind, Template};
use analyzer::{Code, Diagnostic, Diagnostics, ParseOutput, RendererCode, Span, sort_diagnostics};
use tracing::debug;

use crate::environment::{Environment, EvalSink, FunctionFn};
use crate::value::{Kwargs, Value, html_escape};

pub(crate) struct MacroDef {
    pub params: Vec<MacroParam>,
    pub body: Vec<Stmt>,
}

pub(crate) type MacroRef = Arc<MacroDef>;

enum PathKey {
    Attr(String),
    Item(Value),
}

/// Render a parsed template against a context. Returns the output and every
/// diagnostic the walk produced, in stable span order.
pub fn render(
    template: &Template,
    env: &Environment,
    context: &BTreeMap<String, Value>,
) -> (String, Vec<Diagnostic>) {
    let mut renderer = Renderer::new(env, context.clone());
    let mut out = String::new();
    renderer.render_template(template, &mut out);
    (out, renderer.diagnostics.into_sorted())
}

/// Parse and render in one step; parse and render diagnostics are merged.
pub fn render_str(
    source: &str,
    env: &Environment,
    context: &BTreeMap<String, Value>,
) -> (String, Vec<Diagnostic>) {
    let parsed = env.parse(source);
    let mut renderer = Renderer::new(env, context.clone());
    let mut out = String::new();
    renderer.render_template(&parsed.template, &mut out);
    let mut diagnostics = parsed.diagnostics;
    diagnostics.extend(renderer.diagnostics.into_sorted());
    sort_diagnostics(&mut diagnostics);
    (out, diagnostics)
}

pub(crate) struct Renderer<'env> {
    pub(crate) env: &'env Environment,
    pub(crate) scopes: Vec<BTreeMap<String, Value>>,
    pub(crate) macros: HashMap<String, MacroRef>,
    pub(crate) macro_namespaces: HashMap<String, HashMap<String, MacroRef>>,
    pub(crate) caller_stack: Vec<String>,
    pub(crate) block_overrides: HashMap<String, Arc<Vec<Stmt>>>,
    pub(crate) load_stack: Vec<String>,
    pub(crate) diagnostics: Diagnostics,
}

impl<'env> Renderer<'env> {
    fn new(env: &'env Environment, globals: BTreeMap<String, Value>) -> Self {
        Renderer {
            env,
            // The context frame stays pristine; template-level assignments go
            // to the root frame above it.
            scopes: vec![globals, BTreeMap::new()],
            macros: HashMap::new(),
            macro_namespaces: HashMap::new(),
            caller_stack: Vec::new(),
            block_overrides: HashMap::new(),
            load_stack: Vec::new(),
            diagnostics: Diagnostics::default(),
        }
    }

    /// Render one template, resolving its inheritance chain: collect block
    /// overrides from the most-derived template downward, then render the
    /// root ancestor.
    pub(crate) fn render_template(&mut self, template: &Template, out: &mut String) {
        let extends = self.find_extends(&template.body);
        match extends {
            None => self.render_body(&template.body, out),
            Some((parent, span)) => {
                self.collect_overrides_and_macros(&template.body);
                self.render_parent(&parent, span, out);
            }
        }
    }

    fn find_extends(&mut self, body: &[Stmt]) -> Option<(String, Span)> {
        // At most one extends; the first wins, extras are lint business.
        for stmt in body {
            if let StmtKind::Extends { template } = &stmt.kind {
                let name = self.eval(template).stringify();
                return Some((name, stmt.span));
            }
        }
        None
    }

    fn collect_overrides_and_macros(&mut self, body: &[Stmt]) {
        for stmt in body {
            match &stmt.kind {
                StmtKind::Block { name, body, .. } => {
                    self.block_overrides
                        .entry(name.node.text.clone())
                        .or_insert_with(|| Arc::new(body.clone()));
                }
                StmtKind::Macro { name, params, body } => {
                    self.macros.insert(
                        name.node.text.clone(),
                        Arc::new(MacroDef {
                            params: params.clone(),
                            body: body.clone(),
                        }),
                    );
                }
                _ => {}
            }
        }
    }

    fn render_parent(&mut self, name: &str, span: Span, out: &mut String) {
        debug!(parent = name, "resolving template inheritance");
        let Some(parsed) = self.load_parsed(name, span, true) else {
            return;
        };
        self.load_stack.push(name.to_string());
        self.render_template(&parsed.template, out);
        self.load_stack.pop();
    }

    /// Load and parse a template by name, with cycle detection. Parse
    /// diagnostics are folded into this renderer's stream.
    fn load_parsed(&mut self, name: &str, span: Span, missing_is_error: bool) -> Option<ParseOutput> {
        if self.load_stack.iter().any(|n| n == name) {
            self.diagnostics.emit(
                Code::Renderer(RendererCode::TemplateCycle),
                span,
                format!("template cycle through {:?}", name),
            );
            return None;
        }
        match self.env.load_template(name) {
            Some(source) => {
                let mut parsed = self.env.parse(&source);
                self.diagnostics
                    .extend(std::mem::take(&mut parsed.diagnostics));
                Some(parsed)
            }
            None => {
                if missing_is_error {
                    self.diagnostics.emit(
                        Code::Renderer(RendererCode::TemplateNotFound),
                        span,
                        format!("template {:?} not found", name),
                    );
                }
                None
            }
        }
    }

    pub(crate) fn render_body(&mut self, body: &[Stmt], out: &mut String) {
        for stmt in body {
            self.render_stmt(stmt, out);
        }
    }

    fn render_stmt(&mut self, stmt: &Stmt, out: &mut String) {
        match &stmt.kind {
            StmtKind::Text { text } | StmtKind::Raw { text } => out.push_str(text),
            StmtKind::Comment { .. } => {}
            StmtKind::Output { expr, .. } => {
                let value = self.eval(expr);
                if self.env.autoescape() && !matches!(value, Value::Safe(_)) {
                    out.push_str(&html_escape(&value.stringify()));
                } else {
                    out.push_str(&value.stringify());
                }
            }
            StmtKind::If {
                test,
                body,
                else_body,
                ..
            } => {
                if self.eval(test).is_truthy() {
                    self.render_body(body, out);
                } else {
                    self.render_body(else_body, out);
                }
            }
            StmtKind::For {
                target,
                iter,
                body,
                else_body,
            } => self.render_for(target, iter, body, else_body, out),
            StmtKind::Set { target, value } => {
                let value = self.eval(value);
                self.bind_target(target, value);
            }
            StmtKind::SetBlock { target, body } => {
                let mut buffer = String::new();
                self.render_body(body, &mut buffer);
                self.bind_target(target, Value::Str(buffer));
            }
            StmtKind::Block { name, body, .. } => {
                let override_body = self.block_overrides.get(&name.node.text).cloned();
                match override_body {
                    Some(blocks) => self.render_body(&blocks, out),
                    None => self.render_body(body, out),
                }
            }
            StmtKind::Extends { .. } => {} // handled at template entry
            StmtKind::Include {
                template,
                with_context,
                ignore_missing,
            } => self.render_include(template, *with_context, *ignore_missing, stmt.span, out),
            StmtKind::Import { template, alias } => {
                self.render_import(template, &alias.node.text, stmt.span);
            }
            StmtKind::FromImport {
                template, names, ..
            } => self.render_from_import(template, names, stmt.span),
            StmtKind::Macro { name, params, body } => {
                self.macros.insert(
                    name.node.text.clone(),
                    Arc::new(MacroDef {
                        params: params.clone(),
                        body: body.clone(),
                    }),
                );
            }
            StmtKind::CallBlock {
                callee,
                args,
                kwargs,
                body,
            } => self.render_call_block(callee, args, kwargs, body, stmt.span, out),
            StmtKind::CustomTag { name, body, .. } => {
                self.diagnostics.emit(
                    Code::Renderer(RendererCode::UnknownTagRenderer),
                    stmt.span,
                    format!("no renderer for tag `{}`", name.node.text),
                );
                self.render_body(body, out);
            }
        }
    }

    fn render_for(
        &mut self,
        target: &Target,
        iter: &Expr,
        body: &[Stmt],
        else_body: &[Stmt],
        out: &mut String,
    ) {
        let iter_value = self.eval(iter);
        let items: Vec<Value> = match iter_value {
            Value::List(items) => items,
            Value::Map(map) => map.into_values().collect(),
            Value::Str(s) | Value::Safe(s) => {
                s.chars().map(|c| Value::Str(c.to_string())).collect()
            }
            Value::Undefined(_) => Vec::new(),
            other => {
                self.diagnostics.emit(
                    Code::Renderer(RendererCode::NotIterable),
                    iter.span,
                    format!("{} is not iterable", other.kind_name()),
                );
                Vec::new()
            }
        };

        if items.is_empty() {
            self.render_body(else_body, out);
            return;
        }

        // Loop bindings live in their own frame and are gone after endfor.
        self.scopes.push(BTreeMap::new());
        for item in items {
            self.bind_target(target, item);
            self.render_body(body, out);
        }
        self.scopes.pop();
    }

    pub(crate) fn bind_target(&mut self, target: &Target, value: Value) {
        match &target.kind {
            TargetKind::Name(sym) => {
                if let Some(scope) = self.scopes.last_mut() {
                    scope.insert(sym.text.clone(), value);
                }
            }
            TargetKind::Tuple(items) => {
                let unpacked = match value {
                    Value::List(values) if values.len() == items.len() => Some(values),
                    _ => None,
                };
                match unpacked {
                    Some(values) => {
                        for (item, v) in items.iter().zip(values) {
                            self.bind_target(item, v);
                        }
                    }
                    None => {
                        self.diagnostics.emit(
                            Code::Renderer(RendererCode::InvalidOperand),
                            target.span,
                            "cannot unpack value into tuple target",
                        );
                        for item in items {
                            self.bind_target(item, Value::undefined());
                        }
                    }
                }
            }
            TargetKind::GetAttr { target: base, name } => {
                self.assign_path(base, PathKey::Attr(name.node.text.clone()), value);
            }
            TargetKind::GetItem { target: base, index } => {
                let key = self.eval(index);
                self.assign_path(base, PathKey::Item(key), value);
            }
            TargetKind::Error => {}
        }
    }

    /// Assignment through `a.b` / `a[k]`: read the container, update a clone,
    /// write it back. Terminates at the underlying name binding.
    fn assign_path(&mut self, base: &Target, key: PathKey, value: Value) {
        let mut container = self.read_target(base);
        match (&mut container, key) {
            (Value::Map(map), PathKey::Attr(name)) => {
                map.insert(name, value);
            }
            (Value::Map(map), PathKey::Item(k)) => {
                map.insert(crate::eval::key_string(&k), value);
            }
            (Value::List(items), PathKey::Item(k)) => {
                let index = match k.as_number() {
                    Some(crate::value::Num::Int(i)) => i,
                    _ => {
                        self.diagnostics.emit(
                            Code::Renderer(RendererCode::InvalidOperand),
                            base.span,
                            "list assignment requires an integer index",
                        );
                        return;
                    }
                };
                let len = items.len() as i64;
                let idx = if index < 0 { len + index } else { index };
                if idx < 0 || idx >= len {
                    self.diagnostics.emit(
                        Code::Renderer(RendererCode::InvalidOperand),
                        base.span,
                        format!("index {} out of range", index),
                    );
                    return;
                }
                items[idx as usize] = value;
            }
            (other, _) => {
                self.diagnostics.emit(
                    Code::Renderer(RendererCode::InvalidOperand),
                    base.span,
                    format!("cannot assign into {}", other.kind_name()),
                );
                return;
            }
        }
        self.bind_target(base, container);
    }

    fn read_target(&mut self, target: &Target) -> Value {
        match &target.kind {
            TargetKind::Name(sym) => self
                .lookup_value(&sym.text)
                .unwrap_or_else(|| Value::Undefined(sym.text.clone())),
            TargetKind::GetAttr { target: base, name } => {
                let container = self.read_target(base);
                crate::eval::get_attr_value(&container, &name.node.text)
            }
            TargetKind::GetItem { target: base, index } => {
                let container = self.read_target(base);
                let key = self.eval(index);
                let span = index.span;
                self.get_item(&container, &key, span)
            }
            TargetKind::Tuple(_) | TargetKind::Error => Value::undefined(),
        }
    }

    pub(crate) fn lookup_value(&self, name: &str) -> Option<Value> {
        for scope in self.scopes.iter().rev() {
            if let Some(value) = scope.get(name) {
                return Some(value.clone());
            }
        }
        None
    }

    fn render_include(
        &mut self,
        template: &Expr,
        with_context: bool,
        ignore_missing: bool,
        span: Span,
        out: &mut String,
    ) {
        let name = self.eval(template).stringify();
        let Some(parsed) = self.load_parsed(&name, span, !ignore_missing) else {
            return;
        };
        self.load_stack.push(name.clone());
        // Included templates resolve their own inheritance.
        let saved_overrides = std::mem::take(&mut self.block_overrides);
        if with_context {
            self.render_template(&parsed.template, out);
        } else {
            let globals = self.scopes.first().cloned().unwrap_or_default();
            let saved_scopes = std::mem::replace(&mut self.scopes, vec![globals]);
            self.render_template(&parsed.template, out);
            self.scopes = saved_scopes;
        }
        self.block_overrides = saved_overrides;
        self.load_stack.pop();
    }

    fn render_import(&mut self, template: &Expr, alias: &str, span: Span) {
        let name = self.eval(template).stringify();
        let Some(parsed) = self.load_parsed(&name, span, true) else {
            return;
        };
        let macros = collect_macros(&parsed.template.body);
        self.macro_namespaces.insert(alias.to_string(), macros);
    }

    fn render_from_import(&mut self, template: &Expr, names: &[ImportName], span: Span) {
        let name = self.eval(template).stringify();
        let Some(parsed) = self.load_parsed(&name, span, true) else {
            return;
        };
        let macros = collect_macros(&parsed.template.body);
        for import in names {
            match macros.get(&import.name.node.text) {
                Some(def) => {
                    let bind_name = import
                        .alias
                        .as_ref()
                        .map(|a| a.node.text.clone())
                        .unwrap_or_else(|| import.name.node.text.clone());
                    self.macros.insert(bind_name, def.clone());
                }
                None => {
                    self.diagnostics.emit(
                        Code::Renderer(RendererCode::UnknownMacro),
                        import.name.span,
                        format!(
                            "macro `{}` not found in {:?}",
                            import.name.node.text, name
                        ),
                    );
                }
            }
        }
    }

    fn render_call_block(
        &mut self,
        callee: &Expr,
        args: &[Expr],
        kwargs: &[Kwarg],
        body: &[Stmt],
        span: Span,
        out: &mut String,
    ) {
        let mut caller_text = String::new();
        self.render_body(body, &mut caller_text);

        if let Some(def) = self.resolve_macro(callee) {
            let arg_values: Vec<Value> = args.iter().map(|a| self.eval(a)).collect();
            let kwarg_values = self.eval_kwargs(kwargs);
            self.caller_stack.push(caller_text);
            let rendered = self.expand_macro(&def, arg_values, kwarg_values);
            self.caller_stack.pop();
            out.push_str(&rendered);
            return;
        }

        match self.call_value(callee, args, kwargs, span) {
            Some(value) => {
                out.push_str(&value.stringify());
                out.push_str(&caller_text);
            }
            None => {
                self.diagnostics.emit(
                    Code::Renderer(RendererCode::UnknownMacro),
                    callee.span,
                    "call target is neither a macro nor a function",
                );
            }
        }
    }

    pub(crate) fn resolve_macro(&self, callee: &Expr) -> Option<MacroRef> {
        match &callee.kind {
            ExprKind::Name(sym) => self.macros.get(&sym.text).cloned(),
            ExprKind::GetAttr { target, name } => {
                if let ExprKind::Name(ns) = &target.kind {
                    self.macro_namespaces
                        .get(&ns.text)?
                        .get(&name.node.text)
                        .cloned()
                } else {
                    None
                }
            }
            ExprKind::Group { inner } => self.resolve_macro(inner),
            _ => None,
        }
    }

    /// Parameter binding: positional, then kwargs, then defaults, else null.
    pub(crate) fn expand_macro(
        &mut self,
        def: &MacroRef,
        args: Vec<Value>,
        mut kwargs: Kwargs,
    ) -> String {
        let mut args_iter = args.into_iter();
        let mut bindings: Vec<(String, Value)> = Vec::new();
        for param in &def.params {
            let pname = &param.name.node.text;
            let value = if let Some(v) = args_iter.next() {
                v
            } else if let Some(v) = kwargs.remove(pname) {
                v
            } else if let Some(default) = &param.default {
                self.eval(default)
            } else {
                Value::Null
            };
            bindings.push((pname.clone(), value));
        }

        self.scopes.push(BTreeMap::new());
        if let Some(scope) = self.scopes.last_mut() {
            for (name, value) in bindings {
                scope.insert(name, value);
            }
        }
        let mut out = String::new();
        self.render_body(&def.body, &mut out);
        self.scopes.pop();
        out
    }

    /// Resolve and call a non-macro callee: `caller()`, scope-level function
    /// values, then environment functions. `None` means nothing callable.
    pub(crate) fn call_value(
        &mut self,
        callee: &Expr,
        args: &[Expr],
        kwargs: &[Kwarg],
        span: Span,
    ) -> Option<Value> {
        if let ExprKind::Name(sym) = &callee.kind {
            if sym.text == "caller" {
                // LIFO stack; undefined when no call block is active.
                return Some(match self.caller_stack.last() {
                    Some(text) => Value::Safe(text.clone()),
                    None => Value::Undefined("caller".to_string()),
                });
            }
        }

        let arg_values: Vec<Value> = args.iter().map(|a| self.eval(a)).collect();
        let kwarg_values = self.eval_kwargs(kwargs);

        if let ExprKind::Name(sym) = &callee.kind {
            if let Some(Value::Func(f)) = self.lookup_value(&sym.text) {
                return Some(self.invoke(&f, &arg_values, &kwarg_values, span));
            }
            if let Some(f) = self.env.function(&sym.text) {
                return Some(self.invoke(&f, &arg_values, &kwarg_values, span));
            }
            return None;
        }

        let value = self.eval(callee);
        if let Value::Func(f) = value {
            return Some(self.invoke(&f, &arg_values, &kwarg_values, span));
        }
        None
    }

    fn invoke(
        &mut self,
        function: &Arc<FunctionFn>,
        args: &[Value],
        kwargs: &Kwargs,
        span: Span,
    ) -> Value {
        let mut sink = EvalSink::new(&mut self.diagnostics, span);
        function(args, kwargs, &mut sink)
    }

    pub(crate) fn eval_kwargs(&mut self, kwargs: &[Kwarg]) -> Kwargs {
        let mut map = Kwargs::new();
        for kwarg in kwargs {
            let value = self.eval(&kwarg.value);
            map.insert(kwarg.name.node.text.clone(), value);
        }
        map
    }
}

fn collect_macros(body: &[Stmt]) -> HashMap<String, MacroRef> {
    let mut macros = HashMap::new();
    for stmt in body {
        if let StmtKind::Macro { name, params, body } = &stmt.kind {
            macros.insert(
                name.node.text.clone(),
                Arc::new(MacroDef {
                    params: params.clone(),
                    body: body.clone(),
                }),
            );
        }
    }
    macros
}
