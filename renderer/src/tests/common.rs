use std::collections::BTreeMap;

use analyzer::Diagnostic;

use crate::environment::Environment;
use crate::render::render_str;
use crate::value::Value;

pub fn ctx(pairs: Vec<(&str, Value)>) -> BTreeMap<String, Value> {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

pub fn map(pairs: Vec<(&str, Value)>) -> Value {
    Value::Map(
        pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
    )
}

pub fn list(items: Vec<Value>) -> Value {
    Value::List(items)
}

pub fn int_list(items: &[i64]) -> Value {
    Value::List(items.iter().map(|v| Value::Int(*v)).collect())
}

/// Render with a fresh default environment.
pub fn render_one(source: &str, context: Vec<(&str, Value)>) -> (String, Vec<Diagnostic>) {
    let env = Environment::new();
    render_str(source, &env, &ctx(context))
}

/// Render and assert there were no diagnostics.
pub fn render_clean(source: &str, context: Vec<(&str, Value)>) -> String {
    let (out, diagnostics) = render_one(source, context);
    assert!(
        diagnostics.is_empty(),
        "expected no diagnostics for {:?}, got {:?}",
        source,
        diagnostics
    );
    out
}
