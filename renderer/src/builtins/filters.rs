use analyzer::{Code, RendererCode};

use crate::environment::{Environment, EvalSink};
use crate::value::{Kwargs, Num, Value, html_escape, value_cmp};

pub(crate) fn register(env: &mut Environment) {
    env.register_filter("upper", |value, _, _, _| {
        Value::Str(value.stringify().to_uppercase())
    });
    env.register_filter("lower", |value, _, _, _| {
        Value::Str(value.stringify().to_lowercase())
    });
    env.register_filter("capitalize", |value, _, _, _| {
        let s = value.stringify();
        let mut chars = s.chars();
        match chars.next() {
            Some(first) => Value::Str(
                first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
            ),
            None => Value::Str(String::new()),
        }
    });
    env.register_filter("trim", |value, _, _, _| {
        Value::Str(value.stringify().trim().to_string())
    });

    env.register_filter("length", length);
    env.register_filter("count", length);

    env.register_filter("join", |value, args, _, sink| {
        let sep = args.first().map(Value::stringify).unwrap_or_default();
        match value {
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(Value::stringify).collect();
                Value::Str(parts.join(&sep))
            }
            _ => {
                sink.emit(
                    Code::Renderer(RendererCode::TypeMismatch),
                    format!("join expects a list, got {}", value.kind_name()),
                );
                value.clone()
            }
        }
    });

    env.register_filter("first", |value, _, _, _| match value {
        Value::List(items) => items.first().cloned().unwrap_or(Value::undefined()),
        Value::Str(s) | Value::Safe(s) => s
            .chars()
            .next()
            .map(|c| Value::Str(c.to_string()))
            .unwrap_or(Value::undefined()),
        _ => Value::undefined(),
    });
    env.register_filter("last", |value, _, _, _| match value {
        Value::List(items) => items.last().cloned().unwrap_or(Value::undefined()),
        Value::Str(s) | Value::Safe(s) => s
            .chars()
            .last()
            .map(|c| Value::Str(c.to_string()))
            .unwrap_or(Value::undefined()),
        _ => Value::undefined(),
    });

    env.register_filter("default", default);
    env.register_filter("d", default);

    env.register_filter("replace", |value, args, _, sink| {
        let (Some(from), Some(to)) = (args.first(), args.get(1)) else {
            sink.emit(
                Code::Renderer(RendererCode::MissingArgument),
                "replace requires two arguments",
            );
            return value.clone();
        };
        Value::Str(
            value
                .stringify()
                .replace(&from.stringify(), &to.stringify()),
        )
    });

    env.register_filter("abs", |value, _, _, sink| match value.as_number() {
        Some(Num::Int(v)) => Value::Int(v.abs()),
        Some(Num::Float(v)) => Value::Float(v.abs()),
        None => {
            sink.emit(
                Code::Renderer(RendererCode::TypeMismatch),
                format!("abs expects a number, got {}", value.kind_name()),
            );
            value.clone()
        }
    });

    env.register_filter("round", |value, args, _, sink| {
        let precision = match args.first() {
            Some(arg) => match arg.as_number() {
                Some(Num::Int(v)) => v.clamp(0, 12) as u32,
                _ => 0,
            },
            None => 0,
        };
        match value.as_number() {
            Some(Num::Int(v)) => Value::Int(v),
            Some(Num::Float(v)) => {
                let factor = 10f64.powi(precision as i32);
                Value::Float((v * factor).round() / factor)
            }
            None => {
                sink.emit(
                    Code::Renderer(RendererCode::TypeMismatch),
                    format!("round expects a number, got {}", value.kind_name()),
                );
                value.clone()
            }
        }
    });

    env.register_filter("int", |value, args, _, _| {
        let fallback = args.first().cloned().unwrap_or(Value::Int(0));
        match value {
            Value::Int(v) => Value::Int(*v),
            Value::Float(v) => Value::Int(*v as i64),
            Value::Bool(v) => Value::Int(*v as i64),
            Value::Str(s) | Value::Safe(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .unwrap_or(fallback),
            _ => fallback,
        }
    });
    env.register_filter("float", |value, args, _, _| {
        let fallback = args.first().cloned().unwrap_or(Value::Float(0.0));
        match value {
            Value::Int(v) => Value::Float(*v as f64),
            Value::Float(v) => Value::Float(*v),
            Value::Bool(v) => Value::Float(*v as i64 as f64),
            Value::Str(s) | Value::Safe(s) => s
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .unwrap_or(fallback),
            _ => fallback,
        }
    });

    env.register_filter("reverse", |value, _, _, _| match value {
        Value::List(items) => Value::List(items.iter().rev().cloned().collect()),
        Value::Str(s) | Value::Safe(s) => Value::Str(s.chars().rev().collect()),
        _ => value.clone(),
    });

    env.register_filter("sort", |value, _, _, _| match value {
        Value::List(items) => {
            let mut sorted = items.clone();
            sorted.sort_by(|a, b| value_cmp(a, b).unwrap_or(std::cmp::Ordering::Equal));
            Value::List(sorted)
        }
        _ => value.clone(),
    });

    env.register_filter("escape", escape);
    env.register_filter("e", escape);

    // Marking safe claims safe output; the subtype survives later filters
    // that pass strings through.
    env.register_filter("safe", |value, _, _, _| match value {
        Value::Safe(s) => Value::Safe(s.clone()),
        other => Value::Safe(other.stringify()),
    });

    env.register_filter("tojson", |value, _, _, _| {
        Value::Safe(serde_json::to_string(&value.to_json()).unwrap_or_default())
    });
}

fn length(value: &Value, _args: &[Value], _kwargs: &Kwargs, sink: &mut EvalSink<'_>) -> Value {
    match value {
        Value::Str(s) | Value::Safe(s) => Value::Int(s.chars().count() as i64),
        Value::List(items) => Value::Int(items.len() as i64),
        Value::Map(map) => Value::Int(map.len() as i64),
        _ => {
            sink.emit(
                Code::Renderer(RendererCode::TypeMismatch),
                format!("{} has no length", value.kind_name()),
            );
            Value::Int(0)
        }
    }
}

fn default(value: &Value, args: &[Value], _kwargs: &Kwargs, _sink: &mut EvalSink<'_>) -> Value {
    let fallback = args.first().cloned().unwrap_or(Value::Null);
    let falsy_counts = args.get(1).map(Value::is_truthy).unwrap_or(false);
    if value.is_undefined() || (falsy_counts && !value.is_truthy()) {
        fallback
    } else {
        value.clone()
    }
}

fn escape(value: &Value, _args: &[Value], _kwargs: &Kwargs, _sink: &mut EvalSink<'_>) -> Value {
    match value {
        Value::Safe(s) => Value::Safe(s.clone()),
        other => Value::Safe(html_escape(&other.stringify())),
    }
}
