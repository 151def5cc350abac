use analyzer::{Code, RendererCode};
use chrono::Utc;

use crate::environment::Environment;
use crate::value::{Num, Value};

pub(crate) fn register(env: &mut Environment) {
    env.register_function("range", |args, _, sink| {
        let int_arg = |idx: usize| -> Option<i64> {
            match args.get(idx).and_then(Value::as_number) {
                Some(Num::Int(v)) => Some(v),
                _ => None,
            }
        };
        let (start, stop, step) = match args.len() {
            1 => (0, int_arg(0).unwrap_or(0), 1),
            2 => (int_arg(0).unwrap_or(0), int_arg(1).unwrap_or(0), 1),
            _ => (
                int_arg(0).unwrap_or(0),
                int_arg(1).unwrap_or(0),
                int_arg(2).unwrap_or(1),
            ),
        };
        if step == 0 {
            sink.emit(
                Code::Renderer(RendererCode::InvalidOperand),
                "range step must not be zero",
            );
            return Value::List(Vec::new());
        }
        let mut items = Vec::new();
        let mut current = start;
        while (step > 0 && current < stop) || (step < 0 && current > stop) {
            items.push(Value::Int(current));
            current += step;
        }
        Value::List(items)
    });

    env.register_function("now", |_, _, _| Value::Time(Utc::now()));

    env.register_function("dict", |_, kwargs, _| {
        Value::Map(kwargs.clone())
    });
}
