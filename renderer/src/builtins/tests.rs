use analyzer::{Code, RendererCode};

use crate::environment::Environment;
use crate::value::{Num, Value};

pub(crate) fn register(env: &mut Environment) {
    env.register_test("defined", |value, _, _, _| !value.is_undefined());
    env.register_test("undefined", |value, _, _, _| value.is_undefined());
    env.register_test("none", |value, _, _, _| matches!(value, Value::Null));
    env.register_test("string", |value, _, _, _| value.as_str().is_some());
    env.register_test("number", |value, _, _, _| {
        matches!(value, Value::Int(_) | Value::Float(_))
    });
    env.register_test("iterable", |value, _, _, _| {
        matches!(
            value,
            Value::List(_) | Value::Map(_) | Value::Str(_) | Value::Safe(_)
        )
    });
    env.register_test("mapping", |value, _, _, _| matches!(value, Value::Map(_)));
    env.register_test("even", |value, _, _, _| {
        matches!(value.as_number(), Some(Num::Int(v)) if v % 2 == 0)
    });
    env.register_test("odd", |value, _, _, _| {
        matches!(value.as_number(), Some(Num::Int(v)) if v.rem_euclid(2) == 1)
    });
    env.register_test("divisibleby", |value, args, _, sink| {
        let Some(Num::Int(divisor)) = args.first().and_then(Value::as_number) else {
            sink.emit(
                Code::Renderer(RendererCode::MissingArgument),
                "divisibleby requires an integer argument",
            );
            return false;
        };
        if divisor == 0 {
            sink.emit(
                Code::Renderer(RendererCode::InvalidOperand),
                "division by zero",
            );
            return false;
        }
        matches!(value.as_number(), Some(Num::Int(v)) if v % divisor == 0)
    });
}
