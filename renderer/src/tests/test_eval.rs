use analyzer::{Code, RendererCode, Severity};

use super::common::{int_list, map, render_clean, render_one};
use crate::value::Value;

#[test]
fn test_integer_arithmetic_stays_integral() {
    assert_eq!(render_clean("{{ 1 + 2 }}", vec![]), "3");
    assert_eq!(render_clean("{{ 7 // 2 }}", vec![]), "3");
    assert_eq!(render_clean("{{ 7 % 3 }}", vec![]), "1");
    assert_eq!(render_clean("{{ 2 ** 8 }}", vec![]), "256");
}

#[test]
fn test_float_promotion() {
    assert_eq!(render_clean("{{ 1 / 2 }}", vec![]), "0.5");
    assert_eq!(render_clean("{{ 1 + 2.5 }}", vec![]), "3.5");
    assert_eq!(render_clean("{{ 4 / 2 }}", vec![]), "2.0");
}

#[test]
fn test_division_by_zero_yields_null() {
    let (out, diagnostics) = render_one("{{ 1 / 0 }}", vec![]);
    assert_eq!(out, "");
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(
        diagnostics[0].code,
        Code::Renderer(RendererCode::InvalidOperand)
    );
}

#[test]
fn test_concat_stringifies() {
    assert_eq!(render_clean("{{ 1 ~ 'x' ~ 2.5 }}", vec![]), "1x2.5");
}

#[test]
fn test_boolean_operators_return_deciding_operand() {
    assert_eq!(render_clean("{{ 0 or 'fallback' }}", vec![]), "fallback");
    assert_eq!(render_clean("{{ 'a' or 'b' }}", vec![]), "a");
    assert_eq!(render_clean("{{ 'a' and 'b' }}", vec![]), "b");
    assert_eq!(render_clean("{{ 0 and 'b' }}", vec![]), "0");
}

#[test]
fn test_comparison_promotes_to_float() {
    assert_eq!(render_clean("{{ 1 == 1.0 }}", vec![]), "true");
    assert_eq!(render_clean("{{ 2 > 1.5 }}", vec![]), "true");
    assert_eq!(render_clean("{{ 'a' < 'b' }}", vec![]), "true");
}

#[test]
fn test_membership() {
    assert_eq!(
        render_clean("{{ 2 in xs }}", vec![("xs", int_list(&[1, 2]))]),
        "true"
    );
    assert_eq!(render_clean("{{ 'x' not in 'abc' }}", vec![]), "true");
    assert_eq!(
        render_clean("{{ 'k' in d }}", vec![("d", map(vec![("k", Value::Int(1))]))]),
        "true"
    );
}

#[test]
fn test_negative_indexing() {
    assert_eq!(
        render_clean("{{ xs[-1] }}", vec![("xs", int_list(&[1, 2, 3]))]),
        "3"
    );
}

#[test]
fn test_out_of_range_index_is_info() {
    let (out, diagnostics) = render_one("{{ xs[9] }}", vec![("xs", int_list(&[1]))]);
    assert_eq!(out, "");
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(
        diagnostics[0].code,
        Code::Renderer(RendererCode::InvalidOperand)
    );
    assert_eq!(diagnostics[0].severity, Severity::Info);
}

#[test]
fn test_unknown_filter_passes_value_through() {
    let (out, diagnostics) = render_one("{{ 'v' | nosuch }}", vec![]);
    assert_eq!(out, "v");
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(
        diagnostics[0].code,
        Code::Renderer(RendererCode::UnknownFilter)
    );
}

#[test]
fn test_unknown_test_and_function() {
    let (out, diagnostics) = render_one("{{ 1 is nosuch }}", vec![]);
    assert_eq!(out, "false");
    assert_eq!(
        diagnostics[0].code,
        Code::Renderer(RendererCode::UnknownTest)
    );

    let (out, diagnostics) = render_one("{{ nosuch() }}", vec![]);
    assert_eq!(out, "");
    assert_eq!(
        diagnostics[0].code,
        Code::Renderer(RendererCode::UnknownFunction)
    );
}

#[test]
fn test_builtin_tests() {
    assert_eq!(
        render_clean("{{ x is defined }}", vec![("x", Value::Int(1))]),
        "true"
    );
    assert_eq!(render_clean("{{ x is undefined }}", vec![]), "true");
    assert_eq!(
        render_clean("{{ x is none }}", vec![("x", Value::Null)]),
        "true"
    );
    assert_eq!(render_clean("{{ 4 is even }}", vec![]), "true");
    assert_eq!(render_clean("{{ 4 is not odd }}", vec![]), "true");
    assert_eq!(render_clean("{{ 9 is divisibleby(3) }}", vec![]), "true");
}

#[test]
fn test_container_inspect_form() {
    assert_eq!(render_clean("{{ (1, 2) }}", vec![]), "[1,2]");
    assert_eq!(render_clean("{{ [1, 'x'] }}", vec![]), "[1,\"x\"]");
    assert_eq!(render_clean("{{ {'a': 1} }}", vec![]), "{\"a\":1}");
}

#[test]
fn test_undefined_renders_empty_by_default() {
    let (out, diagnostics) = render_one("-{{ missing }}-{{ missing.attr }}-", vec![]);
    assert_eq!(out, "---");
    assert!(diagnostics.is_empty());
}

#[test]
fn test_not_iterable_diagnostic() {
    let (out, diagnostics) = render_one("{% for x in 5 %}{{ x }}{% endfor %}", vec![]);
    assert_eq!(out, "");
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(
        diagnostics[0].code,
        Code::Renderer(RendererCode::NotIterable)
    );
}

#[test]
fn test_tuple_unpack_mismatch() {
    let (out, diagnostics) = render_one(
        "{% for a, b in xs %}{{ a }}{{ b }}{% endfor %}",
        vec![("xs", Value::List(vec![int_list(&[1, 2, 3])]))],
    );
    // The body still renders, with the targets bound to undefined.
    assert_eq!(out, "");
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(
        diagnostics[0].code,
        Code::Renderer(RendererCode::InvalidOperand)
    );
}

#[test]
fn test_arithmetic_on_non_numbers() {
    let (out, diagnostics) = render_one("{{ 'a' + 1 }}", vec![]);
    assert_eq!(out, "");
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(
        diagnostics[0].code,
        Code::Renderer(RendererCode::InvalidOperand)
    );
}
