use super::common::{int_list, render_clean, render_one};

#[test]
fn test_for_binding_does_not_leak() {
    let source = "{% set x = 1 %}{{ x }}{% for x in xs %}{{ x }}{% endfor %}{{ x }}";
    assert_eq!(
        render_clean(source, vec![("xs", int_list(&[9]))]),
        "191"
    );
}

#[test]
fn test_set_inside_for_stays_in_loop_frame() {
    let source = "{% for i in xs %}{% set y = i %}{% endfor %}[{{ y }}]";
    let (out, diagnostics) = render_one(source, vec![("xs", int_list(&[1, 2]))]);
    assert!(diagnostics.is_empty());
    assert_eq!(out, "[]");
}

#[test]
fn test_macro_params_shadow_outer_names() {
    let source =
        "{% set v = 'outer' %}{% macro show(v) %}{{ v }}{% endmacro %}{{ show('inner') }}{{ v }}";
    assert_eq!(render_clean(source, vec![]), "innerouter");
}

#[test]
fn test_assignments_shadow_context() {
    let source = "{{ v }}{% set v = 'local' %}{{ v }}";
    assert_eq!(
        render_clean(source, vec![("v", "ctx".into())]),
        "ctxlocal"
    );
}

#[test]
fn test_nested_attribute_assignment() {
    let source = "{% set cfg = {'a': 1} %}{% set cfg.b = 2 %}{{ cfg.a }}{{ cfg.b }}";
    assert_eq!(render_clean(source, vec![]), "12");
}

#[test]
fn test_tuple_target_binds_pairs() {
    let source = "{% for k, v in pairs %}{{ k }}={{ v }};{% endfor %}";
    let pairs = super::common::list(vec![
        super::common::list(vec![crate::value::Value::Str("a".into()), 1i64.into()]),
        super::common::list(vec![crate::value::Value::Str("b".into()), 2i64.into()]),
    ]);
    assert_eq!(
        render_clean(source, vec![("pairs", pairs)]),
        "a=1;b=2;"
    );
}
