use std::sync::Arc;

use analyzer::ast::Stmt;
use analyzer::{Code, MemoryLoader, RendererCode, Severity, Span, TagParser};

use super::common::{ctx, int_list, map, render_clean, render_one};
use crate::environment::Environment;
use crate::render::render_str;
use crate::value::{Object, Value};

#[test]
fn test_conditional_with_else() {
    let source = "{% if user %}hi {{ user.name }}{% else %}bye{% endif %}";
    let out = render_clean(source, vec![("user", map(vec![("name", "Ada".into())]))]);
    assert_eq!(out, "hi Ada");

    let out = render_clean(source, vec![("user", Value::Null)]);
    assert_eq!(out, "bye");
}

#[test]
fn test_for_with_else_on_empty() {
    let source = "{% for x in xs %}{{ x }}|{% else %}none{% endfor %}";
    assert_eq!(
        render_clean(source, vec![("xs", int_list(&[1, 2, 3]))]),
        "1|2|3|"
    );
    assert_eq!(render_clean(source, vec![("xs", int_list(&[]))]), "none");
}

#[test]
fn test_filter_chain() {
    assert_eq!(
        render_clean(r#"{{ "Hello" | upper | length }}"#, vec![]),
        "5"
    );
}

#[test]
fn test_set_and_set_block() {
    assert_eq!(render_clean("{% set x = 1 %}{{ x }}", vec![]), "1");
    assert_eq!(
        render_clean("{% set g %}hi {{ name }}{% endset %}[{{ g }}]", vec![(
            "name",
            "Ada".into()
        )]),
        "[hi Ada]"
    );
}

#[test]
fn test_macro_expansion() {
    let source = "{% macro hi(name) %}Hello {{ name }}!{% endmacro %}{{ hi('Ada') }}";
    assert_eq!(render_clean(source, vec![]), "Hello Ada!");
}

#[test]
fn test_macro_parameter_binding() {
    let source = "{% macro f(a, b='x', c) %}{{ a }}{{ b }}{{ c }}{% endmacro %}{{ f(1, c=2) }}";
    assert_eq!(render_clean(source, vec![]), "1x2");

    // Missing parameter without default binds null, which renders empty.
    let source = "{% macro f(a, b='x', c) %}{{ a }}{{ b }}{{ c }}{% endmacro %}{{ f(1) }}";
    assert_eq!(render_clean(source, vec![]), "1x");
}

#[test]
fn test_call_block_binds_caller() {
    let source =
        "{% macro wrap() %}<{{ caller() }}>{% endmacro %}{% call wrap() %}body{% endcall %}";
    assert_eq!(render_clean(source, vec![]), "<body>");
}

#[test]
fn test_include_with_and_without_context() {
    let mut loader = MemoryLoader::new();
    loader.insert("part", "p={{ p }};g={{ g }}");
    let mut env = Environment::new();
    env.set_loader(loader);

    let (out, diagnostics) = render_str(
        "{% set p = 'local' %}{% include 'part' %}",
        &env,
        &ctx(vec![("g", "global".into())]),
    );
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    assert_eq!(out, "p=local;g=global");

    let (out, diagnostics) = render_str(
        "{% set p = 'local' %}{% include 'part' without context %}",
        &env,
        &ctx(vec![("g", "global".into())]),
    );
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    assert_eq!(out, "p=;g=global");
}

#[test]
fn test_include_missing() {
    let mut env = Environment::new();
    env.set_loader(MemoryLoader::new());

    let (out, diagnostics) = render_str("a{% include 'nope' %}b", &env, &ctx(vec![]));
    assert_eq!(out, "ab");
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(
        diagnostics[0].code,
        Code::Renderer(RendererCode::TemplateNotFound)
    );

    let (out, diagnostics) =
        render_str("a{% include 'nope' ignore missing %}b", &env, &ctx(vec![]));
    assert_eq!(out, "ab");
    assert!(diagnostics.is_empty());
}

#[test]
fn test_import_namespace_and_from_import() {
    let mut loader = MemoryLoader::new();
    loader.insert("macros.j2", "{% macro btn(label) %}[{{ label }}]{% endmacro %}");
    let mut env = Environment::new();
    env.set_loader(loader);

    let (out, diagnostics) = render_str(
        "{% import 'macros.j2' as ui %}{{ ui.btn('x') }}",
        &env,
        &ctx(vec![]),
    );
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    assert_eq!(out, "[x]");

    let (out, diagnostics) = render_str(
        "{% from 'macros.j2' import btn as button %}{{ button('y') }}",
        &env,
        &ctx(vec![]),
    );
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    assert_eq!(out, "[y]");
}

#[test]
fn test_from_import_unknown_name() {
    let mut loader = MemoryLoader::new();
    loader.insert("macros.j2", "{% macro btn(label) %}[{{ label }}]{% endmacro %}");
    let mut env = Environment::new();
    env.set_loader(loader);

    let (_, diagnostics) = render_str("{% from 'macros.j2' import nope %}", &env, &ctx(vec![]));
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(
        diagnostics[0].code,
        Code::Renderer(RendererCode::UnknownMacro)
    );
}

#[test]
fn test_custom_tag_without_renderer_is_info() {
    let mut env = Environment::new();
    env.register_tag(
        "marker",
        Vec::new(),
        false,
        |tp: &mut TagParser<'_, '_>, _start: Span| -> Option<Stmt> {
            tp.expect_block_end();
            Some(tp.node(Vec::new(), Vec::new(), Vec::new()))
        },
    );

    let (out, diagnostics) = render_str("a{% marker %}b", &env, &ctx(vec![]));
    assert_eq!(out, "ab");
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(
        diagnostics[0].code,
        Code::Renderer(RendererCode::UnknownTagRenderer)
    );
    assert_eq!(diagnostics[0].severity, Severity::Info);
}

#[test]
fn test_strict_undefined_reports_lookup() {
    let mut env = Environment::new();
    env.set_strict_undefined(true);

    let (out, diagnostics) = render_str("-{{ missing }}-", &env, &ctx(vec![]));
    assert_eq!(out, "--");
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(
        diagnostics[0].code,
        Code::Renderer(RendererCode::UnknownVariable)
    );
    assert_eq!(diagnostics[0].severity, Severity::Error);
}

#[test]
fn test_autoescape_and_safe() {
    let mut env = Environment::new();
    env.set_autoescape(true);

    let (out, _) = render_str("{{ v }}", &env, &ctx(vec![("v", "<b>".into())]));
    assert_eq!(out, "&lt;b&gt;");

    let (out, _) = render_str("{{ v | safe }}", &env, &ctx(vec![("v", "<b>".into())]));
    assert_eq!(out, "<b>");
}

#[test]
fn test_object_attribute_capability() {
    struct Point;
    impl Object for Point {
        fn attribute(&self, name: &str) -> Option<Value> {
            match name {
                "x" => Some(Value::Int(3)),
                _ => None,
            }
        }
    }

    let out = render_clean(
        "{{ p.x }}{{ p.y }}",
        vec![("p", Value::Object(Arc::new(Point)))],
    );
    assert_eq!(out, "3");
}

#[test]
fn test_render_is_total() {
    let cases = [
        "{{",
        "{% if x %}",
        "{{ 1 + * 2 }}",
        "{% for %}{% endfor %}",
        "{{ a | b | c(1 }}",
        "{% raw %}stuck",
    ];
    for source in cases {
        let (out, _) = render_one(source, vec![]);
        let _: String = out;
    }
}

#[test]
fn test_trim_markers_in_output() {
    let out = render_clean("a \n {{- 'x' -}} \n b", vec![]);
    assert_eq!(out, "a x b");
}

#[test]
fn test_render_snapshot() {
    let out = render_clean(
        "{% for x in xs %}{{ x }};{% endfor %}",
        vec![("xs", int_list(&[1, 2]))],
    );
    insta::assert_snapshot!(out, @"1;2;");
}

#[test]
fn test_comment_renders_empty() {
    assert_eq!(render_clean("a{# nothing #}b", vec![]), "ab");
}

#[test]
fn test_raw_renders_verbatim() {
    assert_eq!(
        render_clean("{% raw %}{{ x }}{% endraw %}", vec![]),
        "{{ x }}"
    );
}
