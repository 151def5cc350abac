use crate::diagnostics::{Code, FormatterCode};
use crate::format::format_source;
use crate::parser::TagRegistry;

fn fmt(source: &str) -> String {
    format_source(source, &TagRegistry::new()).0
}

#[test]
fn test_canonical_spacing_in_delimiters() {
    assert_eq!(fmt("{{a+b}}"), "{{ a + b }}");
    assert_eq!(fmt("{%if x%}y{%endif%}"), "{% if x %}y{% endif %}");
    assert_eq!(fmt("{{ f( 1 ,x=2 ) }}"), "{{ f(1, x=2) }}");
}

#[test]
fn test_text_and_comments_verbatim() {
    assert_eq!(fmt("plain  text\n"), "plain  text\n");
    assert_eq!(fmt("a{# keep  me #}b"), "a{# keep  me #}b");
}

#[test]
fn test_explicit_parens_survive() {
    assert_eq!(fmt("{{ (1 + 2) * 3 }}"), "{{ (1 + 2) * 3 }}");
    assert_eq!(fmt("{{ 1 + 2 * 3 }}"), "{{ 1 + 2 * 3 }}");
}

#[test]
fn test_output_trim_markers_preserved() {
    assert_eq!(fmt("{{- x -}}"), "{{- x -}}");
    assert_eq!(fmt("{{-x}}"), "{{- x }}");
}

#[test]
fn test_elif_chain_roundtrip() {
    let source = "{% if a %}1{% elif b %}2{% else %}3{% endif %}";
    assert_eq!(fmt(source), source);
}

#[test]
fn test_idempotence() {
    let corpus = [
        "{{a+b}}",
        "{{ user.name[0] | upper | default('x') }}",
        "{%for k,v in items%}{{k}}={{v}}{%else%}empty{%endfor%}",
        "{% if a %}1{% elif b %}2{% else %}3{% endif %}",
        "{%set x=1+2%}",
        "{% set greeting %}hi{% endset %}",
        "{% block content %}{{ body }}{% endblock content %}",
        "{% extends 'base.html' %}{% block a %}c{% endblock %}",
        "{% include 'part.html' ignore missing without context %}",
        "{% import 'macros.html' as ui %}",
        "{% from 'macros.html' import btn as button, card %}",
        "{% macro btn(label, kind='primary') %}<{{ kind }}>{{ label }}{% endmacro %}",
        "{% call btn('x') %}body{% endcall %}",
        "{% raw %}{{ untouched }}{% endraw %}",
        "{{- trimmed -}}",
        "{{ {'a': 1, 'b': [1, 2]} }}",
        "{{ (a, b) }}{{ (a,) }}{{ () }}",
        "{{ not a and b or c in d }}",
        "{{ x is not divisibleby(3) }}",
        "text {{ a }} more {% if b %}c{% endif %} tail",
    ];
    for source in corpus {
        let once = fmt(source);
        let twice = fmt(&once);
        assert_eq!(twice, once, "format not idempotent for {source:?}");
    }
}

#[test]
fn test_sources_with_errors_are_returned_unchanged() {
    let source = "{{ 1 + }}";
    let (formatted, diagnostics) = format_source(source, &TagRegistry::new());
    assert_eq!(formatted, source);
    assert!(
        diagnostics
            .iter()
            .any(|d| d.code == Code::Formatter(FormatterCode::ErrorNode))
    );
}

#[test]
fn test_canonical_form_snapshot() {
    insta::assert_snapshot!(
        fmt("{%if user%}hi {{user.name|upper}}{%endif%}"),
        @"{% if user %}hi {{ user.name | upper }}{% endif %}"
    );
}

#[test]
fn test_float_and_string_literals() {
    assert_eq!(fmt("{{ 3.0 }}"), "{{ 3.0 }}");
    assert_eq!(fmt("{{ 2.5 }}"), "{{ 2.5 }}");
    assert_eq!(fmt("{{ 'a' }}"), "{{ \"a\" }}");
    assert_eq!(fmt("{{ \"a\\nb\" }}"), "{{ \"a\\nb\" }}");
}
