use super::common::{URI, position_at, position_of_occurrence, workspace};

#[test]
fn test_hover_on_set_variable() {
    let source = "{% set count = 1 %}{{ count }}";
    let ws = workspace(source, vec![]);
    let position = position_of_occurrence(source, "count", 1);
    let hover = ws.hover(URI, position).expect("hover");
    assert!(hover.contents.contains("count"));
    assert!(hover.contents.contains("int"));
    assert!(hover.contents.contains("set"));
}

#[test]
fn test_hover_on_context_variable() {
    let source = "{{ user }}";
    let ws = workspace(source, vec![]);
    let hover = ws
        .hover(URI, position_of_occurrence(source, "user", 0))
        .expect("hover");
    assert!(hover.contents.contains("context variable"));
}

#[test]
fn test_hover_on_filter_name() {
    let source = "{{ x | upper }}";
    let ws = workspace(source, vec![]);
    let hover = ws
        .hover(URI, position_of_occurrence(source, "upper", 0))
        .expect("hover");
    assert!(hover.contents.contains("filter `upper`"));
}

#[test]
fn test_hover_on_macro_shows_signature() {
    let source = "{% macro btn(label) %}x{% endmacro %}{{ btn('y') }}";
    let ws = workspace(source, vec![]);
    let hover = ws
        .hover(URI, position_of_occurrence(source, "btn", 1))
        .expect("hover");
    assert!(hover.contents.contains("btn(label)"));
}

#[test]
fn test_definition_of_variable() {
    let source = "{% set target = 1 %}{{ target }}";
    let ws = workspace(source, vec![]);
    let location = ws
        .definition(URI, position_of_occurrence(source, "target", 1))
        .expect("definition");
    assert_eq!(location.uri, URI);
    assert_eq!(location.range.start.character, 7);
}

#[test]
fn test_definition_of_template_reference() {
    let source = "{% extends 'base.html' %}";
    let ws = workspace(source, vec![("base.html", "x")]);
    let location = ws
        .definition(URI, position_of_occurrence(source, "base.html", 0))
        .expect("definition");
    assert_eq!(location.uri, "base.html");
}

#[test]
fn test_definition_of_imported_macro_crosses_files() {
    let source = "{% from 'macros.j2' import btn %}{{ btn('x') }}";
    let templates = vec![("macros.j2", "{% macro btn(label) %}[{{ label }}]{% endmacro %}")];
    let ws = workspace(source, templates);
    // The local import span is the definition for the bound name.
    let location = ws
        .definition(URI, position_of_occurrence(source, "btn", 1))
        .expect("definition");
    assert_eq!(location.uri, URI);
}

#[test]
fn test_completion_after_pipe_lists_filters() {
    let source = "{{ x | }}";
    let ws = workspace(source, vec![]);
    let position = position_at(source, source.find('|').unwrap() + 1);
    let items = ws.completion(URI, position);
    assert!(items.iter().any(|i| i.label == "upper"));
    assert!(items.iter().any(|i| i.label == "tojson"));
}

#[test]
fn test_completion_after_is_lists_tests() {
    let source = "{{ x is  }}";
    let ws = workspace(source, vec![]);
    let position = position_at(source, source.find("is").unwrap() + 3);
    let items = ws.completion(URI, position);
    assert!(items.iter().any(|i| i.label == "defined"));
    assert!(items.iter().any(|i| i.label == "divisibleby"));
}

#[test]
fn test_completion_after_block_start_lists_tags() {
    let source = "{% %}";
    let ws = workspace(source, vec![]);
    let position = position_at(source, 3);
    let items = ws.completion(URI, position);
    assert!(items.iter().any(|i| i.label == "if"));
    assert!(items.iter().any(|i| i.label == "macro"));
}

#[test]
fn test_completion_in_expression_lists_symbols() {
    let source = "{% set seen = 1 %}{% macro m() %}x{% endmacro %}{{ s }}";
    let ws = workspace(source, vec![]);
    let position = position_at(source, source.rfind("s }}").unwrap() + 1);
    let items = ws.completion(URI, position);
    let labels: Vec<&str> = items.iter().map(|i| i.label.as_str()).collect();
    assert!(labels.contains(&"seen"));
    assert!(labels.contains(&"m"));
    assert!(labels.contains(&"range"));
}

#[test]
fn test_completion_in_text_is_empty() {
    let source = "plain text";
    let ws = workspace(source, vec![]);
    let items = ws.completion(URI, position_at(source, 5));
    assert!(items.is_empty());
}

#[test]
fn test_document_symbols() {
    let source = "{% set x = 1 %}{% macro m(a) %}b{% endmacro %}{% block c %}{% endblock %}{{ m(x) }}";
    let ws = workspace(source, vec![]);
    let symbols = ws.document_symbols(URI);
    let names: Vec<&str> = symbols.iter().map(|s| s.name.as_str()).collect();
    assert!(names.contains(&"x"));
    assert!(names.contains(&"m(a)"));
    assert!(names.contains(&"c"));
}

#[test]
fn test_folding_ranges_for_multiline_blocks() {
    let source = "{% if a %}\nbody\n{% endif %}\n{{ inline }}";
    let ws = workspace(source, vec![]);
    let ranges = ws.folding_ranges(URI);
    assert_eq!(ranges.len(), 1);
    assert_eq!(ranges[0].start_line, 0);
    assert_eq!(ranges[0].end_line, 2);
}

#[test]
fn test_inlay_hints_for_macro_arguments() {
    let source = "{% macro btn(label, kind) %}x{% endmacro %}{{ btn('a', 'b') }}";
    let ws = workspace(source, vec![]);
    let hints = ws.inlay_hints(URI);
    let labels: Vec<&str> = hints.iter().map(|h| h.label.as_str()).collect();
    assert_eq!(labels, vec!["label:", "kind:"]);
}

#[test]
fn test_document_links() {
    let source = "{% extends 'base.html' %}{% include 'part.html' %}{% import 'm.j2' as ui %}";
    let ws = workspace(source, vec![]);
    let links = ws.document_links(URI);
    let targets: Vec<&str> = links.iter().map(|l| l.target.as_str()).collect();
    assert_eq!(targets, vec!["base.html", "part.html", "m.j2"]);
}

#[test]
fn test_workspace_symbols_filter_by_query() {
    let source = "{% macro greet_user() %}x{% endmacro %}{% block footer %}{% endblock %}{{ greet_user() }}";
    let ws = workspace(source, vec![]);
    let symbols = ws.workspace_symbols("greet");
    assert_eq!(symbols.len(), 1);
    assert!(symbols[0].name.starts_with("greet_user"));

    let all = ws.workspace_symbols("");
    assert!(all.len() >= 2);
}

#[test]
fn test_format_through_workspace() {
    let source = "{{a+b}}";
    let ws = workspace(source, vec![]);
    let (formatted, _) = ws.format(URI).expect("format");
    assert_eq!(formatted, "{{ a + b }}");
}

#[test]
fn test_diagnostics_json_shape() {
    let source = "{{ x | nosuch }}";
    let ws = workspace(source, vec![]);
    let json = ws.diagnostics_json(URI);
    assert_eq!(json.len(), 1);
    assert_eq!(json[0].id, "Lint/UnknownFilter");
    let serialized = serde_json::to_string(&json[0]).expect("serialize");
    assert!(serialized.contains("\"offset\""));
    assert!(serialized.contains("\"line\""));
}
