use analyzer::TagRegistry;

use crate::index::{TypeTag, VarSource, build_index};

fn index_of(source: &str) -> crate::index::DocumentIndex {
    let parse = analyzer::parse(source, &TagRegistry::new());
    build_index("test.j2", &parse.template, None)
}

#[test]
fn test_set_variable_with_literal_type() {
    let index = index_of("{% set x = 1 %}{% set s = 'hi' %}");
    assert_eq!(index.variables.len(), 2);
    assert_eq!(index.variables[0].name, "x");
    assert_eq!(index.variables[0].source, VarSource::Set);
    assert_eq!(index.variables[0].ty, TypeTag::Int);
    assert_eq!(index.variables[1].ty, TypeTag::Str);
}

#[test]
fn test_for_target_gets_element_hint() {
    let index = index_of("{% for x in [1, 2] %}{{ x }}{% endfor %}");
    let var = &index.variables[0];
    assert_eq!(var.name, "x");
    assert_eq!(var.source, VarSource::ForLoop);
    assert_eq!(var.ty, TypeTag::ElementOf(Box::new(TypeTag::List)));
}

#[test]
fn test_macro_signature_string() {
    let index = index_of("{% macro btn(label, kind='primary') %}{% endmacro %}");
    assert_eq!(index.macros.len(), 1);
    let mac = &index.macros[0];
    assert_eq!(mac.name, "btn");
    assert_eq!(mac.params, vec!["label", "kind"]);
    assert_eq!(mac.signature, "btn(label, kind=\"primary\")");
    assert_eq!(mac.defaults[0], None);
    assert_eq!(mac.defaults[1].as_deref(), Some("\"primary\""));
}

#[test]
fn test_blocks_and_extends() {
    let index = index_of("{% extends 'base.html' %}{% block a %}{% endblock a %}");
    assert_eq!(index.extends.as_ref().map(|(n, _)| n.as_str()), Some("base.html"));
    assert_eq!(index.blocks.len(), 1);
    assert_eq!(index.blocks[0].name, "a");
    assert_eq!(
        index.blocks[0].end_name.as_ref().map(|(n, _)| n.as_str()),
        Some("a")
    );
}

#[test]
fn test_imports_and_includes() {
    let index = index_of(
        "{% from 'm.j2' import a as b, c %}{% import 'n.j2' as ns %}{% include 'p.j2' %}",
    );
    assert_eq!(index.imports.len(), 2);
    assert_eq!(index.imports[0].template, "m.j2");
    assert_eq!(index.imports[0].names.len(), 2);
    assert_eq!(index.imports[1].alias.as_deref(), Some("ns"));
    assert_eq!(index.includes.len(), 1);
    assert_eq!(index.includes[0].template, "p.j2");
}

#[test]
fn test_context_names_are_used_but_undefined() {
    let index = index_of("{% set a = 1 %}{{ a }}{{ user.name }}{{ items | length }}");
    let names: Vec<&str> = index.context_names.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["user", "items"]);
}

#[test]
fn test_reference_collections() {
    let index = index_of("{{ x | upper }}{{ y is defined }}{{ f(1) }}");
    assert_eq!(index.filter_refs.len(), 1);
    assert_eq!(index.filter_refs[0].name, "upper");
    assert_eq!(index.test_refs.len(), 1);
    assert_eq!(index.test_refs[0].name, "defined");
    assert_eq!(index.call_refs.len(), 1);
    assert_eq!(index.call_refs[0].name, "f");
}

#[test]
fn test_cancellation_returns_partial_index() {
    let source = "{% set a = 1 %}{% set b = 2 %}{% set c = 3 %}";
    let parse = analyzer::parse(source, &TagRegistry::new());
    let cancel = || true;
    let index = build_index("test.j2", &parse.template, Some(&cancel));
    assert!(index.variables.len() < 3);
}
