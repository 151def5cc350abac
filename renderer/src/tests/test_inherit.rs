use analyzer::{Code, MemoryLoader, RendererCode};

use super::common::ctx;
use crate::environment::Environment;
use crate::render::render_str;

fn env_with(templates: Vec<(&str, &str)>) -> Environment {
    let mut loader = MemoryLoader::new();
    for (name, source) in templates {
        loader.insert(name, source);
    }
    let mut env = Environment::new();
    env.set_loader(loader);
    env
}

#[test]
fn test_child_overrides_parent_block() {
    let env = env_with(vec![("p", "[{% block a %}P{% endblock %}]")]);
    let (out, diagnostics) = render_str(
        "{% extends \"p\" %}{% block a %}C{% endblock %}",
        &env,
        &ctx(vec![]),
    );
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    assert_eq!(out, "[C]");
}

#[test]
fn test_parent_block_body_is_default() {
    let env = env_with(vec![("p", "[{% block a %}P{% endblock %}]")]);
    let (out, diagnostics) = render_str("{% extends 'p' %}", &env, &ctx(vec![]));
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    assert_eq!(out, "[P]");
}

#[test]
fn test_most_derived_override_wins_in_chain() {
    let env = env_with(vec![
        ("root", "1{% block b %}R{% endblock %}2"),
        ("mid", "{% extends 'root' %}{% block b %}M{% endblock %}"),
    ]);

    let (out, diagnostics) = render_str("{% extends 'mid' %}", &env, &ctx(vec![]));
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    assert_eq!(out, "1M2");

    let (out, diagnostics) = render_str(
        "{% extends 'mid' %}{% block b %}C{% endblock %}",
        &env,
        &ctx(vec![]),
    );
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    assert_eq!(out, "1C2");
}

#[test]
fn test_extends_cycle_emits_single_diagnostic() {
    let env = env_with(vec![
        ("a", "{% extends 'b' %}"),
        ("b", "{% extends 'a' %}"),
    ]);
    let (out, diagnostics) = render_str("{% extends 'a' %}", &env, &ctx(vec![]));
    assert_eq!(out, "");
    let cycles = diagnostics
        .iter()
        .filter(|d| d.code == Code::Renderer(RendererCode::TemplateCycle))
        .count();
    assert_eq!(cycles, 1);
}

#[test]
fn test_missing_parent() {
    let env = env_with(vec![]);
    let (out, diagnostics) = render_str("{% extends 'nope' %}", &env, &ctx(vec![]));
    assert_eq!(out, "");
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(
        diagnostics[0].code,
        Code::Renderer(RendererCode::TemplateNotFound)
    );
}

#[test]
fn test_include_cycle_aborts_branch() {
    let env = env_with(vec![("self", "x{% include 'self' %}")]);
    let (out, diagnostics) = render_str("{% include 'self' %}", &env, &ctx(vec![]));
    // The branch stops at the cycle; everything before it is kept.
    assert_eq!(out, "x");
    let cycles = diagnostics
        .iter()
        .filter(|d| d.code == Code::Renderer(RendererCode::TemplateCycle))
        .count();
    assert_eq!(cycles, 1);
}

#[test]
fn test_macros_from_child_are_visible_in_parent_blocks() {
    let env = env_with(vec![("p", "[{% block a %}{% endblock %}]")]);
    let (out, diagnostics) = render_str(
        "{% extends 'p' %}{% macro m() %}M{% endmacro %}{% block a %}{{ m() }}{% endblock %}",
        &env,
        &ctx(vec![]),
    );
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    assert_eq!(out, "[M]");
}
