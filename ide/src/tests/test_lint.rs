use analyzer::{Code, LintCode, NamingCode, ParserCode, StyleCode};
use renderer::Environment;

use crate::index::build_index;
use crate::lint::check;

fn lint(source: &str) -> Vec<analyzer::Diagnostic> {
    let env = Environment::new();
    let parse = env.parse(source);
    let index = build_index("test.j2", &parse.template, None);
    check("test.j2", source, &parse, &index, &env)
}

fn codes(diags: &[analyzer::Diagnostic]) -> Vec<Code> {
    diags.iter().map(|d| d.code).collect()
}

#[test]
fn test_multiple_extends() {
    let diags = lint("{% extends 'a' %}{% extends 'b' %}");
    assert!(codes(&diags).contains(&Code::Lint(LintCode::MultipleExtends)));
}

#[test]
fn test_extends_not_first() {
    let diags = lint("{% set x = 1 %}{% extends 'a' %}");
    assert!(codes(&diags).contains(&Code::Lint(LintCode::ExtendsNotFirst)));

    // Leading text and comments are fine.
    let diags = lint("  {# note #}{% extends 'a' %}");
    assert!(!codes(&diags).contains(&Code::Lint(LintCode::ExtendsNotFirst)));
}

#[test]
fn test_duplicate_block_and_macro() {
    let diags = lint("{% block a %}{% endblock %}{% block a %}{% endblock %}");
    assert_eq!(
        codes(&diags)
            .iter()
            .filter(|c| **c == Code::Lint(LintCode::DuplicateBlock))
            .count(),
        1
    );

    let diags =
        lint("{% macro m() %}{% endmacro %}{% macro m() %}{% endmacro %}{{ m() }}");
    assert!(codes(&diags).contains(&Code::Lint(LintCode::DuplicateMacro)));
}

#[test]
fn test_unused_macro() {
    let diags = lint("{% macro helper() %}x{% endmacro %}");
    assert!(codes(&diags).contains(&Code::Lint(LintCode::UnusedMacro)));

    let diags = lint("{% macro helper() %}x{% endmacro %}{{ helper() }}");
    assert!(!codes(&diags).contains(&Code::Lint(LintCode::UnusedMacro)));
}

#[test]
fn test_unknown_filter_and_test() {
    let diags = lint("{{ x | nosuch }}");
    assert!(codes(&diags).contains(&Code::Lint(LintCode::UnknownFilter)));

    let diags = lint("{{ x is nosuch }}");
    assert!(codes(&diags).contains(&Code::Lint(LintCode::UnknownTest)));

    let diags = lint("{{ x | upper }}{{ x is defined }}");
    assert!(diags.is_empty(), "{:?}", diags);
}

#[test]
fn test_unknown_function_suppressed_for_macros() {
    let diags = lint("{{ mystery() }}");
    assert!(codes(&diags).contains(&Code::Lint(LintCode::UnknownFunction)));

    // Declared macro.
    let diags = lint("{% macro mystery() %}x{% endmacro %}{{ mystery() }}");
    assert!(!codes(&diags).contains(&Code::Lint(LintCode::UnknownFunction)));

    // Imported macro.
    let diags = lint("{% from 'm.j2' import mystery %}{{ mystery() }}");
    assert!(!codes(&diags).contains(&Code::Lint(LintCode::UnknownFunction)));

    // Builtin function.
    let diags = lint("{{ range(3) }}");
    assert!(!codes(&diags).contains(&Code::Lint(LintCode::UnknownFunction)));
}

#[test]
fn test_mismatched_block_name() {
    let diags = lint("{% block a %}{% endblock b %}");
    assert!(codes(&diags).contains(&Code::Parser(ParserCode::MismatchedBlockName)));
}

#[test]
fn test_style_trailing_whitespace() {
    let diags = lint("line one   \nline two\n");
    let trailing: Vec<_> = diags
        .iter()
        .filter(|d| d.code == Code::Style(StyleCode::TrailingWhitespace))
        .collect();
    assert_eq!(trailing.len(), 1);
    assert_eq!(trailing[0].span.start, 8);
    assert_eq!(trailing[0].span.end, 11);
}

#[test]
fn test_style_mixed_indentation() {
    let diags = lint("\t  mixed\n");
    assert!(codes(&diags).contains(&Code::Style(StyleCode::MixedIndentation)));
}

#[test]
fn test_style_excessive_blank_lines() {
    let diags = lint("a\n\n\n\nb\n");
    assert!(codes(&diags).contains(&Code::Style(StyleCode::ExcessiveBlankLines)));

    let diags = lint("a\n\nb\n");
    assert!(!codes(&diags).contains(&Code::Style(StyleCode::ExcessiveBlankLines)));
}

#[test]
fn test_block_naming() {
    let diags = lint("{% block BadName %}{% endblock %}");
    assert!(codes(&diags).contains(&Code::Naming(NamingCode::BlockName)));
}

#[test]
fn test_parser_diagnostics_pass_through() {
    let diags = lint("{{ 1 + * 2 }}");
    assert!(codes(&diags).contains(&Code::Parser(ParserCode::UnexpectedToken)));
}

#[test]
fn test_missing_end_tag_mapped_to_lint() {
    let diags = lint("{% if a %}x");
    let codes = codes(&diags);
    assert!(codes.contains(&Code::Lint(LintCode::MissingEndTag)));
    assert!(!codes.contains(&Code::Parser(ParserCode::MissingEndTag)));
}

#[test]
fn test_output_is_stably_sorted() {
    let diags = lint("{{ a | nope }}{{ b | nah }}");
    let starts: Vec<u32> = diags.iter().map(|d| d.span.start).collect();
    let mut sorted = starts.clone();
    sorted.sort_unstable();
    assert_eq!(starts, sorted);
}
