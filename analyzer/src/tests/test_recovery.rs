use crate::ast::{BinOpKind, ExprKind, LitKind, StmtKind};
use crate::diagnostics::{Code, LexerCode, ParserCode};
use crate::parser::{ParseOutput, TagRegistry};

fn parse(source: &str) -> ParseOutput {
    crate::parse(source, &TagRegistry::new())
}

fn codes(output: &ParseOutput) -> Vec<Code> {
    output.diagnostics.iter().map(|d| d.code).collect()
}

#[test]
fn test_expression_resumes_after_unexpected_token() {
    // `{{ 1 + * 2 }}` parses as `1 + 2` with exactly one diagnostic.
    let out = parse("{{ 1 + * 2 }}");
    assert_eq!(
        codes(&out),
        vec![Code::Parser(ParserCode::UnexpectedToken)]
    );

    let StmtKind::Output { expr, .. } = &out.template.body[0].kind else {
        panic!("expected output");
    };
    let ExprKind::Binary { op, left, right } = &expr.kind else {
        panic!("expected binary, got {:?}", expr.kind);
    };
    assert_eq!(op.node, BinOpKind::Add);
    assert!(matches!(left.kind, ExprKind::Lit(LitKind::Int(1))));
    assert!(matches!(right.kind, ExprKind::Lit(LitKind::Int(2))));
}

#[test]
fn test_unterminated_expression_is_single_diagnostic() {
    let out = parse("Hello {{ name");
    assert_eq!(
        codes(&out),
        vec![Code::Lexer(LexerCode::UnterminatedExpression)]
    );
    // The body is still maximally reconstructed.
    assert_eq!(out.template.body.len(), 2);
    assert!(matches!(
        &out.template.body[0].kind,
        StmtKind::Text { text } if text == "Hello "
    ));
    let StmtKind::Output { expr, .. } = &out.template.body[1].kind else {
        panic!("expected output");
    };
    assert!(matches!(&expr.kind, ExprKind::Name(sym) if sym.text == "name"));
}

#[test]
fn test_unknown_tag_recovers_to_block_end() {
    let out = parse("{% widget 1 2 %}after");
    assert_eq!(codes(&out), vec![Code::Parser(ParserCode::UnknownTag)]);
    assert!(matches!(
        &out.template.body[0].kind,
        StmtKind::Text { text } if text == "after"
    ));
}

#[test]
fn test_unexpected_end_tag_reenters_statement_loop() {
    let out = parse("{% if a %}x{% endfor %}y{% endif %}");
    assert_eq!(
        codes(&out),
        vec![Code::Parser(ParserCode::UnexpectedEndTag)]
    );
    let StmtKind::If { body, .. } = &out.template.body[0].kind else {
        panic!("expected if");
    };
    // Both text nodes survive inside the if body.
    assert_eq!(body.len(), 2);
}

#[test]
fn test_missing_end_tag_keeps_accumulated_body() {
    let out = parse("{% if a %}x");
    assert_eq!(codes(&out), vec![Code::Parser(ParserCode::MissingEndTag)]);
    let StmtKind::If { body, .. } = &out.template.body[0].kind else {
        panic!("expected if");
    };
    assert_eq!(body.len(), 1);
    // The diagnostic points at the unclosed opener.
    assert_eq!(out.diagnostics[0].span.start, 0);
}

#[test]
fn test_empty_output_is_placeholder_not_truncation() {
    let out = parse("{{ }}x");
    assert_eq!(
        codes(&out),
        vec![Code::Parser(ParserCode::ExpectedExpression)]
    );
    assert_eq!(out.template.body.len(), 2);
    let StmtKind::Output { expr, .. } = &out.template.body[0].kind else {
        panic!("expected output");
    };
    assert!(matches!(expr.kind, ExprKind::Error));
}

#[test]
fn test_stray_token_before_var_end() {
    let out = parse("{{ a b }}");
    assert_eq!(
        codes(&out),
        vec![Code::Parser(ParserCode::UnexpectedToken)]
    );
    assert_eq!(out.template.body.len(), 1);
}

#[test]
fn test_stray_tokens_in_block_tag() {
    let out = parse("{% if a b %}x{% endif %}");
    assert_eq!(
        codes(&out),
        vec![Code::Parser(ParserCode::UnexpectedToken)]
    );
    let StmtKind::If { body, .. } = &out.template.body[0].kind else {
        panic!("expected if");
    };
    assert_eq!(body.len(), 1);
}

#[test]
fn test_unclosed_paren_recovers() {
    let out = parse("{{ (1 + 2 ] }}done");
    assert!(!out.diagnostics.is_empty());
    // Recovery reaches the text after the expression.
    assert!(matches!(
        &out.template.body[1].kind,
        StmtKind::Text { text } if text == "done"
    ));
}

#[test]
fn test_open_bracket_swallows_var_end() {
    // With an open `(` the `}}` is punctuation, so the tag never closes; the
    // lexer reports it once and the parser still produces an output node.
    let out = parse("{{ (1 + 2 }}");
    assert!(
        codes(&out).contains(&Code::Lexer(LexerCode::UnterminatedExpression))
    );
    assert!(matches!(
        &out.template.body[0].kind,
        StmtKind::Output { .. }
    ));
}

#[test]
fn test_set_without_assignment_or_body() {
    let out = parse("{% set x + %}");
    assert!(!out.diagnostics.is_empty());
    assert!(matches!(
        &out.template.body[0].kind,
        StmtKind::Set { .. }
    ));
}
