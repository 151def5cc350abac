use crate::ast::{Expr, Stmt, Visitor, walk_expr, walk_stmt, walk_template};
use crate::parser::TagRegistry;

#[derive(Default)]
struct Counter {
    stmts: usize,
    exprs: usize,
    cancel_after: Option<usize>,
}

impl Visitor for Counter {
    fn should_cancel(&self) -> bool {
        self.cancel_after.is_some_and(|limit| self.stmts >= limit)
    }

    fn visit_stmt(&mut self, stmt: &Stmt) {
        self.stmts += 1;
        walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        self.exprs += 1;
        walk_expr(self, expr);
    }
}

const SOURCE: &str =
    "{% for x in xs %}{{ x }}{% endfor %}{% if a %}{{ b + c }}{% else %}{{ d }}{% endif %}";

#[test]
fn test_walk_visits_nested_bodies() {
    let out = crate::parse(SOURCE, &TagRegistry::new());
    let mut counter = Counter::default();
    counter.visit_template(&out.template);
    // for + output, if + two outputs.
    assert_eq!(counter.stmts, 5);
    // xs, x, a, b + c (3 nodes), d.
    assert_eq!(counter.exprs, 7);
}

#[test]
fn test_cancellation_stops_early_with_partial_results() {
    let out = crate::parse(SOURCE, &TagRegistry::new());
    let mut counter = Counter {
        cancel_after: Some(1),
        ..Counter::default()
    };
    counter.visit_template(&out.template);
    assert!(counter.stmts < 5, "cancelled walk must be partial");
}

#[test]
fn test_walk_template_entry_point() {
    let out = crate::parse("{{ a }}", &TagRegistry::new());
    let mut counter = Counter::default();
    walk_template(&mut counter, &out.template);
    assert_eq!(counter.stmts, 1);
    assert_eq!(counter.exprs, 1);
}
