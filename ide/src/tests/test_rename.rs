use super::common::{URI, position_of_occurrence, workspace};

const SCOPED: &str = "{% set x = 1 %}{{ x }}{% for x in xs %}{{ x }}{% endfor %}{{ x }}";

#[test]
fn test_rename_outer_binding_from_definition() {
    let ws = workspace(SCOPED, vec![]);
    // First `x` is the set target.
    let position = position_of_occurrence(SCOPED, "x", 0);
    let edit = ws.rename(URI, position, "y").expect("rename");
    let edits = edit.changes.get(URI).expect("edits for uri");
    assert_eq!(edits.len(), 3, "definition plus the two outer uses");
}

#[test]
fn test_rename_outer_binding_from_last_use() {
    let ws = workspace(SCOPED, vec![]);
    let last = SCOPED.rfind('x').unwrap();
    let position = super::common::position_at(SCOPED, last);
    let edit = ws.rename(URI, position, "y").expect("rename");
    let edits = edit.changes.get(URI).expect("edits for uri");
    assert_eq!(edits.len(), 3);
}

#[test]
fn test_rename_loop_binding_never_touches_outer() {
    let ws = workspace(SCOPED, vec![]);
    // `for x` target is the third `x` occurrence (set target, outer use, loop target).
    let position = position_of_occurrence(SCOPED, "x", 2);
    let edit = ws.rename(URI, position, "y").expect("rename");
    let edits = edit.changes.get(URI).expect("edits for uri");
    assert_eq!(edits.len(), 2, "loop target plus its single use");
}

#[test]
fn test_rename_rejects_invalid_identifier() {
    let ws = workspace(SCOPED, vec![]);
    let position = position_of_occurrence(SCOPED, "x", 0);
    assert!(ws.rename(URI, position, "not an ident").is_none());
    assert!(ws.rename(URI, position, "1abc").is_none());
}

#[test]
fn test_prepare_rename_targets_the_symbol() {
    let ws = workspace(SCOPED, vec![]);
    let position = position_of_occurrence(SCOPED, "x", 1);
    let range = ws.prepare_rename(URI, position).expect("prepare");
    assert_eq!(range.start.line, 0);
}

#[test]
fn test_references_follow_binding_identity() {
    let ws = workspace(SCOPED, vec![]);
    let position = position_of_occurrence(SCOPED, "x", 0);
    let refs = ws.references(URI, position);
    assert_eq!(refs.len(), 3);

    let loop_position = position_of_occurrence(SCOPED, "x", 2);
    let refs = ws.references(URI, loop_position);
    assert_eq!(refs.len(), 2);
}

#[test]
fn test_set_rebinding_is_one_symbol() {
    let source = "{% set x = 1 %}{% set x = 2 %}{{ x }}";
    let ws = workspace(source, vec![]);
    let position = position_of_occurrence(source, "x", 0);
    let edit = ws.rename(URI, position, "y").expect("rename");
    let edits = edit.changes.get(URI).expect("edits for uri");
    // First definition, the rebinding target, and the use.
    assert_eq!(edits.len(), 3);
}
