use std::sync::Arc;

use analyzer::TagRegistry;

use crate::store::DocumentStore;

#[test]
fn test_parse_is_cached_per_version() {
    let store = DocumentStore::new();
    let tags = TagRegistry::new();
    store.open("a", 1, "{{ x }}");

    let first = store.parse("a", &tags).expect("parse");
    let second = store.parse("a", &tags).expect("parse");
    assert!(Arc::ptr_eq(&first, &second), "same version reuses the tree");
}

#[test]
fn test_change_invalidates_cache() {
    let store = DocumentStore::new();
    let tags = TagRegistry::new();
    store.open("a", 1, "{{ x }}");
    let first = store.parse("a", &tags).expect("parse");

    store.change("a", 2, "{{ y }}");
    let second = store.parse("a", &tags).expect("parse");
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(store.get("a").unwrap().version, 2);
}

#[test]
fn test_lru_eviction_bounds_cache() {
    let store = DocumentStore::with_capacity(2);
    let tags = TagRegistry::new();
    store.open("a", 1, "{{ a }}");
    store.open("b", 1, "{{ b }}");
    store.open("c", 1, "{{ c }}");

    let a1 = store.parse("a", &tags).expect("parse");
    let _b1 = store.parse("b", &tags).expect("parse");
    let _c1 = store.parse("c", &tags).expect("parse");

    // `a` was evicted, so this parse is fresh; the document itself survives.
    let a2 = store.parse("a", &tags).expect("parse");
    assert!(!Arc::ptr_eq(&a1, &a2));
}

#[test]
fn test_close_removes_document() {
    let store = DocumentStore::new();
    let tags = TagRegistry::new();
    store.open("a", 1, "x");
    store.close("a");
    assert!(store.get("a").is_none());
    assert!(store.parse("a", &tags).is_none());
}

#[test]
fn test_open_uris_sorted() {
    let store = DocumentStore::new();
    store.open("b", 1, "x");
    store.open("a", 1, "x");
    assert_eq!(store.open_uris(), vec!["a", "b"]);
}
