//! Template evaluation, outdated tracking and lazy loading.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use proptest::prelude::*;
use serde_json::{json, Value};
use skema_core::SchemaId;
use skema_object::{Node, ObjectOptions, ObjectStore, TypeBuilder, TypeOverrides};
use skema_schema::SchemaStore;

fn builder(docs: Vec<Value>) -> TypeBuilder {
    let mut schemas = SchemaStore::new();
    for d in docs {
        schemas.register(d).unwrap();
    }
    TypeBuilder::new(Arc::new(schemas))
}

fn point() -> Value {
    json!({"$id": "point", "type": "object", "properties": {
        "x": {"type": "integer", "default": 0},
        "y": {"type": "integer", "default": 0},
        "dist": {"type": "string", "default": "{{x}}:{{y}}"}
    }, "dependencies": {"dist": ["x", "y"]}})
}

fn gauge() -> Value {
    json!({"$id": "gauge", "type": "object", "properties": {
        "level": {"type": "integer", "maximum": 10},
        "label": {"type": "string"}
    }})
}

fn tank() -> Value {
    json!({"$id": "tank", "type": "object", "properties": {
        "gauge": {"$ref": "gauge"}
    }})
}

// ─── Templates and outdated tracking ────────────────────────────────

#[test]
fn test_point_distance_follows_writes() {
    let mut s = ObjectStore::new(Arc::new(builder(vec![point()])));
    let p = s
        .create(&SchemaId::new("point"), json!({"x": 3}), ObjectOptions::default())
        .unwrap();
    assert_eq!(s.get(p, "dist").unwrap(), json!("3:0"));
    assert!(!s.is_outdated(p, "dist").unwrap());

    s.set(p, "y", json!(4)).unwrap();
    assert!(s.is_outdated(p, "dist").unwrap());
    assert!(!s.is_outdated(p, "y").unwrap());
    assert_eq!(s.get(p, "dist").unwrap(), json!("3:4"));
    assert!(!s.is_outdated(p, "dist").unwrap());
}

#[test]
fn test_template_evaluated_once_per_read_after_writes() {
    let evaluations = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&evaluations);
    let b = builder(vec![point()]);
    b.register_overrides(
        "point",
        TypeOverrides::new().setter("dist", move |_, _, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }),
    );
    let mut s = ObjectStore::new(Arc::new(b));
    let p = s
        .create(&SchemaId::new("point"), json!({"x": 3}), ObjectOptions::default())
        .unwrap();
    assert_eq!(evaluations.load(Ordering::SeqCst), 1);

    s.set(p, "x", json!(5)).unwrap();
    s.set(p, "y", json!(4)).unwrap();
    assert_eq!(evaluations.load(Ordering::SeqCst), 1);

    assert_eq!(s.get(p, "dist").unwrap(), json!("5:4"));
    assert_eq!(s.get(p, "dist").unwrap(), json!("5:4"));
    assert_eq!(evaluations.load(Ordering::SeqCst), 2);
}

#[test]
fn test_template_value_written_later() {
    let mut s = ObjectStore::new(Arc::new(builder(vec![point()])));
    let p = s
        .create(&SchemaId::new("point"), json!({"x": 1, "y": 2}), ObjectOptions::default())
        .unwrap();
    s.set(p, "dist", json!("({{y}}, {{x}})")).unwrap();
    assert_eq!(s.get(p, "dist").unwrap(), json!("(2, 1)"));
    s.set(p, "x", json!(9)).unwrap();
    assert_eq!(s.get(p, "dist").unwrap(), json!("(2, 9)"));
}

#[test]
fn test_getter_is_always_outdated() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let b = builder(vec![json!({"$id": "clock", "type": "object", "properties": {
        "ticks": {"type": "integer"}
    }})]);
    b.register_overrides(
        "clock",
        TypeOverrides::new().getter("ticks", move |_, _| {
            Ok(json!(counter.fetch_add(1, Ordering::SeqCst) + 1))
        }),
    );
    let mut s = ObjectStore::new(Arc::new(b));
    let c = s
        .create(&SchemaId::new("clock"), json!({}), ObjectOptions::default())
        .unwrap();
    assert!(s.is_outdated(c, "ticks").unwrap());
    let first = s.get(c, "ticks").unwrap();
    let second = s.get(c, "ticks").unwrap();
    assert_ne!(first, second);
    assert!(s.is_outdated(c, "ticks").unwrap());
}

// ─── Lazy loading ───────────────────────────────────────────────────

#[test]
fn test_lazy_instance_defers_validation() {
    let mut s = ObjectStore::new(Arc::new(builder(vec![gauge()])));
    let g = s
        .create(&SchemaId::new("gauge"), json!({"level": 99}), ObjectOptions::lazy())
        .unwrap();
    assert!(s.is_outdated(g, "level").unwrap());
    assert!(s.get(g, "level").unwrap_err().is_validation());

    let strict = ObjectOptions {
        validate_lazy: Some(true),
        ..ObjectOptions::lazy()
    };
    let err = s
        .create(&SchemaId::new("gauge"), json!({"level": 99}), strict)
        .unwrap_err();
    assert!(err.is_validation());
    assert_eq!(s.len(), 1);
}

#[test]
fn test_lazy_write_is_checked_on_read() {
    let mut s = ObjectStore::new(Arc::new(builder(vec![gauge()])));
    let g = s
        .create(&SchemaId::new("gauge"), json!({"level": 1}), ObjectOptions::lazy())
        .unwrap();
    s.set(g, "level", json!("high")).unwrap();
    assert_eq!(s.raw(g, "level").unwrap(), Some(json!("high")));
    assert!(s.get(g, "level").unwrap_err().is_validation());
}

#[test]
fn test_propagated_options_reach_children() {
    let mut s = ObjectStore::new(Arc::new(builder(vec![gauge(), tank()])));
    let raw = json!({"gauge": {"level": 99}});

    let t = s
        .create(&SchemaId::new("tank"), raw.clone(), ObjectOptions::lazy().propagating())
        .unwrap();
    assert!(s.children(t).unwrap().is_empty());
    let Node::Object(g) = s.get_node(t, "gauge").unwrap() else {
        panic!("gauge is an object");
    };
    assert!(s.options(g).unwrap().is_lazy());
    assert_eq!(s.parent(g).unwrap(), Some(t));
    assert!(s.get(g, "level").unwrap_err().is_validation());

    let t = s
        .create(&SchemaId::new("tank"), raw, ObjectOptions::lazy())
        .unwrap();
    assert!(s.get_node(t, "gauge").unwrap_err().is_validation());
}

// ─── Properties ─────────────────────────────────────────────────────

fn chain() -> Value {
    json!({"$id": "chain", "type": "object", "properties": {
        "a": {"type": "integer", "default": 0},
        "b": {"type": "string", "default": "{{a}}-b"},
        "c": {"type": "string", "default": "{{b}}-c"}
    }})
}

proptest! {
    /// A read always reflects every earlier write, through any number of
    /// template hops.
    #[test]
    fn test_reads_follow_transitive_dependencies(
        writes in prop::collection::vec((any::<i32>(), any::<bool>()), 1..8)
    ) {
        let mut s = ObjectStore::new(Arc::new(builder(vec![chain()])));
        let id = s.create(&SchemaId::new("chain"), json!({}), ObjectOptions::default()).unwrap();
        let mut last = 0;
        for (value, read) in writes {
            s.set(id, "a", json!(value)).unwrap();
            last = value;
            prop_assert!(s.is_outdated(id, "c").unwrap());
            if read {
                prop_assert_eq!(s.get(id, "c").unwrap(), json!(format!("{value}-b-c")));
                prop_assert!(!s.is_outdated(id, "c").unwrap());
            }
        }
        prop_assert_eq!(s.get(id, "b").unwrap(), json!(format!("{last}-b")));
        prop_assert_eq!(s.get(id, "c").unwrap(), json!(format!("{last}-b-c")));
    }
}
