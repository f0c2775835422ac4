//! Mapping protocol: access rules, aliases, undeclared keys and user code.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use proptest::prelude::*;
use serde_json::{json, Value};
use skema_core::{AccessError, KeyError, SchemaId, SkemaError};
use skema_object::{ObjectOptions, ObjectStore, SerializeOptions, TypeBuilder, TypeOverrides};
use skema_schema::SchemaStore;

fn builder(docs: Vec<Value>) -> TypeBuilder {
    let mut schemas = SchemaStore::new();
    for d in docs {
        schemas.register(d).unwrap();
    }
    TypeBuilder::new(Arc::new(schemas))
}

fn store(docs: Vec<Value>) -> ObjectStore {
    ObjectStore::new(Arc::new(builder(docs)))
}

fn device() -> Value {
    json!({"$id": "device", "type": "object", "required": ["name"], "readOnly": ["serial"],
        "properties": {
            "name": {"type": "string"},
            "serial": {"type": "string", "default": "S-1"},
            "note": {"type": "string"},
            "retries": {"type": "integer", "default": 3}
        }})
}

// ─── Access rules ───────────────────────────────────────────────────

#[test]
fn test_read_only_write_is_rejected() {
    let mut s = store(vec![device()]);
    let d = s
        .create(
            &SchemaId::new("device"),
            json!({"name": "d", "serial": "forged"}),
            ObjectOptions::default(),
        )
        .unwrap();
    assert_eq!(s.get(d, "serial").unwrap(), json!("S-1"));

    let err = s.set(d, "serial", json!("S-2")).unwrap_err();
    assert!(matches!(err, SkemaError::Access(AccessError::ReadOnly { .. })));
    assert_eq!(s.get(d, "serial").unwrap(), json!("S-1"));
}

#[test]
fn test_hard_set_default_is_read_only() {
    let b = builder(vec![device()]);
    b.register_overrides("device", TypeOverrides::new().default_value("note", json!("fixed")));
    let mut s = ObjectStore::new(Arc::new(b));
    let d = s
        .create(&SchemaId::new("device"), json!({"name": "d"}), ObjectOptions::default())
        .unwrap();
    assert_eq!(s.get(d, "note").unwrap(), json!("fixed"));
    assert!(s.set(d, "note", json!("other")).unwrap_err().is_access());
}

#[test]
fn test_failed_write_restores_previous_value() {
    let mut s = store(vec![device()]);
    let d = s
        .create(&SchemaId::new("device"), json!({"name": "d"}), ObjectOptions::default())
        .unwrap();
    s.set(d, "retries", json!(5)).unwrap();
    assert!(s.set(d, "retries", json!("many")).unwrap_err().is_validation());
    assert_eq!(s.get(d, "retries").unwrap(), json!(5));
    assert_eq!(s.raw(d, "retries").unwrap(), Some(json!(5)));
}

#[test]
fn test_delete_rules() {
    let deletions = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&deletions);
    let b = builder(vec![device()]);
    b.register_overrides(
        "device",
        TypeOverrides::new().deleter("note", move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }),
    );
    let mut s = ObjectStore::new(Arc::new(b));
    let d = s
        .create(&SchemaId::new("device"), json!({"name": "d"}), ObjectOptions::default())
        .unwrap();

    let err = s.delete(d, "name").unwrap_err();
    assert!(matches!(err, SkemaError::Access(AccessError::Required { .. })));
    let err = s.delete(d, "note").unwrap_err();
    assert!(matches!(err, SkemaError::Key(KeyError::Unset { .. })));
    assert_eq!(deletions.load(Ordering::SeqCst), 0);

    s.set(d, "note", json!("n")).unwrap();
    assert!(s.has(d, "note"));
    s.delete(d, "note").unwrap();
    assert_eq!(deletions.load(Ordering::SeqCst), 1);
    assert!(!s.has(d, "note"));
    assert!(s.get(d, "note").unwrap_err().is_key());

    // A defaulted property falls back to its default.
    s.set(d, "retries", json!(7)).unwrap();
    s.delete(d, "retries").unwrap();
    assert_eq!(s.get(d, "retries").unwrap(), json!(3));
}

// ─── Aliases ────────────────────────────────────────────────────────

fn motor() -> Value {
    json!({"$id": "motor", "type": "object", "properties": {
        "speed": {"type": "integer", "default": 0}
    }, "aliases": {"rpm": "speed"}, "negatedAliases": {"reverse": "speed"}})
}

#[test]
fn test_alias_reads_and_writes_target() {
    let mut s = store(vec![motor()]);
    let m = s
        .create(&SchemaId::new("motor"), json!({"rpm": 10}), ObjectOptions::default())
        .unwrap();
    assert_eq!(s.get(m, "speed").unwrap(), json!(10));
    s.set(m, "rpm", json!(20)).unwrap();
    assert_eq!(s.get(m, "speed").unwrap(), json!(20));
    assert_eq!(s.keys(m).unwrap(), vec!["speed".to_string()]);
}

proptest! {
    /// A negated alias always reads the negation of its target.
    #[test]
    fn test_negated_alias_mirrors_target(initial in -1_000_000i64..1_000_000, next in -1_000_000i64..1_000_000) {
        let mut s = store(vec![motor()]);
        let m = s.create(&SchemaId::new("motor"), json!({"reverse": initial}), ObjectOptions::default()).unwrap();
        prop_assert_eq!(s.get(m, "speed").unwrap(), json!(-initial));
        prop_assert_eq!(s.get(m, "reverse").unwrap(), json!(initial));

        s.set(m, "reverse", json!(next)).unwrap();
        prop_assert_eq!(s.get(m, "speed").unwrap(), json!(-next));
        let out = s.serialize(m, &SerializeOptions::with_defaults()).unwrap();
        prop_assert_eq!(&out["speed"], &json!(-next));
        prop_assert_eq!(&out["reverse"], &json!(next));
    }
}

#[test]
fn test_negated_alias_rejects_non_numbers() {
    let mut s = store(vec![motor()]);
    let m = s
        .create(&SchemaId::new("motor"), json!({}), ObjectOptions::default())
        .unwrap();
    assert!(s.set(m, "reverse", json!("fast")).unwrap_err().is_validation());
    assert_eq!(s.get(m, "speed").unwrap(), json!(0));
}

// ─── Undeclared keys ────────────────────────────────────────────────

#[test]
fn test_typed_additional_properties() {
    let mut s = store(vec![json!({"$id": "counters", "type": "object",
        "properties": {"total": {"type": "integer", "default": 0}},
        "additionalProperties": {"type": "integer", "minimum": 0}})]);
    let c = s
        .create(&SchemaId::new("counters"), json!({"hits": 2}), ObjectOptions::default())
        .unwrap();
    assert_eq!(s.get(c, "hits").unwrap(), json!(2));
    s.set(c, "misses", json!(1)).unwrap();
    assert!(s.set(c, "errors", json!(-1)).unwrap_err().is_validation());
    assert!(!s.has(c, "errors"));
    assert_eq!(
        s.keys(c).unwrap(),
        vec!["total".to_string(), "hits".to_string(), "misses".to_string()]
    );
    assert!(matches!(
        s.get(c, "errors").unwrap_err(),
        SkemaError::Key(KeyError::Unset { .. })
    ));
}

#[test]
fn test_pattern_properties_on_closed_type() {
    let mut s = store(vec![json!({"$id": "env", "type": "object",
        "additionalProperties": false,
        "patternProperties": {"^VAR_": {"type": "string"}}})]);
    let e = s
        .create(&SchemaId::new("env"), json!({"VAR_HOME": "/root"}), ObjectOptions::default())
        .unwrap();
    assert_eq!(s.get(e, "VAR_HOME").unwrap(), json!("/root"));
    assert!(s.set(e, "VAR_N", json!(1)).unwrap_err().is_validation());
    let err = s.set(e, "HOME", json!("/")).unwrap_err();
    assert!(matches!(err, SkemaError::Key(KeyError::UnknownProperty { .. })));
}

// ─── User code ──────────────────────────────────────────────────────

fn rect() -> Value {
    json!({"$id": "rect", "type": "object", "properties": {
        "w": {"type": "integer", "default": 1},
        "h": {"type": "integer", "default": 1},
        "area": {"type": "integer"}
    }})
}

#[test]
fn test_method_shadows_property() {
    let b = builder(vec![rect()]);
    b.register_overrides(
        "rect",
        TypeOverrides::new()
            .method("area", |s, id, _| {
                let w = s.get(id, "w")?.as_i64().unwrap_or(0);
                let h = s.get(id, "h")?.as_i64().unwrap_or(0);
                Ok(json!(w * h))
            })
            .method("scale", |s, id, args| {
                let k = args.first().and_then(Value::as_i64).unwrap_or(1);
                let w = s.get(id, "w")?.as_i64().unwrap_or(0);
                s.set(id, "w", json!(w * k))?;
                Ok(Value::Null)
            }),
    );
    let mut s = ObjectStore::new(Arc::new(b));
    let r = s
        .create(&SchemaId::new("rect"), json!({"w": 3, "h": 4}), ObjectOptions::default())
        .unwrap();
    assert_eq!(s.get(r, "area").unwrap(), json!(12));
    s.call(r, "scale", &[json!(2)]).unwrap();
    assert_eq!(s.get(r, "area").unwrap(), json!(24));
    assert!(matches!(
        s.call(r, "perimeter", &[]).unwrap_err(),
        SkemaError::Key(KeyError::UnknownMethod { .. })
    ));
}

#[test]
fn test_setter_sees_validated_value() {
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let b = builder(vec![rect()]);
    b.register_overrides(
        "rect",
        TypeOverrides::new().setter("w", move |_, _, v| {
            sink.lock().push(v.clone());
            Ok(())
        }),
    );
    let mut s = ObjectStore::new(Arc::new(b));
    let r = s
        .create(&SchemaId::new("rect"), json!({"w": 2.0}), ObjectOptions::default())
        .unwrap();
    s.set(r, "w", json!(5)).unwrap();
    assert_eq!(*seen.lock(), vec![json!(2), json!(5)]);
}

#[test]
fn test_failing_behavior_propagates() {
    let b = builder(vec![rect()]);
    b.register_overrides(
        "rect",
        TypeOverrides::new().setter("h", |_, _, v| {
            if v.as_i64().is_some_and(|h| h > 100) {
                return Err(SkemaError::behavior("h", "too tall"));
            }
            Ok(())
        }),
    );
    let mut s = ObjectStore::new(Arc::new(b));
    let r = s
        .create(&SchemaId::new("rect"), json!({}), ObjectOptions::default())
        .unwrap();
    let err = s.set(r, "h", json!(500)).unwrap_err();
    assert!(matches!(err, SkemaError::Behavior { ref name, .. } if name == "h"));
    assert_eq!(s.get(r, "h").unwrap(), json!(1));
}
