//! Round trips: serialization, canonical names, builds, documents on disk.

use std::sync::Arc;

use serde_json::{json, Value};
use skema_core::{InstanceId, SchemaId};
use skema_object::{
    FileLoader, Node, ObjectOptions, ObjectStore, SerializeOptions, SkemaConfig, TypeBuilder,
};
use skema_schema::SchemaStore;

fn schemas() -> SchemaStore {
    let mut schemas = SchemaStore::new();
    for doc in [
        json!({"$id": "animal", "type": "object", "required": ["name"], "properties": {
            "name": {"type": "string"},
            "legs": {"type": "integer", "default": 4},
            "tags": {"type": "array", "items": {"type": "string"}}
        }}),
        json!({"$id": "bird", "extends": "animal", "properties": {
            "legs": {"type": "integer", "default": 2},
            "flies": {"type": "boolean", "default": true}
        }}),
        json!({"$id": "zoo", "type": "object", "properties": {
            "name": {"type": "string"},
            "opened": {"type": "string", "format": "date"},
            "pens": {"type": "array", "items": {"type": "array", "items": {"$ref": "animal"}}},
            "keeper": {"$ref": "animal"}
        }}),
    ] {
        schemas.register(doc).unwrap();
    }
    schemas
}

fn store() -> ObjectStore {
    ObjectStore::new(Arc::new(TypeBuilder::new(Arc::new(schemas()))))
}

fn zoo_data() -> Value {
    json!({
        "name": "z",
        "opened": "2021-05-01",
        "pens": [
            [{"name": "rex", "tags": ["old"]}, {"$schema": "bird", "name": "kiwi", "flies": false}],
            [{"name": "tom", "legs": 3}]
        ],
        "keeper": {"name": "ann", "legs": 2}
    })
}

fn descendants(s: &ObjectStore, root: InstanceId) -> Vec<InstanceId> {
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        let children = s.children(id).unwrap();
        out.extend(children.iter().copied());
        stack.extend(children);
    }
    out
}

// ─── Serialization ──────────────────────────────────────────────────

#[test]
fn test_serialize_deserialize_serialize_is_stable() {
    let mut s = store();
    let ty = SchemaId::new("zoo");
    let first = s.create(&ty, zoo_data(), ObjectOptions::default()).unwrap();
    let out = s.serialize(first, &SerializeOptions::default()).unwrap();

    let second = s.create(&ty, out.clone(), ObjectOptions::default()).unwrap();
    assert_eq!(s.serialize(second, &SerializeOptions::default()).unwrap(), out);
    assert!(s.equals(first, second).unwrap());

    let full = SerializeOptions::with_defaults();
    let with_defaults = s.serialize(first, &full).unwrap();
    let third = s.create(&ty, with_defaults.clone(), ObjectOptions::default()).unwrap();
    assert_eq!(s.serialize(third, &full).unwrap(), with_defaults);
}

#[test]
fn test_serialized_form_omits_defaults_and_tags_subtypes() {
    let mut s = store();
    let z = s
        .create(&SchemaId::new("zoo"), zoo_data(), ObjectOptions::default())
        .unwrap();
    let out = s.serialize(z, &SerializeOptions::default()).unwrap();
    assert_eq!(out["pens"][0][0], json!({"name": "rex", "tags": ["old"]}));
    assert_eq!(
        out["pens"][0][1],
        json!({"$schema": "bird", "name": "kiwi", "flies": false})
    );
    assert_eq!(out["pens"][1][0], json!({"name": "tom", "legs": 3}));
    // The keeper's legs differ from the animal default.
    assert_eq!(out["keeper"], json!({"name": "ann", "legs": 2}));

    let trimmed = s
        .serialize(z, &SerializeOptions::default().exclude("pens").exclude("opened"))
        .unwrap();
    assert_eq!(trimmed, json!({"name": "z", "keeper": {"name": "ann", "legs": 2}}));
}

#[test]
fn test_full_value_includes_defaults() {
    let mut s = store();
    let z = s
        .create(&SchemaId::new("zoo"), zoo_data(), ObjectOptions::default())
        .unwrap();
    let rex = s.get(z, "pens[0][0]").unwrap();
    assert_eq!(rex, json!({"name": "rex", "legs": 4, "tags": ["old"]}));
    let kiwi = s.get(z, "pens[0][1]").unwrap();
    assert_eq!(kiwi, json!({"name": "kiwi", "legs": 2, "tags": [], "flies": false}));
}

// ─── Canonical names ────────────────────────────────────────────────

#[test]
fn test_canonical_names_resolve_back() {
    let mut s = store();
    let z = s
        .create(&SchemaId::new("zoo"), zoo_data(), ObjectOptions::default())
        .unwrap();
    let all = descendants(&s, z);
    assert_eq!(all.len(), 4);
    for id in all {
        let cname = s.canonical_name(id).unwrap().to_string();
        assert_eq!(s.resolve_cname(z, &cname).unwrap(), Node::Object(id), "{cname}");
        let path = s.path_of(id).unwrap().to_string();
        assert_eq!(s.resolve_cname(z, &path).unwrap(), Node::Object(id), "{path}");
        // Resolving from the instance itself works as well.
        assert_eq!(s.resolve_cname(id, &cname).unwrap(), Node::Object(id), "{cname}");
    }
}

#[test]
fn test_query_by_subtype_and_values() {
    let mut s = store();
    let z = s
        .create(&SchemaId::new("zoo"), zoo_data(), ObjectOptions::default())
        .unwrap();
    let animals = s.instances_of(&SchemaId::new("animal"));
    assert_eq!(animals.len(), 4);
    let birds = s.instances_of(&SchemaId::new("bird"));
    assert_eq!(birds.len(), 1);
    assert_eq!(s.canonical_name(birds[0]).unwrap().to_string(), ".kiwi");

    let two_legged = s
        .query(&SchemaId::new("animal"), json!({"legs": 2}).as_object().unwrap())
        .unwrap();
    assert_eq!(two_legged.len(), 2);

    s.free(z).unwrap();
    assert!(s.instances_of(&SchemaId::new("animal")).is_empty());
}

// ─── Builds ─────────────────────────────────────────────────────────

#[test]
fn test_independent_builds_have_identical_shapes() {
    let schemas = Arc::new(schemas());
    let a = TypeBuilder::new(schemas.clone());
    let b = TypeBuilder::new(schemas);
    let bird = SchemaId::new("bird");

    let first = a.load(&bird).unwrap();
    assert!(Arc::ptr_eq(&first, &a.load(&bird).unwrap()));
    assert_eq!(first.shape(), b.load(&bird).unwrap().shape());
    assert_eq!(
        first.property_names(),
        vec!["name".to_string(), "legs".to_string(), "tags".to_string(), "flies".to_string()]
    );
    assert_eq!(first.default_of("legs"), Some(&json!(2)));
    assert!(first.is_subtype_of(&SchemaId::new("animal")));
}

#[test]
fn test_configured_type_defaults() {
    let config = SkemaConfig::from_yaml_str(
        "printMaxElements: 2\ntypeDefaults:\n  animal:\n    legs: 6\n",
    )
    .unwrap();
    let builder = TypeBuilder::with_config(Arc::new(schemas()), config);
    let mut s = ObjectStore::new(Arc::new(builder));
    let ant = s
        .create(
            &SchemaId::new("animal"),
            json!({"name": "ant", "tags": ["a", "b", "c"]}),
            ObjectOptions::default(),
        )
        .unwrap();
    assert_eq!(s.get(ant, "legs").unwrap(), json!(6));
    assert_eq!(s.display(ant).unwrap(), "{name: \"ant\", tags: [\"a\", \"b\", +1...]}");
    s.set(ant, "legs", json!(5)).unwrap();
    assert_eq!(s.get(ant, "legs").unwrap(), json!(5));
}

// ─── Documents on disk ──────────────────────────────────────────────

#[test]
fn test_construction_by_reference() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("ann.yaml"), "name: ann\nlegs: 2\n").unwrap();
    std::fs::write(
        dir.path().join("zoo.json"),
        r#"{"name": "z", "keeper": "ann.yaml", "pens": []}"#,
    )
    .unwrap();

    let mut s = store().with_loader(Arc::new(FileLoader::new(dir.path())));
    let z = s
        .create_by_reference(&SchemaId::new("zoo"), "zoo.json", ObjectOptions::default())
        .unwrap();
    assert_eq!(s.get(z, "keeper.name").unwrap(), json!("ann"));
    assert_eq!(s.get(z, "keeper.legs").unwrap(), json!(2));

    let err = s
        .create_by_reference(&SchemaId::new("zoo"), "missing.json", ObjectOptions::default())
        .unwrap_err();
    assert!(matches!(err, skema_core::SkemaError::Io(_)));
}

#[test]
fn test_reference_without_loader() {
    let mut s = store();
    let err = s
        .create(&SchemaId::new("zoo"), json!({"keeper": "ann.yaml"}), ObjectOptions::default())
        .unwrap_err();
    assert!(err.is_reference());
    assert!(s.is_empty());
}
