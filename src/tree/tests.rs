use serde_json::json;

use super::*;
use crate::resolver::register_resolver;
use crate::schema::{Field, Schema};

fn sample() -> ConfigTree {
    ConfigTree::from_json(&json!({
        "server": {"host": "example.com", "port": 80},
        "debug": false,
        "tags": ["a", "b"],
    }))
}

#[test]
fn test_get_typed() {
    let tree = sample();
    assert_eq!(tree.get::<String>("server.host").unwrap(), "example.com");
    assert_eq!(tree.get::<i64>("server.port").unwrap(), 80);
    assert_eq!(tree.get::<u16>("server.port").unwrap(), 80);
    assert!(!tree.get::<bool>("debug").unwrap());
    assert_eq!(tree.get::<Vec<String>>("tags").unwrap(), vec!["a", "b"]);
}

#[test]
fn test_get_sequence_element() {
    let tree = sample();
    assert_eq!(tree.get::<String>("tags.1").unwrap(), "b");
}

#[test]
fn test_unknown_key_reads_as_null() {
    let tree = sample();
    assert_eq!(tree.get_value("no.such.key").unwrap(), Value::Null);
    assert_eq!(tree.get_optional::<i64>("no.such.key").unwrap(), None);
    assert_eq!(tree.get_or("no.such.key", 7), 7);
    assert!(!tree.has("no.such.key"));
    assert!(tree.has("server.port"));
}

#[test]
fn test_missing_sentinel_fails_reads() {
    let tree = ConfigTree::from_json(&json!({"token": "???"}));
    assert!(matches!(
        tree.get_value("token").unwrap_err(),
        StrataError::MissingValue { .. }
    ));
    assert!(!tree.has("token"));
    // Raw access still sees the stored sentinel.
    assert!(tree.raw("token").unwrap().is_missing());
}

#[test]
fn test_set_creates_intermediate_mappings() {
    let mut tree = ConfigTree::new();
    tree.set("a.b.c", 10).unwrap();
    assert_eq!(tree.get::<i64>("a.b.c").unwrap(), 10);
    assert_eq!(tree.get_keys("a").unwrap(), vec!["b"]);
}

#[test]
fn test_set_overwrites_in_place() {
    let mut tree = sample();
    tree.set("server.port", 8080).unwrap();
    assert_eq!(tree.get::<i64>("server.port").unwrap(), 8080);
    // Key order is unchanged by overwrite.
    assert_eq!(tree.get_keys("server").unwrap(), vec!["host", "port"]);
}

#[test]
fn test_set_replaces_scalar_with_mapping() {
    let mut tree = ConfigTree::from_json(&json!({"a": 1}));
    tree.set("a.b", 2).unwrap();
    assert_eq!(tree.get::<i64>("a.b").unwrap(), 2);
}

#[test]
fn test_remove() {
    let mut tree = sample();
    tree.remove("server.host").unwrap();
    assert_eq!(tree.get_keys("server").unwrap(), vec!["port"]);
    assert!(matches!(
        tree.remove("server.host").unwrap_err(),
        StrataError::PathNotFound { .. }
    ));

    tree.remove("tags.0").unwrap();
    assert_eq!(tree.get::<Vec<String>>("tags").unwrap(), vec!["b"]);
}

#[test]
fn test_remove_respects_read_only() {
    let mut tree = sample();
    tree.set_flag("server", Flag::ReadOnly, Some(true)).unwrap();
    assert!(matches!(
        tree.remove("server.port").unwrap_err(),
        StrataError::ReadOnly { .. }
    ));
}

#[test]
fn test_len_and_keys() {
    let tree = sample();
    assert_eq!(tree.len("").unwrap(), 3);
    assert_eq!(tree.len("tags").unwrap(), 2);
    assert_eq!(tree.get_keys("").unwrap(), vec!["server", "debug", "tags"]);
    assert!(tree.len("debug").is_err());
}

#[test]
fn test_view_shapes() {
    let tree = sample();
    assert_eq!(
        tree.view("server").unwrap(),
        NodeView::Mapping(vec!["host".into(), "port".into()])
    );
    assert_eq!(tree.view("tags").unwrap(), NodeView::Sequence(2));
    assert_eq!(
        tree.view("server.port").unwrap(),
        NodeView::Scalar(Scalar::Int(80))
    );
}

// -- Flags --

#[test]
fn test_read_only_inherits() {
    let mut tree = sample();
    tree.set_flag("", Flag::ReadOnly, Some(true)).unwrap();
    assert!(tree.flag("server.port", Flag::ReadOnly).unwrap());
    assert!(matches!(
        tree.set("server.port", 81).unwrap_err(),
        StrataError::ReadOnly { .. }
    ));
}

#[test]
fn test_child_flag_overrides_parent() {
    let mut tree = sample();
    tree.set_flag("", Flag::ReadOnly, Some(true)).unwrap();
    tree.set_flag("server", Flag::ReadOnly, Some(false)).unwrap();
    // The nearest explicit ancestor wins.
    tree.set("server.port", 81).unwrap();
    assert!(matches!(
        tree.set("debug", true).unwrap_err(),
        StrataError::ReadOnly { .. }
    ));

    // Clearing the override restores inheritance.
    tree.set_flag("server", Flag::ReadOnly, None).unwrap();
    assert!(tree.set("server.port", 82).is_err());
}

#[test]
fn test_struct_flag_closes_mapping() {
    let mut tree = ConfigTree::from_json(&json!({"a": {"aa": 10}}));
    tree.set_flag("", Flag::Struct, Some(true)).unwrap();
    assert_eq!(tree.get::<i64>("a.aa").unwrap(), 10);
    assert!(matches!(
        tree.set("a.bb", 1).unwrap_err(),
        StrataError::StructAccess { .. }
    ));
    // Struct violations fire on reads too.
    assert!(matches!(
        tree.get_value("a.bb").unwrap_err(),
        StrataError::StructAccess { .. }
    ));
}

#[test]
fn test_with_read_write_scope() {
    let mut tree = sample();
    tree.set_flag("", Flag::ReadOnly, Some(true)).unwrap();
    tree.with_read_write("", |t| t.set("debug", true)).unwrap();
    assert!(tree.get::<bool>("debug").unwrap());
    // Outside the scope the flag is back.
    assert!(tree.set("debug", false).is_err());
}

#[test]
fn test_scoped_override_restores_on_error() {
    let mut tree = ConfigTree::from_json(&json!({"a": {"aa": 10}}));
    tree.set_flag("", Flag::Struct, Some(true)).unwrap();
    let err = tree.with_open_struct("", |t| t.get::<String>("a.aa"));
    // The closure failed, and the root's own override was restored anyway.
    assert!(matches!(err.unwrap_err(), StrataError::TypeMismatch { .. }));
    assert!(tree.flag("", Flag::Struct).unwrap());
    assert!(tree.set("new_key", 1).is_err());
}

// -- Interpolation --

#[test]
fn test_node_reference_keeps_native_type() {
    let tree = ConfigTree::from_json(&json!({
        "server": {"port": 80},
        "client": {"server_port": "${server.port}"},
    }));
    assert_eq!(tree.get_value("client.server_port").unwrap(), Value::Int(80));
}

#[test]
fn test_mixed_interpolation_stringifies() {
    let tree = ConfigTree::from_json(&json!({
        "host": "example.com",
        "port": 80,
        "url": "http://${host}:${port}/",
    }));
    assert_eq!(
        tree.get::<String>("url").unwrap(),
        "http://example.com:80/"
    );
}

#[test]
fn test_interpolation_is_lazy() {
    let mut tree = ConfigTree::from_json(&json!({"greeting": "${name}!"}));
    // Forward reference: fine once the target exists.
    assert!(matches!(
        tree.get_value("greeting").unwrap_err(),
        StrataError::ReferenceNotFound { .. }
    ));
    tree.set("name", "world").unwrap();
    assert_eq!(tree.get::<String>("greeting").unwrap(), "world!");
    tree.set("name", "tree").unwrap();
    assert_eq!(tree.get::<String>("greeting").unwrap(), "tree!");
}

#[test]
fn test_interpolation_cycle_detected() {
    let tree = ConfigTree::from_json(&json!({"a": "${b}", "b": "${a}"}));
    assert!(matches!(
        tree.get_value("a").unwrap_err(),
        StrataError::InterpolationCycle { .. }
    ));

    let direct = ConfigTree::from_json(&json!({"a": "${a}"}));
    assert!(matches!(
        direct.get_value("a").unwrap_err(),
        StrataError::InterpolationCycle { .. }
    ));
}

#[test]
fn test_interpolation_through_chain() {
    let tree = ConfigTree::from_json(&json!({
        "a": "${b}",
        "b": "${c}",
        "c": 42,
    }));
    assert_eq!(tree.get::<i64>("a").unwrap(), 42);
}

#[test]
fn test_custom_resolver_in_tree() {
    fn join(args: &[String]) -> Result<Value, String> {
        Ok(Value::String(args.join("-")))
    }
    register_resolver("join_segments", join).unwrap();
    let tree = ConfigTree::from_json(&json!({"id": "${join_segments:a, b, c}"}));
    assert_eq!(tree.get::<String>("id").unwrap(), "a-b-c");
}

#[test]
fn test_unknown_resolver() {
    let tree = ConfigTree::from_json(&json!({"x": "${no_such_resolver:1}"}));
    assert!(matches!(
        tree.get_value("x").unwrap_err(),
        StrataError::UnknownResolver { .. }
    ));
}

#[test]
fn test_container_substitution_into_text_fails() {
    let tree = ConfigTree::from_json(&json!({
        "server": {"port": 80},
        "text": "all: ${server}",
    }));
    assert!(matches!(
        tree.get_value("text").unwrap_err(),
        StrataError::TypeMismatch { .. }
    ));
}

#[test]
fn test_list_declared_expression_checked_on_resolve() {
    let mut tree = ConfigTree::structured(
        &Schema::new("S")
            .field(Field::value("src", TypeKind::Str).default("hello"))
            .field(Field::list("xs", TypeKind::Int)),
    )
    .unwrap();
    // Assignment accepts the expression; the declared type bites on read.
    tree.set("xs", "${src}").unwrap();
    assert!(matches!(
        tree.get_value("xs").unwrap_err(),
        StrataError::TypeMismatch { .. }
    ));
}

#[test]
fn test_list_declared_expression_converts_elements() {
    let mut tree = ConfigTree::structured(
        &Schema::new("S")
            .field(Field::list("raw", TypeKind::Any).default(Value::Array(vec![
                Value::String("1".into()),
                Value::Int(2),
            ])))
            .field(Field::list("xs", TypeKind::Int)),
    )
    .unwrap();
    tree.set("xs", "${raw}").unwrap();
    assert_eq!(tree.get::<Vec<i64>>("xs").unwrap(), vec![1, 2]);
}

#[test]
fn test_dict_declared_expression_checked_on_resolve() {
    let mut tree = ConfigTree::structured(
        &Schema::new("S")
            .field(Field::value("name", TypeKind::Str).default("app"))
            .field(Field::dict("limits", TypeKind::Int)),
    )
    .unwrap();
    tree.set("limits", "${name}").unwrap();
    assert!(matches!(
        tree.get_value("limits").unwrap_err(),
        StrataError::TypeMismatch { .. }
    ));
}

// -- Merge --

#[test]
fn test_merge_union_preserves_order() {
    let base = ConfigTree::from_json(&json!({"a": 1, "b": 2}));
    let over = ConfigTree::from_json(&json!({"b": 20, "c": 3}));
    let merged = base.merge_with(&[&over]).unwrap();
    assert_eq!(merged.get_keys("").unwrap(), vec!["a", "b", "c"]);
    assert_eq!(merged.get::<i64>("b").unwrap(), 20);
    assert_eq!(
        merged.to_plain(false).unwrap(),
        json!({"a": 1, "b": 20, "c": 3})
    );
}

#[test]
fn test_merge_recurses_into_mappings() {
    let base = ConfigTree::from_json(&json!({"server": {"host": "a", "port": 80}}));
    let over = ConfigTree::from_json(&json!({"server": {"port": 8080}}));
    let merged = merge(&[&base, &over]).unwrap();
    assert_eq!(
        merged.to_plain(false).unwrap(),
        json!({"server": {"host": "a", "port": 8080}})
    );
}

#[test]
fn test_merge_replaces_sequences_wholesale() {
    let base = ConfigTree::from_json(&json!({"xs": [1, 2, 3]}));
    let over = ConfigTree::from_json(&json!({"xs": [9]}));
    let merged = base.merge_with(&[&over]).unwrap();
    assert_eq!(merged.get::<Vec<i64>>("xs").unwrap(), vec![9]);
}

#[test]
fn test_merge_leaves_inputs_untouched() {
    let base = ConfigTree::from_json(&json!({"a": 1}));
    let over = ConfigTree::from_json(&json!({"a": 2, "b": 3}));
    let mut merged = base.merge_with(&[&over]).unwrap();
    merged.set("a", 99).unwrap();
    assert_eq!(base.to_plain(false).unwrap(), json!({"a": 1}));
    assert_eq!(over.to_plain(false).unwrap(), json!({"a": 2, "b": 3}));
}

#[test]
fn test_merge_idempotent() {
    let base = ConfigTree::from_json(&json!({"a": {"x": 1}, "b": 2}));
    let over = ConfigTree::from_json(&json!({"a": {"y": 2}, "c": [1, 2]}));
    let once = base.merge_with(&[&over]).unwrap();
    let twice = once.merge_with(&[&over]).unwrap();
    assert_eq!(once.to_plain(false).unwrap(), twice.to_plain(false).unwrap());
}

#[test]
fn test_merge_chain_last_wins() {
    let a = ConfigTree::from_json(&json!({"x": 1}));
    let b = ConfigTree::from_json(&json!({"x": 2}));
    let c = ConfigTree::from_json(&json!({"x": 3}));
    let merged = merge(&[&a, &b, &c]).unwrap();
    assert_eq!(merged.get::<i64>("x").unwrap(), 3);

    assert_eq!(merge(&[]).unwrap().to_plain(false).unwrap(), json!({}));
}

#[test]
fn test_merge_fills_missing_with_conversion() {
    let base = ConfigTree::structured(
        &Schema::new("S").field(Field::value("port", TypeKind::Int)),
    )
    .unwrap();
    let over = ConfigTree::from_json(&json!({"port": "8080"}));
    let merged = base.merge_with(&[&over]).unwrap();
    assert_eq!(merged.get::<i64>("port").unwrap(), 8080);
}

#[test]
fn test_merge_conflict_on_declared_type() {
    let base = ConfigTree::structured(
        &Schema::new("S").field(Field::value("port", TypeKind::Int).default(80)),
    )
    .unwrap();
    let over = ConfigTree::from_json(&json!({"port": "http"}));
    assert!(matches!(
        base.merge_with(&[&over]).unwrap_err(),
        StrataError::MergeConflict { .. }
    ));
}

#[test]
fn test_merge_override_missing_replaces() {
    let base = ConfigTree::from_json(&json!({"a": 1}));
    let over = ConfigTree::from_json(&json!({"a": "???"}));
    let merged = base.merge_with(&[&over]).unwrap();
    assert!(matches!(
        merged.get_value("a").unwrap_err(),
        StrataError::MissingValue { .. }
    ));
    assert_eq!(merged.to_plain(false).unwrap(), json!({"a": "???"}));
}

#[test]
fn test_merge_read_only_base_fails() {
    let mut base = ConfigTree::from_json(&json!({"a": 1}));
    base.set_flag("", Flag::ReadOnly, Some(true)).unwrap();
    let over = ConfigTree::from_json(&json!({"a": 2}));
    assert!(matches!(
        base.merge_with(&[&over]).unwrap_err(),
        StrataError::ReadOnly { .. }
    ));
}

#[test]
fn test_merge_keeps_expressions_unresolved() {
    let base = ConfigTree::from_json(&json!({"host": "a", "url": "${host}"}));
    let over = ConfigTree::from_json(&json!({"host": "b"}));
    let merged = base.merge_with(&[&over]).unwrap();
    // Resolution happens against the merged tree, never the inputs.
    assert_eq!(merged.get::<String>("url").unwrap(), "b");
}

#[test]
fn test_merge_schema_struct_survives() {
    let base = ConfigTree::structured(
        &Schema::new("S").field(Field::value("known", TypeKind::Int).default(1)),
    )
    .unwrap();
    let over = ConfigTree::from_json(&json!({"known": 2}));
    let mut merged = base.merge_with(&[&over]).unwrap();
    assert_eq!(merged.get::<i64>("known").unwrap(), 2);
    assert!(matches!(
        merged.set("unknown", 3).unwrap_err(),
        StrataError::StructAccess { .. }
    ));
}

// -- Dotlist --

#[test]
fn test_from_dotlist_decodes_primitives() {
    let tree =
        ConfigTree::from_dotlist(&["server.port=8080", "debug=true", "name=app", "opt"]).unwrap();
    assert_eq!(tree.get::<i64>("server.port").unwrap(), 8080);
    assert!(tree.get::<bool>("debug").unwrap());
    assert_eq!(tree.get::<String>("name").unwrap(), "app");
    assert_eq!(tree.get_value("opt").unwrap(), Value::Null);
}

#[test]
fn test_merge_dotlist_enforces_declared_types() {
    let mut tree = ConfigTree::structured(
        &Schema::new("S").field(Field::value("port", TypeKind::Int).default(80)),
    )
    .unwrap();
    tree.merge_dotlist(&["port=9090"]).unwrap();
    assert_eq!(tree.get::<i64>("port").unwrap(), 9090);
    assert!(tree.merge_dotlist(&["port=fast"]).is_err());
}

#[test]
fn test_dotlist_later_entries_win() {
    let tree = ConfigTree::from_dotlist(&["x=1", "x=2"]).unwrap();
    assert_eq!(tree.get::<i64>("x").unwrap(), 2);
}

// -- Plain conversion --

#[test]
fn test_json_round_trip() {
    let source = json!({
        "server": {"host": "example.com", "port": 80},
        "flags": [true, false],
        "ratio": 1.5,
        "nothing": null,
    });
    let tree = ConfigTree::from_json(&source);
    assert_eq!(tree.to_plain(false).unwrap(), source);
    // Without expressions, resolution changes nothing.
    assert_eq!(tree.to_plain(true).unwrap(), source);
}

#[test]
fn test_to_plain_raw_keeps_stored_forms() {
    let tree = ConfigTree::from_json(&json!({
        "port": 80,
        "alias": "${port}",
        "token": "???",
    }));
    assert_eq!(
        tree.to_plain(false).unwrap(),
        json!({"port": 80, "alias": "${port}", "token": "???"})
    );
}

#[test]
fn test_to_plain_resolved() {
    let tree = ConfigTree::from_json(&json!({
        "port": 80,
        "alias": "${port}",
        "token": "???",
    }));
    // Expressions resolve; the sentinel stays dumpable.
    assert_eq!(
        tree.to_plain(true).unwrap(),
        json!({"port": 80, "alias": 80, "token": "???"})
    );
}

#[test]
fn test_to_plain_resolved_propagates_failure() {
    let tree = ConfigTree::from_json(&json!({"x": "${gone}"}));
    assert!(tree.to_plain(true).is_err());
}
