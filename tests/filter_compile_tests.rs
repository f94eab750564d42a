//! Flat filter compilation: operator shapes, naming, and input errors

use docql_core::value::{GeoPoint, Pointer, Value};
use docql_operators::{standard_registry, OpError, OperatorStrategy, OperatorTag, StrategyKind};
use docql_planner::{CompoundConstraint, Constraint, PlanError, Query};
use serde_json::{json, Value as Json};

fn where_of(constraints: Vec<Constraint>) -> Json {
    let mut q = Query::new("Thing");
    q.where_all(constraints);
    let body = q.compile().expect("compile").to_json().expect("json");
    body["where"].clone()
}

fn one(field: &str, op: OperatorTag, value: impl Into<Value>) -> Json {
    where_of(vec![Constraint::new(field, op, value).expect("valid constraint")])
}

#[test]
fn test_comparison_shapes() {
    assert_eq!(one("age", OperatorTag::Gt, 18), json!({ "age": { "$gt": 18 } }));
    assert_eq!(one("age", OperatorTag::Lte, 65), json!({ "age": { "$lte": 65 } }));
    assert_eq!(one("state", OperatorTag::Ne, "closed"), json!({ "state": { "$ne": "closed" } }));
    assert_eq!(
        one("tags", OperatorTag::In, vec!["a", "b"]),
        json!({ "tags": { "$in": ["a", "b"] } })
    );
    assert_eq!(one("tags", OperatorTag::Nin, "x"), json!({ "tags": { "$nin": ["x"] } }));
    assert_eq!(
        one("tags", OperatorTag::All, vec!["a", "b"]),
        json!({ "tags": { "$all": ["a", "b"] } })
    );
    assert_eq!(one("tags", OperatorTag::Size, 3), json!({ "tags": { "$size": 3 } }));
    assert_eq!(one("email", OperatorTag::Exists, true), json!({ "email": { "$exists": true } }));
}

#[test]
fn test_field_names_are_camel_cased() {
    assert_eq!(
        one("first_name", OperatorTag::Eq, "Ada"),
        json!({ "firstName": "Ada" })
    );
    assert_eq!(one("id", OperatorTag::Eq, "abc"), json!({ "objectId": "abc" }));
    assert_eq!(
        one("created_at", OperatorTag::Exists, true),
        json!({ "createdAt": { "$exists": true } })
    );
}

#[test]
fn test_between_compiles_to_closed_range() {
    let c = Constraint::between("score", 10, 20).expect("between");
    assert_eq!(
        where_of(vec![c]),
        json!({ "score": { "$gte": 10, "$lte": 20 } })
    );
}

#[test]
fn test_between_rejects_wrong_arity() {
    let inputs: Vec<Value> = vec![
        Value::from(vec![1]),
        Value::from(vec![1, 2, 3]),
        Value::from(5),
    ];
    for value in inputs {
        let err = Constraint::new("score", OperatorTag::Between, value).unwrap_err();
        assert!(err.is_argument(), "expected ArgumentError, got {err}");
        assert!(err.to_string().starts_with("ArgumentError"));
    }
}

#[test]
fn test_regex_and_like_alias() {
    assert_eq!(
        one("title", OperatorTag::Regex, "^Hello"),
        json!({ "title": { "$regex": "^Hello" } })
    );
    let like = Constraint::parse(
        "title",
        "like",
        docql_core::value::object([("pattern", "world"), ("options", "i")]),
    )
    .expect("like");
    assert_eq!(like.operator(), OperatorTag::Regex);
    assert_eq!(
        where_of(vec![like]),
        json!({ "title": { "$regex": "world", "$options": "i" } })
    );
}

#[test]
fn test_regex_rejects_unknown_option() {
    let err = Constraint::new(
        "title",
        OperatorTag::Regex,
        docql_core::value::object([("pattern", "x"), ("options", "g")]),
    )
    .unwrap_err();
    assert!(err.is_argument());
}

#[test]
fn test_starts_with_escapes_metacharacters() {
    assert_eq!(
        one("path", OperatorTag::StartsWith, "a.b(c)"),
        json!({ "path": { "$regex": "^a\\.b\\(c\\)" } })
    );
}

#[test]
fn test_geo_operators() {
    let here = GeoPoint::new(40.0, -30.0);
    let rest_point = json!({ "__type": "GeoPoint", "latitude": 40.0, "longitude": -30.0 });

    assert_eq!(one("location", OperatorTag::Near, here), json!({ "location": { "$near": rest_point } }));
    assert_eq!(
        one("location", OperatorTag::WithinMiles, vec![40.0, -30.0, 10.0]),
        json!({ "location": { "$near": rest_point, "$maxDistanceInMiles": 10.0 } })
    );
    assert_eq!(
        one(
            "location",
            OperatorTag::WithinBox,
            vec![Value::from(vec![10.0, 10.0]), Value::from(vec![20.0, 20.0])]
        ),
        json!({ "location": { "$within": { "$box": [
            { "__type": "GeoPoint", "latitude": 10.0, "longitude": 10.0 },
            { "__type": "GeoPoint", "latitude": 20.0, "longitude": 20.0 }
        ] } } })
    );
}

#[test]
fn test_geo_rejects_out_of_range() {
    let err = Constraint::new("location", OperatorTag::Near, vec![120.0, 0.0]).unwrap_err();
    assert!(err.is_argument());
}

#[test]
fn test_pointer_value_uses_rest_envelope() {
    assert_eq!(
        one("author", OperatorTag::Eq, Pointer::new("_User", "u1")),
        json!({ "author": { "__type": "Pointer", "className": "_User", "objectId": "u1" } })
    );
}

#[test]
fn test_elem_match_and_subqueries() {
    assert_eq!(
        one(
            "comments",
            OperatorTag::ElemMatch,
            docql_core::value::object([("approved", true)])
        ),
        json!({ "comments": { "$elemMatch": { "approved": true } } })
    );

    let mut topics = Query::new("Topic");
    topics.where_(Constraint::eq("archived", false).expect("eq"));
    let sub = topics.to_subquery().expect("subquery");

    assert_eq!(
        one("topic", OperatorTag::InQuery, sub.clone()),
        json!({ "topic": { "$inQuery": { "className": "Topic", "where": { "archived": false } } } })
    );
    assert_eq!(
        one(
            "owner_id",
            OperatorTag::Select,
            docql_core::value::object([("key", Value::from("user_id")), ("query", Value::from(sub))])
        ),
        json!({ "ownerId": { "$select": {
            "query": { "className": "Topic", "where": { "archived": false } },
            "key": "userId"
        } } })
    );
}

#[test]
fn test_equal_keys_collide_into_and() {
    let compiled = where_of(vec![
        Constraint::eq("status", "a").expect("eq"),
        Constraint::eq("status", "b").expect("eq"),
    ]);
    assert_eq!(compiled, json!({ "status": "a", "$and": [ { "status": "b" } ] }));
}

#[test]
fn test_nested_compound_inside_and() {
    let either = CompoundConstraint::or([
        Constraint::eq("kind", "bug").expect("eq"),
        Constraint::eq("kind", "task").expect("eq"),
    ]);
    let mut q = Query::new("Issue");
    q.where_(Constraint::new("priority", OperatorTag::Gte, 2).expect("gte"))
        .where_(either);
    let body = q.compile().expect("compile").to_json().expect("json");
    assert_eq!(
        body["where"],
        json!({
            "priority": { "$gte": 2 },
            "$or": [ { "kind": "bug" }, { "kind": "task" } ]
        })
    );
}

#[test]
fn test_unknown_operator_is_hard_error() {
    let err = Constraint::parse("x", "fuzzy_match", 1).unwrap_err();
    assert!(matches!(err, PlanError::InvalidOperator(ref tag) if tag == "fuzzy_match"));
    assert!(err.to_string().contains("Unknown operator"));

    let lookup = standard_registry().lookup("fuzzy_match");
    assert!(matches!(lookup, Err(OpError::InvalidOperator(_))));
}

#[test]
fn test_every_tag_is_registered() {
    let registry = standard_registry();
    assert_eq!(registry.len(), OperatorTag::ALL.len());
    for tag in OperatorTag::ALL.iter() {
        let strategy = registry.get(*tag).expect("registered");
        assert_eq!(strategy.tag(), *tag);
        let parsed: OperatorTag = tag.as_str().parse().expect("round trip");
        assert_eq!(parsed, *tag);
    }
    assert_eq!(registry.kind_of(OperatorTag::Gt).expect("kind"), StrategyKind::Direct);
    assert_eq!(
        registry.kind_of(OperatorTag::EqualsLinkedPointer).expect("kind"),
        StrategyKind::PipelineOnly
    );
}

#[test]
fn test_subquery_rejected_for_plain_comparison() {
    let sub = Query::new("Topic").to_subquery().expect("subquery");
    let err = Constraint::new("topic", OperatorTag::Eq, sub).unwrap_err();
    assert!(err.is_argument());
}
