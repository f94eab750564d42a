//! YAML query description tests

use docql_core::config::CompilerConfig;
use docql_core::document::StageKind;
use docql_operators::OperatorTag;
use docql_planner::{parse_yaml_query, PlanError};
use serde_json::json;

#[test]
fn test_parse_flat_query() {
    let yaml = r#"
table: Post
where:
  - { field: likes, op: gt, value: 10 }
  - { field: title, op: like, value: "^Intro" }
  - or:
      - [ { field: status, op: eq, value: draft } ]
      - [ { field: status, op: eq, value: review } ]
order: [ "-created_at", "title" ]
keys: [ title ]
limit: 20
skip: 5
"#;
    let parsed = parse_yaml_query(yaml).expect("parse");
    let query = parsed.query;
    assert_eq!(query.table(), "Post");
    assert_eq!(query.clauses().len(), 3);
    assert_eq!(query.constraints()[1].operator(), OperatorTag::Regex);

    let body = query.compile().expect("compile").to_json().expect("json");
    assert_eq!(
        body,
        json!({
            "where": {
                "likes": { "$gt": 10 },
                "title": { "$regex": "^Intro" },
                "$or": [ { "status": "draft" }, { "status": "review" } ]
            },
            "order": "-createdAt,title",
            "keys": "title",
            "limit": 20,
            "skip": 5
        })
    );
}

#[test]
fn test_parse_join_query_builds_pipeline() {
    let yaml = r#"
table: Task
where:
  - { field: done, op: eq, value: false }
  - field: author
    op: equals_linked_pointer
    value: { through: project, field: owner }
limit: 3
"#;
    let parsed = parse_yaml_query(yaml).expect("parse");
    let compiled = parsed.query.compile().expect("compile");
    let pipeline = compiled.pipeline().expect("pipeline");
    assert_eq!(
        pipeline.kinds(),
        vec![
            StageKind::Match,
            StageKind::AddFields,
            StageKind::Lookup,
            StageKind::Match,
            StageKind::Limit
        ]
    );
}

#[test]
fn test_nested_subquery_values() {
    let yaml = r#"
table: Post
where:
  - field: topic
    op: in_query
    value:
      table: Topic
      where: [ { field: archived, op: eq, value: false } ]
  - field: author_id
    op: reject
    value:
      key: user_id
      query: { table: Ban, where: [ { field: active, op: eq, value: true } ] }
"#;
    let parsed = parse_yaml_query(yaml).expect("parse");
    let body = parsed.query.compile().expect("compile").to_json().expect("json");
    assert_eq!(
        body["where"],
        json!({
            "topic": { "$inQuery": { "className": "Topic", "where": { "archived": false } } },
            "authorId": { "$dontSelect": {
                "query": { "className": "Ban", "where": { "active": true } },
                "key": "userId"
            } }
        })
    );
}

#[test]
fn test_config_block_overlays_defaults() {
    let yaml = r#"
table: Post
config: { max_pipeline_stages: 30, cache_by_default: false }
"#;
    let parsed = parse_yaml_query(yaml).expect("parse");
    let mut cfg = CompilerConfig::default();
    parsed.config.apply_to(&mut cfg);
    assert_eq!(cfg.max_pipeline_stages, 30);
    assert!(!cfg.cache_by_default);
    assert_eq!(cfg.max_depth, 10);
}

#[test]
fn test_unknown_operator_in_yaml() {
    let yaml = r#"
table: Post
where:
  - { field: likes, op: roughly, value: 10 }
"#;
    let err = parse_yaml_query(yaml).unwrap_err();
    assert!(matches!(err, PlanError::InvalidOperator(ref op) if op == "roughly"));
}

#[test]
fn test_between_arity_in_yaml() {
    let yaml = r#"
table: Post
where:
  - { field: score, op: between, value: [1, 2, 3] }
"#;
    let err = parse_yaml_query(yaml).unwrap_err();
    assert!(err.is_argument());
}

#[test]
fn test_empty_table_rejected() {
    let err = parse_yaml_query("table: \"\"\n").unwrap_err();
    assert!(matches!(err, PlanError::Dsl(_)));
}
