//! Query builder: cloning, combination, and compile routing

use std::sync::Arc;

use docql_core::value::Value;
use docql_exec::MemoryTransport;
use docql_operators::OperatorTag;
use docql_planner::{Clause, Combinator, Constraint, Direction, PlanError, Query};
use serde_json::json;

fn eq(field: &str, value: impl Into<Value>) -> Constraint {
    Constraint::eq(field, value).expect("valid constraint")
}

fn gt(field: &str, value: i64) -> Constraint {
    Constraint::new(field, OperatorTag::Gt, value).expect("valid constraint")
}

#[test]
fn test_clone_mutation_leaves_original_untouched() {
    let mut original = Query::new("Post");
    original.where_(eq("status", "open")).order("created_at", Direction::Desc);
    let before: Vec<Clause> = original.clauses().to_vec();

    let mut a = original.clone();
    let mut b = original.clone();
    a.where_(gt("likes", 10)).limit(5);
    b.where_(eq("author", "u1")).keys(["title"]);

    assert_eq!(original.clauses(), before.as_slice());
    assert_eq!(original.limit_value(), None);
    assert!(original.key_fields().is_empty());
    assert_eq!(a.clauses().len(), 2);
    assert_eq!(b.clauses().len(), 2);
    assert_ne!(a.clauses()[1], b.clauses()[1]);
    assert!(b.limit_value().is_none());
}

#[test]
fn test_clone_starts_unexecuted() {
    let mut q = Query::new("Post");
    q.bind(Arc::new(MemoryTransport::new()));
    q.store_results(vec![json!({ "objectId": "a" })]);
    assert!(q.is_executed());

    let copy = q.clone();
    assert!(!copy.is_executed());
    assert!(copy.client().is_none());
    assert_eq!(copy, q);
}

#[test]
fn test_mutation_invalidates_cached_results() {
    let mut q = Query::new("Post");
    q.store_results(vec![json!({})]);
    q.where_(eq("status", "open"));
    assert!(q.cached_results().is_none());
}

#[test]
fn test_and_concatenates_constraint_lists() {
    let mut q1 = Query::new("Post");
    q1.where_(eq("a", 1));
    let mut q2 = Query::new("Post");
    q2.where_(eq("b", 2)).where_(eq("c", 3));
    let mut q3 = Query::new("Post");
    q3.where_(gt("d", 4));

    let combined = Query::and(&[q1.clone(), q2.clone(), q3.clone()]).expect("and");
    assert_eq!(combined.clauses().len(), 4);
    assert_eq!(q1.clauses().len(), 1);
    assert_eq!(q2.clauses().len(), 2);
    assert_eq!(&combined.clauses()[1..3], q2.clauses());
}

#[test]
fn test_or_rejects_mixed_tables() {
    let mut posts = Query::new("Post");
    posts.where_(eq("a", 1));
    let mut users = Query::new("_User");
    users.where_(eq("a", 1));

    let err = Query::or(&[posts, users]).unwrap_err();
    assert!(matches!(err, PlanError::TableMismatch { .. }));
}

#[test]
fn test_or_skips_empty_inputs() {
    let mut filled = Query::new("Post");
    filled.where_(eq("status", "open")).where_(gt("likes", 3));
    let empty = Query::new("Post");

    let combined = Query::or(&[filled.clone(), empty]).expect("or");
    assert_eq!(combined.clauses(), filled.clauses());
}

#[test]
fn test_or_compiles_to_or_branches() {
    let mut a = Query::new("Post");
    a.where_(eq("status", "draft"));
    let mut b = Query::new("Post");
    b.where_(eq("status", "review"));

    let combined = Query::or(&[a, b]).expect("or");
    let body = combined.compile().expect("compile").to_json().expect("json");
    assert_eq!(
        body["where"],
        json!({ "$or": [ { "status": "draft" }, { "status": "review" } ] })
    );
}

#[test]
fn test_or_where_groups_existing_and_new() {
    let mut q = Query::new("Post");
    q.where_(eq("status", "open"));
    q.or_where(Vec::<Constraint>::new());
    assert_eq!(q.clauses().len(), 1, "empty or_where is a no-op");

    q.or_where([eq("pinned", true)]);
    assert_eq!(q.clauses().len(), 1);
    match &q.clauses()[0] {
        Clause::Compound(c) => {
            assert_eq!(c.combinator(), Combinator::Or);
            assert_eq!(c.clauses().len(), 2);
        }
        other => panic!("expected compound, got {:?}", other),
    }
}

#[test]
fn test_find_request_shape() {
    let mut q = Query::new("Post");
    q.where_(eq("status", "open"))
        .where_(gt("like_count", 10))
        .where_(Constraint::new("like_count", OperatorTag::Lt, 100).expect("lt"))
        .order("created_at", Direction::Desc)
        .order("title", Direction::Asc)
        .keys(["title", "author_name"])
        .include(["author"])
        .limit(20)
        .skip(40);

    assert!(!q.requires_pipeline().expect("scan"));
    let body = q.compile().expect("compile").to_json().expect("json");
    assert_eq!(
        body,
        json!({
            "where": {
                "status": "open",
                "likeCount": { "$gt": 10, "$lt": 100 }
            },
            "order": "-createdAt,title",
            "limit": 20,
            "skip": 40,
            "keys": "title,authorName",
            "include": "author"
        })
    );
}

#[test]
fn test_pipeline_only_operator_flags_query() {
    let mut q = Query::new("Task");
    q.where_(eq("done", false));
    assert!(!q.requires_pipeline().expect("scan"));

    q.where_(Constraint::new("tags", OperatorTag::SetEquals, vec!["a", "b"]).expect("set"));
    assert!(q.requires_pipeline().expect("scan"));
    assert!(q.compile().expect("compile").is_pipeline());
}

#[test]
fn test_fingerprint_is_stable_across_clones() {
    let mut q = Query::new("Post");
    q.where_(eq("status", "open")).limit(3);
    let a = q.compile().expect("compile").fingerprint().expect("fp");
    let b = q.clone().compile().expect("compile").fingerprint().expect("fp");
    assert_eq!(a, b);

    q.limit(4);
    let c = q.compile().expect("compile").fingerprint().expect("fp");
    assert_ne!(a, c);
}

#[test]
fn test_cached_results_respect_master_key_mode() {
    let mut q = Query::new("Post");
    q.store_results_with(vec![json!({ "objectId": "secret" })], true);
    assert!(q.cached_results_for(true).is_some());
    assert!(q.cached_results_for(false).is_none());

    q.use_master_key(true);
    assert!(!q.is_executed());
    q.store_results(vec![json!({})]);
    assert!(q.cached_results_for(true).is_some());
}
