//! Pipeline validator and constraint translator policy tests

use docql_core::config::CompilerConfig;
use docql_core::naming::FieldTarget;
use docql_core::value::Value;
use docql_operators::{standard_registry, OperatorTag};
use docql_planner::compile::compile_filter;
use docql_planner::{Constraint, Query};
use docql_sandbox::{
    ConstraintTranslator, PipelineValidator, Reason, SandboxError, SandboxPolicy,
};
use serde_json::{json, Value as Json};

fn nested_object(levels: usize) -> Json {
    let mut doc = json!("leaf");
    for _ in 0..levels {
        doc = json!({ "a": doc });
    }
    doc
}

#[test]
fn test_out_stage_is_security_violation() {
    let v = PipelineValidator::default();
    let err = v.validate(&json!([{ "$out": "x" }])).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("SECURITY"), "{msg}");
    assert!(msg.contains("$out"), "{msg}");
    assert_eq!(err.operator(), Some("$out"));
    assert_eq!(err.reason(), Some(Reason::CodeExecution));
    assert!(!v.is_valid(&json!([{ "$out": "x" }])));
}

#[test]
fn test_out_nested_in_facet_is_caught() {
    let v = PipelineValidator::default();
    let shallow = json!([
        { "$match": { "a": 1 } },
        { "$facet": { "dump": [ { "$out": "x" } ] } }
    ]);
    let deep = json!([
        { "$facet": { "outer": [
            { "$facet": { "inner": [
                { "$match": {} },
                { "$out": "stolen" }
            ] } }
        ] } }
    ]);
    for pipeline in [shallow, deep] {
        let err = v.validate(&pipeline).unwrap_err();
        assert!(err.is_security());
        assert!(err.to_string().contains("SECURITY"));
        assert!(err.to_string().contains("$out"));
    }
}

#[test]
fn test_code_execution_constructs_at_any_depth() {
    let v = PipelineValidator::default();
    let cases = [
        json!([{ "$merge": { "into": "other" } }]),
        json!([{ "$match": { "$where": "this.a > 1" } }]),
        json!([{ "$group": { "_id": null, "x": { "$accumulator": {} } } }]),
        json!([{ "$addFields": { "y": { "$cond": [ true, { "$function": {} }, 0 ] } } }]),
        json!([{ "$lookup": { "from": "B", "as": "b", "pipeline": [ { "$merge": "c" } ] } }]),
    ];
    for pipeline in cases {
        let err = v.validate(&pipeline).unwrap_err();
        assert!(err.is_security(), "expected security error for {pipeline}, got {err}");
    }
}

#[test]
fn test_unknown_stage_is_distinct_from_denied() {
    let v = PipelineValidator::default();
    let err = v.validate(&json!([{ "$graphLookup": {} }])).unwrap_err();
    assert!(matches!(err, SandboxError::UnknownStage { .. }));
    assert!(err.to_string().contains("Unknown stage"));
    assert!(!err.is_security());

    let err = v
        .validate(&json!([{ "$project": { "x": { "$zip": {} } } }]))
        .unwrap_err();
    assert!(matches!(err, SandboxError::UnknownOperator { .. }));
    assert!(err.to_string().contains("Unknown"));
    assert_eq!(err.reason(), Some(Reason::UnknownOperator));
}

#[test]
fn test_stage_count_ceiling() {
    let v = PipelineValidator::default();
    let stages: Vec<Json> = (0..25).map(|i| json!({ "$match": { "n": i } })).collect();
    let err = v.validate(&Json::Array(stages)).unwrap_err();
    assert!(matches!(err, SandboxError::StageLimitExceeded { count: 25, max: 20 }));
    assert!(err.to_string().contains("stages"));

    let ok: Vec<Json> = (0..20).map(|i| json!({ "$match": { "n": i } })).collect();
    assert!(v.is_valid(&Json::Array(ok)));
}

#[test]
fn test_stage_count_checked_before_content() {
    let v = PipelineValidator::new(SandboxPolicy::with_limits(2, 10));
    let err = v
        .validate(&json!([{ "$match": {} }, { "$match": {} }, { "$out": "x" }]))
        .unwrap_err();
    assert!(matches!(err, SandboxError::StageLimitExceeded { .. }));
}

#[test]
fn test_lookup_sub_pipeline_counts_stages() {
    let v = PipelineValidator::new(SandboxPolicy::with_limits(3, 10));
    let p = json!([
        { "$lookup": { "from": "B", "as": "b", "pipeline": [
            { "$match": {} }, { "$limit": 1 }, { "$skip": 1 }
        ] } }
    ]);
    assert!(matches!(
        v.validate(&p).unwrap_err(),
        SandboxError::StageLimitExceeded { count: 4, max: 3 }
    ));
}

#[test]
fn test_pipeline_depth_ceiling() {
    let v = PipelineValidator::default();
    let err = v
        .validate(&json!([{ "$match": nested_object(15) }]))
        .unwrap_err();
    assert!(matches!(err, SandboxError::DepthExceeded { max: 10, .. }));
    assert!(err.to_string().contains("depth"));
    assert!(v.is_valid(&json!([{ "$match": nested_object(5) }])));
}

#[test]
fn test_empty_or_non_array_pipeline_rejected() {
    let v = PipelineValidator::default();
    for bad in [json!([]), json!({ "$match": {} }), json!("[]"), Json::Null] {
        let err = v.validate(&bad).unwrap_err();
        assert!(matches!(err, SandboxError::InvalidPipeline(_)), "{bad}");
        assert!(!v.is_valid(&bad));
    }
}

#[test]
fn test_compiled_pipelines_pass_default_policy() {
    let mut q = Query::new("Task");
    q.where_(Constraint::eq("status", "open").expect("eq"))
        .where_(Constraint::equals_linked_pointer("author", "project", "owner").expect("join"))
        .where_(Constraint::new("tags", OperatorTag::SupersetOf, vec!["x"]).expect("superset"))
        .where_(Constraint::new("step", OperatorTag::CountDistinct, true).expect("count"))
        .where_(
            Constraint::new(
                "created_at",
                OperatorTag::Gt,
                Value::Date("2024-01-01T00:00:00.000Z".into()),
            )
            .expect("date"),
        )
        .limit(5);
    let compiled = q.compile().expect("compile");
    let pipeline = compiled.pipeline().expect("pipeline");
    assert_eq!(
        pipeline.to_json()[0]["$match"]["_created_at"],
        json!({ "$gt": { "$date": "2024-01-01T00:00:00.000Z" } })
    );
    PipelineValidator::default()
        .validate_pipeline(pipeline)
        .expect("compiler output is within policy");
}

#[test]
fn test_date_envelope_must_be_exact() {
    let v = PipelineValidator::default();
    assert!(v.is_valid(&json!([{ "$match": { "due": { "$lt": { "$date": "2024-05-01" } } } }])));

    let extra = v
        .validate(&json!([{ "$match": { "due": { "$date": "2024-05-01", "$gt": 1 } } }]))
        .unwrap_err();
    assert!(matches!(extra, SandboxError::UnknownOperator { ref operator, .. } if operator == "$date"));
    assert!(!v.is_valid(&json!([{ "$match": { "due": { "$date": { "$where": "x" } } } }])));
}

#[test]
fn test_field_named_pipeline_is_plain_data() {
    let v = PipelineValidator::default();
    v.validate(&json!([{ "$match": { "pipeline": ["etl", "ingest"] } }]))
        .expect("a field called pipeline is not a sub-pipeline");
    v.validate(&json!([{ "$project": { "pipeline": [1, 2] } }]))
        .expect("projection value");

    let err = v
        .validate(&json!([{ "$lookup": {
            "from": "Job",
            "as": "jobs",
            "pipeline": [{ "$match": { "pipeline": ["etl"] } }, { "$sample": { "size": 1 } }]
        } }]))
        .unwrap_err();
    assert!(matches!(err, SandboxError::UnknownStage { ref stage, .. } if stage == "$sample"));
}

#[test]
fn test_policy_from_config() {
    let cfg = CompilerConfig {
        max_pipeline_stages: 2,
        ..CompilerConfig::default()
    };
    let v = PipelineValidator::from_config(&cfg);
    assert!(!v.is_valid(&json!([{ "$match": {} }, { "$limit": 1 }, { "$skip": 1 }])));
}

#[test]
fn test_allowing_extra_stage() {
    let policy = SandboxPolicy::default().allow_stage("$sample");
    let v = PipelineValidator::new(policy);
    assert!(v.is_valid(&json!([{ "$sample": { "size": 3 } }])));
}

#[test]
fn test_constraint_expr_injection_rejected() {
    let t = ConstraintTranslator::default();
    for doc in [
        json!({ "$expr": { "$eq": ["$a", "$b"] } }),
        json!({ "$or": [ { "a": 1 }, { "$where": "sleep(1000)" } ] }),
        json!({ "comments": { "$elemMatch": { "body": { "$function": {} } } } }),
    ] {
        let err = t.validate(&doc).unwrap_err();
        assert!(err.is_security(), "{doc}");
        assert!(err.to_string().contains("SECURITY"));
        assert!(!t.is_valid(&doc));
    }
}

#[test]
fn test_constraint_depth_ceiling() {
    let t = ConstraintTranslator::default();
    let err = t.validate(&nested_object(15)).unwrap_err();
    assert!(matches!(err, SandboxError::DepthExceeded { .. }));
    assert!(err.to_string().contains("depth"));
    assert_eq!(err.reason(), Some(Reason::DepthExceeded));
}

#[test]
fn test_constraint_unknown_operator() {
    let t = ConstraintTranslator::default();
    let err = t.validate(&json!({ "age": { "$between": [1, 2] } })).unwrap_err();
    assert!(matches!(err, SandboxError::UnknownOperator { .. }));
    assert!(!err.is_security());
}

#[test]
fn test_constraint_document_must_be_object() {
    let t = ConstraintTranslator::default();
    assert!(matches!(
        t.validate(&json!([1, 2])).unwrap_err(),
        SandboxError::InvalidConstraint(_)
    ));
}

#[test]
fn test_translate_round_trips_through_filter() {
    let t = ConstraintTranslator::default();
    let doc = json!({
        "status": "open",
        "age": { "$gte": 18, "$lt": 65 },
        "tags": { "$in": ["a", "b"] },
        "name": { "$regex": "^bo", "$options": "i" },
        "$or": [ { "kind": "bug" }, { "kind": "task", "urgent": true } ]
    });
    let clauses = t.translate(&doc).expect("translate");
    let filter = compile_filter(&clauses, standard_registry(), FieldTarget::Rest).expect("compile");
    assert_eq!(
        Json::Object(filter),
        json!({
            "status": "open",
            "age": { "$gte": 18, "$lt": 65 },
            "tags": { "$in": ["a", "b"] },
            "name": { "$regex": "^bo", "$options": "i" },
            "$or": [ { "kind": "bug" }, { "kind": "task", "urgent": true } ]
        })
    );
}

#[test]
fn test_translate_geo_and_pointer() {
    let t = ConstraintTranslator::default();
    let doc = json!({
        "owner": { "__type": "Pointer", "className": "_User", "objectId": "u1" },
        "location": { "$near": [40.0, -30.0], "$maxDistanceInKilometers": 5.0 }
    });
    let clauses = t.translate(&doc).expect("translate");
    let ops: Vec<OperatorTag> = clauses
        .iter()
        .flat_map(|c| c.constraints())
        .map(|c| c.operator())
        .collect();
    assert_eq!(ops, vec![OperatorTag::WithinKilometers, OperatorTag::Eq]);
}

#[test]
fn test_translate_rejects_bad_arity() {
    let t = ConstraintTranslator::default();
    let err = t.translate(&json!({ "tags": { "$size": -1 } })).unwrap_err();
    assert!(matches!(err, SandboxError::Translation(ref e) if e.is_argument()));
}
