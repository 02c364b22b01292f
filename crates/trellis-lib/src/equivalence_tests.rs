//! Semantic equivalence: executing the rewritten pipeline yields the same
//! terminal element multiset as interpreting the original pipeline step by
//! step over the same data.

use proptest::prelude::*;

use crate::support::{RefGraph, arb_pipeline, compiler, sample_backend};
use crate::{
    CompileError, Emit, Pipeline, Predicate, RuntimeError, SqlError, Traversal,
};

fn compiled_terminal_ids(pipeline: &Pipeline) -> Result<Vec<i64>, CompileError> {
    let compiled = compiler().compile(pipeline)?;
    let mut backend = sample_backend();
    let emits = compiled
        .execute(&mut backend)
        .collect::<Result<Vec<Emit>, RuntimeError>>()
        .expect("clean stream");
    Ok(emits.iter().map(|e| e.terminal().id()).collect())
}

/// Compare as multisets; a plan that fails with a guaranteed-absent column
/// corresponds to a filter no element can satisfy.
fn assert_equivalent(pipeline: &Pipeline) {
    let backend = sample_backend();
    let reference = RefGraph::from_backend(&backend);
    let mut expected = reference.eval(pipeline);
    expected.sort_unstable();

    match compiled_terminal_ids(pipeline) {
        Ok(mut actual) => {
            actual.sort_unstable();
            assert_eq!(actual, expected, "pipeline: {pipeline:?}");
        }
        Err(CompileError::Sql(SqlError::UnknownColumn { .. })) => {
            assert!(
                expected.is_empty(),
                "column miss must mean no element satisfies the filter: {pipeline:?}"
            );
        }
        Err(error) => panic!("unexpected compile error {error} for {pipeline:?}"),
    }
}

#[test]
fn seed_scenarios_are_equivalent() {
    let cases: Vec<Pipeline> = vec![
        Traversal::v().has("name", Predicate::eq("marko")).into_pipeline(),
        Traversal::v().has_between("age", 29, 35).into_pipeline(),
        Traversal::v()
            .has("name", Predicate::within(["marko", "josh"]))
            .into_pipeline(),
        Traversal::v()
            .has("name", Predicate::eq("marko"))
            .out(&["knows"])
            .has("age", Predicate::gt(30))
            .into_pipeline(),
        Traversal::v().has("name", Predicate::starts_with("mar")).into_pipeline(),
    ];
    for pipeline in &cases {
        assert_equivalent(pipeline);
    }
}

#[test]
fn navigation_shapes_are_equivalent() {
    let cases: Vec<Pipeline> = vec![
        Traversal::v().out(&["knows"]).into_pipeline(),
        Traversal::v().out(&[]).into_pipeline(),
        Traversal::v().in_(&["created"]).into_pipeline(),
        Traversal::v().both(&["knows"]).into_pipeline(),
        Traversal::v().both(&[]).into_pipeline(),
        Traversal::v().out_e(&["created"]).into_pipeline(),
        Traversal::v().out_e(&["knows"]).in_v().into_pipeline(),
        Traversal::e().into_pipeline(),
        Traversal::e().has("weight", Predicate::gte(0.5)).into_pipeline(),
        Traversal::v().out(&["knows"]).out(&["created"]).into_pipeline(),
    ];
    for pipeline in &cases {
        assert_equivalent(pipeline);
    }
}

#[test]
fn split_plans_are_equivalent_too() {
    let pipeline = Traversal::v()
        .out(&["knows"])
        .out(&["created"])
        .into_pipeline();

    let backend = sample_backend();
    let reference = RefGraph::from_backend(&backend);
    let mut expected = reference.eval(&pipeline);
    expected.sort_unstable();

    let compiler = compiler().with_config(crate::Config {
        max_joins_per_statement: Some(1),
        ..crate::Config::default()
    });
    let compiled = compiler.compile(&pipeline).expect("compilable");
    assert!(compiled.is_for_multiple_queries());

    let mut backend = sample_backend();
    let mut actual: Vec<i64> = compiled
        .execute(&mut backend)
        .collect::<Result<Vec<Emit>, RuntimeError>>()
        .expect("clean stream")
        .iter()
        .map(|e| e.terminal().id())
        .collect();
    actual.sort_unstable();
    assert_eq!(actual, expected);
}

proptest! {
    // Universal property: for every pipeline the rewriter accepts, the
    // compiled execution matches the reference interpreter.
    #[test]
    fn random_pipelines_are_equivalent(pipeline in arb_pipeline()) {
        assert_equivalent(&pipeline);
    }
}
