//! End-to-end scenarios through the facade: compile against the sample
//! topology, execute against the in-memory backend.

use std::sync::Arc;

use trellis_core::CompilerConfig;

use crate::support::{compiler, sample_backend, topology};
use crate::{Compiler, Emit, Predicate, RuntimeError, TextMatch, Traversal, Value};

fn run(traversal: Traversal) -> Vec<Emit> {
    run_on(&compiler(), traversal)
}

fn run_on(compiler: &Compiler, traversal: Traversal) -> Vec<Emit> {
    let compiled = compiler
        .compile(&traversal.into_pipeline())
        .expect("compilable");
    let mut backend = sample_backend();
    compiled
        .execute(&mut backend)
        .collect::<Result<Vec<_>, RuntimeError>>()
        .expect("clean stream")
}

fn names(emits: &[Emit]) -> Vec<&str> {
    emits
        .iter()
        .map(|e| {
            e.terminal()
                .property("name")
                .and_then(Value::as_str)
                .expect("name property")
        })
        .collect()
}

#[test]
fn single_comparison() {
    let emits = run(Traversal::v().has("name", Predicate::eq("marko")));
    assert_eq!(names(&emits), ["marko"]);
}

#[test]
fn half_open_range() {
    let emits = run(Traversal::v().has_between("age", 29, 35));
    let mut result = names(&emits);
    result.sort();
    assert_eq!(result, ["josh", "marko"]);
}

#[test]
fn membership_inline_and_scratch_backed() {
    let traversal =
        || Traversal::v().has("name", Predicate::within(["marko", "josh"]));
    let inline = run(traversal());
    let mut inline_names = names(&inline);
    inline_names.sort();
    assert_eq!(inline_names, ["josh", "marko"]);

    let scratch_compiler = compiler().with_config(CompilerConfig {
        temp_table_threshold: 2,
        ..CompilerConfig::default()
    });
    let scratch = run_on(&scratch_compiler, traversal());
    let mut scratch_names = names(&scratch);
    scratch_names.sort();
    assert_eq!(scratch_names, ["josh", "marko"]);
}

#[test]
fn filtered_navigation_chain() {
    let emits = run(
        Traversal::v()
            .has("name", Predicate::eq("marko"))
            .out(&["knows"])
            .has("age", Predicate::gt(30)),
    );
    assert_eq!(names(&emits), ["josh"]);
    assert_eq!(emits[0].path.len(), 3);
}

#[test]
fn prefix_before_path_step_is_compiled() {
    let compiled = compiler()
        .compile(
            &Traversal::v()
                .as_("a")
                .out(&["knows"])
                .has("age", Predicate::gt(0.5))
                .path()
                .into_pipeline(),
        )
        .expect("compilable");
    // Folding stopped at path(); the prefix including the label survived.
    assert_eq!(compiled.replaced_steps().len(), 2);
    assert!(compiled.replaced_steps()[0].step_labels.contains("a"));
}

#[test]
fn text_predicate() {
    let emits = run(Traversal::v().has("name", Predicate::starts_with("mar")));
    assert_eq!(names(&emits), ["marko"]);

    let emits = run(Traversal::v().has(
        "name",
        Predicate::text(TextMatch::ContainsCi, "OSH"),
    ));
    assert_eq!(names(&emits), ["josh"]);
}

#[test]
fn multiple_query_hint_is_exposed_eagerly() {
    let compiled = compiler()
        .compile(&Traversal::v().has("name", Predicate::eq("marko")).into_pipeline())
        .expect("compilable");
    // `name` resolves on both sample tables.
    assert!(compiled.is_for_multiple_queries());
    assert_eq!(compiled.sql().len(), 2);
    assert!(!compiled.may_query_during_build());

    let single = compiler()
        .compile(
            &Traversal::v()
                .has_label("person")
                .has("name", Predicate::eq("marko"))
                .into_pipeline(),
        )
        .expect("compilable");
    assert!(!single.is_for_multiple_queries());
}

#[test]
fn replaced_steps_are_inspectable() {
    let compiled = compiler()
        .compile(
            &Traversal::v()
                .has("name", Predicate::eq("marko"))
                .out(&["knows"])
                .into_pipeline(),
        )
        .expect("compilable");
    let steps = compiled.replaced_steps();
    assert_eq!(steps.len(), 2);
    assert!(steps[0].is_source);
    let dump = compiled.replaced_step_tree().to_string();
    assert!(dump.contains("V()"), "{dump}");
}

#[test]
fn foreign_pipelines_do_not_compile() {
    let result = compiler().compile(&Traversal::foreign_v().into_pipeline());
    assert!(matches!(result, Err(crate::CompileError::NotCompilable)));
}

#[test]
fn catalog_growth_is_visible_after_commit() {
    let topology = topology();
    let compiler = Compiler::new(Arc::clone(&topology));

    let before = compiler
        .compile(&Traversal::v().into_pipeline())
        .expect("compilable");
    assert_eq!(before.sql().len(), 2);

    let mut writer = topology.begin_update();
    writer.ensure_vertex_label(
        "public",
        "dog",
        [("name".to_string(), trellis_core::ColumnType::Text)],
    );
    writer.commit();

    let after = compiler
        .compile(&Traversal::v().into_pipeline())
        .expect("compilable");
    assert_eq!(after.sql().len(), 3);
}
