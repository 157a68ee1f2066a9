mod common;

use common::{TableBackend, section};
use morph_test_bidir::engine::{RunConfig, run};
use morph_test_bidir::types::Relation;

#[test]
fn result_order_does_not_change_verdicts() {
    let corpus = vec![section(
        "Order",
        1,
        &[
            ("X+V", "a", Relation::GenerateOnly),
            ("X+V", "b", Relation::GenerateOnly),
        ],
    )];
    let forward = TableBackend::new().generate("X+V", &["a", "b", "c"]);
    let backward = TableBackend::new().generate("X+V", &["c", "b", "a"]);

    let one = run(&forward, corpus.clone(), &RunConfig::default()).unwrap();
    let two = run(&backward, corpus, &RunConfig::default()).unwrap();
    assert_eq!(one.totals, two.totals);
    for (x, y) in one.sections[0]
        .expectations
        .iter()
        .zip(&two.sections[0].expectations)
    {
        assert_eq!(x.passed(), y.passed());
        assert_eq!(x.generation.false_positives, vec!["c"]);
        assert_eq!(y.generation.false_positives, vec!["c"]);
    }
}

#[test]
fn duplicate_results_are_reported_once() {
    let corpus = vec![section("Dup", 1, &[("X+V", "a", Relation::Bidirectional)])];
    let backend = TableBackend::new()
        .generate("X+V", &["a", "z", "z"])
        .analyze("a", &["X+V", "X+V"]);
    let result = run(&backend, corpus, &RunConfig::default()).unwrap();
    let e = &result.sections[0].expectations[0];
    assert_eq!(e.generation.results.len(), 2);
    assert_eq!(e.generation.false_positives, vec!["z"]);
    assert!(e.passed_analysis());
}
