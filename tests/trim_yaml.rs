mod common;

use anyhow::Result;
use common::TableBackend;
use morph_test_bidir::corpus::{BackendChoice, load_corpora, load_corpus};
use morph_test_bidir::engine::{RunConfig, run};
use morph_test_bidir::error::MorphTestError;
use morph_test_bidir::types::{ExitStatus, Relation};
use std::fs;
use tempfile::tempdir;

#[test]
fn trims_spaces_in_yaml_keys_and_values() -> Result<()> {
    let dir = tempdir()?;
    let file = dir.path().join("suite.yaml");
    let yaml = r#"
Config:
  hfst:
    Gen: gen.hfstol
    Morph: morph.hfstol
Tests:
  "Verb - sample ":
    "gæljodh+V+TV+Ind+Prs+Pl2   ":
      " <=> ": "   gæljoejidie "
    "foo+V":
      "=>": [ "bar  ", "  baz" ]
"#;
    fs::write(&file, yaml)?;
    let corpus = load_corpus(&file, BackendChoice::Auto)?;
    assert_eq!(corpus.sections.len(), 1);
    let section = &corpus.sections[0];
    assert_eq!(section.title, "Verb - sample");

    let e1 = &section.expectations[0];
    assert_eq!(e1.left, "gæljodh+V+TV+Ind+Prs+Pl2");
    assert_eq!(e1.right, "gæljoejidie");
    assert_eq!(e1.relation, Relation::Bidirectional);
    let rights: Vec<&str> = section.expectations[1..]
        .iter()
        .map(|e| e.right.as_str())
        .collect();
    assert_eq!(rights, vec!["bar", "baz"]);
    assert_eq!(
        corpus.transducers.gen_fst,
        Some(dir.path().join("gen.hfstol").to_string_lossy().into_owned())
    );

    let backend = TableBackend::new()
        .analyze("gæljoejidie", &["gæljodh+V+TV+Ind+Prs+Pl2"])
        .generate("gæljodh+V+TV+Ind+Prs+Pl2", &["gæljoejidie"])
        .generate("foo+V", &["bar", "baz"]);
    let result = run(&backend, corpus.sections, &RunConfig::default())?;
    assert_eq!(result.totals.fails(), 0);
    assert_eq!(result.exit_status, ExitStatus::Success);
    Ok(())
}

#[test]
fn lookup_results_are_not_trimmed() -> Result<()> {
    let dir = tempdir()?;
    let file = dir.path().join("suite.yml");
    fs::write(
        &file,
        "Tests:\n  S:\n    \"foo+V\":\n      \"<=>\": bar\n",
    )?;
    let corpus = load_corpus(&file, BackendChoice::Auto)?;
    let backend = TableBackend::new()
        .analyze("bar", &["foo+V "])
        .generate("foo+V", &["bar"]);
    let result = run(&backend, corpus.sections, &RunConfig::default())?;
    let e = &result.sections[0].expectations[0];
    assert!(!e.passed_analysis());
    assert_eq!(e.analysis.false_positives, vec!["foo+V "]);
    Ok(())
}

#[test]
fn directories_are_walked_for_yaml_files() -> Result<()> {
    let dir = tempdir()?;
    fs::create_dir(dir.path().join("nested"))?;
    let body = "Tests:\n  S:\n    \"a\":\n      \"<=>\": b\n";
    fs::write(dir.path().join("b.yaml"), body)?;
    fs::write(dir.path().join("nested").join("a.yml"), body)?;
    fs::write(dir.path().join("notes.txt"), "not a corpus")?;

    let corpora = load_corpora(&[dir.path().to_path_buf()], BackendChoice::Auto)?;
    let names: Vec<&str> = corpora.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["b.yaml", "a.yml"]);
    Ok(())
}

#[test]
fn bad_relation_token_is_a_corpus_error() -> Result<()> {
    let dir = tempdir()?;
    let file = dir.path().join("bad.yaml");
    fs::write(&file, "Tests:\n  S:\n    \"a\":\n      \"=\": b\n")?;
    let err = load_corpus(&file, BackendChoice::Auto).unwrap_err();
    assert!(matches!(err, MorphTestError::CorpusFormat { .. }));
    assert_eq!(err.exit_code(), 3);
    Ok(())
}
