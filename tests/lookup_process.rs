#![cfg(unix)]

mod common;

use common::section;
use morph_test_bidir::backend::{Backend, DEFAULT_TIMEOUT, ExternalBackend};
use morph_test_bidir::engine::{RunConfig, run};
use morph_test_bidir::engine_async::run_async;
use morph_test_bidir::pool::PooledBackend;
use morph_test_bidir::types::{Relation, Section, TriState};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const WORDS: usize = 40;

/// Writes a `sh` script that answers like `hfst-lookup`: one tab-separated
/// row per result and a blank line after every input.
fn lookup_script(dir: &Path, name: &str, table: &[(String, Vec<String>)]) -> PathBuf {
    let mut script = String::from("while IFS= read -r line; do\n  case \"$line\" in\n");
    for (input, outputs) in table {
        script.push_str(&format!("    '{input}')\n"));
        for output in outputs {
            script.push_str(&format!("      printf '%s\\t%s\\t0.000000\\n' '{input}' '{output}'\n"));
        }
        script.push_str("      ;;\n");
    }
    script.push_str("    *) printf '%s\\t%s+?\\tinf\\n' \"$line\" \"$line\" ;;\n  esac\n  printf '\\n'\ndone\n");
    let path = dir.join(name);
    std::fs::write(&path, script).unwrap();
    path
}

fn fixture(dir: &Path) -> (PathBuf, PathBuf, Vec<Section>) {
    let mut analyses = Vec::new();
    let mut generations = Vec::new();
    let mut tests = Vec::new();
    for i in 0..WORDS {
        analyses.push((format!("w{i}"), vec![format!("w{i}+N")]));
        generations.push((format!("w{i}+N"), vec![format!("w{i}")]));
        tests.push((format!("w{i}+N"), format!("w{i}"), Relation::Bidirectional));
    }
    // Padded analysis output, and a generator that yields an extra form.
    analyses.push(("pad".to_string(), vec!["pad+N ".to_string()]));
    generations.push(("pad+N".to_string(), vec!["pad".to_string()]));
    tests.push(("pad+N".to_string(), "pad".to_string(), Relation::Bidirectional));
    analyses.push(("dog".to_string(), vec!["dog+N".to_string()]));
    generations.push(("dog+N".to_string(), vec!["dog".to_string(), "doggo".to_string()]));
    tests.push(("dog+N".to_string(), "dog".to_string(), Relation::Bidirectional));

    let analyser = lookup_script(dir, "analyser.sh", &analyses);
    let generator = lookup_script(dir, "generator.sh", &generations);
    let borrowed: Vec<(&str, &str, Relation)> = tests
        .iter()
        .map(|(l, r, rel)| (l.as_str(), r.as_str(), *rel))
        .collect();
    let (first, second) = borrowed.split_at(WORDS / 2);
    let sections = vec![section("First", 1, first), section("Second", 2, second)];
    (analyser, generator, sections)
}

fn assert_verdicts(sections: &[Section]) {
    let all: Vec<_> = sections.iter().flat_map(|s| &s.expectations).collect();
    assert_eq!(all.len(), WORDS + 2);
    for e in &all[..WORDS] {
        assert!(e.passed(), "{e} should pass");
        assert_eq!(e.analysis.results.len(), 1);
    }

    let pad = all[WORDS];
    assert_eq!(pad.left, "pad+N");
    assert_eq!(pad.analysis.missing, TriState::True);
    assert_eq!(pad.analysis.false_positives, vec!["pad+N ".to_string()]);
    assert!(pad.passed_generation());

    let dog = all[WORDS + 1];
    assert!(dog.passed_analysis());
    assert_eq!(dog.generation.false_positives, vec!["doggo".to_string()]);
    assert!(!dog.passed_generation());
}

#[tokio::test]
async fn pooled_lookup_reads_one_block_per_input() {
    let dir = TempDir::new().unwrap();
    let (analyser, generator, sections) = fixture(dir.path());
    let backend = PooledBackend::new(
        "sh".to_string(),
        analyser.display().to_string(),
        generator.display().to_string(),
        true,
    )
    .unwrap();
    backend.validate().await.unwrap();

    let result = run_async(&backend, sections, &RunConfig::default()).await.unwrap();
    assert_verdicts(&result.sections);
    assert_eq!(result.totals.passes(), 2 * WORDS + 2);
    assert_eq!(result.totals.fails(), 2);
    assert_eq!(result.exit_status.code(), 1);

    // Pooled processes survive for a second run.
    let (_, _, again) = fixture(dir.path());
    let second = run_async(&backend, again, &RunConfig::default()).await.unwrap();
    assert_eq!(second.totals, result.totals);
}

#[test]
fn one_shot_lookup_matches_pooled_results() {
    let dir = TempDir::new().unwrap();
    let (analyser, generator, sections) = fixture(dir.path());
    let backend = ExternalBackend {
        lookup_cmd: "sh".to_string(),
        generator_fst: generator.display().to_string(),
        analyzer_fst: analyser.display().to_string(),
        timeout: Some(DEFAULT_TIMEOUT),
        quiet: true,
    };
    let lookups = backend.analyze_batch(&["w3".to_string(), "nope".to_string()]).unwrap();
    assert_eq!(lookups[0].len(), 1);
    assert!(lookups[1].is_empty());

    let result = run(&backend, sections, &RunConfig::default()).unwrap();
    assert_verdicts(&result.sections);
}
