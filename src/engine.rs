use crate::backend::{Backend, Lookup};
use crate::classify::classify;
use crate::error::MorphTestError;
use crate::index::ExpectationIndex;
use crate::types::{Counts, Direction, ExitStatus, RunResult, Section};
use indexmap::IndexSet;
use rayon::prelude::*;
use tracing::{debug, info};

/// Per-run settings handed to the runner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunConfig {
    /// 1-based section index; `None` runs every section.
    pub scope: Option<usize>,
    pub ignore_analysis_fp: bool,
    pub ignore_generation_fp: bool,
    /// Counts only this direction towards the totals and exit status.
    pub only: Option<Direction>,
}

/// Checks a requested section index against the corpus.
pub fn check_scope(sections: &[Section], scope: Option<usize>) -> Result<(), MorphTestError> {
    match scope {
        Some(requested) if requested == 0 || requested > sections.len() => {
            Err(MorphTestError::SectionNotFound {
                requested,
                available: sections.len(),
            })
        }
        _ => Ok(()),
    }
}

/// Inputs for the two lookup batches: every `right` for analysis and every
/// `left` for generation, in corpus order.
pub fn lookup_inputs(sections: &[Section]) -> (Vec<String>, Vec<String>) {
    sections
        .iter()
        .flat_map(|s| &s.expectations)
        .map(|e| (e.right.clone(), e.left.clone()))
        .unzip()
}

/// Stores raw batch results on the expectations, dropping weights.
pub fn store_results(
    sections: &mut [Section],
    analyses: Vec<Vec<Lookup>>,
    generations: Vec<Vec<Lookup>>,
) -> Result<(), MorphTestError> {
    let expected = sections.iter().map(|s| s.expectations.len()).sum::<usize>();
    if analyses.len() != expected || generations.len() != expected {
        return Err(MorphTestError::lookup(format!(
            "expected {expected} result lists, got {} analyses and {} generations",
            analyses.len(),
            generations.len()
        )));
    }
    let forms = |lookups: Vec<Lookup>| lookups.into_iter().map(|l| l.form).collect::<IndexSet<_>>();
    let expectations = sections.iter_mut().flat_map(|s| s.expectations.iter_mut());
    for ((e, ana), gen_) in expectations.zip(analyses).zip(generations) {
        e.analysis.results = forms(ana);
        e.generation.results = forms(gen_);
    }
    Ok(())
}

/// Classifies and tallies the execution set of a corpus whose lookup
/// results are already stored.
///
/// `index` must have been built over the whole corpus.
pub fn evaluate(
    sections: Vec<Section>,
    index: &ExpectationIndex,
    config: &RunConfig,
) -> Result<RunResult, MorphTestError> {
    check_scope(&sections, config.scope)?;
    let mut executed: Vec<Section> = match config.scope {
        Some(n) => sections.into_iter().skip(n - 1).take(1).collect(),
        None => sections,
    };

    // One worker per section: each expectation is written exactly once, and
    // the index is only read.
    executed.par_iter_mut().for_each(|section| {
        for e in &mut section.expectations {
            classify(
                e,
                index,
                config.ignore_analysis_fp,
                config.ignore_generation_fp,
            );
        }
    });

    let mut totals = Counts::default();
    for section in &mut executed {
        section.tally();
        debug!(section = %section.title, counts = ?section.counts, "tallied");
        totals += section.counts.restricted(config.only);
    }
    let exit_status = if totals.has_fails() {
        ExitStatus::Failure
    } else {
        ExitStatus::Success
    };
    info!(
        passes = totals.passes(),
        fails = totals.fails(),
        "run finished"
    );
    Ok(RunResult {
        sections: executed,
        totals,
        exit_status,
    })
}

/// Runs a corpus against a synchronous lookup backend.
pub fn run<B: Backend>(
    backend: &B,
    mut sections: Vec<Section>,
    config: &RunConfig,
) -> Result<RunResult, MorphTestError> {
    let index = ExpectationIndex::build(&sections);
    check_scope(&sections, config.scope)?;

    let (analysis_inputs, generation_inputs) = lookup_inputs(&sections);
    info!(
        sections = sections.len(),
        expectations = analysis_inputs.len(),
        scope = ?config.scope,
        "running corpus"
    );
    let analyses = backend.analyze_batch(&analysis_inputs)?;
    debug!(results = analyses.iter().map(Vec::len).sum::<usize>(), "analysis batch done");
    let generations = backend.generate_batch(&generation_inputs)?;
    debug!(results = generations.iter().map(Vec::len).sum::<usize>(), "generation batch done");
    store_results(&mut sections, analyses, generations)?;

    evaluate(sections, &index, config)
}
