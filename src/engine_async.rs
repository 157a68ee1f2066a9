use crate::engine::{RunConfig, check_scope, evaluate, lookup_inputs, store_results};
use crate::error::MorphTestError;
use crate::index::ExpectationIndex;
use crate::pool::PooledBackend;
use crate::types::{RunResult, Section};
use tracing::info;

/// Runs a corpus against pooled lookup processes, issuing the analysis and
/// generation batches concurrently.
pub async fn run_async(
    backend: &PooledBackend,
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
        "running corpus on process pool"
    );
    let (analyses, generations) = futures::future::join(
        backend.analyze_batch(&analysis_inputs),
        backend.generate_batch(&generation_inputs),
    )
    .await;
    store_results(&mut sections, analyses?, generations?)?;

    evaluate(sections, &index, config)
}
