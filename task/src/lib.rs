//! Grounded SAS+ task model and preprocessor pipeline: causal-graph analysis,
//! variable ordering, normalization, domain-transition graphs, the successor
//! generator, concrete state transition, and the wire I/O formats.

pub mod causal_graph;
pub mod dtg;
pub mod ids;
pub mod io;
pub mod maxdag;
pub mod model;
pub mod normalize;
pub mod ordering;
pub mod scc;
pub mod state;
pub mod successor_generator;

use anyhow::Result;

/// Every artifact the preprocessor derives from a raw grounded task, in
/// dependency order (spec.md §2 component list).
pub struct PreprocessedTask {
    pub task: model::Task,
    pub causal_graph: causal_graph::CausalGraph,
    pub dtgs: Vec<dtg::Dtg>,
    pub successor_generator: successor_generator::SuccessorGenerator,
}

/// Runs the full preprocessor pipeline on a raw (un-normalized) grounded task:
/// causal graph, variable ordering with relevance pruning, normalization,
/// per-variable DTGs, and the successor generator.
#[tracing::instrument(skip_all)]
pub fn preprocess(raw_task: &model::Task, prune_irrelevant: bool) -> Result<PreprocessedTask> {
    let raw_cg = causal_graph::CausalGraph::build(raw_task);
    let ordering = ordering::build_ordering(raw_task, &raw_cg, prune_irrelevant);
    tracing::debug!(
        retained = ordering.order.len(),
        total = raw_task.num_variables(),
        "computed variable ordering"
    );
    let task = normalize::normalize(raw_task, &ordering)?;

    let causal_graph = causal_graph::CausalGraph::build(&task);
    let dtgs: Vec<dtg::Dtg> = (0..task.num_variables())
        .map(|i| dtg::build_dtg(&task, ids::VarId::from(i)))
        .collect();
    let successor_generator = successor_generator::build(&task);
    tracing::info!(variables = task.num_variables(), operators = task.operators.len(), "preprocessing complete");

    Ok(PreprocessedTask {
        task,
        causal_graph,
        dtgs,
        successor_generator,
    })
}
