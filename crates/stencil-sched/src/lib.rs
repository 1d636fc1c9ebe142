//! Loop-nest scheduling for stencil programs.
//!
//! [`schedule`] runs the whole middle-end: lowering and dependence analysis
//! (from `stencil-analysis`), cluster construction and fusion, guard
//! materialization and loop-nest building. The result is a
//! [`ScheduleTree`] of loops, guards and resolved statements.

mod bounds;
pub mod cluster;
mod guard;
mod nest;
mod resolve;
pub mod trace;

pub use bounds::Interval;
pub use cluster::Cluster;
pub use guard::Guard;
pub use nest::{
    ClusterInfo, GuardNode, IterationSpace, LoopNode, Node, ScheduleTree, StatementNode,
};
pub use trace::{Bindings, TraceError, TraceEvent, trace};

use stencil_analysis::{AnalysisError, analyze, lower};
use stencil_ir::{IrError, Program};

/// Knobs for a scheduling run. Passed explicitly; there is no global state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Options {
    /// Stride used by conditional dimensions declared without a factor or
    /// a condition.
    pub default_factor: i64,
    /// Fuse compatible clusters and share loops between them.
    pub fusion: bool,
    /// Tag innermost parallel affine loops as vectorizable.
    pub vectorize: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            default_factor: 1,
            fusion: true,
            vectorize: true,
        }
    }
}

/// Errors produced while scheduling.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    Ir(#[from] IrError),

    /// A guard predicate references something with no value at the point
    /// the guard is placed.
    #[error("guard of '{dimension}' references unresolved '{symbol}'")]
    UnresolvedGuard { dimension: String, symbol: String },

    #[error("invalid options: {0}")]
    InvalidOptions(String),
}

/// Schedules `program` into a loop-nest tree.
///
/// Deterministic: the same program and options always give the same tree.
pub fn schedule(program: &Program, options: &Options) -> Result<ScheduleTree, ScheduleError> {
    if options.default_factor <= 0 {
        return Err(ScheduleError::InvalidOptions(format!(
            "default stride factor must be positive, got {}",
            options.default_factor
        )));
    }
    let dims = &program.dimensions;
    let lowered = lower(program)?;
    let graph = analyze(dims, &lowered)?;
    let clusters = cluster::build(dims, &lowered, &graph, options);
    let guards = clusters
        .iter()
        .map(|c| guard::materialize(program, c))
        .collect::<Result<Vec<_>, _>>()?;
    let tree = nest::build(program, &lowered, &graph, &clusters, &guards, options);
    log::debug!(
        "scheduled {} equations into {} clusters, {} iteration trees",
        lowered.len(),
        clusters.len(),
        tree.iteration_trees().len()
    );
    Ok(tree)
}
