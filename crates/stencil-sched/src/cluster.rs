//! Cluster construction and fusion.
//!
//! Equations are first ordered topologically over the dependence graph,
//! preferring to keep equations with the same signature (and failing
//! that, the same guard set) adjacent. Adjacent equations with equal
//! signatures are then merged into one cluster unless the merge would ask
//! a loop to run in both directions, or a distance between them along a
//! space dimension is unknown.

use stencil_analysis::{
    AnalysisError, Carrier, Constraints, DependenceGraph, LoweredEquation, Signature,
};
use stencil_ir::Dimensions;

use crate::Options;

/// Equations sharing one iteration-space signature, in execution order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cluster {
    pub equations: Vec<usize>,
    pub signature: Signature,
}

/// Orders equations respecting every inter-equation edge.
///
/// Edges always point from an earlier to a later equation, so declaration
/// order is one valid answer; ties among ready equations go to the one
/// that extends the last placed signature.
fn topological_order(lowered: &[LoweredEquation], graph: &DependenceGraph) -> Vec<usize> {
    let n = lowered.len();
    let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
    for edge in graph.edges() {
        if !edge.is_self() && !preds[edge.sink].contains(&edge.source) {
            preds[edge.sink].push(edge.source);
        }
    }

    let mut placed = vec![false; n];
    let mut order = Vec::with_capacity(n);
    let mut last: Option<&Signature> = None;

    while order.len() < n {
        let ready: Vec<usize> = (0..n)
            .filter(|&j| !placed[j] && preds[j].iter().all(|&p| placed[p]))
            .collect();
        let same_signature = ready
            .iter()
            .copied()
            .find(|&j| Some(&lowered[j].signature) == last);
        let same_guards = ready.iter().copied().find(|&j| {
            last.is_some_and(|s| {
                !s.conditions.is_empty() && s.conditions == lowered[j].signature.conditions
            })
        });
        let Some(pick) = same_signature.or(same_guards).or(ready.first().copied()) else {
            // Unreachable for an acyclic graph; keep whatever remains in
            // declaration order.
            order.extend((0..n).filter(|&j| !placed[j]));
            break;
        };
        placed[pick] = true;
        order.push(pick);
        last = Some(&lowered[pick].signature);
    }
    order
}

/// Returns `true` if equation `next` can join `cluster`.
fn can_merge(
    dims: &Dimensions,
    graph: &DependenceGraph,
    cluster: &Cluster,
    next: usize,
) -> bool {
    let mut members = cluster.equations.clone();
    members.push(next);
    for &l in &cluster.signature.loops {
        let root = dims.root(l);
        if dims.is_time_like(root) {
            continue;
        }
        if graph
            .between(&cluster.equations, &[next])
            .any(|e| e.carrier == Carrier::Unknown { root })
        {
            log::debug!(
                "e{next}: unknown distance along '{}' to cluster {:?}, not fusing",
                dims[root].name,
                cluster.equations
            );
            return false;
        }
        if !Constraints::collect(graph, &members, root).is_consistent() {
            let err = AnalysisError::InconsistentDirection {
                dimension: dims[root].name.clone(),
                first: cluster.equations[0],
                second: next,
            };
            log::debug!("{err}, not fusing");
            return false;
        }
    }
    true
}

/// Groups `lowered` into clusters in execution order.
pub fn build(
    dims: &Dimensions,
    lowered: &[LoweredEquation],
    graph: &DependenceGraph,
    options: &Options,
) -> Vec<Cluster> {
    if !options.fusion {
        return lowered
            .iter()
            .map(|eq| Cluster {
                equations: vec![eq.index],
                signature: eq.signature.clone(),
            })
            .collect();
    }

    let mut clusters: Vec<Cluster> = Vec::new();
    for i in topological_order(lowered, graph) {
        let eq = &lowered[i];
        if let Some(last) = clusters.last_mut() {
            if last.signature == eq.signature && can_merge(dims, graph, last, i) {
                last.equations.push(i);
                continue;
            }
        }
        clusters.push(Cluster {
            equations: vec![i],
            signature: eq.signature.clone(),
        });
    }
    log::debug!(
        "clustering: {} equations into {} clusters",
        lowered.len(),
        clusters.len()
    );
    clusters
}
