//! Guard materialization.
//!
//! A cluster gated by conditional dimensions gets one predicate per loop
//! depth: the conjunction of every condition that can first be evaluated
//! there. A stride condition becomes `var % <name>_factor == 0` on the
//! loop running its parent; an explicit condition is placed below every
//! loop it references.

use std::collections::BTreeSet;

use stencil_ir::{Condition, Dimension, Expr, Handle, Program};

use crate::ScheduleError;
use crate::cluster::Cluster;
use crate::resolve::Resolver;

/// A combined guard predicate placed `level` loops deep.
#[derive(Clone, Debug, PartialEq)]
pub struct Guard {
    /// Number of enclosing loops of the cluster's signature.
    pub level: usize,
    /// Resolved against the cluster's loop variables.
    pub predicate: Expr,
    /// Conditional dimensions contributing to the predicate.
    pub conditions: Vec<Handle<Dimension>>,
}

fn unresolved(program: &Program, dim: Handle<Dimension>, symbol: impl Into<String>) -> ScheduleError {
    ScheduleError::UnresolvedGuard {
        dimension: program.dimensions[dim].name.clone(),
        symbol: symbol.into(),
    }
}

/// Guards for `cluster`, outermost first.
pub(crate) fn materialize(program: &Program, cluster: &Cluster) -> Result<Vec<Guard>, ScheduleError> {
    let dims = &program.dimensions;
    let loops = &cluster.signature.loops;
    let resolver = Resolver::new(dims, loops);
    let position = |d: Handle<Dimension>| {
        let root = dims.root(d);
        loops.iter().position(|&l| dims.root(l) == root)
    };

    let mut known: BTreeSet<String> = program.scalars.clone();
    for (handle, _) in dims.iter() {
        known.extend(dims.parameters(handle).into_iter().map(|p| p.name));
    }
    let tensors = program.tensors();

    let mut terms: Vec<(usize, Expr, Handle<Dimension>)> = Vec::new();
    for &c in &cluster.signature.conditions {
        let dim = &dims[c];
        let Some(parent_level) = position(c) else {
            return Err(unresolved(program, c, dims[dims.root(c)].name.clone()));
        };
        let (level, predicate) = match dim.condition() {
            Some(Condition::Factor(_)) => {
                let Some(parent) = dim.parent else {
                    return Err(unresolved(program, c, dim.name.clone()));
                };
                let var = resolver.index(&stencil_ir::Index::at(parent));
                let predicate = var
                    .modulo(Expr::symbol(dim.factor_symbol()))
                    .equals(Expr::int(0));
                (parent_level + 1, predicate)
            }
            Some(Condition::Predicate(p)) => {
                if let Some(symbol) = dims.condition_variables(c).into_iter().find(|s| !known.contains(s)) {
                    return Err(unresolved(program, c, symbol));
                }
                if let Some(access) = p.accesses().into_iter().find(|a| !tensors.contains(&a.tensor)) {
                    return Err(unresolved(program, c, access.tensor.clone()));
                }
                let mut level = parent_level + 1;
                for d in p.dimensions() {
                    match position(d) {
                        Some(pos) => level = level.max(pos + 1),
                        None => return Err(unresolved(program, c, dims[d].name.clone())),
                    }
                }
                (level, resolver.expr(p))
            }
            None => continue,
        };
        terms.push((level, predicate, c));
    }

    let mut guards: Vec<Guard> = Vec::new();
    let levels: BTreeSet<usize> = terms.iter().map(|t| t.0).collect();
    for level in levels {
        let (predicates, conditions): (Vec<Expr>, Vec<Handle<Dimension>>) = terms
            .iter()
            .filter(|t| t.0 == level)
            .map(|t| (t.1.clone(), t.2))
            .unzip();
        guards.push(Guard {
            level,
            predicate: Expr::and(predicates),
            conditions,
        });
    }
    Ok(guards)
}
