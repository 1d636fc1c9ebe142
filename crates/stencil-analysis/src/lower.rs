//! Equation lowering: subdomain substitution and iteration signatures.
//!
//! Each equation iterates one loop per root dimension it touches. The loop
//! runs over the narrowest dimension derived from that root that the
//! equation mentions, so both `u[xi] = u[x - 1]` and `u[x] = u[xi - 1]`
//! iterate `xi`. Two sub-dimensions of one root where neither derives from
//! the other cannot share a loop and are rejected. Stepping and conditional
//! dimensions never get loops of their own; the conditional ones become
//! guards.

use std::collections::BTreeSet;

use stencil_ir::{Access, Dimension, Dimensions, Equation, Handle, Program};

use crate::AnalysisError;

/// Canonical iteration-space signature: loops outer to inner plus the
/// active guard set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Signature {
    pub loops: Vec<Handle<Dimension>>,
    /// Conditional dimensions gating the equation, sorted by handle.
    pub conditions: Vec<Handle<Dimension>>,
}

/// An equation ready for analysis.
#[derive(Clone, Debug)]
pub struct LoweredEquation {
    /// Position in the program's declaration order.
    pub index: usize,
    /// The equation with subdomain substitutions applied.
    pub equation: Equation,
    pub signature: Signature,
}

impl LoweredEquation {
    pub fn loops(&self) -> &[Handle<Dimension>] {
        &self.signature.loops
    }

    pub fn conditions(&self) -> &[Handle<Dimension>] {
        &self.signature.conditions
    }

    /// Roots of the loops, outer to inner.
    pub fn roots(&self, dims: &Dimensions) -> Vec<Handle<Dimension>> {
        self.loops().iter().map(|&l| dims.root(l)).collect()
    }

    /// The written access.
    pub fn write(&self) -> &Access {
        &self.equation.lhs
    }

    /// Every tensor read: right-hand side first, then accesses in guard
    /// predicates.
    pub fn reads<'a>(&'a self, dims: &'a Dimensions) -> Vec<&'a Access> {
        let mut reads = self.equation.reads();
        for &c in self.conditions() {
            if let Some(stencil_ir::Condition::Predicate(p)) = dims[c].condition() {
                reads.extend(p.accesses());
            }
        }
        reads
    }
}

/// Lowers every equation of `program` in declaration order.
pub fn lower(program: &Program) -> Result<Vec<LoweredEquation>, AnalysisError> {
    program.validate()?;
    let dims = &program.dimensions;

    let lowered = program
        .equations
        .iter()
        .enumerate()
        .map(|(index, eq)| lower_equation(dims, index, eq))
        .collect::<Result<Vec<_>, _>>()?;

    warn_unused(dims, &lowered);
    log::debug!(
        "lowered {} equations over {} dimensions",
        lowered.len(),
        dims.len()
    );
    Ok(lowered)
}

fn lower_equation(
    dims: &Dimensions,
    index: usize,
    eq: &Equation,
) -> Result<LoweredEquation, AnalysisError> {
    let equation = eq.apply_subdomain(dims)?;

    let mut loops: Vec<Handle<Dimension>> = Vec::new();
    let mut conditions: BTreeSet<Handle<Dimension>> = BTreeSet::new();

    for dim in equation.dimensions() {
        let lp = dims.loop_dimension(dim);
        let root = dims.root(lp);
        match loops.iter().position(|&l| dims.root(l) == root) {
            None => loops.push(lp),
            // The loop already runs a range at least as narrow.
            Some(at) if dims.is_derived_from(loops[at], lp) => {}
            Some(at) => {
                let existing = loops[at];
                if dims.is_derived_from(lp, existing) {
                    log::debug!(
                        "e{index}: '{}' narrowed from '{}' to '{}'",
                        dims[root].name,
                        dims[existing].name,
                        dims[lp].name
                    );
                    loops[at] = lp;
                } else {
                    return Err(AnalysisError::ConflictingSubdomains {
                        equation: index,
                        root: dims[root].name.clone(),
                        first: dims[existing].name.clone(),
                        second: dims[lp].name.clone(),
                    });
                }
            }
        }

        let mut current = dim;
        while current != lp {
            if dims[current].is_conditional() {
                conditions.insert(current);
            }
            match dims.parent(current) {
                Some(parent) => current = parent,
                None => break,
            }
        }
    }

    // Time-like loops always sit outermost.
    loops.sort_by_key(|&l| !dims.is_time_like(l));

    Ok(LoweredEquation {
        index,
        equation,
        signature: Signature {
            loops,
            conditions: conditions.into_iter().collect(),
        },
    })
}

fn warn_unused(dims: &Dimensions, lowered: &[LoweredEquation]) {
    let mut used: BTreeSet<Handle<Dimension>> = BTreeSet::new();
    for eq in lowered {
        let mut mark = |mut d: Handle<Dimension>| {
            loop {
                used.insert(d);
                match dims.parent(d) {
                    Some(p) => d = p,
                    None => break,
                }
            }
        };
        for d in eq.equation.dimensions() {
            mark(d);
        }
        for &c in eq.conditions() {
            for d in dims.condition_dimensions(c) {
                mark(d);
            }
        }
    }
    for (handle, dim) in dims.iter() {
        if !used.contains(&handle) {
            log::warn!("dimension '{}' is not used by any equation", dim.name);
        }
    }
}
