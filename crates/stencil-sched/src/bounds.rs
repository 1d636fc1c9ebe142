//! Loop bounds.

use std::collections::BTreeMap;
use std::fmt;

use stencil_ir::{Dimension, Dimensions, Expr, ExprDisplay, Handle};

/// An inclusive, possibly symbolic, interval.
#[derive(Clone, Debug, PartialEq)]
pub struct Interval {
    pub min: Expr,
    pub max: Expr,
}

impl Interval {
    pub fn display<'a>(&'a self, dims: &'a Dimensions) -> IntervalDisplay<'a> {
        IntervalDisplay {
            min: self.min.display(dims),
            max: self.max.display(dims),
        }
    }
}

pub struct IntervalDisplay<'a> {
    min: ExprDisplay<'a>,
    max: ExprDisplay<'a>,
}

impl fmt::Display for IntervalDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

/// Build-local table of resolved dimension bounds. Each dimension is
/// resolved at most once per scheduling run and never overwritten.
#[derive(Debug, Default)]
pub(crate) struct BoundsTable {
    table: BTreeMap<Handle<Dimension>, Interval>,
}

impl BoundsTable {
    pub(crate) fn resolve(&mut self, dims: &Dimensions, dim: Handle<Dimension>) -> Interval {
        self.table
            .entry(dim)
            .or_insert_with(|| Interval {
                min: dims.symbolic_min(dim),
                max: dims.symbolic_max(dim),
            })
            .clone()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.table.len()
    }
}
