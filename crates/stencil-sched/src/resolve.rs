//! Rewrites accesses and dimension references in terms of loop variables.
//!
//! Inside a nest, every dimension derived from a root evaluates through
//! the one loop the nest runs for that root:
//! - root and sub-dimensions: the loop variable itself;
//! - stepping: `(value + k) % modulo`;
//! - factor-conditional: `value // <name>_factor`;
//! - predicate-conditional: the parent's value.

use stencil_ir::{Access, Condition, Dimension, DimensionKind, Dimensions, Expr, Handle, Index, Offset};

pub(crate) struct Resolver<'a> {
    dims: &'a Dimensions,
    loops: &'a [Handle<Dimension>],
}

impl<'a> Resolver<'a> {
    pub(crate) fn new(dims: &'a Dimensions, loops: &'a [Handle<Dimension>]) -> Self {
        Self { dims, loops }
    }

    /// The loop running `dim`'s root, if the nest has one.
    pub(crate) fn loop_for(&self, dim: Handle<Dimension>) -> Option<Handle<Dimension>> {
        let root = self.dims.root(dim);
        self.loops
            .iter()
            .copied()
            .find(|&l| self.dims.root(l) == root)
    }

    fn value(&self, dim: Handle<Dimension>) -> Expr {
        let d = &self.dims[dim];
        match (&d.kind, d.parent) {
            (DimensionKind::Conditional(Condition::Factor(_)), Some(parent)) => self
                .value(parent)
                .floor_div(Expr::symbol(d.factor_symbol())),
            (DimensionKind::Conditional(Condition::Predicate(_)), Some(parent))
            | (DimensionKind::Stepping { .. }, Some(parent)) => self.value(parent),
            _ => Expr::dim(self.loop_for(dim).unwrap_or(dim)),
        }
    }

    pub(crate) fn index(&self, index: &Index) -> Expr {
        let offset = match &index.offset {
            Offset::Const(k) => Expr::int(*k),
            Offset::Symbolic(e) => self.expr(e),
        };
        let d = &self.dims[index.dim];
        match (&d.kind, d.parent) {
            (DimensionKind::Stepping { modulo }, Some(parent)) => {
                (self.value(parent) + offset).modulo(Expr::int(i64::from(*modulo)))
            }
            _ => self.value(index.dim) + offset,
        }
    }

    pub(crate) fn access(&self, access: &Access) -> Expr {
        Expr::Element {
            tensor: access.tensor.clone(),
            indices: access.indices.iter().map(|i| self.index(i)).collect(),
        }
    }

    pub(crate) fn expr(&self, expr: &Expr) -> Expr {
        match expr {
            Expr::Dim(d) => self.index(&Index::at(*d)),
            Expr::Access(access) => self.access(access),
            Expr::Int(_) | Expr::Float(_) | Expr::Symbol(_) => expr.clone(),
            Expr::Element { tensor, indices } => Expr::Element {
                tensor: tensor.clone(),
                indices: indices.iter().map(|i| self.expr(i)).collect(),
            },
            Expr::Neg(inner) => -self.expr(inner),
            Expr::Binary { op, lhs, rhs } => Expr::binary(*op, self.expr(lhs), self.expr(rhs)),
            Expr::Compare { op, lhs, rhs } => Expr::compare(*op, self.expr(lhs), self.expr(rhs)),
            Expr::And(terms) => Expr::and(terms.iter().map(|t| self.expr(t)).collect()),
            Expr::Call { function, args } => {
                Expr::call(function.clone(), args.iter().map(|a| self.expr(a)).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolved_indices() {
        let mut dims = Dimensions::new();
        let time = dims.time("time", None).unwrap();
        let t = dims.stepping("t", time, 3).unwrap();
        let tsub = dims.conditional("tsub", time, Some(4), None).unwrap();
        let x = dims.space("x", None).unwrap();
        let xi = dims.sub_middle("xi", x, 1, 1).unwrap();
        let loops = [time, xi];
        let r = Resolver::new(&dims, &loops);

        let show = |i: Index| r.index(&i).display(&dims).to_string();
        assert_eq!(show(Index::shifted(t, 1)), "(time + 1) % 3");
        assert_eq!(show(Index::at(t)), "time % 3");
        assert_eq!(show(Index::at(tsub)), "time // tsub_factor");
        assert_eq!(show(Index::shifted(x, -1)), "xi - 1");
        assert_eq!(show(Index::shifted(xi, 2)), "xi + 2");
    }
}
