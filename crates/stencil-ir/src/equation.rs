//! Tensor update equations.

use crate::access::Access;
use crate::arena::Handle;
use crate::dimension::{Dimension, Dimensions};
use crate::error::IrError;
use crate::expr::Expr;

/// `lhs = rhs`, evaluated at every point of the equation's iteration space.
#[derive(Clone, Debug, PartialEq)]
pub struct Equation {
    /// The written tensor element.
    pub lhs: Access,
    pub rhs: Expr,
    /// `(root, sub)` pairs: every use of `root` is replaced by `sub` before
    /// scheduling, restricting the equation to a sub-region.
    pub subdomain: Vec<(Handle<Dimension>, Handle<Dimension>)>,
    /// Conditional dimensions gating the equation without appearing in
    /// any index.
    pub implicit_dims: Vec<Handle<Dimension>>,
}

impl Equation {
    pub fn new(lhs: Access, rhs: impl Into<Expr>) -> Self {
        Self {
            lhs,
            rhs: rhs.into(),
            subdomain: Vec::new(),
            implicit_dims: Vec::new(),
        }
    }

    pub fn with_subdomain(mut self, from: Handle<Dimension>, to: Handle<Dimension>) -> Self {
        self.subdomain.push((from, to));
        self
    }

    pub fn with_implicit_dims(mut self, dims: impl IntoIterator<Item = Handle<Dimension>>) -> Self {
        self.implicit_dims.extend(dims);
        self
    }

    /// Returns a new equation with `from` replaced by `to` everywhere.
    pub fn subs(&self, from: Handle<Dimension>, to: Handle<Dimension>) -> Equation {
        let swap = |d: Handle<Dimension>| if d == from { to } else { d };
        Equation {
            lhs: self.lhs.subs(from, to),
            rhs: self.rhs.subs(from, to),
            subdomain: self
                .subdomain
                .iter()
                .map(|&(a, b)| (swap(a), swap(b)))
                .collect(),
            implicit_dims: self.implicit_dims.iter().copied().map(swap).collect(),
        }
    }

    /// Tensor reads on the right-hand side, in order of appearance.
    pub fn reads(&self) -> Vec<&Access> {
        self.rhs.accesses()
    }

    /// Every dimension the equation mentions, in order of first appearance:
    /// left-hand side, right-hand side, then implicit dimensions.
    pub fn dimensions(&self) -> Vec<Handle<Dimension>> {
        let mut out: Vec<Handle<Dimension>> = Vec::new();
        let lhs = self.lhs.indices.iter().map(|i| i.dim);
        let rhs = self.rhs.dimensions();
        for dim in lhs.chain(rhs).chain(self.implicit_dims.iter().copied()) {
            if !out.contains(&dim) {
                out.push(dim);
            }
        }
        out
    }

    /// Checks each subdomain mapping: the target must be a proper
    /// descendant of the dimension it replaces.
    pub fn check_subdomain(&self, dims: &Dimensions) -> Result<(), IrError> {
        for &(from, to) in &self.subdomain {
            dims.check(from)?;
            dims.check(to)?;
            let reason = if from == to {
                Some("a dimension cannot replace itself")
            } else if !dims.is_derived_from(to, from) {
                Some("target does not derive from the replaced dimension")
            } else if dims[to].is_conditional() || dims[to].is_stepping() {
                Some("target must be a sub-range, not a guard or buffer index")
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(IrError::InvalidSubdomain {
                    from: dims[from].name.clone(),
                    to: dims[to].name.clone(),
                    reason: reason.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Returns the equation with its subdomain substitutions applied and
    /// the subdomain list cleared.
    pub fn apply_subdomain(&self, dims: &Dimensions) -> Result<Equation, IrError> {
        self.check_subdomain(dims)?;
        let mut out = Equation {
            subdomain: Vec::new(),
            ..self.clone()
        };
        for &(from, to) in &self.subdomain {
            out = out.subs(from, to);
        }
        Ok(out)
    }
}
