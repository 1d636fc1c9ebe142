//! Stencil intermediate representation.
//!
//! Iteration dimensions live in an arena and are referenced by handle;
//! equations describe one tensor update each, relative to those dimensions.
//! A [`Program`] is the ordered equation list handed to the scheduler.

pub mod arena;
mod access;
mod dimension;
mod display;
mod equation;
mod error;
mod expr;

use std::collections::BTreeSet;

pub use access::{Access, Index, Offset};
pub use arena::{Arena, Handle};
pub use dimension::{
    Condition, Dimension, DimensionKind, Dimensions, Parameter, ParameterKind, SubSide, Thickness,
};
pub use display::{AccessDisplay, ExprDisplay, dump_program, format_dimension_kind};
pub use equation::Equation;
pub use error::IrError;
pub use expr::{BinaryOp, CompareOp, Expr};

/// Dimensions, runtime scalars and the ordered equations over them.
#[derive(Clone, Debug, Default)]
pub struct Program {
    pub dimensions: Dimensions,
    /// Equations in declaration order.
    pub equations: Vec<Equation>,
    /// Runtime scalar symbols available to guard predicates.
    pub scalars: BTreeSet<String>,
}

impl Program {
    pub fn new(dimensions: Dimensions) -> Self {
        Self {
            dimensions,
            ..Self::default()
        }
    }

    pub fn push(&mut self, equation: Equation) {
        self.equations.push(equation);
    }

    pub fn declare_scalar(&mut self, name: impl Into<String>) {
        self.scalars.insert(name.into());
    }

    /// Names of every tensor written or read.
    pub fn tensors(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        for eq in &self.equations {
            out.insert(eq.lhs.tensor.clone());
            for read in eq.reads() {
                out.insert(read.tensor.clone());
            }
        }
        out
    }

    /// Checks that every handle belongs to this program's arena and that
    /// subdomain mappings are well formed.
    pub fn validate(&self) -> Result<(), IrError> {
        for eq in &self.equations {
            for dim in eq.dimensions() {
                self.dimensions.check(dim)?;
            }
            eq.check_subdomain(&self.dimensions)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_foreign_handles() {
        let mut other = Dimensions::new();
        other.space("a", None).unwrap();
        other.space("b", None).unwrap();
        let foreign = other.space("c", None).unwrap();

        let mut program = Program::default();
        program.dimensions.space("x", None).unwrap();
        program.push(Equation::new(
            Access::new("u", vec![Index::at(foreign)]),
            Expr::int(1),
        ));
        assert!(matches!(
            program.validate(),
            Err(IrError::BadHandle { index: 2, size: 1 })
        ));
    }

    #[test]
    fn tensors_collects_reads_and_writes() {
        let mut program = Program::default();
        let x = program.dimensions.space("x", None).unwrap();
        program.push(Equation::new(
            Access::new("u", vec![Index::at(x)]),
            Access::new("v", vec![Index::shifted(x, 1)]),
        ));
        let names: Vec<_> = program.tensors().into_iter().collect();
        assert_eq!(names, vec!["u", "v"]);
    }
}
