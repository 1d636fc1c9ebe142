//! Dependence and iteration-space analysis for stencil programs.
//!
//! [`lower`] assigns each equation its loop signature, [`analyze`] compares
//! tensor accesses to derive dependence edges, and the [`classify`] module
//! turns carried edges into per-loop direction and parallelism tags.

pub mod classify;
pub mod dependence;
pub mod lower;

pub use classify::{Constraints, Level, Properties, classify_level, is_affine};
pub use dependence::{Carrier, DependenceEdge, DependenceGraph, DependenceKind, Direction, analyze};
pub use lower::{LoweredEquation, Signature, lower};

use stencil_ir::IrError;

/// Errors produced during analysis.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// An access pattern no legal loop order can satisfy.
    #[error(
        "illegal dependence on '{tensor}' along '{dimension}' between e{writer} and e{reader}: {reason}"
    )]
    IllegalDependence {
        tensor: String,
        dimension: String,
        writer: usize,
        reader: usize,
        reason: String,
    },

    /// Two groups of equations require opposite directions along the same
    /// dimension. Callers treat this as a refusal to fuse.
    #[error("inconsistent direction along '{dimension}' between e{first} and e{second}")]
    InconsistentDirection {
        dimension: String,
        first: usize,
        second: usize,
    },

    /// One equation indexes two sub-ranges of a root, neither contained in
    /// the other, so no single loop covers both.
    #[error("e{equation} indexes both '{first}' and '{second}', which restrict '{root}' differently")]
    ConflictingSubdomains {
        equation: usize,
        root: String,
        first: String,
        second: String,
    },

    /// Accesses to a tensor reach more time levels than its circular
    /// buffer holds, so distinct levels would share a slot.
    #[error("accesses to '{tensor}' span {levels} levels of the {modulo}-slot buffer '{dimension}'")]
    BufferTooSmall {
        tensor: String,
        dimension: String,
        levels: i64,
        modulo: u32,
    },

    #[error(transparent)]
    Ir(#[from] IrError),
}
