//! Tensor accesses relative to iteration dimensions.

use crate::arena::Handle;
use crate::dimension::Dimension;
use crate::expr::Expr;

/// Displacement of an index from its dimension's iteration variable.
#[derive(Clone, Debug, PartialEq)]
pub enum Offset {
    /// A compile-time integer (affine access).
    Const(i64),
    /// Anything else; defeats distance computation along the dimension.
    Symbolic(Expr),
}

impl Offset {
    pub fn as_const(&self) -> Option<i64> {
        match self {
            Self::Const(k) => Some(*k),
            Self::Symbolic(_) => None,
        }
    }

    pub fn is_affine(&self) -> bool {
        matches!(self, Self::Const(_))
    }
}

/// One index of a tensor access: `dim + offset`.
#[derive(Clone, Debug, PartialEq)]
pub struct Index {
    pub dim: Handle<Dimension>,
    pub offset: Offset,
}

impl Index {
    /// `dim` itself.
    pub fn at(dim: Handle<Dimension>) -> Self {
        Self::shifted(dim, 0)
    }

    /// `dim + k`.
    pub fn shifted(dim: Handle<Dimension>, k: i64) -> Self {
        Self {
            dim,
            offset: Offset::Const(k),
        }
    }

    /// `dim + offset` for a non-constant offset.
    pub fn symbolic(dim: Handle<Dimension>, offset: Expr) -> Self {
        match offset {
            Expr::Int(k) => Self::shifted(dim, k),
            other => Self {
                dim,
                offset: Offset::Symbolic(other),
            },
        }
    }
}

/// A read or write of one tensor element per iteration point.
#[derive(Clone, Debug, PartialEq)]
pub struct Access {
    pub tensor: String,
    pub indices: Vec<Index>,
}

impl Access {
    pub fn new(tensor: impl Into<String>, indices: Vec<Index>) -> Self {
        Self {
            tensor: tensor.into(),
            indices,
        }
    }

    /// Returns a copy with every index along `from` moved to `to`, keeping
    /// offsets.
    pub fn subs(&self, from: Handle<Dimension>, to: Handle<Dimension>) -> Access {
        Access {
            tensor: self.tensor.clone(),
            indices: self
                .indices
                .iter()
                .map(|index| Index {
                    dim: if index.dim == from { to } else { index.dim },
                    offset: match &index.offset {
                        Offset::Const(k) => Offset::Const(*k),
                        Offset::Symbolic(e) => Offset::Symbolic(e.subs(from, to)),
                    },
                })
                .collect(),
        }
    }

    /// Returns `true` if every index offset is an integer constant.
    pub fn is_affine(&self) -> bool {
        self.indices.iter().all(|i| i.offset.is_affine())
    }
}
