//! Symbolic expressions: right-hand sides, bounds and guard predicates.

use std::collections::BTreeSet;
use std::ops;

use crate::access::{Access, Offset};
use crate::arena::Handle;
use crate::dimension::Dimension;

/// An arithmetic operator.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    /// Integer division rounding towards negative infinity.
    FloorDivide,
    Modulo,
}

/// A relational operator.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum CompareOp {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

/// A symbolic expression.
///
/// Equality is syntactic: `t > 4` and `t >= 5` are different expressions.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Int(i64),
    Float(f64),
    /// A runtime scalar or an invocation-time parameter such as `x_M`.
    Symbol(String),
    /// The iteration variable of a dimension.
    Dim(Handle<Dimension>),
    /// A tensor access relative to iteration dimensions.
    Access(Access),
    /// A tensor element addressed by fully resolved index expressions.
    Element { tensor: String, indices: Vec<Expr> },
    Neg(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Compare {
        op: CompareOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    And(Vec<Expr>),
    /// An opaque function application (`sin(u[x])`).
    Call { function: String, args: Vec<Expr> },
}

impl Expr {
    pub fn int(value: i64) -> Self {
        Self::Int(value)
    }

    pub fn float(value: f64) -> Self {
        Self::Float(value)
    }

    pub fn symbol(name: impl Into<String>) -> Self {
        Self::Symbol(name.into())
    }

    pub fn dim(dim: Handle<Dimension>) -> Self {
        Self::Dim(dim)
    }

    pub fn call(function: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::Call {
            function: function.into(),
            args,
        }
    }

    /// Builds `lhs op rhs`, folding integer constants and additive or
    /// multiplicative identities.
    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        if let (Self::Int(a), Self::Int(b)) = (&lhs, &rhs) {
            let folded = match op {
                BinaryOp::Add => a.checked_add(*b),
                BinaryOp::Subtract => a.checked_sub(*b),
                BinaryOp::Multiply => a.checked_mul(*b),
                BinaryOp::FloorDivide if *b > 0 => Some(a.div_euclid(*b)),
                BinaryOp::Modulo if *b > 0 => Some(a.rem_euclid(*b)),
                _ => None,
            };
            if let Some(value) = folded {
                return Self::Int(value);
            }
        }
        // `x + -1` reads as `x - 1`.
        let flipped = match (op, &rhs) {
            (BinaryOp::Add, Self::Int(k)) if *k < 0 => k.checked_neg().map(|n| (BinaryOp::Subtract, n)),
            (BinaryOp::Subtract, Self::Int(k)) if *k < 0 => k.checked_neg().map(|n| (BinaryOp::Add, n)),
            _ => None,
        };
        if let Some((op, n)) = flipped {
            return Self::binary(op, lhs, Self::Int(n));
        }
        match (op, &lhs, &rhs) {
            (BinaryOp::Add | BinaryOp::Subtract, _, Self::Int(0)) => lhs,
            (BinaryOp::Add, Self::Int(0), _) => rhs,
            (BinaryOp::Multiply, _, Self::Int(1)) => lhs,
            (BinaryOp::Multiply, Self::Int(1), _) => rhs,
            _ => Self::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
        }
    }

    pub fn compare(op: CompareOp, lhs: Expr, rhs: Expr) -> Self {
        Self::Compare {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Conjunction of `terms`; nested conjunctions are flattened and a single
    /// term is returned as is.
    pub fn and(terms: Vec<Expr>) -> Self {
        let mut flat = Vec::with_capacity(terms.len());
        for term in terms {
            match term {
                Self::And(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        if flat.len() == 1 {
            flat.pop().unwrap_or(Self::And(Vec::new()))
        } else {
            Self::And(flat)
        }
    }

    pub fn floor_div(self, rhs: Expr) -> Self {
        Self::binary(BinaryOp::FloorDivide, self, rhs)
    }

    pub fn modulo(self, rhs: Expr) -> Self {
        Self::binary(BinaryOp::Modulo, self, rhs)
    }

    pub fn lt(self, rhs: Expr) -> Self {
        Self::compare(CompareOp::Less, self, rhs)
    }

    pub fn gt(self, rhs: Expr) -> Self {
        Self::compare(CompareOp::Greater, self, rhs)
    }

    pub fn equals(self, rhs: Expr) -> Self {
        Self::compare(CompareOp::Equal, self, rhs)
    }

    /// Visits this expression and every sub-expression in pre-order,
    /// including symbolic access offsets.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Expr)) {
        visit(self);
        match self {
            Self::Int(_) | Self::Float(_) | Self::Symbol(_) | Self::Dim(_) => {}
            Self::Access(access) => {
                for index in &access.indices {
                    if let Offset::Symbolic(offset) = &index.offset {
                        offset.walk(visit);
                    }
                }
            }
            Self::Element { indices, .. } => {
                for index in indices {
                    index.walk(visit);
                }
            }
            Self::Neg(inner) => inner.walk(visit),
            Self::Binary { lhs, rhs, .. } | Self::Compare { lhs, rhs, .. } => {
                lhs.walk(visit);
                rhs.walk(visit);
            }
            Self::And(terms) => {
                for term in terms {
                    term.walk(visit);
                }
            }
            Self::Call { args, .. } => {
                for arg in args {
                    arg.walk(visit);
                }
            }
        }
    }

    /// Names of all free scalar symbols.
    pub fn free_symbols(&self) -> BTreeSet<String> {
        let mut symbols = BTreeSet::new();
        self.walk(&mut |e| {
            if let Self::Symbol(name) = e {
                symbols.insert(name.clone());
            }
        });
        symbols
    }

    /// Dimensions referenced either as iteration variables or through
    /// access indices, in order of first appearance.
    pub fn dimensions(&self) -> Vec<Handle<Dimension>> {
        let mut dims = Vec::new();
        self.walk(&mut |e| match e {
            Self::Dim(d) => {
                if !dims.contains(d) {
                    dims.push(*d);
                }
            }
            Self::Access(access) => {
                for index in &access.indices {
                    if !dims.contains(&index.dim) {
                        dims.push(index.dim);
                    }
                }
            }
            _ => {}
        });
        dims
    }

    /// All tensor accesses, in order of appearance.
    pub fn accesses(&self) -> Vec<&Access> {
        let mut out = Vec::new();
        self.walk(&mut |e| {
            if let Self::Access(access) = e {
                out.push(access);
            }
        });
        out
    }

    /// Returns a copy with dimension `from` replaced by `to`, both as an
    /// iteration variable and inside access indices.
    pub fn subs(&self, from: Handle<Dimension>, to: Handle<Dimension>) -> Expr {
        match self {
            Self::Dim(d) if *d == from => Self::Dim(to),
            Self::Int(_) | Self::Float(_) | Self::Symbol(_) | Self::Dim(_) => self.clone(),
            Self::Access(access) => Self::Access(access.subs(from, to)),
            Self::Element { tensor, indices } => Self::Element {
                tensor: tensor.clone(),
                indices: indices.iter().map(|i| i.subs(from, to)).collect(),
            },
            Self::Neg(inner) => Self::Neg(Box::new(inner.subs(from, to))),
            Self::Binary { op, lhs, rhs } => Self::Binary {
                op: *op,
                lhs: Box::new(lhs.subs(from, to)),
                rhs: Box::new(rhs.subs(from, to)),
            },
            Self::Compare { op, lhs, rhs } => Self::Compare {
                op: *op,
                lhs: Box::new(lhs.subs(from, to)),
                rhs: Box::new(rhs.subs(from, to)),
            },
            Self::And(terms) => Self::And(terms.iter().map(|t| t.subs(from, to)).collect()),
            Self::Call { function, args } => Self::Call {
                function: function.clone(),
                args: args.iter().map(|a| a.subs(from, to)).collect(),
            },
        }
    }
}

impl From<i64> for Expr {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<Access> for Expr {
    fn from(access: Access) -> Self {
        Self::Access(access)
    }
}

impl From<Handle<Dimension>> for Expr {
    fn from(dim: Handle<Dimension>) -> Self {
        Self::Dim(dim)
    }
}

impl<R: Into<Expr>> ops::Add<R> for Expr {
    type Output = Expr;
    fn add(self, rhs: R) -> Expr {
        Expr::binary(BinaryOp::Add, self, rhs.into())
    }
}

impl<R: Into<Expr>> ops::Sub<R> for Expr {
    type Output = Expr;
    fn sub(self, rhs: R) -> Expr {
        Expr::binary(BinaryOp::Subtract, self, rhs.into())
    }
}

impl<R: Into<Expr>> ops::Mul<R> for Expr {
    type Output = Expr;
    fn mul(self, rhs: R) -> Expr {
        Expr::binary(BinaryOp::Multiply, self, rhs.into())
    }
}

impl<R: Into<Expr>> ops::Div<R> for Expr {
    type Output = Expr;
    fn div(self, rhs: R) -> Expr {
        Expr::binary(BinaryOp::Divide, self, rhs.into())
    }
}

impl ops::Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        match self {
            Expr::Int(v) if v != i64::MIN => Expr::Int(-v),
            other => Expr::Neg(Box::new(other)),
        }
    }
}
