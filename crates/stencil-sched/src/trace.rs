//! Reference interpreter for schedule trees.
//!
//! Walks a [`ScheduleTree`] with concrete parameter values and records which
//! equation instance runs at which iteration point and which element it
//! writes. Right-hand sides are not evaluated; only loop bounds, guard
//! predicates and left-hand indices are.

use std::collections::BTreeMap;

use stencil_analysis::Direction;
use stencil_ir::{BinaryOp, CompareOp, Dimension, Dimensions, Expr, Handle};

use crate::nest::{Node, ScheduleTree};

/// Concrete values for invocation-time parameters and runtime scalars.
/// Missing parameters fall back to their defaults.
pub type Bindings = BTreeMap<String, i64>;

/// Errors raised while tracing.
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    #[error("no value for '{0}'")]
    Unbound(String),

    #[error("cannot evaluate {0} to an integer")]
    Unsupported(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("integer overflow")]
    Overflow,
}

/// One executed equation instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceEvent {
    pub equation: usize,
    /// Enclosing loop variables and their values, outermost first.
    pub point: Vec<(String, i64)>,
    pub tensor: String,
    /// The written element.
    pub index: Vec<i64>,
}

/// Quotient rounded towards negative infinity.
fn floor_div(a: i64, b: i64) -> Option<i64> {
    let q = a.checked_div(b)?;
    if a % b != 0 && (a < 0) != (b < 0) {
        q.checked_sub(1)
    } else {
        Some(q)
    }
}

struct Interpreter<'a> {
    dims: &'a Dimensions,
    bindings: Bindings,
    point: Vec<(Handle<Dimension>, i64)>,
    events: Vec<TraceEvent>,
}

impl Interpreter<'_> {
    fn symbol(&self, name: &str) -> Result<i64, TraceError> {
        self.bindings
            .get(name)
            .copied()
            .ok_or_else(|| TraceError::Unbound(name.to_string()))
    }

    fn int(&self, expr: &Expr) -> Result<i64, TraceError> {
        match expr {
            Expr::Int(v) => Ok(*v),
            Expr::Symbol(name) => self.symbol(name),
            Expr::Dim(d) => self
                .point
                .iter()
                .rev()
                .find(|(dim, _)| dim == d)
                .map(|&(_, v)| v)
                .ok_or_else(|| TraceError::Unbound(self.dims[*d].name.clone())),
            Expr::Neg(inner) => self.int(inner)?.checked_neg().ok_or(TraceError::Overflow),
            Expr::Binary { op, lhs, rhs } => {
                let (a, b) = (self.int(lhs)?, self.int(rhs)?);
                let value = match op {
                    BinaryOp::Add => a.checked_add(b),
                    BinaryOp::Subtract => a.checked_sub(b),
                    BinaryOp::Multiply => a.checked_mul(b),
                    BinaryOp::Divide | BinaryOp::FloorDivide | BinaryOp::Modulo if b == 0 => {
                        return Err(TraceError::DivisionByZero);
                    }
                    BinaryOp::Divide | BinaryOp::FloorDivide => floor_div(a, b),
                    BinaryOp::Modulo => a.checked_rem_euclid(b),
                };
                value.ok_or(TraceError::Overflow)
            }
            Expr::Compare { .. } | Expr::And(_) => Ok(i64::from(self.truth(expr)?)),
            Expr::Float(_) | Expr::Access(_) | Expr::Element { .. } | Expr::Call { .. } => {
                Err(TraceError::Unsupported(format!("{}", expr.display(self.dims))))
            }
        }
    }

    fn truth(&self, expr: &Expr) -> Result<bool, TraceError> {
        match expr {
            Expr::Compare { op, lhs, rhs } => {
                let (a, b) = (self.int(lhs)?, self.int(rhs)?);
                Ok(match op {
                    CompareOp::Equal => a == b,
                    CompareOp::NotEqual => a != b,
                    CompareOp::Less => a < b,
                    CompareOp::LessEqual => a <= b,
                    CompareOp::Greater => a > b,
                    CompareOp::GreaterEqual => a >= b,
                })
            }
            Expr::And(terms) => {
                for term in terms {
                    if !self.truth(term)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            other => Ok(self.int(other)? != 0),
        }
    }

    fn run(&mut self, nodes: &[Node]) -> Result<(), TraceError> {
        for node in nodes {
            match node {
                Node::Loop(l) => {
                    let (lo, hi) = (self.int(&l.bounds.min)?, self.int(&l.bounds.max)?);
                    let values: Box<dyn Iterator<Item = i64>> = match l.direction {
                        Direction::Forward => Box::new(lo..=hi),
                        Direction::Backward => Box::new((lo..=hi).rev()),
                    };
                    for v in values {
                        self.point.push((l.dim, v));
                        let result = self.run(&l.body);
                        self.point.pop();
                        result?;
                    }
                }
                Node::Guard(g) => {
                    if self.truth(&g.predicate)? {
                        self.run(&g.body)?;
                    }
                }
                Node::Statement(s) => {
                    let Expr::Element { tensor, indices } = &s.lhs else {
                        return Err(TraceError::Unsupported(format!(
                            "left-hand side {}",
                            s.lhs.display(self.dims)
                        )));
                    };
                    let index = indices
                        .iter()
                        .map(|i| self.int(i))
                        .collect::<Result<Vec<_>, _>>()?;
                    self.events.push(TraceEvent {
                        equation: s.equation,
                        point: self
                            .point
                            .iter()
                            .map(|&(d, v)| (self.dims[d].name.clone(), v))
                            .collect(),
                        tensor: tensor.clone(),
                        index,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Executes `tree` symbolically and returns the equation instances in
/// execution order.
pub fn trace(
    tree: &ScheduleTree,
    dims: &Dimensions,
    bindings: &Bindings,
) -> Result<Vec<TraceEvent>, TraceError> {
    let mut values = Bindings::new();
    for p in &tree.parameters {
        if let Some(default) = p.default {
            values.insert(p.name.clone(), default);
        }
    }
    values.extend(bindings.iter().map(|(k, v)| (k.clone(), *v)));

    let mut interpreter = Interpreter {
        dims,
        bindings: values,
        point: Vec::new(),
        events: Vec::new(),
    };
    interpreter.run(&tree.roots)?;
    log::debug!("trace: {} equation instances", interpreter.events.len());
    Ok(interpreter.events)
}
