//! Display implementations and text dump for debugging.

use std::fmt;

use crate::Program;
use crate::access::{Access, Offset};
use crate::dimension::{Condition, DimensionKind, Dimensions, SubSide};
use crate::expr::{BinaryOp, CompareOp, Expr};

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => write!(f, "+"),
            Self::Subtract => write!(f, "-"),
            Self::Multiply => write!(f, "*"),
            Self::Divide => write!(f, "/"),
            Self::FloorDivide => write!(f, "//"),
            Self::Modulo => write!(f, "%"),
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equal => write!(f, "=="),
            Self::NotEqual => write!(f, "!="),
            Self::Less => write!(f, "<"),
            Self::LessEqual => write!(f, "<="),
            Self::Greater => write!(f, ">"),
            Self::GreaterEqual => write!(f, ">="),
        }
    }
}

impl fmt::Display for SubSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => write!(f, "left"),
            Self::Right => write!(f, "right"),
            Self::Middle => write!(f, "middle"),
        }
    }
}

fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::And(_) => 1,
        Expr::Compare { .. } => 2,
        Expr::Binary {
            op: BinaryOp::Add | BinaryOp::Subtract,
            ..
        } => 3,
        Expr::Binary { .. } => 4,
        Expr::Neg(_) => 5,
        Expr::Int(v) if *v < 0 => 5,
        _ => 6,
    }
}

/// An [`Expr`] paired with the dimension arena needed to name its
/// iteration variables.
pub struct ExprDisplay<'a> {
    expr: &'a Expr,
    dims: &'a Dimensions,
}

impl Expr {
    pub fn display<'a>(&'a self, dims: &'a Dimensions) -> ExprDisplay<'a> {
        ExprDisplay { expr: self, dims }
    }
}

impl ExprDisplay<'_> {
    fn child<'b>(&'b self, expr: &'b Expr) -> ExprDisplay<'b> {
        ExprDisplay {
            expr,
            dims: self.dims,
        }
    }

    fn operand(&self, f: &mut fmt::Formatter<'_>, expr: &Expr, parens: bool) -> fmt::Result {
        if parens {
            write!(f, "({})", self.child(expr))
        } else {
            write!(f, "{}", self.child(expr))
        }
    }
}

impl fmt::Display for ExprDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let own = precedence(self.expr);
        match self.expr {
            Expr::Int(v) => write!(f, "{v}"),
            Expr::Float(v) => write!(f, "{v:?}"),
            Expr::Symbol(name) => write!(f, "{name}"),
            Expr::Dim(d) => write!(f, "{}", self.dims[*d].name),
            Expr::Access(access) => write!(f, "{}", access.display(self.dims)),
            Expr::Element { tensor, indices } => {
                write!(f, "{tensor}[")?;
                for (i, index) in indices.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", self.child(index))?;
                }
                write!(f, "]")
            }
            Expr::Neg(inner) => {
                write!(f, "-")?;
                self.operand(f, inner, precedence(inner) < own)
            }
            Expr::Binary { op, lhs, rhs } => {
                let associative = matches!(op, BinaryOp::Add | BinaryOp::Multiply);
                self.operand(f, lhs, precedence(lhs) < own)?;
                write!(f, " {op} ")?;
                let rp = precedence(rhs);
                self.operand(f, rhs, rp < own || (rp == own && !associative))
            }
            Expr::Compare { op, lhs, rhs } => {
                self.operand(f, lhs, precedence(lhs) <= own)?;
                write!(f, " {op} ")?;
                self.operand(f, rhs, precedence(rhs) <= own)
            }
            Expr::And(terms) => {
                if terms.is_empty() {
                    return write!(f, "true");
                }
                for (i, term) in terms.iter().enumerate() {
                    if i > 0 {
                        write!(f, " && ")?;
                    }
                    self.operand(f, term, precedence(term) <= own)?;
                }
                Ok(())
            }
            Expr::Call { function, args } => {
                write!(f, "{function}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", self.child(arg))?;
                }
                write!(f, ")")
            }
        }
    }
}

/// An [`Access`] paired with the dimension arena.
pub struct AccessDisplay<'a> {
    access: &'a Access,
    dims: &'a Dimensions,
}

impl Access {
    pub fn display<'a>(&'a self, dims: &'a Dimensions) -> AccessDisplay<'a> {
        AccessDisplay { access: self, dims }
    }
}

impl fmt::Display for AccessDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[", self.access.tensor)?;
        for (i, index) in self.access.indices.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            let name = &self.dims[index.dim].name;
            match &index.offset {
                Offset::Const(0) => write!(f, "{name}")?,
                Offset::Const(k) if *k < 0 => write!(f, "{name} - {}", k.unsigned_abs())?,
                Offset::Const(k) => write!(f, "{name} + {k}")?,
                Offset::Symbolic(e) => {
                    let e = e.display(self.dims);
                    write!(f, "{name} + ({e})")?
                }
            }
        }
        write!(f, "]")
    }
}

/// Formats the kind of a dimension, e.g. `sub(x, middle, 1, 1)`.
pub fn format_dimension_kind(kind: &DimensionKind, parent: Option<&str>, dims: &Dimensions) -> String {
    let parent = parent.unwrap_or("_");
    match kind {
        DimensionKind::Space { size: Some(n) } => format!("space({n})"),
        DimensionKind::Space { size: None } => "space".to_string(),
        DimensionKind::Time { size: Some(n) } => format!("time({n})"),
        DimensionKind::Time { size: None } => "time".to_string(),
        DimensionKind::Stepping { modulo } => format!("stepping({parent}, modulo {modulo})"),
        DimensionKind::Sub { side, thickness } => format!(
            "sub({parent}, {side}, {}, {})",
            thickness.left, thickness.right
        ),
        DimensionKind::Conditional(Condition::Factor(Some(k))) => {
            format!("conditional({parent}, factor {k})")
        }
        DimensionKind::Conditional(Condition::Factor(None)) => {
            format!("conditional({parent}, factor default)")
        }
        DimensionKind::Conditional(Condition::Predicate(p)) => {
            format!("conditional({parent}, if {})", p.display(dims))
        }
    }
}

/// Dumps a program in a human-readable text format.
pub fn dump_program(program: &Program) -> String {
    let dims = &program.dimensions;
    let mut out = String::new();

    out.push_str("Dimensions:\n");
    for (handle, dim) in dims.iter() {
        let parent = dim.parent.map(|p| dims[p].name.as_str());
        let kind = format_dimension_kind(&dim.kind, parent, dims);
        out.push_str(&format!("  {handle:?} {}: {kind}", dim.name));
        if matches!(dim.kind, DimensionKind::Sub { .. }) {
            out.push_str(&format!(", size {}", dims.symbolic_size(handle).display(dims)));
        }
        out.push('\n');
    }

    if !program.scalars.is_empty() {
        let scalars: Vec<&str> = program.scalars.iter().map(String::as_str).collect();
        out.push_str(&format!("\nScalars: {}\n", scalars.join(", ")));
    }

    if !program.equations.is_empty() {
        out.push_str("\nEquations:\n");
        for (i, eq) in program.equations.iter().enumerate() {
            out.push_str(&format!(
                "  e{i}: {} = {}",
                eq.lhs.display(dims),
                eq.rhs.display(dims)
            ));
            for &(from, to) in &eq.subdomain {
                out.push_str(&format!("  [{} -> {}]", dims[from].name, dims[to].name));
            }
            if !eq.implicit_dims.is_empty() {
                let names: Vec<&str> = eq
                    .implicit_dims
                    .iter()
                    .map(|&d| dims[d].name.as_str())
                    .collect();
                out.push_str(&format!("  implicit({})", names.join(", ")));
            }
            out.push('\n');
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::Index;

    #[test]
    fn precedence_parens() {
        let mut dims = Dimensions::new();
        let time = dims.time("time", None).unwrap();
        let e = (Expr::dim(time) + 1).modulo(Expr::int(2));
        assert_eq!(e.display(&dims).to_string(), "(time + 1) % 2");
        let e = Expr::symbol("a") - (Expr::symbol("b") - Expr::symbol("c"));
        assert_eq!(e.display(&dims).to_string(), "a - (b - c)");
        let e = Expr::and(vec![
            Expr::dim(time).gt(Expr::int(1)),
            Expr::dim(time).lt(Expr::symbol("stop")),
        ]);
        assert_eq!(e.display(&dims).to_string(), "time > 1 && time < stop");
    }

    #[test]
    fn access_offsets() {
        let mut dims = Dimensions::new();
        let t = dims.time("t", None).unwrap();
        let x = dims.space("x", None).unwrap();
        let a = Access::new("u", vec![Index::shifted(t, 1), Index::shifted(x, -1)]);
        assert_eq!(a.display(&dims).to_string(), "u[t + 1, x - 1]");
    }

    #[test]
    fn dump_lists_everything() {
        let mut program = Program::default();
        let x = program.dimensions.space("x", Some(8)).unwrap();
        let xi = program.dimensions.sub_middle("xi", x, 1, 1).unwrap();
        program.declare_scalar("stop");
        program.push(
            crate::Equation::new(
                Access::new("u", vec![Index::at(x)]),
                Expr::from(Access::new("u", vec![Index::shifted(x, -1)])) + 1,
            )
            .with_subdomain(x, xi),
        );
        let dump = dump_program(&program);
        assert!(dump.contains("xi: sub(x, middle, 1, 1), size x_M - x_m - xi_ltkn - xi_rtkn + 1\n"));
        assert!(dump.contains("Scalars: stop"));
        assert!(dump.contains("e0: u[x] = u[x - 1] + 1  [x -> xi]"));
    }
}
