//! Lowering pass: problem declarations → `stencil_ir::Program`.

use stencil_ir::{
    Access, BinaryOp, CompareOp, Dimension, Equation, Expr, Handle, Index, Program, SubSide,
};

use crate::ParseError;
use crate::decl::{
    AccessDecl, DimensionDecl, EquationDecl, ExprDecl, IndexDecl, KindDecl, OffsetDecl,
    ProblemDecl, SideDecl,
};

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn lower_problem(problem: ProblemDecl) -> Result<Program, ParseError> {
    let mut ctx = LowerCtx {
        program: Program::default(),
    };

    for dim in problem.dimensions {
        ctx.lower_dimension(dim)?;
    }
    for scalar in problem.scalars {
        if ctx.program.dimensions.find(&scalar).is_some() {
            return Err(ParseError::Invalid(format!(
                "scalar '{scalar}' shadows a dimension"
            )));
        }
        ctx.program.declare_scalar(scalar);
    }
    for eq in problem.equations {
        let eq = ctx.lower_equation(eq)?;
        ctx.program.push(eq);
    }

    ctx.program.validate()?;
    log::debug!(
        "parsed {} dimensions, {} equations",
        ctx.program.dimensions.len(),
        ctx.program.equations.len()
    );
    Ok(ctx.program)
}

struct LowerCtx {
    program: Program,
}

// ---------------------------------------------------------------------------
// Dimensions
// ---------------------------------------------------------------------------

impl LowerCtx {
    fn dimension(&self, name: &str) -> Result<Handle<Dimension>, ParseError> {
        self.program
            .dimensions
            .find(name)
            .ok_or_else(|| ParseError::UnknownDimension(name.to_string()))
    }

    fn lower_dimension(&mut self, decl: DimensionDecl) -> Result<(), ParseError> {
        let name = decl.name.as_str();
        match decl.kind {
            KindDecl::Space { size } => {
                self.program.dimensions.space(name, size)?;
            }
            KindDecl::Time { size } => {
                self.program.dimensions.time(name, size)?;
            }
            KindDecl::Stepping { parent, modulo } => {
                let parent = self.dimension(&parent)?;
                self.program.dimensions.stepping(name, parent, modulo)?;
            }
            KindDecl::Sub {
                parent,
                side,
                left,
                right,
            } => {
                let parent = self.dimension(&parent)?;
                let side = match side {
                    SideDecl::Left => SubSide::Left,
                    SideDecl::Right => SubSide::Right,
                    SideDecl::Middle => SubSide::Middle,
                };
                self.program.dimensions.sub(name, parent, side, left, right)?;
            }
            KindDecl::Conditional {
                parent,
                factor,
                condition,
            } => {
                let parent = self.dimension(&parent)?;
                let condition = condition.map(|c| self.lower_expr(c)).transpose()?;
                self.program
                    .dimensions
                    .conditional(name, parent, factor, condition)?;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Equations and expressions
// ---------------------------------------------------------------------------

impl LowerCtx {
    fn lower_equation(&self, decl: EquationDecl) -> Result<Equation, ParseError> {
        let lhs = self.lower_access(decl.lhs)?;
        let rhs = self.lower_expr(decl.rhs)?;
        let mut eq = Equation::new(lhs, rhs);
        for (from, to) in &decl.subdomain {
            eq = eq.with_subdomain(self.dimension(from)?, self.dimension(to)?);
        }
        let implicit = decl
            .implicit_dims
            .iter()
            .map(|name| self.dimension(name))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(eq.with_implicit_dims(implicit))
    }

    fn lower_access(&self, decl: AccessDecl) -> Result<Access, ParseError> {
        if decl.tensor.is_empty() {
            return Err(ParseError::Invalid("access with empty tensor name".into()));
        }
        let indices = decl
            .indices
            .into_iter()
            .map(|index| self.lower_index(index))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Access::new(decl.tensor, indices))
    }

    fn lower_index(&self, decl: IndexDecl) -> Result<Index, ParseError> {
        Ok(match decl {
            IndexDecl::At(dim) => Index::at(self.dimension(&dim)?),
            IndexDecl::Shifted(dim, OffsetDecl::Const(k)) => Index::shifted(self.dimension(&dim)?, k),
            IndexDecl::Shifted(dim, OffsetDecl::Symbolic(offset)) => {
                Index::symbolic(self.dimension(&dim)?, self.lower_expr(offset)?)
            }
        })
    }

    fn lower_operands(&self, op: &str, operands: Vec<ExprDecl>) -> Result<Vec<Expr>, ParseError> {
        if operands.is_empty() {
            return Err(ParseError::Invalid(format!("'{op}' needs at least one operand")));
        }
        operands.into_iter().map(|e| self.lower_expr(e)).collect()
    }

    fn lower_pair(&self, pair: (ExprDecl, ExprDecl)) -> Result<(Expr, Expr), ParseError> {
        Ok((self.lower_expr(pair.0)?, self.lower_expr(pair.1)?))
    }

    fn lower_binary(&self, op: BinaryOp, pair: (ExprDecl, ExprDecl)) -> Result<Expr, ParseError> {
        let (lhs, rhs) = self.lower_pair(pair)?;
        Ok(Expr::binary(op, lhs, rhs))
    }

    fn lower_compare(&self, op: CompareOp, pair: (ExprDecl, ExprDecl)) -> Result<Expr, ParseError> {
        let (lhs, rhs) = self.lower_pair(pair)?;
        Ok(Expr::compare(op, lhs, rhs))
    }

    fn lower_fold(&self, op: BinaryOp, name: &str, operands: Vec<ExprDecl>) -> Result<Expr, ParseError> {
        let mut operands = self.lower_operands(name, operands)?.into_iter();
        let first = operands
            .next()
            .ok_or_else(|| ParseError::Invalid(format!("'{name}' needs at least one operand")))?;
        Ok(operands.fold(first, |acc, e| Expr::binary(op, acc, e)))
    }

    fn lower_expr(&self, decl: ExprDecl) -> Result<Expr, ParseError> {
        match decl {
            ExprDecl::Int(v) => Ok(Expr::int(v)),
            ExprDecl::Float(v) => Ok(Expr::float(v)),
            ExprDecl::Symbol(name) => {
                if self.program.dimensions.find(&name).is_some() {
                    return Err(ParseError::Invalid(format!(
                        "'{name}' is a dimension; use {{\"dim\": \"{name}\"}}"
                    )));
                }
                Ok(Expr::symbol(name))
            }
            ExprDecl::Dim(name) => Ok(Expr::dim(self.dimension(&name)?)),
            ExprDecl::Access(access) => Ok(Expr::from(self.lower_access(access)?)),
            ExprDecl::Neg(inner) => Ok(-self.lower_expr(*inner)?),
            ExprDecl::Add(operands) => self.lower_fold(BinaryOp::Add, "add", operands),
            ExprDecl::Mul(operands) => self.lower_fold(BinaryOp::Multiply, "mul", operands),
            ExprDecl::Sub(pair) => self.lower_binary(BinaryOp::Subtract, *pair),
            ExprDecl::Div(pair) => self.lower_binary(BinaryOp::Divide, *pair),
            ExprDecl::FloorDiv(pair) => self.lower_binary(BinaryOp::FloorDivide, *pair),
            ExprDecl::Mod(pair) => self.lower_binary(BinaryOp::Modulo, *pair),
            ExprDecl::Lt(pair) => self.lower_compare(CompareOp::Less, *pair),
            ExprDecl::Le(pair) => self.lower_compare(CompareOp::LessEqual, *pair),
            ExprDecl::Gt(pair) => self.lower_compare(CompareOp::Greater, *pair),
            ExprDecl::Ge(pair) => self.lower_compare(CompareOp::GreaterEqual, *pair),
            ExprDecl::Eq(pair) => self.lower_compare(CompareOp::Equal, *pair),
            ExprDecl::Ne(pair) => self.lower_compare(CompareOp::NotEqual, *pair),
            ExprDecl::And(terms) => Ok(Expr::and(self.lower_operands("and", terms)?)),
            ExprDecl::Call { function, args } => {
                let args = args
                    .into_iter()
                    .map(|a| self.lower_expr(a))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Expr::call(function, args))
            }
        }
    }
}
