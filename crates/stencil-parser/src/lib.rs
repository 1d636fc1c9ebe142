//! JSON problem-file frontend.
//!
//! Deserializes a problem description with [serde_json] and lowers it to a
//! [`stencil_ir::Program`]: dimensions are created in declaration order, so
//! a derived dimension must come after its parent.

mod decl;
mod lower;

/// Parse a JSON problem file into a program.
pub fn parse(source: &str) -> Result<stencil_ir::Program, ParseError> {
    let problem: decl::ProblemDecl = serde_json::from_str(source)?;
    lower::lower_problem(problem)
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("unknown dimension '{0}'")]
    UnknownDimension(String),
    #[error(transparent)]
    Ir(#[from] stencil_ir::IrError),
    #[error("invalid problem: {0}")]
    Invalid(String),
}
