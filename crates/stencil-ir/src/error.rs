//! Error types for the stencil IR.

/// Errors raised while constructing or validating dimensions and equations.
#[derive(Debug, thiserror::Error)]
pub enum IrError {
    /// A handle index is out of bounds for its arena.
    #[error("handle index {index} out of bounds (arena size: {size})")]
    BadHandle { index: usize, size: usize },

    /// Conflicting or out-of-range dimension construction arguments.
    #[error("malformed dimension '{name}': {reason}")]
    MalformedDimension { name: String, reason: String },

    /// A subdomain maps a dimension onto one that does not derive from it.
    #[error("invalid subdomain mapping '{from}' -> '{to}': {reason}")]
    InvalidSubdomain {
        from: String,
        to: String,
        reason: String,
    },
}

impl IrError {
    pub(crate) fn malformed(name: &str, reason: impl Into<String>) -> Self {
        Self::MalformedDimension {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}
