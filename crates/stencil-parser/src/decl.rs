//! Serde mirror of the problem-file format.

use std::collections::BTreeMap;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProblemDecl {
    #[serde(default)]
    pub dimensions: Vec<DimensionDecl>,
    #[serde(default)]
    pub scalars: Vec<String>,
    #[serde(default)]
    pub equations: Vec<EquationDecl>,
}

#[derive(Debug, Deserialize)]
pub struct DimensionDecl {
    pub name: String,
    #[serde(flatten)]
    pub kind: KindDecl,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum KindDecl {
    Space {
        size: Option<u64>,
    },
    Time {
        size: Option<u64>,
    },
    Stepping {
        parent: String,
        modulo: u32,
    },
    Sub {
        parent: String,
        side: SideDecl,
        #[serde(default)]
        left: i64,
        #[serde(default)]
        right: i64,
    },
    Conditional {
        parent: String,
        factor: Option<i64>,
        condition: Option<ExprDecl>,
    },
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SideDecl {
    Left,
    Right,
    Middle,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccessDecl {
    pub tensor: String,
    pub indices: Vec<IndexDecl>,
}

/// `"x"` or `["x", -1]` or `["x", <expr>]`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum IndexDecl {
    At(String),
    Shifted(String, OffsetDecl),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum OffsetDecl {
    Const(i64),
    Symbolic(ExprDecl),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExprDecl {
    Int(i64),
    Float(f64),
    Symbol(String),
    Dim(String),
    Access(AccessDecl),
    Neg(Box<ExprDecl>),
    Add(Vec<ExprDecl>),
    Mul(Vec<ExprDecl>),
    Sub(Box<(ExprDecl, ExprDecl)>),
    Div(Box<(ExprDecl, ExprDecl)>),
    FloorDiv(Box<(ExprDecl, ExprDecl)>),
    Mod(Box<(ExprDecl, ExprDecl)>),
    Lt(Box<(ExprDecl, ExprDecl)>),
    Le(Box<(ExprDecl, ExprDecl)>),
    Gt(Box<(ExprDecl, ExprDecl)>),
    Ge(Box<(ExprDecl, ExprDecl)>),
    Eq(Box<(ExprDecl, ExprDecl)>),
    Ne(Box<(ExprDecl, ExprDecl)>),
    And(Vec<ExprDecl>),
    Call {
        function: String,
        #[serde(default)]
        args: Vec<ExprDecl>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EquationDecl {
    pub lhs: AccessDecl,
    pub rhs: ExprDecl,
    /// Root or parent dimension name to the dimension replacing it.
    #[serde(default)]
    pub subdomain: BTreeMap<String, String>,
    #[serde(default)]
    pub implicit_dims: Vec<String>,
}
