//! Iteration dimensions and their derivation DAG.
//!
//! Every dimension is either a root (space or time) or derives from a
//! parent: a sub-range ([`DimensionKind::Sub`]), a guarded subset
//! ([`DimensionKind::Conditional`]) or a circular buffer index
//! ([`DimensionKind::Stepping`]). Dimensions live in a [`Dimensions`] arena
//! and are referenced by [`Handle`]; they are never mutated after creation.

use std::collections::BTreeSet;
use std::ops::Index;

use crate::arena::{Arena, Handle};
use crate::error::IrError;
use crate::expr::Expr;

/// Which side of its parent a sub-dimension covers.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum SubSide {
    /// `parent.min .. parent.min + left - 1`
    Left,
    /// `parent.max - right + 1 .. parent.max`
    Right,
    /// `parent.min + left .. parent.max - right`
    Middle,
}

/// Default thickness of a sub-dimension. Overridable at invocation time
/// through the `<name>_ltkn` / `<name>_rtkn` parameters.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct Thickness {
    pub left: i64,
    pub right: i64,
}

/// What gates a conditional dimension.
#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    /// Execute every `factor`-th point of the parent. `None` takes the
    /// default stride configured for the scheduling pass.
    Factor(Option<i64>),
    /// Execute where the predicate holds.
    Predicate(Expr),
}

#[derive(Clone, Debug, PartialEq)]
pub enum DimensionKind {
    Space { size: Option<u64> },
    Time { size: Option<u64> },
    /// Logical index mapped onto a buffer of `modulo` slots.
    Stepping { modulo: u32 },
    Sub { side: SubSide, thickness: Thickness },
    Conditional(Condition),
}

/// An iteration dimension.
#[derive(Clone, Debug, PartialEq)]
pub struct Dimension {
    pub name: String,
    /// `None` only for roots.
    pub parent: Option<Handle<Dimension>>,
    pub kind: DimensionKind,
}

impl Dimension {
    pub fn parent(&self) -> Option<Handle<Dimension>> {
        self.parent
    }

    pub fn is_conditional(&self) -> bool {
        matches!(self.kind, DimensionKind::Conditional(_))
    }

    pub fn is_stepping(&self) -> bool {
        matches!(self.kind, DimensionKind::Stepping { .. })
    }

    pub fn condition(&self) -> Option<&Condition> {
        match &self.kind {
            DimensionKind::Conditional(condition) => Some(condition),
            _ => None,
        }
    }

    pub fn modulo(&self) -> Option<u32> {
        match self.kind {
            DimensionKind::Stepping { modulo } => Some(modulo),
            _ => None,
        }
    }

    /// Lower-bound override symbol, `<name>_m`.
    pub fn min_symbol(&self) -> String {
        format!("{}_m", self.name)
    }

    /// Upper-bound override symbol, `<name>_M`.
    pub fn max_symbol(&self) -> String {
        format!("{}_M", self.name)
    }

    pub fn left_thickness_symbol(&self) -> String {
        format!("{}_ltkn", self.name)
    }

    pub fn right_thickness_symbol(&self) -> String {
        format!("{}_rtkn", self.name)
    }

    pub fn factor_symbol(&self) -> String {
        format!("{}_factor", self.name)
    }
}

/// Role of an invocation-time parameter.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub enum ParameterKind {
    Min,
    Max,
    LeftThickness,
    RightThickness,
    Factor,
}

/// A symbolic parameter a dimension contributes to generated code. The
/// scheduler preserves names and defaults; values are bound at run time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub kind: ParameterKind,
    pub dimension: Handle<Dimension>,
    pub default: Option<i64>,
}

/// Arena of all dimensions known to a program.
#[derive(Clone, Debug, Default)]
pub struct Dimensions {
    arena: Arena<Dimension>,
}

impl Dimensions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle<Dimension>, &Dimension)> {
        self.arena.iter()
    }

    pub fn get(&self, dim: Handle<Dimension>) -> Option<&Dimension> {
        self.arena.try_get(dim)
    }

    pub fn find(&self, name: &str) -> Option<Handle<Dimension>> {
        self.arena
            .iter()
            .find(|(_, d)| d.name == name)
            .map(|(h, _)| h)
    }

    /// Fails with [`IrError::BadHandle`] if `dim` was not issued by this arena.
    pub fn check(&self, dim: Handle<Dimension>) -> Result<(), IrError> {
        if self.arena.contains(dim) {
            Ok(())
        } else {
            Err(IrError::BadHandle {
                index: dim.index(),
                size: self.arena.len(),
            })
        }
    }

    pub fn space(&mut self, name: &str, size: Option<u64>) -> Result<Handle<Dimension>, IrError> {
        self.insert(name, None, DimensionKind::Space { size })
    }

    pub fn time(&mut self, name: &str, size: Option<u64>) -> Result<Handle<Dimension>, IrError> {
        self.insert(name, None, DimensionKind::Time { size })
    }

    pub fn stepping(
        &mut self,
        name: &str,
        parent: Handle<Dimension>,
        modulo: u32,
    ) -> Result<Handle<Dimension>, IrError> {
        if modulo == 0 {
            return Err(IrError::malformed(name, "buffer modulo must be positive"));
        }
        self.insert(name, Some(parent), DimensionKind::Stepping { modulo })
    }

    pub fn sub_left(
        &mut self,
        name: &str,
        parent: Handle<Dimension>,
        thickness: i64,
    ) -> Result<Handle<Dimension>, IrError> {
        self.sub(name, parent, SubSide::Left, thickness, 0)
    }

    pub fn sub_right(
        &mut self,
        name: &str,
        parent: Handle<Dimension>,
        thickness: i64,
    ) -> Result<Handle<Dimension>, IrError> {
        self.sub(name, parent, SubSide::Right, 0, thickness)
    }

    pub fn sub_middle(
        &mut self,
        name: &str,
        parent: Handle<Dimension>,
        left: i64,
        right: i64,
    ) -> Result<Handle<Dimension>, IrError> {
        self.sub(name, parent, SubSide::Middle, left, right)
    }

    /// Creates a sub-dimension of `parent`. Thickness on the side a left or
    /// right sub-dimension does not pin is ignored.
    pub fn sub(
        &mut self,
        name: &str,
        parent: Handle<Dimension>,
        side: SubSide,
        left: i64,
        right: i64,
    ) -> Result<Handle<Dimension>, IrError> {
        self.check(parent)?;
        let (left, right) = match side {
            SubSide::Left => (left, 0),
            SubSide::Right => (0, right),
            SubSide::Middle => (left, right),
        };
        if left < 0 || right < 0 {
            return Err(IrError::malformed(name, "thickness must be non-negative"));
        }
        let parent_dim = &self.arena[parent];
        if parent_dim.is_conditional() || parent_dim.is_stepping() {
            return Err(IrError::malformed(
                name,
                format!(
                    "cannot restrict conditional or stepping dimension '{}'",
                    parent_dim.name
                ),
            ));
        }
        if let Some(size) = self.static_size(parent) {
            let total = left.checked_add(right).and_then(|t| u64::try_from(t).ok());
            if total.is_none_or(|t| t > size) {
                return Err(IrError::malformed(
                    name,
                    format!(
                        "thickness {left}+{right} exceeds size {size} of '{}'",
                        self.arena[parent].name
                    ),
                ));
            }
        }
        self.insert(
            name,
            Some(parent),
            DimensionKind::Sub {
                side,
                thickness: Thickness { left, right },
            },
        )
    }

    /// Creates a conditional dimension gated either by a stride `factor` or
    /// by a `condition`; supplying both is malformed, supplying neither
    /// takes the configured default stride.
    pub fn conditional(
        &mut self,
        name: &str,
        parent: Handle<Dimension>,
        factor: Option<i64>,
        condition: Option<Expr>,
    ) -> Result<Handle<Dimension>, IrError> {
        let condition = match (factor, condition) {
            (Some(_), Some(_)) => {
                return Err(IrError::malformed(
                    name,
                    "both a stride factor and a condition were supplied",
                ));
            }
            (Some(f), None) if f <= 0 => {
                return Err(IrError::malformed(
                    name,
                    format!("stride factor must be positive, got {f}"),
                ));
            }
            (factor, None) => Condition::Factor(factor),
            (None, Some(predicate)) => {
                for dim in predicate.dimensions() {
                    self.check(dim)?;
                }
                Condition::Predicate(predicate)
            }
        };
        self.insert(name, Some(parent), DimensionKind::Conditional(condition))
    }

    fn insert(
        &mut self,
        name: &str,
        parent: Option<Handle<Dimension>>,
        kind: DimensionKind,
    ) -> Result<Handle<Dimension>, IrError> {
        if name.is_empty() {
            return Err(IrError::malformed(name, "empty name"));
        }
        if self.find(name).is_some() {
            return Err(IrError::malformed(name, "name already in use"));
        }
        if let Some(parent) = parent {
            self.check(parent)?;
        }
        Ok(self.arena.append(Dimension {
            name: name.to_string(),
            parent,
            kind,
        }))
    }

    pub fn parent(&self, dim: Handle<Dimension>) -> Option<Handle<Dimension>> {
        self.arena[dim].parent
    }

    /// The root this dimension ultimately derives from.
    pub fn root(&self, dim: Handle<Dimension>) -> Handle<Dimension> {
        let mut current = dim;
        while let Some(parent) = self.arena[current].parent {
            current = parent;
        }
        current
    }

    /// Returns `true` if `ancestor` is `dim` or one of its ancestors.
    pub fn is_derived_from(&self, dim: Handle<Dimension>, ancestor: Handle<Dimension>) -> bool {
        let mut current = Some(dim);
        while let Some(d) = current {
            if d == ancestor {
                return true;
            }
            current = self.arena[d].parent;
        }
        false
    }

    /// The dimension a loop is emitted for when iterating `dim`: roots and
    /// sub-dimensions iterate themselves, stepping and conditional
    /// dimensions ride on their parent's loop.
    pub fn loop_dimension(&self, dim: Handle<Dimension>) -> Handle<Dimension> {
        let d = &self.arena[dim];
        match (&d.kind, d.parent) {
            (DimensionKind::Stepping { .. } | DimensionKind::Conditional(_), Some(parent)) => {
                self.loop_dimension(parent)
            }
            _ => dim,
        }
    }

    /// Time-like dimensions have a fixed forward direction.
    pub fn is_time_like(&self, dim: Handle<Dimension>) -> bool {
        matches!(self.arena[self.root(dim)].kind, DimensionKind::Time { .. })
    }

    /// Extent known at construction time, if any.
    pub fn static_size(&self, dim: Handle<Dimension>) -> Option<u64> {
        let d = &self.arena[dim];
        match &d.kind {
            DimensionKind::Space { size } | DimensionKind::Time { size } => *size,
            DimensionKind::Stepping { .. } | DimensionKind::Conditional(_) => {
                d.parent.and_then(|p| self.static_size(p))
            }
            DimensionKind::Sub { side, thickness } => match side {
                SubSide::Left => u64::try_from(thickness.left).ok(),
                SubSide::Right => u64::try_from(thickness.right).ok(),
                SubSide::Middle => {
                    let parent = self.static_size(d.parent?)?;
                    let used = u64::try_from(thickness.left.checked_add(thickness.right)?).ok()?;
                    parent.checked_sub(used)
                }
            },
        }
    }

    /// Inclusive symbolic lower bound.
    pub fn symbolic_min(&self, dim: Handle<Dimension>) -> Expr {
        let d = &self.arena[dim];
        let Some(parent) = d.parent else {
            return Expr::symbol(d.min_symbol());
        };
        match &d.kind {
            DimensionKind::Sub { side, .. } => match side {
                SubSide::Left => self.symbolic_min(parent),
                SubSide::Middle => {
                    self.symbolic_min(parent) + Expr::symbol(d.left_thickness_symbol())
                }
                SubSide::Right => {
                    self.symbolic_max(parent) - Expr::symbol(d.right_thickness_symbol()) + 1
                }
            },
            _ => self.symbolic_min(parent),
        }
    }

    /// Inclusive symbolic upper bound.
    pub fn symbolic_max(&self, dim: Handle<Dimension>) -> Expr {
        let d = &self.arena[dim];
        let Some(parent) = d.parent else {
            return Expr::symbol(d.max_symbol());
        };
        match &d.kind {
            DimensionKind::Sub { side, .. } => match side {
                SubSide::Left => {
                    self.symbolic_min(parent) + Expr::symbol(d.left_thickness_symbol()) - 1
                }
                SubSide::Middle => {
                    self.symbolic_max(parent) - Expr::symbol(d.right_thickness_symbol())
                }
                SubSide::Right => self.symbolic_max(parent),
            },
            _ => self.symbolic_max(parent),
        }
    }

    /// Number of points, derived algebraically from the bounds.
    pub fn symbolic_size(&self, dim: Handle<Dimension>) -> Expr {
        let d = &self.arena[dim];
        match (&d.kind, d.parent) {
            (DimensionKind::Sub { side, .. }, Some(parent)) => match side {
                SubSide::Left => Expr::symbol(d.left_thickness_symbol()),
                SubSide::Right => Expr::symbol(d.right_thickness_symbol()),
                SubSide::Middle => {
                    self.symbolic_max(parent)
                        - self.symbolic_min(parent)
                        - Expr::symbol(d.left_thickness_symbol())
                        - Expr::symbol(d.right_thickness_symbol())
                        + 1
                }
            },
            _ => self.symbolic_max(dim) - self.symbolic_min(dim) + 1,
        }
    }

    /// Free scalar symbols of a conditional dimension's predicate.
    pub fn condition_variables(&self, dim: Handle<Dimension>) -> BTreeSet<String> {
        match self.arena[dim].condition() {
            Some(Condition::Predicate(predicate)) => predicate.free_symbols(),
            _ => BTreeSet::new(),
        }
    }

    /// Dimensions referenced by a conditional dimension's predicate.
    pub fn condition_dimensions(&self, dim: Handle<Dimension>) -> Vec<Handle<Dimension>> {
        match self.arena[dim].condition() {
            Some(Condition::Predicate(predicate)) => predicate.dimensions(),
            _ => Vec::new(),
        }
    }

    /// Invocation-time parameters introduced by `dim` itself (not its
    /// ancestors).
    pub fn parameters(&self, dim: Handle<Dimension>) -> Vec<Parameter> {
        let d = &self.arena[dim];
        let param = |name: String, kind, default| Parameter {
            name,
            kind,
            dimension: dim,
            default,
        };
        match &d.kind {
            DimensionKind::Space { size } | DimensionKind::Time { size } => vec![
                param(d.min_symbol(), ParameterKind::Min, Some(0)),
                param(
                    d.max_symbol(),
                    ParameterKind::Max,
                    size.and_then(|s| i64::try_from(s).ok()).map(|s| s - 1),
                ),
            ],
            DimensionKind::Stepping { .. } => Vec::new(),
            DimensionKind::Sub { side, thickness } => {
                let left = param(
                    d.left_thickness_symbol(),
                    ParameterKind::LeftThickness,
                    Some(thickness.left),
                );
                let right = param(
                    d.right_thickness_symbol(),
                    ParameterKind::RightThickness,
                    Some(thickness.right),
                );
                match side {
                    SubSide::Left => vec![left],
                    SubSide::Right => vec![right],
                    SubSide::Middle => vec![left, right],
                }
            }
            DimensionKind::Conditional(Condition::Factor(factor)) => {
                vec![param(d.factor_symbol(), ParameterKind::Factor, *factor)]
            }
            DimensionKind::Conditional(Condition::Predicate(_)) => Vec::new(),
        }
    }
}

impl Index<Handle<Dimension>> for Dimensions {
    type Output = Dimension;

    fn index(&self, handle: Handle<Dimension>) -> &Dimension {
        &self.arena[handle]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> (Dimensions, Handle<Dimension>, Handle<Dimension>) {
        let mut dims = Dimensions::new();
        let time = dims.time("time", None).unwrap();
        let x = dims.space("x", Some(4)).unwrap();
        (dims, time, x)
    }

    #[test]
    fn roots_have_no_parent() {
        let (dims, time, x) = grid();
        assert_eq!(dims.parent(time), None);
        assert_eq!(dims.parent(x), None);
        assert_eq!(dims.root(x), x);
        assert!(dims.is_time_like(time));
        assert!(!dims.is_time_like(x));
    }

    #[test]
    fn sub_bounds() {
        let (mut dims, _, x) = grid();
        let xl = dims.sub_left("xl", x, 2).unwrap();
        let xi = dims.sub_middle("xi", x, 1, 1).unwrap();
        let xr = dims.sub_right("xr", x, 2).unwrap();

        let s = Expr::symbol;
        assert_eq!(dims.symbolic_min(xl), s("x_m"));
        assert_eq!(dims.symbolic_max(xl), s("x_m") + s("xl_ltkn") - 1);
        assert_eq!(dims.symbolic_min(xi), s("x_m") + s("xi_ltkn"));
        assert_eq!(dims.symbolic_max(xi), s("x_M") - s("xi_rtkn"));
        assert_eq!(dims.symbolic_min(xr), s("x_M") - s("xr_rtkn") + 1);
        assert_eq!(dims.symbolic_max(xr), s("x_M"));
    }

    #[test]
    fn symbolic_size() {
        let (mut dims, _, x) = grid();
        let xl = dims.sub_left("xleft", x, 4).unwrap();
        let xi = dims.sub_middle("xi", x, 1, 1).unwrap();
        let xr = dims.sub_right("xright", x, 4).unwrap();
        let s = Expr::symbol;
        assert_eq!(dims.symbolic_size(xl), s("xleft_ltkn"));
        assert_eq!(dims.symbolic_size(xr), s("xright_rtkn"));
        assert_eq!(
            dims.symbolic_size(xi),
            s("x_M") - s("x_m") - s("xi_ltkn") - s("xi_rtkn") + 1
        );
        assert_eq!(dims.static_size(xi), Some(2));
    }

    #[test]
    fn middle_thickness_exceeding_parent_is_malformed() {
        let (mut dims, _, x) = grid();
        let err = dims.sub_middle("xi", x, 3, 2).unwrap_err();
        assert!(matches!(err, IrError::MalformedDimension { .. }));
        // Exactly the parent size leaves an empty range, which is allowed.
        assert!(dims.sub_middle("xj", x, 2, 2).is_ok());
        // Unknown parent size cannot be checked.
        let mut dims = Dimensions::new();
        let y = dims.space("y", None).unwrap();
        assert!(dims.sub_middle("yi", y, 100, 100).is_ok());
    }

    #[test]
    fn conditional_with_factor_and_condition_is_malformed() {
        let (mut dims, time, _) = grid();
        let err = dims
            .conditional("c", time, Some(2), Some(Expr::dim(time).lt(Expr::int(5))))
            .unwrap_err();
        assert!(err.to_string().contains("both a stride factor and a condition"));
        assert!(dims.conditional("c", time, Some(0), None).is_err());
        assert!(dims.conditional("c", time, None, None).is_ok());
    }

    #[test]
    fn duplicate_names_rejected() {
        let (mut dims, _, _) = grid();
        assert!(dims.space("x", None).is_err());
    }

    #[test]
    fn loop_dimension_skips_stepping_and_conditional() {
        let (mut dims, time, x) = grid();
        let t = dims.stepping("t", time, 2).unwrap();
        let tsub = dims.conditional("tsub", time, Some(4), None).unwrap();
        let xi = dims.sub_middle("xi", x, 1, 1).unwrap();
        let xsub = dims.conditional("xsub", xi, Some(2), None).unwrap();
        assert_eq!(dims.loop_dimension(t), time);
        assert_eq!(dims.loop_dimension(tsub), time);
        assert_eq!(dims.loop_dimension(xi), xi);
        assert_eq!(dims.loop_dimension(xsub), xi);
        assert_eq!(dims.root(xsub), x);
        assert!(dims.is_derived_from(xsub, x));
        assert!(!dims.is_derived_from(x, xsub));
    }

    #[test]
    fn condition_variables() {
        let (mut dims, time, x) = grid();
        let stop = Expr::symbol("stop");
        let c = dims
            .conditional("c", time, None, Some(Expr::dim(x).gt(stop)))
            .unwrap();
        assert_eq!(
            dims.condition_variables(c).into_iter().collect::<Vec<_>>(),
            vec!["stop"]
        );
        assert_eq!(dims.condition_dimensions(c), vec![x]);
    }

    #[test]
    fn parameters_keep_names_and_defaults() {
        let (mut dims, time, x) = grid();
        let xi = dims.sub_middle("xi", x, 1, 2).unwrap();
        let tsub = dims.conditional("tsub", time, Some(4), None).unwrap();
        let names: Vec<_> = dims
            .parameters(xi)
            .into_iter()
            .map(|p| (p.name, p.default))
            .collect();
        assert_eq!(
            names,
            vec![
                ("xi_ltkn".to_string(), Some(1)),
                ("xi_rtkn".to_string(), Some(2))
            ]
        );
        assert_eq!(dims.parameters(tsub)[0].name, "tsub_factor");
        assert_eq!(dims.parameters(x)[1].default, Some(3));
        assert_eq!(dims.parameters(time)[1].default, None);
    }
}
