//! Per-loop direction and parallelism classification.

use std::fmt;

use stencil_ir::{Dimension, Dimensions, Handle};

use crate::dependence::{DependenceGraph, Direction};
use crate::lower::LoweredEquation;

/// Bitflags describing a loop level.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq)]
pub struct Properties(u8);

impl Properties {
    pub const EMPTY: Self = Self(0);
    /// No dependence is carried at this level.
    pub const PARALLEL: Self = Self(1);
    /// Iterations must run in the loop's direction.
    pub const SEQUENTIAL: Self = Self(2);
    /// Every access offset along the level is an integer constant.
    pub const AFFINE: Self = Self(4);
    /// Parallel, affine and innermost.
    pub const VECTORIZABLE: Self = Self(8);

    /// Returns `true` if `self` contains all flags in `other`.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for Properties {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for Properties {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for Properties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Self::PARALLEL, "parallel"),
            (Self::SEQUENTIAL, "sequential"),
            (Self::AFFINE, "affine"),
            (Self::VECTORIZABLE, "vector"),
        ];
        let set: Vec<&str> = names
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        f.write_str(&set.join(","))
    }
}

/// Directions demanded of one loop level by the edges it carries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Constraints {
    pub forward: bool,
    pub backward: bool,
    /// Some carried distance is unknown (counted as forward).
    pub unknown: bool,
}

impl Constraints {
    /// Constraints along `root` from edges with both endpoints in `members`.
    pub fn collect(graph: &DependenceGraph, members: &[usize], root: Handle<Dimension>) -> Self {
        graph
            .within(members)
            .filter(|e| e.carrier.root() == Some(root))
            .fold(Self::default(), |acc, e| acc.merge(Self::of_carrier(e.carrier)))
    }

    pub fn of_carrier(carrier: crate::Carrier) -> Self {
        Self {
            forward: carrier.direction() == Some(Direction::Forward),
            backward: carrier.direction() == Some(Direction::Backward),
            unknown: carrier.is_unknown(),
        }
    }

    pub fn merge(self, other: Self) -> Self {
        Self {
            forward: self.forward || other.forward,
            backward: self.backward || other.backward,
            unknown: self.unknown || other.unknown,
        }
    }

    pub fn is_carried(self) -> bool {
        self.forward || self.backward
    }

    pub fn is_consistent(self) -> bool {
        !(self.forward && self.backward)
    }

    /// The single required direction, if any is required and consistent.
    pub fn direction(self) -> Option<Direction> {
        match (self.forward, self.backward) {
            (true, false) => Some(Direction::Forward),
            (false, true) => Some(Direction::Backward),
            _ => None,
        }
    }
}

/// Returns `true` if every access of `equations` along `root` has a
/// constant offset.
pub fn is_affine<'a>(
    dims: &Dimensions,
    equations: impl IntoIterator<Item = &'a LoweredEquation>,
    root: Handle<Dimension>,
) -> bool {
    equations.into_iter().all(|eq| {
        std::iter::once(eq.write())
            .chain(eq.reads(dims))
            .flat_map(|a| a.indices.iter())
            .filter(|i| dims.root(i.dim) == root)
            .all(|i| i.offset.is_affine())
    })
}

/// Facts about a loop level besides the edges it carries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Level {
    /// Every offset along the level is constant.
    pub affine: bool,
    /// No loop nests below this one.
    pub innermost: bool,
    /// The level runs a time-like root.
    pub time_like: bool,
}

/// Direction and tags of one loop level.
///
/// Time-like levels always step forward in sequence, carried or not.
/// `vectorize` gates [`Properties::VECTORIZABLE`]; callers resolve
/// inconsistent constraints before classifying.
pub fn classify_level(constraints: Constraints, level: Level, vectorize: bool) -> (Direction, Properties) {
    let mut props = if level.affine {
        Properties::AFFINE
    } else {
        Properties::EMPTY
    };
    if level.time_like {
        (Direction::Forward, props | Properties::SEQUENTIAL)
    } else if constraints.is_carried() {
        props |= Properties::SEQUENTIAL;
        (constraints.direction().unwrap_or_default(), props)
    } else {
        props |= Properties::PARALLEL;
        if vectorize && level.innermost && level.affine {
            props |= Properties::VECTORIZABLE;
        }
        (Direction::Forward, props)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependence::analyze;
    use crate::lower::lower;
    use stencil_ir::{Access, Equation, Expr, Index, Program};

    #[test]
    fn properties_flags() {
        let p = Properties::PARALLEL | Properties::AFFINE;
        assert!(p.contains(Properties::PARALLEL));
        assert!(!p.contains(Properties::SEQUENTIAL));
        assert_eq!(p.to_string(), "parallel,affine");
        assert!(Properties::EMPTY.is_empty());
    }

    const INNER: Level = Level {
        affine: true,
        innermost: true,
        time_like: false,
    };

    #[test]
    fn no_constraints_is_parallel() {
        let (dir, props) = classify_level(Constraints::default(), INNER, true);
        assert_eq!(dir, Direction::Forward);
        assert!(props.contains(Properties::PARALLEL | Properties::VECTORIZABLE));
        let outer = Level {
            innermost: false,
            ..INNER
        };
        let (_, props) = classify_level(Constraints::default(), outer, true);
        assert!(!props.contains(Properties::VECTORIZABLE));
        let (_, props) = classify_level(Constraints::default(), INNER, false);
        assert!(!props.contains(Properties::VECTORIZABLE));
    }

    #[test]
    fn time_like_level_is_never_parallel() {
        let time = Level {
            time_like: true,
            ..INNER
        };
        let (dir, props) = classify_level(Constraints::default(), time, true);
        assert_eq!(dir, Direction::Forward);
        assert_eq!(props, Properties::SEQUENTIAL | Properties::AFFINE);
    }

    #[test]
    fn backward_constraint_is_sequential_backward() {
        let c = Constraints {
            backward: true,
            ..Constraints::default()
        };
        let (dir, props) = classify_level(c, INNER, true);
        assert_eq!(dir, Direction::Backward);
        assert!(props.contains(Properties::SEQUENTIAL));
        assert!(!props.contains(Properties::VECTORIZABLE));
    }

    #[test]
    fn conflicting_constraints() {
        let f = Constraints {
            forward: true,
            ..Constraints::default()
        };
        let b = Constraints {
            backward: true,
            ..Constraints::default()
        };
        assert!(!f.merge(b).is_consistent());
        assert_eq!(f.merge(b).direction(), None);
    }

    #[test]
    fn symbolic_offset_is_not_affine() {
        let mut program = Program::default();
        let x = program.dimensions.space("x", None).unwrap();
        program.push(Equation::new(
            Access::new("u", vec![Index::at(x)]),
            Access::new("v", vec![Index::symbolic(x, Expr::symbol("s"))]),
        ));
        let lowered = lower(&program).unwrap();
        assert!(!is_affine(&program.dimensions, &lowered, x));

        let graph = analyze(&program.dimensions, &lowered).unwrap();
        assert_eq!(Constraints::collect(&graph, &[0], x), Constraints::default());
    }
}
