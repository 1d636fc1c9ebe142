//! Access comparison and dependence edges.
//!
//! For every pair of accesses to the same tensor where at least one is a
//! write, the offsets along each shared root are compared in loop order.
//! The first root with a non-zero (or unknown) distance carries the
//! dependence:
//! - Self edges (an equation reading what it writes) go from the write to
//!   the read: `A(x) = A(x-1)` is carried forward, `A(x) = A(x+1)` backward.
//! - Cross edges go from the earlier equation to the later one as flow
//!   (write, read), anti (read, write) or output (write, write).
//! - Along a time-like root the direction is fixed forward; a reader whose
//!   offset lies ahead of the writer's reads the future and is rejected.
//!
//! Offsets are compared against the shared root, so `u[xi - 1]` and
//! `u[x]` are one point apart whatever sub-range each is written through.

use std::collections::BTreeMap;
use std::fmt;

use stencil_ir::{Access, Condition, Dimension, DimensionKind, Dimensions, Handle, Index, Offset};

use crate::AnalysisError;
use crate::lower::LoweredEquation;

/// Order in which a loop visits its iteration points.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq)]
pub enum Direction {
    /// Increasing index (the natural order).
    #[default]
    Forward,
    /// Decreasing index.
    Backward,
}

impl Direction {
    fn of(distance: i64) -> Self {
        if distance > 0 { Self::Forward } else { Self::Backward }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Forward => "forward",
            Self::Backward => "backward",
        })
    }
}

/// The kind of a dependence between two accesses.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum DependenceKind {
    /// Read-after-write.
    Flow,
    /// Write-after-read.
    Anti,
    /// Write-after-write.
    Output,
}

impl fmt::Display for DependenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Flow => "RAW",
            Self::Anti => "WAR",
            Self::Output => "WAW",
        })
    }
}

/// Which loop, if any, carries a dependence.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum Carrier {
    /// Both accesses touch the same point in the same iteration; only
    /// statement order matters.
    Independent,
    /// Non-zero constant distance along `root`.
    Carried {
        root: Handle<Dimension>,
        direction: Direction,
    },
    /// Distance along `root` cannot be computed (symbolic offsets,
    /// different stride guards, or an unindexed loop).
    Unknown { root: Handle<Dimension> },
}

impl Carrier {
    pub fn root(self) -> Option<Handle<Dimension>> {
        match self {
            Self::Independent => None,
            Self::Carried { root, .. } | Self::Unknown { root } => Some(root),
        }
    }

    pub fn is_carried(self) -> bool {
        !matches!(self, Self::Independent)
    }

    pub fn is_unknown(self) -> bool {
        matches!(self, Self::Unknown { .. })
    }

    /// Required direction; unknown distances take the natural one.
    pub fn direction(self) -> Option<Direction> {
        match self {
            Self::Independent => None,
            Self::Carried { direction, .. } => Some(direction),
            Self::Unknown { .. } => Some(Direction::Forward),
        }
    }
}

/// A dependence between two equations (or an equation and itself).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DependenceEdge {
    /// Equation that must come first.
    pub source: usize,
    pub sink: usize,
    pub tensor: String,
    pub kind: DependenceKind,
    pub carrier: Carrier,
}

impl DependenceEdge {
    pub fn is_self(&self) -> bool {
        self.source == self.sink
    }
}

/// All dependence edges of a program.
#[derive(Clone, Debug, Default)]
pub struct DependenceGraph {
    edges: Vec<DependenceEdge>,
}

impl DependenceGraph {
    pub fn edges(&self) -> &[DependenceEdge] {
        &self.edges
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Edges whose endpoints both lie in `members`.
    pub fn within<'a>(&'a self, members: &'a [usize]) -> impl Iterator<Item = &'a DependenceEdge> {
        self.edges
            .iter()
            .filter(move |e| members.contains(&e.source) && members.contains(&e.sink))
    }

    /// Edges with one endpoint in `a` and the other in `b`.
    pub fn between<'a>(
        &'a self,
        a: &'a [usize],
        b: &'a [usize],
    ) -> impl Iterator<Item = &'a DependenceEdge> {
        self.edges.iter().filter(move |e| {
            (a.contains(&e.source) && b.contains(&e.sink))
                || (b.contains(&e.source) && a.contains(&e.sink))
        })
    }

    fn push(&mut self, edge: DependenceEdge) {
        if !self.edges.contains(&edge) {
            self.edges.push(edge);
        }
    }
}

/// The factor-conditional dimension an index strides through, if any.
/// Indices through different stride guards address different sequences.
fn stride(dims: &Dimensions, dim: Handle<Dimension>) -> Option<Handle<Dimension>> {
    let mut current = Some(dim);
    while let Some(d) = current {
        if let Some(Condition::Factor(_)) = dims[d].condition() {
            return Some(d);
        }
        current = dims.parent(d);
    }
    None
}

fn index_along<'a>(dims: &Dimensions, access: &'a Access, root: Handle<Dimension>) -> Option<&'a Index> {
    access.indices.iter().find(|i| dims.root(i.dim) == root)
}

/// `a - b` along one root, `None` when it cannot be known.
fn difference(dims: &Dimensions, a: &Index, b: &Index) -> Option<i64> {
    if stride(dims, a.dim) != stride(dims, b.dim) {
        return None;
    }
    match (&a.offset, &b.offset) {
        (Offset::Const(x), Offset::Const(y)) => x.checked_sub(*y),
        (x, y) if x == y => Some(0),
        _ => None,
    }
}

struct Pair<'a> {
    source: usize,
    sink: usize,
    kind: DependenceKind,
    /// Access performed by `source`.
    first: &'a Access,
    /// Access performed by `sink`.
    second: &'a Access,
}

struct Analyzer<'a> {
    dims: &'a Dimensions,
    graph: DependenceGraph,
}

impl Analyzer<'_> {
    /// Compares `pair` along `roots`, outer to inner, and records the edge.
    /// `unindexed` is the distance assumed when neither access indexes a
    /// root.
    fn compare(
        &mut self,
        pair: Pair<'_>,
        roots: &[Handle<Dimension>],
        unindexed: Option<i64>,
    ) -> Result<Option<Carrier>, AnalysisError> {
        let dims = self.dims;
        let mut carrier = Carrier::Independent;
        for &root in roots {
            let distance = match (
                index_along(dims, pair.first, root),
                index_along(dims, pair.second, root),
            ) {
                (Some(a), Some(b)) => difference(dims, a, b),
                (None, None) => unindexed,
                _ => None,
            };
            match distance {
                Some(0) => continue,
                None => {
                    carrier = Carrier::Unknown { root };
                }
                Some(d) if dims.is_time_like(root) => {
                    // Writer offset minus reader offset.
                    let ahead = match pair.kind {
                        DependenceKind::Flow => Some(d),
                        DependenceKind::Anti => d.checked_neg(),
                        DependenceKind::Output => None,
                    };
                    if ahead.is_some_and(|a| a < 0) {
                        let (writer, reader) = match pair.kind {
                            DependenceKind::Anti => (pair.sink, pair.source),
                            _ => (pair.source, pair.sink),
                        };
                        return Err(AnalysisError::IllegalDependence {
                            tensor: pair.first.tensor.clone(),
                            dimension: dims[root].name.clone(),
                            writer,
                            reader,
                            reason: "read of a value not yet written".into(),
                        });
                    }
                    carrier = Carrier::Carried {
                        root,
                        direction: Direction::Forward,
                    };
                }
                Some(d) => {
                    carrier = Carrier::Carried {
                        root,
                        direction: Direction::of(d),
                    };
                }
            }
            break;
        }

        if pair.source == pair.sink && !carrier.is_carried() {
            return Ok(None);
        }
        self.graph.push(DependenceEdge {
            source: pair.source,
            sink: pair.sink,
            tensor: pair.first.tensor.clone(),
            kind: pair.kind,
            carrier,
        });
        Ok(Some(carrier))
    }

    fn self_edges(&mut self, eq: &LoweredEquation) -> Result<(), AnalysisError> {
        let dims = self.dims;
        let roots = eq.roots(dims);
        let write = eq.write();
        let mut seen: BTreeMap<Handle<Dimension>, Direction> = BTreeMap::new();

        for read in eq.reads(dims) {
            if read.tensor != write.tensor {
                continue;
            }
            let pair = Pair {
                source: eq.index,
                sink: eq.index,
                kind: DependenceKind::Flow,
                first: write,
                second: read,
            };
            let Some(carrier) = self.compare(pair, &roots, None)? else {
                continue;
            };
            if let (Some(root), Some(direction)) = (carrier.root(), carrier.direction()) {
                match seen.insert(root, direction) {
                    Some(previous) if previous != direction => {
                        return Err(AnalysisError::IllegalDependence {
                            tensor: write.tensor.clone(),
                            dimension: dims[root].name.clone(),
                            writer: eq.index,
                            reader: eq.index,
                            reason: "reads on both sides require opposite directions".into(),
                        });
                    }
                    _ => {}
                }
            }
        }

        // Every point along a root the write does not index hits the same
        // element.
        if let Some(&root) = roots
            .iter()
            .find(|&&r| index_along(dims, write, r).is_none())
        {
            self.graph.push(DependenceEdge {
                source: eq.index,
                sink: eq.index,
                tensor: write.tensor.clone(),
                kind: DependenceKind::Output,
                carrier: Carrier::Unknown { root },
            });
        }
        Ok(())
    }

    fn cross_edges(&mut self, a: &LoweredEquation, b: &LoweredEquation) -> Result<(), AnalysisError> {
        let dims = self.dims;
        let b_roots = b.roots(dims);
        let roots: Vec<_> = a
            .roots(dims)
            .into_iter()
            .filter(|r| b_roots.contains(r))
            .collect();

        let (wa, wb) = (a.write(), b.write());
        let mut pairs = Vec::new();
        for read in b.reads(dims).into_iter().filter(|r| r.tensor == wa.tensor) {
            pairs.push(Pair {
                source: a.index,
                sink: b.index,
                kind: DependenceKind::Flow,
                first: wa,
                second: read,
            });
        }
        for read in a.reads(dims).into_iter().filter(|r| r.tensor == wb.tensor) {
            pairs.push(Pair {
                source: a.index,
                sink: b.index,
                kind: DependenceKind::Anti,
                first: read,
                second: wb,
            });
        }
        if wa.tensor == wb.tensor {
            pairs.push(Pair {
                source: a.index,
                sink: b.index,
                kind: DependenceKind::Output,
                first: wa,
                second: wb,
            });
        }
        for pair in pairs {
            self.compare(pair, &roots, Some(0))?;
        }
        Ok(())
    }
}

/// Rejects circular buffers too small for the time levels accessed through
/// them. Levels `lo..=hi` of one tensor need `hi - lo + 1` slots; with fewer,
/// `(time + hi) % modulo` and `(time + lo) % modulo` name the same slot.
fn check_buffers(dims: &Dimensions, equations: &[LoweredEquation]) -> Result<(), AnalysisError> {
    let mut spans: BTreeMap<(&str, Handle<Dimension>), (i64, i64)> = BTreeMap::new();
    for eq in equations {
        for access in std::iter::once(eq.write()).chain(eq.reads(dims)) {
            for index in &access.indices {
                let (DimensionKind::Stepping { .. }, Some(k)) =
                    (&dims[index.dim].kind, index.offset.as_const())
                else {
                    continue;
                };
                let span = spans
                    .entry((access.tensor.as_str(), index.dim))
                    .or_insert((k, k));
                span.0 = span.0.min(k);
                span.1 = span.1.max(k);
            }
        }
    }
    for ((tensor, dim), (lo, hi)) in spans {
        let modulo = dims[dim].modulo().unwrap_or(1);
        let levels = hi.saturating_sub(lo).saturating_add(1);
        if levels > i64::from(modulo) {
            return Err(AnalysisError::BufferTooSmall {
                tensor: tensor.to_string(),
                dimension: dims[dim].name.clone(),
                levels,
                modulo,
            });
        }
    }
    Ok(())
}

/// Derives every dependence edge among `equations`.
pub fn analyze(
    dims: &Dimensions,
    equations: &[LoweredEquation],
) -> Result<DependenceGraph, AnalysisError> {
    check_buffers(dims, equations)?;
    let mut analyzer = Analyzer {
        dims,
        graph: DependenceGraph::default(),
    };
    for eq in equations {
        analyzer.self_edges(eq)?;
    }
    for (i, a) in equations.iter().enumerate() {
        for b in &equations[i + 1..] {
            analyzer.cross_edges(a, b)?;
        }
    }
    log::debug!(
        "dependence analysis: {} equations, {} edges",
        equations.len(),
        analyzer.graph.edge_count()
    );
    Ok(analyzer.graph)
}
