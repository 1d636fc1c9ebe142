//! Loop-nest construction.
//!
//! Clusters are inserted one by one, in execution order, along their path
//! of loops and guards. A step reuses the last node at its position when
//! it is the same loop (or the exact same guard predicate) and sharing
//! keeps every dependence satisfied; anything else opens a new sibling.
//! Only the last child is ever reused, so sibling order is execution order.

use std::fmt::Write as _;

use stencil_analysis::{
    Constraints, DependenceGraph, Direction, Level, LoweredEquation, Properties, Signature,
    classify_level, is_affine,
};
use stencil_ir::{Condition, Dimension, DimensionKind, Dimensions, Expr, Handle, Parameter, Program};

use crate::Options;
use crate::bounds::{BoundsTable, Interval};
use crate::cluster::Cluster;
use crate::guard::Guard;
use crate::resolve::Resolver;

/// A node of the schedule tree.
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Loop(LoopNode),
    Guard(GuardNode),
    Statement(StatementNode),
}

/// A loop over one dimension.
#[derive(Clone, Debug, PartialEq)]
pub struct LoopNode {
    pub dim: Handle<Dimension>,
    pub bounds: Interval,
    pub direction: Direction,
    pub properties: Properties,
    /// Clusters with statements somewhere beneath this loop.
    pub clusters: Vec<usize>,
    pub body: Vec<Node>,
    constraints: Constraints,
}

impl LoopNode {
    pub fn is_parallel(&self) -> bool {
        self.properties.contains(Properties::PARALLEL)
    }

    pub fn is_sequential(&self) -> bool {
        self.properties.contains(Properties::SEQUENTIAL)
    }

    pub fn is_vectorizable(&self) -> bool {
        self.properties.contains(Properties::VECTORIZABLE)
    }
}

/// A conditional region.
#[derive(Clone, Debug, PartialEq)]
pub struct GuardNode {
    pub predicate: Expr,
    /// Conditional dimensions the predicate stands for.
    pub conditions: Vec<Handle<Dimension>>,
    pub body: Vec<Node>,
}

impl GuardNode {
    /// Loop paths inside this guard.
    pub fn iteration_trees(&self) -> Vec<Vec<&LoopNode>> {
        iteration_trees(&self.body)
    }
}

/// One equation instance with every index resolved to loop variables.
#[derive(Clone, Debug, PartialEq)]
pub struct StatementNode {
    pub equation: usize,
    pub cluster: usize,
    /// An [`Expr::Element`].
    pub lhs: Expr,
    pub rhs: Expr,
}

/// Per-dimension bounds and direction of a cluster.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IterationSpace {
    pub dims: Vec<(Handle<Dimension>, Interval, Direction)>,
}

/// Summary of one cluster as scheduled.
#[derive(Clone, Debug, PartialEq)]
pub struct ClusterInfo {
    pub equations: Vec<usize>,
    pub signature: Signature,
    pub space: IterationSpace,
    /// Resolved guard predicates, outermost first.
    pub guards: Vec<Expr>,
}

/// The scheduled program.
#[derive(Clone, Debug, PartialEq)]
pub struct ScheduleTree {
    pub roots: Vec<Node>,
    /// Invocation-time parameters, in dimension order.
    pub parameters: Vec<Parameter>,
    /// Clusters in execution order.
    pub clusters: Vec<ClusterInfo>,
}

/// Every root-to-innermost loop path under `nodes`; guards are transparent.
fn iteration_trees(nodes: &[Node]) -> Vec<Vec<&LoopNode>> {
    fn walk<'a>(nodes: &'a [Node], path: &mut Vec<&'a LoopNode>, out: &mut Vec<Vec<&'a LoopNode>>) {
        for node in nodes {
            match node {
                Node::Loop(l) => {
                    path.push(l);
                    if contains_loop(&l.body) {
                        walk(&l.body, path, out);
                    } else {
                        out.push(path.clone());
                    }
                    path.pop();
                }
                Node::Guard(g) => walk(&g.body, path, out),
                Node::Statement(_) => {}
            }
        }
    }
    let mut out = Vec::new();
    walk(nodes, &mut Vec::new(), &mut out);
    out
}

fn contains_loop(nodes: &[Node]) -> bool {
    nodes.iter().any(|n| match n {
        Node::Loop(_) => true,
        Node::Guard(g) => contains_loop(&g.body),
        Node::Statement(_) => false,
    })
}

impl ScheduleTree {
    /// Every root-to-innermost loop path.
    pub fn iteration_trees(&self) -> Vec<Vec<&LoopNode>> {
        iteration_trees(&self.roots)
    }

    /// Guard constructs in pre-order.
    pub fn guards(&self) -> Vec<&GuardNode> {
        fn walk<'a>(nodes: &'a [Node], out: &mut Vec<&'a GuardNode>) {
            for node in nodes {
                match node {
                    Node::Loop(l) => walk(&l.body, out),
                    Node::Guard(g) => {
                        out.push(g);
                        walk(&g.body, out);
                    }
                    Node::Statement(_) => {}
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.roots, &mut out);
        out
    }

    /// Loops in pre-order.
    pub fn loops(&self) -> Vec<&LoopNode> {
        fn walk<'a>(nodes: &'a [Node], out: &mut Vec<&'a LoopNode>) {
            for node in nodes {
                match node {
                    Node::Loop(l) => {
                        out.push(l);
                        walk(&l.body, out);
                    }
                    Node::Guard(g) => walk(&g.body, out),
                    Node::Statement(_) => {}
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.roots, &mut out);
        out
    }

    /// Statements in execution order.
    pub fn statements(&self) -> Vec<&StatementNode> {
        fn walk<'a>(nodes: &'a [Node], out: &mut Vec<&'a StatementNode>) {
            for node in nodes {
                match node {
                    Node::Loop(l) => walk(&l.body, out),
                    Node::Guard(g) => walk(&g.body, out),
                    Node::Statement(s) => out.push(s),
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.roots, &mut out);
        out
    }

    /// Human-readable dump of the tree.
    pub fn dump(&self, dims: &Dimensions) -> String {
        fn walk(out: &mut String, nodes: &[Node], dims: &Dimensions, depth: usize) {
            let pad = "  ".repeat(depth);
            for node in nodes {
                match node {
                    Node::Loop(l) => {
                        let _ = writeln!(
                            out,
                            "{pad}for {} in {} {} <{}>",
                            dims[l.dim].name,
                            l.bounds.display(dims),
                            l.direction,
                            l.properties
                        );
                        walk(out, &l.body, dims, depth + 1);
                    }
                    Node::Guard(g) => {
                        let _ = writeln!(out, "{pad}if {}", g.predicate.display(dims));
                        walk(out, &g.body, dims, depth + 1);
                    }
                    Node::Statement(s) => {
                        let _ = writeln!(
                            out,
                            "{pad}e{}: {} = {}",
                            s.equation,
                            s.lhs.display(dims),
                            s.rhs.display(dims)
                        );
                    }
                }
            }
        }

        let mut out = String::new();
        walk(&mut out, &self.roots, dims, 0);
        if !self.parameters.is_empty() {
            out.push_str("\nParameters:\n");
            for p in &self.parameters {
                match p.default {
                    Some(v) => {
                        let _ = writeln!(out, "  {} = {v}", p.name);
                    }
                    None => {
                        let _ = writeln!(out, "  {}", p.name);
                    }
                }
            }
        }
        out
    }
}

enum Step {
    Loop(usize),
    Guard(usize),
}

struct Builder<'a> {
    dims: &'a Dimensions,
    lowered: &'a [LoweredEquation],
    graph: &'a DependenceGraph,
    clusters: &'a [Cluster],
    guards: &'a [Vec<Guard>],
    options: &'a Options,
    bounds: BoundsTable,
}

impl Builder<'_> {
    fn equations_of(&self, clusters: &[usize]) -> Vec<usize> {
        clusters
            .iter()
            .flat_map(|&c| self.clusters[c].equations.iter().copied())
            .collect()
    }

    /// Whether cluster `c` may join the loop `node` over `root`, and the
    /// merged constraints if so.
    fn share(&self, node: &LoopNode, c: usize, root: Handle<Dimension>) -> Option<Constraints> {
        let dims = self.dims;
        let own = &self.clusters[c].equations;
        let cluster_constraints = Constraints::collect(self.graph, own, root);
        if dims.is_time_like(root) {
            return Some(node.constraints.merge(cluster_constraints));
        }

        let existing = self.equations_of(&node.clusters);
        let mut merged = node.constraints.merge(cluster_constraints);
        for edge in self.graph.between(&existing, own) {
            if edge.carrier.root() != Some(root) {
                continue;
            }
            if edge.carrier.is_unknown() {
                log::debug!(
                    "cluster {c}: unknown distance along '{}', not sharing the loop",
                    dims[root].name
                );
                return None;
            }
            merged = merged.merge(Constraints::of_carrier(edge.carrier));
        }
        if merged.is_consistent() {
            Some(merged)
        } else {
            log::debug!(
                "cluster {c}: opposite directions along '{}', not sharing the loop",
                dims[root].name
            );
            None
        }
    }

    fn insert(&mut self, body: &mut Vec<Node>, steps: &[Step], c: usize) {
        let clusters = self.clusters;
        let cluster = &clusters[c];
        let Some((step, rest)) = steps.split_first() else {
            let resolver = Resolver::new(self.dims, &cluster.signature.loops);
            for &e in &cluster.equations {
                let eq = &self.lowered[e].equation;
                body.push(Node::Statement(StatementNode {
                    equation: e,
                    cluster: c,
                    lhs: resolver.access(&eq.lhs),
                    rhs: resolver.expr(&eq.rhs),
                }));
            }
            return;
        };

        match *step {
            Step::Loop(level) => {
                let dim = cluster.signature.loops[level];
                let root = self.dims.root(dim);
                if self.options.fusion {
                    if let Some(Node::Loop(last)) = body.last_mut() {
                        if last.dim == dim {
                            if let Some(merged) = self.share(last, c, root) {
                                last.constraints = merged;
                                last.clusters.push(c);
                                self.insert(&mut last.body, rest, c);
                                return;
                            }
                        }
                    }
                }
                let mut node = LoopNode {
                    dim,
                    bounds: self.bounds.resolve(self.dims, dim),
                    direction: Direction::Forward,
                    properties: Properties::EMPTY,
                    clusters: vec![c],
                    body: Vec::new(),
                    constraints: Constraints::collect(self.graph, &cluster.equations, root),
                };
                self.insert(&mut node.body, rest, c);
                body.push(Node::Loop(node));
            }
            Step::Guard(g) => {
                let guards = self.guards;
                let guard = &guards[c][g];
                if self.options.fusion {
                    if let Some(Node::Guard(last)) = body.last_mut() {
                        if last.predicate == guard.predicate {
                            for &d in &guard.conditions {
                                if !last.conditions.contains(&d) {
                                    last.conditions.push(d);
                                }
                            }
                            self.insert(&mut last.body, rest, c);
                            return;
                        }
                    }
                }
                let mut node = GuardNode {
                    predicate: guard.predicate.clone(),
                    conditions: guard.conditions.clone(),
                    body: Vec::new(),
                };
                self.insert(&mut node.body, rest, c);
                body.push(Node::Guard(node));
            }
        }
    }

    /// Sets direction and tags on every loop. Returns `true` if `nodes`
    /// contain a loop.
    fn finalize(&self, nodes: &mut [Node]) -> bool {
        let mut any = false;
        for node in nodes {
            match node {
                Node::Loop(l) => {
                    any = true;
                    let innermost = !self.finalize(&mut l.body);
                    let root = self.dims.root(l.dim);
                    let members = self.equations_of(&l.clusters);
                    let level = Level {
                        affine: is_affine(
                            self.dims,
                            members.iter().map(|&e| &self.lowered[e]),
                            root,
                        ),
                        innermost,
                        time_like: self.dims.is_time_like(root),
                    };
                    let (direction, properties) =
                        classify_level(l.constraints, level, self.options.vectorize);
                    l.direction = direction;
                    l.properties = properties;
                    if self.options.vectorize && innermost && l.is_parallel() && !level.affine {
                        log::debug!(
                            "loop '{}' is parallel but not affine, not vectorizing",
                            self.dims[l.dim].name
                        );
                    }
                }
                Node::Guard(g) => any |= self.finalize(&mut g.body),
                Node::Statement(_) => {}
            }
        }
        any
    }
}

fn record_spaces(
    nodes: &[Node],
    path: &mut Vec<(Handle<Dimension>, Interval, Direction)>,
    infos: &mut [ClusterInfo],
) {
    for node in nodes {
        match node {
            Node::Loop(l) => {
                path.push((l.dim, l.bounds.clone(), l.direction));
                record_spaces(&l.body, path, infos);
                path.pop();
            }
            Node::Guard(g) => record_spaces(&g.body, path, infos),
            Node::Statement(s) => {
                let space = &mut infos[s.cluster].space;
                if space.dims.is_empty() {
                    space.dims = path.clone();
                }
            }
        }
    }
}

/// Invocation-time parameters of every dimension, with the default stride
/// filled in for conditionals declared without one.
fn parameters(dims: &Dimensions, options: &Options) -> Vec<Parameter> {
    let mut out = Vec::new();
    for (handle, dim) in dims.iter() {
        let defaulted = matches!(dim.kind, DimensionKind::Conditional(Condition::Factor(None)));
        for mut p in dims.parameters(handle) {
            if defaulted && p.default.is_none() {
                p.default = Some(options.default_factor);
            }
            out.push(p);
        }
    }
    out
}

/// Builds the schedule tree for clusters already in execution order.
pub(crate) fn build(
    program: &Program,
    lowered: &[LoweredEquation],
    graph: &DependenceGraph,
    clusters: &[Cluster],
    guards: &[Vec<Guard>],
    options: &Options,
) -> ScheduleTree {
    let dims = &program.dimensions;
    let mut builder = Builder {
        dims,
        lowered,
        graph,
        clusters,
        guards,
        options,
        bounds: BoundsTable::default(),
    };

    let mut roots = Vec::new();
    for (c, cluster) in clusters.iter().enumerate() {
        let n = cluster.signature.loops.len();
        let mut steps = Vec::new();
        for level in 0..=n {
            for (g, guard) in guards[c].iter().enumerate() {
                if guard.level == level {
                    steps.push(Step::Guard(g));
                }
            }
            if level < n {
                steps.push(Step::Loop(level));
            }
        }
        builder.insert(&mut roots, &steps, c);
    }
    builder.finalize(&mut roots);

    let mut infos: Vec<ClusterInfo> = clusters
        .iter()
        .zip(guards)
        .map(|(cluster, guards)| ClusterInfo {
            equations: cluster.equations.clone(),
            signature: cluster.signature.clone(),
            space: IterationSpace::default(),
            guards: guards.iter().map(|g| g.predicate.clone()).collect(),
        })
        .collect();
    record_spaces(&roots, &mut Vec::new(), &mut infos);

    ScheduleTree {
        roots,
        parameters: parameters(dims, options),
        clusters: infos,
    }
}
