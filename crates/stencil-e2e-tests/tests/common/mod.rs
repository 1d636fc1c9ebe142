use stencil_ir::Program;
use stencil_sched::{Bindings, Node, Options, ScheduleError, ScheduleTree, TraceEvent};

/// Load a demo problem file by name (without extension).
#[allow(dead_code)]
pub fn load_demo(name: &str) -> String {
    let path = format!("{}/../../demos/{name}.json", env!("CARGO_MANIFEST_DIR"));
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("failed to load {path}: {e}"))
}

/// Parse a problem and schedule it with `options`.
#[allow(dead_code)]
pub fn schedule_source(source: &str, options: &Options) -> (Program, ScheduleTree) {
    let program = stencil_parser::parse(source).expect("problem parse failed");
    let tree = stencil_sched::schedule(&program, options).expect("scheduling failed");
    (program, tree)
}

/// Like `schedule_source` but returns the scheduling error instead of panicking.
#[allow(dead_code)]
pub fn try_schedule_source(source: &str, options: &Options) -> Result<ScheduleTree, ScheduleError> {
    let program = stencil_parser::parse(source).expect("problem parse failed");
    stencil_sched::schedule(&program, options)
}

/// Schedule with default options and trace with `bindings`.
#[allow(dead_code)]
pub fn trace_source(source: &str, bindings: &[(&str, i64)]) -> Vec<TraceEvent> {
    let (program, tree) = schedule_source(source, &Options::default());
    let bindings: Bindings = bindings.iter().map(|&(k, v)| (k.to_string(), v)).collect();
    stencil_sched::trace(&tree, &program.dimensions, &bindings).expect("trace failed")
}

/// Number of statements anywhere below `nodes`.
#[allow(dead_code)]
pub fn statements_under(nodes: &[Node]) -> usize {
    nodes
        .iter()
        .map(|node| match node {
            Node::Loop(l) => statements_under(&l.body),
            Node::Guard(g) => statements_under(&g.body),
            Node::Statement(_) => 1,
        })
        .sum()
}

/// Dimension names of every iteration tree, outermost first.
#[allow(dead_code)]
pub fn tree_shapes(program: &Program, tree: &ScheduleTree) -> Vec<Vec<String>> {
    tree.iteration_trees()
        .iter()
        .map(|t| {
            t.iter()
                .map(|l| program.dimensions[l.dim].name.clone())
                .collect()
        })
        .collect()
}

/// A one-dimensional problem over `x` (size 8) with a single equation
/// `A[x] = A[x + offset] + 1`.
#[allow(dead_code)]
pub fn shifted_self_update(offset: i64) -> String {
    format!(
        r#"{{
            "dimensions": [{{"name": "x", "kind": "space", "size": 8}}],
            "equations": [{{
                "lhs": {{"tensor": "A", "indices": ["x"]}},
                "rhs": {{"add": [{{"access": {{"tensor": "A", "indices": [["x", {offset}]]}}}}, {{"int": 1}}]}}
            }}]
        }}"#
    )
}
