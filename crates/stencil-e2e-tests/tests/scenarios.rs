mod common;

use stencil_analysis::Direction;
use stencil_sched::Options;

#[test]
fn scenario_forward_carried_sweep() {
    let (program, tree) = common::schedule_source(&common::shifted_self_update(-1), &Options::default());
    let loops = tree.loops();
    assert_eq!(loops.len(), 1);
    assert!(loops[0].is_sequential());
    assert_eq!(loops[0].direction, Direction::Forward);
    assert_eq!(
        tree.dump(&program.dimensions),
        "for x in [x_m, x_M] forward <sequential,affine>\n  e0: A[x] = A[x - 1] + 1\n\
         \nParameters:\n  x_m = 0\n  x_M = 7\n"
    );
}

#[test]
fn scenario_backward_carried_sweep() {
    let source = common::shifted_self_update(1);
    let (program, tree) = common::schedule_source(&source, &Options::default());
    let loops = tree.loops();
    assert!(loops[0].is_sequential());
    assert_eq!(loops[0].direction, Direction::Backward);
    assert!(
        tree.dump(&program.dimensions)
            .starts_with("for x in [x_m, x_M] backward <sequential,affine>\n  e0: A[x] = A[x + 1] + 1\n")
    );

    let xs: Vec<i64> = common::trace_source(&source, &[])
        .iter()
        .map(|e| e.index[0])
        .collect();
    assert_eq!(xs, vec![7, 6, 5, 4, 3, 2, 1, 0]);
}

#[test]
fn scenario_disjoint_boundary_regions() {
    let source = r#"{
        "dimensions": [
            {"name": "time", "kind": "time", "size": 3},
            {"name": "t", "kind": "stepping", "parent": "time", "modulo": 2},
            {"name": "x", "kind": "space", "size": 10},
            {"name": "xl", "kind": "sub", "parent": "x", "side": "left", "left": 2},
            {"name": "xr", "kind": "sub", "parent": "x", "side": "right", "right": 2}
        ],
        "equations": [
            {"lhs": {"tensor": "u", "indices": [["t", 1], "x"]},
             "rhs": {"access": {"tensor": "u", "indices": ["t", ["x", 1]]}},
             "subdomain": {"x": "xl"}},
            {"lhs": {"tensor": "u", "indices": [["t", 1], "x"]},
             "rhs": {"access": {"tensor": "u", "indices": ["t", ["x", -1]]}},
             "subdomain": {"x": "xr"}}
        ]
    }"#;
    let (program, tree) = common::schedule_source(source, &Options::default());
    assert_eq!(
        common::tree_shapes(&program, &tree),
        vec![vec!["time", "xl"], vec!["time", "xr"]]
    );
    for t in tree.iteration_trees() {
        assert!(t[1].is_parallel());
    }

    let events = common::trace_source(source, &[]);
    let first_step: Vec<(usize, i64)> = events
        .iter()
        .filter(|e| e.point[0].1 == 0)
        .map(|e| (e.equation, e.index[1]))
        .collect();
    assert_eq!(first_step, vec![(0, 0), (0, 1), (1, 8), (1, 9)]);
}

#[test]
fn scenario_strided_snapshots() {
    let events = common::trace_source(&common::load_demo("snapshots"), &[]);
    let mut steps: Vec<i64> = events
        .iter()
        .filter(|e| e.tensor == "usave")
        .map(|e| e.point[0].1)
        .collect();
    steps.dedup();
    assert_eq!(steps, vec![0, 4, 8, 12, 16]);

    let mut slots: Vec<i64> = events
        .iter()
        .filter(|e| e.tensor == "usave")
        .map(|e| e.index[0])
        .collect();
    slots.dedup();
    assert_eq!(slots, vec![0, 1, 2, 3, 4]);
    assert_eq!(events.iter().filter(|e| e.tensor == "u").count(), 19 * 8);
}

#[test]
fn scenario_shared_guard() {
    let source = common::load_demo("guarded");
    let (_, tree) = common::schedule_source(&source, &Options::default());
    let guards = tree.guards();
    assert_eq!(guards.len(), 1);
    assert_eq!(common::statements_under(&guards[0].body), 2);
    assert_eq!(tree.statements().len(), 3);

    let events = common::trace_source(&source, &[("stop", 3)]);
    assert_eq!(events.iter().filter(|e| e.tensor == "f").count(), 64);
    assert_eq!(events.iter().filter(|e| e.tensor == "g").count(), 24);
    assert_eq!(events.iter().filter(|e| e.tensor == "h").count(), 24);
    assert!(
        events
            .iter()
            .filter(|e| e.tensor == "g")
            .all(|e| e.index[1] < 3)
    );
}

#[test]
fn heat_interior() {
    let source = common::load_demo("heat");
    let (program, tree) = common::schedule_source(&source, &Options::default());
    assert_eq!(
        common::tree_shapes(&program, &tree),
        vec![vec!["time", "xi", "yi"]]
    );
    let loops = tree.loops();
    assert!(loops[0].is_sequential());
    assert!(loops[1].is_parallel() && !loops[1].is_vectorizable());
    assert!(loops[2].is_vectorizable());

    let events = common::trace_source(&source, &[]);
    assert_eq!(events.len(), 10 * 14 * 14);
    assert_eq!(events[0].index, vec![1, 1, 1]);
    assert_eq!(events.last().map(|e| e.index.clone()), Some(vec![0, 14, 14]));
}
