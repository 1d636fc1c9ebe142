mod common;

use stencil_sched::Options;

#[test]
fn boundary_regions_share_the_time_loop() {
    let (program, tree) = common::schedule_source(&common::load_demo("boundary"), &Options::default());
    assert_eq!(tree.roots.len(), 1);
    assert_eq!(
        common::tree_shapes(&program, &tree),
        vec![
            vec!["time", "xi"],
            vec!["time", "xl"],
            vec!["time", "xr"]
        ]
    );
    for t in tree.iteration_trees() {
        assert!(t[0].is_sequential());
        assert!(t[1].is_parallel());
    }
}

#[test]
fn boundary_regions_cover_the_domain_once() {
    let events = common::trace_source(&common::load_demo("boundary"), &[]);
    assert_eq!(events.len(), 10 * 20);

    let mut xs: Vec<i64> = events
        .iter()
        .filter(|e| e.point[0].1 == 0)
        .map(|e| e.index[1])
        .collect();
    xs.sort_unstable();
    assert_eq!(xs, (0..20).collect::<Vec<_>>());
}

#[test]
fn thickness_override_at_trace_time() {
    let events = common::trace_source(&common::load_demo("boundary"), &[("xi_ltkn", 4), ("time_M", 0)]);
    let interior: Vec<i64> = events
        .iter()
        .filter(|e| e.equation == 0)
        .map(|e| e.index[1])
        .collect();
    assert_eq!(interior.first(), Some(&4));
    assert_eq!(interior.last(), Some(&17));
}

#[test]
fn thickness_parameters_are_listed() {
    let (program, tree) = common::schedule_source(&common::load_demo("boundary"), &Options::default());
    let dump = tree.dump(&program.dimensions);
    assert!(dump.contains("  xi_ltkn = 2\n"), "dump was:\n{dump}");
    assert!(dump.contains("  xi_rtkn = 2\n"), "dump was:\n{dump}");
    assert!(dump.contains("  xl_ltkn = 2\n"), "dump was:\n{dump}");
    assert!(dump.contains("  xr_rtkn = 2\n"), "dump was:\n{dump}");
    assert!(!dump.contains("xl_rtkn"), "dump was:\n{dump}");
}

#[test]
fn without_fusion_nothing_is_shared() {
    let options = Options {
        fusion: false,
        ..Options::default()
    };
    let (_, tree) = common::schedule_source(&common::load_demo("boundary"), &options);
    assert_eq!(tree.roots.len(), 3);
    assert_eq!(tree.clusters.len(), 3);
}

#[test]
fn interior_and_full_range_fuse_only_the_time_loop() {
    let source = r#"{
        "dimensions": [
            {"name": "time", "kind": "time", "size": 2},
            {"name": "x", "kind": "space", "size": 6},
            {"name": "xi", "kind": "sub", "parent": "x", "side": "middle", "left": 1, "right": 1}
        ],
        "equations": [
            {"lhs": {"tensor": "a", "indices": ["time", "x"]}, "rhs": {"int": 1}},
            {"lhs": {"tensor": "b", "indices": ["time", "x"]},
             "rhs": {"access": {"tensor": "a", "indices": ["time", "x"]}},
             "subdomain": {"x": "xi"}}
        ]
    }"#;
    let (program, tree) = common::schedule_source(source, &Options::default());
    assert_eq!(
        common::tree_shapes(&program, &tree),
        vec![vec!["time", "x"], vec!["time", "xi"]]
    );
    let events = common::trace_source(source, &[]);
    assert_eq!(events.iter().filter(|e| e.tensor == "b").count(), 2 * 4);
}
