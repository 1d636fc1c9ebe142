//! Integration tests: flow-direction detection over sub-dimensions.

use stencil_analysis::*;
use stencil_ir::*;

struct Grid {
    program: Program,
    time: Handle<Dimension>,
    t: Handle<Dimension>,
    x: Handle<Dimension>,
    y: Handle<Dimension>,
    xi: Handle<Dimension>,
    yi: Handle<Dimension>,
}

fn grid() -> Grid {
    let mut program = Program::default();
    let dims = &mut program.dimensions;
    let time = dims.time("time", Some(10)).unwrap();
    let t = dims.stepping("t", time, 2).unwrap();
    let x = dims.space("x", Some(10)).unwrap();
    let y = dims.space("y", Some(10)).unwrap();
    let xi = dims.sub_middle("xi", x, 1, 1).unwrap();
    let yi = dims.sub_middle("yi", y, 1, 1).unwrap();
    Grid {
        program,
        time,
        t,
        x,
        y,
        xi,
        yi,
    }
}

impl Grid {
    fn u(&self, dt: i64, dx: i64, dy: i64) -> Access {
        Access::new(
            "u",
            vec![
                Index::shifted(self.t, dt),
                Index::shifted(self.x, dx),
                Index::shifted(self.y, dy),
            ],
        )
    }

    fn interior(&self, eq: Equation) -> Equation {
        eq.with_subdomain(self.x, self.xi)
            .with_subdomain(self.y, self.yi)
    }

    fn level(&self, members: &[usize], root: Handle<Dimension>) -> (Direction, Properties) {
        let lowered = lower(&self.program).unwrap();
        let graph = analyze(&self.program.dimensions, &lowered).unwrap();
        let constraints = Constraints::collect(&graph, members, root);
        let picked = members.iter().map(|&i| &lowered[i]);
        let level = Level {
            affine: is_affine(&self.program.dimensions, picked, root),
            innermost: false,
            time_like: self.program.dimensions.is_time_like(root),
        };
        classify_level(constraints, level, false)
    }
}

/// `u[t+1] = 2u[t] + 3u[t, x+1] + 4u[t+1, x+1]` over the interior: the read
/// of the new time level one point ahead forces `x` backward.
#[test]
fn interior_flow_runs_backward() {
    let mut g = grid();
    let rhs = Expr::int(2) * g.u(0, 0, 0) + Expr::int(3) * g.u(0, 1, 0) + Expr::int(4) * g.u(1, 1, 0);
    let eq = g.interior(Equation::new(g.u(1, 0, 0), rhs));
    g.program.push(eq);

    let lowered = lower(&g.program).unwrap();
    assert_eq!(lowered[0].loops(), &[g.time, g.xi, g.yi]);

    let (dir, props) = g.level(&[0], g.x);
    assert_eq!(dir, Direction::Backward);
    assert!(props.contains(Properties::SEQUENTIAL));

    let (_, props) = g.level(&[0], g.y);
    assert!(props.contains(Properties::PARALLEL));

    let (dir, props) = g.level(&[0], g.time);
    assert_eq!(dir, Direction::Forward);
    assert!(props.contains(Properties::SEQUENTIAL));
}

#[test]
fn carried_in_time_and_y_leaves_x_parallel() {
    let mut g = grid();
    let eq = g.interior(Equation::new(
        g.u(1, 0, 0),
        Expr::from(g.u(1, 0, -1)) + g.u(0, 0, 0),
    ));
    g.program.push(eq);

    assert!(g.level(&[0], g.x).1.contains(Properties::PARALLEL));
    assert_eq!(
        g.level(&[0], g.y),
        (Direction::Forward, Properties::SEQUENTIAL | Properties::AFFINE)
    );
}

#[test]
fn opposite_sweeps_conflict_only_on_y() {
    let mut g = grid();
    let e0 = g.interior(Equation::new(
        g.u(1, 0, 0),
        Expr::from(g.u(1, 0, -1)) + g.u(0, 0, 0),
    ));
    let e1 = g.interior(Equation::new(
        g.u(1, 0, 0),
        Expr::from(g.u(1, 0, 1)) + g.u(0, 0, 0),
    ));
    g.program.push(e0);
    g.program.push(e1);

    let lowered = lower(&g.program).unwrap();
    let graph = analyze(&g.program.dimensions, &lowered).unwrap();
    assert!(!Constraints::collect(&graph, &[0, 1], g.y).is_consistent());
    assert!(!Constraints::collect(&graph, &[0, 1], g.x).is_carried());
    assert_eq!(
        Constraints::collect(&graph, &[0, 1], g.time).direction(),
        Some(Direction::Forward)
    );
}

#[test]
fn reading_ahead_in_time_fails() {
    let mut g = grid();
    let v = Access::new("v", vec![Index::at(g.time), Index::at(g.x)]);
    let ahead = Access::new("u", vec![Index::shifted(g.t, 2), Index::at(g.x), Index::at(g.y)]);
    g.program.push(Equation::new(g.u(1, 0, 0), Expr::int(1)));
    g.program.push(Equation::new(v, ahead));

    let lowered = lower(&g.program).unwrap();
    match analyze(&g.program.dimensions, &lowered).unwrap_err() {
        AnalysisError::IllegalDependence {
            tensor,
            dimension,
            writer,
            reader,
            ..
        } => {
            assert_eq!((tensor.as_str(), dimension.as_str()), ("u", "time"));
            assert_eq!((writer, reader), (0, 1));
        }
        other => panic!("expected an illegal dependence, got {other}"),
    }
}
