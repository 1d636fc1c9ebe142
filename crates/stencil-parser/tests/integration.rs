//! Integration tests for the problem-file parser.

use stencil_ir::{DimensionKind, ParameterKind, dump_program};
use stencil_parser::{ParseError, parse};

#[test]
fn parse_heat() {
    let source = include_str!("../../../demos/heat.json");
    let program = parse(source).expect("heat.json should parse");
    let dims = &program.dimensions;

    assert_eq!(dims.len(), 6);
    assert_eq!(program.equations.len(), 1);
    assert_eq!(program.equations[0].reads().len(), 4);

    let xi = dims.find("xi").unwrap();
    assert_eq!(dims.root(xi), dims.find("x").unwrap());
    let params = dims.parameters(xi);
    assert!(
        params
            .iter()
            .any(|p| p.kind == ParameterKind::LeftThickness && p.name == "xi_ltkn" && p.default == Some(1))
    );

    let dump = dump_program(&program);
    assert!(dump.contains("Dimensions:"));
    assert!(dump.contains("Equations:"));
    assert!(dump.contains("u[t + 1, x, y]"), "dump was:\n{dump}");
    assert!(dump.contains("[x -> xi"), "dump was:\n{dump}");
}

#[test]
fn parse_snapshots() {
    let source = include_str!("../../../demos/snapshots.json");
    let program = parse(source).expect("snapshots.json should parse");
    let tsub = program.dimensions.find("tsub").unwrap();
    assert!(program.dimensions[tsub].is_conditional());
    assert_eq!(program.dimensions[tsub].factor_symbol(), "tsub_factor");
    assert_eq!(program.tensors().len(), 2);
}

#[test]
fn parse_guarded() {
    let source = include_str!("../../../demos/guarded.json");
    let program = parse(source).expect("guarded.json should parse");
    assert!(program.scalars.contains("stop"));
    let active = program.dimensions.find("active").unwrap();
    assert!(matches!(
        program.dimensions[active].kind,
        DimensionKind::Conditional(_)
    ));
    assert_eq!(program.equations[1].implicit_dims, vec![active]);
}

#[test]
fn parse_boundary() {
    let source = include_str!("../../../demos/boundary.json");
    let program = parse(source).expect("boundary.json should parse");
    assert_eq!(program.equations.len(), 3);
    for eq in &program.equations {
        assert_eq!(eq.subdomain.len(), 1);
    }
}

#[test]
fn malformed_json() {
    let result = parse("{ \"dimensions\": [ ");
    assert!(matches!(result, Err(ParseError::Json(_))));
}

#[test]
fn unknown_dimension_in_index() {
    let source = r#"{
        "dimensions": [{"name": "x", "kind": "space"}],
        "equations": [{"lhs": {"tensor": "a", "indices": ["z"]}, "rhs": {"int": 1}}]
    }"#;
    let err = parse(source).unwrap_err();
    assert_eq!(err.to_string(), "unknown dimension 'z'");
}

#[test]
fn dimension_used_as_symbol() {
    let source = r#"{
        "dimensions": [{"name": "x", "kind": "space"}],
        "equations": [{"lhs": {"tensor": "a", "indices": ["x"]}, "rhs": {"symbol": "x"}}]
    }"#;
    assert!(matches!(parse(source), Err(ParseError::Invalid(_))));
}

#[test]
fn empty_problem() {
    let program = parse("{}").unwrap();
    assert!(program.dimensions.is_empty());
    assert!(program.equations.is_empty());
}
