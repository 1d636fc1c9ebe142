#![no_main]

use libfuzzer_sys::fuzz_target;
use stencil_sched::{Bindings, Options};

fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(program) = stencil_parser::parse(source) else {
        return;
    };
    // The full parse + schedule pipeline should never panic.
    let Ok(tree) = stencil_sched::schedule(&program, &Options::default()) else {
        return;
    };
    let _ = tree.dump(&program.dimensions);

    // Keep traced extents small.
    let mut bindings = Bindings::new();
    for p in &tree.parameters {
        if p.name.ends_with("_M") {
            bindings.insert(p.name.clone(), 3);
        }
    }
    let _ = stencil_sched::trace(&tree, &program.dimensions, &bindings);
});
