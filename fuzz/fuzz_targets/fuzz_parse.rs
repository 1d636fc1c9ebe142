#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(source) = std::str::from_utf8(data) {
        // Arbitrary problem files should be rejected with an error, never a panic.
        let _ = stencil_parser::parse(source);
    }
});
