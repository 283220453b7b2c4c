#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Lexing, parsing and validation must never panic
    if let Ok(Some(node)) = txq::query::parse_query(data) {
        let _ = txq::query::validate(&node);
        let _ = node.to_string();
    }
});
