#![no_main]

use libfuzzer_sys::fuzz_target;
use tessera_abac::{AbacEngine, loader};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    // Errors are expected; panics are bugs
    if let Ok(policies) = loader::parse_policies(text) {
        let engine = AbacEngine::default();
        for policy in policies {
            let _ = engine.register_policy(policy);
        }
        if let Ok(request) = loader::parse_request(text) {
            let _ = engine.evaluate_access(&request);
        }
    }
});
