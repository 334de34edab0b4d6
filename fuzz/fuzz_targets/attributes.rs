#![no_main]

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;
use monoscope::{host::simulated::SimulatedHost, MonoApi, MonoApiConfig};

fuzz_target!(|data: &[u8]| {
    // A runtime without exports: every entry fails to resolve and is skipped
    let host = SimulatedHost::new("mono.dll");
    let Ok(info) = host.alloc_with_data(data) else {
        return;
    };

    let api = MonoApi::new(Arc::new(host), MonoApiConfig::default());
    let _ = api.decode_custom_attributes(info);
});
