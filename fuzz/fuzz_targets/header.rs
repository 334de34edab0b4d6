#![no_main]

use libfuzzer_sys::fuzz_target;
use monoscope::signatures::header::parse_header;

fuzz_target!(|data: &[u8]| {
    if let Ok(source) = std::str::from_utf8(data) {
        let _ = parse_header(source);
    }
});
