#![no_main]

use libfuzzer_sys::fuzz_target;
use mbus_master::normalize::parse_scan_result;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        // A failure must carry the payload unchanged
        if let Err(err) = parse_scan_result(text) {
            assert_eq!(err.offending_text(), Some(text));
        }
    }
});
