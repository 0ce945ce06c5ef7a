#![no_main]

use libfuzzer_sys::fuzz_target;
use mbus_master::normalize::normalize_reading;

fuzz_target!(|data: &[u8]| {
    // Driver payloads are text; anything else never reaches the parser
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = normalize_reading(text);

        // Same content wrapped as a reading document
        let wrapped = format!("<MBusData><DataRecord>{text}</DataRecord></MBusData>");
        let _ = normalize_reading(&wrapped);
    }
});
