#![no_main]

use allscan_engine::ResultParser;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    for parser in ResultParser::ALL {
        let _ = parser.parse(data);
    }
});
