#![no_main]

use allscan_engine::target::refs::parse_ls_remote;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(output) = std::str::from_utf8(data) {
        if let Some(tag) = parse_ls_remote(output) {
            assert!(!tag.name.is_empty());
            let _ = tag.short_commit();
        }
    }
});
