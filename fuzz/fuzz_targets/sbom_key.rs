#![no_main]

use allscan_engine::SbomKey;
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input<'a> {
    repo: &'a str,
    label: &'a str,
    commit: &'a str,
    date: &'a str,
    candidate: &'a str,
}

fuzz_target!(|input: Input<'_>| {
    let key = SbomKey::new(input.repo, input.label, input.commit);
    let _ = key.matches(input.candidate);
    let _ = key.matches(&key.file_name(input.date));
});
