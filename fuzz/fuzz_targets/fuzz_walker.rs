#![no_main]
use libfuzzer_sys::fuzz_target;
use ucode_rs::{walk, WalkOptions};

const MAX_INPUT_SIZE: usize = 64 * 1024;

fn do_fuzz(data: &[u8]) {
    if data.len() > MAX_INPUT_SIZE {
        return;
    }
    for include_payload in [false, true] {
        let mut end = 0;
        for r in walk(data, WalkOptions { include_payload }) {
            let Ok(r) = r else {
                break;
            };
            assert_eq!(r.offset, end);
            end = r.range().end;
            assert!(end <= data.len());
        }
    }
}

fuzz_target!(|data: &[u8]| {
    do_fuzz(data);
});
