#![no_main]

use libfuzzer_sys::fuzz_target;
use slicepeek_core::qoi;

fuzz_target!(|data: &[u8]| {
    if let Some((header, pixels)) = qoi::decode_rgba(data) {
        assert_eq!(pixels.len(), header.pixel_count() * 4);
    }
});
