#![no_main]

use libfuzzer_sys::fuzz_target;
use slicepeek_core::heatshrink::{HeatshrinkParams, decompress, decompress_with};

fuzz_target!(|data: &[u8]| {
    let _ = decompress_with(data, HeatshrinkParams::W11_L4);
    let _ = decompress_with(data, HeatshrinkParams::W12_L4);
    if let [window, lookahead, rest @ ..] = data {
        let _ = decompress(rest, *window, *lookahead);
    }
});
