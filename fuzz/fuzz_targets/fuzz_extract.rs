#![no_main]

use libfuzzer_sys::fuzz_target;
use slicepeek_core::{Bounds, SlicerFileType, list_thumbnails};

fuzz_target!(|data: &[u8]| {
    for file_type in SlicerFileType::ALL {
        let _ = list_thumbnails(data, file_type);
        let _ = slicepeek_core::extract(data, file_type, Some(Bounds::square(64)));
    }
});
