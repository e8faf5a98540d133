#![no_main]

use idmap_res::Manifest;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // must provide at least 8 bytes
    if data.len() < 8 {
        return;
    }

    if let Ok(manifest) = Manifest::new(data) {
        let _ = manifest.overlay();
    }
});
