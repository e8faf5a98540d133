#![no_main]

use idmap_res::{ResourceResolver, ResourceTable};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // must provide at least 12 bytes
    if data.len() < 12 {
        return;
    }

    if let Ok(table) = ResourceTable::new(data) {
        let resolver = ResourceResolver::new(&table);
        for info in resolver.iter_types() {
            let _ = info.entry_ids.len();
        }
    }
});
