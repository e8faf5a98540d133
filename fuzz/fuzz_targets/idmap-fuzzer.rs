#![no_main]

use idmap::{Idmap, RawPrintVisitor, walk};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(idmap) = Idmap::parse(data) else {
        return;
    };

    // a decoded idmap always re-parses
    let encoded = idmap.to_bytes();
    assert_eq!(encoded.len(), idmap.encoded_len());
    assert!(Idmap::parse(&encoded).is_ok());

    let mut visitor = RawPrintVisitor::new(std::io::sink());
    let _ = walk(&idmap, &mut visitor);
});
