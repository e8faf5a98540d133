#![no_main]

use idmap_zip::ZipArchive;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(archive) = ZipArchive::new(data.to_vec()) else {
        return;
    };

    let names: Vec<String> = archive.namelist().map(str::to_owned).collect();
    for name in names {
        let _ = archive.read(&name);
    }
});
