//! Minimal apk files for tests, enabled with the `test-fixtures` feature
//!
//! The target declares `string/hello` and `integer/answer`, both overlayable
//! under the policies given to [`target_apk`]. The overlay swaps the type order,
//! so its ids differ from the target ones:
//!
//! | resource | target id | overlay id |
//! |---|---|---|
//! | `string/hello` | `0x7f010000` | `0x7f020000` |
//! | `integer/answer` | `0x7f020000` | `0x7f010000` |

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use idmap_res::fixtures::{FixtureType, overlay_manifest, table_fixture};

pub const TARGET_PACKAGE: &str = "com.example.target";

const ANDROID_MANIFEST_PATH: &str = "AndroidManifest.xml";
const RESOURCE_TABLE_PATH: &str = "resources.arsc";

/// Zip archive with stored (uncompressed) entries
pub fn stored_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut central_directory = Vec::new();

    for &(name, data) in entries {
        let crc = crc32fast::hash(data);
        let local_offset = out.len() as u32;

        out.extend_from_slice(&0x04034b50u32.to_le_bytes());
        out.extend_from_slice(&[20, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        out.extend_from_slice(&crc.to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(data);

        central_directory.extend_from_slice(&0x02014b50u32.to_le_bytes());
        central_directory.extend_from_slice(&[20, 0, 20, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        central_directory.extend_from_slice(&crc.to_le_bytes());
        central_directory.extend_from_slice(&(data.len() as u32).to_le_bytes());
        central_directory.extend_from_slice(&(data.len() as u32).to_le_bytes());
        central_directory.extend_from_slice(&(name.len() as u16).to_le_bytes());
        central_directory.extend_from_slice(&[0; 12]);
        central_directory.extend_from_slice(&local_offset.to_le_bytes());
        central_directory.extend_from_slice(name.as_bytes());
    }

    let cd_offset = out.len() as u32;
    let cd_size = central_directory.len() as u32;
    out.extend(central_directory);

    let count = entries.len() as u16;
    out.extend_from_slice(&0x06054b50u32.to_le_bytes());
    out.extend_from_slice(&[0, 0, 0, 0]);
    out.extend_from_slice(&count.to_le_bytes());
    out.extend_from_slice(&count.to_le_bytes());
    out.extend_from_slice(&cd_size.to_le_bytes());
    out.extend_from_slice(&cd_offset.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out
}

/// Target apk whose resources are overlayable under `policies` (raw policy bits)
pub fn target_apk(policies: u32) -> Vec<u8> {
    let table = table_fixture(
        0x7f,
        &[
            FixtureType {
                name: "string",
                entries: &[("hello", 0x03, 0)],
            },
            FixtureType {
                name: "integer",
                entries: &[("answer", 0x10, 1)],
            },
        ],
        &["Hello"],
        Some((
            "TargetResources",
            "",
            policies,
            &[0x7f01_0000, 0x7f02_0000],
        )),
    );

    stored_zip(&[(RESOURCE_TABLE_PATH, &table[..])])
}

/// Overlay apk for `target_package`, `answer` is the value of `integer/answer`
pub fn overlay_apk(target_package: &str, is_static: bool, priority: u32, answer: u32) -> Vec<u8> {
    let table = table_fixture(
        0x7f,
        &[
            FixtureType {
                name: "integer",
                entries: &[("answer", 0x10, answer)],
            },
            FixtureType {
                name: "string",
                entries: &[("hello", 0x03, 0)],
            },
        ],
        &["Hi"],
        None,
    );
    let manifest = overlay_manifest(target_package, is_static, priority);

    stored_zip(&[
        (ANDROID_MANIFEST_PATH, &manifest[..]),
        (RESOURCE_TABLE_PATH, &table[..]),
    ])
}

/// Write `data` to `dir/name`, returning the full path
pub fn write_file(dir: &Path, name: &str, data: &[u8]) -> io::Result<PathBuf> {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, data)?;
    Ok(path)
}

/// Static overlay declaration for `target_package` without a resource table
pub fn overlay_without_resources(target_package: &str) -> Vec<u8> {
    let manifest = overlay_manifest(target_package, true, 0);
    stored_zip(&[(ANDROID_MANIFEST_PATH, &manifest[..])])
}
