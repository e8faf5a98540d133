//! File digests and idmap cache locations

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use crate::errors::IdmapError;

/// Size of a single read while hashing
const BLOCK_SIZE: usize = 64 * 1024;

/// CRC-32 (IEEE) of the file contents, streamed in fixed-size blocks
pub fn digest(path: impl AsRef<Path>) -> Result<u32, IdmapError> {
    let path = path.as_ref();

    let metadata = path.metadata().map_err(|e| IdmapError::io(path, e))?;
    if !metadata.is_file() {
        return Err(IdmapError::io(
            path,
            io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
        ));
    }

    let file = File::open(path).map_err(|e| IdmapError::io(path, e))?;
    let mut reader = BufReader::with_capacity(BLOCK_SIZE, file);
    let mut hasher = crc32fast::Hasher::new();
    let mut buf = vec![0u8; BLOCK_SIZE];

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(IdmapError::io(path, e)),
        };
        hasher.update(&buf[..n]);
    }

    Ok(hasher.finalize())
}

/// Location of the idmap for `overlay_path` inside `cache_dir`
///
/// Separators become `@` and the name gets an `.idmap` suffix, e.g.
/// `/vendor/overlay/Foo.apk` -> `@vendor@overlay@Foo.apk.idmap`.
/// `%` and `@` are percent-escaped first, so distinct overlay paths never share a file.
pub fn canonical_cache_path(cache_dir: impl AsRef<Path>, overlay_path: impl AsRef<Path>) -> PathBuf {
    let overlay = overlay_path.as_ref().to_string_lossy();

    let mut name = String::with_capacity(overlay.len() + ".idmap".len());
    for c in overlay.chars() {
        match c {
            '%' => name.push_str("%25"),
            '@' => name.push_str("%40"),
            c if std::path::is_separator(c) => name.push('@'),
            c => name.push(c),
        }
    }
    name.push_str(".idmap");

    cache_dir.as_ref().join(name)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::io::Write;

    use super::*;

    #[test]
    fn crc_of_known_content() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"123456789").unwrap();

        // CRC-32/ISO-HDLC check value
        assert_eq!(digest(file.path()).unwrap(), 0xcbf43926);
    }

    #[test]
    fn crc_spans_multiple_blocks() {
        let data: Vec<u8> = (0..BLOCK_SIZE * 3 + 17).map(|i| (i % 251) as u8).collect();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&data).unwrap();

        assert_eq!(digest(file.path()).unwrap(), crc32fast::hash(&data));
    }

    #[test]
    fn directory_is_not_digestible() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(digest(dir.path()), Err(IdmapError::IoError { .. })));
        assert!(digest(dir.path().join("missing.apk")).is_err());
    }

    #[test]
    fn cache_path_layout() {
        assert_eq!(
            canonical_cache_path("/data/resource-cache", "/vendor/overlay/Foo.apk"),
            PathBuf::from("/data/resource-cache/@vendor@overlay@Foo.apk.idmap")
        );
    }

    #[test]
    fn cache_path_is_injective() {
        let overlays = [
            "/a/b.apk",
            "/a@b.apk",
            "/a%40b.apk",
            "/a%b.apk",
            "/a%25b.apk",
            "a/b.apk",
            "/a/b.apk.idmap",
        ];

        let paths: HashSet<PathBuf> = overlays
            .iter()
            .map(|overlay| canonical_cache_path("/cache", overlay))
            .collect();
        assert_eq!(paths.len(), overlays.len());
    }
}
