use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::warn;
use walkdir::{DirEntry, WalkDir};

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(true)
}

fn is_apk(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("apk"))
}

/// Collect `*.apk` files from the given directories, sorted per directory
///
/// Only direct children are considered unless `recursive` is set. Hidden entries
/// are skipped. An input directory that can't be read is an error, anything
/// unreadable below it is only logged.
pub(crate) fn get_apk_files(directories: &[PathBuf], recursive: bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for directory in directories {
        let walker = WalkDir::new(directory)
            .max_depth(if recursive { usize::MAX } else { 1 })
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => {
                    return Err(e)
                        .with_context(|| format!("can't read directory {}", directory.display()));
                }
                Err(e) => {
                    warn!("skipped unreadable entry: {}", e);
                    continue;
                }
            };

            if entry.file_type().is_file() && is_apk(entry.path()) {
                files.push(entry.into_path());
            }
        }
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"PK").unwrap();
    }

    #[test]
    fn direct_children_only() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("b.apk"));
        touch(&dir.path().join("a.APK"));
        touch(&dir.path().join("notes.txt"));
        touch(&dir.path().join(".hidden.apk"));
        touch(&dir.path().join("nested/c.apk"));

        let files = get_apk_files(&[dir.path().to_path_buf()], false).unwrap();
        assert_eq!(files, vec![dir.path().join("a.APK"), dir.path().join("b.apk")]);
    }

    #[test]
    fn recursive_walk_skips_hidden_directories() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.apk"));
        touch(&dir.path().join("nested/deeper/c.apk"));
        touch(&dir.path().join(".git/d.apk"));

        let files = get_apk_files(&[dir.path().to_path_buf()], true).unwrap();
        assert_eq!(
            files,
            vec![dir.path().join("a.apk"), dir.path().join("nested/deeper/c.apk")]
        );
    }

    #[test]
    fn missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = get_apk_files(&[dir.path().join("missing")], false);
        assert!(result.is_err());
    }
}
