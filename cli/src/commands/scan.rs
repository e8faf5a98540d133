use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use idmap::{
    IDMAP_FILE_MODE, IdmapHeader, LoadedApk, PolicyFlags, ResourcePackage, build_idmap,
    canonical_cache_path, load_package, parse_policies,
};
use log::{debug, info, warn};

use crate::commands::path_helpers::get_apk_files;

/// Static overlay found during the scan, the package itself is loaded on demand
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct StaticOverlay {
    priority: i32,
    path: PathBuf,
}

/// Keep the apk if it is a static overlay of `target_package_name`
fn static_overlay_of(path: &Path, target_package_name: &str) -> Option<StaticOverlay> {
    let info = match LoadedApk::read_overlay_info(path) {
        Ok(Some(info)) => info,
        Ok(None) => {
            debug!("skipped {}: not an overlay", path.display());
            return None;
        }
        Err(e) => {
            warn!("skipped {}: {}", path.display(), e);
            return None;
        }
    };

    if info.target_package != target_package_name {
        debug!(
            "skipped {}: overlays {}, not {}",
            path.display(),
            info.target_package,
            target_package_name
        );
        return None;
    }

    if !info.is_static {
        debug!("skipped {}: overlay is not static", path.display());
        return None;
    }

    // idmap headers carry absolute paths
    let path = match fs::canonicalize(path) {
        Ok(path) => path,
        Err(e) => {
            warn!("skipped {}: {}", path.display(), e);
            return None;
        }
    };

    Some(StaticOverlay {
        priority: info.priority,
        path,
    })
}

/// Path of an up to date idmap for the pair, created when missing or stale
fn ensure_idmap(
    target: &LoadedApk,
    overlay_path: &Path,
    output_directory: &Path,
    policies: PolicyFlags,
    enforce_overlayable: bool,
) -> Result<PathBuf> {
    let idmap_path = canonical_cache_path(output_directory, overlay_path);

    if let Ok(header) = IdmapHeader::from_path(&idmap_path)
        && Path::new(&header.overlay_path) == overlay_path
        && Path::new(&header.target_path) == target.path()
        && header.is_up_to_date()
    {
        debug!("{} is up to date", idmap_path.display());
        return Ok(idmap_path);
    }

    let overlay = load_package(overlay_path)?;
    let idmap = build_idmap(target, &overlay, policies, enforce_overlayable)?;
    idmap.write_file(&idmap_path, IDMAP_FILE_MODE)?;
    info!("created {} for {}", idmap_path.display(), overlay_path.display());

    Ok(idmap_path)
}

/// Idmap paths for every static overlay of the target, lowest priority first
///
/// Overlays that fail are logged and left out. Unreadable input directories and
/// an unloadable target fail the whole scan.
fn scan_overlays(
    input_directories: &[PathBuf],
    recursive: bool,
    target_package_name: &str,
    target_apk_path: &Path,
    output_directory: &Path,
    policies: PolicyFlags,
    enforce_overlayable: bool,
) -> Result<Vec<PathBuf>> {
    let mut overlays: Vec<StaticOverlay> = get_apk_files(input_directories, recursive)?
        .iter()
        .filter_map(|path| static_overlay_of(path, target_package_name))
        .collect();
    // priority first, path breaks ties
    overlays.sort();

    if overlays.is_empty() {
        info!("no static overlays found for {}", target_package_name);
        return Ok(Vec::new());
    }

    let target = load_package(target_apk_path)?;
    fs::create_dir_all(output_directory)
        .with_context(|| format!("can't create {}", output_directory.display()))?;

    let idmap_paths = overlays
        .iter()
        .filter_map(|overlay| {
            ensure_idmap(
                &target,
                &overlay.path,
                output_directory,
                policies,
                enforce_overlayable,
            )
            .map_err(|e| {
                warn!("failed to create idmap for {}: {:#}", overlay.path.display(), e)
            })
            .ok()
        })
        .collect();

    Ok(idmap_paths)
}

pub(crate) fn command_scan(
    input_directories: &[PathBuf],
    recursive: bool,
    target_package_name: &str,
    target_apk_path: &Path,
    output_directory: &Path,
    policies: &[String],
    ignore_overlayable: bool,
) -> Result<()> {
    let policies = parse_policies(policies)?;

    let idmap_paths = scan_overlays(
        input_directories,
        recursive,
        target_package_name,
        target_apk_path,
        output_directory,
        policies,
        !ignore_overlayable,
    )?;

    for idmap_path in idmap_paths {
        println!("{}", idmap_path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use idmap::fixtures::{
        TARGET_PACKAGE, overlay_apk, overlay_without_resources, target_apk, write_file,
    };

    use super::*;

    struct Layout {
        _dir: tempfile::TempDir,
        overlays: PathBuf,
        output: PathBuf,
        target: PathBuf,
    }

    fn layout() -> Layout {
        let dir = tempfile::tempdir().unwrap();
        let target = write_file(
            dir.path(),
            "system/Target.apk",
            &target_apk(PolicyFlags::PRODUCT.bits()),
        )
        .unwrap();

        Layout {
            overlays: dir.path().join("overlay"),
            output: dir.path().join("idmaps"),
            target,
            _dir: dir,
        }
    }

    fn scan(layout: &Layout, recursive: bool) -> Result<Vec<PathBuf>> {
        scan_overlays(
            std::slice::from_ref(&layout.overlays),
            recursive,
            TARGET_PACKAGE,
            &layout.target,
            &layout.output,
            PolicyFlags::PRODUCT,
            true,
        )
    }

    fn overlay_of(idmap_path: &Path) -> String {
        IdmapHeader::from_path(idmap_path).unwrap().overlay_path
    }

    #[test]
    fn only_static_overlays_of_the_target() {
        let layout = layout();
        let dir = &layout.overlays;
        let wanted = write_file(dir, "Wanted.apk", &overlay_apk(TARGET_PACKAGE, true, 0, 1)).unwrap();
        write_file(dir, "Dynamic.apk", &overlay_apk(TARGET_PACKAGE, false, 0, 1)).unwrap();
        write_file(dir, "Other.apk", &overlay_apk("com.example.other", true, 0, 1)).unwrap();
        write_file(dir, "App.apk", &target_apk(0)).unwrap();
        write_file(dir, "Broken.apk", b"not a zip").unwrap();

        let idmaps = scan(&layout, false).unwrap();
        assert_eq!(idmaps.len(), 1);
        assert_eq!(
            overlay_of(&idmaps[0]),
            fs::canonicalize(wanted).unwrap().to_string_lossy()
        );
    }

    #[test]
    fn ordered_by_priority_then_path() {
        let layout = layout();
        let dir = &layout.overlays;
        let high = write_file(dir, "A.apk", &overlay_apk(TARGET_PACKAGE, true, 10, 1)).unwrap();
        let low_b = write_file(dir, "B.apk", &overlay_apk(TARGET_PACKAGE, true, 1, 2)).unwrap();
        let low_c = write_file(dir, "C.apk", &overlay_apk(TARGET_PACKAGE, true, 1, 3)).unwrap();

        let overlays: Vec<String> = scan(&layout, false)
            .unwrap()
            .iter()
            .map(|p| overlay_of(p))
            .collect();
        let expected: Vec<String> = [low_b, low_c, high]
            .iter()
            .map(|p| fs::canonicalize(p).unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(overlays, expected);
    }

    #[test]
    fn nested_overlays_need_recursive() {
        let layout = layout();
        write_file(
            &layout.overlays,
            "nested/Deep.apk",
            &overlay_apk(TARGET_PACKAGE, true, 0, 1),
        )
        .unwrap();

        assert!(scan(&layout, false).unwrap().is_empty());
        assert_eq!(scan(&layout, true).unwrap().len(), 1);
    }

    #[test]
    fn fresh_idmap_is_reused_and_stale_one_rebuilt() {
        let layout = layout();
        let overlay =
            write_file(&layout.overlays, "Theme.apk", &overlay_apk(TARGET_PACKAGE, true, 0, 1))
                .unwrap();

        let first = scan(&layout, false).unwrap();
        assert_eq!(first.len(), 1);
        let idmap_path = &first[0];

        // trailing bytes survive only if the file is not rewritten
        let mut marked = fs::read(idmap_path).unwrap();
        marked.extend_from_slice(b"reused");
        fs::write(idmap_path, &marked).unwrap();

        assert_eq!(scan(&layout, false).unwrap(), first);
        assert_eq!(fs::read(idmap_path).unwrap(), marked);

        // a changed overlay invalidates it
        write_file(&layout.overlays, "Theme.apk", &overlay_apk(TARGET_PACKAGE, true, 0, 7))
            .unwrap();
        assert_eq!(scan(&layout, false).unwrap(), first);

        let rebuilt = fs::read(idmap_path).unwrap();
        assert!(!rebuilt.ends_with(b"reused"));
        let header = IdmapHeader::parse(&rebuilt).unwrap();
        assert_eq!(header.overlay_crc, idmap::digest(&overlay).unwrap());
        assert!(header.is_up_to_date());
    }

    #[test]
    fn failing_overlay_does_not_stop_the_scan() {
        let layout = layout();
        write_file(
            &layout.overlays,
            "A-Empty.apk",
            &overlay_without_resources(TARGET_PACKAGE),
        )
        .unwrap();
        write_file(&layout.overlays, "B-Good.apk", &overlay_apk(TARGET_PACKAGE, true, 0, 1))
            .unwrap();

        let idmaps = scan(&layout, false).unwrap();
        assert_eq!(idmaps.len(), 1);
        assert!(overlay_of(&idmaps[0]).ends_with("B-Good.apk"));
    }

    #[test]
    fn unreadable_input_directory_fails() {
        let layout = layout();
        assert!(scan(&layout, false).is_err());
    }

    #[test]
    fn unloadable_target_fails() {
        let mut layout = layout();
        write_file(&layout.overlays, "Theme.apk", &overlay_apk(TARGET_PACKAGE, true, 0, 1))
            .unwrap();
        layout.target = layout.target.with_file_name("Missing.apk");

        assert!(scan(&layout, false).is_err());
    }
}
