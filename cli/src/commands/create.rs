use std::path::Path;

use anyhow::{Context, Result};
use idmap::{IDMAP_FILE_MODE, build_idmap, load_package, parse_policies};
use log::info;

pub(crate) fn command_create(
    target_apk_path: &Path,
    overlay_apk_path: &Path,
    idmap_path: &Path,
    policies: &[String],
    ignore_overlayable: bool,
) -> Result<()> {
    let policies = parse_policies(policies)?;

    let target = load_package(target_apk_path)?;
    let overlay = load_package(overlay_apk_path)?;

    let idmap = build_idmap(&target, &overlay, policies, !ignore_overlayable).with_context(|| {
        format!(
            "can't build idmap for {} -> {}",
            overlay_apk_path.display(),
            target_apk_path.display()
        )
    })?;

    idmap.write_file(idmap_path, IDMAP_FILE_MODE)?;
    info!("wrote {} bytes to {}", idmap.encoded_len(), idmap_path.display());

    println!("{}", idmap_path.display());
    Ok(())
}
