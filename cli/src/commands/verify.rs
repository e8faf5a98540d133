use std::path::Path;

use anyhow::{Result, bail};
use idmap::IdmapHeader;
use log::debug;

pub(crate) fn command_verify(idmap_path: &Path) -> Result<()> {
    let header = IdmapHeader::from_path(idmap_path)?;
    debug!(
        "{}: target {} (0x{:08x}), overlay {} (0x{:08x})",
        idmap_path.display(),
        header.target_path,
        header.target_crc,
        header.overlay_path,
        header.overlay_crc
    );

    if !header.is_up_to_date() {
        bail!("idmap is stale");
    }

    Ok(())
}
