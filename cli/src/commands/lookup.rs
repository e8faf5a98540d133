use std::path::Path;

use anyhow::{Context, Result};
use idmap::{Idmap, LoadedApk, lookup_value, parse_resource_name};
use log::warn;

pub(crate) fn command_lookup(idmap_path: &Path, config: &str, resid: &str) -> Result<()> {
    let idmap = Idmap::from_path(idmap_path)?;
    if !idmap.header.is_up_to_date() {
        warn!("{} is stale, results may be wrong", idmap_path.display());
    }

    let target = LoadedApk::open(&idmap.header.target_path)
        .with_context(|| format!("can't open target {}", idmap.header.target_path))?;
    let overlay = LoadedApk::open(&idmap.header.overlay_path)
        .with_context(|| format!("can't open overlay {}", idmap.header.overlay_path))?;

    let target_id = parse_resource_name(&target, resid)?;
    let value = lookup_value(&idmap, &target, &overlay, target_id, config)
        .with_context(|| format!("no overlay value for {} ({})", resid, target_id))?;

    println!("{}", value);

    Ok(())
}
