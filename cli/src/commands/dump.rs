use std::io::{self, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use idmap::{Idmap, LoadedApk, RawPrintVisitor, ResourcePackage, walk};
use log::warn;

/// Open a package named in the idmap header, only used to decorate the dump
fn open_for_names(path: &str) -> Option<LoadedApk> {
    match LoadedApk::open(path) {
        Ok(apk) => Some(apk),
        Err(e) => {
            warn!("can't open {}, resource names are not shown: {}", path, e);
            None
        }
    }
}

pub(crate) fn command_dump(idmap_path: &Path, json: bool) -> Result<()> {
    let idmap = Idmap::from_path(idmap_path)?;

    let stdout = io::stdout();
    let mut writer = BufWriter::new(stdout.lock());

    if json {
        serde_json::to_writer_pretty(&mut writer, &idmap)
            .with_context(|| format!("can't serialize {}", idmap_path.display()))?;
        writeln!(writer)?;
        return Ok(writer.flush()?);
    }

    let target = open_for_names(&idmap.header.target_path);
    let overlay = open_for_names(&idmap.header.overlay_path);

    let mut visitor = RawPrintVisitor::new(&mut writer).with_packages(
        target.as_ref().map(|p| p as &dyn ResourcePackage),
        overlay.as_ref().map(|p| p as &dyn ResourcePackage),
    );
    walk(&idmap, &mut visitor).context("can't print idmap")?;

    Ok(writer.flush()?)
}
