//! Pairs overlay resources with target resources and lays them out as an [`Idmap`]

use std::collections::BTreeMap;
use std::path::Path;

use idmap_res::ResourceId;
use log::{debug, info, warn};

use crate::apk::LoadedApk;
use crate::errors::BuildError;
use crate::idmap::{DataBlock, Idmap, IdmapHeader, NO_ENTRY, TypeEntry};
use crate::package::ResourcePackage;
use crate::policy::{PolicyFlags, overlay_allowed};

/// Open an apk for a build, failures are reported as [`BuildError::CannotReadPackage`]
pub fn load_package(path: impl AsRef<Path>) -> Result<LoadedApk, BuildError> {
    let path = path.as_ref();
    LoadedApk::open(path).map_err(|source| BuildError::CannotReadPackage {
        path: path.to_path_buf(),
        source,
    })
}

/// Build the idmap mapping `target` resources onto `overlay` resources
///
/// Packages are only borrowed for the duration of the call, the result doesn't
/// reference them.
pub fn build_idmap<T, O>(
    target: &T,
    overlay: &O,
    policies: PolicyFlags,
    enforce_overlayable: bool,
) -> Result<Idmap, BuildError>
where
    T: ResourcePackage + ?Sized,
    O: ResourcePackage + ?Sized,
{
    // target id -> overlay id
    let mut pairs: Vec<(ResourceId, ResourceId)> = Vec::new();

    for pair in overlay.overlay_pairs() {
        match target.resolve(&pair.target_type, &pair.target_entry) {
            Ok(target_id) => pairs.push((target_id, pair.overlay_id)),
            Err(e) => warn!("skipped overlay resource {}: {}", pair.overlay_id, e),
        }
    }

    if enforce_overlayable {
        if let Some(&(first, _)) = pairs.first()
            && !target.defines_overlayable()
        {
            return Err(BuildError::NoOverlayableDeclared(first));
        }

        pairs.retain(|&(target_id, overlay_id)| match target.overlayable_of(target_id) {
            Some(info) if overlay_allowed(info.policies, policies, true) => true,
            Some(info) => {
                warn!(
                    "overlay resource {} can't override {}: requires {}, overlay has {}",
                    overlay_id, target_id, info.policies, policies
                );
                false
            }
            None => {
                warn!("target resource {} is not overlayable, skipped", target_id);
                false
            }
        });
    }

    if pairs.is_empty() {
        return Err(BuildError::NoMatchingResources);
    }

    // package -> type -> entry -> overlay id
    let mut packages: BTreeMap<u8, BTreeMap<u8, BTreeMap<u16, ResourceId>>> = BTreeMap::new();
    for (target_id, overlay_id) in pairs {
        let entries = packages
            .entry(target_id.package_id())
            .or_default()
            .entry(target_id.type_id())
            .or_default();

        if let Some(previous) = entries.get(&target_id.entry_id()) {
            warn!(
                "target resource {} is already mapped to {}, {} ignored",
                target_id, previous, overlay_id
            );
            continue;
        }
        entries.insert(target_id.entry_id(), overlay_id);
    }

    let data_blocks: Vec<DataBlock> = packages
        .into_iter()
        .map(|(package_id, types)| {
            let type_entries = types
                .into_iter()
                .map(|(type_id, entries)| type_entry(type_id, &entries))
                .collect();
            DataBlock::new(package_id, type_entries)
        })
        .collect();

    let header = IdmapHeader::new(
        target.crc(),
        overlay.crc(),
        &target.path().to_string_lossy(),
        &overlay.path().to_string_lossy(),
    );

    let idmap = Idmap {
        header,
        data_blocks,
    };

    info!(
        "built idmap for {} -> {}: {} data blocks, {} bytes",
        overlay.path().display(),
        target.path().display(),
        idmap.data_blocks.len(),
        idmap.encoded_len()
    );

    Ok(idmap)
}

/// Dense entry array for one target type, `entries` must not be empty
fn type_entry(type_id: u8, entries: &BTreeMap<u16, ResourceId>) -> TypeEntry {
    let entry_offset = entries.keys().next().copied().unwrap_or_default();
    let last = entries.keys().next_back().copied().unwrap_or_default();

    // the count is a u16 on disk, a type spanning the full entry range loses its last slot
    let mut entry_count = (last - entry_offset) as usize + 1;
    if entry_count > u16::MAX as usize {
        warn!("type 0x{:02x} spans too many entries, the last one is dropped", type_id);
        entry_count = u16::MAX as usize;
    }

    let mut slots = vec![NO_ENTRY; entry_count];
    for (&entry_id, overlay_id) in entries {
        if let Some(slot) = slots.get_mut((entry_id - entry_offset) as usize) {
            *slot = overlay_id.0;
        }
    }

    TypeEntry {
        target_type_id: type_id as u16,
        overlay_type_id: overlay_type_id(type_id, entries) as u16,
        entry_offset,
        entries: slots,
    }
}

/// Most common overlay type of the group, the smallest id wins a tie
fn overlay_type_id(target_type_id: u8, entries: &BTreeMap<u16, ResourceId>) -> u8 {
    let mut counts: BTreeMap<u8, usize> = BTreeMap::new();
    for id in entries.values() {
        *counts.entry(id.type_id()).or_default() += 1;
    }

    if counts.len() > 1 {
        warn!(
            "target type 0x{:02x} is overlaid by several overlay types {:?}, entries keep their full ids",
            target_type_id,
            counts.keys().collect::<Vec<_>>()
        );
    }

    // max_by_key returns the last maximum, iterate in reverse to prefer the smallest id
    let selected = counts
        .iter()
        .rev()
        .max_by_key(|&(_, count)| *count)
        .map(|(&type_id, _)| type_id)
        .unwrap_or_default();

    debug!(
        "target type 0x{:02x} -> overlay type 0x{:02x}",
        target_type_id, selected
    );
    selected
}
