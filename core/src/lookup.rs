use idmap_res::ResourceId;
use log::warn;

use crate::errors::LookupError;
use crate::idmap::Idmap;
use crate::package::ResourcePackage;

/// References inside the overlay are followed at most this many times
pub const MAX_REFERENCE_DEPTH: usize = 8;

/// Parse `type/name`, `@type/name` or a hex id like `0x7f010000` against the target package
pub fn parse_resource_name<P>(package: &P, query: &str) -> Result<ResourceId, LookupError>
where
    P: ResourcePackage + ?Sized,
{
    let name = query.trim().trim_start_matches('@');

    if let Some(hex) = name.strip_prefix("0x").or_else(|| name.strip_prefix("0X")) {
        return u32::from_str_radix(hex, 16)
            .map(ResourceId)
            .map_err(|_| LookupError::InvalidName(query.to_owned()));
    }

    // `package:type/name`, the package part doesn't matter for a single target
    let name = name.split_once(':').map_or(name, |(_, rest)| rest);

    match name.split_once('/') {
        Some((type_name, entry_name)) if !type_name.is_empty() && !entry_name.is_empty() => {
            package.resolve(type_name, entry_name)
        }
        _ => Err(LookupError::InvalidName(query.to_owned())),
    }
}

/// Value the overlay supplies for the target resource under the configuration qualifier
pub fn lookup_value<T, O>(
    idmap: &Idmap,
    target: &T,
    overlay: &O,
    target_id: ResourceId,
    qualifier: &str,
) -> Result<String, LookupError>
where
    T: ResourcePackage + ?Sized,
    O: ResourcePackage + ?Sized,
{
    let mut id = idmap.lookup(target_id).ok_or(LookupError::IdNotFound(target_id))?;

    for _ in 0..MAX_REFERENCE_DEPTH {
        let value = overlay.value(id, qualifier).ok_or(LookupError::IdNotFound(id))?;
        let rendered = overlay.format_value(&value);
        if !value.is_reference() {
            return Ok(rendered);
        }

        let reference = ResourceId(value.data);
        if overlay.value(reference, qualifier).is_some() {
            id = reference;
            continue;
        }

        // the overlay can't resolve it, most likely a target or framework resource
        let name = overlay.reverse(reference).or_else(|_| target.reverse(reference));
        return Ok(match name {
            Ok((type_name, entry_name)) => format!("{} ({}/{})", rendered, type_name, entry_name),
            Err(_) => rendered,
        });
    }

    warn!(
        "gave up following references of {} after {} hops",
        target_id, MAX_REFERENCE_DEPTH
    );
    Ok(format!("@{}", id))
}
