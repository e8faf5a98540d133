//! Contract between the idmap core and a loaded resource package

use std::path::Path;

use idmap_res::{ResourceId, ResourceValue};

use crate::errors::LookupError;
use crate::policy::PolicyFlags;

/// Overlayable declaration covering a single target resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayableInfo {
    pub name: String,

    /// Opaque tag of the component allowed to toggle overlays, not enforced here
    pub actor: String,

    /// Policies an overlay needs at least one of
    pub policies: PolicyFlags,
}

/// An overlay resource together with the name of the target resource it replaces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayPair {
    pub overlay_id: ResourceId,
    pub target_type: String,
    pub target_entry: String,
}

/// Read access to a loaded resource package
///
/// Object safe, so visitors and commands can hold `&dyn ResourcePackage`.
pub trait ResourcePackage {
    /// File the package was loaded from
    fn path(&self) -> &Path;

    /// CRC-32 of the package file, the value stored in idmap headers
    fn crc(&self) -> u32;

    /// Id of the first package in the resource table
    fn package_id(&self) -> u8;

    fn resolve(&self, type_name: &str, entry_name: &str) -> Result<ResourceId, LookupError>;

    fn reverse(&self, id: ResourceId) -> Result<(&str, &str), LookupError>;

    /// Every overlay resource paired with the target name it overrides
    fn overlay_pairs(&self) -> Vec<OverlayPair>;

    fn overlayable_of(&self, id: ResourceId) -> Option<OverlayableInfo>;

    /// Whether the package declares any `<overlayable>` at all
    fn defines_overlayable(&self) -> bool;

    /// Value of a simple entry for the configuration qualifier, with default fallbacks
    fn value(&self, id: ResourceId, qualifier: &str) -> Option<ResourceValue>;

    /// Human readable rendering of a value from this package
    fn format_value(&self, value: &ResourceValue) -> String;
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Write;

    use idmap_res::{ResourceValueType, StringPool};

    use super::*;

    /// In-memory package backed by a real temporary file, so digests and freshness are real
    pub(crate) struct FakePackage {
        file: tempfile::NamedTempFile,
        crc: u32,
        package_id: u8,
        resources: Vec<(ResourceId, String, String)>,
        values: Vec<(ResourceId, ResourceValue)>,
        overlayables: Vec<(ResourceId, PolicyFlags)>,
    }

    impl FakePackage {
        /// `resources` are `(id, "type/name")`
        pub(crate) fn new(resources: &[(u32, &str)]) -> FakePackage {
            let resources: Vec<(ResourceId, String, String)> = resources
                .iter()
                .map(|&(id, name)| {
                    let (type_name, entry_name) = name.split_once('/').unwrap();
                    (ResourceId(id), type_name.to_owned(), entry_name.to_owned())
                })
                .collect();

            let mut file = tempfile::NamedTempFile::new().unwrap();
            write!(file, "{:?}", resources).unwrap();
            file.flush().unwrap();
            let crc = crate::digest::digest(file.path()).unwrap();

            FakePackage {
                file,
                crc,
                package_id: resources.first().map(|r| r.0.package_id()).unwrap_or(0x7f),
                resources,
                values: Vec::new(),
                overlayables: Vec::new(),
            }
        }

        pub(crate) fn with_overlayable(mut self, policies: PolicyFlags, ids: &[u32]) -> Self {
            self.overlayables
                .extend(ids.iter().map(|&id| (ResourceId(id), policies)));
            self
        }

        pub(crate) fn with_value(mut self, id: u32, data_type: u8, data: u32) -> Self {
            self.values.push((
                ResourceId(id),
                ResourceValue {
                    data_type: ResourceValueType::from(data_type),
                    data,
                },
            ));
            self
        }

        /// Change the file contents on disk, the loaded state is kept
        pub(crate) fn touch(&mut self) {
            self.file.write_all(b"modified").unwrap();
            self.file.flush().unwrap();
        }
    }

    impl ResourcePackage for FakePackage {
        fn path(&self) -> &Path {
            self.file.path()
        }

        fn crc(&self) -> u32 {
            self.crc
        }

        fn package_id(&self) -> u8 {
            self.package_id
        }

        fn resolve(&self, type_name: &str, entry_name: &str) -> Result<ResourceId, LookupError> {
            self.resources
                .iter()
                .find(|(_, t, e)| t == type_name && e == entry_name)
                .map(|(id, _, _)| *id)
                .ok_or_else(|| LookupError::NameNotFound(type_name.to_owned(), entry_name.to_owned()))
        }

        fn reverse(&self, id: ResourceId) -> Result<(&str, &str), LookupError> {
            self.resources
                .iter()
                .find(|(rid, _, _)| *rid == id)
                .map(|(_, t, e)| (t.as_str(), e.as_str()))
                .ok_or(LookupError::IdNotFound(id))
        }

        fn overlay_pairs(&self) -> Vec<OverlayPair> {
            self.resources
                .iter()
                .map(|(id, t, e)| OverlayPair {
                    overlay_id: *id,
                    target_type: t.clone(),
                    target_entry: e.clone(),
                })
                .collect()
        }

        fn overlayable_of(&self, id: ResourceId) -> Option<OverlayableInfo> {
            self.overlayables
                .iter()
                .find(|(rid, _)| *rid == id)
                .map(|&(_, policies)| OverlayableInfo {
                    name: "TestResources".to_owned(),
                    actor: "overlay://test".to_owned(),
                    policies,
                })
        }

        fn defines_overlayable(&self) -> bool {
            !self.overlayables.is_empty()
        }

        fn value(&self, id: ResourceId, _qualifier: &str) -> Option<ResourceValue> {
            self.values.iter().find(|(rid, _)| *rid == id).map(|(_, v)| *v)
        }

        fn format_value(&self, value: &ResourceValue) -> String {
            value.to_string(&StringPool::default())
        }
    }
}
