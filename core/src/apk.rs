use std::fs;
use std::path::{Path, PathBuf};

use idmap_res::{
    Manifest, OverlayManifest, ResourceId, ResourceResolver, ResourceTable, ResourceValue,
};
use idmap_zip::{ZipArchive, ZipError};
use log::{debug, info, warn};

use crate::errors::{LookupError, PackageError};
use crate::package::{OverlayPair, OverlayableInfo, ResourcePackage};
use crate::policy::PolicyFlags;

const ANDROID_MANIFEST_PATH: &str = "AndroidManifest.xml";
const RESOURCE_TABLE_PATH: &str = "resources.arsc";

/// Resource package backed by an apk file
#[derive(Debug)]
pub struct LoadedApk {
    path: PathBuf,
    crc: u32,
    table: ResourceTable,
    manifest: Option<Manifest>,
}

impl LoadedApk {
    /// Load an apk, [`ResourcePackage::path`] is the canonical absolute path
    pub fn open(path: impl AsRef<Path>) -> Result<LoadedApk, PackageError> {
        let absolute = fs::canonicalize(path)?;
        let path = absolute.as_path();
        let input = fs::read(path)?;
        let crc = crc32fast::hash(&input);

        let zip = ZipArchive::new(input)?;

        let table = match zip.read(RESOURCE_TABLE_PATH) {
            Ok(data) => ResourceTable::new(&data)?,
            Err(ZipError::FileNotFound(_)) => return Err(PackageError::MissingResourceTable),
            Err(e) => return Err(e.into()),
        };

        // the manifest is only needed to scan for overlays
        let manifest = Self::manifest_of(path, &zip);

        info!(
            "loaded {} (crc 0x{:08x}, {} packages)",
            path.display(),
            crc,
            table.packages.len()
        );

        Ok(LoadedApk {
            path: path.to_path_buf(),
            crc,
            table,
            manifest,
        })
    }

    fn manifest_of(path: &Path, zip: &ZipArchive) -> Option<Manifest> {
        let data = match zip.read(ANDROID_MANIFEST_PATH) {
            Ok(data) => data,
            Err(e) => {
                warn!("{}: can't read {}: {}", path.display(), ANDROID_MANIFEST_PATH, e);
                return None;
            }
        };

        match Manifest::new(&data) {
            Ok(manifest) => Some(manifest),
            Err(e) => {
                warn!("{}: can't parse {}: {}", path.display(), ANDROID_MANIFEST_PATH, e);
                None
            }
        }
    }

    /// Read only the `<overlay>` declaration of an apk, the resource table is not parsed
    pub fn read_overlay_info(
        path: impl AsRef<Path>,
    ) -> Result<Option<OverlayManifest>, PackageError> {
        let path = path.as_ref();
        let zip = ZipArchive::new(fs::read(path)?)?;

        Ok(Self::manifest_of(path, &zip).as_ref().and_then(Manifest::overlay))
    }

    #[inline]
    pub fn table(&self) -> &ResourceTable {
        &self.table
    }

    #[inline]
    pub fn resolver(&self) -> ResourceResolver<'_> {
        ResourceResolver::new(&self.table)
    }

    #[inline]
    pub fn manifest(&self) -> Option<&Manifest> {
        self.manifest.as_ref()
    }

    /// Retrieves the package name defined in the `<manifest>` tag
    #[inline]
    pub fn package_name(&self) -> Option<&str> {
        self.manifest.as_ref().and_then(Manifest::package_name)
    }

    /// `<overlay>` declaration, `None` for regular applications
    #[inline]
    pub fn overlay_info(&self) -> Option<OverlayManifest> {
        self.manifest.as_ref().and_then(Manifest::overlay)
    }
}

impl ResourcePackage for LoadedApk {
    fn path(&self) -> &Path {
        &self.path
    }

    fn crc(&self) -> u32 {
        self.crc
    }

    fn package_id(&self) -> u8 {
        self.table.packages.first().map(|p| p.id).unwrap_or_default()
    }

    fn resolve(&self, type_name: &str, entry_name: &str) -> Result<ResourceId, LookupError> {
        self.resolver()
            .lookup_id(type_name, entry_name)
            .ok_or_else(|| LookupError::NameNotFound(type_name.to_owned(), entry_name.to_owned()))
    }

    fn reverse(&self, id: ResourceId) -> Result<(&str, &str), LookupError> {
        self.resolver()
            .lookup_name(id)
            .ok_or(LookupError::IdNotFound(id))
    }

    fn overlay_pairs(&self) -> Vec<OverlayPair> {
        let resolver = self.resolver();

        let pairs: Vec<OverlayPair> = resolver
            .iter_types()
            .flat_map(|info| {
                info.entry_ids.into_iter().filter_map(move |entry_id| {
                    let overlay_id = ResourceId::new(info.package_id, info.type_id, entry_id);
                    let (_, entry_name) = resolver.lookup_name(overlay_id)?;

                    Some(OverlayPair {
                        overlay_id,
                        target_type: info.type_name.to_owned(),
                        target_entry: entry_name.to_owned(),
                    })
                })
            })
            .collect();

        debug!("{}: {} overlay entries", self.path.display(), pairs.len());
        pairs
    }

    fn overlayable_of(&self, id: ResourceId) -> Option<OverlayableInfo> {
        let (overlayable, policy_flags) = self.table.overlayable(id)?;

        Some(OverlayableInfo {
            name: overlayable.name.clone(),
            actor: overlayable.actor.clone(),
            policies: PolicyFlags::from_bits_truncate(policy_flags),
        })
    }

    fn defines_overlayable(&self) -> bool {
        self.table.defines_overlayable()
    }

    fn value(&self, id: ResourceId, qualifier: &str) -> Option<ResourceValue> {
        let (_, entry) = self.table.entry(id, qualifier)?;
        entry.simple_value().copied()
    }

    fn format_value(&self, value: &ResourceValue) -> String {
        value.to_string(&self.table.string_pool)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::builder::build_idmap;
    use crate::errors::BuildError;
    use crate::fixtures::{TARGET_PACKAGE, overlay_apk, stored_zip, target_apk, write_file};
    use crate::lookup::lookup_value;

    fn write_temp(data: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(data).unwrap();
        file
    }

    #[test]
    fn missing_file() {
        assert!(matches!(
            LoadedApk::open("/nonexistent/overlay.apk"),
            Err(PackageError::IoError(_))
        ));
    }

    #[test]
    fn not_a_zip() {
        let file = write_temp(b"definitely not an apk");
        assert!(matches!(
            LoadedApk::open(file.path()),
            Err(PackageError::ZipError(_))
        ));
    }

    #[test]
    fn apk_without_resources() {
        let file = write_temp(&stored_zip(&[("classes.dex", b"dex\n035\0")]));
        assert!(matches!(
            LoadedApk::open(file.path()),
            Err(PackageError::MissingResourceTable)
        ));
    }

    #[test]
    fn broken_resource_table() {
        let file = write_temp(&stored_zip(&[(RESOURCE_TABLE_PATH, &[0xff; 4])]));
        assert!(matches!(
            LoadedApk::open(file.path()),
            Err(PackageError::ResourceError(_))
        ));
    }

    #[test]
    fn target_resources() {
        let file = write_temp(&target_apk(PolicyFlags::SYSTEM.bits()));
        let apk = LoadedApk::open(file.path()).unwrap();

        assert!(apk.path().is_absolute());
        assert_eq!(apk.crc(), crc32fast::hash(&fs::read(file.path()).unwrap()));
        assert_eq!(apk.package_id(), 0x7f);
        assert!(apk.manifest().is_none());

        assert_eq!(apk.resolve("string", "hello"), Ok(ResourceId(0x7f010000)));
        assert_eq!(apk.reverse(ResourceId(0x7f020000)), Ok(("integer", "answer")));
        assert!(apk.resolve("string", "missing").is_err());

        assert!(apk.defines_overlayable());
        let info = apk.overlayable_of(ResourceId(0x7f020000)).unwrap();
        assert_eq!(info.name, "TargetResources");
        assert_eq!(info.policies, PolicyFlags::SYSTEM);
    }

    #[test]
    fn overlay_resources() {
        let file = write_temp(&overlay_apk(TARGET_PACKAGE, true, 3, 42));
        let apk = LoadedApk::open(file.path()).unwrap();

        let overlay = apk.overlay_info().unwrap();
        assert_eq!(overlay.target_package, TARGET_PACKAGE);
        assert!(overlay.is_static);
        assert_eq!(overlay.priority, 3);
        assert_eq!(
            LoadedApk::read_overlay_info(file.path()).unwrap(),
            Some(overlay)
        );

        let pairs: Vec<_> = apk
            .overlay_pairs()
            .into_iter()
            .map(|p| (p.overlay_id, p.target_type, p.target_entry))
            .collect();
        assert_eq!(
            pairs,
            vec![
                (ResourceId(0x7f010000), "integer".to_owned(), "answer".to_owned()),
                (ResourceId(0x7f020000), "string".to_owned(), "hello".to_owned()),
            ]
        );

        assert!(!apk.defines_overlayable());
        let value = apk.value(ResourceId(0x7f020000), "").unwrap();
        assert_eq!(apk.format_value(&value), "Hi");
        assert!(apk.value(ResourceId(0x7f030000), "").is_none());
    }

    #[test]
    fn idmap_from_apk_files() {
        let dir = tempfile::tempdir().unwrap();
        let target_path =
            write_file(dir.path(), "target.apk", &target_apk(PolicyFlags::SYSTEM.bits())).unwrap();
        let overlay_path =
            write_file(dir.path(), "overlay.apk", &overlay_apk(TARGET_PACKAGE, true, 0, 42)).unwrap();

        let target = LoadedApk::open(&target_path).unwrap();
        let overlay = LoadedApk::open(&overlay_path).unwrap();

        let idmap = build_idmap(&target, &overlay, PolicyFlags::SYSTEM, true).unwrap();
        assert_eq!(idmap.lookup(ResourceId(0x7f010000)), Some(ResourceId(0x7f020000)));
        assert_eq!(idmap.lookup(ResourceId(0x7f020000)), Some(ResourceId(0x7f010000)));
        assert_eq!(
            idmap.header.target_path,
            fs::canonicalize(&target_path).unwrap().to_string_lossy()
        );
        assert!(idmap.header.is_up_to_date());

        let answer = lookup_value(&idmap, &target, &overlay, ResourceId(0x7f020000), "").unwrap();
        assert_eq!(answer, "42");
        let hello = lookup_value(&idmap, &target, &overlay, ResourceId(0x7f010000), "land").unwrap();
        assert_eq!(hello, "Hi");

        assert!(matches!(
            build_idmap(&target, &overlay, PolicyFlags::VENDOR, true),
            Err(BuildError::NoMatchingResources)
        ));
        assert!(build_idmap(&target, &overlay, PolicyFlags::VENDOR, false).is_ok());
    }

    #[test]
    fn relative_paths_become_absolute() {
        let dir = tempfile::tempdir_in(".").unwrap();
        let path = write_file(dir.path(), "target.apk", &target_apk(0)).unwrap();
        let relative = path.strip_prefix(std::env::current_dir().unwrap()).unwrap();
        assert!(relative.is_relative());

        let apk = LoadedApk::open(relative).unwrap();
        assert!(apk.path().is_absolute());
        assert_eq!(apk.path(), fs::canonicalize(&path).unwrap());
    }
}
