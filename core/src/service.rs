//! Request/response surface over the idmap cache directory

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use thiserror::Error;

use crate::builder::{build_idmap, load_package};
use crate::digest::canonical_cache_path;
use crate::errors::IdmapError;
use crate::idmap::{IDMAP_FILE_MODE, IdmapHeader};
use crate::policy::parse_policies;

/// Where idmaps of installed overlays live
pub const DEFAULT_CACHE_DIR: &str = "/data/resource-cache";

/// Failure surfaced to service clients, `tag` is one of
/// `io`, `parse`, `build`, `policy`, `lookup`, `package`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{tag}: {message}")]
pub struct ServiceError {
    pub tag: &'static str,
    pub message: String,
}

impl From<IdmapError> for ServiceError {
    fn from(error: IdmapError) -> Self {
        let tag = match &error {
            IdmapError::IoError { .. } => "io",
            IdmapError::ParseError(_) => "parse",
            IdmapError::BuildError(_) => "build",
            IdmapError::PolicyError(_) => "policy",
            IdmapError::LookupError(_) => "lookup",
            IdmapError::PackageError(_) => "package",
        };

        ServiceError {
            tag,
            message: error.to_string(),
        }
    }
}

/// Single-threaded idmap service, callers serialize requests
#[derive(Debug, Clone)]
pub struct IdmapService {
    cache_dir: PathBuf,
}

impl Default for IdmapService {
    fn default() -> Self {
        IdmapService::new(DEFAULT_CACHE_DIR)
    }
}

impl IdmapService {
    pub fn new(cache_dir: impl Into<PathBuf>) -> IdmapService {
        IdmapService {
            cache_dir: cache_dir.into(),
        }
    }

    #[inline]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn get_idmap_path(&self, overlay_apk_path: impl AsRef<Path>, user_id: i32) -> PathBuf {
        debug!("get_idmap_path for user {}", user_id);
        canonical_cache_path(&self.cache_dir, overlay_apk_path)
    }

    pub fn remove_idmap(
        &self,
        overlay_apk_path: impl AsRef<Path>,
        user_id: i32,
    ) -> Result<bool, ServiceError> {
        let path = self.get_idmap_path(overlay_apk_path, user_id);
        fs::remove_file(&path).map_err(|e| IdmapError::io(&path, e))?;

        info!("removed {}", path.display());
        Ok(true)
    }

    /// Whether the cached idmap exists, belongs to this overlay and is up to date
    pub fn verify_idmap(&self, overlay_apk_path: impl AsRef<Path>, user_id: i32) -> bool {
        let overlay_apk_path = overlay_apk_path.as_ref();
        let path = self.get_idmap_path(overlay_apk_path, user_id);

        let header = match IdmapHeader::from_path(&path) {
            Ok(header) => header,
            Err(e) => {
                debug!("{}: {}", path.display(), e);
                return false;
            }
        };

        // headers store the absolute path the package was loaded from
        let expected =
            fs::canonicalize(overlay_apk_path).unwrap_or_else(|_| overlay_apk_path.to_path_buf());
        if Path::new(&header.overlay_path) != expected {
            debug!(
                "{} was built for {}",
                path.display(),
                header.overlay_path
            );
            return false;
        }

        header.is_up_to_date()
    }

    pub fn create_idmap<S: AsRef<str>>(
        &self,
        target_apk_path: impl AsRef<Path>,
        overlay_apk_path: impl AsRef<Path>,
        policies: &[S],
        enforce_overlayable: bool,
        user_id: i32,
    ) -> Result<PathBuf, ServiceError> {
        let policies = parse_policies(policies).map_err(IdmapError::from)?;

        let target = load_package(target_apk_path).map_err(IdmapError::from)?;
        let overlay = load_package(&overlay_apk_path).map_err(IdmapError::from)?;

        let idmap =
            build_idmap(&target, &overlay, policies, enforce_overlayable).map_err(IdmapError::from)?;

        let path = self.get_idmap_path(overlay_apk_path, user_id);
        idmap.write_file(&path, IDMAP_FILE_MODE)?;

        info!("created {}", path.display());
        Ok(path)
    }
}
