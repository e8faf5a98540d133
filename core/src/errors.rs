use std::io;
use std::path::PathBuf;

use idmap_res::{ArscError, AxmlError, ResourceId};
use idmap_zip::ZipError;
use thiserror::Error;

/// Failures while decoding an idmap stream
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    /// Stream doesn't start with `IDMP`
    #[error("bad idmap magic 0x{0:08x}")]
    BadMagic(u32),

    /// Only version 3 is understood
    #[error("unsupported idmap version {0}")]
    UnsupportedVersion(u32),

    /// Stream ended in the middle of a record
    #[error("idmap stream is truncated")]
    TruncatedStream,

    /// Field holds a value the format doesn't allow
    #[error("malformed idmap field: {0}")]
    MalformedField(&'static str),
}

/// Failures while building an idmap from two packages
#[derive(Error, Debug)]
pub enum BuildError {
    /// Target or overlay package can't be loaded
    #[error("can't read package {path}")]
    CannotReadPackage {
        path: PathBuf,
        #[source]
        source: PackageError,
    },

    /// Overlayable enforcement requested, but the target declares nothing overlayable
    #[error("target resource {0} is not declared overlayable")]
    NoOverlayableDeclared(ResourceId),

    /// No overlay entry survived name resolution and policy checks
    #[error("overlay doesn't map any target resource")]
    NoMatchingResources,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PolicyError {
    /// Name outside of the closed policy set
    #[error("unknown policy: {0}")]
    UnknownPolicy(String),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LookupError {
    /// No resource with this `type/name`
    #[error("resource {0}/{1} not found")]
    NameNotFound(String, String),

    /// No resource with this id
    #[error("resource {0} not found")]
    IdNotFound(ResourceId),

    /// Malformed `--resid` style query
    #[error("invalid resource name: {0}")]
    InvalidName(String),
}

/// Failures of the apk backed package reader
#[derive(Error, Debug)]
pub enum PackageError {
    /// Generic I/O error while trying to read the package
    #[error(transparent)]
    IoError(#[from] io::Error),

    /// Error occurred while parsing apk as zip archive
    #[error("got error while parsing apk archive")]
    ZipError(#[from] ZipError),

    /// Package has no `resources.arsc`
    #[error("package doesn't contain resources.arsc")]
    MissingResourceTable,

    /// Error occurred while parsing resources.arsc
    #[error("got error while parsing resources.arsc")]
    ResourceError(#[from] ArscError),

    /// Error occurred while parsing AndroidManifest.xml
    #[error("got error while parsing AndroidManifest.xml")]
    ManifestError(#[from] AxmlError),
}

#[derive(Error, Debug)]
pub enum IdmapError {
    /// Filesystem failure, with the path it happened on
    #[error("{}: {source}", .path.display())]
    IoError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    ParseError(#[from] ParseError),

    #[error(transparent)]
    BuildError(#[from] BuildError),

    #[error(transparent)]
    PolicyError(#[from] PolicyError),

    #[error(transparent)]
    LookupError(#[from] LookupError),

    #[error(transparent)]
    PackageError(#[from] PackageError),
}

impl IdmapError {
    #[inline]
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> IdmapError {
        IdmapError::IoError {
            path: path.into(),
            source,
        }
    }
}
