pub mod apk;
pub mod builder;
pub mod digest;
pub mod errors;
#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixtures;
pub mod idmap;
pub mod lookup;
pub mod package;
pub mod policy;
pub mod raw_print;
pub mod service;
pub mod visitor;

pub use apk::LoadedApk;
pub use builder::{build_idmap, load_package};
pub use digest::{canonical_cache_path, digest};
pub use errors::{BuildError, IdmapError, LookupError, PackageError, ParseError, PolicyError};
pub use idmap::{
    DataBlock, DataBlockHeader, HEADER_SIZE, IDMAP_FILE_MODE, Idmap, IdmapHeader, NO_ENTRY,
    TypeEntry,
};
pub use lookup::{MAX_REFERENCE_DEPTH, lookup_value, parse_resource_name};
pub use package::{OverlayPair, OverlayableInfo, ResourcePackage};
pub use policy::{PolicyFlags, overlay_allowed, parse_policies};
pub use raw_print::RawPrintVisitor;
pub use service::{DEFAULT_CACHE_DIR, IdmapService, ServiceError};
pub use visitor::{BinaryStreamVisitor, Node, Visitor, walk};

pub use idmap_res::ResourceId;
