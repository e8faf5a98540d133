pub mod arsc;
pub mod errors;
pub mod manifest;
pub mod resolver;

#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixtures;

mod id;
pub(crate) mod structs;

pub use arsc::{
    EntryValue, Overlayable, OverlayablePolicy, ResEntry, ResTablePackage, ResTableType,
    ResourceTable, TypeGroup,
};
pub use errors::{ArscError, AxmlError};
pub use id::ResourceId;
pub use manifest::{Manifest, OverlayManifest, XmlAttribute, XmlElement};
pub use resolver::{Location, ResourceResolver, TypeInfo};
pub use structs::{ResTableConfig, ResourceValue, ResourceValueType, StringPool};
