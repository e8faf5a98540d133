//! Name based access to a [`ResourceTable`]

use serde::Serialize;

use crate::arsc::{ResTablePackage, ResourceTable};
use crate::id::ResourceId;

/// Resource type as seen by [`ResourceResolver::iter_types`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeInfo<'a> {
    pub package_id: u8,
    pub type_id: u8,
    pub type_name: &'a str,
    pub entry_ids: Vec<u16>,
}

/// Declaring package, type and entry of a resource id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    /// Position in [`ResourceTable::packages`]
    pub package_index: usize,
    pub type_id: u8,
    pub entry_id: u16,
}

/// Read-only view resolving `type/name` pairs and resource ids
///
/// Ambiguous names resolve to the first package of the table.
#[derive(Debug, Clone, Copy)]
pub struct ResourceResolver<'a> {
    table: &'a ResourceTable,
}

impl<'a> ResourceResolver<'a> {
    pub fn new(table: &'a ResourceTable) -> ResourceResolver<'a> {
        ResourceResolver { table }
    }

    /// Resolve `type_name/entry_name` to a resource id
    #[inline]
    pub fn lookup_id(&self, type_name: &str, entry_name: &str) -> Option<ResourceId> {
        self.table.id_by_name(type_name, entry_name)
    }

    /// Resolve a resource id back to its `(type_name, entry_name)`
    pub fn lookup_name(&self, id: ResourceId) -> Option<(&'a str, &'a str)> {
        let package = self.table.package(id.package_id())?;
        let type_name = package.type_name(id.type_id())?;
        let entry_name = package.entry_name(id.type_id(), id.entry_id())?;

        Some((type_name, entry_name))
    }

    /// Find where a resource id is declared, `None` if no configuration defines it
    pub fn locate(&self, id: ResourceId) -> Option<Location> {
        let package_index = self.table.package_index(id.package_id())?;
        self.table.packages[package_index]
            .types
            .get(&id.type_id())?
            .any_entry(id.entry_id())?;

        Some(Location {
            package_index,
            type_id: id.type_id(),
            entry_id: id.entry_id(),
        })
    }

    /// Lazily walk every named type of every package
    pub fn iter_types(&self) -> impl Iterator<Item = TypeInfo<'a>> + use<'a> {
        self.table.packages.iter().flat_map(|package: &'a ResTablePackage| {
            package.types.iter().filter_map(move |(&type_id, group)| {
                Some(TypeInfo {
                    package_id: package.id,
                    type_id,
                    type_name: package.type_name(type_id)?,
                    entry_ids: group.entry_ids(),
                })
            })
        })
    }
}
