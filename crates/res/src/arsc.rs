use std::collections::BTreeMap;

use ahash::AHashMap;
use log::{debug, warn};
use winnow::binary::{le_u16, le_u32, u8};
use winnow::combinator::repeat;
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::take;

use crate::errors::ArscError;
use crate::id::ResourceId;
use crate::structs::{
    Chunk, ResTableConfig, ResourceType, ResourceValue, StringPool, utf16_field,
};

/// Value stored in a resource entry
#[derive(Debug, Clone)]
pub enum EntryValue {
    /// Plain `Res_value` (also used for compact entries)
    Simple(ResourceValue),

    /// Bag of name/value pairs (styles, arrays, plurals, ...)
    Complex {
        parent: u32,
        values: Vec<(u32, ResourceValue)>,
    },
}

/// A single entry of a type chunk
#[derive(Debug, Clone)]
pub struct ResEntry {
    /// Index into [`ResTablePackage::key_strings`]
    pub key: u32,

    pub flags: u16,

    pub value: EntryValue,
}

impl ResEntry {
    const FLAG_COMPLEX: u16 = 0x0001;
    const FLAG_COMPACT: u16 = 0x0008;

    fn parse(input: &mut &[u8]) -> ModalResult<ResEntry> {
        let (size, flags) = (le_u16, le_u16).parse_next(input)?;

        if flags & Self::FLAG_COMPACT != 0 {
            // compact entry: `size` holds the key, the data type is in the high byte of the flags
            let data = le_u32.parse_next(input)?;
            return Ok(ResEntry {
                key: size as u32,
                flags,
                value: EntryValue::Simple(ResourceValue {
                    data_type: ((flags >> 8) as u8).into(),
                    data,
                }),
            });
        }

        let key = le_u32.parse_next(input)?;

        if flags & Self::FLAG_COMPLEX != 0 {
            let (parent, count) = (le_u32, le_u32).parse_next(input)?;
            let values = repeat(count as usize, (le_u32, ResourceValue::parse)).parse_next(input)?;

            Ok(ResEntry {
                key,
                flags,
                value: EntryValue::Complex { parent, values },
            })
        } else {
            Ok(ResEntry {
                key,
                flags,
                value: EntryValue::Simple(ResourceValue::parse(input)?),
            })
        }
    }

    /// Direct value of a simple entry
    pub fn simple_value(&self) -> Option<&ResourceValue> {
        match &self.value {
            EntryValue::Simple(value) => Some(value),
            EntryValue::Complex { .. } => None,
        }
    }
}

/// Entries of one type for one configuration
#[derive(Debug)]
pub struct ResTableType {
    pub config: ResTableConfig,
    pub entries: BTreeMap<u16, ResEntry>,
}

impl ResTableType {
    const FLAG_SPARSE: u8 = 0x01;
    const FLAG_OFFSET16: u8 = 0x02;
    const NO_ENTRY: u32 = u32::MAX;
    const NO_ENTRY16: u16 = u16::MAX;

    fn parse(chunk: &Chunk<'_>) -> ModalResult<(u8, ResTableType)> {
        let mut fields = chunk.header_fields();
        let (id, flags, _reserved, entry_count, entries_start) =
            (u8, u8, le_u16, le_u32, le_u32).parse_next(&mut fields)?;
        let config = ResTableConfig::parse(&mut fields)?;

        if id == 0 {
            return Err(ErrMode::Cut(ContextError::new()));
        }

        let mut offsets_input = chunk.body();
        let offsets: Vec<(u16, u32)> = if flags & Self::FLAG_SPARSE != 0 {
            repeat(
                entry_count as usize,
                (le_u16, le_u16).map(|(idx, offset)| (idx, offset as u32 * 4)),
            )
            .parse_next(&mut offsets_input)?
        } else if flags & Self::FLAG_OFFSET16 != 0 {
            let raw: Vec<u16> = repeat(entry_count as usize, le_u16).parse_next(&mut offsets_input)?;
            raw.into_iter()
                .enumerate()
                .filter(|&(_, offset)| offset != Self::NO_ENTRY16)
                .map(|(idx, offset)| (idx as u16, offset as u32 * 4))
                .collect()
        } else {
            let raw: Vec<u32> = repeat(entry_count as usize, le_u32).parse_next(&mut offsets_input)?;
            raw.into_iter()
                .enumerate()
                .filter(|&(_, offset)| offset != Self::NO_ENTRY)
                .map(|(idx, offset)| (idx as u16, offset))
                .collect()
        };

        let entries_data = chunk
            .data
            .get(entries_start as usize..)
            .ok_or(ErrMode::Cut(ContextError::new()))?;

        let mut entries = BTreeMap::new();
        for (idx, offset) in offsets {
            let Some(mut slice) = entries_data.get(offset as usize..) else {
                warn!("type 0x{:02x} entry {} points outside of the chunk", id, idx);
                continue;
            };

            match ResEntry::parse(&mut slice) {
                Ok(entry) => {
                    entries.insert(idx, entry);
                }
                Err(_) => warn!("type 0x{:02x} entry {} is malformed, skipped", id, idx),
            }
        }

        Ok((id, ResTableType { config, entries }))
    }
}

/// Every configuration of a single resource type
#[derive(Debug, Default)]
pub struct TypeGroup {
    /// Number of entries declared by the type spec chunk
    pub spec_entry_count: u32,

    pub types: Vec<ResTableType>,
}

impl TypeGroup {
    /// Entry ids that have a value in at least one configuration
    pub fn entry_ids(&self) -> Vec<u16> {
        let mut ids: Vec<u16> = self
            .types
            .iter()
            .flat_map(|t| t.entries.keys().copied())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// First definition of an entry in any configuration
    pub fn any_entry(&self, entry_id: u16) -> Option<&ResEntry> {
        self.types.iter().find_map(|t| t.entries.get(&entry_id))
    }
}

/// Policy chunk inside an overlayable declaration
#[derive(Debug, Clone)]
pub struct OverlayablePolicy {
    /// Raw `PolicyFlags` bitmask
    pub policy_flags: u32,

    pub ids: Vec<ResourceId>,
}

/// Specifies the set of resources that are explicitly allowed to be overlaid by RROs
#[derive(Debug, Clone)]
pub struct Overlayable {
    /// The name of the overlayable set of resources that overlays target
    pub name: String,

    /// The component responsible for enabling and disabling overlays targeting this chunk
    pub actor: String,

    pub policies: Vec<OverlayablePolicy>,
}

impl Overlayable {
    fn parse(chunk: &Chunk<'_>) -> ModalResult<Overlayable> {
        let (name, actor) = (take(512usize), take(512usize)).parse_next(&mut chunk.header_fields())?;

        let mut policies = Vec::new();
        for child in chunk.children() {
            if child.header.type_ != ResourceType::TableOverlayablePolicy {
                warn!("unexpected chunk inside overlayable: {:?}", child.header);
                continue;
            }

            let (policy_flags, entry_count) =
                (le_u32, le_u32).parse_next(&mut child.header_fields())?;
            let ids = repeat(entry_count as usize, le_u32.map(ResourceId))
                .parse_next(&mut child.body())?;

            policies.push(OverlayablePolicy { policy_flags, ids });
        }

        Ok(Overlayable {
            name: utf16_field(name),
            actor: utf16_field(actor),
            policies,
        })
    }
}

/// A collection of resource data types within a package
#[derive(Debug)]
pub struct ResTablePackage {
    /// Package IDs start at 1, 0 means a shared library
    pub id: u8,

    pub name: String,

    pub type_strings: StringPool,
    pub key_strings: StringPool,

    /// Offset applied to type ids before indexing `type_strings`
    pub type_id_offset: u32,

    pub types: BTreeMap<u8, TypeGroup>,

    pub overlayables: Vec<Overlayable>,
}

impl ResTablePackage {
    /// 8 (header) + 4 (id) + 256 (name) + 4 * 4 (string offsets) + 4 (type_id_offset)
    const HEADER_SIZE: usize = 288;

    fn parse(chunk: &Chunk<'_>) -> ModalResult<ResTablePackage> {
        let mut fields = chunk.header_fields();
        let (id, name, type_strings_offset, _last_public_type, key_strings_offset, _last_public_key) =
            (le_u32, take(256usize), le_u32, le_u32, le_u32, le_u32).parse_next(&mut fields)?;

        // older tables don't have type_id_offset
        let type_id_offset = if chunk.header.header_size as usize >= Self::HEADER_SIZE {
            le_u32.parse_next(&mut fields)?
        } else {
            0
        };

        let mut package = ResTablePackage {
            id: id as u8,
            name: utf16_field(name),
            type_strings: StringPool::default(),
            key_strings: StringPool::default(),
            type_id_offset,
            types: BTreeMap::new(),
            overlayables: Vec::new(),
        };

        if id > 0xff {
            warn!("package id 0x{:x} doesn't fit into a resource id", id);
        }

        let mut position = chunk.header.header_size as usize;
        let mut unnamed_pools = 0;
        for child in chunk.children() {
            let offset = position;
            position += child.header.size as usize;

            match child.header.type_ {
                ResourceType::StringPool => {
                    let pool = StringPool::parse(&child)?;
                    if offset == type_strings_offset as usize {
                        package.type_strings = pool;
                    } else if offset == key_strings_offset as usize {
                        package.key_strings = pool;
                    } else {
                        // offsets are broken, fallback to the usual order
                        match unnamed_pools {
                            0 => package.type_strings = pool,
                            1 => package.key_strings = pool,
                            _ => warn!("unexpected string pool at offset 0x{:x}", offset),
                        }
                        unnamed_pools += 1;
                    }
                }
                ResourceType::TableTypeSpec => {
                    let (type_id, _, _, entry_count) =
                        (u8, u8, le_u16, le_u32).parse_next(&mut child.header_fields())?;
                    package.types.entry(type_id).or_default().spec_entry_count = entry_count;
                }
                ResourceType::TableType => match ResTableType::parse(&child) {
                    Ok((type_id, table_type)) => {
                        package.types.entry(type_id).or_default().types.push(table_type);
                    }
                    Err(_) => warn!("malformed type chunk at offset 0x{:x}, skipped", offset),
                },
                ResourceType::TableOverlayable => {
                    package.overlayables.push(Overlayable::parse(&child)?);
                }
                ResourceType::TableLibrary | ResourceType::TableStagedAlias => {
                    debug!("skipped {:?} chunk", child.header.type_);
                }
                _ => warn!("got unknown chunk inside package: {:?}", child.header),
            }
        }

        Ok(package)
    }

    /// Name of the type, e.g. `string` or `drawable`
    pub fn type_name(&self, type_id: u8) -> Option<&str> {
        let idx = (type_id as u32)
            .checked_sub(1)?
            .checked_sub(self.type_id_offset)?;
        self.type_strings.get(idx)
    }

    /// Name of the entry, e.g. `app_name`
    pub fn entry_name(&self, type_id: u8, entry_id: u16) -> Option<&str> {
        let entry = self.types.get(&type_id)?.any_entry(entry_id)?;
        self.key_strings.get(entry.key)
    }
}

/// Parsed `resources.arsc`
#[derive(Debug)]
pub struct ResourceTable {
    pub string_pool: StringPool,
    pub packages: Vec<ResTablePackage>,

    /// `(type, entry)` name to id, the first package wins on collisions
    names: AHashMap<(String, String), ResourceId>,
}

impl ResourceTable {
    pub fn new(input: &[u8]) -> Result<ResourceTable, ArscError> {
        if input.len() < 12 {
            return Err(ArscError::TooSmallError);
        }

        let chunk = Chunk::parse(&mut &input[..]).map_err(|_| ArscError::HeaderError)?;
        if chunk.header.type_ != ResourceType::Table {
            // don't drop error, tampered tables still load on device
            warn!("unexpected resource table chunk type: {:?}", chunk.header.type_);
        }

        let package_count = le_u32::<_, ContextError>
            .parse_next(&mut chunk.header_fields())
            .map_err(|_| ArscError::HeaderError)?;

        let mut string_pool = None;
        let mut packages = Vec::new();

        for child in chunk.children() {
            match child.header.type_ {
                ResourceType::StringPool if string_pool.is_none() => {
                    string_pool =
                        Some(StringPool::parse(&child).map_err(|_| ArscError::StringPoolError)?);
                }
                ResourceType::TablePackage => {
                    packages.push(
                        ResTablePackage::parse(&child)
                            .map_err(|_| ArscError::ResourceTableError)?,
                    );
                }
                _ => warn!("got unknown chunk inside resource table: {:?}", child.header),
            }
        }

        if packages.is_empty() {
            return Err(ArscError::MissingPackage);
        }
        if packages.len() != package_count as usize {
            warn!(
                "resource table declares {} packages, but got {}",
                package_count,
                packages.len()
            );
        }

        let names = Self::index_names(&packages);

        Ok(ResourceTable {
            string_pool: string_pool.unwrap_or_default(),
            packages,
            names,
        })
    }

    fn index_names(packages: &[ResTablePackage]) -> AHashMap<(String, String), ResourceId> {
        let mut names = AHashMap::new();

        for package in packages {
            for (&type_id, group) in &package.types {
                let Some(type_name) = package.type_name(type_id) else {
                    warn!("package 0x{:02x} has no name for type 0x{:02x}", package.id, type_id);
                    continue;
                };

                for entry_id in group.entry_ids() {
                    let Some(entry_name) = package.entry_name(type_id, entry_id) else {
                        continue;
                    };

                    names
                        .entry((type_name.to_owned(), entry_name.to_owned()))
                        .or_insert(ResourceId::new(package.id, type_id, entry_id));
                }
            }
        }

        names
    }

    #[inline]
    pub(crate) fn id_by_name(&self, type_name: &str, entry_name: &str) -> Option<ResourceId> {
        // TODO: avoid the allocation with a borrowed key once hashbrown's Equivalent is usable here
        self.names
            .get(&(type_name.to_owned(), entry_name.to_owned()))
            .copied()
    }

    /// Position of the package declaring this id in [`ResourceTable::packages`]
    pub fn package_index(&self, package_id: u8) -> Option<usize> {
        self.packages.iter().position(|p| p.id == package_id)
    }

    pub fn package(&self, package_id: u8) -> Option<&ResTablePackage> {
        self.packages.iter().find(|p| p.id == package_id)
    }

    /// Find entry for the configuration qualifier
    ///
    /// Falls back to the default configuration and then to any configuration defining the entry
    pub fn entry(&self, id: ResourceId, qualifier: &str) -> Option<(&ResTableConfig, &ResEntry)> {
        let group = self.package(id.package_id())?.types.get(&id.type_id())?;
        let entry_id = id.entry_id();

        let find = |predicate: &dyn Fn(&ResTableConfig) -> bool| {
            group.types.iter().find_map(|t| {
                predicate(&t.config)
                    .then(|| t.entries.get(&entry_id).map(|e| (&t.config, e)))
                    .flatten()
            })
        };

        find(&|config| config.as_qualifier() == qualifier)
            .or_else(|| find(&|config| config.is_default()))
            .or_else(|| find(&|_| true))
    }

    /// Overlayable declaration covering the resource
    pub fn overlayable(&self, id: ResourceId) -> Option<(&Overlayable, u32)> {
        let package = self.package(id.package_id())?;
        package.overlayables.iter().find_map(|overlayable| {
            overlayable
                .policies
                .iter()
                .find(|policy| policy.ids.contains(&id))
                .map(|policy| (overlayable, policy.policy_flags))
        })
    }

    /// Whether any package declares `<overlayable>` resources
    pub fn defines_overlayable(&self) -> bool {
        self.packages.iter().any(|p| !p.overlayables.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{FixtureType, chunk, table_fixture, utf8_pool};

    fn sample_table() -> ResourceTable {
        let data = table_fixture(
            0x7f,
            &[
                FixtureType {
                    name: "string",
                    entries: &[("hello", 0x03, 0), ("bye", 0x03, 1)],
                },
                FixtureType {
                    name: "bool",
                    entries: &[("enabled", 0x12, 1)],
                },
            ],
            &["Hello", "Bye"],
            Some(("SystemUI", "overlay://theme", 0x0000_0002, &[0x7f010000])),
        );
        ResourceTable::new(&data).unwrap()
    }

    #[test]
    fn parse_package() {
        let table = sample_table();
        assert_eq!(table.packages.len(), 1);

        let package = &table.packages[0];
        assert_eq!(package.id, 0x7f);
        assert_eq!(package.name, "com.example");
        assert_eq!(package.type_name(1), Some("string"));
        assert_eq!(package.type_name(2), Some("bool"));
        assert_eq!(package.entry_name(1, 1), Some("bye"));
        assert_eq!(package.types[&1].spec_entry_count, 2);
    }

    #[test]
    fn name_index() {
        let table = sample_table();
        assert_eq!(table.id_by_name("string", "hello"), Some(ResourceId(0x7f010000)));
        assert_eq!(table.id_by_name("bool", "enabled"), Some(ResourceId(0x7f020000)));
        assert_eq!(table.id_by_name("string", "enabled"), None);
    }

    #[test]
    fn entry_values() {
        let table = sample_table();
        let (config, entry) = table.entry(ResourceId(0x7f010001), "").unwrap();
        assert!(config.is_default());
        assert_eq!(
            entry.simple_value().unwrap().to_string(&table.string_pool),
            "Bye"
        );

        // unknown qualifier falls back to the default configuration
        let (_, entry) = table.entry(ResourceId(0x7f020000), "land").unwrap();
        assert_eq!(
            entry.simple_value().unwrap().to_string(&table.string_pool),
            "true"
        );
        assert!(table.entry(ResourceId(0x7f010005), "").is_none());
    }

    #[test]
    fn overlayable_policies() {
        let table = sample_table();
        assert!(table.defines_overlayable());

        let (overlayable, flags) = table.overlayable(ResourceId(0x7f010000)).unwrap();
        assert_eq!(overlayable.name, "SystemUI");
        assert_eq!(overlayable.actor, "overlay://theme");
        assert_eq!(flags, 0x2);
        assert!(table.overlayable(ResourceId(0x7f010001)).is_none());
    }

    #[test]
    fn too_small() {
        assert!(matches!(
            ResourceTable::new(&[0; 4]),
            Err(ArscError::TooSmallError)
        ));
    }

    #[test]
    fn table_without_packages() {
        let data = chunk(0x0002, &0u32.to_le_bytes(), &utf8_pool(&[]));
        assert!(matches!(
            ResourceTable::new(&data),
            Err(ArscError::MissingPackage)
        ));
    }
}
