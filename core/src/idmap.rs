//! In-memory idmap and its on-disk encoding
//!
//! All integers are little-endian. A stream is a fixed size [`IdmapHeader`] followed by
//! data blocks until EOF, every data block is a [`DataBlockHeader`] followed by
//! `type_count` [`TypeEntry`] records.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;

use idmap_res::ResourceId;
use log::{debug, warn};
use serde::Serialize;
use winnow::binary::{le_u16, le_u32};
use winnow::combinator::repeat;
use winnow::prelude::*;
use winnow::token::take;

use crate::digest::digest;
use crate::errors::{IdmapError, ParseError};
use crate::visitor::{BinaryStreamVisitor, walk};

/// "IDMP" read as a little-endian integer
pub const IDMAP_MAGIC: u32 = 0x504D4449;

pub const IDMAP_CURRENT_VERSION: u32 = 3;

/// Slot of a dense entry array without an overlay counterpart
pub const NO_ENTRY: u32 = 0xFFFF_FFFF;

/// Width of the NUL-padded path fields
pub const PATH_LENGTH: usize = 256;

/// 4 (magic) + 4 (version) + 4 (target crc) + 4 (overlay crc) + 2 * 256 (paths)
pub const HEADER_SIZE: usize = 0x21C;

/// Permissions of idmap files written to the cache
pub const IDMAP_FILE_MODE: u32 = 0o644;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdmapHeader {
    pub magic: u32,
    pub version: u32,
    pub target_crc: u32,
    pub overlay_crc: u32,
    pub target_path: String,
    pub overlay_path: String,
}

impl IdmapHeader {
    /// Header for a fresh build, paths longer than [`PATH_LENGTH`] bytes are truncated
    pub fn new(target_crc: u32, overlay_crc: u32, target_path: &str, overlay_path: &str) -> Self {
        IdmapHeader {
            magic: IDMAP_MAGIC,
            version: IDMAP_CURRENT_VERSION,
            target_crc,
            overlay_crc,
            target_path: truncate_path(target_path),
            overlay_path: truncate_path(overlay_path),
        }
    }

    /// Decode only the header, trailing data blocks are ignored
    pub fn parse(input: &[u8]) -> Result<IdmapHeader, ParseError> {
        let mut input = input;
        Self::parse_next(&mut input)
    }

    fn parse_next(input: &mut &[u8]) -> Result<IdmapHeader, ParseError> {
        if input.len() < HEADER_SIZE {
            return Err(ParseError::TruncatedStream);
        }

        let (magic, version, target_crc, overlay_crc, target_path, overlay_path) =
            Self::raw_fields(input).map_err(|_| ParseError::TruncatedStream)?;

        if magic != IDMAP_MAGIC {
            return Err(ParseError::BadMagic(magic));
        }
        if version != IDMAP_CURRENT_VERSION {
            return Err(ParseError::UnsupportedVersion(version));
        }

        Ok(IdmapHeader {
            magic,
            version,
            target_crc,
            overlay_crc,
            target_path: decode_path(target_path, "target path")?,
            overlay_path: decode_path(overlay_path, "overlay path")?,
        })
    }

    #[allow(clippy::type_complexity)]
    fn raw_fields<'a>(
        input: &mut &'a [u8],
    ) -> ModalResult<(u32, u32, u32, u32, &'a [u8], &'a [u8])> {
        (
            le_u32,
            le_u32,
            le_u32,
            le_u32,
            take(PATH_LENGTH),
            take(PATH_LENGTH),
        )
            .parse_next(input)
    }

    /// Read and decode the header of an idmap file without touching the data blocks
    pub fn from_path(path: impl AsRef<Path>) -> Result<IdmapHeader, IdmapError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| IdmapError::io(path, e))?;

        let mut buf = Vec::with_capacity(HEADER_SIZE);
        file.take(HEADER_SIZE as u64)
            .read_to_end(&mut buf)
            .map_err(|e| IdmapError::io(path, e))?;

        Ok(IdmapHeader::parse(&buf)?)
    }

    /// Whether both packages are still regular files whose digests match the stored ones
    ///
    /// Every I/O failure counts as stale.
    pub fn is_up_to_date(&self) -> bool {
        let fresh = |path: &str, crc: u32| match digest(path) {
            Ok(actual) if actual == crc => true,
            Ok(actual) => {
                debug!("{}: crc changed 0x{:08x} -> 0x{:08x}", path, crc, actual);
                false
            }
            Err(e) => {
                debug!("can't digest {}: {}", path, e);
                false
            }
        };

        fresh(&self.target_path, self.target_crc) && fresh(&self.overlay_path, self.overlay_crc)
    }
}

fn truncate_path(path: &str) -> String {
    if path.len() <= PATH_LENGTH {
        return path.to_owned();
    }

    let mut end = PATH_LENGTH;
    while !path.is_char_boundary(end) {
        end -= 1;
    }

    warn!("path is longer than {} bytes, truncated: {}", PATH_LENGTH, path);
    path[..end].to_owned()
}

fn decode_path(raw: &[u8], field: &'static str) -> Result<String, ParseError> {
    let len = memchr::memchr(0, raw).unwrap_or(raw.len());
    String::from_utf8(raw[..len].to_vec()).map_err(|_| ParseError::MalformedField(field))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataBlockHeader {
    pub target_package_id: u8,
    pub type_count: u16,
}

impl DataBlockHeader {
    pub const SIZE: usize = 4;

    fn parse(input: &mut &[u8]) -> ModalResult<(u16, u16)> {
        (le_u16, le_u16).parse_next(input)
    }
}

/// Dense mapping of one target type onto overlay resource ids
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeEntry {
    pub target_type_id: u16,
    pub overlay_type_id: u16,

    /// Target entry id of `entries[0]`
    pub entry_offset: u16,

    /// Full overlay resource ids or [`NO_ENTRY`]
    pub entries: Vec<u32>,
}

impl TypeEntry {
    /// 2 (target type) + 2 (overlay type) + 2 (entry count) + 2 (entry offset)
    pub const HEADER_SIZE: usize = 8;

    #[inline]
    pub fn entry_count(&self) -> u16 {
        self.entries.len() as u16
    }

    #[inline]
    pub fn encoded_len(&self) -> usize {
        Self::HEADER_SIZE + 4 * self.entries.len()
    }

    /// Overlay id for the target entry, `None` outside of the range or for [`NO_ENTRY`] slots
    pub fn lookup(&self, target_entry_id: u16) -> Option<ResourceId> {
        let idx = target_entry_id.checked_sub(self.entry_offset)?;
        self.entries
            .get(idx as usize)
            .copied()
            .filter(|&id| id != NO_ENTRY)
            .map(ResourceId)
    }

    fn parse(input: &mut &[u8]) -> ModalResult<TypeEntry> {
        let (target_type_id, overlay_type_id, entry_count, entry_offset) =
            (le_u16, le_u16, le_u16, le_u16).parse_next(input)?;
        let entries = repeat(entry_count as usize, le_u32).parse_next(input)?;

        Ok(TypeEntry {
            target_type_id,
            overlay_type_id,
            entry_offset,
            entries,
        })
    }
}

/// Type entries of a single target package
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataBlock {
    pub header: DataBlockHeader,
    pub type_entries: Vec<TypeEntry>,
}

impl DataBlock {
    pub fn new(target_package_id: u8, type_entries: Vec<TypeEntry>) -> DataBlock {
        DataBlock {
            header: DataBlockHeader {
                target_package_id,
                type_count: type_entries.len() as u16,
            },
            type_entries,
        }
    }

    #[inline]
    pub fn encoded_len(&self) -> usize {
        DataBlockHeader::SIZE + self.type_entries.iter().map(TypeEntry::encoded_len).sum::<usize>()
    }

    fn parse(input: &mut &[u8]) -> Result<DataBlock, ParseError> {
        let (package_id, type_count) =
            DataBlockHeader::parse(input).map_err(|_| ParseError::TruncatedStream)?;

        if package_id > 0xff {
            return Err(ParseError::MalformedField("target package id"));
        }

        let type_entries = repeat(type_count as usize, TypeEntry::parse)
            .parse_next(input)
            .map_err(|_| ParseError::TruncatedStream)?;

        Ok(DataBlock {
            header: DataBlockHeader {
                target_package_id: package_id as u8,
                type_count,
            },
            type_entries,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Idmap {
    pub header: IdmapHeader,
    pub data_blocks: Vec<DataBlock>,
}

impl Idmap {
    /// Decode a complete idmap stream, data blocks are read until EOF
    pub fn parse(input: &[u8]) -> Result<Idmap, ParseError> {
        let mut input = input;
        let header = IdmapHeader::parse_next(&mut input)?;

        let mut data_blocks = Vec::new();
        while !input.is_empty() {
            data_blocks.push(DataBlock::parse(&mut input)?);
        }

        Ok(Idmap {
            header,
            data_blocks,
        })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Idmap, IdmapError> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| IdmapError::io(path, e))?;

        Ok(Idmap::parse(&data)?)
    }

    /// Number of bytes [`Idmap::write_to`] produces
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.data_blocks.iter().map(DataBlock::encoded_len).sum::<usize>()
    }

    /// Overlay resource mapped onto the target resource
    pub fn lookup(&self, target_id: ResourceId) -> Option<ResourceId> {
        self.data_blocks
            .iter()
            .filter(|block| block.header.target_package_id == target_id.package_id())
            .flat_map(|block| &block.type_entries)
            .find(|entry| entry.target_type_id == target_id.type_id() as u16)
            .and_then(|entry| entry.lookup(target_id.entry_id()))
    }

    /// Serialize into a byte sink, in stream order
    pub fn write_to<W: Write>(&self, writer: W) -> io::Result<()> {
        let mut visitor = BinaryStreamVisitor::new(writer);
        walk(self, &mut visitor)?;
        visitor.into_inner().flush()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        // writes into a Vec can't fail
        let _ = self.write_to(&mut out);
        out
    }

    /// Write the idmap file with the given permission bits, replacing any previous file
    pub fn write_file(&self, path: impl AsRef<Path>, mode: u32) -> Result<(), IdmapError> {
        let path = path.as_ref();

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(mode);
        }

        let file = options.open(path).map_err(|e| IdmapError::io(path, e))?;

        // the creation mode is filtered through the umask, set the exact bits afterwards
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(mode))
                .map_err(|e| IdmapError::io(path, e))?;
        }
        #[cfg(not(unix))]
        let _ = mode;

        self.write_to(BufWriter::new(file))
            .map_err(|e| IdmapError::io(path, e))?;

        debug!("written {} bytes to {}", self.encoded_len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// The idmap of a single `string/hello` mapping, 0x7f010000 -> 0x7f020000
    pub(crate) fn sample_idmap() -> Idmap {
        Idmap {
            header: IdmapHeader::new(0x1122_3344, 0x5566_7788, "/target.apk", "/overlay.apk"),
            data_blocks: vec![DataBlock::new(
                0x7f,
                vec![TypeEntry {
                    target_type_id: 1,
                    overlay_type_id: 2,
                    entry_offset: 0,
                    entries: vec![0x7f02_0000],
                }],
            )],
        }
    }

    #[test]
    fn encode_layout() {
        let idmap = sample_idmap();
        let bytes = idmap.to_bytes();

        assert_eq!(bytes.len(), 0x230);
        assert_eq!(bytes.len(), idmap.encoded_len());
        assert_eq!(&bytes[..8], &[0x49, 0x44, 0x4d, 0x50, 0x03, 0x00, 0x00, 0x00]);
        assert_eq!(&bytes[8..12], &0x1122_3344u32.to_le_bytes());
        assert_eq!(&bytes[0x10..0x1b], b"/target.apk");
        assert!(bytes[0x1b..0x110].iter().all(|&b| b == 0));
        assert_eq!(&bytes[0x110..0x11c], b"/overlay.apk");
        assert_eq!(&bytes[0x21c..0x220], &[0x7f, 0x00, 0x01, 0x00]);
        assert_eq!(
            &bytes[0x220..0x228],
            &[0x01, 0x00, 0x02, 0x00, 0x01, 0x00, 0x00, 0x00]
        );
        assert_eq!(&bytes[0x228..], &[0x00, 0x00, 0x02, 0x7f]);
    }

    #[test]
    fn decode_encoded() {
        let idmap = sample_idmap();
        let bytes = idmap.to_bytes();

        let decoded = Idmap::parse(&bytes).unwrap();
        assert_eq!(decoded, idmap);
        assert_eq!(decoded.to_bytes(), bytes);
    }

    #[test]
    fn no_entry_slots_survive() {
        let mut idmap = sample_idmap();
        idmap.data_blocks[0].type_entries[0].entry_offset = 3;
        idmap.data_blocks[0].type_entries[0].entries = vec![0x7f02_0000, NO_ENTRY, 0x7f02_0001];

        let decoded = Idmap::parse(&idmap.to_bytes()).unwrap();
        let entry = &decoded.data_blocks[0].type_entries[0];
        assert_eq!(entry.entries[1], NO_ENTRY);
        assert_eq!(entry.entry_count(), 3);

        assert_eq!(decoded.lookup(ResourceId(0x7f01_0003)), Some(ResourceId(0x7f02_0000)));
        assert_eq!(decoded.lookup(ResourceId(0x7f01_0004)), None);
        assert_eq!(decoded.lookup(ResourceId(0x7f01_0005)), Some(ResourceId(0x7f02_0001)));
        assert_eq!(decoded.lookup(ResourceId(0x7f01_0002)), None);
        assert_eq!(decoded.lookup(ResourceId(0x7f01_0006)), None);
        assert_eq!(decoded.lookup(ResourceId(0x7f03_0003)), None);
    }

    #[test]
    fn header_errors() {
        let mut bytes = sample_idmap().to_bytes();

        assert_eq!(
            IdmapHeader::parse(&bytes[..HEADER_SIZE - 1]),
            Err(ParseError::TruncatedStream)
        );

        bytes[4] = 2;
        assert_eq!(Idmap::parse(&bytes), Err(ParseError::UnsupportedVersion(2)));

        bytes[0] = 0;
        assert_eq!(Idmap::parse(&bytes), Err(ParseError::BadMagic(0x504d4400)));
    }

    #[test]
    fn truncated_data_block() {
        let bytes = sample_idmap().to_bytes();

        for len in [HEADER_SIZE + 2, HEADER_SIZE + 6, bytes.len() - 1] {
            assert_eq!(
                Idmap::parse(&bytes[..len]),
                Err(ParseError::TruncatedStream),
                "length {len}"
            );
        }

        // the header alone is still a valid header
        assert!(IdmapHeader::parse(&bytes[..HEADER_SIZE]).is_ok());
    }

    #[test]
    fn package_id_high_byte() {
        let mut bytes = sample_idmap().to_bytes();
        bytes[HEADER_SIZE + 1] = 0x01;
        assert_eq!(
            Idmap::parse(&bytes),
            Err(ParseError::MalformedField("target package id"))
        );
    }

    #[test]
    fn long_paths() {
        let exact = format!("/{}", "a".repeat(PATH_LENGTH - 1));
        let long = format!("/{}", "b".repeat(PATH_LENGTH));

        let header = IdmapHeader::new(0, 0, &exact, &long);
        assert_eq!(header.target_path, exact);
        assert_eq!(header.overlay_path.len(), PATH_LENGTH);

        let idmap = Idmap {
            header,
            data_blocks: sample_idmap().data_blocks,
        };
        let bytes = idmap.to_bytes();
        // no NUL terminator for a path of exactly 256 bytes
        assert_eq!(bytes[0x10 + PATH_LENGTH - 1], b'a');

        let decoded = Idmap::parse(&bytes).unwrap();
        assert_eq!(decoded.header.target_path, exact);
        assert_eq!(decoded.header.overlay_path, &long[..PATH_LENGTH]);
    }

    #[test]
    fn multibyte_path_is_cut_on_char_boundary() {
        let path = format!("/{}", "ж".repeat(PATH_LENGTH));
        let truncated = truncate_path(&path);
        assert!(truncated.len() <= PATH_LENGTH);
        assert!(path.starts_with(&truncated));
    }

    #[test]
    fn write_and_read_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overlay.idmap");

        let idmap = sample_idmap();
        idmap.write_file(&path, IDMAP_FILE_MODE).unwrap();

        assert_eq!(Idmap::from_path(&path).unwrap(), idmap);
        assert_eq!(IdmapHeader::from_path(&path).unwrap(), idmap.header);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, IDMAP_FILE_MODE);
        }
    }

    #[test]
    fn missing_packages_are_stale() {
        let header = IdmapHeader::new(0, 0, "/nonexistent/target.apk", "/nonexistent/overlay.apk");
        assert!(!header.is_up_to_date());
    }
}
