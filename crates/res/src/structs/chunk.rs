use winnow::binary::{le_u16, le_u32};
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::take;

/// See: https://cs.android.com/android/platform/superproject/main/+/main:frameworks/base/libs/androidfw/include/androidfw/ResourceTypes.h;l=237
#[derive(Debug, PartialEq, Eq, Clone, Copy, PartialOrd, Ord)]
pub(crate) enum ResourceType {
    Null,
    StringPool,
    Table,
    Xml,

    XmlStartNamespace,
    XmlEndNamespace,
    XmlStartElement,
    XmlEndElement,
    XmlCdata,
    XmlResourceMap,

    TablePackage,
    TableType,
    TableTypeSpec,
    TableLibrary,
    TableOverlayable,
    TableOverlayablePolicy,
    TableStagedAlias,

    Unknown(u16),
}

impl From<u16> for ResourceType {
    fn from(value: u16) -> Self {
        match value {
            0x0000 => ResourceType::Null,
            0x0001 => ResourceType::StringPool,
            0x0002 => ResourceType::Table,
            0x0003 => ResourceType::Xml,
            0x0100 => ResourceType::XmlStartNamespace,
            0x0101 => ResourceType::XmlEndNamespace,
            0x0102 => ResourceType::XmlStartElement,
            0x0103 => ResourceType::XmlEndElement,
            0x0104 => ResourceType::XmlCdata,
            0x0180 => ResourceType::XmlResourceMap,
            0x0200 => ResourceType::TablePackage,
            0x0201 => ResourceType::TableType,
            0x0202 => ResourceType::TableTypeSpec,
            0x0203 => ResourceType::TableLibrary,
            0x0204 => ResourceType::TableOverlayable,
            0x0205 => ResourceType::TableOverlayablePolicy,
            0x0206 => ResourceType::TableStagedAlias,
            other => ResourceType::Unknown(other),
        }
    }
}

/// Header that appears at the front of every data chunk in a resource
#[derive(Debug, Clone, Copy)]
pub(crate) struct ResChunkHeader {
    /// Type identifier for this chunk
    pub(crate) type_: ResourceType,

    /// Size of the chunk header (in bytes)
    pub(crate) header_size: u16,

    /// Total size of this chunk (in bytes), including header and any child chunks
    pub(crate) size: u32,
}

impl ResChunkHeader {
    /// 2 bytes type + 2 bytes header_size + 4 bytes size
    pub(crate) const SIZE: usize = 8;

    #[inline]
    pub(crate) fn parse(input: &mut &[u8]) -> ModalResult<ResChunkHeader> {
        (le_u16, le_u16, le_u32)
            .map(|(type_, header_size, size)| ResChunkHeader {
                type_: ResourceType::from(type_),
                header_size,
                size,
            })
            .parse_next(input)
    }
}

/// A complete chunk: the header plus a slice covering the whole chunk (header included)
#[derive(Debug, Clone, Copy)]
pub(crate) struct Chunk<'a> {
    pub(crate) header: ResChunkHeader,
    pub(crate) data: &'a [u8],
}

impl<'a> Chunk<'a> {
    pub(crate) fn parse(input: &mut &'a [u8]) -> ModalResult<Chunk<'a>> {
        let mut peek = *input;
        let header = ResChunkHeader::parse(&mut peek)?;

        let sane = header.header_size as usize >= ResChunkHeader::SIZE
            && header.header_size as u32 <= header.size;
        if !sane {
            return Err(ErrMode::Cut(ContextError::new()));
        }

        let data = take(header.size as usize).parse_next(input)?;

        Ok(Chunk { header, data })
    }

    /// Fields of the extended header, right after the common [`ResChunkHeader`]
    #[inline]
    pub(crate) fn header_fields(&self) -> &'a [u8] {
        &self.data[ResChunkHeader::SIZE..self.header.header_size as usize]
    }

    /// Everything after the header
    #[inline]
    pub(crate) fn body(&self) -> &'a [u8] {
        &self.data[self.header.header_size as usize..]
    }

    /// Iterate over child chunks stored in the body, stops at the first malformed chunk
    pub(crate) fn children(&self) -> ChunkIter<'a> {
        ChunkIter { input: self.body() }
    }
}

pub(crate) struct ChunkIter<'a> {
    input: &'a [u8],
}

impl<'a> Iterator for ChunkIter<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.input.len() < ResChunkHeader::SIZE {
            return None;
        }

        match Chunk::parse(&mut self.input) {
            Ok(chunk) => Some(chunk),
            Err(_) => {
                log::warn!("malformed chunk, skipped {} trailing bytes", self.input.len());
                self.input = &[];
                None
            }
        }
    }
}

/// Decode a NUL-terminated UTF-16LE fixed size field
pub(crate) fn utf16_field(raw: &[u8]) -> String {
    let units: Vec<u16> = raw
        .chunks_exact(2)
        .map(|chunk| u16::from_le_bytes([chunk[0], chunk[1]]))
        .take_while(|&c| c != 0)
        .collect();

    String::from_utf16_lossy(&units)
}
