use winnow::binary::{le_u16, le_u32};
use winnow::error::{ErrMode, Needed};
use winnow::prelude::*;
use winnow::token::take;

/// Only the variable-length tail matters, the central directory is authoritative
/// for sizes and compression
#[derive(Debug)]
pub(crate) struct LocalFileHeader {
    pub(crate) name_len: u16,
    pub(crate) extra_len: u16,
}

impl LocalFileHeader {
    const MAGIC: u32 = 0x04034b50;
    const FIXED_SIZE: usize = 30;

    pub(crate) fn parse(input: &[u8], offset: usize) -> ModalResult<LocalFileHeader> {
        let mut input = input
            .get(offset..)
            .ok_or(ErrMode::Incomplete(Needed::Unknown))?;

        le_u32
            .verify(|magic| *magic == Self::MAGIC)
            .parse_next(&mut input)?;
        // version, flags, method, time, date, crc and both sizes
        take(22usize).parse_next(&mut input)?;
        let (name_len, extra_len) = (le_u16, le_u16).parse_next(&mut input)?;

        Ok(LocalFileHeader {
            name_len,
            extra_len,
        })
    }

    /// Absolute offset of the file data for a header stored at `header_offset`
    #[inline]
    pub(crate) fn data_offset(&self, header_offset: usize) -> usize {
        header_offset + Self::FIXED_SIZE + self.name_len as usize + self.extra_len as usize
    }
}
