use memchr::memmem;
use winnow::binary::{le_u16, le_u32};
use winnow::prelude::*;

/// End of central directory record
#[derive(Debug)]
pub(crate) struct EndOfCentralDirectory {
    pub(crate) total_entries: u16,
    pub(crate) central_dir_size: u32,
    pub(crate) central_dir_offset: u32,
}

impl EndOfCentralDirectory {
    const MAGIC: [u8; 4] = [0x50, 0x4B, 0x05, 0x06];

    /// Size of the record without the trailing comment
    pub(crate) const SIZE: usize = 22;

    pub(crate) fn parse(input: &mut &[u8]) -> ModalResult<EndOfCentralDirectory> {
        let (_, _, _, _, total_entries, central_dir_size, central_dir_offset, _) = (
            le_u32.verify(|magic| *magic == u32::from_le_bytes(Self::MAGIC)), // magic
            le_u16,                                                           // disk_number
            le_u16,                                                           // central_dir_start_disk
            le_u16,                                                           // entries_on_this_disk
            le_u16,                                                           // total_entries
            le_u32,                                                           // central_dir_size
            le_u32,                                                           // central_dir_offset
            le_u16,                                                           // comment_length
        )
            .parse_next(input)?;

        Ok(EndOfCentralDirectory {
            total_entries,
            central_dir_size,
            central_dir_offset,
        })
    }

    /// Searching magic from the end of the file
    ///
    /// The comment is at most `u16::MAX` bytes long, so there is no point to look further back
    pub(crate) fn find(input: &[u8]) -> Option<usize> {
        let window = Self::SIZE + u16::MAX as usize;
        let start = input.len().saturating_sub(window);

        memmem::rfind(&input[start..], &Self::MAGIC)
            .map(|pos| start + pos)
            .filter(|offset| offset + Self::SIZE <= input.len())
    }
}
