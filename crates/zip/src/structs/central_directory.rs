use winnow::binary::{le_u16, le_u32};
use winnow::combinator::repeat;
use winnow::error::{ErrMode, Needed};
use winnow::prelude::*;
use winnow::token::take;

use crate::structs::EndOfCentralDirectory;

#[derive(Debug)]
pub(crate) struct CentralDirectoryEntry {
    pub(crate) compression_method: u16,
    pub(crate) crc32: u32,
    pub(crate) compressed_size: u32,
    pub(crate) uncompressed_size: u32,
    pub(crate) local_header_offset: u32,
    pub(crate) file_name: String,
}

impl CentralDirectoryEntry {
    const MAGIC: u32 = 0x02014b50;

    fn parse(input: &mut &[u8]) -> ModalResult<CentralDirectoryEntry> {
        let (
            _,
            _,
            _,
            _,
            compression_method,
            _,
            _,
            crc32,
            compressed_size,
            uncompressed_size,
            file_name_length,
            extra_field_length,
            file_comment_length,
        ) = (
            le_u32.verify(|magic| *magic == Self::MAGIC), // magic
            le_u16,                                       // version_made_by
            le_u16,                                       // version_needed
            le_u16,                                       // general_purpose
            le_u16,                                       // compression_method
            le_u16,                                       // last_mod_time
            le_u16,                                       // last_mod_date
            le_u32,                                       // crc32
            le_u32,                                       // compressed_size
            le_u32,                                       // uncompressed_size
            le_u16,                                       // file_name_length
            le_u16,                                       // extra_field_length
            le_u16,                                       // file_comment_length
        )
            .parse_next(input)?;

        let (_, _, _, local_header_offset) = (
            le_u16, // disk_number_start
            le_u16, // internal_attrs
            le_u32, // external_attrs
            le_u32, // local_header_offset
        )
            .parse_next(input)?;

        let (file_name, _, _) = (
            take(file_name_length),
            take(extra_field_length),
            take(file_comment_length),
        )
            .parse_next(input)?;

        Ok(CentralDirectoryEntry {
            compression_method,
            crc32,
            compressed_size,
            uncompressed_size,
            local_header_offset,
            file_name: String::from_utf8_lossy(file_name).into_owned(),
        })
    }
}

#[derive(Debug)]
pub(crate) struct CentralDirectory {
    /// Entries in the order they appear in the archive
    pub(crate) entries: Vec<CentralDirectoryEntry>,
}

impl CentralDirectory {
    pub(crate) fn parse(
        input: &[u8],
        eocd: &EndOfCentralDirectory,
    ) -> ModalResult<CentralDirectory> {
        let start = eocd.central_dir_offset as usize;
        let end = start.saturating_add(eocd.central_dir_size as usize);

        let mut input = input
            .get(start..end)
            .ok_or(ErrMode::Incomplete(Needed::Unknown))?;

        // total_entries is unreliable in tampered archives, so read until the directory ends
        let entries: Vec<CentralDirectoryEntry> =
            repeat(0.., CentralDirectoryEntry::parse).parse_next(&mut input)?;

        if entries.len() != eocd.total_entries as usize {
            log::warn!(
                "central directory declares {} entries, but got {}",
                eocd.total_entries,
                entries.len()
            );
        }

        Ok(CentralDirectory { entries })
    }
}
