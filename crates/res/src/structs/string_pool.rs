use bitflags::bitflags;
use log::warn;
use winnow::binary::{le_u8, le_u16, le_u32};
use winnow::combinator::repeat;
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::take;

use crate::structs::{Chunk, ResourceType};

bitflags! {
    #[derive(Debug, Clone, Copy)]
    pub(crate) struct StringPoolFlags: u32 {
        const SORTED = 1 << 0;
        const UTF8 = 1 << 8;
    }
}

/// Decoded `ResStringPool`
///
/// Strings that can't be decoded are kept as empty strings, so indices stay aligned
#[derive(Debug, Default)]
pub struct StringPool {
    strings: Vec<String>,
    is_utf8: bool,
}

impl StringPool {
    pub(crate) fn parse(chunk: &Chunk<'_>) -> ModalResult<StringPool> {
        if chunk.header.type_ != ResourceType::StringPool {
            return Err(ErrMode::Cut(ContextError::new()));
        }

        let (string_count, style_count, flags, strings_start, _styles_start) =
            (le_u32, le_u32, le_u32, le_u32, le_u32).parse_next(&mut chunk.header_fields())?;

        let flags = StringPoolFlags::from_bits_truncate(flags);
        let is_utf8 = flags.contains(StringPoolFlags::UTF8);

        // the offsets can't overlap the string data, malware likes to lie about string_count
        let max_count = (strings_start as usize)
            .saturating_sub(chunk.header.header_size as usize)
            .saturating_sub(style_count as usize * 4)
            / 4;
        let string_count = if strings_start != 0 && string_count as usize > max_count {
            warn!(
                "string pool declares {} strings, but only {} offsets fit",
                string_count, max_count
            );
            max_count
        } else {
            string_count as usize
        };

        let offsets: Vec<u32> = repeat(string_count, le_u32).parse_next(&mut chunk.body())?;

        let data = chunk
            .data
            .get(strings_start as usize..)
            .unwrap_or_default();

        let strings = offsets
            .iter()
            .map(|&offset| {
                data.get(offset as usize..)
                    .and_then(|mut slice| Self::parse_string(&mut slice, is_utf8).ok())
                    .unwrap_or_default()
            })
            .collect();

        Ok(StringPool { strings, is_utf8 })
    }

    fn parse_string(input: &mut &[u8], is_utf8: bool) -> ModalResult<String> {
        if is_utf8 {
            // number of utf-16 units, then number of utf-8 bytes
            let _ = Self::utf8_length(input)?;
            let length = Self::utf8_length(input)?;
            let content = take(length).parse_next(input)?;

            Ok(String::from_utf8_lossy(content).into_owned())
        } else {
            let first = le_u16.parse_next(input)? as usize;
            let length = if first & 0x8000 != 0 {
                let second = le_u16.parse_next(input)? as usize;
                ((first & 0x7fff) << 16) | second
            } else {
                first
            };

            let content = take(length * 2).parse_next(input)?;
            let units: Vec<u16> = content
                .chunks_exact(2)
                .map(|chunk| u16::from_le_bytes([chunk[0], chunk[1]]))
                .collect();

            Ok(String::from_utf16_lossy(&units))
        }
    }

    #[inline]
    fn utf8_length(input: &mut &[u8]) -> ModalResult<usize> {
        let first = le_u8.parse_next(input)? as usize;
        if first & 0x80 != 0 {
            let second = le_u8.parse_next(input)? as usize;
            Ok(((first & 0x7f) << 8) | second)
        } else {
            Ok(first)
        }
    }

    #[inline]
    pub fn get(&self, idx: u32) -> Option<&str> {
        self.strings.get(idx as usize).map(String::as_str)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    #[inline]
    pub fn is_utf8(&self) -> bool {
        self.is_utf8
    }
}
