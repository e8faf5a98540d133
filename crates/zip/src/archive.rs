use ahash::AHashMap;
use flate2::{Decompress, FlushDecompress, Status};
use log::warn;

use crate::errors::ZipError;
use crate::structs::{CentralDirectory, CentralDirectoryEntry, EndOfCentralDirectory, LocalFileHeader};

const METHOD_STORED: u16 = 0;
const METHOD_DEFLATED: u16 = 8;

/// Represents a parsed ZIP archive held in memory
pub struct ZipArchive {
    input: Vec<u8>,
    entries: Vec<CentralDirectoryEntry>,
    index: AHashMap<String, usize>,
}

impl ZipArchive {
    pub fn new(input: Vec<u8>) -> Result<ZipArchive, ZipError> {
        // perform basic sanity check
        if !input.starts_with(b"PK\x03\x04") {
            return Err(ZipError::InvalidHeader);
        }

        let eocd_offset = EndOfCentralDirectory::find(&input).ok_or(ZipError::NotFoundEOCD)?;

        let eocd = EndOfCentralDirectory::parse(&mut &input[eocd_offset..])
            .map_err(|_| ZipError::ParseError)?;

        let central_directory =
            CentralDirectory::parse(&input, &eocd).map_err(|_| ZipError::ParseError)?;

        let entries = central_directory.entries;
        let mut index = AHashMap::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            // first entry wins, the same way as the platform resolves duplicates
            index.entry(entry.file_name.clone()).or_insert(i);
        }

        Ok(ZipArchive {
            input,
            entries,
            index,
        })
    }

    /// Get list of the filenames in central directory order
    pub fn namelist(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.file_name.as_str())
    }

    #[inline]
    pub fn contains(&self, filename: &str) -> bool {
        self.index.contains_key(filename)
    }

    /// CRC-32 recorded in the central directory for the given file
    pub fn crc32(&self, filename: &str) -> Option<u32> {
        self.index.get(filename).map(|&i| self.entries[i].crc32)
    }

    /// Read and decompress file from zip archive
    pub fn read(&self, filename: &str) -> Result<Vec<u8>, ZipError> {
        let entry = self
            .index
            .get(filename)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| ZipError::FileNotFound(filename.to_owned()))?;

        let local_header = LocalFileHeader::parse(&self.input, entry.local_header_offset as usize)
            .map_err(|_| ZipError::ParseError)?;

        let offset = local_header.data_offset(entry.local_header_offset as usize);
        let compressed_size = entry.compressed_size as usize;
        let uncompressed_size = entry.uncompressed_size as usize;

        let get_slice = |size: usize| {
            self.input
                .get(offset..offset.saturating_add(size))
                .ok_or_else(|| ZipError::EOF(filename.to_owned()))
        };

        match entry.compression_method {
            METHOD_STORED => Ok(get_slice(uncompressed_size)?.to_vec()),
            METHOD_DEFLATED => {
                let compressed = get_slice(compressed_size)?;
                Self::inflate(filename, compressed, uncompressed_size)
            }
            method if compressed_size == uncompressed_size => {
                // tampered method field, data is actually stored
                warn!(
                    "{}: unknown compression method {}, reading as stored",
                    filename, method
                );
                Ok(get_slice(uncompressed_size)?.to_vec())
            }
            method => Err(ZipError::UnsupportedCompression {
                name: filename.to_owned(),
                method,
            }),
        }
    }

    fn inflate(filename: &str, data: &[u8], size_hint: usize) -> Result<Vec<u8>, ZipError> {
        let mut output = Vec::with_capacity(size_hint);
        let mut decompressor = Decompress::new(false);

        match decompressor.decompress_vec(data, &mut output, FlushDecompress::Finish) {
            Ok(Status::Ok) | Ok(Status::StreamEnd) => Ok(output),
            _ => Err(ZipError::DecompressionError(filename.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::Compression;
    use flate2::write::DeflateEncoder;

    use super::*;

    fn build_zip(files: &[(&str, &[u8], bool)]) -> Vec<u8> {
        let mut output = Vec::new();
        let mut directory = Vec::new();

        for &(name, data, deflate) in files {
            let (method, payload) = if deflate {
                let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(data).unwrap();
                (METHOD_DEFLATED, encoder.finish().unwrap())
            } else {
                (METHOD_STORED, data.to_vec())
            };

            let offset = output.len() as u32;
            output.extend_from_slice(&0x04034b50u32.to_le_bytes());
            output.extend_from_slice(&[20, 0, 0, 0]);
            output.extend_from_slice(&method.to_le_bytes());
            output.extend_from_slice(&[0; 4]);
            output.extend_from_slice(&0u32.to_le_bytes());
            output.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            output.extend_from_slice(&(data.len() as u32).to_le_bytes());
            output.extend_from_slice(&(name.len() as u16).to_le_bytes());
            output.extend_from_slice(&0u16.to_le_bytes());
            output.extend_from_slice(name.as_bytes());
            output.extend_from_slice(&payload);

            directory.extend_from_slice(&0x02014b50u32.to_le_bytes());
            directory.extend_from_slice(&[20, 0, 20, 0, 0, 0]);
            directory.extend_from_slice(&method.to_le_bytes());
            directory.extend_from_slice(&[0; 4]);
            directory.extend_from_slice(&0u32.to_le_bytes());
            directory.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            directory.extend_from_slice(&(data.len() as u32).to_le_bytes());
            directory.extend_from_slice(&(name.len() as u16).to_le_bytes());
            directory.extend_from_slice(&[0; 8]);
            directory.extend_from_slice(&0u32.to_le_bytes());
            directory.extend_from_slice(&offset.to_le_bytes());
            directory.extend_from_slice(name.as_bytes());
        }

        let directory_offset = output.len() as u32;
        output.extend_from_slice(&directory);
        output.extend_from_slice(&0x06054b50u32.to_le_bytes());
        output.extend_from_slice(&[0; 4]);
        output.extend_from_slice(&(files.len() as u16).to_le_bytes());
        output.extend_from_slice(&(files.len() as u16).to_le_bytes());
        output.extend_from_slice(&(directory.len() as u32).to_le_bytes());
        output.extend_from_slice(&directory_offset.to_le_bytes());
        output.extend_from_slice(&0u16.to_le_bytes());
        output
    }

    #[test]
    fn read_stored_and_deflated() {
        let data = build_zip(&[
            ("resources.arsc", b"stored payload", false),
            ("AndroidManifest.xml", b"deflated payload deflated payload", true),
        ]);

        let zip = ZipArchive::new(data).unwrap();
        assert_eq!(
            zip.namelist().collect::<Vec<_>>(),
            vec!["resources.arsc", "AndroidManifest.xml"]
        );
        assert_eq!(zip.read("resources.arsc").unwrap(), b"stored payload");
        assert_eq!(
            zip.read("AndroidManifest.xml").unwrap(),
            b"deflated payload deflated payload"
        );
    }

    #[test]
    fn missing_file() {
        let zip = ZipArchive::new(build_zip(&[("a", b"1", false)])).unwrap();
        assert!(!zip.contains("b"));
        assert!(matches!(zip.read("b"), Err(ZipError::FileNotFound(name)) if name == "b"));
    }

    #[test]
    fn not_a_zip() {
        assert!(matches!(
            ZipArchive::new(b"IDMP".to_vec()),
            Err(ZipError::InvalidHeader)
        ));
    }

    #[test]
    fn truncated_directory() {
        let mut data = build_zip(&[("a", b"1", false)]);
        // drop the end of central directory record
        data.truncate(data.len() - 22);
        assert!(matches!(ZipArchive::new(data), Err(ZipError::NotFoundEOCD)));
    }
}
