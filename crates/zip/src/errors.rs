use thiserror::Error;

#[derive(Error, Debug)]
pub enum ZipError {
    /// File does not start with a local file header
    #[error("not a zip archive: missing local file header magic")]
    InvalidHeader,

    /// Can't operate without EOCD
    #[error("can't find EOCD in zip")]
    NotFoundEOCD,

    /// Generic parsing error
    #[error("got error while parsing zip archive")]
    ParseError,

    /// Provided file not found in zip
    #[error("file not exist in zip: {0}")]
    FileNotFound(String),

    /// Entry points outside of the archive data
    #[error("got EOF while reading {0}")]
    EOF(String),

    /// Got error while decompressing object
    #[error("got error while decompressing {0}")]
    DecompressionError(String),

    /// Compression method other than stored or deflated
    #[error("unsupported compression method {method} for {name}")]
    UnsupportedCompression { name: String, method: u16 },
}
