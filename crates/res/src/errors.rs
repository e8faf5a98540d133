use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArscError {
    /// Provided file too small to be resources.arsc
    #[error("file size too small for resources file")]
    TooSmallError,

    /// Invalid header
    #[error("got error while parsing header")]
    HeaderError,

    /// Got error while parsing string pool
    #[error("got error while parsing string pool")]
    StringPoolError,

    /// Got error while parsing resource table package
    #[error("got error while parsing resource table package")]
    ResourceTableError,

    /// Resource table without a single package
    #[error("resource table does not contain any package")]
    MissingPackage,
}

#[derive(Error, Debug)]
pub enum AxmlError {
    /// Provided file too small to be manifest
    #[error("file size too small for manifest")]
    TooSmallError,

    /// Invalid header
    #[error("got error while parsing header")]
    HeaderError,

    /// Got error while parsing string pool
    #[error("got error while parsing string pool")]
    StringPoolError,

    /// Got error while parsing xml tree
    #[error("got error while parsing xml tree")]
    XmlTreeError,
}
