pub mod archive;
pub mod errors;

mod structs;
pub use archive::*;
pub use errors::*;
