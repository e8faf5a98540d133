pub(crate) mod chunk;
pub(crate) mod config;
pub(crate) mod string_pool;
pub(crate) mod value;

pub(crate) use chunk::*;
pub use config::ResTableConfig;
pub use string_pool::StringPool;
pub use value::{ResourceValue, ResourceValueType};
