use std::fmt;

use serde::Serialize;

/// Resource identifier packing `package:8`, `type:8` and `entry:16`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ResourceId(pub u32);

impl ResourceId {
    /// Generate Resource Id based on algorithm from AOSP
    #[inline]
    pub const fn new(package_id: u8, type_id: u8, entry_id: u16) -> ResourceId {
        ResourceId(((package_id as u32) << 24) | ((type_id as u32) << 16) | entry_id as u32)
    }

    #[inline]
    pub const fn package_id(self) -> u8 {
        (self.0 >> 24) as u8
    }

    #[inline]
    pub const fn type_id(self) -> u8 {
        ((self.0 >> 16) & 0xff) as u8
    }

    #[inline]
    pub const fn entry_id(self) -> u16 {
        (self.0 & 0xffff) as u16
    }
}

impl From<u32> for ResourceId {
    fn from(value: u32) -> Self {
        ResourceId(value)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}
