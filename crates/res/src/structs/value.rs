use serde::Serialize;
use winnow::binary::{le_u8, le_u16, le_u32};
use winnow::prelude::*;

use crate::structs::StringPool;

/// Type of the data value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResourceValueType {
    /// The `data` is either 0 or 1, specifying this resource is either undefined or empty, respectively.
    Null,

    /// The `data` holds a reference to another resource table entry.
    Reference,

    /// The `data` holds an attribute resource identifier.
    Attribute,

    /// The `data` holds an index into the containing resource table's global value string pool.
    String,

    /// The `data` holds a single-precision floating point number.
    Float,

    /// The `data` holds a complex number encoding a dimension value, such as "100in".
    Dimension,

    /// The `data` holds a complex number encoding a fraction of a container.
    Fraction,

    /// The `data` holds a dynamic reference, resolved at runtime
    DynamicReference,

    /// The `data` is a raw integer value of the form n..n.
    Dec,

    /// The `data` is a raw integer value of the form 0xn..n.
    Hex,

    /// The `data` is either 0 or 1, for input "false" or "true" respectively.
    Boolean,

    /// The `data` is a raw integer value of the form #aarrggbb.
    ColorArgb8,

    /// The `data` is a raw integer value of the form #rrggbb.
    ColorRgb8,

    /// The `data` is a raw integer value of the form #argb.
    ColorArgb4,

    /// The `data` is a raw integer value of the form #rgb.
    ColorRgb4,

    Unknown(u8),
}

impl From<u8> for ResourceValueType {
    fn from(value: u8) -> Self {
        match value {
            0x00 => ResourceValueType::Null,
            0x01 => ResourceValueType::Reference,
            0x02 => ResourceValueType::Attribute,
            0x03 => ResourceValueType::String,
            0x04 => ResourceValueType::Float,
            0x05 => ResourceValueType::Dimension,
            0x06 => ResourceValueType::Fraction,
            0x07 => ResourceValueType::DynamicReference,
            0x10 => ResourceValueType::Dec,
            0x11 => ResourceValueType::Hex,
            0x12 => ResourceValueType::Boolean,
            0x1c => ResourceValueType::ColorArgb8,
            0x1d => ResourceValueType::ColorRgb8,
            0x1e => ResourceValueType::ColorArgb4,
            0x1f => ResourceValueType::ColorRgb4,
            v => ResourceValueType::Unknown(v),
        }
    }
}

/// Representation of a value in a resource, supplying type information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResourceValue {
    pub data_type: ResourceValueType,
    pub data: u32,
}

impl ResourceValue {
    const RADIX_MULTS: [f64; 4] = [0.00390625, 3.051758e-005, 1.192093e-007, 4.656613e-010];
    const DIMENSION_UNITS: [&str; 6] = ["px", "dip", "sp", "pt", "in", "mm"];
    const FRACTION_UNITS: [&str; 2] = ["%", "%p"];
    const COMPLEX_UNIT_MASK: u32 = 0x0f;

    /// Parse `Res_value`: size, res0, data type and data
    #[inline]
    pub(crate) fn parse(input: &mut &[u8]) -> ModalResult<ResourceValue> {
        (le_u16, le_u8, le_u8, le_u32)
            .map(|(_, _, data_type, data)| ResourceValue {
                data_type: ResourceValueType::from(data_type),
                data,
            })
            .parse_next(input)
    }

    /// References have to be resolved before the value can be used
    #[inline]
    pub fn is_reference(&self) -> bool {
        matches!(
            self.data_type,
            ResourceValueType::Reference | ResourceValueType::DynamicReference
        ) && self.data != 0
    }

    pub fn to_string(&self, string_pool: &StringPool) -> String {
        match self.data_type {
            ResourceValueType::Reference | ResourceValueType::DynamicReference => {
                format!("@0x{:08x}", self.data)
            }
            ResourceValueType::Attribute => format!("?0x{:08x}", self.data),
            ResourceValueType::String => string_pool
                .get(self.data)
                .map(str::to_owned)
                .unwrap_or_default(),
            ResourceValueType::Float => f32::from_bits(self.data).to_string(),
            ResourceValueType::Dimension => {
                let idx = (self.data & Self::COMPLEX_UNIT_MASK) as usize;
                let unit = Self::DIMENSION_UNITS.get(idx).unwrap_or(&"");
                format!("{}{}", self.complex_to_float(), unit)
            }
            ResourceValueType::Fraction => {
                let idx = (self.data & Self::COMPLEX_UNIT_MASK) as usize;
                let unit = Self::FRACTION_UNITS.get(idx).unwrap_or(&"");
                format!("{}{}", self.complex_to_float() * 100f64, unit)
            }
            ResourceValueType::Dec => format!("{}", self.data as i32),
            ResourceValueType::Hex => format!("0x{:08x}", self.data),
            ResourceValueType::Boolean => {
                if self.data == 0 {
                    "false".to_owned()
                } else {
                    "true".to_owned()
                }
            }
            ResourceValueType::ColorArgb8
            | ResourceValueType::ColorRgb8
            | ResourceValueType::ColorArgb4
            | ResourceValueType::ColorRgb4 => format!("#{:08x}", self.data),
            ResourceValueType::Null => "@null".to_owned(),
            ResourceValueType::Unknown(t) => format!("<0x{:x}, type 0x{:02x}>", self.data, t),
        }
    }

    #[inline(always)]
    fn complex_to_float(&self) -> f64 {
        ((self.data & 0xFFFFFF00) as f64) * Self::RADIX_MULTS[((self.data >> 4) & 3) as usize]
    }
}
