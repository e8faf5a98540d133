use std::fmt::{self, Display, Write};

use log::warn;
use winnow::binary::le_u32;
use winnow::prelude::*;
use winnow::token::take;

/// Describes a particular resource configuration
///
/// The structure grew over platform releases, so only the bytes covered by `size` are
/// meaningful; everything else reads as zero ("any").
///
/// [Source Code](https://cs.android.com/android/platform/superproject/main/+/main:frameworks/base/libs/androidfw/include/androidfw/ResourceTypes.h;l=986)
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResTableConfig {
    raw: [u8; Self::MAX_SIZE],
}

impl Default for ResTableConfig {
    fn default() -> Self {
        ResTableConfig {
            raw: [0; Self::MAX_SIZE],
        }
    }
}

impl ResTableConfig {
    const MAX_SIZE: usize = 64;

    pub(crate) fn parse(input: &mut &[u8]) -> ModalResult<ResTableConfig> {
        let size = le_u32.parse_next(input)?;
        let fields = take(size.saturating_sub(4) as usize).parse_next(input)?;

        if size as usize > Self::MAX_SIZE {
            warn!("got unexpected ResTable_config size {}, extra fields ignored", size);
        }

        let mut config = ResTableConfig::default();
        let len = fields.len().min(Self::MAX_SIZE - 4);
        config.raw[4..4 + len].copy_from_slice(&fields[..len]);

        Ok(config)
    }

    #[inline]
    fn u8_at(&self, offset: usize) -> u8 {
        self.raw[offset]
    }

    #[inline]
    fn u16_at(&self, offset: usize) -> u16 {
        u16::from_le_bytes([self.raw[offset], self.raw[offset + 1]])
    }

    /// Configuration with every qualifier set to "any"
    #[inline]
    pub fn is_default(&self) -> bool {
        self.raw.iter().all(|&b| b == 0)
    }

    pub fn mcc(&self) -> u16 {
        self.u16_at(4)
    }

    pub fn mnc(&self) -> u16 {
        self.u16_at(6)
    }

    pub fn language(&self) -> Option<String> {
        Self::decode_locale_part([self.u8_at(8), self.u8_at(9)], b'a')
    }

    pub fn country(&self) -> Option<String> {
        Self::decode_locale_part([self.u8_at(10), self.u8_at(11)], b'0')
    }

    pub fn orientation(&self) -> u8 {
        self.u8_at(12)
    }

    pub fn touchscreen(&self) -> u8 {
        self.u8_at(13)
    }

    pub fn density(&self) -> u16 {
        self.u16_at(14)
    }

    pub fn sdk_version(&self) -> u16 {
        self.u16_at(24)
    }

    /// Two 7-bit ASCII letters, or three letters packed in 5 bits each with the high bit set
    fn decode_locale_part(bytes: [u8; 2], base: u8) -> Option<String> {
        if bytes == [0, 0] {
            return None;
        }

        if bytes[0] & 0x80 == 0 {
            return Some(String::from_utf8_lossy(&bytes).into_owned());
        }

        let first = bytes[1] & 0x1f;
        let second = ((bytes[1] & 0xe0) >> 5) | ((bytes[0] & 0x03) << 3);
        let third = (bytes[0] & 0x7c) >> 2;

        Some(
            [first, second, third]
                .iter()
                .map(|&c| (c + base) as char)
                .collect(),
        )
    }

    /// Qualifier string as used in resource directory names, empty for the default config
    ///
    /// [Source Code](https://cs.android.com/android/platform/superproject/main/+/main:frameworks/base/libs/androidfw/ResourceTypes.cpp;l=3368)
    pub fn as_qualifier(&self) -> String {
        let mut parts: Vec<String> = Vec::new();

        if self.mcc() != 0 {
            parts.push(format!("mcc{}", self.mcc()));
        }
        if self.mnc() != 0 {
            parts.push(format!("mnc{}", self.mnc()));
        }

        if let Some(language) = self.language() {
            let mut locale = language;
            if let Some(country) = self.country() {
                let _ = write!(locale, "-r{}", country);
            }
            parts.push(locale);
        }

        let screen_layout = self.u8_at(28);
        match screen_layout & 0xc0 {
            0x40 => parts.push("ldltr".into()),
            0x80 => parts.push("ldrtl".into()),
            _ => {}
        }

        let smallest_width = self.u16_at(30);
        if smallest_width != 0 {
            parts.push(format!("sw{}dp", smallest_width));
        }
        let width_dp = self.u16_at(32);
        if width_dp != 0 {
            parts.push(format!("w{}dp", width_dp));
        }
        let height_dp = self.u16_at(34);
        if height_dp != 0 {
            parts.push(format!("h{}dp", height_dp));
        }

        match screen_layout & 0x0f {
            0x01 => parts.push("small".into()),
            0x02 => parts.push("normal".into()),
            0x03 => parts.push("large".into()),
            0x04 => parts.push("xlarge".into()),
            _ => {}
        }
        match screen_layout & 0x30 {
            0x10 => parts.push("notlong".into()),
            0x20 => parts.push("long".into()),
            _ => {}
        }
        match self.u8_at(48) & 0x03 {
            0x01 => parts.push("notround".into()),
            0x02 => parts.push("round".into()),
            _ => {}
        }

        match self.orientation() {
            0x00 => {}
            0x01 => parts.push("port".into()),
            0x02 => parts.push("land".into()),
            0x03 => parts.push("square".into()),
            v => parts.push(format!("orientation={}", v)),
        }

        let ui_mode = self.u8_at(29);
        match ui_mode & 0x0f {
            0x00 | 0x01 => {}
            0x02 => parts.push("desk".into()),
            0x03 => parts.push("car".into()),
            0x04 => parts.push("television".into()),
            0x05 => parts.push("appliance".into()),
            0x06 => parts.push("watch".into()),
            0x07 => parts.push("vrheadset".into()),
            v => parts.push(format!("uiModeType={}", v)),
        }
        match ui_mode & 0x30 {
            0x10 => parts.push("notnight".into()),
            0x20 => parts.push("night".into()),
            _ => {}
        }

        let density = Density::from(self.density());
        if !matches!(density, Density::Default) {
            parts.push(density.to_string());
        }

        match self.touchscreen() {
            0x00 => {}
            0x01 => parts.push("notouch".into()),
            0x02 => parts.push("stylus".into()),
            0x03 => parts.push("finger".into()),
            v => parts.push(format!("touchscreen={}", v)),
        }

        let input_flags = self.u8_at(18);
        match input_flags & 0x03 {
            0x01 => parts.push("keysexposed".into()),
            0x02 => parts.push("keyshidden".into()),
            0x03 => parts.push("keyssoft".into()),
            _ => {}
        }
        match self.u8_at(16) {
            0x01 => parts.push("nokeys".into()),
            0x02 => parts.push("qwerty".into()),
            0x03 => parts.push("12key".into()),
            _ => {}
        }
        match input_flags & 0x0c {
            0x04 => parts.push("navexposed".into()),
            0x08 => parts.push("navhidden".into()),
            _ => {}
        }
        match self.u8_at(17) {
            0x01 => parts.push("nonav".into()),
            0x02 => parts.push("dpad".into()),
            0x03 => parts.push("trackball".into()),
            0x04 => parts.push("wheel".into()),
            _ => {}
        }

        let (screen_width, screen_height) = (self.u16_at(20), self.u16_at(22));
        if screen_width != 0 || screen_height != 0 {
            parts.push(format!("{}x{}", screen_width, screen_height));
        }

        if self.sdk_version() != 0 {
            let minor = self.u16_at(26);
            if minor != 0 {
                parts.push(format!("v{}.{}", self.sdk_version(), minor));
            } else {
                parts.push(format!("v{}", self.sdk_version()));
            }
        }

        parts.join("-")
    }
}

impl fmt::Debug for ResTableConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ResTableConfig")
            .field(&self.as_qualifier())
            .finish()
    }
}

impl Display for ResTableConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_default() {
            f.write_str("default")
        } else {
            f.write_str(&self.as_qualifier())
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Density {
    Default,
    Low,
    Medium,
    TV,
    High,
    XHigh,
    XXHigh,
    XXXHigh,
    Any,
    None,
    Unknown(u16),
}

impl From<u16> for Density {
    fn from(value: u16) -> Self {
        match value {
            0 => Self::Default,
            120 => Self::Low,
            160 => Self::Medium,
            213 => Self::TV,
            240 => Self::High,
            320 => Self::XHigh,
            480 => Self::XXHigh,
            640 => Self::XXXHigh,
            0xfffe => Self::Any,
            0xffff => Self::None,
            v => Self::Unknown(v),
        }
    }
}

impl Display for Density {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => Ok(()),
            Self::Low => write!(f, "ldpi"),
            Self::Medium => write!(f, "mdpi"),
            Self::TV => write!(f, "tvdpi"),
            Self::High => write!(f, "hdpi"),
            Self::XHigh => write!(f, "xhdpi"),
            Self::XXHigh => write!(f, "xxhdpi"),
            Self::XXXHigh => write!(f, "xxxhdpi"),
            Self::Any => write!(f, "anydpi"),
            Self::None => write!(f, "nodpi"),
            Self::Unknown(v) => write!(f, "{}dpi", v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::config_bytes;

    fn parse(data: &[u8]) -> ResTableConfig {
        ResTableConfig::parse(&mut &data[..]).unwrap()
    }

    #[test]
    fn default_config() {
        let config = parse(&config_bytes(&[]));
        assert!(config.is_default());
        assert_eq!(config.as_qualifier(), "");
        assert_eq!(config.to_string(), "default");
    }

    #[test]
    fn locale_density_version() {
        let config = parse(&config_bytes(&[
            (8, b"en"),
            (10, b"US"),
            (12, &[0x02]),
            (14, &240u16.to_le_bytes()),
            (24, &21u16.to_le_bytes()),
        ]));
        assert_eq!(config.as_qualifier(), "en-rUS-land-hdpi-v21");
    }

    #[test]
    fn short_config_is_zero_extended() {
        // pre-honeycomb tables only carry 28 bytes
        let mut data = config_bytes(&[(4, &310u16.to_le_bytes())]);
        data.truncate(28);
        data[..4].copy_from_slice(&28u32.to_le_bytes());
        data.extend_from_slice(b"tail");

        let mut input = &data[..];
        let config = ResTableConfig::parse(&mut input).unwrap();
        assert_eq!(config.as_qualifier(), "mcc310");
        assert_eq!(input, b"tail");
    }
}
