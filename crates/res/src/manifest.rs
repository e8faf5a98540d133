use log::{debug, warn};
use serde::Serialize;
use winnow::binary::{le_u16, le_u32};
use winnow::prelude::*;

use crate::errors::AxmlError;
use crate::structs::{Chunk, ResourceType, ResourceValue, ResourceValueType, StringPool};

/// Attribute ids from `android.R.attr`, used when aapt stripped the attribute name
const SYSTEM_ATTRIBUTES: [(u32, &str); 3] = [
    (0x0101_0003, "name"),
    (0x0101_001c, "priority"),
    (0x0101_0021, "targetPackage"),
];

#[derive(Debug, Clone, Serialize)]
pub struct XmlAttribute {
    pub name: String,

    /// Rendered value, the raw string when aapt kept it
    pub value: String,

    pub typed_value: ResourceValue,
}

#[derive(Debug, Clone, Serialize)]
pub struct XmlElement {
    pub name: String,

    /// Nesting level, the root element has depth 0
    pub depth: usize,

    pub attributes: Vec<XmlAttribute>,
}

impl XmlElement {
    pub fn attribute(&self, name: &str) -> Option<&XmlAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// Overlay declaration from `<overlay>` in the manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverlayManifest {
    pub target_package: String,
    pub target_name: Option<String>,
    pub is_static: bool,
    pub priority: i32,
}

/// Compiled (binary xml) `AndroidManifest.xml`, flattened into document order
#[derive(Debug, Default)]
pub struct Manifest {
    pub is_tampered: bool,
    pub elements: Vec<XmlElement>,
}

impl Manifest {
    pub fn new(input: &[u8]) -> Result<Manifest, AxmlError> {
        if input.len() < 8 {
            return Err(AxmlError::TooSmallError);
        }

        let chunk = Chunk::parse(&mut &input[..]).map_err(|_| AxmlError::HeaderError)?;

        // some malware tamper this parameter
        let is_tampered = chunk.header.type_ != ResourceType::Xml;
        if is_tampered {
            warn!("unexpected xml chunk type: {:?}", chunk.header.type_);
        }

        let mut string_pool = None;
        let mut resource_map: Vec<u32> = Vec::new();
        let mut elements = Vec::new();
        let mut depth = 0usize;

        for child in chunk.children() {
            match child.header.type_ {
                ResourceType::StringPool if string_pool.is_none() => {
                    string_pool =
                        Some(StringPool::parse(&child).map_err(|_| AxmlError::StringPoolError)?);
                }
                ResourceType::XmlResourceMap => {
                    resource_map = child
                        .body()
                        .chunks_exact(4)
                        .map(|id| u32::from_le_bytes([id[0], id[1], id[2], id[3]]))
                        .collect();
                }
                ResourceType::XmlStartElement => {
                    let pool = string_pool.as_ref().ok_or(AxmlError::StringPoolError)?;
                    let element = Self::parse_start_element(&child, pool, &resource_map, depth)
                        .map_err(|_| AxmlError::XmlTreeError)?;
                    elements.push(element);
                    depth += 1;
                }
                ResourceType::XmlEndElement => {
                    depth = depth.saturating_sub(1);
                }
                ResourceType::XmlStartNamespace
                | ResourceType::XmlEndNamespace
                | ResourceType::XmlCdata => {}
                _ => debug!("skipped non xml chunk: {:?}", child.header),
            }
        }

        if elements.is_empty() {
            return Err(AxmlError::XmlTreeError);
        }

        Ok(Manifest {
            is_tampered,
            elements,
        })
    }

    fn parse_start_element(
        chunk: &Chunk<'_>,
        string_pool: &StringPool,
        resource_map: &[u32],
        depth: usize,
    ) -> ModalResult<XmlElement> {
        let mut body = chunk.body();
        let (_ns, name, attribute_start, attribute_size, attribute_count, _, _, _) = (
            le_u32, le_u32, le_u16, le_u16, le_u16, le_u16, le_u16, le_u16,
        )
            .parse_next(&mut body)?;

        let mut attributes = Vec::with_capacity(attribute_count as usize);
        // attribute_start is relative to the attrExt structure
        let base = chunk.body();
        for i in 0..attribute_count as usize {
            let offset = attribute_start as usize + i * attribute_size.max(20) as usize;
            let Some(mut raw) = base.get(offset..) else {
                warn!("attribute {} is outside of the element chunk", i);
                break;
            };

            let (_ns, attr_name, raw_value, typed_value) =
                (le_u32, le_u32, le_u32, ResourceValue::parse).parse_next(&mut raw)?;

            let Some(attr_name) = Self::attribute_name(attr_name, string_pool, resource_map) else {
                continue;
            };

            // skip garbage strings
            if attr_name.contains(char::is_whitespace) {
                warn!("skipped garbage attribute name: {:?}", attr_name);
                continue;
            }

            let value = match string_pool.get(raw_value) {
                Some(raw) => raw.to_owned(),
                None => typed_value.to_string(string_pool),
            };

            attributes.push(XmlAttribute {
                name: attr_name.to_owned(),
                value,
                typed_value,
            });
        }

        Ok(XmlElement {
            name: string_pool.get(name).unwrap_or_default().to_owned(),
            depth,
            attributes,
        })
    }

    fn attribute_name<'a>(
        idx: u32,
        string_pool: &'a StringPool,
        resource_map: &[u32],
    ) -> Option<&'a str> {
        if let Some(name) = string_pool.get(idx)
            && !name.is_empty()
        {
            return Some(name);
        }

        let id = resource_map.get(idx as usize)?;
        SYSTEM_ATTRIBUTES
            .iter()
            .find(|(attr_id, _)| attr_id == id)
            .map(|&(_, name)| name)
    }

    /// Value of the attribute on the first element with the given tag
    pub fn attribute(&self, tag: &str, name: &str) -> Option<&str> {
        self.elements
            .iter()
            .filter(|e| e.name == tag)
            .find_map(|e| e.attribute(name))
            .map(|a| a.value.as_str())
    }

    /// Retrieves the package name declared in the `<manifest>` tag
    #[inline]
    pub fn package_name(&self) -> Option<&str> {
        self.attribute("manifest", "package")
    }

    /// Overlay declaration, present only for runtime resource overlays
    pub fn overlay(&self) -> Option<OverlayManifest> {
        let element = self.elements.iter().find(|e| e.name == "overlay" && e.depth == 1)?;
        let target_package = element.attribute("targetPackage")?.value.clone();

        let is_static = element
            .attribute("isStatic")
            .map(|a| match a.typed_value.data_type {
                ResourceValueType::Boolean => a.typed_value.data != 0,
                _ => a.value == "true",
            })
            .unwrap_or(false);

        let priority = element
            .attribute("priority")
            .and_then(|a| match a.typed_value.data_type {
                ResourceValueType::Dec | ResourceValueType::Hex => Some(a.typed_value.data as i32),
                _ => a.value.parse().ok(),
            })
            .unwrap_or(0);

        Some(OverlayManifest {
            target_package,
            target_name: element.attribute("targetName").map(|a| a.value.clone()),
            is_static,
            priority,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{end_element, overlay_manifest, start_element, utf8_pool, xml_document};

    #[test]
    fn parse_overlay_manifest() {
        let manifest = Manifest::new(&overlay_manifest("com.example.target", true, 7)).unwrap();
        assert!(!manifest.is_tampered);
        assert_eq!(manifest.package_name(), Some("com.example.overlay"));
        assert_eq!(manifest.elements.len(), 3);
        assert_eq!(manifest.elements[2].depth, 1);

        assert_eq!(
            manifest.overlay(),
            Some(OverlayManifest {
                target_package: "com.example.target".to_owned(),
                target_name: None,
                is_static: true,
                priority: 7,
            })
        );
    }

    #[test]
    fn regular_app_has_no_overlay() {
        let mut data = utf8_pool(&["manifest", "package", "com.example"]);
        data.extend(start_element(0, &[(1, 2, 0x03, 2)]));
        data.extend(end_element(0));
        let manifest = Manifest::new(&xml_document(&data)).unwrap();
        assert_eq!(manifest.package_name(), Some("com.example"));
        assert!(manifest.overlay().is_none());
    }

    #[test]
    fn garbage_input() {
        assert!(matches!(Manifest::new(&[1, 2]), Err(AxmlError::TooSmallError)));
        assert!(Manifest::new(&[0xff; 64]).is_err());
    }
}
