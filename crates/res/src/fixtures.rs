//! Builders for small binary resource files, used by tests of this and dependent crates
//!
//! Enabled with the `test-fixtures` feature.

/// Generic `ResChunk_header` chunk, `header` excludes the 8 common bytes
pub fn chunk(type_: u16, header: &[u8], body: &[u8]) -> Vec<u8> {
    let header_size = 8 + header.len();
    let size = header_size + body.len();
    let mut out = Vec::with_capacity(size);
    out.extend_from_slice(&type_.to_le_bytes());
    out.extend_from_slice(&(header_size as u16).to_le_bytes());
    out.extend_from_slice(&(size as u32).to_le_bytes());
    out.extend_from_slice(header);
    out.extend_from_slice(body);
    out
}

/// UTF-8 string pool chunk
pub fn utf8_pool(strings: &[&str]) -> Vec<u8> {
    const UTF8_FLAG: u32 = 1 << 8;

    let header_size = 28u16;
    let mut offsets = Vec::new();
    let mut data = Vec::new();
    for s in strings {
        offsets.extend_from_slice(&(data.len() as u32).to_le_bytes());
        data.push(s.chars().count() as u8);
        data.push(s.len() as u8);
        data.extend_from_slice(s.as_bytes());
        data.push(0);
    }
    while data.len() % 4 != 0 {
        data.push(0);
    }

    let strings_start = header_size as u32 + offsets.len() as u32;
    let size = strings_start + data.len() as u32;

    let mut chunk = Vec::new();
    chunk.extend_from_slice(&0x0001u16.to_le_bytes());
    chunk.extend_from_slice(&header_size.to_le_bytes());
    chunk.extend_from_slice(&size.to_le_bytes());
    chunk.extend_from_slice(&(strings.len() as u32).to_le_bytes());
    chunk.extend_from_slice(&0u32.to_le_bytes());
    chunk.extend_from_slice(&UTF8_FLAG.to_le_bytes());
    chunk.extend_from_slice(&strings_start.to_le_bytes());
    chunk.extend_from_slice(&0u32.to_le_bytes());
    chunk.extend_from_slice(&offsets);
    chunk.extend_from_slice(&data);
    chunk
}

/// 64-byte `ResTable_config` from `(offset, bytes)` patches
pub fn config_bytes(patches: &[(usize, &[u8])]) -> Vec<u8> {
    let mut raw = vec![0u8; 64];
    raw[..4].copy_from_slice(&64u32.to_le_bytes());
    for &(offset, bytes) in patches {
        raw[offset..offset + bytes.len()].copy_from_slice(bytes);
    }
    raw
}

fn utf16_fixed(s: &str, bytes: usize) -> Vec<u8> {
    let mut out: Vec<u8> = s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
    out.resize(bytes, 0);
    out
}

/// One resource type of a fixture package: name and `(entry name, value type, data)`
pub struct FixtureType<'a> {
    pub name: &'a str,
    pub entries: &'a [(&'a str, u8, u32)],
}

/// `<overlayable>` block of a fixture package: name, actor, policy flags and ids
pub type FixtureOverlayable<'a> = (&'a str, &'a str, u32, &'a [u32]);

/// `resources.arsc` with one package and the default configuration
///
/// Type ids are assigned from 1 in order, entry ids from 0.
pub fn table_fixture(
    package_id: u8,
    types: &[FixtureType<'_>],
    global_strings: &[&str],
    overlayable: Option<FixtureOverlayable<'_>>,
) -> Vec<u8> {
    const PACKAGE_HEADER_SIZE: u32 = 288;

    let type_names: Vec<&str> = types.iter().map(|t| t.name).collect();
    let key_names: Vec<&str> = types
        .iter()
        .flat_map(|t| t.entries.iter().map(|e| e.0))
        .collect();

    let type_pool = utf8_pool(&type_names);
    let key_pool = utf8_pool(&key_names);

    let mut children = Vec::new();
    let mut key_index = 0u32;
    for (i, fixture) in types.iter().enumerate() {
        let type_id = (i + 1) as u8;
        let count = fixture.entries.len() as u32;

        let mut spec_header = vec![type_id, 0, 0, 0];
        spec_header.extend_from_slice(&count.to_le_bytes());
        let spec_body: Vec<u8> = (0..count).flat_map(|_| 0u32.to_le_bytes()).collect();
        children.extend(chunk(0x0202, &spec_header, &spec_body));

        let mut offsets = Vec::new();
        let mut entries = Vec::new();
        for &(_, data_type, data) in fixture.entries {
            offsets.extend_from_slice(&(entries.len() as u32).to_le_bytes());
            entries.extend_from_slice(&8u16.to_le_bytes());
            entries.extend_from_slice(&0u16.to_le_bytes());
            entries.extend_from_slice(&key_index.to_le_bytes());
            entries.extend_from_slice(&8u16.to_le_bytes());
            entries.push(0);
            entries.push(data_type);
            entries.extend_from_slice(&data.to_le_bytes());
            key_index += 1;
        }

        let config = config_bytes(&[]);
        let header_size = 8 + 12 + config.len();
        let entries_start = header_size + offsets.len();
        let mut type_header = vec![type_id, 0, 0, 0];
        type_header.extend_from_slice(&count.to_le_bytes());
        type_header.extend_from_slice(&(entries_start as u32).to_le_bytes());
        type_header.extend_from_slice(&config);
        let mut body = offsets;
        body.extend_from_slice(&entries);
        children.extend(chunk(0x0201, &type_header, &body));
    }

    if let Some((name, actor, flags, ids)) = overlayable {
        let mut policy_header = flags.to_le_bytes().to_vec();
        policy_header.extend_from_slice(&(ids.len() as u32).to_le_bytes());
        let policy_body: Vec<u8> = ids.iter().flat_map(|id| id.to_le_bytes()).collect();
        let policy = chunk(0x0205, &policy_header, &policy_body);

        let mut header = utf16_fixed(name, 512);
        header.extend(utf16_fixed(actor, 512));
        children.extend(chunk(0x0204, &header, &policy));
    }

    let type_strings_offset = PACKAGE_HEADER_SIZE;
    let key_strings_offset = type_strings_offset + type_pool.len() as u32;

    let mut package_header = (package_id as u32).to_le_bytes().to_vec();
    package_header.extend(utf16_fixed("com.example", 256));
    package_header.extend_from_slice(&type_strings_offset.to_le_bytes());
    package_header.extend_from_slice(&(type_names.len() as u32).to_le_bytes());
    package_header.extend_from_slice(&key_strings_offset.to_le_bytes());
    package_header.extend_from_slice(&(key_names.len() as u32).to_le_bytes());
    package_header.extend_from_slice(&0u32.to_le_bytes());

    let mut package_body = type_pool;
    package_body.extend(key_pool);
    package_body.extend(children);
    let package = chunk(0x0200, &package_header, &package_body);

    let mut table_body = utf8_pool(global_strings);
    table_body.extend(package);
    chunk(0x0002, &1u32.to_le_bytes(), &table_body)
}

fn xml_node(type_: u16, body: &[u8]) -> Vec<u8> {
    // line number and comment
    let mut header = 1u32.to_le_bytes().to_vec();
    header.extend_from_slice(&u32::MAX.to_le_bytes());
    chunk(type_, &header, body)
}

/// `(name index, raw value index or u32::MAX, data type, data)`
pub type FixtureAttribute = (u32, u32, u8, u32);

/// Start element node, names are string pool indices
pub fn start_element(name: u32, attrs: &[FixtureAttribute]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&u32::MAX.to_le_bytes());
    body.extend_from_slice(&name.to_le_bytes());
    body.extend_from_slice(&20u16.to_le_bytes());
    body.extend_from_slice(&20u16.to_le_bytes());
    body.extend_from_slice(&(attrs.len() as u16).to_le_bytes());
    body.extend_from_slice(&[0; 6]);
    for &(name, raw, data_type, data) in attrs {
        body.extend_from_slice(&u32::MAX.to_le_bytes());
        body.extend_from_slice(&name.to_le_bytes());
        body.extend_from_slice(&raw.to_le_bytes());
        body.extend_from_slice(&8u16.to_le_bytes());
        body.push(0);
        body.push(data_type);
        body.extend_from_slice(&data.to_le_bytes());
    }
    xml_node(0x0102, &body)
}

pub fn end_element(name: u32) -> Vec<u8> {
    let mut body = u32::MAX.to_le_bytes().to_vec();
    body.extend_from_slice(&name.to_le_bytes());
    xml_node(0x0103, &body)
}

/// Wrap string pool and nodes into an xml document chunk
pub fn xml_document(body: &[u8]) -> Vec<u8> {
    chunk(0x0003, &[], body)
}

/// Compiled manifest of an overlay package, strings:
/// 0 manifest, 1 package, 2 com.example.overlay, 3 overlay, 4 targetPackage,
/// 5 target, 6 isStatic, 7 priority, 8 application
pub fn overlay_manifest(target: &str, is_static: bool, priority: u32) -> Vec<u8> {
    let strings = [
        "manifest",
        "package",
        "com.example.overlay",
        "overlay",
        "targetPackage",
        target,
        "isStatic",
        "priority",
        "application",
    ];

    let mut body = utf8_pool(&strings);
    body.extend(start_element(0, &[(1, 2, 0x03, 2)]));
    body.extend(start_element(
        3,
        &[
            (4, 5, 0x03, 5),
            (6, u32::MAX, 0x12, is_static as u32),
            (7, u32::MAX, 0x10, priority),
        ],
    ));
    body.extend(end_element(3));
    body.extend(start_element(8, &[]));
    body.extend(end_element(8));
    body.extend(end_element(0));

    xml_document(&body)
}
