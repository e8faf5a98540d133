use std::io::{self, Write};

use idmap_res::ResourceId;

use crate::idmap::{DataBlockHeader, HEADER_SIZE, NO_ENTRY, PATH_LENGTH, TypeEntry};
use crate::package::ResourcePackage;
use crate::visitor::{Node, Visitor};

/// Human readable dump, one `OOOOOOOO: VVVVVVVV  label` line per field
///
/// Offsets are absolute positions in the binary encoding. Resource ids get a
/// `type/name` suffix when the corresponding package is available.
pub struct RawPrintVisitor<'a, W: Write> {
    writer: W,
    offset: usize,
    package_id: u8,
    target: Option<&'a dyn ResourcePackage>,
    overlay: Option<&'a dyn ResourcePackage>,
}

impl<'a, W: Write> RawPrintVisitor<'a, W> {
    pub fn new(writer: W) -> Self {
        RawPrintVisitor {
            writer,
            offset: 0,
            package_id: 0,
            target: None,
            overlay: None,
        }
    }

    /// Decorate ids with names from the packages the idmap was built from
    pub fn with_packages(
        mut self,
        target: Option<&'a dyn ResourcePackage>,
        overlay: Option<&'a dyn ResourcePackage>,
    ) -> Self {
        self.target = target;
        self.overlay = overlay;
        self
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn print(&mut self, value: u32, width: usize, label: &str) -> io::Result<()> {
        writeln!(
            self.writer,
            "{:08x}: {:0width$x}  {}",
            self.offset,
            value,
            label,
            width = width
        )
    }

    fn print_u16(&mut self, value: u16, label: &str) -> io::Result<()> {
        self.print(value as u32, 4, label)?;
        self.offset += 2;
        Ok(())
    }

    fn print_u32(&mut self, value: u32, label: &str) -> io::Result<()> {
        self.print(value, 8, label)?;
        self.offset += 4;
        Ok(())
    }

    fn print_path(&mut self, path: &str, label: &str) -> io::Result<()> {
        writeln!(self.writer, "{:08x}: {}: {}", self.offset, label, path)?;
        self.offset += PATH_LENGTH;
        Ok(())
    }

    fn id_label(package: Option<&dyn ResourcePackage>, id: ResourceId, label: &str) -> String {
        match package.and_then(|p| p.reverse(id).ok()) {
            Some((type_name, entry_name)) => format!("{}: {}/{}", label, type_name, entry_name),
            None => label.to_owned(),
        }
    }

    fn print_data_block(&mut self, header: &DataBlockHeader) -> io::Result<()> {
        self.package_id = header.target_package_id;
        self.print_u16(header.target_package_id as u16, "target package id")?;
        self.print_u16(header.type_count, "type count")
    }

    fn print_type_entry(&mut self, entry: &TypeEntry) -> io::Result<()> {
        self.print_u16(entry.target_type_id, "target type")?;
        self.print_u16(entry.overlay_type_id, "overlay type")?;
        self.print_u16(entry.entry_count(), "entry count")?;
        self.print_u16(entry.entry_offset, "entry offset")?;

        for (i, &overlay_id) in entry.entries.iter().enumerate() {
            if overlay_id == NO_ENTRY {
                self.print_u32(NO_ENTRY, "no entry")?;
                continue;
            }

            let target_id = ResourceId::new(
                self.package_id,
                entry.target_type_id as u8,
                entry.entry_offset.wrapping_add(i as u16),
            );

            // the target id isn't stored, it is derived from the slot position
            let label = Self::id_label(self.target, target_id, "target id");
            self.print(target_id.0, 8, &label)?;

            let label = Self::id_label(self.overlay, ResourceId(overlay_id), "overlay id");
            self.print_u32(overlay_id, &label)?;
        }

        Ok(())
    }
}

impl<W: Write> Visitor for RawPrintVisitor<'_, W> {
    fn visit(&mut self, node: Node<'_>) -> io::Result<()> {
        match node {
            Node::Header(header) => {
                self.offset = 0;
                self.print_u32(header.magic, "magic")?;
                self.print_u32(header.version, "version")?;
                self.print_u32(header.target_crc, "target crc")?;
                self.print_u32(header.overlay_crc, "overlay crc")?;
                self.print_path(&header.target_path, "target path")?;
                self.print_path(&header.overlay_path, "overlay path")?;
                debug_assert_eq!(self.offset, HEADER_SIZE);
                Ok(())
            }
            Node::DataBlock(header) => self.print_data_block(header),
            Node::TypeEntry(entry) => self.print_type_entry(entry),
        }
    }
}
