//! Read-only traversal of an [`Idmap`]

use std::io::{self, Write};

use crate::idmap::{DataBlockHeader, Idmap, IdmapHeader, PATH_LENGTH, TypeEntry};

/// Record reached by [`walk`], in stream order
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Header(&'a IdmapHeader),
    DataBlock(&'a DataBlockHeader),
    TypeEntry(&'a TypeEntry),
}

pub trait Visitor {
    fn visit(&mut self, node: Node<'_>) -> io::Result<()>;
}

/// Feed every record of the idmap to the visitor: the header, then each data block
/// header followed by its type entries
pub fn walk<V: Visitor + ?Sized>(idmap: &Idmap, visitor: &mut V) -> io::Result<()> {
    visitor.visit(Node::Header(&idmap.header))?;

    for block in &idmap.data_blocks {
        visitor.visit(Node::DataBlock(&block.header))?;

        for entry in &block.type_entries {
            visitor.visit(Node::TypeEntry(entry))?;
        }
    }

    Ok(())
}

/// Writes the binary idmap layout to a byte sink
pub struct BinaryStreamVisitor<W: Write> {
    writer: W,
}

impl<W: Write> BinaryStreamVisitor<W> {
    pub fn new(writer: W) -> Self {
        BinaryStreamVisitor { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    #[inline]
    fn write_u16(&mut self, value: u16) -> io::Result<()> {
        self.writer.write_all(&value.to_le_bytes())
    }

    #[inline]
    fn write_u32(&mut self, value: u32) -> io::Result<()> {
        self.writer.write_all(&value.to_le_bytes())
    }

    fn write_path(&mut self, path: &str) -> io::Result<()> {
        let mut buf = [0u8; PATH_LENGTH];
        let len = path.len().min(PATH_LENGTH);
        buf[..len].copy_from_slice(&path.as_bytes()[..len]);
        self.writer.write_all(&buf)
    }
}

impl<W: Write> Visitor for BinaryStreamVisitor<W> {
    fn visit(&mut self, node: Node<'_>) -> io::Result<()> {
        match node {
            Node::Header(header) => {
                self.write_u32(header.magic)?;
                self.write_u32(header.version)?;
                self.write_u32(header.target_crc)?;
                self.write_u32(header.overlay_crc)?;
                self.write_path(&header.target_path)?;
                self.write_path(&header.overlay_path)
            }
            Node::DataBlock(header) => {
                self.write_u16(header.target_package_id as u16)?;
                self.write_u16(header.type_count)
            }
            Node::TypeEntry(entry) => {
                self.write_u16(entry.target_type_id)?;
                self.write_u16(entry.overlay_type_id)?;
                self.write_u16(entry.entry_count())?;
                self.write_u16(entry.entry_offset)?;
                entry.entries.iter().try_for_each(|&id| self.write_u32(id))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idmap::tests::sample_idmap;

    #[derive(Default)]
    struct Recorder(Vec<String>);

    impl Visitor for Recorder {
        fn visit(&mut self, node: Node<'_>) -> io::Result<()> {
            self.0.push(match node {
                Node::Header(_) => "header".to_owned(),
                Node::DataBlock(block) => format!("block {:02x}", block.target_package_id),
                Node::TypeEntry(entry) => format!("type {}", entry.target_type_id),
            });
            Ok(())
        }
    }

    #[test]
    fn walk_order() {
        let mut idmap = sample_idmap();
        let mut second = idmap.data_blocks[0].clone();
        second.header.target_package_id = 0x01;
        second.type_entries[0].target_type_id = 5;
        idmap.data_blocks.push(second);

        let mut recorder = Recorder::default();
        walk(&idmap, &mut recorder).unwrap();
        assert_eq!(recorder.0, ["header", "block 7f", "type 1", "block 01", "type 5"]);
    }

    #[test]
    fn binary_visitor_matches_encoded_len() {
        let idmap = sample_idmap();
        let mut visitor = BinaryStreamVisitor::new(Vec::new());
        walk(&idmap, &mut visitor).unwrap();

        let bytes = visitor.into_inner();
        assert_eq!(bytes.len(), idmap.encoded_len());
        assert_eq!(bytes, idmap.to_bytes());
    }
}
