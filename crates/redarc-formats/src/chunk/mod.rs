//! Resource chunk reader
//!
//! A resource chunk (magic `CR2W`) is a self-describing object graph. A
//! 40-byte header is followed by a directory of ten `(position, count, crc)`
//! slots; the first seven locate the strings blob and the six record tables:
//!
//! | Slot | Table | Record |
//! |------|-------|--------|
//! | 0 | strings | null-terminated text, `count` is the blob length |
//! | 1 | names | [`Name`] |
//! | 2 | imports | [`Import`] |
//! | 3 | properties | [`Property`] |
//! | 4 | exports | [`Export`] |
//! | 5 | buffers | [`Buffer`] |
//! | 6 | embedded | [`Embedded`] |
//!
//! Table positions and every payload offset stored in records are measured
//! from the first byte of the chunk. Records refer to text by byte offset
//! into the strings blob and to names by index into the name table.

mod graph;
mod header;
mod records;

pub use graph::{DepthFirst, ExportGraph};
pub use header::{CHUNK_MAGIC, ChunkHeader, TABLE_DIRECTORY_SLOTS, TableEntry, TableKind};
pub use records::{Buffer, Embedded, Export, Import, Name, Property};

use std::borrow::Cow;

use tracing::debug;

use crate::error::{FormatError, FormatResult};
use crate::view::{Record, RecordArray, slice_at};

/// A table resolved from the directory
#[derive(Debug, Clone, Copy)]
pub enum Table<'a> {
    Strings(&'a [u8]),
    Names(RecordArray<'a, Name>),
    Imports(RecordArray<'a, Import>),
    Properties(RecordArray<'a, Property>),
    Exports(RecordArray<'a, Export>),
    Buffers(RecordArray<'a, Buffer>),
    Embedded(RecordArray<'a, Embedded>),
}

impl Table<'_> {
    pub const fn kind(&self) -> TableKind {
        match self {
            Self::Strings(_) => TableKind::Strings,
            Self::Names(_) => TableKind::Names,
            Self::Imports(_) => TableKind::Imports,
            Self::Properties(_) => TableKind::Properties,
            Self::Exports(_) => TableKind::Exports,
            Self::Buffers(_) => TableKind::Buffers,
            Self::Embedded(_) => TableKind::Embedded,
        }
    }

    /// Record count, or byte length for the strings blob
    pub const fn len(&self) -> usize {
        match self {
            Self::Strings(blob) => blob.len(),
            Self::Names(view) => view.len(),
            Self::Imports(view) => view.len(),
            Self::Properties(view) => view.len(),
            Self::Exports(view) => view.len(),
            Self::Buffers(view) => view.len(),
            Self::Embedded(view) => view.len(),
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A single record of any kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkRecord<'a> {
    /// String starting at the requested byte offset
    String(&'a [u8]),
    Name(Name),
    Import(Import),
    Property(Property),
    Export(Export),
    Buffer(Buffer),
    Embedded(Embedded),
}

/// Read-only view over a resource chunk
#[derive(Debug, Clone)]
pub struct ResourceChunk<'a> {
    bytes: &'a [u8],
    header: ChunkHeader,
    directory: RecordArray<'a, TableEntry>,
    strings: &'a [u8],
    names: RecordArray<'a, Name>,
    imports: RecordArray<'a, Import>,
    properties: RecordArray<'a, Property>,
    exports: RecordArray<'a, Export>,
    buffers: RecordArray<'a, Buffer>,
    embedded: RecordArray<'a, Embedded>,
}

impl<'a> ResourceChunk<'a> {
    /// Whether `bytes` start with the chunk magic
    pub fn is_chunk(bytes: &[u8]) -> bool {
        bytes.starts_with(&CHUNK_MAGIC)
    }

    /// Parse the header and resolve every table.
    ///
    /// Absent tables (zero position or count) become empty views.
    pub fn open(bytes: &'a [u8]) -> FormatResult<Self> {
        let magic: [u8; 4] = bytes
            .get(..4)
            .and_then(|m| m.try_into().ok())
            .ok_or_else(|| FormatError::corrupt("chunk header", "chunk shorter than magic"))?;
        if magic != CHUNK_MAGIC {
            return Err(FormatError::UnsupportedMagic {
                format: "resource chunk",
                expected: CHUNK_MAGIC,
                actual: magic,
            });
        }

        let header = ChunkHeader::decode(slice_at(
            bytes,
            0,
            ChunkHeader::SIZE as u64,
            "chunk header",
        )?)?;
        let directory = RecordArray::<TableEntry>::new(
            bytes,
            ChunkHeader::SIZE as u64,
            TABLE_DIRECTORY_SLOTS as u64,
        )?;

        let strings_entry = directory.get(TableKind::Strings.slot())?;
        let strings: &'a [u8] = if strings_entry.is_absent() {
            &[]
        } else {
            slice_at(
                bytes,
                u64::from(strings_entry.position),
                u64::from(strings_entry.count),
                "strings",
            )?
        };

        let chunk = Self {
            bytes,
            header,
            directory,
            strings,
            names: resolve_table(bytes, &directory, TableKind::Names)?,
            imports: resolve_table(bytes, &directory, TableKind::Imports)?,
            properties: resolve_table(bytes, &directory, TableKind::Properties)?,
            exports: resolve_table(bytes, &directory, TableKind::Exports)?,
            buffers: resolve_table(bytes, &directory, TableKind::Buffers)?,
            embedded: resolve_table(bytes, &directory, TableKind::Embedded)?,
        };

        debug!(
            "Opened chunk v{}: {} names, {} imports, {} properties, {} exports, {} buffers, {} embedded",
            header.version,
            chunk.names.len(),
            chunk.imports.len(),
            chunk.properties.len(),
            chunk.exports.len(),
            chunk.buffers.len(),
            chunk.embedded.len()
        );
        Ok(chunk)
    }

    pub const fn header(&self) -> &ChunkHeader {
        &self.header
    }

    /// The chunk bytes this view borrows
    pub const fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// All ten directory slots, including the three reserved ones
    pub const fn table_directory(&self) -> RecordArray<'a, TableEntry> {
        self.directory
    }

    /// The table of `kind`; empty when absent.
    pub const fn table(&self, kind: TableKind) -> Table<'a> {
        match kind {
            TableKind::Strings => Table::Strings(self.strings),
            TableKind::Names => Table::Names(self.names),
            TableKind::Imports => Table::Imports(self.imports),
            TableKind::Properties => Table::Properties(self.properties),
            TableKind::Exports => Table::Exports(self.exports),
            TableKind::Buffers => Table::Buffers(self.buffers),
            TableKind::Embedded => Table::Embedded(self.embedded),
        }
    }

    /// Fetch record `index` of `kind`.
    ///
    /// For the strings blob the index is a byte offset and the string
    /// starting there is returned.
    pub fn record(&self, kind: TableKind, index: usize) -> FormatResult<ChunkRecord<'a>> {
        Ok(match kind {
            TableKind::Strings => {
                if index >= self.strings.len() {
                    return Err(FormatError::IndexOutOfRange {
                        table: "strings",
                        index,
                        count: self.strings.len(),
                    });
                }
                ChunkRecord::String(self.resolve_string(index as u32)?)
            }
            TableKind::Names => ChunkRecord::Name(self.names.get(index)?),
            TableKind::Imports => ChunkRecord::Import(self.imports.get(index)?),
            TableKind::Properties => ChunkRecord::Property(self.properties.get(index)?),
            TableKind::Exports => ChunkRecord::Export(self.exports.get(index)?),
            TableKind::Buffers => ChunkRecord::Buffer(self.buffers.get(index)?),
            TableKind::Embedded => ChunkRecord::Embedded(self.embedded.get(index)?),
        })
    }

    pub const fn strings(&self) -> &'a [u8] {
        self.strings
    }

    pub const fn names(&self) -> RecordArray<'a, Name> {
        self.names
    }

    pub const fn imports(&self) -> RecordArray<'a, Import> {
        self.imports
    }

    pub const fn properties(&self) -> RecordArray<'a, Property> {
        self.properties
    }

    pub const fn exports(&self) -> RecordArray<'a, Export> {
        self.exports
    }

    pub const fn buffers(&self) -> RecordArray<'a, Buffer> {
        self.buffers
    }

    pub const fn embedded(&self) -> RecordArray<'a, Embedded> {
        self.embedded
    }

    /// Bytes from `offset` in the strings blob up to the next null.
    pub fn resolve_string(&self, offset: u32) -> FormatResult<&'a [u8]> {
        let start = offset as usize;
        let rest = self.strings.get(start..).filter(|r| !r.is_empty()).ok_or_else(|| {
            FormatError::corrupt(
                "strings",
                format!("offset {offset} beyond blob of {} bytes", self.strings.len()),
            )
        })?;
        let end = rest.iter().position(|&b| b == 0).ok_or_else(|| {
            FormatError::corrupt("strings", format!("string at offset {offset} is not terminated"))
        })?;
        Ok(&rest[..end])
    }

    /// [`resolve_string`](Self::resolve_string) decoded as UTF-8, lossily
    pub fn resolve_str(&self, offset: u32) -> FormatResult<Cow<'a, str>> {
        self.resolve_string(offset).map(String::from_utf8_lossy)
    }

    pub fn name_text(&self, name: &Name) -> FormatResult<Cow<'a, str>> {
        self.resolve_str(name.value)
    }

    /// Text of the name at `index`, referenced from table `from`
    fn name_ref(&self, index: u16, from: &'static str) -> FormatResult<Cow<'a, str>> {
        let name = referenced(&self.names, usize::from(index), from)?;
        self.name_text(&name)
    }

    pub fn import_class_name(&self, import: &Import) -> FormatResult<Cow<'a, str>> {
        self.name_ref(import.class_name, "imports")
    }

    pub fn import_depot_path(&self, import: &Import) -> FormatResult<Cow<'a, str>> {
        self.resolve_str(import.depot_path)
    }

    pub fn property_class_name(&self, property: &Property) -> FormatResult<Cow<'a, str>> {
        self.name_ref(property.class_name, "properties")
    }

    pub fn property_name(&self, property: &Property) -> FormatResult<Cow<'a, str>> {
        self.resolve_str(u32::from(property.property_name))
    }

    pub fn export_class_name(&self, export: &Export) -> FormatResult<Cow<'a, str>> {
        self.name_ref(export.class_name, "exports")
    }

    /// `<class name>#<index>` for the export at `index`
    pub fn export_display_name(&self, index: usize) -> FormatResult<String> {
        let export = self.exports.get(index)?;
        Ok(format!("{}#{index}", self.export_class_name(&export)?))
    }

    /// Index of the parent of export `index`, `None` for roots.
    pub fn export_parent(&self, index: usize) -> FormatResult<Option<usize>> {
        let export = self.exports.get(index)?;
        match export.parent_index() {
            None => Ok(None),
            Some(parent) if parent == index => Err(FormatError::corrupt(
                "exports",
                format!("export {index} is its own parent"),
            )),
            Some(parent) => {
                referenced(&self.exports, parent, "exports")?;
                Ok(Some(parent))
            }
        }
    }

    /// Indices of the exports whose parent is `index`, in table order.
    ///
    /// Scans the whole export table; use [`export_graph`](Self::export_graph)
    /// to walk the full tree.
    pub fn export_children(&self, index: usize) -> FormatResult<Vec<usize>> {
        if index >= self.exports.len() {
            return Err(FormatError::IndexOutOfRange {
                table: "exports",
                index,
                count: self.exports.len(),
            });
        }
        let mut children = Vec::new();
        for (child, export) in self.exports.iter().enumerate() {
            if child != index && export?.parent_index() == Some(index) {
                children.push(child);
            }
        }
        Ok(children)
    }

    /// Build the parent/child index for all exports.
    pub fn export_graph(&self) -> FormatResult<ExportGraph> {
        ExportGraph::build(self.exports)
    }

    /// Serialized payload of `export`
    pub fn export_data(&self, export: &Export) -> FormatResult<&'a [u8]> {
        slice_at(
            self.bytes,
            u64::from(export.data_offset),
            u64::from(export.data_size),
            "exports",
        )
    }

    /// Stored bytes of `buffer`, returned verbatim
    pub fn buffer_data(&self, buffer: &Buffer) -> FormatResult<&'a [u8]> {
        slice_at(
            self.bytes,
            u64::from(buffer.offset),
            u64::from(buffer.disk_size),
            "buffers",
        )
    }

    pub fn embedded_path(&self, embedded: &Embedded) -> FormatResult<Cow<'a, str>> {
        self.resolve_str(embedded.path)
    }

    /// Import linked from `embedded`, `None` when the index is 0.
    ///
    /// The meaning of this link is not settled.
    pub fn embedded_import(&self, embedded: &Embedded) -> FormatResult<Option<Import>> {
        match embedded.import_index {
            0 => Ok(None),
            id => referenced(&self.imports, id as usize - 1, "embedded").map(Some),
        }
    }

    pub fn embedded_data(&self, embedded: &Embedded) -> FormatResult<&'a [u8]> {
        slice_at(
            self.bytes,
            u64::from(embedded.data_offset),
            u64::from(embedded.data_size),
            "embedded",
        )
    }
}

fn resolve_table<'a, T: Record>(
    bytes: &'a [u8],
    directory: &RecordArray<'a, TableEntry>,
    kind: TableKind,
) -> FormatResult<RecordArray<'a, T>> {
    let entry = directory.get(kind.slot())?;
    if entry.is_absent() {
        return Ok(RecordArray::empty());
    }
    RecordArray::new(bytes, u64::from(entry.position), u64::from(entry.count))
}

/// Fetch a record named by another record; a dangling index is corruption,
/// not a caller error.
fn referenced<T: Record>(view: &RecordArray<'_, T>, index: usize, from: &'static str) -> FormatResult<T> {
    if index >= view.len() {
        return Err(FormatError::corrupt(
            from,
            format!(
                "reference to {} {index} beyond count {}",
                T::TABLE,
                view.len()
            ),
        ));
    }
    view.get(index)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils::{BUFFER_SECTION, ChunkBuilder};

    #[test]
    fn test_name_text() {
        let mut builder = ChunkBuilder::new();
        builder.raw_strings(b"Foo\0");
        builder.name_at(0, 0);
        let bytes = builder.build();

        let chunk = ResourceChunk::open(&bytes).unwrap();
        let name = chunk.names().get(0).unwrap();
        assert_eq!(chunk.name_text(&name).unwrap(), "Foo");
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = ChunkBuilder::new().build();
        bytes[..4].copy_from_slice(b"W2RC");
        assert!(matches!(
            ResourceChunk::open(&bytes),
            Err(FormatError::UnsupportedMagic { .. })
        ));
        assert!(!ResourceChunk::is_chunk(&bytes));
        assert!(ResourceChunk::is_chunk(b"CR2W...."));
    }

    #[test]
    fn test_absent_tables_are_empty() {
        let bytes = ChunkBuilder::new().build();
        let chunk = ResourceChunk::open(&bytes).unwrap();
        for kind in TableKind::ALL {
            let table = chunk.table(kind);
            assert_eq!(table.kind(), kind);
            assert!(table.is_empty());
        }
        assert_eq!(chunk.table_directory().len(), TABLE_DIRECTORY_SLOTS);
        assert!(matches!(
            chunk.record(TableKind::Exports, 0),
            Err(FormatError::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn test_table_outside_chunk() {
        let mut builder = ChunkBuilder::new();
        builder.name("only");
        let bytes = builder.build();
        // Drop the tail of the name table.
        assert!(matches!(
            ResourceChunk::open(&bytes[..bytes.len() - 2]),
            Err(FormatError::CorruptTable { table: "names", .. })
        ));
    }

    #[test]
    fn test_resolve_string_bounds() {
        let mut builder = ChunkBuilder::new();
        builder.raw_strings(b"ab\0c\0dangling");
        let bytes = builder.build();
        let chunk = ResourceChunk::open(&bytes).unwrap();

        assert_eq!(chunk.resolve_string(0).unwrap(), b"ab");
        assert_eq!(chunk.resolve_string(1).unwrap(), b"b");
        assert_eq!(chunk.resolve_string(2).unwrap(), b"");
        assert_eq!(chunk.resolve_string(3).unwrap(), b"c");
        assert!(chunk.resolve_string(5).is_err());
        assert!(chunk.resolve_string(13).is_err());
        assert!(chunk.resolve_string(u32::MAX).is_err());
    }

    #[test]
    fn test_cross_references() {
        let mut builder = ChunkBuilder::new();
        let handle = builder.name("CHandle");
        let mesh = builder.name("CMesh");
        builder.import("base\\characters\\body.mesh", mesh, 3);
        builder.property(handle, "appearance");
        builder.export(mesh, 0, 0, 0);
        let bytes = builder.build();
        let chunk = ResourceChunk::open(&bytes).unwrap();

        let import = chunk.imports().get(0).unwrap();
        assert_eq!(chunk.import_class_name(&import).unwrap(), "CMesh");
        assert_eq!(
            chunk.import_depot_path(&import).unwrap(),
            "base\\characters\\body.mesh"
        );

        let property = chunk.properties().get(0).unwrap();
        assert_eq!(chunk.property_class_name(&property).unwrap(), "CHandle");
        assert_eq!(chunk.property_name(&property).unwrap(), "appearance");

        assert_eq!(chunk.export_display_name(0).unwrap(), "CMesh#0");
        match chunk.record(TableKind::Imports, 0).unwrap() {
            ChunkRecord::Import(record) => assert_eq!(record, import),
            other => panic!("unexpected record {other:?}"),
        }
    }

    #[test]
    fn test_dangling_name_index_is_corruption() {
        let mut builder = ChunkBuilder::new();
        builder.name("Only");
        builder.export(4, 0, 0, 0);
        let bytes = builder.build();
        let chunk = ResourceChunk::open(&bytes).unwrap();
        let export = chunk.exports().get(0).unwrap();
        assert!(matches!(
            chunk.export_class_name(&export),
            Err(FormatError::CorruptTable { table: "exports", .. })
        ));
    }

    #[test]
    fn test_export_tree() {
        let mut builder = ChunkBuilder::new();
        let class = builder.name("CObject");
        builder.export(class, 0, 0, 0);
        builder.export(class, 1, 0, 0);
        builder.export(class, 2, 0, 0);
        let bytes = builder.build();
        let chunk = ResourceChunk::open(&bytes).unwrap();

        assert_eq!(chunk.export_children(0).unwrap(), [1]);
        assert_eq!(chunk.export_children(1).unwrap(), [2]);
        assert!(chunk.export_children(2).unwrap().is_empty());
        assert_eq!(chunk.export_parent(0).unwrap(), None);
        assert_eq!(chunk.export_parent(2).unwrap(), Some(1));
        assert!(chunk.export_children(3).is_err());

        let graph = chunk.export_graph().unwrap();
        for index in 0..3 {
            assert_eq!(
                graph.children(index).unwrap(),
                chunk.export_children(index).unwrap().as_slice()
            );
        }
    }

    #[test]
    fn test_export_self_parent() {
        let mut builder = ChunkBuilder::new();
        let class = builder.name("CObject");
        builder.export(class, 1, 0, 0);
        let bytes = builder.build();
        let chunk = ResourceChunk::open(&bytes).unwrap();
        assert!(chunk.export_parent(0).is_err());
        assert!(chunk.export_children(0).unwrap().is_empty());
    }

    #[test]
    fn test_buffer_and_export_data() {
        let mut builder = ChunkBuilder::new();
        let class = builder.name("CBitmapTexture");
        let mut section = vec![0u8; 16];
        section.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        section.extend_from_slice(b"payload");
        let start = builder.section(&section);
        assert_eq!(start, BUFFER_SECTION);
        builder.buffer(1, start + 16, 4);
        builder.export(class, 0, start + 20, 7);
        let bytes = builder.build();
        let chunk = ResourceChunk::open(&bytes).unwrap();

        let buffer = chunk.buffers().get(0).unwrap();
        assert_eq!(chunk.buffer_data(&buffer).unwrap(), [0xDE, 0xAD, 0xBE, 0xEF]);
        let export = chunk.exports().get(0).unwrap();
        assert_eq!(chunk.export_data(&export).unwrap(), b"payload");

        let stray = Buffer {
            offset: bytes.len() as u32,
            disk_size: 1,
            ..buffer
        };
        assert!(matches!(
            chunk.buffer_data(&stray),
            Err(FormatError::CorruptTable { table: "buffers", .. })
        ));
    }

    #[test]
    fn test_embedded_links() {
        let mut builder = ChunkBuilder::new();
        let class = builder.name("CMesh");
        builder.import("base\\a.mesh", class, 1);
        let data = builder.section(b"inline");
        builder.embedded(1, "base\\a.mesh", data, 6);
        builder.embedded(0, "base\\b.mesh", data, 3);
        builder.embedded(5, "base\\c.mesh", data, 0);
        let bytes = builder.build();
        let chunk = ResourceChunk::open(&bytes).unwrap();

        let linked = chunk.embedded().get(0).unwrap();
        assert_eq!(chunk.embedded_path(&linked).unwrap(), "base\\a.mesh");
        assert_eq!(
            chunk.embedded_import(&linked).unwrap(),
            Some(chunk.imports().get(0).unwrap())
        );
        assert_eq!(chunk.embedded_data(&linked).unwrap(), b"inline");

        let unlinked = chunk.embedded().get(1).unwrap();
        assert_eq!(chunk.embedded_import(&unlinked).unwrap(), None);

        let dangling = chunk.embedded().get(2).unwrap();
        assert!(chunk.embedded_import(&dangling).is_err());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn resolve_string_matches_blob(
                words in prop::collection::vec("[a-zA-Z0-9_]{0,12}", 1..16),
            ) {
                let mut builder = ChunkBuilder::new();
                let offsets: Vec<u32> = words.iter().map(|w| builder.string(w)).collect();
                let bytes = builder.build();
                let chunk = ResourceChunk::open(&bytes)
                    .map_err(|e| TestCaseError::fail(e.to_string()))?;

                for (word, offset) in words.iter().zip(&offsets) {
                    let text = chunk.resolve_str(*offset)
                        .map_err(|e| TestCaseError::fail(e.to_string()))?;
                    prop_assert_eq!(text.as_ref(), word.as_str());
                }
                let len = chunk.strings().len() as u32;
                prop_assert!(chunk.resolve_string(len).is_err());
                prop_assert!(chunk.resolve_string(len + 7).is_err());
            }

            #[test]
            fn parents_list_their_children(parents in prop::collection::vec(0u32..8, 1..24)) {
                let mut builder = ChunkBuilder::new();
                let class = builder.name("CObject");
                // Only point at earlier exports so the tree is acyclic.
                for (index, parent) in parents.iter().enumerate() {
                    let parent_id = if index == 0 { 0 } else { parent % (index as u32 + 1) };
                    builder.export(class, parent_id, 0, 0);
                }
                let bytes = builder.build();
                let chunk = ResourceChunk::open(&bytes)
                    .map_err(|e| TestCaseError::fail(e.to_string()))?;
                let count = chunk.exports().len();

                for index in 0..count {
                    if let Some(parent) = chunk.export_parent(index)
                        .map_err(|e| TestCaseError::fail(e.to_string()))?
                    {
                        let siblings = chunk.export_children(parent)
                            .map_err(|e| TestCaseError::fail(e.to_string()))?;
                        prop_assert!(siblings.contains(&index));
                    }

                    let mut current = index;
                    let mut steps = 0;
                    while let Some(parent) = chunk.export_parent(current)
                        .map_err(|e| TestCaseError::fail(e.to_string()))?
                    {
                        prop_assert_ne!(parent, index);
                        current = parent;
                        steps += 1;
                        prop_assert!(steps <= count);
                    }
                }
                prop_assert!(chunk.export_graph().is_ok());
            }
        }
    }
}
