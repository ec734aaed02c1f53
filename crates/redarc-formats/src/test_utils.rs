//! Fixture builders for tests
//!
//! Archives and chunks are assembled field by field with explicit
//! little-endian writes, so the decoders are checked against the byte layout
//! rather than against themselves.

use std::io::Read;

use flate2::Compression;
use flate2::read::ZlibEncoder;

use crate::archive::ARCHIVE_MAGIC;
use crate::chunk::{CHUNK_MAGIC, TABLE_DIRECTORY_SLOTS, TableKind};
use crate::codec::{LZ4_MAGIC, ZLIB_MAGIC};

fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_u64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Stored bytes of one segment and its declared in-memory size
#[derive(Debug, Clone)]
pub struct TestSegment {
    pub stored: Vec<u8>,
    pub size_in_memory: u32,
}

/// Segment stored verbatim
pub fn raw_segment(data: &[u8]) -> TestSegment {
    TestSegment {
        stored: data.to_vec(),
        size_in_memory: data.len() as u32,
    }
}

/// Segment behind a block header with an arbitrary tag and payload
pub fn tagged_segment(tag: [u8; 4], payload: &[u8], declared: u32) -> TestSegment {
    let mut stored = Vec::with_capacity(payload.len() + 8);
    stored.extend_from_slice(&tag);
    put_u32(&mut stored, declared);
    stored.extend_from_slice(payload);
    TestSegment {
        stored,
        size_in_memory: declared,
    }
}

/// zlib-compressed segment
pub fn zlib_segment(plain: &[u8]) -> TestSegment {
    let mut payload = Vec::new();
    ZlibEncoder::new(plain, Compression::best())
        .read_to_end(&mut payload)
        .unwrap();
    tagged_segment(ZLIB_MAGIC, &payload, plain.len() as u32)
}

/// LZ4 block compressed segment
pub fn lz4_segment(plain: &[u8]) -> TestSegment {
    tagged_segment(
        LZ4_MAGIC,
        &lz4_flex::block::compress(plain),
        plain.len() as u32,
    )
}

/// Entry with its segments and dependency IDs
#[derive(Debug, Clone, Default)]
pub struct TestEntry {
    pub id: u64,
    pub segments: Vec<TestSegment>,
    pub dependencies: Vec<u64>,
}

impl TestEntry {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    pub fn segment(mut self, segment: TestSegment) -> Self {
        self.segments.push(segment);
        self
    }

    pub fn dependency(mut self, id: u64) -> Self {
        self.dependencies.push(id);
        self
    }
}

/// Assembles an archive:
/// header, optional debug section, segment data, index, file table, arrays
#[derive(Debug, Clone, Default)]
pub struct ArchiveBuilder {
    entries: Vec<TestEntry>,
    debug: Option<(u32, String, String)>,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(mut self, entry: TestEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn debug(mut self, machine: u32, computer: &str, build: &str) -> Self {
        self.debug = Some((machine, computer.to_string(), build.to_string()));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = vec![0u8; 40];

        let mut debug_position = 0u64;
        if let Some((machine, computer, build)) = &self.debug {
            debug_position = out.len() as u64;
            put_u32(&mut out, *machine);
            for name in [computer, build] {
                let mut field = [0u8; 64];
                field[..name.len()].copy_from_slice(name.as_bytes());
                out.extend_from_slice(&field);
            }
        }

        let mut entries = Vec::new();
        let mut segments = Vec::new();
        let mut dependencies = Vec::new();
        let (mut segment_count, mut dependency_count) = (0u32, 0u32);

        for entry in &self.entries {
            let segments_start = segment_count;
            for segment in &entry.segments {
                let position = out.len() as u64;
                out.extend_from_slice(&segment.stored);
                put_u64(&mut segments, position);
                put_u32(&mut segments, segment.stored.len() as u32);
                put_u32(&mut segments, segment.size_in_memory);
                segment_count += 1;
            }
            let dependencies_start = dependency_count;
            for id in &entry.dependencies {
                put_u64(&mut dependencies, *id);
                dependency_count += 1;
            }

            put_u64(&mut entries, entry.id);
            put_u64(&mut entries, 0x01D9_0000_0000_0000);
            put_u32(&mut entries, 0);
            put_u32(&mut entries, segments_start);
            put_u32(&mut entries, segment_count);
            put_u32(&mut entries, dependencies_start);
            put_u32(&mut entries, dependency_count);
            entries.extend_from_slice(&[0x11; 20]);
        }

        let index_position = out.len() as u64;
        let table_size = 20 + entries.len() + segments.len() + dependencies.len();
        put_u32(&mut out, 8);
        put_u32(&mut out, table_size as u32);

        put_u64(&mut out, 0);
        put_u32(&mut out, self.entries.len() as u32);
        put_u32(&mut out, segment_count);
        put_u32(&mut out, dependency_count);
        out.extend_from_slice(&entries);
        out.extend_from_slice(&segments);
        out.extend_from_slice(&dependencies);

        let total = out.len() as u64;
        let mut header = Vec::with_capacity(40);
        header.extend_from_slice(&ARCHIVE_MAGIC);
        put_u32(&mut header, 12);
        put_u64(&mut header, index_position);
        put_u32(&mut header, (8 + table_size) as u32);
        put_u64(&mut header, debug_position);
        put_u32(&mut header, if self.debug.is_some() { 132 } else { 0 });
        put_u64(&mut header, total);
        out[..40].copy_from_slice(&header);
        out
    }
}

/// First byte of the raw buffer section in chunks made by [`ChunkBuilder`]
///
/// The section sits right after the header and table directory; record
/// tables follow it.
pub const BUFFER_SECTION: u32 = 40 + 12 * TABLE_DIRECTORY_SLOTS as u32;

/// Assembles a resource chunk record by record
#[derive(Debug, Clone, Default)]
pub struct ChunkBuilder {
    strings: Vec<u8>,
    tables: [Vec<u8>; 6],
    counts: [u32; 6],
    section: Vec<u8>,
}

impl ChunkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, kind: TableKind, record: Vec<u8>) -> u32 {
        let slot = kind as usize - 1;
        self.tables[slot].extend_from_slice(&record);
        self.counts[slot] += 1;
        self.counts[slot] - 1
    }

    /// Append a null-terminated string, returning its offset.
    pub fn string(&mut self, text: &str) -> u32 {
        let offset = self.strings.len() as u32;
        self.strings.extend_from_slice(text.as_bytes());
        self.strings.push(0);
        offset
    }

    /// Append raw bytes to the strings blob.
    pub fn raw_strings(&mut self, bytes: &[u8]) {
        self.strings.extend_from_slice(bytes);
    }

    /// Add a name, returning its index.
    pub fn name(&mut self, text: &str) -> u16 {
        let offset = self.string(text);
        self.name_at(offset, 0) as u16
    }

    /// Add a name record with an explicit string offset.
    pub fn name_at(&mut self, offset: u32, hash: u32) -> u32 {
        let mut record = Vec::new();
        put_u32(&mut record, offset);
        put_u32(&mut record, hash);
        self.push(TableKind::Names, record)
    }

    pub fn import(&mut self, depot_path: &str, class_name: u16, flags: u16) -> u32 {
        let offset = self.string(depot_path);
        let mut record = Vec::new();
        put_u32(&mut record, offset);
        put_u16(&mut record, class_name);
        put_u16(&mut record, flags);
        self.push(TableKind::Imports, record)
    }

    pub fn property(&mut self, class_name: u16, property_name: &str) -> u32 {
        let offset = self.string(property_name) as u16;
        let mut record = Vec::new();
        put_u16(&mut record, class_name);
        put_u16(&mut record, 0);
        put_u16(&mut record, offset);
        put_u16(&mut record, 0);
        put_u64(&mut record, 0x0123_4567_89AB_CDEF);
        self.push(TableKind::Properties, record)
    }

    pub fn export(&mut self, class_name: u16, parent_id: u32, data_offset: u32, data_size: u32) -> u32 {
        let mut record = Vec::new();
        put_u16(&mut record, class_name);
        put_u16(&mut record, 0);
        put_u32(&mut record, parent_id);
        put_u32(&mut record, data_size);
        put_u32(&mut record, data_offset);
        put_u32(&mut record, 0);
        put_u32(&mut record, 0);
        self.push(TableKind::Exports, record)
    }

    pub fn buffer(&mut self, index: u32, offset: u32, disk_size: u32) -> u32 {
        let mut record = Vec::new();
        for value in [0, index, offset, disk_size, disk_size, 0] {
            put_u32(&mut record, value);
        }
        self.push(TableKind::Buffers, record)
    }

    pub fn embedded(&mut self, import_index: u32, path: &str, data_offset: u32, data_size: u32) -> u32 {
        let offset = self.string(path);
        let mut record = Vec::new();
        put_u32(&mut record, import_index);
        put_u32(&mut record, offset);
        put_u64(&mut record, 0);
        put_u32(&mut record, data_offset);
        put_u32(&mut record, data_size);
        self.push(TableKind::Embedded, record)
    }

    /// Append bytes to the buffer section, returning their chunk offset.
    pub fn section(&mut self, bytes: &[u8]) -> u32 {
        let offset = BUFFER_SECTION + self.section.len() as u32;
        self.section.extend_from_slice(bytes);
        offset
    }

    pub fn build(&self) -> Vec<u8> {
        let mut directory = Vec::new();
        let mut tables = Vec::new();
        let mut position = BUFFER_SECTION as usize + self.section.len();

        let mut slots: Vec<(u32, u32)> = Vec::new();
        if self.strings.is_empty() {
            slots.push((0, 0));
        } else {
            slots.push((position as u32, self.strings.len() as u32));
            tables.extend_from_slice(&self.strings);
            position += self.strings.len();
        }
        for (bytes, count) in self.tables.iter().zip(self.counts) {
            if count == 0 {
                slots.push((0, 0));
            } else {
                slots.push((position as u32, count));
                tables.extend_from_slice(bytes);
                position += bytes.len();
            }
        }
        slots.resize(TABLE_DIRECTORY_SLOTS, (0, 0));
        for (pos, count) in slots {
            put_u32(&mut directory, pos);
            put_u32(&mut directory, count);
            put_u32(&mut directory, 0);
        }

        let mut out = Vec::with_capacity(position);
        out.extend_from_slice(&CHUNK_MAGIC);
        put_u32(&mut out, 195);
        put_u32(&mut out, 0);
        put_u64(&mut out, 0);
        put_u32(&mut out, 0);
        put_u32(&mut out, position as u32);
        put_u32(&mut out, self.section.len() as u32);
        put_u32(&mut out, 0);
        put_u32(&mut out, self.counts[TableKind::Exports as usize - 1]);
        out.extend_from_slice(&directory);
        out.extend_from_slice(&self.section);
        out.extend_from_slice(&tables);
        out
    }
}
