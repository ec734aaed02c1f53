//! Synthetic archives and chunks for integration tests

#![allow(dead_code)]

use std::io::Read;

use flate2::Compression;
use flate2::read::ZlibEncoder;

/// A segment as stored in the archive
pub struct Stored {
    pub bytes: Vec<u8>,
    pub size_in_memory: u32,
}

impl Stored {
    pub fn raw(data: &[u8]) -> Self {
        Self {
            bytes: data.to_vec(),
            size_in_memory: data.len() as u32,
        }
    }

    pub fn block(tag: &[u8; 4], payload: &[u8], declared: u32) -> Self {
        let mut bytes = tag.to_vec();
        bytes.extend_from_slice(&declared.to_le_bytes());
        bytes.extend_from_slice(payload);
        Self {
            bytes,
            size_in_memory: declared,
        }
    }

    pub fn zlib(data: &[u8]) -> Self {
        let mut payload = Vec::new();
        ZlibEncoder::new(data, Compression::fast())
            .read_to_end(&mut payload)
            .unwrap();
        Self::block(b"BILZ", &payload, data.len() as u32)
    }

    pub fn lz4(data: &[u8]) -> Self {
        Self::block(b"4ZLX", &lz4_flex::block::compress(data), data.len() as u32)
    }
}

pub struct Item {
    pub id: u64,
    pub segments: Vec<Stored>,
    pub dependencies: Vec<u64>,
}

impl Item {
    pub fn new(id: u64, segments: Vec<Stored>) -> Self {
        Self {
            id,
            segments,
            dependencies: Vec::new(),
        }
    }
}

/// Lay out an archive with the index and tables after all segment data.
pub fn archive(items: &[Item]) -> Vec<u8> {
    let mut data = vec![0u8; 40];
    let mut entry_table = Vec::new();
    let mut segment_table = Vec::new();
    let mut dependency_table = Vec::new();
    let mut segment_count = 0u32;
    let mut dependency_count = 0u32;

    for item in items {
        let first_segment = segment_count;
        for segment in &item.segments {
            segment_table.extend_from_slice(&(data.len() as u64).to_le_bytes());
            segment_table.extend_from_slice(&(segment.bytes.len() as u32).to_le_bytes());
            segment_table.extend_from_slice(&segment.size_in_memory.to_le_bytes());
            data.extend_from_slice(&segment.bytes);
            segment_count += 1;
        }
        let first_dependency = dependency_count;
        for id in &item.dependencies {
            dependency_table.extend_from_slice(&id.to_le_bytes());
            dependency_count += 1;
        }

        entry_table.extend_from_slice(&item.id.to_le_bytes());
        entry_table.extend_from_slice(&0u64.to_le_bytes());
        for value in [
            0,
            first_segment,
            segment_count,
            first_dependency,
            dependency_count,
        ] {
            entry_table.extend_from_slice(&value.to_le_bytes());
        }
        entry_table.extend_from_slice(&[0u8; 20]);
    }

    let index_position = data.len() as u64;
    data.extend_from_slice(&8u32.to_le_bytes());
    data.extend_from_slice(&0u32.to_le_bytes());
    data.extend_from_slice(&0u64.to_le_bytes());
    data.extend_from_slice(&(items.len() as u32).to_le_bytes());
    data.extend_from_slice(&segment_count.to_le_bytes());
    data.extend_from_slice(&dependency_count.to_le_bytes());
    data.extend_from_slice(&entry_table);
    data.extend_from_slice(&segment_table);
    data.extend_from_slice(&dependency_table);

    let total = data.len() as u64;
    let mut header = b"RDAR".to_vec();
    header.extend_from_slice(&12u32.to_le_bytes());
    header.extend_from_slice(&index_position.to_le_bytes());
    header.extend_from_slice(&0u32.to_le_bytes());
    header.extend_from_slice(&0u64.to_le_bytes());
    header.extend_from_slice(&0u32.to_le_bytes());
    header.extend_from_slice(&total.to_le_bytes());
    data[..40].copy_from_slice(&header);
    data
}

/// Chunk tables given as raw encoded bytes, with the buffer section placed
/// directly after the table directory.
#[derive(Default)]
pub struct Chunk {
    pub strings: Vec<u8>,
    /// Encoded records and count for slots 1..=6
    pub tables: [(Vec<u8>, u32); 6],
    pub section: Vec<u8>,
}

/// Offset of the buffer section in chunks built by [`Chunk::build`]
pub const SECTION_START: u32 = 160;

impl Chunk {
    pub fn build(&self) -> Vec<u8> {
        let mut body = self.section.clone();
        let mut directory = Vec::new();
        let mut slot = |position: usize, count: u32| {
            let position = if count == 0 { 0 } else { position as u32 };
            directory.extend_from_slice(&position.to_le_bytes());
            directory.extend_from_slice(&count.to_le_bytes());
            directory.extend_from_slice(&0u32.to_le_bytes());
        };

        slot(
            SECTION_START as usize + body.len(),
            self.strings.len() as u32,
        );
        body.extend_from_slice(&self.strings);
        for (records, count) in &self.tables {
            slot(SECTION_START as usize + body.len(), *count);
            body.extend_from_slice(records);
        }
        for _ in 7..10 {
            slot(0, 0);
        }

        let mut out = b"CR2W".to_vec();
        for value in [195u32, 0] {
            out.extend_from_slice(&value.to_le_bytes());
        }
        out.extend_from_slice(&0u64.to_le_bytes());
        let file_size = SECTION_START + body.len() as u32;
        for value in [0u32, file_size, self.section.len() as u32, 0, 0] {
            out.extend_from_slice(&value.to_le_bytes());
        }
        out.extend_from_slice(&directory);
        out.extend_from_slice(&body);
        out
    }
}

/// Encode a list of little-endian u32 words.
pub fn words(values: &[u32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// An export record: class name index 0, the given parent and payload range
pub fn export(parent_id: u32, data_offset: u32, data_size: u32) -> Vec<u8> {
    words(&[0, parent_id, data_size, data_offset, 0, 0])
}
