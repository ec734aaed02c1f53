//! Fixed-size structures of the archive container

use std::borrow::Cow;
use std::ops::Range;

use binrw::BinRead;

use crate::view::Record;

/// Container magic as stored on disk
pub const ARCHIVE_MAGIC: [u8; 4] = *b"RDAR";

/// Archive header at offset 0
///
/// Layout (40 bytes, little-endian):
/// - Magic "RDAR" (4 bytes)
/// - Version (4 bytes)
/// - Index position (8 bytes, absolute)
/// - Index size (4 bytes)
/// - Debug section position (8 bytes, absolute)
/// - Debug section size (4 bytes)
/// - Total file size (8 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead)]
#[brw(little)]
pub struct ArchiveHeader {
    /// Magic signature, checked by the reader before decoding
    pub magic: [u8; 4],
    /// Format version
    pub version: u32,
    /// Absolute position of the [`ArchiveIndex`]
    pub index_position: u64,
    /// Size of the index section
    pub index_size: u32,
    /// Absolute position of the debug section, 0 when absent
    pub debug_position: u64,
    /// Size of the debug section
    pub debug_size: u32,
    /// Declared size of the whole archive
    pub total_file_size: u64,
}

impl Record for ArchiveHeader {
    const SIZE: usize = 40;
    const TABLE: &'static str = "header";
}

/// Index section locating the file table
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead)]
#[brw(little)]
pub struct ArchiveIndex {
    /// Offset of the [`FileTable`] from the index position
    pub file_table_offset: u32,
    /// Size of the file table and its arrays
    pub file_table_size: u32,
}

impl Record for ArchiveIndex {
    const SIZE: usize = 8;
    const TABLE: &'static str = "index";
}

/// Build information written by the packing tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead)]
#[brw(little)]
pub struct ArchiveDebug {
    /// Identifier of the build machine
    pub build_machine: u32,
    /// Null-padded computer name
    pub computer_name: [u8; 64],
    /// Null-padded build name
    pub build_name: [u8; 64],
}

impl Record for ArchiveDebug {
    const SIZE: usize = 132;
    const TABLE: &'static str = "debug";
}

impl ArchiveDebug {
    /// Computer name up to the first null byte
    pub fn computer_name(&self) -> Cow<'_, str> {
        trim_null(&self.computer_name)
    }

    /// Build name up to the first null byte
    pub fn build_name(&self) -> Cow<'_, str> {
        trim_null(&self.build_name)
    }
}

fn trim_null(bytes: &[u8]) -> Cow<'_, str> {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end])
}

/// Counts sizing the three arrays that follow the file table
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead)]
#[brw(little)]
pub struct FileTable {
    /// Checksum over the tables
    pub crc64: u64,
    /// Number of [`FileEntry`] records
    pub file_entry_count: u32,
    /// Number of [`Segment`] records
    pub file_segment_count: u32,
    /// Number of [`Dependency`] records
    pub resource_dependency_count: u32,
}

impl Record for FileTable {
    const SIZE: usize = 20;
    const TABLE: &'static str = "file table";
}

/// One packed file
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead)]
#[brw(little)]
pub struct FileEntry {
    /// Content ID, a hash of the resource path
    pub id: u64,
    /// Packing timestamp
    pub timestamp: u64,
    /// Number of segments holding inline buffers
    pub num_inline_buffer_segments: u32,
    /// First segment index
    pub segments_start: u32,
    /// One past the last segment index
    pub segments_end: u32,
    /// First dependency index
    pub dependencies_start: u32,
    /// One past the last dependency index
    pub dependencies_end: u32,
    /// SHA-1 of the content
    pub hash: [u8; 20],
}

impl Record for FileEntry {
    const SIZE: usize = 56;
    const TABLE: &'static str = "entries";
}

impl FileEntry {
    /// Half-open segment index range, `None` when inverted
    pub fn segment_range(&self) -> Option<Range<usize>> {
        checked_range(self.segments_start, self.segments_end)
    }

    /// Half-open dependency index range, `None` when inverted
    pub fn dependency_range(&self) -> Option<Range<usize>> {
        checked_range(self.dependencies_start, self.dependencies_end)
    }

    /// Number of segments, zero when the range is inverted
    pub fn segment_count(&self) -> usize {
        self.segment_range().map_or(0, |r| r.len())
    }
}

fn checked_range(start: u32, end: u32) -> Option<Range<usize>> {
    (end >= start).then_some(start as usize..end as usize)
}

/// Byte range backing part of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead)]
#[brw(little)]
pub struct Segment {
    /// Absolute position in the archive
    pub position: u64,
    /// Stored size, including the block header when compressed
    pub size_on_disk: u32,
    /// Size after decompression
    pub size_in_memory: u32,
}

impl Record for Segment {
    const SIZE: usize = 16;
    const TABLE: &'static str = "segments";
}

impl Segment {
    /// Whether the segment is stored behind a compressed block header
    pub const fn is_compressed(&self) -> bool {
        self.size_on_disk != self.size_in_memory
    }
}

/// Reference from an entry to another entry's content ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead)]
#[brw(little)]
pub struct Dependency {
    /// Referenced content ID
    pub id: u64,
}

impl Record for Dependency {
    const SIZE: usize = 8;
    const TABLE: &'static str = "dependencies";
}

/// Header prefixing the payload of a compressed segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead)]
#[brw(little)]
pub struct CompressedBlockHeader {
    /// Codec tag
    pub tag: [u8; 4],
    /// Declared uncompressed size
    pub uncompressed_size: u32,
}

impl Record for CompressedBlockHeader {
    const SIZE: usize = 8;
    const TABLE: &'static str = "segments";
}
