//! Chunk header and table directory

use std::fmt;

use binrw::BinRead;

use crate::view::Record;

/// Chunk magic as stored on disk
pub const CHUNK_MAGIC: [u8; 4] = *b"CR2W";

/// Number of slots in the table directory
pub const TABLE_DIRECTORY_SLOTS: usize = 10;

/// Chunk header at the start of every resource chunk
///
/// Layout (40 bytes, little-endian), followed directly by the table
/// directory of [`TABLE_DIRECTORY_SLOTS`] [`TableEntry`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead)]
#[brw(little)]
pub struct ChunkHeader {
    /// Magic signature, checked before decoding
    pub magic: [u8; 4],
    pub version: u32,
    pub flags: u32,
    pub timestamp: u64,
    pub build_version: u32,
    /// Declared size of the chunk
    pub file_size: u32,
    /// Size of the trailing buffer section
    pub buffer_size: u32,
    pub crc32: u32,
    /// Number of object records
    pub num_chunks: u32,
}

impl Record for ChunkHeader {
    const SIZE: usize = 40;
    const TABLE: &'static str = "chunk header";
}

/// One table directory slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, BinRead)]
#[brw(little)]
pub struct TableEntry {
    /// Position of the table from the chunk start
    pub position: u32,
    /// Record count; byte length for the strings blob
    pub count: u32,
    pub crc32: u32,
}

impl Record for TableEntry {
    const SIZE: usize = 12;
    const TABLE: &'static str = "table directory";
}

impl TableEntry {
    /// A zero position or count marks the table as absent.
    pub const fn is_absent(&self) -> bool {
        self.position == 0 || self.count == 0
    }
}

/// Record kinds addressed by the first seven directory slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TableKind {
    Strings = 0,
    Names = 1,
    Imports = 2,
    Properties = 3,
    Exports = 4,
    Buffers = 5,
    Embedded = 6,
}

impl TableKind {
    /// All kinds in slot order
    pub const ALL: [Self; 7] = [
        Self::Strings,
        Self::Names,
        Self::Imports,
        Self::Properties,
        Self::Exports,
        Self::Buffers,
        Self::Embedded,
    ];

    /// Directory slot of this kind
    pub const fn slot(self) -> usize {
        self as usize
    }

    /// Kind stored in `slot`, if the slot is not reserved
    pub fn from_slot(slot: usize) -> Option<Self> {
        Self::ALL.get(slot).copied()
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Strings => "strings",
            Self::Names => "names",
            Self::Imports => "imports",
            Self::Properties => "properties",
            Self::Exports => "exports",
            Self::Buffers => "buffers",
            Self::Embedded => "embedded",
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
