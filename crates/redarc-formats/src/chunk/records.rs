//! Record types stored in chunk tables

use binrw::BinRead;

use crate::view::Record;

/// Entry of the name table
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead)]
#[brw(little)]
pub struct Name {
    /// Offset of the text in the strings blob
    pub value: u32,
    pub hash: u32,
}

impl Record for Name {
    const SIZE: usize = 8;
    const TABLE: &'static str = "names";
}

/// Reference to an external resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead)]
#[brw(little)]
pub struct Import {
    /// Offset of the depot path in the strings blob
    pub depot_path: u32,
    /// Index into the name table
    pub class_name: u16,
    pub flags: u16,
}

impl Record for Import {
    const SIZE: usize = 8;
    const TABLE: &'static str = "imports";
}

/// Property descriptor; its value is opaque
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead)]
#[brw(little)]
pub struct Property {
    /// Index into the name table
    pub class_name: u16,
    pub class_flags: u16,
    /// Offset of the property name in the strings blob
    pub property_name: u16,
    pub property_flags: u16,
    pub hash: u64,
}

impl Record for Property {
    const SIZE: usize = 16;
    const TABLE: &'static str = "properties";
}

/// Serialized object instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead)]
#[brw(little)]
pub struct Export {
    /// Index into the name table
    pub class_name: u16,
    pub object_flags: u16,
    /// 1-based index of the parent export, 0 for roots
    pub parent_id: u32,
    pub data_size: u32,
    /// Payload offset from the chunk start
    pub data_offset: u32,
    pub template: u32,
    pub crc32: u32,
}

impl Record for Export {
    const SIZE: usize = 24;
    const TABLE: &'static str = "exports";
}

impl Export {
    /// 0-based index of the parent export, `None` for roots
    pub const fn parent_index(&self) -> Option<usize> {
        match self.parent_id {
            0 => None,
            id => Some(id as usize - 1),
        }
    }
}

/// Raw buffer stored in the chunk's buffer section
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead)]
#[brw(little)]
pub struct Buffer {
    pub flags: u32,
    pub index: u32,
    /// Offset from the chunk start
    pub offset: u32,
    pub disk_size: u32,
    pub mem_size: u32,
    pub crc32: u32,
}

impl Record for Buffer {
    const SIZE: usize = 24;
    const TABLE: &'static str = "buffers";
}

/// Embedded resource
///
/// The import linkage of these records is not well understood; treat
/// [`import_index`](Self::import_index) as provisional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead)]
#[brw(little)]
pub struct Embedded {
    /// 1-based index into the import table, 0 for none
    pub import_index: u32,
    /// Offset of the path in the strings blob
    pub path: u32,
    pub path_hash: u64,
    /// Payload offset from the chunk start
    pub data_offset: u32,
    pub data_size: u32,
}

impl Record for Embedded {
    const SIZE: usize = 24;
    const TABLE: &'static str = "embedded";
}
