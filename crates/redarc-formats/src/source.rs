//! Byte sources backing a decode session
//!
//! Readers borrow a `&[u8]` covering the whole input file. [`ArchiveSource`]
//! owns that range, either as a read-only memory map or as a buffer read
//! fully into memory.

use std::fs::File;
use std::ops::Deref;
use std::path::Path;

use memmap2::{Mmap, MmapOptions};
use tracing::debug;

use crate::error::FormatResult;

/// How a file is brought into memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceMode {
    /// Map the file read-only
    #[default]
    Mapped,
    /// Read the whole file into an owned buffer
    Loaded,
}

/// Read-only byte range covering an entire input file
#[derive(Debug)]
pub enum ArchiveSource {
    /// Memory-mapped file
    Mapped(Mmap),
    /// File contents held in memory
    Loaded(Vec<u8>),
}

impl ArchiveSource {
    /// Open `path` using `mode`.
    ///
    /// Empty files are always loaded, since zero-length mappings are not
    /// portable.
    pub fn open(path: impl AsRef<Path>, mode: SourceMode) -> FormatResult<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        debug!("Opening {} ({size} bytes, {mode:?})", path.display());

        if mode == SourceMode::Loaded || size == 0 {
            return Ok(Self::Loaded(std::fs::read(path)?));
        }

        // The mapping is read-only; the file must not be truncated while the
        // session is alive.
        #[allow(unsafe_code)]
        let mmap = unsafe { MmapOptions::new().map(&file)? };
        Ok(Self::Mapped(mmap))
    }

    /// Wrap bytes already in memory.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self::Loaded(bytes)
    }

    /// Whether the source is memory-mapped
    pub const fn is_mapped(&self) -> bool {
        matches!(self, Self::Mapped(_))
    }
}

impl Deref for ArchiveSource {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Self::Mapped(mmap) => &mmap[..],
            Self::Loaded(bytes) => bytes.as_slice(),
        }
    }
}

impl AsRef<[u8]> for ArchiveSource {
    fn as_ref(&self) -> &[u8] {
        self
    }
}
