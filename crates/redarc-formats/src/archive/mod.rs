//! Archive container reader
//!
//! An archive packs many files, each keyed by a 64-bit content ID. The file
//! is laid out as:
//!
//! ```text
//! [ArchiveHeader 40][... segment data ...][ArchiveIndex 8][FileTable 20]
//! [FileEntry 56 x entries][Segment 16 x segments][Dependency 8 x deps]
//! ```
//!
//! The index is found through the header, the file table through the index,
//! and the three arrays follow the file table back to back. Each entry names
//! a run of segments; segments whose stored and in-memory sizes differ carry
//! a compressed block header and are decoded through the
//! [`CodecDispatcher`](crate::codec::CodecDispatcher).
//!
//! ```no_run
//! use redarc_formats::{ArchiveReader, ArchiveSource, SourceMode};
//!
//! let source = ArchiveSource::open("basegame_1_engine.archive", SourceMode::Mapped)?;
//! let archive = ArchiveReader::open(&source)?;
//! for (index, file) in archive.files() {
//!     match file {
//!         Ok(file) => println!("{:016X}: {} bytes", file.id(), file.data.len()),
//!         Err(e) => eprintln!("entry {index}: {e}"),
//!     }
//! }
//! # Ok::<(), redarc_formats::FormatError>(())
//! ```

mod header;

pub use header::{
    ARCHIVE_MAGIC, ArchiveDebug, ArchiveHeader, ArchiveIndex, CompressedBlockHeader, Dependency,
    FileEntry, FileTable, Segment,
};

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use tracing::{debug, trace, warn};

use crate::chunk::ResourceChunk;
use crate::codec::{BLOCK_HEADER_SIZE, CodecDispatcher};
use crate::error::{FormatError, FormatResult};
use crate::options::ReaderOptions;
use crate::view::{Record, RecordArray, slice_at};

/// A decoded archive entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveFile {
    /// Position of the entry in the entry table
    pub index: usize,
    /// The entry record
    pub entry: FileEntry,
    /// Reconstructed content, all segments concatenated in order
    pub data: Vec<u8>,
    /// Raw dependency IDs, in table order with duplicates kept
    pub dependencies: Vec<u64>,
    /// Whether any segment was compressed
    pub compressed: bool,
}

impl ArchiveFile {
    /// Content ID of the entry
    pub const fn id(&self) -> u64 {
        self.entry.id
    }

    /// Whether the content is a resource chunk
    pub fn is_resource_chunk(&self) -> bool {
        ResourceChunk::is_chunk(&self.data)
    }
}

/// Read-only view over an archive held in memory
#[derive(Debug)]
pub struct ArchiveReader<'a> {
    bytes: &'a [u8],
    header: ArchiveHeader,
    index: ArchiveIndex,
    table: FileTable,
    entries: RecordArray<'a, FileEntry>,
    segments: RecordArray<'a, Segment>,
    dependencies: RecordArray<'a, Dependency>,
    ids: HashMap<u64, usize>,
    codecs: CodecDispatcher,
    options: ReaderOptions,
}

impl<'a> ArchiveReader<'a> {
    /// Open an archive with default options.
    pub fn open(bytes: &'a [u8]) -> FormatResult<Self> {
        Self::open_with(bytes, ReaderOptions::default())
    }

    /// Open an archive.
    ///
    /// Validates the magic and resolves the index, file table and the
    /// entry, segment and dependency arrays. Entry contents are not touched
    /// until [`get_file`](Self::get_file).
    pub fn open_with(bytes: &'a [u8], options: ReaderOptions) -> FormatResult<Self> {
        let magic: [u8; 4] = bytes
            .get(..4)
            .and_then(|m| m.try_into().ok())
            .ok_or_else(|| FormatError::corrupt("header", "file shorter than magic"))?;
        if magic != ARCHIVE_MAGIC {
            return Err(FormatError::UnsupportedMagic {
                format: "archive",
                expected: ARCHIVE_MAGIC,
                actual: magic,
            });
        }

        let header = ArchiveHeader::decode(slice_at(bytes, 0, ArchiveHeader::SIZE as u64, "header")?)?;
        if header.total_file_size != bytes.len() as u64 {
            if options.strict_file_size {
                return Err(FormatError::corrupt(
                    "header",
                    format!(
                        "declared size {} but {} bytes available",
                        header.total_file_size,
                        bytes.len()
                    ),
                ));
            }
            warn!(
                "Archive declares {} bytes but {} are available",
                header.total_file_size,
                bytes.len()
            );
        }

        let index = ArchiveIndex::decode(slice_at(
            bytes,
            header.index_position,
            ArchiveIndex::SIZE as u64,
            "index",
        )?)?;

        let table_position = header
            .index_position
            .checked_add(u64::from(index.file_table_offset))
            .ok_or_else(|| FormatError::corrupt("file table", "position overflows"))?;
        let table = FileTable::decode(slice_at(
            bytes,
            table_position,
            FileTable::SIZE as u64,
            "file table",
        )?)?;

        let entries_position = table_position + FileTable::SIZE as u64;
        let entries = RecordArray::<FileEntry>::new(
            bytes,
            entries_position,
            u64::from(table.file_entry_count),
        )?;
        let segments_position = entries_position + entries.as_bytes().len() as u64;
        let segments = RecordArray::<Segment>::new(
            bytes,
            segments_position,
            u64::from(table.file_segment_count),
        )?;
        let dependencies_position = segments_position + segments.as_bytes().len() as u64;
        let dependencies = RecordArray::<Dependency>::new(
            bytes,
            dependencies_position,
            u64::from(table.resource_dependency_count),
        )?;

        let mut ids = HashMap::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            match ids.entry(entry?.id) {
                Entry::Vacant(slot) => {
                    slot.insert(i);
                }
                Entry::Occupied(slot) => {
                    warn!(
                        "Duplicate content ID {:016X} at entry {i}, keeping entry {}",
                        slot.key(),
                        slot.get()
                    );
                }
            }
        }

        debug!(
            "Opened archive v{}: {} entries, {} segments, {} dependencies",
            header.version,
            entries.len(),
            segments.len(),
            dependencies.len()
        );

        Ok(Self {
            bytes,
            header,
            index,
            table,
            entries,
            segments,
            dependencies,
            ids,
            codecs: CodecDispatcher::from_options(&options),
            options,
        })
    }

    /// The archive header
    pub const fn header(&self) -> &ArchiveHeader {
        &self.header
    }

    /// The index section
    pub const fn index(&self) -> &ArchiveIndex {
        &self.index
    }

    /// The file table
    pub const fn file_table(&self) -> &FileTable {
        &self.table
    }

    /// Options the archive was opened with
    pub const fn options(&self) -> &ReaderOptions {
        &self.options
    }

    pub const fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub const fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub const fn dependency_count(&self) -> usize {
        self.dependencies.len()
    }

    /// View over all entry records
    pub const fn entries(&self) -> RecordArray<'a, FileEntry> {
        self.entries
    }

    /// View over all segment records
    pub const fn segments(&self) -> RecordArray<'a, Segment> {
        self.segments
    }

    /// View over all dependency records
    pub const fn dependencies(&self) -> RecordArray<'a, Dependency> {
        self.dependencies
    }

    pub fn entry(&self, index: usize) -> FormatResult<FileEntry> {
        self.entries.get(index)
    }

    pub fn segment(&self, index: usize) -> FormatResult<Segment> {
        self.segments.get(index)
    }

    /// Entry index for a content ID
    ///
    /// When an ID occurs more than once the first entry wins.
    pub fn find(&self, id: u64) -> Option<usize> {
        self.ids.get(&id).copied()
    }

    /// Decode the debug section, if the archive has a usable one.
    pub fn debug_info(&self) -> Option<ArchiveDebug> {
        let (position, size) = (self.header.debug_position, self.header.debug_size);
        if position == 0 || (size as usize) < ArchiveDebug::SIZE {
            return None;
        }
        match slice_at(self.bytes, position, ArchiveDebug::SIZE as u64, "debug")
            .and_then(ArchiveDebug::decode)
        {
            Ok(info) => Some(info),
            Err(e) => {
                debug!("Ignoring debug section: {e}");
                None
            }
        }
    }

    /// Reconstruct the content of the entry at `index`.
    ///
    /// Segments are appended in table order, raw ones copied and compressed
    /// ones decoded to exactly their declared size. Out-of-bounds segment or
    /// dependency references fail with [`FormatError::CorruptEntry`].
    pub fn get_file(&self, index: usize) -> FormatResult<ArchiveFile> {
        let entry = self.entries.get(index)?;
        self.reconstruct(index, entry).map_err(|e| e.in_entry(index))
    }

    fn reconstruct(&self, index: usize, entry: FileEntry) -> FormatResult<ArchiveFile> {
        let segment_range = checked_span(
            entry.segment_range(),
            self.segments.len(),
            index,
            "segment",
        )?;
        let dependency_range = checked_span(
            entry.dependency_range(),
            self.dependencies.len(),
            index,
            "dependency",
        )?;

        let mut data = Vec::new();
        let mut compressed = false;
        for segment_index in segment_range {
            let segment = self.segments.get(segment_index)?;
            compressed |= self.read_segment(segment_index, &segment, &mut data)?;
        }

        let dependencies = dependency_range
            .map(|i| self.dependencies.get(i).map(|d| d.id))
            .collect::<FormatResult<Vec<_>>>()?;

        trace!(
            "Entry {index} ({:016X}): {} bytes, {} dependencies",
            entry.id,
            data.len(),
            dependencies.len()
        );

        Ok(ArchiveFile {
            index,
            entry,
            data,
            dependencies,
            compressed,
        })
    }

    /// Reconstruct the entry with content ID `id`.
    pub fn get_file_by_id(&self, id: u64) -> Option<FormatResult<ArchiveFile>> {
        self.find(id).map(|index| self.get_file(index))
    }

    /// Decode every entry in order.
    ///
    /// Failures are reported per entry; a bad entry does not stop iteration.
    pub fn files(&self) -> impl Iterator<Item = (usize, FormatResult<ArchiveFile>)> + '_ {
        (0..self.entry_count()).map(move |index| (index, self.get_file(index)))
    }

    /// Append the content of one segment to `out`, returning whether it was
    /// compressed.
    fn read_segment(&self, index: usize, segment: &Segment, out: &mut Vec<u8>) -> FormatResult<bool> {
        let stored = slice_at(
            self.bytes,
            segment.position,
            u64::from(segment.size_on_disk),
            "segments",
        )?;
        if !segment.is_compressed() {
            trace!("Segment {index}: {} raw bytes", stored.len());
            out.extend_from_slice(stored);
            return Ok(false);
        }

        let declared = segment.size_in_memory as usize;
        let (block, payload) = match stored.split_at_checked(BLOCK_HEADER_SIZE) {
            Some((block, payload)) => (CompressedBlockHeader::decode(block)?, payload),
            None => {
                return Err(FormatError::corrupt(
                    "segments",
                    format!("segment {index} too small for a block header"),
                ));
            }
        };
        if block.uncompressed_size as usize != declared {
            return Err(FormatError::mismatch(
                declared,
                block.uncompressed_size as usize,
                format!("segment {index} block header disagrees with segment table"),
            ));
        }

        trace!(
            "Segment {index}: {:02X?} {} -> {declared} bytes",
            block.tag,
            payload.len()
        );
        let decoded = self.codecs.decompress(block.tag, payload, declared)?;
        out.extend_from_slice(&decoded);
        Ok(true)
    }
}

fn checked_span(
    range: Option<std::ops::Range<usize>>,
    count: usize,
    entry: usize,
    what: &str,
) -> FormatResult<std::ops::Range<usize>> {
    match range {
        Some(range) if range.end <= count => Ok(range),
        Some(range) => Err(FormatError::corrupt(
            "entries",
            format!(
                "entry {entry} {what} range {}..{} exceeds {count} records",
                range.start, range.end
            ),
        )),
        None => Err(FormatError::corrupt(
            "entries",
            format!("entry {entry} has an inverted {what} range"),
        )),
    }
}
