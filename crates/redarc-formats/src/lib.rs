//! Decoders for RDAR archives and the CR2W resource chunks packed inside them
//!
#![allow(clippy::cast_possible_truncation)] // Intentional for binary format parsing
#![allow(clippy::cast_lossless)] // Sometimes clearer than From
#![allow(clippy::uninlined_format_args)] // Backwards compatibility
#![allow(clippy::doc_markdown)] // Format names don't need backticks
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred
#![allow(clippy::similar_names)] // Domain-specific naming patterns
#![allow(clippy::return_self_not_must_use)] // Builder patterns
#![allow(clippy::missing_fields_in_debug)] // Capabilities are shown as flags
//! This crate reads the two binary formats that make up a game's packed
//! assets: the archive container and the self-describing object graph that
//! many archived files contain.
//!
//! # Supported Formats
//!
//! - **Archive** (`RDAR`): header, index, file table and the entry, segment
//!   and dependency arrays; entries are rebuilt from raw and compressed
//!   segments
//! - **Resource chunk** (`CR2W`): header, table directory and the strings,
//!   name, import, property, export, buffer and embedded tables, with
//!   cross-table resolution and the export hierarchy
//! - **Codecs**: LZ4 block and zlib segments, plus Kraken through an injected
//!   [`KrakenDecoder`]
//!
//! # Design Principles
//!
//! - **Zero-Copy Views**: readers borrow the input bytes; records are decoded
//!   on access from bounds-checked windows
//! - **Checked Offsets**: every offset is validated against its backing range
//!   and reported as an error instead of being trusted
//! - **Failure Isolation**: a broken entry fails alone; the rest of the
//!   archive stays readable
//!
//! # Example
//!
//! ```no_run
//! use redarc_formats::{ArchiveReader, ArchiveSource, ResourceChunk, SourceMode};
//!
//! let source = ArchiveSource::open("basegame_4_gamedata.archive", SourceMode::Mapped)?;
//! let archive = ArchiveReader::open(&source)?;
//! let file = archive.get_file(0)?;
//! if file.is_resource_chunk() {
//!     let chunk = ResourceChunk::open(&file.data)?;
//!     for index in 0..chunk.exports().len() {
//!         println!("{}", chunk.export_display_name(index)?);
//!     }
//! }
//! # Ok::<(), redarc_formats::FormatError>(())
//! ```

/// Archive container reader
pub mod archive;
/// Resource chunk reader and export hierarchy
pub mod chunk;
/// Segment codecs and the Kraken capability
pub mod codec;
pub mod error;
pub mod options;
pub mod source;
pub mod view;

/// Byte-level archive and chunk builders for tests
#[cfg(any(test, feature = "test-utils"))]
#[allow(clippy::unwrap_used)]
pub mod test_utils;

pub use archive::{ArchiveFile, ArchiveReader};
pub use chunk::{ExportGraph, ResourceChunk, TableKind};
pub use codec::{CodecDispatcher, KrakenDecoder, KrakenError, SerializedKraken};
pub use error::{FormatError, FormatResult};
pub use options::ReaderOptions;
pub use source::{ArchiveSource, SourceMode};
