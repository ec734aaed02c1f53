//! Error types shared by the container and chunk decoders

use thiserror::Error;

/// Result type for all decoding operations
pub type FormatResult<T> = Result<T, FormatError>;

/// Errors raised while decoding archives, segments and resource chunks
#[derive(Debug, Error)]
pub enum FormatError {
    /// Container or chunk magic does not match
    #[error("unsupported {format} magic: expected {expected:02X?}, got {actual:02X?}")]
    UnsupportedMagic {
        /// Format whose magic was checked
        format: &'static str,
        /// Magic bytes the format requires
        expected: [u8; 4],
        /// Magic bytes found in the input
        actual: [u8; 4],
    },

    /// A table, array or referenced range lies outside its backing bytes
    #[error("corrupt {table}: {reason}")]
    CorruptTable {
        /// Table or structure being resolved
        table: &'static str,
        /// Description of the violated bound
        reason: String,
    },

    /// An entry's segment or dependency references are out of bounds
    #[error("corrupt entry {entry} ({table}): {reason}")]
    CorruptEntry {
        /// Entry being reconstructed
        entry: usize,
        /// Table the broken reference points into
        table: &'static str,
        /// Description of the violated bound
        reason: String,
    },

    /// Caller asked for a record beyond a table's count
    #[error("{table} index {index} out of range (count {count})")]
    IndexOutOfRange {
        /// Table being indexed
        table: &'static str,
        /// Requested index
        index: usize,
        /// Number of records in the table
        count: usize,
    },

    /// Segment codec tag is unknown, or its decoder is not available
    #[error("unsupported codec {tag:02X?} ({reason})")]
    UnsupportedCodec {
        /// Tag read from the compressed block header
        tag: [u8; 4],
        /// Why the tag could not be decoded
        reason: &'static str,
    },

    /// Decompressed output does not match the declared size
    #[error("decompression mismatch: expected {expected} bytes, got {actual} ({reason})")]
    DecompressionMismatch {
        /// Declared uncompressed size
        expected: usize,
        /// Bytes actually produced
        actual: usize,
        /// Codec failure or size disagreement detail
        reason: String,
    },

    /// I/O error while opening a byte source
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Binary parsing error
    #[error("binary parsing error: {0}")]
    BinRw(#[from] binrw::Error),
}

impl FormatError {
    pub(crate) fn corrupt(table: &'static str, reason: impl Into<String>) -> Self {
        Self::CorruptTable {
            table,
            reason: reason.into(),
        }
    }

    pub(crate) fn mismatch(expected: usize, actual: usize, reason: impl Into<String>) -> Self {
        Self::DecompressionMismatch {
            expected,
            actual,
            reason: reason.into(),
        }
    }

    /// Scope a table-level corruption to the entry being reconstructed.
    pub(crate) fn in_entry(self, entry: usize) -> Self {
        match self {
            Self::CorruptTable { table, reason } => Self::CorruptEntry {
                entry,
                table,
                reason,
            },
            other => other,
        }
    }

    /// Whether this error invalidates the whole file being decoded.
    ///
    /// A batch run reports the file and moves on to the next one.
    pub fn is_file_fatal(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedMagic { .. }
                | Self::CorruptTable { .. }
                | Self::Io(_)
                | Self::BinRw(_)
        )
    }

    /// Whether this error only affects the entry that raised it.
    ///
    /// Other entries of the same archive can still be decoded.
    pub fn is_entry_local(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedCodec { .. }
                | Self::DecompressionMismatch { .. }
                | Self::CorruptEntry { .. }
        )
    }
}
