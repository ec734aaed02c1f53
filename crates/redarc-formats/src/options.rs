//! Reader configuration

use std::sync::Arc;

use crate::codec::KrakenDecoder;

/// Maximum allowed decompression size per segment (1 GiB)
///
/// Declared in-memory sizes above this limit are rejected before any buffer
/// is allocated, so a corrupt or hostile segment table cannot force a huge
/// allocation.
pub const MAX_SEGMENT_SIZE: usize = 1024 * 1024 * 1024;

/// Options controlling how an archive is opened and decoded
#[derive(Clone)]
pub struct ReaderOptions {
    /// Largest in-memory size accepted for a single segment
    pub max_segment_size: usize,
    /// Reject archives whose header size disagrees with the byte range
    pub strict_file_size: bool,
    /// Decoder used for Kraken-compressed segments
    pub kraken: Option<Arc<dyn KrakenDecoder>>,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            max_segment_size: MAX_SEGMENT_SIZE,
            strict_file_size: false,
            kraken: None,
        }
    }
}

impl std::fmt::Debug for ReaderOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderOptions")
            .field("max_segment_size", &self.max_segment_size)
            .field("strict_file_size", &self.strict_file_size)
            .field("kraken", &self.kraken.is_some())
            .finish()
    }
}

impl ReaderOptions {
    /// Default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `decoder` for Kraken-compressed segments.
    pub fn with_kraken(mut self, decoder: Arc<dyn KrakenDecoder>) -> Self {
        self.kraken = Some(decoder);
        self
    }

    /// Set the per-segment size limit.
    pub fn with_max_segment_size(mut self, limit: usize) -> Self {
        self.max_segment_size = limit;
        self
    }

    /// Require the header's total file size to match the byte range.
    pub fn with_strict_file_size(mut self, strict: bool) -> Self {
        self.strict_file_size = strict;
        self
    }
}
