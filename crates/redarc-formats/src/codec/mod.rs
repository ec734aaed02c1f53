//! Segment decompression
//!
//! A compressed segment starts with an 8-byte block header: a 4-byte codec
//! tag followed by the declared uncompressed size. The remaining bytes are the
//! codec payload. [`CodecDispatcher`] maps the tag to a decoder and enforces
//! that exactly the declared number of bytes comes out.
//!
//! Segments whose on-disk and in-memory sizes are equal are stored raw and
//! never reach this module.

mod kraken;

pub use kraken::{ExclusiveKrakenDecoder, KrakenDecoder, KrakenError, SerializedKraken};

use std::fmt;
use std::io::Read;
use std::sync::Arc;

use flate2::read::ZlibDecoder;
use tracing::trace;

use crate::error::{FormatError, FormatResult};
use crate::options::{MAX_SEGMENT_SIZE, ReaderOptions};

/// Tag of Kraken (Oodle) compressed blocks
pub const KRAKEN_MAGIC: [u8; 4] = *b"KARK";

/// Tag of LZ4 block compressed blocks
pub const LZ4_MAGIC: [u8; 4] = *b"4ZLX";

/// Tag of zlib compressed blocks
pub const ZLIB_MAGIC: [u8; 4] = *b"BILZ";

/// Size of the block header preceding compressed payloads
pub const BLOCK_HEADER_SIZE: usize = 8;

/// Codecs recognised in compressed block headers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    /// Proprietary high-ratio codec, decoded by an injected provider
    Kraken,
    /// LZ4 block format
    Lz4,
    /// zlib stream
    Zlib,
}

impl Codec {
    /// Parse a codec from its block tag
    pub fn from_tag(tag: [u8; 4]) -> Option<Self> {
        match tag {
            KRAKEN_MAGIC => Some(Self::Kraken),
            LZ4_MAGIC => Some(Self::Lz4),
            ZLIB_MAGIC => Some(Self::Zlib),
            _ => None,
        }
    }

    /// The block tag as stored on disk
    pub const fn tag(self) -> [u8; 4] {
        match self {
            Self::Kraken => KRAKEN_MAGIC,
            Self::Lz4 => LZ4_MAGIC,
            Self::Zlib => ZLIB_MAGIC,
        }
    }

    /// Short display name
    pub const fn name(self) -> &'static str {
        match self {
            Self::Kraken => "kraken",
            Self::Lz4 => "lz4",
            Self::Zlib => "zlib",
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decompresses tagged blocks to their declared size
#[derive(Clone)]
pub struct CodecDispatcher {
    kraken: Option<Arc<dyn KrakenDecoder>>,
    max_output: usize,
}

impl Default for CodecDispatcher {
    fn default() -> Self {
        Self {
            kraken: None,
            max_output: MAX_SEGMENT_SIZE,
        }
    }
}

impl fmt::Debug for CodecDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecDispatcher")
            .field("kraken", &self.kraken.is_some())
            .field("max_output", &self.max_output)
            .finish()
    }
}

impl CodecDispatcher {
    /// Dispatcher for the open codecs only
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatcher that also decodes Kraken blocks with `decoder`
    pub fn with_kraken(decoder: Arc<dyn KrakenDecoder>) -> Self {
        Self {
            kraken: Some(decoder),
            ..Self::default()
        }
    }

    /// Dispatcher configured from reader options
    pub fn from_options(options: &ReaderOptions) -> Self {
        Self {
            kraken: options.kraken.clone(),
            max_output: options.max_segment_size,
        }
    }

    /// Whether Kraken blocks can be decoded
    pub fn has_kraken(&self) -> bool {
        self.kraken.is_some()
    }

    /// Decompress `input` using the codec named by `tag`.
    ///
    /// The result always holds exactly `declared` bytes; any other outcome is
    /// an error.
    pub fn decompress(&self, tag: [u8; 4], input: &[u8], declared: usize) -> FormatResult<Vec<u8>> {
        let codec = Codec::from_tag(tag).ok_or(FormatError::UnsupportedCodec {
            tag,
            reason: "unknown codec tag",
        })?;

        if declared > self.max_output {
            return Err(FormatError::corrupt(
                "segments",
                format!(
                    "declared size {declared} exceeds limit of {} bytes",
                    self.max_output
                ),
            ));
        }

        trace!("Decompressing {} bytes of {codec} into {declared}", input.len());
        let output = match codec {
            Codec::Lz4 => decompress_lz4(input, declared)?,
            Codec::Zlib => decompress_zlib(input, declared)?,
            Codec::Kraken => self.decompress_kraken(input, declared)?,
        };

        if output.len() != declared {
            return Err(FormatError::mismatch(
                declared,
                output.len(),
                format!("{codec} output differs from declared size"),
            ));
        }
        Ok(output)
    }

    fn decompress_kraken(&self, input: &[u8], declared: usize) -> FormatResult<Vec<u8>> {
        let decoder = self
            .kraken
            .as_deref()
            .ok_or(FormatError::UnsupportedCodec {
                tag: KRAKEN_MAGIC,
                reason: "no Kraken decoder configured",
            })?;

        let mut output = vec![0u8; declared];
        let written = decoder
            .decompress(input, &mut output)
            .map_err(|e| FormatError::mismatch(declared, 0, e.to_string()))?;
        if written > declared {
            return Err(FormatError::mismatch(
                declared,
                written,
                "Kraken decoder reported more bytes than the output holds",
            ));
        }
        output.truncate(written);
        Ok(output)
    }
}

/// Decompress an LZ4 block into at most `declared` bytes.
pub fn decompress_lz4(input: &[u8], declared: usize) -> FormatResult<Vec<u8>> {
    let mut output = vec![0u8; declared];
    let written = lz4_flex::block::decompress_into(input, &mut output)
        .map_err(|e| FormatError::mismatch(declared, 0, format!("LZ4 decompression failed: {e}")))?;
    output.truncate(written);
    Ok(output)
}

/// Inflate a zlib stream, reading at most one byte past `declared` so that
/// oversized output is detected without unbounded growth.
pub fn decompress_zlib(input: &[u8], declared: usize) -> FormatResult<Vec<u8>> {
    let mut output = Vec::with_capacity(declared);
    ZlibDecoder::new(input)
        .take(declared as u64 + 1)
        .read_to_end(&mut output)
        .map_err(|e| {
            FormatError::mismatch(declared, output.len(), format!("zlib decompression failed: {e}"))
        })?;
    Ok(output)
}
