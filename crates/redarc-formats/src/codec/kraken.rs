//! Kraken decoder capability
//!
//! Kraken (Oodle) is a proprietary codec that this crate does not implement.
//! Callers that have a decoder available inject it as a [`KrakenDecoder`];
//! segments using the codec fail with `UnsupportedCodec` when none is given.

use parking_lot::Mutex;
use thiserror::Error;

/// Failure reported by an external Kraken decoder
#[derive(Debug, Clone, Error)]
#[error("Kraken decoder failed: {0}")]
pub struct KrakenError(pub String);

/// Externally supplied Kraken decompressor
///
/// Implementations must be safe to call from several sessions at once. A
/// decoder that needs exclusive access should be wrapped in
/// [`SerializedKraken`].
pub trait KrakenDecoder: Send + Sync {
    /// Decompress `input` into `output`, returning the number of bytes
    /// written.
    ///
    /// `output` has exactly the declared uncompressed size of the block.
    fn decompress(&self, input: &[u8], output: &mut [u8]) -> Result<usize, KrakenError>;
}

impl<F> KrakenDecoder for F
where
    F: Fn(&[u8], &mut [u8]) -> Result<usize, KrakenError> + Send + Sync,
{
    fn decompress(&self, input: &[u8], output: &mut [u8]) -> Result<usize, KrakenError> {
        self(input, output)
    }
}

/// Kraken decompressor that requires exclusive access while decoding
pub trait ExclusiveKrakenDecoder: Send {
    /// Decompress `input` into `output`, returning the number of bytes
    /// written.
    fn decompress(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize, KrakenError>;
}

/// Shares an [`ExclusiveKrakenDecoder`] across sessions
///
/// The lock is held only for the duration of one decompression call.
pub struct SerializedKraken<D> {
    inner: Mutex<D>,
}

impl<D: ExclusiveKrakenDecoder> SerializedKraken<D> {
    /// Wrap `decoder`.
    pub fn new(decoder: D) -> Self {
        Self {
            inner: Mutex::new(decoder),
        }
    }

    /// Unwrap the decoder.
    pub fn into_inner(self) -> D {
        self.inner.into_inner()
    }
}

impl<D: ExclusiveKrakenDecoder> KrakenDecoder for SerializedKraken<D> {
    fn decompress(&self, input: &[u8], output: &mut [u8]) -> Result<usize, KrakenError> {
        self.inner.lock().decompress(input, output)
    }
}
