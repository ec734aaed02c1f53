//! Bounds-checked views over borrowed byte ranges
//!
//! Every structure in the container and chunk formats is located by an
//! integer offset. Offsets are resolved with [`slice_at`], which validates the
//! whole `(offset, length)` window against the backing bytes before handing
//! out a slice. Fixed-size record arrays are exposed as [`RecordArray`], which
//! checks its window once at construction and every index on access.

use std::fmt;
use std::io::Cursor;
use std::iter::FusedIterator;
use std::marker::PhantomData;

use binrw::BinRead;

use crate::error::{FormatError, FormatResult};

/// Borrow `len` bytes starting at `offset`.
///
/// Fails with `CorruptTable` naming `table` when the window overflows or
/// extends past the end of `bytes`.
pub fn slice_at<'a>(
    bytes: &'a [u8],
    offset: u64,
    len: u64,
    table: &'static str,
) -> FormatResult<&'a [u8]> {
    let end = offset.checked_add(len).ok_or_else(|| {
        FormatError::corrupt(table, format!("range {offset:#x}+{len:#x} overflows"))
    })?;
    if end > bytes.len() as u64 {
        return Err(FormatError::corrupt(
            table,
            format!(
                "range {offset:#x}..{end:#x} exceeds {} available bytes",
                bytes.len()
            ),
        ));
    }
    // Both bounds are at most bytes.len(), so they fit in usize.
    Ok(&bytes[offset as usize..end as usize])
}

/// A fixed-size, packed, little-endian record stored in a table
pub trait Record: for<'a> BinRead<Args<'a> = ()> {
    /// Encoded size in bytes
    const SIZE: usize;
    /// Table name used in error messages
    const TABLE: &'static str;

    /// Decode one record from a window of exactly [`Self::SIZE`] bytes.
    fn decode(bytes: &[u8]) -> FormatResult<Self> {
        if bytes.len() != Self::SIZE {
            return Err(FormatError::corrupt(
                Self::TABLE,
                format!("record window of {} bytes, expected {}", bytes.len(), Self::SIZE),
            ));
        }
        Ok(Self::read_options(
            &mut Cursor::new(bytes),
            binrw::Endian::Little,
            (),
        )?)
    }
}

/// Typed, bounds-checked view over a contiguous array of records
pub struct RecordArray<'a, T> {
    bytes: &'a [u8],
    count: usize,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for RecordArray<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for RecordArray<'_, T> {}

impl<T: Record> fmt::Debug for RecordArray<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordArray")
            .field("table", &T::TABLE)
            .field("count", &self.count)
            .finish()
    }
}

impl<T: Record> Default for RecordArray<'_, T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<'a, T: Record> RecordArray<'a, T> {
    /// A view with no records
    pub const fn empty() -> Self {
        Self {
            bytes: &[],
            count: 0,
            _record: PhantomData,
        }
    }

    /// Resolve `count` records starting at `offset` within `bytes`.
    pub fn new(bytes: &'a [u8], offset: u64, count: u64) -> FormatResult<Self> {
        let len = count.checked_mul(T::SIZE as u64).ok_or_else(|| {
            FormatError::corrupt(T::TABLE, format!("record count {count} overflows"))
        })?;
        let window = slice_at(bytes, offset, len, T::TABLE)?;
        Ok(Self {
            bytes: window,
            // The window fits in memory, so its record count does too.
            count: count as usize,
            _record: PhantomData,
        })
    }

    /// Number of records in the view
    pub const fn len(&self) -> usize {
        self.count
    }

    /// Whether the view has no records
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Raw bytes covered by the view
    pub const fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Decode the record at `index`.
    pub fn get(&self, index: usize) -> FormatResult<T> {
        if index >= self.count {
            return Err(FormatError::IndexOutOfRange {
                table: T::TABLE,
                index,
                count: self.count,
            });
        }
        let start = index * T::SIZE;
        T::decode(&self.bytes[start..start + T::SIZE])
    }

    /// Iterate over all records in order.
    pub fn iter(&self) -> RecordIter<'a, T> {
        RecordIter {
            chunks: self.bytes.chunks_exact(T::SIZE),
            _record: PhantomData,
        }
    }

    /// Decode every record into an owned vector.
    pub fn to_vec(&self) -> FormatResult<Vec<T>> {
        self.iter().collect()
    }
}

impl<'a, T: Record> IntoIterator for RecordArray<'a, T> {
    type Item = FormatResult<T>;
    type IntoIter = RecordIter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Restartable iterator over the records of a [`RecordArray`]
pub struct RecordIter<'a, T> {
    chunks: std::slice::ChunksExact<'a, u8>,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> Iterator for RecordIter<'_, T> {
    type Item = FormatResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.chunks.next().map(T::decode)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl<T: Record> DoubleEndedIterator for RecordIter<'_, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.chunks.next_back().map(T::decode)
    }
}

impl<T: Record> ExactSizeIterator for RecordIter<'_, T> {}

impl<T: Record> FusedIterator for RecordIter<'_, T> {}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use binrw::BinRead;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead)]
    #[brw(little)]
    struct Pair {
        a: u16,
        b: u16,
    }

    impl Record for Pair {
        const SIZE: usize = 4;
        const TABLE: &'static str = "pairs";
    }

    #[test]
    fn test_slice_at_bounds() {
        let bytes = [1u8, 2, 3, 4, 5];
        assert_eq!(slice_at(&bytes, 1, 3, "t").unwrap(), &[2, 3, 4]);
        assert_eq!(slice_at(&bytes, 5, 0, "t").unwrap(), &[] as &[u8]);
        assert!(slice_at(&bytes, 3, 3, "t").is_err());
        assert!(slice_at(&bytes, u64::MAX, 2, "t").is_err());
    }

    #[test]
    fn test_record_array_access() {
        let bytes = [0xFF, 0x01, 0x00, 0x02, 0x00, 0x03, 0x00, 0x04, 0x00];
        let view = RecordArray::<Pair>::new(&bytes, 1, 2).unwrap();
        assert_eq!(view.len(), 2);
        assert_eq!(view.get(0).unwrap(), Pair { a: 1, b: 2 });
        assert_eq!(view.get(1).unwrap(), Pair { a: 3, b: 4 });

        match view.get(2) {
            Err(FormatError::IndexOutOfRange { index, count, .. }) => {
                assert_eq!((index, count), (2, 2));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_record_array_rejects_short_window() {
        let bytes = [0u8; 7];
        assert!(matches!(
            RecordArray::<Pair>::new(&bytes, 0, 2),
            Err(FormatError::CorruptTable { table: "pairs", .. })
        ));
        assert!(RecordArray::<Pair>::new(&bytes, 0, u64::MAX).is_err());
    }

    #[test]
    fn test_iteration_is_restartable() {
        let bytes = [1u8, 0, 2, 0, 3, 0, 4, 0];
        let view = RecordArray::<Pair>::new(&bytes, 0, 2).unwrap();
        let first: Vec<_> = view.iter().map(Result::unwrap).collect();
        let second = view.to_vec().unwrap();
        assert_eq!(first, second);
        assert_eq!(view.iter().len(), 2);
        assert!(RecordArray::<Pair>::empty().iter().next().is_none());
    }
}
