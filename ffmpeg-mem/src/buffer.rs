//! Owned growable byte store used as a virtual file by the encoders and the muxer.
//!
//! A [`GrowableBuffer`] keeps its bytes contiguous and tracks a single cursor. Encoders only
//! ever [`append`](GrowableBuffer::append); demuxers consume it through [`Read`]; container
//! writers go through [`Write`] + [`Seek`] so they can patch headers written earlier.

use std::io::{self, Read, Seek, SeekFrom, Write};

use bytes::Bytes;

use crate::error::{Error, Result};

/// Read side of the virtual file capability handed to a backend demuxer.
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek> ReadSeek for T {}

/// Write side of the virtual file capability handed to a backend container writer.
pub trait WriteSeek: Write + Seek {
    /// Current logical size in bytes.
    fn total_len(&mut self) -> io::Result<u64>;
}

#[derive(Debug, Default)]
pub struct GrowableBuffer {
    data: Vec<u8>,
    pos: usize,
}

impl GrowableBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// Cursor used by reads and by writes through [`Write`].
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes between the cursor and the end.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Bytes not yet consumed by the cursor.
    pub fn unconsumed(&self) -> &[u8] {
        &self.data[self.pos..]
    }

    /// Copies the whole content out for the caller to persist.
    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(&self.data)
    }

    pub fn into_bytes(self) -> Bytes {
        Bytes::from(self.data)
    }

    /// Makes room for `additional` more bytes past the end.
    ///
    /// Capacity doubles until the new size fits. Allocation failure is reported, the buffer is
    /// left as it was.
    pub fn reserve(&mut self, additional: usize) -> Result<()> {
        let required = self
            .data
            .len()
            .checked_add(additional)
            .ok_or(Error::Allocation {
                requested: usize::MAX,
            })?;
        if required <= self.data.capacity() {
            return Ok(());
        }

        let mut new_capacity = self.data.capacity().max(1);
        while new_capacity < required {
            new_capacity = match new_capacity.checked_mul(2) {
                Some(doubled) => doubled,
                None => required,
            };
        }

        self.data
            .try_reserve_exact(new_capacity - self.data.len())
            .map_err(|_| Error::Allocation {
                requested: new_capacity,
            })
    }

    /// Appends at the end regardless of the cursor.
    pub fn append(&mut self, bytes: &[u8]) -> Result<()> {
        self.reserve(bytes.len())?;
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    /// Advances the cursor over `n` bytes without copying them.
    pub fn consume(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.data.len());
    }

    /// Drops the bytes before the cursor, keeping the allocation.
    pub fn discard_consumed(&mut self) {
        if self.pos == 0 {
            return;
        }
        self.data.drain(..self.pos);
        self.pos = 0;
    }

    pub fn rewind(&mut self) {
        self.pos = 0;
    }

    /// Empties the buffer, keeping the allocation.
    pub fn clear(&mut self) {
        self.data.clear();
        self.pos = 0;
    }

    /// Moves the cursor to an absolute offset, which may not pass the end.
    pub fn seek_to(&mut self, offset: usize) -> Result<()> {
        if offset > self.data.len() {
            return Err(Error::InvalidInput(format!(
                "seek to {} past end of {} byte buffer",
                offset,
                self.data.len()
            )));
        }
        self.pos = offset;
        Ok(())
    }

    /// Writes at the cursor, overwriting existing bytes and growing past the end.
    fn write_at_cursor(&mut self, bytes: &[u8]) -> Result<()> {
        let end = self.pos + bytes.len();
        if end > self.data.len() {
            self.reserve(end - self.data.len())?;
        }
        let overlap = (self.data.len() - self.pos).min(bytes.len());
        self.data[self.pos..self.pos + overlap].copy_from_slice(&bytes[..overlap]);
        self.data.extend_from_slice(&bytes[overlap..]);
        self.pos = end;
        Ok(())
    }
}

impl From<Vec<u8>> for GrowableBuffer {
    fn from(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }
}

impl Read for GrowableBuffer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.is_exhausted() {
            return Ok(0);
        }
        let n = self.remaining().min(buf.len());
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

impl Write for GrowableBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_at_cursor(buf)
            .map_err(|e| io::Error::new(io::ErrorKind::OutOfMemory, e))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for GrowableBuffer {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => usize::try_from(offset).ok(),
            SeekFrom::Current(delta) => offset_by(self.pos, delta),
            SeekFrom::End(delta) => offset_by(self.data.len(), delta),
        };
        let target = target.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek to a negative offset")
        })?;
        self.seek_to(target)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        Ok(target as u64)
    }
}

impl WriteSeek for GrowableBuffer {
    fn total_len(&mut self) -> io::Result<u64> {
        Ok(self.data.len() as u64)
    }
}

fn offset_by(base: usize, delta: i64) -> Option<usize> {
    if delta >= 0 {
        base.checked_add(usize::try_from(delta).ok()?)
    } else {
        base.checked_sub(usize::try_from(delta.unsigned_abs()).ok()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appended_ranges_read_back_in_order() {
        let ranges: [&[u8]; 4] = [b"ab", b"", b"cdefg", &[0u8; 37]];
        let mut buffer = GrowableBuffer::new();
        let mut expected = Vec::new();
        for range in ranges {
            buffer.append(range).unwrap();
            expected.extend_from_slice(range);
        }

        assert!(buffer.capacity() >= expected.len());
        assert_eq!(buffer.len(), expected.len());

        let mut read_back = Vec::new();
        let mut chunk = [0u8; 5];
        loop {
            let n = buffer.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            read_back.extend_from_slice(&chunk[..n]);
        }
        assert_eq!(read_back, expected);
        assert!(buffer.is_exhausted());
    }

    #[test]
    fn capacity_at_least_doubles() {
        let mut buffer = GrowableBuffer::new();
        buffer.append(&[1]).unwrap();
        let first = buffer.capacity();
        assert!(first >= 1);

        buffer.append(&vec![2; first]).unwrap();
        assert!(buffer.capacity() >= first * 2);
        assert_eq!(buffer.len(), first + 1);
    }

    #[test]
    fn allocation_failure_is_recoverable() {
        let mut buffer = GrowableBuffer::new();
        buffer.append(b"keep").unwrap();

        let err = buffer.reserve(usize::MAX).unwrap_err();
        assert!(matches!(err, Error::Allocation { .. }));
        assert_eq!(buffer.as_slice(), b"keep");
    }

    #[test]
    fn read_on_exhausted_buffer_returns_zero() {
        let mut buffer = GrowableBuffer::new();
        let mut out = [0u8; 4];
        assert_eq!(buffer.read(&mut out).unwrap(), 0);

        buffer.append(b"xy").unwrap();
        assert_eq!(buffer.read(&mut out).unwrap(), 2);
        assert_eq!(buffer.read(&mut out).unwrap(), 0);
    }

    #[test]
    fn seek_and_write_patches_earlier_bytes() {
        let mut buffer = GrowableBuffer::new();
        buffer.write_all(b"size....payload").unwrap();
        assert_eq!(buffer.total_len().unwrap(), 15);

        buffer.seek(SeekFrom::Start(4)).unwrap();
        buffer.write_all(&[0, 0, 0, 7]).unwrap();
        assert_eq!(buffer.position(), 8);

        buffer.seek(SeekFrom::End(0)).unwrap();
        buffer.write_all(b"!").unwrap();

        assert_eq!(buffer.as_slice(), b"size\0\0\0\x07payload!");
    }

    #[test]
    fn write_across_the_end_extends() {
        let mut buffer = GrowableBuffer::from(b"abcd".to_vec());
        buffer.seek(SeekFrom::End(-2)).unwrap();
        buffer.write_all(b"XYZ").unwrap();
        assert_eq!(buffer.as_slice(), b"abXYZ");
    }

    #[test]
    fn seek_past_end_is_rejected() {
        let mut buffer = GrowableBuffer::from(b"abc".to_vec());
        assert!(buffer.seek(SeekFrom::Start(4)).is_err());
        assert!(buffer.seek(SeekFrom::Current(-1)).is_err());
        assert_eq!(buffer.position(), 0);
        assert_eq!(buffer.seek(SeekFrom::End(0)).unwrap(), 3);
    }

    #[test]
    fn discard_consumed_keeps_tail_and_capacity() {
        let mut buffer = GrowableBuffer::new();
        buffer.append(b"0123456789").unwrap();
        let capacity = buffer.capacity();

        buffer.consume(7);
        assert_eq!(buffer.unconsumed(), b"789");
        buffer.discard_consumed();

        assert_eq!(buffer.as_slice(), b"789");
        assert_eq!(buffer.position(), 0);
        assert_eq!(buffer.capacity(), capacity);
    }

    proptest::proptest! {
        #[test]
        fn test_any_appends_read_back_in_order(
            ranges in proptest::collection::vec(proptest::collection::vec(proptest::num::u8::ANY, 0..300), 0..24),
            read_len in 1usize..97,
        ) {
            let mut buffer = GrowableBuffer::new();
            let mut expected = Vec::new();
            for range in &ranges {
                let before = buffer.capacity();
                buffer.append(range).unwrap();
                let after = buffer.capacity();
                if after != before && before > 0 {
                    proptest::prop_assert!(after >= 2 * before, "grew {} -> {}", before, after);
                }
                expected.extend_from_slice(range);
            }
            proptest::prop_assert!(buffer.capacity() >= expected.len());
            proptest::prop_assert_eq!(buffer.len(), expected.len());

            let mut read_back = Vec::new();
            let mut chunk = vec![0u8; read_len];
            loop {
                let n = buffer.read(&mut chunk).unwrap();
                if n == 0 {
                    break;
                }
                read_back.extend_from_slice(&chunk[..n]);
            }
            proptest::prop_assert_eq!(read_back, expected);
        }
    }
}
