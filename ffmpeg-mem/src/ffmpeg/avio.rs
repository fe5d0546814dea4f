//! `AVIOContext` backed by a [`ReadSeek`] or [`WriteSeek`] capability.

use std::ffi::{c_int, c_void};
use std::io::{Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::ptr;
use std::slice;

use ffmpeg_next::ffi;

use crate::buffer::{ReadSeek, WriteSeek};

/// Same buffer size libavformat uses for its own file protocol.
const IO_BUFFER_SIZE: usize = 32768;

// From libavformat/avio.h; not exported as constants by the bindings.
const AVSEEK_SIZE: c_int = 0x10000;
const AVSEEK_FORCE: c_int = 0x20000;

enum Endpoint<'a> {
    Source(&'a mut dyn ReadSeek),
    Sink(&'a mut dyn WriteSeek),
}

impl Endpoint<'_> {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        match self {
            Endpoint::Source(source) => source.seek(pos),
            Endpoint::Sink(sink) => sink.seek(pos),
        }
    }

    fn size(&mut self) -> std::io::Result<u64> {
        match self {
            Endpoint::Source(source) => {
                let current = source.stream_position()?;
                let end = source.seek(SeekFrom::End(0))?;
                source.seek(SeekFrom::Start(current))?;
                Ok(end)
            }
            Endpoint::Sink(sink) => sink.total_len(),
        }
    }
}

/// Owns an `AVIOContext` whose callbacks forward to a borrowed endpoint.
///
/// Format contexts only borrow the pointer returned by [`as_ptr`](Self::as_ptr) and must be
/// closed before this is dropped.
pub(crate) struct VirtualIo<'a> {
    ctx: *mut ffi::AVIOContext,
    endpoint: *mut Endpoint<'a>,
    _marker: PhantomData<&'a mut ()>,
}

impl<'a> VirtualIo<'a> {
    pub(crate) fn reader(source: &'a mut dyn ReadSeek) -> anyhow::Result<Self> {
        Self::new(Endpoint::Source(source))
    }

    pub(crate) fn writer(sink: &'a mut dyn WriteSeek) -> anyhow::Result<Self> {
        Self::new(Endpoint::Sink(sink))
    }

    fn new(endpoint: Endpoint<'a>) -> anyhow::Result<Self> {
        let writable = matches!(endpoint, Endpoint::Sink(_));
        let endpoint = Box::into_raw(Box::new(endpoint));

        unsafe {
            let buffer = ffi::av_malloc(IO_BUFFER_SIZE) as *mut u8;
            if buffer.is_null() {
                drop(Box::from_raw(endpoint));
                return Err(anyhow::anyhow!("failed to allocate avio buffer"));
            }

            let ctx = if writable {
                ffi::avio_alloc_context(
                    buffer,
                    IO_BUFFER_SIZE as c_int,
                    1,
                    endpoint as *mut c_void,
                    None,
                    // The buffer argument is `const` from FFmpeg 7 on, mutable before.
                    Some(std::mem::transmute(
                        write_packet as unsafe extern "C" fn(*mut c_void, *const u8, c_int) -> c_int,
                    )),
                    Some(seek),
                )
            } else {
                ffi::avio_alloc_context(
                    buffer,
                    IO_BUFFER_SIZE as c_int,
                    0,
                    endpoint as *mut c_void,
                    Some(read_packet),
                    None,
                    Some(seek),
                )
            };
            if ctx.is_null() {
                ffi::av_free(buffer as *mut c_void);
                drop(Box::from_raw(endpoint));
                return Err(anyhow::anyhow!("failed to allocate avio context"));
            }

            Ok(Self {
                ctx,
                endpoint,
                _marker: PhantomData,
            })
        }
    }

    pub(crate) fn as_ptr(&self) -> *mut ffi::AVIOContext {
        self.ctx
    }
}

impl Drop for VirtualIo<'_> {
    fn drop(&mut self) {
        unsafe {
            if (*self.ctx).write_flag != 0 {
                ffi::avio_flush(self.ctx);
            }
            // The context may have swapped its buffer; free whatever it holds now.
            ffi::av_freep(&mut (*self.ctx).buffer as *mut *mut u8 as *mut c_void);
            ffi::avio_context_free(&mut self.ctx);
            drop(Box::from_raw(self.endpoint));
        }
    }
}

fn eof() -> c_int {
    c_int::from(ffmpeg_next::Error::Eof)
}

fn io_error(err: std::io::Error) -> c_int {
    log::debug!("avio callback failed: {}", err);
    c_int::from(ffmpeg_next::Error::External)
}

unsafe extern "C" fn read_packet(opaque: *mut c_void, buf: *mut u8, buf_size: c_int) -> c_int {
    let endpoint = unsafe { &mut *(opaque as *mut Endpoint) };
    let Endpoint::Source(source) = endpoint else {
        return c_int::from(ffmpeg_next::Error::External);
    };
    if buf_size <= 0 {
        return 0;
    }
    let out = unsafe { slice::from_raw_parts_mut(buf, buf_size as usize) };
    match source.read(out) {
        Ok(0) => eof(),
        Ok(n) => n as c_int,
        Err(err) => io_error(err),
    }
}

unsafe extern "C" fn write_packet(opaque: *mut c_void, buf: *const u8, buf_size: c_int) -> c_int {
    let endpoint = unsafe { &mut *(opaque as *mut Endpoint) };
    let Endpoint::Sink(sink) = endpoint else {
        return c_int::from(ffmpeg_next::Error::External);
    };
    if buf_size <= 0 {
        return 0;
    }
    let data = unsafe { slice::from_raw_parts(buf, buf_size as usize) };
    match sink.write_all(data) {
        Ok(()) => buf_size,
        Err(err) => io_error(err),
    }
}

unsafe extern "C" fn seek(opaque: *mut c_void, offset: i64, whence: c_int) -> i64 {
    let endpoint = unsafe { &mut *(opaque as *mut Endpoint) };
    if whence & AVSEEK_SIZE != 0 {
        return match endpoint.size() {
            Ok(size) => size as i64,
            Err(err) => io_error(err) as i64,
        };
    }

    let pos = match whence & !AVSEEK_FORCE {
        0 if offset >= 0 => SeekFrom::Start(offset as u64),
        1 => SeekFrom::Current(offset),
        2 => SeekFrom::End(offset),
        _ => return c_int::from(ffmpeg_next::Error::External) as i64,
    };
    match endpoint.seek(pos) {
        Ok(pos) => pos as i64,
        Err(err) => io_error(err) as i64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::GrowableBuffer;

    #[test]
    fn writer_flushes_into_the_buffer_on_drop() {
        let mut buffer = GrowableBuffer::new();
        {
            let io = VirtualIo::writer(&mut buffer).unwrap();
            unsafe {
                ffi::avio_write(io.as_ptr(), b"hello".as_ptr(), 5);
                ffi::avio_seek(io.as_ptr(), 0, 0);
                ffi::avio_write(io.as_ptr(), b"J".as_ptr(), 1);
            }
        }
        assert_eq!(buffer.as_slice(), b"Jello");
    }

    #[test]
    fn reader_reports_size_and_eof() {
        let mut buffer = GrowableBuffer::from(b"0123456789".to_vec());
        let io = VirtualIo::reader(&mut buffer).unwrap();
        let mut out = [0u8; 16];
        unsafe {
            assert_eq!(ffi::avio_size(io.as_ptr()), 10);
            assert_eq!(ffi::avio_read(io.as_ptr(), out.as_mut_ptr(), 16), 10);
            assert_eq!(ffi::avio_read(io.as_ptr(), out.as_mut_ptr(), 16), eof());
        }
        assert_eq!(&out[..10], b"0123456789");
    }
}
