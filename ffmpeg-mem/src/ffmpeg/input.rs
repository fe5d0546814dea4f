use std::ffi::CString;
use std::ptr;

use ffmpeg_next::codec::Parameters;
use ffmpeg_next::ffi;
use ffmpeg_next::format::context;

use super::avio::VirtualIo;
use super::stream::track_info;
use crate::buffer::ReadSeek;
use crate::muxer::Demuxer;
use crate::packet::EncodedPacket;
use crate::stream::TrackInfo;

/// A demuxer reading from memory through [`VirtualIo`].
pub struct BufferInput<'a> {
    // Declared before `io` so the format context is closed first.
    input: context::Input,
    tracks: Vec<TrackInfo<Parameters>>,
    format_name: String,
    _io: VirtualIo<'a>,
}

impl<'a> BufferInput<'a> {
    /// Resolve input format by name (e.g. "h264", "aac") via FFmpeg's av_find_input_format.
    fn find_input_format(name: &str) -> anyhow::Result<*const ffi::AVInputFormat> {
        let cname = CString::new(name)
            .map_err(|e| anyhow::anyhow!("invalid format name {:?}: {}", name, e))?;
        let ptr = unsafe { ffi::av_find_input_format(cname.as_ptr()) };
        if ptr.is_null() {
            return Err(anyhow::anyhow!("input format not found: {}", name));
        }
        Ok(ptr as *const _)
    }

    pub fn open(source: &'a mut dyn ReadSeek, format: Option<&str>) -> anyhow::Result<Self> {
        let input_format = match format {
            Some(name) => Self::find_input_format(name)?,
            None => ptr::null(),
        };
        let io = VirtualIo::reader(source)?;

        let input = unsafe {
            let mut ctx = ffi::avformat_alloc_context();
            if ctx.is_null() {
                return Err(anyhow::anyhow!("failed to allocate format context"));
            }
            (*ctx).pb = io.as_ptr();

            // Frees the context on failure.
            let ret = ffi::avformat_open_input(&mut ctx, ptr::null(), input_format, ptr::null_mut());
            if ret < 0 {
                return Err(ffmpeg_next::Error::from(ret).into());
            }
            let ret = ffi::avformat_find_stream_info(ctx, ptr::null_mut());
            if ret < 0 {
                ffi::avformat_close_input(&mut ctx);
                return Err(ffmpeg_next::Error::from(ret).into());
            }
            context::Input::wrap(ctx)
        };

        let tracks: Vec<_> = input.streams().map(|s| track_info(&s)).collect();
        let format_name = input.format().name().to_string();
        log::debug!(
            "opened {} input from memory with {} streams",
            format_name,
            tracks.len()
        );

        Ok(Self {
            input,
            tracks,
            format_name,
            _io: io,
        })
    }
}

impl Demuxer<Parameters> for BufferInput<'_> {
    fn format_name(&self) -> &str {
        &self.format_name
    }

    fn tracks(&self) -> &[TrackInfo<Parameters>] {
        &self.tracks
    }

    fn read_packet(&mut self) -> anyhow::Result<Option<(usize, EncodedPacket)>> {
        let mut packet = ffmpeg_next::Packet::empty();
        match packet.read(&mut self.input) {
            Ok(()) => Ok(Some((packet.stream(), EncodedPacket::from(&packet)))),
            Err(ffmpeg_next::Error::Eof) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}
