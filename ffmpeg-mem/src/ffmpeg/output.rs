use std::collections::BTreeMap;
use std::ffi::{CString, c_int};
use std::ptr;

use ffmpeg_next::codec::Parameters;
use ffmpeg_next::format::context;
use ffmpeg_next::{Dictionary, ffi};

use super::avio::VirtualIo;
use crate::buffer::WriteSeek;
use crate::muxer::ContainerWriter;
use crate::packet::EncodedPacket;
use crate::stream::TrackInfo;
use crate::timebase::Rational;

/// A container muxer writing to memory through [`VirtualIo`].
pub struct BufferOutput<'a> {
    // Declared before `io`; its pb is detached in `drop` so only `io` frees the context.
    output: context::Output,
    have_written_header: bool,
    have_written_trailer: bool,
    io: VirtualIo<'a>,
}

impl<'a> BufferOutput<'a> {
    pub fn open(format: &str, sink: &'a mut dyn WriteSeek) -> anyhow::Result<Self> {
        let cformat = CString::new(format)
            .map_err(|e| anyhow::anyhow!("invalid format name {:?}: {}", format, e))?;
        let io = VirtualIo::writer(sink)?;

        let output = unsafe {
            let mut ctx = ptr::null_mut();
            let ret = ffi::avformat_alloc_output_context2(
                &mut ctx,
                ptr::null(),
                cformat.as_ptr(),
                ptr::null(),
            );
            if ret < 0 || ctx.is_null() {
                return Err(anyhow::anyhow!(
                    "output format not found: {}: {}",
                    format,
                    ffmpeg_next::Error::from(ret)
                ));
            }
            (*ctx).pb = io.as_ptr();
            (*ctx).flags |= ffi::AVFMT_FLAG_CUSTOM_IO as c_int;
            context::Output::wrap(ctx)
        };

        Ok(Self {
            output,
            have_written_header: false,
            have_written_trailer: false,
            io,
        })
    }
}

impl ContainerWriter<Parameters> for BufferOutput<'_> {
    fn add_track(&mut self, track: &TrackInfo<Parameters>, time_base: Rational) -> anyhow::Result<usize> {
        let mut stream = self
            .output
            .add_stream(ffmpeg_next::encoder::find(track.params.id()))?;
        stream.set_parameters(track.params.clone());
        stream.set_time_base(time_base);
        // Let the container pick its own tag for the codec.
        unsafe {
            (*(*stream.as_mut_ptr()).codecpar).codec_tag = 0;
        }
        Ok(stream.index())
    }

    fn write_header(&mut self, options: &BTreeMap<String, String>) -> anyhow::Result<()> {
        if options.is_empty() {
            self.output.write_header()?;
        } else {
            let mut dict = Dictionary::new();
            for (key, value) in options {
                dict.set(key, value);
            }
            let unused = self.output.write_header_with(dict)?;
            for (key, _) in unused.iter() {
                log::warn!("muxer option {} was not used", key);
            }
        }
        self.have_written_header = true;
        Ok(())
    }

    fn track_time_base(&self, index: usize) -> Option<Rational> {
        self.output.stream(index).map(|s| s.time_base().into())
    }

    fn write_packet(&mut self, index: usize, packet: EncodedPacket) -> anyhow::Result<()> {
        if !self.have_written_header {
            return Err(anyhow::anyhow!("packet written before header"));
        }
        let mut p = ffmpeg_next::Packet::copy(&packet.data);
        p.set_stream(index);
        p.set_pts(packet.pts);
        p.set_dts(packet.dts);
        p.set_duration(packet.duration);
        p.set_position(-1);
        if packet.is_key {
            p.set_flags(ffmpeg_next::codec::packet::Flags::KEY);
        }
        p.write_interleaved(&mut self.output)?;
        Ok(())
    }

    fn write_trailer(&mut self) -> anyhow::Result<()> {
        if self.have_written_header && !self.have_written_trailer {
            self.have_written_trailer = true;
            self.output.write_trailer()?;
        }
        Ok(())
    }
}

impl Drop for BufferOutput<'_> {
    fn drop(&mut self) {
        unsafe {
            let ctx = self.output.as_mut_ptr();
            if (*ctx).pb == self.io.as_ptr() {
                (*ctx).pb = ptr::null_mut();
            }
        }
    }
}
