//! FFmpeg implementation of the encoder and muxer seams.

mod avio;
mod encoder;
mod input;
mod output;
mod scaler;
mod stream;

use ffmpeg_next::codec::Parameters;

pub use encoder::{FfmpegAudioEncoder, FfmpegVideoEncoder};
pub use input::BufferInput;
pub use output::BufferOutput;
pub use scaler::SwsConverter;

use crate::buffer::{GrowableBuffer, ReadSeek, WriteSeek};
use crate::error::{Error, Result};
use crate::metadata::{self, MediaInfo};
use crate::muxer::{ContainerWriter, Demuxer, MuxBackend};

/// Registers FFmpeg components. Safe to call more than once.
pub fn init() -> Result<()> {
    ffmpeg_next::init().map_err(|e| Error::Backend(anyhow::anyhow!("ffmpeg_next init: {}", e)))
}

/// Demuxes and muxes through libavformat with in-memory I/O.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegBackend;

impl MuxBackend for FfmpegBackend {
    type Params = Parameters;

    fn open_input<'a>(
        &self,
        source: &'a mut dyn ReadSeek,
        format: Option<&str>,
    ) -> anyhow::Result<Box<dyn Demuxer<Parameters> + 'a>> {
        Ok(Box::new(BufferInput::open(source, format)?))
    }

    fn open_output<'a>(
        &self,
        format: &str,
        sink: &'a mut dyn WriteSeek,
    ) -> anyhow::Result<Box<dyn ContainerWriter<Parameters> + 'a>> {
        Ok(Box::new(BufferOutput::open(format, sink)?))
    }
}

/// Probes a complete container held in memory.
pub fn probe_bytes(data: &[u8]) -> Result<MediaInfo> {
    init()?;
    let mut buffer = GrowableBuffer::from(data.to_vec());
    metadata::probe(&FfmpegBackend, &mut buffer)
}
