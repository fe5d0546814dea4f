use bytes::Bytes;

use crate::audio::AudioEncodePipeline;
use crate::buffer::GrowableBuffer;
use crate::encoder::{AudioEncoder, PixelConverter, VideoEncoder};
use crate::error::Result;
use crate::frame::VideoFrame;
use crate::metadata::{self, MediaInfo};
use crate::muxer::{MuxBackend, MuxSummary, StreamMuxer};
use crate::settings::WriterSettings;
use crate::video::VideoEncodePipeline;

/// Owns both encode pipelines, the muxer and the container buffer.
///
/// Feed frames and PCM in any interleaving, then [`mux`](Self::mux). The three outputs are
/// read back with [`h264_bytes`](Self::h264_bytes), [`aac_bytes`](Self::aac_bytes) and
/// [`container_bytes`](Self::container_bytes).
pub struct MemoryWriter<B: MuxBackend> {
    settings: WriterSettings,
    video: VideoEncodePipeline,
    audio: AudioEncodePipeline,
    muxer: StreamMuxer<B>,
    container: GrowableBuffer,
    summary: Option<MuxSummary>,
}

impl<B: MuxBackend> MemoryWriter<B> {
    pub fn with_parts(
        settings: WriterSettings,
        video_encoder: Box<dyn VideoEncoder>,
        converter: Box<dyn PixelConverter>,
        audio_encoder: Box<dyn AudioEncoder>,
        backend: B,
    ) -> Result<Self> {
        settings.validate()?;
        let audio = AudioEncodePipeline::new(audio_encoder, settings.audio.sample_format)?;
        Ok(Self {
            video: VideoEncodePipeline::new(video_encoder, converter),
            audio,
            muxer: StreamMuxer::new(backend, &settings),
            container: GrowableBuffer::new(),
            summary: None,
            settings,
        })
    }

    pub fn settings(&self) -> &WriterSettings {
        &self.settings
    }

    pub fn input_image(&mut self, frame: &VideoFrame) -> Result<()> {
        self.video.input_image(frame)
    }

    pub fn input_audio(&mut self, pcm: &[u8]) -> Result<()> {
        self.audio.input_audio(pcm)
    }

    /// Flushes both encoders. Safe to call more than once.
    pub fn flush(&mut self) -> Result<()> {
        self.video.flush()?;
        self.audio.flush()
    }

    /// Flushes if needed, then muxes both elementary streams into the container buffer.
    ///
    /// Calling it again rebuilds the container from scratch.
    pub fn mux(&mut self) -> Result<MuxSummary> {
        self.flush()?;
        self.summary = None;
        let summary = self.muxer.mux(
            self.video.output_mut(),
            self.audio.output_mut(),
            &mut self.container,
        )?;
        self.summary = Some(summary.clone());
        Ok(summary)
    }

    /// Result of the last successful [`mux`](Self::mux).
    pub fn summary(&self) -> Option<&MuxSummary> {
        self.summary.as_ref()
    }

    /// Parses the container produced by [`mux`](Self::mux).
    pub fn probe_container(&mut self) -> Result<MediaInfo> {
        metadata::probe(self.muxer.backend(), &mut self.container)
    }

    pub fn video(&self) -> &VideoEncodePipeline {
        &self.video
    }

    pub fn audio(&self) -> &AudioEncodePipeline {
        &self.audio
    }

    /// Raw video elementary stream.
    pub fn h264_bytes(&self) -> Bytes {
        self.video.output().to_bytes()
    }

    /// ADTS-framed audio elementary stream.
    pub fn aac_bytes(&self) -> Bytes {
        self.audio.output().to_bytes()
    }

    /// Empty until [`mux`](Self::mux) succeeds.
    pub fn container_bytes(&self) -> Bytes {
        self.container.to_bytes()
    }
}

#[cfg(feature = "ffmpeg")]
impl MemoryWriter<crate::ffmpeg::FfmpegBackend> {
    /// Opens the FFmpeg encoders described by `settings`.
    pub fn new(settings: WriterSettings) -> Result<Self> {
        use crate::ffmpeg::{FfmpegAudioEncoder, FfmpegBackend, FfmpegVideoEncoder, SwsConverter};

        settings.validate()?;
        crate::ffmpeg::init()?;
        let video_encoder = FfmpegVideoEncoder::open(&settings)?;
        let converter = SwsConverter::new(settings.video.width, settings.video.height);
        let audio_encoder = FfmpegAudioEncoder::open(&settings)?;
        log::info!(
            "memory writer ready: {} {}x{} @ {} fps, {} {} Hz x{}, container {}",
            settings.video.codec,
            settings.video.width,
            settings.video.height,
            settings.frame_rate,
            settings.audio.codec,
            settings.audio.sample_rate,
            settings.audio.channels,
            settings.mux.format
        );
        Self::with_parts(
            settings,
            Box::new(video_encoder),
            Box::new(converter),
            Box::new(audio_encoder),
            FfmpegBackend,
        )
    }

    pub fn with_frame_rate(frame_rate: u32) -> Result<Self> {
        let settings = WriterSettings::builder().frame_rate(frame_rate).build()?;
        Self::new(settings)
    }

    pub fn with_frame_size(frame_rate: u32, width: u32, height: u32) -> Result<Self> {
        let settings = WriterSettings::builder()
            .frame_rate(frame_rate)
            .frame_size(width, height)
            .build()?;
        Self::new(settings)
    }
}

#[cfg(test)]
#[path = "writer_test.rs"]
mod writer_test;
