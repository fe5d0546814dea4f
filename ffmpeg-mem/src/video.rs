use crate::buffer::GrowableBuffer;
use crate::encoder::{PixelConverter, VideoEncoder, drain_packets};
use crate::error::{Error, Result};
use crate::frame::VideoFrame;
use crate::stream::TrackKind;

/// Encodes source images into a raw video elementary stream held in memory.
///
/// Only packet payloads are kept. The stream carries no timing; the muxer synthesizes it
/// from the configured frame rate.
pub struct VideoEncodePipeline {
    encoder: Box<dyn VideoEncoder>,
    converter: Box<dyn PixelConverter>,
    output: GrowableBuffer,
    next_pts: i64,
    packets: usize,
    flushed: bool,
}

impl VideoEncodePipeline {
    pub fn new(encoder: Box<dyn VideoEncoder>, converter: Box<dyn PixelConverter>) -> Self {
        Self {
            encoder,
            converter,
            output: GrowableBuffer::new(),
            next_pts: 0,
            packets: 0,
            flushed: false,
        }
    }

    /// Converts, submits and drains one frame. Its pts is the number of frames accepted so far.
    pub fn input_image(&mut self, frame: &VideoFrame) -> Result<()> {
        if self.flushed {
            return Err(Error::encode(
                TrackKind::Video,
                anyhow::anyhow!("frame submitted after flush"),
            ));
        }

        let picture = self
            .converter
            .convert(frame)
            .map_err(|e| Error::encode(TrackKind::Video, e))?;
        self.encoder
            .send_picture(&picture, self.next_pts)
            .map_err(|e| Error::encode(TrackKind::Video, e))?;
        log::debug!("video frame sent with pts {}", self.next_pts);
        self.next_pts += 1;

        self.drain()?;
        Ok(())
    }

    /// Submits end-of-stream and drains the remaining packets. Later calls do nothing.
    pub fn flush(&mut self) -> Result<()> {
        if self.flushed {
            return Ok(());
        }
        self.encoder
            .send_eof()
            .map_err(|e| Error::encode(TrackKind::Video, e))?;
        self.flushed = true;

        if !self.drain()? {
            log::warn!("video encoder asked for input after end of stream");
        }
        log::info!(
            "video encoder flushed: {} frames, {} packets, {} bytes",
            self.next_pts,
            self.packets,
            self.output.len()
        );
        Ok(())
    }

    fn drain(&mut self) -> Result<bool> {
        let Self {
            encoder,
            output,
            packets,
            ..
        } = self;
        drain_packets(
            TrackKind::Video,
            || encoder.receive_packet(),
            |packet| {
                output.append(&packet.data)?;
                *packets += 1;
                Ok(())
            },
        )
    }

    pub fn frames_submitted(&self) -> i64 {
        self.next_pts
    }

    pub fn packets_written(&self) -> usize {
        self.packets
    }

    pub fn is_flushed(&self) -> bool {
        self.flushed
    }

    /// The elementary stream produced so far.
    pub fn output(&self) -> &GrowableBuffer {
        &self.output
    }

    pub(crate) fn output_mut(&mut self) -> &mut GrowableBuffer {
        &mut self.output
    }
}

#[cfg(test)]
#[path = "video_test.rs"]
mod video_test;
