use crate::adts;
use crate::buffer::GrowableBuffer;
use crate::encoder::{AudioEncoder, drain_packets};
use crate::error::{Error, Result};
use crate::frame::PlanarAudio;
use crate::settings::SampleFormat;
use crate::stream::TrackKind;

/// Encodes interleaved PCM into an ADTS-framed audio elementary stream held in memory.
///
/// PCM is staged until a whole encoder block is available. A tail shorter than one block is
/// never encoded: it is left staged and dropped at flush.
pub struct AudioEncodePipeline {
    encoder: Box<dyn AudioEncoder>,
    sample_format: SampleFormat,
    staging: GrowableBuffer,
    output: GrowableBuffer,
    /// Samples per channel submitted so far, the pts of the next block.
    next_pts: i64,
    packets: usize,
    flushed: bool,
}

impl AudioEncodePipeline {
    pub fn new(encoder: Box<dyn AudioEncoder>, sample_format: SampleFormat) -> Result<Self> {
        if encoder.frame_size() == 0 {
            return Err(Error::InvalidSettings(
                "audio encoder has no fixed frame size".to_string(),
            ));
        }
        if !(1..=adts::MAX_CHANNELS).contains(&encoder.channels()) {
            return Err(Error::InvalidSettings(format!(
                "audio encoder has {} channels",
                encoder.channels()
            )));
        }
        Ok(Self {
            encoder,
            sample_format,
            staging: GrowableBuffer::new(),
            output: GrowableBuffer::new(),
            next_pts: 0,
            packets: 0,
            flushed: false,
        })
    }

    /// Bytes of interleaved PCM that make up one encoder block.
    pub fn block_len(&self) -> usize {
        self.encoder.frame_size()
            * self.encoder.channels() as usize
            * self.sample_format.bytes_per_sample()
    }

    /// Stages `pcm` and encodes every whole block now available. Chunk boundaries are arbitrary.
    pub fn input_audio(&mut self, pcm: &[u8]) -> Result<()> {
        if self.flushed {
            return Err(Error::encode(
                TrackKind::Audio,
                anyhow::anyhow!("audio submitted after flush"),
            ));
        }
        self.staging.append(pcm)?;

        let result = self.encode_staged();
        self.staging.discard_consumed();
        result
    }

    fn encode_staged(&mut self) -> Result<()> {
        let block_len = self.block_len();
        let channels = self.encoder.channels() as usize;
        while self.staging.remaining() >= block_len {
            let block = PlanarAudio::deinterleave(
                &self.staging.unconsumed()[..block_len],
                channels,
                self.sample_format,
            );
            self.encoder
                .send_block(&block, self.next_pts)
                .map_err(|e| Error::encode(TrackKind::Audio, e))?;
            self.staging.consume(block_len);
            self.next_pts += block.samples() as i64;

            self.drain()?;
        }
        Ok(())
    }

    /// Submits end-of-stream and drains the remaining packets. Later calls do nothing.
    pub fn flush(&mut self) -> Result<()> {
        if self.flushed {
            return Ok(());
        }
        if self.staged_len() > 0 {
            log::warn!(
                "dropping {} bytes of PCM shorter than one {} byte block",
                self.staged_len(),
                self.block_len()
            );
        }
        self.encoder
            .send_eof()
            .map_err(|e| Error::encode(TrackKind::Audio, e))?;
        self.flushed = true;

        if !self.drain()? {
            log::warn!("audio encoder asked for input after end of stream");
        }
        log::info!(
            "audio encoder flushed: {} samples, {} packets, {} bytes",
            self.next_pts,
            self.packets,
            self.output.len()
        );
        Ok(())
    }

    fn drain(&mut self) -> Result<bool> {
        let profile = self.encoder.profile();
        let sample_rate = self.encoder.sample_rate();
        let channels = self.encoder.channels() as u8;
        let Self {
            encoder,
            output,
            packets,
            ..
        } = self;
        drain_packets(
            TrackKind::Audio,
            || encoder.receive_packet(),
            |packet| {
                let header = adts::checked_header(profile, sample_rate, channels, packet.size())?;
                output.append(&header)?;
                output.append(&packet.data)?;
                *packets += 1;
                Ok(())
            },
        )
    }

    /// PCM bytes waiting for a complete block. After flush this is what was dropped.
    pub fn staged_len(&self) -> usize {
        self.staging.remaining()
    }

    pub fn samples_submitted(&self) -> i64 {
        self.next_pts
    }

    pub fn packets_written(&self) -> usize {
        self.packets
    }

    pub fn is_flushed(&self) -> bool {
        self.flushed
    }

    pub fn output(&self) -> &GrowableBuffer {
        &self.output
    }

    pub(crate) fn output_mut(&mut self) -> &mut GrowableBuffer {
        &mut self.output
    }
}

#[cfg(test)]
#[path = "audio_test.rs"]
mod audio_test;
