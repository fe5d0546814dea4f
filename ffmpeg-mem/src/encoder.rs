//! Encoder seam shared by the two encode pipelines.
//!
//! Encoders follow the send/receive protocol: submit one unit of input, then receive packets
//! until the encoder asks for more input. After end-of-stream has been submitted, receiving
//! continues until the encoder reports it is finished.

use crate::error::{Error, Result};
use crate::frame::{PlanarAudio, PlanarImage, VideoFrame};
use crate::packet::EncodedPacket;
use crate::stream::TrackKind;

/// Outcome of one receive call.
#[derive(Debug)]
pub enum Drain {
    Packet(EncodedPacket),
    /// Nothing buffered; submit more input.
    NeedInput,
    /// End-of-stream was submitted and every packet has been handed out.
    Finished,
}

/// Converts a packed source image to the planar layout the video encoder takes.
pub trait PixelConverter {
    fn convert(&mut self, frame: &VideoFrame) -> anyhow::Result<PlanarImage>;
}

pub trait VideoEncoder {
    fn send_picture(&mut self, picture: &PlanarImage, pts: i64) -> anyhow::Result<()>;
    fn send_eof(&mut self) -> anyhow::Result<()>;
    fn receive_packet(&mut self) -> anyhow::Result<Drain>;
}

pub trait AudioEncoder {
    /// Samples per channel in every block passed to [`send_block`](Self::send_block).
    fn frame_size(&self) -> usize;
    fn sample_rate(&self) -> u32;
    fn channels(&self) -> u16;
    /// Value for the ADTS profile field (object type minus one).
    fn profile(&self) -> u8;
    fn send_block(&mut self, block: &PlanarAudio, pts: i64) -> anyhow::Result<()>;
    fn send_eof(&mut self) -> anyhow::Result<()>;
    fn receive_packet(&mut self) -> anyhow::Result<Drain>;
}

/// Receives packets until the encoder needs input or is finished.
///
/// Returns `true` when the encoder reported it is finished.
pub(crate) fn drain_packets(
    kind: TrackKind,
    mut receive: impl FnMut() -> anyhow::Result<Drain>,
    mut on_packet: impl FnMut(EncodedPacket) -> Result<()>,
) -> Result<bool> {
    loop {
        match receive().map_err(|e| Error::encode(kind, e))? {
            Drain::Packet(packet) => {
                log::debug!(
                    "{} packet: size {} pts {:?} dts {:?} key {}",
                    kind,
                    packet.size(),
                    packet.pts,
                    packet.dts,
                    packet.is_key
                );
                on_packet(packet)?;
            }
            Drain::NeedInput => return Ok(false),
            Drain::Finished => return Ok(true),
        }
    }
}
