//! Stream-copy muxing of the two elementary streams into one container.
//!
//! Both elementary buffers are re-parsed through a backend demuxer to recover codec
//! parameters and timebases, then their packets are interleaved by presentation time and
//! written, unchanged apart from timing, into a container held in a third buffer.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::buffer::{GrowableBuffer, ReadSeek, WriteSeek};
use crate::error::{Error, Result};
use crate::packet::EncodedPacket;
use crate::settings::{MuxSettings, WriterSettings};
use crate::stream::{SourceKind, TrackInfo, TrackKind};
use crate::timebase::{Rational, compare_ts, rescale};

/// A parsed input. `P` is the backend's codec parameter type.
pub trait Demuxer<P> {
    fn format_name(&self) -> &str;
    fn tracks(&self) -> &[TrackInfo<P>];
    /// Next packet in stream order with the index of its track, `None` at end of input.
    fn read_packet(&mut self) -> anyhow::Result<Option<(usize, EncodedPacket)>>;
}

/// An output container being written to a seekable sink.
pub trait ContainerWriter<P> {
    /// Declares a track copying `track`'s codec parameters. Returns the output track index.
    fn add_track(&mut self, track: &TrackInfo<P>, time_base: Rational) -> anyhow::Result<usize>;
    fn write_header(&mut self, options: &BTreeMap<String, String>) -> anyhow::Result<()>;
    /// Timebase of an output track. Only final once the header has been written.
    fn track_time_base(&self, index: usize) -> Option<Rational>;
    /// `packet` timing is already in the output track's timebase.
    fn write_packet(&mut self, index: usize, packet: EncodedPacket) -> anyhow::Result<()>;
    fn write_trailer(&mut self) -> anyhow::Result<()>;
}

/// Codec/container library the muxer runs on.
pub trait MuxBackend {
    type Params: Clone;

    /// Opens `source` for parsing. `format` forces a demuxer, `None` probes.
    fn open_input<'a>(
        &self,
        source: &'a mut dyn ReadSeek,
        format: Option<&str>,
    ) -> anyhow::Result<Box<dyn Demuxer<Self::Params> + 'a>>;

    fn open_output<'a>(
        &self,
        format: &str,
        sink: &'a mut dyn WriteSeek,
    ) -> anyhow::Result<Box<dyn ContainerWriter<Self::Params> + 'a>>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MuxSummary {
    pub video_packets: usize,
    pub audio_packets: usize,
    pub bytes: usize,
}

pub struct StreamMuxer<B: MuxBackend> {
    backend: B,
    video_time_base: Rational,
    audio_time_base: Rational,
    video_format: String,
    audio_format: String,
    mux: MuxSettings,
}

/// One input track being drained into the output, with the next packet already read.
struct TrackCursor<'a, P> {
    kind: TrackKind,
    demuxer: Box<dyn Demuxer<P> + 'a>,
    input_index: usize,
    input_time_base: Rational,
    output_index: usize,
    output_time_base: Rational,
    /// Duration given to packets that arrive without pts, in the input timebase.
    nominal_duration: Option<i64>,
    /// Frame duration the demuxer assumed when it derived dts, in the input timebase.
    source_frame_duration: Option<i64>,
    pending: Option<EncodedPacket>,
    /// Pts of the pending packet, in the input timebase.
    current_pts: i64,
    read: usize,
    written: usize,
}

impl<'a, P> TrackCursor<'a, P> {
    /// `frame_time_base` is set for tracks whose packets may lack pts.
    fn new(
        kind: TrackKind,
        demuxer: Box<dyn Demuxer<P> + 'a>,
        track: &TrackInfo<P>,
        output_index: usize,
        output_time_base: Rational,
        frame_time_base: Option<Rational>,
    ) -> Self {
        let source_frame_duration = frame_time_base
            .and(track.frame_rate)
            .filter(|rate| rate.is_valid() && rate.numerator() > 0)
            .map(|rate| rescale(1, rate.invert(), track.time_base))
            .filter(|duration| *duration > 0);
        Self {
            kind,
            demuxer,
            input_index: track.index,
            input_time_base: track.time_base,
            output_index,
            output_time_base,
            nominal_duration: frame_time_base.map(|tb| rescale(1, tb, track.time_base)),
            source_frame_duration,
            pending: None,
            current_pts: 0,
            read: 0,
            written: 0,
        }
    }

    /// Moves a demuxer dts onto the configured frame cadence, keeping decode order.
    fn retime_dts(&self, dts: i64, duration: i64) -> i64 {
        match self.source_frame_duration {
            Some(source) if source != duration => {
                let scaled = dts as i128 * duration as i128 / source as i128;
                scaled.clamp(i64::MIN as i128, i64::MAX as i128) as i64
            }
            _ => dts,
        }
    }

    /// Reads the next packet of this track into `pending`, filling in missing timing.
    fn advance(&mut self) -> Result<()> {
        let mut packet = loop {
            let next = self
                .demuxer
                .read_packet()
                .map_err(|e| Error::parse(SourceKind::Elementary(self.kind), e))?;
            match next {
                Some((index, packet)) if index == self.input_index => break packet,
                Some((index, _)) => {
                    log::debug!("skipping packet of {} input track {}", self.kind, index)
                }
                None => {
                    log::debug!("{} input exhausted after {} packets", self.kind, self.read);
                    self.pending = None;
                    return Ok(());
                }
            }
        };

        if let (None, Some(duration)) = (packet.pts, self.nominal_duration) {
            // Raw elementary video has no pts; pictures are numbered in decode order.
            packet.pts = Some((self.read as i64).saturating_mul(duration));
            packet.dts = packet.dts.map(|dts| self.retime_dts(dts, duration));
            packet.duration = duration;
        }
        if packet.dts.is_none() {
            packet.dts = packet.pts;
        }
        if let Some(pts) = packet.pts {
            self.current_pts = pts;
        }
        self.read += 1;
        self.pending = Some(packet);
        Ok(())
    }
}

impl<B: MuxBackend> StreamMuxer<B> {
    pub fn new(backend: B, settings: &WriterSettings) -> Self {
        Self {
            backend,
            video_time_base: settings.video_time_base(),
            audio_time_base: settings.audio_time_base(),
            video_format: settings.video.elementary_format.clone(),
            audio_format: settings.audio.elementary_format.clone(),
            mux: settings.mux.clone(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Muxes the two elementary streams into `output`, replacing its content.
    ///
    /// Both encode pipelines must have been flushed. On failure `output` keeps whatever was
    /// written before the error.
    pub fn mux(
        &self,
        video: &mut GrowableBuffer,
        audio: &mut GrowableBuffer,
        output: &mut GrowableBuffer,
    ) -> Result<MuxSummary> {
        video.rewind();
        audio.rewind();
        output.clear();

        let video_demuxer = self.open_elementary(video, TrackKind::Video, &self.video_format)?;
        let audio_demuxer = self.open_elementary(audio, TrackKind::Audio, &self.audio_format)?;
        let video_track = find_track(video_demuxer.as_ref(), TrackKind::Video)?;
        let audio_track = find_track(audio_demuxer.as_ref(), TrackKind::Audio)?;

        let mut writer = self
            .backend
            .open_output(&self.mux.format, output)
            .map_err(Error::write)?;
        let frame_time_base = self.video_time_base;
        let sample_time_base = audio_track
            .sample_rate
            .map(|rate| Rational::new(1, rate as i32))
            .unwrap_or(self.audio_time_base);
        let video_out = writer
            .add_track(&video_track, frame_time_base)
            .map_err(Error::write)?;
        let audio_out = writer
            .add_track(&audio_track, sample_time_base)
            .map_err(Error::write)?;
        writer
            .write_header(&self.mux.options)
            .map_err(Error::write)?;

        // The container may pick its own timescale while writing the header.
        let mut video_cursor = TrackCursor::new(
            TrackKind::Video,
            video_demuxer,
            &video_track,
            video_out,
            writer.track_time_base(video_out).unwrap_or(frame_time_base),
            Some(frame_time_base),
        );
        let mut audio_cursor = TrackCursor::new(
            TrackKind::Audio,
            audio_demuxer,
            &audio_track,
            audio_out,
            writer.track_time_base(audio_out).unwrap_or(sample_time_base),
            None,
        );
        log::info!(
            "muxing {} ({} -> {}) with {} ({} -> {}) into {}",
            video_track.codec_name,
            video_cursor.input_time_base,
            video_cursor.output_time_base,
            audio_track.codec_name,
            audio_cursor.input_time_base,
            audio_cursor.output_time_base,
            self.mux.format
        );

        video_cursor.advance()?;
        audio_cursor.advance()?;
        loop {
            let has_video = video_cursor.pending.is_some();
            let has_audio = audio_cursor.pending.is_some();
            let cursor = match (has_video, has_audio) {
                (false, false) => break,
                (true, false) => &mut video_cursor,
                (false, true) => &mut audio_cursor,
                (true, true) => {
                    let order = compare_ts(
                        video_cursor.current_pts,
                        video_cursor.input_time_base,
                        audio_cursor.current_pts,
                        audio_cursor.input_time_base,
                    );
                    if order == Ordering::Greater {
                        &mut audio_cursor
                    } else {
                        &mut video_cursor
                    }
                }
            };
            let Some(mut packet) = cursor.pending.take() else {
                break;
            };

            packet.rescale_ts(cursor.input_time_base, cursor.output_time_base);
            log::debug!(
                "write {} packet {}: pts {:?} dts {:?} duration {}",
                cursor.kind,
                cursor.written,
                packet.pts,
                packet.dts,
                packet.duration
            );
            writer
                .write_packet(cursor.output_index, packet)
                .map_err(Error::write)?;
            cursor.written += 1;
            cursor.advance()?;
        }

        writer.write_trailer().map_err(Error::write)?;
        drop(writer);

        let summary = MuxSummary {
            video_packets: video_cursor.written,
            audio_packets: audio_cursor.written,
            bytes: output.len(),
        };
        log::info!(
            "muxed {} video and {} audio packets into {} bytes",
            summary.video_packets,
            summary.audio_packets,
            summary.bytes
        );
        Ok(summary)
    }

    fn open_elementary<'a>(
        &self,
        source: &'a mut GrowableBuffer,
        kind: TrackKind,
        format: &str,
    ) -> Result<Box<dyn Demuxer<B::Params> + 'a>> {
        if source.is_empty() {
            return Err(Error::parse(
                SourceKind::Elementary(kind),
                anyhow::anyhow!("empty input"),
            ));
        }
        self.backend
            .open_input(source, Some(format))
            .map_err(|e| Error::parse(SourceKind::Elementary(kind), e))
    }
}

fn find_track<P: Clone>(demuxer: &dyn Demuxer<P>, kind: TrackKind) -> Result<TrackInfo<P>> {
    demuxer
        .tracks()
        .iter()
        .find(|track| track.kind == Some(kind))
        .cloned()
        .ok_or(Error::StreamNotFound(kind))
}

#[cfg(test)]
#[path = "muxer_test.rs"]
mod muxer_test;
