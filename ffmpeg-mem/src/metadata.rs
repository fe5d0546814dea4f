//! In-memory media probe (similar to ffprobe with `-count_packets -show_entries packet=pts`).

use std::fmt;

use crate::buffer::GrowableBuffer;
use crate::error::{Error, Result};
use crate::muxer::MuxBackend;
use crate::stream::{SourceKind, TrackKind};
use crate::timebase::Rational;

/// Per-stream info plus what was seen while reading every packet.
#[derive(Debug, Clone)]
pub struct StreamInfo {
    pub index: usize,
    pub kind: Option<TrackKind>,
    /// Codec name, e.g. "h264", "aac"
    pub codec_name: String,
    pub time_base: Rational,
    pub frame_rate: Option<Rational>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
    pub packets: usize,
    /// Packet pts in read order, `None` where the demuxer had none.
    pub pts: Vec<Option<i64>>,
}

impl StreamInfo {
    /// Presentation times in seconds, in read order, skipping packets without pts.
    pub fn pts_seconds(&self) -> Vec<f64> {
        self.pts
            .iter()
            .flatten()
            .map(|&pts| pts as f64 * self.time_base.as_f64())
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct MediaInfo {
    /// Demuxer name, e.g. "mov,mp4,m4a,3gp,3g2,mj2"
    pub format_name: String,
    pub streams: Vec<StreamInfo>,
    /// Every packet's stream index and pts in seconds, in file order.
    pub interleaving: Vec<(usize, Option<f64>)>,
}

impl MediaInfo {
    pub fn stream(&self, kind: TrackKind) -> Option<&StreamInfo> {
        self.streams.iter().find(|s| s.kind == Some(kind))
    }
}

impl fmt::Display for MediaInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[FORMAT]")?;
        writeln!(f, "format_name={}", self.format_name)?;
        writeln!(f, "nb_streams={}", self.streams.len())?;
        writeln!(f, "[/FORMAT]")?;
        for s in &self.streams {
            writeln!(f, "[STREAM]")?;
            writeln!(f, "index={}", s.index)?;
            match s.kind {
                Some(kind) => writeln!(f, "codec_type={}", kind)?,
                None => writeln!(f, "codec_type=unknown")?,
            }
            writeln!(f, "codec_name={}", s.codec_name)?;
            writeln!(f, "time_base={}", s.time_base)?;
            if let Some(rate) = s.frame_rate {
                writeln!(f, "r_frame_rate={}", rate)?;
            }
            if let (Some(w), Some(h)) = (s.width, s.height) {
                writeln!(f, "width={}", w)?;
                writeln!(f, "height={}", h)?;
            }
            if let Some(sr) = s.sample_rate {
                writeln!(f, "sample_rate={}", sr)?;
            }
            if let Some(c) = s.channels {
                writeln!(f, "channels={}", c)?;
            }
            writeln!(f, "nb_read_packets={}", s.packets)?;
            writeln!(f, "[/STREAM]")?;
        }
        Ok(())
    }
}

/// Parses `buffer` as any container the backend can probe and reads all of its packets.
///
/// The buffer's cursor is rewound first and left at the end.
pub fn probe<B: MuxBackend>(backend: &B, buffer: &mut GrowableBuffer) -> Result<MediaInfo> {
    buffer.rewind();
    let mut demuxer = backend
        .open_input(buffer, None)
        .map_err(|e| Error::parse(SourceKind::Container, e))?;

    let mut streams: Vec<StreamInfo> = demuxer
        .tracks()
        .iter()
        .map(|t| StreamInfo {
            index: t.index,
            kind: t.kind,
            codec_name: t.codec_name.clone(),
            time_base: t.time_base,
            frame_rate: t.frame_rate,
            width: t.width,
            height: t.height,
            sample_rate: t.sample_rate,
            channels: t.channels,
            packets: 0,
            pts: Vec::new(),
        })
        .collect();
    let format_name = demuxer.format_name().to_string();

    let mut interleaving = Vec::new();
    while let Some((index, packet)) = demuxer
        .read_packet()
        .map_err(|e| Error::parse(SourceKind::Container, e))?
    {
        let Some(stream) = streams.iter_mut().find(|s| s.index == index) else {
            continue;
        };
        stream.packets += 1;
        stream.pts.push(packet.pts);
        interleaving.push((
            index,
            packet.pts.map(|pts| pts as f64 * stream.time_base.as_f64()),
        ));
    }

    log::debug!(
        "probed {}: {} streams, {} packets",
        format_name,
        streams.len(),
        interleaving.len()
    );
    Ok(MediaInfo {
        format_name,
        streams,
        interleaving,
    })
}
