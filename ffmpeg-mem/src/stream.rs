use std::fmt;

use crate::timebase::Rational;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Video,
    Audio,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Video => f.write_str("video"),
            TrackKind::Audio => f.write_str("audio"),
        }
    }
}

/// What a buffer handed to a demuxer is expected to contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// A bare elementary stream of one track kind, e.g. Annex B H.264 or ADTS AAC.
    Elementary(TrackKind),
    /// Any container the backend can probe.
    Container,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Elementary(kind) => write!(f, "{} elementary stream", kind),
            SourceKind::Container => f.write_str("container"),
        }
    }
}

/// Track metadata recovered by a demuxer.
///
/// `params` holds the backend's own codec parameters so a container writer can copy them
/// verbatim; the muxer never looks inside.
#[derive(Debug, Clone)]
pub struct TrackInfo<P> {
    pub index: usize,
    pub kind: Option<TrackKind>,
    pub codec_name: String,
    pub time_base: Rational,
    /// Nominal frame rate, video only.
    pub frame_rate: Option<Rational>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
    pub params: P,
}

