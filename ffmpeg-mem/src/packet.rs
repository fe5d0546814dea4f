use bytes::Bytes;

use crate::timebase::{Rational, rescale};

/// A compressed unit with optional timing, in the timebase of whoever produced it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EncodedPacket {
    pub data: Bytes,
    pub pts: Option<i64>,
    pub dts: Option<i64>,
    /// Zero when unknown.
    pub duration: i64,
    pub is_key: bool,
}

impl EncodedPacket {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            ..Default::default()
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn with_pts(mut self, pts: i64) -> Self {
        self.pts = Some(pts);
        self
    }

    /// Moves pts, dts and duration from `from` ticks to `to` ticks.
    pub fn rescale_ts(&mut self, from: Rational, to: Rational) {
        self.pts = self.pts.map(|pts| rescale(pts, from, to));
        self.dts = self.dts.map(|dts| rescale(dts, from, to));
        self.duration = rescale(self.duration, from, to);
    }
}
