use std::fmt::{Display, Formatter};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::settings::SampleFormat;

/// Channel order of a packed 3-channel source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelLayout {
    Bgr24,
    Rgb24,
}

/// A decoded source image: `width * height` packed 3-byte pixels, rows without padding.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    data: Bytes,
    width: u32,
    height: u32,
    layout: PixelLayout,
}

impl VideoFrame {
    pub fn new(data: impl Into<Bytes>, width: u32, height: u32, layout: PixelLayout) -> Result<Self> {
        let data = data.into();
        let expected = width as usize * height as usize * 3;
        if width == 0 || height == 0 {
            return Err(Error::InvalidInput(format!(
                "invalid video size {}x{}",
                width, height
            )));
        }
        if data.len() != expected {
            return Err(Error::InvalidInput(format!(
                "{}x{} frame needs {} bytes, got {}",
                width,
                height,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            data,
            width,
            height,
            layout,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.width as usize * 3
    }
}

impl Display for VideoFrame {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "VideoFrame {}x{} {:?} data_len: {}",
            self.width,
            self.height,
            self.layout,
            self.data.len()
        )
    }
}

/// A YUV 4:2:0 planar picture (I420), each plane tightly packed.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanarImage {
    width: u32,
    height: u32,
    planes: [Vec<u8>; 3],
}

impl PlanarImage {
    /// A black picture of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        let (cw, ch) = chroma_size(width, height);
        Self {
            width,
            height,
            planes: [
                vec![16; width as usize * height as usize],
                vec![128; cw * ch],
                vec![128; cw * ch],
            ],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Width and height of plane `index` in samples.
    pub fn plane_size(&self, index: usize) -> (usize, usize) {
        if index == 0 {
            (self.width as usize, self.height as usize)
        } else {
            chroma_size(self.width, self.height)
        }
    }

    pub fn plane(&self, index: usize) -> &[u8] {
        &self.planes[index]
    }

    pub fn plane_mut(&mut self, index: usize) -> &mut [u8] {
        &mut self.planes[index]
    }
}

fn chroma_size(width: u32, height: u32) -> (usize, usize) {
    (width.div_ceil(2) as usize, height.div_ceil(2) as usize)
}

/// One encoder block of audio, one plane of native-endian `f32` samples per channel.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanarAudio {
    samples: usize,
    planes: Vec<Vec<f32>>,
}

impl PlanarAudio {
    /// Splits interleaved PCM (`s0c0 s0c1 s1c0 ...`) into per-channel planes.
    ///
    /// `interleaved` must hold a whole number of sample frames.
    pub fn deinterleave(interleaved: &[u8], channels: usize, format: SampleFormat) -> Self {
        let width = format.bytes_per_sample();
        let samples = interleaved.len() / (width * channels);
        let mut planes = vec![Vec::with_capacity(samples); channels];
        for frame in interleaved.chunks_exact(width * channels) {
            for (plane, sample) in planes.iter_mut().zip(frame.chunks_exact(width)) {
                plane.push(format.decode(sample));
            }
        }
        Self { samples, planes }
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn channels(&self) -> usize {
        self.planes.len()
    }

    pub fn plane(&self, channel: usize) -> &[f32] {
        &self.planes[channel]
    }
}
