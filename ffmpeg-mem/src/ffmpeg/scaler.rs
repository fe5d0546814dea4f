use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::scaling;

use crate::encoder::PixelConverter;
use crate::frame::{PixelLayout, PlanarImage, VideoFrame};

/// Converts packed RGB/BGR frames to YUV 4:2:0 at the encoder's size with libswscale.
///
/// The scaling context is rebuilt whenever the source layout or size changes.
pub struct SwsConverter {
    width: u32,
    height: u32,
    context: Option<((Pixel, u32, u32), scaling::Context)>,
}

impl SwsConverter {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            context: None,
        }
    }

    fn context(&mut self, key: (Pixel, u32, u32)) -> anyhow::Result<&mut scaling::Context> {
        if self.context.as_ref().is_none_or(|(cached, _)| *cached != key) {
            let (format, width, height) = key;
            log::debug!(
                "scaler {:?} {}x{} -> yuv420p {}x{}",
                format,
                width,
                height,
                self.width,
                self.height
            );
            let context = scaling::Context::get(
                format,
                width,
                height,
                Pixel::YUV420P,
                self.width,
                self.height,
                scaling::Flags::BILINEAR,
            )?;
            self.context = Some((key, context));
        }
        match self.context.as_mut() {
            Some((_, context)) => Ok(context),
            None => anyhow::bail!("scaler context missing"),
        }
    }
}

impl PixelConverter for SwsConverter {
    fn convert(&mut self, frame: &VideoFrame) -> anyhow::Result<PlanarImage> {
        let format = match frame.layout() {
            PixelLayout::Bgr24 => Pixel::BGR24,
            PixelLayout::Rgb24 => Pixel::RGB24,
        };

        let mut src = ffmpeg_next::frame::Video::new(format, frame.width(), frame.height());
        let row_len = frame.stride();
        let stride = src.stride(0);
        let dst = src.data_mut(0);
        for (row, line) in frame.data().chunks_exact(row_len).enumerate() {
            dst[row * stride..row * stride + row_len].copy_from_slice(line);
        }

        let mut scaled = ffmpeg_next::frame::Video::empty();
        self.context((format, frame.width(), frame.height()))?
            .run(&src, &mut scaled)?;

        let mut picture = PlanarImage::new(self.width, self.height);
        for plane in 0..3 {
            let (width, height) = picture.plane_size(plane);
            let stride = scaled.stride(plane);
            let data = scaled.data(plane);
            let out = picture.plane_mut(plane);
            for row in 0..height {
                out[row * width..(row + 1) * width]
                    .copy_from_slice(&data[row * stride..row * stride + width]);
            }
        }
        Ok(picture)
    }
}
