use std::ffi::c_int;
use std::ptr;

use ffmpeg_next::format::{Pixel, Sample, sample};
use ffmpeg_next::{Dictionary, ffi};

use crate::adts;
use crate::encoder::{AudioEncoder, Drain, VideoEncoder};
use crate::error::{Error, Result};
use crate::frame::{PlanarAudio, PlanarImage};
use crate::packet::EncodedPacket;
use crate::settings::WriterSettings;
use crate::stream::TrackKind;

fn receive(encoder: &mut ffmpeg_next::encoder::Encoder) -> anyhow::Result<Drain> {
    let mut packet = ffmpeg_next::Packet::empty();
    match encoder.receive_packet(&mut packet) {
        Ok(()) => Ok(Drain::Packet(EncodedPacket::from(&packet))),
        Err(ffmpeg_next::Error::Other { errno }) if errno == ffmpeg_next::util::error::EAGAIN => {
            Ok(Drain::NeedInput)
        }
        Err(ffmpeg_next::Error::Eof) => Ok(Drain::Finished),
        Err(err) => Err(err.into()),
    }
}

fn find_codec(kind: TrackKind, name: &str) -> Result<ffmpeg_next::Codec> {
    ffmpeg_next::encoder::find_by_name(name).ok_or_else(|| Error::CodecInit {
        kind,
        codec: name.to_string(),
        source: anyhow::anyhow!("codec not found: {}", name),
    })
}

/// Video encoder taking YUV 4:2:0 pictures, usually libx264.
pub struct FfmpegVideoEncoder {
    inner: ffmpeg_next::encoder::Video,
}

impl FfmpegVideoEncoder {
    pub fn open(settings: &WriterSettings) -> Result<Self> {
        let video = &settings.video;
        let codec = find_codec(TrackKind::Video, &video.codec)?;
        let init_err = |source: anyhow::Error| Error::CodecInit {
            kind: TrackKind::Video,
            codec: video.codec.clone(),
            source,
        };

        let context = ffmpeg_next::codec::Context::new_with_codec(codec);
        let mut encoder = context.encoder().video().map_err(|e| init_err(e.into()))?;
        encoder.set_width(video.width);
        encoder.set_height(video.height);
        encoder.set_format(Pixel::YUV420P);
        let time_base = settings.video_time_base();
        encoder.set_time_base(time_base);
        encoder.set_frame_rate(Some(time_base.invert()));
        encoder.set_bit_rate(video.bit_rate);
        encoder.set_gop(video.gop_size);
        encoder.set_max_b_frames(video.max_b_frames);

        let mut opts = Dictionary::new();
        if let Some(preset) = &video.preset {
            opts.set("preset", preset);
        }
        if let Some(profile) = &video.profile {
            opts.set("profile", profile);
        }
        let inner = encoder.open_with(opts).map_err(|e| init_err(e.into()))?;
        log::info!(
            "video encoder opened: {} {}x{} gop {} b-frames {}",
            video.codec,
            video.width,
            video.height,
            video.gop_size,
            video.max_b_frames
        );
        Ok(Self { inner })
    }
}

impl VideoEncoder for FfmpegVideoEncoder {
    fn send_picture(&mut self, picture: &PlanarImage, pts: i64) -> anyhow::Result<()> {
        let mut frame =
            ffmpeg_next::frame::Video::new(Pixel::YUV420P, picture.width(), picture.height());
        for plane in 0..3 {
            let (width, height) = picture.plane_size(plane);
            let stride = frame.stride(plane);
            let src = picture.plane(plane);
            let dst = frame.data_mut(plane);
            for row in 0..height {
                dst[row * stride..row * stride + width]
                    .copy_from_slice(&src[row * width..(row + 1) * width]);
            }
        }
        frame.set_pts(Some(pts));
        self.inner.send_frame(&frame)?;
        Ok(())
    }

    fn send_eof(&mut self) -> anyhow::Result<()> {
        self.inner.send_eof()?;
        Ok(())
    }

    fn receive_packet(&mut self) -> anyhow::Result<Drain> {
        receive(&mut self.inner)
    }
}

/// Audio encoder taking planar `f32` blocks, usually the native AAC encoder.
pub struct FfmpegAudioEncoder {
    inner: ffmpeg_next::encoder::Audio,
    frame_size: usize,
    sample_rate: u32,
    channels: u16,
}

impl FfmpegAudioEncoder {
    pub fn open(settings: &WriterSettings) -> Result<Self> {
        let audio = &settings.audio;
        let codec = find_codec(TrackKind::Audio, &audio.codec)?;
        let init_err = |source: anyhow::Error| Error::CodecInit {
            kind: TrackKind::Audio,
            codec: audio.codec.clone(),
            source,
        };

        let context = ffmpeg_next::codec::Context::new_with_codec(codec);
        let mut encoder = context.encoder().audio().map_err(|e| init_err(e.into()))?;
        encoder.set_rate(audio.sample_rate as i32);
        encoder.set_format(Sample::F32(sample::Type::Planar));
        encoder.set_bit_rate(audio.bit_rate);
        encoder.set_time_base(settings.audio_time_base());
        unsafe {
            let ctx = encoder.as_mut_ptr();
            ffi::av_channel_layout_uninit(&mut (*ctx).ch_layout);
            ffi::av_channel_layout_default(&mut (*ctx).ch_layout, audio.channels as c_int);
        }
        let inner = encoder.open().map_err(|e| init_err(e.into()))?;

        let frame_size = inner.frame_size() as usize;
        log::info!(
            "audio encoder opened: {} {} Hz x{} frame size {}",
            audio.codec,
            audio.sample_rate,
            audio.channels,
            frame_size
        );
        Ok(Self {
            inner,
            frame_size,
            sample_rate: audio.sample_rate,
            channels: audio.channels,
        })
    }
}

impl AudioEncoder for FfmpegAudioEncoder {
    fn frame_size(&self) -> usize {
        self.frame_size
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn profile(&self) -> u8 {
        let profile = unsafe { (*self.inner.as_ptr()).profile };
        u8::try_from(profile).unwrap_or(adts::PROFILE_LC)
    }

    fn send_block(&mut self, block: &PlanarAudio, pts: i64) -> anyhow::Result<()> {
        if block.channels() != self.channels as usize {
            anyhow::bail!(
                "block has {} channels, encoder expects {}",
                block.channels(),
                self.channels
            );
        }

        let mut frame = ffmpeg_next::frame::Audio::empty();
        unsafe {
            let raw = frame.as_mut_ptr();
            let ctx = self.inner.as_ptr();
            (*raw).format = ffi::AVSampleFormat::AV_SAMPLE_FMT_FLTP as c_int;
            (*raw).nb_samples = block.samples() as c_int;
            (*raw).sample_rate = self.sample_rate as c_int;
            let ret = ffi::av_channel_layout_copy(&mut (*raw).ch_layout, &(*ctx).ch_layout);
            if ret < 0 {
                return Err(ffmpeg_next::Error::from(ret).into());
            }
            let ret = ffi::av_frame_get_buffer(raw, 0);
            if ret < 0 {
                return Err(ffmpeg_next::Error::from(ret).into());
            }
            for channel in 0..block.channels() {
                let src = block.plane(channel);
                let dst = *(*raw).extended_data.add(channel) as *mut f32;
                ptr::copy_nonoverlapping(src.as_ptr(), dst, src.len());
            }
        }
        frame.set_pts(Some(pts));
        self.inner.send_frame(&frame)?;
        Ok(())
    }

    fn send_eof(&mut self) -> anyhow::Result<()> {
        self.inner.send_eof()?;
        Ok(())
    }

    fn receive_packet(&mut self) -> anyhow::Result<Drain> {
        receive(&mut self.inner)
    }
}
