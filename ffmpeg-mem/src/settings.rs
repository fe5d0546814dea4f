use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::adts;
use crate::error::{Error, Result};
use crate::timebase::Rational;

/// Sample encoding of the interleaved PCM handed to the audio pipeline (little-endian).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    #[default]
    F32,
    S16,
}

impl SampleFormat {
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            SampleFormat::F32 => 4,
            SampleFormat::S16 => 2,
        }
    }

    /// Decodes one sample; `bytes` is exactly [`bytes_per_sample`](Self::bytes_per_sample) long.
    pub(crate) fn decode(&self, bytes: &[u8]) -> f32 {
        match self {
            SampleFormat::F32 => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            SampleFormat::S16 => i16::from_le_bytes([bytes[0], bytes[1]]) as f32 / 32768.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoSettings {
    pub width: u32,
    pub height: u32,
    pub codec: String,
    /// Demuxer used to re-parse the elementary stream.
    pub elementary_format: String,
    pub bit_rate: usize,
    pub gop_size: u32,
    pub max_b_frames: usize,
    pub preset: Option<String>,
    pub profile: Option<String>,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            codec: "libx264".to_string(),
            elementary_format: "h264".to_string(),
            bit_rate: 2_000_000,
            gop_size: 10,
            max_b_frames: 0,
            preset: Some("slow".to_string()),
            profile: Some("high".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    pub codec: String,
    pub elementary_format: String,
    pub bit_rate: usize,
    pub sample_rate: u32,
    pub channels: u16,
    pub sample_format: SampleFormat,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            codec: "aac".to_string(),
            elementary_format: "aac".to_string(),
            bit_rate: 128_000,
            sample_rate: 44100,
            channels: 2,
            sample_format: SampleFormat::F32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MuxSettings {
    pub format: String,
    /// Passed to the container writer when the header is written, e.g. `movflags`.
    pub options: BTreeMap<String, String>,
}

impl Default for MuxSettings {
    fn default() -> Self {
        Self {
            format: "mp4".to_string(),
            options: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterSettings {
    pub frame_rate: u32,
    pub video: VideoSettings,
    pub audio: AudioSettings,
    pub mux: MuxSettings,
}

impl Default for WriterSettings {
    fn default() -> Self {
        Self {
            frame_rate: 25,
            video: VideoSettings::default(),
            audio: AudioSettings::default(),
            mux: MuxSettings::default(),
        }
    }
}

impl WriterSettings {
    pub fn builder() -> WriterSettingsBuilder {
        WriterSettingsBuilder::default()
    }

    /// Encoder and input timebase of the video track.
    pub fn video_time_base(&self) -> Rational {
        Rational::new(1, self.frame_rate as i32)
    }

    pub fn audio_time_base(&self) -> Rational {
        Rational::new(1, self.audio.sample_rate as i32)
    }

    pub fn validate(&self) -> Result<()> {
        if self.frame_rate == 0 || self.frame_rate > i32::MAX as u32 {
            return Err(Error::InvalidSettings(format!(
                "frame rate {} out of range",
                self.frame_rate
            )));
        }
        if self.video.width == 0 || self.video.height == 0 {
            return Err(Error::InvalidSettings(format!(
                "invalid video size {}x{}",
                self.video.width, self.video.height
            )));
        }
        if self.audio.sample_rate == 0 || self.audio.sample_rate > i32::MAX as u32 {
            return Err(Error::InvalidSettings(format!(
                "sample rate {} out of range",
                self.audio.sample_rate
            )));
        }
        if !(1..=adts::MAX_CHANNELS).contains(&self.audio.channels) {
            return Err(Error::InvalidSettings(format!(
                "unsupported channel count {}",
                self.audio.channels
            )));
        }
        for (what, name) in [
            ("video codec", &self.video.codec),
            ("audio codec", &self.audio.codec),
            ("container format", &self.mux.format),
        ] {
            if name.is_empty() {
                return Err(Error::InvalidSettings(format!("{} is empty", what)));
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct WriterSettingsBuilder {
    settings: WriterSettings,
}

impl WriterSettingsBuilder {
    pub fn frame_rate(mut self, fps: u32) -> Self {
        self.settings.frame_rate = fps;
        self
    }

    pub fn frame_size(mut self, width: u32, height: u32) -> Self {
        self.settings.video.width = width;
        self.settings.video.height = height;
        self
    }

    pub fn video_codec(mut self, codec: impl Into<String>) -> Self {
        self.settings.video.codec = codec.into();
        self
    }

    pub fn video_bit_rate(mut self, bit_rate: usize) -> Self {
        self.settings.video.bit_rate = bit_rate;
        self
    }

    pub fn gop_size(mut self, gop_size: u32) -> Self {
        self.settings.video.gop_size = gop_size;
        self
    }

    /// Values above zero reorder pictures. The muxer keeps the demuxer's dts, but raw streams
    /// carry no pts, so muxed pts still follow decode order.
    pub fn max_b_frames(mut self, max_b_frames: usize) -> Self {
        self.settings.video.max_b_frames = max_b_frames;
        self
    }

    pub fn preset(mut self, preset: Option<&str>) -> Self {
        self.settings.video.preset = preset.map(str::to_string);
        self
    }

    pub fn profile(mut self, profile: Option<&str>) -> Self {
        self.settings.video.profile = profile.map(str::to_string);
        self
    }

    pub fn audio_codec(mut self, codec: impl Into<String>) -> Self {
        self.settings.audio.codec = codec.into();
        self
    }

    pub fn audio_bit_rate(mut self, bit_rate: usize) -> Self {
        self.settings.audio.bit_rate = bit_rate;
        self
    }

    pub fn sample_rate(mut self, sample_rate: u32) -> Self {
        self.settings.audio.sample_rate = sample_rate;
        self
    }

    pub fn channels(mut self, channels: u16) -> Self {
        self.settings.audio.channels = channels;
        self
    }

    pub fn sample_format(mut self, format: SampleFormat) -> Self {
        self.settings.audio.sample_format = format;
        self
    }

    pub fn container(mut self, format: impl Into<String>) -> Self {
        self.settings.mux.format = format.into();
        self
    }

    pub fn mux_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.mux.options.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Result<WriterSettings> {
        self.settings.validate()?;
        Ok(self.settings)
    }
}
