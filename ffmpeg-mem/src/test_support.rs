//! Codec and container stand-ins for exercising the pipelines and the muxer without FFmpeg.
//!
//! * video "bitstream": one unit per picture, `00 00 00 01 65 <pts|0x80> AA`
//! * audio: ADTS frames whose 4-byte payload is the block pts
//! * container: `FAKEMUX\0`, packet count (patched by the trailer), track table, then
//!   `P` records, closed by `E`

use std::collections::{BTreeMap, VecDeque};
use std::io::{Seek, SeekFrom};

use bytes::Bytes;

use crate::adts;
use crate::buffer::{ReadSeek, WriteSeek};
use crate::encoder::{AudioEncoder, Drain, PixelConverter, VideoEncoder};
use crate::frame::{PixelLayout, PlanarAudio, PlanarImage, VideoFrame};
use crate::muxer::{ContainerWriter, Demuxer, MuxBackend};
use crate::packet::EncodedPacket;
use crate::stream::{TrackInfo, TrackKind};
use crate::timebase::Rational;

pub const START_CODE: [u8; 4] = [0, 0, 0, 1];
const MAGIC: &[u8; 8] = b"FAKEMUX\0";

/// Raw video demuxer timebase, as FFmpeg's h264 demuxer reports it.
pub const RAW_VIDEO_TIME_BASE: Rational = Rational::new(1, 1_200_000);
/// Timescale the fake container switches video tracks to in its header.
pub const CONTAINER_VIDEO_TIME_BASE: Rational = Rational::new(1, 12800);

pub fn solid_frame(width: u32, height: u32, value: u8) -> VideoFrame {
    let data = vec![value; width as usize * height as usize * 3];
    VideoFrame::new(data, width, height, PixelLayout::Bgr24).unwrap()
}

/// `samples` interleaved little-endian f32 sample frames.
pub fn pcm_f32(samples: usize, channels: usize) -> Vec<u8> {
    (0..samples * channels)
        .flat_map(|i| ((i % 100) as f32 / 100.0).to_le_bytes())
        .collect()
}

pub struct FakeConverter {
    pub width: u32,
    pub height: u32,
}

impl PixelConverter for FakeConverter {
    fn convert(&mut self, frame: &VideoFrame) -> anyhow::Result<PlanarImage> {
        let mut image = PlanarImage::new(self.width, self.height);
        let luma = frame.data().first().copied().unwrap_or(0);
        image.plane_mut(0).fill(luma);
        Ok(image)
    }
}

/// Holds `lag` pictures before emitting, like an encoder with lookahead.
#[derive(Default)]
pub struct FakeVideoEncoder {
    pub lag: usize,
    /// Fails the send with this zero-based picture number.
    pub fail_at: Option<usize>,
    queue: VecDeque<i64>,
    sent: usize,
    eof: bool,
}

impl FakeVideoEncoder {
    pub fn with_lag(lag: usize) -> Self {
        Self {
            lag,
            ..Default::default()
        }
    }

    /// Rejects the picture with zero-based number `n`.
    pub fn failing_at(n: usize) -> Self {
        Self {
            fail_at: Some(n),
            ..Default::default()
        }
    }
}

impl VideoEncoder for FakeVideoEncoder {
    fn send_picture(&mut self, _picture: &PlanarImage, pts: i64) -> anyhow::Result<()> {
        if self.eof {
            anyhow::bail!("end of file");
        }
        if self.fail_at == Some(self.sent) {
            anyhow::bail!("invalid argument");
        }
        self.sent += 1;
        self.queue.push_back(pts);
        Ok(())
    }

    fn send_eof(&mut self) -> anyhow::Result<()> {
        if self.eof {
            anyhow::bail!("end of file");
        }
        self.eof = true;
        Ok(())
    }

    fn receive_packet(&mut self) -> anyhow::Result<Drain> {
        if self.queue.len() > self.lag || (self.eof && !self.queue.is_empty()) {
            let Some(pts) = self.queue.pop_front() else {
                return Ok(Drain::NeedInput);
            };
            let mut data = START_CODE.to_vec();
            data.extend_from_slice(&[0x65, (pts as u8 & 0x7F) | 0x80, 0xAA]);
            return Ok(Drain::Packet(EncodedPacket {
                data: Bytes::from(data),
                pts: Some(pts),
                dts: Some(pts),
                duration: 1,
                is_key: pts == 0,
            }));
        }
        if self.eof {
            Ok(Drain::Finished)
        } else {
            Ok(Drain::NeedInput)
        }
    }
}

/// One packet per block, emitted one block late.
pub struct FakeAudioEncoder {
    pub frame_size: usize,
    pub sample_rate: u32,
    pub channels: u16,
    pub fail_at: Option<usize>,
    queue: VecDeque<i64>,
    sent: usize,
    eof: bool,
}

impl FakeAudioEncoder {
    pub fn new(frame_size: usize, sample_rate: u32, channels: u16) -> Self {
        Self {
            frame_size,
            sample_rate,
            channels,
            fail_at: None,
            queue: VecDeque::new(),
            sent: 0,
            eof: false,
        }
    }
}

impl AudioEncoder for FakeAudioEncoder {
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
        adts::PROFILE_LC
    }

    fn send_block(&mut self, block: &PlanarAudio, pts: i64) -> anyhow::Result<()> {
        if self.eof {
            anyhow::bail!("end of file");
        }
        if self.fail_at == Some(self.sent) {
            anyhow::bail!("invalid argument");
        }
        if block.samples() != self.frame_size || block.channels() != self.channels as usize {
            anyhow::bail!(
                "expected {}x{} block, got {}x{}",
                self.frame_size,
                self.channels,
                block.samples(),
                block.channels()
            );
        }
        self.sent += 1;
        self.queue.push_back(pts);
        Ok(())
    }

    fn send_eof(&mut self) -> anyhow::Result<()> {
        if self.eof {
            anyhow::bail!("end of file");
        }
        self.eof = true;
        Ok(())
    }

    fn receive_packet(&mut self) -> anyhow::Result<Drain> {
        if self.queue.len() > 1 || (self.eof && !self.queue.is_empty()) {
            let Some(pts) = self.queue.pop_front() else {
                return Ok(Drain::NeedInput);
            };
            let packet = EncodedPacket::new((pts as u32).to_be_bytes().to_vec()).with_pts(pts);
            return Ok(Drain::Packet(packet));
        }
        if self.eof {
            Ok(Drain::Finished)
        } else {
            Ok(Drain::NeedInput)
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FakeParams {
    pub codec: &'static str,
}

#[derive(Default)]
pub struct FakeBackend {
    /// Fails the output write of this zero-based packet.
    pub fail_write_at: Option<usize>,
}

struct FakeDemuxer {
    format: String,
    tracks: Vec<TrackInfo<FakeParams>>,
    packets: VecDeque<(usize, EncodedPacket)>,
}

impl Demuxer<FakeParams> for FakeDemuxer {
    fn format_name(&self) -> &str {
        &self.format
    }

    fn tracks(&self) -> &[TrackInfo<FakeParams>] {
        &self.tracks
    }

    fn read_packet(&mut self) -> anyhow::Result<Option<(usize, EncodedPacket)>> {
        Ok(self.packets.pop_front())
    }
}

fn track(
    index: usize,
    kind: TrackKind,
    codec: &'static str,
    time_base: Rational,
) -> TrackInfo<FakeParams> {
    TrackInfo {
        index,
        kind: Some(kind),
        codec_name: codec.to_string(),
        time_base,
        frame_rate: None,
        width: None,
        height: None,
        sample_rate: None,
        channels: None,
        params: FakeParams { codec },
    }
}

fn demux_h264(data: &[u8]) -> anyhow::Result<FakeDemuxer> {
    if !data.starts_with(&START_CODE) {
        anyhow::bail!("invalid data found when processing input");
    }
    let mut packets = VecDeque::new();
    let mut start = 0;
    for i in 1..data.len() {
        if data[i..].starts_with(&START_CODE) {
            packets.push_back((0, EncodedPacket::new(data[start..i].to_vec())));
            start = i;
        }
    }
    packets.push_back((0, EncodedPacket::new(data[start..].to_vec())));

    let mut video = track(0, TrackKind::Video, "h264", RAW_VIDEO_TIME_BASE);
    video.frame_rate = Some(Rational::new(25, 1));
    Ok(FakeDemuxer {
        format: "h264".to_string(),
        tracks: vec![video],
        packets,
    })
}

fn demux_adts(data: &[u8]) -> anyhow::Result<FakeDemuxer> {
    let mut packets = VecDeque::new();
    let mut consumed = 0;
    let mut first = None;
    for (header, frame) in adts::frames(data) {
        first.get_or_insert(header);
        let mut packet = EncodedPacket::new(frame[adts::HEADER_LEN..].to_vec())
            .with_pts(packets.len() as i64 * 1024);
        packet.dts = packet.pts;
        packet.duration = 1024;
        packets.push_back((0, packet));
        consumed += frame.len();
    }
    let Some(first) = first else {
        anyhow::bail!("no ADTS frame found");
    };
    if consumed != data.len() {
        anyhow::bail!("trailing garbage after {} bytes", consumed);
    }

    let mut audio = track(
        0,
        TrackKind::Audio,
        "aac",
        Rational::new(1, first.sample_rate as i32),
    );
    audio.sample_rate = Some(first.sample_rate);
    audio.channels = Some(first.channels as u16);
    Ok(FakeDemuxer {
        format: "aac".to_string(),
        tracks: vec![audio],
        packets,
    })
}

struct Cursor<'a> {
    data: &'a [u8],
}

impl Cursor<'_> {
    fn take(&mut self, n: usize) -> anyhow::Result<&[u8]> {
        if self.data.len() < n {
            anyhow::bail!("truncated container");
        }
        let (head, rest) = self.data.split_at(n);
        self.data = rest;
        Ok(head)
    }

    fn u8(&mut self) -> anyhow::Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> anyhow::Result<u32> {
        Ok(u32::from_be_bytes(self.take(4)?.try_into()?))
    }

    fn i32(&mut self) -> anyhow::Result<i32> {
        Ok(i32::from_be_bytes(self.take(4)?.try_into()?))
    }

    fn i64(&mut self) -> anyhow::Result<i64> {
        Ok(i64::from_be_bytes(self.take(8)?.try_into()?))
    }
}

fn demux_container(data: &[u8]) -> anyhow::Result<FakeDemuxer> {
    let mut cursor = Cursor { data };
    if cursor.take(MAGIC.len())? != MAGIC {
        anyhow::bail!("not a fake container");
    }
    let declared = cursor.u32()? as usize;
    let mut tracks = Vec::new();
    for index in 0..cursor.u8()? as usize {
        let (kind, codec) = match cursor.u8()? {
            0 => (TrackKind::Video, "h264"),
            _ => (TrackKind::Audio, "aac"),
        };
        let time_base = Rational::new(cursor.i32()?, cursor.i32()?);
        tracks.push(track(index, kind, codec, time_base));
    }

    let mut packets = VecDeque::new();
    loop {
        match cursor.u8()? {
            b'P' => {
                let index = cursor.u8()? as usize;
                let pts = cursor.i64()?;
                let dts = cursor.i64()?;
                let duration = cursor.i64()?;
                let len = cursor.u32()? as usize;
                let mut packet = EncodedPacket::new(cursor.take(len)?.to_vec()).with_pts(pts);
                packet.dts = Some(dts);
                packet.duration = duration;
                packets.push_back((index, packet));
            }
            b'E' => break,
            tag => anyhow::bail!("unknown record {:#x}", tag),
        }
    }
    if packets.len() != declared {
        anyhow::bail!("trailer declares {} packets, found {}", declared, packets.len());
    }
    Ok(FakeDemuxer {
        format: "fakemux".to_string(),
        tracks,
        packets,
    })
}

struct FakeWriter<'a> {
    sink: &'a mut dyn WriteSeek,
    tracks: Vec<(TrackKind, Rational)>,
    last_dts: Vec<Option<i64>>,
    written: usize,
    fail_at: Option<usize>,
}

impl ContainerWriter<FakeParams> for FakeWriter<'_> {
    fn add_track(
        &mut self,
        track: &TrackInfo<FakeParams>,
        time_base: Rational,
    ) -> anyhow::Result<usize> {
        let kind = track
            .kind
            .ok_or_else(|| anyhow::anyhow!("track {} has no kind", track.index))?;
        self.tracks.push((kind, time_base));
        self.last_dts.push(None);
        Ok(self.tracks.len() - 1)
    }

    fn write_header(&mut self, _options: &BTreeMap<String, String>) -> anyhow::Result<()> {
        self.sink.write_all(MAGIC)?;
        self.sink.write_all(&0u32.to_be_bytes())?;
        self.sink.write_all(&[self.tracks.len() as u8])?;
        for (kind, time_base) in self.tracks.iter_mut() {
            if *kind == TrackKind::Video {
                *time_base = CONTAINER_VIDEO_TIME_BASE;
            }
            self.sink.write_all(&[(*kind == TrackKind::Audio) as u8])?;
            self.sink.write_all(&time_base.numerator().to_be_bytes())?;
            self.sink.write_all(&time_base.denominator().to_be_bytes())?;
        }
        Ok(())
    }

    fn track_time_base(&self, index: usize) -> Option<Rational> {
        self.tracks.get(index).map(|(_, time_base)| *time_base)
    }

    fn write_packet(&mut self, index: usize, packet: EncodedPacket) -> anyhow::Result<()> {
        if self.fail_at == Some(self.written) {
            anyhow::bail!("i/o error");
        }
        let (Some(pts), Some(dts)) = (packet.pts, packet.dts) else {
            anyhow::bail!("packet without timestamps");
        };
        let last = self
            .last_dts
            .get_mut(index)
            .ok_or_else(|| anyhow::anyhow!("no track {}", index))?;
        if last.is_some_and(|last| dts <= last) {
            anyhow::bail!("non-monotonic dts {} on track {}", dts, index);
        }
        *last = Some(dts);

        self.sink.write_all(&[b'P', index as u8])?;
        self.sink.write_all(&pts.to_be_bytes())?;
        self.sink.write_all(&dts.to_be_bytes())?;
        self.sink.write_all(&packet.duration.to_be_bytes())?;
        self.sink.write_all(&(packet.data.len() as u32).to_be_bytes())?;
        self.sink.write_all(&packet.data)?;
        self.written += 1;
        Ok(())
    }

    fn write_trailer(&mut self) -> anyhow::Result<()> {
        self.sink.write_all(b"E")?;
        let end = self.sink.total_len()?;
        self.sink.seek(SeekFrom::Start(MAGIC.len() as u64))?;
        self.sink.write_all(&(self.written as u32).to_be_bytes())?;
        self.sink.seek(SeekFrom::Start(end))?;
        Ok(())
    }
}

impl MuxBackend for FakeBackend {
    type Params = FakeParams;

    fn open_input<'a>(
        &self,
        source: &'a mut dyn ReadSeek,
        format: Option<&str>,
    ) -> anyhow::Result<Box<dyn Demuxer<FakeParams> + 'a>> {
        let mut data = Vec::new();
        source.read_to_end(&mut data)?;
        let demuxer = match format {
            Some("h264") => demux_h264(&data)?,
            Some("aac") => demux_adts(&data)?,
            None => demux_container(&data)?,
            Some(other) => anyhow::bail!("unknown input format {}", other),
        };
        Ok(Box::new(demuxer))
    }

    fn open_output<'a>(
        &self,
        format: &str,
        sink: &'a mut dyn WriteSeek,
    ) -> anyhow::Result<Box<dyn ContainerWriter<FakeParams> + 'a>> {
        if format != "mp4" {
            anyhow::bail!("unknown output format {}", format);
        }
        Ok(Box::new(FakeWriter {
            sink,
            tracks: Vec::new(),
            last_dts: Vec::new(),
            written: 0,
            fail_at: self.fail_write_at,
        }))
    }
}
