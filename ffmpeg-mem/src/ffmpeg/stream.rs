use ffmpeg_next::codec::Parameters;
use ffmpeg_next::format::stream::Stream;

use crate::packet::EncodedPacket;
use crate::stream::{TrackInfo, TrackKind};
use crate::timebase::Rational;

impl From<ffmpeg_next::Rational> for Rational {
    fn from(value: ffmpeg_next::Rational) -> Self {
        Rational::new(value.numerator(), value.denominator())
    }
}

impl From<Rational> for ffmpeg_next::Rational {
    fn from(value: Rational) -> Self {
        ffmpeg_next::Rational::new(value.numerator(), value.denominator())
    }
}

pub(crate) fn track_info(stream: &Stream<'_>) -> TrackInfo<Parameters> {
    let params = stream.parameters();
    let kind = match params.medium() {
        ffmpeg_next::media::Type::Video => Some(TrackKind::Video),
        ffmpeg_next::media::Type::Audio => Some(TrackKind::Audio),
        _ => None,
    };
    // Width, height, sample rate and channels are not exposed by ffmpeg-next.
    let (width, height, sample_rate, channels) = unsafe {
        let ptr = params.as_ptr();
        match kind {
            Some(TrackKind::Video) => (
                Some((*ptr).width.max(0) as u32),
                Some((*ptr).height.max(0) as u32),
                None,
                None,
            ),
            Some(TrackKind::Audio) => (
                None,
                None,
                Some((*ptr).sample_rate.max(0) as u32),
                Some((*ptr).ch_layout.nb_channels.max(0) as u16),
            ),
            None => (None, None, None, None),
        }
    };
    let frame_rate = stream.avg_frame_rate();

    TrackInfo {
        index: stream.index(),
        kind,
        codec_name: params.id().name().to_string(),
        time_base: stream.time_base().into(),
        frame_rate: (kind == Some(TrackKind::Video) && frame_rate.numerator() > 0)
            .then(|| frame_rate.into()),
        width,
        height,
        sample_rate,
        channels,
        params,
    }
}

impl From<&ffmpeg_next::Packet> for EncodedPacket {
    fn from(packet: &ffmpeg_next::Packet) -> Self {
        Self {
            data: packet
                .data()
                .map(bytes::Bytes::copy_from_slice)
                .unwrap_or_default(),
            pts: packet.pts(),
            dts: packet.dts(),
            duration: packet.duration(),
            is_key: packet.is_key(),
        }
    }
}
