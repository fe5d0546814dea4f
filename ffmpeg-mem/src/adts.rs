//! ADTS framing for raw AAC units.
//!
//! Each compressed unit is prefixed with a 7-byte header (no CRC) so the audio elementary
//! stream can be parsed without a container.

use crate::error::{Error, Result};

pub const HEADER_LEN: usize = 7;

/// Largest value of the 13-bit frame length field, header included.
pub const MAX_FRAME_LEN: usize = 0x1FFF;

/// AAC LC as written in the profile field.
pub const PROFILE_LC: u8 = 1;

/// Highest channel configuration written. 7 would mean 7.1 (eight channels).
pub const MAX_CHANNELS: u16 = 6;

const SAMPLING_FREQUENCIES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

const DEFAULT_FREQUENCY_INDEX: u8 = 4;

/// Sampling frequency index for `sample_rate`; unknown rates map to 44100 Hz.
pub fn frequency_index(sample_rate: u32) -> u8 {
    SAMPLING_FREQUENCIES
        .iter()
        .position(|&rate| rate == sample_rate)
        .map(|idx| idx as u8)
        .unwrap_or(DEFAULT_FREQUENCY_INDEX)
}

/// Header for an AAC LC unit of `payload_len` bytes.
pub fn header(sample_rate: u32, channels: u8, payload_len: usize) -> [u8; HEADER_LEN] {
    header_with_profile(PROFILE_LC, sample_rate, channels, payload_len)
}

/// Like [`header`] but with an explicit profile field. Frame lengths above
/// [`MAX_FRAME_LEN`] are truncated to 13 bits; use [`checked_header`] to reject them.
pub fn header_with_profile(
    profile: u8,
    sample_rate: u32,
    channels: u8,
    payload_len: usize,
) -> [u8; HEADER_LEN] {
    let freq_idx = frequency_index(sample_rate);
    let frame_len = (payload_len + HEADER_LEN) as u32;

    [
        0xFF,
        0xF1,
        ((profile & 0x3) << 6) | (freq_idx << 2) | ((channels >> 2) & 0x1),
        ((channels & 0x3) << 6) | ((frame_len >> 11) & 0x3) as u8,
        ((frame_len & 0x7FF) >> 3) as u8,
        (((frame_len & 0x7) << 5) as u8) | 0x1F,
        0xFC,
    ]
}

pub fn checked_header(
    profile: u8,
    sample_rate: u32,
    channels: u8,
    payload_len: usize,
) -> Result<[u8; HEADER_LEN]> {
    if payload_len + HEADER_LEN > MAX_FRAME_LEN {
        return Err(Error::PayloadTooLarge(payload_len));
    }
    Ok(header_with_profile(profile, sample_rate, channels, payload_len))
}

/// Fields recovered from an ADTS header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdtsHeader {
    pub profile: u8,
    pub sample_rate: u32,
    pub channels: u8,
    /// Header plus payload.
    pub frame_len: usize,
}

impl AdtsHeader {
    pub fn payload_len(&self) -> usize {
        self.frame_len.saturating_sub(HEADER_LEN)
    }
}

/// Parses the header at the start of `data`, `None` when there is no valid sync word.
pub fn parse_header(data: &[u8]) -> Option<AdtsHeader> {
    if data.len() < HEADER_LEN || data[0] != 0xFF || data[1] & 0xF0 != 0xF0 {
        return None;
    }
    let freq_idx = ((data[2] >> 2) & 0xF) as usize;
    let frame_len = (((data[3] & 0x3) as usize) << 11)
        | ((data[4] as usize) << 3)
        | ((data[5] >> 5) as usize);
    if frame_len < HEADER_LEN {
        return None;
    }
    Some(AdtsHeader {
        profile: data[2] >> 6,
        sample_rate: *SAMPLING_FREQUENCIES.get(freq_idx)?,
        channels: ((data[2] & 0x1) << 2) | (data[3] >> 6),
        frame_len,
    })
}

/// Iterates the whole frames (header included) of a self-framed stream, stopping at the first
/// malformed or truncated frame.
pub fn frames(data: &[u8]) -> Frames<'_> {
    Frames { data }
}

pub struct Frames<'a> {
    data: &'a [u8],
}

impl<'a> Iterator for Frames<'a> {
    type Item = (AdtsHeader, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let header = parse_header(self.data)?;
        if header.frame_len > self.data.len() {
            return None;
        }
        let (frame, rest) = self.data.split_at(header.frame_len);
        self.data = rest;
        Some((header, frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_fixture_44100_stereo() {
        let bytes = header(44100, 2, 100);
        assert_eq!(frequency_index(44100), 4);
        assert_eq!(bytes, [0xFF, 0xF1, 0x50, 0x80, 0x0D, 0x7F, 0xFC]);

        let parsed = parse_header(&bytes).unwrap();
        assert_eq!(parsed.frame_len, 107);
        assert_eq!(parsed.sample_rate, 44100);
        assert_eq!(parsed.channels, 2);
        assert_eq!(parsed.profile, PROFILE_LC);
    }

    #[test]
    fn frequency_table() {
        assert_eq!(frequency_index(96000), 0);
        assert_eq!(frequency_index(48000), 3);
        assert_eq!(frequency_index(8000), 11);
        assert_eq!(frequency_index(7350), 12);
        assert_eq!(frequency_index(44000), 4);
    }

    #[test]
    fn long_frame_uses_high_length_bits() {
        let bytes = header(48000, 6, 4000);
        let parsed = parse_header(&bytes).unwrap();
        assert_eq!(parsed.frame_len, 4007);
        assert_eq!(parsed.channels, 6);
        assert_eq!(parsed.sample_rate, 48000);
    }

    #[test]
    fn oversized_payload_is_rejected() {
        assert!(checked_header(PROFILE_LC, 44100, 2, MAX_FRAME_LEN - HEADER_LEN).is_ok());
        let err = checked_header(PROFILE_LC, 44100, 2, MAX_FRAME_LEN).unwrap_err();
        assert!(matches!(err, Error::PayloadTooLarge(_)));
    }

    #[test]
    fn frames_walks_a_self_framed_stream() {
        let mut stream = Vec::new();
        for payload in [&b"abc"[..], &b""[..], &b"defgh"[..]] {
            stream.extend_from_slice(&header(22050, 1, payload.len()));
            stream.extend_from_slice(payload);
        }
        stream.extend_from_slice(&[0xFF, 0xF1]);

        let payloads: Vec<&[u8]> = frames(&stream)
            .map(|(_, frame)| &frame[HEADER_LEN..])
            .collect();
        assert_eq!(payloads, vec![&b"abc"[..], &b""[..], &b"defgh"[..]]);
    }
}
