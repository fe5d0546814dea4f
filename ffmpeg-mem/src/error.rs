use thiserror::Error;

use crate::stream::{SourceKind, TrackKind};

/// Failures reported by the encode pipelines, the muxer and the buffers they own.
///
/// Backend failures are carried as opaque `anyhow::Error` sources; nothing in this crate
/// inspects them beyond the fact that the backend call failed.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to grow buffer to {requested} bytes")]
    Allocation { requested: usize },

    #[error("failed to open {kind} codec {codec}")]
    CodecInit {
        kind: TrackKind,
        codec: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("{kind} encoder failed")]
    Encode {
        kind: TrackKind,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to parse {kind}")]
    Parse {
        kind: SourceKind,
        #[source]
        source: anyhow::Error,
    },

    #[error("no {0} stream found in input")]
    StreamNotFound(TrackKind),

    #[error("failed to write container")]
    Write {
        #[source]
        source: anyhow::Error,
    },

    #[error("ADTS payload of {0} bytes exceeds the 13-bit frame length field")]
    PayloadTooLarge(usize),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("codec backend unavailable")]
    Backend(#[source] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn encode(kind: TrackKind, source: impl Into<anyhow::Error>) -> Self {
        Error::Encode {
            kind,
            source: source.into(),
        }
    }

    pub(crate) fn parse(kind: SourceKind, source: impl Into<anyhow::Error>) -> Self {
        Error::Parse {
            kind,
            source: source.into(),
        }
    }

    pub(crate) fn write(source: impl Into<anyhow::Error>) -> Self {
        Error::Write {
            source: source.into(),
        }
    }
}
