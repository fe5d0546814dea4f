//! In-memory transcode and mux pipeline.
//!
//! Raw images and interleaved PCM go in; an H.264 elementary stream, an ADTS-framed AAC stream
//! and a muxed container come out, all held in growable memory buffers. The pipelines are
//! written against the traits in [`encoder`] and [`muxer`]; the `ffmpeg` feature supplies the
//! libav* implementation.

pub mod adts;
pub mod audio;
pub mod buffer;
pub mod encoder;
pub mod error;
#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;
pub mod frame;
pub mod metadata;
pub mod muxer;
pub mod packet;
pub mod settings;
pub mod stream;
pub mod timebase;
pub mod video;
pub mod writer;

#[cfg(test)]
mod test_support;

pub use audio::AudioEncodePipeline;
pub use buffer::GrowableBuffer;
pub use error::{Error, Result};
pub use frame::{PixelLayout, VideoFrame};
pub use metadata::MediaInfo;
pub use muxer::{MuxSummary, StreamMuxer};
pub use settings::{SampleFormat, WriterSettings};
pub use video::VideoEncodePipeline;
pub use writer::MemoryWriter;
