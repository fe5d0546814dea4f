use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use clap::Parser;
use ffmpeg_mem::WriterSettings;

/// Encodes a directory of PNG frames and a raw PCM file in memory, then writes
/// the elementary streams and the muxed container next to `output_stem`.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
pub struct Args {
    /// Directory of PNG frames, encoded in file name order
    png_dir: PathBuf,
    /// Interleaved PCM matching the audio settings
    pcm_file: PathBuf,
    /// Output path without extension
    #[clap(default_value = "output")]
    output_stem: PathBuf,
    /// JSON writer settings; defaults are used when absent
    settings: Option<PathBuf>,
}

impl Args {
    pub fn png_dir(&self) -> &Path {
        &self.png_dir
    }

    pub fn pcm_file(&self) -> &Path {
        &self.pcm_file
    }

    pub fn output_path(&self, extension: &str) -> PathBuf {
        self.output_stem.with_extension(extension)
    }

    /// Defaults, or the JSON settings file when one was given.
    pub fn writer_settings(&self) -> anyhow::Result<WriterSettings> {
        let Some(path) = &self.settings else {
            return Ok(WriterSettings::default());
        };
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("read {}: {}", path.display(), e))?;
        let settings: WriterSettings = serde_json::from_str(&text)?;
        settings.validate()?;
        Ok(settings)
    }
}

pub fn config() -> &'static Args {
    static CONFIG: LazyLock<Args> = LazyLock::new(Args::parse);
    &CONFIG
}
