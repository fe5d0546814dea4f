use std::path::{Path, PathBuf};
use std::time::Instant;

use ffmpeg_mem::{MemoryWriter, PixelLayout, VideoFrame};

mod config;

/// Number of slices the PCM file is fed in, to exercise partial-block staging.
const AUDIO_CHUNKS: usize = 10;

fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .filter_module("ffmpeg_mem", log::LevelFilter::Info)
        .filter_module("memwriter", log::LevelFilter::Debug)
        .init();
}

fn png_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_png = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
        if is_png {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn load_frame(path: &Path) -> anyhow::Result<VideoFrame> {
    let image = image::open(path)
        .map_err(|e| anyhow::anyhow!("decode {}: {}", path.display(), e))?
        .to_rgb8();
    let (width, height) = image.dimensions();
    Ok(VideoFrame::new(image.into_raw(), width, height, PixelLayout::Rgb24)?)
}

fn write_output(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    std::fs::write(path, data).map_err(|e| anyhow::anyhow!("write {}: {}", path.display(), e))?;
    log::info!("wrote {} ({} bytes)", path.display(), data.len());
    Ok(())
}

fn run() -> anyhow::Result<()> {
    let config = config::config();
    let settings = config.writer_settings()?;
    let mut writer = MemoryWriter::new(settings)?;

    let images = png_files(config.png_dir())?;
    if images.is_empty() {
        log::warn!("no png files in {}", config.png_dir().display());
    }
    let start = Instant::now();
    for path in &images {
        writer.input_image(&load_frame(path)?)?;
    }
    log::info!("encoded {} frames in {:?}", images.len(), start.elapsed());

    let pcm = std::fs::read(config.pcm_file())
        .map_err(|e| anyhow::anyhow!("read {}: {}", config.pcm_file().display(), e))?;
    let start = Instant::now();
    for chunk in pcm.chunks(pcm.len().div_ceil(AUDIO_CHUNKS).max(1)) {
        writer.input_audio(chunk)?;
    }
    log::info!("encoded {} bytes of pcm in {:?}", pcm.len(), start.elapsed());

    let start = Instant::now();
    let summary = writer.mux()?;
    log::info!(
        "muxed {} video and {} audio packets into {} bytes in {:?}",
        summary.video_packets,
        summary.audio_packets,
        summary.bytes,
        start.elapsed()
    );
    log::debug!("{}", writer.probe_container()?);

    write_output(&config.output_path("h264"), &writer.h264_bytes())?;
    write_output(&config.output_path("aac"), &writer.aac_bytes())?;
    write_output(
        &config.output_path(&writer.settings().mux.format),
        &writer.container_bytes(),
    )?;
    Ok(())
}

fn main() {
    init_logging();
    if let Err(e) = run() {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}
