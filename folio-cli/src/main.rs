use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use directories::ProjectDirs;
use folio_core::{
    Annotation, DocumentSource, PixelBuffer, PointF, PointerEvent, PointerKind, RgbaCanvas,
    SizeF, Viewer, ViewerConfig, ViewerEvent,
};
use folio_render::PdfiumEngine;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{prelude::*, EnvFilter};

const BACKGROUND: [u8; 4] = [64, 64, 64, 255];

#[derive(Debug, Parser)]
#[command(
    name = "folio",
    version,
    about = "Render one viewport of a PDF through the folio viewer engine"
)]
struct Args {
    /// PDF file to open
    file: PathBuf,

    /// Page to scroll to (0-based)
    #[arg(short = 'p', long = "page")]
    page: Option<usize>,

    /// Zoom level, centered on the viewport
    #[arg(short = 'z', long = "zoom")]
    zoom: Option<f32>,

    /// Viewport width in pixels
    #[arg(long = "width", default_value_t = 1080)]
    width: u32,

    /// Viewport height in pixels
    #[arg(long = "height", default_value_t = 1920)]
    height: u32,

    /// Where to write the rendered frame
    #[arg(short = 'o', long = "out", default_value = "frame.png")]
    out: PathBuf,

    /// Viewer configuration (TOML); defaults to config.toml in the config directory
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// JSON file with annotations to overlay
    #[arg(short = 'a', long = "annotations")]
    annotations: Option<PathBuf>,

    /// Long-press at X,Y (viewport pixels) to select the word there
    #[arg(short = 's', long = "select", value_parser = parse_point)]
    select: Option<PointF>,

    /// Document password
    #[arg(long = "password")]
    password: Option<String>,

    /// How long to wait for tiles, in seconds
    #[arg(long = "timeout", default_value_t = 30)]
    timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let project_dirs = ProjectDirs::from("net", "folio", "folio")
        .ok_or_else(|| anyhow!("unable to resolve platform data directories"))?;
    let _log_guard = init_logging(&project_dirs)?;
    let config = load_config(args.config.as_deref(), &project_dirs)?;

    let engine = Arc::new(PdfiumEngine::new()?);
    let view_size = SizeF::new(args.width as f32, args.height as f32);
    let mut viewer = Viewer::new(config.clone(), engine, view_size);

    viewer
        .load(DocumentSource::File(args.file.clone()), args.password.clone())
        .await
        .with_context(|| format!("failed to open {:?}", args.file))?;

    if let Some(path) = &args.annotations {
        viewer.set_annotations(read_annotations(path)?);
    }
    if let Some(page) = args.page {
        viewer.jump_to(page, false, 0)?;
    }
    if let Some(zoom) = args.zoom {
        let center = PointF::new(view_size.width / 2.0, view_size.height / 2.0);
        viewer.zoom_centered_to(zoom, center);
    }
    if let Some(point) = args.select {
        long_press(&mut viewer, point, config.gestures.long_press_timeout_ms);
    }

    if !viewer.render_until_idle(Duration::from_secs(args.timeout)) {
        warn!(timeout = args.timeout, "frame incomplete, some tiles are still pending");
    }
    report_events(&viewer);

    let mut canvas = RgbaCanvas::new(args.width, args.height, BACKGROUND);
    viewer.compose_frame(&mut canvas);
    write_png(&args.out, canvas.buffer())?;
    info!(path = ?args.out, page = viewer.current_page(), "frame written");

    if let Some(text) = viewer.selected_text() {
        println!("{text}");
    }
    Ok(())
}

fn init_logging(project_dirs: &ProjectDirs) -> Result<WorkerGuard> {
    let log_dir = project_dirs.data_local_dir().join("logs");
    fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::never(log_dir, "folio.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer);
    let console_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|err| anyhow!(err))?;

    Ok(guard)
}

fn load_config(explicit: Option<&Path>, project_dirs: &ProjectDirs) -> Result<ViewerConfig> {
    let default_path = project_dirs.config_dir().join("config.toml");
    let config = match explicit {
        Some(path) => ViewerConfig::load(path)?,
        None if default_path.exists() => ViewerConfig::load(&default_path)?,
        None => ViewerConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn read_annotations(path: &Path) -> Result<Vec<Annotation>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read annotations {:?}", path))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to decode annotations {:?}", path))
}

fn parse_point(raw: &str) -> Result<PointF, String> {
    let (x, y) = raw
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y but got {raw:?}"))?;
    let x = x.trim().parse::<f32>().map_err(|err| err.to_string())?;
    let y = y.trim().parse::<f32>().map_err(|err| err.to_string())?;
    Ok(PointF::new(x, y))
}

/// Feeds a press held past the long-press timeout.
fn long_press(viewer: &mut Viewer, point: PointF, timeout_ms: u64) {
    let held = timeout_ms + 1;
    viewer.on_pointer(PointerEvent::new(0, PointerKind::Down, point.x, point.y, 0));
    viewer.tick(held);
    viewer.on_pointer(PointerEvent::new(0, PointerKind::Up, point.x, point.y, held));
}

fn report_events(viewer: &Viewer) {
    for event in viewer.drain_events() {
        match event {
            ViewerEvent::PageError { pagination, error } => {
                warn!(pagination, %error, "page could not be rendered");
            }
            ViewerEvent::PreparationFailed(error) => warn!(%error, "document failed to load"),
            ViewerEvent::TextSelected {
                text, pagination, ..
            } => info!(pagination, chars = text.chars().count(), "text selected"),
            other => info!(event = ?other, "viewer event"),
        }
    }
}

fn write_png(path: &Path, buffer: &PixelBuffer) -> Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create {:?}", path))?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), buffer.width, buffer.height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder
        .write_header()
        .with_context(|| format!("failed to write png header to {:?}", path))?;
    writer
        .write_image_data(&buffer.pixels)
        .with_context(|| format!("failed to write png data to {:?}", path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn points_parse_with_spaces() {
        assert_eq!(parse_point("12, 40.5").unwrap(), PointF::new(12.0, 40.5));
        assert!(parse_point("12").is_err());
        assert!(parse_point("a,b").is_err());
    }

    #[test]
    fn frame_is_written_as_png() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("frame.png");
        let buffer = PixelBuffer::filled(3, 2, [10, 20, 30, 255]);
        write_png(&path, &buffer).unwrap();

        let decoder = png::Decoder::new(File::open(&path).unwrap());
        let mut reader = decoder.read_info().unwrap();
        let mut data = vec![0; reader.output_buffer_size()];
        let info = reader.next_frame(&mut data).unwrap();
        assert_eq!((info.width, info.height), (3, 2));
        assert_eq!(&data[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn annotations_decode_from_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.json");
        let notes = vec![Annotation {
            id: 3,
            pagination: 1,
            start: PointF::new(10.0, 700.0),
            end: PointF::new(80.0, 700.0),
            kind: folio_core::AnnotationKind::Comment {
                text: "check".into(),
            },
        }];
        fs::write(&path, serde_json::to_string(&notes).unwrap()).unwrap();
        assert_eq!(read_annotations(&path).unwrap(), notes);
    }
}
