use std::path::PathBuf;

use beatmap_preview_core::{
    Beatmap, EventSender, ManualClock, PreviewConfig, PreviewEvent, PreviewHost, PreviewSession,
    ProgressBar, RecordingCanvas, RendererRegistry, SimulatedAudio, TextBuffer, TickOutcome,
    TimelineBuilder,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

const PROGRESS_WIDTH: f64 = 1000.0;

fn main() -> beatmap_preview_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Timeline { beatmap, config } => run_timeline(&beatmap, config.as_ref()),
        Commands::Preview {
            beatmap,
            config,
            preview_time,
            frames,
            fps,
            seek_latency,
            scrub,
            scrub_at,
        } => {
            let options = PreviewOptions {
                preview_time,
                frames,
                frame_ms: 1000.0 / fps.max(1.0),
                seek_latency,
                scrub,
                scrub_at,
            };
            run_preview(&beatmap, config.as_ref(), &options)
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> beatmap_preview_core::Result<PreviewConfig> {
    match path {
        Some(path) => PreviewConfig::load(path),
        None => Ok(PreviewConfig::default()),
    }
}

fn run_timeline(path: &PathBuf, config: Option<&PathBuf>) -> beatmap_preview_core::Result<()> {
    let config = load_config(config)?;
    let beatmap = Beatmap::load(path)?;
    let timeline = TimelineBuilder::new(config.playfield.center()).build(
        &beatmap.objects,
        &beatmap.timing_points,
        beatmap.sv,
    )?;
    tracing::info!(
        objects = timeline.objects().len(),
        total_duration = timeline.total_duration(),
        "timeline resolved"
    );
    println!("{}", serde_json::to_string_pretty(&timeline)?);
    Ok(())
}

struct PreviewOptions {
    preview_time: f64,
    frames: u64,
    frame_ms: f64,
    seek_latency: f64,
    scrub: Option<f64>,
    scrub_at: u64,
}

fn run_preview(
    path: &PathBuf,
    config: Option<&PathBuf>,
    options: &PreviewOptions,
) -> beatmap_preview_core::Result<()> {
    let config = load_config(config)?;
    let beatmap = Beatmap::load(path)?;
    tracing::info!(?path, mode = beatmap.mode.id(), "loading preview");

    let wall = ManualClock::new(0.0);
    let audio = SimulatedAudio::new().with_seek_latency(options.seek_latency);
    let progress = ProgressBar::new(0.0, PROGRESS_WIDTH);
    let readout = TextBuffer::new();
    let canvas = RecordingCanvas::new(640.0, 480.0);

    let mut session = PreviewSession::start(
        &beatmap,
        options.preview_time,
        &config,
        &RendererRegistry::default(),
        PreviewHost {
            canvas: Box::new(canvas.clone()),
            readout: Box::new(readout.clone()),
            progress: Box::new(progress.clone()),
            audio: Box::new(audio.clone()),
            wall_clock: Box::new(wall.clone()),
        },
    )?;
    let events = session.events()?;

    let mut last_readout = String::new();
    for frame_index in 0..options.frames {
        if let Some(fraction) = options.scrub {
            if frame_index == options.scrub_at {
                queue(
                    &events,
                    PreviewEvent::PointerDown {
                        client_x: progress.x_at(fraction),
                    },
                )?;
            } else if frame_index == options.scrub_at + 1 {
                queue(&events, PreviewEvent::PointerUp)?;
            }
        }

        wall.advance(options.frame_ms);
        audio.advance(options.frame_ms);
        let frame = match session.tick() {
            TickOutcome::Frame(frame) => frame,
            TickOutcome::Stopped => break,
        };

        let draws = canvas.take_commands().len();
        if frame.readout != last_readout {
            tracing::info!(
                readout = %frame.readout,
                progress = frame.progress,
                phase = ?session.phase(),
                draws,
                "frame"
            );
            last_readout = frame.readout;
        }
    }

    session.stop();
    tracing::info!(
        frames = session.frames(),
        resume_failures = session.resume_failures(),
        readout = %readout.text(),
        "preview finished"
    );
    Ok(())
}

/// Only fatal errors abort the run; a closed session just drops the event.
fn queue(events: &EventSender, event: PreviewEvent) -> beatmap_preview_core::Result<()> {
    match events.send(event) {
        Err(err) if err.is_fatal() => Err(err),
        Err(err) => {
            tracing::warn!(%err, ?event, "event dropped");
            Ok(())
        }
        Ok(()) => Ok(()),
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless audio-synchronised beatmap preview", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve hit object timing and print it as JSON.
    Timeline {
        /// Beatmap JSON file.
        beatmap: PathBuf,
        /// Optional preview configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Run a preview against simulated audio and log the readout.
    Preview {
        /// Beatmap JSON file.
        beatmap: PathBuf,
        /// Optional preview configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Start time in ms. Negative picks a spot inside the map.
        #[arg(long, default_value_t = -1.0, allow_hyphen_values = true)]
        preview_time: f64,
        /// Number of frames to render.
        #[arg(long, default_value_t = 600)]
        frames: u64,
        #[arg(long, default_value_t = 60.0)]
        fps: f64,
        /// Simulated audio seek latency in ms.
        #[arg(long, default_value_t = 30.0)]
        seek_latency: f64,
        /// Scrub to this fraction of the progress bar.
        #[arg(long)]
        scrub: Option<f64>,
        /// Frame at which the scrub gesture starts.
        #[arg(long, default_value_t = 120)]
        scrub_at: u64,
    },
}
