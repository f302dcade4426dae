//! Core library for the beatmap preview.
//!
//! A preview plays a beatmap's audio and draws its hit objects in step with
//! it. The pieces, leaves first: [`TimelineBuilder`] resolves absolute hit
//! object timing, [`PlaybackClock`] turns wall-clock readings into map time
//! while correcting drift against the audio, [`SeekController`] runs the
//! drag-to-seek state machine and [`RenderLoop`] produces one frame per tick.
//! [`PreviewSession`] wires them to host-provided audio and drawing surfaces.

pub mod audio;
pub mod beatmap;
pub mod clock;
pub mod config;
pub mod error;
pub mod render;
pub mod render_loop;
pub mod seek;
pub mod session;
pub mod timeline;

pub use audio::{AudioSource, SimulatedAudio};
pub use beatmap::{Beatmap, HitObject, HitObjectKind, Mode, Pos, TimingPoint};
pub use clock::{ManualClock, MonotonicClock, PlaybackClock, WallClock};
pub use config::{PlayfieldConfig, PreviewConfig};
pub use error::{PreviewError, Result};
pub use render::{
    Canvas, DrawCommand, ManiaRenderer, ProgressBar, ProgressBounds, ProgressIndicator,
    RecordingCanvas, Renderer, RendererRegistry, StandardRenderer, TextBuffer, TextReadout,
};
pub use render_loop::{format_time, Frame, RenderLoop};
pub use seek::{SeekController, SeekPhase};
pub use session::{EventSender, PreviewEvent, PreviewHost, PreviewSession, StopHandle, TickOutcome};
pub use timeline::{TimedHitObject, Timeline, TimelineBuilder};
