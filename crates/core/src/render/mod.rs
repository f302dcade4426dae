//! Drawing-side collaborators of the preview: the canvas, the two UI
//! surfaces updated every frame, and the per-mode renderers.

use std::{cell::RefCell, collections::HashMap, fmt, rc::Rc};

use crate::{
    beatmap::{HitObjectKind, Mode, Pos},
    config::PreviewConfig,
    timeline::Timeline,
    PreviewError, Result,
};

/// 2D drawing surface. Coordinates are in canvas pixels after any translation.
pub trait Canvas {
    fn size(&self) -> (f64, f64);
    fn translate(&mut self, dx: f64, dy: f64);
    fn clear_rect(&mut self, x: f64, y: f64, width: f64, height: f64);
    fn fill_circle(&mut self, center: Pos, radius: f64, alpha: f64);
    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64, alpha: f64);
}

/// Sink for the `M:SS / M:SS` playback readout.
pub trait TextReadout {
    fn set_text(&mut self, text: &str);
}

/// Horizontal extent of the progress surface, in pointer coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressBounds {
    pub left: f64,
    pub width: f64,
}

/// The scrub-able progress indicator.
pub trait ProgressIndicator {
    fn bounds(&self) -> ProgressBounds;
    /// Fraction of the map played. Not clamped to `[0, 1]`.
    fn set_progress(&mut self, fraction: f64);
    fn set_seeking(&mut self, seeking: bool);
}

/// Draws one frame of a beatmap at a given map time onto a cleared,
/// translated canvas.
pub trait Renderer {
    fn render(&mut self, canvas: &mut dyn Canvas, time_ms: f64);
}

pub type RendererFactory = Box<dyn Fn(&Timeline, &PreviewConfig) -> Box<dyn Renderer>>;

/// Maps beatmap modes to renderer constructors.
pub struct RendererRegistry {
    factories: HashMap<Mode, RendererFactory>,
}

impl RendererRegistry {
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    pub fn register<F>(&mut self, mode: Mode, factory: F)
    where
        F: Fn(&Timeline, &PreviewConfig) -> Box<dyn Renderer> + 'static,
    {
        self.factories.insert(mode, Box::new(factory));
    }

    pub fn supports(&self, mode: Mode) -> bool {
        self.factories.contains_key(&mode)
    }

    /// Fails with [`PreviewError::UnsupportedMode`] when nothing is registered.
    pub fn ensure_supported(&self, mode: Mode) -> Result<()> {
        if self.supports(mode) {
            Ok(())
        } else {
            Err(PreviewError::UnsupportedMode { mode: mode.id() })
        }
    }

    pub fn create(
        &self,
        mode: Mode,
        timeline: &Timeline,
        config: &PreviewConfig,
    ) -> Result<Box<dyn Renderer>> {
        let factory = self
            .factories
            .get(&mode)
            .ok_or(PreviewError::UnsupportedMode { mode: mode.id() })?;
        Ok(factory(timeline, config))
    }
}

impl Default for RendererRegistry {
    /// Standard and mania are supported; taiko and catch are not.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Mode::Standard, |timeline, config| {
            Box::new(StandardRenderer::new(timeline.clone(), config))
        });
        registry.register(Mode::Mania, |timeline, config| {
            Box::new(ManiaRenderer::new(timeline.clone(), config, 4))
        });
        registry
    }
}

impl fmt::Debug for RendererRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut modes: Vec<u8> = self.factories.keys().map(|mode| mode.id()).collect();
        modes.sort_unstable();
        f.debug_struct("RendererRegistry")
            .field("modes", &modes)
            .finish()
    }
}

const APPROACH_MS: f64 = 800.0;
const CIRCLE_RADIUS: f64 = 32.0;

/// Draws standard-mode objects as circles fading in over the approach window.
#[derive(Debug)]
pub struct StandardRenderer {
    timeline: Timeline,
    center: Pos,
}

impl StandardRenderer {
    pub fn new(timeline: Timeline, config: &PreviewConfig) -> Self {
        Self {
            timeline,
            center: config.playfield.center(),
        }
    }
}

impl Renderer for StandardRenderer {
    fn render(&mut self, canvas: &mut dyn Canvas, time_ms: f64) {
        // Later objects are drawn first so earlier ones end up on top.
        for object in self.timeline.objects().iter().rev() {
            let appear = object.time - APPROACH_MS;
            if time_ms < appear || time_ms > object.end_time {
                continue;
            }
            let start = start_pos(&object.kind).unwrap_or(self.center);
            let pos = if time_ms < object.time {
                start
            } else {
                object.end_pos.unwrap_or(start)
            };
            let alpha = ((time_ms - appear) / APPROACH_MS).clamp(0.0, 1.0);
            canvas.fill_circle(pos, CIRCLE_RADIUS, alpha);
        }
    }
}

const SCROLL_PX_PER_MS: f64 = 0.5;
const NOTE_HEIGHT: f64 = 12.0;

/// Draws mania notes falling towards a hit line near the bottom edge.
#[derive(Debug)]
pub struct ManiaRenderer {
    timeline: Timeline,
    keys: u32,
    width: f64,
    height: f64,
}

impl ManiaRenderer {
    pub fn new(timeline: Timeline, config: &PreviewConfig, keys: u32) -> Self {
        Self {
            timeline,
            keys: keys.max(1),
            width: config.playfield.width,
            height: config.playfield.height,
        }
    }

    fn column_of(&self, x: f64) -> u32 {
        let column = (x * f64::from(self.keys) / self.width).floor();
        (column.max(0.0) as u32).min(self.keys - 1)
    }
}

impl Renderer for ManiaRenderer {
    fn render(&mut self, canvas: &mut dyn Canvas, time_ms: f64) {
        let hit_line = self.height - NOTE_HEIGHT;
        let column_width = self.width / f64::from(self.keys);
        for object in self.timeline.objects() {
            let head = hit_line - (object.time - time_ms) * SCROLL_PX_PER_MS;
            let tail = hit_line - (object.end_time - time_ms) * SCROLL_PX_PER_MS;
            if head < 0.0 || tail > self.height {
                continue;
            }
            let x = start_pos(&object.kind).map_or(0.0, |pos| pos.x);
            let left = f64::from(self.column_of(x)) * column_width;
            canvas.fill_rect(left, tail, column_width, head - tail + NOTE_HEIGHT, 1.0);
        }
    }
}

fn start_pos(kind: &HitObjectKind) -> Option<Pos> {
    match kind {
        HitObjectKind::Circle { pos }
        | HitObjectKind::Slider { pos, .. }
        | HitObjectKind::Hold { pos, .. } => Some(*pos),
        HitObjectKind::Spinner { .. } => None,
    }
}

/// One recorded call against a [`RecordingCanvas`].
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Translate { dx: f64, dy: f64 },
    Clear { x: f64, y: f64, width: f64, height: f64 },
    Circle { center: Pos, radius: f64, alpha: f64 },
    Rect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        alpha: f64,
    },
}

/// Canvas that records draw calls instead of rasterising them. Clones share
/// the same command log.
#[derive(Debug, Clone)]
pub struct RecordingCanvas {
    size: (f64, f64),
    commands: Rc<RefCell<Vec<DrawCommand>>>,
}

impl RecordingCanvas {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            size: (width, height),
            commands: Rc::default(),
        }
    }

    pub fn commands(&self) -> Vec<DrawCommand> {
        self.commands.borrow().clone()
    }

    pub fn take_commands(&self) -> Vec<DrawCommand> {
        std::mem::take(&mut *self.commands.borrow_mut())
    }
}

impl Canvas for RecordingCanvas {
    fn size(&self) -> (f64, f64) {
        self.size
    }

    fn translate(&mut self, dx: f64, dy: f64) {
        self.commands
            .borrow_mut()
            .push(DrawCommand::Translate { dx, dy });
    }

    fn clear_rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        self.commands.borrow_mut().push(DrawCommand::Clear {
            x,
            y,
            width,
            height,
        });
    }

    fn fill_circle(&mut self, center: Pos, radius: f64, alpha: f64) {
        self.commands.borrow_mut().push(DrawCommand::Circle {
            center,
            radius,
            alpha,
        });
    }

    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64, alpha: f64) {
        self.commands.borrow_mut().push(DrawCommand::Rect {
            x,
            y,
            width,
            height,
            alpha,
        });
    }
}

/// Text readout backed by a shared string.
#[derive(Debug, Clone, Default)]
pub struct TextBuffer {
    text: Rc<RefCell<String>>,
}

impl TextBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> String {
        self.text.borrow().clone()
    }
}

impl TextReadout for TextBuffer {
    fn set_text(&mut self, text: &str) {
        let mut current = self.text.borrow_mut();
        current.clear();
        current.push_str(text);
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct ProgressBarState {
    progress: f64,
    seeking: bool,
}

/// Progress indicator with fixed bounds. Clones share state.
#[derive(Debug, Clone)]
pub struct ProgressBar {
    bounds: ProgressBounds,
    state: Rc<RefCell<ProgressBarState>>,
}

impl ProgressBar {
    pub fn new(left: f64, width: f64) -> Self {
        Self {
            bounds: ProgressBounds { left, width },
            state: Rc::default(),
        }
    }

    pub fn progress(&self) -> f64 {
        self.state.borrow().progress
    }

    pub fn is_seeking(&self) -> bool {
        self.state.borrow().seeking
    }

    /// Pointer x-coordinate at `fraction` of the bar.
    pub fn x_at(&self, fraction: f64) -> f64 {
        self.bounds.left + self.bounds.width * fraction
    }
}

impl ProgressIndicator for ProgressBar {
    fn bounds(&self) -> ProgressBounds {
        self.bounds
    }

    fn set_progress(&mut self, fraction: f64) {
        self.state.borrow_mut().progress = fraction;
    }

    fn set_seeking(&mut self, seeking: bool) {
        self.state.borrow_mut().seeking = seeking;
    }
}
