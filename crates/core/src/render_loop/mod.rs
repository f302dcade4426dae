use crate::{
    audio::AudioSource,
    clock::PlaybackClock,
    config::PlayfieldConfig,
    render::{Canvas, ProgressIndicator, Renderer, TextReadout},
    seek::{SeekController, SeekPhase},
};

/// Formats map time as `M:SS`. Minutes are not wrapped into hours.
pub fn format_time(ms: f64) -> String {
    let total_seconds = (ms / 1000.0).floor() as i64;
    let seconds = total_seconds.rem_euclid(60);
    let minutes = total_seconds.div_euclid(60);
    format!("{minutes}:{seconds:02}")
}

/// The time a frame shows: pinned to the drag point while seeking, otherwise
/// read off the clock.
pub fn display_time(phase: SeekPhase, clock: &PlaybackClock, now: f64) -> f64 {
    if phase == SeekPhase::Seeking {
        clock.map_start_time()
    } else {
        clock.map_time(now)
    }
}

/// What a single tick produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub display_time: f64,
    pub readout: String,
    /// `display_time / total_duration`, unclamped.
    pub progress: f64,
    pub drift_corrected: bool,
}

/// Per-frame driver: syncs the clock, updates the readout and progress
/// indicator, clears the canvas and hands the frame to the renderer.
pub struct RenderLoop {
    renderer: Box<dyn Renderer>,
    canvas: Box<dyn Canvas>,
    readout: Box<dyn TextReadout>,
    total_duration: f64,
    clear_origin: (f64, f64),
}

impl RenderLoop {
    /// Translates `canvas` by the playfield offset once, up front.
    pub fn new(
        renderer: Box<dyn Renderer>,
        mut canvas: Box<dyn Canvas>,
        readout: Box<dyn TextReadout>,
        total_duration: f64,
        playfield: &PlayfieldConfig,
    ) -> Self {
        canvas.translate(playfield.offset_x, playfield.offset_y);
        Self {
            renderer,
            canvas,
            readout,
            total_duration,
            clear_origin: (-playfield.offset_x, -playfield.offset_y),
        }
    }

    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    pub fn tick(
        &mut self,
        now: f64,
        clock: &mut PlaybackClock,
        seek: &SeekController,
        audio: &dyn AudioSource,
        progress: &mut dyn ProgressIndicator,
    ) -> Frame {
        let drift_corrected = seek.phase() == SeekPhase::Playing
            && !audio.is_paused()
            && clock.correct_drift(audio.position_secs(), now);

        let time = display_time(seek.phase(), clock, now);
        let readout = format!(
            "{} / {}",
            format_time(time.min(self.total_duration)),
            format_time(self.total_duration)
        );
        self.readout.set_text(&readout);

        let fraction = time / self.total_duration;
        progress.set_progress(fraction);

        let (width, height) = self.canvas.size();
        let (x, y) = self.clear_origin;
        self.canvas.clear_rect(x, y, width, height);
        self.renderer.render(self.canvas.as_mut(), time);

        Frame {
            display_time: time,
            readout,
            progress: fraction,
            drift_corrected,
        }
    }
}

impl std::fmt::Debug for RenderLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderLoop")
            .field("total_duration", &self.total_duration)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audio::SimulatedAudio,
        render::{DrawCommand, ProgressBar, RecordingCanvas, TextBuffer},
    };

    struct NullRenderer;

    impl Renderer for NullRenderer {
        fn render(&mut self, _canvas: &mut dyn Canvas, _time_ms: f64) {}
    }

    fn render_loop(total: f64) -> (RenderLoop, RecordingCanvas, TextBuffer) {
        let canvas = RecordingCanvas::new(640.0, 480.0);
        let text = TextBuffer::new();
        let render_loop = RenderLoop::new(
            Box::new(NullRenderer),
            Box::new(canvas.clone()),
            Box::new(text.clone()),
            total,
            &PlayfieldConfig::default(),
        );
        (render_loop, canvas, text)
    }

    #[test]
    fn formats_minutes_and_padded_seconds() {
        assert_eq!(format_time(0.0), "0:00");
        assert_eq!(format_time(65_000.0), "1:05");
        assert_eq!(format_time(59_999.0), "0:59");
        assert_eq!(format_time(3_600_000.0), "60:00");
    }

    #[test]
    fn seeking_pins_display_time() {
        let clock = PlaybackClock::new(700.0, 1000.0, 100.0);
        assert_eq!(display_time(SeekPhase::Seeking, &clock, 5000.0), 700.0);
        assert_eq!(display_time(SeekPhase::Playing, &clock, 5000.0), 4700.0);
        assert_eq!(
            display_time(SeekPhase::AwaitingSeekCompletion, &clock, 1500.0),
            1200.0
        );
    }

    #[test]
    fn tick_updates_surfaces_and_clears_canvas() {
        let (mut render_loop, canvas, text) = render_loop(90_000.0);
        let mut clock = PlaybackClock::new(65_000.0, 0.0, 100.0);
        let seek = SeekController::new(90_000.0);
        let audio = SimulatedAudio::new();
        let mut bar = ProgressBar::new(0.0, 100.0);

        let frame = render_loop.tick(0.0, &mut clock, &seek, &audio, &mut bar);
        assert_eq!(frame.readout, "1:05 / 1:30");
        assert_eq!(text.text(), "1:05 / 1:30");
        assert!((bar.progress() - 65.0 / 90.0).abs() < 1e-9);
        assert_eq!(
            canvas.commands(),
            vec![
                DrawCommand::Translate { dx: 64.0, dy: 48.0 },
                DrawCommand::Clear {
                    x: -64.0,
                    y: -48.0,
                    width: 640.0,
                    height: 480.0
                },
            ]
        );
    }

    #[test]
    fn paused_audio_skips_drift_correction() {
        let (mut render_loop, _, _) = render_loop(10_000.0);
        let mut clock = PlaybackClock::new(1000.0, 0.0, 100.0);
        let seek = SeekController::new(10_000.0);
        let audio = SimulatedAudio::new();
        audio.set_position_secs(8.0);
        let mut bar = ProgressBar::new(0.0, 100.0);

        let frame = render_loop.tick(100.0, &mut clock, &seek, &audio, &mut bar);
        assert!(!frame.drift_corrected);
        assert_eq!(frame.display_time, 1100.0);
    }

    /// Starts a drag at 5000ms while the audio keeps playing at 9s.
    fn drifted_mid_seek(
        clock: &mut PlaybackClock,
        seek: &mut SeekController,
        audio: &mut SimulatedAudio,
        bar: &mut ProgressBar,
    ) {
        seek.pointer_down(50.0, 0.0, clock, audio, bar);
        audio.play().unwrap();
        audio.set_position_secs(9.0);
    }

    #[test]
    fn drift_correction_is_suspended_during_a_seek() {
        let (mut render_loop, _, _) = render_loop(10_000.0);
        let mut clock = PlaybackClock::new(0.0, 0.0, 100.0);
        let mut seek = SeekController::new(10_000.0);
        let mut audio = SimulatedAudio::new();
        let mut bar = ProgressBar::new(0.0, 100.0);
        drifted_mid_seek(&mut clock, &mut seek, &mut audio, &mut bar);

        let frame = render_loop.tick(100.0, &mut clock, &seek, &audio, &mut bar);
        assert_eq!(seek.phase(), SeekPhase::Seeking);
        assert!(!frame.drift_corrected);
        assert_eq!(frame.display_time, 5000.0);
        assert_eq!(clock.map_start_time(), 5000.0);

        seek.pointer_up(&clock, &mut audio);
        // Let the device land elsewhere while the completion is still unseen.
        audio.advance(0.0);
        audio.set_position_secs(9.0);
        assert!(!audio.is_paused());

        let frame = render_loop.tick(200.0, &mut clock, &seek, &audio, &mut bar);
        assert_eq!(seek.phase(), SeekPhase::AwaitingSeekCompletion);
        assert!(!frame.drift_corrected);
        assert_eq!(frame.display_time, 5200.0);
        assert_eq!(clock.map_start_time(), 5000.0);
        assert_eq!(clock.reference_wall_time(), 0.0);
    }

    #[test]
    fn drift_correction_resumes_after_seek_completes() {
        let (mut render_loop, _, _) = render_loop(10_000.0);
        let mut clock = PlaybackClock::new(0.0, 0.0, 100.0);
        let mut seek = SeekController::new(10_000.0);
        let mut audio = SimulatedAudio::new();
        let mut bar = ProgressBar::new(0.0, 100.0);
        drifted_mid_seek(&mut clock, &mut seek, &mut audio, &mut bar);
        seek.pointer_up(&clock, &mut audio);
        audio.advance(0.0);
        audio.set_position_secs(9.0);

        seek.seek_completed(300.0, &mut clock, &mut audio, &mut bar);
        assert_eq!(seek.phase(), SeekPhase::Playing);
        assert_eq!(clock.map_start_time(), 9000.0);

        audio.set_position_secs(2.0);
        let frame = render_loop.tick(400.0, &mut clock, &seek, &audio, &mut bar);
        assert!(frame.drift_corrected);
        assert_eq!(clock.map_start_time(), 2000.0);
        assert_eq!(clock.reference_wall_time(), 400.0);
        assert_eq!(frame.display_time, 2000.0);
    }

    #[test]
    fn progress_overflows_past_the_end() {
        let (mut render_loop, _, text) = render_loop(1000.0);
        let mut clock = PlaybackClock::new(1000.0, 0.0, 100.0);
        let seek = SeekController::new(1000.0);
        let audio = SimulatedAudio::new();
        let mut bar = ProgressBar::new(0.0, 100.0);

        let frame = render_loop.tick(500.0, &mut clock, &seek, &audio, &mut bar);
        assert_eq!(frame.display_time, 1500.0);
        assert_eq!(frame.progress, 1.5);
        assert_eq!(bar.progress(), 1.5);
        // The readout stops at the end even though the indicator does not.
        assert_eq!(text.text(), "0:01 / 0:01");
    }
}
