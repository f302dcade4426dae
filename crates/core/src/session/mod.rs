//! A running preview: owns the clock, the seek state machine and the render
//! loop, and is the only place their shared state is mutated.
//!
//! All inputs (pointer gestures and the audio's seek completion) travel over
//! one FIFO channel and are drained at the start of every tick, so a tick
//! always observes every event queued before it. Tearing the session down
//! closes that channel; senders held by hosts then fail with
//! [`PreviewError::SessionClosed`].

use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc, Arc,
};

use crate::{
    audio::AudioSource,
    beatmap::Beatmap,
    clock::{PlaybackClock, WallClock},
    config::PreviewConfig,
    render::{Canvas, ProgressIndicator, RendererRegistry, TextReadout},
    render_loop::{Frame, RenderLoop},
    seek::{SeekController, SeekPhase},
    timeline::{Timeline, TimelineBuilder},
    PreviewError, Result,
};

/// Input delivered to a session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PreviewEvent {
    /// Pointer pressed on the progress surface.
    PointerDown { client_x: f64 },
    PointerMove { client_x: f64 },
    PointerUp,
    /// The audio finished a requested seek.
    SeekCompleted,
}

/// Cloneable handle for queueing events into a session.
#[derive(Debug, Clone)]
pub struct EventSender {
    inner: mpsc::Sender<PreviewEvent>,
}

impl EventSender {
    pub fn send(&self, event: PreviewEvent) -> Result<()> {
        self.inner
            .send(event)
            .map_err(|_| PreviewError::SessionClosed)
    }
}

pub fn event_channel() -> (EventSender, mpsc::Receiver<PreviewEvent>) {
    let (inner, receiver) = mpsc::channel();
    (EventSender { inner }, receiver)
}

/// Requests that a session stop at its next tick.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// Host-side collaborators a session drives.
pub struct PreviewHost {
    pub canvas: Box<dyn Canvas>,
    pub readout: Box<dyn TextReadout>,
    pub progress: Box<dyn ProgressIndicator>,
    pub audio: Box<dyn AudioSource>,
    pub wall_clock: Box<dyn WallClock>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Frame(Frame),
    Stopped,
}

pub struct PreviewSession {
    timeline: Timeline,
    clock: PlaybackClock,
    seek: SeekController,
    render_loop: RenderLoop,
    audio: Box<dyn AudioSource>,
    progress: Box<dyn ProgressIndicator>,
    wall_clock: Box<dyn WallClock>,
    events: Option<(EventSender, mpsc::Receiver<PreviewEvent>)>,
    stop: StopHandle,
    frames: u64,
}

impl PreviewSession {
    /// Sets up a preview and starts the audio. A negative `preview_time`
    /// starts at the configured fraction of the map.
    ///
    /// Unsupported modes and unresolvable timing fail here, before any audio
    /// is touched.
    pub fn start(
        beatmap: &Beatmap,
        preview_time: f64,
        config: &PreviewConfig,
        registry: &RendererRegistry,
        host: PreviewHost,
    ) -> Result<Self> {
        registry.ensure_supported(beatmap.mode)?;
        let timeline = TimelineBuilder::new(config.playfield.center()).build(
            &beatmap.objects,
            &beatmap.timing_points,
            beatmap.sv,
        )?;
        let total_duration = timeline.total_duration();
        let renderer = registry.create(beatmap.mode, &timeline, config)?;

        let PreviewHost {
            canvas,
            readout,
            progress,
            mut audio,
            wall_clock,
        } = host;

        let start = PlaybackClock::resolve_start(
            preview_time,
            total_duration,
            config.default_preview_fraction,
        );
        let (sender, receiver) = event_channel();
        audio.bind_events(sender.clone());
        audio.seek_to(start / 1000.0);
        if let Err(err) = audio.play() {
            tracing::warn!(%err, "could not start playback");
        }

        let clock = PlaybackClock::new(start, wall_clock.now_ms(), config.drift_threshold_ms);
        let render_loop =
            RenderLoop::new(renderer, canvas, readout, total_duration, &config.playfield);

        tracing::info!(
            mode = beatmap.mode.id(),
            objects = timeline.objects().len(),
            total_duration,
            start,
            "preview session started"
        );

        Ok(Self {
            timeline,
            clock,
            seek: SeekController::new(total_duration),
            render_loop,
            audio,
            progress,
            wall_clock,
            events: Some((sender, receiver)),
            stop: StopHandle::default(),
            frames: 0,
        })
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn clock(&self) -> &PlaybackClock {
        &self.clock
    }

    pub fn phase(&self) -> SeekPhase {
        self.seek.phase()
    }

    pub fn resume_failures(&self) -> u64 {
        self.seek.resume_failures()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.events.is_none()
    }

    /// Sender for queueing input. Fails once the session has torn down.
    pub fn events(&self) -> Result<EventSender> {
        self.events
            .as_ref()
            .map(|(sender, _)| sender.clone())
            .ok_or(PreviewError::SessionClosed)
    }

    /// Applies an event immediately, after everything already queued.
    pub fn handle_event(&mut self, event: PreviewEvent) -> Result<()> {
        if self.is_closed() {
            return Err(PreviewError::SessionClosed);
        }
        self.drain_events();
        self.dispatch(event);
        Ok(())
    }

    /// Drains queued events, then renders one frame. Once stopped, tears down
    /// and keeps returning [`TickOutcome::Stopped`].
    pub fn tick(&mut self) -> TickOutcome {
        if self.stop.is_stopped() {
            self.teardown();
        }
        if self.is_closed() {
            return TickOutcome::Stopped;
        }

        self.drain_events();

        let now = self.wall_clock.now_ms();
        let frame = self.render_loop.tick(
            now,
            &mut self.clock,
            &self.seek,
            self.audio.as_ref(),
            self.progress.as_mut(),
        );
        self.frames += 1;
        TickOutcome::Frame(frame)
    }

    /// Stops the session now. Idempotent.
    pub fn stop(&mut self) {
        self.stop.stop();
        self.teardown();
    }

    fn drain_events(&mut self) {
        while let Some(event) = self.next_event() {
            self.dispatch(event);
        }
    }

    fn next_event(&self) -> Option<PreviewEvent> {
        let (_, receiver) = self.events.as_ref()?;
        receiver.try_recv().ok()
    }

    fn dispatch(&mut self, event: PreviewEvent) {
        let now = self.wall_clock.now_ms();
        match event {
            PreviewEvent::PointerDown { client_x } => self.seek.pointer_down(
                client_x,
                now,
                &mut self.clock,
                self.audio.as_mut(),
                self.progress.as_mut(),
            ),
            PreviewEvent::PointerMove { client_x } => {
                self.seek
                    .pointer_move(client_x, now, &mut self.clock, self.progress.as_ref())
            }
            PreviewEvent::PointerUp => self.seek.pointer_up(&self.clock, self.audio.as_mut()),
            PreviewEvent::SeekCompleted => self.seek.seek_completed(
                now,
                &mut self.clock,
                self.audio.as_mut(),
                self.progress.as_mut(),
            ),
        }
    }

    fn teardown(&mut self) {
        if self.events.take().is_none() {
            return;
        }
        self.audio.unbind_events();
        self.audio.pause();
        self.progress.set_seeking(false);
        tracing::info!(frames = self.frames, "preview session stopped");
    }
}

impl Drop for PreviewSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for PreviewSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewSession")
            .field("clock", &self.clock)
            .field("seek", &self.seek)
            .field("frames", &self.frames)
            .field("closed", &self.is_closed())
            .finish()
    }
}
