use crate::{
    audio::AudioSource,
    clock::PlaybackClock,
    render::{ProgressBounds, ProgressIndicator},
};

/// Where the scrub gesture currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeekPhase {
    /// Map time follows the audio, with drift correction.
    #[default]
    Playing,
    /// The pointer is dragging; displayed time is pinned to the drag point.
    Seeking,
    /// The audio has been asked to seek and has not reported back yet.
    AwaitingSeekCompletion,
}

/// State machine for drag-to-seek on the progress surface.
///
/// While not [`SeekPhase::Playing`] it owns the clock's anchor; drift
/// correction is suspended until the audio reports the seek finished.
#[derive(Debug, Clone)]
pub struct SeekController {
    phase: SeekPhase,
    total_duration: f64,
    resume_failures: u64,
}

impl SeekController {
    pub fn new(total_duration: f64) -> Self {
        Self {
            phase: SeekPhase::Playing,
            total_duration,
            resume_failures: 0,
        }
    }

    pub fn phase(&self) -> SeekPhase {
        self.phase
    }

    /// Number of times resuming playback after a seek failed.
    pub fn resume_failures(&self) -> u64 {
        self.resume_failures
    }

    /// Map time under a pointer at `client_x`. Positions left of the surface
    /// clamp to its start; there is no clamp on the right.
    pub fn dragged_time(&self, client_x: f64, bounds: ProgressBounds) -> f64 {
        if bounds.width <= 0.0 {
            return 0.0;
        }
        let x = (client_x - bounds.left).max(0.0);
        x / bounds.width * self.total_duration
    }

    pub fn pointer_down(
        &mut self,
        client_x: f64,
        now: f64,
        clock: &mut PlaybackClock,
        audio: &mut dyn AudioSource,
        progress: &mut dyn ProgressIndicator,
    ) {
        audio.pause();
        self.transition(SeekPhase::Seeking);
        let time = self.dragged_time(client_x, progress.bounds());
        clock.anchor(time, now);
        progress.set_seeking(true);
    }

    pub fn pointer_move(
        &mut self,
        client_x: f64,
        now: f64,
        clock: &mut PlaybackClock,
        progress: &dyn ProgressIndicator,
    ) {
        if self.phase != SeekPhase::Seeking {
            return;
        }
        let time = self.dragged_time(client_x, progress.bounds());
        clock.anchor(time, now);
    }

    /// Commits the dragged time to the audio. The clock is left alone until
    /// the seek completes.
    pub fn pointer_up(&mut self, clock: &PlaybackClock, audio: &mut dyn AudioSource) {
        if self.phase != SeekPhase::Seeking {
            return;
        }
        self.transition(SeekPhase::AwaitingSeekCompletion);
        audio.seek_to(clock.map_start_time() / 1000.0);
    }

    /// Re-anchors onto where the audio actually landed and resumes playback.
    /// Ignored unless a committed seek is outstanding.
    pub fn seek_completed(
        &mut self,
        now: f64,
        clock: &mut PlaybackClock,
        audio: &mut dyn AudioSource,
        progress: &mut dyn ProgressIndicator,
    ) {
        if self.phase != SeekPhase::AwaitingSeekCompletion {
            return;
        }
        let actual = audio.position_secs() * 1000.0;
        clock.anchor(actual, now);
        self.transition(SeekPhase::Playing);
        if let Err(err) = audio.play() {
            self.resume_failures += 1;
            tracing::warn!(%err, failures = self.resume_failures, "could not resume playback after seek");
        }
        progress.set_seeking(false);
    }

    fn transition(&mut self, next: SeekPhase) {
        tracing::debug!(from = ?self.phase, to = ?next, "seek phase change");
        self.phase = next;
    }
}
