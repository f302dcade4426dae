use std::{cell::RefCell, rc::Rc};

use crate::{
    session::{EventSender, PreviewEvent},
    PreviewError, Result,
};

/// The audio element a preview is synchronised to.
///
/// Seeks complete asynchronously: implementations report completion by
/// sending [`PreviewEvent::SeekCompleted`] through the sender handed to
/// [`AudioSource::bind_events`].
pub trait AudioSource {
    /// Current playback position in seconds.
    fn position_secs(&self) -> f64;
    /// Requests a jump to `secs`.
    fn seek_to(&mut self, secs: f64);
    /// Starts or resumes playback. May fail, e.g. when a newer seek
    /// interrupts it.
    fn play(&mut self) -> Result<()>;
    fn pause(&mut self);
    fn is_paused(&self) -> bool;

    fn bind_events(&mut self, _events: EventSender) {}
    fn unbind_events(&mut self) {}
}

#[derive(Debug)]
struct SimulatedState {
    position_secs: f64,
    paused: bool,
    rate: f64,
    seek_latency_ms: f64,
    pending_seek: Option<PendingSeek>,
    failing_plays: u32,
    seek_requests: Vec<f64>,
    events: Option<EventSender>,
}

#[derive(Debug, Clone, Copy)]
struct PendingSeek {
    target_secs: f64,
    remaining_ms: f64,
}

/// Deterministic in-memory audio track. Time only moves when the host calls
/// [`SimulatedAudio::advance`]. Clones share the same track.
#[derive(Debug, Clone)]
pub struct SimulatedAudio {
    state: Rc<RefCell<SimulatedState>>,
}

impl Default for SimulatedAudio {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedAudio {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(SimulatedState {
                position_secs: 0.0,
                paused: true,
                rate: 1.0,
                seek_latency_ms: 0.0,
                pending_seek: None,
                failing_plays: 0,
                seek_requests: Vec::new(),
                events: None,
            })),
        }
    }

    /// Seeks stay pending for at least `latency_ms` of advanced time.
    pub fn with_seek_latency(self, latency_ms: f64) -> Self {
        self.state.borrow_mut().seek_latency_ms = latency_ms;
        self
    }

    /// Playback speed relative to the wall clock, to model a drifting device.
    pub fn with_rate(self, rate: f64) -> Self {
        self.state.borrow_mut().rate = rate;
        self
    }

    /// The next `count` calls to `play` fail.
    pub fn fail_next_plays(&self, count: u32) {
        self.state.borrow_mut().failing_plays = count;
    }

    pub fn set_position_secs(&self, secs: f64) {
        self.state.borrow_mut().position_secs = secs;
    }

    pub fn seek_requests(&self) -> Vec<f64> {
        self.state.borrow().seek_requests.clone()
    }

    pub fn is_seeking(&self) -> bool {
        self.state.borrow().pending_seek.is_some()
    }

    pub fn is_bound(&self) -> bool {
        self.state.borrow().events.is_some()
    }

    /// Moves the track forward by `delta_ms` of wall time, completing a
    /// pending seek once its latency has elapsed.
    pub fn advance(&self, delta_ms: f64) {
        let completed = {
            let mut state = self.state.borrow_mut();
            match state.pending_seek {
                Some(mut pending) => {
                    pending.remaining_ms -= delta_ms;
                    if pending.remaining_ms <= 0.0 {
                        state.position_secs = pending.target_secs;
                        state.pending_seek = None;
                        state.events.clone()
                    } else {
                        state.pending_seek = Some(pending);
                        None
                    }
                }
                None => {
                    if !state.paused {
                        state.position_secs += delta_ms * state.rate / 1000.0;
                    }
                    None
                }
            }
        };

        if let Some(events) = completed {
            if let Err(err) = events.send(PreviewEvent::SeekCompleted) {
                tracing::debug!(%err, "seek completion dropped");
            }
        }
    }
}

impl AudioSource for SimulatedAudio {
    fn position_secs(&self) -> f64 {
        let state = self.state.borrow();
        state
            .pending_seek
            .map_or(state.position_secs, |pending| pending.target_secs)
    }

    fn seek_to(&mut self, secs: f64) {
        let mut state = self.state.borrow_mut();
        state.seek_requests.push(secs);
        let remaining_ms = state.seek_latency_ms;
        state.pending_seek = Some(PendingSeek {
            target_secs: secs,
            remaining_ms,
        });
    }

    fn play(&mut self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.failing_plays > 0 {
            state.failing_plays -= 1;
            state.paused = true;
            return Err(PreviewError::PlaybackResume(
                "play request was interrupted".into(),
            ));
        }
        state.paused = false;
        Ok(())
    }

    fn pause(&mut self) {
        self.state.borrow_mut().paused = true;
    }

    fn is_paused(&self) -> bool {
        self.state.borrow().paused
    }

    fn bind_events(&mut self, events: EventSender) {
        self.state.borrow_mut().events = Some(events);
    }

    fn unbind_events(&mut self) {
        self.state.borrow_mut().events = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::event_channel;

    #[test]
    fn position_only_moves_while_playing() {
        let mut audio = SimulatedAudio::new();
        audio.advance(500.0);
        assert_eq!(audio.position_secs(), 0.0);

        audio.play().unwrap();
        audio.advance(500.0);
        assert!((audio.position_secs() - 0.5).abs() < 1e-9);

        audio.pause();
        audio.advance(500.0);
        assert!((audio.position_secs() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn seek_completes_after_latency_and_notifies() {
        let (sender, receiver) = event_channel();
        let mut audio = SimulatedAudio::new().with_seek_latency(30.0);
        audio.bind_events(sender);

        audio.seek_to(12.0);
        assert_eq!(audio.position_secs(), 12.0);
        audio.advance(16.0);
        assert!(audio.is_seeking());
        assert!(receiver.try_recv().is_err());

        audio.advance(16.0);
        assert!(!audio.is_seeking());
        assert_eq!(receiver.try_recv().unwrap(), PreviewEvent::SeekCompleted);
        assert_eq!(audio.seek_requests(), vec![12.0]);
    }

    #[test]
    fn failing_play_leaves_track_paused() {
        let mut audio = SimulatedAudio::new();
        audio.fail_next_plays(1);
        assert!(matches!(audio.play(), Err(PreviewError::PlaybackResume(_))));
        assert!(audio.is_paused());
        assert!(audio.play().is_ok());
        assert!(!audio.is_paused());
    }
}
