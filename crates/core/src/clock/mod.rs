use std::{cell::Cell, rc::Rc, time::Instant};

/// Monotonic wall-clock source, in milliseconds.
pub trait WallClock {
    fn now_ms(&self) -> f64;
}

/// Wall clock backed by [`Instant`], measured from construction.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl WallClock for MonotonicClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Hand-driven wall clock. Clones share the same reading, so a host can keep
/// one copy and advance it frame by frame.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
}

impl ManualClock {
    pub fn new(start_ms: f64) -> Self {
        Self {
            now: Rc::new(Cell::new(start_ms)),
        }
    }

    pub fn set(&self, now_ms: f64) {
        self.now.set(now_ms);
    }

    pub fn advance(&self, delta_ms: f64) {
        self.now.set(self.now.get() + delta_ms);
    }
}

impl WallClock for ManualClock {
    fn now_ms(&self) -> f64 {
        self.now.get()
    }
}

/// Maps wall-clock readings onto map time through an anchor pair: map time
/// `map_start_time` was current at wall time `reference_wall_time`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackClock {
    map_start_time: f64,
    reference_wall_time: f64,
    drift_threshold_ms: f64,
}

impl PlaybackClock {
    pub fn new(map_start_time: f64, now: f64, drift_threshold_ms: f64) -> Self {
        Self {
            map_start_time,
            reference_wall_time: now,
            drift_threshold_ms,
        }
    }

    /// Resolves the caller's preview time. Negative values request the
    /// default, `fraction` of the way into the map.
    pub fn resolve_start(preview_time: f64, total_duration: f64, fraction: f64) -> f64 {
        if preview_time < 0.0 {
            total_duration * fraction
        } else {
            preview_time
        }
    }

    pub fn map_start_time(&self) -> f64 {
        self.map_start_time
    }

    pub fn reference_wall_time(&self) -> f64 {
        self.reference_wall_time
    }

    pub fn map_time(&self, now: f64) -> f64 {
        now - self.reference_wall_time + self.map_start_time
    }

    pub fn anchor(&mut self, map_time: f64, now: f64) {
        self.map_start_time = map_time;
        self.reference_wall_time = now;
    }

    /// Re-anchors onto the audio position when it disagrees with the clock by
    /// strictly more than the drift threshold. Returns whether it did.
    pub fn correct_drift(&mut self, audio_position_secs: f64, now: f64) -> bool {
        let audio_time = audio_position_secs * 1000.0;
        let expected = self.map_time(now);
        if (audio_time - expected).abs() > self.drift_threshold_ms {
            tracing::debug!(audio_time, expected, "re-anchoring clock to audio");
            self.anchor(audio_time, now);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_time_advances_with_wall_clock() {
        let clock = PlaybackClock::new(420.0, 10_000.0, 100.0);
        assert_eq!(clock.map_time(10_000.0), 420.0);
        assert_eq!(clock.map_time(10_250.0), 670.0);
    }

    #[test]
    fn negative_preview_time_picks_default_fraction() {
        assert_eq!(PlaybackClock::resolve_start(-1.0, 1000.0, 0.42), 420.0);
        assert_eq!(PlaybackClock::resolve_start(0.0, 1000.0, 0.42), 0.0);
        assert_eq!(PlaybackClock::resolve_start(750.0, 1000.0, 0.42), 750.0);
    }

    #[test]
    fn drift_within_threshold_is_tolerated() {
        let mut clock = PlaybackClock::new(1025.0, 0.0, 100.0);
        // Exactly at the threshold must not re-anchor.
        assert!(!clock.correct_drift(1.625, 500.0));
        assert!(!clock.correct_drift(1.5, 500.0));
        assert_eq!(clock.map_start_time(), 1025.0);
        assert_eq!(clock.reference_wall_time(), 0.0);
    }

    #[test]
    fn drift_beyond_threshold_reanchors_to_audio() {
        let mut clock = PlaybackClock::new(1025.0, 0.0, 100.0);
        assert!(clock.correct_drift(1.75, 500.0));
        assert_eq!(clock.map_start_time(), 1750.0);
        assert_eq!(clock.reference_wall_time(), 500.0);

        assert!(clock.correct_drift(1.0, 600.0));
        assert_eq!(clock.map_start_time(), 1000.0);
    }

    #[test]
    fn monotonic_clock_never_goes_backwards() {
        let clock = MonotonicClock::new();
        let first = clock.now_ms();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = clock.now_ms();
        assert!(first >= 0.0);
        assert!(second >= first + 1.0);
    }

    #[test]
    fn manual_clock_clones_share_reading() {
        let clock = ManualClock::new(5.0);
        let view = clock.clone();
        clock.advance(16.0);
        assert_eq!(view.now_ms(), 21.0);
        clock.set(0.0);
        assert_eq!(view.now_ms(), 0.0);
    }
}
