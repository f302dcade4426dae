use serde::Serialize;

use crate::{
    beatmap::{HitObject, HitObjectKind, Pos, TimingPoint},
    config::PlayfieldConfig,
    PreviewError, Result,
};

/// A hit object with its absolute timing resolved. Produced once by
/// [`TimelineBuilder::build`] and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimedHitObject {
    pub time: f64,
    #[serde(flatten)]
    pub kind: HitObjectKind,
    /// Length of a single slider span. Only sliders have one.
    pub duration: Option<f64>,
    pub end_time: f64,
    /// Sliders leave this unset; their end depends on the curve.
    pub end_pos: Option<Pos>,
}

/// Finalised hit objects of a beatmap, in beatmap order.
#[derive(Debug, Clone, Serialize)]
pub struct Timeline {
    objects: Vec<TimedHitObject>,
    total_duration: f64,
}

impl Timeline {
    pub fn objects(&self) -> &[TimedHitObject] {
        &self.objects
    }

    /// End time of the last hit object.
    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }
}

/// Resolves absolute durations and end times of raw hit objects.
#[derive(Debug, Clone, Copy)]
pub struct TimelineBuilder {
    center: Pos,
}

impl Default for TimelineBuilder {
    fn default() -> Self {
        Self::new(PlayfieldConfig::default().center())
    }
}

impl TimelineBuilder {
    /// `center` is where spinners and holds end up.
    pub fn new(center: Pos) -> Self {
        Self { center }
    }

    pub fn build(
        &self,
        objects: &[HitObject],
        timing_points: &[TimingPoint],
        sv: f64,
    ) -> Result<Timeline> {
        let mut timed = Vec::with_capacity(objects.len());
        for (index, object) in objects.iter().enumerate() {
            let resolved = self.resolve(index, object, timing_points, sv)?;
            if resolved.end_time < resolved.time {
                return Err(PreviewError::EndsBeforeStart {
                    index,
                    time: resolved.time,
                    end_time: resolved.end_time,
                });
            }
            timed.push(resolved);
        }

        let total_duration = timed
            .last()
            .map(|object| object.end_time)
            .ok_or(PreviewError::EmptyBeatmap)?;

        tracing::debug!(objects = timed.len(), total_duration, "timeline built");
        Ok(Timeline {
            objects: timed,
            total_duration,
        })
    }

    fn resolve(
        &self,
        index: usize,
        object: &HitObject,
        timing_points: &[TimingPoint],
        sv: f64,
    ) -> Result<TimedHitObject> {
        let (duration, end_time, end_pos) = match object.kind {
            HitObjectKind::Slider {
                distance,
                repetitions,
                ..
            } => {
                let point = applicable_timing_point(timing_points, object.time).ok_or(
                    PreviewError::NoApplicableTimingPoint {
                        index,
                        time: object.time,
                    },
                )?;
                let duration = distance / (100.0 * sv) * point.ms_per_beat;
                let end_time = object.time + duration * f64::from(repetitions);
                (Some(duration), end_time, None)
            }
            HitObjectKind::Spinner { end_time } | HitObjectKind::Hold { end_time, .. } => {
                (None, end_time, Some(self.center))
            }
            HitObjectKind::Circle { pos } => (None, object.time, Some(pos)),
        };

        Ok(TimedHitObject {
            time: object.time,
            kind: object.kind.clone(),
            duration,
            end_time,
            end_pos,
        })
    }
}

/// Returns the first timing point, in ascending order, starting at or before
/// `time`. With several qualifying points this is the earliest one rather than
/// the one closest to `time`.
pub fn applicable_timing_point(timing_points: &[TimingPoint], time: f64) -> Option<&TimingPoint> {
    timing_points.iter().find(|point| point.time <= time)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn circles_end_where_they_start() {
        let pos = Pos::new(100.0, 50.0);
        let timeline = TimelineBuilder::default()
            .build(&[HitObject::circle(300.0, pos)], &[], 1.0)
            .unwrap();

        let circle = &timeline.objects()[0];
        assert_eq!(circle.end_time, 300.0);
        assert_eq!(circle.end_pos, Some(pos));
        assert_eq!(circle.duration, None);
    }

    #[test]
    fn spinners_and_holds_end_at_playfield_center() {
        let objects = [
            HitObject::spinner(1000.0, 4000.0),
            HitObject::hold(4500.0, Pos::new(448.0, 192.0), 5200.0),
        ];
        let timeline = TimelineBuilder::default().build(&objects, &[], 1.0).unwrap();

        for (object, end) in timeline.objects().iter().zip([4000.0, 5200.0]) {
            assert_eq!(object.end_time, end);
            assert_eq!(object.end_pos, Some(Pos::new(256.0, 192.0)));
        }
        assert_eq!(timeline.total_duration(), 5200.0);
    }

    #[test]
    fn slider_duration_follows_beat_length_and_sv() {
        let timing = [TimingPoint::new(0.0, 500.0)];
        let objects = [HitObject::slider(1000.0, Pos::default(), 140.0, 3)];
        let timeline = TimelineBuilder::default()
            .build(&objects, &timing, 1.4)
            .unwrap();

        let slider = &timeline.objects()[0];
        let duration = slider.duration.unwrap();
        assert!(approx(duration, 140.0 / (100.0 * 1.4) * 500.0));
        assert!(approx(slider.end_time, 1000.0 + duration * 3.0));
        assert_eq!(slider.end_pos, None);
    }

    // Deliberately pinned: the earliest qualifying timing point wins, not the
    // nearest preceding one. Changing this changes every slider length.
    #[test]
    fn slider_uses_first_qualifying_timing_point_not_nearest() {
        let timing = [TimingPoint::new(0.0, 500.0), TimingPoint::new(1000.0, 250.0)];
        let objects = [HitObject::slider(2000.0, Pos::default(), 100.0, 1)];
        let timeline = TimelineBuilder::default()
            .build(&objects, &timing, 1.0)
            .unwrap();

        let slider = &timeline.objects()[0];
        assert!(approx(slider.duration.unwrap(), 500.0));
        assert!(approx(slider.end_time, 2500.0));
    }

    #[test]
    fn slider_before_every_timing_point_fails() {
        let timing = [TimingPoint::new(500.0, 400.0)];
        let objects = [
            HitObject::circle(0.0, Pos::default()),
            HitObject::slider(100.0, Pos::default(), 100.0, 1),
        ];
        let err = TimelineBuilder::default()
            .build(&objects, &timing, 1.0)
            .unwrap_err();
        assert!(matches!(
            err,
            PreviewError::NoApplicableTimingPoint { index: 1, .. }
        ));

        let err = TimelineBuilder::default()
            .build(&objects[1..], &[], 1.0)
            .unwrap_err();
        assert!(matches!(err, PreviewError::NoApplicableTimingPoint { .. }));
    }

    #[test]
    fn total_duration_is_last_objects_end() {
        let objects = [
            HitObject::circle(0.0, Pos::default()),
            HitObject::circle(1000.0, Pos::default()),
        ];
        let timeline = TimelineBuilder::default().build(&objects, &[], 1.0).unwrap();
        assert_eq!(timeline.total_duration(), 1000.0);
    }

    #[test]
    fn rejects_empty_and_backwards_objects() {
        let builder = TimelineBuilder::default();
        assert!(matches!(
            builder.build(&[], &[], 1.0),
            Err(PreviewError::EmptyBeatmap)
        ));
        assert!(matches!(
            builder.build(&[HitObject::spinner(500.0, 100.0)], &[], 1.0),
            Err(PreviewError::EndsBeforeStart { index: 0, .. })
        ));
    }
}
