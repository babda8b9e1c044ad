//! ADSR envelope expressed as a gain automation timeline.
//!
//! Instead of advancing per-sample state, the envelope stores breakpoints
//! (set / linear-ramp) on an absolute timeline in seconds, the same model as
//! a WebAudio `AudioParam`. Any instant can be evaluated, so control code can
//! re-anchor the curve at "now" while audio rendering lags behind.

use crate::config::EnvelopeConfig;

/// Voice lifecycle stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Attacking,
    Decaying,
    Sustaining,
    Releasing,
    Disposed,
}

/// Events that can move a voice between stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The attack ramp reached its peak.
    AttackDone,
    /// The decay ramp reached the sustain level.
    DecayDone,
    /// The input was let go.
    Release,
    /// The same pitch was triggered again while still live.
    Retrigger,
    /// The release fade finished and its disposal task fired.
    DisposalDue,
    /// Immediate teardown without a fade.
    ForceStop,
}

impl Stage {
    /// The transition table. `None` means the event is ignored in this stage.
    pub fn next(self, transition: Transition) -> Option<Stage> {
        use Stage::*;
        use Transition::*;

        match (self, transition) {
            (Disposed, _) => None,
            (_, ForceStop) => Some(Disposed),
            (_, Retrigger) => Some(Attacking),
            (Attacking, AttackDone) => Some(Decaying),
            (Decaying, DecayDone) => Some(Sustaining),
            (Attacking | Decaying | Sustaining, Release) => Some(Releasing),
            (Releasing, DisposalDue) => Some(Disposed),
            _ => None,
        }
    }

    pub fn is_live(self) -> bool {
        self != Stage::Disposed
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PointKind {
    /// Jump to the value at this time.
    Set,
    /// Ramp linearly from the previous point to this one.
    LinearRamp,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Point {
    time: f64,
    value: f64,
    kind: PointKind,
}

/// A piecewise-linear value over time.
#[derive(Debug, Clone)]
pub struct Automation {
    points: Vec<Point>,
    initial: f64,
}

impl Automation {
    pub fn new(initial: f64) -> Self {
        Automation {
            points: Vec::new(),
            initial,
        }
    }

    pub fn set_value_at(&mut self, time: f64, value: f64) {
        self.insert(Point {
            time,
            value,
            kind: PointKind::Set,
        });
    }

    pub fn linear_ramp_to(&mut self, time: f64, value: f64) {
        self.insert(Point {
            time,
            value,
            kind: PointKind::LinearRamp,
        });
    }

    fn insert(&mut self, point: Point) {
        let idx = self.points.partition_point(|p| p.time <= point.time);
        self.points.insert(idx, point);
    }

    /// Instantaneous value at `time`.
    pub fn value_at(&self, time: f64) -> f64 {
        let idx = self.points.partition_point(|p| p.time <= time);
        let prev = idx.checked_sub(1).map(|i| self.points[i]);

        match (prev, self.points.get(idx)) {
            (Some(prev), Some(next)) if next.kind == PointKind::LinearRamp => {
                let span = next.time - prev.time;
                if span <= 0.0 {
                    return next.value;
                }
                let t = (time - prev.time) / span;
                prev.value + (next.value - prev.value) * t
            }
            (Some(prev), _) => prev.value,
            (None, _) => self.initial,
        }
    }

    /// Drop every point at or after `time`.
    fn cancel_from(&mut self, time: f64) {
        let cut = self.points.partition_point(|p| p.time < time);
        self.points.truncate(cut);
    }

    /// Freeze the curve at its current value: cancel the future and anchor
    /// at `time` with whatever value the curve had there.
    ///
    /// If a ramp was in flight the anchor is itself a ramp point, so the
    /// part of the curve before `time` is left exactly as it was.
    pub fn hold_at(&mut self, time: f64) -> f64 {
        let value = self.value_at(time);
        let cut = self.points.partition_point(|p| p.time < time);
        let mid_ramp =
            cut > 0 && self.points.get(cut).is_some_and(|p| p.kind == PointKind::LinearRamp);

        self.cancel_from(time);
        self.points.push(Point {
            time,
            value,
            kind: if mid_ramp {
                PointKind::LinearRamp
            } else {
                PointKind::Set
            },
        });
        value
    }

    /// Discard points that can no longer affect any time `>= time`.
    pub fn forget_before(&mut self, time: f64) {
        let idx = self.points.partition_point(|p| p.time <= time);
        if idx > 1 {
            self.points.drain(..idx - 1);
        }
    }
}

/// Gain envelope for one voice.
#[derive(Debug, Clone)]
pub struct Envelope {
    shape: EnvelopeConfig,
    gain: Automation,
    /// When the current attack ramp peaks.
    attack_end: f64,
    /// When the current decay ramp settles on the sustain level.
    decay_end: f64,
}

impl Envelope {
    /// Start a fresh note: 0 → velocity → velocity × sustain.
    pub fn start(shape: EnvelopeConfig, velocity: f64, now: f64) -> Self {
        let mut env = Envelope {
            shape,
            gain: Automation::new(0.0),
            attack_end: now,
            decay_end: now,
        };
        env.gain.set_value_at(now, 0.0);
        env.ramp_up(velocity, now, shape.attack);
        env
    }

    /// Re-attack from the current level with the short retrigger ramp.
    pub fn retrigger(&mut self, velocity: f64, now: f64) {
        self.gain.hold_at(now);
        self.ramp_up(velocity, now, self.shape.retrigger_attack);
    }

    fn ramp_up(&mut self, velocity: f64, now: f64, attack: f64) {
        self.attack_end = now + attack;
        self.decay_end = self.attack_end + self.shape.decay;
        self.gain.linear_ramp_to(self.attack_end, velocity);
        self.gain
            .linear_ramp_to(self.decay_end, velocity * self.shape.sustain);
    }

    /// Fade to silence from wherever the curve is at `now`.
    pub fn release(&mut self, now: f64) {
        self.gain.hold_at(now);
        self.gain.linear_ramp_to(now + self.shape.release, 0.0);
    }

    #[inline]
    pub fn gain_at(&self, time: f64) -> f64 {
        self.gain.value_at(time)
    }

    pub fn attack_end(&self) -> f64 {
        self.attack_end
    }

    pub fn decay_end(&self) -> f64 {
        self.decay_end
    }

    pub fn forget_before(&mut self, time: f64) {
        self.gain.forget_before(time);
    }
}
