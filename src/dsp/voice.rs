//! Voice — one sounding note: harmonic stack → master gain → low-pass.
//!
//! A voice owns all of its DSP state. Dropping it frees everything at once,
//! so disposal never has to tear the chain down piece by piece.

use log::debug;

use crate::config::{EnvelopeConfig, FilterConfig, Harmonic, PianoConfig};
use crate::pitch::Pitch;
use crate::timer::{Task, TimerHandle, TimerQueue};

use super::envelope::{Envelope, Stage, Transition};
use super::filter::LowPass;
use super::oscillator::Partial;

/// Convert control time (ms) to audio time (s).
#[inline]
pub fn seconds(ms: u64) -> f64 {
    ms as f64 / 1000.0
}

/// Everything needed to build a voice, derived once from the config.
#[derive(Debug, Clone)]
pub struct Timbre {
    pub harmonics: Vec<Harmonic>,
    pub filter: FilterConfig,
    pub envelope: EnvelopeConfig,
    pub sample_rate: f64,
    /// Release time rounded up to whole milliseconds.
    pub release_ms: u64,
}

impl Timbre {
    pub fn new(config: &PianoConfig) -> Self {
        Timbre {
            harmonics: config.harmonics.clone(),
            filter: config.filter,
            envelope: config.envelope,
            sample_rate: config.sample_rate,
            release_ms: config.envelope.release_ms(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Voice {
    pitch: Pitch,
    velocity: f64,
    stage: Stage,
    /// Audio time (s) of the first trigger.
    started_at: f64,
    partials: Vec<Partial>,
    filter: LowPass,
    envelope: Envelope,
    pending_disposal: Option<TimerHandle>,
    sample_rate: f64,
    /// Latest control time (s) seen. Envelope points from here on may
    /// still be edited, however far audio has rendered.
    control_time: f64,
}

impl Voice {
    /// Build a voice in the attack stage.
    pub fn new(pitch: Pitch, velocity: f64, now_ms: u64, timbre: &Timbre) -> Self {
        let now = seconds(now_ms);
        let fundamental = pitch.frequency();
        let partials = timbre
            .harmonics
            .iter()
            .map(|h| {
                Partial::new(
                    fundamental * h.multiplier as f64,
                    h.gain * velocity,
                    timbre.sample_rate,
                )
            })
            .collect();

        Voice {
            pitch,
            velocity,
            stage: Stage::Attacking,
            started_at: now,
            partials,
            filter: LowPass::new(
                timbre.filter.cutoff_for(velocity),
                timbre.filter.q,
                timbre.sample_rate,
            ),
            envelope: Envelope::start(timbre.envelope, velocity, now),
            pending_disposal: None,
            sample_rate: timbre.sample_rate,
            control_time: now,
        }
    }

    pub fn pitch(&self) -> Pitch {
        self.pitch
    }

    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn started_at(&self) -> f64 {
        self.started_at
    }

    pub fn pending_disposal(&self) -> Option<TimerHandle> {
        self.pending_disposal
    }

    pub fn cutoff(&self) -> f64 {
        self.filter.cutoff()
    }

    /// Envelope gain at audio time `time` (s).
    pub fn gain_at(&self, time: f64) -> f64 {
        self.envelope.gain_at(time)
    }

    fn apply(&mut self, transition: Transition) -> bool {
        match self.stage.next(transition) {
            Some(next) => {
                self.stage = next;
                true
            }
            None => false,
        }
    }

    /// Catch the stage up with the attack/decay curve at `now_ms`.
    pub fn advance(&mut self, now_ms: u64) {
        let now = seconds(now_ms);
        self.control_time = self.control_time.max(now);
        loop {
            let due = match self.stage {
                Stage::Attacking if now >= self.envelope.attack_end() => Transition::AttackDone,
                Stage::Decaying if now >= self.envelope.decay_end() => Transition::DecayDone,
                _ => break,
            };
            self.apply(due);
        }
    }

    fn cancel_disposal(&mut self, timers: &mut TimerQueue<Task>) {
        if let Some(handle) = self.pending_disposal.take() {
            timers.cancel(handle);
        }
    }

    /// Re-attack in place from the current gain. Oscillators keep running,
    /// so there is no phase restart click.
    pub fn retrigger(
        &mut self,
        velocity: f64,
        now_ms: u64,
        timers: &mut TimerQueue<Task>,
        timbre: &Timbre,
    ) -> bool {
        self.cancel_disposal(timers);
        self.advance(now_ms);
        if !self.apply(Transition::Retrigger) {
            return false;
        }
        self.velocity = velocity;
        self.filter.retune(timbre.filter.cutoff_for(velocity));
        self.envelope.retrigger(velocity, seconds(now_ms));
        true
    }

    /// Start the fade-out and schedule the teardown for when it ends.
    pub fn release(&mut self, now_ms: u64, timers: &mut TimerQueue<Task>, timbre: &Timbre) -> bool {
        self.advance(now_ms);
        if !self.apply(Transition::Release) {
            return false;
        }
        self.cancel_disposal(timers);
        self.envelope.release(seconds(now_ms));
        let handle = timers.schedule(
            now_ms.saturating_add(timbre.release_ms),
            Task::Dispose(self.pitch),
        );
        self.pending_disposal = Some(handle);
        true
    }

    /// Skip the fade and go straight to `Disposed`.
    pub fn force_stop(&mut self, timers: &mut TimerQueue<Task>) -> bool {
        self.cancel_disposal(timers);
        self.apply(Transition::ForceStop)
    }

    /// Handle a fired disposal task. Accepted only if `handle` is the
    /// voice's current disposal and the voice is still releasing.
    pub fn dispose_due(&mut self, handle: TimerHandle) -> bool {
        if self.pending_disposal != Some(handle) {
            debug!("{}: ignoring stale disposal", self.pitch);
            return false;
        }
        if !self.apply(Transition::DisposalDue) {
            return false;
        }
        self.pending_disposal = None;
        true
    }

    /// Add `buf.len()` samples starting at audio time `start` (s) into `buf`.
    pub fn render_add(&mut self, start: f64, buf: &mut [f64]) {
        let sample_rate = self.sample_rate;
        for (i, out) in buf.iter_mut().enumerate() {
            let t = start + i as f64 / sample_rate;
            let mut sum = 0.0;
            for partial in self.partials.iter_mut() {
                sum += partial.next_sample();
            }
            *out += self.filter.process(sum * self.envelope.gain_at(t));
        }
        // Keep every point control can still edit.
        let end = start + buf.len() as f64 / sample_rate;
        self.envelope.forget_before(end.min(self.control_time));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timbre() -> Timbre {
        Timbre::new(&PianoConfig::default())
    }

    #[test]
    fn builds_harmonic_stack() {
        let t = timbre();
        let v = Voice::new(Pitch::A, 0.5, 0, &t);
        assert_eq!(v.partials.len(), 4);
        assert!((v.partials[1].oscillator.frequency - 880.0).abs() < 1e-9);
        assert!((v.partials[0].gain - 0.35).abs() < 1e-9, "gain = relative × velocity");
        assert!((v.cutoff() - 5000.0).abs() < 1e-9);
        assert_eq!(v.stage(), Stage::Attacking);
    }

    #[test]
    fn stages_follow_the_clock() {
        let t = timbre();
        let mut v = Voice::new(Pitch::C, 0.8, 1000, &t);
        v.advance(1010);
        assert_eq!(v.stage(), Stage::Attacking);
        v.advance(1016);
        assert_eq!(v.stage(), Stage::Decaying);
        v.advance(1200);
        assert_eq!(v.stage(), Stage::Sustaining);
    }

    #[test]
    fn release_schedules_disposal() {
        let t = timbre();
        let mut timers = TimerQueue::new();
        let mut v = Voice::new(Pitch::C, 0.8, 0, &t);

        assert!(v.release(500, &mut timers, &t));
        assert_eq!(v.stage(), Stage::Releasing);
        let handle = v.pending_disposal().expect("disposal scheduled");
        assert_eq!(handle.due(), 800);
        assert!(!v.release(600, &mut timers, &t), "second release ignored");
        assert_eq!(timers.len(), 1);

        let (fired, task) = timers.pop_due(800).unwrap();
        assert_eq!(task, Task::Dispose(Pitch::C));
        assert!(v.dispose_due(fired));
        assert_eq!(v.stage(), Stage::Disposed);
        assert!(!v.dispose_due(fired), "disposal is idempotent");
    }

    #[test]
    fn retrigger_cancels_disposal() {
        let t = timbre();
        let mut timers = TimerQueue::new();
        let mut v = Voice::new(Pitch::E, 0.8, 0, &t);
        v.release(500, &mut timers, &t);
        let stale = v.pending_disposal().unwrap();

        assert!(v.retrigger(1.0, 600, &mut timers, &t));
        assert_eq!(v.stage(), Stage::Attacking);
        assert!(v.pending_disposal().is_none());
        assert!(timers.is_empty(), "pending disposal revoked");
        assert!(!v.dispose_due(stale), "stale handle rejected");
        assert_eq!(v.stage(), Stage::Attacking);
        assert!((v.cutoff() - 8000.0).abs() < 1e-9, "cutoff follows new velocity");
    }

    #[test]
    fn force_stop_is_terminal() {
        let t = timbre();
        let mut timers = TimerQueue::new();
        let mut v = Voice::new(Pitch::G, 0.8, 0, &t);
        v.release(100, &mut timers, &t);

        assert!(v.force_stop(&mut timers));
        assert!(timers.is_empty());
        assert_eq!(v.stage(), Stage::Disposed);
        assert!(!v.force_stop(&mut timers));
        assert!(!v.retrigger(0.8, 200, &mut timers, &t));
    }

    #[test]
    fn renders_audible_output() {
        let t = timbre();
        let mut v = Voice::new(Pitch::A, 0.8, 0, &t);
        let mut buf = vec![0.0; 4410];
        v.render_add(0.0, &mut buf);

        let peak = buf.iter().fold(0.0_f64, |m, s| m.max(s.abs()));
        assert!(peak > 0.1, "voice should be audible, peak {peak}");
        assert!(buf[0].abs() < 1e-9, "starts from silence");
    }

    #[test]
    fn release_after_rendering_ahead() {
        let t = timbre();
        let mut timers = TimerQueue::new();
        let mut v = Voice::new(Pitch::A, 0.8, 0, &t);
        // Audio runs 20 ms ahead of the control clock.
        let mut buf = vec![0.0; 882];
        v.render_add(0.0, &mut buf);

        assert!(v.release(12, &mut timers, &t));
        let at_release = v.gain_at(0.012);
        assert!((at_release - 0.64).abs() < 1e-9, "fade starts mid-attack, got {at_release}");
        let later = v.gain_at(0.02);
        let expected = 0.64 * (1.0 - 0.008 / 0.3);
        assert!((later - expected).abs() < 1e-9, "fading, got {later}");
    }

    #[test]
    fn retrigger_after_rendering_ahead() {
        let t = timbre();
        let mut timers = TimerQueue::new();
        let mut v = Voice::new(Pitch::C, 0.8, 0, &t);
        v.release(200, &mut timers, &t);
        let mut buf = vec![0.0; 4410];
        v.render_add(0.2, &mut buf);

        assert!(v.retrigger(0.8, 250, &mut timers, &t));
        let from = v.gain_at(0.25);
        assert!(from > 0.3, "re-attack starts from the fading level, got {from}");
        assert!((v.gain_at(0.255) - 0.8).abs() < 1e-9);
    }

    #[test]
    fn silent_after_release_finishes() {
        let t = timbre();
        let mut timers = TimerQueue::new();
        let mut v = Voice::new(Pitch::A, 0.8, 0, &t);
        v.release(100, &mut timers, &t);

        // 0.45 s onward: release ended at 0.4 s, filter ringing has died out.
        let mut buf = vec![0.0; 441];
        v.render_add(0.45, &mut buf);
        let peak = buf.iter().fold(0.0_f64, |m, s| m.max(s.abs()));
        assert!(peak < 1e-3, "released voice should be silent, peak {peak}");
    }
}
