//! Voice registry — at most one voice per pitch.
//!
//! The registry is the only owner of voices and of the set of held inputs.
//! Every start, stop and teardown goes through it so the "one voice per
//! pitch" rule and the visual notifications stay consistent.

use log::{debug, trace, warn};
use serde::Serialize;

use crate::config::PianoConfig;
use crate::input::{Input, PressedInputs};
use crate::pitch::Pitch;
use crate::timer::{Task, TimerHandle, TimerQueue};

use super::envelope::Stage;
use super::voice::{Timbre, Voice};

/// Quietest velocity a voice can be started with.
const MIN_VELOCITY: f64 = 0.001;

/// Tells the UI to light up or dim a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub pitch: Pitch,
    pub active: bool,
}

#[derive(Debug, Clone)]
pub struct VoiceRegistry {
    voices: [Option<Voice>; Pitch::COUNT],
    timbre: Timbre,
    default_velocity: f64,
    pressed: PressedInputs,
    notifications: Vec<Notification>,
}

impl VoiceRegistry {
    pub fn new(config: &PianoConfig) -> Self {
        VoiceRegistry {
            voices: std::array::from_fn(|_| None),
            timbre: Timbre::new(config),
            default_velocity: config.default_velocity,
            pressed: PressedInputs::new(),
            notifications: Vec::new(),
        }
    }

    pub fn default_velocity(&self) -> f64 {
        self.default_velocity
    }

    fn sanitize_velocity(&self, velocity: f64) -> f64 {
        if !velocity.is_finite() {
            warn!("non-finite velocity {velocity}, using {}", self.default_velocity);
            return self.default_velocity;
        }
        velocity.clamp(MIN_VELOCITY, 1.0)
    }

    fn notify(&mut self, pitch: Pitch, active: bool) {
        self.notifications.push(Notification { pitch, active });
    }

    /// Start `pitch`, or re-attack it in place if it is already sounding.
    pub fn trigger(&mut self, pitch: Pitch, velocity: f64, now: u64, timers: &mut TimerQueue<Task>) {
        let velocity = self.sanitize_velocity(velocity);
        let slot = &mut self.voices[pitch.index()];
        let retriggered = match slot.as_mut() {
            Some(voice) => voice.retrigger(velocity, now, timers, &self.timbre),
            None => false,
        };
        if retriggered {
            debug!("{pitch}: retrigger at {now} ms, velocity {velocity:.2}");
        } else {
            if let Some(mut old) = slot.take() {
                old.force_stop(timers);
            }
            *slot = Some(Voice::new(pitch, velocity, now, &self.timbre));
            debug!("{pitch}: start at {now} ms, velocity {velocity:.2}");
        }
        self.notify(pitch, true);
    }

    /// Fade `pitch` out. Ignored while any held input still sounds it.
    pub fn release(&mut self, pitch: Pitch, now: u64, timers: &mut TimerQueue<Task>) {
        if self.pressed.is_held(pitch) {
            trace!("{pitch}: still held, release ignored");
            return;
        }
        if let Some(voice) = self.voices[pitch.index()].as_mut() {
            if voice.release(now, timers, &self.timbre) {
                debug!("{pitch}: release at {now} ms");
            }
        }
    }

    /// Tear `pitch` down at once, skipping the fade.
    pub fn force_stop(&mut self, pitch: Pitch, timers: &mut TimerQueue<Task>) {
        if let Some(mut voice) = self.voices[pitch.index()].take() {
            voice.force_stop(timers);
            debug!("{pitch}: force stop");
            self.notify(pitch, false);
        }
    }

    /// Silence everything and drop every pending disposal.
    pub fn force_stop_all(&mut self, timers: &mut TimerQueue<Task>) {
        for pitch in Pitch::ALL {
            self.force_stop(pitch, timers);
        }
        timers.retain(|task| !matches!(task, Task::Dispose(_)));
    }

    /// A disposal task fired.
    pub fn dispose(&mut self, pitch: Pitch, handle: TimerHandle) {
        let slot = &mut self.voices[pitch.index()];
        let Some(voice) = slot.as_mut() else {
            trace!("{pitch}: disposal for a voice that is already gone");
            return;
        };
        if voice.dispose_due(handle) {
            *slot = None;
            debug!("{pitch}: disposed");
            self.notify(pitch, false);
        }
    }

    /// Bring every voice's stage up to date with the clock.
    pub fn advance(&mut self, now: u64) {
        for voice in self.voices.iter_mut().flatten() {
            voice.advance(now);
        }
    }

    // ── Held inputs ─────────────────────────────────────────

    /// An input went down. Returns false for auto-repeat presses.
    pub fn press(
        &mut self,
        input: Input,
        pitch: Pitch,
        velocity: f64,
        now: u64,
        timers: &mut TimerQueue<Task>,
    ) -> bool {
        if !self.pressed.press(input, pitch) {
            return false;
        }
        self.trigger(pitch, velocity, now, timers);
        true
    }

    /// An input came up. Returns the pitch that started fading, or `None`
    /// if the input was not down or the pitch is still held elsewhere.
    pub fn lift(&mut self, input: Input, now: u64, timers: &mut TimerQueue<Task>) -> Option<Pitch> {
        let pitch = self.pressed.release(input)?;
        self.release(pitch, now, timers);
        Some(pitch)
    }

    pub fn clear_pressed(&mut self) {
        self.pressed.clear();
    }

    pub fn is_held(&self, pitch: Pitch) -> bool {
        self.pressed.is_held(pitch)
    }

    // ── Queries ─────────────────────────────────────────────

    pub fn voice(&self, pitch: Pitch) -> Option<&Voice> {
        self.voices[pitch.index()].as_ref()
    }

    pub fn stage(&self, pitch: Pitch) -> Option<Stage> {
        self.voice(pitch).map(Voice::stage)
    }

    /// Pitches with a voice, lowest first.
    pub fn active_pitches(&self) -> impl Iterator<Item = Pitch> + '_ {
        self.voices.iter().flatten().map(Voice::pitch)
    }

    pub fn live_count(&self) -> usize {
        self.voices.iter().flatten().count()
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    /// Sum every voice into `buf`, starting at audio time `start` (s).
    pub fn render(&mut self, start: f64, buf: &mut [f64]) {
        for voice in self.voices.iter_mut().flatten() {
            voice.render_add(start, buf);
        }
    }
}
