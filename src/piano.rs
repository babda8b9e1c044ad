//! Piano — the instrument as a whole.
//!
//! Owns the virtual clock, the timer queue, the voice registry, both play
//! modes and the output bus. Hosts feed it three kinds of events (inputs,
//! clock advances and render requests) from one thread; every deferred
//! callback is a task on the timer queue and fires from `advance_to`.

use log::{info, trace};
use serde::Serialize;

use crate::config::PianoConfig;
use crate::dsp::envelope::Stage;
use crate::dsp::mixer::OutputBus;
use crate::dsp::registry::{Notification, VoiceRegistry};
use crate::error::{KeyfallError, SongError};
use crate::game::{HitEvaluator, HitOutcome, NoteProjection, NoteScheduler, ScheduledNote};
use crate::input::{Input, Keymap};
use crate::pitch::Pitch;
use crate::playback::PlaybackSequencer;
use crate::song::{Song, SongBook};
use crate::timer::{Task, TimerHandle, TimerQueue};

/// Final result of a rhythm session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub final_score: u32,
    pub hits: u32,
    pub misses: u32,
}

/// Everything the UI needs to draw one frame of rhythm mode.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameReport {
    pub projections: Vec<NoteProjection>,
    pub culled: usize,
    pub summary: Option<SessionSummary>,
}

pub struct Piano {
    config: PianoConfig,
    now: u64,
    timers: TimerQueue<Task>,
    registry: VoiceRegistry,
    keymap: Keymap,
    songs: SongBook,
    bus: OutputBus,
    scheduler: NoteScheduler,
    evaluator: HitEvaluator,
    /// Pending feedback release per pitch. A newer one replaces the old.
    feedback: [Option<TimerHandle>; Pitch::COUNT],
    playback: PlaybackSequencer,
    /// Samples rendered so far.
    rendered: u64,
}

impl Piano {
    pub fn new(config: PianoConfig) -> Result<Self, KeyfallError> {
        config.validate()?;
        let songs = SongBook::builtin()?;
        info!(
            "piano ready: {} Hz, {} harmonics, {} songs",
            config.sample_rate,
            config.harmonics.len(),
            songs.songs().len()
        );

        Ok(Piano {
            now: 0,
            timers: TimerQueue::new(),
            registry: VoiceRegistry::new(&config),
            keymap: Keymap::new(&config.keymap),
            songs,
            bus: OutputBus::new(&config.limiter, config.sample_rate),
            scheduler: NoteScheduler::new(config.game),
            evaluator: HitEvaluator::new(),
            feedback: [None; Pitch::COUNT],
            playback: PlaybackSequencer::new(config.playback),
            rendered: 0,
            config,
        })
    }

    pub fn config(&self) -> &PianoConfig {
        &self.config
    }

    /// Current control time in milliseconds.
    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn songs(&self) -> &SongBook {
        &self.songs
    }

    pub fn songs_mut(&mut self) -> &mut SongBook {
        &mut self.songs
    }

    // ── Clock ───────────────────────────────────────────────

    /// Move the clock to `ms`, firing every task due on the way in deadline
    /// order. The clock never runs backwards.
    pub fn advance_to(&mut self, ms: u64) {
        if ms < self.now {
            trace!("clock asked to go back from {} to {ms} ms", self.now);
            return;
        }
        while let Some((handle, task)) = self.timers.pop_due(ms) {
            self.now = handle.due().max(self.now);
            self.dispatch(handle, task);
        }
        self.now = ms;
        self.registry.advance(ms);
    }

    pub fn advance_by(&mut self, ms: u64) {
        self.advance_to(self.now.saturating_add(ms));
    }

    /// When the next pending task falls due, so hosts can sleep until then.
    pub fn next_deadline(&self) -> Option<u64> {
        self.timers.next_due()
    }

    fn dispatch(&mut self, handle: TimerHandle, task: Task) {
        let now = self.now;
        match task {
            Task::Dispose(pitch) => self.registry.dispose(pitch, handle),
            Task::PlaybackTrigger(pitch) => {
                if self.playback.claim(handle) {
                    let velocity = self.registry.default_velocity();
                    self.registry.trigger(pitch, velocity, now, &mut self.timers);
                }
            }
            Task::PlaybackRelease(pitch) => {
                if self.playback.claim(handle) {
                    self.registry.release(pitch, now, &mut self.timers);
                }
            }
            Task::PlaybackFinished => {
                if self.playback.claim(handle) {
                    self.playback.stop(&mut self.timers, &mut self.registry);
                }
            }
            Task::FeedbackRelease(pitch) => {
                let slot = &mut self.feedback[pitch.index()];
                if *slot == Some(handle) {
                    *slot = None;
                    self.registry.release(pitch, now, &mut self.timers);
                } else {
                    trace!("{pitch}: stale feedback release");
                }
            }
        }
    }

    // ── Voices ──────────────────────────────────────────────

    pub fn trigger(&mut self, pitch: Pitch) {
        let velocity = self.registry.default_velocity();
        self.trigger_with_velocity(pitch, velocity);
    }

    pub fn trigger_with_velocity(&mut self, pitch: Pitch, velocity: f64) {
        self.registry
            .trigger(pitch, velocity, self.now, &mut self.timers);
    }

    pub fn release(&mut self, pitch: Pitch) {
        self.registry.release(pitch, self.now, &mut self.timers);
    }

    pub fn force_stop(&mut self, pitch: Pitch) {
        self.registry.force_stop(pitch, &mut self.timers);
    }

    pub fn force_stop_all(&mut self) {
        self.registry.force_stop_all(&mut self.timers);
    }

    pub fn stage(&self, pitch: Pitch) -> Option<Stage> {
        self.registry.stage(pitch)
    }

    pub fn live_voices(&self) -> usize {
        self.registry.live_count()
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        self.registry.drain_notifications()
    }

    /// Keyboard key bound to `pitch`, for labelling the on-screen key.
    pub fn key_label(&self, pitch: Pitch) -> Option<char> {
        self.keymap.key_for(pitch)
    }

    // ── Inputs ──────────────────────────────────────────────

    /// A keyboard key went down. `None` if the key is unbound or repeating.
    pub fn key_down(&mut self, key: char) -> Option<HitOutcome> {
        let pitch = self.keymap.resolve(key)?;
        self.press(Input::key(key), pitch)
    }

    /// A keyboard key came up. Returns the pitch that started fading.
    pub fn key_up(&mut self, key: char) -> Option<Pitch> {
        self.registry
            .lift(Input::key(key), self.now, &mut self.timers)
    }

    /// The pointer pressed an on-screen key. Moving onto another key lets
    /// go of the previous one first.
    pub fn pointer_down(&mut self, pitch: Pitch) -> Option<HitOutcome> {
        self.pointer_up();
        self.press(Input::Pointer, pitch)
    }

    pub fn pointer_up(&mut self) -> Option<Pitch> {
        self.registry
            .lift(Input::Pointer, self.now, &mut self.timers)
    }

    fn press(&mut self, input: Input, pitch: Pitch) -> Option<HitOutcome> {
        let velocity = self.registry.default_velocity();
        if !self
            .registry
            .press(input, pitch, velocity, self.now, &mut self.timers)
        {
            return None;
        }
        Some(self.evaluate(pitch, false))
    }

    /// Focus was lost: forget every held input and silence everything.
    pub fn blur(&mut self) {
        self.registry.clear_pressed();
        self.registry.force_stop_all(&mut self.timers);
        info!("focus lost, all voices stopped");
    }

    // ── Rhythm mode ─────────────────────────────────────────

    /// Start a rhythm session, replacing any running one.
    pub fn start_session(&mut self, song: &Song) {
        if self.scheduler.is_session_active() {
            self.end_session();
        }
        self.evaluator.reset();
        self.scheduler.start_session(song, self.now);
    }

    pub fn start_song(&mut self, name: &str) -> Result<(), SongError> {
        let song = self.songs.get(name)?.clone();
        self.start_session(&song);
        Ok(())
    }

    /// Per-frame update: projections for drawing, then culling.
    pub fn frame(&mut self) -> FrameReport {
        let tick = self.scheduler.tick(self.now);
        let summary = tick.ended.then(|| self.finish_session(0));
        FrameReport {
            projections: tick.projections,
            culled: tick.culled,
            summary,
        }
    }

    /// Host-driven input for rhythm mode. The note is sounded and released
    /// after the feedback delay, hit or not.
    pub fn game_input(&mut self, pitch: Pitch) -> HitOutcome {
        let velocity = self.registry.default_velocity();
        self.registry
            .trigger(pitch, velocity, self.now, &mut self.timers);
        self.evaluate(pitch, true)
    }

    fn evaluate(&mut self, pitch: Pitch, always_release: bool) -> HitOutcome {
        let outcome = self
            .evaluator
            .handle_input(&mut self.scheduler, pitch, self.now);
        if always_release || matches!(outcome, HitOutcome::Hit { .. }) {
            if let Some(stale) = self.feedback[pitch.index()].take() {
                self.timers.cancel(stale);
            }
            let due = self.now.saturating_add(self.config.game.feedback_release_ms);
            let handle = self.timers.schedule(due, Task::FeedbackRelease(pitch));
            self.feedback[pitch.index()] = Some(handle);
        }
        outcome
    }

    /// Stop the running session early. Notes still in flight count as missed.
    pub fn end_session(&mut self) -> Option<SessionSummary> {
        if !self.scheduler.is_session_active() {
            return None;
        }
        let remaining = self.scheduler.in_flight().len() as u32;
        self.scheduler.end_session();
        Some(self.finish_session(remaining))
    }

    fn finish_session(&mut self, unplayed: u32) -> SessionSummary {
        for handle in self.feedback.iter_mut().filter_map(Option::take) {
            self.timers.cancel(handle);
        }
        self.registry.force_stop_all(&mut self.timers);

        let summary = SessionSummary {
            final_score: self.evaluator.score(),
            hits: self.evaluator.hits(),
            misses: self.scheduler.missed() + unplayed,
        };
        info!(
            "session over: score {} ({} hits, {} misses)",
            summary.final_score, summary.hits, summary.misses
        );
        summary
    }

    pub fn score(&self) -> u32 {
        self.evaluator.score()
    }

    pub fn in_flight(&self) -> &[ScheduledNote] {
        self.scheduler.in_flight()
    }

    pub fn is_session_active(&self) -> bool {
        self.scheduler.is_session_active()
    }

    // ── Demo mode ───────────────────────────────────────────

    pub fn start_playback(&mut self, song: &Song) {
        self.playback
            .start(song, self.now, &mut self.timers, &mut self.registry);
    }

    pub fn play_song(&mut self, name: &str) -> Result<(), SongError> {
        let song = self.songs.get(name)?.clone();
        self.start_playback(&song);
        Ok(())
    }

    pub fn stop_playback(&mut self) {
        self.playback.stop(&mut self.timers, &mut self.registry);
    }

    pub fn is_playing(&self) -> bool {
        self.playback.is_playing()
    }

    // ── Audio ───────────────────────────────────────────────

    /// Render the next `frames` mono samples.
    pub fn render(&mut self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0; frames];
        self.render_into(&mut out);
        out
    }

    /// Render the next `out.len()` mono samples into `out`.
    pub fn render_into(&mut self, out: &mut [f32]) {
        let start = self.rendered as f64 / self.config.sample_rate;
        let buf = self.bus.clear(out.len());
        self.registry.render(start, buf);
        self.bus.finish(out);
        self.rendered += out.len() as u64;
    }

    /// Audio time (s) of the next sample to be rendered.
    pub fn audio_time(&self) -> f64 {
        self.rendered as f64 / self.config.sample_rate
    }

    /// Current limiter gain reduction in dB.
    pub fn gain_reduction(&self) -> f64 {
        self.bus.gain_reduction()
    }
}
