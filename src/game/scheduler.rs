//! Note scheduler — the falling notes of a rhythm session.

use log::info;
use serde::Serialize;

use crate::config::GameConfig;
use crate::pitch::Pitch;
use crate::song::Song;

/// A song note placed on the clock, waiting to be hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledNote {
    pub pitch: Pitch,
    pub target_ms: u64,
}

/// Where a falling note should be drawn this frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteProjection {
    pub pitch: Pitch,
    /// Negative once the target has passed.
    pub time_until_hit_ms: i64,
    /// 0 at the top of the lane, 1 at the hit line.
    pub fall_progress: f64,
}

/// Result of one scheduler tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tick {
    pub projections: Vec<NoteProjection>,
    pub culled: usize,
    /// Set on the tick that emptied the in-flight set.
    pub ended: bool,
}

#[derive(Debug, Clone)]
pub struct NoteScheduler {
    config: GameConfig,
    in_flight: Vec<ScheduledNote>,
    active: bool,
    missed: u32,
}

impl NoteScheduler {
    pub fn new(config: GameConfig) -> Self {
        NoteScheduler {
            config,
            in_flight: Vec::new(),
            active: false,
            missed: 0,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Place every note of `song` on the clock, `lead_in_ms` after `now`.
    ///
    /// The in-flight set is ordered by target time; notes sharing a target
    /// keep their song order. Replaces any running session.
    pub fn start_session(&mut self, song: &Song, now: u64) {
        let lead_in = self.config.lead_in_ms;
        self.in_flight = song
            .notes
            .iter()
            .map(|n| ScheduledNote {
                pitch: n.pitch,
                target_ms: now.saturating_add(n.offset_ms).saturating_add(lead_in),
            })
            .collect();
        self.in_flight.sort_by_key(|n| n.target_ms);
        self.missed = 0;
        self.active = !self.in_flight.is_empty();
        info!(
            "session '{}' started at {now} ms with {} notes",
            song.name,
            self.in_flight.len()
        );
    }

    /// Project every in-flight note for drawing, then cull the ones whose
    /// window has closed. Ends the session once nothing is left.
    pub fn tick(&mut self, now: u64) -> Tick {
        if !self.active {
            return Tick::default();
        }

        let lane_ms = self.config.note_speed_seconds * 1000.0;
        let projections = self
            .in_flight
            .iter()
            .map(|n| {
                let time_until_hit_ms = signed_distance(now, n.target_ms);
                NoteProjection {
                    pitch: n.pitch,
                    time_until_hit_ms,
                    fall_progress: 1.0 - time_until_hit_ms as f64 / lane_ms,
                }
            })
            .collect();

        let window = self.config.hit_window_ms;
        let before = self.in_flight.len();
        self.in_flight
            .retain(|n| n.target_ms.saturating_add(window) > now);
        let culled = before - self.in_flight.len();
        self.missed += culled as u32;

        let ended = self.in_flight.is_empty();
        if ended {
            self.active = false;
        }
        Tick {
            projections,
            culled,
            ended,
        }
    }

    /// Earliest in-flight note for `pitch` within the hit window of `now`.
    pub fn find_hit(&self, pitch: Pitch, now: u64) -> Option<usize> {
        let window = self.config.hit_window_ms;
        self.in_flight
            .iter()
            .position(|n| n.pitch == pitch && n.target_ms.abs_diff(now) < window)
    }

    /// Remove the note at `index`; a note can be consumed only once.
    pub fn take(&mut self, index: usize) -> Option<ScheduledNote> {
        (index < self.in_flight.len()).then(|| self.in_flight.remove(index))
    }

    /// Stop the session, dropping whatever is still in flight.
    pub fn end_session(&mut self) {
        self.in_flight.clear();
        self.active = false;
    }

    pub fn in_flight(&self) -> &[ScheduledNote] {
        &self.in_flight
    }

    pub fn is_session_active(&self) -> bool {
        self.active
    }

    /// Notes culled unhit in the current (or last) session.
    pub fn missed(&self) -> u32 {
        self.missed
    }
}

/// `to - from` in ms, saturating at the ends of `i64`.
fn signed_distance(from: u64, to: u64) -> i64 {
    if to >= from {
        i64::try_from(to - from).unwrap_or(i64::MAX)
    } else {
        i64::try_from(from - to).map_or(i64::MIN, |d| -d)
    }
}
