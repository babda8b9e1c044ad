//! Hit evaluation and score keeping.

use log::debug;
use serde::Serialize;

use crate::pitch::Pitch;

use super::scheduler::NoteScheduler;

/// Points for a hit `time_diff_ms` away from its target.
pub fn points_for(time_diff_ms: u64) -> u32 {
    match time_diff_ms {
        0..50 => 100,
        50..100 => 75,
        100..200 => 50,
        _ => 25,
    }
}

/// What a live input did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum HitOutcome {
    #[serde(rename_all = "camelCase")]
    Hit { points: u32, time_diff_ms: u64 },
    /// No eligible note; the input still sounds but scores nothing.
    Miss,
    /// No session running.
    Inactive,
}

#[derive(Debug, Clone, Default)]
pub struct HitEvaluator {
    score: u32,
    hits: u32,
}

impl HitEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Match `pitch` against the in-flight notes at `now`, consuming the
    /// earliest eligible one.
    pub fn handle_input(&mut self, scheduler: &mut NoteScheduler, pitch: Pitch, now: u64) -> HitOutcome {
        if !scheduler.is_session_active() {
            return HitOutcome::Inactive;
        }
        let Some(note) = scheduler
            .find_hit(pitch, now)
            .and_then(|index| scheduler.take(index))
        else {
            debug!("{pitch} at {now} ms: no note in window");
            return HitOutcome::Miss;
        };

        let time_diff_ms = note.target_ms.abs_diff(now);
        let points = points_for(time_diff_ms);
        self.score += points;
        self.hits += 1;
        debug!("{pitch} hit {time_diff_ms} ms off target: +{points} ({})", self.score);
        HitOutcome::Hit {
            points,
            time_diff_ms,
        }
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn hits(&self) -> u32 {
        self.hits
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
