//! Rhythm mode: scheduled notes fall toward a hit line and inputs are scored
//! against them.

pub mod scheduler;
pub mod scoring;

pub use scheduler::{NoteProjection, NoteScheduler, ScheduledNote, Tick};
pub use scoring::{HitEvaluator, HitOutcome, points_for};
