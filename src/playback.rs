//! Demo mode: play a song back through the voice registry.

use std::collections::HashSet;

use log::{debug, info};

use crate::config::PlaybackConfig;
use crate::dsp::registry::VoiceRegistry;
use crate::song::Song;
use crate::timer::{Task, TimerHandle, TimerQueue};

#[derive(Debug, Clone)]
pub struct PlaybackSequencer {
    config: PlaybackConfig,
    /// Every task this sequencer still owns.
    pending: HashSet<TimerHandle>,
    playing: bool,
}

impl PlaybackSequencer {
    pub fn new(config: PlaybackConfig) -> Self {
        PlaybackSequencer {
            config,
            pending: HashSet::new(),
            playing: false,
        }
    }

    /// Schedule the whole song from `now`. A running playback is stopped
    /// first.
    pub fn start(
        &mut self,
        song: &Song,
        now: u64,
        timers: &mut TimerQueue<Task>,
        registry: &mut VoiceRegistry,
    ) {
        if self.playing {
            self.stop(timers, registry);
        }

        let hold = self.config.note_duration_ms;
        for note in &song.notes {
            let at = now.saturating_add(note.offset_ms);
            self.pending
                .insert(timers.schedule(at, Task::PlaybackTrigger(note.pitch)));
            self.pending
                .insert(timers.schedule(at.saturating_add(hold), Task::PlaybackRelease(note.pitch)));
        }
        let end = now
            .saturating_add(song.duration_ms())
            .saturating_add(self.config.tail_ms);
        self.pending.insert(timers.schedule(end, Task::PlaybackFinished));
        self.playing = true;
        info!(
            "playback of '{}' started at {now} ms, {} notes, ends at {end} ms",
            song.name,
            song.len()
        );
    }

    /// Cancel everything still scheduled and silence all voices.
    /// Safe to call when idle.
    pub fn stop(&mut self, timers: &mut TimerQueue<Task>, registry: &mut VoiceRegistry) {
        if !self.playing && self.pending.is_empty() {
            return;
        }
        for handle in self.pending.drain() {
            timers.cancel(handle);
        }
        registry.force_stop_all(timers);
        self.playing = false;
        info!("playback stopped");
    }

    /// Take ownership of a fired task back. Returns false if the task was
    /// not ours any more, in which case it must be ignored.
    pub fn claim(&mut self, handle: TimerHandle) -> bool {
        let owned = self.pending.remove(&handle);
        if !owned {
            debug!("ignoring playback task that is no longer scheduled");
        }
        owned
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PianoConfig;
    use crate::pitch::Pitch;
    use crate::song::SongNote;

    fn setup() -> (PlaybackSequencer, TimerQueue<Task>, VoiceRegistry) {
        (
            PlaybackSequencer::new(PlaybackConfig::default()),
            TimerQueue::new(),
            VoiceRegistry::new(&PianoConfig::default()),
        )
    }

    fn song() -> Song {
        Song::new(
            "two",
            vec![SongNote::new(Pitch::C, 0), SongNote::new(Pitch::E, 400)],
        )
    }

    #[test]
    fn schedules_trigger_release_and_finish() {
        let (mut seq, mut timers, mut reg) = setup();
        seq.start(&song(), 1000, &mut timers, &mut reg);
        assert!(seq.is_playing());
        assert_eq!(timers.len(), 5);

        let mut fired = Vec::new();
        while let Some((handle, task)) = timers.pop_due(u64::MAX) {
            assert!(seq.claim(handle));
            fired.push((handle.due(), task));
        }
        assert_eq!(
            fired,
            vec![
                (1000, Task::PlaybackTrigger(Pitch::C)),
                (1300, Task::PlaybackRelease(Pitch::C)),
                (1400, Task::PlaybackTrigger(Pitch::E)),
                (1700, Task::PlaybackRelease(Pitch::E)),
                (1900, Task::PlaybackFinished),
            ]
        );
    }

    #[test]
    fn stop_cancels_everything() {
        let (mut seq, mut timers, mut reg) = setup();
        seq.start(&song(), 0, &mut timers, &mut reg);
        reg.trigger(Pitch::C, 0.8, 0, &mut timers);

        seq.stop(&mut timers, &mut reg);
        assert!(!seq.is_playing());
        assert!(timers.is_empty(), "no task may fire after stop");
        assert_eq!(reg.live_count(), 0);

        seq.stop(&mut timers, &mut reg);
        assert!(!seq.is_playing());
    }

    #[test]
    fn restart_drops_previous_schedule() {
        let (mut seq, mut timers, mut reg) = setup();
        seq.start(&song(), 0, &mut timers, &mut reg);
        let (old, _) = timers.pop_due(0).unwrap();

        seq.start(&song(), 50, &mut timers, &mut reg);
        assert!(!seq.claim(old), "handle from the first run is stale");
        assert_eq!(timers.len(), 5);
    }

    #[test]
    fn far_offsets_saturate() {
        let (mut seq, mut timers, mut reg) = setup();
        let far = Song::new("far", vec![SongNote::new(Pitch::G, u64::MAX - 100)]);
        seq.start(&far, 1000, &mut timers, &mut reg);

        let dues: Vec<_> = std::iter::from_fn(|| timers.pop_due(u64::MAX))
            .map(|(handle, task)| (handle.due(), task))
            .collect();
        assert_eq!(
            dues,
            vec![
                (u64::MAX, Task::PlaybackTrigger(Pitch::G)),
                (u64::MAX, Task::PlaybackRelease(Pitch::G)),
                (u64::MAX, Task::PlaybackFinished),
            ]
        );
    }
}
