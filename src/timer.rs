//! Deferred tasks on a virtual millisecond clock.
//!
//! Nothing here sleeps or spawns: the owner advances time and pops due
//! tasks one at a time, so callbacks never interleave with a mutation in
//! progress. Every scheduled task is revocable through its handle.

use std::collections::BTreeMap;

use crate::pitch::Pitch;

/// Work deferred by the instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// Tear down a releasing voice once its fade-out has finished.
    Dispose(Pitch),
    /// Demo playback: start a note.
    PlaybackTrigger(Pitch),
    /// Demo playback: end a note.
    PlaybackRelease(Pitch),
    /// Demo playback: the song is over.
    PlaybackFinished,
    /// Rhythm mode: release the note sounded for a hit.
    FeedbackRelease(Pitch),
}

/// Identifies one scheduled task.
///
/// Ordering is by deadline, then by scheduling order, which gives FIFO
/// firing for tasks sharing a deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle {
    due: u64,
    seq: u64,
}

impl TimerHandle {
    /// Deadline in milliseconds.
    #[inline]
    pub fn due(&self) -> u64 {
        self.due
    }
}

#[derive(Debug, Clone)]
pub struct TimerQueue<T> {
    entries: BTreeMap<TimerHandle, T>,
    next_seq: u64,
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_seq: 0,
        }
    }

    /// Schedule `task` to fire at `due` (ms).
    pub fn schedule(&mut self, due: u64, task: T) -> TimerHandle {
        let handle = TimerHandle {
            due,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.entries.insert(handle, task);
        handle
    }

    /// Revoke a task. Returns it if it had not fired or been cancelled yet.
    pub fn cancel(&mut self, handle: TimerHandle) -> Option<T> {
        self.entries.remove(&handle)
    }

    /// Remove and return the earliest task due at or before `now`.
    pub fn pop_due(&mut self, now: u64) -> Option<(TimerHandle, T)> {
        let (first, _) = self.entries.first_key_value()?;
        if first.due > now {
            return None;
        }
        self.entries.pop_first()
    }

    /// Deadline of the next pending task.
    pub fn next_due(&self) -> Option<u64> {
        self.entries.keys().next().map(|h| h.due)
    }

    /// Drop every pending task for which `keep` returns false.
    pub fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) {
        self.entries.retain(|_, task| keep(task));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_in_deadline_order() {
        let mut q = TimerQueue::new();
        q.schedule(30, "c");
        q.schedule(10, "a");
        q.schedule(20, "b");

        let fired: Vec<_> = std::iter::from_fn(|| q.pop_due(100).map(|(_, t)| t)).collect();
        assert_eq!(fired, vec!["a", "b", "c"]);
    }

    #[test]
    fn same_deadline_is_fifo() {
        let mut q = TimerQueue::new();
        q.schedule(5, 1);
        q.schedule(5, 2);
        q.schedule(5, 3);

        let fired: Vec<_> = std::iter::from_fn(|| q.pop_due(5).map(|(_, t)| t)).collect();
        assert_eq!(fired, vec![1, 2, 3]);
    }

    #[test]
    fn nothing_fires_early() {
        let mut q = TimerQueue::new();
        q.schedule(10, ());
        assert!(q.pop_due(9).is_none());
        assert!(q.pop_due(10).is_some());
    }

    #[test]
    fn cancelled_tasks_never_fire() {
        let mut q = TimerQueue::new();
        let h = q.schedule(10, "gone");
        q.schedule(20, "kept");

        assert_eq!(q.cancel(h), Some("gone"));
        assert_eq!(q.cancel(h), None, "second cancel is a no-op");

        let fired: Vec<_> = std::iter::from_fn(|| q.pop_due(u64::MAX).map(|(_, t)| t)).collect();
        assert_eq!(fired, vec!["kept"]);
    }

    #[test]
    fn fired_handle_is_no_longer_pending() {
        let mut q = TimerQueue::new();
        let h = q.schedule(0, ());
        let (popped, _) = q.pop_due(0).unwrap();
        assert_eq!(popped, h);
        assert_eq!(q.cancel(h), None, "fired task cannot be cancelled");
        assert_eq!(h.due(), 0);
    }

    #[test]
    fn retain_filters_by_task() {
        let mut q = TimerQueue::new();
        q.schedule(1, Task::Dispose(Pitch::C));
        q.schedule(2, Task::PlaybackFinished);
        q.schedule(3, Task::Dispose(Pitch::D));

        q.retain(|t| !matches!(t, Task::Dispose(_)));
        assert_eq!(q.len(), 1);
        assert_eq!(q.next_due(), Some(2));
    }
}
