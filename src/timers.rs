//! Cancellable, pausable timers on a millisecond clock.
//!
//! Timers carry a tag, never a closure. When one fires, the controller
//! dispatches on the tag against the session state as it is at that moment,
//! so a continuation can never act on a snapshot taken when it was scheduled.

/// What a pending timer does when it fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// One second of the pre-game countdown has elapsed.
    CountdownTick,
    /// The presentation phase (sequence display, cue) is over.
    MemorizeEnd,
    /// The player did not respond in time.
    ResponseTimeout,
    /// The feedback display is over; decide what comes next.
    FeedbackEnd,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Timer {
    kind: TimerKind,
    due: u64,
}

/// Pending timers of a single session.
#[derive(Clone, Debug, Default)]
pub struct Timers {
    pending: Vec<Timer>,
    paused_at: Option<u64>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `kind` to fire `delay_ms` after `now`, replacing any pending
    /// timer of the same kind.
    pub fn schedule(&mut self, kind: TimerKind, now: u64, delay_ms: u64) {
        self.cancel(kind);
        self.pending.push(Timer {
            kind,
            due: now.saturating_add(delay_ms),
        });
    }

    pub fn cancel(&mut self, kind: TimerKind) {
        self.pending.retain(|t| t.kind != kind);
    }

    pub fn cancel_all(&mut self) {
        self.pending.clear();
    }

    pub fn is_pending(&self, kind: TimerKind) -> bool {
        self.pending.iter().any(|t| t.kind == kind)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    /// Freeze every pending timer. Pausing twice keeps the first timestamp.
    pub fn pause(&mut self, now: u64) {
        if self.paused_at.is_none() {
            self.paused_at = Some(now);
        }
    }

    /// Thaw the timers, pushing every due time back by the paused span.
    /// Returns that span so callers can shift their own reference points.
    pub fn resume(&mut self, now: u64) -> u64 {
        let Some(paused_at) = self.paused_at.take() else {
            return 0;
        };
        let paused_for = now.saturating_sub(paused_at);
        for timer in &mut self.pending {
            timer.due = timer.due.saturating_add(paused_for);
        }
        paused_for
    }

    /// Due time of `kind`, if pending.
    pub fn due(&self, kind: TimerKind) -> Option<u64> {
        self.pending.iter().find(|t| t.kind == kind).map(|t| t.due)
    }

    /// Earliest due time of anything pending, `None` while paused.
    pub fn next_due(&self) -> Option<u64> {
        if self.paused_at.is_some() {
            return None;
        }
        self.pending.iter().map(|t| t.due).min()
    }

    /// Milliseconds left on `kind` as seen from `now` (frozen while paused).
    pub fn remaining(&self, kind: TimerKind, now: u64) -> Option<u64> {
        let reference = self.paused_at.unwrap_or(now);
        self.due(kind).map(|due| due.saturating_sub(reference))
    }

    /// Remove and return the earliest timer due at or before `now`, with its
    /// due time. Nothing fires while paused.
    pub fn pop_due(&mut self, now: u64) -> Option<(TimerKind, u64)> {
        if self.paused_at.is_some() {
            return None;
        }
        let idx = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due <= now)
            .min_by_key(|(_, t)| t.due)
            .map(|(idx, _)| idx)?;
        let timer = self.pending.remove(idx);
        Some((timer.kind, timer.due))
    }
}
