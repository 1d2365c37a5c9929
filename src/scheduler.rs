//! Deferred-work handles. The pipeline never blocks; the few things
//! that happen later (temp-layer activation/deactivation, debounced
//! settings saves) are parked on a host-supplied scheduler and executed
//! through [`Registry::dispatch_work`](crate::registry::Registry::dispatch_work).

use std::time::{Duration, Instant};

/// What a parked unit of work wants done when its deadline passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkKind {
    TempLayerActivate,
    TempLayerDeactivate,
    SettingsSave,
}

/// Handle identifying one unit of deferred work: the owning processor
/// (its registry index) plus the kind. Holding an index instead of a
/// reference keeps the work queue free of back-pointers into the
/// registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkId {
    pub processor: usize,
    pub kind: WorkKind,
}

impl WorkId {
    pub const fn new(processor: usize, kind: WorkKind) -> Self {
        Self { processor, kind }
    }
}

/// Host-supplied executor for cancellable timers.
///
/// Scheduling an id that is already pending replaces its deadline;
/// cancelling an id that is not pending is a no-op.
pub trait Scheduler {
    fn schedule(&mut self, work: WorkId, delay: Duration);
    fn cancel(&mut self, work: WorkId);
}

/// Deadline-ordered work queue for hosts that drive a poll loop. Tests
/// use it too, advancing the clock by hand.
#[derive(Debug)]
pub struct ManualScheduler {
    now: Instant,
    pending: Vec<(WorkId, Instant)>,
}

impl ManualScheduler {
    pub fn new(now: Instant) -> Self {
        Self {
            now,
            pending: Vec::new(),
        }
    }

    /// Move the queue's clock. Deadlines are measured from the clock
    /// position at scheduling time.
    pub fn set_now(&mut self, now: Instant) {
        self.now = now;
    }

    pub fn is_pending(&self, work: WorkId) -> bool {
        self.pending.iter().any(|(w, _)| *w == work)
    }

    pub fn deadline(&self, work: WorkId) -> Option<Instant> {
        self.pending
            .iter()
            .find(|(w, _)| *w == work)
            .map(|&(_, deadline)| deadline)
    }

    /// Drain every entry due at `now`, earliest deadline first, and
    /// advance the clock.
    pub fn take_due(&mut self, now: Instant) -> Vec<WorkId> {
        self.set_now(now);
        let mut due: Vec<(WorkId, Instant)> = Vec::new();
        self.pending.retain(|&(work, deadline)| {
            if deadline <= now {
                due.push((work, deadline));
                false
            } else {
                true
            }
        });
        due.sort_by_key(|&(_, deadline)| deadline);
        due.into_iter().map(|(work, _)| work).collect()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&mut self, work: WorkId, delay: Duration) {
        let deadline = self.now + delay;
        if let Some(entry) = self.pending.iter_mut().find(|(w, _)| *w == work) {
            entry.1 = deadline;
        } else {
            self.pending.push((work, deadline));
        }
    }

    fn cancel(&mut self, work: WorkId) {
        self.pending.retain(|(w, _)| *w != work);
    }
}
