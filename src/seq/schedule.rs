//! Deadline scheduling and cooperative cancellation.
//!
//! All sequencer timing flows through one [`Scheduler`]: components register
//! deadlines and react when `fire_due` hands them back. There is no callback
//! registry - the driver pumps the scheduler once per animation frame, and
//! tests pump it with a synthetic clock.

use std::cell::Cell;
use std::rc::Rc;

/// Handle to a pending deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

#[derive(Debug, Clone, Copy)]
struct Deadline {
    id: TimerId,
    fire_at: f64,
}

#[derive(Debug, Default)]
pub struct Scheduler {
    next_id: u64,
    pending: Vec<Deadline>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a deadline `delay_ms` after `now`.
    pub fn schedule(&mut self, now: f64, delay_ms: f64) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.pending.push(Deadline {
            id,
            fire_at: now + delay_ms,
        });
        id
    }

    /// Drop a pending deadline. Unknown or already-fired ids are ignored.
    pub fn cancel(&mut self, id: TimerId) {
        self.pending.retain(|d| d.id != id);
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.pending.iter().any(|d| d.id == id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Remove and return every deadline due by `now`, earliest first. Ties
    /// fire in registration order.
    pub fn fire_due(&mut self, now: f64) -> Vec<TimerId> {
        let mut due = Vec::new();
        self.pending.retain(|d| {
            if d.fire_at <= now {
                due.push(*d);
                false
            } else {
                true
            }
        });
        due.sort_by(|a, b| {
            a.fire_at
                .partial_cmp(&b.fire_at)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.id.0.cmp(&b.id.0))
        });
        due.into_iter().map(|d| d.id).collect()
    }
}

/// Cooperative cancellation shared by every scheduled continuation of one
/// playable session.
///
/// There is no preemption: a continuation already in flight must check the
/// token before producing visible effects.
#[derive(Debug, Clone)]
pub struct CancelToken(Rc<Cell<bool>>);

impl CancelToken {
    /// A live token.
    pub fn new() -> Self {
        Self(Rc::new(Cell::new(false)))
    }

    /// A token born cancelled - no session active yet.
    pub fn cancelled() -> Self {
        let token = Self::new();
        token.cancel();
        token
    }

    pub fn cancel(&self) {
        self.0.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fire_due_orders_by_deadline() {
        let mut sched = Scheduler::new();
        let late = sched.schedule(0.0, 200.0);
        let early = sched.schedule(0.0, 100.0);

        assert_eq!(sched.fire_due(50.0), vec![]);
        assert_eq!(sched.fire_due(250.0), vec![early, late]);
        // Fired deadlines are consumed.
        assert_eq!(sched.fire_due(250.0), vec![]);
    }

    #[test]
    fn test_ties_fire_in_registration_order() {
        let mut sched = Scheduler::new();
        let first = sched.schedule(0.0, 100.0);
        let second = sched.schedule(0.0, 100.0);
        assert_eq!(sched.fire_due(100.0), vec![first, second]);
    }

    #[test]
    fn test_cancel_removes_pending() {
        let mut sched = Scheduler::new();
        let id = sched.schedule(0.0, 100.0);
        assert!(sched.is_pending(id));

        sched.cancel(id);
        assert!(!sched.is_pending(id));
        assert_eq!(sched.fire_due(1000.0), vec![]);

        // Cancelling again is a no-op.
        sched.cancel(id);
    }

    #[test]
    fn test_zero_delay_fires_at_schedule_time() {
        let mut sched = Scheduler::new();
        let id = sched.schedule(10.0, 0.0);
        assert_eq!(sched.fire_due(10.0), vec![id]);
    }

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let shared = token.clone();
        assert!(!shared.is_cancelled());

        token.cancel();
        assert!(shared.is_cancelled());
    }

    #[test]
    fn test_cancelled_constructor() {
        assert!(CancelToken::cancelled().is_cancelled());
    }
}
