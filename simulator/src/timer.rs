//! The system timer.
//!
//! The timer hands out timeout interrupts for preemptive kernels. A process
//! has at most one pending timeout; arming again supersedes the previous
//! one. Cancellation is logical: each arming gets a fresh generation, a
//! `TimeOut` event carries the generation it was armed under, and an event
//! whose generation no longer matches is discarded when it reaches the head
//! of the queue.

use std::collections::HashMap;

use crate::process::Pid;

#[derive(Default)]
pub struct SystemTimer {
    pending: HashMap<Pid, u64>,
    next_generation: u64,
}

impl SystemTimer {
    pub fn new() -> SystemTimer {
        SystemTimer {
            pending: HashMap::new(),
            next_generation: 0,
        }
    }

    /// Arms a timeout for `pid`, superseding any pending one, and returns
    /// the generation to stamp on the event.
    pub(crate) fn arm(&mut self, pid: Pid) -> u64 {
        self.next_generation += 1;
        self.pending.insert(pid, self.next_generation);
        self.next_generation
    }

    /// Cancels the pending timeout for `pid`, if any.
    pub(crate) fn cancel(&mut self, pid: Pid) {
        self.pending.remove(&pid);
    }

    /// Reports whether a timeout armed under `generation` is still the
    /// pending one for `pid`.
    pub fn is_pending(&self, pid: Pid, generation: u64) -> bool {
        self.pending.get(&pid) == Some(&generation)
    }

    pub fn has_pending(&self, pid: Pid) -> bool {
        self.pending.contains_key(&pid)
    }

    /// Clears the pending entry once its timeout fires.
    pub(crate) fn acknowledge(&mut self, pid: Pid) {
        self.pending.remove(&pid);
    }
}

#[cfg(test)]
mod tests {
    use super::SystemTimer;
    use crate::process::Pid;

    #[test]
    fn rearming_supersedes_the_previous_timeout() {
        let mut timer = SystemTimer::new();
        let pid = Pid::new(1);

        let first = timer.arm(pid);
        let second = timer.arm(pid);
        assert!(!timer.is_pending(pid, first));
        assert!(timer.is_pending(pid, second));
    }

    #[test]
    fn cancelled_timeouts_are_stale() {
        let mut timer = SystemTimer::new();
        let pid = Pid::new(2);

        let generation = timer.arm(pid);
        timer.cancel(pid);
        assert!(!timer.is_pending(pid, generation));
        assert!(!timer.has_pending(pid));
    }

    #[test]
    fn generations_are_per_arming_not_per_process() {
        let mut timer = SystemTimer::new();
        let first = timer.arm(Pid::new(1));
        let second = timer.arm(Pid::new(2));
        assert_ne!(first, second);
        assert!(timer.is_pending(Pid::new(1), first));
        assert!(timer.is_pending(Pid::new(2), second));
    }
}
