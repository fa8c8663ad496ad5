//! Time-stamped events and the queue that orders them.
//!
//! Events are ordered by (timestamp, insertion sequence). The sequence
//! number makes ordering deterministic: among events with equal timestamps,
//! the one scheduled first fires first, and anything a handler schedules at
//! the current instant fires after the handler returns.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::path::PathBuf;

use crate::error::SimulationError;
use crate::process::Pid;

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum EventPayload {
    /// Load a program and create a process for it.
    Execve { program: PathBuf, priority: i32 },
    /// An I/O request on `device` completed for `pid`.
    WakeUp { device: u32, pid: Pid },
    /// The running slice of `pid` expired. The generation ties the event to
    /// the timer arming that produced it; a stale generation means the
    /// timeout was cancelled or superseded.
    TimeOut { pid: Pid, generation: u64 },
}

#[derive(Clone, Debug)]
pub struct Event {
    pub time: u64,
    pub seq: u64,
    pub payload: EventPayload,
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}

impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    // Inverted so that BinaryHeap, a max-heap, pops the earliest event.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Priority queue of events keyed by (time, seq).
#[derive(Default)]
pub struct EventQueue {
    heap: BinaryHeap<Event>,
    next_seq: u64,
    /// Timestamp of the most recently popped event. Scheduling behind it is
    /// a kernel bug surfaced as `Ordering`.
    floor: u64,
}

impl EventQueue {
    pub fn new() -> EventQueue {
        EventQueue {
            heap: BinaryHeap::new(),
            next_seq: 0,
            floor: 0,
        }
    }

    /// Assigns the next sequence number to `payload` and inserts it at
    /// `time`.
    pub fn schedule(&mut self, time: u64, payload: EventPayload) -> Result<(), SimulationError> {
        if time < self.floor {
            return Err(SimulationError::Ordering {
                time,
                floor: self.floor,
            });
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Event { time, seq, payload });
        Ok(())
    }

    pub fn peek(&self) -> Option<&Event> {
        self.heap.peek()
    }

    /// Removes and returns the earliest event, raising the dispatch floor
    /// to its timestamp.
    pub fn pop(&mut self) -> Option<Event> {
        let event = self.heap.pop();
        if let Some(event) = &event {
            self.floor = event.time;
        }
        event
    }

    /// Removes the earliest event without raising the dispatch floor.
    ///
    /// Cancelled timeouts are discarded as soon as they reach the head,
    /// which may be before the clock gets near their timestamp; they must
    /// not constrain where later events can be scheduled.
    pub fn discard(&mut self) -> Option<Event> {
        self.heap.pop()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wake(device: u32) -> EventPayload {
        EventPayload::WakeUp {
            device,
            pid: Pid::new(1),
        }
    }

    #[test]
    fn pops_in_time_order() {
        let mut queue = EventQueue::new();
        queue.schedule(5, wake(0)).unwrap();
        queue.schedule(2, wake(1)).unwrap();
        queue.schedule(9, wake(2)).unwrap();

        let times: Vec<u64> = std::iter::from_fn(|| queue.pop()).map(|e| e.time).collect();
        assert_eq!(times, vec![2, 5, 9]);
    }

    #[test]
    fn equal_timestamps_pop_in_insertion_order() {
        let mut queue = EventQueue::new();
        for device in 0..4 {
            queue.schedule(7, wake(device)).unwrap();
        }

        let devices: Vec<u32> = std::iter::from_fn(|| queue.pop())
            .map(|e| match e.payload {
                EventPayload::WakeUp { device, .. } => device,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(devices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn discarding_does_not_raise_the_floor() {
        let mut queue = EventQueue::new();
        queue.schedule(10, wake(0)).unwrap();
        assert!(queue.discard().is_some());

        // The discarded event never dispatched, so earlier times stay open.
        assert!(queue.schedule(4, wake(1)).is_ok());
    }

    #[test]
    fn scheduling_behind_the_floor_fails() {
        let mut queue = EventQueue::new();
        queue.schedule(10, wake(0)).unwrap();
        queue.pop();

        assert!(queue.schedule(10, wake(1)).is_ok());
        assert!(matches!(
            queue.schedule(9, wake(2)),
            Err(SimulationError::Ordering { time: 9, floor: 10 })
        ));
    }
}
