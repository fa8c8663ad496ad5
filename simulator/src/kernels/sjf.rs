//! Shortest-Job-First scheduling, preemptive.
//!
//! Ready processes are ordered by the remaining time of their current CPU
//! burst, ties broken by insertion order. A new arrival or a woken process
//! preempts the running one only when its burst is strictly shorter; an
//! equal estimate lets the running process continue.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::device::IoDevice;
use crate::error::SimulationError;
use crate::machine::Machine;
use crate::process::{Pid, ProcessState};

use super::{dispatch, Interrupt, SystemCall};

/// A ready process keyed by burst remaining at the time it was enqueued.
/// The remaining time of a READY process cannot change until it runs again,
/// so the key stays valid while the entry is queued.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct ReadyEntry {
    remaining: u64,
    seq: u64,
    pid: Pid,
}

impl PartialOrd for ReadyEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ReadyEntry {
    // Inverted so that BinaryHeap, a max-heap, pops the shortest burst,
    // earliest insertion first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .remaining
            .cmp(&self.remaining)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

pub struct SjfKernel {
    ready: BinaryHeap<ReadyEntry>,
    next_seq: u64,
}

impl SjfKernel {
    pub fn new() -> SjfKernel {
        SjfKernel {
            ready: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    fn push_ready(&mut self, machine: &Machine, pid: Pid) {
        let remaining = machine.processes().get(pid).burst_remaining();
        self.ready.push(ReadyEntry {
            remaining,
            seq: self.next_seq,
            pid,
        });
        self.next_seq += 1;
    }

    /// Place the shortest ready process on the CPU, if there is one.
    fn dispatch_next(&mut self, machine: &mut Machine) -> Result<Option<Pid>, SimulationError> {
        let next = self.ready.pop().map(|entry| entry.pid);
        dispatch(machine, next, None)
    }

    /// True when `candidate` should take the CPU from the running process:
    /// its current burst must be strictly shorter.
    fn preempts(&self, machine: &Machine, candidate: Pid) -> bool {
        match machine.cpu().current() {
            Some(running) => {
                machine.processes().get(candidate).burst_remaining()
                    < machine.processes().get(running).burst_remaining()
            }
            None => false,
        }
    }

    /// Displace the running process in favour of the queue. The displaced
    /// process was already moved to READY when the kernel was entered; it
    /// keeps its partially executed burst as its new key.
    fn preempt_running(&mut self, machine: &mut Machine) -> Result<(), SimulationError> {
        if let Some(running) = machine.cpu().current() {
            self.push_ready(machine, running);
            self.dispatch_next(machine)?;
        }
        Ok(())
    }

    pub(crate) fn syscall(
        &mut self,
        machine: &mut Machine,
        call: SystemCall,
    ) -> Result<(), SimulationError> {
        match call {
            SystemCall::MakeDevice { id, name } => {
                machine.add_device(IoDevice::new(id, name));
            }
            SystemCall::Execve { program, priority } => {
                let pid = machine.load_program(&program, priority)?;
                self.push_ready(machine, pid);
                if machine.cpu().is_idle() {
                    self.dispatch_next(machine)?;
                } else if self.preempts(machine, pid) {
                    self.preempt_running(machine)?;
                }
            }
            SystemCall::IoRequest { device, duration } => {
                let requester = machine.cpu().current().ok_or_else(|| {
                    SimulationError::invariant("IO_REQUEST without a running process")
                })?;
                machine.request_io(device, duration, requester)?;
                machine.set_state(requester, ProcessState::Waiting);
                self.dispatch_next(machine)?;
            }
            SystemCall::TerminateProcess => {
                let current = machine.cpu().current().ok_or_else(|| {
                    SimulationError::invariant("TERMINATE_PROCESS without a running process")
                })?;
                machine.set_state(current, ProcessState::Terminated);
                self.dispatch_next(machine)?;
            }
        }
        Ok(())
    }

    /// SJF handles WAKE_UP only; it never arms the system timer.
    pub(crate) fn interrupt(
        &mut self,
        machine: &mut Machine,
        interrupt: Interrupt,
    ) -> Result<(), SimulationError> {
        match interrupt {
            Interrupt::TimeOut { .. } => Err(SimulationError::UnsupportedInterrupt {
                kernel: "SJF",
                interrupt: "TIME_OUT",
            }),
            Interrupt::WakeUp { pid, .. } => {
                machine.set_state(pid, ProcessState::Ready);
                self.push_ready(machine, pid);
                if machine.cpu().is_idle() {
                    self.dispatch_next(machine)?;
                } else if self.preempts(machine, pid) {
                    self.preempt_running(machine)?;
                }
                Ok(())
            }
        }
    }
}

impl Default for SjfKernel {
    fn default() -> Self {
        SjfKernel::new()
    }
}

#[cfg(test)]
mod tests {
    use super::ReadyEntry;
    use crate::process::Pid;
    use std::collections::BinaryHeap;

    #[test]
    fn heap_pops_shortest_burst_first() {
        let mut heap = BinaryHeap::new();
        heap.push(ReadyEntry {
            remaining: 7,
            seq: 0,
            pid: Pid::new(1),
        });
        heap.push(ReadyEntry {
            remaining: 3,
            seq: 1,
            pid: Pid::new(2),
        });
        heap.push(ReadyEntry {
            remaining: 5,
            seq: 2,
            pid: Pid::new(3),
        });

        let order: Vec<u32> = std::iter::from_fn(|| heap.pop())
            .map(|entry| entry.pid.get())
            .collect();
        assert_eq!(order, vec![2, 3, 1]);
    }

    #[test]
    fn equal_bursts_pop_in_insertion_order() {
        let mut heap = BinaryHeap::new();
        for (seq, pid) in [(0, 4), (1, 2), (2, 9)] {
            heap.push(ReadyEntry {
                remaining: 6,
                seq,
                pid: Pid::new(pid),
            });
        }

        let order: Vec<u32> = std::iter::from_fn(|| heap.pop())
            .map(|entry| entry.pid.get())
            .collect();
        assert_eq!(order, vec![4, 2, 9]);
    }
}
