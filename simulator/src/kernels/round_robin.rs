//! Round Robin scheduling.
//!
//! Time on the CPU is allocated in slices. During a slice the current
//! process may still lose time to kernel activity (I/O interrupt handling,
//! new program loading), so a process is never guaranteed a full slice of
//! user time.

use std::collections::VecDeque;
use std::num::NonZeroU64;

use crate::device::IoDevice;
use crate::error::SimulationError;
use crate::machine::Machine;
use crate::process::{Pid, ProcessState};

use super::{dispatch, Interrupt, SystemCall};

pub struct RoundRobinKernel {
    /// Processes available for execution, ordered by arrival.
    ready: VecDeque<Pid>,
    /// Maximum slice of execution time available to a process.
    slice: NonZeroU64,
}

impl RoundRobinKernel {
    /// * `slice` - the time quanta a process receives per dispatch
    pub fn new(slice: NonZeroU64) -> RoundRobinKernel {
        RoundRobinKernel {
            ready: VecDeque::new(),
            slice,
        }
    }

    /// Place the next ready process on the CPU with a fresh slice.
    fn dispatch_next(&mut self, machine: &mut Machine) -> Result<Option<Pid>, SimulationError> {
        let next = self.ready.pop_front();
        dispatch(machine, next, Some(self.slice))
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
                self.ready.push_back(pid);
                if machine.cpu().is_idle() {
                    self.dispatch_next(machine)?;
                }
            }
            SystemCall::IoRequest { device, duration } => {
                let requester = machine.cpu().current().ok_or_else(|| {
                    SimulationError::invariant("IO_REQUEST without a running process")
                })?;
                machine.cancel_timeout(requester);
                machine.request_io(device, duration, requester)?;
                machine.set_state(requester, ProcessState::Waiting);
                self.dispatch_next(machine)?;
            }
            SystemCall::TerminateProcess => {
                let current = machine.cpu().current().ok_or_else(|| {
                    SimulationError::invariant("TERMINATE_PROCESS without a running process")
                })?;
                machine.set_state(current, ProcessState::Terminated);
                machine.cancel_timeout(current);
                self.dispatch_next(machine)?;
            }
        }
        Ok(())
    }

    pub(crate) fn interrupt(
        &mut self,
        machine: &mut Machine,
        interrupt: Interrupt,
    ) -> Result<(), SimulationError> {
        match interrupt {
            Interrupt::TimeOut { pid } => {
                // A timeout for a process no longer on the CPU belongs to a
                // slice that ended early; nothing to do.
                if machine.cpu().current() != Some(pid) {
                    return Ok(());
                }

                if self.ready.is_empty() {
                    // Give the current process another slice.
                    machine.schedule_timeout(self.slice.get(), pid)?;
                } else {
                    machine.set_state(pid, ProcessState::Ready);
                    let old = self.dispatch_next(machine)?;
                    if let Some(old) = old {
                        self.ready.push_back(old);
                    }
                }
                Ok(())
            }
            Interrupt::WakeUp { pid, .. } => {
                machine.set_state(pid, ProcessState::Ready);
                self.ready.push_back(pid);
                if machine.cpu().is_idle() {
                    self.dispatch_next(machine)?;
                }
                Ok(())
            }
        }
    }
}
