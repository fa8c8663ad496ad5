//! First-Come-First-Served scheduling.
//!
//! Processes are queued according to arrival time. Time on the CPU is only
//! relinquished when the current process terminates or blocks for I/O.

use std::collections::VecDeque;

use crate::device::IoDevice;
use crate::error::SimulationError;
use crate::machine::Machine;
use crate::process::{Pid, ProcessState};

use super::{dispatch, Interrupt, SystemCall};

pub struct FcfsKernel {
    /// Processes available for execution, ordered by arrival.
    ready: VecDeque<Pid>,
}

impl FcfsKernel {
    pub fn new() -> FcfsKernel {
        FcfsKernel {
            ready: VecDeque::new(),
        }
    }

    /// Place the next ready process on the CPU, if there is one.
    fn dispatch_next(&mut self, machine: &mut Machine) -> Result<Option<Pid>, SimulationError> {
        let next = self.ready.pop_front();
        dispatch(machine, next, None)
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

    /// FCFS handles WAKE_UP only; a TIME_OUT means the simulation was set
    /// up with a timer this kernel cannot honour.
    pub(crate) fn interrupt(
        &mut self,
        machine: &mut Machine,
        interrupt: Interrupt,
    ) -> Result<(), SimulationError> {
        match interrupt {
            Interrupt::TimeOut { .. } => Err(SimulationError::UnsupportedInterrupt {
                kernel: "FCFS",
                interrupt: "TIME_OUT",
            }),
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

impl Default for FcfsKernel {
    fn default() -> Self {
        FcfsKernel::new()
    }
}
