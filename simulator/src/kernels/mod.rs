//! The scheduling kernels.
//!
//! A kernel is entered through two operations: `syscall` for synchronous
//! requests (device creation, program load, I/O, termination) and
//! `interrupt` for asynchronous ones (timeouts, I/O completions). The
//! kernel owns the ready structure; everything else it reaches through the
//! machine.

use std::num::NonZeroU64;
use std::path::PathBuf;

use crate::error::SimulationError;
use crate::machine::Machine;
use crate::process::{Pid, ProcessState};
use crate::trace::TRACE_DISPATCH;

mod fcfs;
pub use fcfs::FcfsKernel;

mod round_robin;
pub use round_robin::RoundRobinKernel;

mod sjf;
pub use sjf::SjfKernel;

/// A synchronous request into the kernel.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum SystemCall {
    MakeDevice { id: u32, name: String },
    Execve { program: PathBuf, priority: i32 },
    IoRequest { device: u32, duration: u64 },
    TerminateProcess,
}

/// An asynchronous event signalled into the kernel.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Interrupt {
    TimeOut { pid: Pid },
    WakeUp { device: u32, pid: Pid },
}

/// The scheduling policy plugged into the simulation. The workload and the
/// driver are policy-agnostic; the variant decides who runs next and when
/// anyone is preempted.
pub enum Kernel {
    Fcfs(FcfsKernel),
    RoundRobin(RoundRobinKernel),
    Sjf(SjfKernel),
}

impl Kernel {
    pub fn fcfs() -> Kernel {
        Kernel::Fcfs(FcfsKernel::new())
    }

    /// * `slice` - maximum contiguous time budget a process receives per
    ///             entry into RUNNING
    pub fn round_robin(slice: NonZeroU64) -> Kernel {
        Kernel::RoundRobin(RoundRobinKernel::new(slice))
    }

    pub fn sjf() -> Kernel {
        Kernel::Sjf(SjfKernel::new())
    }

    pub fn name(&self) -> &'static str {
        match self {
            Kernel::Fcfs(_) => "FCFS",
            Kernel::RoundRobin(_) => "RR",
            Kernel::Sjf(_) => "SJF",
        }
    }

    /// Invokes the system call on the active policy.
    pub fn syscall(
        &mut self,
        machine: &mut Machine,
        call: SystemCall,
    ) -> Result<(), SimulationError> {
        match self {
            Kernel::Fcfs(kernel) => kernel.syscall(machine, call),
            Kernel::RoundRobin(kernel) => kernel.syscall(machine, call),
            Kernel::Sjf(kernel) => kernel.syscall(machine, call),
        }
    }

    /// Invokes the interrupt handler on the active policy.
    pub fn interrupt(
        &mut self,
        machine: &mut Machine,
        interrupt: Interrupt,
    ) -> Result<(), SimulationError> {
        match self {
            Kernel::Fcfs(kernel) => kernel.interrupt(machine, interrupt),
            Kernel::RoundRobin(kernel) => kernel.interrupt(machine, interrupt),
            Kernel::Sjf(kernel) => kernel.interrupt(machine, interrupt),
        }
    }
}

/// Places `next` on the CPU (or leaves it idle), marks it RUNNING, and for
/// a sliced kernel arms its timeout. Returns the process switched out.
pub(crate) fn dispatch(
    machine: &mut Machine,
    next: Option<Pid>,
    slice: Option<NonZeroU64>,
) -> Result<Option<Pid>, SimulationError> {
    let old = machine.context_switch(next);
    if let Some(pid) = next {
        machine.set_state(pid, ProcessState::Running);
        crate::ktrace!(
            TRACE_DISPATCH,
            "Time: {:010} Kernel: dispatch pid {}",
            machine.clock().now(),
            pid
        );
        if let Some(slice) = slice {
            machine.schedule_timeout(slice.get(), pid)?;
        }
    }
    Ok(old)
}
