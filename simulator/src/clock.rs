//! The virtual clock.
//!
//! System time is the simulation's notion of "now"; user time is the share
//! of it spent executing user programs. Kernel overheads are charged at the
//! costs fixed when the clock is created.

use std::fmt;

pub struct SimulationClock {
    system_time: u64,
    user_time: u64,
    /// Cost in time units of a system call. Interrupt handlers are kernel
    /// code, so an interrupt is charged the same.
    syscall_cost: u64,
    /// Cost in time units of a context switch.
    switch_cost: u64,
    syscalls: u64,
    interrupts: u64,
    context_switches: u64,
}

impl SimulationClock {
    /// Creates a clock at time zero with the given overhead costs.
    ///
    /// * `syscall_cost` - time charged per system call or interrupt
    /// * `switch_cost` - time charged per context switch
    pub fn new(syscall_cost: u64, switch_cost: u64) -> SimulationClock {
        SimulationClock {
            system_time: 0,
            user_time: 0,
            syscall_cost,
            switch_cost,
            syscalls: 0,
            interrupts: 0,
            context_switches: 0,
        }
    }

    /// Current system time.
    pub fn now(&self) -> u64 {
        self.system_time
    }

    pub fn system_time(&self) -> u64 {
        self.system_time
    }

    pub fn user_time(&self) -> u64 {
        self.user_time
    }

    pub fn syscalls(&self) -> u64 {
        self.syscalls
    }

    pub fn interrupts(&self) -> u64 {
        self.interrupts
    }

    pub fn context_switches(&self) -> u64 {
        self.context_switches
    }

    /// Advances both user time and system time by `time` units.
    pub(crate) fn advance_user(&mut self, time: u64) {
        self.user_time += time;
        self.system_time += time;
    }

    /// Advances system time only.
    pub(crate) fn advance_system(&mut self, time: u64) {
        self.system_time += time;
    }

    /// Charges the cost of one system call.
    pub(crate) fn log_syscall(&mut self) {
        self.syscalls += 1;
        self.system_time += self.syscall_cost;
    }

    /// Charges the cost of one interrupt. Interrupt handlers run in the
    /// kernel, so the cost equals the system-call cost.
    pub(crate) fn log_interrupt(&mut self) {
        self.interrupts += 1;
        self.system_time += self.syscall_cost;
    }

    /// Charges the cost of one context switch.
    pub(crate) fn log_context_switch(&mut self) {
        self.context_switches += 1;
        self.system_time += self.switch_cost;
    }

    /// Resets system time. The run loop starts from zero regardless of
    /// overhead charged while the workload was being built.
    pub(crate) fn set_system_time(&mut self, time: u64) {
        self.system_time = time;
    }
}

impl fmt::Display for SimulationClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "System time: {}; user time: {}; system calls: {}; interrupts: {}",
            self.system_time, self.user_time, self.syscalls, self.interrupts
        )
    }
}
