//! The machine ties the hardware components together.
//!
//! It owns the clock, the CPU, the devices, the system timer, the process
//! table, the profiler and the event queue for the lifetime of one run, and
//! implements the operations that cut across them: state changes that must
//! reach the profiler, mode switches, context switches, burst execution and
//! the I/O request/completion paths. Kernels mutate the run exclusively
//! through these operations.

use std::collections::BTreeMap;
use std::path::Path;

use crate::clock::SimulationClock;
use crate::cpu::{Cpu, Mode};
use crate::device::IoDevice;
use crate::error::SimulationError;
use crate::event::{EventPayload, EventQueue};
use crate::process::{Burst, Pid, ProcessState, ProcessTable};
use crate::profile::Profiler;
use crate::timer::SystemTimer;
use crate::trace::{TRACE_CONTEXT_SWITCH, TRACE_DEVICE};

/// What a completed CPU burst asks the kernel for: either service for the
/// I/O burst that follows it, or termination when it was the last burst.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum BurstEnd {
    IoRequest { device: u32, duration: u64 },
    Terminate,
}

pub struct Machine {
    pub(crate) clock: SimulationClock,
    pub(crate) cpu: Cpu,
    pub(crate) events: EventQueue,
    pub(crate) timer: SystemTimer,
    pub(crate) procs: ProcessTable,
    pub(crate) profiler: Profiler,
    devices: BTreeMap<u32, IoDevice>,
}

impl Machine {
    /// Creates an idle machine with the given kernel overhead costs.
    pub fn new(syscall_cost: u64, switch_cost: u64) -> Machine {
        Machine {
            clock: SimulationClock::new(syscall_cost, switch_cost),
            cpu: Cpu::new(),
            events: EventQueue::new(),
            timer: SystemTimer::new(),
            procs: ProcessTable::new(),
            profiler: Profiler::new(),
            devices: BTreeMap::new(),
        }
    }

    pub fn clock(&self) -> &SimulationClock {
        &self.clock
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn profiler(&self) -> &Profiler {
        &self.profiler
    }

    pub fn processes(&self) -> &ProcessTable {
        &self.procs
    }

    pub fn device(&self, id: u32) -> Option<&IoDevice> {
        self.devices.get(&id)
    }

    /// Registers a device. A device with the same id is replaced.
    pub(crate) fn add_device(&mut self, device: IoDevice) {
        self.devices.insert(device.id(), device);
    }

    fn device_mut(&mut self, id: u32) -> Result<&mut IoDevice, SimulationError> {
        self.devices
            .get_mut(&id)
            .ok_or(SimulationError::UnknownDevice { id })
    }

    /// Loads a program file and creates a READY process for it.
    ///
    /// * `path` - the program file
    /// * `priority` - priority from the workload file
    pub(crate) fn load_program(
        &mut self,
        path: &Path,
        priority: i32,
    ) -> Result<Pid, SimulationError> {
        let bursts = crate::process::load_bursts(path)?;
        let name = path.display().to_string();
        let pid = self.procs.allocate(name, priority, bursts);
        let pcb = self.procs.get(pid);
        self.profiler
            .create(pid, pcb.program_name(), self.clock.now(), pcb.state());
        Ok(pid)
    }

    /// Changes the state of a process and notifies the profiler.
    pub(crate) fn set_state(&mut self, pid: Pid, state: ProcessState) {
        debug_assert!(
            self.procs.get(pid).state().can_become(state),
            "illegal transition {} -> {} for pid {}",
            self.procs.get(pid).state(),
            state,
            pid
        );
        self.procs.get_mut(pid).set_state(state);
        self.profiler.record_state(pid, self.clock.now(), state);
    }

    /// Changes the CPU mode and notifies the profiler. A process must be on
    /// the CPU: USER mode is meaningless while idle, and kernel work is
    /// charged to whichever process it runs on behalf of.
    fn set_mode(&mut self, mode: Mode) {
        self.cpu.set_mode(mode);
        match self.cpu.current() {
            Some(pid) => self.profiler.record_mode(pid, self.clock.now(), mode),
            None => debug_assert!(false, "mode change on an idle CPU"),
        }
    }

    /// Switches the current process out and `next` in, charging the switch
    /// cost. Returns the previously running process; the caller is
    /// responsible for its state and for re-queueing it if appropriate.
    pub(crate) fn context_switch(&mut self, next: Option<Pid>) -> Option<Pid> {
        let old = self.cpu.swap_current(next);
        crate::ktrace!(
            TRACE_CONTEXT_SWITCH,
            "Time: {:010} Kernel: context switch {} -> {}",
            self.clock.now(),
            self.slot_name(old),
            self.slot_name(next)
        );
        self.clock.log_context_switch();
        old
    }

    fn slot_name(&self, slot: Option<Pid>) -> String {
        match slot {
            Some(pid) => self.procs.get(pid).to_string(),
            None => "{idle}".to_string(),
        }
    }

    /// Moves the running process to READY for the duration of a kernel
    /// entry that it did not itself request. Returns the suspended pid.
    pub(crate) fn suspend_current(&mut self) -> Option<Pid> {
        let current = self.cpu.current()?;
        debug_assert_eq!(self.procs.get(current).state(), ProcessState::Running);
        self.set_state(current, ProcessState::Ready);
        Some(current)
    }

    /// Restores a process suspended by `suspend_current`, but only if the
    /// kernel entry left it on the CPU.
    pub(crate) fn resume_if_current(&mut self, suspended: Option<Pid>) {
        if let Some(pid) = suspended {
            if self.cpu.current() == Some(pid) {
                self.set_state(pid, ProcessState::Running);
            }
        }
    }

    /// Runs the current process's CPU burst to completion, advancing user
    /// time by its remaining duration, and returns the post-burst request.
    pub(crate) fn execute_to_burst_end(&mut self) -> Result<BurstEnd, SimulationError> {
        let pid = self.cpu.current().ok_or_else(|| {
            SimulationError::invariant("execute_to_burst_end called while the CPU is idle")
        })?;

        self.set_mode(Mode::User);
        let used = match self.procs.get_mut(pid).current_burst_mut() {
            Burst::Cpu { remaining, .. } => {
                let used = *remaining;
                *remaining = 0;
                used
            }
            Burst::Io { .. } => {
                return Err(SimulationError::invariant(format!(
                    "pid {pid} is on the CPU but its current burst is I/O"
                )))
            }
        };
        self.clock.advance_user(used);
        self.set_mode(Mode::Supervisor);

        self.post_burst(pid)
    }

    /// Runs the current process's CPU burst for up to `limit` time units.
    ///
    /// If the burst has no more than `limit` remaining it completes and the
    /// post-burst request is returned. On an idle CPU the limit is charged
    /// to system time instead.
    pub(crate) fn execute_for(&mut self, limit: u64) -> Result<Option<BurstEnd>, SimulationError> {
        let pid = match self.cpu.current() {
            Some(pid) => pid,
            None => {
                self.clock.advance_system(limit);
                return Ok(None);
            }
        };

        self.set_mode(Mode::User);
        let (used, completed) = match self.procs.get_mut(pid).current_burst_mut() {
            Burst::Cpu { remaining, .. } => {
                if *remaining <= limit {
                    let used = *remaining;
                    *remaining = 0;
                    (used, true)
                } else {
                    *remaining -= limit;
                    (limit, false)
                }
            }
            Burst::Io { .. } => {
                return Err(SimulationError::invariant(format!(
                    "pid {pid} is on the CPU but its current burst is I/O"
                )))
            }
        };
        self.clock.advance_user(used);
        self.set_mode(Mode::Supervisor);

        if completed {
            self.post_burst(pid).map(Some)
        } else {
            Ok(None)
        }
    }

    /// A CPU burst just completed: advance the cursor onto the following
    /// I/O burst, or report termination if it was the last.
    fn post_burst(&mut self, pid: Pid) -> Result<BurstEnd, SimulationError> {
        if !self.procs.get(pid).has_next_instruction() {
            return Ok(BurstEnd::Terminate);
        }

        self.procs.get_mut(pid).next_instruction();
        match *self.procs.get(pid).current_burst() {
            Burst::Io { duration, device } => Ok(BurstEnd::IoRequest { device, duration }),
            Burst::Cpu { .. } => Err(SimulationError::invariant(format!(
                "program \"{}\" does not alternate CPU and I/O bursts",
                self.procs.get(pid).program_name()
            ))),
        }
    }

    /// Hands an I/O request to a device and schedules its completion.
    pub(crate) fn request_io(
        &mut self,
        device_id: u32,
        duration: u64,
        pid: Pid,
    ) -> Result<(), SimulationError> {
        let now = self.clock.now();
        let wake_at = {
            let device = self.device_mut(device_id)?;
            device.admit(now, duration, pid)
        };
        crate::ktrace!(
            TRACE_DEVICE,
            "Time: {:010} device(id={}): request from pid {} completes at {}",
            now,
            device_id,
            pid,
            wake_at
        );
        self.events
            .schedule(wake_at, EventPayload::WakeUp { device: device_id, pid })
    }

    /// An I/O completion fired: remove the process from the device queue
    /// and advance it onto the CPU burst that follows.
    pub(crate) fn complete_io(&mut self, device_id: u32, pid: Pid) -> Result<(), SimulationError> {
        let removed = self.device_mut(device_id)?.complete(pid);
        if !removed {
            return Err(SimulationError::invariant(format!(
                "wake-up for pid {pid} on device {device_id} without a pending request"
            )));
        }
        if !self.procs.get(pid).has_next_instruction() {
            return Err(SimulationError::invariant(format!(
                "program \"{}\" ends with an I/O burst",
                self.procs.get(pid).program_name()
            )));
        }
        self.procs.get_mut(pid).next_instruction();
        Ok(())
    }

    /// Arms a timeout for `pid` and schedules the interrupt.
    pub(crate) fn schedule_timeout(&mut self, delay: u64, pid: Pid) -> Result<(), SimulationError> {
        let generation = self.timer.arm(pid);
        let time = self.clock.now() + delay;
        self.events
            .schedule(time, EventPayload::TimeOut { pid, generation })
    }

    pub(crate) fn cancel_timeout(&mut self, pid: Pid) {
        self.timer.cancel(pid);
    }
}
