//! The simulation driver.
//!
//! A `Simulation` is built from a workload file and a kernel, then run to
//! completion. The driver owns the event loop: it lets the CPU execute
//! between events, dispatches each event into the kernel, and stops when no
//! event and no runnable process remains.

use std::fs;
use std::path::Path;

use crate::error::SimulationError;
use crate::event::{Event, EventPayload};
use crate::kernels::{Interrupt, Kernel, SystemCall};
use crate::machine::{BurstEnd, Machine};
use crate::trace::{TRACE_INTERRUPT, TRACE_SYSCALL};

pub struct Simulation {
    machine: Machine,
    kernel: Kernel,
}

impl Simulation {
    /// Creates an empty simulation.
    ///
    /// * `kernel` - the scheduling policy
    /// * `syscall_cost` - time units charged per system call or interrupt
    /// * `switch_cost` - time units charged per context switch
    pub fn new(kernel: Kernel, syscall_cost: u64, switch_cost: u64) -> Simulation {
        Simulation {
            machine: Machine::new(syscall_cost, switch_cost),
            kernel,
        }
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    /// Loads a workload file: `DEVICE` lines register devices with the
    /// kernel immediately, `PROGRAM` lines stage EXECVE events for the run.
    ///
    /// Program paths are resolved against the workload file's directory.
    pub fn build_workload(&mut self, path: &Path) -> Result<(), SimulationError> {
        let file_error = format!("workload file \"{}\"", path.display());
        let source =
            fs::read_to_string(path).map_err(|err| SimulationError::io(file_error.clone(), err))?;
        let parent = path.parent().unwrap_or_else(|| Path::new(""));

        for line in source.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut tokens = line.split_whitespace();
            match tokens.next() {
                Some("PROGRAM") => {
                    let start =
                        parse_field(&file_error, line, tokens.next(), "PROGRAM entry missing start time")?;
                    let priority = tokens
                        .next()
                        .and_then(|value| value.parse::<i32>().ok())
                        .ok_or_else(|| {
                            SimulationError::config(format!(
                                "{file_error}: PROGRAM entry missing priority: \"{line}\""
                            ))
                        })?;
                    let name = tokens.next().ok_or_else(|| {
                        SimulationError::config(format!(
                            "{file_error}: PROGRAM entry missing program name: \"{line}\""
                        ))
                    })?;
                    self.machine.events.schedule(
                        start,
                        EventPayload::Execve {
                            program: parent.join(name),
                            priority,
                        },
                    )?;
                }
                Some("DEVICE") => {
                    let id =
                        parse_field(&file_error, line, tokens.next(), "DEVICE entry missing device id")?
                            as u32;
                    let name = tokens.next().ok_or_else(|| {
                        SimulationError::config(format!(
                            "{file_error}: DEVICE entry missing device name: \"{line}\""
                        ))
                    })?;
                    crate::ktrace!(
                        TRACE_SYSCALL,
                        "Time: {:010} Kernel: syscall MAKE_DEVICE({id}, {name})",
                        self.machine.clock.now()
                    );
                    self.machine.clock.log_syscall();
                    self.kernel.syscall(
                        &mut self.machine,
                        SystemCall::MakeDevice {
                            id,
                            name: name.to_string(),
                        },
                    )?;
                }
                Some(token) => {
                    return Err(SimulationError::config(format!(
                        "{file_error}: unrecognised token \"{token}\" in line \"{line}\""
                    )))
                }
                None => unreachable!("blank lines are skipped above"),
            }
        }
        Ok(())
    }

    /// Runs the simulation to completion.
    ///
    /// System time restarts at zero; overhead charged while building the
    /// workload does not count against the run.
    pub fn run(&mut self) -> Result<(), SimulationError> {
        self.machine.clock.set_system_time(0);

        loop {
            // Cancelled timeouts are discarded when they reach the head so
            // they never drive execution.
            let stale = match self.machine.events.peek() {
                Some(event) => self.is_stale(event),
                None => false,
            };
            if stale {
                self.machine.events.discard();
                continue;
            }

            let target = match self.machine.events.peek() {
                Some(event) => event.time,
                None => {
                    if self.machine.cpu.is_idle() {
                        break;
                    }
                    // Nothing is staged: the current process runs until its
                    // burst ends and the resulting syscall makes progress.
                    let end = self.machine.execute_to_burst_end()?;
                    self.post_burst_syscall(end)?;
                    continue;
                }
            };

            let now = self.machine.clock.now();
            if now < target {
                if self.machine.cpu.is_idle() {
                    self.machine.clock.advance_system(target - now);
                } else if let Some(end) = self.machine.execute_for(target - now)? {
                    // The burst ended before the event was due. Its syscall
                    // may stage earlier events, so go back and peek again.
                    self.post_burst_syscall(end)?;
                }
                continue;
            }

            if let Some(event) = self.machine.events.pop() {
                self.dispatch_event(event)?;
            }
        }
        Ok(())
    }

    fn is_stale(&self, event: &Event) -> bool {
        match event.payload {
            EventPayload::TimeOut { pid, generation } => {
                !self.machine.timer.is_pending(pid, generation)
            }
            _ => false,
        }
    }

    /// Routes the request a completed CPU burst raised into the kernel.
    fn post_burst_syscall(&mut self, end: BurstEnd) -> Result<(), SimulationError> {
        match end {
            BurstEnd::IoRequest { device, duration } => {
                crate::ktrace!(
                    TRACE_SYSCALL,
                    "Time: {:010} Kernel: syscall IO_REQUEST(device {device}, {duration})",
                    self.machine.clock.now()
                );
                self.machine.clock.log_syscall();
                self.kernel
                    .syscall(&mut self.machine, SystemCall::IoRequest { device, duration })
            }
            BurstEnd::Terminate => {
                crate::ktrace!(
                    TRACE_SYSCALL,
                    "Time: {:010} Kernel: syscall TERMINATE_PROCESS",
                    self.machine.clock.now()
                );
                self.machine.clock.log_syscall();
                self.kernel
                    .syscall(&mut self.machine, SystemCall::TerminateProcess)
            }
        }
    }

    fn dispatch_event(&mut self, event: Event) -> Result<(), SimulationError> {
        match event.payload {
            // EXECVE is never invoked by a user process: any running
            // process is suspended for the kernel entry and restored
            // afterwards unless a scheduling decision replaced it.
            EventPayload::Execve { program, priority } => {
                let suspended = self.machine.suspend_current();
                crate::ktrace!(
                    TRACE_SYSCALL,
                    "Time: {:010} Kernel: syscall EXECVE(\"{}\", priority {priority})",
                    self.machine.clock.now(),
                    program.display()
                );
                self.machine.clock.log_syscall();
                self.kernel
                    .syscall(&mut self.machine, SystemCall::Execve { program, priority })?;
                self.machine.resume_if_current(suspended);
            }
            EventPayload::WakeUp { device, pid } => {
                let suspended = self.machine.suspend_current();
                self.machine.complete_io(device, pid)?;
                crate::ktrace!(
                    TRACE_INTERRUPT,
                    "Time: {:010} Kernel: interrupt WAKE_UP(device {device}, pid {pid})",
                    self.machine.clock.now()
                );
                self.machine.clock.log_interrupt();
                self.kernel
                    .interrupt(&mut self.machine, Interrupt::WakeUp { device, pid })?;
                self.machine.resume_if_current(suspended);
            }
            EventPayload::TimeOut { pid, .. } => {
                self.machine.timer.acknowledge(pid);
                crate::ktrace!(
                    TRACE_INTERRUPT,
                    "Time: {:010} Kernel: interrupt TIME_OUT(pid {pid})",
                    self.machine.clock.now()
                );
                self.machine.clock.log_interrupt();
                self.kernel
                    .interrupt(&mut self.machine, Interrupt::TimeOut { pid })?;
            }
        }
        Ok(())
    }
}

fn parse_field(
    file_error: &str,
    line: &str,
    token: Option<&str>,
    missing: &str,
) -> Result<u64, SimulationError> {
    token
        .and_then(|value| value.parse::<u64>().ok())
        .ok_or_else(|| {
            SimulationError::config(format!("{file_error}: {missing}: \"{line}\""))
        })
}
