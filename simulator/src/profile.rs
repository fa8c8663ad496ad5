//! Per-process execution profiles.
//!
//! A profile records every state and mode transition of a process as a list
//! of intervals suitable for offline analysis (Gantt charts, utilisation
//! breakdowns). Profiling is permanently enabled: a profile is created with
//! the process and maintained for its lifetime.

use std::io::{self, Write};

use crate::cpu::Mode;
use crate::process::{Pid, ProcessState};

/// A period during which a process is in a particular state and mode. The
/// final interval of a terminated process has no end.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Interval {
    pub state: ProcessState,
    pub mode: Mode,
    pub start: u64,
    pub end: Option<u64>,
}

/// A state and/or mode change at a point in time.
#[derive(Clone, Copy)]
struct Transition {
    time: u64,
    state: ProcessState,
    mode: Mode,
}

/// The transition log of one process.
pub struct Profile {
    pid: Pid,
    program_name: String,
    previous: Transition,
    intervals: Vec<Interval>,
}

impl Profile {
    fn new(pid: Pid, program_name: String, time: u64, state: ProcessState, mode: Mode) -> Profile {
        Profile {
            pid,
            program_name,
            previous: Transition { time, state, mode },
            intervals: Vec::new(),
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn program_name(&self) -> &str {
        &self.program_name
    }

    /// The intervals the process has passed through, in order.
    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    fn record(&mut self, time: u64, state: ProcessState, mode: Mode) {
        let mut interval = Interval {
            state: self.previous.state,
            mode: self.previous.mode,
            start: self.previous.time,
            end: Some(time),
        };

        // Zero-length periods are dropped; adjacent READY periods merge into
        // one, since the queueing they describe is a single wait.
        if time > interval.start {
            if interval.state == ProcessState::Ready {
                if let Some(last) = self.intervals.last() {
                    if last.state == ProcessState::Ready {
                        interval.start = last.start;
                        interval.mode = last.mode;
                        self.intervals.pop();
                    }
                }
            }
            self.intervals.push(interval);
        }

        self.previous = Transition { time, state, mode };

        if state == ProcessState::Terminated {
            self.intervals.push(Interval {
                state,
                mode,
                start: time,
                end: None,
            });
        }
    }
}

/// Profiles for every process of a run, indexed densely by pid.
#[derive(Default)]
pub struct Profiler {
    profiles: Vec<Profile>,
}

impl Profiler {
    pub fn new() -> Profiler {
        Profiler {
            profiles: Vec::new(),
        }
    }

    /// Starts a profile for a newly created process. Process creation is
    /// kernel work, so the initial mode is SUPERVISOR.
    pub(crate) fn create(&mut self, pid: Pid, program_name: &str, time: u64, state: ProcessState) {
        debug_assert_eq!(pid.index(), self.profiles.len());
        self.profiles.push(Profile::new(
            pid,
            program_name.to_string(),
            time,
            state,
            Mode::Supervisor,
        ));
    }

    /// Records a change of process state, keeping the current mode.
    pub(crate) fn record_state(&mut self, pid: Pid, time: u64, state: ProcessState) {
        let profile = &mut self.profiles[pid.index()];
        let mode = profile.previous.mode;
        profile.record(time, state, mode);
    }

    /// Records a change of CPU mode, keeping the current state.
    pub(crate) fn record_mode(&mut self, pid: Pid, time: u64, mode: Mode) {
        let profile = &mut self.profiles[pid.index()];
        let state = profile.previous.state;
        profile.record(time, state, mode);
    }

    pub fn profile(&self, pid: Pid) -> &Profile {
        &self.profiles[pid.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Profile> {
        self.profiles.iter()
    }

    /// Writes every interval of every process as comma-separated values.
    ///
    /// Lines are of uniform length. The mode column reads `N/A` outside
    /// RUNNING, and the end column reads `-` for the open-ended terminal
    /// interval.
    pub fn write_csv<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "PID, STATE, MODE, START TIME, END TIME, PROGRAM")?;
        for profile in &self.profiles {
            for interval in &profile.intervals {
                let mode = match interval.state {
                    ProcessState::Running => interval.mode.to_string(),
                    _ => "N/A".to_string(),
                };
                let end = match interval.end {
                    Some(end) => format!("{end:010}"),
                    None => "-".to_string(),
                };
                writeln!(
                    out,
                    "{:03}, {}, {}, {:010}, {}, {}",
                    profile.pid.get(),
                    interval.state,
                    mode,
                    interval.start,
                    end,
                    profile.program_name
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profiler_with_one_process() -> Profiler {
        let mut profiler = Profiler::new();
        profiler.create(Pid::new(1), "prog", 0, ProcessState::Ready);
        profiler
    }

    #[test]
    fn zero_length_intervals_are_dropped() {
        let mut profiler = profiler_with_one_process();
        let pid = Pid::new(1);
        profiler.record_state(pid, 0, ProcessState::Running);
        profiler.record_mode(pid, 0, Mode::User);
        profiler.record_mode(pid, 5, Mode::Supervisor);

        let intervals = profiler.profile(pid).intervals();
        assert_eq!(intervals.len(), 1);
        assert_eq!(
            intervals[0],
            Interval {
                state: ProcessState::Running,
                mode: Mode::User,
                start: 0,
                end: Some(5),
            }
        );
    }

    #[test]
    fn adjacent_ready_intervals_coalesce() {
        let mut profiler = profiler_with_one_process();
        let pid = Pid::new(1);
        // READY 0..4, a one-unit kernel re-entry, then READY again 5..9.
        profiler.record_state(pid, 4, ProcessState::Running);
        profiler.record_state(pid, 5, ProcessState::Ready);
        profiler.record_state(pid, 9, ProcessState::Running);

        let intervals = profiler.profile(pid).intervals();
        assert_eq!(intervals.len(), 2);
        assert_eq!(intervals[0].state, ProcessState::Ready);
        assert_eq!((intervals[0].start, intervals[0].end), (0, Some(4)));
        assert_eq!(intervals[1].state, ProcessState::Running);
        // The RUNNING blip 4..5 is real, but the READY periods around it do
        // not coalesce across it.
        assert_eq!((intervals[1].start, intervals[1].end), (4, Some(5)));
    }

    #[test]
    fn ready_blip_between_ready_periods_coalesces() {
        let mut profiler = profiler_with_one_process();
        let pid = Pid::new(1);
        profiler.record_state(pid, 4, ProcessState::Running);
        profiler.record_state(pid, 4, ProcessState::Ready);
        profiler.record_state(pid, 9, ProcessState::Running);

        // READY 0..4 and READY 4..9 merge into READY 0..9.
        let intervals = profiler.profile(pid).intervals();
        assert_eq!(intervals.len(), 1);
        assert_eq!(intervals[0].state, ProcessState::Ready);
        assert_eq!((intervals[0].start, intervals[0].end), (0, Some(9)));
    }

    #[test]
    fn termination_appends_an_open_interval() {
        let mut profiler = profiler_with_one_process();
        let pid = Pid::new(1);
        profiler.record_state(pid, 2, ProcessState::Running);
        profiler.record_state(pid, 7, ProcessState::Terminated);

        let intervals = profiler.profile(pid).intervals();
        let last = intervals.last().unwrap();
        assert_eq!(last.state, ProcessState::Terminated);
        assert_eq!(last.start, 7);
        assert_eq!(last.end, None);
    }

    #[test]
    fn csv_lines_are_zero_padded() {
        let mut profiler = profiler_with_one_process();
        let pid = Pid::new(1);
        profiler.record_state(pid, 3, ProcessState::Running);
        profiler.record_state(pid, 8, ProcessState::Terminated);

        let mut out = Vec::new();
        profiler.write_csv(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "PID, STATE, MODE, START TIME, END TIME, PROGRAM");
        assert_eq!(lines[1], "001, READY, N/A, 0000000000, 0000000003, prog");
        assert_eq!(
            lines[2],
            "001, RUNNING, SUPERVISOR, 0000000003, 0000000008, prog"
        );
        assert_eq!(lines[3], "001, TERMINATED, N/A, 0000000008, -, prog");
    }
}
