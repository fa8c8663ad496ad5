//! Processes and the programs they run.
//!
//! A program is an alternating sequence of CPU and I/O bursts, loaded from a
//! text file. A process couples such a program with an identity, a priority,
//! a lifecycle state and a cursor over the bursts.

use std::fmt;
use std::fs;
use std::ops::Add;
use std::path::Path;

use crate::error::SimulationError;

/// Process identifier. Pids are small monotonic integers allocated by the
/// process table, starting at 1.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Pid(u32);

impl Pid {
    /// Creates a new Pid object
    ///
    /// * `pid` - the raw process id
    pub fn new(pid: u32) -> Pid {
        Pid(pid)
    }

    pub fn get(&self) -> u32 {
        self.0
    }

    /// Index of this pid in dense per-process tables.
    pub(crate) fn index(&self) -> usize {
        self.0 as usize - 1
    }
}

impl Add<u32> for Pid {
    type Output = Pid;

    fn add(self, rhs: u32) -> Self::Output {
        Pid::new(self.0 + rhs)
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a process.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ProcessState {
    Ready,
    Running,
    Waiting,
    Terminated,
}

impl ProcessState {
    /// Reports whether a transition from `self` to `next` is legal.
    ///
    /// Legal transitions: READY -> RUNNING (dispatch), RUNNING -> READY
    /// (preemption), RUNNING -> WAITING (I/O request), RUNNING -> TERMINATED
    /// (last burst finished), WAITING -> READY (wake-up). TERMINATED is
    /// terminal.
    pub fn can_become(&self, next: ProcessState) -> bool {
        use ProcessState::*;
        matches!(
            (*self, next),
            (Ready, Running)
                | (Running, Ready)
                | (Running, Waiting)
                | (Running, Terminated)
                | (Waiting, Ready)
        )
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessState::Ready => "READY",
            ProcessState::Running => "RUNNING",
            ProcessState::Waiting => "WAITING",
            ProcessState::Terminated => "TERMINATED",
        };
        write!(f, "{name}")
    }
}

/// One contiguous CPU or I/O operation within a program.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Burst {
    Cpu { duration: u64, remaining: u64 },
    Io { duration: u64, device: u32 },
}

impl Burst {
    fn cpu(duration: u64) -> Burst {
        Burst::Cpu {
            duration,
            remaining: duration,
        }
    }

    /// Time required to complete this burst. For an I/O burst this is its
    /// full duration; devices do not serve bursts partially.
    pub fn remaining(&self) -> u64 {
        match self {
            Burst::Cpu { remaining, .. } => *remaining,
            Burst::Io { duration, .. } => *duration,
        }
    }
}

/// A process: identity, program, state and a cursor over the bursts.
pub struct ProcessControlBlock {
    pid: Pid,
    program_name: String,
    priority: i32,
    state: ProcessState,
    bursts: Vec<Burst>,
    cursor: usize,
}

impl ProcessControlBlock {
    fn new(pid: Pid, program_name: String, priority: i32, bursts: Vec<Burst>) -> ProcessControlBlock {
        ProcessControlBlock {
            pid,
            program_name,
            priority,
            state: ProcessState::Ready,
            bursts,
            cursor: 0,
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn program_name(&self) -> &str {
        &self.program_name
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Raw state write; the machine wraps this so the profiler is always
    /// notified of the change.
    pub(crate) fn set_state(&mut self, state: ProcessState) {
        self.state = state;
    }

    /// The burst the cursor points at.
    pub fn current_burst(&self) -> &Burst {
        &self.bursts[self.cursor]
    }

    pub(crate) fn current_burst_mut(&mut self) -> &mut Burst {
        &mut self.bursts[self.cursor]
    }

    /// Remaining time of the current burst.
    pub fn burst_remaining(&self) -> u64 {
        self.current_burst().remaining()
    }

    /// Reports whether another burst follows the current one.
    pub fn has_next_instruction(&self) -> bool {
        self.cursor + 1 < self.bursts.len()
    }

    /// Advances the cursor to the next burst.
    pub(crate) fn next_instruction(&mut self) {
        debug_assert!(self.has_next_instruction());
        self.cursor += 1;
    }
}

impl fmt::Display for ProcessControlBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "process(pid={}, state={}, name=\"{}\")",
            self.pid, self.state, self.program_name
        )
    }
}

/// Dense table of every process created during a run, indexed by pid.
#[derive(Default)]
pub struct ProcessTable {
    table: Vec<ProcessControlBlock>,
}

impl ProcessTable {
    pub fn new() -> ProcessTable {
        ProcessTable { table: Vec::new() }
    }

    /// Creates a READY process for the given program and returns its pid.
    pub(crate) fn allocate(
        &mut self,
        program_name: String,
        priority: i32,
        bursts: Vec<Burst>,
    ) -> Pid {
        let pid = Pid::new(self.table.len() as u32 + 1);
        self.table
            .push(ProcessControlBlock::new(pid, program_name, priority, bursts));
        pid
    }

    pub fn get(&self, pid: Pid) -> &ProcessControlBlock {
        &self.table[pid.index()]
    }

    pub(crate) fn get_mut(&mut self, pid: Pid) -> &mut ProcessControlBlock {
        &mut self.table[pid.index()]
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProcessControlBlock> {
        self.table.iter()
    }
}

/// Reads a program file and returns its burst list.
///
/// * `path` - the program file, usually resolved against the workload file's
///            directory
pub(crate) fn load_bursts(path: &Path) -> Result<Vec<Burst>, SimulationError> {
    let source = fs::read_to_string(path)
        .map_err(|err| SimulationError::io(format!("program file \"{}\"", path.display()), err))?;
    parse_program(&path.display().to_string(), &source)
}

/// Parses program text into bursts and validates what the CPU stepper
/// assumes: at least one burst, the first burst is CPU, bursts alternate,
/// and the last burst is CPU.
fn parse_program(name: &str, source: &str) -> Result<Vec<Burst>, SimulationError> {
    let mut bursts = Vec::new();

    for line in source.lines() {
        let line = line.trim();
        if line.starts_with('#') {
            continue;
        }

        let mut tokens = line.split_whitespace();
        let token = tokens.next().ok_or_else(|| {
            SimulationError::config(format!("program file \"{name}\": illegal line, missing token"))
        })?;
        let duration = parse_field(name, tokens.next(), "duration")?;

        match token {
            "CPU" => bursts.push(Burst::cpu(duration)),
            "IO" => {
                let device = parse_field(name, tokens.next(), "device id")? as u32;
                bursts.push(Burst::Io { duration, device });
            }
            other => {
                return Err(SimulationError::config(format!(
                    "program file \"{name}\": illegal token \"{other}\""
                )))
            }
        }
    }

    if bursts.is_empty() {
        return Err(SimulationError::config(format!(
            "program file \"{name}\": program has no bursts"
        )));
    }
    for (position, pair) in bursts.windows(2).enumerate() {
        let alternates = matches!(
            (pair[0], pair[1]),
            (Burst::Cpu { .. }, Burst::Io { .. }) | (Burst::Io { .. }, Burst::Cpu { .. })
        );
        if !alternates {
            return Err(SimulationError::config(format!(
                "program file \"{name}\": bursts {position} and {} do not alternate between CPU and IO",
                position + 1
            )));
        }
    }
    if !matches!(bursts[0], Burst::Cpu { .. }) {
        return Err(SimulationError::config(format!(
            "program file \"{name}\": program must begin with a CPU burst"
        )));
    }
    if !matches!(bursts[bursts.len() - 1], Burst::Cpu { .. }) {
        return Err(SimulationError::config(format!(
            "program file \"{name}\": program must end with a CPU burst"
        )));
    }

    Ok(bursts)
}

fn parse_field(name: &str, token: Option<&str>, field: &str) -> Result<u64, SimulationError> {
    token
        .and_then(|value| value.parse::<u64>().ok())
        .ok_or_else(|| {
            SimulationError::config(format!(
                "program file \"{name}\": illegal line, missing {field}"
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_alternating_program() {
        let bursts = parse_program("p", "# boot\nCPU 3\nIO 4 1\nCPU 2\n").unwrap();
        assert_eq!(bursts.len(), 3);
        assert_eq!(
            bursts[1],
            Burst::Io {
                duration: 4,
                device: 1
            }
        );
        assert_eq!(bursts[2].remaining(), 2);
    }

    #[test]
    fn rejects_program_starting_with_io() {
        assert!(parse_program("p", "IO 4 1\nCPU 2\n").is_err());
    }

    #[test]
    fn rejects_program_ending_with_io() {
        assert!(parse_program("p", "CPU 2\nIO 4 1\n").is_err());
    }

    #[test]
    fn rejects_consecutive_cpu_bursts() {
        assert!(parse_program("p", "CPU 2\nCPU 2\n").is_err());
    }

    #[test]
    fn rejects_blank_line() {
        assert!(parse_program("p", "CPU 2\n\nCPU 2\n").is_err());
    }

    #[test]
    fn rejects_empty_program() {
        assert!(parse_program("p", "# nothing here\n").is_err());
    }

    #[test]
    fn state_machine_allows_only_documented_transitions() {
        use ProcessState::*;
        assert!(Ready.can_become(Running));
        assert!(Running.can_become(Ready));
        assert!(Running.can_become(Waiting));
        assert!(Running.can_become(Terminated));
        assert!(Waiting.can_become(Ready));

        assert!(!Ready.can_become(Waiting));
        assert!(!Waiting.can_become(Running));
        assert!(!Terminated.can_become(Ready));
        assert!(!Terminated.can_become(Running));
    }

    #[test]
    fn cursor_walks_bursts_in_order() {
        let mut table = ProcessTable::new();
        let bursts = parse_program("p", "CPU 3\nIO 4 1\nCPU 2\n").unwrap();
        let pid = table.allocate("p".to_string(), 0, bursts);
        assert_eq!(pid, Pid::new(1));

        let pcb = table.get_mut(pid);
        assert_eq!(pcb.burst_remaining(), 3);
        assert!(pcb.has_next_instruction());
        pcb.next_instruction();
        assert_eq!(pcb.burst_remaining(), 4);
        pcb.next_instruction();
        assert_eq!(pcb.burst_remaining(), 2);
        assert!(!pcb.has_next_instruction());
    }
}
