//! Error types for simulation setup and execution.
//!
//! Every error inside the event loop is fatal: the simulation has no retry
//! semantics. Messages identify the failing input and the rule it violated
//! so the shell can print them and exit non-zero.

use std::error;
use std::fmt;
use std::io;

#[derive(Debug)]
pub enum SimulationError {
    /// Malformed workload file or program file.
    Configuration { detail: String },
    /// An IO_REQUEST named a device id that was never registered.
    UnknownDevice { id: u32 },
    /// A kernel received an interrupt it does not implement.
    UnsupportedInterrupt {
        kernel: &'static str,
        interrupt: &'static str,
    },
    /// An event was scheduled behind the dispatch floor of the event queue.
    Ordering { time: u64, floor: u64 },
    /// An internal invariant was broken. This is a bug, not a workload
    /// condition.
    Invariant { detail: String },
    /// A file could not be opened or read.
    Io { context: String, source: io::Error },
}

impl SimulationError {
    /// Creates a `Configuration` error from anything printable.
    ///
    /// * `detail` - the message shown to the user
    pub(crate) fn config(detail: impl Into<String>) -> SimulationError {
        SimulationError::Configuration {
            detail: detail.into(),
        }
    }

    /// Creates an `Invariant` error from anything printable.
    pub(crate) fn invariant(detail: impl Into<String>) -> SimulationError {
        SimulationError::Invariant {
            detail: detail.into(),
        }
    }

    /// Creates an `Io` error that names the file it concerns.
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> SimulationError {
        SimulationError::Io {
            context: context.into(),
            source,
        }
    }
}

impl fmt::Display for SimulationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulationError::Configuration { detail } => {
                write!(f, "configuration error: {detail}")
            }
            SimulationError::UnknownDevice { id } => {
                write!(
                    f,
                    "there is no I/O device with the id '{id}'; check the workload file"
                )
            }
            SimulationError::UnsupportedInterrupt { kernel, interrupt } => {
                write!(f, "the {kernel} kernel does not support {interrupt} interrupts")
            }
            SimulationError::Ordering { time, floor } => {
                write!(
                    f,
                    "event scheduled at time {time}, behind already dispatched time {floor}"
                )
            }
            SimulationError::Invariant { detail } => {
                write!(f, "invariant violated: {detail}")
            }
            SimulationError::Io { context, source } => {
                write!(f, "{context}: {source}")
            }
        }
    }
}

impl error::Error for SimulationError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            SimulationError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
