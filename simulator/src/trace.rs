//! Trace output filtered by a per-run level.
//!
//! The level is a bitmask between 0 and 31; level 0 silences everything.
//! Each kind of kernel activity prints under its own bit, so a user can ask
//! for context switches only, syscalls and interrupts, and so on.

use std::cell::Cell;

/// Context switches.
pub const TRACE_CONTEXT_SWITCH: u32 = 1;
/// System calls entering the kernel.
pub const TRACE_SYSCALL: u32 = 2;
/// Interrupts entering the kernel.
pub const TRACE_INTERRUPT: u32 = 4;
/// Dispatch decisions.
pub const TRACE_DISPATCH: u32 = 8;
/// I/O device activity.
pub const TRACE_DEVICE: u32 = 16;

thread_local!(static TRACE_LEVEL: Cell<u32> = Cell::new(0));

/// Sets the trace level for the current thread. Bits above the documented
/// range are masked off.
pub fn set_trace_level(level: u32) {
    TRACE_LEVEL.with(|cell| cell.set(level & 31));
}

/// Reports whether the given trace bit is enabled.
pub fn trace_enabled(bit: u32) -> bool {
    TRACE_LEVEL.with(|cell| cell.get()) & bit != 0
}

/// Prints a trace line when `bit` is enabled in the current trace level.
#[macro_export]
macro_rules! ktrace {
    ($bit:expr, $($arg:tt)*) => {
        if $crate::trace::trace_enabled($bit) {
            println!("{}", format_args!($($arg)*));
        }
    };
}
