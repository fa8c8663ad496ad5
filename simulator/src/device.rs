//! Simulation of an I/O device.
//!
//! A device serves requests strictly first-in-first-out with no idle gaps
//! between back-to-back requests: `free_time` tracks when the device can
//! start the next request.

use std::collections::VecDeque;
use std::fmt;

use crate::process::Pid;

pub struct IoDevice {
    id: u32,
    name: String,
    free_time: u64,
    in_flight: VecDeque<Pid>,
}

impl IoDevice {
    /// Creates a device with the given id and name (e.g. 'disk').
    pub fn new(id: u32, name: impl Into<String>) -> IoDevice {
        IoDevice {
            id,
            name: name.into(),
            free_time: 0,
            in_flight: VecDeque::new(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn free_time(&self) -> u64 {
        self.free_time
    }

    /// Reports whether no request is in flight.
    pub fn is_idle(&self) -> bool {
        self.in_flight.is_empty()
    }

    /// Accepts a request of `duration` for `pid` and returns the time at
    /// which it completes.
    ///
    /// * `now` - current system time
    pub(crate) fn admit(&mut self, now: u64, duration: u64, pid: Pid) -> u64 {
        if self.free_time <= now {
            self.free_time = now + duration;
        } else {
            self.free_time += duration;
        }
        self.in_flight.push_back(pid);
        self.free_time
    }

    /// Removes `pid` from the in-flight queue. Returns false if no request
    /// of that process was in flight.
    pub(crate) fn complete(&mut self, pid: Pid) -> bool {
        match self.in_flight.iter().position(|entry| *entry == pid) {
            Some(position) => {
                self.in_flight.remove(position);
                true
            }
            None => false,
        }
    }
}

impl fmt::Display for IoDevice {
    /// The form 'device(id=<id>)'.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device(id={})", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::IoDevice;
    use crate::process::Pid;

    #[test]
    fn idle_device_starts_service_immediately() {
        let mut device = IoDevice::new(1, "disk");
        assert_eq!(device.admit(8, 4, Pid::new(1)), 12);
        assert!(!device.is_idle());
    }

    #[test]
    fn busy_device_queues_back_to_back() {
        let mut device = IoDevice::new(1, "disk");
        assert_eq!(device.admit(3, 5, Pid::new(1)), 8);
        // Second request arrives while the first is still being served.
        assert_eq!(device.admit(5, 5, Pid::new(2)), 13);

        assert!(device.complete(Pid::new(1)));
        assert!(device.complete(Pid::new(2)));
        assert!(!device.complete(Pid::new(2)));
        assert!(device.is_idle());
    }
}
