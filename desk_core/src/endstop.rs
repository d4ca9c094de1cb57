//! End-stop debouncing.

/// Per-cycle output of the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndstopSignal {
    Idle,
    Confirmed,
}

/// Debounces the end-stop switch: the raw input must read triggered for
/// a configured number of consecutive cycles before `Confirmed` is
/// emitted. Any quiet cycle resets the count, so transient noise cannot
/// fake a "reached bottom" signal.
#[derive(Debug)]
pub struct EndstopMonitor {
    trig_count: u32,
    debounce_cycles: u32,
}

impl EndstopMonitor {
    pub fn new(debounce_cycles: u32) -> Self {
        Self {
            trig_count: 0,
            debounce_cycles: debounce_cycles.max(1),
        }
    }

    pub fn on_cycle(&mut self, raw: bool) -> EndstopSignal {
        if raw {
            self.trig_count = self.trig_count.saturating_add(1);
            if self.trig_count >= self.debounce_cycles {
                return EndstopSignal::Confirmed;
            }
        } else {
            self.trig_count = 0;
        }
        EndstopSignal::Idle
    }
}
