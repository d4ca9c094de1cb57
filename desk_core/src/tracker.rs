//! Incremental position tracking from the optical sensor.

use crate::{GeometryCfg, SystemState};

/// Converts raw opto-sensor transitions into a signed position counter.
///
/// Every transition of the binary reading is one edge. An edge counts
/// upward only while the table is commanded Up; edges in any other state
/// count downward, including Calibrating and Hold. Edges only occur
/// while the motor actually turns, so the non-Up cases correspond to
/// downward travel on the reference hardware.
#[derive(Debug)]
pub struct PositionTracker {
    // None until the first reading; the first poll always registers one edge
    last_reading: Option<bool>,
    position: i32,
    min_height_cm: i32,
    edges_per_rotation: f64,
    rotations_per_cm: f64,
}

impl PositionTracker {
    pub fn new(geometry: &GeometryCfg, min_height_cm: i32) -> Self {
        Self {
            last_reading: None,
            position: 0,
            min_height_cm,
            edges_per_rotation: f64::from(geometry.edges_per_rotation.max(1)),
            rotations_per_cm: geometry.rotations_per_cm,
        }
    }

    /// Feed one cycle's sensor reading. Returns true when an edge was
    /// observed.
    pub fn on_cycle(&mut self, reading: bool, state: SystemState) -> bool {
        if self.last_reading == Some(reading) {
            return false;
        }
        self.last_reading = Some(reading);
        self.position = if state == SystemState::Up {
            self.position.saturating_add(1)
        } else {
            self.position.saturating_sub(1)
        };
        tracing::trace!(position = self.position, reading, ?state, "sensor edge");
        true
    }

    pub fn position(&self) -> i32 {
        self.position
    }

    /// Re-zero the counter at the end-stop reference.
    pub fn reset(&mut self) {
        self.position = 0;
    }

    /// Derived height in whole centimeters; a pure function of the
    /// position counter, so stored height can never drift from it.
    pub fn height(&self) -> i32 {
        let rotations = f64::from(self.position) / self.edges_per_rotation;
        (rotations / self.rotations_per_cm).floor() as i32 + self.min_height_cm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> PositionTracker {
        PositionTracker::new(&GeometryCfg::default(), 70)
    }

    #[test]
    fn first_reading_counts_as_an_edge() {
        let mut t = tracker();
        assert!(t.on_cycle(false, SystemState::Calibrating));
        assert_eq!(t.position(), -1);
    }

    #[test]
    fn stable_reading_is_not_an_edge() {
        let mut t = tracker();
        t.on_cycle(true, SystemState::Up);
        assert!(!t.on_cycle(true, SystemState::Up));
        assert_eq!(t.position(), 1);
    }

    #[test]
    fn height_at_zero_is_min_height() {
        assert_eq!(tracker().height(), 70);
    }
}
