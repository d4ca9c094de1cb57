//! Hardware backends for the desk controller.
//!
//! The simulated rig is always available and closed-loop: commanded
//! speed moves a virtual table, the opto sensor toggles as it travels,
//! and the end-stop trips at the bottom — so startup calibration
//! completes in simulation exactly as on the real frame.

pub mod error;

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod gpio;

use desk_traits::{Actuator, DigitalInput};
use std::cell::RefCell;
use std::rc::Rc;

/// Full-scale actuator speed the rig normalizes against.
const FULL_SCALE: f64 = 255.0;
/// How far the virtual table can press into the end-stop.
const FLOOR_EDGES: f64 = -2.0;

struct SimState {
    /// Last commanded speed (signed)
    speed: i32,
    /// Continuous travel above the end-stop, in sensor-edge units
    travel_edges: f64,
    /// Edges traversed per control cycle at full speed
    edges_per_cycle: f64,
}

impl SimState {
    fn advance(&mut self) {
        if self.speed == 0 {
            return;
        }
        let rate = f64::from(self.speed) / FULL_SCALE;
        self.travel_edges = (self.travel_edges + rate * self.edges_per_cycle).max(FLOOR_EDGES);
    }
}

/// Simulated desk rig. Hand out one actuator and two input handles and
/// wire them into the controller; all handles share the same model.
///
/// The model advances by one cycle's travel on each end-stop read, which
/// the control loop performs exactly once per cycle (and before the
/// sensor read).
pub struct SimulatedDesk {
    shared: Rc<RefCell<SimState>>,
}

impl SimulatedDesk {
    /// `start_edges` is the initial travel above the end-stop;
    /// `edges_per_cycle` the full-speed travel per control cycle.
    pub fn new(start_edges: f64, edges_per_cycle: f64) -> Self {
        Self {
            shared: Rc::new(RefCell::new(SimState {
                speed: 0,
                travel_edges: start_edges,
                edges_per_cycle,
            })),
        }
    }

    pub fn actuator(&self) -> SimActuator {
        SimActuator {
            shared: Rc::clone(&self.shared),
        }
    }

    pub fn endstop(&self) -> SimEndstop {
        SimEndstop {
            shared: Rc::clone(&self.shared),
        }
    }

    pub fn sensor(&self) -> SimSensor {
        SimSensor {
            shared: Rc::clone(&self.shared),
        }
    }

    /// Current travel above the end-stop, in edge units.
    pub fn travel_edges(&self) -> f64 {
        self.shared.borrow().travel_edges
    }
}

/// Simulated motor driver.
pub struct SimActuator {
    shared: Rc<RefCell<SimState>>,
}

impl Actuator for SimActuator {
    fn set_speed(
        &mut self,
        speed: i32,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut s = self.shared.borrow_mut();
        if s.speed != speed {
            tracing::debug!(speed, "simulated motor speed");
        }
        s.speed = speed;
        Ok(())
    }
}

/// Simulated end-stop switch; advances the model once per read.
pub struct SimEndstop {
    shared: Rc<RefCell<SimState>>,
}

impl DigitalInput for SimEndstop {
    fn read(&mut self) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let mut s = self.shared.borrow_mut();
        s.advance();
        Ok(s.travel_edges <= 0.0)
    }
}

/// Simulated opto sensor: parity of the whole-edge count, so movement
/// produces one transition per edge unit traveled.
pub struct SimSensor {
    shared: Rc<RefCell<SimState>>,
}

impl DigitalInput for SimSensor {
    fn read(&mut self) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let s = self.shared.borrow();
        let unit = s.travel_edges.floor() as i64;
        Ok(unit.rem_euclid(2) == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use desk_traits::{Actuator, DigitalInput};

    #[test]
    fn lowering_reaches_the_endstop() {
        let rig = SimulatedDesk::new(10.0, 1.0);
        let mut motor = rig.actuator();
        let mut endstop = rig.endstop();

        motor.set_speed(-255).unwrap();
        let mut hit = false;
        for _ in 0..32 {
            if endstop.read().unwrap() {
                hit = true;
                break;
            }
        }
        assert!(hit, "end-stop never tripped while lowering");
    }

    #[test]
    fn sensor_toggles_only_while_moving() {
        let rig = SimulatedDesk::new(10.0, 1.0);
        let mut motor = rig.actuator();
        let mut endstop = rig.endstop();
        let mut sensor = rig.sensor();

        // Idle: no transitions
        let first = sensor.read().unwrap();
        let _ = endstop.read().unwrap();
        assert_eq!(sensor.read().unwrap(), first);

        // Moving: one edge unit per cycle flips the reading
        motor.set_speed(255).unwrap();
        let _ = endstop.read().unwrap();
        assert_ne!(sensor.read().unwrap(), first);
    }

    #[test]
    fn travel_is_clamped_at_the_floor() {
        let rig = SimulatedDesk::new(1.0, 1.0);
        let mut motor = rig.actuator();
        let mut endstop = rig.endstop();

        motor.set_speed(-255).unwrap();
        for _ in 0..16 {
            let _ = endstop.read().unwrap();
        }
        assert!(rig.travel_edges() >= -2.0);
    }
}
