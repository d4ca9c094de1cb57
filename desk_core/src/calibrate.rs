//! Startup calibration: find the physical floor reference.
//!
//! The table lowers until the debounced end-stop confirms, then the
//! position counter is zeroed and a ready [`DeskController`] is handed
//! over in Hold. No command can reach the table before that: the
//! controller simply does not exist yet, and the position counter is
//! meaningless until the floor reference has been found.

use crate::endstop::{EndstopMonitor, EndstopSignal};
use crate::error::{Result, map_hw_error};
use crate::stall::StallGuard;
use crate::tracker::PositionTracker;
use crate::util::cycle_period;
use crate::{DeskController, EndstopCfg, GeometryCfg, LimitsCfg, MotionCfg, StallCfg, SystemState};
use desk_traits::clock::Clock;
use desk_traits::{Actuator, DigitalInput};
use eyre::WrapErr;
use std::sync::Arc;
use std::time::Instant;

/// Per-cycle calibration progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationStatus {
    /// Still lowering toward the end-stop
    Lowering,
    /// End-stop confirmed; position zeroed, motor stopped
    Homed,
    /// No sensor movement within the stall window; motor stopped,
    /// position left unreferenced
    Stalled,
}

/// The one-shot initialization phase preceding the motion state machine.
pub struct Calibrator<A: Actuator, E: DigitalInput, S: DigitalInput> {
    actuator: A,
    endstop_pin: E,
    sensor_pin: S,
    tracker: PositionTracker,
    monitor: EndstopMonitor,
    stall: StallGuard,
    limits: LimitsCfg,
    motion: MotionCfg,
    clock: Arc<dyn Clock + Send + Sync>,
    epoch: Instant,
    outcome: Option<CalibrationStatus>,
}

impl<A: Actuator, E: DigitalInput, S: DigitalInput> std::fmt::Debug for Calibrator<A, E, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Calibrator")
            .field("limits", &self.limits)
            .field("motion", &self.motion)
            .field("outcome", &self.outcome)
            .finish_non_exhaustive()
    }
}

impl<A: Actuator, E: DigitalInput, S: DigitalInput> Calibrator<A, E, S> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        actuator: A,
        endstop_pin: E,
        sensor_pin: S,
        limits: LimitsCfg,
        motion: MotionCfg,
        endstop: EndstopCfg,
        stall: StallCfg,
        geometry: GeometryCfg,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        let epoch = clock.now();
        let now = clock.ms_since(epoch); // 0
        Self {
            actuator,
            endstop_pin,
            sensor_pin,
            tracker: PositionTracker::new(&geometry, limits.min_height_cm),
            monitor: EndstopMonitor::new(endstop.debounce_cycles),
            stall: StallGuard::new(stall.timeout_ms, now),
            limits,
            motion,
            clock,
            epoch,
            outcome: None,
        }
    }

    /// One calibration cycle. The end-stop check comes first and the
    /// stall guard last, exactly as in the running controller.
    pub fn step(&mut self) -> Result<CalibrationStatus> {
        if let Some(done) = self.outcome {
            return Ok(done);
        }
        let now = self.clock.ms_since(self.epoch);

        let raw = self
            .endstop_pin
            .read()
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err("read end-stop")?;
        if matches!(self.monitor.on_cycle(raw), EndstopSignal::Confirmed) {
            tracing::info!("end-stop reached, stopping motor and zeroing position");
            self.set_speed(0)?;
            self.tracker.reset();
            self.outcome = Some(CalibrationStatus::Homed);
            return Ok(CalibrationStatus::Homed);
        }
        if !raw {
            self.set_speed(-self.motion.speed)?;
        }

        let reading = self
            .sensor_pin
            .read()
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err("read position sensor")?;
        if self.tracker.on_cycle(reading, SystemState::Calibrating) {
            self.stall.note_movement(now);
        }

        if self.stall.check(now, SystemState::Calibrating) {
            tracing::warn!("no sensor movement while homing, stopping with position unreferenced");
            self.set_speed(0)?;
            self.outcome = Some(CalibrationStatus::Stalled);
            return Ok(CalibrationStatus::Stalled);
        }

        Ok(CalibrationStatus::Lowering)
    }

    /// Run calibration to completion at the configured cycle rate and
    /// hand over the controller.
    pub fn run(mut self) -> Result<DeskController<A, E, S>> {
        let period = cycle_period(self.motion.cycle_hz);
        loop {
            match self.step()? {
                CalibrationStatus::Lowering => self.clock.sleep(period),
                CalibrationStatus::Homed | CalibrationStatus::Stalled => {
                    return Ok(self.into_controller());
                }
            }
        }
    }

    /// Hand over a controller in Hold. Call once `step` has reported
    /// `Homed` or `Stalled`; position is zero only in the former case.
    pub fn into_controller(self) -> DeskController<A, E, S> {
        let Calibrator {
            actuator,
            endstop_pin,
            sensor_pin,
            tracker,
            monitor,
            stall,
            limits,
            motion,
            clock,
            epoch,
            outcome: _,
        } = self;
        DeskController {
            actuator,
            endstop_pin,
            sensor_pin,
            state: SystemState::Hold,
            target_cm: None,
            tracker,
            endstop: monitor,
            stall,
            limits,
            motion,
            clock,
            epoch,
        }
    }

    fn set_speed(&mut self, v: i32) -> Result<()> {
        self.actuator
            .set_speed(v)
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err("set actuator speed")
    }
}
