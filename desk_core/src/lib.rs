#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core height-control logic (hardware-agnostic).
//!
//! All hardware interactions go through `desk_traits::Actuator` and
//! `desk_traits::DigitalInput`; time comes from an injected
//! `desk_traits::Clock` so every timing rule is deterministic in tests.
//!
//! ## Architecture
//!
//! - **Position tracking**: signed edge counter and derived height
//!   (`tracker` module)
//! - **End-stop debounce**: consecutive-cycle confirmation (`endstop`)
//! - **Calibration**: startup homing phase that yields a ready
//!   controller (`calibrate`)
//! - **Stall guard**: dual staleness windows forcing Hold (`stall`)
//! - **Motion state machine**: command arbitration and per-cycle
//!   actuator output (`DeskController`)
//!
//! The control path never panics; every anomaly degrades to Hold, the
//! single safe state.

// Module declarations
pub mod calibrate;
pub mod conversions;
pub mod endstop;
pub mod error;
pub mod mocks;
pub mod runner;
pub mod stall;
pub mod tracker;
pub mod util;

use crate::endstop::{EndstopMonitor, EndstopSignal};
use crate::error::{BuildError, map_hw_error};
use crate::stall::StallGuard;
use crate::tracker::PositionTracker;
use desk_traits::clock::{Clock, MonotonicClock};
use desk_traits::{Actuator, DigitalInput};
use eyre::WrapErr;
use std::sync::Arc;
use std::time::Instant;

pub use crate::calibrate::{CalibrationStatus, Calibrator};
pub use crate::error::{DeskError, Result};

/// Process-wide system state. Exactly one value is active at any time;
/// the system starts in Calibrating and cycles indefinitely afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemState {
    /// Table is lowering to find the end-stop reference
    Calibrating,
    /// Table is supposed to go up
    Up,
    /// Table is supposed to go down
    Down,
    /// Table is supposed to hold still
    Hold,
}

/// Command variants delivered by the remote command source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Up,
    Down,
    Stop,
    GotoHeight(i32),
}

/// Direction of travel while the actuator is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Raising,
    Lowering,
}

/// Why the controller forced a stop this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Requested target height reached
    TargetReached,
    /// Software ceiling at the configured maximum height
    UpperLimit,
    /// Software floor at the configured minimum height
    LowerLimit,
    /// Debounced end-stop switch confirmed while lowering
    Endstop,
    /// Motor commanded but the sensor stopped moving
    Stall,
}

/// Public outcome of a single control cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStatus {
    /// Holding still; actuator stopped
    Holding,
    /// Actuator commanded at the fixed speed
    Moving(Direction),
    /// A forced stop happened this cycle; state is now Hold
    Stopped(StopReason),
}

/// Commandable travel range in centimeters.
#[derive(Debug, Clone)]
pub struct LimitsCfg {
    pub min_height_cm: i32,
    pub max_height_cm: i32,
}

impl Default for LimitsCfg {
    fn default() -> Self {
        Self {
            min_height_cm: 70,
            max_height_cm: 120,
        }
    }
}

/// Motor drive configuration. The motor runs at one fixed speed or not
/// at all; there is no ramping or PID.
#[derive(Debug, Clone)]
pub struct MotionCfg {
    /// Fixed speed magnitude passed to the actuator
    pub speed: i32,
    /// Control loop rate in Hz
    pub cycle_hz: u32,
}

impl Default for MotionCfg {
    fn default() -> Self {
        Self {
            speed: 255,
            cycle_hz: 200,
        }
    }
}

/// End-stop debounce configuration.
#[derive(Debug, Clone)]
pub struct EndstopCfg {
    /// Consecutive triggered cycles required to confirm the end-stop
    pub debounce_cycles: u32,
}

impl Default for EndstopCfg {
    fn default() -> Self {
        Self { debounce_cycles: 11 }
    }
}

/// Stall guard configuration.
#[derive(Debug, Clone)]
pub struct StallCfg {
    pub timeout_ms: u64,
}

impl Default for StallCfg {
    fn default() -> Self {
        Self { timeout_ms: 500 }
    }
}

/// Fixed drive-train geometry relating sensor edges to travel.
#[derive(Debug, Clone)]
pub struct GeometryCfg {
    /// Sensor edges per motor-shaft rotation
    pub edges_per_rotation: u32,
    /// Motor-shaft rotations per centimeter of travel
    pub rotations_per_cm: f64,
}

impl Default for GeometryCfg {
    fn default() -> Self {
        // 50 encoder ticks per 23 cm of travel on the reference hardware
        Self {
            edges_per_rotation: 4,
            rotations_per_cm: 50.0 / 23.0,
        }
    }
}

/// The motion state machine: owns system state, arbitrates commands
/// against target-height requests, and drives the actuator each cycle.
///
/// Constructed by a [`Calibrator`] once the end-stop reference has been
/// found (or homing has degraded to Hold); commands cannot reach the
/// table before that.
pub struct DeskController<A: Actuator, E: DigitalInput, S: DigitalInput> {
    actuator: A,
    endstop_pin: E,
    sensor_pin: S,
    state: SystemState,
    target_cm: Option<i32>,
    tracker: PositionTracker,
    endstop: EndstopMonitor,
    stall: StallGuard,
    limits: LimitsCfg,
    motion: MotionCfg,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) epoch: Instant,
}

impl<A: Actuator, E: DigitalInput, S: DigitalInput> core::fmt::Debug for DeskController<A, E, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DeskController")
            .field("state", &self.state)
            .field("height_cm", &self.height())
            .field("target_cm", &self.target_cm)
            .finish()
    }
}

impl<A: Actuator, E: DigitalInput, S: DigitalInput> DeskController<A, E, S> {
    /// Start building a desk (boxed hardware variant).
    pub fn builder() -> DeskBuilder<Missing, Missing, Missing> {
        DeskBuilder::default()
    }

    pub fn state(&self) -> SystemState {
        self.state
    }

    pub fn target(&self) -> Option<i32> {
        self.target_cm
    }

    /// Current height in whole centimeters, derived from the position
    /// counter. Side-effect free.
    pub fn height(&self) -> i32 {
        self.tracker.height()
    }

    pub fn position(&self) -> i32 {
        self.tracker.position()
    }

    pub fn cycle_hz(&self) -> u32 {
        self.motion.cycle_hz
    }

    pub fn clock(&self) -> &Arc<dyn Clock + Send + Sync> {
        &self.clock
    }

    /// Apply one remote command. Manual commands clear any pending
    /// target; an out-of-range height request is ignored with an
    /// advisory log line.
    pub fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Up => {
                self.state = SystemState::Up;
                self.target_cm = None;
            }
            Command::Down => {
                self.state = SystemState::Down;
                self.target_cm = None;
            }
            Command::Stop => {
                self.state = SystemState::Hold;
                self.target_cm = None;
            }
            Command::GotoHeight(h) => self.goto_height(h),
        }
    }

    fn goto_height(&mut self, h: i32) {
        if h < self.limits.min_height_cm || h > self.limits.max_height_cm {
            tracing::warn!(requested = h, "height request outside travel range, ignoring");
            return;
        }
        let current = self.height();
        if h > current {
            self.target_cm = Some(h);
            self.state = SystemState::Up;
        } else if h < current {
            self.target_cm = Some(h);
            self.state = SystemState::Down;
        }
        // equal: already there
    }

    /// One control cycle. The end-stop and stall checks run every cycle
    /// unconditionally; only the drive decision depends on state.
    pub fn tick(&mut self) -> Result<TickStatus> {
        let now = self.clock.ms_since(self.epoch);

        let endstop_hit = self.check_endstop()?;
        let drive_status = self.drive()?;

        let reading = self
            .sensor_pin
            .read()
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err("read position sensor")?;
        if self.tracker.on_cycle(reading, self.state) {
            self.stall.note_movement(now);
        }

        let stalled = if self.stall.check(now, self.state) {
            tracing::warn!(height = self.height(), "motor stuck, forcing hold");
            self.force_stop()?;
            true
        } else {
            false
        };

        Ok(if stalled {
            TickStatus::Stopped(StopReason::Stall)
        } else if endstop_hit {
            TickStatus::Stopped(StopReason::Endstop)
        } else {
            drive_status
        })
    }

    /// Poll and debounce the end-stop. The switch marks the lower bound
    /// only, so a confirmation is actionable solely while lowering.
    fn check_endstop(&mut self) -> Result<bool> {
        let raw = self
            .endstop_pin
            .read()
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err("read end-stop")?;
        if matches!(self.endstop.on_cycle(raw), EndstopSignal::Confirmed)
            && self.state == SystemState::Down
        {
            tracing::info!("end-stop reached, stopping motor and resetting position");
            self.force_stop()?;
            self.tracker.reset();
            return Ok(true);
        }
        Ok(false)
    }

    fn drive(&mut self) -> Result<TickStatus> {
        // Target arbitration short-circuits any in-flight motion.
        if let Some(t) = self.target_cm
            && self.height() == t
        {
            tracing::info!(height = t, "target height reached, switching to hold");
            self.force_stop()?;
            return Ok(TickStatus::Stopped(StopReason::TargetReached));
        }

        match self.state {
            SystemState::Up => {
                if self.height() < self.limits.max_height_cm {
                    self.set_speed(self.motion.speed)?;
                    Ok(TickStatus::Moving(Direction::Raising))
                } else {
                    tracing::warn!(height = self.height(), "upper travel limit, forcing stop");
                    self.force_stop()?;
                    Ok(TickStatus::Stopped(StopReason::UpperLimit))
                }
            }
            SystemState::Down => {
                if self.height() >= self.limits.min_height_cm {
                    self.set_speed(-self.motion.speed)?;
                    Ok(TickStatus::Moving(Direction::Lowering))
                } else {
                    tracing::warn!(height = self.height(), "lower travel limit, forcing stop");
                    self.force_stop()?;
                    Ok(TickStatus::Stopped(StopReason::LowerLimit))
                }
            }
            SystemState::Hold => {
                self.set_speed(0)?;
                self.target_cm = None;
                Ok(TickStatus::Holding)
            }
            SystemState::Calibrating => {
                // Unreachable once the calibrator has handed over;
                // degrade to the safe state rather than panic.
                tracing::warn!("controller ticked while Calibrating, forcing hold");
                self.force_stop()?;
                Ok(TickStatus::Holding)
            }
        }
    }

    /// Stop the actuator, clear the target, and hold.
    fn force_stop(&mut self) -> Result<()> {
        self.motor_stop()?;
        self.target_cm = None;
        self.state = SystemState::Hold;
        Ok(())
    }

    /// Stop the motor without touching state (best-effort shutdown path).
    pub fn motor_stop(&mut self) -> Result<()> {
        self.set_speed(0)
    }

    fn set_speed(&mut self, v: i32) -> Result<()> {
        self.actuator
            .set_speed(v)
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err("set actuator speed")
    }
}

/// Boxed hardware variant of the controller, built via [`DeskBuilder`].
pub type Desk = DeskController<Box<dyn Actuator>, Box<dyn DigitalInput>, Box<dyn DigitalInput>>;
/// Boxed hardware variant of the calibration phase.
pub type DeskCalibrator =
    Calibrator<Box<dyn Actuator>, Box<dyn DigitalInput>, Box<dyn DigitalInput>>;

fn validate_cfg(
    limits: &LimitsCfg,
    motion: &MotionCfg,
    endstop: &EndstopCfg,
    stall: &StallCfg,
    geometry: &GeometryCfg,
) -> Result<()> {
    if limits.max_height_cm <= limits.min_height_cm {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "max height must be above min height",
        )));
    }
    if motion.speed <= 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "motor speed must be > 0",
        )));
    }
    if motion.cycle_hz == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "cycle rate must be > 0",
        )));
    }
    if endstop.debounce_cycles == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "end-stop debounce must be >= 1 cycle",
        )));
    }
    if stall.timeout_ms == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "stall timeout must be >= 1 ms",
        )));
    }
    if geometry.edges_per_rotation == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "edges per rotation must be >= 1",
        )));
    }
    if !(geometry.rotations_per_cm.is_finite() && geometry.rotations_per_cm > 0.0) {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "rotations per cm must be finite and > 0",
        )));
    }
    Ok(())
}

/// Build a generic, statically-dispatched calibrator from concrete
/// hardware parts.
#[allow(clippy::too_many_arguments)]
pub fn build_desk<A, E, S>(
    actuator: A,
    endstop_pin: E,
    sensor_pin: S,
    limits: LimitsCfg,
    motion: MotionCfg,
    endstop: EndstopCfg,
    stall: StallCfg,
    geometry: GeometryCfg,
    clock: Option<Box<dyn Clock + Send + Sync>>,
) -> Result<Calibrator<A, E, S>>
where
    A: Actuator + 'static,
    E: DigitalInput + 'static,
    S: DigitalInput + 'static,
{
    validate_cfg(&limits, &motion, &endstop, &stall, &geometry)?;
    let clock: Arc<dyn Clock + Send + Sync> = match clock {
        Some(b) => Arc::from(b),
        None => Arc::new(MonotonicClock::new()),
    };
    Ok(Calibrator::new(
        actuator, endstop_pin, sensor_pin, limits, motion, endstop, stall, geometry, clock,
    ))
}

// Type-state markers for the builder
pub struct Missing;
pub struct Set;

use std::marker::PhantomData;

/// Builder for the boxed desk variant. Hardware pieces advance the
/// type-state; `build()` is only available once all three are present.
pub struct DeskBuilder<A, E, S> {
    actuator: Option<Box<dyn Actuator>>,
    endstop_pin: Option<Box<dyn DigitalInput>>,
    sensor_pin: Option<Box<dyn DigitalInput>>,
    limits: Option<LimitsCfg>,
    motion: Option<MotionCfg>,
    endstop: Option<EndstopCfg>,
    stall: Option<StallCfg>,
    geometry: Option<GeometryCfg>,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    _a: PhantomData<A>,
    _e: PhantomData<E>,
    _s: PhantomData<S>,
}

impl Default for DeskBuilder<Missing, Missing, Missing> {
    fn default() -> Self {
        Self {
            actuator: None,
            endstop_pin: None,
            sensor_pin: None,
            limits: None,
            motion: None,
            endstop: None,
            stall: None,
            geometry: None,
            clock: None,
            _a: PhantomData,
            _e: PhantomData,
            _s: PhantomData,
        }
    }
}

impl<A, E, S> DeskBuilder<A, E, S> {
    /// Fallible build available in any type-state; returns a typed
    /// BuildError for missing pieces.
    pub fn try_build(self) -> Result<DeskCalibrator> {
        let DeskBuilder {
            actuator,
            endstop_pin,
            sensor_pin,
            limits,
            motion,
            endstop,
            stall,
            geometry,
            clock,
            _a: _,
            _e: _,
            _s: _,
        } = self;

        let actuator = actuator.ok_or_else(|| eyre::Report::new(BuildError::MissingActuator))?;
        let endstop_pin =
            endstop_pin.ok_or_else(|| eyre::Report::new(BuildError::MissingEndstop))?;
        let sensor_pin = sensor_pin.ok_or_else(|| eyre::Report::new(BuildError::MissingSensor))?;

        let limits = limits.unwrap_or_default();
        let motion = motion.unwrap_or_default();
        let endstop = endstop.unwrap_or_default();
        let stall = stall.unwrap_or_default();
        let geometry = geometry.unwrap_or_default();
        validate_cfg(&limits, &motion, &endstop, &stall, &geometry)?;

        let clock: Arc<dyn Clock + Send + Sync> = match clock {
            Some(b) => Arc::from(b),
            None => Arc::new(MonotonicClock::new()),
        };

        Ok(Calibrator::new(
            actuator, endstop_pin, sensor_pin, limits, motion, endstop, stall, geometry, clock,
        ))
    }
}

/// Chainable setters that do not affect type-state
impl<A, E, S> DeskBuilder<A, E, S> {
    pub fn with_limits(mut self, limits: LimitsCfg) -> Self {
        self.limits = Some(limits);
        self
    }
    pub fn with_motion(mut self, motion: MotionCfg) -> Self {
        self.motion = Some(motion);
        self
    }
    pub fn with_debounce(mut self, endstop: EndstopCfg) -> Self {
        self.endstop = Some(endstop);
        self
    }
    pub fn with_stall(mut self, stall: StallCfg) -> Self {
        self.stall = Some(stall);
        self
    }
    pub fn with_geometry(mut self, geometry: GeometryCfg) -> Self {
        self.geometry = Some(geometry);
        self
    }
    /// Provide a custom clock; defaults to MonotonicClock when absent.
    pub fn with_clock(mut self, clock: Box<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
}

// Setters that advance type-state when providing mandatory hardware
impl<E, S> DeskBuilder<Missing, E, S> {
    pub fn with_actuator(self, actuator: impl Actuator + 'static) -> DeskBuilder<Set, E, S> {
        let DeskBuilder {
            actuator: _,
            endstop_pin,
            sensor_pin,
            limits,
            motion,
            endstop,
            stall,
            geometry,
            clock,
            _a: _,
            _e: _,
            _s: _,
        } = self;
        DeskBuilder {
            actuator: Some(Box::new(actuator)),
            endstop_pin,
            sensor_pin,
            limits,
            motion,
            endstop,
            stall,
            geometry,
            clock,
            _a: PhantomData,
            _e: PhantomData,
            _s: PhantomData,
        }
    }
}

impl<A, S> DeskBuilder<A, Missing, S> {
    pub fn with_endstop(self, pin: impl DigitalInput + 'static) -> DeskBuilder<A, Set, S> {
        let DeskBuilder {
            actuator,
            endstop_pin: _,
            sensor_pin,
            limits,
            motion,
            endstop,
            stall,
            geometry,
            clock,
            _a: _,
            _e: _,
            _s: _,
        } = self;
        DeskBuilder {
            actuator,
            endstop_pin: Some(Box::new(pin)),
            sensor_pin,
            limits,
            motion,
            endstop,
            stall,
            geometry,
            clock,
            _a: PhantomData,
            _e: PhantomData,
            _s: PhantomData,
        }
    }
}

impl<A, E> DeskBuilder<A, E, Missing> {
    pub fn with_sensor(self, pin: impl DigitalInput + 'static) -> DeskBuilder<A, E, Set> {
        let DeskBuilder {
            actuator,
            endstop_pin,
            sensor_pin: _,
            limits,
            motion,
            endstop,
            stall,
            geometry,
            clock,
            _a: _,
            _e: _,
            _s: _,
        } = self;
        DeskBuilder {
            actuator,
            endstop_pin,
            sensor_pin: Some(Box::new(pin)),
            limits,
            motion,
            endstop,
            stall,
            geometry,
            clock,
            _a: PhantomData,
            _e: PhantomData,
            _s: PhantomData,
        }
    }
}

impl DeskBuilder<Set, Set, Set> {
    /// Validate and build the calibration phase. Only available when
    /// actuator, end-stop, and sensor are all set.
    pub fn build(self) -> Result<DeskCalibrator> {
        self.try_build()
    }
}
