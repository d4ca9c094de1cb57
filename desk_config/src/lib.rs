#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the desk controller.
//!
//! `Config` and sub-structs are deserialized from TOML and validated.
//! Defaults describe the reference hardware: an IKEA frame with 70–120 cm
//! travel, a fixed-speed DC motor, and a 50/23 rotations-per-cm gearing.
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Pins {
    /// End-stop switch input (BCM numbering on the gpio backend)
    pub endstop: u8,
    /// Optical position sensor input
    pub opto: u8,
    /// Motor driver PWM pin
    pub motor_pwm: u8,
    /// Motor driver direction pin
    pub motor_dir: u8,
}

impl Default for Pins {
    fn default() -> Self {
        Self {
            endstop: 5,
            opto: 6,
            motor_pwm: 18,
            motor_dir: 23,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Limits {
    /// Lowest commandable height (cm); also the height at the end-stop
    pub min_height_cm: i32,
    /// Highest commandable height (cm)
    pub max_height_cm: i32,
}

impl Default for Limits {
    fn default() -> Self {
        // Official travel range from the frame manual
        Self {
            min_height_cm: 70,
            max_height_cm: 120,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Motion {
    /// Fixed motor speed magnitude commanded while moving
    pub speed: i32,
    /// Control loop rate in Hz
    pub cycle_hz: u32,
}

impl Default for Motion {
    fn default() -> Self {
        Self {
            speed: 255,
            cycle_hz: 200,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Endstop {
    /// Consecutive triggered cycles required before the end-stop counts
    /// as reached
    pub debounce_cycles: u32,
}

impl Default for Endstop {
    fn default() -> Self {
        Self { debounce_cycles: 11 }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Stall {
    /// Force a stop when the motor runs this long without a sensor edge
    pub timeout_ms: u64,
}

impl Default for Stall {
    fn default() -> Self {
        Self { timeout_ms: 500 }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Geometry {
    /// Sensor edges per motor-shaft rotation
    pub edges_per_rotation: u32,
    /// Motor-shaft rotations per centimeter of travel
    pub rotations_per_cm: f64,
}

impl Default for Geometry {
    fn default() -> Self {
        // 50 encoder ticks per 23 cm of travel on the reference hardware
        Self {
            edges_per_rotation: 4,
            rotations_per_cm: 50.0 / 23.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Network {
    /// Listen address for the HTTP command API
    pub bind: String,
}

impl Default for Network {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Config {
    pub pins: Pins,
    pub limits: Limits,
    pub motion: Motion,
    pub endstop: Endstop,
    pub stall: Stall,
    pub geometry: Geometry,
    pub network: Network,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Limits
        if self.limits.min_height_cm < 1 {
            eyre::bail!("limits.min_height_cm must be >= 1");
        }
        if self.limits.max_height_cm <= self.limits.min_height_cm {
            eyre::bail!("limits.max_height_cm must be > limits.min_height_cm");
        }

        // Motion
        if !(1..=255).contains(&self.motion.speed) {
            eyre::bail!("motion.speed must be in [1, 255]");
        }
        if self.motion.cycle_hz == 0 {
            eyre::bail!("motion.cycle_hz must be > 0");
        }
        if self.motion.cycle_hz > 1000 {
            eyre::bail!("motion.cycle_hz is unreasonably large (>1kHz)");
        }

        // End-stop
        if self.endstop.debounce_cycles == 0 {
            eyre::bail!("endstop.debounce_cycles must be >= 1");
        }

        // Stall
        if self.stall.timeout_ms == 0 {
            eyre::bail!("stall.timeout_ms must be >= 1");
        }
        if self.stall.timeout_ms > 60_000 {
            eyre::bail!("stall.timeout_ms is unreasonably large (>60s)");
        }

        // Geometry
        if self.geometry.edges_per_rotation == 0 {
            eyre::bail!("geometry.edges_per_rotation must be >= 1");
        }
        if !(self.geometry.rotations_per_cm.is_finite() && self.geometry.rotations_per_cm > 0.0) {
            eyre::bail!("geometry.rotations_per_cm must be finite and > 0");
        }

        // Network
        if self.network.bind.is_empty() {
            eyre::bail!("network.bind must not be empty");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}
