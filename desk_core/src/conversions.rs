//! Mappings from the serde config schema into the core config structs.

use crate::{EndstopCfg, GeometryCfg, LimitsCfg, MotionCfg, StallCfg};

impl From<&desk_config::Limits> for LimitsCfg {
    fn from(c: &desk_config::Limits) -> Self {
        Self {
            min_height_cm: c.min_height_cm,
            max_height_cm: c.max_height_cm,
        }
    }
}

impl From<&desk_config::Motion> for MotionCfg {
    fn from(c: &desk_config::Motion) -> Self {
        Self {
            speed: c.speed,
            cycle_hz: c.cycle_hz,
        }
    }
}

impl From<&desk_config::Endstop> for EndstopCfg {
    fn from(c: &desk_config::Endstop) -> Self {
        Self {
            debounce_cycles: c.debounce_cycles,
        }
    }
}

impl From<&desk_config::Stall> for StallCfg {
    fn from(c: &desk_config::Stall) -> Self {
        Self {
            timeout_ms: c.timeout_ms,
        }
    }
}

impl From<&desk_config::Geometry> for GeometryCfg {
    fn from(c: &desk_config::Geometry) -> Self {
        Self {
            edges_per_rotation: c.edges_per_rotation,
            rotations_per_cm: c.rotations_per_cm,
        }
    }
}
