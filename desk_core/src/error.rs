use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum DeskError {
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid state: {0}")]
    State(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing actuator")]
    MissingActuator,
    #[error("missing end-stop input")]
    MissingEndstop,
    #[error("missing position sensor input")]
    MissingSensor,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;

/// Map a boxed hardware error to a typed `DeskError`, downcasting to the
/// hardware crate's error type when the feature is enabled.
pub(crate) fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> DeskError {
    #[cfg(feature = "hardware-errors")]
    if let Some(hw) = e.downcast_ref::<desk_hardware::error::HwError>() {
        return DeskError::HardwareFault(hw.to_string());
    }
    DeskError::Hardware(e.to_string())
}
