//! Human-readable error descriptions and structured JSON error formatting.

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    use desk_core::error::{BuildError, DeskError};

    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingActuator => {
                "What happened: No motor driver was provided to the controller.\nLikely causes: GPIO motor init failed or the actuator was not wired into the builder.\nHow to fix: Check [pins].motor_pwm/motor_dir, or run with --simulate.".to_string()
            }
            BuildError::MissingEndstop => {
                "What happened: No end-stop input was provided to the controller.\nLikely causes: GPIO input init failed or the pin was not wired into the builder.\nHow to fix: Check [pins].endstop, or run with --simulate.".to_string()
            }
            BuildError::MissingSensor => {
                "What happened: No position sensor input was provided to the controller.\nLikely causes: GPIO input init failed or the pin was not wired into the builder.\nHow to fix: Check [pins].opto, or run with --simulate.".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(de) = err.downcast_ref::<DeskError>() {
        return match de {
            DeskError::Hardware(_) | DeskError::HardwareFault(_) => format!(
                "What happened: {de}.\nLikely causes: Wrong pin numbers, wiring/power issues, or insufficient GPIO permissions.\nHow to fix: Verify [pins] in the config and that the process may access GPIO."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config;
    // use the alternate form so wrapped context keeps the root cause.
    let msg = format!("{err:#}");
    let lower = msg.to_ascii_lowercase();

    if lower.contains("address") && (lower.contains("in use") || lower.contains("bind")) {
        return "What happened: The command API could not bind its listen address.\nLikely causes: Another process already uses the port, or the address is not local.\nHow to fix: Change network.bind in the config or pass --bind with a free port.".to_string();
    }

    if lower.contains("must be") || lower.contains("unreasonably") {
        return format!(
            "What happened: Configuration is invalid or incomplete.\nHow to fix: Edit the TOML config and try again. Original: {msg}"
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: config/build problems return 2, hardware faults 3,
/// anything else 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    use desk_core::error::{BuildError, DeskError};
    if err.downcast_ref::<BuildError>().is_some() {
        return 2;
    }
    match err.downcast_ref::<DeskError>() {
        Some(DeskError::Hardware(_) | DeskError::HardwareFault(_)) => 3,
        Some(DeskError::Config(_)) => 2,
        _ => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use desk_core::error::{BuildError, DeskError};
    use serde_json::json;

    let reason = if err.downcast_ref::<BuildError>().is_some() {
        "BuildError"
    } else {
        match err.downcast_ref::<DeskError>() {
            Some(DeskError::Hardware(_)) => "Hardware",
            Some(DeskError::HardwareFault(_)) => "HardwareFault",
            Some(DeskError::Config(_)) => "Config",
            Some(DeskError::State(_)) => "State",
            None => "Error",
        }
    };
    json!({ "reason": reason, "message": humanize(err) }).to_string()
}
