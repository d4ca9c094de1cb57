//! Hardware assembly and the serve/self-check commands.

use crate::server::CommandListener;
use desk_config::Config;
use desk_core::{Desk, DeskCalibrator, MotionCfg, runner};
use eyre::WrapErr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

/// Virtual travel the simulated rig starts with, in sensor edges.
const SIM_START_EDGES: f64 = 40.0;
/// Full-speed simulated travel per control cycle, in edges.
const SIM_EDGES_PER_CYCLE: f64 = 1.0;

pub fn run_serve(
    cfg: &Config,
    bind: Option<String>,
    simulate: bool,
    cycle_hz: Option<u32>,
) -> eyre::Result<()> {
    let mut motion: MotionCfg = (&cfg.motion).into();
    if let Some(hz) = cycle_hz {
        motion.cycle_hz = hz;
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || shutdown.store(true, Ordering::Relaxed))
            .wrap_err("install ctrl-c handler")?;
    }

    let height = Arc::new(AtomicI32::new(0));
    let bind_addr = bind.unwrap_or_else(|| cfg.network.bind.clone());
    let listener = CommandListener::spawn(&bind_addr, height.clone(), shutdown.clone())?;
    tracing::info!(addr = %listener.local_addr(), "command API listening");

    let calibrator = build_calibrator(cfg, motion, simulate)?;
    runner::run(calibrator, listener.receiver(), &height, &shutdown)
}

pub fn run_self_check(cfg: &Config, simulate: bool) -> eyre::Result<()> {
    if use_simulation(simulate) {
        let mut cal = build_calibrator(cfg, (&cfg.motion).into(), true)?;
        for _ in 0..3 {
            cal.step().wrap_err("simulated calibration step")?;
        }
        println!("self-check: ok (simulated rig)");
        return Ok(());
    }
    self_check_gpio(cfg)
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
fn self_check_gpio(cfg: &Config) -> eyre::Result<()> {
    // Opening the pins is the check; the motor is not driven.
    desk_hardware::gpio::open_input(cfg.pins.endstop)
        .map_err(|e| eyre::eyre!("open end-stop pin: {e}"))?;
    desk_hardware::gpio::open_input(cfg.pins.opto)
        .map_err(|e| eyre::eyre!("open opto pin: {e}"))?;
    desk_hardware::gpio::open_motor(cfg.pins.motor_pwm, cfg.pins.motor_dir)
        .map_err(|e| eyre::eyre!("open motor pins: {e}"))?;
    println!("self-check: ok (gpio)");
    Ok(())
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
fn self_check_gpio(_cfg: &Config) -> eyre::Result<()> {
    Err(eyre::eyre!(
        "gpio backend not compiled in; rebuild with --features hardware or pass --simulate"
    ))
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
fn use_simulation(flag: bool) -> bool {
    flag
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
fn use_simulation(_flag: bool) -> bool {
    true
}

fn build_calibrator(cfg: &Config, motion: MotionCfg, simulate: bool) -> eyre::Result<DeskCalibrator> {
    let builder = Desk::builder()
        .with_limits((&cfg.limits).into())
        .with_motion(motion)
        .with_debounce((&cfg.endstop).into())
        .with_stall((&cfg.stall).into())
        .with_geometry((&cfg.geometry).into());

    #[cfg(all(feature = "hardware", target_os = "linux"))]
    if !simulate {
        let motor = desk_hardware::gpio::open_motor(cfg.pins.motor_pwm, cfg.pins.motor_dir)
            .map_err(|e| eyre::eyre!("open motor pins: {e}"))?;
        let endstop = desk_hardware::gpio::open_input(cfg.pins.endstop)
            .map_err(|e| eyre::eyre!("open end-stop pin: {e}"))?;
        let opto = desk_hardware::gpio::open_input(cfg.pins.opto)
            .map_err(|e| eyre::eyre!("open opto pin: {e}"))?;
        tracing::info!(pins = ?cfg.pins, "gpio backend ready");
        return builder
            .with_actuator(motor)
            .with_endstop(endstop)
            .with_sensor(opto)
            .build();
    }

    #[cfg(not(all(feature = "hardware", target_os = "linux")))]
    if !simulate {
        tracing::info!("gpio backend not compiled in; using the simulated rig");
    }

    let rig = desk_hardware::SimulatedDesk::new(SIM_START_EDGES, SIM_EDGES_PER_CYCLE);
    builder
        .with_actuator(rig.actuator())
        .with_endstop(rig.endstop())
        .with_sensor(rig.sensor())
        .build()
}
