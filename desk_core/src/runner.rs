//! Service loop: calibrate, then tick the controller while draining the
//! remote command channel.
//!
//! The command source lives on its own thread and feeds a bounded
//! channel; the loop drains it non-blockingly each cycle so network
//! traffic can never stall the safety checks. The current height is
//! published through an atomic for the height query endpoint.

use crate::error::Result;
use crate::util::cycle_period;
use crate::{Calibrator, Command, TickStatus};
use crossbeam_channel::Receiver;
use desk_traits::{Actuator, DigitalInput};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

/// Calibrate and run the control loop until `shutdown` is raised or a
/// hardware error surfaces. The motor is stopped best-effort on every
/// exit path.
pub fn run<A, E, S>(
    calibrator: Calibrator<A, E, S>,
    commands: &Receiver<Command>,
    height_out: &Arc<AtomicI32>,
    shutdown: &Arc<AtomicBool>,
) -> Result<()>
where
    A: Actuator,
    E: DigitalInput,
    S: DigitalInput,
{
    tracing::info!("calibrating: lowering until the end-stop confirms");
    let mut desk = calibrator.run()?;
    tracing::info!(height = desk.height(), "calibration finished, accepting commands");
    height_out.store(desk.height(), Ordering::Relaxed);

    let period = cycle_period(desk.cycle_hz());
    loop {
        if shutdown.load(Ordering::Relaxed) {
            desk.handle_command(Command::Stop);
            let _ = desk.motor_stop();
            tracing::info!("shutdown requested, motor stopped");
            return Ok(());
        }

        for cmd in commands.try_iter() {
            tracing::debug!(?cmd, "command received");
            desk.handle_command(cmd);
        }

        let status = match desk.tick() {
            Ok(s) => s,
            Err(e) => {
                let _ = desk.motor_stop();
                return Err(e);
            }
        };
        if let TickStatus::Stopped(reason) = status {
            tracing::info!(?reason, height = desk.height(), "motion stopped");
        }

        height_out.store(desk.height(), Ordering::Relaxed);
        desk.clock.sleep(period);
    }
}
