//! rppal-backed GPIO backend for Raspberry-Pi-class boards.
//!
//! The motor driver is a Cytron-style PWM+DIR board: the direction pin
//! carries the sign, the PWM duty cycle the magnitude.

use crate::error::HwError;
use desk_traits::{Actuator, DigitalInput};
use rppal::gpio::{Gpio, InputPin, OutputPin};
use std::error::Error;

/// Software-PWM carrier frequency for the motor driver.
const PWM_HZ: f64 = 1000.0;

pub struct GpioInput {
    pin: InputPin,
}

pub fn open_input(bcm: u8) -> Result<GpioInput, HwError> {
    let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
    let pin = gpio
        .get(bcm)
        .map_err(|e| HwError::Gpio(e.to_string()))?
        .into_input_pulldown();
    Ok(GpioInput { pin })
}

impl DigitalInput for GpioInput {
    fn read(&mut self) -> Result<bool, Box<dyn Error + Send + Sync>> {
        Ok(self.pin.is_high())
    }
}

pub struct PwmDirMotor {
    pwm: OutputPin,
    dir: OutputPin,
}

pub fn open_motor(pwm_bcm: u8, dir_bcm: u8) -> Result<PwmDirMotor, HwError> {
    let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
    let pwm = gpio
        .get(pwm_bcm)
        .map_err(|e| HwError::Gpio(e.to_string()))?
        .into_output_low();
    let dir = gpio
        .get(dir_bcm)
        .map_err(|e| HwError::Gpio(e.to_string()))?
        .into_output_low();
    Ok(PwmDirMotor { pwm, dir })
}

impl Actuator for PwmDirMotor {
    fn set_speed(&mut self, speed: i32) -> Result<(), Box<dyn Error + Send + Sync>> {
        if speed >= 0 {
            self.dir.set_high();
        } else {
            self.dir.set_low();
        }
        let duty = f64::from(speed.unsigned_abs().min(255)) / 255.0;
        if duty == 0.0 {
            self.pwm
                .clear_pwm()
                .map_err(|e| -> Box<dyn Error + Send + Sync> {
                    Box::new(HwError::Gpio(e.to_string()))
                })?;
            self.pwm.set_low();
        } else {
            self.pwm
                .set_pwm_frequency(PWM_HZ, duty)
                .map_err(|e| -> Box<dyn Error + Send + Sync> {
                    Box::new(HwError::Gpio(e.to_string()))
                })?;
        }
        tracing::trace!(speed, duty, "motor drive updated");
        Ok(())
    }
}
