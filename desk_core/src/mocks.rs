//! Reusable test doubles for the hardware traits.

use desk_traits::{Actuator, DigitalInput};
use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

/// Input pin with a fixed reading.
pub struct StaticInput(pub bool);

impl DigitalInput for StaticInput {
    fn read(&mut self) -> Result<bool, Box<dyn Error + Send + Sync>> {
        Ok(self.0)
    }
}

/// Input pin backed by a shared flag; tests flip it between cycles.
#[derive(Clone)]
pub struct SharedInput(Arc<AtomicBool>);

impl SharedInput {
    pub fn new(initial: bool) -> Self {
        Self(Arc::new(AtomicBool::new(initial)))
    }

    pub fn set(&self, v: bool) {
        self.0.store(v, Ordering::Relaxed);
    }

    pub fn toggle(&self) {
        self.0.fetch_xor(true, Ordering::Relaxed);
    }
}

impl DigitalInput for SharedInput {
    fn read(&mut self) -> Result<bool, Box<dyn Error + Send + Sync>> {
        Ok(self.0.load(Ordering::Relaxed))
    }
}

/// Input pin that plays back a fixed sequence, then repeats the final
/// reading.
pub struct ScriptedInput {
    seq: Vec<bool>,
    idx: usize,
}

impl ScriptedInput {
    pub fn new(seq: impl Into<Vec<bool>>) -> Self {
        Self {
            seq: seq.into(),
            idx: 0,
        }
    }
}

impl DigitalInput for ScriptedInput {
    fn read(&mut self) -> Result<bool, Box<dyn Error + Send + Sync>> {
        let v = if self.idx < self.seq.len() {
            let x = self.seq[self.idx];
            self.idx += 1;
            x
        } else {
            self.seq.last().copied().unwrap_or(false)
        };
        Ok(v)
    }
}

/// Actuator that records the last commanded speed.
#[derive(Clone, Default)]
pub struct SpyActuator {
    last_speed: Arc<AtomicI32>,
}

impl SpyActuator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_speed(&self) -> i32 {
        self.last_speed.load(Ordering::Relaxed)
    }
}

impl Actuator for SpyActuator {
    fn set_speed(&mut self, speed: i32) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.last_speed.store(speed, Ordering::Relaxed);
        Ok(())
    }
}
