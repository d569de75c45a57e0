//! [`DeviceRegistry`] – the command path's handle on every driver it may call.
//!
//! The registry owns the power rail, the attenuator DAC and the field bus.
//! It is constructed once at startup and then owned by the executor, which is
//! the only writer of device state.  The photodiode ADC is not part of it;
//! the sampler owns that converter.

use tib_types::TibError;
use tracing::{error, info};

use crate::analog::AnalogOutput;
use crate::fieldbus::FieldBus;
use crate::power::PowerControl;

pub struct DeviceRegistry {
    power: Box<dyn PowerControl>,
    dac: Box<dyn AnalogOutput>,
    bus: Box<dyn FieldBus>,
}

impl DeviceRegistry {
    pub fn new(
        power: Box<dyn PowerControl>,
        dac: Box<dyn AnalogOutput>,
        bus: Box<dyn FieldBus>,
    ) -> Self {
        Self { power, dac, bus }
    }

    /// # Errors
    ///
    /// Propagates the rail's [`TibError::HardwareFault`].
    pub fn power_enabled(&self) -> Result<bool, TibError> {
        self.power.is_enabled()
    }

    /// Drive the rail to `on`.  Returns `true` when the state actually changed;
    /// requesting the current state performs no write.
    ///
    /// # Errors
    ///
    /// Propagates the rail's [`TibError::HardwareFault`].
    pub fn ensure_power(&mut self, on: bool) -> Result<bool, TibError> {
        if self.power.is_enabled()? == on {
            return Ok(false);
        }
        self.power.set_enabled(on).inspect_err(|e| {
            error!(on, error = %e, "failed to drive power rail");
        })?;
        info!(on, "laser driver power changed");
        Ok(true)
    }

    pub fn dac(&mut self) -> &mut dyn AnalogOutput {
        self.dac.as_mut()
    }

    pub fn bus(&mut self) -> &mut dyn FieldBus {
        self.bus.as_mut()
    }
}
