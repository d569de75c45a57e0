//! Analog conversion capabilities: a DAC that drives attenuator control
//! voltages and an ADC that samples photodiodes.

use tib_types::TibError;

/// Multi-channel digital-to-analog converter.
pub trait AnalogOutput: Send {
    /// Write a raw converter `code` to `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`TibError::HardwareFault`] when the converter is not ready or
    /// the write fails.
    fn write_dac(&mut self, channel: u8, code: u16) -> Result<(), TibError>;
}

/// Multi-channel analog-to-digital converter returning signed 16-bit samples.
pub trait AnalogInput: Send {
    /// Take one sample from `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`TibError::HardwareFault`] when channel setup or the read fails.
    fn read_adc(&mut self, channel: u8) -> Result<i16, TibError>;
}
