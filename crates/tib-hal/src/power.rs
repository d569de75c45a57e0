//! Boolean power control for the laser driver rail.

use tib_types::TibError;

/// A single switched power rail.
pub trait PowerControl: Send {
    /// Read back whether the rail is currently enabled.
    ///
    /// # Errors
    ///
    /// Returns [`TibError::HardwareFault`] if the enable line cannot be read.
    fn is_enabled(&self) -> Result<bool, TibError>;

    /// Enable (`true`) or disable (`false`) the rail.
    ///
    /// # Errors
    ///
    /// Returns [`TibError::HardwareFault`] if the enable line cannot be driven.
    fn set_enabled(&mut self, on: bool) -> Result<(), TibError>;
}
