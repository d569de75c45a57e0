//! Register-oriented field bus (RTU-style holding registers) used to talk to
//! the laser current/temperature controllers.

use tib_types::TibError;

/// Holding-register access on a multi-drop field bus.
pub trait FieldBus: Send {
    /// Read one 16-bit holding register at `address` on bus node `node`.
    ///
    /// # Errors
    ///
    /// Returns [`TibError::HardwareFault`] on timeout or exception response.
    fn read_register(&mut self, node: u8, address: u16) -> Result<u16, TibError>;

    /// Write one 16-bit holding register at `address` on bus node `node`.
    ///
    /// # Errors
    ///
    /// Returns [`TibError::HardwareFault`] on timeout or exception response.
    fn write_register(&mut self, node: u8, address: u16, value: u16) -> Result<(), TibError>;
}
