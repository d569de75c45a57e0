//! Laser current/temperature controllers on the field bus.
//!
//! Controllers are addressed by a bus node id and expose their settings as
//! 16-bit holding registers.  Operators refer to both by symbolic names; the
//! two tables in this module translate them.

use tib_types::TibError;

use crate::fieldbus::FieldBus;

/// Symbolic register names (matched case-insensitively) and their addresses.
pub const REGISTERS: &[(&str, u16)] = &[
    ("TEC_TEMPERATURE_MEASURED", 0x1000),
    ("PCB_TEMPERATURE_MEASURED", 0x1001),
    ("TEC_TEMPERATURE_VALUE", 0x1002),
    ("CURRENT_MEASURED", 0x1003),
    ("CURRENT", 0x1004),
    ("VOLTAGE_MEASURED", 0x1005),
    ("CURRENT_MAX_LIMIT", 0x1006),
    ("CURRENT_PROTECTION_THRESHOLD", 0x1007),
    ("CURRENT_SET_CALIBRATION", 0x1008),
    ("NTC_COEFFICIENT", 0x1009),
    ("TEC_CURRENT_MEASURED", 0x100A),
    ("TEC_VOLTAGE", 0x100B),
    ("SERIAL_NUMBER", 0x100C),
    ("FREQUENCY", 0x100D),
    ("DURATION", 0x100E),
    ("STATE_OF_DEVICE_COMMAND", 0x1010),
];

/// Laser names (matched case-insensitively) and the bus node serving them.
///
/// TODO: 1028y and 1270j both map to node 1; confirm the bus addressing with
/// the hardware owner before fitting the 1270j controller.
pub const LASERS: &[(&str, u8)] = &[
    ("1028y", 1),
    ("1270j", 1),
    ("1430yj", 2),
    ("1430hk", 3),
    ("1510h", 4),
    ("2330k", 5),
];

/// Resolve a register name to its address.
pub fn register_address(name: &str) -> Option<u16> {
    REGISTERS
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, addr)| *addr)
}

/// Resolve a laser name (e.g. `"1028y"`) to its bus node.
pub fn laser_node(name: &str) -> Option<u8> {
    LASERS
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, node)| *node)
}

/// Reinterpret a raw register value as two's-complement.
pub fn to_signed(raw: u16) -> i16 {
    raw as i16
}

/// Register access to one controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaserDriver {
    node: u8,
}

impl LaserDriver {
    pub fn new(node: u8) -> Self {
        Self { node }
    }

    pub fn node(&self) -> u8 {
        self.node
    }

    /// # Errors
    ///
    /// Propagates the bus's [`TibError::HardwareFault`].
    pub fn read_u16(&self, bus: &mut dyn FieldBus, address: u16) -> Result<u16, TibError> {
        bus.read_register(self.node, address).inspect_err(|e| {
            tracing::error!(node = self.node, address, error = %e, "field bus read failed");
        })
    }

    /// # Errors
    ///
    /// Propagates the bus's [`TibError::HardwareFault`].
    pub fn write_u16(
        &self,
        bus: &mut dyn FieldBus,
        address: u16,
        value: u16,
    ) -> Result<(), TibError> {
        bus.write_register(self.node, address, value).inspect_err(|e| {
            tracing::error!(node = self.node, address, value, error = %e, "field bus write failed");
        })
    }
}
