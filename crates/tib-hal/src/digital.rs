//! Generic `DigitalOutput` trait for GPIO lines (switch coils, power enables,
//! indicator LEDs, …).

use tib_types::TibError;

/// Identifier of a single output line on a GPIO expander.
pub type PinId = u8;

/// A bank of digital output lines.
///
/// The switch routing engine pulses lines of this bank to actuate optical
/// switches; the bank itself has no notion of which line belongs to what.
pub trait DigitalOutput: Send {
    /// Drive `pin` to `level` (`true` = asserted).
    ///
    /// # Errors
    ///
    /// Returns [`TibError::HardwareFault`] if the expander rejects the write.
    fn set_pin(&mut self, pin: PinId, level: bool) -> Result<(), TibError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockBank {
        levels: [bool; 16],
    }

    impl DigitalOutput for MockBank {
        fn set_pin(&mut self, pin: PinId, level: bool) -> Result<(), TibError> {
            let slot = self
                .levels
                .get_mut(pin as usize)
                .ok_or_else(|| TibError::hardware("gpio", format!("no pin {pin}")))?;
            *slot = level;
            Ok(())
        }
    }

    #[test]
    fn mock_bank_sets_and_rejects() {
        let mut bank = MockBank { levels: [false; 16] };
        bank.set_pin(3, true).unwrap();
        assert!(bank.levels[3]);
        assert!(bank.set_pin(40, true).is_err());
    }
}
