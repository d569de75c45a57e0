//! Variable optical attenuators driven by DAC control voltages.
//!
//! Each attenuator carries a pair of quadratic calibrations, `dB → volts` and
//! `volts → dB`.  Commanded levels are converted to a voltage, clamped to the
//! converter range and written as a 12-bit code.  The last commanded voltage is
//! remembered so the level can be read back in either unit.

use tib_types::TibError;

use crate::analog::AnalogOutput;

pub const DAC_RESOLUTION_BITS: u32 = 12;
pub const DAC_MAX_CODE: u16 = (1 << DAC_RESOLUTION_BITS) - 1;
/// Full-scale converter output in volts.
pub const MAX_VOLTAGE: f64 = 4.096;
/// Attenuators fitted to the bench, one per DAC channel starting at 0.
pub const NUM_ATTENUATORS: usize = 6;

/// Quadratic coefficients `[c0, c1, c2]` for `y = c0 + c1·x + c2·x²`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Calibration {
    pub db_to_volt: [f64; 3],
    pub volt_to_db: [f64; 3],
}

impl Calibration {
    pub fn volts_for_db(&self, db: f64) -> f64 {
        eval_quadratic(&self.db_to_volt, db)
    }

    pub fn db_for_volts(&self, volts: f64) -> f64 {
        eval_quadratic(&self.volt_to_db, volts)
    }
}

fn eval_quadratic(c: &[f64; 3], x: f64) -> f64 {
    c[0] + c[1] * x + c[2] * x * x
}

/// Unit of a commanded attenuator level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Units {
    /// Raw control voltage.
    Volts,
    /// Calibrated attenuation.
    Decibels,
}

/// Clamp `volts` into `[0, MAX_VOLTAGE]`.
pub fn clamp_voltage(volts: f64) -> f64 {
    if volts.is_nan() {
        0.0
    } else {
        volts.clamp(0.0, MAX_VOLTAGE)
    }
}

/// Converter code for an already clamped voltage.
pub fn code_for_voltage(volts: f64) -> u16 {
    ((volts / MAX_VOLTAGE) * f64::from(DAC_MAX_CODE)) as u16
}

/// A single attenuator channel.
#[derive(Debug, Clone)]
pub struct Attenuator {
    channel: u8,
    calibration: Calibration,
    voltage: f64,
}

impl Attenuator {
    /// An uncalibrated attenuator at 0 V on DAC `channel`.
    pub fn new(channel: u8) -> Self {
        Self {
            channel,
            calibration: Calibration::default(),
            voltage: 0.0,
        }
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// Last successfully commanded voltage.
    pub fn voltage(&self) -> f64 {
        self.voltage
    }

    /// Last commanded level expressed through the `volts → dB` calibration.
    pub fn decibels(&self) -> f64 {
        self.calibration.db_for_volts(self.voltage)
    }

    /// Command a level in `units`.  Returns the voltage actually applied.
    ///
    /// The stored voltage only changes once the converter accepted the write.
    ///
    /// # Errors
    ///
    /// Propagates the converter's [`TibError::HardwareFault`].
    pub fn set(
        &mut self,
        dac: &mut dyn AnalogOutput,
        value: f64,
        units: Units,
    ) -> Result<f64, TibError> {
        let requested = match units {
            Units::Volts => value,
            Units::Decibels => self.calibration.volts_for_db(value),
        };
        let volts = clamp_voltage(requested);
        dac.write_dac(self.channel, code_for_voltage(volts))?;
        self.voltage = volts;
        Ok(volts)
    }

    /// Replace the calibration and re-apply the current dB level through it.
    ///
    /// The new calibration is kept even when the re-application write fails;
    /// the voltage then stays at its previous value.
    ///
    /// # Errors
    ///
    /// Propagates the converter's [`TibError::HardwareFault`].
    pub fn recalibrate(
        &mut self,
        dac: &mut dyn AnalogOutput,
        calibration: Calibration,
    ) -> Result<f64, TibError> {
        let db = self.decibels();
        self.calibration = calibration;
        self.set(dac, db, Units::Decibels)
    }
}

/// The full set of bench attenuators, indexed by laser bus node.
#[derive(Debug, Clone)]
pub struct AttenuatorBank {
    attenuators: Vec<Attenuator>,
}

impl AttenuatorBank {
    pub fn new() -> Self {
        Self {
            attenuators: (0..NUM_ATTENUATORS as u8).map(Attenuator::new).collect(),
        }
    }

    pub fn get(&self, index: usize) -> Option<&Attenuator> {
        self.attenuators.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Attenuator> {
        self.attenuators.get_mut(index)
    }
}

impl Default for AttenuatorBank {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct MockDac {
        writes: Vec<(u8, u16)>,
        fail: bool,
    }

    impl AnalogOutput for MockDac {
        fn write_dac(&mut self, channel: u8, code: u16) -> Result<(), TibError> {
            if self.fail {
                return Err(TibError::hardware("dac", "not ready"));
            }
            self.writes.push((channel, code));
            Ok(())
        }
    }

    fn linear() -> Calibration {
        // 1 V per -10 dB and back.
        Calibration {
            db_to_volt: [0.0, -0.1, 0.0],
            volt_to_db: [0.0, -10.0, 0.0],
        }
    }

    #[test]
    fn raw_voltage_is_clamped_and_coded() {
        let mut dac = MockDac::default();
        let mut att = Attenuator::new(2);

        assert_eq!(att.set(&mut dac, 9.0, Units::Volts).unwrap(), MAX_VOLTAGE);
        assert_eq!(dac.writes.last(), Some(&(2, DAC_MAX_CODE)));

        assert_eq!(att.set(&mut dac, -1.0, Units::Volts).unwrap(), 0.0);
        assert_eq!(dac.writes.last(), Some(&(2, 0)));

        att.set(&mut dac, 2.048, Units::Volts).unwrap();
        assert_eq!(dac.writes.last(), Some(&(2, 2047)));
        assert!((att.voltage() - 2.048).abs() < 1e-12);
    }

    #[test]
    fn decibels_go_through_calibration() {
        let mut dac = MockDac::default();
        let mut att = Attenuator::new(0);
        att.recalibrate(&mut dac, linear()).unwrap();

        att.set(&mut dac, -15.0, Units::Decibels).unwrap();
        assert!((att.voltage() - 1.5).abs() < 1e-9);
        assert!((att.decibels() - -15.0).abs() < 1e-9);
    }

    #[test]
    fn quadratic_term_is_applied() {
        let cal = Calibration {
            db_to_volt: [1.0, 2.0, 3.0],
            volt_to_db: [0.5, 0.0, 2.0],
        };
        assert!((cal.volts_for_db(2.0) - 17.0).abs() < 1e-12);
        assert!((cal.db_for_volts(3.0) - 18.5).abs() < 1e-12);
    }

    #[test]
    fn recalibrate_preserves_decibel_level() {
        let mut dac = MockDac::default();
        let mut att = Attenuator::new(1);
        att.recalibrate(&mut dac, linear()).unwrap();
        att.set(&mut dac, -20.0, Units::Decibels).unwrap();

        let steeper = Calibration {
            db_to_volt: [0.0, -0.05, 0.0],
            volt_to_db: [0.0, -20.0, 0.0],
        };
        att.recalibrate(&mut dac, steeper).unwrap();
        assert!((att.voltage() - 1.0).abs() < 1e-9);
        assert!((att.decibels() - -20.0).abs() < 1e-9);
    }

    #[test]
    fn failed_write_keeps_previous_voltage() {
        let mut dac = MockDac::default();
        let mut att = Attenuator::new(3);
        att.set(&mut dac, 1.0, Units::Volts).unwrap();

        dac.fail = true;
        assert!(att.set(&mut dac, 3.0, Units::Volts).is_err());
        assert!((att.voltage() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn bank_has_one_attenuator_per_channel() {
        let bank = AttenuatorBank::new();
        for i in 0..NUM_ATTENUATORS {
            assert_eq!(bank.get(i).unwrap().channel() as usize, i);
        }
        assert!(bank.get(NUM_ATTENUATORS).is_none());
    }
}
