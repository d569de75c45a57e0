//! Photodiode pair sampled through the ADC.

use tib_types::TibError;
use tracing::error;

use crate::analog::AnalogInput;

/// ADC channel wired to the YJ-band photodiode.
pub const YJ_CHANNEL: u8 = 0;
/// ADC channel wired to the HK-band photodiode.
pub const HK_CHANNEL: u8 = 1;
/// Reported in place of a reading that failed.
pub const MISSING_SAMPLE: i16 = i16::MIN;

/// One reading of both photodiodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhotodiodeSample {
    pub yj: i16,
    pub hk: i16,
}

/// Reads both photodiodes.  Holds the ADC exclusively; nothing else in the
/// controller touches the converter.
pub struct PhotodiodeSampler {
    adc: Box<dyn AnalogInput>,
}

impl PhotodiodeSampler {
    pub fn new(adc: Box<dyn AnalogInput>) -> Self {
        Self { adc }
    }

    /// Read both channels.  A failed channel is logged and reported as
    /// [`MISSING_SAMPLE`]; the other channel is still read.
    pub fn sample(&mut self) -> PhotodiodeSample {
        PhotodiodeSample {
            yj: self.read_or_missing(YJ_CHANNEL, "yj"),
            hk: self.read_or_missing(HK_CHANNEL, "hk"),
        }
    }

    fn read_or_missing(&mut self, channel: u8, label: &str) -> i16 {
        match self.adc.read_adc(channel) {
            Ok(v) => v,
            Err(e) => {
                log_failure(label, &e);
                MISSING_SAMPLE
            }
        }
    }
}

fn log_failure(label: &str, err: &TibError) {
    error!(channel = label, error = %err, "photodiode read failed");
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockAdc {
        yj: Result<i16, TibError>,
        hk: Result<i16, TibError>,
    }

    impl AnalogInput for MockAdc {
        fn read_adc(&mut self, channel: u8) -> Result<i16, TibError> {
            match channel {
                YJ_CHANNEL => self.yj.clone(),
                HK_CHANNEL => self.hk.clone(),
                _ => Err(TibError::hardware("adc", "no such channel")),
            }
        }
    }

    #[test]
    fn reads_both_channels() {
        let mut sampler = PhotodiodeSampler::new(Box::new(MockAdc { yj: Ok(120), hk: Ok(-4) }));
        assert_eq!(sampler.sample(), PhotodiodeSample { yj: 120, hk: -4 });
    }

    #[test]
    fn failed_channel_reports_missing() {
        let mut sampler = PhotodiodeSampler::new(Box::new(MockAdc {
            yj: Err(TibError::hardware("adc", "setup failed")),
            hk: Ok(77),
        }));
        let s = sampler.sample();
        assert_eq!(s.yj, MISSING_SAMPLE);
        assert_eq!(s.hk, 77);
    }
}
