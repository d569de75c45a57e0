//! [`InstrumentContext`] – every piece of device state the command path may
//! touch, built once at startup and then owned by the executor.

use std::time::Duration;

use tib_hal::sim::SimBench;
use tib_hal::{AttenuatorBank, DeviceRegistry};
use tib_kernel::switching::Router;
use tib_kernel::topology;
use tib_types::TibError;
use tracing::info;

pub use tib_kernel::switching::DEFAULT_SETTLE as DEFAULT_SWITCH_SETTLE;

/// Time the laser controllers need after power-up before they answer.
pub const DEFAULT_LASER_BOOT_WAIT: Duration = Duration::from_millis(1000);

pub struct InstrumentContext {
    pub router: Router,
    pub devices: DeviceRegistry,
    pub attenuators: AttenuatorBank,
    pub laser_boot_wait: Duration,
}

impl InstrumentContext {
    pub fn new(router: Router, devices: DeviceRegistry, laser_boot_wait: Duration) -> Self {
        Self {
            router,
            devices,
            attenuators: AttenuatorBank::new(),
            laser_boot_wait,
        }
    }

    /// A context wired to a simulated bench, with the standard switch
    /// topology installed.
    ///
    /// # Errors
    ///
    /// [`TibError::InternalConfig`] when the topology tables are inconsistent.
    pub fn simulated(
        bench: &SimBench,
        switch_settle: Duration,
        laser_boot_wait: Duration,
    ) -> Result<Self, TibError> {
        let mut router = Router::new(Box::new(bench.gpio.clone()), switch_settle);
        topology::install(&mut router)?;
        info!("instrument context ready (simulated bench)");
        Ok(Self::new(router, bench.registry(), laser_boot_wait))
    }
}
