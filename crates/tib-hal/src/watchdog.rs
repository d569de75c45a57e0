//! Hardware watchdog timer capability.
//!
//! The timer resets the whole controller when it is not fed within its
//! installed timeout.  Feeding discipline lives in `tib-kernel`.

use std::time::Duration;

use tib_types::TibError;

pub trait WatchdogTimer: Send {
    /// Arm the timer with `timeout`.  Must be called once before [`feed`][Self::feed].
    ///
    /// # Errors
    ///
    /// Returns [`TibError::HardwareFault`] if the timeout cannot be installed.
    fn install(&mut self, timeout: Duration) -> Result<(), TibError>;

    /// Restart the countdown.
    ///
    /// # Errors
    ///
    /// Returns [`TibError::HardwareFault`] if the feed is rejected.
    fn feed(&mut self) -> Result<(), TibError>;
}
