//! [`WatchdogFeeder`] – keeps the hardware watchdog fed from the control loop.
//!
//! The control loop calls [`WatchdogFeeder::tick`] on every iteration; the
//! feeder only touches the timer once the feed interval has elapsed.  If the
//! loop stalls the timer expires and resets the controller, which is the only
//! recovery path for a wedged control loop.
//!
//! A missing or uninstallable timer is logged and the feeder runs disarmed:
//! the controller keeps working, only without reset protection.

use std::time::{Duration, Instant};

use tib_hal::WatchdogTimer;
use tib_types::TibError;
use tracing::{error, info, warn};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);
pub const DEFAULT_FEED_INTERVAL: Duration = Duration::from_millis(1000);

pub struct WatchdogFeeder {
    timer: Option<Box<dyn WatchdogTimer>>,
    feed_interval: Duration,
    last_feed: Instant,
}

impl WatchdogFeeder {
    /// Install `timeout` on `timer` and return a feeder for it.
    ///
    /// # Errors
    ///
    /// [`TibError::Config`] when `feed_interval` is not shorter than
    /// `timeout`.  A missing timer or a failed install is not an error.
    pub fn install(
        timer: Option<Box<dyn WatchdogTimer>>,
        timeout: Duration,
        feed_interval: Duration,
    ) -> Result<Self, TibError> {
        if feed_interval >= timeout {
            return Err(TibError::Config(format!(
                "watchdog feed interval {feed_interval:?} must be shorter than timeout {timeout:?}"
            )));
        }

        let timer = match timer {
            None => {
                warn!("no watchdog device; continuing without reset protection");
                None
            }
            Some(mut t) => match t.install(timeout) {
                Ok(()) => {
                    info!(timeout_ms = timeout.as_millis() as u64, "watchdog initialized");
                    Some(t)
                }
                Err(e) => {
                    error!(error = %e, "failed to install watchdog timeout");
                    None
                }
            },
        };

        Ok(Self {
            timer,
            feed_interval,
            last_feed: Instant::now(),
        })
    }

    /// `true` when a timer was installed and is being fed.
    pub fn is_armed(&self) -> bool {
        self.timer.is_some()
    }

    pub fn feed_interval(&self) -> Duration {
        self.feed_interval
    }

    /// Feed the timer if the feed interval has elapsed at `now`.
    ///
    /// Returns `true` when a feed was attempted.  A failed feed is logged and
    /// still restarts the interval.
    pub fn tick(&mut self, now: Instant) -> bool {
        let Some(timer) = self.timer.as_mut() else {
            return false;
        };
        if now.saturating_duration_since(self.last_feed) < self.feed_interval {
            return false;
        }
        if let Err(e) = timer.feed() {
            error!(error = %e, "failed to feed watchdog");
        }
        self.last_feed = now;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tib_hal::sim::SimWatchdog;

    #[test]
    fn interval_must_be_shorter_than_timeout() {
        let wd = SimWatchdog::new();
        let err = WatchdogFeeder::install(
            Some(Box::new(wd.clone())),
            Duration::from_millis(1000),
            Duration::from_millis(1000),
        )
        .err()
        .unwrap();
        assert!(matches!(err, TibError::Config(_)));
        assert_eq!(wd.timeout(), None);
    }

    #[test]
    fn missing_timer_runs_disarmed() {
        let mut feeder =
            WatchdogFeeder::install(None, DEFAULT_TIMEOUT, DEFAULT_FEED_INTERVAL).unwrap();
        assert!(!feeder.is_armed());
        assert!(!feeder.tick(Instant::now() + Duration::from_secs(10)));
    }

    #[test]
    fn feeds_only_after_interval() {
        let wd = SimWatchdog::new();
        let mut feeder = WatchdogFeeder::install(
            Some(Box::new(wd.clone())),
            DEFAULT_TIMEOUT,
            DEFAULT_FEED_INTERVAL,
        )
        .unwrap();
        assert!(feeder.is_armed());
        assert_eq!(wd.timeout(), Some(DEFAULT_TIMEOUT));

        let start = Instant::now();
        assert!(!feeder.tick(start));
        assert!(feeder.tick(start + Duration::from_millis(1000)));
        assert!(!feeder.tick(start + Duration::from_millis(1500)));
        assert!(feeder.tick(start + Duration::from_millis(2100)));
        assert_eq!(wd.feeds(), 2);
    }
}
