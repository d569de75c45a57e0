//! Controller settings – read from `$TIB_CONFIG` or `~/.tib/config.toml`.
//!
//! Every field has a default, so a missing file (or a file naming only some
//! fields) is fine.  `TIB_*` environment variables override the file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tib_runtime::PipelineConfig;
use tib_runtime::context::{DEFAULT_LASER_BOOT_WAIT, DEFAULT_SWITCH_SETTLE};
use tib_types::TibError;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Photodiode sampling period.
    pub sample_period_ms: u64,
    /// Publisher loop interval.
    pub publish_tick_ms: u64,
    pub watchdog_timeout_ms: u64,
    /// Must be shorter than `watchdog_timeout_ms`.
    pub watchdog_feed_interval_ms: u64,
    /// Wait after powering the laser rail before touching the controllers.
    pub laser_boot_wait_ms: u64,
    /// Hold time for each step of a switch actuation pulse.
    pub switch_settle_ms: u64,
    /// Print photodiode samples on the console along with replies.
    pub echo_samples: bool,
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl Default for Config {
    fn default() -> Self {
        let pipeline = PipelineConfig::default();
        Self {
            sample_period_ms: millis(pipeline.sample_period),
            publish_tick_ms: millis(pipeline.publish_tick),
            watchdog_timeout_ms: millis(pipeline.watchdog_timeout),
            watchdog_feed_interval_ms: millis(pipeline.watchdog_feed_interval),
            laser_boot_wait_ms: millis(DEFAULT_LASER_BOOT_WAIT),
            switch_settle_ms: millis(DEFAULT_SWITCH_SETTLE),
            echo_samples: false,
        }
    }
}

impl Config {
    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            sample_period: Duration::from_millis(self.sample_period_ms),
            publish_tick: Duration::from_millis(self.publish_tick_ms),
            watchdog_timeout: Duration::from_millis(self.watchdog_timeout_ms),
            watchdog_feed_interval: Duration::from_millis(self.watchdog_feed_interval_ms),
        }
    }

    pub fn laser_boot_wait(&self) -> Duration {
        Duration::from_millis(self.laser_boot_wait_ms)
    }

    pub fn switch_settle(&self) -> Duration {
        Duration::from_millis(self.switch_settle_ms)
    }
}

/// `$TIB_CONFIG` if set, else `~/.tib/config.toml`.
pub fn config_path() -> PathBuf {
    if let Ok(p) = std::env::var("TIB_CONFIG") {
        return PathBuf::from(p);
    }
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    config_path_for_home(&home)
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".tib").join("config.toml")
}

/// Load from [`config_path`] and apply environment overrides.
///
/// # Errors
///
/// [`TibError::Config`] when the file exists but cannot be read or parsed.
pub fn load() -> Result<Config, TibError> {
    let mut cfg = load_from(&config_path())?;
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

pub(crate) fn load_from(path: &Path) -> Result<Config, TibError> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| TibError::Config(format!("failed to read {}: {e}", path.display())))?;
    toml::from_str(&raw)
        .map_err(|e| TibError::Config(format!("failed to parse {}: {e}", path.display())))
}

/// Apply `TIB_*` overrides.  Unparsable values are logged and ignored.
///
/// | Variable | Field |
/// |---|---|
/// | `TIB_SAMPLE_PERIOD_MS` | `sample_period_ms` |
/// | `TIB_PUBLISH_TICK_MS` | `publish_tick_ms` |
/// | `TIB_WATCHDOG_TIMEOUT_MS` | `watchdog_timeout_ms` |
/// | `TIB_WATCHDOG_FEED_INTERVAL_MS` | `watchdog_feed_interval_ms` |
/// | `TIB_LASER_BOOT_WAIT_MS` | `laser_boot_wait_ms` |
/// | `TIB_SWITCH_SETTLE_MS` | `switch_settle_ms` |
/// | `TIB_ECHO_SAMPLES` | `echo_samples` |
pub fn apply_env_overrides(cfg: &mut Config) {
    override_from_env("TIB_SAMPLE_PERIOD_MS", &mut cfg.sample_period_ms);
    override_from_env("TIB_PUBLISH_TICK_MS", &mut cfg.publish_tick_ms);
    override_from_env("TIB_WATCHDOG_TIMEOUT_MS", &mut cfg.watchdog_timeout_ms);
    override_from_env("TIB_WATCHDOG_FEED_INTERVAL_MS", &mut cfg.watchdog_feed_interval_ms);
    override_from_env("TIB_LASER_BOOT_WAIT_MS", &mut cfg.laser_boot_wait_ms);
    override_from_env("TIB_SWITCH_SETTLE_MS", &mut cfg.switch_settle_ms);
    override_from_env("TIB_ECHO_SAMPLES", &mut cfg.echo_samples);
}

fn override_from_env<T: std::str::FromStr>(var: &str, field: &mut T) {
    let Ok(raw) = std::env::var(var) else {
        return;
    };
    match raw.trim().parse() {
        Ok(v) => *field = v,
        Err(_) => warn!(var, value = %raw, "ignoring unparsable override"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert_eq!(load_from(&path).unwrap(), Config::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "sample_period_ms = 50\necho_samples = true\n").unwrap();

        let cfg = load_from(&path).unwrap();
        assert_eq!(cfg.sample_period_ms, 50);
        assert!(cfg.echo_samples);
        assert_eq!(cfg.watchdog_timeout_ms, 5000);
        assert_eq!(cfg.switch_settle_ms, 2);
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "sample_period_ms = \"fast\"").unwrap();
        assert!(matches!(load_from(&path), Err(TibError::Config(_))));
    }

    #[test]
    fn serialized_defaults_load_back() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, toml::to_string_pretty(&Config::default()).unwrap()).unwrap();
        assert_eq!(load_from(&path).unwrap(), Config::default());
    }

    #[test]
    fn path_points_to_tib_dir() {
        let p = config_path_for_home("/home/operator");
        assert!(p.to_string_lossy().contains(".tib"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn pipeline_timings_follow_config() {
        let cfg = Config {
            sample_period_ms: 40,
            watchdog_feed_interval_ms: 250,
            ..Config::default()
        };
        let p = cfg.pipeline();
        assert_eq!(p.sample_period, Duration::from_millis(40));
        assert_eq!(p.publish_tick, Duration::from_millis(10));
        assert_eq!(p.watchdog_timeout, Duration::from_secs(5));
        assert_eq!(p.watchdog_feed_interval, Duration::from_millis(250));
        assert_eq!(cfg.switch_settle(), Duration::from_millis(2));
    }

    #[test]
    fn env_overrides_apply_and_bad_values_are_ignored() {
        // SAFETY: these variables are only touched by this test.
        unsafe {
            std::env::set_var("TIB_LASER_BOOT_WAIT_MS", "250");
            std::env::set_var("TIB_PUBLISH_TICK_MS", "soon");
        }
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.laser_boot_wait_ms, 250);
        assert_eq!(cfg.publish_tick_ms, 10);
        unsafe {
            std::env::remove_var("TIB_LASER_BOOT_WAIT_MS");
            std::env::remove_var("TIB_PUBLISH_TICK_MS");
        }
    }
}
