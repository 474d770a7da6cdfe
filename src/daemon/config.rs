//! TOML-based daemon configuration.
//!
//! Every tunable of the classification and scheduling loop lives here so the
//! thresholds and interval multipliers stay a configuration surface instead
//! of constants buried in the code. Stored at `<state dir>/config.toml`.

use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Classification tuning. Rates are events per minute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Length of one activity window in seconds.
    #[serde(default = "default_window_secs")]
    pub window_secs: u32,
    #[serde(default = "default_low_threshold")]
    pub low_threshold: f64,
    #[serde(default = "default_normal_threshold")]
    pub normal_threshold: f64,
    #[serde(default = "default_high_threshold")]
    pub high_threshold: f64,
    /// Consecutive sub-low windows required before going Inactive.
    #[serde(default = "default_inactive_windows")]
    pub inactive_windows: u32,
    /// Consecutive windows in a new band required before switching to it.
    #[serde(default = "default_hysteresis_windows")]
    pub hysteresis_windows: u32,
    /// Damp the rate when only a single event kind repeats, so holding a key
    /// down doesn't read as hyperactivity.
    #[serde(default = "default_true")]
    pub kind_weighting: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            low_threshold: default_low_threshold(),
            normal_threshold: default_normal_threshold(),
            high_threshold: default_high_threshold(),
            inactive_windows: default_inactive_windows(),
            hysteresis_windows: default_hysteresis_windows(),
            kind_weighting: true,
        }
    }
}

/// Reminder timing tuning. The factors are the open part of the design: they
/// shape how strongly each activity state bends the base interval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_base_interval_mins")]
    pub base_interval_mins: u32,
    /// Computed intervals never go below this floor.
    #[serde(default = "default_min_interval_mins")]
    pub min_interval_mins: u32,
    #[serde(default = "default_inactive_factor")]
    pub inactive_factor: f64,
    #[serde(default = "default_low_activity_factor")]
    pub low_activity_factor: f64,
    #[serde(default = "default_normal_factor")]
    pub normal_factor: f64,
    #[serde(default = "default_hyperactive_factor")]
    pub hyperactive_factor: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            base_interval_mins: default_base_interval_mins(),
            min_interval_mins: default_min_interval_mins(),
            inactive_factor: default_inactive_factor(),
            low_activity_factor: default_low_activity_factor(),
            normal_factor: default_normal_factor(),
            hyperactive_factor: default_hyperactive_factor(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseConfig {
    /// How long a reminder waits for an answer before timing out, in seconds.
    #[serde(default = "default_response_window_secs")]
    pub response_window_secs: u32,
    /// How often accumulated statistics are checkpointed to disk, in minutes.
    #[serde(default = "default_checkpoint_mins")]
    pub checkpoint_mins: u32,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            response_window_secs: default_response_window_secs(),
            checkpoint_mins: default_checkpoint_mins(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub responses: ResponseConfig,
}

impl DaemonConfig {
    /// Loads configuration from `config.toml` under the application
    /// directory. A missing file means defaults; an unreadable one is worth a
    /// warning but never stops the daemon.
    pub fn load(app_dir: &Path) -> Result<Self> {
        let path = app_dir.join("config.toml");
        let content = match std::fs::read_to_string(&path) {
            Ok(v) => v,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        match toml::from_str(&content) {
            Ok(v) => Ok(v),
            Err(e) => {
                warn!("Couldn't parse {path:?}, continuing with defaults: {e}");
                Ok(Self::default())
            }
        }
    }
}

fn default_window_secs() -> u32 {
    60
}
fn default_low_threshold() -> f64 {
    5.0
}
fn default_normal_threshold() -> f64 {
    25.0
}
fn default_high_threshold() -> f64 {
    150.0
}
fn default_inactive_windows() -> u32 {
    3
}
fn default_hysteresis_windows() -> u32 {
    2
}
fn default_true() -> bool {
    true
}
fn default_base_interval_mins() -> u32 {
    45
}
fn default_min_interval_mins() -> u32 {
    5
}
fn default_inactive_factor() -> f64 {
    0.45
}
fn default_low_activity_factor() -> f64 {
    1.2
}
fn default_normal_factor() -> f64 {
    1.0
}
fn default_hyperactive_factor() -> f64 {
    0.6
}
fn default_response_window_secs() -> u32 {
    120
}
fn default_checkpoint_mins() -> u32 {
    5
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use tempfile::tempdir;

    use super::DaemonConfig;

    #[test]
    fn test_missing_file_yields_defaults() -> Result<()> {
        let dir = tempdir()?;
        let config = DaemonConfig::load(dir.path())?;
        assert_eq!(config.scheduler.base_interval_mins, 45);
        assert_eq!(config.classifier.inactive_windows, 3);
        Ok(())
    }

    #[test]
    fn test_partial_file_fills_defaults() -> Result<()> {
        let dir = tempdir()?;
        std::fs::write(
            dir.path().join("config.toml"),
            "[scheduler]\nbase_interval_mins = 30\n",
        )?;
        let config = DaemonConfig::load(dir.path())?;
        assert_eq!(config.scheduler.base_interval_mins, 30);
        assert_eq!(config.scheduler.min_interval_mins, 5);
        assert_eq!(config.classifier.window_secs, 60);
        Ok(())
    }

    #[test]
    fn test_broken_file_falls_back_to_defaults() -> Result<()> {
        let dir = tempdir()?;
        std::fs::write(dir.path().join("config.toml"), "scheduler = fast please")?;
        let config = DaemonConfig::load(dir.path())?;
        assert_eq!(config.scheduler.base_interval_mins, 45);
        Ok(())
    }
}
