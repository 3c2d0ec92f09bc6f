use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Load environment variables from a .env file in the working directory.
/// Handles values with spaces without requiring quotes.
pub fn load_dotenv() {
    load_dotenv_from(Path::new(".env"));
}

fn load_dotenv_from(env_path: &Path) {
    if !env_path.exists() {
        return;
    }

    let content = match fs::read_to_string(env_path) {
        Ok(c) => c,
        Err(_) => return,
    };

    for (key, value) in parse_dotenv(&content) {
        // Only set if not already set (env vars take precedence)
        if std::env::var(key).is_err() {
            // SAFETY: called from main before the runtime spawns any threads
            unsafe { std::env::set_var(key, value) };
        }
    }
}

fn parse_dotenv(content: &str) -> Vec<(&str, &str)> {
    let mut pairs = Vec::new();

    for line in content.lines() {
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(eq_pos) = line.find('=') {
            let key = line[..eq_pos].trim();
            let mut value = line[eq_pos + 1..].trim();

            if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                value = &value[1..value.len() - 1];
            }

            pairs.push((key, value));
        }
    }

    pairs
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub sysfs: SysfsConfig,
    pub poll: PollConfig,
}

/// Location of the ev3dev device classes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SysfsConfig {
    /// Directory holding the device class directories (`/sys/class` on the brick).
    pub root: PathBuf,
    pub sensor_class: String,
    pub motor_class: String,
}

/// Sensor listener timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollConfig {
    /// Interval between two reads of the sensor value.
    pub cadence_ms: u64,
    /// Upper bound on how long one subscriber may hold up a delivery round.
    pub delivery_timeout_ms: u64,
    /// Consecutive failed reads tolerated before the listener gives up.
    /// Zero stops the listener on the first failure.
    pub read_retries: u32,
}

impl PollConfig {
    pub fn cadence(&self) -> Duration {
        Duration::from_millis(self.cadence_ms)
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }
}

impl Default for SysfsConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/sys/class"),
            sensor_class: "lego-sensor".to_string(),
            motor_class: "tacho-motor".to_string(),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            cadence_ms: 50,
            delivery_timeout_ms: 250,
            read_retries: 0,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sysfs: SysfsConfig::default(),
            poll: PollConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(root) = std::env::var("EV3_SYSFS_ROOT") {
            config.sysfs.root = PathBuf::from(root);
        }
        if let Ok(class) = std::env::var("EV3_SENSOR_CLASS") {
            config.sysfs.sensor_class = class;
        }
        if let Ok(class) = std::env::var("EV3_MOTOR_CLASS") {
            config.sysfs.motor_class = class;
        }

        // Poll timing
        if let Ok(cadence) = std::env::var("EV3_POLL_CADENCE_MS")
            && let Ok(c) = cadence.parse()
        {
            config.poll.cadence_ms = c;
        }
        if let Ok(timeout) = std::env::var("EV3_DELIVERY_TIMEOUT_MS")
            && let Ok(t) = timeout.parse()
        {
            config.poll.delivery_timeout_ms = t;
        }
        if let Ok(retries) = std::env::var("EV3_POLL_READ_RETRIES")
            && let Ok(r) = retries.parse()
        {
            config.poll.read_retries = r;
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_point_at_ev3dev_classes() {
        let config = Config::default();
        assert_eq!(config.sysfs.root, PathBuf::from("/sys/class"));
        assert_eq!(config.sysfs.sensor_class, "lego-sensor");
        assert_eq!(config.sysfs.motor_class, "tacho-motor");
        assert_eq!(config.poll.cadence(), Duration::from_millis(50));
        assert_eq!(config.poll.read_retries, 0);
    }

    #[test]
    fn test_parse_dotenv() {
        let content = "# comment\n\nEV3_SYSFS_ROOT = /tmp/fake sys\nEV3_SENSOR_CLASS=\"msensor\"\nbroken line\nEMPTY=\n";
        let pairs = parse_dotenv(content);
        assert_eq!(
            pairs,
            vec![
                ("EV3_SYSFS_ROOT", "/tmp/fake sys"),
                ("EV3_SENSOR_CLASS", "msensor"),
                ("EMPTY", ""),
            ]
        );
    }

    #[test]
    fn test_config_json_roundtrip_keeps_poll_settings() {
        let mut config = Config::default();
        config.poll.cadence_ms = 10;
        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
