//! Configuration: tunables from `~/.config/vpsctl/config.toml`, credentials
//! from the environment (usually via `~/.config/vpsctl/.env`).
//!
//! Credentials are ONLY read from the environment and never from the config
//! file, so the file can be committed or shared without leaking secrets.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::constants::*;
use crate::models::ActionKind;

/// ConoHa API identity plus the one managed server. Immutable for the
/// process lifetime.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub tenant_id: String,
    pub server_id: String,
}

impl Credentials {
    /// Load credentials from environment variables.
    /// Returns None if any required variable is missing or empty.
    pub fn from_env() -> Option<Self> {
        let username = std::env::var("CONOHA_USERNAME").ok()?;
        let password = std::env::var("CONOHA_PASSWORD").ok()?;
        let tenant_id = std::env::var("CONOHA_TENANT_ID").ok()?;
        let server_id = std::env::var("VPS_SERVER_ID").ok()?;

        if username.is_empty() || password.is_empty() || tenant_id.is_empty() || server_id.is_empty()
        {
            return None;
        }

        Some(Self {
            username,
            password,
            tenant_id,
            server_id,
        })
    }
}

/// Controller tunables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// ConoHa region (determines identity and compute endpoints).
    pub region: String,
    /// Cooldown between start attempts (seconds).
    pub cooldown_start_secs: u64,
    /// Cooldown between stop attempts (seconds).
    pub cooldown_stop_secs: u64,
    /// Cooldown between reboot attempts (seconds).
    pub cooldown_reboot_secs: u64,
    /// Pause between status polls while reconciling (seconds).
    pub poll_interval_secs: u64,
    /// Deadline for watching a transition settle (seconds).
    pub reconcile_timeout_secs: u64,
    /// HTTP request timeout for auth and reads (seconds).
    pub http_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            cooldown_start_secs: DEFAULT_COOLDOWN_SECS,
            cooldown_stop_secs: DEFAULT_COOLDOWN_SECS,
            cooldown_reboot_secs: DEFAULT_COOLDOWN_SECS,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            reconcile_timeout_secs: DEFAULT_RECONCILE_TIMEOUT_SECS,
            http_timeout_secs: HTTP_TIMEOUT_SECS,
        }
    }
}

/// TOML-deserializable config file format.
/// All fields are optional — missing fields use defaults.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct FileConfig {
    region: Option<String>,
    poll_interval_secs: Option<u64>,
    reconcile_timeout_secs: Option<u64>,
    http_timeout_secs: Option<u64>,
    cooldowns: Option<FileCooldowns>,
}

/// TOML-deserializable `[cooldowns]` section.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct FileCooldowns {
    start_secs: Option<u64>,
    stop_secs: Option<u64>,
    reboot_secs: Option<u64>,
}

impl Config {
    /// Load config from `~/.config/vpsctl/config.toml`, falling back to
    /// defaults for any missing fields. If the file doesn't exist, returns
    /// pure defaults.
    pub fn load() -> Self {
        Self::load_from(&config_file_path())
    }

    /// Load from an explicit path (same fallback behavior as `load`).
    pub fn load_from(path: &Path) -> Self {
        let config = Config::default();

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return config, // No config file — use defaults
        };

        let file_config: FileConfig = match toml::from_str(&content) {
            Ok(fc) => fc,
            Err(e) => {
                eprintln!(
                    "Warning: Failed to parse {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                return config;
            }
        };

        Self::merge(config, file_config)
    }

    /// Merge file values over defaults, clamping where a bad value could
    /// hammer the provider.
    fn merge(mut config: Config, file: FileConfig) -> Config {
        if let Some(v) = file.region {
            if !v.is_empty() {
                config.region = v;
            }
        }
        if let Some(v) = file.poll_interval_secs {
            config.poll_interval_secs = v.max(MIN_POLL_INTERVAL_SECS);
        }
        if let Some(v) = file.reconcile_timeout_secs {
            config.reconcile_timeout_secs = v;
        }
        if let Some(v) = file.http_timeout_secs {
            config.http_timeout_secs = v.max(1);
        }
        if let Some(c) = file.cooldowns {
            if let Some(v) = c.start_secs {
                config.cooldown_start_secs = v;
            }
            if let Some(v) = c.stop_secs {
                config.cooldown_stop_secs = v;
            }
            if let Some(v) = c.reboot_secs {
                config.cooldown_reboot_secs = v;
            }
        }
        config
    }

    /// Per-kind cooldown windows for the guard.
    pub fn cooldowns(&self) -> HashMap<ActionKind, Duration> {
        let mut map = HashMap::new();
        map.insert(ActionKind::Start, Duration::from_secs(self.cooldown_start_secs));
        map.insert(ActionKind::Stop, Duration::from_secs(self.cooldown_stop_secs));
        map.insert(
            ActionKind::Reboot,
            Duration::from_secs(self.cooldown_reboot_secs),
        );
        map
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn reconcile_timeout(&self) -> Duration {
        Duration::from_secs(self.reconcile_timeout_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_constants() {
        let config = Config::default();
        assert_eq!(config.region, DEFAULT_REGION);
        assert_eq!(config.cooldown_start_secs, DEFAULT_COOLDOWN_SECS);
        assert_eq!(config.poll_interval_secs, DEFAULT_POLL_INTERVAL_SECS);
        assert_eq!(config.reconcile_timeout_secs, DEFAULT_RECONCILE_TIMEOUT_SECS);
    }

    #[test]
    fn missing_file_returns_defaults() {
        let config = Config::load_from(Path::new("/nonexistent/vpsctl/config.toml"));
        assert_eq!(config.region, DEFAULT_REGION);
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        let mut f = std::fs::File::create(&path).expect("create");
        writeln!(
            f,
            "region = \"tyo2\"\npoll_interval_secs = 3\n\n[cooldowns]\nstop_secs = 30\n"
        )
        .expect("write");

        let config = Config::load_from(&path);
        assert_eq!(config.region, "tyo2");
        assert_eq!(config.poll_interval_secs, 3);
        assert_eq!(config.cooldown_stop_secs, 30);
        // Untouched fields keep defaults
        assert_eq!(config.cooldown_start_secs, DEFAULT_COOLDOWN_SECS);
        assert_eq!(config.http_timeout_secs, HTTP_TIMEOUT_SECS);
    }

    #[test]
    fn poll_interval_is_clamped() {
        let config = Config::merge(
            Config::default(),
            FileConfig {
                poll_interval_secs: Some(0),
                ..Default::default()
            },
        );
        assert_eq!(config.poll_interval_secs, MIN_POLL_INTERVAL_SECS);
    }

    #[test]
    fn invalid_toml_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "region = [not toml").expect("write");
        let config = Config::load_from(&path);
        assert_eq!(config.region, DEFAULT_REGION);
    }

    #[test]
    fn cooldown_map_covers_every_kind() {
        let config = Config::default();
        let map = config.cooldowns();
        for kind in ActionKind::ALL {
            assert!(map.contains_key(&kind));
        }
    }
}
