use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::app_dirs::AppDirs;
use crate::bot::{BOT_TICK_MS, DEFAULT_FINISH_FLOOR_SECS};
use crate::error::{QkResult, QuickKeysError};
use crate::race::DEFAULT_COUNTDOWN_SECS;
use crate::recorder::DEFAULT_HISTORY_LIMIT;
use crate::timer_policy::{validate_custom_seconds, Difficulty};

const MAX_COUNTDOWN_SECS: u32 = 10;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub difficulty: Difficulty,
    /// Fixed duration for custom-text sessions; falls back to the difficulty policy
    pub custom_seconds: Option<u32>,
    pub race_seconds: u32,
    /// "3, 2, 1" before a race; 0 skips it
    pub race_countdown_secs: u32,
    pub bot_finish_floor_secs: f64,
    pub bot_tick_ms: u64,
    pub history_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            difficulty: Difficulty::Medium,
            custom_seconds: None,
            race_seconds: 180,
            race_countdown_secs: DEFAULT_COUNTDOWN_SECS,
            bot_finish_floor_secs: DEFAULT_FINISH_FLOOR_SECS,
            bot_tick_ms: BOT_TICK_MS,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl Config {
    /// Rejects values that would start an invalid session
    pub fn validate(&self) -> QkResult<()> {
        if let Some(secs) = self.custom_seconds {
            validate_custom_seconds(secs)?;
        }
        validate_custom_seconds(self.race_seconds)?;
        if self.race_countdown_secs > MAX_COUNTDOWN_SECS {
            return Err(QuickKeysError::InvalidConfig {
                field: "race_countdown_secs",
                reason: format!("must be at most {MAX_COUNTDOWN_SECS}"),
            });
        }
        if self.bot_tick_ms == 0 {
            return Err(QuickKeysError::InvalidConfig {
                field: "bot_tick_ms",
                reason: "must be positive".to_string(),
            });
        }
        if !self.bot_finish_floor_secs.is_finite() || self.bot_finish_floor_secs < 0.0 {
            return Err(QuickKeysError::InvalidConfig {
                field: "bot_finish_floor_secs",
                reason: "must be a non-negative number of seconds".to_string(),
            });
        }
        Ok(())
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> QkResult<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new() -> Self {
        let path = AppDirs::config_path().unwrap_or_else(|| PathBuf::from("quickkeys_config.json"));
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        let Ok(bytes) = fs::read(&self.path) else {
            return Config::default();
        };
        match serde_json::from_slice::<Config>(&bytes) {
            Ok(cfg) if cfg.validate().is_ok() => cfg,
            Ok(_) => {
                warn!(path = %self.path.display(), "config has out-of-range values, using defaults");
                Config::default()
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "unreadable config, using defaults");
                Config::default()
            }
        }
    }

    fn save(&self, cfg: &Config) -> QkResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::tempdir;

    #[test]
    fn roundtrip_default_config() {
        let dir = tempdir().unwrap();
        let store = FileConfigStore::with_path(dir.path().join("config.json"));
        let cfg = Config::default();
        store.save(&cfg).unwrap();
        assert_eq!(cfg, store.load());
    }

    #[test]
    fn save_and_load_custom_config() {
        let dir = tempdir().unwrap();
        let store = FileConfigStore::with_path(dir.path().join("nested").join("config.json"));
        let cfg = Config {
            difficulty: Difficulty::Hard,
            custom_seconds: Some(90),
            race_seconds: 240,
            race_countdown_secs: 0,
            bot_finish_floor_secs: 15.0,
            bot_tick_ms: 100,
            history_limit: 20,
        };
        store.save(&cfg).unwrap();
        assert_eq!(cfg, store.load());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let store = FileConfigStore::with_path(dir.path().join("absent.json"));
        assert_eq!(store.load(), Config::default());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "difficulty": "easy" }"#).unwrap();
        let cfg = FileConfigStore::with_path(&path).load();
        assert_eq!(cfg.difficulty, Difficulty::Easy);
        assert_eq!(cfg.history_limit, DEFAULT_HISTORY_LIMIT);
    }

    #[test]
    fn out_of_range_timer_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "custom_seconds": 5 }"#).unwrap();
        assert_eq!(FileConfigStore::with_path(&path).load(), Config::default());
        assert!(Config {
            custom_seconds: Some(5),
            ..Config::default()
        }
        .validate()
        .is_err());
    }

    #[test]
    fn bot_settings_are_checked() {
        assert_matches!(
            Config {
                bot_tick_ms: 0,
                ..Config::default()
            }
            .validate(),
            Err(QuickKeysError::InvalidConfig { field: "bot_tick_ms", .. })
        );
        for floor in [-5.0, f64::NAN, f64::INFINITY] {
            assert_matches!(
                Config {
                    bot_finish_floor_secs: floor,
                    ..Config::default()
                }
                .validate(),
                Err(QuickKeysError::InvalidConfig {
                    field: "bot_finish_floor_secs",
                    ..
                })
            );
        }
        assert_matches!(
            Config {
                race_countdown_secs: 11,
                ..Config::default()
            }
            .validate(),
            Err(QuickKeysError::InvalidConfig { .. })
        );
        assert!(Config {
            bot_finish_floor_secs: 0.0,
            race_countdown_secs: 0,
            ..Config::default()
        }
        .validate()
        .is_ok());
    }

    #[test]
    fn zero_bot_interval_file_falls_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "bot_tick_ms": 0, "bot_finish_floor_secs": -5.0 }"#).unwrap();
        let cfg = FileConfigStore::with_path(&path).load();
        assert_eq!(cfg, Config::default());
        assert!(cfg.bot_tick_ms > 0);
    }

    #[test]
    fn corrupt_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, b"{not json").unwrap();
        assert_eq!(FileConfigStore::with_path(&path).load(), Config::default());
    }
}
