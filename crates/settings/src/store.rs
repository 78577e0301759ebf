use std::collections::BTreeMap;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use textpad_core::{atomic_write, RecoveryPaths};

use crate::config::EditorConfig;
use crate::paths::{resolve_config_dir, ConfigPaths};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no configuration directory could be determined; set TEXTPAD_CONFIG_DIR")]
    NoConfigDir,
    #[error("failed to prepare directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to serialize configuration {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write configuration {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// 設定檔的載入與儲存。 / Loads and persists the editor configuration.
///
/// 不持有任何鎖；呼叫端需自行序列化寫入。 / Holds no lock; callers serialise their own writes.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    paths: ConfigPaths,
}

impl ConfigStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            paths: ConfigPaths::new(dir),
        }
    }

    /// 依環境變數與平台慣例決定設定資料夾。 / Uses the environment override or the platform convention.
    pub fn from_env() -> Result<Self, ConfigError> {
        resolve_config_dir()
            .map(Self::new)
            .ok_or(ConfigError::NoConfigDir)
    }

    pub fn dir(&self) -> &Path {
        self.paths.dir()
    }

    pub fn config_path(&self) -> PathBuf {
        self.paths.config_file()
    }

    pub fn recovery_paths(&self) -> RecoveryPaths {
        self.paths.recovery_paths()
    }

    pub fn log_dir(&self) -> PathBuf {
        self.paths.log_dir()
    }

    /// 載入設定；缺檔或損毀時一律回傳預設值，不會失敗。 / Loads the configuration, falling back to defaults on any problem.
    pub fn load(&self) -> EditorConfig {
        let path = self.config_path();
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no configuration file, using defaults");
                return EditorConfig::default();
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "unreadable configuration, using defaults");
                return EditorConfig::default();
            }
        };

        let payload = contents.strip_prefix('\u{feff}').unwrap_or(&contents);
        match serde_json::from_str::<Value>(payload) {
            Ok(value) if value.is_object() => EditorConfig::merged_from(&value),
            Ok(_) => {
                warn!(path = %path.display(), "configuration is not a JSON object, using defaults");
                EditorConfig::default()
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "malformed configuration, using defaults");
                EditorConfig::default()
            }
        }
    }

    /// 以排序後的鍵寫出設定並原子取代舊檔。 / Writes the configuration with sorted keys through an atomic replace.
    pub fn save(&self, config: &EditorConfig) -> Result<(), ConfigError> {
        let dir = self.paths.dir();
        fs::create_dir_all(dir).map_err(|source| ConfigError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;

        let path = self.config_path();
        let mut sanitized = config.clone();
        sanitized.sanitize();

        let value = serde_json::to_value(&sanitized).map_err(|source| ConfigError::Serialize {
            path: path.clone(),
            source,
        })?;
        let sorted: BTreeMap<String, Value> = match value {
            Value::Object(map) => map.into_iter().collect(),
            _ => BTreeMap::new(),
        };
        let payload =
            serde_json::to_string_pretty(&sorted).map_err(|source| ConfigError::Serialize {
                path: path.clone(),
                source,
            })?;

        atomic_write(&path, payload.as_bytes())
            .map_err(|source| ConfigError::Write { path: path.clone(), source })?;
        debug!(path = %path.display(), "configuration saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn saved_keys_are_sorted() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path());
        store.save(&EditorConfig::default()).unwrap();

        let raw = fs::read_to_string(store.config_path()).unwrap();
        let keys: Vec<&str> = raw
            .lines()
            .filter_map(|line| line.trim().strip_prefix('"'))
            .filter_map(|line| line.split_once('"').map(|(key, _)| key))
            .collect();
        assert_eq!(
            keys,
            vec![
                "autosave_enabled",
                "autosave_interval",
                "font_family",
                "font_size",
                "recent_files",
                "theme"
            ]
        );
    }

    #[test]
    fn utf8_bom_in_config_is_tolerated() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path());
        fs::write(store.config_path(), "\u{feff}{\"font_size\": 20}").unwrap();
        assert_eq!(store.load().font_size, 20);
    }
}
