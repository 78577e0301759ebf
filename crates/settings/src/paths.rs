//! Per-user configuration directory resolution.
//!
//! The directory is chosen in this order:
//! - `$TEXTPAD_CONFIG_DIR`, with a leading `~` expanded
//! - Windows: `%APPDATA%`, then `%LOCALAPPDATA%`, then `~\AppData\Roaming`, joined with `Textpad`
//! - macOS: `~/Library/Application Support/Textpad`
//! - elsewhere: `$XDG_CONFIG_HOME`, then `~/.config`, joined with `textpad`

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use textpad_core::RecoveryPaths;

pub const CONFIG_DIR_ENV: &str = "TEXTPAD_CONFIG_DIR";
pub const CONFIG_FILE: &str = "config.json";
pub const RECOVERY_TEXT_FILE: &str = "recovery.txt";
pub const RECOVERY_META_FILE: &str = "recovery.json";
pub const LOG_DIR: &str = "logs";

const APP_DIR: &str = "Textpad";
const XDG_APP_DIR: &str = "textpad";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    MacOs,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Other
        }
    }
}

/// 依目前環境解析設定資料夾。 / Resolves the configuration directory from the live environment.
pub fn resolve_config_dir() -> Option<PathBuf> {
    resolve_config_dir_with(|key| env::var_os(key), dirs::home_dir(), Platform::current())
}

/// 以注入的環境查詢、家目錄與平台解析設定資料夾，不做任何 I/O。 /
/// Resolves the configuration directory from an injected environment, home
/// directory and platform, without touching the filesystem.
///
/// Empty variables count as unset. Returns `None` only when a home directory
/// is needed and unknown.
pub fn resolve_config_dir_with<F>(
    lookup: F,
    home: Option<PathBuf>,
    platform: Platform,
) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<OsString>,
{
    let var = |key: &str| lookup(key).filter(|value| !value.is_empty());

    if let Some(dir) = var(CONFIG_DIR_ENV) {
        return Some(expand_tilde(PathBuf::from(dir), home.as_deref()));
    }

    match platform {
        Platform::Windows => {
            let base = var("APPDATA")
                .or_else(|| var("LOCALAPPDATA"))
                .map(PathBuf::from)
                .or_else(|| home.map(|h| h.join("AppData").join("Roaming")))?;
            Some(base.join(APP_DIR))
        }
        Platform::MacOs => Some(
            home?
                .join("Library")
                .join("Application Support")
                .join(APP_DIR),
        ),
        Platform::Other => {
            let base = var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .or_else(|| home.map(|h| h.join(".config")))?;
            Some(base.join(XDG_APP_DIR))
        }
    }
}

/// 展開開頭的 `~`（不支援 `~user`）。 / Expands a leading `~`; `~user` forms are left alone.
fn expand_tilde(path: PathBuf, home: Option<&Path>) -> PathBuf {
    let Some(home) = home else {
        return path;
    };
    match path.strip_prefix("~") {
        Ok(rest) => home.join(rest),
        Err(_) => path,
    }
}

/// 設定資料夾內各檔案的位置。 / File locations inside the configuration directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    dir: PathBuf,
}

impl ConfigPaths {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE)
    }

    /// 恢復快照兩個檔案，皆與設定檔同層。 / The recovery pair, both siblings of the config file.
    pub fn recovery_paths(&self) -> RecoveryPaths {
        RecoveryPaths {
            text: self.dir.join(RECOVERY_TEXT_FILE),
            meta: self.dir.join(RECOVERY_META_FILE),
        }
    }

    pub fn log_dir(&self) -> PathBuf {
        self.dir.join(LOG_DIR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<OsString> {
        let map: HashMap<String, OsString> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), OsString::from(v)))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn home() -> Option<PathBuf> {
        Some(PathBuf::from("/home/ada"))
    }

    #[test]
    fn override_wins_on_every_platform() {
        for platform in [Platform::Windows, Platform::MacOs, Platform::Other] {
            let dir = resolve_config_dir_with(
                env_of(&[(CONFIG_DIR_ENV, "/srv/textpad"), ("APPDATA", "C:/x")]),
                home(),
                platform,
            );
            assert_eq!(dir, Some(PathBuf::from("/srv/textpad")));
        }
    }

    #[test]
    fn override_expands_tilde() {
        let dir = resolve_config_dir_with(
            env_of(&[(CONFIG_DIR_ENV, "~/settings/textpad")]),
            home(),
            Platform::Other,
        );
        assert_eq!(dir, Some(PathBuf::from("/home/ada/settings/textpad")));

        let dir = resolve_config_dir_with(env_of(&[(CONFIG_DIR_ENV, "~")]), home(), Platform::Other);
        assert_eq!(dir, Some(PathBuf::from("/home/ada")));
    }

    #[test]
    fn empty_override_is_ignored() {
        let dir = resolve_config_dir_with(env_of(&[(CONFIG_DIR_ENV, "")]), home(), Platform::Other);
        assert_eq!(dir, Some(PathBuf::from("/home/ada/.config/textpad")));
    }

    #[test]
    fn xdg_config_home_is_respected() {
        let dir = resolve_config_dir_with(
            env_of(&[("XDG_CONFIG_HOME", "/cfg")]),
            home(),
            Platform::Other,
        );
        assert_eq!(dir, Some(PathBuf::from("/cfg/textpad")));
    }

    #[test]
    fn windows_prefers_roaming_then_local_then_home() {
        let dir = resolve_config_dir_with(
            env_of(&[("APPDATA", "/roaming"), ("LOCALAPPDATA", "/local")]),
            home(),
            Platform::Windows,
        );
        assert_eq!(dir, Some(PathBuf::from("/roaming/Textpad")));

        let dir = resolve_config_dir_with(
            env_of(&[("LOCALAPPDATA", "/local")]),
            home(),
            Platform::Windows,
        );
        assert_eq!(dir, Some(PathBuf::from("/local/Textpad")));

        let dir = resolve_config_dir_with(env_of(&[]), home(), Platform::Windows);
        assert_eq!(
            dir,
            Some(PathBuf::from("/home/ada/AppData/Roaming/Textpad"))
        );
    }

    #[test]
    fn macos_uses_application_support() {
        let dir = resolve_config_dir_with(
            env_of(&[("XDG_CONFIG_HOME", "/ignored")]),
            home(),
            Platform::MacOs,
        );
        assert_eq!(
            dir,
            Some(PathBuf::from(
                "/home/ada/Library/Application Support/Textpad"
            ))
        );
    }

    #[test]
    fn missing_home_without_variables_is_unresolvable() {
        assert_eq!(resolve_config_dir_with(env_of(&[]), None, Platform::Other), None);
        assert_eq!(resolve_config_dir_with(env_of(&[]), None, Platform::MacOs), None);
    }

    #[test]
    fn recovery_paths_are_distinct_siblings() {
        let paths = ConfigPaths::new("/cfg/textpad");
        let recovery = paths.recovery_paths();
        assert_ne!(recovery.text, recovery.meta);
        assert_eq!(recovery.text.parent(), Some(paths.dir()));
        assert_eq!(recovery.meta.parent(), Some(paths.dir()));
        assert_eq!(paths.config_file().parent(), Some(paths.dir()));
    }
}
