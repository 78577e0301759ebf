use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::recent::RecentFiles;

pub const DEFAULT_FONT_FAMILY: &str = "monospace";
pub const DEFAULT_FONT_SIZE: u32 = 12;
pub const DEFAULT_AUTOSAVE_INTERVAL: u32 = 30;

/// 編輯器配色主題。 / Editor colour theme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

/// 主題對應的顏色。 / Colours used by a theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThemePalette {
    pub background: &'static str,
    pub foreground: &'static str,
    pub status_background: &'static str,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn palette(self) -> ThemePalette {
        match self {
            Theme::Light => ThemePalette {
                background: "#ffffff",
                foreground: "#111111",
                status_background: "#f0f0f0",
            },
            Theme::Dark => ThemePalette {
                background: "#1e1e1e",
                foreground: "#f5f5f5",
                status_background: "#2b2b2b",
            },
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTheme(pub String);

impl fmt::Display for UnknownTheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown theme {:?} (expected \"light\" or \"dark\")", self.0)
    }
}

impl std::error::Error for UnknownTheme {}

impl FromStr for Theme {
    type Err = UnknownTheme;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            _ => Err(UnknownTheme(value.to_string())),
        }
    }
}

/// 編輯器的使用者設定。 / User settings for the editor.
///
/// 不變條件：`font_size > 0`、`autosave_interval > 0`、`recent_files` 不超過上限且無重複。 /
/// Invariants: `font_size > 0`, `autosave_interval > 0`, `recent_files` is
/// bounded and duplicate-free.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditorConfig {
    pub theme: Theme,
    pub font_family: String,
    pub font_size: u32,
    pub autosave_enabled: bool,
    /// 自動儲存間隔（秒）。 / Autosave interval in seconds.
    pub autosave_interval: u32,
    pub recent_files: RecentFiles,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            theme: Theme::Light,
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            font_size: DEFAULT_FONT_SIZE,
            autosave_enabled: true,
            autosave_interval: DEFAULT_AUTOSAVE_INTERVAL,
            recent_files: RecentFiles::new(),
        }
    }
}

impl EditorConfig {
    /// 將解析後的 JSON 與預設值合併；每個欄位獨立判斷。 / Merges parsed JSON over the defaults, field by field.
    ///
    /// Fields that are missing or cannot be coerced keep their default, unknown
    /// keys are ignored, and anything other than an object yields the defaults.
    pub fn merged_from(value: &Value) -> Self {
        let defaults = Self::default();
        let Some(map) = value.as_object() else {
            return defaults;
        };

        let mut config = Self {
            theme: field(map, "theme", coerce_theme).unwrap_or(defaults.theme),
            font_family: field(map, "font_family", coerce_font_family)
                .unwrap_or(defaults.font_family),
            font_size: field(map, "font_size", coerce_positive).unwrap_or(defaults.font_size),
            autosave_enabled: field(map, "autosave_enabled", coerce_bool)
                .unwrap_or(defaults.autosave_enabled),
            autosave_interval: field(map, "autosave_interval", coerce_positive)
                .unwrap_or(defaults.autosave_interval),
            recent_files: field(map, "recent_files", coerce_recent)
                .unwrap_or(defaults.recent_files),
        };
        config.sanitize();
        config
    }

    /// 修正違反不變條件的欄位。 / Restores the invariants after arbitrary mutation.
    pub fn sanitize(&mut self) {
        if self.font_family.trim().is_empty() {
            self.font_family = DEFAULT_FONT_FAMILY.to_string();
        }
        if self.font_size == 0 {
            self.font_size = DEFAULT_FONT_SIZE;
        }
        if self.autosave_interval == 0 {
            self.autosave_interval = DEFAULT_AUTOSAVE_INTERVAL;
        }
        self.recent_files.sanitize();
    }

    pub fn autosave_period(&self) -> Duration {
        Duration::from_secs(u64::from(self.autosave_interval.max(1)))
    }
}

fn field<T>(map: &Map<String, Value>, key: &str, coerce: fn(&Value) -> Option<T>) -> Option<T> {
    map.get(key).and_then(coerce)
}

fn coerce_theme(value: &Value) -> Option<Theme> {
    value.as_str()?.parse().ok()
}

fn coerce_font_family(value: &Value) -> Option<String> {
    let family = value.as_str()?.trim();
    (!family.is_empty()).then(|| family.to_string())
}

fn coerce_positive(value: &Value) -> Option<u32> {
    let number = match value {
        Value::Number(number) => match number.as_u64() {
            Some(int) => int,
            None => {
                let float = number.as_f64()?;
                if !float.is_finite() || float < 1.0 {
                    return None;
                }
                float.trunc() as u64
            }
        },
        Value::String(text) => text.trim().parse::<u64>().ok()?,
        _ => return None,
    };
    u32::try_from(number).ok().filter(|value| *value > 0)
}

fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(number) => number.as_f64().map(|n| n != 0.0),
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn coerce_recent(value: &Value) -> Option<RecentFiles> {
    let items = value.as_array()?;
    Some(RecentFiles::from_entries(
        items.iter().filter_map(Value::as_str),
    ))
}
