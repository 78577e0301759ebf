pub mod config;
pub mod paths;
pub mod recent;
pub mod store;

pub use config::{
    EditorConfig, Theme, ThemePalette, UnknownTheme, DEFAULT_AUTOSAVE_INTERVAL,
    DEFAULT_FONT_FAMILY, DEFAULT_FONT_SIZE,
};
pub use paths::{
    resolve_config_dir, resolve_config_dir_with, ConfigPaths, Platform, CONFIG_DIR_ENV,
};
pub use recent::{RecentFiles, RECENT_LIMIT};
pub use store::{ConfigError, ConfigStore};
