use std::path::PathBuf;

use thiserror::Error;

use textpad_core::RecoveryError;
use textpad_search::SearchError;
use textpad_settings::ConfigError;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("document has no file path; save it under a name first")]
    NoPath,
    #[error("a file is still being opened")]
    OpenInProgress,
    #[error("a save is still being written")]
    SaveInProgress,
    #[error("recent file {} no longer exists", .0.display())]
    RecentMissing(PathBuf),
    #[error("invalid value for {key}: {reason}")]
    InvalidSetting { key: &'static str, reason: String },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Recovery(#[from] RecoveryError),
    #[error(transparent)]
    Search(#[from] SearchError),
}

impl SessionError {
    pub(crate) fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        SessionError::InvalidSetting {
            key,
            reason: reason.into(),
        }
    }
}
