use std::path::PathBuf;

use textpad_core::{Encoding, TextIoError};

/// 已套用到工作階段的背景結果。 / A background result after it has been applied to the session.
#[derive(Debug)]
pub enum SessionEvent {
    Opened { path: PathBuf, encoding: Encoding },
    OpenFailed { path: PathBuf, error: TextIoError },
    Saved { path: PathBuf, encoding: Encoding },
    SaveFailed { path: PathBuf, error: TextIoError },
    Autosaved,
}

impl SessionEvent {
    /// 失敗事件對應的錯誤。 / The error carried by a failure event.
    pub fn error(&self) -> Option<&TextIoError> {
        match self {
            SessionEvent::OpenFailed { error, .. } | SessionEvent::SaveFailed { error, .. } => {
                Some(error)
            }
            _ => None,
        }
    }
}
