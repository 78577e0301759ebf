use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::encoding::Encoding;
use crate::io::{read_text_file, write_text_file, TextIoError};
use crate::Document;

/// 自動儲存與還原流程的錯誤型別。 / Error type for autosave and recovery routines.
#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("failed to access recovery snapshot: {0}")]
    Io(#[from] TextIoError),
    #[error("invalid recovery metadata {path}: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl From<io::Error> for RecoveryError {
    fn from(err: io::Error) -> Self {
        RecoveryError::Io(TextIoError::Io(err))
    }
}

/// 恢復快照的一對檔案位置。 / Locations of the recovery snapshot pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryPaths {
    /// 原始文字快照。 / Raw text snapshot.
    pub text: PathBuf,
    /// 中繼資料（來源路徑與編碼）。 / Metadata document (source path and encoding).
    pub meta: PathBuf,
}

/// 尚未儲存內容的快照。 / Snapshot of unsaved content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoverySnapshot {
    pub text: String,
    pub source: Option<PathBuf>,
    pub encoding: Encoding,
}

impl RecoverySnapshot {
    pub fn from_document(doc: &Document) -> Self {
        Self {
            text: doc.contents().to_string(),
            source: doc.path().map(Path::to_path_buf),
            encoding: doc.encoding(),
        }
    }

    /// 還原為 dirty 的文件，保留原本的目的地與編碼。 / Turns the snapshot back into a dirty document.
    pub fn into_document(self) -> Document {
        let mut doc = Document::new();
        doc.set_contents(self.text);
        doc.set_encoding(self.encoding);
        doc.set_path(self.source);
        doc.mark_dirty();
        doc
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SnapshotMetadata {
    #[serde(default)]
    path: String,
    #[serde(default)]
    encoding: String,
}

/// 管理設定資料夾中的單一恢復快照。 / Manages the single recovery snapshot stored next to the configuration.
#[derive(Debug, Clone)]
pub struct RecoveryManager {
    paths: RecoveryPaths,
}

impl RecoveryManager {
    pub fn new(paths: RecoveryPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &RecoveryPaths {
        &self.paths
    }

    /// 寫入快照：文字以 UTF-8 儲存，中繼資料為 JSON。 / Persists the snapshot; text as UTF-8, metadata as JSON.
    pub fn write(&self, snapshot: &RecoverySnapshot) -> Result<(), RecoveryError> {
        write_text_file(&self.paths.text, &snapshot.text, Encoding::Utf8)?;

        let metadata = SnapshotMetadata {
            path: snapshot
                .source
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default(),
            encoding: snapshot.encoding.name().to_string(),
        };
        let payload = serde_json::to_string_pretty(&metadata).map_err(|source| {
            RecoveryError::Metadata {
                path: self.paths.meta.clone(),
                source,
            }
        })?;
        write_text_file(&self.paths.meta, &payload, Encoding::Utf8)?;
        debug!(path = %self.paths.text.display(), "recovery snapshot written");
        Ok(())
    }

    /// 是否存在非空的快照；空白快照會直接清除。 / Whether a non-empty snapshot exists; empty leftovers are cleared.
    pub fn has_snapshot(&self) -> bool {
        match fs::metadata(&self.paths.text) {
            Ok(metadata) if metadata.len() > 0 => true,
            Ok(_) => {
                self.clear();
                false
            }
            Err(_) => false,
        }
    }

    /// 載入快照；若不存在則回傳 `None`。 / Loads the snapshot, `None` when there is nothing to recover.
    ///
    /// 快照文字與一般檔案一樣經過 NUL 位元組檢查，含 U+0000 的快照會以
    /// `TextIoError::NotText` 失敗。 / The snapshot text goes through the same
    /// NUL-byte check as any opened file, so a snapshot of text containing
    /// U+0000 fails with `TextIoError::NotText` and stays on disk.
    pub fn load(&self) -> Result<Option<RecoverySnapshot>, RecoveryError> {
        if !self.has_snapshot() {
            return Ok(None);
        }

        let (text, _) = read_text_file(&self.paths.text)?;
        let metadata = match fs::read_to_string(&self.paths.meta) {
            Ok(contents) => serde_json::from_str::<SnapshotMetadata>(&contents).map_err(
                |source| RecoveryError::Metadata {
                    path: self.paths.meta.clone(),
                    source,
                },
            )?,
            Err(err) if err.kind() == ErrorKind::NotFound => SnapshotMetadata::default(),
            Err(err) => return Err(err.into()),
        };

        let encoding = if metadata.encoding.is_empty() {
            Encoding::Utf8
        } else {
            Encoding::from_label(&metadata.encoding).unwrap_or_else(|| {
                warn!(encoding = %metadata.encoding, "unknown encoding in recovery metadata, using utf-8");
                Encoding::Utf8
            })
        };
        let source = (!metadata.path.is_empty()).then(|| PathBuf::from(metadata.path));

        Ok(Some(RecoverySnapshot {
            text,
            source,
            encoding,
        }))
    }

    /// 盡力移除兩個快照檔案。 / Removes both snapshot files, best effort.
    pub fn clear(&self) {
        for path in [&self.paths.text, &self.paths.meta] {
            match fs::remove_file(path) {
                Ok(()) => debug!(path = %path.display(), "removed recovery file"),
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => warn!(path = %path.display(), error = %err, "failed to remove recovery file"),
            }
        }
    }
}
