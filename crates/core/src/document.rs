use std::path::{Path, PathBuf};

use crate::encoding::Encoding;

/// 代表目前開啟的文件：文字、編碼與來源路徑。 / In-memory document: text, encoding tag and optional source path.
///
/// `revision` 每次修改內容時遞增，讓背景儲存完成時能判斷期間是否又有編輯。 /
/// `revision` increases on every edit so a background save can tell whether
/// the text changed while it was in flight.
#[derive(Debug, Clone, Default)]
pub struct Document {
    path: Option<PathBuf>,
    contents: String,
    encoding: Encoding,
    is_dirty: bool,
    revision: u64,
}

impl Document {
    /// 建立一個空內容且尚未儲存的文件。 / Creates an unsaved document with empty contents.
    pub fn new() -> Self {
        Self::default()
    }

    /// 由已讀取的內容建立文件（例如背景執行緒載入的結果）。 / Builds a clean document from already-loaded text.
    pub fn from_loaded(path: impl Into<PathBuf>, contents: String, encoding: Encoding) -> Self {
        Self {
            path: Some(path.into()),
            contents,
            encoding,
            is_dirty: false,
            revision: 0,
        }
    }

    /// 記錄一次已完成的儲存；若期間內容又被修改則維持 dirty。 / Records a completed save; stays dirty if edited since `revision`.
    pub fn mark_saved(&mut self, path: impl Into<PathBuf>, encoding: Encoding, revision: u64) {
        self.path = Some(path.into());
        self.encoding = encoding;
        if self.revision == revision {
            self.is_dirty = false;
        }
    }

    pub fn contents(&self) -> &str {
        &self.contents
    }

    /// 以新文字取代內容並標記為已修改。 / Replaces the contents and marks the document dirty.
    pub fn set_contents(&mut self, text: impl Into<String>) {
        self.contents = text.into();
        self.touch();
    }

    /// 取代指定位元組範圍。 / Replaces a byte range of the contents.
    pub fn replace_range(&mut self, range: std::ops::Range<usize>, replacement: &str) {
        self.contents.replace_range(range, replacement);
        self.touch();
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn set_encoding(&mut self, encoding: Encoding) {
        if self.encoding != encoding {
            self.encoding = encoding;
            self.touch();
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// 更新路徑而不影響 dirty 狀態。 / Updates the associated path without touching the dirty flag.
    pub fn set_path(&mut self, path: Option<PathBuf>) {
        self.path = path;
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    pub fn mark_dirty(&mut self) {
        self.is_dirty = true;
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// 顯示於標題列的名稱。 / Name shown in a window title.
    pub fn display_name(&self) -> String {
        self.path
            .as_deref()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Untitled".to_string())
    }

    fn touch(&mut self) {
        self.revision += 1;
        self.is_dirty = true;
    }
}
