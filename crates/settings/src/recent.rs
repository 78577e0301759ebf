use std::path::Path;

use serde::Serialize;

/// 最近檔案清單的固定上限。 / Fixed upper bound on remembered files.
pub const RECENT_LIMIT: usize = 10;

/// 管理最近開啟檔案的清單（最新者在前、無重複）。 / Most-recent-first list of opened files, without duplicates.
///
/// 序列化為單純的 JSON 字串陣列。 / Serialises as a plain JSON array of strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RecentFiles {
    entries: Vec<String>,
}

impl RecentFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// 依序列化資料還原清單，移除重複並截斷至上限。 / Rebuilds the list from persisted entries, deduplicating and truncating.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut recent = Self::new();
        for entry in entries {
            let entry = entry.into();
            if entry.is_empty() || recent.contains(&entry) {
                continue;
            }
            recent.entries.push(entry);
            if recent.entries.len() == RECENT_LIMIT {
                break;
            }
        }
        recent
    }

    /// 加入或提升某個檔案路徑至清單頂端。 / Inserts or promotes a path to the front of the list.
    pub fn add(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_string_lossy().into_owned();
        self.entries.retain(|existing| existing != &path);
        self.entries.insert(0, path);
        self.entries.truncate(RECENT_LIMIT);
    }

    /// 移除指定路徑；若存在則回傳 `true`。 / Removes the given path and returns `true` if it existed.
    pub fn remove(&mut self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref().to_string_lossy();
        let initial_len = self.entries.len();
        self.entries.retain(|existing| existing.as_str() != path);
        initial_len != self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.iter().any(|existing| existing == path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn sanitize(&mut self) {
        *self = Self::from_entries(std::mem::take(&mut self.entries));
    }
}
