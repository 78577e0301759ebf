//! Controlling-thread editor session.
//!
//! A [`Session`] owns the document, the configuration and the background
//! worker. File operations are issued as tickets; their results only take
//! effect when the owner calls [`Session::poll`] or [`Session::wait`], so the
//! document and configuration are never touched from another thread.

mod error;
mod event;

use std::collections::HashMap;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use textpad_core::{
    Document, Encoding, IoEvent, IoOutcome, IoRequest, IoWorker, RecoveryManager,
    RecoverySnapshot, Ticket,
};
use textpad_search::{SearchEngine, SearchMatch, SearchOptions};
use textpad_settings::{ConfigStore, EditorConfig, Theme};

pub use error::SessionError;
pub use event::SessionEvent;

const WAIT_SLICE: Duration = Duration::from_millis(50);

/// 尚未完成的背景請求。 / A background request still in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    Open,
    /// 送出時的文件版本。 / Document revision captured when the save was issued.
    Save { revision: u64 },
    Autosave,
}

/// 編輯器工作階段。 / An editor session bound to one configuration directory.
pub struct Session {
    store: ConfigStore,
    config: EditorConfig,
    document: Document,
    recovery: RecoveryManager,
    worker: IoWorker,
    /// 結果仍需套用的請求。 / Requests whose results are still wanted.
    pending: HashMap<Ticket, Pending>,
    /// 背景執行緒尚未回報的請求，包含已被放棄者。 / Requests whose worker has not reported yet, abandoned ones included.
    running: HashMap<Ticket, Pending>,
    cursor: usize,
    selection: Option<(Range<usize>, u64)>,
    last_autosave: Instant,
}

impl Session {
    /// 載入設定並建立空白文件。 / Loads the configuration and starts with an empty document.
    pub fn new(store: ConfigStore) -> Self {
        let config = store.load();
        let recovery = RecoveryManager::new(store.recovery_paths());
        debug!(dir = %store.dir().display(), "session started");
        Self {
            store,
            config,
            document: Document::new(),
            recovery,
            worker: IoWorker::new(),
            pending: HashMap::new(),
            running: HashMap::new(),
            cursor: 0,
            selection: None,
            last_autosave: Instant::now(),
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn set_cursor(&mut self, cursor: usize) {
        self.cursor = cursor.min(self.document.contents().len());
        self.selection = None;
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// 丟棄目前文件，改為空白的未命名文件。 / Replaces the document with an empty, untitled one.
    pub fn new_document(&mut self) {
        self.forget_document_requests();
        self.replace_document(Document::new());
    }

    /// 在背景開啟檔案；較早的開啟請求會被取代。 / Opens a file in the background, superseding earlier opens.
    pub fn open(&mut self, path: impl Into<PathBuf>) -> Ticket {
        let path = path.into();
        self.pending.retain(|_, pending| *pending != Pending::Open);
        info!(path = %path.display(), "opening file");
        let ticket = self.worker.submit(IoRequest::Open { path });
        self.track(ticket, Pending::Open);
        ticket
    }

    /// 從最近檔案開啟；檔案已不存在時會從清單移除。 / Opens a recent entry, dropping it from the list when the file is gone.
    pub fn open_recent(&mut self, path: &str) -> Result<Ticket, SessionError> {
        if !Path::new(path).exists() {
            warn!(path, "recent file no longer exists");
            self.config.recent_files.remove(path);
            self.persist()?;
            return Err(SessionError::RecentMissing(PathBuf::from(path)));
        }
        Ok(self.open(path))
    }

    /// 以目前的路徑與編碼儲存。 / Saves to the current path with the current encoding.
    pub fn save(&mut self) -> Result<Ticket, SessionError> {
        let path = self
            .document
            .path()
            .map(Path::to_path_buf)
            .ok_or(SessionError::NoPath)?;
        let encoding = self.document.encoding();
        self.save_as(path, encoding)
    }

    pub fn save_as(
        &mut self,
        path: impl Into<PathBuf>,
        encoding: Encoding,
    ) -> Result<Ticket, SessionError> {
        if self.open_in_flight() {
            return Err(SessionError::OpenInProgress);
        }
        // Only one writer may touch the destination at a time.
        if self.running_any(|pending| matches!(pending, Pending::Save { .. })) {
            return Err(SessionError::SaveInProgress);
        }
        let path = path.into();
        let revision = self.document.revision();
        info!(path = %path.display(), %encoding, "saving file");
        let ticket = self.worker.submit(IoRequest::Save {
            path,
            text: self.document.contents().to_string(),
            encoding,
        });
        self.track(ticket, Pending::Save { revision });
        Ok(ticket)
    }

    /// 套用所有已完成的背景結果，不會阻塞。 / Applies every finished background result without blocking.
    pub fn poll(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.worker.try_next() {
            events.extend(self.apply(event));
        }
        events
    }

    /// 等到所有背景請求都回報為止，包含已被放棄者。 / Blocks until every background request has reported, abandoned ones included.
    pub fn wait(&mut self) -> Vec<SessionEvent> {
        let mut events = self.poll();
        while !self.running.is_empty() {
            if let Some(event) = self.worker.next_timeout(WAIT_SLICE) {
                events.extend(self.apply(event));
            }
        }
        events
    }

    /// 忽略所有尚未回報的結果。 / Forgets every in-flight result.
    pub fn abandon(&mut self) {
        if !self.pending.is_empty() {
            debug!(count = self.pending.len(), "abandoning pending requests");
        }
        self.pending.clear();
    }

    /// 計時器觸發點：間隔已到且文件有變更時寫入恢復快照。 /
    /// Timer hook: writes a recovery snapshot once the interval has elapsed
    /// and the document has unsaved changes.
    pub fn tick(&mut self, now: Instant) -> Option<Ticket> {
        if now.saturating_duration_since(self.last_autosave) < self.config.autosave_period() {
            return None;
        }
        self.last_autosave = now;
        if !self.config.autosave_enabled {
            return None;
        }
        self.autosave_now()
    }

    /// 立即寫入恢復快照；文件未變更或前一次快照仍在寫入時不做事。 /
    /// Writes a recovery snapshot right away if the document is dirty and no
    /// earlier snapshot is still being written.
    pub fn autosave_now(&mut self) -> Option<Ticket> {
        if !self.document.is_dirty() {
            return None;
        }
        if self.running_any(|pending| *pending == Pending::Autosave) {
            debug!("previous recovery snapshot still being written");
            return None;
        }
        let ticket = self.worker.submit(IoRequest::Autosave {
            recovery: self.recovery.clone(),
            snapshot: RecoverySnapshot::from_document(&self.document),
        });
        self.track(ticket, Pending::Autosave);
        Some(ticket)
    }

    pub fn recovery_available(&self) -> bool {
        self.recovery.has_snapshot()
    }

    /// 以恢復快照取代目前文件；沒有快照時回傳 `false`。 / Replaces the document with the recovery snapshot, if any.
    pub fn restore_recovery(&mut self) -> Result<bool, SessionError> {
        let Some(snapshot) = self.recovery.load()? else {
            return Ok(false);
        };
        info!(
            source = ?snapshot.source,
            encoding = %snapshot.encoding,
            "restoring recovery snapshot"
        );
        self.forget_document_requests();
        self.replace_document(snapshot.into_document());
        Ok(true)
    }

    pub fn discard_recovery(&mut self) {
        self.recovery.clear();
    }

    pub fn set_theme(&mut self, theme: Theme) -> Result<(), SessionError> {
        self.config.theme = theme;
        self.persist()
    }

    pub fn set_font_family(&mut self, family: &str) -> Result<(), SessionError> {
        let family = family.trim();
        if family.is_empty() {
            return Err(SessionError::invalid("font_family", "must not be empty"));
        }
        self.config.font_family = family.to_string();
        self.persist()
    }

    pub fn set_font_size(&mut self, size: u32) -> Result<(), SessionError> {
        if size == 0 {
            return Err(SessionError::invalid("font_size", "must be positive"));
        }
        self.config.font_size = size;
        self.persist()
    }

    pub fn set_autosave_enabled(&mut self, enabled: bool) -> Result<(), SessionError> {
        self.config.autosave_enabled = enabled;
        self.persist()
    }

    /// 變更自動儲存間隔並重新起算計時。 / Changes the autosave interval and restarts the timer.
    pub fn set_autosave_interval(&mut self, seconds: u32) -> Result<(), SessionError> {
        if seconds == 0 {
            return Err(SessionError::invalid("autosave_interval", "must be positive"));
        }
        self.config.autosave_interval = seconds;
        self.last_autosave = Instant::now();
        self.persist()
    }

    /// 從最近檔案清單移除。 / Removes an entry from the recent-files list.
    pub fn remove_recent(&mut self, path: &str) -> Result<bool, SessionError> {
        let removed = self.config.recent_files.remove(path);
        if removed {
            self.persist()?;
        }
        Ok(removed)
    }

    pub fn clear_recent(&mut self) -> Result<(), SessionError> {
        self.config.recent_files.clear();
        self.persist()
    }

    /// 將所有設定還原為預設值。 / Resets every setting, recent files included, to its default.
    pub fn reset_config(&mut self) -> Result<(), SessionError> {
        self.config = EditorConfig::default();
        self.persist()
    }

    /// 從游標往後尋找（會繞回開頭），找到後游標移至結尾。 /
    /// Searches forward from the cursor, wrapping; the cursor moves past the match.
    pub fn find_next(&mut self, options: &SearchOptions) -> Result<Option<SearchMatch>, SessionError> {
        let found = SearchEngine::new(self.document.contents()).find(self.cursor, options)?;
        match &found {
            Some(found) => {
                self.cursor = found.end;
                self.selection = Some((found.range(), self.document.revision()));
            }
            None => self.selection = None,
        }
        Ok(found)
    }

    pub fn find_all(&self, options: &SearchOptions) -> Result<Vec<SearchMatch>, SessionError> {
        Ok(SearchEngine::new(self.document.contents()).find_all(options)?)
    }

    /// 取代目前選取的相符項；若沒有選取則取代游標後的下一個。 /
    /// Replaces the match selected by the last find, or the next one after the cursor.
    pub fn replace_current(
        &mut self,
        options: &SearchOptions,
        replacement: &str,
    ) -> Result<Option<SearchMatch>, SessionError> {
        let from = match &self.selection {
            Some((range, revision)) if *revision == self.document.revision() => range.start,
            _ => self.cursor,
        };
        let outcome =
            SearchEngine::new(self.document.contents()).replace_next(from, replacement, options)?;
        self.selection = None;
        let Some(outcome) = outcome else {
            return Ok(None);
        };
        self.document.set_contents(outcome.replaced_text);
        self.cursor = outcome.cursor;
        Ok(Some(outcome.replaced))
    }

    /// 取代全部相符項並回傳次數；沒有相符時文件不變。 / Replaces every match and returns the count.
    pub fn replace_all(
        &mut self,
        options: &SearchOptions,
        replacement: &str,
    ) -> Result<usize, SessionError> {
        let outcome = SearchEngine::new(self.document.contents()).replace_all(replacement, options)?;
        if outcome.replacements > 0 {
            self.document.set_contents(outcome.replaced_text);
            self.cursor = self.cursor.min(self.document.contents().len());
            while !self.document.contents().is_char_boundary(self.cursor) {
                self.cursor -= 1;
            }
            self.selection = None;
        }
        Ok(outcome.replacements)
    }

    /// 結束工作階段：放棄未完成結果並寫出設定。 / Ends the session, dropping in-flight results and persisting the configuration.
    pub fn shutdown(mut self) -> Result<(), SessionError> {
        self.abandon();
        self.persist()?;
        debug!("session closed");
        Ok(())
    }

    fn apply(&mut self, event: IoEvent) -> Option<SessionEvent> {
        let IoEvent { ticket, outcome } = event;
        self.running.remove(&ticket);
        let Some(pending) = self.pending.remove(&ticket) else {
            debug!(%ticket, "ignoring stale background result");
            return None;
        };

        match (pending, outcome) {
            (Pending::Open, IoOutcome::Opened { path, text, encoding }) => {
                info!(path = %path.display(), %encoding, "file opened");
                self.forget_document_requests();
                self.replace_document(Document::from_loaded(path.clone(), text, encoding));
                self.remember_recent(&path);
                Some(SessionEvent::Opened { path, encoding })
            }
            (Pending::Open, IoOutcome::OpenFailed { path, error }) => {
                warn!(path = %path.display(), %error, "open failed");
                Some(SessionEvent::OpenFailed { path, error })
            }
            (Pending::Save { revision }, IoOutcome::Saved { path, encoding }) => {
                info!(path = %path.display(), %encoding, "file saved");
                self.document.mark_saved(path.clone(), encoding, revision);
                self.remember_recent(&path);
                self.recovery.clear();
                Some(SessionEvent::Saved { path, encoding })
            }
            (Pending::Save { .. }, IoOutcome::SaveFailed { path, error }) => {
                warn!(path = %path.display(), %error, "save failed");
                Some(SessionEvent::SaveFailed { path, error })
            }
            (Pending::Autosave, IoOutcome::Autosaved) => {
                debug!("recovery snapshot written");
                // Saved in the meantime; the snapshot is already obsolete.
                if !self.document.is_dirty() {
                    self.recovery.clear();
                }
                Some(SessionEvent::Autosaved)
            }
            (Pending::Autosave, IoOutcome::AutosaveFailed { error }) => {
                warn!(%error, "autosave failed");
                None
            }
            (pending, outcome) => {
                warn!(%ticket, ?pending, ?outcome, "mismatched background result");
                None
            }
        }
    }

    fn open_in_flight(&self) -> bool {
        self.pending.values().any(|pending| *pending == Pending::Open)
    }

    fn running_any(&self, predicate: impl Fn(&Pending) -> bool) -> bool {
        self.running.values().any(predicate)
    }

    fn track(&mut self, ticket: Ticket, pending: Pending) {
        self.pending.insert(ticket, pending);
        self.running.insert(ticket, pending);
    }

    fn forget_document_requests(&mut self) {
        self.pending
            .retain(|_, pending| matches!(pending, Pending::Autosave));
    }

    fn replace_document(&mut self, document: Document) {
        self.document = document;
        self.cursor = 0;
        self.selection = None;
    }

    fn remember_recent(&mut self, path: &Path) {
        self.config.recent_files.add(path);
        if let Err(err) = self.persist() {
            warn!(error = %err, "failed to persist recent files");
        }
    }

    fn persist(&self) -> Result<(), SessionError> {
        self.store.save(&self.config)?;
        Ok(())
    }
}
