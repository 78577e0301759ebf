//! Background file I/O.
//!
//! Every request runs on its own short-lived thread; the result is handed back
//! to the controlling thread through a channel. Nothing here touches shared
//! editor state, so the owner of the document stays the single writer.

use std::fmt;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use tracing::{debug, error};

use crate::encoding::Encoding;
use crate::io::{read_text_file, write_text_file, TextIoError};
use crate::recovery::{RecoveryError, RecoveryManager, RecoverySnapshot};

/// 識別一個已送出的背景請求。 / Identifies an issued background request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(u64);

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 背景執行的檔案操作。 / File operations executed off the controlling thread.
#[derive(Debug)]
pub enum IoRequest {
    Open {
        path: PathBuf,
    },
    Save {
        path: PathBuf,
        text: String,
        encoding: Encoding,
    },
    Autosave {
        recovery: RecoveryManager,
        snapshot: RecoverySnapshot,
    },
}

impl IoRequest {
    fn label(&self) -> &'static str {
        match self {
            IoRequest::Open { .. } => "open",
            IoRequest::Save { .. } => "save",
            IoRequest::Autosave { .. } => "autosave",
        }
    }

    /// 無法啟動執行緒時回報的結果。 / Outcome reported when no thread could be started.
    fn failure_outcome(&self, err: std::io::Error) -> IoOutcome {
        match self {
            IoRequest::Open { path } => IoOutcome::OpenFailed {
                path: path.clone(),
                error: TextIoError::Io(err),
            },
            IoRequest::Save { path, .. } => IoOutcome::SaveFailed {
                path: path.clone(),
                error: TextIoError::Io(err),
            },
            IoRequest::Autosave { .. } => IoOutcome::AutosaveFailed {
                error: RecoveryError::from(err),
            },
        }
    }
}

/// 背景操作的結果。 / Result of a background operation.
#[derive(Debug)]
pub enum IoOutcome {
    Opened {
        path: PathBuf,
        text: String,
        encoding: Encoding,
    },
    OpenFailed {
        path: PathBuf,
        error: TextIoError,
    },
    Saved {
        path: PathBuf,
        encoding: Encoding,
    },
    SaveFailed {
        path: PathBuf,
        error: TextIoError,
    },
    Autosaved,
    AutosaveFailed {
        error: RecoveryError,
    },
}

/// 回傳給控制執行緒的事件。 / Event delivered back to the controlling thread.
#[derive(Debug)]
pub struct IoEvent {
    pub ticket: Ticket,
    pub outcome: IoOutcome,
}

/// 派發背景檔案操作並收集其結果。 / Dispatches background file operations and collects their results.
pub struct IoWorker {
    tx: Sender<IoEvent>,
    rx: Receiver<IoEvent>,
    next_ticket: u64,
}

impl Default for IoWorker {
    fn default() -> Self {
        Self::new()
    }
}

impl IoWorker {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            tx,
            rx,
            next_ticket: 1,
        }
    }

    /// 送出請求並立即回傳票證。 / Issues a request and returns immediately with its ticket.
    pub fn submit(&mut self, request: IoRequest) -> Ticket {
        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;

        let label = request.label();
        let (handoff_tx, handoff_rx) = mpsc::channel::<IoRequest>();
        let tx = self.tx.clone();
        let spawned = thread::Builder::new()
            .name(format!("textpad-io-{label}"))
            .spawn(move || {
                let Ok(request) = handoff_rx.recv() else {
                    return;
                };
                let outcome = execute(request);
                // 接收端已關閉代表結果被放棄。 / A closed receiver means the result was abandoned.
                let _ = tx.send(IoEvent { ticket, outcome });
            });

        match spawned {
            Ok(_) => {
                // 執行緒仍在等待，傳送不會失敗。 / The thread is parked on `recv`, so this send cannot fail.
                let _ = handoff_tx.send(request);
                debug!(%ticket, label, "background request issued");
            }
            Err(err) => {
                error!(%ticket, label, error = %err, "failed to spawn I/O thread");
                let outcome = request.failure_outcome(err);
                let _ = self.tx.send(IoEvent { ticket, outcome });
            }
        }
        ticket
    }

    /// 非阻塞地取得下一個事件。 / Fetches the next event without blocking.
    pub fn try_next(&self) -> Option<IoEvent> {
        self.rx.try_recv().ok()
    }

    /// 等待下一個事件，逾時則回傳 `None`。 / Waits up to `timeout` for the next event.
    pub fn next_timeout(&self, timeout: Duration) -> Option<IoEvent> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

fn execute(request: IoRequest) -> IoOutcome {
    match request {
        IoRequest::Open { path } => match read_text_file(&path) {
            Ok((text, encoding)) => IoOutcome::Opened {
                path,
                text,
                encoding,
            },
            Err(error) => IoOutcome::OpenFailed { path, error },
        },
        IoRequest::Save {
            path,
            text,
            encoding,
        } => match write_text_file(&path, &text, encoding) {
            Ok(()) => IoOutcome::Saved { path, encoding },
            Err(error) => IoOutcome::SaveFailed { path, error },
        },
        IoRequest::Autosave { recovery, snapshot } => match recovery.write(&snapshot) {
            Ok(()) => IoOutcome::Autosaved,
            Err(error) => IoOutcome::AutosaveFailed { error },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recovery::RecoveryPaths;
    use std::fs;
    use tempfile::tempdir;

    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn open_result_arrives_on_channel() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "from disk").unwrap();

        let mut worker = IoWorker::new();
        let ticket = worker.submit(IoRequest::Open { path: path.clone() });
        let event = worker.next_timeout(WAIT).expect("open event");

        assert_eq!(event.ticket, ticket);
        match event.outcome {
            IoOutcome::Opened {
                path: opened,
                text,
                encoding,
            } => {
                assert_eq!(opened, path);
                assert_eq!(text, "from disk");
                assert_eq!(encoding, Encoding::Utf8);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn failures_are_reported_not_raised() {
        let dir = tempdir().unwrap();
        let binary = dir.path().join("bin.dat");
        fs::write(&binary, b"\x00\x01").unwrap();

        let mut worker = IoWorker::new();
        worker.submit(IoRequest::Open { path: binary });
        let event = worker.next_timeout(WAIT).expect("open event");
        assert!(matches!(
            event.outcome,
            IoOutcome::OpenFailed {
                error: TextIoError::NotText,
                ..
            }
        ));
    }

    #[test]
    fn tickets_increase_and_save_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("saved.txt");
        let mut worker = IoWorker::new();

        let first = worker.submit(IoRequest::Save {
            path: path.clone(),
            text: "saved".into(),
            encoding: Encoding::Utf8Sig,
        });
        let event = worker.next_timeout(WAIT).expect("save event");
        assert_eq!(event.ticket, first);
        assert!(matches!(
            event.outcome,
            IoOutcome::Saved {
                encoding: Encoding::Utf8Sig,
                ..
            }
        ));
        assert_eq!(fs::read(&path).unwrap(), b"\xEF\xBB\xBFsaved");

        let recovery = RecoveryManager::new(RecoveryPaths {
            text: dir.path().join("recovery.txt"),
            meta: dir.path().join("recovery.json"),
        });
        let second = worker.submit(IoRequest::Autosave {
            recovery: recovery.clone(),
            snapshot: RecoverySnapshot {
                text: "draft".into(),
                source: None,
                encoding: Encoding::Utf8,
            },
        });
        assert!(second > first);
        let event = worker.next_timeout(WAIT).expect("autosave event");
        assert!(matches!(event.outcome, IoOutcome::Autosaved));
        assert!(recovery.has_snapshot());
        assert!(worker.try_next().is_none());
    }
}
