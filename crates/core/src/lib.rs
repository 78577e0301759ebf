pub mod document;
pub mod encoding;
pub mod io;
pub mod recovery;
pub mod worker;

pub use document::Document;
pub use encoding::{sniff_encoding, Encoding};
pub use io::{
    atomic_write, decode_text, is_binary, read_text_file, write_text_file,
    write_text_file_with_label, TextIoError,
};
pub use recovery::{RecoveryError, RecoveryManager, RecoveryPaths, RecoverySnapshot};
pub use worker::{IoEvent, IoOutcome, IoRequest, IoWorker, Ticket};
