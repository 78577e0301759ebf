use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::encoding::{sniff_encoding, Encoding};

/// 讀寫文字檔時可能發生的錯誤。 / Errors raised while reading or writing text files.
#[derive(Error, Debug)]
pub enum TextIoError {
    /// 內容含有 NUL 位元組，判定為二進位檔。 / The content contains a NUL byte and is treated as binary.
    #[error("file appears to be binary or non-text")]
    NotText,
    #[error("unable to decode file as {encoding}")]
    Decode { encoding: Encoding },
    #[error("text cannot be represented in {encoding}")]
    Encode { encoding: Encoding },
    /// 無法辨識的編碼名稱（屬於編碼失敗的一種）。 / Unrecognised encoding label, the "unknown encoding" flavour of an encode failure.
    #[error("unknown encoding {0:?}")]
    UnknownEncoding(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TextIoError {
    /// 是否屬於編碼失敗（含未知編碼）。 / Whether this is an encode failure, including unknown labels.
    pub fn is_encode_error(&self) -> bool {
        matches!(
            self,
            TextIoError::Encode { .. } | TextIoError::UnknownEncoding(_)
        )
    }
}

/// 以 NUL 位元組判斷是否為二進位內容。 / Binary heuristic: any NUL byte marks the content as non-text.
///
/// NUL-padded encodings (plain ASCII saved as UTF-16, for instance) are rejected too.
pub fn is_binary(bytes: &[u8]) -> bool {
    bytes.contains(&0)
}

/// 將原始位元組解碼為文字並回傳偵測到的編碼。 / Decodes raw bytes, returning the text and the sniffed encoding.
pub fn decode_text(bytes: &[u8]) -> Result<(String, Encoding), TextIoError> {
    if is_binary(bytes) {
        return Err(TextIoError::NotText);
    }
    let encoding = sniff_encoding(bytes);
    let text = encoding.decode(bytes)?;
    Ok((text, encoding))
}

/// 讀取文字檔並偵測其編碼。 / Reads a text file and detects its encoding.
pub fn read_text_file(path: impl AsRef<Path>) -> Result<(String, Encoding), TextIoError> {
    let path = path.as_ref();
    let bytes = fs::read(path)?;
    let (text, encoding) = decode_text(&bytes)?;
    debug!(path = %path.display(), %encoding, bytes = bytes.len(), "read text file");
    Ok((text, encoding))
}

/// 以指定編碼原子寫入文字檔。 / Encodes `text` and writes it atomically.
///
/// 編碼失敗時不會碰觸目的檔。 / The destination is not touched when encoding fails.
pub fn write_text_file(
    path: impl AsRef<Path>,
    text: &str,
    encoding: Encoding,
) -> Result<(), TextIoError> {
    let path = path.as_ref();
    let bytes = encoding.encode(text)?;
    atomic_write(path, &bytes)?;
    debug!(path = %path.display(), %encoding, bytes = bytes.len(), "wrote text file");
    Ok(())
}

/// 以編碼標籤寫入；未知標籤回報 [`TextIoError::UnknownEncoding`]。 / Like [`write_text_file`] but resolves an encoding label first.
pub fn write_text_file_with_label(
    path: impl AsRef<Path>,
    text: &str,
    label: &str,
) -> Result<Encoding, TextIoError> {
    let encoding: Encoding = label.parse()?;
    write_text_file(path, text, encoding)?;
    Ok(encoding)
}

/// 先寫入同目錄下的唯一暫存檔、同步至磁碟，再以重新命名取代目的檔。 /
/// Writes to a uniquely named temp file in the destination directory, syncs
/// it, then renames it over `path`.
///
/// Any failure before the rename removes the temp file and leaves `path` untouched.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let file_name = path.file_name().ok_or_else(|| {
        io::Error::new(
            ErrorKind::InvalidInput,
            format!("{} does not name a file", path.display()),
        )
    })?;
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    let prefix = format!(".{}.", file_name.to_string_lossy());
    let mut tmp = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".tmp")
        .tempfile_in(&parent)?;

    // 保留既有檔案的權限；暫存檔預設為僅擁有者可讀寫。 / Temp files are owner-only; keep the destination's mode.
    if let Ok(metadata) = fs::metadata(path) {
        tmp.as_file().set_permissions(metadata.permissions())?;
    }

    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|err| err.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn leftover_temp_files(dir: &Path) -> Vec<PathBuf> {
        fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .map_or(false, |name| name.ends_with(".tmp"))
            })
            .collect()
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sample.txt");
        write_text_file(&path, "hello world", Encoding::Utf8).unwrap();

        let (text, encoding) = read_text_file(&path).unwrap();
        assert_eq!(text, "hello world");
        assert_eq!(encoding, Encoding::Utf8);
    }

    #[test]
    fn utf8_sig_round_trips_and_is_detected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bom.txt");
        write_text_file(&path, "text\nmore", Encoding::Utf8Sig).unwrap();
        assert!(fs::read(&path).unwrap().starts_with(b"\xEF\xBB\xBF"));

        let (text, encoding) = read_text_file(&path).unwrap();
        assert_eq!(text, "text\nmore");
        assert_eq!(encoding, Encoding::Utf8Sig);
    }

    #[test]
    fn utf16_without_nul_bytes_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("utf16.txt");
        write_text_file(&path, "中文測試", Encoding::Utf16).unwrap();

        let (text, encoding) = read_text_file(&path).unwrap();
        assert_eq!(text, "中文測試");
        assert_eq!(encoding, Encoding::Utf16);
    }

    #[test]
    fn nul_byte_anywhere_is_not_text() {
        let dir = tempdir().unwrap();
        for (name, payload) in [
            ("bin.dat", &b"\x00\x01\x02"[..]),
            ("tail.txt", &b"hello\x00"[..]),
            ("bom.txt", &b"\xEF\xBB\xBFok\x00ok"[..]),
            // ASCII 以 UTF-16 儲存會含 NUL，屬已知限制。 / ASCII stored as UTF-16 carries NULs; known limitation.
            ("utf16.txt", &b"\xFF\xFEh\x00i\x00"[..]),
        ] {
            let path = dir.path().join(name);
            fs::write(&path, payload).unwrap();
            assert!(
                matches!(read_text_file(&path), Err(TextIoError::NotText)),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn malformed_utf8_is_a_decode_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.txt");
        fs::write(&path, b"caf\xC3").unwrap();

        let err = read_text_file(&path).unwrap_err();
        assert!(matches!(
            err,
            TextIoError::Decode {
                encoding: Encoding::Utf8
            }
        ));
    }

    #[test]
    fn missing_file_surfaces_io_error() {
        let dir = tempdir().unwrap();
        let err = read_text_file(dir.path().join("absent.txt")).unwrap_err();
        assert!(matches!(err, TextIoError::Io(ref io) if io.kind() == ErrorKind::NotFound));
    }

    #[test]
    fn encode_failure_leaves_destination_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keep.txt");
        fs::write(&path, "original").unwrap();

        let err = write_text_file(&path, "漢字", Encoding::Ascii).unwrap_err();
        assert!(err.is_encode_error());
        assert_eq!(fs::read_to_string(&path).unwrap(), "original");
        assert!(leftover_temp_files(dir.path()).is_empty());
    }

    #[test]
    fn unknown_label_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("never.txt");

        let err = write_text_file_with_label(&path, "abc", "no-such-codec").unwrap_err();
        assert!(matches!(err, TextIoError::UnknownEncoding(ref label) if label == "no-such-codec"));
        assert!(err.is_encode_error());
        assert!(!path.exists());
    }

    #[test]
    fn atomic_write_creates_parent_and_replaces_existing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("out.txt");
        atomic_write(&path, b"first").unwrap();
        atomic_write(&path, b"second").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"second");
        assert!(leftover_temp_files(path.parent().unwrap()).is_empty());
    }

    #[test]
    fn atomic_write_failure_removes_temp_file() {
        let dir = tempdir().unwrap();
        // 目的地是資料夾，重新命名必定失敗。 / Renaming onto a non-empty directory always fails.
        let target = dir.path().join("occupied");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("child.txt"), "x").unwrap();

        assert!(atomic_write(&target, b"payload").is_err());
        assert!(target.is_dir());
        assert!(leftover_temp_files(dir.path()).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn atomic_write_keeps_existing_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("script.sh");
        fs::write(&path, "echo hi").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();

        atomic_write(&path, b"echo bye").unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o755);
    }
}
