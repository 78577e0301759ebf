use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use encoding_rs::{Encoding as RsEncoding, REPLACEMENT, UTF_16BE, UTF_16LE, UTF_8};

use crate::io::TextIoError;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const UTF16_LE_BOM: &[u8] = b"\xFF\xFE";
const UTF16_BE_BOM: &[u8] = b"\xFE\xFF";

/// 文件支援的文字編碼標籤。 / Encoding tags understood by the editor.
///
/// `Utf8`、`Utf8Sig` 與 `Utf16` 由 BOM 偵測而得；其餘僅能於另存新檔時由使用者指定。 /
/// `Utf8`, `Utf8Sig` and `Utf16` come out of BOM sniffing; the rest are only
/// ever chosen explicitly by the user when saving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
    /// UTF-8 with a leading byte-order mark.
    Utf8Sig,
    /// BOM-prefixed UTF-16; byte order follows the BOM on read, little-endian on write.
    Utf16,
    Utf16Le,
    Utf16Be,
    Ascii,
    Latin1,
    Legacy(&'static RsEncoding),
}

impl Default for Encoding {
    fn default() -> Self {
        Encoding::Utf8
    }
}

impl Encoding {
    /// 以標籤名稱查找編碼（不分大小寫，`_` 與 `-` 視為相同）。 / Looks up an encoding by label, case-insensitively.
    pub fn from_label(label: &str) -> Option<Self> {
        let normalised = label.trim().to_ascii_lowercase().replace('_', "-");
        let encoding = match normalised.as_str() {
            "utf-8" | "utf8" => Encoding::Utf8,
            "utf-8-sig" | "utf8-sig" => Encoding::Utf8Sig,
            "utf-16" | "utf16" => Encoding::Utf16,
            "utf-16-le" | "utf-16le" | "utf16le" => Encoding::Utf16Le,
            "utf-16-be" | "utf-16be" | "utf16be" => Encoding::Utf16Be,
            "ascii" | "us-ascii" => Encoding::Ascii,
            "iso-8859-1" | "latin-1" | "latin1" => Encoding::Latin1,
            other => {
                let rs = RsEncoding::for_label(label.trim().as_bytes())
                    .or_else(|| RsEncoding::for_label(other.as_bytes()))?;
                // 這些編碼在 encoding_rs 中沒有對應的編碼器。 / encoding_rs cannot encode into these.
                if rs == REPLACEMENT || rs == UTF_16LE || rs == UTF_16BE {
                    return None;
                }
                if rs == UTF_8 {
                    Encoding::Utf8
                } else {
                    Encoding::Legacy(rs)
                }
            }
        };
        Some(encoding)
    }

    /// 回傳正規化的編碼名稱。 / Returns the canonical name used in metadata and messages.
    pub fn name(self) -> &'static str {
        match self {
            Encoding::Utf8 => "utf-8",
            Encoding::Utf8Sig => "utf-8-sig",
            Encoding::Utf16 => "utf-16",
            Encoding::Utf16Le => "utf-16-le",
            Encoding::Utf16Be => "utf-16-be",
            Encoding::Ascii => "ascii",
            Encoding::Latin1 => "iso-8859-1",
            Encoding::Legacy(rs) => rs.name(),
        }
    }

    /// 以此編碼嚴格解碼位元組；任何無效序列皆視為失敗。 / Strictly decodes `bytes`; any malformed sequence is an error.
    pub fn decode(self, bytes: &[u8]) -> Result<String, TextIoError> {
        let failed = || TextIoError::Decode { encoding: self };
        match self {
            Encoding::Utf8 => String::from_utf8(bytes.to_vec()).map_err(|_| failed()),
            Encoding::Utf8Sig => {
                let payload = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
                String::from_utf8(payload.to_vec()).map_err(|_| failed())
            }
            Encoding::Utf16 => {
                if let Some(payload) = bytes.strip_prefix(UTF16_BE_BOM) {
                    decode_utf16(payload, true).ok_or_else(failed)
                } else {
                    let payload = bytes.strip_prefix(UTF16_LE_BOM).unwrap_or(bytes);
                    decode_utf16(payload, false).ok_or_else(failed)
                }
            }
            Encoding::Utf16Le => decode_utf16(bytes, false).ok_or_else(failed),
            Encoding::Utf16Be => decode_utf16(bytes, true).ok_or_else(failed),
            Encoding::Ascii => {
                if bytes.is_ascii() {
                    Ok(bytes.iter().map(|&b| b as char).collect())
                } else {
                    Err(failed())
                }
            }
            Encoding::Latin1 => Ok(bytes.iter().map(|&b| b as char).collect()),
            Encoding::Legacy(rs) => rs
                .decode_without_bom_handling_and_without_replacement(bytes)
                .map(Cow::into_owned)
                .ok_or_else(failed),
        }
    }

    /// 以此編碼嚴格編碼文字；無法表示的字元會回報錯誤。 / Strictly encodes `text`, rejecting unrepresentable characters.
    pub fn encode(self, text: &str) -> Result<Vec<u8>, TextIoError> {
        let failed = || TextIoError::Encode { encoding: self };
        let bytes = match self {
            Encoding::Utf8 => text.as_bytes().to_vec(),
            Encoding::Utf8Sig => {
                let mut prefixed = Vec::with_capacity(UTF8_BOM.len() + text.len());
                prefixed.extend_from_slice(UTF8_BOM);
                prefixed.extend_from_slice(text.as_bytes());
                prefixed
            }
            Encoding::Utf16 => encode_utf16(text, Some(UTF16_LE_BOM), false),
            Encoding::Utf16Le => encode_utf16(text, None, false),
            Encoding::Utf16Be => encode_utf16(text, None, true),
            Encoding::Ascii => {
                if !text.is_ascii() {
                    return Err(failed());
                }
                text.as_bytes().to_vec()
            }
            Encoding::Latin1 => text
                .chars()
                .map(|ch| u8::try_from(u32::from(ch)).map_err(|_| failed()))
                .collect::<Result<Vec<u8>, _>>()?,
            Encoding::Legacy(rs) => {
                let (cow, _, had_errors) = rs.encode(text);
                if had_errors {
                    return Err(failed());
                }
                cow.into_owned()
            }
        };
        Ok(bytes)
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Encoding {
    type Err = TextIoError;

    fn from_str(label: &str) -> Result<Self, Self::Err> {
        Encoding::from_label(label).ok_or_else(|| TextIoError::UnknownEncoding(label.to_string()))
    }
}

/// 依 BOM 判斷編碼，預設為 UTF-8。 / Detects the encoding from a byte-order mark, defaulting to UTF-8.
pub fn sniff_encoding(bytes: &[u8]) -> Encoding {
    if bytes.starts_with(UTF8_BOM) {
        Encoding::Utf8Sig
    } else if bytes.starts_with(UTF16_LE_BOM) || bytes.starts_with(UTF16_BE_BOM) {
        Encoding::Utf16
    } else {
        Encoding::Utf8
    }
}

fn decode_utf16(bytes: &[u8], big_endian: bool) -> Option<String> {
    if bytes.len() % 2 != 0 {
        return None;
    }

    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|chunk| {
            let pair = [chunk[0], chunk[1]];
            if big_endian {
                u16::from_be_bytes(pair)
            } else {
                u16::from_le_bytes(pair)
            }
        })
        .collect();
    String::from_utf16(&units).ok()
}

fn encode_utf16(text: &str, bom: Option<&[u8]>, big_endian: bool) -> Vec<u8> {
    let bom = bom.unwrap_or_default();
    let mut buffer = Vec::with_capacity(bom.len() + text.len() * 2);
    buffer.extend_from_slice(bom);
    for unit in text.encode_utf16() {
        let bytes = if big_endian {
            unit.to_be_bytes()
        } else {
            unit.to_le_bytes()
        };
        buffer.extend_from_slice(&bytes);
    }
    buffer
}
