//! yEnc-style subject decoding
//!
//! Posting tools put the file name in double quotes and a `(part/total)`
//! counter in the subject, e.g. `[01/10] - "archive.rar" yEnc (1/25)`.
//! Some wrap the whole subject in a single UTF-8 Q encoded word
//! (`=?utf-8?q?...?=`) to hide it from indexers.

use regex::Regex;
use std::sync::LazyLock;

#[allow(clippy::expect_used)]
static ENCODED_SUBJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^=\?utf-8\?q\?(.*)\?=$").expect("static regex is valid")
});

#[allow(clippy::expect_used)]
static QUOTED_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]+)""#).expect("static regex is valid"));

#[allow(clippy::expect_used)]
static PART_COUNTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((\d+)/(\d+)\)").expect("static regex is valid"));

/// What could be recovered from a subject line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectInfo {
    /// Quoted file name, if any
    pub name: Option<String>,
    /// The `total` of the first `(n/total)` counter, if any
    pub size: Option<u64>,
}

/// Unwrap a `=?utf-8?q?...?=` subject; other subjects are returned unchanged
///
/// `=XX` hex escapes become raw bytes and `_` becomes a space. The
/// resulting bytes are read as UTF-8, replacing invalid sequences.
///
/// # Examples
///
/// ```
/// use nzb_toolkit::subject::decode_subject;
///
/// assert_eq!(decode_subject("=?utf-8?q?=22caf=C3=A9.bin=22_yEnc?="), "\"café.bin\" yEnc");
/// assert_eq!(decode_subject("plain subject"), "plain subject");
/// ```
pub fn decode_subject(subject: &str) -> String {
    match ENCODED_SUBJECT.captures(subject).and_then(|c| c.get(1)) {
        Some(inner) => String::from_utf8_lossy(&decode_q(inner.as_str())).into_owned(),
        None => subject.to_string(),
    }
}

/// Recover the file name and size hint from a subject line
///
/// The size hint is the `total` of the first `(n/total)` counter, taken
/// as-is; the caller stores it as the file size.
///
/// # Examples
///
/// ```
/// use nzb_toolkit::subject::parse_yenc_subject;
///
/// let info = parse_yenc_subject(r#"[01/10] - "archive.part01.rar" yEnc (1/25)"#);
/// assert_eq!(info.name.as_deref(), Some("archive.part01.rar"));
/// assert_eq!(info.size, Some(25));
/// ```
pub fn parse_yenc_subject(subject: &str) -> SubjectInfo {
    let decoded = decode_subject(subject);

    let name = QUOTED_NAME
        .captures(&decoded)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());
    let size = PART_COUNTER
        .captures(&decoded)
        .and_then(|c| c.get(2))
        .and_then(|m| m.as_str().parse().ok());

    SubjectInfo { name, size }
}

fn decode_q(encoded: &str) -> Vec<u8> {
    let bytes = encoded.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'_' => result.push(b' '),
            b'=' if i + 2 < bytes.len() => {
                let digits = &bytes[i + 1..i + 3];
                let hex = digits
                    .iter()
                    .all(u8::is_ascii_hexdigit)
                    .then_some(digits)
                    .and_then(|d| std::str::from_utf8(d).ok())
                    .and_then(|h| u8::from_str_radix(h, 16).ok());
                match hex {
                    Some(byte) => {
                        result.push(byte);
                        i += 3;
                        continue;
                    }
                    None => result.push(b'='),
                }
            }
            other => result.push(other),
        }
        i += 1;
    }

    result
}
