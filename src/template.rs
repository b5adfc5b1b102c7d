//! Subject, message-id and output-name templates
//!
//! Templates use `{name}` placeholders filled from a [`TemplateParams`]
//! map, and at most one `${rand(N)}` that expands to `N` random hex
//! characters from the operating system's CSPRNG.
//!
//! Recognized names for a document are `files`, `filename`, `fnamebase`,
//! `filesize`, `fileksize`, `filemsize`, `filegsize`, `filetsize` and
//! `fileasize`. Per article there are also `filenum`, `0filenum`, `part`,
//! `0part`, `parts`, `size`, `comment`, `comment2` and `timestamp`.

use crate::article::Article;
use crate::error::{NzbError, Result};
use crate::nzb::{Nzb, NzbFile};
use human_bytes::human_bytes;
use rand::rngs::OsRng;
use rand::RngCore;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::LazyLock;
use tracing::warn;

/// Hex characters produced by `${rand(0)}`
pub const DEFAULT_RAND_LEN: usize = 40;

/// Largest accepted `${rand(N)}`
pub const MAX_RAND_LEN: usize = 4096;

#[allow(clippy::expect_used)]
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^{}]*)\}").expect("static regex is valid"));

#[allow(clippy::expect_used)]
static RAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{rand\((\d+)\)\}").expect("static regex is valid"));

/// A template parameter value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Text(String),
    Int(i64),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Text(text) => f.write_str(text),
            ParamValue::Int(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        ParamValue::Int(i64::from(value))
    }
}

impl From<u64> for ParamValue {
    fn from(value: u64) -> Self {
        i64::try_from(value).map_or_else(|_| ParamValue::Text(value.to_string()), ParamValue::Int)
    }
}

impl From<usize> for ParamValue {
    fn from(value: usize) -> Self {
        ParamValue::from(value as u64)
    }
}

/// Named values available to a template
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateParams(HashMap<String, ParamValue>);

impl TemplateParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter, replacing any previous value
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> &mut Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    /// Parameters describing a whole document, for output names
    ///
    /// `filename` is the document's name hint and `filesize` its total size.
    pub fn for_document(nzb: &Nzb) -> Self {
        let mut params = Self::new();
        params.insert("files", nzb.files().len());
        params.insert_file(nzb.name.as_deref().unwrap_or_default(), nzb.total_size());
        params
    }

    /// Parameters for one article of the file at `file_index`
    ///
    /// `comment` and `comment2` start out empty; callers fill them in.
    pub fn for_article(files: usize, file_index: usize, file: &NzbFile, article: &Article) -> Self {
        let filenum = file_index + 1;
        let parts = file.segments.len();

        let mut params = Self::new();
        params
            .insert("files", files)
            .insert("filenum", filenum)
            .insert("0filenum", zero_pad(filenum, files))
            .insert("part", article.number)
            .insert("0part", zero_pad(article.number as usize, parts))
            .insert("parts", parts)
            .insert("size", article.headers.bytes.as_str())
            .insert("comment", "")
            .insert("comment2", "")
            .insert("timestamp", file.date_secs());
        params.insert_file(&file.name, file.size);
        params
    }

    fn insert_file(&mut self, name: &str, size: u64) {
        let stem = Path::new(name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        self.insert("filename", name)
            .insert("fnamebase", stem)
            .insert("filesize", size)
            .insert("fileksize", scaled(size, 1))
            .insert("filemsize", scaled(size, 2))
            .insert("filegsize", scaled(size, 3))
            .insert("filetsize", scaled(size, 4))
            .insert("fileasize", human_bytes(size as f64));
    }
}

fn scaled(size: u64, steps: i32) -> String {
    format!("{:.2}", size as f64 / 1000f64.powi(steps))
}

fn zero_pad(value: usize, widest: usize) -> String {
    let width = widest.to_string().len();
    format!("{value:0width$}")
}

/// Resolve a template against `params`
///
/// Every `{name}` is substituted first (a `{...}` right after `$` is left
/// alone), then the first `${rand(N)}` is expanded. An unknown name is an
/// error.
///
/// # Examples
///
/// ```
/// use nzb_toolkit::template::{render, TemplateParams};
///
/// let mut params = TemplateParams::new();
/// params.insert("filename", "a.bin").insert("part", 2u32).insert("parts", 5u32);
///
/// assert_eq!(render("{filename}-{part}of{parts}", &params).unwrap(), "a.bin-2of5");
///
/// let id = render("${rand(16)}@example.com", &params).unwrap();
/// assert_eq!(id.len(), "@example.com".len() + 16);
///
/// assert!(render("{nope}", &params).is_err());
/// ```
pub fn render(template: &str, params: &TemplateParams) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;

    for captures in PLACEHOLDER.captures_iter(template) {
        let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        if template[..whole.start()].ends_with('$') {
            continue;
        }
        let Some(value) = params.get(name.as_str()) else {
            warn!(placeholder = name.as_str(), template, "Unknown template placeholder");
            return Err(NzbError::UnknownPlaceholder(name.as_str().to_string()));
        };

        out.push_str(&template[last..whole.start()]);
        let _ = write!(out, "{value}");
        last = whole.end();
    }
    out.push_str(&template[last..]);

    expand_rand(out)
}

fn expand_rand(text: String) -> Result<String> {
    let Some(captures) = RAND.captures(&text) else {
        return Ok(text);
    };
    let (Some(whole), Some(count)) = (captures.get(0), captures.get(1)) else {
        return Ok(text);
    };
    let len = count
        .as_str()
        .parse::<usize>()
        .ok()
        .filter(|n| *n <= MAX_RAND_LEN)
        .ok_or_else(|| {
            NzbError::InvalidTemplate(format!(
                "${{rand({})}} exceeds {MAX_RAND_LEN} characters",
                count.as_str()
            ))
        })?;

    Ok(format!(
        "{}{}{}",
        &text[..whole.start()],
        random_hex(len),
        &text[whole.end()..]
    ))
}

/// `len` lowercase hex characters from the OS random source
///
/// 0 means [`DEFAULT_RAND_LEN`]; odd lengths are rounded up to even.
pub fn random_hex(len: usize) -> String {
    let len = match len {
        0 => DEFAULT_RAND_LEN,
        n => n + n % 2,
    };
    let mut bytes = vec![0u8; len / 2];
    OsRng.fill_bytes(&mut bytes);

    let mut hex = String::with_capacity(len);
    for byte in bytes {
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}
