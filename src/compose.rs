//! Building documents from other documents
//!
//! Results share file entries with their sources (see [`Nzb`]) and carry
//! the source head metadata and processing instructions.

use crate::error::{NzbError, Result};
use crate::nzb::Nzb;
use regex::{Regex, RegexBuilder};
use std::collections::HashSet;
use tracing::debug;

/// Merge documents in order
///
/// Head metadata and processing instructions from later documents replace
/// earlier ones with the same key. With `dedupe`, a file whose name, size
/// and segment count match an earlier file is skipped.
///
/// # Examples
///
/// ```
/// use nzb_toolkit::{compose::combine, parse_nzb};
///
/// let a = parse_nzb(r#"<nzb><file subject="&quot;a.bin&quot;"><segments>
///   <segment bytes="5" number="1">a@x</segment></segments></file></nzb>"#).unwrap();
///
/// let merged = combine(&[a.clone(), a], true);
/// assert_eq!(merged.files().len(), 1);
/// assert_eq!(merged.total_size(), 5);
/// ```
pub fn combine(documents: &[Nzb], dedupe: bool) -> Nzb {
    let mut combined = Nzb::new(documents.first().and_then(|d| d.name.clone()));
    let mut seen = HashSet::new();

    for document in documents {
        combined.head.extend(document.head.clone());
        combined
            .processing_instructions
            .extend(document.processing_instructions.clone());

        for file in document.files() {
            let key = format!("{}:{}:{}", file.name, file.size, file.segments.len());
            if dedupe && !seen.insert(key) {
                debug!(name = %file.display_name(), "Skipping duplicate file");
                continue;
            }
            combined.push_file(file.clone());
        }
    }

    combined
}

/// File name filter for [`extract`]
#[derive(Debug, Clone)]
pub struct FilePattern(Regex);

impl FilePattern {
    /// Shell-style glob matched against the whole name
    ///
    /// `*` matches any run of characters and `?` exactly one; everything
    /// else is literal.
    pub fn glob(pattern: &str) -> Result<Self> {
        let translated = regex::escape(pattern)
            .replace(r"\*", ".*")
            .replace(r"\?", ".");
        Self::compile(&format!("^(?s:{translated})$"), false)
    }

    /// Regular expression searched for anywhere in the name
    pub fn regex(pattern: &str) -> Result<Self> {
        Self::compile(pattern, false)
    }

    /// Case-insensitive variant of [`FilePattern::regex`]
    pub fn regex_ignore_case(pattern: &str) -> Result<Self> {
        Self::compile(pattern, true)
    }

    fn compile(pattern: &str, ignore_case: bool) -> Result<Self> {
        RegexBuilder::new(pattern)
            .case_insensitive(ignore_case)
            .build()
            .map(Self)
            .map_err(|e| NzbError::InvalidPattern(format!("{pattern}: {e}")))
    }

    pub fn is_match(&self, name: &str) -> bool {
        self.0.is_match(name)
    }
}

/// Files whose name matches `pattern`, as a new document
///
/// # Examples
///
/// ```
/// use nzb_toolkit::compose::{extract, FilePattern};
/// use nzb_toolkit::parse_nzb;
///
/// let nzb = parse_nzb(r#"<nzb>
///   <file subject="&quot;show.part01.rar&quot;"><segments><segment bytes="1" number="1">a@x</segment></segments></file>
///   <file subject="&quot;show.par2&quot;"><segments><segment bytes="1" number="1">b@x</segment></segments></file>
/// </nzb>"#).unwrap();
///
/// let rars = extract(&nzb, &FilePattern::glob("*.rar").unwrap());
/// assert_eq!(rars.files().len(), 1);
/// assert_eq!(rars.files()[0].name, "show.part01.rar");
/// ```
pub fn extract(nzb: &Nzb, pattern: &FilePattern) -> Nzb {
    let mut extracted = Nzb::empty_like(nzb);
    for file in nzb.files().iter().filter(|f| pattern.is_match(&f.name)) {
        extracted.push_file(file.clone());
    }
    debug!(
        matched = extracted.files().len(),
        total = nzb.files().len(),
        "Extracted files"
    );
    extracted
}

/// The first file called `name`, as a new single-file document
pub fn get(nzb: &Nzb, name: &str, case_sensitive: bool) -> Option<Nzb> {
    let file = nzb.files().iter().find(|f| {
        if case_sensitive {
            f.name == name
        } else {
            f.name.eq_ignore_ascii_case(name)
        }
    })?;

    let mut single = Nzb::empty_like(nzb);
    single.push_file(file.clone());
    Some(single)
}
