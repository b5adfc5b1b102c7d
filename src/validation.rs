//! NZB integrity checks
//!
//! A quick check looks at structure only: the document has files and every
//! file has a name, segments and groups. A full check first requires the
//! quick check to pass, then reconciles numbering, sizes and message-ids.
//! Problems are reported as data; checking never fails.

use crate::error::NzbError;
use crate::nzb::{Nzb, NzbFile};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// How thoroughly to check a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum CheckMethod {
    #[default]
    Quick,
    Full,
}

impl FromStr for CheckMethod {
    type Err = NzbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quick" => Ok(CheckMethod::Quick),
            "full" => Ok(CheckMethod::Full),
            other => Err(NzbError::InvalidConfig(format!(
                "unknown check method '{other}' (expected quick or full)"
            ))),
        }
    }
}

impl fmt::Display for CheckMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CheckMethod::Quick => "quick",
            CheckMethod::Full => "full",
        })
    }
}

/// Outcome of a check
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ValidationReport {
    pub valid: bool,
    /// Human-readable problems, in the order they were found
    pub issues: Vec<String>,
}

impl ValidationReport {
    fn from_issues(issues: Vec<String>) -> Self {
        Self {
            valid: issues.is_empty(),
            issues,
        }
    }
}

/// Check a document
///
/// # Examples
///
/// ```
/// use nzb_toolkit::{parse_nzb, validation::{check, CheckMethod}};
///
/// let nzb = parse_nzb(r#"<nzb><file subject="&quot;test.bin&quot; yEnc (1/2)">
///   <groups><group>alt.binaries.test</group></groups>
///   <segments>
///     <segment bytes="150" number="1">a@x</segment>
///     <segment bytes="150" number="1">b@x</segment>
///   </segments>
/// </file></nzb>"#).unwrap();
///
/// assert!(check(&nzb, CheckMethod::Quick).valid);
/// let full = check(&nzb, CheckMethod::Full);
/// assert!(!full.valid);
/// assert!(full.issues.iter().any(|i| i.contains("Duplicate segment numbers")));
/// ```
pub fn check(nzb: &Nzb, method: CheckMethod) -> ValidationReport {
    let quick = quick_check(nzb);
    if method == CheckMethod::Quick || !quick.valid {
        return quick;
    }
    full_check(nzb)
}

fn quick_check(nzb: &Nzb) -> ValidationReport {
    let mut issues = Vec::new();

    if nzb.files().is_empty() {
        issues.push("No files found in NZB".to_string());
    }

    for file in nzb.files() {
        if file.name.is_empty() {
            issues.push(format!("File missing name: {}", file.subject));
        }
        if file.segments.is_empty() {
            issues.push(format!("File has no segments: {}", file.display_name()));
        }
        if file.groups.is_empty() {
            issues.push(format!("File has no groups: {}", file.display_name()));
        }
    }

    ValidationReport::from_issues(issues)
}

fn full_check(nzb: &Nzb) -> ValidationReport {
    let mut issues = Vec::new();
    for file in nzb.files() {
        check_file(file, &mut issues);
    }
    ValidationReport::from_issues(issues)
}

fn check_file(file: &NzbFile, issues: &mut Vec<String>) {
    let numbers: HashSet<u32> = file.segments.iter().map(|s| s.number).collect();
    if numbers.len() != file.segments.len() {
        issues.push(format!("Duplicate segment numbers in file: {}", file.name));
    }

    let total = file.segment_bytes();
    if file.size != 0 && total != file.size {
        issues.push(format!(
            "Size mismatch in file {}: expected {}, got {}",
            file.name, file.size, total
        ));
    }

    for segment in &file.segments {
        if !is_valid_message_id(&segment.message_id) {
            issues.push(format!(
                "Invalid message ID in file {}: {}",
                file.name, segment.message_id
            ));
        }
    }
}

/// A stored message-id is one or more characters with no angle brackets
pub fn is_valid_message_id(id: &str) -> bool {
    !id.is_empty() && !id.contains(['<', '>'])
}
