//! NZB document model
//!
//! NZB is an XML-based file format used to describe Usenet binary posts.
//! A document holds head metadata and a list of files, each made of
//! segments that reference posted articles by message-id.
//!
//! Reference: https://sabnzbd.org/wiki/extra/nzb-spec

mod parser;
mod tokenizer;
mod writer;

pub use parser::{parse_nzb, NzbParser};
pub use tokenizer::{Attributes, Tokenizer, XmlHandler};
pub use writer::NzbWriter;

use crate::article::Articles;
use std::collections::HashMap;
use std::sync::Arc;

/// NZB document containing metadata and file entries
///
/// Files are stored behind [`Arc`] so that combining or filtering documents
/// shares entries instead of copying their segment lists. The running
/// totals are maintained by [`Nzb::push_file`], the only way to add files.
#[derive(Debug, Clone, Default)]
pub struct Nzb {
    /// Optional name hint (usually the source file name)
    pub name: Option<String>,
    /// Metadata from the `<head>` section (e.g., title, password, category)
    pub head: HashMap<String, String>,
    /// Processing instructions, keyed by target
    pub processing_instructions: HashMap<String, HashMap<String, String>>,
    files: Vec<Arc<NzbFile>>,
    total_size: u64,
    total_segments: usize,
}

/// A single file entry in an NZB
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NzbFile {
    /// Poster name/email
    pub poster: String,
    /// Posting time in milliseconds since the Unix epoch
    pub last_modified: i64,
    /// File name recovered from the subject, empty if unknown
    pub name: String,
    /// Declared size in bytes; 0 until derived from the segments
    pub size: u64,
    /// Subject line as posted for the first segment
    pub subject: String,
    /// Newsgroups where this file was posted
    pub groups: Vec<String>,
    /// Segments in document order
    pub segments: Vec<NzbSegment>,
}

/// A segment (part) of a file
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NzbSegment {
    /// Message-ID without angle brackets
    pub message_id: String,
    /// Size of this segment in bytes
    pub bytes: u64,
    /// Segment number (1-based, unique within the file)
    pub number: u32,
}

impl NzbFile {
    /// Sum of the segment sizes
    pub fn segment_bytes(&self) -> u64 {
        self.segments.iter().map(|s| s.bytes).sum()
    }

    /// Posting time in whole Unix seconds
    pub fn date_secs(&self) -> i64 {
        self.last_modified.div_euclid(1000)
    }

    /// Name if known, otherwise the subject
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.subject
        } else {
            &self.name
        }
    }
}

impl Nzb {
    /// Create an empty document
    pub fn new(name: Option<String>) -> Self {
        Self {
            name,
            ..Default::default()
        }
    }

    /// Create an empty document carrying `source`'s name, head and processing instructions
    pub fn empty_like(source: &Nzb) -> Self {
        Self {
            name: source.name.clone(),
            head: source.head.clone(),
            processing_instructions: source.processing_instructions.clone(),
            ..Default::default()
        }
    }

    /// Append a file and fold it into the document totals
    pub fn push_file(&mut self, file: impl Into<Arc<NzbFile>>) {
        let file = file.into();
        self.total_size += file.size;
        self.total_segments += file.segments.len();
        self.files.push(file);
    }

    /// Set a processing instruction, replacing any previous one with the same target
    pub fn set_processing_instruction(
        &mut self,
        target: impl Into<String>,
        attributes: HashMap<String, String>,
    ) {
        self.processing_instructions.insert(target.into(), attributes);
    }

    /// Files in document order
    pub fn files(&self) -> &[Arc<NzbFile>] {
        &self.files
    }

    /// First file with exactly this name
    pub fn file(&self, name: &str) -> Option<&Arc<NzbFile>> {
        self.files.iter().find(|f| f.name == name)
    }

    /// Sum of all file sizes in bytes
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Number of segments across all files
    pub fn total_segments(&self) -> usize {
        self.total_segments
    }

    /// Lazy, restartable projection of every segment as an article
    pub fn articles(&self) -> Articles<'_> {
        Articles::new(&self.files)
    }

    /// Serialize the whole document as NZB 1.1 XML
    ///
    /// # Example
    /// ```
    /// use nzb_toolkit::{Nzb, NzbFile, NzbSegment};
    ///
    /// let mut nzb = Nzb::new(None);
    /// nzb.head.insert("title".to_string(), "Test File".to_string());
    /// nzb.push_file(NzbFile {
    ///     poster: "user@example.com".to_string(),
    ///     last_modified: 1_234_567_890_000,
    ///     subject: "Test (1/1)".to_string(),
    ///     groups: vec!["alt.binaries.test".to_string()],
    ///     segments: vec![NzbSegment {
    ///         message_id: "part1of1@example.com".to_string(),
    ///         bytes: 768000,
    ///         number: 1,
    ///     }],
    ///     ..Default::default()
    /// });
    ///
    /// let xml = nzb.to_xml();
    /// assert!(xml.contains("<nzb"));
    /// assert!(xml.contains("Test File"));
    /// ```
    pub fn to_xml(&self) -> String {
        let mut xml = writer::prolog(&self.processing_instructions);
        xml.push_str(&writer::head_block(&self.head));

        for file in &self.files {
            xml.push_str(&writer::file_open(
                &file.poster,
                file.date_secs(),
                &file.subject,
                file.groups.iter().map(String::as_str),
            ));
            for segment in &file.segments {
                xml.push_str(&writer::segment_element(
                    segment.bytes,
                    segment.number,
                    &segment.message_id,
                ));
            }
            xml.push_str(writer::FILE_CLOSE);
        }

        xml.push_str(writer::DOCUMENT_CLOSE);
        xml
    }
}

impl std::fmt::Display for Nzb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_xml())
    }
}
