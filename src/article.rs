//! Articles projected from NZB segments
//!
//! Every segment of a document corresponds to one posted article. The
//! projection rebuilds the header set a poster would have used, so that a
//! transform can re-post or verify it and the result can be written back
//! into a new document.

use crate::nzb::{NzbFile, NzbSegment};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Header values of a projected article
///
/// `message_id` carries angle brackets (`<id@host>`); `bytes` is the
/// segment size as decimal text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArticleHeaders {
    pub from: String,
    pub date: String,
    pub subject: String,
    pub newsgroups: String,
    pub message_id: String,
    pub bytes: String,
}

/// One segment viewed as an article
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Article {
    pub headers: ArticleHeaders,
    /// Segment number within its file (1 starts a new file)
    pub number: u32,
}

impl Article {
    /// Build the article for `segment` of `file`
    pub fn from_segment(file: &NzbFile, segment: &NzbSegment) -> Self {
        Self {
            headers: ArticleHeaders {
                from: file.poster.clone(),
                date: format_article_date(file.last_modified),
                subject: renumber_subject(&file.subject, segment.number, file.segments.len()),
                newsgroups: file.groups.join(","),
                message_id: format!("<{}>", segment.message_id),
                bytes: segment.bytes.to_string(),
            },
            number: segment.number,
        }
    }

    /// Declared size, 0 if the `bytes` header is not a number
    pub fn bytes(&self) -> u64 {
        self.headers.bytes.trim().parse().unwrap_or(0)
    }

    /// Message-id without surrounding angle brackets
    pub fn bare_message_id(&self) -> &str {
        let id = self.headers.message_id.trim();
        let id = id.strip_prefix('<').unwrap_or(id);
        id.strip_suffix('>').unwrap_or(id)
    }
}

/// Headers a transform should use instead of the source article's
///
/// `None` keeps the source value. `bytes` is always the source size.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HeaderOverrides {
    pub from: Option<String>,
    pub date: Option<String>,
    pub newsgroups: Option<String>,
    pub subject: Option<String>,
    pub message_id: Option<String>,
    pub bytes: String,
}

impl HeaderOverrides {
    /// Source headers with every set override applied
    pub fn apply(&self, headers: &ArticleHeaders) -> ArticleHeaders {
        let pick = |value: &Option<String>, source: &String| {
            value.clone().unwrap_or_else(|| source.clone())
        };
        ArticleHeaders {
            from: pick(&self.from, &headers.from),
            date: pick(&self.date, &headers.date),
            subject: pick(&self.subject, &headers.subject),
            newsgroups: pick(&self.newsgroups, &headers.newsgroups),
            message_id: pick(&self.message_id, &headers.message_id),
            bytes: self.bytes.clone(),
        }
    }
}

/// Format epoch milliseconds as an RFC 1123 date (`Sun, 13 Sep 2020 12:26:40 GMT`)
pub fn format_article_date(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .unwrap_or_default()
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

/// Parse an RFC 2822/1123 date header into Unix seconds
pub fn parse_article_date(date: &str) -> Option<i64> {
    DateTime::parse_from_rfc2822(date.trim())
        .ok()
        .map(|d| d.timestamp())
}

/// Rewrite a part-1 subject for part `number`
///
/// Only the literal `(1/total)` is replaced; any other subject comes back
/// unchanged.
///
/// # Examples
///
/// ```
/// use nzb_toolkit::article::renumber_subject;
///
/// assert_eq!(renumber_subject(r#""a.bin" yEnc (1/3)"#, 2, 3), r#""a.bin" yEnc (2/3)"#);
/// assert_eq!(renumber_subject("a.bin [1/3]", 2, 3), "a.bin [1/3]");
/// ```
pub fn renumber_subject(subject: &str, number: u32, total: usize) -> String {
    subject.replacen(
        &format!("(1/{total})"),
        &format!("({number}/{total})"),
        1,
    )
}

/// Forward-only cursor over every segment of a document, as articles
///
/// Files are visited in document order and segments in the order they
/// were appended (not sorted by number). [`Nzb::articles`](crate::Nzb::articles)
/// always starts a fresh cursor at the first article; a clone continues
/// from the position it was taken at.
#[derive(Debug, Clone)]
pub struct Articles<'a> {
    files: &'a [Arc<NzbFile>],
    file_index: usize,
    segment_index: usize,
}

impl<'a> Articles<'a> {
    pub(crate) fn new(files: &'a [Arc<NzbFile>]) -> Self {
        Self {
            files,
            file_index: 0,
            segment_index: 0,
        }
    }

    /// Next article along with its file and that file's index
    pub fn next_with_file(&mut self) -> Option<(usize, &'a NzbFile, Article)> {
        let files = self.files;
        loop {
            let file: &'a NzbFile = files.get(self.file_index)?;
            if let Some(segment) = file.segments.get(self.segment_index) {
                self.segment_index += 1;
                return Some((self.file_index, file, Article::from_segment(file, segment)));
            }
            self.file_index += 1;
            self.segment_index = 0;
        }
    }
}

impl Iterator for Articles<'_> {
    type Item = Article;

    fn next(&mut self) -> Option<Article> {
        self.next_with_file().map(|(_, _, article)| article)
    }
}
