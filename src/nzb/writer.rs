//! NZB XML serialization
//!
//! The fragment helpers are shared by [`Nzb::to_xml`](super::Nzb::to_xml)
//! and by [`NzbWriter`], which streams a document out one article at a
//! time and infers file boundaries from segment numbers.

use crate::article::{Article, parse_article_date};
use crate::error::Result;
use quick_xml::escape::escape;
use std::collections::HashMap;
use std::fmt::Write as _;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{trace, warn};

const DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n";
const DOCTYPE: &str = "<!DOCTYPE nzb PUBLIC \"-//newzBin//DTD NZB 1.1//EN\" \"http://www.newzbin.com/DTD/nzb/nzb-1.1.dtd\">\n";
const ROOT_OPEN: &str = "<nzb xmlns=\"http://www.newzbin.com/DTD/2003/nzb\">\n";

pub(crate) const FILE_CLOSE: &str = "    </segments>\n  </file>\n";
pub(crate) const DOCUMENT_CLOSE: &str = "</nzb>\n";

fn sorted<V>(map: &HashMap<String, V>) -> Vec<(&String, &V)> {
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
}

/// Declaration, processing instructions, DOCTYPE and the opening root tag
pub(crate) fn prolog(instructions: &HashMap<String, HashMap<String, String>>) -> String {
    let mut out = String::from(DECLARATION);
    for (target, attributes) in sorted(instructions) {
        out.push_str("<?");
        out.push_str(target);
        for (key, value) in sorted(attributes) {
            let _ = write!(out, " {}=\"{}\"", key, escape(value.as_str()));
        }
        out.push_str("?>\n");
    }
    out.push_str(DOCTYPE);
    out.push_str(ROOT_OPEN);
    out
}

/// `<head>` block, or nothing when there is no metadata
pub(crate) fn head_block(head: &HashMap<String, String>) -> String {
    if head.is_empty() {
        return String::new();
    }
    let mut out = String::from("  <head>\n");
    for (key, value) in sorted(head) {
        let _ = writeln!(
            out,
            "    <meta type=\"{}\">{}</meta>",
            escape(key.as_str()),
            escape(value.as_str())
        );
    }
    out.push_str("  </head>\n");
    out
}

/// Opening `<file>` tag, its groups, and the opening `<segments>` tag
pub(crate) fn file_open<'a>(
    poster: &str,
    date_secs: i64,
    subject: &str,
    groups: impl IntoIterator<Item = &'a str>,
) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "  <file poster=\"{}\" date=\"{}\" subject=\"{}\">",
        escape(poster),
        date_secs,
        escape(subject)
    );
    out.push_str("    <groups>\n");
    for group in groups {
        let _ = writeln!(out, "      <group>{}</group>", escape(group));
    }
    out.push_str("    </groups>\n    <segments>\n");
    out
}

pub(crate) fn segment_element(bytes: u64, number: u32, message_id: &str) -> String {
    format!(
        "      <segment bytes=\"{}\" number=\"{}\">{}</segment>\n",
        bytes,
        number,
        escape(message_id)
    )
}

/// Streams an NZB document built from an ordered sequence of articles
///
/// A new `<file>` block starts at every article numbered 1, closing the
/// previous one; the file attributes come from that article's headers.
/// Articles must therefore arrive in source order.
///
/// # Example
///
/// ```
/// use nzb_toolkit::{parse_nzb, NzbWriter};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> nzb_toolkit::Result<()> {
/// let nzb = parse_nzb(r#"<nzb><file poster="p" date="1600000000" subject="a (1/1)">
///   <groups><group>alt.test</group></groups>
///   <segments><segment bytes="10" number="1">a@x</segment></segments>
/// </file></nzb>"#)?;
///
/// let mut writer = NzbWriter::begin(Vec::new(), &nzb.head, &nzb.processing_instructions).await?;
/// for article in nzb.articles() {
///     writer.write_article(&article).await?;
/// }
/// let xml = String::from_utf8(writer.finish().await?).unwrap();
/// assert!(xml.contains(r#"<segment bytes="10" number="1">a@x</segment>"#));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct NzbWriter<W> {
    inner: W,
    file_open: bool,
    files: usize,
    articles: usize,
}

impl<W: AsyncWrite + Unpin> NzbWriter<W> {
    /// Write the prolog and head block, returning a writer ready for articles
    pub async fn begin(
        mut inner: W,
        head: &HashMap<String, String>,
        instructions: &HashMap<String, HashMap<String, String>>,
    ) -> Result<Self> {
        let mut out = prolog(instructions);
        out.push_str(&head_block(head));
        inner.write_all(out.as_bytes()).await?;

        Ok(Self {
            inner,
            file_open: false,
            files: 0,
            articles: 0,
        })
    }

    /// Append one article as a `<segment>`, opening a file block if needed
    pub async fn write_article(&mut self, article: &Article) -> Result<()> {
        let headers = &article.headers;
        let mut out = String::new();

        if article.number == 1 || !self.file_open {
            if self.file_open {
                out.push_str(FILE_CLOSE);
            }
            let date = parse_article_date(&headers.date).unwrap_or_else(|| {
                warn!(date = %headers.date, "Unparsable article date, writing 0");
                0
            });
            let groups = headers
                .newsgroups
                .split(',')
                .map(str::trim)
                .filter(|g| !g.is_empty());
            out.push_str(&file_open(&headers.from, date, &headers.subject, groups));
            self.file_open = true;
            self.files += 1;
        }

        out.push_str(&segment_element(
            article.bytes(),
            article.number,
            article.bare_message_id(),
        ));
        self.inner.write_all(out.as_bytes()).await?;
        self.articles += 1;

        trace!(
            number = article.number,
            message_id = %headers.message_id,
            "Wrote NZB segment"
        );
        Ok(())
    }

    /// Number of `<file>` blocks opened so far
    pub fn files_written(&self) -> usize {
        self.files
    }

    /// Number of segments written so far
    pub fn articles_written(&self) -> usize {
        self.articles
    }

    /// Flush what has been written without closing anything
    pub async fn flush(&mut self) -> Result<()> {
        self.inner.flush().await?;
        Ok(())
    }

    /// Close any open file block and the root element, flush, and return the sink
    pub async fn finish(mut self) -> Result<W> {
        if self.file_open {
            self.inner.write_all(FILE_CLOSE.as_bytes()).await?;
        }
        self.inner.write_all(DOCUMENT_CLOSE.as_bytes()).await?;
        self.inner.flush().await?;
        Ok(self.inner)
    }
}
