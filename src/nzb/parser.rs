//! Streaming NZB parser
//!
//! [`NzbParser`] is an [`XmlHandler`]: it builds an [`Nzb`] from tokenizer
//! callbacks while the input is still being read. Parsing is deliberately
//! permissive. Missing or malformed attributes become empty strings or
//! zero, and structural problems are left for [`crate::validation`].

use super::tokenizer::{Attributes, Tokenizer, XmlHandler};
use super::{Nzb, NzbFile, NzbSegment};
use crate::error::Result;
use crate::subject::parse_yenc_subject;
use chrono::Utc;
use std::collections::HashMap;
use std::io::BufRead;
use tokio::io::AsyncBufRead;
use tracing::debug;

/// Parser state for one document
///
/// The file being read is owned here until its closing tag, then appended
/// to the document; `segment` indexes the segment whose message-id text
/// is being collected.
#[derive(Debug)]
pub struct NzbParser {
    nzb: Nzb,
    path: Vec<String>,
    meta: Option<(String, String)>,
    file: Option<NzbFile>,
    group: Option<String>,
    segment: Option<usize>,
    parsed_at: i64,
}

impl NzbParser {
    /// Start an empty document with an optional name hint
    pub fn new(name: Option<String>) -> Self {
        Self {
            nzb: Nzb::new(name),
            path: Vec::new(),
            meta: None,
            file: None,
            group: None,
            segment: None,
            parsed_at: Utc::now().timestamp_millis(),
        }
    }

    /// Finish parsing, closing a file left open by truncated input
    pub fn finish(mut self) -> Nzb {
        self.finish_file();
        self.nzb
    }

    /// Document parsed so far
    pub fn document(&self) -> &Nzb {
        &self.nzb
    }

    fn parent_is(&self, names: &[&str]) -> bool {
        self.path.len() >= names.len()
            && self.path[self.path.len() - names.len()..]
                .iter()
                .zip(names)
                .all(|(a, b)| a == b)
    }

    fn in_element(&self, name: &str) -> bool {
        self.path.last().is_some_and(|n| n == name)
    }

    fn start_file(&mut self, attributes: &Attributes) {
        // A nested <file> closes the previous one
        self.finish_file();

        let subject = attributes.get("subject").unwrap_or_default().to_string();
        let last_modified = attributes
            .get("date")
            .and_then(|d| d.trim().parse::<f64>().ok())
            .filter(|secs| secs.is_finite())
            .map(|secs| (secs * 1000.0).round() as i64)
            .unwrap_or(self.parsed_at);
        let info = parse_yenc_subject(&subject);

        self.file = Some(NzbFile {
            poster: attributes.get("poster").unwrap_or_default().to_string(),
            last_modified,
            name: info.name.unwrap_or_default(),
            size: info.size.unwrap_or(0),
            subject,
            groups: Vec::new(),
            segments: Vec::new(),
        });
    }

    fn finish_file(&mut self) {
        self.group = None;
        self.segment = None;

        let Some(mut file) = self.file.take() else {
            return;
        };
        if file.size == 0 {
            file.size = file.segment_bytes();
        }
        debug!(
            name = %file.display_name(),
            segments = file.segments.len(),
            size = file.size,
            "Parsed NZB file entry"
        );
        self.nzb.push_file(file);
    }

    fn start_segment(&mut self, attributes: &Attributes) {
        let Some(file) = self.file.as_mut() else {
            return;
        };
        file.segments.push(NzbSegment {
            message_id: String::new(),
            bytes: parse_number(attributes.get("bytes")),
            number: parse_number(attributes.get("number")),
        });
        self.segment = Some(file.segments.len() - 1);
    }
}

impl XmlHandler for NzbParser {
    fn on_element_enter(&mut self, name: &str, attributes: &Attributes) {
        match name {
            "meta" if self.parent_is(&["head"]) => {
                self.meta = attributes
                    .get("type")
                    .map(|key| (key.to_string(), String::new()));
            }
            "file" => self.start_file(attributes),
            "group" if self.file.is_some() && self.parent_is(&["file", "groups"]) => {
                self.group = Some(String::new());
            }
            "segment" if self.parent_is(&["file", "segments"]) => self.start_segment(attributes),
            _ => {}
        }
        self.path.push(name.to_string());
    }

    fn on_element_exit(&mut self, name: &str) {
        if let Some(pos) = self.path.iter().rposition(|n| n == name) {
            self.path.truncate(pos);
        }

        match name {
            "meta" => {
                if let Some((key, value)) = self.meta.take() {
                    self.nzb.head.insert(key, value.trim().to_string());
                }
            }
            "group" => {
                if let (Some(group), Some(file)) = (self.group.take(), self.file.as_mut()) {
                    file.groups.push(group.trim().to_string());
                }
            }
            "segment" => {
                if let (Some(index), Some(file)) = (self.segment.take(), self.file.as_mut()) {
                    let segment = &mut file.segments[index];
                    segment.message_id = segment.message_id.trim().to_string();
                }
            }
            "file" => self.finish_file(),
            _ => {}
        }
    }

    fn on_text(&mut self, text: &str) {
        if self.in_element("segment") {
            if let (Some(index), Some(file)) = (self.segment, self.file.as_mut()) {
                file.segments[index].message_id.push_str(text);
            }
        } else if self.in_element("group") {
            if let Some(group) = self.group.as_mut() {
                group.push_str(text);
            }
        } else if self.in_element("meta") {
            if let Some((_, value)) = self.meta.as_mut() {
                value.push_str(text);
            }
        }
    }

    fn on_processing_instruction(&mut self, target: &str, attributes: &Attributes) {
        let data: HashMap<String, String> = attributes
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.nzb.set_processing_instruction(target, data);
    }
}

fn parse_number<T: std::str::FromStr + Default>(value: Option<&str>) -> T {
    value
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or_default()
}

impl Nzb {
    /// Parse an NZB from a blocking byte source
    pub fn from_reader<R: BufRead>(reader: R, name: Option<String>) -> Result<Nzb> {
        let mut parser = NzbParser::new(name);
        Tokenizer::new(reader).drive(&mut parser)?;
        Ok(parser.finish())
    }

    /// Parse an NZB from an async byte stream
    ///
    /// Only read failures are errors; the document is built as bytes arrive.
    pub async fn from_async_reader<R: AsyncBufRead + Unpin>(
        reader: R,
        name: Option<String>,
    ) -> Result<Nzb> {
        let mut parser = NzbParser::new(name);
        Tokenizer::new(reader).drive_async(&mut parser).await?;
        Ok(parser.finish())
    }
}

/// Parse an NZB file from an XML string
///
/// # Example
/// ```
/// use nzb_toolkit::parse_nzb;
///
/// let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
/// <!DOCTYPE nzb PUBLIC "-//newzBin//DTD NZB 1.1//EN" "http://www.newzbin.com/DTD/nzb/nzb-1.1.dtd">
/// <nzb xmlns="http://www.newzbin.com/DTD/2003/nzb">
///   <head>
///     <meta type="title">Example File</meta>
///   </head>
///   <file poster="user@example.com" date="1234567890" subject="&quot;example.bin&quot; yEnc (1/1)">
///     <groups>
///       <group>alt.binaries.test</group>
///     </groups>
///     <segments>
///       <segment bytes="768000" number="1">part1of1@example.com</segment>
///     </segments>
///   </file>
/// </nzb>"#;
///
/// let nzb = parse_nzb(xml).unwrap();
/// assert_eq!(nzb.files().len(), 1);
/// assert_eq!(nzb.files()[0].name, "example.bin");
/// assert_eq!(nzb.total_segments(), 1);
/// ```
pub fn parse_nzb(xml: &str) -> Result<Nzb> {
    Nzb::from_reader(xml.as_bytes(), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE nzb PUBLIC "-//newzBin//DTD NZB 1.1//EN" "http://www.newzbin.com/DTD/nzb/nzb-1.1.dtd">
<nzb xmlns="http://www.newzbin.com/DTD/2003/nzb">
  <head>
    <meta type="title">Test File</meta>
  </head>
  <file poster="user@example.com" date="1234567890" subject="Test [1/1]">
    <groups>
      <group>alt.binaries.test</group>
    </groups>
    <segments>
      <segment bytes="768000" number="1">part1of1@example.com</segment>
    </segments>
  </file>
</nzb>"#;

    #[test]
    fn test_parse_nzb_simple() {
        let nzb = parse_nzb(SIMPLE).unwrap();

        assert_eq!(nzb.head.get("title"), Some(&"Test File".to_string()));
        assert_eq!(nzb.files().len(), 1);

        let file = &nzb.files()[0];
        assert_eq!(file.poster, "user@example.com");
        assert_eq!(file.last_modified, 1_234_567_890_000);
        assert_eq!(file.subject, "Test [1/1]");
        assert_eq!(file.groups, vec!["alt.binaries.test"]);
        assert_eq!(file.segments.len(), 1);

        let seg = &file.segments[0];
        assert_eq!(seg.bytes, 768000);
        assert_eq!(seg.number, 1);
        assert_eq!(seg.message_id, "part1of1@example.com");
    }

    #[test]
    fn test_size_derived_from_segments_without_counter() {
        let nzb = parse_nzb(SIMPLE).unwrap();
        assert_eq!(nzb.files()[0].name, "");
        assert_eq!(nzb.files()[0].size, 768000);
        assert_eq!(nzb.total_size(), 768000);
    }

    #[test]
    fn test_yenc_subject_sets_name_and_size_hint() {
        let xml = r#"<nzb>
  <file poster="p" date="1600000000" subject="[01/10] - &quot;archive.part01.rar&quot; yEnc (1/3)">
    <groups><group>alt.binaries.test</group></groups>
    <segments>
      <segment bytes="100" number="1">a@x</segment>
      <segment bytes="100" number="2">b@x</segment>
      <segment bytes="100" number="3">c@x</segment>
    </segments>
  </file>
</nzb>"#;
        let nzb = parse_nzb(xml).unwrap();
        let file = &nzb.files()[0];
        assert_eq!(file.name, "archive.part01.rar");
        // The counter total is kept as the size hint, not recomputed
        assert_eq!(file.size, 3);
        assert_eq!(nzb.total_size(), 3);
        assert_eq!(nzb.total_segments(), 3);
    }

    #[test]
    fn test_parse_nzb_multiple_files_and_totals() {
        let xml = r#"<nzb xmlns="http://www.newzbin.com/DTD/2003/nzb">
  <file poster="user1@example.com" date="1234567890" subject="File 1">
    <groups><group>alt.binaries.test</group></groups>
    <segments><segment bytes="50000" number="1">file1seg1@example.com</segment></segments>
  </file>
  <file poster="user2@example.com" date="1234567900" subject="File 2">
    <groups><group>alt.binaries.test</group><group>alt.binaries.backup</group></groups>
    <segments>
      <segment bytes="75000" number="1">file2seg1@example.com</segment>
      <segment bytes="25000" number="2">file2seg2@example.com</segment>
    </segments>
  </file>
</nzb>"#;

        let nzb = parse_nzb(xml).unwrap();
        assert_eq!(nzb.files().len(), 2);
        assert_eq!(nzb.total_size(), 150000);
        assert_eq!(nzb.total_segments(), 3);
        assert_eq!(nzb.files()[1].groups, vec!["alt.binaries.test", "alt.binaries.backup"]);
    }

    #[test]
    fn test_parse_nzb_meta_tags_trimmed() {
        let xml = r#"<nzb>
  <head>
    <meta type="title">
        My Download
    </meta>
    <meta type="password">secret123</meta>
    <meta>no type</meta>
  </head>
</nzb>"#;

        let nzb = parse_nzb(xml).unwrap();
        assert_eq!(nzb.head.get("title"), Some(&"My Download".to_string()));
        assert_eq!(nzb.head.get("password"), Some(&"secret123".to_string()));
        assert_eq!(nzb.head.len(), 2);
    }

    #[test]
    fn test_missing_attributes_default() {
        let xml = r#"<nzb><file><segments><segment>id@x</segment></segments></file></nzb>"#;
        let before = Utc::now().timestamp_millis();
        let nzb = parse_nzb(xml).unwrap();

        let file = &nzb.files()[0];
        assert_eq!(file.poster, "");
        assert_eq!(file.subject, "");
        assert!(file.last_modified >= before - 1000);
        assert_eq!(file.segments[0].bytes, 0);
        assert_eq!(file.segments[0].number, 0);
        assert_eq!(file.segments[0].message_id, "id@x");
    }

    #[test]
    fn test_malformed_numbers_default_to_zero() {
        let xml = r#"<nzb><file date="yesterday"><segments>
            <segment bytes="lots" number="-1">id@x</segment>
        </segments></file></nzb>"#;
        let nzb = parse_nzb(xml).unwrap();
        let seg = &nzb.files()[0].segments[0];
        assert_eq!(seg.bytes, 0);
        assert_eq!(seg.number, 0);
    }

    #[test]
    fn test_duplicate_segment_numbers_are_kept() {
        let xml = r#"<nzb><file subject="x"><segments>
            <segment bytes="1" number="1">a@x</segment>
            <segment bytes="1" number="1">b@x</segment>
        </segments></file></nzb>"#;
        let nzb = parse_nzb(xml).unwrap();
        assert_eq!(nzb.files()[0].segments.len(), 2);
    }

    #[test]
    fn test_message_id_entities_and_whitespace() {
        let xml = r#"<nzb><file><segments>
            <segment bytes="1" number="1">
                part&amp;1@example.com
            </segment>
        </segments></file></nzb>"#;
        let nzb = parse_nzb(xml).unwrap();
        assert_eq!(nzb.files()[0].segments[0].message_id, "part&1@example.com");
    }

    #[test]
    fn test_groups_outside_file_ignored() {
        let xml = r#"<nzb><groups><group>stray</group></groups>
            <file><groups><group> alt.test </group></groups></file></nzb>"#;
        let nzb = parse_nzb(xml).unwrap();
        assert_eq!(nzb.files()[0].groups, vec!["alt.test"]);
    }

    #[test]
    fn test_truncated_document_keeps_open_file() {
        let xml = r#"<nzb><file subject="cut"><segments>
            <segment bytes="10" number="1">a@x</segment>
            <segment bytes="20" number="2">b@x</segment>"#;
        let nzb = parse_nzb(xml).unwrap();
        assert_eq!(nzb.files().len(), 1);
        assert_eq!(nzb.files()[0].segments.len(), 2);
        assert_eq!(nzb.total_size(), 30);
    }

    #[test]
    fn test_processing_instructions_captured() {
        let xml = r#"<?xml version="1.0"?>
<?xml-stylesheet type="text/xsl" href="nzb.xsl"?>
<nzb/>"#;
        let nzb = parse_nzb(xml).unwrap();
        let pi = nzb.processing_instructions.get("xml-stylesheet").unwrap();
        assert_eq!(pi.get("href").map(String::as_str), Some("nzb.xsl"));
        assert_eq!(pi.get("type").map(String::as_str), Some("text/xsl"));
        assert!(!nzb.processing_instructions.contains_key("xml"));
    }

    #[test]
    fn test_name_hint_kept() {
        let nzb = Nzb::from_reader(SIMPLE.as_bytes(), Some("test.nzb".to_string())).unwrap();
        assert_eq!(nzb.name.as_deref(), Some("test.nzb"));
    }

    #[tokio::test]
    async fn test_from_async_reader() {
        let reader = tokio::io::BufReader::new(SIMPLE.as_bytes());
        let nzb = Nzb::from_async_reader(reader, None).await.unwrap();
        assert_eq!(nzb.files().len(), 1);
        assert_eq!(nzb.total_size(), 768000);
    }
}
