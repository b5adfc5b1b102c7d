//! Event-driven XML tokenizing
//!
//! [`XmlHandler`] is the narrow capability the NZB parser is written
//! against: element enter/exit, text and processing instructions.
//! [`Tokenizer`] feeds any handler from a `quick_xml::Reader`, pulling the
//! input chunk by chunk through one reused buffer.

use crate::error::{NzbError, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::borrow::Cow;
use std::io::BufRead;
use tokio::io::AsyncBufRead;
use tracing::warn;

/// Receiver of structural XML events, in document order
pub trait XmlHandler {
    /// An element was opened (self-closing elements are opened and closed)
    fn on_element_enter(&mut self, name: &str, attributes: &Attributes);

    /// An element was closed
    fn on_element_exit(&mut self, name: &str);

    /// Character data inside the current element (may arrive in several pieces)
    fn on_text(&mut self, text: &str);

    /// A `<?target key="value"?>` processing instruction
    fn on_processing_instruction(&mut self, _target: &str, _attributes: &Attributes) {}
}

/// Unescaped attributes of an element, in source order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes(Vec<(String, String)>);

impl Attributes {
    /// Value of the first attribute with this (local) name
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Iterate over `(name, value)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of attributes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when there are no attributes
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn from_element(element: &BytesStart<'_>) -> Self {
        let attributes = element
            .attributes()
            .with_checks(false)
            .flatten()
            .map(|attr| {
                let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
                let value = attr
                    .unescape_value()
                    .map(Cow::into_owned)
                    .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned());
                (key, value)
            })
            .collect();
        Self(attributes)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Drives an [`XmlHandler`] from a buffered byte source
///
/// Element names are reported as local names (namespace prefixes dropped),
/// end-tag names are not checked against their start tags, and markup
/// errors end tokenizing with a warning instead of failing. Only I/O
/// errors are returned.
pub struct Tokenizer<R> {
    reader: Reader<R>,
    buf: Vec<u8>,
}

impl<R> Tokenizer<R> {
    /// Wrap a byte source
    pub fn new(source: R) -> Self {
        let mut reader = Reader::from_reader(source);
        let config = reader.config_mut();
        config.expand_empty_elements = true;
        config.check_end_names = false;

        Self {
            reader,
            buf: Vec::with_capacity(8 * 1024),
        }
    }

    /// Position in the input, in bytes
    pub fn position(&self) -> u64 {
        self.reader.buffer_position() as u64
    }

    fn recover(&self, err: quick_xml::Error) -> Result<()> {
        match err {
            quick_xml::Error::Io(_) => Err(NzbError::from(err)),
            other => {
                warn!(
                    position = self.position(),
                    error = %other,
                    "Stopping at malformed NZB markup"
                );
                Ok(())
            }
        }
    }
}

impl<R: BufRead> Tokenizer<R> {
    /// Tokenize the whole input, blocking on reads
    pub fn drive<H: XmlHandler>(&mut self, handler: &mut H) -> Result<()> {
        loop {
            self.buf.clear();
            let outcome = match self.reader.read_event_into(&mut self.buf) {
                Ok(Event::Eof) => return Ok(()),
                Ok(event) => {
                    dispatch(event, handler);
                    None
                }
                Err(err) => Some(err),
            };
            if let Some(err) = outcome {
                return self.recover(err);
            }
        }
    }
}

impl<R: AsyncBufRead + Unpin> Tokenizer<R> {
    /// Tokenize the whole input, yielding while waiting for more bytes
    pub async fn drive_async<H: XmlHandler>(&mut self, handler: &mut H) -> Result<()> {
        loop {
            self.buf.clear();
            let outcome = match self.reader.read_event_into_async(&mut self.buf).await {
                Ok(Event::Eof) => return Ok(()),
                Ok(event) => {
                    dispatch(event, handler);
                    None
                }
                Err(err) => Some(err),
            };
            if let Some(err) = outcome {
                return self.recover(err);
            }
        }
    }
}

fn dispatch<H: XmlHandler>(event: Event<'_>, handler: &mut H) {
    match event {
        Event::Start(element) => {
            let name = String::from_utf8_lossy(element.local_name().as_ref()).into_owned();
            handler.on_element_enter(&name, &Attributes::from_element(&element));
        }
        Event::End(element) => {
            let name = String::from_utf8_lossy(element.local_name().as_ref()).into_owned();
            handler.on_element_exit(&name);
        }
        Event::Text(text) => match text.unescape() {
            Ok(unescaped) => handler.on_text(&unescaped),
            Err(_) => handler.on_text(&String::from_utf8_lossy(&text)),
        },
        Event::CData(data) => handler.on_text(&String::from_utf8_lossy(&data)),
        Event::PI(pi) => {
            let target = String::from_utf8_lossy(pi.target()).into_owned();
            let content = String::from_utf8_lossy(pi.content()).into_owned();
            let pseudo = BytesStart::from_content(content, 0);
            handler.on_processing_instruction(&target, &Attributes::from_element(&pseudo));
        }
        // Empty elements are expanded by the reader config
        Event::Empty(_) | Event::Decl(_) | Event::DocType(_) | Event::Comment(_) | Event::Eof => {}
    }
}
