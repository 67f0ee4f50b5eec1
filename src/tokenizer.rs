//! Push-based markup tokenizer.
//!
//! Wraps a [`quick_xml::Reader`] and reduces its event stream to the three structural
//! events the dispatcher cares about: element open (with attributes), character data
//! and element close. Comments, processing instructions, declarations and doctypes are
//! skipped. Well-formedness (matching end tags, duplicate attributes, a single root
//! element) is enforced here, before any event reaches the sink.

use std::io::BufRead;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::trace;

use crate::error::{Result, SourceError, TagError};

/// Receiver of structural markup events
pub trait MarkupSink {
    fn open(&mut self, name: &str, attributes: &[(String, String)]) -> Result<()>;

    fn text(&mut self, fragment: &str) -> Result<()>;

    fn close(&mut self, name: &str) -> Result<()>;
}

/// Drives a [`MarkupSink`] from a buffered markup source
pub struct Tokenizer<R> {
    reader: Reader<R>,
    trim_text: bool,
}

impl<R: BufRead> Tokenizer<R> {
    pub fn new(source: R) -> Self {
        let mut reader = Reader::from_reader(source);
        let config = reader.config_mut();
        config.trim_text_start = false;
        config.trim_text_end = false;
        config.check_end_names = true;

        Self {
            reader,
            trim_text: false,
        }
    }

    /// Trim every text fragment and drop the ones that are only whitespace
    pub fn with_trim_text(mut self, trim_text: bool) -> Self {
        self.trim_text = trim_text;
        self
    }

    /// Feed every event of the source to `sink`, stopping at the first failure.
    pub fn run<S: MarkupSink>(self, sink: &mut S) -> Result<()> {
        let Tokenizer {
            mut reader,
            trim_text,
        } = self;
        let mut buf = Vec::new();
        let mut depth = 0usize;
        let mut seen_root = false;

        loop {
            buf.clear();
            let event = match reader.read_event_into(&mut buf) {
                Ok(event) => event,
                Err(err) => return Err(read_error(&reader, err)),
            };

            match event {
                Event::Start(start) => {
                    if depth == 0 && seen_root {
                        return Err(syntax_error(&reader, "multiple root elements"));
                    }
                    let (name, attributes) = read_start(&reader, &start)?;
                    trace!(element = %name, attributes = attributes.len(), "open");
                    sink.open(&name, &attributes)?;
                    depth += 1;
                    seen_root = true;
                }
                Event::Empty(start) => {
                    if depth == 0 && seen_root {
                        return Err(syntax_error(&reader, "multiple root elements"));
                    }
                    let (name, attributes) = read_start(&reader, &start)?;
                    trace!(element = %name, attributes = attributes.len(), "open (empty)");
                    sink.open(&name, &attributes)?;
                    sink.close(&name)?;
                    seen_root = true;
                }
                Event::End(end) => {
                    let name = decode(&reader, end.name().into_inner(), "element name")?;
                    trace!(element = %name, "close");
                    depth = depth.saturating_sub(1);
                    sink.close(name)?;
                }
                Event::Text(text) => {
                    let fragment = text.unescape().map_err(|err| {
                        syntax_error(&reader, format!("invalid text content: {err}"))
                    })?;
                    deliver_text(sink, &reader, depth, &fragment, trim_text)?;
                }
                Event::CData(cdata) => {
                    let fragment = decode(&reader, cdata.as_ref(), "CDATA section")?;
                    deliver_text(sink, &reader, depth, fragment, trim_text)?;
                }
                Event::Eof => {
                    if depth > 0 {
                        return Err(syntax_error(
                            &reader,
                            format!("unexpected end of document with {depth} unclosed element(s)"),
                        ));
                    }
                    if !seen_root {
                        return Err(syntax_error(&reader, "document has no root element"));
                    }
                    return Ok(());
                }
                // Comments, processing instructions, declarations, doctypes
                _ => {}
            }
        }
    }
}

fn read_start<R>(
    reader: &Reader<R>,
    start: &BytesStart<'_>,
) -> Result<(String, Vec<(String, String)>)> {
    let name = decode(reader, start.name().into_inner(), "element name")?.to_string();
    let mut attributes = Vec::new();
    for attribute in start.attributes() {
        let attribute = attribute
            .map_err(|err| syntax_error(reader, format!("attribute error on <{name}>: {err}")))?;
        let key = decode(reader, attribute.key.as_ref(), "attribute name")?.to_string();
        let value = attribute.unescape_value().map_err(|err| {
            syntax_error(reader, format!("invalid value for attribute \"{key}\": {err}"))
        })?;
        attributes.push((key, value.into_owned()));
    }
    Ok((name, attributes))
}

fn deliver_text<S: MarkupSink, R>(
    sink: &mut S,
    reader: &Reader<R>,
    depth: usize,
    fragment: &str,
    trim_text: bool,
) -> Result<()> {
    if depth == 0 {
        // Only whitespace may surround the root element
        if fragment.trim().is_empty() {
            return Ok(());
        }
        return Err(syntax_error(reader, "text outside of the root element"));
    }

    let fragment = if trim_text { fragment.trim() } else { fragment };
    if trim_text && fragment.is_empty() {
        return Ok(());
    }
    trace!(len = fragment.len(), "text");
    sink.text(fragment)
}

fn decode<'b, R>(reader: &Reader<R>, bytes: &'b [u8], what: &str) -> Result<&'b str> {
    std::str::from_utf8(bytes)
        .map_err(|err| syntax_error(reader, format!("invalid UTF-8 in {what}: {err}")))
}

/// The reader itself failed; it recorded where
fn read_error<R>(reader: &Reader<R>, err: quick_xml::Error) -> TagError {
    SourceError::Syntax {
        position: reader.error_position(),
        message: err.to_string(),
    }
    .into()
}

/// A problem found in an event that was read successfully
fn syntax_error<R>(reader: &Reader<R>, message: impl Into<String>) -> TagError {
    SourceError::Syntax {
        position: reader.buffer_position(),
        message: message.into(),
    }
    .into()
}
