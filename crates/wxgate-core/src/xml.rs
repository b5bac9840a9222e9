//! Flat reader and writer for the `<xml>` documents the platform exchanges.
//!
//! Documents are shallow: a single `xml` root holding leaf elements, some of
//! them grouped one level deeper (`ScanCodeInfo`, `BatchJob`, `Articles/item`).
//! The reader flattens leaves into dotted paths relative to the root.

use std::collections::BTreeMap;
use std::fmt::Display;

use quick_xml::events::{BytesCData, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::{GatewayError, Result};

pub const ROOT: &str = "xml";

/// Leaf values keyed by dotted element path, root excluded.
pub type Fields = BTreeMap<String, String>;

fn malformed<E: Display>(e: E) -> GatewayError {
    GatewayError::MalformedXml(e.to_string())
}

struct OpenElement {
    name: String,
    text: String,
    has_children: bool,
}

fn leaf_path(stack: &[OpenElement], leaf: &str) -> String {
    let mut parts: Vec<&str> = stack.iter().skip(1).map(|e| e.name.as_str()).collect();
    parts.push(leaf);
    parts.join(".")
}

fn element_name(start: &BytesStart<'_>) -> Result<String> {
    std::str::from_utf8(start.name().as_ref())
        .map(str::to_owned)
        .map_err(malformed)
}

/// Parse a document into its leaf fields. The first occurrence of a repeated
/// path wins.
pub fn read_document(xml: &str) -> Result<Fields> {
    let mut reader = Reader::from_str(xml);

    let mut fields = Fields::new();
    let mut stack: Vec<OpenElement> = Vec::new();
    let mut seen_root = false;

    loop {
        match reader.read_event().map_err(malformed)? {
            Event::Start(start) => {
                let name = element_name(&start)?;
                match stack.last_mut() {
                    Some(parent) => parent.has_children = true,
                    None => {
                        if seen_root || name != ROOT {
                            return Err(malformed(format!("unexpected root element <{name}>")));
                        }
                        seen_root = true;
                    }
                }
                stack.push(OpenElement {
                    name,
                    text: String::new(),
                    has_children: false,
                });
            }
            Event::Empty(start) => {
                let name = element_name(&start)?;
                match stack.last_mut() {
                    Some(parent) => {
                        parent.has_children = true;
                        fields.entry(leaf_path(&stack, &name)).or_default();
                    }
                    None => {
                        if seen_root || name != ROOT {
                            return Err(malformed(format!("unexpected root element <{name}>")));
                        }
                        seen_root = true;
                    }
                }
            }
            Event::Text(text) => {
                if let Some(open) = stack.last_mut() {
                    open.text.push_str(&text.unescape().map_err(malformed)?);
                }
            }
            Event::CData(cdata) => {
                if let Some(open) = stack.last_mut() {
                    let raw = cdata.into_inner();
                    open.text
                        .push_str(std::str::from_utf8(&raw).map_err(malformed)?);
                }
            }
            Event::End(_) => {
                let Some(closed) = stack.pop() else {
                    return Err(malformed("unbalanced closing tag"));
                };
                if !closed.has_children && !stack.is_empty() {
                    fields
                        .entry(leaf_path(&stack, &closed.name))
                        .or_insert(closed.text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_root {
        return Err(malformed("missing <xml> root"));
    }
    if !stack.is_empty() {
        return Err(malformed("unexpected end of document"));
    }
    Ok(fields)
}

/// Incremental builder for an outbound `<xml>` document.
pub struct DocumentWriter {
    writer: Writer<Vec<u8>>,
}

impl DocumentWriter {
    pub fn new() -> Result<Self> {
        let mut writer = Writer::new(Vec::new());
        writer
            .write_event(Event::Start(BytesStart::new(ROOT)))
            .map_err(malformed)?;
        Ok(Self { writer })
    }

    pub fn open(&mut self, name: &str) -> Result<()> {
        self.writer
            .write_event(Event::Start(BytesStart::new(name)))
            .map_err(malformed)
    }

    pub fn close(&mut self, name: &str) -> Result<()> {
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(malformed)
    }

    /// Leaf element with escaped text content.
    pub fn text(&mut self, name: &str, value: &str) -> Result<()> {
        self.open(name)?;
        self.writer
            .write_event(Event::Text(BytesText::new(value)))
            .map_err(malformed)?;
        self.close(name)
    }

    /// Leaf element wrapped in CDATA. Values that would terminate the section
    /// early fall back to escaped text.
    pub fn cdata(&mut self, name: &str, value: &str) -> Result<()> {
        if value.contains("]]>") {
            return self.text(name, value);
        }
        self.open(name)?;
        self.writer
            .write_event(Event::CData(BytesCData::new(value)))
            .map_err(malformed)?;
        self.close(name)
    }

    pub fn finish(mut self) -> Result<String> {
        self.close(ROOT)?;
        String::from_utf8(self.writer.into_inner()).map_err(malformed)
    }
}
